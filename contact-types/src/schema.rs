use ::std::fmt;
use ::std::str::FromStr;
use garde::Validate;
use email_address::EmailAddress;

use crate::Api::{FIELD_CONTENT, FIELD_EMAIL, FIELD_FILE, FIELD_SUBJECT, FIELD_USERNAME};
use crate::Contact::{Attachment, Submission, MAX_FILE_SIZE};

// Order the form shows its text fields in
const TEXT_FIELDS: [&'static str; 4] = [FIELD_USERNAME, FIELD_EMAIL, FIELD_SUBJECT, FIELD_CONTENT];

pub const MIN_NAME_CHARS: usize = 2;
pub const MIN_SUBJECT_CHARS: usize = 2;
pub const MIN_CONTENT_CHARS: usize = 10;
pub const MAX_CONTENT_CHARS: usize = 160;

pub const USERNAME_TOO_SHORT: &'static str = "ユーザー名は2文字以上で入力してください。";
pub const SUBJECT_TOO_SHORT: &'static str = "主題は2文字以上で入力してください。";
pub const EMAIL_INVALID: &'static str = "適切なメールアドレスを入力してください。";
pub const CONTENT_TOO_SHORT: &'static str = "本文は10文字以上で入力してください。";
pub const CONTENT_TOO_LONG: &'static str = "本文は160文字以内で入力してください。";
pub const FILE_COUNT: &'static str = "ファイル画像が必要です。";
pub const FILE_TOO_LARGE: &'static str = "画像サイズは5MBまでです。";
pub const FILE_TYPE: &'static str = ".jpg, .jpeg, .png and .webpファイルのみ利用できます。";

// Raw values as they come out of the form, nothing checked yet
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct FormValues {
    #[garde(custom(username_rule))]
    pub username: String,
    #[garde(custom(email_rule))]
    pub email: String,
    #[garde(custom(subject_rule))]
    pub subject: String,
    #[garde(custom(content_rule))]
    pub content: String,
    // Checked by hand in `validate` so count, size and type each report separately
    #[garde(skip)]
    pub file: Vec<Attachment>,
}

fn username_rule(value: &str, _: &()) -> garde::Result {
    if value.trim().chars().count() < MIN_NAME_CHARS {
        return Err(garde::Error::new(USERNAME_TOO_SHORT));
    }
    Ok(())
}

fn subject_rule(value: &str, _: &()) -> garde::Result {
    if value.trim().chars().count() < MIN_SUBJECT_CHARS {
        return Err(garde::Error::new(SUBJECT_TOO_SHORT));
    }
    Ok(())
}

// Narrower than RFC 5322: quoted local parts, dotless domains and address literals are refused
fn email_rule(value: &str, _: &()) -> garde::Result {
    let Ok(address) = EmailAddress::from_str(value) else {
        return Err(garde::Error::new(EMAIL_INVALID));
    };
    let quoted = address.local_part().contains(|c: char| c == '"' || c.is_whitespace());
    let labels = address.domain().split('.').collect::<Vec<_>>();
    let dotted = labels.len() > 1 && labels.iter().all(|label| !label.is_empty());
    let literal = address.domain().starts_with('[')
        || labels.last().map_or(true, |tld| tld.chars().all(|c| c.is_ascii_digit()));
    if quoted || literal || !dotted {
        return Err(garde::Error::new(EMAIL_INVALID));
    }
    Ok(())
}

fn content_rule(value: &str, _: &()) -> garde::Result {
    let length = value.chars().count();
    if length < MIN_CONTENT_CHARS {
        return Err(garde::Error::new(CONTENT_TOO_SHORT));
    }
    if length > MAX_CONTENT_CHARS {
        return Err(garde::Error::new(CONTENT_TOO_LONG));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

/// Field level problems in the order the form shows its fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    fn push<F: ToString, M: ToString>(&mut self, field: F, message: M) {
        self.0.push(Violation {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// Messages reported against `field`, first one first.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0.iter()
            .filter(move |violation| violation.field == field)
            .map(|violation| violation.message.as_str())
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|violation| violation.field == field)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, violation) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", violation.field, violation.message)?;
        }
        Ok(())
    }
}

impl ::std::error::Error for Violations {}

fn check_files(files: &[Attachment], violations: &mut Violations) {
    if files.iter().any(|file| file.size_bytes() > MAX_FILE_SIZE) {
        violations.push(FIELD_FILE, FILE_TOO_LARGE);
    }
    if files.iter().any(|file| !file.is_accepted_type()) {
        violations.push(FIELD_FILE, FILE_TYPE);
    }
}

// Every rule runs, a failing field never hides problems in the others
pub fn validate(values: FormValues) -> Result<Submission, Violations> {
    let mut violations = Violations::default();
    if let Err(report) = values.validate(&()) {
        let mut errors = report.iter()
            .map(|(path, error)| (path.to_string(), error.to_string()))
            .collect::<Vec<_>>();
        errors.sort_by_key(|(field, _)| TEXT_FIELDS.iter().position(|name| *name == field.as_str()));
        for (field, message) in errors {
            violations.push(field, message);
        }
    }

    let FormValues { username, email, subject, content, file } = values;
    let attachment = match <[Attachment; 1]>::try_from(file) {
        Ok([attachment]) => {
            check_files(::std::slice::from_ref(&attachment), &mut violations);
            Some(attachment)
        },
        Err(files) => {
            violations.push(FIELD_FILE, FILE_COUNT);
            check_files(&files, &mut violations);
            None
        },
    };

    match attachment {
        Some(attachment) if violations.is_empty() => Ok(Submission {
            sender_name: username,
            sender_email: email,
            subject,
            body: content,
            attachment,
        }),
        _ => Err(violations),
    }
}

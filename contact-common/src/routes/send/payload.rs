use ::std::fmt;
use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart,
    },
    http::StatusCode,
};
use contact_types::Api::{FIELD_CONTENT, FIELD_EMAIL, FIELD_FILE, FIELD_SUBJECT, FIELD_USERNAME};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("File blob is required.")]
    MissingAttachment,
    #[error("Invalid form data: `{0}` is missing or has the wrong type")]
    InvalidFieldType(&'static str),
    #[error("Invalid form data: {0}")]
    Malformed(#[from] MultipartError),
}

impl DecodeError {
    // A body cut off by the request limit is a 413, not a client mistake in the form
    pub fn status(&self) -> StatusCode {
        match self {
            DecodeError::Malformed(err) => err.status(),
            DecodeError::MissingAttachment | DecodeError::InvalidFieldType(_) => StatusCode::BAD_REQUEST,
        }
    }
}

pub struct FileBlob {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for FileBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBlob")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Body of `POST /api/send` once every part has the type it should.
#[derive(Debug)]
pub struct SendPayload {
    pub username: String,
    pub email: String,
    pub subject: String,
    pub content: String,
    pub file: FileBlob,
}

enum Part<T> {
    Absent,
    Present(T),
    WrongType,
}

impl<T> Part<T> {
    fn is_absent(&self) -> bool {
        matches!(self, Part::Absent)
    }

    fn into_value(self, name: &'static str) -> Result<T, DecodeError> {
        match self {
            Part::Present(value) => Ok(value),
            Part::Absent | Part::WrongType => Err(DecodeError::InvalidFieldType(name)),
        }
    }
}

async fn read_text(field: Field<'_>) -> Result<Part<String>, DecodeError> {
    if field.file_name().is_some() {
        return Ok(Part::WrongType);
    }
    Ok(Part::Present(field.text().await?))
}

async fn read_file(field: Field<'_>) -> Result<Part<FileBlob>, DecodeError> {
    let filename = field.file_name().map(str::to_owned);
    let content_type = field.content_type().map(str::to_owned);
    let bytes = field.bytes().await?.to_vec();
    // Browsers send an empty part with an empty filename when no file was picked
    if bytes.is_empty() && filename.as_deref().unwrap_or_default().is_empty() {
        return Ok(Part::Absent);
    }
    let Some(filename) = filename else {
        return Ok(Part::WrongType);
    };
    Ok(Part::Present(FileBlob {
        filename,
        content_type,
        bytes,
    }))
}

impl SendPayload {
    // Reads every part first, so a missing file is reported before any text field problem.
    // Unknown parts are skipped and only the first occurrence of each name counts.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, DecodeError> {
        let mut username = Part::Absent;
        let mut email = Part::Absent;
        let mut subject = Part::Absent;
        let mut content = Part::Absent;
        let mut file = Part::Absent;

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let slot = match name.as_str() {
                FIELD_USERNAME => &mut username,
                FIELD_EMAIL => &mut email,
                FIELD_SUBJECT => &mut subject,
                FIELD_CONTENT => &mut content,
                FIELD_FILE => {
                    if file.is_absent() {
                        file = read_file(field).await?;
                    }
                    continue;
                },
                _ => continue,
            };
            if slot.is_absent() {
                *slot = read_text(field).await?;
            }
        }

        let file = match file {
            Part::Present(file) => file,
            Part::Absent => return Err(DecodeError::MissingAttachment),
            Part::WrongType => return Err(DecodeError::InvalidFieldType(FIELD_FILE)),
        };

        Ok(SendPayload {
            username: username.into_value(FIELD_USERNAME)?,
            email: email.into_value(FIELD_EMAIL)?,
            subject: subject.into_value(FIELD_SUBJECT)?,
            content: content.into_value(FIELD_CONTENT)?,
            file,
        })
    }
}

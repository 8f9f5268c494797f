mod schema;

#[allow(non_snake_case)]
pub mod Schema {
    pub use crate::schema::*;
}

#[allow(non_snake_case)]
pub mod Contact {
    use ::std::fmt;

    pub const ACCEPTED_IMAGE_TYPES: [&'static str; 4] = [
        "image/jpeg",
        "image/jpg",
        "image/png",
        "image/webp",
    ];
    pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

    #[derive(Clone, PartialEq, Eq)]
    pub struct Attachment {
        pub filename: String,
        pub mime_type: String,
        pub bytes: Vec<u8>,
    }

    impl Attachment {
        pub fn new<F: Into<String>, M: Into<String>>(filename: F, mime_type: M, bytes: Vec<u8>) -> Self {
            Attachment {
                filename: filename.into(),
                mime_type: mime_type.into(),
                bytes,
            }
        }

        pub fn size_bytes(&self) -> usize {
            self.bytes.len()
        }

        pub fn is_accepted_type(&self) -> bool {
            ACCEPTED_IMAGE_TYPES.iter().any(|accepted| accepted.eq_ignore_ascii_case(&self.mime_type))
        }
    }

    // Attachments can be several megabytes, keep them out of logs
    impl fmt::Debug for Attachment {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Attachment")
                .field("filename", &self.filename)
                .field("mime_type", &self.mime_type)
                .field("size_bytes", &self.bytes.len())
                .finish()
        }
    }

    /// A contact submission that passed every rule in [`crate::Schema`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Submission {
        pub sender_name: String,
        pub sender_email: String,
        pub subject: String,
        pub body: String,
        pub attachment: Attachment,
    }
}

#[allow(non_snake_case)]
pub mod Api {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    pub const SEND_PATH: &'static str = "/api/send";

    pub const FIELD_USERNAME: &'static str = "username";
    pub const FIELD_EMAIL: &'static str = "email";
    pub const FIELD_SUBJECT: &'static str = "subject";
    pub const FIELD_CONTENT: &'static str = "content";
    pub const FIELD_FILE: &'static str = "file";

    /// Response body of `POST /api/send`, serialized as `{ "data": .. }` or `{ "error": .. }`.
    #[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
    #[serde(rename_all = "lowercase")]
    pub enum Envelope {
        Data(Value),
        Error(Value),
    }

    impl Envelope {
        pub fn error<E: ToString>(message: E) -> Self {
            Envelope::Error(Value::String(message.to_string()))
        }

        pub fn is_error(&self) -> bool {
            matches!(self, Envelope::Error(_))
        }
    }
}

#[allow(non_snake_case)]
pub mod Mail {
    use serde::{Deserialize, Serialize};
    use derive_builder::Builder;

    #[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
    pub struct MailAttachment {
        pub filename: String,
        // base64 encoded
        pub content: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        pub content_type: Option<String>,
    }

    #[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Builder)]
    #[builder(setter(into))]
    pub struct SendEmail {
        pub from: String,
        pub to: Vec<String>,
        pub subject: String,
        pub html: String,
        pub text: String,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        #[builder(default)]
        pub attachments: Vec<MailAttachment>,
    }
}

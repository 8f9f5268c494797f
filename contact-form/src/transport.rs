use ::std::io;
use ::std::path::Path;
use reqwest::multipart::{Form, Part};
use contact_types::{
    Api::{FIELD_CONTENT, FIELD_EMAIL, FIELD_FILE, FIELD_SUBJECT, FIELD_USERNAME},
    Contact::{Attachment, Submission},
};

/// Turns a validated submission into the multipart body `POST /api/send` expects.
/// Text goes out as is, the attachment keeps its filename and MIME type.
pub fn encode(submission: Submission) -> Result<Form, reqwest::Error> {
    let Submission { sender_name, sender_email, subject, body, attachment } = submission;
    let Attachment { filename, mime_type, bytes } = attachment;
    let file = Part::bytes(bytes)
        .file_name(filename)
        .mime_str(&mime_type)?;

    Ok(Form::new()
        .text(FIELD_USERNAME, sender_name)
        .text(FIELD_EMAIL, sender_email)
        .text(FIELD_SUBJECT, subject)
        .text(FIELD_CONTENT, body)
        .part(FIELD_FILE, file))
}

// MIME type comes from the extension, the same way a browser fills in `File.type`
pub async fn read_attachment<P: AsRef<Path>>(path: P) -> io::Result<Attachment> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let filename = path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime_type = mime_guess::from_path(path).first_or_octet_stream();
    Ok(Attachment::new(filename, mime_type.essence_str(), bytes))
}

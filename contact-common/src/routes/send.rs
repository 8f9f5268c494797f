use axum::{
    extract::{
        multipart::MultipartRejection,
        Multipart,
        State,
    },
    http::StatusCode,
    Json,
};
use contact_types::{
    Api::Envelope,
    Mail::SendEmailBuilder,
};

use crate::{
    Response::{ServerResponse, internal_server_error, status_response},
    State::AppState,
    Email::{self, MailError, Template},
};

mod payload;
pub use payload::{DecodeError, FileBlob, SendPayload};

// POST /api/send API endpoint
// Body must be multipart/form-data, with parts:
//      username, email, subject, content  [text]
//      file                               [a single file]
//
// 1. Decode the multipart body into SendPayload, only part types are checked here,
//    the field rules already ran in the form
// 2. Render the email and attach the uploaded file
// 3. Send it once to the configured recipient through the mail provider
//
// Responds with { data } holding the provider's answer, or { error }
#[tracing::instrument(skip(appstate, multipart), fields(request="/api/send"))]
pub async fn request(State(appstate): State<AppState>, multipart: Result<Multipart, MultipartRejection>) -> Result<Json<Envelope>, ServerResponse> {
    let multipart = multipart.map_err(|err| {
        tracing::info!("Rejected body that is not multipart, {err}");
        status_response(StatusCode::BAD_REQUEST, err)
    })?;
    let payload = SendPayload::from_multipart(multipart).await.map_err(|err| {
        tracing::info!("Decode failed with reason: {err}");
        status_response(err.status(), err)
    })?;
    tracing::info!("Forwarding {} ({} bytes) from {}", payload.file.filename, payload.file.bytes.len(), payload.email);

    let template = Template {
        username: &payload.username,
        email: &payload.email,
        content: &payload.content,
    };
    let email = SendEmailBuilder::default()
        .from(appstate.mailer.sender())
        .to(vec![appstate.recipient.clone()])
        .subject(payload.subject.as_str())
        .html(template.html())
        .text(template.text())
        .attachments(vec![Email::attachment(&payload.file)])
        .build()
        .map_err(|err| {
            tracing::error!("Failed to build email, {err}");
            internal_server_error("Internal Server Error")
        })?;

    match appstate.mailer.send(&email).await {
        Ok(data) => Ok(Json(Envelope::Data(data))),
        Err(MailError::Rejected { status, payload }) => {
            tracing::error!("Mail provider rejected the email with status {status}: {payload}");
            Err((StatusCode::BAD_GATEWAY, Json(Envelope::Error(payload))))
        },
        Err(err @ MailError::Transport(_)) => {
            tracing::error!("{err}");
            Err(status_response(StatusCode::BAD_GATEWAY, "Failed to reach mail provider"))
        },
    }
}

// CORS preflight, headers are added by the middleware
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

use ::std::sync::atomic::{AtomicBool, Ordering};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use contact_types::{
    Api::{Envelope, SEND_PATH},
    Contact::Submission,
    Schema::{self, FormValues, Violations},
};

use crate::Transport;

pub const DEFAULT_BASE_URL: &'static str = "http://localhost:3000";

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Validation failed: {0}")]
    Invalid(Violations),
    #[error("A submission is already in flight")]
    InFlight,
    #[error("Failed to encode submission, {0}")]
    Encode(#[source] reqwest::Error),
    #[error("Failed to reach the contact endpoint, {0}")]
    Network(#[source] reqwest::Error),
    #[error("Contact endpoint answered with status {status}: {error}")]
    Rejected {
        status: StatusCode,
        error: Value,
    },
}

/// Emitted once per dispatched submission, the form shows these as toasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Sent,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Submitting,
}

// Puts the form back to idle however the request ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Client side of the contact form: gates values through the schema and allows one request
/// in flight at a time.
pub struct ContactForm {
    http_client: Client,
    endpoint: String,
    submitting: AtomicBool,
    notifications: Option<UnboundedSender<Notification>>,
}

impl ContactForm {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http_client: Client, base_url: &str) -> Self {
        ContactForm {
            http_client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), SEND_PATH),
            submitting: AtomicBool::new(false),
            notifications: None,
        }
    }

    pub fn from_env() -> Self {
        let base_url = dotenvy::var("PUBLIC_BASE_URL").unwrap_or(DEFAULT_BASE_URL.to_owned());
        Self::new(&base_url)
    }

    pub fn with_notifications(mut self, notifications: UnboundedSender<Notification>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> FormState {
        match self.submitting.load(Ordering::Acquire) {
            true => FormState::Submitting,
            false => FormState::Idle,
        }
    }

    // The submit button is disabled while this is true
    pub fn is_submitting(&self) -> bool {
        self.state() == FormState::Submitting
    }

    fn begin(&self) -> Result<InFlight<'_>, SubmitError> {
        self.submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(&self.submitting))
            .map_err(|_| SubmitError::InFlight)
    }

    #[tracing::instrument(skip(self, values), fields(endpoint=%self.endpoint))]
    pub async fn submit(&self, values: FormValues) -> Result<Value, SubmitError> {
        if self.is_submitting() {
            tracing::warn!("Ignored submit while another submission is in flight");
            return Err(SubmitError::InFlight);
        }
        let submission = Schema::validate(values).map_err(|violations| {
            tracing::info!("Validation failed with reason: {violations}");
            SubmitError::Invalid(violations)
        })?;

        let _in_flight = self.begin()?;
        let result = self.dispatch(submission).await;
        self.notify(&result);
        result
    }

    async fn dispatch(&self, submission: Submission) -> Result<Value, SubmitError> {
        let form = Transport::encode(submission).map_err(SubmitError::Encode)?;
        let response = self.http_client.post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(SubmitError::Network)?;
        let status = response.status();
        let body = response.bytes().await.map_err(SubmitError::Network)?;
        // Anything in front of the endpoint (proxy, body limit) may answer without an envelope
        let envelope = serde_json::from_slice::<Envelope>(&body)
            .unwrap_or_else(|_| Envelope::Error(Value::String(String::from_utf8_lossy(&body).into_owned())));

        match (status.is_success(), envelope) {
            (true, Envelope::Data(data)) => Ok(data),
            (_, Envelope::Error(error)) | (false, Envelope::Data(error)) => {
                tracing::error!("Contact endpoint answered {status}: {error}");
                Err(SubmitError::Rejected { status, error })
            },
        }
    }

    fn notify(&self, result: &Result<Value, SubmitError>) {
        let Some(notifications) = &self.notifications else {
            return;
        };
        let notification = match result {
            Ok(_) => Notification::Sent,
            Err(err) => Notification::Failed(err.to_string()),
        };
        // Nobody listening is fine
        let _ = notifications.send(notification);
    }
}

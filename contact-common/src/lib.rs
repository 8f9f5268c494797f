pub type E = Box<dyn ::std::error::Error + Send + Sync + 'static>;

mod routes;
mod middleware;

#[allow(non_snake_case)]
pub mod Routes {
    pub use crate::routes::*;
}

#[allow(non_snake_case)]
pub mod Middleware {
    pub use crate::middleware::*;
}

#[allow(non_snake_case)]
pub mod Response {
    use axum::{http::StatusCode, Json};
    use contact_types::Api::Envelope;

    pub type ServerResponse = (StatusCode, Json<Envelope>);

    pub fn status_response<E: ToString>(status: StatusCode, error: E) -> ServerResponse {
        (status, Json(Envelope::error(error)))
    }

    pub fn internal_server_error<E: ToString>(err: E) -> ServerResponse {
        status_response(StatusCode::INTERNAL_SERVER_ERROR, err)
    }
}

#[allow(non_snake_case)]
pub mod Email {
    use base64::prelude::*;
    use reqwest::Client;
    use serde_json::Value;
    use contact_types::Mail::{MailAttachment, SendEmail};

    use crate::Routes::send::FileBlob;

    #[derive(Debug, thiserror::Error)]
    pub enum MailError {
        #[error("Mail provider answered with status {status}")]
        Rejected {
            status: u16,
            payload: Value,
        },
        #[error("Failed to reach mail provider, {0}")]
        Transport(#[from] reqwest::Error),
    }

    /// Client for the transactional email API. One instance lives in the app state for the
    /// whole process, it keeps no state between sends.
    pub struct Mailer {
        http_client: Client,
        endpoint: String,
        api_key: String,
        sender: String,
    }

    impl Mailer {
        pub fn new<K: Into<String>, S: Into<String>>(http_client: Client, base_url: &str, api_key: K, sender: S) -> Self {
            Mailer {
                http_client,
                endpoint: format!("{}/emails", base_url.trim_end_matches('/')),
                api_key: api_key.into(),
                sender: sender.into(),
            }
        }

        pub fn sender(&self) -> &str {
            &self.sender
        }

        // One attempt only, whatever the provider says is handed back to the caller
        #[tracing::instrument(skip(self, email), fields(subject=%email.subject))]
        pub async fn send(&self, email: &SendEmail) -> Result<Value, MailError> {
            let response = self.http_client.post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(email)
                .send()
                .await?;
            let status = response.status();
            let body = response.bytes().await?;
            let payload = match serde_json::from_slice::<Value>(&body) {
                Ok(payload) => payload,
                Err(_) => Value::String(String::from_utf8_lossy(&body).into_owned()),
            };
            if !status.is_success() {
                return Err(MailError::Rejected {
                    status: status.as_u16(),
                    payload,
                });
            }
            Ok(payload)
        }
    }

    pub fn attachment(file: &FileBlob) -> MailAttachment {
        MailAttachment {
            filename: file.filename.clone(),
            content: BASE64_STANDARD.encode(&file.bytes),
            content_type: file.content_type.clone(),
        }
    }

    // Body of the email the site owner receives
    pub struct Template<'a> {
        pub username: &'a str,
        pub email: &'a str,
        pub content: &'a str,
    }

    impl<'a> Template<'a> {
        pub fn html(&self) -> String {
            format!(
                "<div><h1>こんにちは, {}です。</h1><p>{}から届きました。</p><p>{}</p></div>",
                ammonia::clean_text(self.username),
                ammonia::clean_text(self.email),
                ammonia::clean_text(self.content),
            )
        }

        pub fn text(&self) -> String {
            format!("こんにちは, {}です。\n{}から届きました。\n\n{}\n", self.username, self.email, self.content)
        }
    }
}

#[allow(non_snake_case)]
pub mod State {
    use ::std::sync::Arc;
    use reqwest::Client;
    use crate::Email::Mailer;
    use crate::Constants::*;

    pub struct InternalAppState {
        pub mailer: Mailer,
        // Where every submission goes, never taken from the request
        pub recipient: String,
        pub origin_url: String,
    }
    pub type AppState = Arc<InternalAppState>;

    pub fn make_state() -> Result<AppState, crate::E> {
        tracing::info!("Setting up mail client for {}", &*MAIL_API_URL);
        let api_key = required_var("MAIL_API_KEY")?;
        let recipient = required_var("CONTACT_RECIPIENT")?;
        let mailer = Mailer::new(Client::new(), &MAIL_API_URL, api_key, MAIL_SENDER.as_str());

        // Create AppState
        tracing::info!("Creating AppState");
        Ok(Arc::new(InternalAppState {
            mailer,
            recipient,
            origin_url: ORIGIN_URL.clone(),
        }))
    }

    fn required_var(name: &str) -> Result<String, crate::E> {
        dotenvy::var(name).map_err(|err| format!("No environment variable for {name}, {err}").into())
    }
}

#[allow(non_snake_case)]
pub mod App {
    use axum::{
        extract::DefaultBodyLimit,
        middleware as axum_middleware,
        routing,
        Router,
    };
    use contact_types::Api::SEND_PATH;

    use crate::{Constants, Middleware, Routes, State::AppState};

    pub fn router(appstate: AppState) -> Router {
        Router::new()
            .route(SEND_PATH, routing::post(Routes::send::request).options(Routes::send::preflight))
            .layer(DefaultBodyLimit::max(*Constants::MAX_REQUEST_BYTES))
            .route_layer(axum_middleware::from_fn_with_state(appstate.clone(), Middleware::set_cors_headers::middleware))
            .with_state(appstate)
    }
}

#[allow(non_snake_case)]
pub mod Constants {
    use lazy_static::lazy_static;

    // Room for a 5 MiB image plus the text parts and multipart framing
    pub const DEFAULT_MAX_REQUEST_BYTES: usize = 6 * 1024 * 1024 + 64 * 1024;

    // WARNING: These are global variables that get
    // initialised on first use, and should not
    // be written to after
    lazy_static!{
        pub static ref MAIL_API_URL: String = {
            dotenvy::var("MAIL_API_URL").unwrap_or("https://api.resend.com".to_owned())
        };
        pub static ref MAIL_SENDER: String = {
            dotenvy::var("MAIL_SENDER").unwrap_or("onboarding@resend.dev".to_owned())
        };
        pub static ref ORIGIN_URL: String = {
            dotenvy::var("ORIGIN_URL").unwrap_or("*".to_owned())
        };
        pub static ref BIND_ADDRESS: String = {
            dotenvy::var("BIND_ADDRESS").unwrap_or("127.0.0.1:3000".to_owned())
        };
        pub static ref MAX_REQUEST_BYTES: usize = {
            let maybe = dotenvy::var("MAX_REQUEST_BYTES");
            let mut bytes = DEFAULT_MAX_REQUEST_BYTES;
            match maybe {
                Ok(value) => {
                    if let Ok(new_bytes) = value.parse() {
                        bytes = new_bytes;
                        tracing::info!("Using custom MAX_REQUEST_BYTES: {bytes}");
                    } else {
                        tracing::info!("Failed to parse MAX_REQUEST_BYTES, using default, {bytes}");
                    }
                }
                _ => ()
            }
            bytes
        };
    }
}

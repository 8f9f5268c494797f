use ::std::net::TcpListener;
use ::std::sync::Arc;
use base64::prelude::*;
use contact_common::{App, Email::Mailer, State::InternalAppState};
use contact_types::Api::Envelope;
use mockito::{Matcher, Server};
use reqwest::{
    multipart::{Form, Part},
    StatusCode,
};
use serde_json::json;

const API_KEY: &'static str = "re_test_key";
const RECIPIENT: &'static str = "owner@example.com";
const ORIGIN: &'static str = "https://contact.example.com";

fn spawn_app(provider_url: &str) -> String {
    let appstate = Arc::new(InternalAppState {
        mailer: Mailer::new(reqwest::Client::new(), provider_url, API_KEY, "onboarding@resend.dev"),
        recipient: RECIPIENT.to_string(),
        origin_url: ORIGIN.to_string(),
    });
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(App::router(appstate).into_make_service());
    tokio::spawn(server);
    format!("http://{address}/api/send")
}

fn png() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    bytes.resize(1024, 0);
    bytes
}

fn text_form() -> Form {
    Form::new()
        .text("username", "田中")
        .text("email", "tanaka@example.com")
        .text("subject", "お問い合わせ")
        .text("content", "これはテスト本文です。")
}

fn full_form() -> Form {
    let file = Part::bytes(png()).file_name("photo.png").mime_str("image/png").unwrap();
    text_form().part("file", file)
}

#[tokio::test]
async fn forwards_submission_and_returns_provider_data() {
    let mut provider = Server::new_async().await;
    let mock = provider.mock("POST", "/emails")
        .match_header("authorization", format!("Bearer {API_KEY}").as_str())
        .match_body(Matcher::PartialJson(json!({
            "from": "onboarding@resend.dev",
            "to": [RECIPIENT],
            "subject": "お問い合わせ",
            "attachments": [{
                "filename": "photo.png",
                "content": BASE64_STANDARD.encode(png()),
                "content_type": "image/png",
            }],
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"49a3999c-0ce1-4ea6-ab68-afcd6dc2e794"}"#)
        .expect(1)
        .create_async()
        .await;
    let endpoint = spawn_app(&provider.url());

    let response = reqwest::Client::new().post(&endpoint).multipart(full_form()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], ORIGIN);
    let envelope = response.json::<Envelope>().await.unwrap();
    assert_eq!(envelope, Envelope::Data(json!({ "id": "49a3999c-0ce1-4ea6-ab68-afcd6dc2e794" })));
    mock.assert_async().await;
}

#[tokio::test]
async fn missing_file_is_a_bad_request() {
    let mut provider = Server::new_async().await;
    let mock = provider.mock("POST", "/emails").expect(0).create_async().await;
    let endpoint = spawn_app(&provider.url());

    let response = reqwest::Client::new().post(&endpoint).multipart(text_form()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body, json!({ "error": "File blob is required." }));
    mock.assert_async().await;
}

#[tokio::test]
async fn text_field_with_wrong_type_is_a_bad_request() {
    let mut provider = Server::new_async().await;
    let mock = provider.mock("POST", "/emails").expect(0).create_async().await;
    let endpoint = spawn_app(&provider.url());

    let file = Part::bytes(png()).file_name("photo.png").mime_str("image/png").unwrap();
    let form = Form::new()
        .part("username", Part::bytes(b"abc".to_vec()).file_name("name.txt"))
        .text("email", "tanaka@example.com")
        .text("subject", "お問い合わせ")
        .text("content", "これはテスト本文です。")
        .part("file", file);
    let response = reqwest::Client::new().post(&endpoint).multipart(form).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let Envelope::Error(error) = response.json::<Envelope>().await.unwrap() else {
        panic!("expected an error envelope");
    };
    assert!(error.as_str().unwrap().starts_with("Invalid form data"));
    mock.assert_async().await;
}

#[tokio::test]
async fn body_that_is_not_multipart_is_a_bad_request() {
    let provider = Server::new_async().await;
    let endpoint = spawn_app(&provider.url());

    let response = reqwest::Client::new()
        .post(&endpoint)
        .json(&json!({ "username": "田中" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.json::<Envelope>().await.unwrap().is_error());
}

#[tokio::test]
async fn provider_error_is_passed_through_as_bad_gateway() {
    let mut provider = Server::new_async().await;
    let provider_error = json!({
        "statusCode": 422,
        "name": "validation_error",
        "message": "Invalid `to` field.",
    });
    let mock = provider.mock("POST", "/emails")
        .with_status(422)
        .with_header("content-type", "application/json")
        .with_body(provider_error.to_string())
        .expect(1)
        .create_async()
        .await;
    let endpoint = spawn_app(&provider.url());

    let response = reqwest::Client::new().post(&endpoint).multipart(full_form()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Envelope>().await.unwrap(), Envelope::Error(provider_error));
    mock.assert_async().await;
}

#[tokio::test]
async fn provider_error_that_is_not_json_is_passed_through_as_text() {
    let mut provider = Server::new_async().await;
    let mock = provider.mock("POST", "/emails")
        .with_status(500)
        .with_body("upstream exploded")
        .expect(1)
        .create_async()
        .await;
    let endpoint = spawn_app(&provider.url());

    let response = reqwest::Client::new().post(&endpoint).multipart(full_form()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Envelope>().await.unwrap(), Envelope::Error(json!("upstream exploded")));
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_provider_is_a_bad_gateway() {
    // Nothing listens on the discard port
    let endpoint = spawn_app("http://127.0.0.1:9");

    let response = reqwest::Client::new().post(&endpoint).multipart(full_form()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Envelope>().await.unwrap(), Envelope::error("Failed to reach mail provider"));
}

#[tokio::test]
async fn identical_submissions_are_sent_twice() {
    let mut provider = Server::new_async().await;
    let mock = provider.mock("POST", "/emails")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"a"}"#)
        .expect(2)
        .create_async()
        .await;
    let endpoint = spawn_app(&provider.url());

    let client = reqwest::Client::new();
    for _ in 0..2 {
        let response = client.post(&endpoint).multipart(full_form()).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn preflight_carries_cors_headers() {
    let provider = Server::new_async().await;
    let endpoint = spawn_app(&provider.url());

    let response = reqwest::Client::new().request(reqwest::Method::OPTIONS, &endpoint).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], ORIGIN);
    assert_eq!(headers["access-control-allow-methods"], "POST,OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "content-type");
}

use ::std::net::SocketAddr;
use lambda_web::{is_running_on_lambda, run_hyper_on_lambda};

#[tokio::main]
async fn main() -> Result<(), contact_common::E> {
    ::std::env::set_var("AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH", "true");

    tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_target(false)
            .without_time()
            .init();

    let appstate = contact_common::State::make_state()?;
    let router = contact_common::App::router(appstate);

    if is_running_on_lambda() {
        return run_hyper_on_lambda(router).await;
    }

    // Local development, serve the same router over plain HTTP
    let address: SocketAddr = contact_common::Constants::BIND_ADDRESS.parse()?;
    tracing::info!("Listening on http://{address}");
    axum::Server::bind(&address)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

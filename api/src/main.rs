use axum::http::{HeaderValue, Method, header};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{EnvFilter, fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt};

use dropreel::{AppState, build_app, config::Config};

fn init_tracing() {
    let console_fmt = tracing_subscriber::fmt::layer()
        .event_format(Format::default().compact().with_target(false));
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dropreel=debug,tower_http=info".into()),
        )
        .with(console_fmt)
        .init();
}

fn setup_cors(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    match config.app_base_url.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(url = %config.app_base_url, "APP_BASE_URL is not a valid origin, CORS disabled");
            cors
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().unwrap_or_else(|e| panic!("Invalid configuration: {}", e));
    let port = config.port;
    let cors = setup_cors(&config);

    let state = Arc::new(
        AppState::new(config)
            .await
            .unwrap_or_else(|e| panic!("Failed to initialize application state: {}", e)),
    );

    let app = build_app(state).layer(cors);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", addr, e));

    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await.expect("Server failed");
}

//! Vault API stand-in server
//!
//! Point the onboarding form at it with `VAULT_API_URL=http://localhost:4001`.

use std::{env, net::SocketAddr};

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vault_mock_api::{serve, AppState, KNOWN_CORPORATION_NUMBERS};

#[tokio::main]
async fn main() {
    // Load environment variables first so .env RUST_LOG is available to tracing
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();

    let api_port = env::var("MOCK_API_PORT")
        .unwrap_or_else(|_| "4001".to_string())
        .parse::<u16>()
        .expect("MOCK_API_PORT must be a valid port number");

    // Comma-separated override of the accepted corporation numbers
    let state = match env::var("VALID_CORPORATION_NUMBERS") {
        Ok(list) => {
            let numbers: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect();
            info!("Accepting {} configured corporation numbers", numbers.len());
            AppState::new(numbers)
        }
        Err(_) => {
            info!(
                "VALID_CORPORATION_NUMBERS not set, accepting the {} known numbers",
                KNOWN_CORPORATION_NUMBERS.len()
            );
            AppState::with_known_numbers()
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], api_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to port");

    info!("Vault mock API running on {}", addr);

    serve(listener, state).await.expect("Server error");
}

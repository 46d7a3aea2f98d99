//! Onboarding form command line front end
//!
//! Reads one JSON document of form values from stdin, validates and submits
//! it to the Vault API, and writes the outcome as JSON to stdout. Logs go to
//! stderr.

use std::process::ExitCode;

use onboarding_form::validate::normalize_phone_input;
use onboarding_form::{
    Config, FieldErrors, FormValues, HttpVaultApi, SubmissionController, SubmitOutcome,
    SUCCESS_MESSAGE,
};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Result of one submission attempt
#[derive(Debug, Serialize)]
struct Output {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl From<SubmitOutcome> for Output {
    fn from(outcome: SubmitOutcome) -> Self {
        let (success, message, errors) = match outcome {
            SubmitOutcome::Succeeded => (true, Some(SUCCESS_MESSAGE.to_string()), None),
            SubmitOutcome::Failed(message) => (false, Some(message), None),
            SubmitOutcome::Invalid(errors) => (false, None, Some(errors)),
            SubmitOutcome::Rejected => {
                (false, Some("A submission is already in progress".to_string()), None)
            }
        };
        Self {
            success,
            message,
            errors,
        }
    }
}

/// Input could not be processed at all
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env first so RUST_LOG from it reaches the filter
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match process().await {
        Ok(output) => {
            let code = if output.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
            print_json(&output);
            code
        }
        Err(e) => {
            print_json(&ErrorResponse {
                success: false,
                error: e.to_string(),
            });
            ExitCode::FAILURE
        }
    }
}

async fn process() -> Result<Output, Box<dyn std::error::Error>> {
    let mut body = Vec::new();
    tokio::io::stdin().read_to_end(&mut body).await?;
    let input: FormValues =
        serde_json::from_slice(&body).map_err(|e| format!("Invalid input JSON: {}", e))?;

    let config = Config::from_env()?;
    info!("Submitting to {}", config.api_url);
    let api = HttpVaultApi::new(&config)?;

    let controller = SubmissionController::new(api).on_success(|confetti| {
        info!(
            "🎉 {} particles, spread {}",
            confetti.particle_count, confetti.spread
        );
    });
    let phone_number = normalize_phone_input(&input.phone_number);
    controller.fill(FormValues {
        phone_number,
        ..input
    });

    Ok(controller.submit().await.into())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

//! Onboarding form core
//!
//! Collects a first name, last name, phone number and corporation number,
//! validates them (structurally, plus a remote corporation-number lookup),
//! and submits the result to the Vault profile-details endpoint.
//!
//! - [`validate`]: structural field rules and input allowances
//! - [`corporation`]: remote corporation-number verification
//! - [`pipeline`]: submit-time validation with stale-result protection
//! - [`controller`]: submission state machine owning the form session
//! - [`api`]: HTTP client for the Vault API

pub mod api;
pub mod config;
pub mod controller;
pub mod corporation;
pub mod pipeline;
pub mod types;
pub mod validate;

pub use api::{ApiError, HttpVaultApi, VaultApi};
pub use config::{Config, ConfigError};
pub use controller::{Confetti, SubmissionController, SubmitOutcome};
pub use corporation::{verify_corporation_number, CorporationCheck};
pub use pipeline::{CheckTicket, ValidationPipeline};
pub use types::*;

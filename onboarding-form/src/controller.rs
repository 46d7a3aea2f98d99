//! Submission controller
//!
//! Owns the form values and the submission state for one form session and
//! drives the `Idle → Submitting → Succeeded | Failed` transitions. Every
//! operation takes `&self` and never holds the session lock across an
//! `.await`, so overlapping calls on one cooperative runtime see each
//! other's state (a second `submit()` while one is outstanding is rejected).

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use crate::api::{ApiError, VaultApi};
use crate::pipeline::{CheckTicket, ValidationPipeline};
use crate::types::{
    Field, FieldErrors, FieldStatus, FormValues, ProfileDetails, SubmissionState,
    ValidationResult, GENERIC_FAILURE_MESSAGE, TRANSPORT_FAILURE_PREFIX,
};
use crate::validate;

/// Parameters for the celebratory effect shown after a successful submit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confetti {
    pub particle_count: u32,
    pub spread: u32,
    pub origin_y: f32,
}

impl Default for Confetti {
    fn default() -> Self {
        Self {
            particle_count: 100,
            spread: 70,
            origin_y: 0.6,
        }
    }
}

type SuccessHook = Box<dyn Fn(&Confetti) + Send + Sync>;

/// Result of one `submit()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Another submission was outstanding; nothing was done
    Rejected,
    /// Validation failed; no submission request was made
    Invalid(FieldErrors),
    Succeeded,
    Failed(String),
}

struct Session {
    values: FormValues,
    state: SubmissionState,
    errors: FieldErrors,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            values: FormValues::default(),
            state: SubmissionState::Idle,
            errors: FieldErrors::new(),
        }
    }
}

pub struct SubmissionController<A> {
    api: A,
    pipeline: ValidationPipeline,
    session: Mutex<Session>,
    on_success: Option<SuccessHook>,
}

impl<A: VaultApi> SubmissionController<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            pipeline: ValidationPipeline::new(),
            session: Mutex::new(Session::default()),
            on_success: None,
        }
    }

    /// Register the side effect fired once per successful submission
    pub fn on_success(mut self, hook: impl Fn(&Confetti) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn values(&self) -> FormValues {
        self.session().values.clone()
    }

    pub fn state(&self) -> SubmissionState {
        self.session().state.clone()
    }

    pub fn field_errors(&self) -> FieldErrors {
        self.session().errors.clone()
    }

    /// Form-level banner text (success or failure message)
    pub fn banner(&self) -> Option<String> {
        self.session().state.banner().map(str::to_string)
    }

    pub fn field_status(&self, field: Field) -> FieldStatus {
        let session = self.session();
        let value = session.values.get(field);
        match field {
            Field::CorporationNumber => self.pipeline.status(value),
            _ => validate::validate_field(field, value).into(),
        }
    }

    /// A keystroke-level edit. Applies the input allowances, re-runs the
    /// field's structural rule, and for the corporation number returns the
    /// ticket for its remote check (see [`Self::revalidate`]).
    pub fn edit(&self, field: Field, typed: &str) -> Option<CheckTicket> {
        let mut session = self.session();
        let value = validate::apply_input_allowance(field, session.values.get(field), typed);
        session.values.set(field, value);
        self.refresh_field(&mut session, field)
    }

    /// Replace all values at once, bypassing the input allowances
    pub fn fill(&self, values: FormValues) -> Option<CheckTicket> {
        let mut session = self.session();
        session.values = values;
        let ticket = self.refresh_field(&mut session, Field::CorporationNumber);
        for field in [Field::FirstName, Field::LastName, Field::PhoneNumber] {
            self.refresh_field(&mut session, field);
        }
        ticket
    }

    fn refresh_field(&self, session: &mut Session, field: Field) -> Option<CheckTicket> {
        let value = session.values.get(field).to_string();
        if field != Field::CorporationNumber {
            session
                .errors
                .record(field, validate::validate_field(field, &value));
            return None;
        }

        let ticket = self.pipeline.supersede(&value);
        let shown = match self.pipeline.status(&value) {
            FieldStatus::Invalid(message) => ValidationResult::Invalid(message),
            FieldStatus::Valid | FieldStatus::Pending => ValidationResult::Valid,
        };
        session.errors.record(field, shown);
        ticket
    }

    /// Run the remote check for an edit. Returns the corporation field's new
    /// status, or `None` if the value was edited again before the answer
    /// arrived (the answer is discarded).
    pub async fn revalidate(&self, ticket: CheckTicket) -> Option<FieldStatus> {
        self.pipeline.check(ticket, &self.api).await?;

        let mut session = self.session();
        let status = self.pipeline.status(&session.values.corporation_number);
        let shown = match &status {
            FieldStatus::Invalid(message) => ValidationResult::invalid(message.clone()),
            FieldStatus::Valid | FieldStatus::Pending => ValidationResult::Valid,
        };
        session.errors.record(Field::CorporationNumber, shown);
        Some(status)
    }

    /// Validate and submit the current values
    pub async fn submit(&self) -> SubmitOutcome {
        let values = {
            let mut session = self.session();
            if session.state.is_submitting() {
                info!("Submission already in progress, ignoring submit");
                return SubmitOutcome::Rejected;
            }
            session.state = SubmissionState::Submitting;
            session.values.clone()
        };
        let mut guard = SubmittingGuard {
            session: &self.session,
            armed: true,
        };

        if let Err(errors) = self.pipeline.validate(&values, &self.api).await {
            info!("Submission blocked by {} invalid field(s)", errors.len());
            let mut session = self.session();
            session.errors = errors.clone();
            session.state = SubmissionState::Idle;
            guard.armed = false;
            return SubmitOutcome::Invalid(errors);
        }
        self.session().errors.clear();

        let profile = ProfileDetails::from(&values);
        let result = self.api.create_profile(&profile).await;

        let outcome = {
            let mut session = self.session();
            guard.armed = false;
            match result {
                Ok(()) => {
                    info!("Profile submitted for {} {}", profile.first_name, profile.last_name);
                    session.state = SubmissionState::Succeeded;
                    session.values = FormValues::default();
                    session.errors.clear();
                    self.pipeline.reset();
                    SubmitOutcome::Succeeded
                }
                Err(e) => {
                    let message = failure_message(e);
                    warn!("Profile submission failed: {}", message);
                    session.state = SubmissionState::Failed(message.clone());
                    SubmitOutcome::Failed(message)
                }
            }
        };

        if outcome == SubmitOutcome::Succeeded {
            if let Some(hook) = &self.on_success {
                hook(&Confetti::default());
            }
        }
        outcome
    }

    /// Clear all values and messages and return to `Idle`. Refused while a
    /// submission is outstanding.
    pub fn reset(&self) -> bool {
        let mut session = self.session();
        if session.state.is_submitting() {
            warn!("Cannot reset while submitting");
            return false;
        }
        *session = Session::default();
        self.pipeline.reset();
        true
    }
}

fn failure_message(err: ApiError) -> String {
    match err {
        ApiError::Rejected { message, .. } => {
            message.unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
        }
        other => format!("{} {}", TRANSPORT_FAILURE_PREFIX, other),
    }
}

/// Puts the session back to `Idle` if a submit future is dropped while
/// `Submitting`
struct SubmittingGuard<'a> {
    session: &'a Mutex<Session>,
    armed: bool,
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.state.is_submitting() {
            session.state = SubmissionState::Idle;
        }
    }
}

//! Submit-time validation of the whole form
//!
//! Structural rules run synchronously for all four fields. The corporation
//! number additionally needs a remote check; those checks are tagged with a
//! generation so that a result for a value the user has since edited away
//! is never applied (last value wins, not last response).

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::api::VaultApi;
use crate::corporation::{verify_corporation_number, CorporationCheck};
use crate::types::{Field, FieldErrors, FieldStatus, FormValues, ValidationResult};
use crate::validate::{self, INVALID_CORPORATION_NUMBER};

/// Permission to run the remote check for one corporation-number edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckTicket {
    generation: u64,
    value: String,
}

impl CheckTicket {
    pub fn value(&self) -> &str {
        &self.value
    }
}

type CheckReceiver = watch::Receiver<Option<CorporationCheck>>;

#[derive(Default)]
struct Tracker {
    /// Bumped whenever the corporation number changes
    generation: u64,
    /// Value the current generation belongs to
    value: String,
    /// Outstanding remote check for `value`
    in_flight: Option<CheckReceiver>,
    /// Last applied outcome for `value`
    resolved: Option<CorporationCheck>,
}

impl Tracker {
    fn supersede(&mut self, value: &str) -> Option<CheckTicket> {
        if self.value == value {
            let settled = self
                .resolved
                .as_ref()
                .is_some_and(CorporationCheck::is_definitive);
            if settled || self.outstanding().is_some() {
                return None;
            }
        }
        self.issue(value)
    }

    /// The in-flight check, unless its future was dropped before answering
    fn outstanding(&self) -> Option<&CheckReceiver> {
        self.in_flight
            .as_ref()
            .filter(|rx| rx.has_changed().is_ok() || rx.borrow().is_some())
    }

    /// Start a new generation for `value` unconditionally
    fn issue(&mut self, value: &str) -> Option<CheckTicket> {
        self.generation += 1;
        self.value = value.to_string();
        self.in_flight = None;
        self.resolved = None;

        validate::is_corporation_number_shape(value).then(|| CheckTicket {
            generation: self.generation,
            value: value.to_string(),
        })
    }
}

#[derive(Default)]
pub struct ValidationPipeline {
    tracker: Mutex<Tracker>,
}

impl ValidationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn tracker(&self) -> MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every structural failure across the four fields
    pub fn structural(values: &FormValues) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for field in Field::ALL {
            errors.record(field, validate::validate_field(field, values.get(field)));
        }
        errors
    }

    /// Note a new corporation-number value. Any check for an older value
    /// becomes stale. Returns a ticket when the new value needs a remote
    /// check; none is issued for malformed values, or when the same value is
    /// already settled or being checked.
    pub fn supersede(&self, value: &str) -> Option<CheckTicket> {
        self.tracker().supersede(value)
    }

    /// Forget everything, invalidating outstanding tickets
    pub fn reset(&self) {
        let mut tracker = self.tracker();
        let generation = tracker.generation + 1;
        *tracker = Tracker {
            generation,
            ..Tracker::default()
        };
    }

    /// Cached service answer for exactly `value`
    pub fn cached(&self, value: &str) -> Option<CorporationCheck> {
        let tracker = self.tracker();
        if tracker.value != value {
            return None;
        }
        tracker
            .resolved
            .clone()
            .filter(CorporationCheck::is_definitive)
    }

    /// What the corporation-number field shows for `value`
    pub fn status(&self, value: &str) -> FieldStatus {
        if let ValidationResult::Invalid(message) =
            validate::validate_corporation_number_format(value)
        {
            return FieldStatus::Invalid(message);
        }

        let tracker = self.tracker();
        match &tracker.resolved {
            Some(check) if tracker.value == value => check_result(check).into(),
            _ => FieldStatus::Pending,
        }
    }

    /// Run the remote check for `ticket` and apply it if still current.
    ///
    /// Returns `None` when the ticket was superseded, either before the call
    /// (no request is made) or while it was outstanding (result discarded).
    pub async fn check<A>(&self, ticket: CheckTicket, api: &A) -> Option<CorporationCheck>
    where
        A: VaultApi + ?Sized,
    {
        let (check, applied) = self.run(ticket, api).await?;
        applied.then_some(check)
    }

    async fn run<A>(&self, ticket: CheckTicket, api: &A) -> Option<(CorporationCheck, bool)>
    where
        A: VaultApi + ?Sized,
    {
        let (tx, rx) = watch::channel(None);
        {
            let mut tracker = self.tracker();
            if tracker.generation != ticket.generation {
                debug!("Skipping stale check for {}", ticket.value);
                return None;
            }
            tracker.in_flight = Some(rx);
        }

        let check = verify_corporation_number(api, &ticket.value).await;
        let _ = tx.send(Some(check.clone()));

        let mut tracker = self.tracker();
        if tracker.generation != ticket.generation {
            debug!("Discarding result for superseded value {}", ticket.value);
            return Some((check, false));
        }
        tracker.in_flight = None;
        tracker.resolved = Some(check.clone());
        Some((check, true))
    }

    /// Full submit-time validation. Every failing field gets its own message.
    ///
    /// A structurally valid corporation number is checked remotely at most
    /// once: a cached answer or an outstanding check for the same value is
    /// reused.
    pub async fn validate<A>(&self, values: &FormValues, api: &A) -> Result<(), FieldErrors>
    where
        A: VaultApi + ?Sized,
    {
        let mut errors = Self::structural(values);
        let number = values.corporation_number.as_str();

        if errors.get(Field::CorporationNumber).is_none() {
            let check = self.resolve(number, api).await;
            errors.record(Field::CorporationNumber, check_result(&check));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    async fn resolve<A>(&self, number: &str, api: &A) -> CorporationCheck
    where
        A: VaultApi + ?Sized,
    {
        let waiting = {
            let tracker = self.tracker();
            if tracker.value != number {
                None
            } else if let Some(check) = tracker
                .resolved
                .clone()
                .filter(CorporationCheck::is_definitive)
            {
                return check;
            } else {
                tracker.outstanding().cloned()
            }
        };

        if let Some(mut rx) = waiting {
            if let Ok(outcome) = rx.wait_for(Option::is_some).await {
                if let Some(check) = (*outcome).clone() {
                    return check;
                }
            }
            // The outstanding check was dropped before it answered
            debug!("Outstanding check for {} abandoned", number);
        }

        let ticket = self.tracker().issue(number);
        if let Some(ticket) = ticket {
            if let Some((check, _)) = self.run(ticket, api).await {
                return check;
            }
        }
        // The field was edited between `issue` and `run`. The answer is for
        // this submit's snapshot only and is not cached.
        verify_corporation_number(api, number).await
    }
}

fn check_result(check: &CorporationCheck) -> ValidationResult {
    if check.is_valid() {
        ValidationResult::Valid
    } else {
        ValidationResult::invalid(INVALID_CORPORATION_NUMBER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corporation::tests::FakeApi;
    use std::sync::Arc;
    use std::time::Duration;

    fn values(first: &str, last: &str, phone: &str, corp: &str) -> FormValues {
        FormValues {
            first_name: first.into(),
            last_name: last.into(),
            phone_number: phone.into(),
            corporation_number: corp.into(),
        }
    }

    #[tokio::test]
    async fn empty_form_reports_every_field() {
        let api = FakeApi::accepting(&[]);
        let pipeline = ValidationPipeline::new();

        let errors = pipeline
            .validate(&values("", "", "", ""), &api)
            .await
            .unwrap_err();

        assert_eq!(errors.len(), 4);
        assert_eq!(errors.get(Field::FirstName), Some("First name is required"));
        assert_eq!(errors.get(Field::LastName), Some("Last name is required"));
        assert_eq!(errors.get(Field::PhoneNumber), Some("Phone number is required"));
        assert_eq!(
            errors.get(Field::CorporationNumber),
            Some("Corporation number is required")
        );
        assert_eq!(api.check_count(), 0);
    }

    #[tokio::test]
    async fn remote_check_runs_alongside_other_failures() {
        let api = FakeApi::accepting(&[]);
        let pipeline = ValidationPipeline::new();

        let errors = pipeline
            .validate(&values("Devon", "", "+1234567890", "123123123"), &api)
            .await
            .unwrap_err();

        assert_eq!(errors.get(Field::LastName), Some("Last name is required"));
        assert_eq!(
            errors.get(Field::PhoneNumber),
            Some("Please enter a valid Canadian phone number")
        );
        assert_eq!(
            errors.get(Field::CorporationNumber),
            Some("Invalid corporation number")
        );
        assert_eq!(api.check_count(), 1);
    }

    #[tokio::test]
    async fn long_corporation_number_skips_remote_check() {
        let api = FakeApi::accepting(&["826417395"]);
        let pipeline = ValidationPipeline::new();

        let errors = pipeline
            .validate(&values("Devon", "Miller", "+16475317990", "8264173951"), &api)
            .await
            .unwrap_err();

        assert_eq!(
            errors.get(Field::CorporationNumber),
            Some("Corporation number must be 9 digits")
        );
        assert_eq!(api.check_count(), 0);
    }

    #[tokio::test]
    async fn definitive_answers_are_cached_per_value() {
        let api = FakeApi::accepting(&["826417395"]);
        let pipeline = ValidationPipeline::new();
        let form = values("Devon", "Miller", "+16475317990", "826417395");

        assert!(pipeline.validate(&form, &api).await.is_ok());
        assert!(pipeline.validate(&form, &api).await.is_ok());
        assert_eq!(api.check_count(), 1);
        assert_eq!(pipeline.cached("826417395"), Some(CorporationCheck::Verified));
        assert_eq!(pipeline.cached("158739264"), None);
    }

    #[tokio::test]
    async fn transport_failures_are_retried() {
        let api = FakeApi {
            check_failure: Some(crate::api::ApiError::Transport("offline".into())),
            ..FakeApi::accepting(&["826417395"])
        };
        let pipeline = ValidationPipeline::new();
        let form = values("Devon", "Miller", "+16475317990", "826417395");

        for _ in 0..2 {
            let errors = pipeline.validate(&form, &api).await.unwrap_err();
            assert_eq!(
                errors.get(Field::CorporationNumber),
                Some("Invalid corporation number")
            );
        }
        assert_eq!(api.check_count(), 2);
        assert_eq!(pipeline.cached("826417395"), None);
    }

    #[test]
    fn supersede_only_tickets_well_formed_values() {
        let pipeline = ValidationPipeline::new();
        assert!(pipeline.supersede("").is_none());
        assert!(pipeline.supersede("12345").is_none());
        let ticket = pipeline.supersede("826417395").unwrap();
        assert_eq!(ticket.value(), "826417395");
        assert_eq!(pipeline.status("826417395"), FieldStatus::Pending);
        assert_eq!(
            pipeline.status("12345"),
            FieldStatus::Invalid("Corporation number must be 9 digits".into())
        );
    }

    #[tokio::test]
    async fn superseded_ticket_makes_no_request() {
        let api = FakeApi::accepting(&["826417395"]);
        let pipeline = ValidationPipeline::new();

        let stale = pipeline.supersede("111111111").unwrap();
        let current = pipeline.supersede("826417395").unwrap();

        assert_eq!(pipeline.check(stale, &api).await, None);
        assert_eq!(
            pipeline.check(current, &api).await,
            Some(CorporationCheck::Verified)
        );
        assert_eq!(api.check_count(), 1);
        assert_eq!(pipeline.status("826417395"), FieldStatus::Valid);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_for_old_value_is_discarded() {
        let mut api = FakeApi::accepting(&["111111111"]);
        api.delays.insert("111111111", Duration::from_millis(50));
        api.delays.insert("826417395", Duration::from_millis(10));
        let api = Arc::new(api);
        let pipeline = Arc::new(ValidationPipeline::new());

        let old = pipeline.supersede("111111111").unwrap();
        let slow = tokio::spawn({
            let (pipeline, api) = (pipeline.clone(), api.clone());
            async move { pipeline.check(old, &api).await }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;

        let new = pipeline.supersede("826417395").unwrap();
        let fresh = pipeline.check(new, &api).await;

        // The old value would have passed, but it is no longer the field's value
        assert_eq!(slow.await.unwrap(), None);
        assert!(matches!(fresh, Some(CorporationCheck::Rejected(_))));
        assert_eq!(
            pipeline.status("826417395"),
            FieldStatus::Invalid("Invalid corporation number".into())
        );
        assert_eq!(api.check_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn validate_joins_outstanding_check_for_same_value() {
        let mut api = FakeApi::accepting(&["826417395"]);
        api.delays.insert("826417395", Duration::from_millis(20));
        let api = Arc::new(api);
        let pipeline = Arc::new(ValidationPipeline::new());

        let ticket = pipeline.supersede("826417395").unwrap();
        let typing = tokio::spawn({
            let (pipeline, api) = (pipeline.clone(), api.clone());
            async move { pipeline.check(ticket, &api).await }
        });
        tokio::time::sleep(Duration::from_millis(1)).await;

        let form = values("Devon", "Miller", "+16475317990", "826417395");
        assert!(pipeline.validate(&form, &api).await.is_ok());
        assert_eq!(typing.await.unwrap(), Some(CorporationCheck::Verified));
        assert_eq!(api.check_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_check_does_not_leave_value_pending() {
        let mut api = FakeApi::accepting(&["826417395"]);
        api.delays.insert("826417395", Duration::from_secs(60));
        let pipeline = ValidationPipeline::new();

        let ticket = pipeline.supersede("826417395").unwrap();
        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), pipeline.check(ticket, &api)).await;
        assert!(abandoned.is_err());

        // Editing back to the same value starts a fresh check
        let retry = pipeline.supersede("826417395").expect("fresh ticket");
        assert_eq!(
            pipeline.check(retry, &api).await,
            Some(CorporationCheck::Verified)
        );
        assert_eq!(pipeline.status("826417395"), FieldStatus::Valid);
        assert_eq!(api.check_count(), 2);
    }

    #[tokio::test]
    async fn reset_forgets_cached_answers() {
        let api = FakeApi::accepting(&["826417395"]);
        let pipeline = ValidationPipeline::new();
        let ticket = pipeline.supersede("826417395").unwrap();
        pipeline.check(ticket.clone(), &api).await;

        pipeline.reset();
        assert_eq!(pipeline.cached("826417395"), None);
        assert_eq!(pipeline.check(ticket, &api).await, None);
    }
}

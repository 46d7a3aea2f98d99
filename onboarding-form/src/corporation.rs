//! Remote corporation-number verification

use tracing::{info, warn};

use crate::api::VaultApi;
use crate::validate::CORPORATION_NUMBER_LEN;

pub const WRONG_LENGTH: &str = "Please enter a 9 digit number";
pub const NOT_A_NUMBER: &str = "Please enter a valid number";

/// Outcome of checking one corporation number
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorporationCheck {
    /// The service confirmed the number
    Verified,
    /// The service answered and said no, optionally with a reason
    Rejected(Option<String>),
    /// No usable answer (network or response shape); never counts as valid
    Failed(String),
    /// Rejected locally without asking the service
    Malformed(&'static str),
}

impl CorporationCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, CorporationCheck::Verified)
    }

    /// Whether the answer came from the service itself and can be reused
    /// for the same number. Failures are worth retrying.
    pub fn is_definitive(&self) -> bool {
        matches!(
            self,
            CorporationCheck::Verified | CorporationCheck::Rejected(_)
        )
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            CorporationCheck::Verified => None,
            CorporationCheck::Rejected(message) => message.as_deref(),
            CorporationCheck::Failed(message) => Some(message),
            CorporationCheck::Malformed(message) => Some(message),
        }
    }
}

/// Ask the Vault API whether `value` is a registered corporation number.
///
/// Values that are not nine digits are rejected without a network call.
pub async fn verify_corporation_number<A>(api: &A, value: &str) -> CorporationCheck
where
    A: VaultApi + ?Sized,
{
    if value.chars().count() != CORPORATION_NUMBER_LEN {
        return CorporationCheck::Malformed(WRONG_LENGTH);
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return CorporationCheck::Malformed(NOT_A_NUMBER);
    }

    let check = match api.check_corporation_number(value).await {
        Ok(response) if response.valid => CorporationCheck::Verified,
        Ok(response) => CorporationCheck::Rejected(response.message),
        Err(e) => CorporationCheck::Failed(format!(
            "Failed to validate corporation number: {}",
            e
        )),
    };

    match &check {
        CorporationCheck::Verified => info!("Corporation number {} verified", value),
        other => warn!(
            "Corporation number {} not verified: {}",
            value,
            other.reason().unwrap_or("no reason given")
        ),
    }

    check
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::types::{CorporationNumberResponse, ProfileDetails};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-process Vault API with scripted answers
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub valid: Vec<&'static str>,
        pub delays: HashMap<&'static str, Duration>,
        pub check_failure: Option<ApiError>,
        pub submit_result: Option<ApiError>,
        pub submit_delay: Option<Duration>,
        pub checks: Mutex<Vec<String>>,
        pub submissions: Mutex<Vec<ProfileDetails>>,
        pub submit_calls: AtomicUsize,
    }

    impl FakeApi {
        pub(crate) fn accepting(valid: &[&'static str]) -> Self {
            Self {
                valid: valid.to_vec(),
                ..Self::default()
            }
        }

        pub(crate) fn check_count(&self) -> usize {
            self.checks.lock().unwrap().len()
        }

        pub(crate) fn submit_count(&self) -> usize {
            self.submit_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VaultApi for FakeApi {
        async fn check_corporation_number(
            &self,
            number: &str,
        ) -> Result<CorporationNumberResponse, ApiError> {
            self.checks.lock().unwrap().push(number.to_string());
            if let Some(delay) = self.delays.get(number) {
                tokio::time::sleep(*delay).await;
            }
            if let Some(err) = &self.check_failure {
                return Err(err.clone());
            }
            if self.valid.iter().any(|valid| *valid == number) {
                Ok(CorporationNumberResponse {
                    valid: true,
                    message: None,
                })
            } else {
                Ok(CorporationNumberResponse {
                    valid: false,
                    message: Some("Invalid corporation number".into()),
                })
            }
        }

        async fn create_profile(&self, profile: &ProfileDetails) -> Result<(), ApiError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.submit_delay {
                tokio::time::sleep(delay).await;
            }
            match &self.submit_result {
                Some(err) => Err(err.clone()),
                None => {
                    self.submissions.lock().unwrap().push(profile.clone());
                    Ok(())
                }
            }
        }
    }

    #[tokio::test]
    async fn verified_number_passes() {
        let api = FakeApi::accepting(&["826417395"]);
        let check = verify_corporation_number(&api, "826417395").await;
        assert_eq!(check, CorporationCheck::Verified);
        assert!(check.is_valid());
        assert_eq!(api.check_count(), 1);
    }

    #[tokio::test]
    async fn rejection_surfaces_service_message() {
        let api = FakeApi::accepting(&[]);
        let check = verify_corporation_number(&api, "123123123").await;
        assert!(!check.is_valid());
        assert!(check.is_definitive());
        assert_eq!(check.reason(), Some("Invalid corporation number"));
    }

    #[tokio::test]
    async fn malformed_values_never_reach_the_network() {
        let api = FakeApi::accepting(&["826417395"]);
        assert_eq!(
            verify_corporation_number(&api, "82641739").await,
            CorporationCheck::Malformed(WRONG_LENGTH)
        );
        assert_eq!(
            verify_corporation_number(&api, "8264173a5").await,
            CorporationCheck::Malformed(NOT_A_NUMBER)
        );
        assert_eq!(api.check_count(), 0);
    }

    #[tokio::test]
    async fn transport_failure_is_not_valid() {
        let api = FakeApi {
            check_failure: Some(ApiError::Transport("connection refused".into())),
            ..FakeApi::accepting(&["826417395"])
        };
        let check = verify_corporation_number(&api, "826417395").await;
        assert_eq!(
            check,
            CorporationCheck::Failed(
                "Failed to validate corporation number: connection refused".into()
            )
        );
        assert!(!check.is_valid());
        assert!(!check.is_definitive());
    }
}

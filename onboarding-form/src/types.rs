//! Type definitions for the onboarding form

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

/// Country prefix every phone number must carry (Canada/US)
pub const PHONE_PREFIX: &str = "+1";

/// Stable identifier of the submit control
pub const SUBMIT_BUTTON_TEST_ID: &str = "submit-button";

/// Stable identifier of the form-level status/error region
pub const FORM_ALERT_ID: &str = "form-alert";

pub const SUCCESS_MESSAGE: &str = "Form submitted successfully!";
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";
pub const TRANSPORT_FAILURE_PREFIX: &str = "Failed to submit form. Please try again.";

// ==================== Fields ====================

/// One input of the onboarding form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    FirstName,
    LastName,
    PhoneNumber,
    CorporationNumber,
}

impl Field {
    /// All fields in display order
    pub const ALL: [Field; 4] = [
        Field::FirstName,
        Field::LastName,
        Field::PhoneNumber,
        Field::CorporationNumber,
    ];

    /// Key used for this field in JSON documents
    pub fn json_key(self) -> &'static str {
        match self {
            Field::FirstName => "firstName",
            Field::LastName => "lastName",
            Field::PhoneNumber => "phoneNumber",
            Field::CorporationNumber => "corporationNumber",
        }
    }

    /// Identifier the rendering layer attaches to this field's input
    pub fn test_id(self) -> &'static str {
        match self {
            Field::FirstName => "first-name-input",
            Field::LastName => "last-name-input",
            Field::PhoneNumber => "phone-input",
            Field::CorporationNumber => "corporation-number-input",
        }
    }
}

// ==================== Form values ====================

/// The record under edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormValues {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub corporation_number: String,
}

impl Default for FormValues {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            phone_number: PHONE_PREFIX.to_string(),
            corporation_number: String::new(),
        }
    }
}

impl FormValues {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::FirstName => &self.first_name,
            Field::LastName => &self.last_name,
            Field::PhoneNumber => &self.phone_number,
            Field::CorporationNumber => &self.corporation_number,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        match field {
            Field::FirstName => self.first_name = value,
            Field::LastName => self.last_name = value,
            Field::PhoneNumber => self.phone_number = value,
            Field::CorporationNumber => self.corporation_number = value,
        }
    }
}

// ==================== Wire types ====================

/// Request body for POST /profile-details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    pub first_name: String,
    pub last_name: String,
    pub corporation_number: String,
    pub phone: String,
}

impl From<&FormValues> for ProfileDetails {
    fn from(values: &FormValues) -> Self {
        Self {
            first_name: values.first_name.clone(),
            last_name: values.last_name.clone(),
            corporation_number: values.corporation_number.clone(),
            phone: values.phone_number.clone(),
        }
    }
}

/// Response body of GET /corporation-number/{number}
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorporationNumberResponse {
    /// Missing is treated as not valid
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body returned by the Vault API on non-ok responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

// ==================== Validation results ====================

/// Outcome of a single structural or remote rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

impl ValidationResult {
    pub fn invalid(message: impl Into<String>) -> Self {
        ValidationResult::Invalid(message.into())
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(message) => Some(message),
        }
    }
}

/// What a field currently displays. Only the corporation number can be
/// `Pending`, while its remote check is outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldStatus {
    Valid,
    Pending,
    Invalid(String),
}

impl From<ValidationResult> for FieldStatus {
    fn from(result: ValidationResult) -> Self {
        match result {
            ValidationResult::Valid => FieldStatus::Valid,
            ValidationResult::Invalid(message) => FieldStatus::Invalid(message),
        }
    }
}

/// Field-scoped error messages, at most one per field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `result` for `field`, clearing any previous message when valid
    pub fn record(&mut self, field: Field, result: ValidationResult) {
        match result {
            ValidationResult::Valid => {
                self.0.remove(&field);
            }
            ValidationResult::Invalid(message) => {
                self.0.insert(field, message);
            }
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    /// All messages in display order
    pub fn messages(&self) -> Vec<&str> {
        self.0.values().map(String::as_str).collect()
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(field, message)| (field.json_key(), message)))
    }
}

// ==================== Submission state ====================

/// Phase of the current form session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed(String),
}

impl SubmissionState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, SubmissionState::Submitting)
    }

    /// Text for the form-level banner, if one is shown
    pub fn banner(&self) -> Option<&str> {
        match self {
            SubmissionState::Succeeded => Some(SUCCESS_MESSAGE),
            SubmissionState::Failed(message) => Some(message),
            SubmissionState::Idle | SubmissionState::Submitting => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_start_phone_with_prefix() {
        let values = FormValues::default();
        assert_eq!(values.first_name, "");
        assert_eq!(values.last_name, "");
        assert_eq!(values.phone_number, "+1");
        assert_eq!(values.corporation_number, "");
    }

    #[test]
    fn ui_identifiers_are_stable() {
        let ids: Vec<_> = Field::ALL.iter().map(|f| f.test_id()).collect();
        assert_eq!(
            ids,
            [
                "first-name-input",
                "last-name-input",
                "phone-input",
                "corporation-number-input"
            ]
        );
        assert_eq!(SUBMIT_BUTTON_TEST_ID, "submit-button");
        assert_eq!(FORM_ALERT_ID, "form-alert");
    }

    #[test]
    fn get_and_set_address_the_same_field() {
        let mut values = FormValues::default();
        for field in Field::ALL {
            values.set(field, field.json_key().to_string());
            assert_eq!(values.get(field), field.json_key());
        }
    }

    #[test]
    fn form_values_fill_missing_fields_from_defaults() {
        let values: FormValues = serde_json::from_str(r#"{"firstName":"Devon"}"#).unwrap();
        assert_eq!(values.first_name, "Devon");
        assert_eq!(values.phone_number, "+1");
    }

    #[test]
    fn profile_details_renames_phone() {
        let values = FormValues {
            first_name: "Devon".into(),
            last_name: "Miller".into(),
            phone_number: "+16475317990".into(),
            corporation_number: "826417395".into(),
        };
        let json = serde_json::to_value(ProfileDetails::from(&values)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "firstName": "Devon",
                "lastName": "Miller",
                "corporationNumber": "826417395",
                "phone": "+16475317990",
            })
        );
    }

    #[test]
    fn corporation_response_without_valid_is_not_valid() {
        let response: CorporationNumberResponse =
            serde_json::from_str(r#"{"message":"Invalid corporation number"}"#).unwrap();
        assert!(!response.valid);
        assert_eq!(response.message.as_deref(), Some("Invalid corporation number"));
    }

    #[test]
    fn field_errors_serialize_by_json_key() {
        let mut errors = FieldErrors::new();
        errors.record(Field::CorporationNumber, ValidationResult::invalid("bad"));
        errors.record(Field::FirstName, ValidationResult::invalid("missing"));
        errors.record(Field::FirstName, ValidationResult::Valid);

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({ "corporationNumber": "bad" }));
    }

    #[test]
    fn submission_state_banner() {
        assert_eq!(SubmissionState::Idle.banner(), None);
        assert_eq!(SubmissionState::Succeeded.banner(), Some(SUCCESS_MESSAGE));
        assert_eq!(
            SubmissionState::Failed("nope".into()).banner(),
            Some("nope")
        );
        assert_eq!(
            serde_json::to_value(SubmissionState::Failed("nope".into())).unwrap(),
            serde_json::json!({ "state": "failed", "message": "nope" })
        );
    }
}

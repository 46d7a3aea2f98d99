//! Structural field rules
//!
//! Everything here is evaluable without network access. The remote half of
//! corporation-number validation lives in [`crate::corporation`].

use crate::types::{Field, ValidationResult, PHONE_PREFIX};

/// Longest accepted first or last name
pub const MAX_NAME_LEN: usize = 50;

/// Longest value the first-name input lets the user type
pub const NAME_INPUT_MAX_LEN: usize = 75;

/// `+1` followed by ten digits
pub const PHONE_LEN: usize = 12;

pub const CORPORATION_NUMBER_LEN: usize = 9;

pub const INVALID_CORPORATION_NUMBER: &str = "Invalid corporation number";

pub fn validate_first_name(value: &str) -> ValidationResult {
    if value.is_empty() {
        return ValidationResult::invalid("First name is required");
    }
    if value.chars().count() > MAX_NAME_LEN {
        return ValidationResult::invalid("Name cannot exceed 50 characters");
    }
    ValidationResult::Valid
}

pub fn validate_last_name(value: &str) -> ValidationResult {
    if value.is_empty() {
        return ValidationResult::invalid("Last name is required");
    }
    if value.chars().count() > MAX_NAME_LEN {
        return ValidationResult::invalid("Last name cannot exceed 50 characters");
    }
    ValidationResult::Valid
}

pub fn validate_phone_number(value: &str) -> ValidationResult {
    if value.is_empty() {
        return ValidationResult::invalid("Phone number is required");
    }
    let well_formed = value.len() == PHONE_LEN
        && value
            .strip_prefix(PHONE_PREFIX)
            .is_some_and(|rest| rest.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return ValidationResult::invalid("Please enter a valid Canadian phone number");
    }
    ValidationResult::Valid
}

/// Structural half of the corporation-number rule. A `Valid` result here
/// still needs the remote check before the field counts as valid.
pub fn validate_corporation_number_format(value: &str) -> ValidationResult {
    if value.is_empty() {
        return ValidationResult::invalid("Corporation number is required");
    }
    if !is_corporation_number_shape(value) {
        return ValidationResult::invalid("Corporation number must be 9 digits");
    }
    ValidationResult::Valid
}

/// Exactly nine ASCII digits
pub fn is_corporation_number_shape(value: &str) -> bool {
    value.len() == CORPORATION_NUMBER_LEN && value.bytes().all(|b| b.is_ascii_digit())
}

/// Run the structural rule for `field`
pub fn validate_field(field: Field, value: &str) -> ValidationResult {
    match field {
        Field::FirstName => validate_first_name(value),
        Field::LastName => validate_last_name(value),
        Field::PhoneNumber => validate_phone_number(value),
        Field::CorporationNumber => validate_corporation_number_format(value),
    }
}

/// Normalize raw phone input the way the phone widget does: keep a leading
/// `+` and the digits, drop formatting characters. Input without a leading
/// `+` is a Canadian national number and gets the `+1` country code.
pub fn normalize_phone_input(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }
    if raw.trim_start().starts_with('+') {
        format!("+{}", digits)
    } else {
        format!("{}{}", PHONE_PREFIX, digits)
    }
}

/// Apply the input widgets' keystroke allowances to a typed value.
///
/// Returns the value the field holds after the edit.
pub fn apply_input_allowance(field: Field, previous: &str, typed: &str) -> String {
    match field {
        Field::FirstName => typed.chars().take(NAME_INPUT_MAX_LEN).collect(),
        Field::LastName => {
            if typed.chars().count() <= MAX_NAME_LEN {
                typed.to_string()
            } else {
                previous.to_string()
            }
        }
        Field::PhoneNumber => normalize_phone_input(typed),
        Field::CorporationNumber => typed.to_string(),
    }
}

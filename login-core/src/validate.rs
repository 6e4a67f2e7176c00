//! Record validation.
//!
//! A login is storable when its hostname and password are non-empty and
//! exactly one of the form submission URL and HTTP realm is present. The
//! checks run in that order and the first failure is reported; failures
//! are never aggregated.

use loginstore_types::LoginFields;
use thiserror::Error;

/// Why a login was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// The hostname is empty.
    EmptyHostname,
    /// The password is empty.
    EmptyPassword,
    /// Both a form submission URL and an HTTP realm are set.
    BothTargets,
    /// Neither a form submission URL nor an HTTP realm is set.
    NoTarget,
}

impl InvalidReason {
    /// Human-readable description.
    pub fn message(&self) -> &'static str {
        match self {
            Self::EmptyHostname => "hostname must not be empty",
            Self::EmptyPassword => "password must not be empty",
            Self::BothTargets => "form_submit_url and http_realm are mutually exclusive",
            Self::NoTarget => "one of form_submit_url or http_realm is required",
        }
    }
}

/// A login failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid login: {}", .reason.message())]
pub struct InvalidLogin {
    /// The first failing check.
    pub reason: InvalidReason,
}

/// Check that `fields` describe a storable login.
pub fn validate(fields: &LoginFields) -> Result<(), InvalidLogin> {
    let reason = if fields.hostname.is_empty() {
        InvalidReason::EmptyHostname
    } else if fields.password.is_empty() {
        InvalidReason::EmptyPassword
    } else {
        match (&fields.form_submit_url, &fields.http_realm) {
            (Some(_), None) | (None, Some(_)) => return Ok(()),
            (Some(_), Some(_)) => InvalidReason::BothTargets,
            (None, None) => InvalidReason::NoTarget,
        }
    };
    Err(InvalidLogin { reason })
}

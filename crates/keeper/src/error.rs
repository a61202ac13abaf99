// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::StoreError;

/// Error codes reported to callers of the keeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// A required identifier was absent from a request.
    MissingParameter,
    /// The named account (or org) is not known.
    NotFound,
    /// Transient failure talking to the credential store.
    StoreUnavailable,
    /// The store refused the operation.
    StoreRejected,
    /// A scheduled refresh fired after its account had vanished.
    RefreshRace,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingParameter => "MISSING_PARAMETER",
            Self::NotFound => "NOT_FOUND",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::StoreRejected => "STORE_REJECTED",
            Self::RefreshRace => "REFRESH_RACE",
        }
    }

    /// Whether the error is reported back to the immediate caller rather than
    /// only logged.
    pub fn is_caller_facing(&self) -> bool {
        matches!(self, Self::MissingParameter | Self::NotFound | Self::StoreRejected)
    }

    pub fn with_message(self, message: impl Into<String>) -> KeeperError {
        KeeperError { code: self, message: message.into() }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An [`ErrorCode`] with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeeperError {
    pub code: ErrorCode,
    pub message: String,
}

impl KeeperError {
    pub fn missing_parameter(what: &str) -> Self {
        ErrorCode::MissingParameter.with_message(format!("Missing {what}"))
    }

    pub fn account_not_found(name: &str) -> Self {
        ErrorCode::NotFound.with_message(format!("Account \"{name}\" not found"))
    }

    pub fn no_accounts() -> Self {
        ErrorCode::NotFound.with_message("No authenticated accounts found")
    }

    pub fn org_not_found(org: &str) -> Self {
        ErrorCode::NotFound.with_message(format!("Unable to find organization \"{org}\""))
    }
}

impl fmt::Display for KeeperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for KeeperError {}

impl From<StoreError> for KeeperError {
    fn from(e: StoreError) -> Self {
        let code = match e {
            StoreError::Unavailable(_) => ErrorCode::StoreUnavailable,
            StoreError::Rejected(_)
            | StoreError::AlreadyAuthenticated(_)
            | StoreError::Unsupported(_) => ErrorCode::StoreRejected,
        };
        code.with_message(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

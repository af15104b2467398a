//! Registry error type and the user-facing messages it maps to.

use std::fmt;

use crate::storage::chain::ChainError;
use crate::storage::db::DbError;
use crate::validation::ValidationError;

// ---------------------------------------------------------------------------
// Wire messages
// ---------------------------------------------------------------------------

/// Messages returned to API clients. Existing clients match on these
/// strings, so they are kept verbatim.
pub mod messages {
    pub const BAD_REQUEST: &str = "You may be missing information in your request. Please check your request URL and METHOD, and try again.";

    pub const INVALID_NEW_BLOCK_REQUEST: &str = "Error: Invalid new block request. Ensure you have an approved validation request and is under the 5 minute time limit.";

    pub const INVALID_ADDRESS: &str =
        "Error: Invalid new block request. Ensure your address is correct.";

    pub const INVALID_STORY: &str = "Error: Invalid new block request. Ensure that your star data is correct, and that your star story is in ASCII.";

    pub const INVALID_REQUEST: &str =
        "Error: Invalid request, please check your request body data is correct.";

    pub const ACCOUNT_NOT_FOUND: &str =
        "Error: Could not find a request for validation for this account.";

    pub const INVALID_SIGNATURE: &str = "Error: Signature is invalid. Duplicate attempts with an approved signature will result in error.";

    pub const EXCEEDED_TIME_LIMIT: &str = "Error: Exceeded time limit.";

    pub const STORAGE_UNAVAILABLE: &str = "Error: Storage is unavailable, please try again later.";

    pub fn hash_not_found(hash: &str) -> String {
        format!("Error: Blockchain doesn't have a block with hash of {hash}.")
    }

    pub fn address_not_found(address: &str) -> String {
        format!("Error: Blockchain doesn't have any blocks with address of {address}.")
    }

    pub fn height_not_found(height: impl std::fmt::Display) -> String {
        format!("Error: Blockchain doesn't have a block with height of {height}.")
    }
}

// ---------------------------------------------------------------------------
// RejectReason
// ---------------------------------------------------------------------------

/// Which precondition of a submission failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    InvalidAddress,
    InvalidStar,
    NotAdmitted,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress => write!(f, "{}", messages::INVALID_ADDRESS),
            Self::InvalidStar => write!(f, "{}", messages::INVALID_STORY),
            Self::NotAdmitted => write!(f, "address has no approved validation request"),
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Everything a registry operation can fail with.
///
/// Only [`Storage`](RegistryError::Storage) and
/// [`Ledger`](RegistryError::Ledger) are faults. The rest are answers the
/// client can act on.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Malformed input.
    #[error("{0}")]
    InvalidRequest(String),

    /// No block matches the query. Carries the full client message.
    #[error("{0}")]
    NotFound(String),

    #[error("{}", messages::ACCOUNT_NOT_FOUND)]
    AccountNotFound,

    #[error("{}", messages::EXCEEDED_TIME_LIMIT)]
    ExpiredWindow,

    #[error("{}", messages::INVALID_SIGNATURE)]
    InvalidSignature,

    #[error("submission rejected: {0}")]
    Rejected(RejectReason),

    #[error("storage error: {0}")]
    Storage(#[from] DbError),

    /// The ledger refused an append it should have accepted.
    #[error("ledger error: {0}")]
    Ledger(ChainError),
}

impl RegistryError {
    pub fn invalid_request() -> Self {
        Self::InvalidRequest(messages::INVALID_REQUEST.to_string())
    }

    /// The message a client should see.
    pub fn client_message(&self) -> String {
        match self {
            Self::InvalidRequest(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Rejected(_) => messages::INVALID_NEW_BLOCK_REQUEST.to_string(),
            Self::Storage(_) | Self::Ledger(_) => messages::STORAGE_UNAVAILABLE.to_string(),
            other => other.to_string(),
        }
    }

    /// Failures of the validate-signature step carry `registerStar: false`.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Self::AccountNotFound | Self::ExpiredWindow | Self::InvalidSignature
        )
    }

    /// True when the store, not the client, is at fault.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Ledger(_))
    }
}

impl From<ChainError> for RegistryError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Db(db) => Self::Storage(db),
            other => Self::Ledger(other),
        }
    }
}

impl From<ValidationError> for RegistryError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::AccountNotFound => Self::AccountNotFound,
            ValidationError::ExpiredWindow => Self::ExpiredWindow,
            ValidationError::InvalidSignature(_) => Self::InvalidSignature,
            ValidationError::Storage(db) => Self::Storage(db),
        }
    }
}

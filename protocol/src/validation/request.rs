//! Validation records and the challenge message format.

use serde::{Deserialize, Serialize};

use crate::config::{CHALLENGE_SEPARATOR, CHALLENGE_SUFFIX};

/// Build the string a participant must sign: `"<address>:<issuedAt>:starRegistry"`.
pub fn challenge_message(address: &str, issued_at: u64) -> String {
    format!("{address}{CHALLENGE_SEPARATOR}{issued_at}{CHALLENGE_SEPARATOR}{CHALLENGE_SUFFIX}")
}

/// Split a challenge back into `(address, issuedAt)`.
///
/// Returns `None` for anything that [`challenge_message`] could not have
/// produced.
pub fn parse_challenge(message: &str) -> Option<(&str, u64)> {
    let mut parts = message.split(CHALLENGE_SEPARATOR);
    let address = parts.next().filter(|a| !a.is_empty())?;
    let issued_at = parts.next()?.parse().ok()?;
    match (parts.next(), parts.next()) {
        (Some(CHALLENGE_SUFFIX), None) => Some((address, issued_at)),
        _ => None,
    }
}

/// Seconds left in a window opened at `issued_at`. Zero or less means expired.
///
/// Windows and elapsed times beyond `i64::MAX` seconds are clamped.
pub fn window_remaining(issued_at: u64, now: u64, window_secs: u64) -> i64 {
    let window = i64::try_from(window_secs).unwrap_or(i64::MAX);
    let elapsed = i64::try_from(now.saturating_sub(issued_at)).unwrap_or(i64::MAX);
    window - elapsed
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// An issued, not yet answered challenge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub address: String,
    pub issued_at: u64,
    pub challenge_message: String,
}

impl ValidationRequest {
    pub fn new(address: &str, issued_at: u64) -> Self {
        Self {
            address: address.to_string(),
            issued_at,
            challenge_message: challenge_message(address, issued_at),
        }
    }

    pub fn window_remaining(&self, now: u64, window_secs: u64) -> i64 {
        window_remaining(self.issued_at, now, window_secs)
    }

    pub fn is_expired(&self, now: u64, window_secs: u64) -> bool {
        self.window_remaining(now, window_secs) <= 0
    }
}

/// An address that proved ownership and may append exactly one block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionEntry {
    pub address: String,
    pub validated_at: u64,
    pub challenge_message: String,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Answer to `requestValidation`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub address: String,
    pub issued_at: u64,
    pub challenge_message: String,
    pub window_remaining: i64,
}

/// Answer to a successful signature validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStatus {
    pub address: String,
    pub issued_at: u64,
    pub window_remaining: i64,
    pub verified: bool,
    /// Always `"valid"`.
    pub message_signature: String,
}

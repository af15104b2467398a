//! # Registry
//!
//! The star registry as its callers see it: request a challenge, prove
//! ownership, register a star, look stars up.
//!
//! ```text
//! service.rs: RegistryService, the orchestration layer
//! input.rs  : address and star checks
//! story.rs  : hex story codec
//! error.rs  : RegistryError and client-facing messages
//! ```

pub mod error;
pub mod input;
pub mod service;
pub mod story;

pub use error::{messages, RegistryError, RejectReason};
pub use input::{check_address, check_star, StarInput};
pub use service::{RegistryResult, RegistryService, RegistryStatus};
pub use story::{decode_story, encode_story};

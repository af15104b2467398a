//! # Validation
//!
//! Proof of address ownership before a write. A participant asks for a
//! challenge, signs it with the key behind their address within the window,
//! and is admitted to append exactly one block.
//!
//! ```text
//! request.rs : challenge format, stored records, response shapes
//! workflow.rs: request issuance and signature validation
//! mempool.rs : admission pool of validated addresses
//! ```

pub mod mempool;
pub mod request;
pub mod workflow;

pub use mempool::AdmissionPool;
pub use request::{
    challenge_message, AdmissionEntry, ValidationRequest, ValidationResponse, ValidationStatus,
};
pub use workflow::{AddressLocks, ValidationError, ValidationWorkflow};

//! # Cryptographic Primitives
//!
//! Everything the registry needs to decide whether somebody really controls
//! the address they claim:
//!
//! - **hash**: SHA-256 for block hashes, SHA-256d and HASH160 for Bitcoin
//!   structures.
//! - **address**: base58check and bech32 address parsing.
//! - **keys**: secp256k1 keypairs with WIF import/export.
//! - **signatures**: the Bitcoin signed-message scheme.
//!
//! Everything here wraps audited implementations (`k256`, `sha2`, `ripemd`).
//! Nothing is hand-rolled beyond byte layout.

pub mod address;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use address::{parse_address, AddressError, Network};
pub use hash::{double_sha256, hash160, sha256, sha256_hex};
pub use keys::{KeyError, StarKeypair};
pub use signatures::{message_digest, sign_message, verify_message, MessageSignatureError};

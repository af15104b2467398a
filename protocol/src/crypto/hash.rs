//! # Hashing Utilities
//!
//! The registry speaks Bitcoin's dialect of hashing, because the addresses
//! and signatures it accepts come from Bitcoin wallets:
//!
//! - **SHA-256** for block hashes (hex-encoded on the wire).
//! - **SHA-256d** (`SHA-256(SHA-256(x))`) for signed-message digests and
//!   base58check checksums.
//! - **HASH160** (`RIPEMD-160(SHA-256(x))`) for turning public keys into
//!   address payloads.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use star_registry::crypto::sha256;
///
/// let hash = sha256(b"star registry");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 rendered as lowercase hex. This is the block hash format.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Compute the double-SHA-256 hash: `SHA-256(SHA-256(data))`.
///
/// Used for the Bitcoin signed-message digest and for the 4-byte checksum
/// trailing every base58check string.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute `RIPEMD-160(SHA-256(data))`, the 20-byte payload of P2PKH and
/// P2WPKH addresses.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(data));
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // NIST test vector for "abc".
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn double_sha256_differs_from_single() {
        let data = b"chain";
        assert_ne!(double_sha256(data), sha256(data));
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
    }

    #[test]
    fn hash160_known_vector() {
        // hash160 of the compressed generator point, i.e. private key 1.
        let pubkey = hex::decode(
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        )
        .unwrap();
        assert_eq!(
            hex::encode(hash160(&pubkey)),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }
}

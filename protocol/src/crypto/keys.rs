//! # Key Management
//!
//! secp256k1 keypairs in the shape Bitcoin wallets hand them around:
//! Wallet Import Format (WIF) for the secret, P2PKH for the address.
//!
//! The registry itself never holds a participant's secret key. This module
//! exists for the node's `keygen` and `sign` subcommands and for tests that
//! need a real signer on the other side of the validation workflow.
//!
//! Key bytes are never logged.

use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

use super::address::{base58check_decode, base58check_encode, p2pkh_address, Network};
use super::hash::hash160;

/// WIF version byte on mainnet.
const WIF_MAINNET: u8 = 0x80;
/// WIF version byte on testnet.
const WIF_TESTNET: u8 = 0xef;
/// Trailing marker telling wallets to derive the compressed public key.
const WIF_COMPRESSED_FLAG: u8 = 0x01;

/// Errors that can occur during key operations.
///
/// Deliberately vague: key material never ends up in an error message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid WIF encoding")]
    InvalidWif,

    #[error("invalid secret key: not a valid secp256k1 scalar")]
    InvalidSecretKey,
}

/// A secp256k1 signing key plus the metadata a wallet attaches to it.
pub struct StarKeypair {
    signing_key: SigningKey,
    compressed: bool,
    network: Network,
}

impl StarKeypair {
    /// Generate a fresh compressed mainnet key from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
            compressed: true,
            network: Network::Mainnet,
        }
    }

    /// Build a compressed key from raw 32-byte secret material.
    pub fn from_secret_bytes(bytes: &[u8], network: Network) -> Result<Self, KeyError> {
        let signing_key = SigningKey::from_slice(bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self {
            signing_key,
            compressed: true,
            network,
        })
    }

    /// Decode a Wallet Import Format string.
    ///
    /// Accepts both the 32-byte (uncompressed) and 33-byte (compressed)
    /// payload forms, on mainnet (`5…`, `K…`, `L…`) or testnet.
    pub fn from_wif(wif: &str) -> Result<Self, KeyError> {
        let (version, payload) = base58check_decode(wif.trim()).map_err(|_| KeyError::InvalidWif)?;
        let network = match version {
            WIF_MAINNET => Network::Mainnet,
            WIF_TESTNET => Network::Testnet,
            _ => return Err(KeyError::InvalidWif),
        };

        let (secret, compressed) = match payload.len() {
            32 => (&payload[..], false),
            33 if payload[32] == WIF_COMPRESSED_FLAG => (&payload[..32], true),
            _ => return Err(KeyError::InvalidWif),
        };

        let signing_key = SigningKey::from_slice(secret).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self {
            signing_key,
            compressed,
            network,
        })
    }

    /// Encode the key as WIF.
    pub fn to_wif(&self) -> String {
        let version = match self.network {
            Network::Mainnet => WIF_MAINNET,
            Network::Testnet => WIF_TESTNET,
        };
        let mut payload = self.signing_key.to_bytes().to_vec();
        if self.compressed {
            payload.push(WIF_COMPRESSED_FLAG);
        }
        base58check_encode(version, &payload)
    }

    /// SEC1 public key bytes: 33 bytes compressed, 65 uncompressed.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.verifying_key()
            .to_encoded_point(self.compressed)
            .as_bytes()
            .to_vec()
    }

    /// `hash160` of the public key.
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.public_key_bytes())
    }

    /// The legacy P2PKH address controlled by this key.
    pub fn address(&self) -> String {
        p2pkh_address(&self.pubkey_hash(), self.network)
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

impl fmt::Debug for StarKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StarKeypair")
            .field("address", &self.address())
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_one() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        bytes
    }

    #[test]
    fn compressed_wif_known_vector() {
        let kp = StarKeypair::from_secret_bytes(&key_one(), Network::Mainnet).unwrap();
        assert_eq!(
            kp.to_wif(),
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"
        );
        assert_eq!(kp.address(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
    }

    #[test]
    fn uncompressed_wif_decodes() {
        let kp = StarKeypair::from_wif("5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf")
            .unwrap();
        assert!(!kp.is_compressed());
        assert_eq!(kp.public_key_bytes().len(), 65);
        assert_eq!(kp.address(), "1EHNa6Q4Jz2uvNExL497mE43ikXhwF6kZm");
    }

    #[test]
    fn wif_round_trip() {
        let kp = StarKeypair::generate();
        let restored = StarKeypair::from_wif(&kp.to_wif()).unwrap();
        assert_eq!(restored.address(), kp.address());
        assert!(restored.is_compressed());
    }

    #[test]
    fn garbage_wif_is_rejected() {
        assert_eq!(
            StarKeypair::from_wif("not-a-key").unwrap_err(),
            KeyError::InvalidWif
        );
    }

    #[test]
    fn zero_secret_is_rejected() {
        assert_eq!(
            StarKeypair::from_secret_bytes(&[0u8; 32], Network::Mainnet).unwrap_err(),
            KeyError::InvalidSecretKey
        );
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = StarKeypair::from_secret_bytes(&key_one(), Network::Mainnet).unwrap();
        let rendered = format!("{:?}", kp);
        assert!(rendered.contains("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"));
        assert!(!rendered.contains(&kp.to_wif()));
    }
}

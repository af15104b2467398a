//! # Signed Messages
//!
//! Verification (and, for tooling, creation) of Bitcoin "signed message"
//! signatures, the scheme every mainstream wallet implements behind its
//! "Sign message" button. A registry participant proves control of an address
//! by signing the challenge issued by the validation workflow with it.
//!
//! ## Digest
//!
//! ```text
//! sha256d( varstr("Bitcoin Signed Message:\n") ‖ varstr(message) )
//! ```
//!
//! where `varstr(x) = compact_size(len(x)) ‖ x`.
//!
//! ## Signature layout
//!
//! Base64 of 65 bytes: `header ‖ r ‖ s`. The header encodes the recovery id
//! and the address kind the signer had in mind:
//!
//! | header  | meaning                          |
//! |---------|----------------------------------|
//! | 27..=30 | P2PKH, uncompressed public key   |
//! | 31..=34 | P2PKH, compressed public key     |
//! | 35..=38 | P2SH-wrapped P2WPKH              |
//! | 39..=42 | native P2WPKH                    |
//!
//! Verification recovers the public key from `(digest, r, s, recid)` and
//! compares its hash against the address payload. There is no separate
//! public key on the wire.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use thiserror::Error;

use super::address::{parse_address, AddressError, AddressPayload};
use super::hash::{double_sha256, hash160};
use super::keys::StarKeypair;

/// Prefix mixed into every signed-message digest.
pub const MESSAGE_MAGIC: &str = "Bitcoin Signed Message:\n";

/// Encoded signature length: one header byte plus `r ‖ s`.
pub const SIGNATURE_LENGTH: usize = 65;

const HEADER_BASE: u8 = 27;
const HEADER_MAX: u8 = 42;

/// Errors during signed-message operations.
///
/// Verification failures collapse into a handful of variants on purpose;
/// callers only ever need "valid" or "not valid".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageSignatureError {
    #[error("signature is not valid base64 of {SIGNATURE_LENGTH} bytes")]
    InvalidEncoding,

    #[error("invalid signature header byte {0}")]
    InvalidHeader(u8),

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("signature was not produced by the key behind this address")]
    SignerMismatch,

    #[error("signing failed")]
    SigningFailed,
}

/// Which address family the signer's header byte claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignatureKind {
    Legacy { compressed: bool },
    P2shP2wpkh,
    P2wpkh,
}

impl SignatureKind {
    fn compressed(self) -> bool {
        !matches!(self, SignatureKind::Legacy { compressed: false })
    }
}

/// A decoded compact signature.
#[derive(Debug, Clone)]
struct CompactSignature {
    kind: SignatureKind,
    recovery_id: RecoveryId,
    signature: Signature,
}

/// Compute the signed-message digest of `message`.
pub fn message_digest(message: &str) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(MESSAGE_MAGIC.len() + message.len() + 10);
    write_varstr(&mut preimage, MESSAGE_MAGIC.as_bytes());
    write_varstr(&mut preimage, message.as_bytes());
    double_sha256(&preimage)
}

/// Verify that `signature` (base64) signs `message` with the key that controls
/// `address`.
pub fn verify_message(
    address: &str,
    message: &str,
    signature: &str,
) -> Result<(), MessageSignatureError> {
    let parsed = parse_address(address)?;
    let compact = decode_signature(signature)?;
    let digest = message_digest(message);

    let (signature, recovery_id) = normalize(compact.signature, compact.recovery_id);
    let recovered = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|_| MessageSignatureError::RecoveryFailed)?;

    let pubkey = recovered.to_encoded_point(compact.kind.compressed());
    let pubkey_hash = hash160(pubkey.as_bytes());

    let matches = match (compact.kind, parsed.payload) {
        (SignatureKind::Legacy { .. }, AddressPayload::PubkeyHash(expected)) => {
            expected == pubkey_hash
        }
        // Electrum signs segwit addresses with a plain compressed header.
        (
            SignatureKind::P2wpkh | SignatureKind::Legacy { compressed: true },
            AddressPayload::WitnessPubkeyHash(expected),
        ) => expected == pubkey_hash,
        (
            SignatureKind::P2shP2wpkh | SignatureKind::Legacy { compressed: true },
            AddressPayload::ScriptHash(expected),
        ) => expected == p2sh_p2wpkh_hash(&pubkey_hash),
        _ => false,
    };

    if matches {
        Ok(())
    } else {
        Err(MessageSignatureError::SignerMismatch)
    }
}

/// Sign `message` with `keypair`, producing a base64 compact signature with a
/// P2PKH header. This is what a wallet's "Sign message" produces.
pub fn sign_message(keypair: &StarKeypair, message: &str) -> Result<String, MessageSignatureError> {
    let digest = message_digest(message);
    let (signature, recovery_id) = keypair
        .signing_key()
        .sign_prehash_recoverable(&digest)
        .map_err(|_| MessageSignatureError::SigningFailed)?;
    let (signature, recovery_id) = normalize(signature, recovery_id);

    let compressed_offset = if keypair.is_compressed() { 4 } else { 0 };
    let mut encoded = Vec::with_capacity(SIGNATURE_LENGTH);
    encoded.push(HEADER_BASE + compressed_offset + recovery_id.to_byte());
    encoded.extend_from_slice(&signature.to_bytes());
    Ok(STANDARD.encode(encoded))
}

fn decode_signature(encoded: &str) -> Result<CompactSignature, MessageSignatureError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| MessageSignatureError::InvalidEncoding)?;
    if bytes.len() != SIGNATURE_LENGTH {
        return Err(MessageSignatureError::InvalidEncoding);
    }

    let header = bytes[0];
    if !(HEADER_BASE..=HEADER_MAX).contains(&header) {
        return Err(MessageSignatureError::InvalidHeader(header));
    }
    let flag = header - HEADER_BASE;
    let kind = match flag {
        0..=3 => SignatureKind::Legacy { compressed: false },
        4..=7 => SignatureKind::Legacy { compressed: true },
        8..=11 => SignatureKind::P2shP2wpkh,
        _ => SignatureKind::P2wpkh,
    };
    let recovery_id =
        RecoveryId::from_byte(flag & 3).ok_or(MessageSignatureError::InvalidHeader(header))?;
    let signature =
        Signature::from_slice(&bytes[1..]).map_err(|_| MessageSignatureError::InvalidEncoding)?;

    Ok(CompactSignature {
        kind,
        recovery_id,
        signature,
    })
}

/// Fold a high-S signature into its low-S twin. Negating `s` mirrors the
/// nonce point, so the y-parity bit of the recovery id flips with it.
fn normalize(signature: Signature, recovery_id: RecoveryId) -> (Signature, RecoveryId) {
    match signature.normalize_s() {
        Some(low) => (
            low,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (signature, recovery_id),
    }
}

/// Script hash of the P2SH redeem script `OP_0 PUSH20 <pubkey_hash>`.
fn p2sh_p2wpkh_hash(pubkey_hash: &[u8; 20]) -> [u8; 20] {
    let mut redeem = Vec::with_capacity(22);
    redeem.extend_from_slice(&[0x00, 0x14]);
    redeem.extend_from_slice(pubkey_hash);
    hash160(&redeem)
}

fn write_varstr(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address::{base58check_encode, p2wpkh_address, Network, P2SH_MAINNET};

    fn keypair(seed: u8) -> StarKeypair {
        StarKeypair::from_secret_bytes(&[seed; 32], Network::Mainnet).unwrap()
    }

    fn with_header(signature: &str, header: u8) -> String {
        let mut bytes = STANDARD.decode(signature).unwrap();
        bytes[0] = header;
        STANDARD.encode(bytes)
    }

    #[test]
    fn sign_then_verify_p2pkh() {
        let kp = keypair(7);
        let message = format!("{}:1700000000:starRegistry", kp.address());
        let signature = sign_message(&kp, &message).unwrap();
        assert!(verify_message(&kp.address(), &message, &signature).is_ok());
    }

    #[test]
    fn signature_header_is_compressed_p2pkh() {
        let kp = keypair(7);
        let signature = sign_message(&kp, "hello").unwrap();
        let bytes = STANDARD.decode(signature).unwrap();
        assert_eq!(bytes.len(), SIGNATURE_LENGTH);
        assert!((31..=34).contains(&bytes[0]));
    }

    #[test]
    fn signing_is_deterministic() {
        let kp = keypair(9);
        assert_eq!(
            sign_message(&kp, "same message").unwrap(),
            sign_message(&kp, "same message").unwrap()
        );
    }

    #[test]
    fn uncompressed_key_verifies() {
        let kp = StarKeypair::from_wif("5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf")
            .unwrap();
        let signature = sign_message(&kp, "uncompressed").unwrap();
        let header = STANDARD.decode(&signature).unwrap()[0];
        assert!((27..=30).contains(&header));
        assert!(verify_message(&kp.address(), "uncompressed", &signature).is_ok());
    }

    #[test]
    fn wrong_message_is_rejected() {
        let kp = keypair(7);
        let signature = sign_message(&kp, "original").unwrap();
        assert_eq!(
            verify_message(&kp.address(), "tampered", &signature),
            Err(MessageSignatureError::SignerMismatch)
        );
    }

    #[test]
    fn wrong_address_is_rejected() {
        let signer = keypair(7);
        let other = keypair(8);
        let signature = sign_message(&signer, "msg").unwrap();
        assert_eq!(
            verify_message(&other.address(), "msg", &signature),
            Err(MessageSignatureError::SignerMismatch)
        );
    }

    #[test]
    fn native_segwit_header_verifies_against_bech32_address() {
        let kp = keypair(11);
        let address = p2wpkh_address(&kp.pubkey_hash(), Network::Mainnet).unwrap();
        let signature = sign_message(&kp, "segwit").unwrap();
        let flag = STANDARD.decode(&signature).unwrap()[0] - 31;

        assert!(verify_message(&address, "segwit", &with_header(&signature, 39 + flag)).is_ok());
        // Electrum-style: compressed legacy header against a segwit address.
        assert!(verify_message(&address, "segwit", &signature).is_ok());
    }

    #[test]
    fn p2sh_wrapped_segwit_verifies() {
        let kp = keypair(12);
        let address = base58check_encode(P2SH_MAINNET, &p2sh_p2wpkh_hash(&kp.pubkey_hash()));
        let signature = sign_message(&kp, "wrapped").unwrap();
        let flag = STANDARD.decode(&signature).unwrap()[0] - 31;

        assert!(verify_message(&address, "wrapped", &with_header(&signature, 35 + flag)).is_ok());
    }

    #[test]
    fn segwit_header_against_legacy_address_is_rejected() {
        let kp = keypair(13);
        let signature = sign_message(&kp, "mixed").unwrap();
        let flag = STANDARD.decode(&signature).unwrap()[0] - 31;
        assert_eq!(
            verify_message(&kp.address(), "mixed", &with_header(&signature, 39 + flag)),
            Err(MessageSignatureError::SignerMismatch)
        );
    }

    #[test]
    fn garbage_signature_is_rejected() {
        let kp = keypair(7);
        assert_eq!(
            verify_message(&kp.address(), "msg", "!!not base64!!"),
            Err(MessageSignatureError::InvalidEncoding)
        );
        assert_eq!(
            verify_message(&kp.address(), "msg", &STANDARD.encode([31u8; 10])),
            Err(MessageSignatureError::InvalidEncoding)
        );
    }

    #[test]
    fn out_of_range_header_is_rejected() {
        let kp = keypair(7);
        let signature = sign_message(&kp, "msg").unwrap();
        assert_eq!(
            verify_message(&kp.address(), "msg", &with_header(&signature, 26)),
            Err(MessageSignatureError::InvalidHeader(26))
        );
        assert_eq!(
            verify_message(&kp.address(), "msg", &with_header(&signature, 43)),
            Err(MessageSignatureError::InvalidHeader(43))
        );
    }

    #[test]
    fn malformed_address_is_reported() {
        let kp = keypair(7);
        let signature = sign_message(&kp, "msg").unwrap();
        assert!(matches!(
            verify_message("definitely-not-an-address", "msg", &signature),
            Err(MessageSignatureError::InvalidAddress(_))
        ));
    }

    #[test]
    fn compact_size_boundaries() {
        let mut buf = Vec::new();
        write_compact_size(&mut buf, 0xfc);
        assert_eq!(buf, vec![0xfc]);

        buf.clear();
        write_compact_size(&mut buf, 0xfd);
        assert_eq!(buf, vec![0xfd, 0xfd, 0x00]);

        buf.clear();
        write_compact_size(&mut buf, 0x1_0000);
        assert_eq!(buf, vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
    }

    /// Signature produced by bitcoinjs-message for a compressed P2PKH key.
    #[test]
    fn verifies_wallet_produced_signature() {
        let address = "1F3sAm6ZtwLAUnj7d38pGFxtP3RVEvtsbV";
        let message = "This is an example of a signed message.";
        let signature =
            "H9L5yLFjti0QTHhPyFrZCT1V/MMnBtXKmoiKDZ78NDBjERki6ZTQZdSMCtkgoNmp17By9ItJr8o7ChX0XxY91nk=";
        assert!(verify_message(address, message, signature).is_ok());
        assert!(verify_message(address, "This is an example of a signed message!", signature).is_err());
        assert!(verify_message(&keypair(7).address(), message, signature).is_err());
    }

    #[test]
    fn digest_depends_on_message() {
        assert_ne!(message_digest("a"), message_digest("b"));
    }
}

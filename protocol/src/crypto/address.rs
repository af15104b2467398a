//! # Addresses
//!
//! Parsing and encoding for the three Bitcoin address families a registry
//! participant can prove ownership of:
//!
//! | Kind         | Encoding   | Mainnet / testnet tag | Payload                         |
//! |--------------|------------|-----------------------|---------------------------------|
//! | P2PKH        | base58check| `0x00` / `0x6f`       | `hash160(pubkey)`               |
//! | P2SH-P2WPKH  | base58check| `0x05` / `0xc4`       | `hash160(0x00 0x14 ‖ hash160)`  |
//! | P2WPKH       | bech32     | `bc` / `tb`           | `hash160(pubkey)`, witness v0   |
//!
//! Base58check is `base58(version ‖ payload ‖ sha256d(version ‖ payload)[..4])`.

use bech32::hrp;
use thiserror::Error;

use super::hash::double_sha256;

/// Base58check version byte of mainnet P2PKH addresses.
pub const P2PKH_MAINNET: u8 = 0x00;
/// Base58check version byte of testnet P2PKH addresses.
pub const P2PKH_TESTNET: u8 = 0x6f;
/// Base58check version byte of mainnet P2SH addresses.
pub const P2SH_MAINNET: u8 = 0x05;
/// Base58check version byte of testnet P2SH addresses.
pub const P2SH_TESTNET: u8 = 0xc4;

const CHECKSUM_LEN: usize = 4;

/// Errors while decoding an address or a base58check string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58 encoding")]
    InvalidBase58,

    #[error("base58check checksum mismatch")]
    BadChecksum,

    #[error("unknown address version byte 0x{0:02x}")]
    UnknownVersion(u8),

    #[error("invalid payload length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("unsupported witness program")]
    UnsupportedWitness,
}

/// Which Bitcoin network an address or key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

/// The hash an address commits to, tagged by address kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPayload {
    /// Legacy pay-to-pubkey-hash.
    PubkeyHash([u8; 20]),
    /// Pay-to-script-hash. The registry only verifies the P2SH-wrapped
    /// P2WPKH form of it.
    ScriptHash([u8; 20]),
    /// Native segwit v0 pay-to-witness-pubkey-hash.
    WitnessPubkeyHash([u8; 20]),
}

/// A decoded address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAddress {
    pub network: Network,
    pub payload: AddressPayload,
}

/// Parse any supported address string.
///
/// Bech32 is tried first for strings carrying a `bc1`/`tb1` prefix;
/// everything else goes through base58check.
pub fn parse_address(address: &str) -> Result<ParsedAddress, AddressError> {
    let lower = address.to_ascii_lowercase();
    if lower.starts_with("bc1") || lower.starts_with("tb1") {
        return parse_segwit(address);
    }

    let (version, payload) = base58check_decode(address)?;
    let hash = to_hash20(&payload)?;
    let (network, payload) = match version {
        P2PKH_MAINNET => (Network::Mainnet, AddressPayload::PubkeyHash(hash)),
        P2PKH_TESTNET => (Network::Testnet, AddressPayload::PubkeyHash(hash)),
        P2SH_MAINNET => (Network::Mainnet, AddressPayload::ScriptHash(hash)),
        P2SH_TESTNET => (Network::Testnet, AddressPayload::ScriptHash(hash)),
        other => return Err(AddressError::UnknownVersion(other)),
    };
    Ok(ParsedAddress { network, payload })
}

fn parse_segwit(address: &str) -> Result<ParsedAddress, AddressError> {
    let (hrp, version, program) =
        bech32::segwit::decode(address).map_err(|_| AddressError::UnsupportedWitness)?;
    if version != bech32::segwit::VERSION_0 {
        return Err(AddressError::UnsupportedWitness);
    }
    let network = if hrp == hrp::BC {
        Network::Mainnet
    } else if hrp == hrp::TB {
        Network::Testnet
    } else {
        return Err(AddressError::UnsupportedWitness);
    };
    let hash = to_hash20(&program)?;
    Ok(ParsedAddress {
        network,
        payload: AddressPayload::WitnessPubkeyHash(hash),
    })
}

fn to_hash20(bytes: &[u8]) -> Result<[u8; 20], AddressError> {
    bytes.try_into().map_err(|_| AddressError::InvalidLength {
        expected: 20,
        got: bytes.len(),
    })
}

/// Encode `version ‖ payload` as base58check.
pub fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len() + CHECKSUM_LEN);
    data.push(version);
    data.extend_from_slice(payload);
    let checksum = double_sha256(&data);
    data.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    bs58::encode(data).into_string()
}

/// Decode a base58check string into its version byte and payload.
pub fn base58check_decode(encoded: &str) -> Result<(u8, Vec<u8>), AddressError> {
    let data = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| AddressError::InvalidBase58)?;
    if data.len() < 1 + CHECKSUM_LEN {
        return Err(AddressError::InvalidLength {
            expected: 1 + CHECKSUM_LEN,
            got: data.len(),
        });
    }

    let (body, checksum) = data.split_at(data.len() - CHECKSUM_LEN);
    if double_sha256(body)[..CHECKSUM_LEN] != *checksum {
        return Err(AddressError::BadChecksum);
    }
    Ok((body[0], body[1..].to_vec()))
}

/// Render a P2PKH address for a 20-byte public key hash.
pub fn p2pkh_address(pubkey_hash: &[u8; 20], network: Network) -> String {
    let version = match network {
        Network::Mainnet => P2PKH_MAINNET,
        Network::Testnet => P2PKH_TESTNET,
    };
    base58check_encode(version, pubkey_hash)
}

/// Render a native segwit v0 address for a 20-byte public key hash.
pub fn p2wpkh_address(pubkey_hash: &[u8; 20], network: Network) -> Result<String, AddressError> {
    let hrp = match network {
        Network::Mainnet => hrp::BC,
        Network::Testnet => hrp::TB,
    };
    bech32::segwit::encode(hrp, bech32::segwit::VERSION_0, pubkey_hash)
        .map_err(|_| AddressError::UnsupportedWitness)
}

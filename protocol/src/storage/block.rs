//! # Block Structure
//!
//! A block is one entry in the registry ledger: a payload plus the link to
//! the block before it.
//!
//! ## Block Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Block                                      │
//! │  ├── hash: String        (SHA-256 hex)      │
//! │  ├── height: u64                            │
//! │  ├── previousBlockHash: String              │
//! │  ├── time: u64           (UTC seconds)      │
//! │  └── body: BlockBody                        │
//! │        ├── Genesis(String)                  │
//! │        └── Star { address, star }           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Hash Computation
//!
//! The hash is the lowercase hex SHA-256 of the JSON encoding of
//! `{height, body, time, previousBlockHash}`, in that field order. The
//! `hash` field itself is excluded, and so is the derived `storyDecoded`
//! field, which never reaches disk.
//!
//! ## Wire Shape
//!
//! Field names are camelCase and the body is untagged, so a genesis body is
//! a bare string and a star body is `{"address": .., "star": {..}}`.

use serde::{Deserialize, Serialize};

use crate::crypto::hash::sha256_hex;

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Celestial coordinates plus a free-text story.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Star {
    /// Right ascension, free-form (e.g. `"16h 29m 1.0s"`).
    pub ra: String,
    /// Declination, free-form (e.g. `"-26° 29' 24.9"`).
    pub dec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constellation: Option<String>,
    /// Story, hex-encoded once stored.
    pub story: String,
    /// Human-readable story. Only populated on lookup responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_decoded: Option<String>,
}

/// A registered star and the address that registered it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarEntry {
    pub address: String,
    pub star: Star,
}

/// What a block carries.
///
/// `Star` is listed first so untagged decoding tries the structured form
/// before falling back to a bare string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockBody {
    Star(StarEntry),
    Genesis(String),
}

impl BlockBody {
    /// The registering address, if this is a star entry.
    pub fn address(&self) -> Option<&str> {
        match self {
            BlockBody::Star(entry) => Some(&entry.address),
            BlockBody::Genesis(_) => None,
        }
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self, BlockBody::Genesis(_))
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// One ledger record. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub hash: String,
    pub height: u64,
    pub body: BlockBody,
    pub time: u64,
    /// Empty for genesis.
    pub previous_block_hash: String,
}

/// The fields covered by the block hash, in hashing order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashPreimage<'a> {
    height: u64,
    body: HashedBody<'a>,
    time: u64,
    previous_block_hash: &'a str,
}

/// Body as hashed. Mirrors [`BlockBody`] field for field, minus `storyDecoded`.
#[derive(Serialize)]
#[serde(untagged)]
enum HashedBody<'a> {
    Star { address: &'a str, star: HashedStar<'a> },
    Genesis(&'a str),
}

#[derive(Serialize)]
struct HashedStar<'a> {
    ra: &'a str,
    dec: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    magnitude: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    constellation: Option<&'a str>,
    story: &'a str,
}

impl<'a> From<&'a BlockBody> for HashedBody<'a> {
    fn from(body: &'a BlockBody) -> Self {
        match body {
            BlockBody::Star(entry) => HashedBody::Star {
                address: &entry.address,
                star: HashedStar {
                    ra: &entry.star.ra,
                    dec: &entry.star.dec,
                    magnitude: entry.star.magnitude.as_deref(),
                    constellation: entry.star.constellation.as_deref(),
                    story: &entry.star.story,
                },
            },
            BlockBody::Genesis(data) => HashedBody::Genesis(data),
        }
    }
}

impl Block {
    /// Build a block and seal it with its hash.
    pub fn new(height: u64, body: BlockBody, time: u64, previous_block_hash: String) -> Self {
        let mut block = Block {
            hash: String::new(),
            height,
            body,
            time,
            previous_block_hash,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Recompute the hash from the block's content.
    ///
    /// Use this to verify that `hash` matches what the block actually holds.
    pub fn compute_hash(&self) -> String {
        let preimage = HashPreimage {
            height: self.height,
            body: HashedBody::from(&self.body),
            time: self.time,
            previous_block_hash: &self.previous_block_hash,
        };
        // Only strings, integers and string-keyed structs: encoding cannot fail.
        let bytes = serde_json::to_vec(&preimage).expect("block preimage serialization must not fail");
        sha256_hex(&bytes)
    }

    /// Check that the stored hash matches the content.
    pub fn verify_hash(&self) -> Result<(), String> {
        let expected = self.compute_hash();
        if self.hash != expected {
            return Err(format!(
                "block {} hash mismatch: stored={}, computed={}",
                self.height, self.hash, expected
            ));
        }
        Ok(())
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn star_body(address: &str) -> BlockBody {
        BlockBody::Star(StarEntry {
            address: address.to_string(),
            star: Star {
                ra: "16h 29m 1.0s".to_string(),
                dec: "-26° 29' 24.9".to_string(),
                magnitude: None,
                constellation: None,
                story: "466f756e64".to_string(),
                story_decoded: None,
            },
        })
    }

    #[test]
    fn new_block_verifies() {
        let block = Block::new(1, star_body("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"), 1_700_000_000, "ab".repeat(32));
        assert_eq!(block.hash.len(), 64);
        assert!(block.verify_hash().is_ok());
    }

    #[test]
    fn hash_is_deterministic() {
        let a = Block::new(0, BlockBody::Genesis("g".into()), 5, String::new());
        let b = Block::new(0, BlockBody::Genesis("g".into()), 5, String::new());
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn every_field_feeds_the_hash() {
        let base = Block::new(1, BlockBody::Genesis("g".into()), 5, "p".into());
        let variants = [
            Block::new(2, BlockBody::Genesis("g".into()), 5, "p".into()),
            Block::new(1, BlockBody::Genesis("h".into()), 5, "p".into()),
            Block::new(1, BlockBody::Genesis("g".into()), 6, "p".into()),
            Block::new(1, BlockBody::Genesis("g".into()), 5, "q".into()),
        ];
        for v in variants {
            assert_ne!(v.hash, base.hash);
        }
    }

    #[test]
    fn tampered_block_fails_verification() {
        let mut block = Block::new(1, star_body("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"), 10, "x".into());
        if let BlockBody::Star(entry) = &mut block.body {
            entry.star.ra = "0h".to_string();
        }
        assert!(block.verify_hash().is_err());
    }

    #[test]
    fn decoded_story_is_not_hashed() {
        let block = Block::new(1, star_body("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"), 10, "x".into());
        let mut decorated = block.clone();
        if let BlockBody::Star(entry) = &mut decorated.body {
            entry.star.story_decoded = Some("Found".to_string());
        }
        assert_eq!(decorated.compute_hash(), block.compute_hash());
        assert!(decorated.verify_hash().is_ok());
    }

    #[test]
    fn wire_shape_is_camel_case_and_untagged() {
        let genesis = Block::new(0, BlockBody::Genesis("[---GENESIS-BLOCK---]".into()), 1, String::new());
        let json = serde_json::to_value(&genesis).unwrap();
        assert_eq!(json["body"], "[---GENESIS-BLOCK---]");
        assert_eq!(json["previousBlockHash"], "");

        let block = Block::new(1, star_body("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"), 1, genesis.hash.clone());
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["body"]["address"], "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert_eq!(json["body"]["star"]["story"], "466f756e64");
        assert!(json["body"]["star"].get("storyDecoded").is_none());
        assert!(json["body"]["star"].get("magnitude").is_none());
    }

    #[test]
    fn bodies_decode_back_to_the_right_variant() {
        let genesis: BlockBody = serde_json::from_str("\"[---GENESIS-BLOCK---]\"").unwrap();
        assert!(genesis.is_genesis());

        let star: BlockBody = serde_json::from_str(
            r#"{"address":"1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH","star":{"ra":"1","dec":"2","story":"00","magnitude":"4.2"}}"#,
        )
        .unwrap();
        assert_eq!(star.address(), Some("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"));
        match star {
            BlockBody::Star(entry) => assert_eq!(entry.star.magnitude.as_deref(), Some("4.2")),
            BlockBody::Genesis(_) => panic!("expected star body"),
        }
    }
}

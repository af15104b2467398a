//! Star story codec.
//!
//! Stories are stored hex-encoded and decoded again on the way out of a
//! lookup, next to the stored form.

use crate::storage::block::{Block, BlockBody};

pub fn encode_story(story: &str) -> String {
    hex::encode(story.as_bytes())
}

/// Decode a stored story. Invalid hex or non-UTF-8 bytes decode lossily
/// rather than failing the lookup.
pub fn decode_story(encoded: &str) -> String {
    match hex::decode(encoded) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

/// A copy of `block` with `storyDecoded` filled in for star entries.
pub fn with_decoded_story(mut block: Block) -> Block {
    if let BlockBody::Star(entry) = &mut block.body {
        entry.star.story_decoded = Some(decode_story(&entry.star.story));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STORY_BYTE_LIMIT;
    use crate::storage::block::{Star, StarEntry};

    #[test]
    fn story_round_trip() {
        let story = "Found star using https://www.google.com/sky/";
        let encoded = encode_story(story);
        assert!(encoded.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(decode_story(&encoded), story);
    }

    #[test]
    fn non_ascii_story_round_trips() {
        let story = "Étoile ★ polaire";
        assert_eq!(decode_story(&encode_story(story)), story);
    }

    #[test]
    fn story_at_byte_limit_round_trips() {
        let story = format!("ab{}", "★".repeat(166));
        assert_eq!(story.len(), STORY_BYTE_LIMIT);
        assert!(story.chars().count() < STORY_BYTE_LIMIT);

        let encoded = encode_story(&story);
        assert_eq!(encoded.len(), 2 * STORY_BYTE_LIMIT);
        assert_eq!(decode_story(&encoded), story);
    }

    #[test]
    fn known_encoding() {
        assert_eq!(encode_story("hi"), "6869");
    }

    #[test]
    fn garbage_decodes_to_empty() {
        assert_eq!(decode_story("zz"), "");
    }

    #[test]
    fn decorating_leaves_hash_and_hex_alone() {
        let body = BlockBody::Star(StarEntry {
            address: "a".into(),
            star: Star {
                ra: "1".into(),
                dec: "2".into(),
                magnitude: None,
                constellation: None,
                story: encode_story("hi"),
                story_decoded: None,
            },
        });
        let block = Block::new(1, body, 0, "p".into());
        let decorated = with_decoded_story(block.clone());
        assert_eq!(decorated.hash, block.hash);
        assert!(decorated.verify_hash().is_ok());
        match decorated.body {
            BlockBody::Star(entry) => {
                assert_eq!(entry.star.story, "6869");
                assert_eq!(entry.star.story_decoded.as_deref(), Some("hi"));
            }
            BlockBody::Genesis(_) => panic!("expected star"),
        }

        let genesis = Block::new(0, BlockBody::Genesis("g".into()), 0, String::new());
        assert_eq!(with_decoded_story(genesis.clone()), genesis);
    }
}

//! Input checks for registry operations.

use serde::{Deserialize, Serialize};

use super::story::encode_story;
use crate::config::{MAX_ADDRESS_LEN, MIN_ADDRESS_LEN};
use crate::storage::block::Star;

/// Star data as a client submits it, before any checks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarInput {
    pub ra: Option<String>,
    pub dec: Option<String>,
    pub magnitude: Option<String>,
    pub constellation: Option<String>,
    /// Plain-text story.
    pub story: Option<String>,
}

impl StarInput {
    pub fn new(ra: &str, dec: &str, story: &str) -> Self {
        Self {
            ra: Some(ra.to_string()),
            dec: Some(dec.to_string()),
            story: Some(story.to_string()),
            ..Self::default()
        }
    }

    /// The stored form: story hex-encoded, empty optionals dropped.
    ///
    /// Callers run [`check_star`] first; missing required fields become
    /// empty strings here.
    pub fn into_star(self) -> Star {
        Star {
            ra: self.ra.unwrap_or_default(),
            dec: self.dec.unwrap_or_default(),
            magnitude: self.magnitude.filter(|m| !m.trim().is_empty()),
            constellation: self.constellation.filter(|c| !c.trim().is_empty()),
            story: encode_story(self.story.as_deref().unwrap_or_default()),
            story_decoded: None,
        }
    }
}

/// Addresses are 26 to 50 characters. Whether the address is spendable is
/// left to signature verification.
pub fn check_address(address: &str) -> bool {
    let len = address.chars().count();
    (MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&len)
        && address.chars().all(|c| c.is_ascii_alphanumeric())
}

fn non_blank(field: &Option<String>) -> bool {
    field.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

/// `ra`, `dec` and `story` must be present and non-blank, and the story must
/// fit in `story_byte_limit` bytes.
pub fn check_star(star: &StarInput, story_byte_limit: usize) -> bool {
    non_blank(&star.ra)
        && non_blank(&star.dec)
        && non_blank(&star.story)
        && star
            .story
            .as_deref()
            .map(|s| s.len() <= story_byte_limit)
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STORY_BYTE_LIMIT;

    #[test]
    fn address_length_bounds() {
        assert!(!check_address(&"1".repeat(25)));
        assert!(check_address(&"1".repeat(26)));
        assert!(check_address(&"1".repeat(50)));
        assert!(!check_address(&"1".repeat(51)));
        assert!(check_address("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"));
        assert!(check_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"));
    }

    #[test]
    fn address_with_separator_is_rejected() {
        // A ':' would corrupt the challenge message layout.
        assert!(!check_address("1BgGZ9tcN4rm9KBzDn7K:rQz87SZ26SAMH"));
        assert!(!check_address("1BgGZ9tcN4rm9KBzDn7K rQz87SZ26SAMH"));
    }

    #[test]
    fn star_requires_fields() {
        assert!(check_star(&StarInput::new("12h", "-1°", "hi"), STORY_BYTE_LIMIT));
        assert!(!check_star(&StarInput::new("", "-1°", "hi"), STORY_BYTE_LIMIT));
        assert!(!check_star(&StarInput::new("12h", "  ", "hi"), STORY_BYTE_LIMIT));
        assert!(!check_star(&StarInput::new("12h", "-1°", ""), STORY_BYTE_LIMIT));
        assert!(!check_star(&StarInput::default(), STORY_BYTE_LIMIT));
    }

    #[test]
    fn story_limit_is_in_bytes() {
        let at_limit = "a".repeat(STORY_BYTE_LIMIT);
        let over = "a".repeat(STORY_BYTE_LIMIT + 1);
        assert!(check_star(&StarInput::new("1", "2", &at_limit), STORY_BYTE_LIMIT));
        assert!(!check_star(&StarInput::new("1", "2", &over), STORY_BYTE_LIMIT));

        // 250 two-byte characters fit; one more does not.
        let wide = "é".repeat(250);
        assert!(check_star(&StarInput::new("1", "2", &wide), STORY_BYTE_LIMIT));
        let wider = "é".repeat(251);
        assert!(!check_star(&StarInput::new("1", "2", &wider), STORY_BYTE_LIMIT));
    }

    #[test]
    fn into_star_encodes_story() {
        let mut input = StarInput::new("12h", "-1°", "hi");
        input.magnitude = Some("".to_string());
        input.constellation = Some("Lyra".to_string());
        let star = input.into_star();
        assert_eq!(star.story, "6869");
        assert_eq!(star.magnitude, None);
        assert_eq!(star.constellation.as_deref(), Some("Lyra"));
    }

    #[test]
    fn star_input_tolerates_missing_fields() {
        let input: StarInput = serde_json::from_str(r#"{"ra":"1"}"#).unwrap();
        assert_eq!(input.ra.as_deref(), Some("1"));
        assert!(input.story.is_none());
    }
}

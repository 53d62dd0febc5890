//! Hierarchical tags encoded into metric names.
//!
//! A tagged name looks like `ns|grp|tgt|act|subTAGbase`: up to five ordered
//! dimension values joined by [`TAG_DELIMITER`], then [`TAG_METRIC_DELIMITER`],
//! then the base metric name.

use optron_shared::{ErrorCode, ErrorEnvelope};
use std::collections::BTreeMap;
use std::fmt;

/// Separator between tag levels.
pub const TAG_DELIMITER: &str = "|";

/// Marker between the tags and the base metric name.
pub const TAG_METRIC_DELIMITER: &str = "TAG";

/// Maximum number of tag levels.
pub const MAX_TAG_LEVELS: usize = 5;

/// Export keys of each level, outermost first.
pub const TAG_KEYS: [&str; MAX_TAG_LEVELS] = ["ns", "grp", "tgt", "act", "sub"];

/// Values that cannot be encoded losslessly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    /// A tag value contains a reserved delimiter.
    #[error("tag {key} value {value:?} contains a reserved delimiter")]
    ReservedInValue {
        /// Level key.
        key: &'static str,
        /// Offending value.
        value: String,
    },
    /// A base name contains the tag marker.
    #[error("metric name {0:?} contains the reserved tag marker")]
    ReservedInName(String),
    /// More levels than [`MAX_TAG_LEVELS`].
    #[error("{0} tag levels given, at most {MAX_TAG_LEVELS} supported")]
    TooManyLevels(usize),
    /// An empty level is followed by a non-empty one.
    #[error("tag {key} is set after an empty level")]
    Gap {
        /// First non-empty key after the gap.
        key: &'static str,
    },
}

impl From<TagError> for ErrorEnvelope {
    fn from(error: TagError) -> Self {
        Self::expected(ErrorCode::new("metrics", "invalid_tag"), error.to_string())
    }
}

/// Ordered tag values, outermost level first.
///
/// Levels are contiguous: construction stops at the first empty value, so an
/// encoded board always decodes back to the same levels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagBoard {
    levels: Vec<String>,
}

impl TagBoard {
    /// Pack up to five values, stopping at the first empty one. Values past
    /// the fifth are dropped.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let levels = values
            .into_iter()
            .map(Into::into)
            .take_while(|value| !value.is_empty())
            .take(MAX_TAG_LEVELS)
            .collect();
        Self { levels }
    }

    /// Like [`TagBoard::new`] but rejects input that would not round-trip.
    pub fn try_new<I, S>(values: I) -> Result<Self, TagError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.len() > MAX_TAG_LEVELS {
            return Err(TagError::TooManyLevels(values.len()));
        }
        let mut seen_empty = false;
        for (key, value) in TAG_KEYS.iter().copied().zip(&values) {
            if value.is_empty() {
                seen_empty = true;
                continue;
            }
            if seen_empty {
                return Err(TagError::Gap { key });
            }
            if value.contains(TAG_DELIMITER) || value.contains(TAG_METRIC_DELIMITER) {
                return Err(TagError::ReservedInValue {
                    key,
                    value: value.clone(),
                });
            }
        }
        Ok(Self::new(values))
    }

    /// Number of set levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether no level is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Value at the level named `key` (`ns`, `grp`, `tgt`, `act` or `sub`).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        let index = TAG_KEYS.iter().position(|candidate| *candidate == key)?;
        self.levels.get(index).map(String::as_str)
    }

    /// `(key, value)` pairs of the set levels, outermost first.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        TAG_KEYS.iter().copied().zip(self.levels.iter().map(String::as_str))
    }

    /// Set levels keyed by their export names.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        self.iter()
            .map(|(key, value)| (key, value.to_owned()))
            .collect()
    }

    fn decode(encoded: &str) -> Self {
        if encoded.is_empty() {
            return Self::default();
        }
        Self::new(encoded.split(TAG_DELIMITER))
    }
}

impl fmt::Display for TagBoard {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.levels.join(TAG_DELIMITER))
    }
}

/// Encode `board` and `name` into one metric name.
#[must_use]
pub fn tagged_metric_name(name: &str, board: &TagBoard) -> String {
    format!("{board}{TAG_METRIC_DELIMITER}{name}")
}

/// Like [`tagged_metric_name`] but rejects a base name holding the marker.
pub fn try_tagged_metric_name(name: &str, board: &TagBoard) -> Result<String, TagError> {
    if name.contains(TAG_METRIC_DELIMITER) {
        return Err(TagError::ReservedInName(name.to_owned()));
    }
    Ok(tagged_metric_name(name, board))
}

/// Whether `name` carries tags.
#[must_use]
pub fn is_tagged(name: &str) -> bool {
    name.contains(TAG_METRIC_DELIMITER)
}

/// Split a tagged name into its base name and tags, on the first marker.
///
/// Returns `None` for untagged names. Empty levels in foreign input end the
/// hierarchy, like [`TagBoard::new`].
#[must_use]
pub fn parse_tagged_metric(name: &str) -> Option<(&str, TagBoard)> {
    let (tags, base) = name.split_once(TAG_METRIC_DELIMITER)?;
    Some((base, TagBoard::decode(tags)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_parses_three_levels() {
        let board = TagBoard::new(["svc", "db", "query"]);
        let tagged = tagged_metric_name("latency", &board);
        assert_eq!(tagged, "svc|db|queryTAGlatency");
        assert!(is_tagged(&tagged));

        let (base, parsed) = parse_tagged_metric(&tagged).expect("tagged");
        assert_eq!(base, "latency");
        assert_eq!(parsed, board);
        let map = parsed.to_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("ns").map(String::as_str), Some("svc"));
        assert_eq!(map.get("grp").map(String::as_str), Some("db"));
        assert_eq!(map.get("tgt").map(String::as_str), Some("query"));
    }

    #[test]
    fn empty_value_truncates_hierarchy() {
        let board = TagBoard::new(["svc", "", "query"]);
        assert_eq!(board.len(), 1);
        assert_eq!(board.to_string(), "svc");
        assert_eq!(board.get("tgt"), None);
    }

    #[test]
    fn extra_levels_are_dropped() {
        let board = TagBoard::new(["a", "b", "c", "d", "e", "f"]);
        assert_eq!(board.len(), MAX_TAG_LEVELS);
        assert_eq!(board.get("sub"), Some("e"));
    }

    #[test]
    fn untagged_names_do_not_parse() {
        assert!(!is_tagged("plain.counter"));
        assert!(parse_tagged_metric("plain.counter").is_none());
    }

    #[test]
    fn empty_board_round_trips() {
        let tagged = tagged_metric_name("x", &TagBoard::default());
        assert_eq!(tagged, "TAGx");
        let (base, board) = parse_tagged_metric(&tagged).expect("tagged");
        assert_eq!(base, "x");
        assert!(board.is_empty());
    }

    #[test]
    fn checked_constructors_reject_reserved_text() {
        assert_eq!(
            TagBoard::try_new(["svc", "a|b"]),
            Err(TagError::ReservedInValue {
                key: "grp",
                value: "a|b".to_owned(),
            })
        );
        assert_eq!(
            TagBoard::try_new(["svc", "", "x"]),
            Err(TagError::Gap { key: "tgt" })
        );
        assert_eq!(
            TagBoard::try_new(["a", "b", "c", "d", "e", "f"]),
            Err(TagError::TooManyLevels(6))
        );
        assert!(try_tagged_metric_name("myTAGname", &TagBoard::default()).is_err());
        assert!(TagBoard::try_new(["svc", "db", ""]).is_ok());
    }
}

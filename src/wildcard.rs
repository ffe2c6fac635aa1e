//! Wildcard Matcher
//!
//! Single-level (`*`) and trailing multi-level (`#`) topic patterns.
//! Wildcards are rare and numerous-in-patterns but small per agent, so a
//! linear scan at publish time is correct and keeps the topic trie
//! (`crate::topic`) pristine of anything but exact topics.

use crate::topic::segments;

/// A parsed, validated wildcard pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WildcardPattern {
    raw: String,
    parts: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    /// `*` — matches exactly one segment.
    Single,
    /// `#` — matches zero or more trailing segments. Only ever the last
    /// entry in `parts`.
    MultiTail,
}

impl WildcardPattern {
    /// Parse `pattern`. Returns `None` (and the caller should log a warning)
    /// if `#` appears anywhere but the last segment, per spec: "must be the
    /// last segment, otherwise the subscribe call is rejected".
    pub fn parse(pattern: &str) -> Option<Self> {
        let raw_segments = segments(pattern);
        let mut parts = Vec::with_capacity(raw_segments.len());
        for (i, seg) in raw_segments.iter().enumerate() {
            let is_last = i + 1 == raw_segments.len();
            match *seg {
                "#" if is_last => parts.push(Segment::MultiTail),
                "#" => return None,
                "*" => parts.push(Segment::Single),
                other => parts.push(Segment::Literal(other.to_string())),
            }
        }
        Some(Self {
            raw: pattern.to_string(),
            parts,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `true` iff this pattern actually contains a wildcard segment (a
    /// plain dotted string with no `*`/`#` parses successfully but isn't
    /// really a wildcard pattern — callers use this to decide whether a
    /// publish target is "concrete").
    pub fn is_wildcard(topic_or_pattern: &str) -> bool {
        segments(topic_or_pattern)
            .iter()
            .any(|s| *s == "*" || *s == "#")
    }

    /// Segment-wise match against a concrete topic.
    pub fn matches(&self, topic: &str) -> bool {
        let topic_segments = segments(topic);
        let mut ti = 0usize;
        for part in &self.parts {
            match part {
                Segment::MultiTail => return true,
                Segment::Single => {
                    if ti >= topic_segments.len() {
                        return false;
                    }
                    ti += 1;
                }
                Segment::Literal(lit) => {
                    if topic_segments.get(ti) != Some(&lit.as_str()) {
                        return false;
                    }
                    ti += 1;
                }
            }
        }
        ti == topic_segments.len()
    }
}

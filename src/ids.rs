//! Dense integer identifiers used throughout the dispatch core.
//!
//! Each wraps a `u64` so the compiler keeps agent ids, topic ids, stream
//! ids, and event ids from being accidentally swapped for one another.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Agent identifier. `0` is reserved for "invalid / system".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AgentId(pub u64);

impl AgentId {
    pub const INVALID: AgentId = AgentId(0);

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Interned id for a dot-separated topic string. `0` denotes the root/empty topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TopicId(pub u64);

impl TopicId {
    pub const ROOT: TopicId = TopicId(0);
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "topic#{}", self.0)
    }
}

/// Interned id for a stream name. Lives in a disjoint id space from `TopicId`
/// even though both are produced by the same underlying interner instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StreamId(pub u64);

impl StreamId {
    pub const NONE: StreamId = StreamId(0);
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Process-monotonic event identifier, assigned at event construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_agent_id_is_zero() {
        assert!(!AgentId::INVALID.is_valid());
        assert!(AgentId(1).is_valid());
    }

    #[test]
    fn ids_compare_by_inner_value() {
        assert!(TopicId(1) < TopicId(2));
        assert_eq!(StreamId(5), StreamId(5));
    }
}

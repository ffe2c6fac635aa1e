//! String Interner
//!
//! Bidirectional map between topic/stream strings and compact integer ids.
//! A single interner instance backs both `TopicId` and `StreamId` — they
//! share the same string->id table but the ids are wrapped in disjoint
//! newtypes at the call site so they can't be confused with one another.

use std::collections::HashMap;

const SENTINEL: &str = "<unresolved>";

/// Bidirectional string<->u64 interner.
///
/// `intern("")` always returns `0`; every other distinct non-empty string
/// gets the next unused id starting from `1`. Resolution of an id that was
/// never issued returns a sentinel string and logs an error rather than
/// panicking — interning is a hot path called from every `publish`, and a
/// caller passing back a stale/foreign id should not be able to crash the
/// bus.
#[derive(Debug, Default)]
pub struct StringInterner {
    to_id: HashMap<String, u64>,
    to_str: Vec<String>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            to_id: HashMap::new(),
            // index 0 is the reserved empty/root id
            to_str: vec![String::new()],
        }
    }

    /// Intern `s`, returning its existing id or allocating the next one.
    pub fn intern(&mut self, s: &str) -> u64 {
        if s.is_empty() {
            return 0;
        }
        if let Some(&id) = self.to_id.get(s) {
            return id;
        }
        let next = self.to_str.len() as u64;
        assert!(
            next != 0,
            "StringInterner: id counter wrapped to 0, this is a fatal invariant violation"
        );
        self.to_str.push(s.to_string());
        self.to_id.insert(s.to_string(), next);
        next
    }

    /// Resolve `id` back to its string. Out-of-range ids return a sentinel
    /// and log an error; they never panic.
    pub fn resolve(&self, id: u64) -> &str {
        match self.to_str.get(id as usize) {
            Some(s) => s.as_str(),
            None => {
                tracing::error!(id, "StringInterner: resolve of unknown id");
                SENTINEL
            }
        }
    }

    pub fn len(&self) -> usize {
        self.to_str.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_str.len() <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_maps_to_zero() {
        let mut interner = StringInterner::new();
        assert_eq!(interner.intern(""), 0);
        assert_eq!(interner.resolve(0), "");
    }

    #[test]
    fn intern_is_idempotent() {
        let mut interner = StringInterner::new();
        let a = interner.intern("x.y.z");
        let b = interner.intern("x.y.z");
        assert_eq!(a, b);
        assert_ne!(a, 0);
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let mut interner = StringInterner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        assert_ne!(a, b);
    }

    #[test]
    fn round_trip_identity() {
        let mut interner = StringInterner::new();
        for s in ["Order.Ack", "BTCUSD", "a.b.c.d"] {
            let id = interner.intern(s);
            assert_eq!(interner.resolve(id), s);
        }
    }

    #[test]
    fn resolve_out_of_range_returns_sentinel() {
        let interner = StringInterner::new();
        assert_eq!(interner.resolve(9999), "<unresolved>");
    }
}

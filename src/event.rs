//! Event Model
//!
//! The closed, tagged-variant set of every event kind the dispatch core
//! carries (spec §6). Numeric fields use fixed-point integer scaling
//! (`SCALE`) rather than `f64`, since exactness across latency-shifted
//! replay is an explicit invariant (spec §3) the teacher's own `f64`
//! price type does not give us.

use crate::clock::Micros;
use crate::ids::EventId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fixed-point scale factor for price/quantity fields (spec §3 default).
pub const SCALE: i64 = 10_000;

/// A fixed-point price or quantity, in ticks of `1 / SCALE`.
pub type Ticks = i64;

pub type OrderId = u64;
pub type Xid = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    Market,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    InsufficientFunds,
    InvalidPrice,
    InvalidSize,
    MarketHalted,
    SelfTrade,
    Unknown(String),
}

/// A single L2 price level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price: Ticks,
    pub size: Ticks,
}

/// The closed set of event kinds the dispatch core routes and schedules.
/// Every variant carries the fields needed by the agents in spec §6;
/// `created_at`/`event_id` are tracked on the enclosing `Event` wrapper
/// rather than duplicated into every variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    // --- Order lifecycle ---
    PlaceOrder {
        order_id: OrderId,
        kind: OrderKind,
        token_id: String,
        side: Side,
        price: Ticks,
        size: Ticks,
    },
    OrderAck {
        order_id: OrderId,
        kind: OrderKind,
        /// Expiration workflow timeout, if the placing agent requested one
        /// (spec §8 S5: `LimitOrderAck{xid, timeout}`).
        timeout_us: Option<Micros>,
    },
    OrderReject {
        order_id: OrderId,
        kind: OrderKind,
        reason: RejectReason,
    },
    PartialFill {
        order_id: OrderId,
        price: Ticks,
        size: Ticks,
        leaves_qty: Ticks,
    },
    FullFill {
        order_id: OrderId,
        price: Ticks,
        size: Ticks,
    },
    PartialCancel {
        order_id: OrderId,
        size: Ticks,
    },
    FullCancel {
        order_id: OrderId,
    },
    PartialCancelAck {
        order_id: OrderId,
        cancelled_qty: Ticks,
    },
    FullCancelAck {
        order_id: OrderId,
    },
    PartialCancelReject {
        order_id: OrderId,
        reason: RejectReason,
    },
    FullCancelReject {
        order_id: OrderId,
        reason: RejectReason,
    },
    Expired {
        order_id: OrderId,
    },

    // --- Market data ---
    L2Snapshot {
        token_id: String,
        bids: Vec<Level>,
        asks: Vec<Level>,
        exchange_seq: u64,
    },

    // --- Control ---
    Bang,

    // --- Expiration workflow (spec §8 S5) ---
    CheckExpiration {
        xid: Xid,
    },
    TriggerExpired {
        xid: Xid,
    },
    AckTriggerExpired {
        xid: Xid,
    },
    RejectTriggerExpired {
        xid: Xid,
    },

    // --- Trade prints ---
    Trade {
        token_id: String,
        price: Ticks,
        size: Ticks,
        aggressor_side: Side,
    },
}

/// An event with its creation timestamp and process-monotonic id (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub created_at: Micros,
    pub event_id: EventId,
    pub kind: EventKind,
}

/// Events are reference-counted so fan-out to many subscribers is cheap
/// (spec §3: "Events are carried by reference-counted shared ownership").
pub type SharedEvent = Arc<Event>;

impl Event {
    pub fn new(created_at: Micros, event_id: EventId, kind: EventKind) -> SharedEvent {
        Arc::new(Self {
            created_at,
            event_id,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_opposite_round_trips() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite().opposite(), Side::Sell);
    }

    #[test]
    fn event_is_shared_cheaply() {
        let e = Event::new(0, EventId(1), EventKind::Bang);
        let e2 = Arc::clone(&e);
        assert_eq!(Arc::strong_count(&e), 2);
        assert_eq!(e2.kind, EventKind::Bang);
    }
}

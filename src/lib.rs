//! Deterministic, single-threaded, discrete-event dispatch core for
//! latency-realistic market microstructure studies.
//!
//! ```text
//!                     +-----------------+
//!   register/subscribe|    EventBus     |  publish/schedule_at/step
//!   ------------------>  - StringInterner|<------------------------
//!                     |  - TopicTrie     |
//!                     |  - wildcard subs |
//!                     |  - Scheduler     |
//!                     |  - LatencyParams |
//!                     |  - HookChain     |
//!                     +--------+---------+
//!                              |
//!                      dispatch to Box<dyn Agent>
//!                              v
//!                  market makers, matching adapter,
//!                  cancellation watchdog, environment publisher
//! ```
//!
//! Everything here is single-threaded and in-process: one `EventBus` drives
//! one simulation, one event at a time, with no wall-clock coupling. Build
//! a session by registering agents, subscribing them to topics, publishing
//! or scheduling the first events, then calling `EventBus::step` in a loop
//! until the queue drains.

pub mod agent;
pub mod bus;
pub mod clock;
pub mod event;
pub mod hooks;
pub mod ids;
pub mod interner;
pub mod latency;
pub mod scheduler;
pub mod topic;
pub mod wildcard;

pub use agent::{Agent, AgentBase, AgentContext, EventHandler, HasAgentBase};
pub use bus::{BusConfig, BusStats, EventBus};
pub use clock::{Micros, SimClock};
pub use event::{Event, EventKind, Level, OrderId, OrderKind, RejectReason, SharedEvent, Side, Ticks, Xid, SCALE};
pub use hooks::{HookChain, PrePublishHook};
pub use ids::{AgentId, EventId, StreamId, TopicId};
pub use interner::StringInterner;
pub use latency::{LatencyParams, LatencyStats};
pub use scheduler::{ScheduledEvent, Scheduler};
pub use topic::TopicTrie;
pub use wildcard::WildcardPattern;

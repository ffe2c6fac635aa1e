//! Agent Base
//!
//! `Agent` is the trait object every strategy, matching adapter, watchdog,
//! and environment publisher implements (spec §4.4, §6). Concrete agents
//! don't implement `Agent` directly — they embed an `AgentBase` for its
//! bookkeeping (reentrancy flag, reentrant queue, per-stream diagnostics)
//! and implement `EventHandler` for the one event kind they actually care
//! about; a blanket impl wires the two together, the same "small trait +
//! defaulted per-kind methods" shape as the teacher's `Strategy` trait in
//! `strategy.rs`.

use crate::bus::EventBus;
use crate::clock::Micros;
use crate::event::{Event, EventKind, Level, OrderId, OrderKind, RejectReason, Side, Ticks, Xid};
use crate::ids::{AgentId, StreamId};
use crate::scheduler::ScheduledEvent;
use std::collections::HashMap;

/// The trait object the bus drives. Implemented via the blanket impl below
/// for any type that is both `HasAgentBase` and `EventHandler` — concrete
/// agents should implement those two instead of this one directly.
pub trait Agent {
    fn id(&self) -> AgentId;
    fn set_id(&mut self, id: AgentId);

    /// Dispatch a single delivered event. Called by `EventBus::step` with
    /// itself as `bus` so the agent can publish or self-schedule from
    /// inside the handler without the agent holding a stored reference
    /// back to the bus (spec §4.4's "agent holds a reference to the bus"
    /// is rendered here as a reference passed in per call, since a stored
    /// back-reference would alias the bus's own `&mut self` in `step`).
    fn process(
        &mut self,
        bus: &mut EventBus,
        event: &Event,
        topic_id: crate::ids::TopicId,
        publisher: AgentId,
        now: Micros,
        stream_id: StreamId,
        sequence_number: u64,
    ) -> anyhow::Result<()>;

    /// Mirrors whether the bus currently considers this agent mid-handler.
    /// `EventBus` tracks the authoritative copy of this itself (the agent
    /// is physically absent from its registry for the duration of its own
    /// `process` call, so it cannot be queried mid-call); these accessors
    /// exist so the flag is still visible to the agent's own bookkeeping
    /// and to tests.
    fn is_processing(&self) -> bool;
    fn set_processing(&mut self, flag: bool);
    /// Not used by `EventBus::step` for routing (it keeps its own
    /// reentrant buffer, see `bus.rs`); kept on the trait for agents that
    /// want to track their own queued self-publishes.
    fn queue_reentrant(&mut self, event: ScheduledEvent);
    fn flush_reentrant_queue(&mut self) -> Vec<ScheduledEvent>;

    /// Display name for logging. Defaults to a generic label; concrete
    /// agents are expected to override this via `EventHandler::name`.
    fn name(&self) -> &str {
        "agent"
    }
}

/// Convenience handle passed into every `EventHandler` callback, bundling
/// the agent's own id with a mutable view of the bus so handlers can
/// publish, self-schedule, and read the clock without extra plumbing.
pub struct AgentContext<'a> {
    bus: &'a mut EventBus,
    self_id: AgentId,
    now: Micros,
    stream_id: StreamId,
}

impl<'a> AgentContext<'a> {
    pub fn self_id(&self) -> AgentId {
        self.self_id
    }

    pub fn now(&self) -> Micros {
        self.now
    }

    /// The stream the triggering event arrived on, if any.
    pub fn incoming_stream(&self) -> StreamId {
        self.stream_id
    }

    /// Publish `kind` on `topic` as this agent, optionally tagging it with
    /// a stream for per-stream ordering (spec §4.3).
    pub fn publish(&mut self, topic: &str, kind: EventKind, stream: Option<&str>) {
        self.bus.publish(self.self_id, topic, kind, stream);
    }

    /// Schedule `kind` for delivery back to this same agent at `target_time`,
    /// bypassing latency sampling (spec §4.3's self-scheduled timers).
    pub fn schedule_for_self_at(&mut self, target_time: Micros, topic: &str, kind: EventKind, stream: Option<&str>) {
        self.bus
            .schedule_at(self.self_id, self.self_id, topic, kind, target_time, stream);
    }

    pub fn bus(&self) -> &EventBus {
        self.bus
    }
}

/// Per-kind handlers with no-op defaults (spec §4.4: "the convenience base
/// supplies a no-op default for every kind so subclasses override only the
/// ones they care about"). Mirrors the teacher's `Strategy` trait, whose
/// `on_book_update`/`on_fill`/... methods are all individually defaulted.
#[allow(unused_variables)]
pub trait EventHandler {
    fn on_place_order(
        &mut self,
        ctx: &mut AgentContext,
        order_id: OrderId,
        kind: OrderKind,
        token_id: &str,
        side: Side,
        price: Ticks,
        size: Ticks,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_order_ack(
        &mut self,
        ctx: &mut AgentContext,
        order_id: OrderId,
        kind: OrderKind,
        timeout_us: Option<Micros>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_order_reject(
        &mut self,
        ctx: &mut AgentContext,
        order_id: OrderId,
        kind: OrderKind,
        reason: &RejectReason,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_partial_fill(
        &mut self,
        ctx: &mut AgentContext,
        order_id: OrderId,
        price: Ticks,
        size: Ticks,
        leaves_qty: Ticks,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_full_fill(&mut self, ctx: &mut AgentContext, order_id: OrderId, price: Ticks, size: Ticks) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_partial_cancel(&mut self, ctx: &mut AgentContext, order_id: OrderId, size: Ticks) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_full_cancel(&mut self, ctx: &mut AgentContext, order_id: OrderId) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_partial_cancel_ack(&mut self, ctx: &mut AgentContext, order_id: OrderId, cancelled_qty: Ticks) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_full_cancel_ack(&mut self, ctx: &mut AgentContext, order_id: OrderId) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_partial_cancel_reject(
        &mut self,
        ctx: &mut AgentContext,
        order_id: OrderId,
        reason: &RejectReason,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_full_cancel_reject(
        &mut self,
        ctx: &mut AgentContext,
        order_id: OrderId,
        reason: &RejectReason,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_expired(&mut self, ctx: &mut AgentContext, order_id: OrderId) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_l2_snapshot(
        &mut self,
        ctx: &mut AgentContext,
        token_id: &str,
        bids: &[Level],
        asks: &[Level],
        exchange_seq: u64,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_bang(&mut self, ctx: &mut AgentContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_check_expiration(&mut self, ctx: &mut AgentContext, xid: Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_trigger_expired(&mut self, ctx: &mut AgentContext, xid: Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_ack_trigger_expired(&mut self, ctx: &mut AgentContext, xid: Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_reject_trigger_expired(&mut self, ctx: &mut AgentContext, xid: Xid) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_trade(
        &mut self,
        ctx: &mut AgentContext,
        token_id: &str,
        price: Ticks,
        size: Ticks,
        aggressor_side: Side,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Display name used in logging; override to identify the concrete agent.
    fn name(&self) -> &str {
        "agent"
    }
}

/// Visits `kind` and calls the matching `EventHandler` method.
fn dispatch_event<H: EventHandler + ?Sized>(handler: &mut H, ctx: &mut AgentContext, kind: &EventKind) -> anyhow::Result<()> {
    match kind {
        EventKind::PlaceOrder {
            order_id,
            kind,
            token_id,
            side,
            price,
            size,
        } => handler.on_place_order(ctx, *order_id, *kind, token_id, *side, *price, *size),
        EventKind::OrderAck {
            order_id,
            kind,
            timeout_us,
        } => handler.on_order_ack(ctx, *order_id, *kind, *timeout_us),
        EventKind::OrderReject { order_id, kind, reason } => handler.on_order_reject(ctx, *order_id, *kind, reason),
        EventKind::PartialFill {
            order_id,
            price,
            size,
            leaves_qty,
        } => handler.on_partial_fill(ctx, *order_id, *price, *size, *leaves_qty),
        EventKind::FullFill { order_id, price, size } => handler.on_full_fill(ctx, *order_id, *price, *size),
        EventKind::PartialCancel { order_id, size } => handler.on_partial_cancel(ctx, *order_id, *size),
        EventKind::FullCancel { order_id } => handler.on_full_cancel(ctx, *order_id),
        EventKind::PartialCancelAck { order_id, cancelled_qty } => {
            handler.on_partial_cancel_ack(ctx, *order_id, *cancelled_qty)
        }
        EventKind::FullCancelAck { order_id } => handler.on_full_cancel_ack(ctx, *order_id),
        EventKind::PartialCancelReject { order_id, reason } => handler.on_partial_cancel_reject(ctx, *order_id, reason),
        EventKind::FullCancelReject { order_id, reason } => handler.on_full_cancel_reject(ctx, *order_id, reason),
        EventKind::Expired { order_id } => handler.on_expired(ctx, *order_id),
        EventKind::L2Snapshot {
            token_id,
            bids,
            asks,
            exchange_seq,
        } => handler.on_l2_snapshot(ctx, token_id, bids, asks, *exchange_seq),
        EventKind::Bang => handler.on_bang(ctx),
        EventKind::CheckExpiration { xid } => handler.on_check_expiration(ctx, *xid),
        EventKind::TriggerExpired { xid } => handler.on_trigger_expired(ctx, *xid),
        EventKind::AckTriggerExpired { xid } => handler.on_ack_trigger_expired(ctx, *xid),
        EventKind::RejectTriggerExpired { xid } => handler.on_reject_trigger_expired(ctx, *xid),
        EventKind::Trade {
            token_id,
            price,
            size,
            aggressor_side,
        } => handler.on_trade(ctx, token_id, *price, *size, *aggressor_side),
    }
}

/// Shared bookkeeping every concrete agent needs: identity, reentrancy
/// state, and per-incoming-stream diagnostics (spec §4.4). Concrete agents
/// embed this as a field rather than inheriting it — Rust has no
/// implementation inheritance, so composition plus the `HasAgentBase`
/// delegation below stands in for the teacher's base-class convenience.
#[derive(Debug, Default)]
pub struct AgentBase {
    id: AgentId,
    processing: bool,
    reentrant_queue: Vec<ScheduledEvent>,
    last_processed_ts: HashMap<(StreamId, AgentId), Micros>,
}

impl AgentBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostic: last time an event from `(stream, publisher)` was
    /// processed by this agent, used to detect stalled streams.
    pub fn last_processed(&self, stream: StreamId, publisher: AgentId) -> Option<Micros> {
        self.last_processed_ts.get(&(stream, publisher)).copied()
    }

    fn record_processed(&mut self, stream: StreamId, publisher: AgentId, now: Micros) {
        if stream != StreamId::NONE {
            self.last_processed_ts.insert((stream, publisher), now);
        }
    }
}

/// Implemented by any concrete agent that embeds an `AgentBase`, so the
/// blanket `Agent` impl below can reach its bookkeeping fields.
pub trait HasAgentBase {
    fn agent_base(&self) -> &AgentBase;
    fn agent_base_mut(&mut self) -> &mut AgentBase;
}

impl<T: EventHandler + HasAgentBase> Agent for T {
    fn id(&self) -> AgentId {
        self.agent_base().id
    }

    fn set_id(&mut self, id: AgentId) {
        self.agent_base_mut().id = id;
    }

    fn process(
        &mut self,
        bus: &mut EventBus,
        event: &Event,
        _topic_id: crate::ids::TopicId,
        publisher: AgentId,
        now: Micros,
        stream_id: StreamId,
        _sequence_number: u64,
    ) -> anyhow::Result<()> {
        let self_id = self.id();
        self.agent_base_mut().record_processed(stream_id, publisher, now);
        let mut ctx = AgentContext {
            bus,
            self_id,
            now,
            stream_id,
        };
        dispatch_event(self, &mut ctx, &event.kind)
    }

    fn is_processing(&self) -> bool {
        self.agent_base().processing
    }

    fn set_processing(&mut self, flag: bool) {
        self.agent_base_mut().processing = flag;
    }

    fn queue_reentrant(&mut self, event: ScheduledEvent) {
        self.agent_base_mut().reentrant_queue.push(event);
    }

    fn flush_reentrant_queue(&mut self) -> Vec<ScheduledEvent> {
        std::mem::take(&mut self.agent_base_mut().reentrant_queue)
    }

    fn name(&self) -> &str {
        EventHandler::name(self)
    }
}

//! Scripted demo session: two toy market makers, a stub exchange adapter,
//! and a cancellation watchdog, wired through the dispatch core and run to
//! quiescence. Exercises the crate end to end the way the teacher's
//! `backtest_run` binary exercises `backtest_v2` — not a test, just a
//! runnable illustration of the wiring.

use anyhow::Result;
use marketsim_dispatch_core::{
    AgentBase, AgentContext, BusConfig, EventBus, EventHandler, EventKind, HasAgentBase, LatencyParams, Micros, OrderId,
    OrderKind, RejectReason, Side, Ticks, Xid,
};
use std::collections::HashMap;

const FIVE_SECONDS_US: Micros = 5_000_000;

/// Stub matching adapter: acks every order, fills market orders immediately,
/// and leaves limit orders resting until cancelled or expired.
struct StubExchange {
    base: AgentBase,
    open_limit_orders: HashMap<OrderId, (String, Side, Ticks, Ticks)>,
}

impl StubExchange {
    fn new() -> Self {
        Self {
            base: AgentBase::new(),
            open_limit_orders: HashMap::new(),
        }
    }
}

impl HasAgentBase for StubExchange {
    fn agent_base(&self) -> &AgentBase {
        &self.base
    }
    fn agent_base_mut(&mut self) -> &mut AgentBase {
        &mut self.base
    }
}

impl EventHandler for StubExchange {
    fn on_place_order(
        &mut self,
        ctx: &mut AgentContext,
        order_id: OrderId,
        kind: OrderKind,
        token_id: &str,
        side: Side,
        price: Ticks,
        size: Ticks,
    ) -> Result<()> {
        if price <= 0 || size <= 0 {
            ctx.publish(
                "orders.rejects",
                EventKind::OrderReject {
                    order_id,
                    kind,
                    reason: RejectReason::InvalidPrice,
                },
                None,
            );
            return Ok(());
        }

        let timeout_us = match kind {
            OrderKind::Limit => Some(FIVE_SECONDS_US),
            OrderKind::Market => None,
        };
        ctx.publish("orders.acks", EventKind::OrderAck { order_id, kind, timeout_us }, None);

        match kind {
            OrderKind::Market => {
                ctx.publish("orders.fills", EventKind::FullFill { order_id, price, size }, None);
            }
            OrderKind::Limit => {
                self.open_limit_orders.insert(order_id, (token_id.to_string(), side, price, size));
            }
        }
        Ok(())
    }

    fn on_trigger_expired(&mut self, ctx: &mut AgentContext, xid: Xid) -> Result<()> {
        if self.open_limit_orders.remove(&xid).is_some() {
            ctx.publish("expiration.trigger_ack", EventKind::AckTriggerExpired { xid }, None);
            ctx.publish("orders.expired", EventKind::Expired { order_id: xid }, None);
        } else {
            ctx.publish("expiration.trigger_ack", EventKind::RejectTriggerExpired { xid }, None);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "stub_exchange"
    }
}

/// Toy market maker: only logs what happens to the orders it placed.
struct MarketMaker {
    base: AgentBase,
    label: &'static str,
}

impl HasAgentBase for MarketMaker {
    fn agent_base(&self) -> &AgentBase {
        &self.base
    }
    fn agent_base_mut(&mut self) -> &mut AgentBase {
        &mut self.base
    }
}

impl EventHandler for MarketMaker {
    fn on_order_ack(&mut self, ctx: &mut AgentContext, order_id: OrderId, kind: OrderKind, timeout_us: Option<Micros>) -> Result<()> {
        tracing::info!(mm = self.label, order_id, ?kind, ?timeout_us, t = ctx.now(), "order acked");
        Ok(())
    }

    fn on_full_fill(&mut self, ctx: &mut AgentContext, order_id: OrderId, price: Ticks, size: Ticks) -> Result<()> {
        tracing::info!(mm = self.label, order_id, price, size, t = ctx.now(), "order filled");
        Ok(())
    }

    fn on_order_reject(&mut self, ctx: &mut AgentContext, order_id: OrderId, _kind: OrderKind, reason: &RejectReason) -> Result<()> {
        tracing::warn!(mm = self.label, order_id, ?reason, t = ctx.now(), "order rejected");
        Ok(())
    }

    fn on_expired(&mut self, ctx: &mut AgentContext, order_id: OrderId) -> Result<()> {
        tracing::info!(mm = self.label, order_id, t = ctx.now(), "order expired");
        Ok(())
    }

    fn name(&self) -> &str {
        self.label
    }
}

/// Cancellation watchdog: tracks every acked limit order by its `xid`
/// (the order's own id, reused as the expiration-workflow identifier — see
/// DESIGN.md's Open Question 1) and fires `TriggerExpired` at the deadline
/// unless the order reaches a terminal state first.
struct Watchdog {
    base: AgentBase,
    tracked: HashMap<Xid, Micros>,
}

impl Watchdog {
    fn new() -> Self {
        Self {
            base: AgentBase::new(),
            tracked: HashMap::new(),
        }
    }
}

impl HasAgentBase for Watchdog {
    fn agent_base(&self) -> &AgentBase {
        &self.base
    }
    fn agent_base_mut(&mut self) -> &mut AgentBase {
        &mut self.base
    }
}

impl EventHandler for Watchdog {
    fn on_order_ack(&mut self, ctx: &mut AgentContext, order_id: OrderId, _kind: OrderKind, timeout_us: Option<Micros>) -> Result<()> {
        if let Some(timeout) = timeout_us {
            self.tracked.insert(order_id, ctx.now());
            ctx.schedule_for_self_at(ctx.now() + timeout, "expiration.check", EventKind::CheckExpiration { xid: order_id }, None);
        }
        Ok(())
    }

    fn on_check_expiration(&mut self, ctx: &mut AgentContext, xid: Xid) -> Result<()> {
        if self.tracked.contains_key(&xid) {
            ctx.publish("expiration.trigger", EventKind::TriggerExpired { xid }, None);
        }
        Ok(())
    }

    fn on_ack_trigger_expired(&mut self, _ctx: &mut AgentContext, xid: Xid) -> Result<()> {
        self.tracked.remove(&xid);
        tracing::info!(xid, "watchdog: expiration acked, untracking");
        Ok(())
    }

    fn on_reject_trigger_expired(&mut self, _ctx: &mut AgentContext, xid: Xid) -> Result<()> {
        self.tracked.remove(&xid);
        tracing::info!(xid, "watchdog: expiration rejected (order already resolved), untracking");
        Ok(())
    }

    fn on_full_fill(&mut self, _ctx: &mut AgentContext, order_id: OrderId, _price: Ticks, _size: Ticks) -> Result<()> {
        self.tracked.remove(&order_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "watchdog"
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Wall-clock label for this run's log lines only — the simulation's own
    // clock (`EventBus::current_time`) never reads system time.
    let session_started_at = chrono::Utc::now().to_rfc3339();
    tracing::info!(session_started_at, "starting scripted dispatch session");

    let mut bus = EventBus::new(BusConfig {
        start_time: 0,
        seed: 7,
        default_latency: LatencyParams::same_city_vps(),
    });

    let exchange_id = bus.register(Box::new(StubExchange::new()));
    let mm1_id = bus.register(Box::new(MarketMaker {
        base: AgentBase::new(),
        label: "mm1",
    }));
    let mm2_id = bus.register(Box::new(MarketMaker {
        base: AgentBase::new(),
        label: "mm2",
    }));
    let watchdog_id = bus.register(Box::new(Watchdog::new()));

    bus.subscribe(exchange_id, "orders.place");
    bus.subscribe(exchange_id, "expiration.trigger");

    bus.subscribe(mm1_id, "orders.acks");
    bus.subscribe(mm1_id, "orders.fills");
    bus.subscribe(mm1_id, "orders.rejects");
    bus.subscribe(mm1_id, "orders.expired");
    bus.subscribe(mm2_id, "orders.acks");
    bus.subscribe(mm2_id, "orders.fills");
    bus.subscribe(mm2_id, "orders.rejects");
    bus.subscribe(mm2_id, "orders.expired");

    bus.subscribe(watchdog_id, "orders.acks");
    bus.subscribe(watchdog_id, "expiration.trigger_ack");

    bus.set_inter_agent_latency(mm1_id, exchange_id, LatencyParams::co_located_hft());
    bus.set_inter_agent_latency(exchange_id, mm1_id, LatencyParams::co_located_hft());
    bus.set_inter_agent_latency(mm2_id, exchange_id, LatencyParams::domestic_retail());
    bus.set_inter_agent_latency(exchange_id, mm2_id, LatencyParams::domestic_retail());
    bus.set_inter_agent_latency(exchange_id, watchdog_id, LatencyParams::internal_system_pair());
    bus.set_inter_agent_latency(watchdog_id, exchange_id, LatencyParams::internal_system_pair());

    // mm1 sends a market order that fills immediately.
    bus.publish(
        mm1_id,
        "orders.place",
        EventKind::PlaceOrder {
            order_id: 1,
            kind: OrderKind::Market,
            token_id: "BTC-USD".to_string(),
            side: Side::Buy,
            price: 650_000_000,
            size: 10_000,
        },
        Some("mm1-orders"),
    );

    // mm2 sends a resting limit order that nothing ever fills or cancels,
    // so the watchdog's five-second timeout fires and expires it.
    bus.publish(
        mm2_id,
        "orders.place",
        EventKind::PlaceOrder {
            order_id: 2,
            kind: OrderKind::Limit,
            token_id: "BTC-USD".to_string(),
            side: Side::Sell,
            price: 651_000_000,
            size: 5_000,
        },
        Some("mm2-orders"),
    );

    let mut steps = 0u64;
    while bus.step().is_some() {
        steps += 1;
    }

    let stats_json = serde_json::to_string_pretty(bus.stats())?;
    tracing::info!(steps, stats = %stats_json, "session complete");
    Ok(())
}

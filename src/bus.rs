//! Event Bus
//!
//! The central object: owns every agent, the topic trie, the wildcard
//! subscription lists, the scheduler, the latency sampler state, and the
//! pre-publish hook chain. `publish`/`schedule_at`/`step` implement the
//! control flow spec §4.3 describes; this file is the synthesis point for
//! every other module (spec §2's "Dispatch Loop", 20% of the line budget).

use crate::agent::Agent;
use crate::clock::{Micros, SimClock};
use crate::event::{Event, EventKind, SharedEvent};
use crate::hooks::{HookChain, PrePublishHook};
use crate::ids::{AgentId, EventId, StreamId, TopicId};
use crate::interner::StringInterner;
use crate::latency::{LatencyParams, LatencyStats};
use crate::scheduler::{ScheduledEvent, Scheduler};
use crate::topic::{segments, TopicTrie};
use crate::wildcard::WildcardPattern;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};

/// Warn on malformed dotted topics with empty segments (e.g. `"a..b"`),
/// per spec §6's "empty segments in input produce warnings". The segment
/// is still routed as-is afterward — this is a warning, not a rejection.
fn warn_on_empty_segments(topic: &str) {
    if segments(topic).iter().any(|s| s.is_empty()) {
        tracing::warn!(topic, "topic contains an empty segment");
    }
}

/// Construction-time configuration (spec §4.6/§4.C), analogous to the
/// teacher's `LatencyConfig`/`LatencySampler::new(config, seed)` pairing.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub start_time: Micros,
    pub seed: u64,
    pub default_latency: LatencyParams,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            start_time: 0,
            seed: 0,
            default_latency: LatencyParams::same_city_vps(),
        }
    }
}

/// Running counters, supplementary to spec.md but grounded in the
/// teacher's `LatencyStats`/`EventQueue` diagnostic counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BusStats {
    pub events_published: u64,
    pub events_scheduled: u64,
    pub events_dispatched: u64,
    pub events_dropped_unregistered: u64,
    pub handler_errors_suppressed: u64,
    pub hook_errors_suppressed: u64,
    pub invariant_violations: u64,
}

/// The Event Dispatch Core's central bus (spec §4.3, §4.7).
pub struct EventBus {
    clock: SimClock,
    sequence_counter: u64,
    next_event_id: u64,
    next_agent_id: u64,

    interner: StringInterner,
    topic_trie: TopicTrie,
    exact_subs: HashMap<AgentId, HashSet<String>>,
    wildcard_subs: HashMap<AgentId, Vec<WildcardPattern>>,

    agents: HashMap<AgentId, Box<dyn Agent>>,
    scheduler: Scheduler,

    last_scheduled_ts: HashMap<(StreamId, AgentId), Micros>,
    latency_pairs: HashMap<(AgentId, AgentId), LatencyParams>,
    default_latency: LatencyParams,
    latency_stats: HashMap<(AgentId, AgentId), LatencyStats>,
    rng: ChaCha8Rng,

    hooks: HookChain,
    stats: BusStats,

    /// Which agent, if any, is currently inside its own `process` call.
    /// Tracked here rather than on the `Agent` object itself, since the
    /// agent is physically removed from `agents` for the duration of that
    /// call (see `step`) and so cannot be queried mid-call.
    processing_id: Option<AgentId>,
    /// Events published by the currently-processing agent back to itself,
    /// held until that `process` call returns (spec §5 reentrancy rule).
    reentrant_buffer: Vec<ScheduledEvent>,
}

impl EventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            clock: SimClock::new(config.start_time),
            sequence_counter: 0,
            next_event_id: 1,
            next_agent_id: 1,
            interner: StringInterner::new(),
            topic_trie: TopicTrie::new(),
            exact_subs: HashMap::new(),
            wildcard_subs: HashMap::new(),
            agents: HashMap::new(),
            scheduler: Scheduler::new(),
            last_scheduled_ts: HashMap::new(),
            latency_pairs: HashMap::new(),
            default_latency: config.default_latency,
            latency_stats: HashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            hooks: HookChain::new(),
            stats: BusStats::default(),
            processing_id: None,
            reentrant_buffer: Vec::new(),
        }
    }

    // ---- registration (spec §4.7) ----

    /// Register `agent`, assigning it the next unused `AgentId`.
    pub fn register(&mut self, mut agent: Box<dyn Agent>) -> AgentId {
        let id = AgentId(self.next_agent_id);
        self.next_agent_id += 1;
        agent.set_id(id);
        self.agents.insert(id, agent);
        id
    }

    /// Register `agent` under a caller-chosen id. If `id` is already taken,
    /// the existing registration is kept and its id returned (spec §7:
    /// "Duplicate agent id on register_with_id -> Log warn; keep existing").
    /// Also reserves `id` against future `register` allocations, so a
    /// well-known system agent registered here can never collide with one
    /// `register` hands out later (spec §3: "Ids are not reused within a
    /// run").
    pub fn register_with_id(&mut self, id: AgentId, mut agent: Box<dyn Agent>) -> AgentId {
        if self.agents.contains_key(&id) {
            tracing::warn!(agent_id = %id, "duplicate agent id on register_with_id, keeping existing registration");
            return id;
        }
        agent.set_id(id);
        self.agents.insert(id, agent);
        self.next_agent_id = self.next_agent_id.max(id.0 + 1);
        id
    }

    /// Remove `agent_id` and every subscription (exact and wildcard) it held.
    pub fn deregister(&mut self, agent_id: AgentId) {
        if let Some(topics) = self.exact_subs.remove(&agent_id) {
            for topic in &topics {
                self.topic_trie.unsubscribe(agent_id, topic);
            }
        }
        self.wildcard_subs.remove(&agent_id);
        self.last_scheduled_ts.retain(|(_, sub), _| *sub != agent_id);
        self.agents.remove(&agent_id);
    }

    pub fn is_registered(&self, agent_id: AgentId) -> bool {
        self.agents.contains_key(&agent_id)
    }

    // ---- subscription (spec §4.2) ----

    pub fn subscribe(&mut self, agent_id: AgentId, topic: &str) {
        if !self.agents.contains_key(&agent_id) {
            tracing::warn!(agent_id = %agent_id, topic, "subscribe for unregistered agent ignored");
            return;
        }
        warn_on_empty_segments(topic);
        if WildcardPattern::is_wildcard(topic) {
            match WildcardPattern::parse(topic) {
                Some(pattern) => {
                    let patterns = self.wildcard_subs.entry(agent_id).or_default();
                    if !patterns.iter().any(|p| p.raw() == pattern.raw()) {
                        patterns.push(pattern);
                    }
                }
                None => {
                    tracing::warn!(agent_id = %agent_id, topic, "invalid wildcard pattern (# not last segment), subscribe rejected");
                }
            }
            return;
        }
        self.topic_trie.subscribe(agent_id, topic);
        self.exact_subs.entry(agent_id).or_default().insert(topic.to_string());
    }

    pub fn unsubscribe(&mut self, agent_id: AgentId, topic: &str) {
        if WildcardPattern::is_wildcard(topic) {
            if let Some(patterns) = self.wildcard_subs.get_mut(&agent_id) {
                patterns.retain(|p| p.raw() != topic);
            }
            return;
        }
        self.topic_trie.unsubscribe(agent_id, topic);
        if let Some(subs) = self.exact_subs.get_mut(&agent_id) {
            subs.remove(topic);
        }
    }

    // ---- topic/stream interning ----

    pub fn intern_topic(&mut self, topic: &str) -> TopicId {
        TopicId(self.interner.intern(topic))
    }

    pub fn intern_stream(&mut self, stream: &str) -> StreamId {
        StreamId(self.interner.intern(stream))
    }

    pub fn resolve_topic(&self, id: TopicId) -> &str {
        self.interner.resolve(id.0)
    }

    pub fn resolve_stream(&self, id: StreamId) -> &str {
        self.interner.resolve(id.0)
    }

    // ---- latency configuration (spec §4.6) ----

    pub fn set_inter_agent_latency(&mut self, publisher: AgentId, subscriber: AgentId, params: LatencyParams) {
        self.latency_pairs.insert((publisher, subscriber), params);
    }

    pub fn clear_inter_agent_latency(&mut self, publisher: AgentId, subscriber: AgentId) {
        self.latency_pairs.remove(&(publisher, subscriber));
    }

    pub fn set_default_latency(&mut self, params: LatencyParams) {
        self.default_latency = params;
    }

    pub fn latency_stats(&self, publisher: AgentId, subscriber: AgentId) -> Option<&LatencyStats> {
        self.latency_stats.get(&(publisher, subscriber))
    }

    fn latency_for(&self, publisher: AgentId, subscriber: AgentId) -> LatencyParams {
        self.latency_pairs
            .get(&(publisher, subscriber))
            .cloned()
            .unwrap_or_else(|| self.default_latency.clone())
    }

    fn next_sequence(&mut self) -> u64 {
        let seq = self.sequence_counter;
        self.sequence_counter += 1;
        seq
    }

    fn next_event_id(&mut self) -> EventId {
        let id = EventId(self.next_event_id);
        self.next_event_id += 1;
        id
    }

    fn subscribers_for(&self, topic: &str) -> Vec<AgentId> {
        let mut out: HashSet<AgentId> = self.topic_trie.exact_subscribers(topic).into_iter().collect();
        for (agent_id, patterns) in &self.wildcard_subs {
            if out.contains(agent_id) {
                continue;
            }
            if patterns.iter().any(|p| p.matches(topic)) {
                out.insert(*agent_id);
            }
        }
        out.into_iter().collect()
    }

    /// Enqueue `scheduled` either directly onto the heap or, if `subscriber`
    /// is mid-handler, onto the reentrant buffer for delivery after the
    /// current handler returns (spec §4.3/§5 reentrancy rule).
    fn enqueue(&mut self, scheduled: ScheduledEvent) {
        let subscriber = scheduled.subscriber_id;
        if self.processing_id == Some(subscriber) {
            self.reentrant_buffer.push(scheduled);
            return;
        }
        if self.agents.contains_key(&subscriber) {
            self.scheduler.push(scheduled);
        } else {
            self.stats.events_dropped_unregistered += 1;
            tracing::info!(agent_id = %subscriber, "dropping event for unregistered subscriber");
        }
    }

    /// Publish `kind` on `topic` from `publisher`, optionally on `stream`
    /// for per-stream FIFO ordering (spec §4.3's seven-step algorithm).
    pub fn publish(&mut self, publisher: AgentId, topic: &str, kind: EventKind, stream: Option<&str>) {
        if WildcardPattern::is_wildcard(topic) {
            tracing::warn!(topic, "publish to a wildcard topic is rejected");
            return;
        }
        warn_on_empty_segments(topic);

        let topic_id = self.intern_topic(topic);
        let publish_time = self.clock.now();

        self.hooks.invoke_all(publisher, topic_id, &kind, publish_time);

        let subscribers = self.subscribers_for(topic);
        let event_id = self.next_event_id();
        let shared: SharedEvent = Event::new(publish_time, event_id, kind);
        let stream_id = stream.map(|s| self.intern_stream(s)).unwrap_or(StreamId::NONE);

        self.stats.events_published += 1;

        for subscriber in subscribers {
            let params = self.latency_for(publisher, subscriber);
            let latency = params.sample(&mut self.rng);
            self.latency_stats.entry((publisher, subscriber)).or_default().record(latency);

            let stream_floor = if stream_id != StreamId::NONE {
                self.last_scheduled_ts.get(&(stream_id, subscriber)).copied()
            } else {
                None
            };
            let base = stream_floor.map(|floor| floor.max(publish_time)).unwrap_or(publish_time);
            let scheduled_time = (base + latency).max(self.clock.now() + 1);

            if stream_id != StreamId::NONE {
                self.last_scheduled_ts.insert((stream_id, subscriber), scheduled_time);
            }

            let sequence_number = self.next_sequence();
            self.stats.events_scheduled += 1;
            self.enqueue(ScheduledEvent {
                scheduled_time,
                event: shared.clone(),
                topic_id,
                publisher_id: publisher,
                subscriber_id: subscriber,
                publish_time,
                stream_id,
                sequence_number,
            });
        }
    }

    /// Schedule `kind` for direct delivery to `subscriber` at `target_time`,
    /// bypassing latency sampling — used for self-scheduled timers and
    /// seeding events (spec §4.3).
    pub fn schedule_at(
        &mut self,
        publisher: AgentId,
        subscriber: AgentId,
        topic: &str,
        kind: EventKind,
        target_time: Micros,
        stream: Option<&str>,
    ) {
        if WildcardPattern::is_wildcard(topic) {
            tracing::warn!(topic, "schedule_at on a wildcard topic is rejected");
            return;
        }
        warn_on_empty_segments(topic);

        let topic_id = self.intern_topic(topic);
        let stream_id = stream.map(|s| self.intern_stream(s)).unwrap_or(StreamId::NONE);
        let now = self.clock.now();

        let stream_floor = if stream_id != StreamId::NONE {
            self.last_scheduled_ts.get(&(stream_id, subscriber)).map(|t| t + 1)
        } else {
            None
        };
        let scheduled_time = [target_time, now + 1, stream_floor.unwrap_or(Micros::MIN)]
            .into_iter()
            .max()
            .unwrap();

        if stream_id != StreamId::NONE {
            self.last_scheduled_ts.insert((stream_id, subscriber), scheduled_time);
        }

        let sequence_number = self.next_sequence();
        let event_id = self.next_event_id();
        let shared = Event::new(now, event_id, kind);

        self.stats.events_scheduled += 1;
        self.scheduler.push(ScheduledEvent {
            scheduled_time,
            event: shared,
            topic_id,
            publisher_id: publisher,
            subscriber_id: subscriber,
            publish_time: now,
            stream_id,
            sequence_number,
        });
    }

    /// Pop and dispatch the next scheduled event, if any (spec §4.3).
    pub fn step(&mut self) -> Option<ScheduledEvent> {
        let popped = self.scheduler.pop()?;

        if popped.scheduled_time < self.clock.now() {
            self.stats.invariant_violations += 1;
            tracing::error!(
                scheduled_time = popped.scheduled_time,
                current_time = self.clock.now(),
                "popped event scheduled before current bus time, invariant violated"
            );
        }
        // Never move the clock backward even on a violation: clamp at the
        // current time rather than letting a bad scheduled_time regress it.
        let advance_to = popped.scheduled_time.max(self.clock.now());
        self.clock.advance_to(advance_to);

        let Some(mut agent) = self.agents.remove(&popped.subscriber_id) else {
            self.stats.events_dropped_unregistered += 1;
            tracing::info!(agent_id = %popped.subscriber_id, "dropping popped event for now-unregistered subscriber");
            return Some(popped);
        };

        agent.set_processing(true);
        self.processing_id = Some(popped.subscriber_id);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            agent.process(
                self,
                &popped.event,
                popped.topic_id,
                popped.publisher_id,
                self.clock.now(),
                popped.stream_id,
                popped.sequence_number,
            )
        }));
        self.processing_id = None;
        agent.set_processing(false);

        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.stats.handler_errors_suppressed += 1;
                tracing::error!(agent_id = %popped.subscriber_id, error = %err, "agent handler returned an error, suppressing");
            }
            Err(_) => {
                self.stats.handler_errors_suppressed += 1;
                tracing::error!(agent_id = %popped.subscriber_id, "agent handler panicked, suppressing");
            }
        }

        for reentrant in std::mem::take(&mut self.reentrant_buffer) {
            self.scheduler.push(reentrant);
        }

        self.agents.insert(popped.subscriber_id, agent);
        self.stats.events_dispatched += 1;
        Some(popped)
    }

    pub fn peek(&self) -> Option<&ScheduledEvent> {
        self.scheduler.peek()
    }

    pub fn current_time(&self) -> Micros {
        self.clock.now()
    }

    pub fn queue_size(&self) -> usize {
        self.scheduler.len()
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_empty()
    }

    // ---- pre-publish hooks (spec §4.5) ----

    pub fn register_pre_publish_hook(&mut self, hook: Box<dyn PrePublishHook>) {
        self.hooks.register(hook);
    }

    pub fn deregister_pre_publish_hook(&mut self, hook_id: &str) {
        self.hooks.deregister(hook_id);
    }

    pub fn stats(&self) -> &BusStats {
        &self.stats
    }
}

//! Pre-publish Hook Chain
//!
//! An ordered list of observers invoked synchronously during `publish`,
//! before fanout to subscribers (spec §4.5). Used by external collaborators
//! — visualization, logging, recording — that must see every publish but
//! must never be able to mutate bus state or abort a publish.

use crate::clock::Micros;
use crate::event::EventKind;
use crate::ids::{AgentId, TopicId};

/// An observer invoked on every publish, before fanout.
///
/// Implementations must not mutate bus state; the bus only ever gives them
/// shared references. A hook that returns `Err` is logged and otherwise
/// ignored — hooks must never be able to abort a publish (spec §4.5, §7).
pub trait PrePublishHook {
    fn on_publish(
        &mut self,
        publisher: AgentId,
        topic_id: TopicId,
        event: &EventKind,
        publish_time: Micros,
    ) -> anyhow::Result<()>;

    /// Stable identity used to reject duplicate registration. Defaults to
    /// the type name, which is enough for the common case of one hook
    /// instance per concrete type; hooks that need finer-grained identity
    /// (e.g. multiple recorders of the same type) should override this.
    fn hook_id(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Ordered chain of pre-publish hooks. Registration is idempotent by
/// `hook_id` (spec §4.5, §7: "Duplicate hook registration ... Log debug;
/// no-op").
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn PrePublishHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn register(&mut self, hook: Box<dyn PrePublishHook>) {
        if self.hooks.iter().any(|h| h.hook_id() == hook.hook_id()) {
            tracing::debug!(hook_id = hook.hook_id(), "duplicate pre-publish hook registration ignored");
            return;
        }
        self.hooks.push(hook);
    }

    pub fn deregister(&mut self, hook_id: &str) {
        self.hooks.retain(|h| h.hook_id() != hook_id);
    }

    /// Invoke every hook in registration order. Errors (including panics)
    /// are caught, logged, and suppressed so a misbehaving hook can never
    /// abort a publish.
    pub fn invoke_all(
        &mut self,
        publisher: AgentId,
        topic_id: TopicId,
        event: &EventKind,
        publish_time: Micros,
    ) {
        for hook in self.hooks.iter_mut() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                hook.on_publish(publisher, topic_id, event, publish_time)
            }));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "pre-publish hook returned an error, suppressing");
                }
                Err(_) => {
                    tracing::error!("pre-publish hook panicked, suppressing");
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CountingHook {
        calls: Rc<RefCell<u32>>,
    }

    impl PrePublishHook for CountingHook {
        fn on_publish(
            &mut self,
            _publisher: AgentId,
            _topic_id: TopicId,
            _event: &EventKind,
            _publish_time: Micros,
        ) -> anyhow::Result<()> {
            *self.calls.borrow_mut() += 1;
            Ok(())
        }

        fn hook_id(&self) -> &str {
            "counting_hook"
        }
    }

    struct FailingHook;
    impl PrePublishHook for FailingHook {
        fn on_publish(
            &mut self,
            _publisher: AgentId,
            _topic_id: TopicId,
            _event: &EventKind,
            _publish_time: Micros,
        ) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }

        fn hook_id(&self) -> &str {
            "failing_hook"
        }
    }

    #[test]
    fn hooks_invoked_in_registration_order() {
        let calls = Rc::new(RefCell::new(0));
        let mut chain = HookChain::new();
        chain.register(Box::new(CountingHook { calls: calls.clone() }));

        chain.invoke_all(AgentId(1), TopicId(1), &EventKind::Bang, 0);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let calls = Rc::new(RefCell::new(0));
        let mut chain = HookChain::new();
        chain.register(Box::new(CountingHook { calls: calls.clone() }));
        chain.register(Box::new(CountingHook { calls: calls.clone() }));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn failing_hook_does_not_abort_remaining_hooks() {
        let calls = Rc::new(RefCell::new(0));
        let mut chain = HookChain::new();
        chain.register(Box::new(FailingHook));
        chain.register(Box::new(CountingHook { calls: calls.clone() }));

        chain.invoke_all(AgentId(1), TopicId(1), &EventKind::Bang, 0);
        assert_eq!(*calls.borrow(), 1);
    }
}

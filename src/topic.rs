//! Topic Trie
//!
//! Hierarchical exact-match subscription index over dot-separated topic
//! strings, with greedy prune-on-empty. Only exact (non-wildcard) topics
//! live here; wildcard patterns are tracked per-agent in `EventBus` and
//! matched with `crate::wildcard`.

use crate::ids::AgentId;
use std::collections::{HashMap, HashSet};

/// Split a topic string into its dot-separated segments.
pub fn segments(topic: &str) -> Vec<&str> {
    topic.split('.').collect()
}

type NodeId = usize;

struct TrieNode {
    children: HashMap<String, NodeId>,
    subscribers: HashSet<AgentId>,
    parent: Option<NodeId>,
    /// The segment key this node is filed under in `parent`'s children map.
    segment: String,
}

impl TrieNode {
    fn is_removable(&self) -> bool {
        self.subscribers.is_empty() && self.children.is_empty()
    }
}

/// Exact-match topic subscription trie.
pub struct TopicTrie {
    nodes: HashMap<NodeId, TrieNode>,
    next_id: NodeId,
    root: NodeId,
}

impl TopicTrie {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            0,
            TrieNode {
                children: HashMap::new(),
                subscribers: HashSet::new(),
                parent: None,
                segment: String::new(),
            },
        );
        Self {
            nodes,
            next_id: 1,
            root: 0,
        }
    }

    fn walk_or_create(&mut self, topic: &str) -> NodeId {
        let mut current = self.root;
        for seg in segments(topic) {
            let existing = self.nodes[&current].children.get(seg).copied();
            current = match existing {
                Some(child) => child,
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.nodes.insert(
                        id,
                        TrieNode {
                            children: HashMap::new(),
                            subscribers: HashSet::new(),
                            parent: Some(current),
                            segment: seg.to_string(),
                        },
                    );
                    self.nodes.get_mut(&current).unwrap().children.insert(seg.to_string(), id);
                    id
                }
            };
        }
        current
    }

    fn walk(&self, topic: &str) -> Option<NodeId> {
        let mut current = self.root;
        for seg in segments(topic) {
            current = *self.nodes[&current].children.get(seg)?;
        }
        Some(current)
    }

    /// Subscribe `agent` to the exact topic, creating trie nodes as needed.
    pub fn subscribe(&mut self, agent: AgentId, topic: &str) {
        let node = self.walk_or_create(topic);
        self.nodes.get_mut(&node).unwrap().subscribers.insert(agent);
    }

    /// Unsubscribe `agent` from the exact topic, then prune the path to the
    /// root greedily. Returns `true` if the agent was subscribed.
    pub fn unsubscribe(&mut self, agent: AgentId, topic: &str) -> bool {
        let Some(node) = self.walk(topic) else {
            return false;
        };
        let removed = self
            .nodes
            .get_mut(&node)
            .map(|n| n.subscribers.remove(&agent))
            .unwrap_or(false);
        if removed {
            self.prune_from(node);
        }
        removed
    }

    /// Greedily remove `node` and every now-empty ancestor up to (not
    /// including) the root.
    fn prune_from(&mut self, node: NodeId) {
        let mut current = node;
        loop {
            if current == self.root {
                break;
            }
            let removable = match self.nodes.get(&current) {
                Some(n) => n.is_removable(),
                None => break,
            };
            if !removable {
                break;
            }
            let (parent, segment) = {
                let n = self.nodes.get(&current).unwrap();
                (n.parent, n.segment.clone())
            };
            self.nodes.remove(&current);
            match parent {
                Some(p) => {
                    self.nodes.get_mut(&p).unwrap().children.remove(&segment);
                    current = p;
                }
                None => break,
            }
        }
    }

    /// Subscribers registered at the exact terminal node for `topic` (does
    /// not include ancestors — exact means exact).
    pub fn exact_subscribers(&self, topic: &str) -> Vec<AgentId> {
        match self.walk(topic) {
            Some(node) => self.nodes[&node].subscribers.iter().copied().collect(),
            None => Vec::new(),
        }
    }

    /// `true` iff no node besides the (always-present) root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Diagnostic: total number of trie nodes including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for TopicTrie {
    fn default() -> Self {
        Self::new()
    }
}

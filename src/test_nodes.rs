//! Leaf nodes with scripted results for the unit tests.

use crate::{BehaviorNode, Blackboard, Context, NodeConfig, NodeStatus, TreeNode};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

/// Shared handle to a [`ProbeNode`]: sets what it returns and counts what
/// happened to it.
#[derive(Clone)]
pub(crate) struct Probe {
    result: Arc<Mutex<NodeStatus>>,
    ticks: Arc<AtomicUsize>,
    halts: Arc<AtomicUsize>,
}

impl Probe {
    pub(crate) fn new(result: NodeStatus) -> Self {
        Self {
            result: Arc::new(Mutex::new(result)),
            ticks: Arc::default(),
            halts: Arc::default(),
        }
    }

    pub(crate) fn set_result(&self, result: NodeStatus) {
        *self.result.lock().unwrap() = result;
    }

    pub(crate) fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    pub(crate) fn halts(&self) -> usize {
        self.halts.load(Ordering::SeqCst)
    }

    pub(crate) fn node(&self) -> ProbeNode {
        ProbeNode(self.clone())
    }

    pub(crate) fn leaf(&self, name: &str) -> TreeNode {
        TreeNode::new(name, self.node(), config()).unwrap()
    }
}

pub(crate) struct ProbeNode(Probe);

impl BehaviorNode for ProbeNode {
    fn tick(&mut self, _ctx: &mut Context) -> NodeStatus {
        self.0.ticks.fetch_add(1, Ordering::SeqCst);
        *self.0.result.lock().unwrap()
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.0.halts.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn config() -> NodeConfig {
    NodeConfig::new(Blackboard::create())
}

/// A parent node of type `node` over `children`.
pub(crate) fn parent(
    node: impl BehaviorNode + 'static,
    children: impl IntoIterator<Item = TreeNode>,
) -> TreeNode {
    TreeNode::new("parent", node, config())
        .unwrap()
        .with_children(children)
        .unwrap()
}

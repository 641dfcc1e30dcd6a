use crate::{
    error::ConfigError,
    signal::{StatusChange, StatusChangeSubscriber, WakeUpSignal},
    Blackboard, NodeKind, NodeStatus, TreeNode,
};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum TickOption {
    ExactlyOnce,
    OnceUnlessWokenUp,
    WhileRunning,
}

/// Owns the root node and drives it.
///
/// Dropping the tree halts it, so that asynchronous nodes get to stop their
/// workers.
pub struct Tree {
    root: TreeNode,
    blackboard: Arc<Blackboard>,
    wake_up: Arc<WakeUpSignal>,
}

impl Tree {
    /// Validates the children counts, gives every node its uid and full path
    /// and connects them to the tree's wake-up signal.
    pub fn new(mut root: TreeNode, blackboard: Arc<Blackboard>) -> Result<Self, ConfigError> {
        let wake_up = WakeUpSignal::new();
        let mut next_uid: u32 = 1;
        prepare_node(&mut root, "", &mut next_uid, &wake_up)?;
        debug!(
            "created tree with {} nodes, root {:?}",
            next_uid - 1,
            root.name()
        );
        Ok(Self {
            root,
            blackboard,
            wake_up,
        })
    }

    /// Ticks the root exactly once, even if a node asked for a wake-up.
    pub fn tick_exactly_once(&mut self) -> NodeStatus {
        self.tick_root(TickOption::ExactlyOnce, Duration::ZERO)
    }

    /// Ticks the root once, and again right away for as long as
    /// asynchronous nodes raised the wake-up signal during the tick.
    pub fn tick_once(&mut self) -> NodeStatus {
        self.tick_root(TickOption::OnceUnlessWokenUp, Duration::ZERO)
    }

    /// Ticks until the root reports anything but `Running`, waiting up to
    /// `sleep_time` between ticks. A wake-up signal cuts the wait short.
    pub fn tick_while_running(&mut self, sleep_time: Duration) -> NodeStatus {
        self.tick_root(TickOption::WhileRunning, sleep_time)
    }

    fn tick_root(&mut self, opt: TickOption, sleep_time: Duration) -> NodeStatus {
        let mut status = NodeStatus::Idle;

        while status == NodeStatus::Idle
            || (opt == TickOption::WhileRunning && status == NodeStatus::Running)
        {
            status = self.root.execute_tick();

            while opt != TickOption::ExactlyOnce
                && status == NodeStatus::Running
                && self.wake_up.take()
            {
                status = self.root.execute_tick();
            }

            if status.is_completed() {
                self.reset_tree();
                debug!("tree {:?} completed with {}", self.root.name(), status);
            }

            if opt == TickOption::WhileRunning && status == NodeStatus::Running {
                self.wake_up.wait_for(sleep_time);
            }
        }
        status
    }

    /// Halts every running node, then resets all nodes to `Idle`.
    pub fn halt_tree(&mut self) {
        self.root.halt_node();
        self.reset_tree();
    }

    fn reset_tree(&mut self) {
        self.root.visit_mut(&mut |node| node.reset_status());
    }

    /// Waits for the wake-up signal, at most `timeout`. Returns whether it
    /// was raised.
    pub fn sleep(&self, timeout: Duration) -> bool {
        self.wake_up.wait_for(timeout)
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut TreeNode {
        &mut self.root
    }

    pub fn root_blackboard(&self) -> &Arc<Blackboard> {
        &self.blackboard
    }

    pub fn wake_up_signal(&self) -> &Arc<WakeUpSignal> {
        &self.wake_up
    }

    /// Visits all nodes in pre-order.
    pub fn apply_visitor(&self, mut visitor: impl FnMut(&TreeNode)) {
        self.root.visit(&mut visitor);
    }

    pub fn apply_visitor_mut(&mut self, mut visitor: impl FnMut(&mut TreeNode)) {
        self.root.visit_mut(&mut visitor);
    }

    /// Finds a node by its full path.
    pub fn node(&self, path: &str) -> Option<&TreeNode> {
        fn find<'a>(node: &'a TreeNode, path: &str) -> Option<&'a TreeNode> {
            if node.full_path() == path {
                return Some(node);
            }
            node.children().iter().find_map(|child| find(child, path))
        }
        find(&self.root, path)
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |_| count += 1);
        count
    }

    /// Subscribes `callback` to the status changes of every node. The
    /// callback stays subscribed as long as the returned handles are alive.
    pub fn subscribe_to_status_changes(
        &self,
        callback: impl Fn(&StatusChange) + Send + Sync + 'static,
    ) -> Vec<StatusChangeSubscriber> {
        let callback = Arc::new(callback);
        let mut subscribers = vec![];
        self.root.visit(&mut |node| {
            let callback = callback.clone();
            subscribers.push(node.subscribe_to_status_change(move |change| callback(change)));
        });
        subscribers
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        self.root.halt_node();
    }
}

impl Display for Tree {
    /// One node per line, indented by depth.
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        fn print(node: &TreeNode, depth: usize, f: &mut Formatter) -> fmt::Result {
            writeln!(f, "{:indent$}{}", "", node.name(), indent = depth * 2)?;
            node.children()
                .iter()
                .try_for_each(|child| print(child, depth + 1, f))
        }
        print(&self.root, 0, f)
    }
}

fn prepare_node(
    node: &mut TreeNode,
    prefix: &str,
    next_uid: &mut u32,
    wake_up: &Arc<WakeUpSignal>,
) -> Result<(), ConfigError> {
    node.validate_children()?;

    let uid = u16::try_from(*next_uid)
        .map_err(|_| ConfigError::TooManyNodes { max: u16::MAX })?;
    *next_uid += 1;
    let path = format!("{}{}", prefix, node.name());
    node.set_identity(uid, path.clone());
    node.set_wake_up_signal(wake_up.clone());

    let child_prefix = if node.kind() == NodeKind::SubTree {
        format!("{}::{}/", path, uid)
    } else {
        prefix.to_owned()
    };
    for child in node.children_mut() {
        prepare_node(child, &child_prefix, next_uid, wake_up)?;
    }
    Ok(())
}

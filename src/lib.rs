//! # behavior-tree-engine (Rust crate)
//!
//! A behavior tree execution engine, inspired by [BehaviorTreeCPP](https://github.com/BehaviorTree/BehaviorTree.CPP.git).
//!
//!
//! ## Overview
//!
//! A behavior tree is a tree of composable nodes that is "ticked" repeatedly.
//! Each tick walks the tree top-down and every node reports a [`NodeStatus`]
//! that tells its parent whether to continue, stop or keep polling.
//! Long running work returns [`NodeStatus::Running`] and gets ticked again later,
//! or gets halted when its branch is abandoned.
//!
//! Nodes exchange data through a shared, typed, thread-safe [`Blackboard`].
//! A node never refers to blackboard keys directly. It declares named ports,
//! and each node instance binds its ports to blackboard keys or literals.
//!
//!
//! ## How it looks like
//!
//! First, you define a node by implementing [`BehaviorNode`].
//! Ports are declared with [`BehaviorNode::provided_ports`] and accessed through
//! the [`Context`] passed to `tick`.
//!
//! ```rust
//! use ::behavior_tree_engine::{BehaviorNode, Context, NodeStatus, PortSpec};
//!
//! struct PrintArm;
//!
//! impl BehaviorNode for PrintArm {
//!     fn provided_ports(&self) -> Vec<PortSpec> {
//!         vec![PortSpec::new_in("arm").typed::<String>()]
//!     }
//!
//!     fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
//!         match ctx.get_input::<String>("arm") {
//!             Ok(arm) => {
//!                 println!("Got arm: {arm}");
//!                 NodeStatus::Success
//!             }
//!             Err(_) => NodeStatus::Failure,
//!         }
//!     }
//! }
//! ```
//!
//! Then you build a tree out of [`TreeNode`]s. Every instance gets a
//! [`NodeConfig`] that holds the blackboard and binds its ports.
//! `{key}` refers to a blackboard entry, anything else is a literal.
//!
//! ```rust
//! # use ::behavior_tree_engine::*;
//! # struct PrintArm;
//! # impl BehaviorNode for PrintArm {
//! #     fn provided_ports(&self) -> Vec<PortSpec> { vec![PortSpec::new_in("arm")] }
//! #     fn tick(&mut self, _: &mut Context) -> NodeStatus { NodeStatus::Success }
//! # }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let blackboard = Blackboard::create();
//! blackboard.set("left_arm", "leftArm".to_string())?;
//!
//! let config = || NodeConfig::new(blackboard.clone());
//! let mut root = TreeNode::new("root", SequenceNode::default(), config())?;
//! root.add_child(TreeNode::new(
//!     "print_left",
//!     PrintArm,
//!     config().with_remapping(hash_map!("arm" => "{left_arm}")),
//! )?)?;
//! root.add_child(TreeNode::new(
//!     "print_right",
//!     PrintArm,
//!     config().with_port("arm", "rightArm"),
//! )?)?;
//!
//! let mut tree = Tree::new(root, blackboard)?;
//! assert_eq!(tree.tick_while_running(std::time::Duration::from_millis(10)), NodeStatus::Success);
//! # Ok(())
//! # }
//! ```
//!
//!
//! ## Node status
//!
//! * `Idle` is the state of a node that has not been ticked since it was last reset.
//!   A node body must never return it.
//! * `Running` means "tick me again, the same operation is still in progress".
//! * `Success` and `Failure` end the current operation. The parent resets the child
//!   to `Idle` when it is done with it.
//! * `Skipped` is returned when a pre-condition suppressed the execution.
//!   The node itself stays `Idle`.
//!
//!
//! ## Asynchronous work
//!
//! The tree is ticked by a single thread. A node doing long running work hands
//! it over to a background worker and returns `Running` until the worker is
//! done. [`ThreadedAction`] does exactly that, and raises the tree's wake-up
//! signal on completion so that [`Tree::tick_while_running`] ticks again
//! without waiting for the full sleep interval.
//! Halting such a node requests cancellation and waits for the worker.
//!
//!
//! ## Blackboard types
//!
//! Entries are type-erased, but remember their type. Once the type of an entry is
//! fixed, it only accepts values that convert into it without loss:
//! strings parsable by the type, numbers that fit, and types related through
//! the [`PolymorphicCastRegistry`].
//!
//! ```rust
//! # use ::behavior_tree_engine::*;
//! let blackboard = Blackboard::create();
//! blackboard.set("x", 5i32).unwrap();
//! blackboard.set("x", "6".to_string()).unwrap();
//! assert_eq!(blackboard.get::<i32>("x").unwrap(), 6);
//! assert!(blackboard.set("x", "six".to_string()).is_err());
//! assert!(blackboard.set("x", 1.5f64).is_err());
//! ```
//!
//!
//! ## Loading the tree structure from a yaml file
//!
//! Trees can be described in YAML and instantiated with the node types
//! registered in a [`Registry`]. A node `type` that names another tree
//! instantiates it as a subtree with its own blackboard scope.
//!
//! ```yaml
//! main_tree: main
//! behavior_tree:
//!   main:
//!     type: Sequence
//!     children:
//!     - type: PrintArm
//!       ports:
//!         arm: "{left_arm}"
//!     - type: Arms
//!       ports:
//!         arm: "{right_arm}"
//!   Arms:
//!     type: PrintArm
//!     ports:
//!       arm: "{=}"
//! ```
//!
//! ```rust
//! # use ::behavior_tree_engine::*;
//! # struct PrintArm;
//! # impl BehaviorNode for PrintArm {
//! #     fn provided_ports(&self) -> Vec<PortSpec> { vec![PortSpec::new_in("arm")] }
//! #     fn tick(&mut self, _: &mut Context) -> NodeStatus { NodeStatus::Success }
//! # }
//! # let source = "behavior_tree:\n  main:\n    type: PrintArm\n";
//! let mut registry = Registry::default();
//! registry.register("PrintArm", boxify(|| PrintArm));
//! let tree = load_yaml(source, &registry).unwrap();
//! ```

mod actions;
mod any;
mod blackboard;
mod cast_registry;
mod config;
mod context;
pub mod error;
mod loader;
mod nodes;
mod port;
mod registry;
mod signal;
mod tree;
mod tree_node;

#[cfg(test)]
mod test_nodes;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

pub use crate::{
    actions::{
        AlwaysFailureNode, AlwaysSuccessNode, HaltFlag, IsTrueNode, SetBlackboardNode, SleepNode,
        Stateful, StatefulAction, ThreadedAction,
    },
    any::{AnyValue, StringConverter, TypeInfo},
    blackboard::{is_private_key, Blackboard, Entry, EntryRef, StampedValue},
    cast_registry::PolymorphicCastRegistry,
    config::{EnumsTable, NodeConfig, PostCond, PostScript, PreCond, PreScript, ScriptEnv},
    context::Context,
    loader::{load_yaml, load_yaml_with_blackboard},
    nodes::{
        ConsumeQueueNode, FallbackNode, ForceFailureNode, ForceSuccessNode, InverterNode,
        ParallelAllNode, ParallelNode, ProtectedQueue, ReactiveFallbackNode, ReactiveSequenceNode,
        RepeatNode, RetryNode, SequenceNode, SequenceWithMemoryNode, SubTreeNode, TimeoutNode,
    },
    port::{
        find_forbidden_char, is_allowed_port_name, is_reserved_port_name, BlackboardValue,
        PortSpec, PortType,
    },
    registry::{boxify, Constructor, Registry},
    signal::{StatusChange, StatusChangeSignal, StatusChangeSubscriber, WakeUpSignal},
    tree::Tree,
    tree_node::{PostTickCallback, PreTickCallback, TickMonitorCallback, TreeNode},
};
pub use ::once_cell::sync::Lazy;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Default)]
pub enum NodeStatus {
    /// Not ticked since the last reset
    #[default]
    Idle,
    /// The node should keep running in the next tick
    Running,
    Success,
    Failure,
    /// A pre-condition suppressed the execution
    Skipped,
}

impl NodeStatus {
    /// `Success` or `Failure`.
    pub fn is_completed(self) -> bool {
        matches!(self, NodeStatus::Success | NodeStatus::Failure)
    }

    /// Anything but `Idle` and `Skipped`.
    pub fn is_active(self) -> bool {
        !matches!(self, NodeStatus::Idle | NodeStatus::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Idle => "IDLE",
            NodeStatus::Running => "RUNNING",
            NodeStatus::Success => "SUCCESS",
            NodeStatus::Failure => "FAILURE",
            NodeStatus::Skipped => "SKIPPED",
        }
    }
}

impl Display for NodeStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "IDLE" => NodeStatus::Idle,
            "RUNNING" => NodeStatus::Running,
            "SUCCESS" => NodeStatus::Success,
            "FAILURE" => NodeStatus::Failure,
            "SKIPPED" => NodeStatus::Skipped,
            _ => return Err(format!("invalid node status {s:?}")),
        })
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NodeKind {
    Action,
    Condition,
    Control,
    Decorator,
    SubTree,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NumChildren {
    Finite(usize),
    Infinite,
}

impl PartialOrd for NumChildren {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(match (self, other) {
            (NumChildren::Finite(_), NumChildren::Infinite) => std::cmp::Ordering::Less,
            (NumChildren::Infinite, NumChildren::Finite(_)) => std::cmp::Ordering::Greater,
            (NumChildren::Finite(lhs), NumChildren::Finite(rhs)) => lhs.cmp(rhs),
            (NumChildren::Infinite, NumChildren::Infinite) => return None,
        })
    }
}

/// The body of a node. The framework around it lives in [`TreeNode`].
pub trait BehaviorNode: Send {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![]
    }

    /// Must never return [`NodeStatus::Idle`].
    fn tick(&mut self, ctx: &mut Context) -> NodeStatus;

    /// Called when a node that is not idle gets halted, after all of its
    /// children were halted. Asynchronous nodes must cancel their work here
    /// and only return once it has stopped.
    fn halt(&mut self, _ctx: &mut Context) {}

    fn kind(&self) -> NodeKind {
        NodeKind::Action
    }

    /// Maximum number of children
    fn num_children(&self) -> NumChildren {
        match self.kind() {
            NodeKind::Action | NodeKind::Condition => NumChildren::Finite(0),
            NodeKind::Decorator | NodeKind::SubTree => NumChildren::Finite(1),
            NodeKind::Control => NumChildren::Infinite,
        }
    }
}

/// Builds a port remapping table.
///
/// ```
/// # use behavior_tree_engine::{hash_map, BlackboardValue};
/// # use std::collections::HashMap;
/// let map: HashMap<String, BlackboardValue> = hash_map!("input" => "{goal}", "retries" => "3");
/// assert_eq!(map["input"], BlackboardValue::Ref("goal".to_string()));
/// ```
#[macro_export]
macro_rules! hash_map {
    () => {
        std::collections::HashMap::default()
    };
    ($($name: literal => $val: expr),+ $(,)?) => {{
        let mut ret = std::collections::HashMap::default();
        $( ret.insert($name.into(), $val.into()); )+
        ret
    }};
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_status_helpers() {
        assert!(NodeStatus::Success.is_completed());
        assert!(NodeStatus::Failure.is_completed());
        assert!(!NodeStatus::Running.is_completed());
        assert!(NodeStatus::Running.is_active());
        assert!(!NodeStatus::Skipped.is_active());
        assert!(!NodeStatus::Idle.is_active());
    }

    #[test]
    fn test_status_text() {
        for status in [
            NodeStatus::Idle,
            NodeStatus::Running,
            NodeStatus::Success,
            NodeStatus::Failure,
            NodeStatus::Skipped,
        ] {
            assert_eq!(status.to_string().parse::<NodeStatus>(), Ok(status));
        }
        assert!("running".parse::<NodeStatus>().is_err());
    }

    #[test]
    fn test_num_children_order() {
        assert!(NumChildren::Finite(1) < NumChildren::Infinite);
        assert!(NumChildren::Finite(0) < NumChildren::Finite(1));
        assert_eq!(
            NumChildren::Infinite.partial_cmp(&NumChildren::Infinite),
            None
        );
    }
}

use crate::{
    config::{NodeConfig, PostCond, PreCond, ScriptEnv},
    context::Context,
    error::{AddChildError, AddChildResult, ConfigError},
    port::{is_allowed_port_name, BlackboardValue, PortSpec},
    signal::{StatusChange, StatusChangeSignal, StatusChangeSubscriber, WakeUpSignal},
    BehaviorNode, NodeKind, NodeStatus, NumChildren,
};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Runs before the body. A completed status replaces the body's result.
pub type PreTickCallback = Arc<dyn Fn(&TreeNode) -> NodeStatus + Send + Sync>;
/// Runs after every tick. A completed status replaces the tick's result.
pub type PostTickCallback = Arc<dyn Fn(&TreeNode, NodeStatus) -> NodeStatus + Send + Sync>;
/// Receives the status returned by the body and how long the body took.
pub type TickMonitorCallback = Arc<dyn Fn(&TreeNode, NodeStatus, Duration) + Send + Sync>;

/// A node of the tree: the body implementing [`BehaviorNode`] plus the
/// status state machine, condition scripts and children around it.
pub struct TreeNode {
    /// Name of the instance
    name: String,
    /// Name of the type of the node
    registration_name: String,
    node: Box<dyn BehaviorNode>,
    config: NodeConfig,
    ports: Vec<PortSpec>,
    children: Vec<TreeNode>,
    status: NodeStatus,
    status_signal: StatusChangeSignal,
    wake_up: Option<Arc<WakeUpSignal>>,
    pre_tick: Option<PreTickCallback>,
    post_tick: Option<PostTickCallback>,
    tick_monitor: Option<TickMonitorCallback>,
}

impl TreeNode {
    pub fn new(
        name: impl Into<String>,
        node: impl BehaviorNode + 'static,
        config: NodeConfig,
    ) -> Result<Self, ConfigError> {
        Self::new_boxed(name, Box::new(node), config)
    }

    /// Validates the port remapping of `config` against the ports the node
    /// provides and declares typed blackboard entries for remapped ports.
    pub fn new_boxed(
        name: impl Into<String>,
        node: Box<dyn BehaviorNode>,
        mut config: NodeConfig,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let ports = node.provided_ports();

        for port in &ports {
            if !is_allowed_port_name(&port.key) {
                return Err(ConfigError::InvalidPortName {
                    node: name.clone(),
                    port: port.key.clone(),
                });
            }
        }

        for (port_name, value) in &config.remapping {
            let Some(port) = ports.iter().find(|port| &port.key == port_name) else {
                return Err(ConfigError::UnknownPort {
                    node: name.clone(),
                    port: port_name.clone(),
                });
            };
            match value {
                BlackboardValue::Literal(_) if port.ty.is_writable() => {
                    return Err(ConfigError::LiteralOnOutput {
                        node: name.clone(),
                        port: port_name.clone(),
                    });
                }
                BlackboardValue::Literal(text) if port.type_info.converter().is_some() => {
                    port.type_info
                        .parse(text)
                        .map_err(|source| ConfigError::InvalidLiteral {
                            node: name.clone(),
                            port: port_name.clone(),
                            source,
                        })?;
                }
                BlackboardValue::Ref(key) if key.is_empty() => {
                    return Err(ConfigError::EmptyRemapping {
                        node: name.clone(),
                        port: port_name.clone(),
                    });
                }
                _ => (),
            }
        }

        for port in &ports {
            if let Some(default) = &port.default_value {
                config
                    .remapping
                    .entry(port.key.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        for port in ports.iter().filter(|port| port.type_info.is_strongly_typed()) {
            let Some(key) = config
                .remapping
                .get(&port.key)
                .and_then(|value| value.key(&port.key))
            else {
                continue;
            };
            config
                .blackboard
                .create_entry(key, port.type_info)
                .map_err(|source| ConfigError::PortTypeConflict {
                    node: name.clone(),
                    port: port.key.clone(),
                    source,
                })?;
        }

        let registration_name = name.clone();
        Ok(Self {
            name,
            registration_name,
            node,
            config,
            ports,
            children: vec![],
            status: NodeStatus::Idle,
            status_signal: StatusChangeSignal::default(),
            wake_up: None,
            pre_tick: None,
            post_tick: None,
            tick_monitor: None,
        })
    }

    pub fn with_registration_name(mut self, registration_name: impl Into<String>) -> Self {
        self.registration_name = registration_name.into();
        self
    }

    pub fn add_child(&mut self, child: TreeNode) -> AddChildResult {
        if NumChildren::Finite(self.children.len()) < self.node.num_children() {
            self.children.push(child);
            Ok(())
        } else {
            Err(AddChildError::TooManyNodes)
        }
    }

    pub fn with_children(
        mut self,
        children: impl IntoIterator<Item = TreeNode>,
    ) -> Result<Self, AddChildError> {
        for child in children {
            self.add_child(child)?;
        }
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registration_name(&self) -> &str {
        &self.registration_name
    }

    pub fn uid(&self) -> u16 {
        self.config.uid
    }

    pub fn full_path(&self) -> &str {
        &self.config.path
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ports(&self) -> &[PortSpec] {
        &self.ports
    }

    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [TreeNode] {
        &mut self.children
    }

    pub(crate) fn set_identity(&mut self, uid: u16, path: String) {
        self.config.uid = uid;
        self.config.path = path;
    }

    pub(crate) fn set_wake_up_signal(&mut self, signal: Arc<WakeUpSignal>) {
        self.wake_up = Some(signal);
    }

    pub fn set_pre_tick_function(&mut self, callback: PreTickCallback) {
        self.pre_tick = Some(callback);
    }

    pub fn set_post_tick_function(&mut self, callback: PostTickCallback) {
        self.post_tick = Some(callback);
    }

    pub fn set_tick_monitor_callback(&mut self, callback: TickMonitorCallback) {
        self.tick_monitor = Some(callback);
    }

    pub fn subscribe_to_status_change(
        &self,
        callback: impl Fn(&StatusChange) + Send + Sync + 'static,
    ) -> StatusChangeSubscriber {
        self.status_signal.subscribe(callback)
    }

    /// Visits this node and its descendants in pre-order.
    pub fn visit(&self, visitor: &mut impl FnMut(&TreeNode)) {
        visitor(self);
        for child in &self.children {
            child.visit(visitor);
        }
    }

    pub fn visit_mut(&mut self, visitor: &mut impl FnMut(&mut TreeNode)) {
        visitor(self);
        for child in &mut self.children {
            child.visit_mut(visitor);
        }
    }

    /// Control nodes need at least one child, decorators and subtrees exactly one.
    pub(crate) fn validate_children(&self) -> Result<(), ConfigError> {
        let actual = self.children.len();
        let expected = match self.kind() {
            NodeKind::Control if actual == 0 => "at least 1",
            NodeKind::Decorator | NodeKind::SubTree if actual != 1 => "exactly 1",
            _ => return Ok(()),
        };
        Err(ConfigError::ChildCount {
            node: self.name.clone(),
            expected,
            actual,
        })
    }

    /// Ticks the node: pre-conditions, then the pre-tick callback or the body,
    /// then post-conditions and the post-tick callback.
    /// A `Skipped` result is returned but never stored.
    pub fn execute_tick(&mut self) -> NodeStatus {
        let mut new_status = match self.check_pre_conditions() {
            Some(status) => status,
            None => {
                let mut substituted = None;
                if let Some(pre_tick) = self.pre_tick.clone() {
                    if !self.status.is_completed() {
                        let status = pre_tick(self);
                        if status.is_completed() {
                            substituted = Some(status);
                        }
                    }
                }
                match substituted {
                    Some(status) => status,
                    None => {
                        let start = Instant::now();
                        let status = self.tick_body();
                        if let Some(monitor) = self.tick_monitor.clone() {
                            monitor(self, status, start.elapsed());
                        }
                        status
                    }
                }
            }
        };

        if new_status.is_completed() {
            self.check_post_conditions(new_status);
        }

        if let Some(post_tick) = self.post_tick.clone() {
            let status = post_tick(self, new_status);
            if status.is_completed() {
                new_status = status;
            }
        }

        if new_status != NodeStatus::Skipped {
            self.set_status(new_status);
        }
        new_status
    }

    fn tick_body(&mut self) -> NodeStatus {
        let mut ctx = Context {
            status: self.status,
            name: &self.name,
            config: &self.config,
            ports: &self.ports,
            children: &mut self.children,
            wake_up: self.wake_up.as_ref(),
        };
        self.node.tick(&mut ctx)
    }

    fn check_pre_conditions(&mut self) -> Option<NodeStatus> {
        if self.config.pre_conditions.is_empty() {
            return None;
        }
        let blackboard = self.config.blackboard.clone();
        let enums = self.config.enums.clone();
        let env = ScriptEnv {
            blackboard: &blackboard,
            enums: &enums,
        };
        let idle = matches!(self.status, NodeStatus::Idle | NodeStatus::Skipped);

        for cond in PreCond::EVALUATION_ORDER {
            let Some(script) = self.config.pre_conditions.get(&cond).cloned() else {
                continue;
            };
            match cond {
                PreCond::SkipIf if idle && script(&env) => return Some(NodeStatus::Skipped),
                PreCond::FailureIf if idle && script(&env) => return Some(NodeStatus::Failure),
                PreCond::SuccessIf if idle && script(&env) => return Some(NodeStatus::Success),
                PreCond::WhileTrue if idle || self.status == NodeStatus::Running => {
                    if !script(&env) {
                        if self.status == NodeStatus::Running {
                            self.halt_node();
                        }
                        return Some(NodeStatus::Skipped);
                    }
                }
                _ => (),
            }
        }
        None
    }

    fn check_post_conditions(&self, status: NodeStatus) {
        let env = self.config.script_env();
        let specific = match status {
            NodeStatus::Success => PostCond::OnSuccess,
            NodeStatus::Failure => PostCond::OnFailure,
            _ => return,
        };
        for cond in [specific, PostCond::Always] {
            if let Some(script) = self.config.post_conditions.get(&cond) {
                script(&env);
            }
        }
    }

    /// # Panics
    ///
    /// Panics on `Idle`, which only [`Self::reset_status`] may set.
    fn set_status(&mut self, status: NodeStatus) {
        assert!(
            status != NodeStatus::Idle,
            "node [{}] cannot set its own status to IDLE",
            self.name
        );
        let prev_status = std::mem::replace(&mut self.status, status);
        if prev_status != status {
            self.notify_status_change(prev_status, status);
        }
    }

    pub fn reset_status(&mut self) {
        let prev_status = std::mem::replace(&mut self.status, NodeStatus::Idle);
        if prev_status != NodeStatus::Idle {
            self.notify_status_change(prev_status, NodeStatus::Idle);
        }
    }

    fn notify_status_change(&self, prev_status: NodeStatus, status: NodeStatus) {
        trace!(
            "[{}] {} ({}): {} -> {}",
            self.config.uid,
            self.name,
            self.registration_name,
            prev_status,
            status
        );
        self.status_signal.notify(&StatusChange {
            stamp: Instant::now(),
            uid: self.config.uid,
            name: &self.name,
            path: &self.config.path,
            prev_status,
            status,
        });
    }

    /// Halts every running descendant, then the node's own body, runs the
    /// `OnHalted` script and resets the node to `Idle`. No-op on an idle node.
    pub fn halt_node(&mut self) {
        if self.status == NodeStatus::Idle {
            return;
        }
        debug!("halting [{}] {}", self.config.uid, self.name);

        for child in &mut self.children {
            child.halt_and_reset();
        }

        let mut ctx = Context {
            status: self.status,
            name: &self.name,
            config: &self.config,
            ports: &self.ports,
            children: &mut self.children,
            wake_up: self.wake_up.as_ref(),
        };
        self.node.halt(&mut ctx);

        if let Some(script) = self.config.post_conditions.get(&PostCond::OnHalted) {
            script(&self.config.script_env());
        }
        self.reset_status();
    }

    /// What a parent does with a child it no longer needs: halt it if it is
    /// running, otherwise only reset its status.
    pub(crate) fn halt_and_reset(&mut self) {
        if self.status == NodeStatus::Running {
            self.halt_node();
        } else {
            self.reset_status();
        }
    }
}

impl Debug for TreeNode {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.debug_struct("TreeNode")
            .field("name", &self.name)
            .field("registration_name", &self.registration_name)
            .field("uid", &self.config.uid)
            .field("status", &self.status)
            .field("children", &self.children)
            .finish()
    }
}

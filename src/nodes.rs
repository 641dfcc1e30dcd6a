use crate::{
    blackboard::{lock, Blackboard},
    BehaviorNode, Context, NodeKind, NodeStatus, PortSpec,
};
use std::collections::{BTreeSet, VecDeque};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Ticks children in order until one fails or is still running.
/// A running child is resumed on the next tick without re-ticking the
/// children before it.
#[derive(Default)]
pub struct SequenceNode {
    current_child: usize,
    all_skipped: bool,
}

impl BehaviorNode for SequenceNode {
    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        if ctx.status() == NodeStatus::Idle {
            self.all_skipped = true;
        }
        while self.current_child < ctx.children_count() {
            let status = ctx.tick_child(self.current_child);
            self.all_skipped &= status == NodeStatus::Skipped;
            match status {
                NodeStatus::Running => return NodeStatus::Running,
                NodeStatus::Failure => {
                    ctx.reset_children();
                    self.current_child = 0;
                    return NodeStatus::Failure;
                }
                NodeStatus::Success | NodeStatus::Skipped => self.current_child += 1,
                NodeStatus::Idle => unreachable!("a ticked child never reports IDLE"),
            }
        }
        ctx.reset_children();
        self.current_child = 0;
        if self.all_skipped {
            NodeStatus::Skipped
        } else {
            NodeStatus::Success
        }
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.current_child = 0;
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }
}

/// Like [`SequenceNode`], but a failing child is ticked again on the next
/// tick instead of starting over from the first child.
#[derive(Default)]
pub struct SequenceWithMemoryNode {
    current_child: usize,
    all_skipped: bool,
}

impl BehaviorNode for SequenceWithMemoryNode {
    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        if ctx.status() == NodeStatus::Idle {
            self.all_skipped = true;
        }
        while self.current_child < ctx.children_count() {
            let status = ctx.tick_child(self.current_child);
            self.all_skipped &= status == NodeStatus::Skipped;
            match status {
                NodeStatus::Running => return NodeStatus::Running,
                NodeStatus::Failure => {
                    // Keep the index, but the children after it start over.
                    ctx.halt_children_from(self.current_child);
                    return NodeStatus::Failure;
                }
                NodeStatus::Success | NodeStatus::Skipped => self.current_child += 1,
                NodeStatus::Idle => unreachable!("a ticked child never reports IDLE"),
            }
        }
        ctx.reset_children();
        self.current_child = 0;
        if self.all_skipped {
            NodeStatus::Skipped
        } else {
            NodeStatus::Success
        }
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.current_child = 0;
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }
}

/// Ticks every child from the first one on each tick.
#[derive(Default)]
pub struct ReactiveSequenceNode;

impl BehaviorNode for ReactiveSequenceNode {
    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        let mut all_skipped = true;
        for index in 0..ctx.children_count() {
            let status = ctx.tick_child(index);
            all_skipped &= status == NodeStatus::Skipped;
            match status {
                NodeStatus::Running => {
                    // Earlier children completed synchronously in this pass;
                    // a later child may still be running from a previous tick.
                    for previous in 0..index {
                        ctx.halt_child(previous);
                    }
                    ctx.halt_children_from(index + 1);
                    return NodeStatus::Running;
                }
                NodeStatus::Failure => {
                    ctx.reset_children();
                    return NodeStatus::Failure;
                }
                NodeStatus::Success | NodeStatus::Skipped => (),
                NodeStatus::Idle => unreachable!("a ticked child never reports IDLE"),
            }
        }
        ctx.reset_children();
        if all_skipped {
            NodeStatus::Skipped
        } else {
            NodeStatus::Success
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }
}

/// Ticks children in order until one succeeds or is still running.
#[derive(Default)]
pub struct FallbackNode {
    current_child: usize,
    all_skipped: bool,
}

impl BehaviorNode for FallbackNode {
    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        if ctx.status() == NodeStatus::Idle {
            self.all_skipped = true;
        }
        while self.current_child < ctx.children_count() {
            let status = ctx.tick_child(self.current_child);
            self.all_skipped &= status == NodeStatus::Skipped;
            match status {
                NodeStatus::Running => return NodeStatus::Running,
                NodeStatus::Success => {
                    ctx.reset_children();
                    self.current_child = 0;
                    return NodeStatus::Success;
                }
                NodeStatus::Failure | NodeStatus::Skipped => self.current_child += 1,
                NodeStatus::Idle => unreachable!("a ticked child never reports IDLE"),
            }
        }
        ctx.reset_children();
        self.current_child = 0;
        if self.all_skipped {
            NodeStatus::Skipped
        } else {
            NodeStatus::Failure
        }
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.current_child = 0;
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }
}

#[derive(Default)]
pub struct ReactiveFallbackNode;

impl BehaviorNode for ReactiveFallbackNode {
    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        let mut all_skipped = true;
        for index in 0..ctx.children_count() {
            let status = ctx.tick_child(index);
            all_skipped &= status == NodeStatus::Skipped;
            match status {
                NodeStatus::Running => {
                    for previous in 0..index {
                        ctx.halt_child(previous);
                    }
                    ctx.halt_children_from(index + 1);
                    return NodeStatus::Running;
                }
                NodeStatus::Success => {
                    ctx.reset_children();
                    return NodeStatus::Success;
                }
                NodeStatus::Failure | NodeStatus::Skipped => (),
                NodeStatus::Idle => unreachable!("a ticked child never reports IDLE"),
            }
        }
        ctx.reset_children();
        if all_skipped {
            NodeStatus::Skipped
        } else {
            NodeStatus::Failure
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }
}

/// Negative thresholds count from the number of children: `-1` means all of them.
fn resolve_threshold(threshold: i32, children: usize) -> usize {
    if threshold < 0 {
        (children as i64 + i64::from(threshold) + 1).max(0) as usize
    } else {
        threshold as usize
    }
}

const SUCCESS_COUNT: &str = "success_count";
const FAILURE_COUNT: &str = "failure_count";

/// Ticks all children "at once". Succeeds when `success_count` children have
/// succeeded and fails when `failure_count` have failed, or when success has
/// become impossible. Children that completed stay completed until the round ends.
#[derive(Default)]
pub struct ParallelNode {
    thresholds: Option<(i32, i32)>,
    completed: BTreeSet<usize>,
    success_count: usize,
    failure_count: usize,
}

impl ParallelNode {
    /// Fixed thresholds instead of reading them from the ports.
    pub fn new(success_threshold: i32, failure_threshold: i32) -> Self {
        Self {
            thresholds: Some((success_threshold, failure_threshold)),
            ..Self::default()
        }
    }

    fn clear(&mut self) {
        self.completed.clear();
        self.success_count = 0;
        self.failure_count = 0;
    }

    fn thresholds(&self, ctx: &Context) -> Option<(i32, i32)> {
        if let Some(thresholds) = self.thresholds {
            return Some(thresholds);
        }
        match (
            ctx.get_input::<i32>(SUCCESS_COUNT),
            ctx.get_input::<i32>(FAILURE_COUNT),
        ) {
            (Ok(success), Ok(failure)) => Some((success, failure)),
            (Err(e), _) | (_, Err(e)) => {
                warn!("{}: cannot read thresholds: {}", ctx.name(), e);
                None
            }
        }
    }
}

impl BehaviorNode for ParallelNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new_in(SUCCESS_COUNT)
                .typed::<i32>()
                .with_default("-1")
                .with_description("number of children that need to succeed, -1 for all"),
            PortSpec::new_in(FAILURE_COUNT)
                .typed::<i32>()
                .with_default("1")
                .with_description("number of children that need to fail, -1 for all"),
        ]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        let Some((success_threshold, failure_threshold)) = self.thresholds(ctx) else {
            return NodeStatus::Failure;
        };
        let children_count = ctx.children_count();
        let required_success = resolve_threshold(success_threshold, children_count);
        let required_failure = resolve_threshold(failure_threshold, children_count);
        if children_count < required_success || children_count < required_failure {
            error!(
                "{}: thresholds ({}, {}) exceed the number of children {}",
                ctx.name(),
                success_threshold,
                failure_threshold,
                children_count
            );
            return NodeStatus::Failure;
        }

        let mut skipped_count = 0;
        for index in 0..children_count {
            if self.completed.contains(&index) {
                continue;
            }
            match ctx.tick_child(index) {
                NodeStatus::Skipped => skipped_count += 1,
                NodeStatus::Success => {
                    self.completed.insert(index);
                    self.success_count += 1;
                }
                NodeStatus::Failure => {
                    self.completed.insert(index);
                    self.failure_count += 1;
                }
                NodeStatus::Running => (),
                NodeStatus::Idle => unreachable!("a ticked child never reports IDLE"),
            }
        }

        // Skipped children count towards "all of them".
        let successes = if success_threshold < 0 {
            self.success_count + skipped_count
        } else {
            self.success_count
        };
        if successes >= required_success {
            self.clear();
            ctx.reset_children();
            return NodeStatus::Success;
        }
        if children_count - self.failure_count < required_success
            || self.failure_count >= required_failure
        {
            self.clear();
            ctx.reset_children();
            return NodeStatus::Failure;
        }

        if skipped_count == children_count {
            NodeStatus::Skipped
        } else {
            NodeStatus::Running
        }
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.clear();
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }
}

const MAX_FAILURES: &str = "max_failures";

/// Ticks all children until every one of them completed, then fails if at
/// least `max_failures` of them failed.
#[derive(Default)]
pub struct ParallelAllNode {
    max_failures: Option<i32>,
    completed: BTreeSet<usize>,
    failure_count: usize,
}

impl ParallelAllNode {
    pub fn new(max_failures: i32) -> Self {
        Self {
            max_failures: Some(max_failures),
            ..Self::default()
        }
    }
}

impl BehaviorNode for ParallelAllNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(MAX_FAILURES)
            .typed::<i32>()
            .with_default("1")
            .with_description("failures needed to fail, -1 for all")]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        let max_failures = match self.max_failures {
            Some(max_failures) => max_failures,
            None => match ctx.get_input::<i32>(MAX_FAILURES) {
                Ok(max_failures) => max_failures,
                Err(e) => {
                    warn!("{}: {}", ctx.name(), e);
                    return NodeStatus::Failure;
                }
            },
        };
        let children_count = ctx.children_count();
        let failure_threshold = resolve_threshold(max_failures, children_count);
        if children_count < failure_threshold {
            error!(
                "{}: max_failures {} exceeds the number of children {}",
                ctx.name(),
                max_failures,
                children_count
            );
            return NodeStatus::Failure;
        }

        let mut skipped_count = 0;
        for index in 0..children_count {
            if self.completed.contains(&index) {
                continue;
            }
            match ctx.tick_child(index) {
                NodeStatus::Skipped => skipped_count += 1,
                NodeStatus::Success => {
                    self.completed.insert(index);
                }
                NodeStatus::Failure => {
                    self.completed.insert(index);
                    self.failure_count += 1;
                }
                NodeStatus::Running => (),
                NodeStatus::Idle => unreachable!("a ticked child never reports IDLE"),
            }
        }

        if skipped_count == children_count {
            return NodeStatus::Skipped;
        }
        if skipped_count + self.completed.len() >= children_count {
            ctx.reset_children();
            let status = if self.failure_count >= failure_threshold {
                NodeStatus::Failure
            } else {
                NodeStatus::Success
            };
            self.completed.clear();
            self.failure_count = 0;
            return status;
        }
        NodeStatus::Running
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.completed.clear();
        self.failure_count = 0;
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }
}

/// Ticks the child and passes a running or skipped status through. A completed
/// status goes through `map` and the child is reset.
fn tick_decorated(ctx: &mut Context, map: impl FnOnce(NodeStatus) -> NodeStatus) -> NodeStatus {
    let status = ctx.tick_child(0);
    if status.is_completed() {
        ctx.reset_children();
        map(status)
    } else {
        status
    }
}

#[derive(Default)]
pub struct ForceSuccessNode;

impl BehaviorNode for ForceSuccessNode {
    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        tick_decorated(ctx, |_| NodeStatus::Success)
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }
}

#[derive(Default)]
pub struct ForceFailureNode;

impl BehaviorNode for ForceFailureNode {
    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        tick_decorated(ctx, |_| NodeStatus::Failure)
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }
}

#[derive(Default)]
pub struct InverterNode;

impl BehaviorNode for InverterNode {
    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        tick_decorated(ctx, |status| match status {
            NodeStatus::Success => NodeStatus::Failure,
            _ => NodeStatus::Success,
        })
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }
}

const NUM_CYCLES: &str = "num_cycles";

/// Ticks the child until it succeeded `num_cycles` times (`-1` repeats
/// forever) and fails as soon as the child fails.
#[derive(Default)]
pub struct RepeatNode {
    num_cycles: Option<i32>,
    repeat_count: i32,
}

impl RepeatNode {
    pub fn new(num_cycles: i32) -> Self {
        Self {
            num_cycles: Some(num_cycles),
            repeat_count: 0,
        }
    }
}

impl BehaviorNode for RepeatNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(NUM_CYCLES)
            .typed::<i32>()
            .with_description("repeat a successful child up to N times, -1 for infinite")]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        let num_cycles = match self.num_cycles {
            Some(num_cycles) => num_cycles,
            None => match ctx.get_input::<i32>(NUM_CYCLES) {
                Ok(num_cycles) => num_cycles,
                Err(e) => {
                    warn!("{}: {}", ctx.name(), e);
                    return NodeStatus::Failure;
                }
            },
        };

        let mut do_loop = num_cycles == -1 || self.repeat_count < num_cycles;
        while do_loop {
            let prev_status = ctx.child_status(0);
            match ctx.tick_child(0) {
                NodeStatus::Success => {
                    self.repeat_count += 1;
                    do_loop = num_cycles == -1 || self.repeat_count < num_cycles;
                    ctx.reset_children();
                    // Hand control back to the tree between synchronous
                    // iterations so that it stays haltable.
                    if do_loop && prev_status == NodeStatus::Idle && ctx.has_wake_up_signal() {
                        ctx.emit_wake_up_signal();
                        return NodeStatus::Running;
                    }
                }
                NodeStatus::Failure => {
                    self.repeat_count = 0;
                    ctx.reset_children();
                    return NodeStatus::Failure;
                }
                NodeStatus::Running => return NodeStatus::Running,
                NodeStatus::Skipped => {
                    ctx.reset_children();
                    return NodeStatus::Skipped;
                }
                NodeStatus::Idle => unreachable!("a ticked child never reports IDLE"),
            }
        }
        self.repeat_count = 0;
        NodeStatus::Success
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.repeat_count = 0;
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }
}

const NUM_ATTEMPTS: &str = "num_attempts";

/// Ticks the child again after a failure, up to `num_attempts` times in total
/// (`-1` retries forever).
#[derive(Default)]
pub struct RetryNode {
    max_attempts: Option<i32>,
    try_count: i32,
    all_skipped: bool,
}

impl RetryNode {
    pub fn new(max_attempts: i32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            ..Self::default()
        }
    }
}

impl BehaviorNode for RetryNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(NUM_ATTEMPTS)
            .typed::<i32>()
            .with_description("execute again a failing child up to N times, -1 for infinite")]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        let max_attempts = match self.max_attempts {
            Some(max_attempts) => max_attempts,
            None => match ctx.get_input::<i32>(NUM_ATTEMPTS) {
                Ok(max_attempts) => max_attempts,
                Err(e) => {
                    warn!("{}: {}", ctx.name(), e);
                    return NodeStatus::Failure;
                }
            },
        };
        if ctx.status() == NodeStatus::Idle {
            self.all_skipped = true;
        }

        let mut do_loop = max_attempts == -1 || self.try_count < max_attempts;
        while do_loop {
            let prev_status = ctx.child_status(0);
            let status = ctx.tick_child(0);
            self.all_skipped &= status == NodeStatus::Skipped;
            match status {
                NodeStatus::Success => {
                    self.try_count = 0;
                    ctx.reset_children();
                    return NodeStatus::Success;
                }
                NodeStatus::Failure => {
                    self.try_count += 1;
                    do_loop = max_attempts == -1 || self.try_count < max_attempts;
                    ctx.reset_children();
                    if do_loop && prev_status == NodeStatus::Idle && ctx.has_wake_up_signal() {
                        ctx.emit_wake_up_signal();
                        return NodeStatus::Running;
                    }
                }
                NodeStatus::Running => return NodeStatus::Running,
                NodeStatus::Skipped => {
                    ctx.reset_children();
                    return NodeStatus::Skipped;
                }
                NodeStatus::Idle => unreachable!("a ticked child never reports IDLE"),
            }
        }
        self.try_count = 0;
        if self.all_skipped {
            NodeStatus::Skipped
        } else {
            NodeStatus::Failure
        }
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.try_count = 0;
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }
}

const MSEC: &str = "msec";

/// Halts the child and fails once it has been running for longer than `msec`.
/// The deadline is checked before each tick, so the child always gets its
/// first tick.
#[derive(Default)]
pub struct TimeoutNode {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl TimeoutNode {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            deadline: None,
        }
    }
}

impl BehaviorNode for TimeoutNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(MSEC)
            .typed::<u64>()
            .with_description("after a certain amount of time, halt the child and return FAILURE")]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        if ctx.status() == NodeStatus::Idle || self.deadline.is_none() {
            let timeout = match self.timeout {
                Some(timeout) => timeout,
                None => match ctx.get_input::<u64>(MSEC) {
                    Ok(msec) => Duration::from_millis(msec),
                    Err(e) => {
                        warn!("{}: {}", ctx.name(), e);
                        return NodeStatus::Failure;
                    }
                },
            };
            self.deadline = Some(Instant::now() + timeout);
        } else if self.deadline.map_or(false, |deadline| Instant::now() >= deadline) {
            self.deadline = None;
            ctx.reset_children();
            return NodeStatus::Failure;
        }

        let status = ctx.tick_child(0);
        if status != NodeStatus::Running {
            self.deadline = None;
            ctx.reset_children();
        }
        status
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.deadline = None;
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }
}

/// A queue shared between the tree and whatever produces its items.
pub struct ProtectedQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for ProtectedQueue<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> ProtectedQueue<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().collect()),
        }
    }

    pub fn push(&self, item: T) {
        lock(&self.items).push_back(item);
    }

    pub fn pop(&self) -> Option<T> {
        lock(&self.items).pop_front()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }
}

const QUEUE: &str = "queue";
const POPPED_ITEM: &str = "popped_item";

/// Pops items from the `queue` input one at a time, writes each to
/// `popped_item` and ticks the child with it. Succeeds once the queue is
/// empty and fails as soon as the child fails.
pub struct ConsumeQueueNode<T> {
    running_child: bool,
    _item: PhantomData<fn() -> T>,
}

impl<T> Default for ConsumeQueueNode<T> {
    fn default() -> Self {
        Self {
            running_child: false,
            _item: PhantomData,
        }
    }
}

impl<T> ConsumeQueueNode<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Finishes the child that consumed the last item. `None` means "keep going".
    fn finish_child(&mut self, ctx: &mut Context, status: NodeStatus) -> Option<NodeStatus> {
        self.running_child = status == NodeStatus::Running;
        if self.running_child {
            return Some(NodeStatus::Running);
        }
        ctx.halt_child(0);
        (status == NodeStatus::Failure).then_some(NodeStatus::Failure)
    }
}

impl<T> BehaviorNode for ConsumeQueueNode<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new_in(QUEUE).typed::<Arc<ProtectedQueue<T>>>(),
            PortSpec::new_out(POPPED_ITEM).typed::<T>(),
        ]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        if ctx.status() == NodeStatus::Idle {
            self.running_child = false;
        }
        if self.running_child {
            let status = ctx.tick_child(0);
            if let Some(status) = self.finish_child(ctx, status) {
                return status;
            }
        }

        let queue = match ctx.get_input::<Arc<ProtectedQueue<T>>>(QUEUE) {
            Ok(queue) => queue,
            Err(e) => {
                warn!("{}: {}", ctx.name(), e);
                return NodeStatus::Failure;
            }
        };
        while let Some(item) = queue.pop() {
            if let Err(e) = ctx.set_output(POPPED_ITEM, item) {
                warn!("{}: {}", ctx.name(), e);
                return NodeStatus::Failure;
            }
            let status = ctx.tick_child(0);
            if let Some(status) = self.finish_child(ctx, status) {
                return status;
            }
        }
        NodeStatus::Success
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.running_child = false;
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }
}

/// The root of an instantiated subtree. Its child runs in the subtree's own
/// blackboard scope.
pub struct SubTreeNode {
    tree_id: String,
    blackboard: Arc<Blackboard>,
}

impl SubTreeNode {
    pub fn new(tree_id: impl Into<String>, blackboard: Arc<Blackboard>) -> Self {
        Self {
            tree_id: tree_id.into(),
            blackboard,
        }
    }

    /// Name of the tree definition this node instantiates.
    pub fn tree_id(&self) -> &str {
        &self.tree_id
    }

    pub fn blackboard(&self) -> &Arc<Blackboard> {
        &self.blackboard
    }
}

impl BehaviorNode for SubTreeNode {
    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        tick_decorated(ctx, |status| status)
    }

    fn kind(&self) -> NodeKind {
        NodeKind::SubTree
    }
}

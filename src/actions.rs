use crate::{BehaviorNode, Blackboard, Context, NodeKind, NodeStatus, PortSpec, WakeUpSignal};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver, TryRecvError},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, warn};

#[derive(Default)]
pub struct AlwaysSuccessNode;

impl BehaviorNode for AlwaysSuccessNode {
    fn tick(&mut self, _ctx: &mut Context) -> NodeStatus {
        NodeStatus::Success
    }
}

#[derive(Default)]
pub struct AlwaysFailureNode;

impl BehaviorNode for AlwaysFailureNode {
    fn tick(&mut self, _ctx: &mut Context) -> NodeStatus {
        NodeStatus::Failure
    }
}

/// Copies `value` into the blackboard entry bound to `output_key`.
#[derive(Default)]
pub struct SetBlackboardNode;

impl BehaviorNode for SetBlackboardNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new_in("value").with_description("value to be written"),
            PortSpec::new_inout("output_key").with_description("entry to be written"),
        ]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        let result = ctx
            .get_input_any("value")
            .and_then(|value| ctx.set_output_any("output_key", value));
        match result {
            Ok(()) => NodeStatus::Success,
            Err(e) => {
                warn!("{}: {}", ctx.name(), e);
                NodeStatus::Failure
            }
        }
    }
}

/// Succeeds if `input` is true.
#[derive(Default)]
pub struct IsTrueNode;

impl BehaviorNode for IsTrueNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("input").typed::<bool>()]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        match ctx.get_input::<bool>("input") {
            Ok(true) => NodeStatus::Success,
            Ok(false) => NodeStatus::Failure,
            Err(e) => {
                warn!("{}: {}", ctx.name(), e);
                NodeStatus::Failure
            }
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Condition
    }
}

/// An action split into its start, its progress and its cancellation.
/// Wrap it in [`Stateful`] to use it as a node.
pub trait StatefulAction: Send {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![]
    }

    /// Called when the node is ticked while it is not running.
    fn on_start(&mut self, ctx: &mut Context) -> NodeStatus;

    /// Called on every tick after `on_start` or `on_running` returned `Running`.
    fn on_running(&mut self, ctx: &mut Context) -> NodeStatus;

    /// Called when the node gets halted while it is running.
    fn on_halted(&mut self, _ctx: &mut Context) {}
}

pub struct Stateful<T>(pub T);

impl<T: StatefulAction> BehaviorNode for Stateful<T> {
    fn provided_ports(&self) -> Vec<PortSpec> {
        self.0.provided_ports()
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        if ctx.status() == NodeStatus::Running {
            self.0.on_running(ctx)
        } else {
            self.0.on_start(ctx)
        }
    }

    fn halt(&mut self, ctx: &mut Context) {
        if ctx.status() == NodeStatus::Running {
            self.0.on_halted(ctx);
        }
    }
}

/// Keeps running for `msec` milliseconds without blocking the tree.
#[derive(Default)]
pub struct SleepNode {
    deadline: Option<Instant>,
    timer: Option<Timer>,
}

impl StatefulAction for SleepNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("msec").typed::<u64>()]
    }

    fn on_start(&mut self, ctx: &mut Context) -> NodeStatus {
        let msec = match ctx.get_input::<u64>("msec") {
            Ok(msec) => msec,
            Err(e) => {
                warn!("{}: {}", ctx.name(), e);
                return NodeStatus::Failure;
            }
        };
        if msec == 0 {
            return NodeStatus::Success;
        }
        let duration = Duration::from_millis(msec);
        let deadline = Instant::now() + duration;
        // Wake the tree driver up when the time is over instead of waiting
        // for its next scheduled tick.
        if let Some(signal) = ctx.wake_up_signal() {
            match Timer::spawn(ctx.name(), duration, signal) {
                Ok(timer) => self.timer = Some(timer),
                Err(e) => {
                    error!("{}: cannot spawn timer thread: {}", ctx.name(), e);
                    return NodeStatus::Failure;
                }
            }
        }
        self.deadline = Some(deadline);
        NodeStatus::Running
    }

    fn on_running(&mut self, _ctx: &mut Context) -> NodeStatus {
        match self.deadline {
            Some(deadline) if Instant::now() < deadline => NodeStatus::Running,
            _ => {
                self.deadline = None;
                self.timer = None;
                NodeStatus::Success
            }
        }
    }

    fn on_halted(&mut self, _ctx: &mut Context) {
        self.deadline = None;
        self.timer = None;
    }
}

/// Raises a wake-up signal once after a delay. Dropping it cancels the
/// delay and joins the thread.
struct Timer {
    cancel: Arc<WakeUpSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    fn spawn(name: &str, delay: Duration, signal: Arc<WakeUpSignal>) -> std::io::Result<Self> {
        let cancel = WakeUpSignal::new();
        let cancelled = cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("{name}-timer"))
            .spawn(move || {
                if !cancelled.wait_for(delay) {
                    signal.emit_signal();
                }
            })?;
        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel.emit_signal();
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

/// Cancellation request passed to the work of a [`ThreadedAction`].
#[derive(Clone, Default, Debug)]
pub struct HaltFlag(Arc<AtomicBool>);

impl HaltFlag {
    pub fn is_halt_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn request(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Runs a closure on a background thread and reports `Running` until it
/// returns. The closure should poll its [`HaltFlag`] and return early once a
/// halt was requested; halting the node waits for it.
///
/// A panic in the closure, or a result other than `Success` or `Failure`,
/// makes the node fail.
pub struct ThreadedAction<F> {
    work: Arc<F>,
    halt_flag: HaltFlag,
    worker: Option<Worker>,
}

struct Worker {
    handle: JoinHandle<()>,
    result: Receiver<NodeStatus>,
}

impl<F> ThreadedAction<F>
where
    F: Fn(&HaltFlag, &Arc<Blackboard>) -> NodeStatus + Send + Sync + 'static,
{
    pub fn new(work: F) -> Self {
        Self {
            work: Arc::new(work),
            halt_flag: HaltFlag::default(),
            worker: None,
        }
    }

    fn spawn(&mut self, ctx: &Context) -> NodeStatus {
        self.halt_flag = HaltFlag::default();
        let work = self.work.clone();
        let halt_flag = self.halt_flag.clone();
        let blackboard = ctx.blackboard().clone();
        let wake_up = ctx.wake_up_signal();
        let name = ctx.name().to_owned();
        let (sender, result) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let status = catch_unwind(AssertUnwindSafe(|| work(&halt_flag, &blackboard)))
                    .unwrap_or_else(|_| {
                        error!("{}: threaded action panicked", name);
                        NodeStatus::Failure
                    });
                // The node may have been dropped in the meantime.
                sender.send(status).ok();
                if let Some(signal) = wake_up {
                    signal.emit_signal();
                }
            });
        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker { handle, result });
                NodeStatus::Running
            }
            Err(e) => {
                error!("{}: cannot spawn worker thread: {}", ctx.name(), e);
                NodeStatus::Failure
            }
        }
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.handle.join().ok();
        }
    }
}

impl<F> BehaviorNode for ThreadedAction<F>
where
    F: Fn(&HaltFlag, &Arc<Blackboard>) -> NodeStatus + Send + Sync + 'static,
{
    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        let received = match &self.worker {
            None => return self.spawn(ctx),
            Some(worker) => worker.result.try_recv(),
        };
        let status = match received {
            Err(TryRecvError::Empty) => return NodeStatus::Running,
            Ok(status) if status.is_completed() => status,
            Ok(status) => {
                error!(
                    "{}: threaded action returned {}, treating it as FAILURE",
                    ctx.name(),
                    status
                );
                NodeStatus::Failure
            }
            Err(TryRecvError::Disconnected) => NodeStatus::Failure,
        };
        self.join();
        status
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.halt_flag.request();
        self.join();
    }
}

#[cfg(test)]
mod test;

use super::*;
use crate::{error::ConfigError, NodeConfig, TreeNode};
use std::sync::atomic::AtomicUsize;

fn tick_until_done(node: &mut TreeNode) -> NodeStatus {
    loop {
        let status = node.execute_tick();
        if status != NodeStatus::Running {
            return status;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_set_blackboard() {
    let blackboard = Blackboard::create();
    let mut node = TreeNode::new(
        "set",
        SetBlackboardNode,
        NodeConfig::new(blackboard.clone())
            .with_port("value", "42")
            .with_port("output_key", "{answer}"),
    )
    .unwrap();
    assert_eq!(node.execute_tick(), NodeStatus::Success);
    assert_eq!(blackboard.get::<String>("answer").unwrap(), "42");

    // An entry with a fixed type converts the string on write.
    blackboard.set("count", 1i32).unwrap();
    let mut node = TreeNode::new(
        "set",
        SetBlackboardNode,
        NodeConfig::new(blackboard.clone())
            .with_port("value", "7")
            .with_port("output_key", "{count}"),
    )
    .unwrap();
    assert_eq!(node.execute_tick(), NodeStatus::Success);
    assert_eq!(blackboard.get::<i32>("count").unwrap(), 7);
}

#[test]
fn test_set_blackboard_copies_entries() {
    let blackboard = Blackboard::create();
    blackboard.set("source", 2.5f64).unwrap();
    let mut node = TreeNode::new(
        "copy",
        SetBlackboardNode,
        NodeConfig::new(blackboard.clone())
            .with_port("value", "{source}")
            .with_port("output_key", "{target}"),
    )
    .unwrap();
    assert_eq!(node.execute_tick(), NodeStatus::Success);
    assert_eq!(blackboard.get::<f64>("target").unwrap(), 2.5);
}

#[test]
fn test_set_blackboard_rejects_literal_output() {
    let result = TreeNode::new(
        "set",
        SetBlackboardNode,
        NodeConfig::new(Blackboard::create())
            .with_port("value", "1")
            .with_port("output_key", "answer"),
    );
    assert!(matches!(result, Err(ConfigError::LiteralOnOutput { .. })));
}

#[test]
fn test_is_true() {
    let blackboard = Blackboard::create();
    blackboard.set("flag", true).unwrap();
    let mut node = TreeNode::new(
        "check",
        IsTrueNode,
        NodeConfig::new(blackboard.clone()).with_port("input", "{flag}"),
    )
    .unwrap();
    assert_eq!(node.kind(), NodeKind::Condition);
    assert_eq!(node.execute_tick(), NodeStatus::Success);

    blackboard.set("flag", false).unwrap();
    assert_eq!(node.execute_tick(), NodeStatus::Failure);

    let mut node = TreeNode::new(
        "literal",
        IsTrueNode,
        NodeConfig::new(Blackboard::create()).with_port("input", "true"),
    )
    .unwrap();
    assert_eq!(node.execute_tick(), NodeStatus::Success);
}

#[test]
fn test_sleep() {
    let mut node = TreeNode::new(
        "sleep",
        Stateful(SleepNode::default()),
        NodeConfig::new(Blackboard::create()).with_port("msec", "30"),
    )
    .unwrap();
    let start = Instant::now();
    assert_eq!(node.execute_tick(), NodeStatus::Running);
    assert_eq!(tick_until_done(&mut node), NodeStatus::Success);
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[test]
fn test_sleep_halt_cancels_timer() {
    let signal = WakeUpSignal::new();
    let sleep = |msec: &str| {
        let mut node = TreeNode::new(
            "sleep",
            Stateful(SleepNode::default()),
            NodeConfig::new(Blackboard::create()).with_port("msec", msec),
        )
        .unwrap();
        node.set_wake_up_signal(signal.clone());
        node
    };

    // Halting joins the timer, so this only finishes if the timers are cancelled.
    let mut long = sleep("60000");
    let start = Instant::now();
    for _ in 0..200 {
        assert_eq!(long.execute_tick(), NodeStatus::Running);
        long.halt_node();
        assert_eq!(long.status(), NodeStatus::Idle);
    }
    assert!(start.elapsed() < Duration::from_secs(30));

    // A halted timer never raises the signal.
    let mut short = sleep("20");
    assert_eq!(short.execute_tick(), NodeStatus::Running);
    short.halt_node();
    signal.take();
    assert!(!signal.wait_for(Duration::from_millis(80)));
}

#[test]
fn test_sleep_raises_wake_up_signal() {
    let signal = WakeUpSignal::new();
    let mut node = TreeNode::new(
        "sleep",
        Stateful(SleepNode::default()),
        NodeConfig::new(Blackboard::create()).with_port("msec", "20"),
    )
    .unwrap();
    node.set_wake_up_signal(signal.clone());
    assert_eq!(node.execute_tick(), NodeStatus::Running);
    assert!(signal.wait_for(Duration::from_secs(5)));
    assert_eq!(node.execute_tick(), NodeStatus::Success);
}

#[test]
fn test_sleep_zero_succeeds_at_once() {
    let mut node = TreeNode::new(
        "sleep",
        Stateful(SleepNode::default()),
        NodeConfig::new(Blackboard::create()).with_port("msec", "0"),
    )
    .unwrap();
    assert_eq!(node.execute_tick(), NodeStatus::Success);
}

struct Counted {
    started: Arc<AtomicUsize>,
    halted: Arc<AtomicUsize>,
}

impl StatefulAction for Counted {
    fn on_start(&mut self, _ctx: &mut Context) -> NodeStatus {
        self.started.fetch_add(1, Ordering::SeqCst);
        NodeStatus::Running
    }

    fn on_running(&mut self, _ctx: &mut Context) -> NodeStatus {
        NodeStatus::Running
    }

    fn on_halted(&mut self, _ctx: &mut Context) {
        self.halted.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_stateful_lifecycle() {
    let started = Arc::new(AtomicUsize::new(0));
    let halted = Arc::new(AtomicUsize::new(0));
    let mut node = TreeNode::new(
        "counted",
        Stateful(Counted {
            started: started.clone(),
            halted: halted.clone(),
        }),
        NodeConfig::new(Blackboard::create()),
    )
    .unwrap();

    node.execute_tick();
    node.execute_tick();
    assert_eq!(started.load(Ordering::SeqCst), 1);

    node.halt_node();
    node.halt_node();
    assert_eq!(halted.load(Ordering::SeqCst), 1);

    node.execute_tick();
    assert_eq!(started.load(Ordering::SeqCst), 2);
}

#[test]
fn test_threaded_action() {
    let blackboard = Blackboard::create();
    let mut node = TreeNode::new(
        "worker",
        ThreadedAction::new(|_halt: &HaltFlag, blackboard: &Arc<Blackboard>| {
            thread::sleep(Duration::from_millis(20));
            match blackboard.set("result", 10i32) {
                Ok(()) => NodeStatus::Success,
                Err(_) => NodeStatus::Failure,
            }
        }),
        NodeConfig::new(blackboard.clone()),
    )
    .unwrap();

    assert_eq!(node.execute_tick(), NodeStatus::Running);
    assert_eq!(tick_until_done(&mut node), NodeStatus::Success);
    assert_eq!(blackboard.get::<i32>("result").unwrap(), 10);
}

#[test]
fn test_threaded_action_halt_waits_for_worker() {
    let blackboard = Blackboard::create();
    let mut node = TreeNode::new(
        "worker",
        ThreadedAction::new(|halt: &HaltFlag, blackboard: &Arc<Blackboard>| {
            while !halt.is_halt_requested() {
                thread::sleep(Duration::from_millis(1));
            }
            blackboard.set("cancelled", true).ok();
            NodeStatus::Failure
        }),
        NodeConfig::new(blackboard.clone()),
    )
    .unwrap();

    assert_eq!(node.execute_tick(), NodeStatus::Running);
    node.halt_node();
    assert_eq!(node.status(), NodeStatus::Idle);
    assert!(blackboard.get::<bool>("cancelled").unwrap());

    // The next tick starts a fresh worker.
    assert_eq!(node.execute_tick(), NodeStatus::Running);
    node.halt_node();
}

#[test]
fn test_threaded_action_failures() {
    let mut node = TreeNode::new(
        "panics",
        ThreadedAction::new(|_: &HaltFlag, _: &Arc<Blackboard>| -> NodeStatus {
            panic!("worker failed")
        }),
        NodeConfig::new(Blackboard::create()),
    )
    .unwrap();
    assert_eq!(node.execute_tick(), NodeStatus::Running);
    assert_eq!(tick_until_done(&mut node), NodeStatus::Failure);

    let mut node = TreeNode::new(
        "returns_running",
        ThreadedAction::new(|_: &HaltFlag, _: &Arc<Blackboard>| NodeStatus::Running),
        NodeConfig::new(Blackboard::create()),
    )
    .unwrap();
    assert_eq!(node.execute_tick(), NodeStatus::Running);
    assert_eq!(tick_until_done(&mut node), NodeStatus::Failure);
}

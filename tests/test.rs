use behavior_tree_engine::{
    boxify, error::BlackboardError, hash_map, load_yaml_with_blackboard, BehaviorNode,
    Blackboard, Context, HaltFlag, NodeConfig, NodeStatus, ParallelNode, PortSpec, Registry,
    SequenceNode, ThreadedAction, Tree, TreeNode,
};
use std::any::Any;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

trait Animal: Send + Sync {
    fn name(&self) -> String;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

struct Sphynx;

impl Animal for Sphynx {
    fn name(&self) -> String {
        "Sphynx".to_string()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct Dog;

impl Animal for Dog {
    fn name(&self) -> String {
        "Dog".to_string()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

fn animal_registry() -> Registry {
    let registry = Registry::default();
    registry.register_cast::<Arc<Sphynx>, Arc<dyn Animal>>(
        |sphynx| sphynx as Arc<dyn Animal>,
        |animal| animal.into_any().downcast::<Sphynx>().ok(),
    );
    registry.register_cast::<Arc<Dog>, Arc<dyn Animal>>(
        |dog| dog as Arc<dyn Animal>,
        |animal| animal.into_any().downcast::<Dog>().ok(),
    );
    registry
}

struct AdoptSphynx;

impl BehaviorNode for AdoptSphynx {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_out("animal").typed::<Arc<dyn Animal>>()]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        match ctx.set_output("animal", Arc::new(Sphynx)) {
            Ok(()) => NodeStatus::Success,
            Err(_) => NodeStatus::Failure,
        }
    }
}

struct SayName;

impl BehaviorNode for SayName {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new_in("animal").typed::<Arc<dyn Animal>>(),
            PortSpec::new_out("name").typed::<String>(),
        ]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        let Ok(animal) = ctx.get_input::<Arc<dyn Animal>>("animal") else {
            return NodeStatus::Failure;
        };
        match ctx.set_output("name", animal.name()) {
            Ok(()) => NodeStatus::Success,
            Err(_) => NodeStatus::Failure,
        }
    }
}

/// Reads the entry as a `Dog`, which only works if it holds one.
struct IsDog;

impl BehaviorNode for IsDog {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("animal")]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        match ctx.get_input::<Arc<Dog>>("animal") {
            Ok(_) => NodeStatus::Success,
            Err(_) => NodeStatus::Failure,
        }
    }
}

#[test]
fn test_polymorphic_ports() -> anyhow::Result<()> {
    let registry = animal_registry();
    let blackboard = registry.create_blackboard();
    let config = || NodeConfig::new(blackboard.clone());

    let mut root = TreeNode::new("root", SequenceNode::default(), config())?;
    root.add_child(TreeNode::new(
        "adopt",
        AdoptSphynx,
        config().with_port("animal", "{pet}"),
    )?)?;
    root.add_child(TreeNode::new(
        "say_name",
        SayName,
        config().with_remapping(hash_map!("animal" => "{pet}", "name" => "{pet_name}")),
    )?)?;

    let mut tree = Tree::new(root, blackboard.clone())?;
    assert_eq!(tree.tick_once(), NodeStatus::Success);
    assert_eq!(blackboard.get::<String>("pet_name")?, "Sphynx");

    // The stored base can be downcast to what it really is, but not to a sibling.
    let sphynx = blackboard.get::<Arc<Sphynx>>("pet")?;
    assert_eq!(sphynx.name(), "Sphynx");
    assert!(matches!(
        blackboard.get::<Arc<Dog>>("pet"),
        Err(BlackboardError::Cast { .. })
    ));

    let mut is_dog = TreeNode::new("is_dog", IsDog, config().with_port("animal", "{pet}"))?;
    assert_eq!(is_dog.execute_tick(), NodeStatus::Failure);
    Ok(())
}

#[test]
fn test_unrelated_type_is_rejected() -> anyhow::Result<()> {
    let registry = animal_registry();
    let blackboard = registry.create_blackboard();
    blackboard.set("pet", Arc::new(Dog) as Arc<dyn Animal>)?;
    // Values that have nothing to do with the entry type are never stored.
    assert!(matches!(
        blackboard.set("pet", 42i32),
        Err(BlackboardError::TypeMismatch { .. })
    ));
    assert_eq!(blackboard.get::<Arc<dyn Animal>>("pet")?.name(), "Dog");
    Ok(())
}

#[test]
fn test_blackboard_round_trip() -> anyhow::Result<()> {
    let blackboard = Blackboard::create();
    blackboard.set("x", 5i32)?;
    assert_eq!(blackboard.get::<i32>("x")?, 5);
    blackboard.set("x", "6".to_string())?;
    assert_eq!(blackboard.get::<i32>("x")?, 6);
    assert!(blackboard.set("x", "six".to_string()).is_err());
    assert_eq!(blackboard.get::<i32>("x")?, 6);
    Ok(())
}

struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl BehaviorNode for Recorder {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("result").typed::<NodeStatus>()]
    }

    fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        self.log.lock().unwrap().push(format!("tick {}", self.label));
        ctx.get_input::<NodeStatus>("result")
            .unwrap_or(NodeStatus::Failure)
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.log.lock().unwrap().push(format!("halt {}", self.label));
    }
}

fn recorder_registry(log: &Arc<Mutex<Vec<String>>>) -> Registry {
    let mut registry = Registry::default();
    for label in ["a", "b", "c"] {
        let log = log.clone();
        registry.register(
            format!("Record_{label}"),
            boxify(move || Recorder {
                label,
                log: log.clone(),
            }),
        );
    }
    registry
}

#[test]
fn test_halting_sequence_halts_only_running_child() -> anyhow::Result<()> {
    let source = r#"
behavior_tree:
  main:
    type: Sequence
    children:
    - type: Record_a
      ports:
        result: SUCCESS
    - type: Record_b
      ports:
        result: "{b}"
    - type: Record_c
      ports:
        result: SUCCESS
"#;
    let log = Arc::new(Mutex::new(vec![]));
    let registry = recorder_registry(&log);
    let blackboard = registry.create_blackboard();
    blackboard.set("b", NodeStatus::Running)?;
    let mut tree = load_yaml_with_blackboard(source, &registry, blackboard.clone())?;

    assert_eq!(tree.tick_once(), NodeStatus::Running);
    tree.halt_tree();
    assert_eq!(*log.lock().unwrap(), vec!["tick a", "tick b", "halt b"]);

    // The sequence starts over from its first child.
    log.lock().unwrap().clear();
    blackboard.set("b", "SUCCESS".to_string())?;
    assert_eq!(tree.tick_once(), NodeStatus::Success);
    assert_eq!(*log.lock().unwrap(), vec!["tick a", "tick b", "tick c"]);
    Ok(())
}

fn leaf(name: &str, result: &Arc<Mutex<NodeStatus>>, ticks: &Arc<AtomicUsize>) -> TreeNode {
    let result = result.clone();
    let ticks = ticks.clone();
    TreeNode::new(
        name,
        ThreadedAction::new(move |_: &HaltFlag, _: &Arc<Blackboard>| {
            ticks.fetch_add(1, Ordering::SeqCst);
            *result.lock().unwrap()
        }),
        NodeConfig::new(Blackboard::create()),
    )
    .unwrap()
}

#[test]
fn test_parallel_failure_threshold() -> anyhow::Result<()> {
    let failure = Arc::new(Mutex::new(NodeStatus::Failure));
    let success = Arc::new(Mutex::new(NodeStatus::Success));
    let ticks = Arc::new(AtomicUsize::new(0));

    let root = TreeNode::new(
        "parallel",
        ParallelNode::new(2, 2),
        NodeConfig::new(Blackboard::create()),
    )?
    .with_children([
        leaf("first", &failure, &ticks),
        leaf("second", &failure, &ticks),
        leaf("third", &success, &ticks),
    ])?;
    let mut tree = Tree::new(root, Blackboard::create())?;

    assert_eq!(
        tree.tick_while_running(Duration::from_millis(5)),
        NodeStatus::Failure
    );
    assert_eq!(ticks.load(Ordering::SeqCst), 3);

    // A new round starts with fresh tallies.
    *failure.lock().unwrap() = NodeStatus::Success;
    assert_eq!(
        tree.tick_while_running(Duration::from_millis(5)),
        NodeStatus::Success
    );
    Ok(())
}

#[test]
fn test_status_changes_across_tree() -> anyhow::Result<()> {
    let source = r#"
behavior_tree:
  main:
    type: Sequence
    children:
    - type: AlwaysSuccess
    - type: Sleep
      ports:
        msec: 20
"#;
    let registry = Registry::default();
    let mut tree = load_yaml_with_blackboard(source, &registry, registry.create_blackboard())?;
    let changes = Arc::new(Mutex::new(vec![]));
    let recorded = changes.clone();
    let _subscribers = tree.subscribe_to_status_changes(move |change| {
        if change.status == NodeStatus::Running {
            recorded.lock().unwrap().push(change.path.to_owned());
        }
    });

    assert_eq!(
        tree.tick_while_running(Duration::from_secs(5)),
        NodeStatus::Success
    );
    assert_eq!(*changes.lock().unwrap(), vec!["Sleep", "Sequence"]);
    Ok(())
}

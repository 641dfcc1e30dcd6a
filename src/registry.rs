use crate::{
    actions::{
        AlwaysFailureNode, AlwaysSuccessNode, IsTrueNode, SetBlackboardNode, SleepNode, Stateful,
    },
    cast_registry::PolymorphicCastRegistry,
    config::{EnumsTable, NodeConfig},
    error::ConfigError,
    nodes::{
        FallbackNode, ForceFailureNode, ForceSuccessNode, InverterNode, ParallelAllNode,
        ParallelNode, ReactiveFallbackNode, ReactiveSequenceNode, RepeatNode, RetryNode,
        SequenceNode, SequenceWithMemoryNode, TimeoutNode,
    },
    BehaviorNode, Blackboard, TreeNode,
};
use std::collections::HashMap;
use std::sync::Arc;

pub type Constructor = Box<dyn Fn() -> Box<dyn BehaviorNode> + Send + Sync>;

pub fn boxify<T>(cons: impl (Fn() -> T) + Send + Sync + 'static) -> Constructor
where
    T: BehaviorNode + 'static,
{
    Box::new(move || Box::new(cons()))
}

/// Node types by name, plus the type relations and enum constants that the
/// trees built from it share.
pub struct Registry {
    node_types: HashMap<String, Constructor>,
    cast_registry: Arc<PolymorphicCastRegistry>,
    enums: Arc<EnumsTable>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut ret = Self {
            node_types: HashMap::new(),
            cast_registry: Arc::new(PolymorphicCastRegistry::new()),
            enums: Arc::new(EnumsTable::new()),
        };
        ret.register("Sequence", boxify(SequenceNode::default));
        ret.register("SequenceWithMemory", boxify(SequenceWithMemoryNode::default));
        ret.register("ReactiveSequence", boxify(|| ReactiveSequenceNode));
        ret.register("Fallback", boxify(FallbackNode::default));
        ret.register("ReactiveFallback", boxify(|| ReactiveFallbackNode));
        ret.register("Parallel", boxify(ParallelNode::default));
        ret.register("ParallelAll", boxify(ParallelAllNode::default));
        ret.register("Inverter", boxify(|| InverterNode));
        ret.register("ForceSuccess", boxify(|| ForceSuccessNode));
        ret.register("ForceFailure", boxify(|| ForceFailureNode));
        ret.register("Repeat", boxify(RepeatNode::default));
        ret.register("Retry", boxify(RetryNode::default));
        ret.register("Timeout", boxify(TimeoutNode::default));
        ret.register("AlwaysSuccess", boxify(|| AlwaysSuccessNode));
        ret.register("AlwaysFailure", boxify(|| AlwaysFailureNode));
        ret.register("SetBlackboard", boxify(|| SetBlackboardNode));
        ret.register("IsTrue", boxify(|| IsTrueNode));
        ret.register("Sleep", boxify(|| Stateful(SleepNode::default())));
        ret
    }
}

impl Registry {
    /// Registers a node type, replacing any previous one of the same name.
    pub fn register(&mut self, type_name: impl ToString, constructor: Constructor) {
        self.node_types.insert(type_name.to_string(), constructor);
    }

    pub fn build(&self, type_name: &str) -> Option<Box<dyn BehaviorNode>> {
        self.node_types
            .get(type_name)
            .map(|constructor| constructor())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.node_types.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.node_types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Declares `D` as derived from `B`. See [`PolymorphicCastRegistry::register_cast`].
    pub fn register_cast<D, B>(
        &self,
        upcast: impl Fn(D) -> B + Send + Sync + 'static,
        downcast: impl Fn(B) -> Option<D> + Send + Sync + 'static,
    ) where
        D: Clone + Send + Sync + 'static,
        B: Clone + Send + Sync + 'static,
    {
        self.cast_registry.register_cast(upcast, downcast);
    }

    pub fn cast_registry(&self) -> &Arc<PolymorphicCastRegistry> {
        &self.cast_registry
    }

    /// Makes `value` visible to condition scripts under `name`.
    pub fn register_enum(&mut self, name: impl Into<String>, value: i64) {
        Arc::make_mut(&mut self.enums).insert(name.into(), value);
    }

    pub fn enums(&self) -> &Arc<EnumsTable> {
        &self.enums
    }

    /// A root blackboard that knows the registered type relations.
    pub fn create_blackboard(&self) -> Arc<Blackboard> {
        Blackboard::with_cast_registry(self.cast_registry.clone())
    }

    /// Builds a node of a registered type. The config gets the registry's
    /// enum table.
    pub fn instantiate(
        &self,
        type_name: &str,
        name: impl Into<String>,
        config: NodeConfig,
    ) -> Result<TreeNode, ConfigError> {
        let node = self
            .build(type_name)
            .ok_or_else(|| ConfigError::UnknownNodeType(type_name.to_owned()))?;
        Ok(TreeNode::new_boxed(name, node, config.with_enums(self.enums.clone()))?
            .with_registration_name(type_name))
    }
}

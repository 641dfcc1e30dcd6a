use crate::{blackboard::Blackboard, port::BlackboardValue};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Named integer constants visible to condition scripts.
pub type EnumsTable = HashMap<String, i64>;

/// Conditions checked before a node body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PreCond {
    FailureIf,
    SuccessIf,
    SkipIf,
    WhileTrue,
}

impl PreCond {
    pub const EVALUATION_ORDER: [PreCond; 4] = [
        PreCond::SkipIf,
        PreCond::FailureIf,
        PreCond::SuccessIf,
        PreCond::WhileTrue,
    ];

    pub fn attribute_name(self) -> &'static str {
        match self {
            PreCond::FailureIf => "_failureIf",
            PreCond::SuccessIf => "_successIf",
            PreCond::SkipIf => "_skipIf",
            PreCond::WhileTrue => "_while",
        }
    }
}

/// Scripts run after a node reaches a terminal status or gets halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PostCond {
    OnHalted,
    OnFailure,
    OnSuccess,
    Always,
}

impl PostCond {
    pub fn attribute_name(self) -> &'static str {
        match self {
            PostCond::OnHalted => "_onHalted",
            PostCond::OnFailure => "_onFailure",
            PostCond::OnSuccess => "_onSuccess",
            PostCond::Always => "_post",
        }
    }
}

/// What a condition script can see. Scripts may read and write the
/// blackboard but never touch the tree.
pub struct ScriptEnv<'a> {
    pub blackboard: &'a Arc<Blackboard>,
    pub enums: &'a EnumsTable,
}

pub type PreScript = Arc<dyn Fn(&ScriptEnv) -> bool + Send + Sync>;
pub type PostScript = Arc<dyn Fn(&ScriptEnv) + Send + Sync>;

/// Everything a node instance is configured with when the tree is built.
#[derive(Clone)]
pub struct NodeConfig {
    pub blackboard: Arc<Blackboard>,
    pub enums: Arc<EnumsTable>,
    /// Port name to what it is bound to in this instance.
    pub remapping: HashMap<String, BlackboardValue>,
    pub pre_conditions: HashMap<PreCond, PreScript>,
    pub post_conditions: HashMap<PostCond, PostScript>,
    /// Assigned by [`crate::Tree::new`].
    pub uid: u16,
    /// Assigned by [`crate::Tree::new`].
    pub path: String,
}

impl NodeConfig {
    pub fn new(blackboard: Arc<Blackboard>) -> Self {
        Self {
            blackboard,
            enums: Arc::new(EnumsTable::new()),
            remapping: HashMap::new(),
            pre_conditions: HashMap::new(),
            post_conditions: HashMap::new(),
            uid: 0,
            path: String::new(),
        }
    }

    pub fn with_enums(mut self, enums: Arc<EnumsTable>) -> Self {
        self.enums = enums;
        self
    }

    pub fn with_remapping(mut self, remapping: HashMap<String, BlackboardValue>) -> Self {
        self.remapping = remapping;
        self
    }

    /// Binds `port` to a literal, `{key}` or `{=}`.
    pub fn with_port(mut self, port: impl Into<String>, value: impl Into<BlackboardValue>) -> Self {
        self.remapping.insert(port.into(), value.into());
        self
    }

    pub fn with_pre_condition(
        mut self,
        cond: PreCond,
        script: impl Fn(&ScriptEnv) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.pre_conditions.insert(cond, Arc::new(script));
        self
    }

    pub fn with_post_condition(
        mut self,
        cond: PostCond,
        script: impl Fn(&ScriptEnv) + Send + Sync + 'static,
    ) -> Self {
        self.post_conditions.insert(cond, Arc::new(script));
        self
    }

    pub(crate) fn script_env(&self) -> ScriptEnv<'_> {
        ScriptEnv {
            blackboard: &self.blackboard,
            enums: &self.enums,
        }
    }
}

impl Debug for NodeConfig {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.debug_struct("NodeConfig")
            .field("uid", &self.uid)
            .field("path", &self.path)
            .field("remapping", &self.remapping)
            .field("pre_conditions", &self.pre_conditions.keys().collect::<Vec<_>>())
            .field("post_conditions", &self.post_conditions.keys().collect::<Vec<_>>())
            .finish()
    }
}

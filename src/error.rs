use crate::PortType;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CastError {
    #[error("no known safe conversion between {from} and {to}")]
    NoConversion {
        from: &'static str,
        to: &'static str,
    },
    #[error("value of type {from} is out of range for {to}")]
    OutOfRange {
        from: &'static str,
        to: &'static str,
    },
    #[error("cannot parse {text:?} as {to}")]
    Parse { text: String, to: &'static str },
    #[error("polymorphic cast from {from} to {to} failed: {reason}")]
    Polymorphic {
        from: &'static str,
        to: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BlackboardError {
    #[error("blackboard key [{0}] not found")]
    NotFound(String),
    #[error("blackboard entry [{0}] exists but holds no value")]
    Empty(String),
    #[error(
        "blackboard entry [{key}] was declared with type [{declared}], cannot accept [{requested}]"
    )]
    TypeMismatch {
        key: String,
        declared: &'static str,
        requested: &'static str,
    },
    #[error("blackboard entry [{key}]: {source}")]
    Cast {
        key: String,
        #[source]
        source: CastError,
    },
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PortError {
    #[error("port [{0}] is not declared by the node")]
    UnknownPort(String),
    #[error("port [{port}] is declared as {direction:?} and cannot be {access}")]
    WrongDirection {
        port: String,
        direction: PortType,
        access: &'static str,
    },
    #[error("cannot write to port [{0}] because it is remapped to a literal")]
    WriteToLiteral(String),
    #[error("port [{port}]: {source}")]
    Literal {
        port: String,
        #[source]
        source: CastError,
    },
    #[error(transparent)]
    Blackboard(#[from] BlackboardError),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AddChildError {
    #[error("Attempted to add too many nodes")]
    TooManyNodes,
}

pub type AddChildResult = Result<(), AddChildError>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("node [{node}]: invalid port name {port:?}")]
    InvalidPortName { node: String, port: String },
    #[error("node [{node}]: port [{port}] is not provided by the node")]
    UnknownPort { node: String, port: String },
    #[error("node [{node}]: a literal cannot be bound to output port [{port}]")]
    LiteralOnOutput { node: String, port: String },
    #[error("node [{node}]: literal of port [{port}] does not match its type: {source}")]
    InvalidLiteral {
        node: String,
        port: String,
        #[source]
        source: CastError,
    },
    #[error("node [{node}]: port [{port}] is remapped to an empty blackboard key")]
    EmptyRemapping { node: String, port: String },
    #[error("node [{node}]: port [{port}] conflicts with an existing blackboard entry: {source}")]
    PortTypeConflict {
        node: String,
        port: String,
        #[source]
        source: BlackboardError,
    },
    #[error("node [{node}] requires {expected} children but has {actual}")]
    ChildCount {
        node: String,
        expected: &'static str,
        actual: usize,
    },
    #[error("{source} to {node}")]
    AddChild {
        node: String,
        #[source]
        source: AddChildError,
    },
    #[error("Node type not registered {0:?}")]
    UnknownNodeType(String),
    #[error("a tree cannot have more than {max} nodes")]
    TooManyNodes { max: u16 },
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("The main tree {0:?} does not exist")]
    MissingTree(String),
    #[error("Node type or subtree name not found {0:?}")]
    MissingNode(String),
    #[error("Invalid tree name {0:?}")]
    InvalidTreeName(String),
    #[error("Invalid node name {0:?}")]
    InvalidNodeName(String),
    #[error("Invalid value for port {port:?} of node {node:?}")]
    InvalidPortValue { node: String, port: String },
    #[error("Subtree {node:?} is recursively instantiated")]
    InfiniteRecursion { node: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

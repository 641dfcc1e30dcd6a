use crate::any::TypeInfo;
use ::once_cell::sync::Lazy;
use std::collections::HashSet;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PortType {
    Input,
    Output,
    InOut,
}

impl PortType {
    pub fn is_readable(self) -> bool {
        matches!(self, PortType::Input | PortType::InOut)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, PortType::Output | PortType::InOut)
    }
}

#[derive(Debug, Clone)]
pub struct PortSpec {
    pub ty: PortType,
    pub key: String,
    pub type_info: TypeInfo,
    /// Used when the port is not remapped by the node instance.
    pub default_value: Option<BlackboardValue>,
    pub description: String,
}

impl PortSpec {
    fn new(ty: PortType, key: impl Into<String>) -> Self {
        Self {
            ty,
            key: key.into(),
            type_info: TypeInfo::any(),
            default_value: None,
            description: String::new(),
        }
    }

    pub fn new_in(key: impl Into<String>) -> Self {
        Self::new(PortType::Input, key)
    }

    pub fn new_out(key: impl Into<String>) -> Self {
        Self::new(PortType::Output, key)
    }

    pub fn new_inout(key: impl Into<String>) -> Self {
        Self::new(PortType::InOut, key)
    }

    /// Requires the port to carry values of type `T`.
    pub fn typed<T: 'static>(self) -> Self {
        self.with_type_info(TypeInfo::of::<T>())
    }

    pub fn with_type_info(mut self, type_info: TypeInfo) -> Self {
        self.type_info = type_info;
        self
    }

    /// Either a literal (`"42"`) or a blackboard reference (`"{key}"`).
    pub fn with_default(mut self, value: impl Into<BlackboardValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// What a port of a node instance is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlackboardValue {
    /// A blackboard key, written as `{key}`.
    Ref(String),
    /// A blackboard key equal to the port name, written as `{=}` or `=`.
    SameName,
    /// A constant string, parsed into the requested type on read.
    Literal(String),
}

impl BlackboardValue {
    /// The blackboard key this value refers to, if any.
    pub fn key<'a>(&'a self, port_name: &'a str) -> Option<&'a str> {
        match self {
            Self::Ref(key) => Some(key),
            Self::SameName => Some(port_name),
            Self::Literal(_) => None,
        }
    }
}

impl From<&str> for BlackboardValue {
    fn from(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed == "=" || trimmed == "{=}" {
            Self::SameName
        } else if let Some(key) = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        {
            Self::Ref(key.trim().to_owned())
        } else {
            Self::Literal(s.to_owned())
        }
    }
}

impl From<String> for BlackboardValue {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

static RESERVED_PORT_NAMES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["name", "ID", "_autoremap"].into_iter().collect());

/// Returns the first character that is not allowed in a node, tree or port name.
/// Non-ASCII characters are fine.
pub fn find_forbidden_char(name: &str) -> Option<char> {
    name.chars().find(|c| {
        c.is_control()
            || c.is_whitespace()
            || matches!(
                c,
                '<' | '>' | '&' | '"' | '\'' | '/' | '\\' | ':' | '*' | '?' | '|' | '.'
            )
    })
}

pub fn is_reserved_port_name(name: &str) -> bool {
    RESERVED_PORT_NAMES.contains(name)
}

/// A port name must not be empty, start with a digit or an underscore, contain
/// forbidden characters or collide with a reserved attribute name.
pub fn is_allowed_port_name(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return false;
    };
    !(first.is_ascii_digit()
        || first == '_'
        || is_reserved_port_name(name)
        || find_forbidden_char(name).is_some())
}

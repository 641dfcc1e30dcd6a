//! Builds a [`Tree`] from a YAML description.
//!
//! ```yaml
//! main_tree: main
//! behavior_tree:
//!   main:
//!     type: Sequence
//!     children:
//!     - type: SetBlackboard
//!       ports:
//!         value: "42"
//!         output_key: "{answer}"
//!     - type: Check
//!       name: check_answer
//!       ports:
//!         input: "{answer}"
//!   Check:
//!     type: IsTrue
//! ```
//!
//! A node whose `type` names another tree instantiates that tree as a subtree
//! with its own blackboard scope. Its `ports` describe the scope: `"{key}"`
//! maps the subtree's entry to the parent's `key`, anything else is written
//! into the subtree's blackboard, and `_autoremap: true` lets the subtree see
//! all non-private entries of its parent.

use crate::{
    error::{AddChildError, ConfigError, LoadError},
    find_forbidden_char, Blackboard, BlackboardValue, NodeConfig, Registry, SubTreeNode, Tree,
    TreeNode, TypeInfo,
};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

const AUTOREMAP: &str = "_autoremap";

#[derive(Deserialize, Debug)]
struct TreeSource {
    #[serde(default)]
    main_tree: Option<String>,
    behavior_tree: BTreeMap<String, NodeDef>,
}

#[derive(Deserialize, Debug)]
struct NodeDef {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ports: BTreeMap<String, Value>,
    #[serde(default)]
    children: Vec<NodeDef>,
}

/// Instantiates the main tree of `source` with a fresh blackboard from `registry`.
pub fn load_yaml(source: &str, registry: &Registry) -> Result<Tree, LoadError> {
    load_yaml_with_blackboard(source, registry, registry.create_blackboard())
}

/// Like [`load_yaml`], but the tree uses `blackboard` as its root scope.
pub fn load_yaml_with_blackboard(
    source: &str,
    registry: &Registry,
    blackboard: Arc<Blackboard>,
) -> Result<Tree, LoadError> {
    let source: TreeSource = serde_yaml::from_str(source)?;
    for name in source.behavior_tree.keys() {
        if name.is_empty() || name == "root" || name == "Root" || find_forbidden_char(name).is_some()
        {
            return Err(LoadError::InvalidTreeName(name.clone()));
        }
    }

    let main_name = match &source.main_tree {
        Some(name) => name.as_str(),
        // A single tree is the main tree whatever its name.
        None if source.behavior_tree.len() == 1 => source
            .behavior_tree
            .keys()
            .next()
            .map_or("main", String::as_str),
        None => "main",
    };
    let main = source
        .behavior_tree
        .get(main_name)
        .ok_or_else(|| LoadError::MissingTree(main_name.to_owned()))?;

    let loader = Loader {
        registry,
        trees: &source.behavior_tree,
    };
    let top = TreeStack {
        name: main_name,
        parent: None,
    };
    let root = loader.load_node(main, &blackboard, &top)?;
    Ok(Tree::new(root, blackboard)?)
}

/// A mechanism to detect infinite recursion. It is a linked list in call stack.
/// You can traverse the link back to enumerate all the subtree names (which is effectively function names)
/// and check if a subtree name to be inserted is already there.
///
/// Subtrees are instantiated eagerly, so a recursive subtree would never
/// finish loading. We make it an error instead.
struct TreeStack<'a, 'src> {
    name: &'src str,
    parent: Option<&'a TreeStack<'a, 'src>>,
}

impl<'a, 'src> TreeStack<'a, 'src> {
    fn find(&self, name: &str) -> bool {
        if self.name == name {
            true
        } else if let Some(parent) = self.parent {
            parent.find(name)
        } else {
            false
        }
    }
}

struct Loader<'a> {
    registry: &'a Registry,
    trees: &'a BTreeMap<String, NodeDef>,
}

impl<'a> Loader<'a> {
    fn load_node(
        &self,
        def: &'a NodeDef,
        blackboard: &Arc<Blackboard>,
        parent_stack: &TreeStack,
    ) -> Result<TreeNode, LoadError> {
        let name = def.name.clone().unwrap_or_else(|| def.ty.clone());
        if name.is_empty() || find_forbidden_char(&name).is_some() {
            return Err(LoadError::InvalidNodeName(name));
        }

        let mut node = if self.registry.contains(&def.ty) {
            let mut remapping = HashMap::new();
            for (port, value) in &def.ports {
                remapping.insert(port.clone(), BlackboardValue::from(port_text(&name, port, value)?));
            }
            let config = NodeConfig::new(blackboard.clone()).with_remapping(remapping);
            self.registry.instantiate(&def.ty, name, config)?
        } else if let Some(tree) = self.trees.get(&def.ty) {
            // Prevent infinite recursion
            if parent_stack.find(&def.ty) {
                return Err(LoadError::InfiniteRecursion {
                    node: def.ty.clone(),
                });
            }
            let tree_stack = TreeStack {
                name: &def.ty,
                parent: Some(parent_stack),
            };
            return self.load_subtree(def, name, tree, blackboard, &tree_stack);
        } else {
            return Err(LoadError::MissingNode(def.ty.clone()));
        };

        for child in &def.children {
            let child_node = self.load_node(child, blackboard, parent_stack)?;
            node.add_child(child_node)
                .map_err(|source| ConfigError::AddChild {
                    node: def.ty.clone(),
                    source,
                })?;
        }
        Ok(node)
    }

    fn load_subtree(
        &self,
        def: &'a NodeDef,
        name: String,
        tree: &'a NodeDef,
        blackboard: &Arc<Blackboard>,
        tree_stack: &TreeStack,
    ) -> Result<TreeNode, LoadError> {
        // The subtree's root is the only child of its instance.
        if !def.children.is_empty() {
            return Err(ConfigError::AddChild {
                node: def.ty.clone(),
                source: AddChildError::TooManyNodes,
            }
            .into());
        }
        debug!("instantiating subtree {:?} as {:?}", def.ty, name);
        let scope = Blackboard::new_child(blackboard);
        for (port, value) in &def.ports {
            let text = port_text(&name, port, value)?;
            if port == AUTOREMAP {
                let enabled = TypeInfo::of::<bool>()
                    .parse(&text)
                    .ok()
                    .and_then(|value| value.downcast_ref::<bool>().copied())
                    .ok_or_else(|| LoadError::InvalidPortValue {
                        node: name.clone(),
                        port: port.clone(),
                    })?;
                scope.enable_auto_remapping(enabled);
                continue;
            }
            match BlackboardValue::from(text) {
                BlackboardValue::Ref(key) => scope.add_subtree_remapping(port.as_str(), key),
                BlackboardValue::SameName => scope.add_subtree_remapping(port.as_str(), port.as_str()),
                BlackboardValue::Literal(text) => {
                    scope
                        .set(port, text)
                        .map_err(|source| ConfigError::PortTypeConflict {
                            node: name.clone(),
                            port: port.clone(),
                            source,
                        })?;
                }
            }
        }

        let inner = self.load_node(tree, &scope, tree_stack)?;
        let config = NodeConfig::new(blackboard.clone()).with_enums(self.registry.enums().clone());
        let mut node = TreeNode::new(name, SubTreeNode::new(def.ty.as_str(), scope), config)?
            .with_registration_name("SubTree");
        node.add_child(inner)
            .map_err(|source| ConfigError::AddChild {
                node: def.ty.clone(),
                source,
            })?;
        Ok(node)
    }
}

/// Port values may be written as plain YAML scalars.
fn port_text(node: &str, port: &str, value: &Value) -> Result<String, LoadError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Bool(value) => Ok(value.to_string()),
        Value::Number(value) => Ok(value.to_string()),
        _ => Err(LoadError::InvalidPortValue {
            node: node.to_owned(),
            port: port.to_owned(),
        }),
    }
}

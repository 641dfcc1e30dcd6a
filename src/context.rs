use crate::{
    any::{AnyValue, TypeInfo},
    blackboard::{cast_error, lock, Blackboard, StampedValue},
    config::NodeConfig,
    error::{BlackboardError, CastError, PortError},
    port::{BlackboardValue, PortSpec},
    signal::WakeUpSignal,
    tree_node::TreeNode,
    NodeStatus,
};
use std::any::TypeId;
use std::sync::Arc;
use std::time::Instant;

/// What a node body sees while it is ticked or halted: its ports, its children
/// and the tree's wake-up signal.
pub struct Context<'a> {
    pub(crate) status: NodeStatus,
    pub(crate) name: &'a str,
    pub(crate) config: &'a NodeConfig,
    pub(crate) ports: &'a [PortSpec],
    pub(crate) children: &'a mut [TreeNode],
    pub(crate) wake_up: Option<&'a Arc<WakeUpSignal>>,
}

/// Where a port reads from or writes to.
enum Binding<'a> {
    Key(&'a str),
    Literal(&'a str),
}

impl<'a> Context<'a> {
    /// Status of this node before the current tick. `Idle` on the first tick
    /// of a new operation.
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn config(&self) -> &NodeConfig {
        self.config
    }

    pub fn blackboard(&self) -> &Arc<Blackboard> {
        &self.config.blackboard
    }

    fn port(&self, port: &str) -> Option<&PortSpec> {
        self.ports.iter().find(|spec| spec.key == port)
    }

    /// A port that is neither remapped nor has a default reads and writes the
    /// blackboard entry of the same name.
    fn binding<'p>(&'p self, port: &'p str) -> Binding<'p> {
        match self.config.remapping.get(port) {
            Some(BlackboardValue::Literal(text)) => Binding::Literal(text),
            Some(value) => Binding::Key(value.key(port).unwrap_or(port)),
            None => Binding::Key(port),
        }
    }

    fn check_readable(&self, port: &str) -> Result<(), PortError> {
        match self.port(port) {
            None => Err(PortError::UnknownPort(port.to_owned())),
            Some(spec) if !spec.ty.is_readable() => Err(PortError::WrongDirection {
                port: port.to_owned(),
                direction: spec.ty,
                access: "read",
            }),
            Some(_) => Ok(()),
        }
    }

    fn check_writable(&self, port: &str) -> Result<(), PortError> {
        match self.port(port) {
            None => Err(PortError::UnknownPort(port.to_owned())),
            Some(spec) if !spec.ty.is_writable() => Err(PortError::WrongDirection {
                port: port.to_owned(),
                direction: spec.ty,
                access: "written",
            }),
            Some(_) => Ok(()),
        }
    }

    /// The port's declared type if it describes `T`, so that its custom
    /// string converter is used.
    fn target_info<T: 'static>(&self, port: &str) -> TypeInfo {
        match self.port(port) {
            Some(spec) if spec.type_info.type_id() == Some(TypeId::of::<T>()) => spec.type_info,
            _ => TypeInfo::of::<T>(),
        }
    }

    pub fn get_input<T>(&self, port: &str) -> Result<T, PortError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get_input_stamped(port).map(|stamped| stamped.value)
    }

    /// Like [`Self::get_input`], but any failure yields `None`.
    pub fn try_get_input<T>(&self, port: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get_input(port).ok()
    }

    /// Reads a port together with the sequence number and timestamp of the
    /// blackboard entry behind it. Literals always report sequence 0.
    pub fn get_input_stamped<T>(&self, port: &str) -> Result<StampedValue<T>, PortError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.check_readable(port)?;
        let info = self.target_info::<T>(port);
        match self.binding(port) {
            Binding::Literal(text) => {
                let value = info
                    .parse(text)
                    .and_then(downcast::<T>)
                    .map_err(|source| PortError::Literal {
                        port: port.to_owned(),
                        source,
                    })?;
                Ok(StampedValue {
                    value,
                    sequence_id: 0,
                    stamp: Instant::now(),
                })
            }
            Binding::Key(key) => {
                let blackboard = self.blackboard();
                let entry = blackboard
                    .get_entry(key)
                    .ok_or_else(|| BlackboardError::NotFound(key.to_owned()))?;
                let entry = lock(&entry);
                let value = entry
                    .value()
                    .ok_or_else(|| BlackboardError::Empty(key.to_owned()))?;
                let value = value
                    .convert_to(&info, blackboard.cast_registry())
                    .and_then(downcast::<T>)
                    .map_err(|source| cast_error(key, source))?;
                Ok(StampedValue {
                    value,
                    sequence_id: entry.sequence_id(),
                    stamp: entry.stamp(),
                })
            }
        }
    }

    /// Reads a port without converting it. A literal comes back as a `String`.
    pub fn get_input_any(&self, port: &str) -> Result<AnyValue, PortError> {
        self.check_readable(port)?;
        match self.binding(port) {
            Binding::Literal(text) => Ok(AnyValue::new(text.to_owned())),
            Binding::Key(key) => {
                let entry = self
                    .blackboard()
                    .get_entry(key)
                    .ok_or_else(|| BlackboardError::NotFound(key.to_owned()))?;
                let value = lock(&entry).value().cloned();
                Ok(value.ok_or_else(|| BlackboardError::Empty(key.to_owned()))?)
            }
        }
    }

    pub fn set_output<T: Send + Sync + 'static>(&self, port: &str, value: T) -> Result<(), PortError> {
        self.set_output_any(port, AnyValue::new(value))
    }

    pub fn set_output_any(&self, port: &str, value: AnyValue) -> Result<(), PortError> {
        self.check_writable(port)?;
        match self.binding(port) {
            Binding::Literal(_) => Err(PortError::WriteToLiteral(port.to_owned())),
            Binding::Key(key) => Ok(self.blackboard().set_any(key, value)?),
        }
    }

    pub fn children_count(&self) -> usize {
        self.children.len()
    }

    pub fn child(&self, index: usize) -> Option<&TreeNode> {
        self.children.get(index)
    }

    pub fn child_status(&self, index: usize) -> NodeStatus {
        self.children
            .get(index)
            .map_or(NodeStatus::Idle, TreeNode::status)
    }

    /// Ticks the child at `index`.
    ///
    /// # Panics
    ///
    /// Panics if there is no such child.
    pub fn tick_child(&mut self, index: usize) -> NodeStatus {
        self.children[index].execute_tick()
    }

    /// Halts the child if it is running, then resets it to `Idle`.
    pub fn halt_child(&mut self, index: usize) {
        if let Some(child) = self.children.get_mut(index) {
            child.halt_and_reset();
        }
    }

    /// [`Self::halt_child`] for every child from `start` on.
    pub fn halt_children_from(&mut self, start: usize) {
        for child in self.children.iter_mut().skip(start) {
            child.halt_and_reset();
        }
    }

    pub fn reset_children(&mut self) {
        self.halt_children_from(0);
    }

    pub fn wake_up_signal(&self) -> Option<Arc<WakeUpSignal>> {
        self.wake_up.cloned()
    }

    pub fn has_wake_up_signal(&self) -> bool {
        self.wake_up.is_some()
    }

    /// Asks the tree driver to tick again without sleeping.
    pub fn emit_wake_up_signal(&self) {
        if let Some(signal) = self.wake_up {
            signal.emit_signal();
        }
    }
}

fn downcast<T: Clone + 'static>(value: AnyValue) -> Result<T, CastError> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or(CastError::NoConversion {
            from: value.type_name(),
            to: std::any::type_name::<T>(),
        })
}

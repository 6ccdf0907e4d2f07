//! Per-tick contexts handed to operators.
//!
//! [`InputContext`] reads from the operator's input queues, [`OutputContext`]
//! collects what the tick emits (the executor routes it after the tick
//! returns), and [`ExecutionContext`] carries run-wide facts and resources.

use crate::error::{Result, SluiceError};
use crate::message::Message;
use crate::queue::SharedQueue;
use crate::resource::{Resource, ResourceSet};
use crate::shutdown::ShutdownHandle;
use crate::types::{RunId, TypeTag};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// An input port as seen from inside a tick.
#[derive(Debug, Clone)]
pub struct InputBinding {
    /// Port name (synthesized receivers use `parent:index`).
    pub name: String,
    /// Declared payload type.
    pub tag: TypeTag,
    /// The backing queue; None for an unconnected optional port.
    pub queue: Option<SharedQueue>,
    /// The repeated port this receiver belongs to.
    pub parent: Option<String>,
}

/// Read access to an operator's input queues.
#[derive(Debug)]
pub struct InputContext {
    operator: String,
    bindings: Vec<InputBinding>,
}

impl InputContext {
    /// Create a context over the given bindings.
    pub fn new(operator: impl Into<String>, bindings: Vec<InputBinding>) -> Self {
        Self {
            operator: operator.into(),
            bindings,
        }
    }

    /// Receive the oldest message on `port` and downcast its primary entry.
    ///
    /// The message stays queued if its payload is not a `T`. On a repeated
    /// port this takes from the first receiver holding a message.
    pub fn receive<T: Any + Send + Sync>(&mut self, port: &str) -> Result<Arc<T>> {
        let binding = self.binding_with_message(port)?;
        let Some(queue) = binding.queue.as_ref() else {
            return Err(self.not_ready(port));
        };
        let mut queue = queue.lock();
        let Some(head) = queue.peek() else {
            return Err(self.not_ready(port));
        };
        let value = head
            .primary::<T>()
            .ok_or_else(|| self.mismatch(&binding.name, TypeTag::of::<T>(), head.tag()))?;
        queue.pop();
        Ok(value)
    }

    /// Receive the oldest message on `port` without downcasting.
    pub fn receive_message(&mut self, port: &str) -> Result<Message> {
        let binding = self.binding_with_message(port)?;
        binding
            .queue
            .as_ref()
            .and_then(|q| q.lock().pop())
            .ok_or_else(|| self.not_ready(port))
    }

    /// Receive one message from every receiver of `port`.
    ///
    /// On a repeated port this takes at most one message from each
    /// synthesized receiver, in index order. On a single port it drains the
    /// queue. Fails with `ReceiveNotReady` if nothing was available, and with
    /// `PortTypeMismatch` (taking nothing) if any payload is not a `T`.
    pub fn receive_all<T: Any + Send + Sync>(&mut self, port: &str) -> Result<Vec<Arc<T>>> {
        let targets = self.receivers_of(port)?;
        let single = targets.len() == 1 && targets[0].parent.is_none();

        let mut guards: Vec<_> = targets
            .iter()
            .filter_map(|b| b.queue.as_ref().map(|q| (b.name.as_str(), q.lock())))
            .collect();

        for (name, queue) in &guards {
            if let Some(head) = queue.peek() {
                if head.primary::<T>().is_none() {
                    return Err(self.mismatch(name, TypeTag::of::<T>(), head.tag()));
                }
            }
        }

        let mut values = Vec::new();
        for (_, queue) in guards.iter_mut() {
            loop {
                let Some(msg) = queue.pop() else { break };
                if let Some(value) = msg.primary::<T>() {
                    values.push(value);
                }
                if !single {
                    break;
                }
            }
        }

        if values.is_empty() {
            return Err(self.not_ready(port));
        }
        Ok(values)
    }

    /// Messages currently queued on `port` (summed over receivers of a repeated port).
    pub fn available(&self, port: &str) -> usize {
        self.bindings
            .iter()
            .filter(|b| b.name == port || b.parent.as_deref() == Some(port))
            .filter_map(|b| b.queue.as_ref())
            .map(|q| q.lock().len())
            .sum()
    }

    /// Names of the input ports visible to this tick.
    pub fn port_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    fn receivers_of(&self, port: &str) -> Result<Vec<&InputBinding>> {
        if let Some(binding) = self.bindings.iter().find(|b| b.name == port) {
            return Ok(vec![binding]);
        }
        let children: Vec<_> = self
            .bindings
            .iter()
            .filter(|b| b.parent.as_deref() == Some(port))
            .collect();
        if children.is_empty() {
            return Err(SluiceError::UnknownPort {
                operator: self.operator.clone(),
                port: port.to_string(),
                direction: crate::port::PortDirection::Input,
                available: self.bindings.iter().map(|b| b.name.clone()).collect(),
            });
        }
        Ok(children)
    }

    fn binding_with_message(&self, port: &str) -> Result<InputBinding> {
        let receivers = self.receivers_of(port)?;
        let chosen = receivers
            .iter()
            .find(|b| b.queue.as_ref().is_some_and(|q| !q.lock().is_empty()))
            .or_else(|| receivers.first())
            .map(|b| (*b).clone());
        chosen.ok_or_else(|| self.not_ready(port))
    }

    fn not_ready(&self, port: &str) -> SluiceError {
        SluiceError::ReceiveNotReady {
            operator: self.operator.clone(),
            port: port.to_string(),
        }
    }

    fn mismatch(&self, port: &str, expected: TypeTag, actual: TypeTag) -> SluiceError {
        SluiceError::PortTypeMismatch {
            location: format!("{}.{}", self.operator, port),
            expected: expected.name().to_string(),
            actual: actual.name().to_string(),
        }
    }
}

/// An output port as seen from inside a tick.
#[derive(Debug, Clone)]
pub struct OutputBinding {
    /// Port name.
    pub name: String,
    /// Declared payload type.
    pub tag: TypeTag,
    /// Messages one tick may emit on this port.
    pub capacity: usize,
}

/// Collects the messages a tick emits.
#[derive(Debug)]
pub struct OutputContext {
    operator: String,
    bindings: Vec<OutputBinding>,
    emitted: Vec<(String, Message)>,
}

impl OutputContext {
    /// Create a context over the given bindings.
    pub fn new(operator: impl Into<String>, bindings: Vec<OutputBinding>) -> Self {
        Self {
            operator: operator.into(),
            bindings,
            emitted: Vec::new(),
        }
    }

    /// Emit a value on `port`.
    ///
    /// An empty port name means the operator's sole output port.
    pub fn emit<T: Any + Send + Sync>(&mut self, port: &str, value: T) -> Result<()> {
        self.emit_message(port, Message::new(value))
    }

    /// Emit a prebuilt message on `port`.
    pub fn emit_message(&mut self, port: &str, message: Message) -> Result<()> {
        let binding = self.resolve(port)?;
        if !message.is_empty() && !binding.tag.accepts(&message.tag()) {
            return Err(SluiceError::PortTypeMismatch {
                location: format!("{}.{}", self.operator, binding.name),
                expected: binding.tag.name().to_string(),
                actual: message.tag().name().to_string(),
            });
        }
        let name = binding.name.clone();
        let capacity = binding.capacity;
        let already = self.emitted.iter().filter(|(p, _)| *p == name).count();
        if already >= capacity {
            return Err(SluiceError::CapacityExceeded {
                operator: self.operator.clone(),
                port: name,
                capacity,
            });
        }
        self.emitted.push((name, message));
        Ok(())
    }

    /// Messages emitted so far, in emission order.
    pub fn emitted(&self) -> &[(String, Message)] {
        &self.emitted
    }

    /// Take the emitted messages.
    pub fn into_emitted(self) -> Vec<(String, Message)> {
        self.emitted
    }

    fn resolve(&self, port: &str) -> Result<&OutputBinding> {
        if port.is_empty() {
            return match self.bindings.as_slice() {
                [only] => Ok(only),
                _ => Err(SluiceError::AmbiguousPort {
                    operator: self.operator.clone(),
                    direction: crate::port::PortDirection::Output,
                    candidates: self.bindings.iter().map(|b| b.name.clone()).collect(),
                }),
            };
        }
        self.bindings
            .iter()
            .find(|b| b.name == port)
            .ok_or_else(|| SluiceError::UnknownPort {
                operator: self.operator.clone(),
                port: port.to_string(),
                direction: crate::port::PortDirection::Output,
                available: self.bindings.iter().map(|b| b.name.clone()).collect(),
            })
    }
}

/// Run-wide facts available to every lifecycle hook.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    operator: String,
    run_id: RunId,
    tick_count: u64,
    resources: Arc<ResourceSet>,
    aliases: Arc<HashMap<String, String>>,
    shutdown: ShutdownHandle,
}

impl ExecutionContext {
    /// Create a context for `operator`.
    pub fn new(
        operator: impl Into<String>,
        run_id: RunId,
        resources: Arc<ResourceSet>,
        aliases: HashMap<String, String>,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            operator: operator.into(),
            run_id,
            tick_count: 0,
            resources,
            aliases: Arc::new(aliases),
            shutdown,
        }
    }

    /// A copy with the tick count set.
    pub fn with_tick_count(&self, tick_count: u64) -> Self {
        Self {
            tick_count,
            ..self.clone()
        }
    }

    /// The operator name.
    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// The run identifier.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Completed ticks before the current one.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Look up a resource by alias (as bound at construction) or by name.
    pub fn resource<R: Resource>(&self, name: &str) -> Result<Arc<R>> {
        let resolved = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.resources
            .get::<R>(resolved)
            .ok_or_else(|| SluiceError::ResourceNotFound {
                operator: self.operator.clone(),
                resource: name.to_string(),
            })
    }

    /// Ask the executor to stop after the current pass.
    pub fn request_shutdown(&self) {
        self.shutdown.request();
    }

    /// Whether a stop has been requested.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.is_requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MessageQueue;
    use crate::resource::BlockMemoryPool;

    fn binding(name: &str, parent: Option<&str>, queue: &SharedQueue) -> InputBinding {
        InputBinding {
            name: name.into(),
            tag: TypeTag::of::<i32>(),
            queue: Some(Arc::clone(queue)),
            parent: parent.map(String::from),
        }
    }

    #[test]
    fn receive_type_mismatch_keeps_message() {
        let q = MessageQueue::shared(2);
        q.lock().push(Message::new(5i32)).unwrap();
        let mut input = InputContext::new("sink", vec![binding("in", None, &q)]);
        let err = input.receive::<String>("in").unwrap_err();
        assert!(matches!(err, SluiceError::PortTypeMismatch { .. }));
        assert_eq!(*input.receive::<i32>("in").unwrap(), 5);
        assert!(input.receive::<i32>("in").unwrap_err().is_not_ready());
    }

    #[test]
    fn receive_all_takes_one_per_receiver_in_index_order() {
        let q0 = MessageQueue::shared(2);
        let q1 = MessageQueue::shared(2);
        q0.lock().push(Message::new(1i32)).unwrap();
        q0.lock().push(Message::new(2i32)).unwrap();
        q1.lock().push(Message::new(10i32)).unwrap();
        let mut input = InputContext::new(
            "sum",
            vec![
                binding("values:0", Some("values"), &q0),
                binding("values:1", Some("values"), &q1),
            ],
        );
        let got: Vec<i32> = input
            .receive_all::<i32>("values")
            .unwrap()
            .iter()
            .map(|v| **v)
            .collect();
        assert_eq!(got, vec![1, 10]);
        assert_eq!(input.available("values"), 1);
    }

    #[test]
    fn receive_all_drains_single_port() {
        let q = MessageQueue::shared(3);
        for i in 0..3 {
            q.lock().push(Message::new(i)).unwrap();
        }
        let mut input = InputContext::new("sink", vec![binding("in", None, &q)]);
        assert_eq!(input.receive_all::<i32>("in").unwrap().len(), 3);
    }

    #[test]
    fn emit_checks_type_and_capacity() {
        let mut output = OutputContext::new(
            "src",
            vec![OutputBinding {
                name: "out".into(),
                tag: TypeTag::of::<i64>(),
                capacity: 1,
            }],
        );
        assert!(matches!(
            output.emit("out", "text").unwrap_err(),
            SluiceError::PortTypeMismatch { .. }
        ));
        output.emit("", 1i64).unwrap();
        assert!(matches!(
            output.emit("out", 2i64).unwrap_err(),
            SluiceError::CapacityExceeded { capacity: 1, .. }
        ));
        assert_eq!(output.into_emitted().len(), 1);
    }

    #[test]
    fn resource_lookup_by_alias() {
        let mut set = ResourceSet::new();
        set.insert("host_pool", Arc::new(BlockMemoryPool::new(4, 1)));
        let aliases = HashMap::from([("allocator".to_string(), "host_pool".to_string())]);
        let ctx = ExecutionContext::new(
            "op",
            RunId::new(),
            Arc::new(set),
            aliases,
            ShutdownHandle::new(),
        );
        assert!(ctx.resource::<BlockMemoryPool>("allocator").is_ok());
        assert!(matches!(
            ctx.resource::<BlockMemoryPool>("missing").unwrap_err(),
            SluiceError::ResourceNotFound { .. }
        ));
    }
}

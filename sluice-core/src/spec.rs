//! Operator declarations.

use crate::condition::Condition;
use crate::parameter::ParamSpec;
use crate::port::{PortDirection, PortKind, PortSpec};
use crate::types::TypeTag;
use serde::de::DeserializeOwned;

/// Everything an operator declares in `setup`: ports, parameters, conditions
/// and the resources it expects.
///
/// # Example
///
/// ```
/// use sluice_core::prelude::*;
///
/// let mut spec = OperatorSpec::new();
/// spec.input::<i64>("in");
/// spec.output::<i64>("out").capacity(2);
/// spec.param::<u32>("multiplier", "scale factor").default(2);
/// assert_eq!(spec.inputs().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct OperatorSpec {
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
    params: Vec<ParamSpec>,
    conditions: Vec<Box<dyn Condition>>,
    resources: Vec<String>,
}

impl OperatorSpec {
    /// Create an empty declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an input port carrying `T`.
    pub fn input<T: 'static>(&mut self, name: impl Into<String>) -> &mut PortSpec {
        let port = PortSpec::new(name, PortDirection::Input, TypeTag::of::<T>());
        upsert(&mut self.inputs, port)
    }

    /// Declare an input port accepting any payload.
    pub fn input_any(&mut self, name: impl Into<String>) -> &mut PortSpec {
        let port = PortSpec::new(name, PortDirection::Input, TypeTag::any());
        upsert(&mut self.inputs, port)
    }

    /// Declare a repeated input port carrying `T`.
    ///
    /// Each producer wired onto it gets its own receiver, named `name:0`,
    /// `name:1`, ... in wiring order. A repeated port with no producers is an
    /// unbound input unless marked optional.
    pub fn repeated_input<T: 'static>(&mut self, name: impl Into<String>) -> &mut PortSpec {
        let mut port = PortSpec::new(name, PortDirection::Input, TypeTag::of::<T>());
        port.kind = PortKind::Repeated;
        upsert(&mut self.inputs, port)
    }

    /// Declare an output port carrying `T`.
    pub fn output<T: 'static>(&mut self, name: impl Into<String>) -> &mut PortSpec {
        let port = PortSpec::new(name, PortDirection::Output, TypeTag::of::<T>());
        upsert(&mut self.outputs, port)
    }

    /// Declare an output port producing any payload.
    pub fn output_any(&mut self, name: impl Into<String>) -> &mut PortSpec {
        let port = PortSpec::new(name, PortDirection::Output, TypeTag::any());
        upsert(&mut self.outputs, port)
    }

    /// Declare a parameter of type `T`.
    pub fn param<T: DeserializeOwned>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> &mut ParamSpec {
        let param = ParamSpec::new::<T>(name, description);
        match self.params.iter().position(|p| p.name == param.name) {
            Some(idx) => {
                self.params[idx] = param;
                &mut self.params[idx]
            }
            None => {
                self.params.push(param);
                let last = self.params.len() - 1;
                &mut self.params[last]
            }
        }
    }

    /// Attach a condition to the operator.
    pub fn condition(&mut self, condition: impl Condition + 'static) -> &mut Self {
        self.conditions.push(Box::new(condition));
        self
    }

    /// Attach an already boxed condition.
    pub fn boxed_condition(&mut self, condition: Box<dyn Condition>) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    /// Declare a resource the operator looks up by `alias` at runtime.
    pub fn resource(&mut self, alias: impl Into<String>) -> &mut Self {
        let alias = alias.into();
        if !self.resources.contains(&alias) {
            self.resources.push(alias);
        }
        self
    }

    /// All input ports, including synthesized receivers.
    pub fn inputs(&self) -> &[PortSpec] {
        &self.inputs
    }

    /// All output ports.
    pub fn outputs(&self) -> &[PortSpec] {
        &self.outputs
    }

    /// Input ports as declared in `setup`, without synthesized receivers.
    pub fn declared_inputs(&self) -> impl Iterator<Item = &PortSpec> {
        self.inputs.iter().filter(|p| !p.is_synthesized())
    }

    /// Declared parameters.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Attached conditions.
    pub fn conditions(&self) -> &[Box<dyn Condition>] {
        &self.conditions
    }

    /// Declared resource aliases.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Look up a port by direction and name.
    pub fn port(&self, direction: PortDirection, name: &str) -> Option<&PortSpec> {
        let ports = match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        };
        ports.iter().find(|p| p.name == name)
    }

    /// Synthesized receivers of a repeated port, in index order.
    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a PortSpec> + 'a {
        self.inputs
            .iter()
            .filter(move |p| p.parent.as_deref() == Some(parent))
    }

    /// Synthesize the next receiver of the repeated port `parent`.
    ///
    /// Returns the new port name, or None if `parent` is not a repeated input.
    pub fn add_repeated_child(&mut self, parent: &str) -> Option<String> {
        let template = self
            .inputs
            .iter()
            .find(|p| p.name == parent && p.is_repeated())?
            .clone();
        let index = self.children_of(parent).count();
        let name = format!("{}:{}", parent, index);
        let mut child = PortSpec::new(name.clone(), PortDirection::Input, template.tag);
        child.capacity = template.capacity;
        child.min_size = template.min_size;
        child.policy = template.policy;
        child.parent = Some(parent.to_string());
        self.inputs.push(child);
        Some(name)
    }

    /// Move the attached conditions out of the declaration.
    pub fn take_conditions(&mut self) -> Vec<Box<dyn Condition>> {
        std::mem::take(&mut self.conditions)
    }
}

fn upsert(ports: &mut Vec<PortSpec>, port: PortSpec) -> &mut PortSpec {
    match ports.iter().position(|p| p.name == port.name) {
        Some(idx) => {
            ports[idx] = port;
            &mut ports[idx]
        }
        None => {
            ports.push(port);
            let last = ports.len() - 1;
            &mut ports[last]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::CountCondition;

    #[test]
    fn redeclaring_a_port_replaces_it() {
        let mut spec = OperatorSpec::new();
        spec.input::<i32>("in");
        spec.input::<i64>("in").capacity(3);
        assert_eq!(spec.inputs().len(), 1);
        assert_eq!(spec.inputs()[0].tag, TypeTag::of::<i64>());
        assert_eq!(spec.inputs()[0].capacity, 3);
    }

    #[test]
    fn repeated_children_are_indexed_in_order() {
        let mut spec = OperatorSpec::new();
        spec.repeated_input::<f32>("receivers").capacity(2);
        assert_eq!(spec.add_repeated_child("receivers").as_deref(), Some("receivers:0"));
        assert_eq!(spec.add_repeated_child("receivers").as_deref(), Some("receivers:1"));
        let children: Vec<_> = spec.children_of("receivers").map(|p| p.name.as_str()).collect();
        assert_eq!(children, vec!["receivers:0", "receivers:1"]);
        assert_eq!(spec.inputs()[2].capacity, 2);
        assert_eq!(spec.declared_inputs().count(), 1);
    }

    #[test]
    fn single_port_cannot_grow_children() {
        let mut spec = OperatorSpec::new();
        spec.input::<f32>("in");
        assert!(spec.add_repeated_child("in").is_none());
    }

    #[test]
    fn conditions_and_resources_accumulate() {
        let mut spec = OperatorSpec::new();
        spec.condition(CountCondition::new(10)).resource("pool").resource("pool");
        assert_eq!(spec.conditions().len(), 1);
        assert_eq!(spec.resources(), ["pool".to_string()]);
    }
}

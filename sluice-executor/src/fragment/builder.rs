//! Operator construction.

use super::{Fragment, OperatorSlot};
use sluice_core::condition::Condition;
use sluice_core::error::{Result, SluiceError};
use sluice_core::operator::{Lifecycle, LifecycleState, Operator};
use sluice_core::parameter::{Arg, ArgList};
use sluice_core::spec::OperatorSpec;
use sluice_core::types::OperatorId;
use sluice_core::value::Value;
use std::collections::HashMap;

/// A reference to an operator declared in a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperatorHandle {
    id: OperatorId,
}

impl OperatorHandle {
    pub(crate) fn new(id: OperatorId) -> Self {
        Self { id }
    }

    /// The operator's ID (its declaration index).
    pub fn id(&self) -> OperatorId {
        self.id
    }
}

/// Builder for declaring an operator with arguments, extra conditions and
/// resource bindings.
///
/// Created by [`Fragment::operator`]. Nothing is declared until
/// [`OperatorBuilder::build`] runs the operator's `setup`.
#[must_use = "the operator is only declared when build() is called"]
pub struct OperatorBuilder<'f> {
    fragment: &'f mut Fragment,
    name: String,
    operator: Box<dyn Operator>,
    args: ArgList,
    conditions: Vec<Box<dyn Condition>>,
    resources: HashMap<String, String>,
    config_keys: Vec<String>,
}

impl<'f> OperatorBuilder<'f> {
    pub(crate) fn new(fragment: &'f mut Fragment, name: String, operator: Box<dyn Operator>) -> Self {
        Self {
            fragment,
            name,
            operator,
            args: ArgList::new(),
            conditions: Vec::new(),
            resources: HashMap::new(),
            config_keys: Vec::new(),
        }
    }

    /// Bind a parameter explicitly. Explicit arguments beat configuration values.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.add(Arg::new(name, value));
        self
    }

    /// Bind several parameters explicitly.
    pub fn args(mut self, args: ArgList) -> Self {
        self.args.extend(args);
        self
    }

    /// Attach a condition in addition to those declared in `setup`.
    pub fn condition(mut self, condition: impl Condition + 'static) -> Self {
        self.conditions.push(Box::new(condition));
        self
    }

    /// Bind the resource alias the operator uses to a fragment resource.
    pub fn resource(mut self, alias: impl Into<String>, resource: impl Into<String>) -> Self {
        self.resources.insert(alias.into(), resource.into());
        self
    }

    /// Take parameter values from a configuration key at initialization.
    ///
    /// See [`sluice_core::Config::from_config`] for how the key is turned
    /// into arguments.
    pub fn args_from_config(mut self, key: impl Into<String>) -> Self {
        self.config_keys.push(key.into());
        self
    }

    /// Declare the operator: runs `setup` and returns its handle.
    pub fn build(self) -> Result<OperatorHandle> {
        let OperatorBuilder {
            fragment,
            name,
            mut operator,
            args,
            conditions,
            resources,
            config_keys,
        } = self;

        if fragment.by_name.contains_key(&name) {
            return Err(SluiceError::DuplicateOperator { name });
        }

        let id = OperatorId::new(fragment.slots.len() as u32);
        let mut lifecycle = Lifecycle::new(name.clone());
        let mut spec = OperatorSpec::new();
        operator.setup(&mut spec);
        lifecycle.advance(LifecycleState::Declared)?;

        for condition in conditions {
            spec.boxed_condition(condition);
        }
        for alias in resources.keys() {
            if !spec.resources().contains(alias) {
                tracing::warn!(operator = %name, alias = %alias, "Resource binding for an alias the operator does not declare");
            }
        }

        tracing::debug!(
            operator = %name,
            id = %id,
            inputs = spec.inputs().len(),
            outputs = spec.outputs().len(),
            params = spec.params().len(),
            "Operator declared"
        );

        fragment.by_name.insert(name.clone(), id);
        fragment.slots.push(OperatorSlot {
            id,
            name,
            operator: Some(operator),
            spec,
            args,
            config_keys,
            resource_aliases: resources,
            lifecycle,
        });
        Ok(OperatorHandle::new(id))
    }
}

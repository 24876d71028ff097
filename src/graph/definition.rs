//! Node definitions and the fluent builder
//!
//! A `NodeDefinition` is immutable once built: name, category, typed input
//! and output ports, the compile function holding the node's logic, and an
//! entry-point flag for source nodes.

use std::sync::Arc;

use crate::graph::context::NodeContext;
use crate::graph::workload::PortType;

/// The node's logic: reads inputs off the context, writes outputs (or an
/// error) back onto it.
pub type CompileFn = Box<dyn Fn(&mut NodeContext) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct InputDef {
    pub name: String,
    pub port: PortType,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct OutputDef {
    pub name: String,
    pub port: PortType,
}

pub struct NodeDefinition {
    name: String,
    category: String,
    inputs: Vec<InputDef>,
    outputs: Vec<OutputDef>,
    compile: CompileFn,
    entry_point: bool,
}

impl std::fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

impl NodeDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn inputs(&self) -> &[InputDef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputDef] {
        &self.outputs
    }

    pub fn is_entry_point(&self) -> bool {
        self.entry_point
    }

    pub fn find_input(&self, name: &str) -> Option<&InputDef> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn find_output(&self, name: &str) -> Option<&OutputDef> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Run the node's logic against a prepared context.
    pub fn compile(&self, ctx: &mut NodeContext) {
        (self.compile)(ctx);
    }
}

/// Fluent construction of node definitions:
///
/// ```
/// use flowframe::graph::{NodeBuilder, ValueType};
///
/// let def = NodeBuilder::new("double_it", "math")
///     .input("value", ValueType::Int)
///     .output("result", ValueType::Int)
///     .on_compile(|ctx| {
///         let v = ctx.get_input("value").as_int().unwrap_or(0);
///         ctx.set_output("result", v * 2);
///     })
///     .build();
/// assert_eq!(def.name(), "double_it");
/// ```
pub struct NodeBuilder {
    name: String,
    category: String,
    inputs: Vec<InputDef>,
    outputs: Vec<OutputDef>,
    compile: Option<CompileFn>,
    entry_point: bool,
}

impl NodeBuilder {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            compile: None,
            entry_point: false,
        }
    }

    pub fn input(mut self, name: impl Into<String>, port: impl Into<PortType>) -> Self {
        self.inputs.push(InputDef {
            name: name.into(),
            port: port.into(),
            required: true,
        });
        self
    }

    pub fn input_optional(mut self, name: impl Into<String>, port: impl Into<PortType>) -> Self {
        self.inputs.push(InputDef {
            name: name.into(),
            port: port.into(),
            required: false,
        });
        self
    }

    pub fn output(mut self, name: impl Into<String>, port: impl Into<PortType>) -> Self {
        self.outputs.push(OutputDef {
            name: name.into(),
            port: port.into(),
        });
        self
    }

    pub fn on_compile(mut self, f: impl Fn(&mut NodeContext) + Send + Sync + 'static) -> Self {
        self.compile = Some(Box::new(f));
        self
    }

    /// Entry points have no required upstream and start the schedule.
    pub fn entry_point(mut self) -> Self {
        self.entry_point = true;
        self
    }

    pub fn build(self) -> Arc<NodeDefinition> {
        Arc::new(NodeDefinition {
            name: self.name,
            category: self.category,
            inputs: self.inputs,
            outputs: self.outputs,
            compile: self.compile.unwrap_or_else(|| Box::new(|_| {})),
            entry_point: self.entry_point,
        })
    }

    /// Build and register into `registry` in one step.
    pub fn register(self, registry: &mut crate::graph::registry::NodeRegistry) {
        registry.register(self.build());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::workload::{ValueType, Workload};

    #[test]
    fn builder_collects_ports() {
        let def = NodeBuilder::new("n", "test")
            .input("a", ValueType::Int)
            .input_optional("b", [ValueType::Int, ValueType::Field])
            .output("out", ValueType::Double)
            .entry_point()
            .build();

        assert_eq!(def.name(), "n");
        assert_eq!(def.category(), "test");
        assert!(def.is_entry_point());
        assert!(def.find_input("a").unwrap().required);
        assert!(!def.find_input("b").unwrap().required);
        assert!(def.find_input("b").unwrap().port.is_multi());
        assert!(def.find_output("out").is_some());
        assert!(def.find_output("missing").is_none());
    }

    #[test]
    fn compile_runs_logic() {
        let def = NodeBuilder::new("inc", "test")
            .input("v", ValueType::Int)
            .output("v", ValueType::Int)
            .on_compile(|ctx| {
                let v = ctx.get_input("v").as_int().unwrap_or(0);
                ctx.set_output("v", v + 1);
            })
            .build();

        let mut ctx = NodeContext::new();
        ctx.set_input("v", Workload::Int(41));
        def.compile(&mut ctx);
        assert_eq!(ctx.get_output("v").as_int().unwrap(), 42);
    }
}

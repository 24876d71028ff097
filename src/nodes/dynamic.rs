//! Dynamic zone markers
//!
//! `dynamic_begin` / `dynamic_end` are CSV passthroughs whose `_name`
//! widget identifies the zone for equation injection. The expansion logic
//! itself lives in the graph layer.

use crate::graph::definition::NodeBuilder;
use crate::graph::registry::NodeRegistry;
use crate::graph::workload::ValueType;

pub fn register(registry: &mut NodeRegistry) {
    marker_node(registry, "dynamic_begin");
    marker_node(registry, "dynamic_end");
}

fn marker_node(registry: &mut NodeRegistry, name: &'static str) {
    NodeBuilder::new(name, "dynamic")
        .input("csv", ValueType::Csv)
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            match ctx.get_input("csv").as_csv() {
                Ok(csv) => ctx.set_output("csv", csv),
                Err(_) => ctx.set_error("no csv input"),
            }
        })
        .register(registry);
}

#[cfg(test)]
mod tests {
    use crate::graph::workload::Workload;
    use crate::nodes::test_support::{fruit_frame, inputs, run_node};

    #[test]
    fn markers_pass_the_frame_through() {
        for name in ["dynamic_begin", "dynamic_end"] {
            let frame = fruit_frame();
            let ctx = run_node(name, inputs(vec![("csv", Workload::Csv(frame.clone()))]));
            assert!(!ctx.has_error());
            assert!(std::sync::Arc::ptr_eq(
                &ctx.get_output("csv").as_csv().unwrap(),
                &frame
            ));
        }
    }

    #[test]
    fn markers_require_a_frame() {
        let ctx = run_node("dynamic_begin", inputs(vec![]));
        assert!(ctx.has_error());
    }
}

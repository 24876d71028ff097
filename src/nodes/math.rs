//! Arithmetic nodes: add, subtract, multiply, divide, modulus
//!
//! Dual-mode operators. With two scalar inputs they emit a scalar result;
//! as soon as one input is a field they run per-row over the active CSV,
//! writing the result column into a rebuilt frame. The destination column
//! defaults to the source field (overwrite in place), or a generated name
//! for a scalar source.

use crate::frame::column::{Column, DoubleColumn};
use crate::graph::context::NodeContext;
use crate::graph::definition::NodeBuilder;
use crate::graph::registry::NodeRegistry;
use crate::graph::workload::ValueType;
use crate::nodes::rebuild_with_column;

pub fn register(registry: &mut NodeRegistry) {
    math_node(registry, "add", |a, b| a + b);
    math_node(registry, "subtract", |a, b| a - b);
    math_node(registry, "multiply", |a, b| a * b);
    math_node(registry, "divide", |a, b| a / b);
    math_node(registry, "modulus", |a, b| a % b);
}

fn math_node(registry: &mut NodeRegistry, name: &'static str, op: fn(f64, f64) -> f64) {
    NodeBuilder::new(name, "math")
        .input_optional("csv", ValueType::Csv)
        .input("src", [ValueType::Int, ValueType::Double, ValueType::Field])
        .input_optional("dest", ValueType::Field)
        .input("operand", [ValueType::Int, ValueType::Double, ValueType::Field])
        .output("csv", ValueType::Csv)
        .output("result", ValueType::Double)
        .on_compile(move |ctx| compile(ctx, name, op))
        .register(registry);
}

fn compile(ctx: &mut NodeContext, name: &str, op: fn(f64, f64) -> f64) {
    let src = ctx.get_input("src");
    let operand = ctx.get_input("operand");
    if src.is_null() {
        ctx.set_error("input 'src' is not connected");
        return;
    }
    if operand.is_null() {
        ctx.set_error("input 'operand' is not connected");
        return;
    }

    if !src.is_field() && !operand.is_field() {
        match (src.as_double(), operand.as_double()) {
            (Ok(a), Ok(b)) => ctx.set_output("result", op(a, b)),
            (Err(e), _) | (_, Err(e)) => ctx.fail(e),
        }
        return;
    }

    let Some(csv) = ctx.csv_for_fields() else {
        ctx.set_error("field inputs require a csv connection");
        return;
    };
    let rows = csv.row_count();

    let dest_name = match ctx.get_input("dest") {
        dest if !dest.is_null() => match dest.as_text() {
            Ok(text) => text.to_owned(),
            Err(e) => {
                ctx.fail(e);
                return;
            }
        },
        _ if src.is_field() => match src.as_text() {
            Ok(text) => text.to_owned(),
            Err(e) => {
                ctx.fail(e);
                return;
            }
        },
        _ => format!("_{name}_result"),
    };

    let mut column = DoubleColumn::new(dest_name);
    for row in 0..rows {
        let a = match src.get_double_at_row(row, Some(&csv)) {
            Ok(v) => v,
            Err(e) => {
                ctx.fail(e);
                return;
            }
        };
        let b = match operand.get_double_at_row(row, Some(&csv)) {
            Ok(v) => v,
            Err(e) => {
                ctx.fail(e);
                return;
            }
        };
        column.push(op(a, b));
    }

    let first = if rows > 0 { column.at(0) } else { 0.0 };
    ctx.set_output("csv", rebuild_with_column(&csv, Column::Double(column)));
    ctx.set_output("result", first);
}

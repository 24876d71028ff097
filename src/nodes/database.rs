//! Database nodes and the dynamic-request SQL builder
//!
//! The actual PostgreSQL client is an external collaborator: nodes talk to
//! whatever [`QueryBackend`] the host installed. Without one, a database
//! node reports a node error and the rest of the graph keeps running.
//! `DynRequest` assembles `SELECT * FROM func(...)` calls from typed
//! parameters, with the prefix naming scheme (`i`/`d`/`s`/`b`/`n` scalars,
//! `I`/`D`/`S` arrays) the parameter log uses.

use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::frame::DataFrame;
use crate::graph::context::NodeContext;
use crate::graph::definition::NodeBuilder;
use crate::graph::registry::NodeRegistry;
use crate::graph::workload::{ValueType, Workload};

/// The seam a relational backend plugs into.
pub trait QueryBackend: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Install a connection string. Called by `postgres_config`.
    fn configure(&self, connection: &str) -> Result<(), String>;

    /// Run a query and materialize the result as a frame.
    fn execute_query(&self, sql: &str) -> Result<DataFrame, String>;
}

static BACKEND: Lazy<RwLock<Option<Arc<dyn QueryBackend>>>> = Lazy::new(|| RwLock::new(None));

/// Install the process-wide query backend.
pub fn set_query_backend(backend: Arc<dyn QueryBackend>) {
    *BACKEND.write().unwrap_or_else(PoisonError::into_inner) = Some(backend);
}

pub fn query_backend() -> Option<Arc<dyn QueryBackend>> {
    BACKEND
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// One typed parameter, named by prefix + ordinal (`i0`, `S1`, ...).
#[derive(Debug, Clone)]
pub struct DynParameter {
    pub name: String,
    pub sql: String,
}

/// Builder for PostgreSQL function calls with typed parameters.
#[derive(Debug, Default)]
pub struct DynRequest {
    function: String,
    parameters: Vec<DynParameter>,
}

impl DynRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn func(mut self, name: impl Into<String>) -> Self {
        self.function = name.into();
        self
    }

    fn push(&mut self, prefix: char, sql: String) {
        let name = format!("{prefix}{}", self.parameters.len());
        self.parameters.push(DynParameter { name, sql });
    }

    pub fn add_int(mut self, value: i64) -> Self {
        self.push('i', value.to_string());
        self
    }

    pub fn add_double(mut self, value: f64) -> Self {
        self.push('d', value.to_string());
        self
    }

    pub fn add_string(mut self, value: &str) -> Self {
        self.push('s', format!("'{}'", escape(value)));
        self
    }

    pub fn add_bool(mut self, value: bool) -> Self {
        self.push('b', if value { "TRUE" } else { "FALSE" }.to_owned());
        self
    }

    pub fn add_null(mut self) -> Self {
        self.push('n', "NULL".to_owned());
        self
    }

    pub fn add_int_array(mut self, values: &[i64]) -> Self {
        let items: Vec<String> = values.iter().map(i64::to_string).collect();
        self.push('I', format!("ARRAY[{}]::INT[]", items.join(", ")));
        self
    }

    pub fn add_double_array(mut self, values: &[f64]) -> Self {
        let items: Vec<String> = values.iter().map(f64::to_string).collect();
        self.push('D', format!("ARRAY[{}]::FLOAT8[]", items.join(", ")));
        self
    }

    pub fn add_string_array(mut self, values: &[String]) -> Self {
        let items: Vec<String> = values.iter().map(|v| format!("'{}'", escape(v))).collect();
        self.push('S', format!("ARRAY[{}]::TEXT[]", items.join(", ")));
        self
    }

    /// Broadcast a workload over the frame's rows into an int array; a
    /// scalar fans out to one copy per row.
    pub fn add_int_array_from_workload(
        self,
        workload: &Workload,
        csv: &Arc<DataFrame>,
    ) -> Result<Self, String> {
        if workload.is_null() {
            return Ok(self.add_null());
        }
        let mut values = Vec::with_capacity(csv.row_count());
        for row in 0..csv.row_count() {
            values.push(
                workload
                    .get_int_at_row(row, Some(csv))
                    .map_err(|e| e.to_string())?,
            );
        }
        Ok(self.add_int_array(&values))
    }

    pub fn add_double_array_from_workload(
        self,
        workload: &Workload,
        csv: &Arc<DataFrame>,
    ) -> Result<Self, String> {
        if workload.is_null() {
            return Ok(self.add_null());
        }
        let mut values = Vec::with_capacity(csv.row_count());
        for row in 0..csv.row_count() {
            values.push(
                workload
                    .get_double_at_row(row, Some(csv))
                    .map_err(|e| e.to_string())?,
            );
        }
        Ok(self.add_double_array(&values))
    }

    pub fn add_string_array_from_workload(
        self,
        workload: &Workload,
        csv: &Arc<DataFrame>,
    ) -> Result<Self, String> {
        if workload.is_null() {
            return Ok(self.add_null());
        }
        let mut values = Vec::with_capacity(csv.row_count());
        for row in 0..csv.row_count() {
            values.push(
                workload
                    .get_string_at_row(row, Some(csv))
                    .map_err(|e| e.to_string())?,
            );
        }
        Ok(self.add_string_array(&values))
    }

    pub fn parameters(&self) -> &[DynParameter] {
        &self.parameters
    }

    pub fn build_sql(&self) -> String {
        let args: Vec<&str> = self.parameters.iter().map(|p| p.sql.as_str()).collect();
        format!("SELECT * FROM {}({})", self.function, args.join(", "))
    }
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

pub fn register(registry: &mut NodeRegistry) {
    register_postgres_config(registry);
    register_postgres_query(registry);
    register_postgres_func(registry);
}

fn property_text(ctx: &NodeContext, name: &str) -> Option<String> {
    match ctx.get_input(name) {
        Workload::Str(text) => Some(text),
        _ => None,
    }
}

fn register_postgres_config(registry: &mut NodeRegistry) {
    NodeBuilder::new("postgres_config", "database")
        .output("connection", ValueType::String)
        .entry_point()
        .on_compile(|ctx| {
            let Some(backend) = query_backend() else {
                ctx.set_error("no query backend configured");
                return;
            };

            let host = property_text(ctx, "_host");
            let port = property_text(ctx, "_port");
            let database = property_text(ctx, "_database");
            let user = property_text(ctx, "_user");
            let password = property_text(ctx, "_password");
            let has_explicit = host.is_some()
                || port.is_some()
                || database.is_some()
                || user.is_some()
                || password.is_some();

            if backend.is_configured() && !has_explicit {
                ctx.set_output("connection", "(configured at server level)");
                return;
            }

            let host = host.unwrap_or_else(|| "localhost".into());
            let port = port.unwrap_or_else(|| "5432".into());
            let database = database.unwrap_or_else(|| "postgres".into());
            let user = user.unwrap_or_else(|| "postgres".into());

            let safe = format!("host={host} port={port} dbname={database} user={user}");
            let full = match password {
                Some(password) if !password.is_empty() => format!("{safe} password={password}"),
                _ => safe.clone(),
            };
            if let Err(message) = backend.configure(&full) {
                ctx.set_error(message);
                return;
            }
            // The echoed string never carries the password.
            ctx.set_output("connection", safe);
        })
        .register(registry);
}

fn register_postgres_query(registry: &mut NodeRegistry) {
    NodeBuilder::new("postgres_query", "database")
        .input_optional("query", ValueType::String)
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let sql = match ctx.get_input("query") {
                Workload::Str(sql) => sql,
                _ => match property_text(ctx, "_query") {
                    Some(sql) => sql,
                    None => {
                        ctx.set_error("no query provided");
                        return;
                    }
                },
            };
            if sql.is_empty() {
                ctx.set_error("empty query");
                return;
            }
            let Some(backend) = query_backend() else {
                ctx.set_error("no query backend configured; add a postgres_config node first");
                return;
            };
            if !backend.is_configured() {
                ctx.set_error("backend not configured; add a postgres_config node first");
                return;
            }
            match backend.execute_query(&sql) {
                Ok(frame) => ctx.set_output("csv", frame),
                Err(message) => ctx.set_error(format!("query error: {message}")),
            }
        })
        .register(registry);
}

/// How many `_int_N` / `_double_N` / `_string_N` parameter slots the
/// function node scans before stopping.
const MAX_FUNC_PARAMS: usize = 20;

fn register_postgres_func(registry: &mut NodeRegistry) {
    NodeBuilder::new("postgres_func", "database")
        .input_optional("csv", ValueType::Csv)
        .input("function", ValueType::String)
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let function = match ctx.get_input("function") {
                Workload::Str(name) if !name.is_empty() => name,
                _ => match property_text(ctx, "_function") {
                    Some(name) => name,
                    None => {
                        ctx.set_error("no function name provided");
                        return;
                    }
                },
            };
            let Some(backend) = query_backend() else {
                ctx.set_error("no query backend configured; add a postgres_config node first");
                return;
            };
            if !backend.is_configured() {
                ctx.set_error("backend not configured; add a postgres_config node first");
                return;
            }

            let mut request = DynRequest::new().func(function);
            for i in 0..MAX_FUNC_PARAMS {
                if let Workload::Int(v) = ctx.get_input(&format!("_int_{i}")) {
                    request = request.add_int(v);
                    continue;
                }
                if let Workload::Str(v) = ctx.get_input(&format!("_string_{i}")) {
                    request = request.add_string(&v);
                    continue;
                }
                if let Workload::Double(v) = ctx.get_input(&format!("_double_{i}")) {
                    request = request.add_double(v);
                    continue;
                }
                break;
            }

            match backend.execute_query(&request.build_sql()) {
                Ok(frame) => ctx.set_output("csv", frame),
                Err(message) => ctx.set_error(format!("query error: {message}")),
            }
        })
        .register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::test_support::{fruit_frame, inputs, run_node};

    #[test]
    fn dyn_request_builds_function_calls() {
        let sql = DynRequest::new()
            .func("my_function")
            .add_int_array(&[10, 20, 30])
            .add_string_array(&["Planning".into(), "Execution".into()])
            .build_sql();
        assert_eq!(
            sql,
            "SELECT * FROM my_function(ARRAY[10, 20, 30]::INT[], \
             ARRAY['Planning', 'Execution']::TEXT[])"
        );
    }

    #[test]
    fn parameter_names_use_type_prefixes() {
        let request = DynRequest::new()
            .func("f")
            .add_int(1)
            .add_string("x")
            .add_int_array(&[2]);
        let names: Vec<&str> = request
            .parameters()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["i0", "s1", "I2"]);
    }

    #[test]
    fn strings_are_escaped() {
        let sql = DynRequest::new().func("f").add_string("O'Brien").build_sql();
        assert_eq!(sql, "SELECT * FROM f('O''Brien')");
    }

    #[test]
    fn workload_arrays_broadcast_scalars() {
        let csv = fruit_frame();
        let request = DynRequest::new()
            .func("f")
            .add_int_array_from_workload(&Workload::Int(9), &csv)
            .unwrap();
        assert_eq!(
            request.build_sql(),
            "SELECT * FROM f(ARRAY[9, 9, 9, 9]::INT[])"
        );

        let request = DynRequest::new()
            .func("f")
            .add_string_array_from_workload(&Workload::Field("name".into()), &csv)
            .unwrap();
        assert!(request.build_sql().contains("'Apple', 'Banana'"));
    }

    #[test]
    fn null_workload_becomes_null_parameter() {
        let csv = fruit_frame();
        let request = DynRequest::new()
            .func("f")
            .add_int_array_from_workload(&Workload::Null, &csv)
            .unwrap();
        assert_eq!(request.build_sql(), "SELECT * FROM f(NULL)");
    }

    #[test]
    fn query_without_backend_is_a_node_error() {
        let ctx = run_node(
            "postgres_query",
            inputs(vec![("query", Workload::Str("SELECT 1".into()))]),
        );
        assert!(ctx.has_error());
        assert!(ctx.error_message().contains("backend"));
    }

    #[test]
    fn func_without_name_is_a_node_error() {
        let ctx = run_node("postgres_func", inputs(vec![]));
        assert!(ctx.has_error());
    }
}

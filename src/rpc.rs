//! JSONL request/response surface. Each line on stdin is one request
//! envelope; each response carries either a result payload or a structured
//! error with a stable code. Transport framing beyond line-delimited JSON is
//! not this layer's concern.

use crate::backend::MemoryBackend;
use crate::classify::ClassifyOptions;
use crate::config::Config;
use crate::deps::{self, DependencyOptions};
use crate::error::AnalysisError;
use crate::model::{SymbolKind, SymbolRef, TargetDescriptor};
use crate::page;
use crate::relations::{self, Direction, RelationshipOptions};
use crate::resolver::{self, ResolveOptions, require_resolved};
use crate::semantic::{SemanticService, Workspace};
use crate::util::{Deadline, sort_locations};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

pub const METHOD_LIST: &[&str] = &[
    "help",
    "list_methods",
    "workspace_status",
    "load_model",
    "resolve_symbol",
    "describe_symbol",
    "goto_definition",
    "find_references",
    "analyze_dependencies",
    "find_callers",
    "inheritance_tree",
    "find_implementations",
];

const MAX_TIMEOUT_MS: u64 = 600_000;

#[derive(Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Serialize)]
struct RpcResponse {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Serialize)]
struct RpcError {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<Vec<SymbolRef>>,
}

/// Target descriptor as it appears on the wire: a qualified name or a
/// file/line/column triple, exactly one form.
#[derive(Default, Deserialize, schemars::JsonSchema)]
struct TargetParams {
    #[serde(default, alias = "qualname", alias = "name")]
    qualified_name: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    line: Option<i64>,
    #[serde(default)]
    column: Option<i64>,
}

impl TargetParams {
    fn descriptor(&self) -> Result<TargetDescriptor> {
        let has_name = self.qualified_name.is_some();
        let has_position = self.file.is_some() || self.line.is_some() || self.column.is_some();
        if has_name && has_position {
            return Err(AnalysisError::InvalidInput(
                "supply either qualified_name or file/line/column, not both".into(),
            )
            .into());
        }
        if let Some(name) = &self.qualified_name {
            return Ok(TargetDescriptor::QualifiedName(name.clone()));
        }
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(column)) => Ok(TargetDescriptor::Position {
                file: file.clone(),
                line,
                column,
            }),
            (None, None, None) => Err(AnalysisError::InvalidInput(
                "missing target: supply qualified_name or file/line/column".into(),
            )
            .into()),
            _ => Err(AnalysisError::InvalidInput(
                "incomplete position: file, line and column are all required".into(),
            )
            .into()),
        }
    }

    fn label(&self) -> String {
        match (&self.qualified_name, &self.file) {
            (Some(name), _) => name.clone(),
            (None, Some(file)) => format!(
                "{}:{}:{}",
                file,
                self.line.unwrap_or(0),
                self.column.unwrap_or(0)
            ),
            _ => "<target>".to_string(),
        }
    }
}

#[derive(Default, Deserialize, schemars::JsonSchema)]
struct PageParams {
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    page_size: Option<usize>,
    #[serde(default)]
    cursor: Option<String>,
}

impl PageParams {
    fn slice(&self) -> (usize, usize) {
        let page = page::resolve_page(self.page, self.cursor.as_deref());
        let page_size = page::clamp_page_size(self.page_size);
        (page, page_size)
    }
}

#[derive(Deserialize, schemars::JsonSchema)]
struct ResolveParams {
    #[serde(flatten)]
    target: TargetParams,
    #[serde(default)]
    accessor_methods: Option<bool>,
    /// Resolve type-only names to their single constructor, as dependency
    /// analysis does.
    #[serde(default)]
    member_context: Option<bool>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct ReferencesParams {
    #[serde(flatten)]
    target: TargetParams,
    #[serde(flatten)]
    paging: PageParams,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct DependencyParams {
    #[serde(flatten)]
    target: TargetParams,
    #[serde(flatten)]
    paging: PageParams,
    #[serde(default)]
    depth: Option<usize>,
    #[serde(default)]
    include_callers: Option<bool>,
    #[serde(default)]
    accessors_as_calls: Option<bool>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct CallersParams {
    #[serde(flatten)]
    target: TargetParams,
    #[serde(flatten)]
    paging: PageParams,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct InheritanceParams {
    #[serde(flatten)]
    target: TargetParams,
    #[serde(flatten)]
    paging: PageParams,
    /// "up", "down" or "both".
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    max_depth: Option<usize>,
    #[serde(default)]
    include_overrides: Option<bool>,
    /// Keep only ancestors with an in-source declaration.
    #[serde(default)]
    source_only: Option<bool>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct ImplementationsParams {
    #[serde(flatten)]
    target: TargetParams,
    #[serde(flatten)]
    paging: PageParams,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Deserialize, schemars::JsonSchema)]
struct LoadModelParams {
    path: PathBuf,
}

fn deadline(timeout_ms: Option<u64>) -> Deadline {
    let budget = timeout_ms
        .unwrap_or(Config::get().default_timeout_ms)
        .clamp(1, MAX_TIMEOUT_MS);
    Deadline::after_ms(budget)
}

fn clamp_depth(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, Config::get().max_depth)
}

pub fn serve(model_path: Option<PathBuf>) -> Result<()> {
    let app = App::new(model_path)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(value) => value,
            Err(err) => {
                eprintln!("semquery: stdin error: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => app.handle_request(request),
            Err(err) => invalid_request_response(Value::Null, &err.to_string()),
        };

        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }

    Ok(())
}

/// Run a single request against a model file and return the serialized
/// response line.
pub fn call(
    model_path: Option<PathBuf>,
    method: String,
    params_raw: &str,
    id_raw: &str,
) -> Result<String> {
    let params: Value = serde_json::from_str(params_raw).with_context(|| "parse params JSON")?;
    let id = parse_value(id_raw);
    let app = App::new(model_path)?;
    let request = RpcRequest { id, method, params };
    let response = app.handle_request(request);
    Ok(serde_json::to_string(&response)?)
}

pub struct App {
    workspace: Workspace,
}

impl App {
    pub fn new(model_path: Option<PathBuf>) -> Result<Self> {
        let workspace = match model_path {
            Some(path) => {
                let backend = MemoryBackend::from_json_file(&path)?;
                Workspace::with(Arc::new(backend))
            }
            None => Workspace::empty(),
        };
        Ok(App { workspace })
    }

    pub fn with_workspace(workspace: Workspace) -> Self {
        App { workspace }
    }

    fn handle_request(&self, req: RpcRequest) -> RpcResponse {
        let id = req.id.clone();
        match handle_method(&self.workspace, &req.method, req.params) {
            Ok(value) => RpcResponse {
                id,
                result: Some(value),
                error: None,
            },
            Err(err) => RpcResponse {
                id,
                result: None,
                error: Some(to_rpc_error(err)),
            },
        }
    }

    /// Handle one request already split into method and params; used by tests
    /// and by embedding callers that do their own framing.
    pub fn handle(&self, method: &str, params: Value) -> Result<Value> {
        handle_method(&self.workspace, method, params)
    }
}

fn to_rpc_error(err: anyhow::Error) -> RpcError {
    match err.downcast::<AnalysisError>() {
        Ok(AnalysisError::Ambiguous { hint, candidates }) => RpcError {
            code: "ambiguous".to_string(),
            message: format!("ambiguous target: {hint}"),
            hint: Some(hint),
            candidates: Some(candidates),
        },
        Ok(analysis) => RpcError {
            code: analysis.code().to_string(),
            message: analysis.to_string(),
            hint: None,
            candidates: None,
        },
        Err(other) => RpcError {
            code: "internal".to_string(),
            message: other.to_string(),
            hint: None,
            candidates: None,
        },
    }
}

fn invalid_request_response(id: Value, message: &str) -> RpcResponse {
    RpcResponse {
        id,
        result: None,
        error: Some(RpcError {
            code: "invalid_input".to_string(),
            message: format!("invalid request: {message}"),
            hint: None,
            candidates: None,
        }),
    }
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn handle_method(workspace: &Workspace, method: &str, params: Value) -> Result<Value> {
    match method {
        "help" => Ok(method_help()),
        "list_methods" => Ok(method_list()),
        "workspace_status" => Ok(workspace_status(workspace)),
        "load_model" => load_model(workspace, params),
        "resolve_symbol" => resolve_symbol(workspace, params),
        "describe_symbol" => describe_symbol(workspace, params),
        "goto_definition" => goto_definition(workspace, params),
        "find_references" => find_references(workspace, params),
        "analyze_dependencies" => analyze_dependencies(workspace, params),
        "find_callers" => find_callers(workspace, params),
        "inheritance_tree" => inheritance_tree(workspace, params),
        "find_implementations" => find_implementations(workspace, params),
        other => Err(AnalysisError::InvalidInput(format!(
            "unknown method {other}; see list_methods"
        ))
        .into()),
    }
}

fn parse_required<T: serde::de::DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params)
        .map_err(|err| AnalysisError::InvalidInput(format!("bad params: {err}")).into())
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

fn method_help() -> Value {
    json!({
        "service": "semquery",
        "methods": METHOD_LIST,
        "target": "every analysis method takes qualified_name OR file+line+column",
        "defaults": {
            "depth": 1,
            "max_depth (inheritance_tree)": 5,
            "page_size": Config::get().default_page_size,
            "timeout_ms": Config::get().default_timeout_ms,
        },
        "examples": [
            { "method": "resolve_symbol", "params": { "qualified_name": "Demo.Calculator.Add(int, int)" } },
            { "method": "find_references", "params": { "qualified_name": "Demo.Calculator.total", "page_size": 25 } },
            { "method": "analyze_dependencies", "params": { "qualified_name": "Demo.Worker.Run", "depth": 3, "include_callers": true, "accessors_as_calls": true } },
            { "method": "inheritance_tree", "params": { "qualified_name": "Demo.Shape", "direction": "down", "max_depth": 2 } },
            { "method": "find_implementations", "params": { "qualified_name": "Demo.IShape" } },
            { "method": "goto_definition", "params": { "file": "src/worker.cs", "line": 42, "column": 17 } },
        ],
    })
}

fn method_list() -> Value {
    json!({
        "names": METHOD_LIST,
        "schemas": {
            "resolve_symbol": schemars::schema_for!(ResolveParams),
            "describe_symbol": schemars::schema_for!(ResolveParams),
            "goto_definition": schemars::schema_for!(ResolveParams),
            "find_references": schemars::schema_for!(ReferencesParams),
            "analyze_dependencies": schemars::schema_for!(DependencyParams),
            "find_callers": schemars::schema_for!(CallersParams),
            "inheritance_tree": schemars::schema_for!(InheritanceParams),
            "find_implementations": schemars::schema_for!(ImplementationsParams),
            "load_model": schemars::schema_for!(LoadModelParams),
        },
    })
}

fn workspace_status(workspace: &Workspace) -> Value {
    match workspace.snapshot() {
        Ok(svc) => json!({ "loaded": true, "stats": svc.stats() }),
        Err(_) => json!({ "loaded": false }),
    }
}

fn load_model(workspace: &Workspace, params: Value) -> Result<Value> {
    let params: LoadModelParams = parse_required(params)?;
    let backend = MemoryBackend::from_json_file(&params.path)?;
    let stats = backend.stats();
    workspace.replace(Arc::new(backend));
    Ok(json!({ "loaded": true, "stats": stats }))
}

// ---------------------------------------------------------------------------
// Resolution and navigation
// ---------------------------------------------------------------------------

fn resolve_one(
    svc: &dyn SemanticService,
    target: &TargetParams,
    opts: &ResolveOptions,
) -> Result<SymbolRef> {
    let descriptor = target.descriptor()?;
    let result = resolver::resolve(svc, &descriptor, opts)?;
    require_resolved(result, &target.label())
}

fn resolve_symbol(workspace: &Workspace, params: Value) -> Result<Value> {
    let params: ResolveParams = parse_required(params)?;
    let svc = workspace.snapshot()?;
    let opts = ResolveOptions {
        member_context: params.member_context.unwrap_or(false),
        accessor_methods: params.accessor_methods.unwrap_or(false),
    };
    let symbol = resolve_one(svc.as_ref(), &params.target, &opts)?;
    Ok(json!({ "symbol": symbol }))
}

fn describe_symbol(workspace: &Workspace, params: Value) -> Result<Value> {
    let params: ResolveParams = parse_required(params)?;
    let svc = workspace.snapshot()?;
    let opts = ResolveOptions {
        member_context: params.member_context.unwrap_or(false),
        accessor_methods: params.accessor_methods.unwrap_or(false),
    };
    let symbol = resolve_one(svc.as_ref(), &params.target, &opts)?;
    let source = svc.find_source_definition(&symbol.id)?;
    Ok(json!({
        "symbol": symbol,
        "in_source": source.is_some(),
        "source_definition": source,
    }))
}

fn goto_definition(workspace: &Workspace, params: Value) -> Result<Value> {
    let params: ResolveParams = parse_required(params)?;
    let svc = workspace.snapshot()?;
    let opts = ResolveOptions {
        member_context: false,
        accessor_methods: params.accessor_methods.unwrap_or(false),
    };
    let symbol = resolve_one(svc.as_ref(), &params.target, &opts)?;
    let definition = svc.find_source_definition(&symbol.id)?.ok_or_else(|| {
        AnalysisError::NotFound(format!("{} has no source definition", symbol.display))
    })?;
    Ok(json!({ "symbol": definition }))
}

fn find_references(workspace: &Workspace, params: Value) -> Result<Value> {
    let params: ReferencesParams = parse_required(params)?;
    let svc = workspace.snapshot()?;
    let budget = deadline(params.timeout_ms);
    let symbol = resolve_one(svc.as_ref(), &params.target, &ResolveOptions::default())?;
    budget.check()?;
    let mut locations = svc.find_references(&symbol.id)?;
    sort_locations(&mut locations);
    let (page_number, page_size) = params.paging.slice();
    Ok(json!({
        "symbol": symbol,
        "references": page::paginate(locations, page_number, page_size),
    }))
}

// ---------------------------------------------------------------------------
// Dependency analysis
// ---------------------------------------------------------------------------

fn analyze_dependencies(workspace: &Workspace, params: Value) -> Result<Value> {
    let params: DependencyParams = parse_required(params)?;
    let svc = workspace.snapshot()?;
    let accessor_methods = params.accessors_as_calls.unwrap_or(false);
    let root = resolve_one(
        svc.as_ref(),
        &params.target,
        &ResolveOptions {
            member_context: true,
            accessor_methods,
        },
    )?;
    if !root.kind.is_invocable() {
        return Err(AnalysisError::InvalidInput(format!(
            "{} is a {:?}, not a method or constructor",
            root.display, root.kind
        ))
        .into());
    }
    let opts = DependencyOptions {
        depth: clamp_depth(params.depth, 1),
        include_callers: params.include_callers.unwrap_or(false),
        classify: ClassifyOptions {
            accessors_as_calls: params.accessors_as_calls.unwrap_or(false),
        },
        deadline: deadline(params.timeout_ms),
    };
    let graph = deps::build(svc.as_ref(), &root, &opts)?;
    let (page_number, page_size) = params.paging.slice();
    Ok(json!({
        "root": graph.root,
        "calls": page::paginate(graph.calls, page_number, page_size),
        "reads": page::paginate(graph.reads, page_number, page_size),
        "writes": page::paginate(graph.writes, page_number, page_size),
        "callers": graph
            .callers
            .map(|callers| page::paginate(callers, page_number, page_size)),
        "skipped": graph.skipped,
    }))
}

fn find_callers(workspace: &Workspace, params: Value) -> Result<Value> {
    let params: CallersParams = parse_required(params)?;
    let svc = workspace.snapshot()?;
    let budget = deadline(params.timeout_ms);
    let root = resolve_one(
        svc.as_ref(),
        &params.target,
        &ResolveOptions {
            member_context: true,
            ..Default::default()
        },
    )?;
    budget.check()?;
    let mut callers = svc.find_callers(&root.id)?;
    callers.sort_by(|a, b| {
        a.caller
            .display
            .cmp(&b.caller.display)
            .then_with(|| a.caller.id.cmp(&b.caller.id))
    });
    let (page_number, page_size) = params.paging.slice();
    Ok(json!({
        "root": root,
        "callers": page::paginate(callers, page_number, page_size),
    }))
}

// ---------------------------------------------------------------------------
// Type relationships
// ---------------------------------------------------------------------------

fn inheritance_tree(workspace: &Workspace, params: Value) -> Result<Value> {
    let params: InheritanceParams = parse_required(params)?;
    let svc = workspace.snapshot()?;
    let root = resolve_one(svc.as_ref(), &params.target, &ResolveOptions::default())?;
    if !root.kind.is_type() {
        return Err(AnalysisError::InvalidInput(format!(
            "{} is a {:?}, not a type",
            root.display, root.kind
        ))
        .into());
    }
    let direction = match &params.direction {
        Some(raw) => Direction::parse(raw).ok_or_else(|| {
            AnalysisError::InvalidInput(format!(
                "direction must be up, down or both, got {raw}"
            ))
        })?,
        None => Direction::Both,
    };
    let opts = RelationshipOptions {
        direction,
        max_depth: clamp_depth(params.max_depth, 5),
        source_only: params.source_only.unwrap_or(false),
        include_overrides: params.include_overrides.unwrap_or(false),
        deadline: deadline(params.timeout_ms),
    };
    let graph = relations::build(svc.as_ref(), &root, &opts)?;
    let (page_number, page_size) = params.paging.slice();
    Ok(json!({
        "root": graph.root,
        "ancestors": page::paginate(graph.ancestors, page_number, page_size),
        "interfaces": page::paginate(graph.interfaces, page_number, page_size),
        "descendants": page::paginate(graph.descendants, page_number, page_size),
        // Depth bound substitutes for pagination on the tree.
        "descendants_tree": graph.descendants_tree,
        "overrides": graph.overrides,
    }))
}

fn find_implementations(workspace: &Workspace, params: Value) -> Result<Value> {
    let params: ImplementationsParams = parse_required(params)?;
    let svc = workspace.snapshot()?;
    let budget = deadline(params.timeout_ms);
    let root = resolve_one(svc.as_ref(), &params.target, &ResolveOptions::default())?;
    if root.kind.is_type() && root.kind != SymbolKind::Interface {
        return Err(AnalysisError::InvalidInput(format!(
            "{} is not an interface or interface member",
            root.display
        ))
        .into());
    }
    budget.check()?;
    let mut implementations = svc.find_implementations(&root.id)?;
    implementations.sort_by(|a, b| a.display.cmp(&b.display).then_with(|| a.id.cmp(&b.id)));
    let (page_number, page_size) = params.paging.slice();
    Ok(json!({
        "root": root,
        "implementations": page::paginate(implementations, page_number, page_size),
    }))
}

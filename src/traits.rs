//! Query tools exposed to MCP clients.
//!
//! Each tool is a small [`Tool`] implementation that parses its JSON
//! arguments and delegates to the shared [`IssueStore`] through a
//! [`ToolContext`]. The [`ToolRegistry`] is what the MCP bridge lists and
//! dispatches against.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 ToolRegistry                 │
//! │  get_issues  get_issue_details  rebuild      │
//! │  get_build_info  get_raw_output  get_info    │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!          ToolContext → Arc<Mutex<IssueStore>>
//! ```
//!
//! Every tool refreshes the store from the shared snapshot before answering,
//! so a watch-mode server always reports the most recent build.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::models::InfoCategory;
use crate::query::{IssueFilter, IssueStore};

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A query tool that MCP clients can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, e.g. `"get_issues"`.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Whether calling the tool leaves the served state untouched.
    ///
    /// Defaults to `true`; `rebuild` is the exception.
    fn is_read_only(&self) -> bool {
        true
    }

    /// JSON Schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `params` is always a JSON object.
    ///
    /// A returned string is sent to the client verbatim; anything else is
    /// sent as pretty-printed JSON.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Shared handle to the served state.
#[derive(Clone)]
pub struct ToolContext {
    store: Arc<Mutex<IssueStore>>,
}

impl ToolContext {
    pub fn new(store: Arc<Mutex<IssueStore>>) -> Self {
        Self { store }
    }

    /// Lock the store after pulling in any newer snapshot.
    ///
    /// The flag tells whether the refresh changed anything.
    pub async fn fresh_store(&self) -> (MutexGuard<'_, IssueStore>, bool) {
        let mut store = self.store.lock().await;
        let refreshed = store.refresh();
        (store, refreshed)
    }
}

fn bool_param(params: &Value, key: &str, default: bool) -> bool {
    params[key].as_bool().unwrap_or(default)
}

fn str_param<'a>(params: &'a Value, key: &str, default: &'a str) -> &'a str {
    params[key].as_str().unwrap_or(default)
}

// ═══════════════════════════════════════════════════════════════════════
// Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

pub struct GetIssuesTool;

#[async_trait]
impl Tool for GetIssuesTool {
    fn name(&self) -> &str {
        "get_issues"
    }

    fn description(&self) -> &str {
        "Get current warnings and errors from the last mkdocs build"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filter": {
                    "type": "string",
                    "enum": ["all", "errors", "warnings"],
                    "default": "all",
                    "description": "Filter issues by type"
                },
                "verbose": {
                    "type": "boolean",
                    "default": false,
                    "description": "Include full code blocks and tracebacks"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let filter = IssueFilter::parse(str_param(&params, "filter", "all"))?;
        let verbose = bool_param(&params, "verbose", false);
        let (store, _) = ctx.fresh_store().await;
        Ok(store.get_issues(filter, verbose))
    }
}

pub struct GetIssueDetailsTool;

#[async_trait]
impl Tool for GetIssueDetailsTool {
    fn name(&self) -> &str {
        "get_issue_details"
    }

    fn description(&self) -> &str {
        "Get detailed information about a specific issue by ID"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "issue_id": { "type": "string", "description": "The issue ID to get details for" }
            },
            "required": ["issue_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let id = str_param(&params, "issue_id", "");
        if id.trim().is_empty() {
            bail!("issue_id must not be empty");
        }
        let (store, _) = ctx.fresh_store().await;
        match store.get_issue_details(id) {
            Some(details) => Ok(details),
            None => bail!("Issue not found: {}", id),
        }
    }
}

pub struct RebuildTool;

#[async_trait]
impl Tool for RebuildTool {
    fn name(&self) -> &str {
        "rebuild"
    }

    fn description(&self) -> &str {
        "Trigger a new mkdocs build and return updated issues"
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "verbose": {
                    "type": "boolean",
                    "default": false,
                    "description": "Run mkdocs with --verbose for more file context"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let verbose = bool_param(&params, "verbose", false);
        let mut store = ctx.store.lock().await;
        match store.rebuild(verbose).await? {
            Some(result) => Ok(result),
            None => Ok(Value::String(
                "No new build data. Save a file to trigger a rebuild in mkdocs serve, \
                 or check that mkdocs-output-filter is running with --share-state."
                    .to_string(),
            )),
        }
    }
}

pub struct GetBuildInfoTool;

#[async_trait]
impl Tool for GetBuildInfoTool {
    fn name(&self) -> &str {
        "get_build_info"
    }

    fn description(&self) -> &str {
        "Get information about the last build (server URL, build dir, time)"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let (store, refreshed) = ctx.fresh_store().await;
        Ok(store.get_build_info(refreshed, &cwd))
    }
}

pub struct GetRawOutputTool;

#[async_trait]
impl Tool for GetRawOutputTool {
    fn name(&self) -> &str {
        "get_raw_output"
    }

    fn description(&self) -> &str {
        "Get the raw mkdocs output from the last build"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "last_n_lines": {
                    "type": "integer",
                    "default": 100,
                    "description": "Number of lines to return (from the end)"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let last_n = params["last_n_lines"].as_i64().unwrap_or(100);
        let (store, _) = ctx.fresh_store().await;
        Ok(Value::String(store.get_raw_output(last_n)))
    }
}

pub struct GetInfoTool;

#[async_trait]
impl Tool for GetInfoTool {
    fn name(&self) -> &str {
        "get_info"
    }

    fn description(&self) -> &str {
        "Get INFO-level messages like broken links, missing nav entries, absolute links"
    }

    fn parameters_schema(&self) -> Value {
        let mut categories = vec!["all"];
        categories.extend(InfoCategory::ALL.iter().map(|c| c.as_str()));
        serde_json::json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "enum": categories,
                    "default": "all",
                    "description": "Filter by category"
                },
                "grouped": {
                    "type": "boolean",
                    "default": true,
                    "description": "Group messages by category"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let category = match str_param(&params, "category", "all") {
            "all" => None,
            name => match InfoCategory::parse(name) {
                Some(category) => Some(category),
                None => bail!("Unknown category: {}", name),
            },
        };
        let grouped = bool_param(&params, "grouped", true);
        let (store, _) = ctx.fresh_store().await;
        Ok(store.get_info(category, grouped))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of query tools.
///
/// Use [`ToolRegistry::with_builtins`] for the standard set.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry holding the six standard tools, in listing order.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GetIssuesTool));
        registry.register(Box::new(GetIssueDetailsTool));
        registry.register(Box::new(RebuildTool));
        registry.register(Box::new(GetBuildInfoTool));
        registry.register(Box::new(GetRawOutputTool));
        registry.register(Box::new(GetInfoTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

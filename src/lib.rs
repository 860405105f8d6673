//! # mkdocs-output-filter
//!
//! Turns the noisy console output of `mkdocs build` and `mkdocs serve` into
//! a short report of what needs fixing, and shares that report with code
//! agents over MCP.
//!
//! ## Architecture
//!
//! ```text
//! stdin ─▶ StreamingProcessor ─▶ Renderer ─▶ stdout
//!              │      │
//!              │      └─▶ state.json ─▶ IssueStore ─▶ MCP tools (stdio)
//!              ▼
//!        boundary / parse / exec_block / info
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Issues, notices and build metadata |
//! | [`patterns`] | Single-line signatures of MkDocs output |
//! | [`boundary`] | Build-cycle boundary detection |
//! | [`exec_block`] | `markdown_exec` failure blocks |
//! | [`parse`] | Window-level issue and metadata extraction |
//! | [`info`] | Broken links, missing nav pages and other notices |
//! | [`processor`] | Incremental, deduplicating line processor |
//! | [`state`] | Atomic JSON snapshot shared with the MCP server |
//! | [`render`] | Terminal rendering |
//! | [`progress`] | Activity line on stderr |
//! | [`batch`], [`stream`], [`interactive`] | Filter drivers |
//! | [`run`] | Mode dispatch |
//! | [`query`] | State served to MCP clients |
//! | [`traits`] | MCP tool trait and registry |
//! | [`mcp`] | rmcp `ServerHandler` bridge |
//! | [`server`] | MCP server entry point |
//! | [`config`] | TOML configuration |
//! | [`input`] | Lossy line reading |
//! | [`logging`] | `tracing` subscriber setup |

pub mod batch;
pub mod boundary;
pub mod config;
pub mod exec_block;
pub mod info;
pub mod input;
pub mod interactive;
pub mod logging;
pub mod mcp;
pub mod models;
pub mod parse;
pub mod patterns;
pub mod processor;
pub mod progress;
pub mod query;
pub mod render;
pub mod run;
pub mod server;
pub mod state;
pub mod stream;
pub mod traits;

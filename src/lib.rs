#![forbid(unsafe_code)]
//! Framed JSON-RPC / DAP / MCP runtime for driving external developer tools
//! over JSON wire protocols.
//!
//! Three layers, each built on the one before:
//!
//! - [`framing`] / [`channel`] / [`correlation`] / [`waiter`]: the shared
//!   plumbing — frame a byte stream into JSON values (LF-delimited or HTTP
//!   `Content-Length`-prefixed), hand outbound messages to a pump through a
//!   bounded channel, and correlate a reply back to the call that's waiting
//!   on it.
//! - [`jsonrpc`]: a full-duplex JSON-RPC 2.0 driver — `call`/`notify` for
//!   outbound traffic, caller-supplied handlers for inbound method calls and
//!   notifications, batched-array dispatch, and an automatic
//!   method-not-found reply when nothing claims a call.
//! - [`dap`]: a Debug Adapter Protocol client layered on the same pump
//!   design, correlating by `seq`/`request_seq` instead of a JSON-RPC id and
//!   additionally dispatching unsolicited events.
//! - [`mcp`]: a Model Context Protocol server built on [`jsonrpc`], exposing
//!   `initialize`, `tools/list`, `resources/list`, `prompts/list`, and
//!   `tools/call` against a host-supplied tool registry.
//!
//! [`process::spawn_stdio`] is the supplementary piece that gets a
//! bidirectional stream in the first place: it spawns the adapter/server
//! binary with piped stdio.
//!
//! ```rust,no_run
//! use devrpc::jsonrpc::{JsonRpcConfig, JsonRpcDriver};
//! use devrpc::process::spawn_stdio;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = spawn_stdio(tokio::process::Command::new("some-lsp-like-tool")).await?;
//! let (stdout, stdin) = transport.into_stream();
//! let driver = JsonRpcDriver::start(stdout, stdin, JsonRpcConfig::default());
//! let result = driver.call("initialize", serde_json::json!({})).await?;
//! println!("{result}");
//! # Ok(()) }
//! ```

pub mod channel;
pub mod correlation;
pub mod dap;
pub mod error;
pub mod framing;
pub mod jsonrpc;
pub mod mcp;
pub mod process;
pub mod waiter;

pub use dap::DapClient;
pub use jsonrpc::JsonRpcDriver;
pub use mcp::McpServer;

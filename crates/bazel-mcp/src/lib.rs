//! bazel-mcp Server
//!
//! Exposes Bazel dependency queries, builds and tests to AI assistants via the
//! Model Context Protocol (MCP). Implements MCP over stdio using JSON-RPC 2.0.

pub mod config;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod tools;

pub use config::Config;
pub use handler::Handler;
pub use server::McpServer;

//! MCP Server for the article router
//!
//! Exposes question answering and article lookup as MCP tools over stdio.

mod server;

pub use server::{answer_with_deadline, run_mcp_server, LawService};

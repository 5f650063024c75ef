//! MCP server that gives LLMs read-only access to GitHub repositories over HTTP.
//!
//! Two tools are exposed: `github.readFile` reads a text file and
//! `github.listTree` lists a directory, both at an optional ref.

pub mod contents;
pub mod credentials;
pub mod error;
pub mod server;
pub mod transport;

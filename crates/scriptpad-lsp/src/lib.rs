//! Language Server Protocol front end for ScriptPad scripts (`.spx`).
//!
//! Each open document is one `scriptpad_core::ScriptWorkspace`. The leading
//! `#r "<path>"` lines of the file become its reference set and the rest is
//! forwarded as the script body.

pub mod config;
pub mod document;
pub mod error;
pub mod handlers;
pub mod server;

// Re-export commonly used types
pub use error::{LspError, Result};
pub use server::Backend;

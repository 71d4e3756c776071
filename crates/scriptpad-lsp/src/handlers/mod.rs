//! LSP protocol handlers.
//!
//! - [`completion`]: names and members at the caret
//! - [`diagnostics`]: pull diagnostics and record conversion
//! - [`formatting`]: body reindentation as a single text edit
//!
//! Handlers look the document up in `ServerState`, wait for the analysis of
//! the text the request refers to, and degrade to empty results on any
//! failure.

pub mod completion;
pub mod diagnostics;
pub mod formatting;

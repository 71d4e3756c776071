//! Document management module.
//!
//! - `state`: per-document and server state, header/body splitting
//! - `lifecycle`: open/change handling and diagnostics publishing

mod lifecycle;
mod state;

pub use lifecycle::{
    FreshSnapshot, await_snapshot, handle_document_change, handle_document_open,
};
pub(crate) use state::minimal_edit;
pub use state::{DocumentState, ServerState};

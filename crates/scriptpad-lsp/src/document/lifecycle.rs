//! Document open/change handling and snapshot-driven diagnostics publishing.

use super::state::ServerState;
use crate::config::ScriptpadConfig;
use crate::error::{LspError, Result};
use crate::handlers::diagnostics;
use scriptpad_core::compilation::SnapshotReceiver;
use scriptpad_core::{AnalysisOptions, AnalysisSnapshot, DiagnosticMapper, SnapshotKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tower_lsp_server::Client;
use tower_lsp_server::ls_types::{TextDocumentContentChangeEvent, Uri};

/// Longest a request waits for the analysis of the text it was issued against.
const SNAPSHOT_WAIT: Duration = Duration::from_secs(2);

/// Opens a document and starts its diagnostics publisher.
///
/// The returned task lives until the document is closed and must be
/// registered with [`ServerState::spawn_background_task`].
pub async fn handle_document_open(
    uri: Uri,
    content: String,
    state: Arc<ServerState>,
    client: Client,
    config: Arc<RwLock<ScriptpadConfig>>,
) -> JoinHandle<()> {
    let options = AnalysisOptions::from(&config.read().await.analysis);
    state.open_document(uri.clone(), content, options);

    let receivers = state.documents.get_mut(&uri).map(|mut doc| {
        doc.workspace.request_analysis();
        (doc.workspace.subscribe(), doc.subscribe_header())
    });

    tokio::spawn(async move {
        if let Some((snapshots, header)) = receivers {
            publish_diagnostics_loop(uri, snapshots, header, state, client, config).await;
        }
    })
}

/// Applies client edits and schedules re-analysis.
///
/// # Errors
///
/// Returns `LspError::DocumentNotOpen` for unknown URIs, or the first edit
/// that could not be applied.
pub fn handle_document_change(
    uri: &Uri,
    changes: Vec<TextDocumentContentChangeEvent>,
    state: &ServerState,
) -> Result<()> {
    let mut doc = state
        .documents
        .get_mut(uri)
        .ok_or_else(|| LspError::DocumentNotOpen(uri.as_str().to_string()))?;
    let applied = doc.apply_changes(changes);
    let kind = doc.workspace.request_analysis();
    tracing::debug!("{}: {:?} after change", doc.workspace.name(), kind);
    applied
}

/// Pushes diagnostics each time the document's workspace publishes a
/// snapshot for its current text and references, and again when the header
/// moves the body.
///
/// Snapshots superseded by a later edit are skipped; the loop ends when the
/// document is closed.
async fn publish_diagnostics_loop(
    uri: Uri,
    mut snapshots: SnapshotReceiver,
    mut header: watch::Receiver<u32>,
    state: Arc<ServerState>,
    client: Client,
    config: Arc<RwLock<ScriptpadConfig>>,
) {
    loop {
        let open = tokio::select! {
            changed = snapshots.changed() => changed.is_ok(),
            changed = header.changed() => changed.is_ok(),
        };
        if !open {
            break;
        }
        header.mark_unchanged();
        let Some(snapshot) = snapshots.borrow_and_update().clone() else {
            continue;
        };

        let (records, header_lines) = {
            let Some(doc) = state.get_document(&uri) else {
                break;
            };
            if doc.workspace.key() != snapshot.key() {
                tracing::trace!("skipping superseded snapshot {}", snapshot.key());
                continue;
            }
            (DiagnosticMapper::map(&snapshot), doc.header_lines())
        };

        let enabled = config.read().await.diagnostics.enabled;
        let items = if enabled {
            diagnostics::to_lsp_diagnostics(&records, header_lines)
        } else {
            Vec::new()
        };
        tracing::debug!("publishing {} diagnostics for {:?}", items.len(), uri);
        client.publish_diagnostics(uri.clone(), items, None).await;
    }
}

/// A snapshot together with the key the document had when it was requested.
pub struct FreshSnapshot {
    pub snapshot: Arc<AnalysisSnapshot>,
    pub requested: SnapshotKey,
}

impl FreshSnapshot {
    /// True if no edit happened between the request and the snapshot.
    pub fn is_exact(&self) -> bool {
        self.snapshot.key() == self.requested
    }
}

/// Waits until `receiver` holds a snapshot at least as new as `key`.
///
/// Returns `None` if the document closes or the analysis does not arrive in
/// time (for example because the compute faulted).
pub async fn await_snapshot(mut receiver: SnapshotReceiver, key: SnapshotKey) -> Option<FreshSnapshot> {
    let waited = tokio::time::timeout(
        SNAPSHOT_WAIT,
        receiver.wait_for(|s| s.as_ref().is_some_and(|s| s.key() >= key)),
    )
    .await;

    match waited {
        Ok(Ok(slot)) => slot.clone().map(|snapshot| FreshSnapshot {
            snapshot,
            requested: key,
        }),
        Ok(Err(_)) => None,
        Err(_) => {
            tracing::warn!("analysis {} not available after {:?}", key, SNAPSHOT_WAIT);
            None
        }
    }
}

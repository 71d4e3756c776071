//! Incremental compilation: memoized snapshots and the single in-flight compute.
//!
//! [`CompilationCache::request`] compares the requested key with the last
//! published snapshot and picks the cheapest rebuild:
//!
//! | requested vs. current          | work                       |
//! |--------------------------------|----------------------------|
//! | same key                       | none                       |
//! | same source, new references    | re-bind on the cached tree |
//! | new source                     | reparse + bind             |
//!
//! Work runs on a tokio blocking worker. A new request cancels the previous
//! compute through its [`CancellationToken`], which the compute checks after
//! parsing, before binding and before assembling diagnostics. Results are
//! published through a `watch` channel in strictly increasing key order.

use crate::binder::{self, BoundScript};
use crate::diagnostics::{Diagnostic, DiagnosticSeverity, codes};
use crate::error::CompileError;
use crate::library::{self, Library, LibraryCache};
use crate::reference::Reference;
use crate::snapshot::{AnalysisSnapshot, SnapshotKey};
use crate::syntax::SyntaxTree;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Parser and binder behind the cache.
///
/// Implementations must be pure: the same input always yields the same
/// tree and bindings. A panic is treated as a compilation fault.
pub trait Compiler: Send + Sync + 'static {
    fn parse(&self, text: Arc<str>) -> SyntaxTree;

    fn bind(&self, syntax: &SyntaxTree, libraries: &[Arc<Library>]) -> BoundScript;
}

/// The `.spx` language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptLanguage;

impl Compiler for ScriptLanguage {
    fn parse(&self, text: Arc<str>) -> SyntaxTree {
        SyntaxTree::parse(text)
    }

    fn bind(&self, syntax: &SyntaxTree, libraries: &[Arc<Library>]) -> BoundScript {
        binder::bind(syntax, libraries)
    }
}

/// Cooperative cancellation flag shared between a request and its compute.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check(&self) -> std::result::Result<(), CompileError> {
        if self.is_cancelled() {
            Err(CompileError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Analysis switches that do not change the text or references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Make the built-in prelude visible.
    pub include_prelude: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_prelude: true,
        }
    }
}

/// Everything a compute needs, detached from the workspace.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub key: SnapshotKey,
    pub text: Arc<str>,
    pub references: Vec<Reference>,
    /// Directory relative reference paths resolve against.
    pub base_dir: Option<PathBuf>,
    pub options: AnalysisOptions,
}

/// What [`CompilationCache::request`] decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildKind {
    UpToDate,
    /// A compute for this key is already running.
    InProgress,
    Rebind,
    Reparse,
}

/// Published snapshot slot; `None` until the first compute completes.
pub type SnapshotReceiver = watch::Receiver<Option<Arc<AnalysisSnapshot>>>;

struct InFlight {
    key: SnapshotKey,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl InFlight {
    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

pub struct CompilationCache {
    compiler: Arc<dyn Compiler>,
    libraries: Arc<LibraryCache>,
    published: Arc<watch::Sender<Option<Arc<AnalysisSnapshot>>>>,
    in_flight: Option<InFlight>,
}

impl std::fmt::Debug for CompilationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationCache")
            .field("current", &self.current().map(|s| s.key()))
            .field("in_flight", &self.in_flight.as_ref().map(|i| i.key))
            .finish_non_exhaustive()
    }
}

impl CompilationCache {
    pub fn new(compiler: Arc<dyn Compiler>, libraries: Arc<LibraryCache>) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            compiler,
            libraries,
            published: Arc::new(sender),
            in_flight: None,
        }
    }

    /// Most recently published snapshot, never blocking on a running compute.
    pub fn current(&self) -> Option<Arc<AnalysisSnapshot>> {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.published.subscribe()
    }

    pub fn is_computing(&self) -> bool {
        self.in_flight.as_ref().is_some_and(InFlight::is_running)
    }

    /// True if a compute for exactly `key` is running.
    pub fn is_computing_key(&self, key: SnapshotKey) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|i| i.key == key && i.is_running())
    }

    /// Brings the published snapshot up to `request.key`.
    ///
    /// Returns immediately; the compute runs on a blocking worker when a
    /// tokio runtime is available and inline otherwise.
    pub fn request(&mut self, request: AnalysisRequest) -> RebuildKind {
        let current = self.current();

        if current.as_ref().is_some_and(|s| s.key() == request.key) {
            self.cancel_in_flight();
            tracing::debug!("analysis {} up to date", request.key);
            return RebuildKind::UpToDate;
        }
        if self.is_computing_key(request.key) {
            return RebuildKind::InProgress;
        }

        let reuse = current
            .filter(|s| s.source_version() == request.key.source_version)
            .map(|s| s.shared_syntax());
        let kind = if reuse.is_some() {
            RebuildKind::Rebind
        } else {
            RebuildKind::Reparse
        };
        tracing::debug!("analysis {} scheduled: {:?}", request.key, kind);

        self.cancel_in_flight();

        let cancel = CancellationToken::new();
        let key = request.key;
        let job = {
            let compiler = Arc::clone(&self.compiler);
            let libraries = Arc::clone(&self.libraries);
            let published = Arc::clone(&self.published);
            let cancel = cancel.clone();
            move || run_compute(&*compiler, &libraries, &published, &request, reuse, &cancel)
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn_blocking(job)),
            Err(_) => {
                job();
                None
            }
        };
        self.in_flight = Some(InFlight {
            key,
            cancel,
            handle,
        });
        kind
    }

    /// Waits for the running compute, if any, and returns the current snapshot.
    pub async fn settle(&mut self) -> Option<Arc<AnalysisSnapshot>> {
        if let Some(in_flight) = self.in_flight.take()
            && let Some(handle) = in_flight.handle
            && let Err(e) = handle.await
        {
            tracing::warn!("analysis worker for {} failed: {}", in_flight.key, e);
        }
        self.current()
    }

    /// Cancels the running compute so it can never publish.
    ///
    /// The flag is raised while holding the publish lock, which is where a
    /// compute makes its final cancellation check.
    fn cancel_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            self.published.send_if_modified(|_| {
                in_flight.cancel.cancel();
                false
            });
            tracing::debug!("analysis {} cancelled", in_flight.key);
        }
    }
}

impl Drop for CompilationCache {
    fn drop(&mut self) {
        if let Some(in_flight) = &self.in_flight {
            in_flight.cancel.cancel();
        }
    }
}

fn run_compute(
    compiler: &dyn Compiler,
    libraries: &LibraryCache,
    published: &watch::Sender<Option<Arc<AnalysisSnapshot>>>,
    request: &AnalysisRequest,
    reuse: Option<Arc<SyntaxTree>>,
    cancel: &CancellationToken,
) {
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        compute(compiler, libraries, request, reuse, cancel)
    }))
    .unwrap_or_else(|panic| Err(CompileError::Fault(panic_message(&*panic))));

    match outcome {
        Ok(snapshot) => {
            let key = snapshot.key();
            let snapshot = Arc::new(snapshot);
            let published_now = published.send_if_modified(|slot| {
                if cancel.is_cancelled() {
                    return false;
                }
                if slot.as_ref().is_some_and(|current| current.key() >= key) {
                    return false;
                }
                *slot = Some(snapshot);
                true
            });
            if published_now {
                tracing::debug!("analysis {} published", key);
            } else {
                tracing::debug!("analysis {} discarded", key);
            }
        }
        Err(CompileError::Cancelled) => {
            tracing::debug!("analysis {} cancelled before completion", request.key);
        }
        Err(CompileError::Fault(message)) => {
            tracing::warn!("analysis {} faulted: {}", request.key, message);
        }
    }
}

fn compute(
    compiler: &dyn Compiler,
    libraries: &LibraryCache,
    request: &AnalysisRequest,
    reuse: Option<Arc<SyntaxTree>>,
    cancel: &CancellationToken,
) -> std::result::Result<AnalysisSnapshot, CompileError> {
    let syntax = match reuse {
        Some(syntax) => syntax,
        None => Arc::new(compiler.parse(Arc::clone(&request.text))),
    };
    cancel.check()?;

    let (visible, reference_diagnostics) = resolve_libraries(libraries, request);
    cancel.check()?;

    let bound = compiler.bind(&syntax, &visible);
    cancel.check()?;

    Ok(AnalysisSnapshot::assemble(
        request.key,
        syntax,
        bound,
        reference_diagnostics,
    ))
}

/// Loads every referenced library; failures become location-less errors.
fn resolve_libraries(
    libraries: &LibraryCache,
    request: &AnalysisRequest,
) -> (Vec<Arc<Library>>, Vec<Diagnostic>) {
    let mut visible = Vec::with_capacity(request.references.len() + 1);
    let mut diagnostics = Vec::new();

    if request.options.include_prelude {
        visible.push(library::prelude());
    }

    for reference in &request.references {
        let resolved = library::absolute_library_path(&reference.path, request.base_dir.as_deref())
            .and_then(|path| libraries.resolve(&path));
        match resolved {
            Ok(library) => visible.push(library),
            Err(e) => {
                tracing::warn!("reference {} unresolved: {}", reference.display_name, e);
                diagnostics.push(Diagnostic::new(
                    codes::UNRESOLVED_REFERENCE,
                    DiagnosticSeverity::Error,
                    format!(
                        "Library '{}' could not be loaded: {}",
                        reference.path.display(),
                        e
                    ),
                    None,
                ));
            }
        }
    }

    (visible, diagnostics)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "compiler panicked".to_string()
    }
}

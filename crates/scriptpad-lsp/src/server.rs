use crate::config::ScriptpadConfig;
use crate::document::{ServerState, handle_document_change, handle_document_open};
use crate::handlers::{completion, diagnostics, formatting};
use futures::future::join_all;
use scriptpad_core::AnalysisOptions;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp_server::ls_types::{
    CompletionOptions, CompletionParams, CompletionResponse, DiagnosticOptions,
    DiagnosticServerCapabilities, DidChangeConfigurationParams, DidChangeTextDocumentParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DocumentDiagnosticParams,
    DocumentDiagnosticReport, DocumentDiagnosticReportResult, DocumentFormattingParams,
    ExecuteCommandOptions, ExecuteCommandParams, FullDocumentDiagnosticReport, InitializeParams,
    InitializeResult, InitializedParams, MessageType, OneOf, RelatedFullDocumentDiagnosticReport,
    ServerCapabilities, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind, TextEdit,
    Uri,
};
use tower_lsp_server::{Client, LanguageServer, jsonrpc::Result};

/// LSP command identifiers.
mod commands {
    /// Returns the script as the execution sandbox consumes it.
    pub const MATERIALIZE: &str = "scriptpad.materialize";
    /// Returns the absolute paths of the script's references.
    pub const RESOLVED_REFERENCES: &str = "scriptpad.resolvedReferences";
}

pub struct Backend {
    pub(crate) client: Client,
    state: Arc<ServerState>,
    config: Arc<RwLock<ScriptpadConfig>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(ServerState::new()),
            config: Arc::new(RwLock::new(ScriptpadConfig::default())),
        }
    }

    /// Get a reference to the LSP client (primarily for testing).
    #[doc(hidden)]
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Kind(
                TextDocumentSyncKind::INCREMENTAL,
            )),
            completion_provider: Some(CompletionOptions {
                trigger_characters: Some(vec![".".into()]),
                resolve_provider: Some(false),
                ..Default::default()
            }),
            diagnostic_provider: Some(DiagnosticServerCapabilities::Options(DiagnosticOptions {
                identifier: Some("scriptpad".into()),
                inter_file_dependencies: false,
                workspace_diagnostics: false,
                ..Default::default()
            })),
            document_formatting_provider: Some(OneOf::Left(true)),
            execute_command_provider: Some(ExecuteCommandOptions {
                commands: vec![
                    commands::MATERIALIZE.into(),
                    commands::RESOLVED_REFERENCES.into(),
                ],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Applies new settings to every open document and republishes
    /// diagnostics.
    async fn apply_config(&self, config: ScriptpadConfig) {
        let options = AnalysisOptions::from(&config.analysis);
        let diagnostics_config = config.diagnostics.clone();
        *self.config.write().await = config;

        let uris: Vec<Uri> = self
            .state
            .documents
            .iter_mut()
            .map(|mut entry| {
                entry.workspace.set_options(options);
                entry.workspace.request_analysis();
                entry.key().clone()
            })
            .collect();

        let publishes = uris.into_iter().map(|uri| {
            let state = Arc::clone(&self.state);
            let client = self.client.clone();
            let diagnostics_config = diagnostics_config.clone();
            async move {
                let items =
                    diagnostics::handle_diagnostics(state, &uri, &diagnostics_config).await;
                client.publish_diagnostics(uri, items, None).await;
            }
        });
        join_all(publishes).await;
    }

    fn command_uri(params: &ExecuteCommandParams) -> Option<Uri> {
        let arg = params.arguments.first()?;
        match serde_json::from_value::<CommandArgs>(arg.clone()) {
            Ok(args) => Some(args.uri),
            Err(e) => {
                tracing::warn!("invalid arguments for {}: {}", params.command, e);
                None
            }
        }
    }
}

impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        tracing::info!("initializing scriptpad-lsp server");

        if let Some(init_options) = params.initialization_options
            && let Ok(config) = serde_json::from_value::<ScriptpadConfig>(init_options)
        {
            tracing::debug!("loaded configuration: {:?}", config);
            *self.config.write().await = config;
        }

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: "scriptpad-lsp".into(),
                version: Some(env!("CARGO_PKG_VERSION").into()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("scriptpad-lsp server initialized");
        self.client
            .log_message(MessageType::INFO, "scriptpad-lsp ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutting down scriptpad-lsp server");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::info!("document opened: {:?}", uri);

        let task = handle_document_open(
            uri.clone(),
            params.text_document.text,
            Arc::clone(&self.state),
            self.client.clone(),
            Arc::clone(&self.config),
        )
        .await;
        self.state.spawn_background_task(uri, task).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Err(e) = handle_document_change(&uri, params.content_changes, &self.state) {
            tracing::error!("failed to process document change {:?}: {}", uri, e);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::info!("document closed: {:?}", uri);

        self.state.cancel_background_task(&uri).await;
        self.state.remove_document(&uri);
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let Some(config) = ScriptpadConfig::from_settings(params.settings) else {
            return;
        };
        tracing::info!("configuration changed: {:?}", config);
        self.apply_config(config).await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let completion_config = { self.config.read().await.completion.clone() };
        Ok(completion::handle_completion(Arc::clone(&self.state), params, &completion_config).await)
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        tracing::debug!("formatting request for: {:?}", params.text_document.uri);
        Ok(formatting::handle_formatting(Arc::clone(&self.state), params))
    }

    async fn diagnostic(
        &self,
        params: DocumentDiagnosticParams,
    ) -> Result<DocumentDiagnosticReportResult> {
        let uri = params.text_document.uri;
        tracing::debug!("diagnostic request for: {:?}", uri);

        // Clone config before async call to release lock early
        let diagnostics_config = { self.config.read().await.diagnostics.clone() };

        let items =
            diagnostics::handle_diagnostics(Arc::clone(&self.state), &uri, &diagnostics_config)
                .await;

        Ok(DocumentDiagnosticReportResult::Report(
            DocumentDiagnosticReport::Full(RelatedFullDocumentDiagnosticReport {
                related_documents: None,
                full_document_diagnostic_report: FullDocumentDiagnosticReport {
                    result_id: None,
                    items,
                },
            }),
        ))
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> Result<Option<serde_json::Value>> {
        tracing::info!("execute_command: {:?}", params.command);

        let Some(uri) = Self::command_uri(&params) else {
            return Ok(None);
        };
        let Some(doc) = self.state.get_document(&uri) else {
            tracing::warn!("{}: document not open: {:?}", params.command, uri);
            return Ok(None);
        };

        match params.command.as_str() {
            commands::MATERIALIZE => Ok(Some(serde_json::Value::String(doc.workspace.to_code()))),
            commands::RESOLVED_REFERENCES => match doc.workspace.resolved_reference_paths() {
                Ok(paths) => Ok(Some(serde_json::json!(paths))),
                Err(e) => {
                    tracing::warn!("failed to resolve references: {}", e);
                    Ok(None)
                }
            },
            other => {
                tracing::warn!("unknown command: {}", other);
                Ok(None)
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct CommandArgs {
    uri: Uri,
}

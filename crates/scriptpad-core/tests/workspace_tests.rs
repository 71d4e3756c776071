//! End-to-end behavior of a script workspace: editing, references,
//! background analysis, completion, diagnostics and persistence.

use scriptpad_core::{
    AddOutcome, DocumentId, Reference, RemoveOutcome, ScriptFile, ScriptHost, ScriptWorkspace,
    Severity, WorkspaceState,
};
use std::sync::Arc;
use tempfile::TempDir;

const GEOMETRY: &str = r#"{
    "name": "geometry",
    "symbols": [
        { "name": "Geometry", "kind": "namespace", "members": [
            { "name": "Circle", "kind": "class", "members": [
                { "name": "Area", "kind": "method" },
                { "name": "Radius", "kind": "property" }
            ] },
            { "name": "Pi", "kind": "constant" }
        ] }
    ]
}"#;

fn untitled(body: &str) -> ScriptWorkspace {
    ScriptWorkspace::new(
        DocumentId::new(1),
        "script1",
        ScriptFile {
            references: Vec::new(),
            body: body.to_string(),
        },
        None,
    )
}

async fn write_geometry(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("geometry.json");
    tokio::fs::write(&path, GEOMETRY).await.unwrap();
    path
}

fn names(result: &scriptpad_core::CompletionResult) -> Vec<&str> {
    result
        .candidates
        .iter()
        .map(|c| c.display_text.as_str())
        .collect()
}

#[test]
fn test_version_counts_successful_replacements() {
    let mut ws = untitled("");
    let edits = ["let a", " = 1", ";\n", "print(a);"];
    for edit in edits {
        let end = ws.text().len();
        ws.replace(end, 0, edit).unwrap();
    }
    assert!(ws.replace(1000, 1, "x").is_err());
    assert_eq!(ws.version(), edits.len() as u64);
    assert_eq!(ws.text(), "let a = 1;\nprint(a);");
}

#[test]
fn test_double_add_and_double_remove() {
    let mut ws = untitled("");
    let reference = Reference::from_path("libs/geometry.json");

    assert_eq!(ws.add_reference(reference.clone()), AddOutcome::Added);
    assert_eq!(ws.add_reference(reference.clone()), AddOutcome::AlreadyPresent);
    assert_eq!(ws.references().len(), 1);

    assert_eq!(ws.remove_reference(&reference), RemoveOutcome::Removed);
    let version = ws.reference_version();
    assert_eq!(ws.remove_reference(&reference), RemoveOutcome::NotFound);
    assert!(ws.references().is_empty());
    assert_eq!(ws.reference_version(), version);
}

#[tokio::test]
async fn test_completion_reflects_rename() {
    let mut ws = untitled("let counter = 0;\nc");
    ws.settle().await;
    let result = ws.complete(ws.text().len()).unwrap();
    assert!(names(&result).contains(&"counter"));

    ws.replace(4, 7, "cursor").unwrap();
    ws.settle().await;
    assert_eq!(ws.state(), WorkspaceState::Clean);

    let result = ws.complete(ws.text().len()).unwrap();
    let found = names(&result);
    assert!(found.contains(&"cursor"));
    assert!(!found.contains(&"counter"));
    assert_eq!(result.prefix, "c");
}

#[tokio::test]
async fn test_single_unresolved_identifier() {
    let mut ws = untitled("print(missing);\n");
    ws.settle().await;

    let diagnostics = ws.diagnostics();
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, "SP0103");
    assert_eq!((errors[0].start_line, errors[0].start_column), (0, 6));
    assert_eq!((errors[0].end_line, errors[0].end_column), (0, 13));
}

#[tokio::test]
async fn test_deeply_nested_scripts_report_syntax_errors() {
    let bodies = [
        format!("{}{}", "{".repeat(10_000), "}".repeat(10_000)),
        format!("let x = 1{};", "+1".repeat(10_000)),
        format!("let x = {}1;", "-".repeat(200_000)),
        format!("let x = {}1{};", "(".repeat(10_000), ")".repeat(10_000)),
        format!("let x = a{};", ".b".repeat(10_000)),
    ];
    for body in bodies {
        let mut ws = untitled(&body);
        let snapshot = ws.settle().await.unwrap();
        assert_eq!(snapshot.key(), ws.key());
        assert!(ws.diagnostics().iter().any(|d| d.code == "SP0001"));

        // The workspace keeps working after the rejected text.
        let len = ws.text().len();
        ws.replace(0, len, "let y = 1;\nprint(y);").unwrap();
        ws.settle().await;
        assert!(ws.diagnostics().is_empty());
    }
}

#[tokio::test]
async fn test_out_of_range_line_directive() {
    let mut ws = untitled("#line 4294967295\na;\nb;\nnope;\n");
    ws.settle().await;
    let diagnostics = ws.diagnostics();
    assert!(diagnostics.iter().any(|d| d.code == "SP1002"));
    assert!(
        diagnostics
            .iter()
            .any(|d| d.code == "SP0103" && d.start_line == 3)
    );
}

#[tokio::test]
async fn test_latest_edit_wins() {
    let mut ws = untitled("let a = 1;");
    ws.replace(8, 1, "2").unwrap();
    ws.request_analysis();
    let after_b = ws.replace(8, 1, "3").unwrap();
    ws.request_analysis();

    let snapshot = ws.settle().await.unwrap();
    assert_eq!(snapshot.source_version(), after_b);
    assert_eq!(snapshot.text(), "let a = 3;");
}

#[tokio::test]
async fn test_subscribers_see_increasing_keys() {
    let mut ws = untitled("let a = 1;");
    let mut rx = ws.subscribe();

    ws.settle().await;
    rx.changed().await.unwrap();
    let first = rx.borrow_and_update().as_ref().map(|s| s.key()).unwrap();

    ws.replace(0, 0, "// note\n").unwrap();
    ws.settle().await;
    rx.changed().await.unwrap();
    let second = rx.borrow_and_update().as_ref().map(|s| s.key()).unwrap();

    assert!(second > first);
}

#[tokio::test]
async fn test_library_reference_completion_and_rebind() {
    let dir = TempDir::new().unwrap();
    let library = write_geometry(&dir).await;

    let mut ws = untitled("let c: Geometry.Circle;\nc.");
    let before = ws.settle().await.unwrap();
    assert!(ws.diagnostics().iter().any(|d| d.code == "SP0103"));

    ws.add_reference(Reference::from_path(&library));
    let after = ws.settle().await.unwrap();
    assert_eq!(after.source_version(), before.source_version());
    assert!(Arc::ptr_eq(&before.shared_syntax(), &after.shared_syntax()));

    let result = ws.complete(ws.text().len()).unwrap();
    assert_eq!(names(&result), vec!["Area", "Radius"]);
    assert_eq!(
        result.receiver.as_deref(),
        Some(&["c".to_string()][..])
    );
}

#[tokio::test]
async fn test_unresolvable_reference_is_a_diagnostic() {
    let dir = TempDir::new().unwrap();
    let mut ws = untitled("print(1);");
    ws.add_reference(Reference::from_path(dir.path().join("absent.json")));
    ws.settle().await;

    let diagnostics = ws.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, "SP0006");
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert_eq!(ws.references().len(), 1);
}

#[tokio::test]
async fn test_save_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("demo.spx");
    let body = "let area = 1;\r\n\n// trailing\nprint(area);";

    let mut host = ScriptHost::new();
    let id = host.create_untitled(body);
    {
        let ws = host.get_mut(id).unwrap();
        ws.add_reference(Reference::from_path("libs/geometry.json"));
        ws.add_reference(Reference::from_path("/shared/text.json"));
        ws.save_as(&path).await.unwrap();
        assert_eq!(ws.name(), "demo.spx");
    }

    let reopened = host.open(&path).await.unwrap();
    let ws = host.get(reopened).unwrap();
    assert_eq!(ws.text(), body);
    let paths: Vec<_> = ws
        .references()
        .iter()
        .map(|r| r.path.to_string_lossy().into_owned())
        .collect();
    assert_eq!(paths, vec!["libs/geometry.json", "/shared/text.json"]);
}

#[tokio::test]
async fn test_line_directive_remaps_diagnostics() {
    let mut ws = untitled("#line 40\nprint(missing);\n#line default\nprint(other);\n");
    ws.settle().await;

    let lines: Vec<_> = ws
        .diagnostics()
        .iter()
        .filter(|d| d.code == "SP0103")
        .map(|d| d.start_line)
        .collect();
    assert_eq!(lines, vec![39, 3]);
}

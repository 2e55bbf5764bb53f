
use serde_json::json;
use test_support::{request_err_code, request_ok, select_workspace, spawn_sidecar, temp_dir};

#[test]
fn health_works_before_and_after_workspace_select() {
    let workspace = temp_dir("gradebook-smoke");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let before = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(before.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    select_workspace(&mut stdin, &mut reader, &workspace);
    let after = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert_eq!(
        after.get("workspacePath").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );
}

#[test]
fn unknown_method_is_not_implemented() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let code = request_err_code(&mut stdin, &mut reader, "1", "does.not.exist", json!({}));
    assert_eq!(code, "not_implemented");
}

#[test]
fn store_methods_require_a_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    for (i, method) in [
        "classes.list",
        "students.create",
        "analytics.classStatistics",
        "reports.scoreTable",
    ]
    .iter()
    .enumerate()
    {
        let code = request_err_code(
            &mut stdin,
            &mut reader,
            &format!("{}", i),
            method,
            json!({}),
        );
        assert_eq!(code, "no_workspace", "{} should need a workspace", method);
    }
}

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn infragen(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_infragen"))
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("INFRAGEN_TEMPLATES")
        .env_remove("INFRAGEN_LLM_PROVIDER")
        .env("INFRAGEN_LOG", "warn")
        .output()
        .expect("run CLI")
}

#[test]
fn help_lists_core_flags() {
    let output = infragen(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--query", "--templates", "--output", "--dry-run", "--llm-provider"] {
        assert!(stdout.contains(flag), "missing {flag} in help:\n{stdout}");
    }
}

#[test]
fn missing_template_dir_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope");
    let output = infragen(&[
        "--templates",
        missing.to_str().unwrap(),
        "--query",
        "Create a storage account",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Template directory not found"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn missing_api_key_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        tmp.path().join("storage.tf"),
        "resource \"azurerm_storage_account\" \"s\" {}",
    )
    .unwrap();
    let output = infragen(&[
        "--templates",
        tmp.path().to_str().unwrap(),
        "--query",
        "Create a storage account",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Missing OPENAI_API_KEY environment variable"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn anthropic_backend_requires_its_key() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        tmp.path().join("vnet.tf"),
        "resource \"azurerm_virtual_network\" \"n\" {}",
    )
    .unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_infragen"))
        .args([
            "--templates",
            tmp.path().to_str().unwrap(),
            "--llm-provider",
            "anthropic",
            "-q",
            "vnet",
        ])
        .env("OPENAI_API_KEY", "sk-test")
        .env_remove("ANTHROPIC_API_KEY")
        .env("INFRAGEN_LOG", "warn")
        .output()
        .expect("run CLI");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ANTHROPIC_API_KEY"));
}

fn chat_answer(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": text } }]
    }))
}

/// Serves embeddings, validation and classification; synthesis answers with `synthesis`.
async fn stub_providers(verdict: &str, synthesis: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.6, 0.8] }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("query validator"))
        .respond_with(chat_answer(verdict))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("comma-separated list of resource types"))
        .respond_with(chat_answer("storage"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("You are a Terraform expert"))
        .respond_with(synthesis)
        .mount(&server)
        .await;
    server
}

async fn run_against(server: &MockServer, templates: &Path, output: &Path, query: &str) -> Output {
    let base_url = format!("{}/v1", server.uri());
    let templates = templates.to_path_buf();
    let output = output.to_path_buf();
    let query = query.to_string();
    tokio::task::spawn_blocking(move || {
        Command::new(env!("CARGO_BIN_EXE_infragen"))
            .arg("--templates")
            .arg(&templates)
            .arg("--output")
            .arg(&output)
            .args(["--query", &query])
            .args(["--openai-base-url", &base_url])
            .args(["--max-retries", "1", "--timeout-secs", "5"])
            .env("OPENAI_API_KEY", "sk-test")
            .env_remove("INFRAGEN_LLM_PROVIDER")
            .env("INFRAGEN_LOG", "warn")
            .output()
            .expect("run CLI")
    })
    .await
    .expect("join CLI runner")
}

fn storage_workspace() -> (tempfile::TempDir, std::path::PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let templates = tmp.path().join("templates");
    fs::create_dir(&templates).unwrap();
    fs::write(
        templates.join("storage.tf"),
        "resource \"azurerm_storage_account\" \"s\" {}",
    )
    .unwrap();
    let output = tmp.path().join("main.tf");
    fs::write(&output, "old").unwrap();
    (tmp, output)
}

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_shot_generation_writes_output() {
    if !can_bind_localhost() {
        println!("Skipping test due to sandbox network bind restrictions.");
        return;
    }
    let server = stub_providers(
        "valid: true\nreason: storage request",
        chat_answer("resource \"azurerm_storage_account\" \"generated\" {}"),
    )
    .await;
    let (tmp, output_file) = storage_workspace();

    let output = run_against(
        &server,
        &tmp.path().join("templates"),
        &output_file,
        "create a storage account",
    )
    .await;
    assert!(
        output.status.success(),
        "cli exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        fs::read_to_string(&output_file).unwrap(),
        "resource \"azurerm_storage_account\" \"generated\" {}"
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("terraform init"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_shot_generation_failure_exits_non_zero() {
    if !can_bind_localhost() {
        println!("Skipping test due to sandbox network bind restrictions.");
        return;
    }
    let server = stub_providers(
        "valid: true\nreason: storage request",
        ResponseTemplate::new(400).set_body_string("bad request"),
    )
    .await;
    let (tmp, output_file) = storage_workspace();

    let output = run_against(
        &server,
        &tmp.path().join("templates"),
        &output_file,
        "create a storage account",
    )
    .await;
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(fs::read_to_string(&output_file).unwrap(), "old");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error generating Terraform configuration: "));
    assert!(stderr.contains("400 Bad Request"), "unexpected stderr: {stderr}");
    assert!(!stderr.contains("Failed to generate Terraform configuration"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_shot_rejection_exits_with_distinct_code() {
    if !can_bind_localhost() {
        println!("Skipping test due to sandbox network bind restrictions.");
        return;
    }
    let server = stub_providers(
        "valid: false\nreason: Not about Azure",
        chat_answer("unused"),
    )
    .await;
    let (tmp, output_file) = storage_workspace();

    let output = run_against(
        &server,
        &tmp.path().join("templates"),
        &output_file,
        "How do I cook pasta?",
    )
    .await;
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(fs::read_to_string(&output_file).unwrap(), "old");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Query is out of scope: Not about Azure"));
    assert!(stdout.contains("- Storage Accounts"));

    let empty = run_against(&server, &tmp.path().join("templates"), &output_file, "   ").await;
    assert_eq!(empty.status.code(), Some(2));
}

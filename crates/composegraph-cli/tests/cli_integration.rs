//! CLI subprocess integration tests.
//!
//! These tests invoke the `composegraph` binary against a `file:` store in a
//! scratch directory and verify exit codes, stdout content, and JSON output.

use std::path::PathBuf;
use std::process::{Command, Output};

fn composegraph_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_composegraph"));
    cmd.env_remove("COMPOSEGRAPH_PASSWORD");
    cmd.env_remove("COMPOSEGRAPH_LOG");
    cmd
}

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("stacks")).unwrap();
        Self { dir }
    }

    fn endpoint(&self) -> String {
        format!("file:{}", self.dir.path().join("graph.json").display())
    }

    fn stacks(&self) -> PathBuf {
        self.dir.path().join("stacks")
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.stacks().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        composegraph_bin()
            .current_dir(self.dir.path())
            .arg("--endpoint")
            .arg(self.endpoint())
            .args(args)
            .output()
            .unwrap()
    }

    fn compile(&self) -> Output {
        let stacks = self.stacks();
        self.run(&["compile", &stacks.to_string_lossy()])
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let mut full = vec!["--json"];
        full.extend_from_slice(args);
        let output = self.run(&full);
        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(&stdout)
            .unwrap_or_else(|e| panic!("{args:?} --json must produce valid JSON: {e}\n{stdout}"))
    }
}

const STACK: &str = r#"
services:
  web:
    image: nginx:1.25
    ports: ["8080:80"]
    depends_on: [api]
    networks: [front]
  api:
    image: app/api:2
    ports: ["8080:8000"]
    environment:
      LOG_LEVEL: info
    networks: [front, back]
"#;

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn cli_version_exits_zero() {
    let output = composegraph_bin().arg("--version").output().unwrap();
    assert!(output.status.success(), "composegraph --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("composegraph"), "{stdout}");
}

#[test]
fn cli_help_lists_commands() {
    let output = composegraph_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["compile", "services", "conflicts", "deps", "network", "op"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}'");
    }
}

#[test]
fn cli_compile_then_query() {
    let ws = Workspace::new();
    ws.write("app.yml", STACK);

    let output = ws.compile();
    assert!(output.status.success(), "compile must exit 0: {}", stderr(&output));

    let services = ws.json(&["services"]);
    let names: Vec<&str> = services
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["api", "web"]);

    let conflicts = ws.json(&["conflicts"]);
    assert_eq!(conflicts[0]["host_port"], 8080);
    assert_eq!(conflicts[0]["services"].as_array().unwrap().len(), 2);

    let deps = ws.json(&["deps", "api"]);
    assert_eq!(deps[0]["required_by"][0]["name"], "web");

    let members = ws.json(&["network", "back"]);
    assert_eq!(members.as_array().unwrap().len(), 1);

    let details = ws.json(&["inspect", "api", "--file", "app.yml"]);
    assert_eq!(details[0]["environment"][0]["key"], "LOG_LEVEL");
}

#[test]
fn cli_compile_json_report() {
    let ws = Workspace::new();
    ws.write("app.yml", STACK);
    let stacks = ws.stacks();
    let report = ws.json(&["compile", &stacks.to_string_lossy()]);
    assert_eq!(report["aborted"], false);
    assert_eq!(report["manifests"][0]["outcome"], "compiled");
    assert_eq!(report["manifests"][0]["units"].as_array().unwrap().len(), 3);
}

#[test]
fn cli_recompile_is_idempotent() {
    let ws = Workspace::new();
    ws.write("app.yml", STACK);
    assert!(ws.compile().status.success());
    let first = std::fs::read_to_string(ws.dir.path().join("graph.json")).unwrap();
    assert!(ws.compile().status.success());
    let second = std::fs::read_to_string(ws.dir.path().join("graph.json")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn cli_malformed_manifest_is_partial() {
    let ws = Workspace::new();
    ws.write("a-broken.yml", "services: [unclosed");
    ws.write("b-good.yml", "services:\n  ok: {}\n");
    let output = ws.compile();
    assert_eq!(output.status.code(), Some(4), "partial compile must exit 4");
    let services = ws.json(&["services"]);
    assert_eq!(services[0]["name"], "ok");
}

#[test]
fn cli_missing_manifest_dir_exits_2() {
    let ws = Workspace::new();
    let output = ws.run(&["compile", "does-not-exist"]);
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));
}

#[test]
fn cli_bolt_endpoint_exits_3() {
    let output = composegraph_bin()
        .args(["--endpoint", "bolt://localhost:7687", "services"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("unsupported store endpoint"));
}

#[test]
fn cli_unreachable_store_exits_3() {
    let ws = Workspace::new();
    ws.write("app.yml", STACK);
    let stacks = ws.stacks();
    let output = composegraph_bin()
        .args([
            "--endpoint",
            "http://127.0.0.1:1",
            "compile",
            &stacks.to_string_lossy(),
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn cli_config_file_sets_store_and_manifests() {
    let ws = Workspace::new();
    ws.write("app.yml", STACK);
    let graph = ws.dir.path().join("configured.json");
    let config = ws.dir.path().join("cg.toml");
    std::fs::write(
        &config,
        format!(
            "[store]\nendpoint = \"file:{}\"\n\n[manifests]\ndir = \"{}\"\n",
            graph.display(),
            ws.stacks().display()
        ),
    )
    .unwrap();

    let output = composegraph_bin()
        .arg("--config")
        .arg(&config)
        .arg("compile")
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(graph.exists());
}

#[test]
fn cli_invalid_config_exits_2() {
    let ws = Workspace::new();
    let config = ws.dir.path().join("bad.toml");
    std::fs::write(&config, "[store]\nhostname = \"x\"\n").unwrap();
    let output = composegraph_bin()
        .arg("--config")
        .arg(&config)
        .arg("services")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_op_prints_catalog_response() {
    let ws = Workspace::new();
    ws.write("app.yml", STACK);
    assert!(ws.compile().status.success());

    let output = ws.run(&[
        "op",
        "inspect_network_members",
        "--params",
        r#"{"network": "front"}"#,
    ]);
    assert!(output.status.success());
    let resp: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(resp["version"], 1);
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["result"].as_array().unwrap().len(), 2);

    let output = ws.run(&["op", "drop_everything"]);
    assert_eq!(output.status.code(), Some(1));
    let resp: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(resp["ok"], false);
}

#[test]
fn cli_operations_listing() {
    let output = composegraph_bin()
        .args(["--json", "operations"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listing["operations"].as_array().unwrap().len(), 5);
}

#[test]
fn cli_unknown_names_print_empty_results() {
    let ws = Workspace::new();
    assert_eq!(ws.json(&["network", "ghost"]), serde_json::json!([]));
    let output = ws.run(&["deps", "ghost"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("no service named 'ghost'"));
}

#[test]
fn cli_completions_bash() {
    let output = composegraph_bin()
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("composegraph"));
}


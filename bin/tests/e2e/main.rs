//! IMDS E2E 测试
//!
//! 通过真实二进制覆盖 ask / extract / match 三个命令与错误退出码

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

const KNOWLEDGE: &str = r#"{
    "process_templates": [
        {"template_id": "P012", "feature_id": "F03", "feature_name": "圆柱凸台",
         "surface_type": "plane", "process_stage": "精加工", "process_type": "侧壁精铣"},
        {"template_id": "P011", "feature_id": "F03", "feature_name": "圆柱凸台",
         "feature_surface": "plane", "process_stage": "精加工", "process_type": "底壁铣"},
        {"template_id": "P002", "feature_id": "F01", "feature_name": "圆柱通孔",
         "surface_type": "plane", "process_stage": "半精加工", "process_type": "扩孔"}
    ],
    "tools": [
        {"tool_id": "T001", "tool_name": "平底刀D12短", "diameter": 12.0, "extension_length": 6.0},
        {"tool_id": "T002", "tool_name": "平底刀D12", "diameter": 12.0, "extension_length": 30.0},
        {"tool_id": "T003", "tool_name": "平底刀D12中", "diameter": 12.0, "extension_length": 20.0},
        {"tool_id": "T004", "tool_name": "平底刀D10", "diameter": 10.0, "extension_length": 25.0},
        {"tool_id": "T005", "tool_name": "平底刀D16", "diameter": 16.0, "extension_length": 50.0}
    ]
}"#;

// ============== 基础设施 ==============

struct CliResult {
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// IMDS CLI 调用封装
struct ImdsCli {
    workdir: TempDir,
    snapshot: Option<PathBuf>,
}

impl ImdsCli {
    fn new() -> Self {
        Self {
            workdir: TempDir::new().unwrap(),
            snapshot: None,
        }
    }

    fn with_knowledge(mut self, json: &str) -> Self {
        let path = self.workdir.path().join("knowledge.json");
        std::fs::write(&path, json).unwrap();
        self.snapshot = Some(path);
        self
    }

    /// Write `imds.yaml` into the working directory
    fn with_config(self, yaml: &str) -> Self {
        std::fs::write(self.workdir.path().join("imds.yaml"), yaml).unwrap();
        self
    }

    fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    fn run(&self, args: &[&str]) -> CliResult {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_imds"));
        cmd.current_dir(self.workdir()).arg("--no-llm");
        if let Some(snapshot) = &self.snapshot {
            cmd.arg("--snapshot").arg(snapshot);
        }
        for var in ["IMDS_NEO4J_URI", "IMDS_LLM_API_KEY", "RUST_LOG"] {
            cmd.env_remove(var);
        }

        let output = cmd
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .unwrap();

        CliResult {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    fn run_json(&self, args: &[&str]) -> serde_json::Value {
        let mut full = vec!["--output", "json"];
        full.extend_from_slice(args);
        let result = self.run(&full);
        assert_eq!(result.exit_code, Some(0), "stderr: {}", result.stderr);
        serde_json::from_str(&result.stdout).unwrap()
    }
}

fn ids(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item[key].as_str().unwrap().to_string())
        .collect()
}

// ============== ask ==============

#[test]
fn test_ask_boss_finish() {
    let cli = ImdsCli::new().with_knowledge(KNOWLEDGE);
    let answer = cli.run_json(&["ask", "圆柱凸台精加工，直径12mm，高度6mm"]);

    assert_eq!(
        answer["answer"],
        "推荐模板ID：P011  推荐加工工艺：底壁铣  推荐刀具ID：T003"
    );
    let recommendation = &answer["recommendation"];
    assert_eq!(
        ids(&recommendation["process_templates"], "template_id"),
        vec!["P011", "P012"]
    );
    assert_eq!(
        ids(&recommendation["suitable_tools"], "tool_id"),
        vec!["T003", "T002", "T004"]
    );
    assert!(answer.get("error").is_none());
    assert!(answer["knowledge_context"]
        .as_str()
        .unwrap()
        .contains("- 圆柱凸台 (ID: F03)"));
}

#[test]
fn test_ask_pretty_output() {
    let cli = ImdsCli::new().with_knowledge(KNOWLEDGE);
    let result = cli.run(&["ask", "圆柱凸台精加工，直径12mm，高度6mm"]);
    assert_eq!(result.exit_code, Some(0));
    assert!(result.stdout.contains("推荐模板ID：P011"));
}

#[test]
fn test_ask_without_feature_has_no_template() {
    let cli = ImdsCli::new().with_knowledge(KNOWLEDGE);
    let answer = cli.run_json(&["ask", "直径10mm，高度20mm用什么刀？"]);
    let summary = answer["answer"].as_str().unwrap();
    assert!(summary.starts_with("推荐模板ID：无  推荐加工工艺：无"));
    assert!(summary.ends_with("推荐刀具ID：T004"));
}

// ============== extract / match ==============

#[test]
fn test_extract_needs_no_snapshot() {
    let cli = ImdsCli::new();
    let report = cli.run_json(&["extract", "圆形通孔半精加工，直径8mm"]);
    assert_eq!(report["rule"]["feature_name"], "圆柱通孔");
    assert_eq!(report["merged"]["process_stage"], "半精加工");
    assert_eq!(report["merged"]["surface_type"], "plane");
}

#[test]
fn test_match_explicit_parameters() {
    let cli = ImdsCli::new().with_knowledge(KNOWLEDGE);
    let result = cli.run_json(&[
        "match", "--feature", "圆台", "--stage", "精加工", "--diameter", "12", "--height", "6",
    ]);
    assert_eq!(
        result["recommendation"]["summary"],
        "推荐模板ID：P011  推荐加工工艺：底壁铣  推荐刀具ID：T003"
    );
}

// ============== 错误处理 ==============

#[test]
fn test_missing_snapshot_fails_startup() {
    let cli = ImdsCli::new();
    let result = cli.run(&["ask", "圆柱凸台精加工"]);
    assert_eq!(result.exit_code, Some(1));
    assert!(result.stderr.contains("Error"));
}

#[test]
fn test_unreadable_snapshot_fails_startup() {
    let cli = ImdsCli::new().with_knowledge("{ not json");
    let result = cli.run(&["ask", "圆柱凸台精加工"]);
    assert_eq!(result.exit_code, Some(1));
}

/// Neo4j backend on a closed port
const UNREACHABLE_NEO4J: &str = "store:\n  backend: neo4j\n  neo4j:\n    uri: bolt://127.0.0.1:1\n";

#[test]
fn test_ask_unreachable_store_answers_with_error() {
    let cli = ImdsCli::new().with_config(UNREACHABLE_NEO4J);
    let result = cli.run(&["--output", "json", "ask", "圆柱凸台精加工，直径12mm，高度6mm"]);
    assert_eq!(result.exit_code, Some(2), "stderr: {}", result.stderr);

    let answer: serde_json::Value = serde_json::from_str(&result.stdout).unwrap();
    assert!(answer["error"].as_str().unwrap().contains("unreachable"));
    assert!(answer["answer"].as_str().unwrap().starts_with("处理问题时发生错误: "));
    assert!(answer["recommendation"].is_null());
    // extraction is still reported
    assert_eq!(answer["parameters"]["feature_name"], "圆柱凸台");
}

#[test]
fn test_match_unreachable_store_answers_with_error() {
    let cli = ImdsCli::new().with_config(UNREACHABLE_NEO4J);
    let result = cli.run(&["--output", "json", "match", "--feature", "圆台", "--diameter", "12"]);
    assert_eq!(result.exit_code, Some(2), "stderr: {}", result.stderr);

    let view: serde_json::Value = serde_json::from_str(&result.stdout).unwrap();
    assert!(view["error"].as_str().unwrap().contains("unreachable"));
    assert!(view["recommendation"].is_null());
    assert_eq!(view["parameters"]["feature_name"], "圆柱凸台");
}

#[test]
fn test_unknown_stage_is_usage_error() {
    let cli = ImdsCli::new().with_knowledge(KNOWLEDGE);
    let result = cli.run(&["match", "--stage", "抛光"]);
    assert_eq!(result.exit_code, Some(2));
    assert!(result.stdout.is_empty());
}

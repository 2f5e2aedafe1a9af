//! Nets loaded from JSON files and the `hipops-cli` binary

mod common;

use std::process::Command;
use std::sync::Arc;

use common::tempfile_helpers::{write_net_file, write_raw_json};
use common::{serial, REGISTRY};
use hipops::ops::{DeviceKind, TensorFill};
use hipops::{Net, NetDef, OperatorDef, OpsError, Workspace};

fn square_and_sign() -> NetDef {
    NetDef {
        name: "square_and_sign".to_string(),
        inputs: vec![TensorFill {
            name: "X".to_string(),
            dims: vec![2, 2],
            dtype: "FLOAT".to_string(),
            values: vec![1.0, -1.0, 2.0, 0.0],
        }],
        ops: vec![
            OperatorDef::new("Sqr", &["X"], &["X2"]),
            OperatorDef::new("Cast", &["X2"], &["I"]).with_arg("to", "INT32"),
            OperatorDef::new("Sign", &["X"], &["S"]),
        ],
        outputs: vec!["I".to_string(), "S".to_string()],
    }
}

fn load(path: &std::path::Path) -> anyhow::Result<NetDef> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[test]
fn test_net_round_trips_through_file() {
    let def = square_and_sign();
    let file = write_net_file(&def).unwrap();
    let loaded = load(file.path()).unwrap();
    assert_eq!(loaded, def);

    let ctx = common::fresh_context();
    let mut ws = Workspace::new();
    let mut net = Net::new(&loaded, &REGISTRY, &mut ws, Arc::clone(&ctx)).unwrap();
    assert_eq!(net.len(), 3);
    net.run().unwrap();

    assert_eq!(ws.fetch_tensor("I").unwrap().to_vec::<i32>().unwrap(), vec![1, 1, 4, 0]);
    assert_eq!(
        ws.fetch_tensor("S").unwrap().to_vec::<f32>().unwrap(),
        vec![1.0, -1.0, 1.0, 0.0]
    );
    assert_eq!(ctx.stats().kernels_launched, 3);
}

#[test]
fn test_net_json_with_miopen_op() {
    let file = write_raw_json(
        r#"{
            "name": "lrn",
            "inputs": [{"name": "X", "dims": [1, 2, 1, 1], "values": [1.0, 1.0]}],
            "ops": [{
                "type": "LRN",
                "device": "MIOPEN",
                "inputs": ["X"],
                "outputs": ["Y"],
                "args": [
                    {"name": "size", "value": 1},
                    {"name": "alpha", "value": 1.0},
                    {"name": "beta", "value": 1.0},
                    {"name": "bias", "value": 1.0}
                ]
            }],
            "outputs": ["Y"]
        }"#,
    )
    .unwrap();
    let def = load(file.path()).unwrap();
    assert_eq!(def.ops[0].device, DeviceKind::Miopen);

    let mut ws = Workspace::new();
    let mut net = Net::new(&def, &REGISTRY, &mut ws, common::fresh_context()).unwrap();
    net.run().unwrap();
    // x / (1 + x^2) with a window of one channel
    assert_eq!(ws.fetch_tensor("Y").unwrap().to_vec::<f32>().unwrap(), vec![0.5, 0.5]);
}

#[test]
fn test_net_stops_at_first_failure() {
    let mut def = square_and_sign();
    def.inputs.push(TensorFill {
        name: "dY".to_string(),
        dims: vec![3],
        dtype: "FLOAT".to_string(),
        values: vec![1.0; 3],
    });
    def.ops.insert(
        1,
        OperatorDef::new("SoftplusGradient", &["X", "dY"], &["dX"]),
    );
    let mut ws = Workspace::new();
    let mut net = Net::new(&def, &REGISTRY, &mut ws, common::fresh_context()).unwrap();
    let err = net.run().unwrap_err();
    assert!(matches!(err, OpsError::ShapeMismatch(_)));

    // Operators after the failing one never ran
    assert!(matches!(
        ws.fetch_tensor("S"),
        Err(OpsError::BlobType { .. })
    ));
}

#[test]
fn test_net_construction_fails_for_unknown_op() {
    let def = NetDef {
        name: "bad".to_string(),
        inputs: vec![],
        ops: vec![OperatorDef::new("Relu", &[], &["Y"])],
        outputs: vec![],
    };
    let mut ws = Workspace::new();
    let err = Net::new(&def, &REGISTRY, &mut ws, common::fresh_context())
        .err()
        .unwrap();
    assert!(matches!(err, OpsError::OperatorNotFound { .. }));
}

#[test]
fn test_malformed_json_rejected() {
    let file = write_raw_json(r#"{"ops": [{"inputs": ["X"]}"#).unwrap();
    assert!(load(file.path()).is_err());
}

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_hipops-cli"))
}

#[test]
#[serial]
fn test_cli_run_prints_json() {
    let file = write_net_file(&square_and_sign()).unwrap();
    let output = cli()
        .args(["run", "--net"])
        .arg(file.path())
        .arg("--json")
        .env("HIPOPS_LOG_LEVEL", "error")
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["name"], "I");
    assert_eq!(reports[0]["dtype"], "INT32");
    assert_eq!(reports[0]["dims"], serde_json::json!([2, 2]));
    assert_eq!(reports[0]["values"], serde_json::json!([1.0, 1.0, 4.0, 0.0]));
}

#[test]
#[serial]
fn test_cli_list() {
    let output = cli().arg("list").env_remove("RUST_LOG").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), REGISTRY.len());
    assert!(stdout.lines().any(|l| l.starts_with("LRN ") && l.ends_with("MIOPEN")));
}

#[test]
#[serial]
fn test_cli_reports_bad_net_file() {
    let file = write_raw_json("not json").unwrap();
    let output = cli()
        .args(["run", "--net"])
        .arg(file.path())
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("parsing net file"));
}

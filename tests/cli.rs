mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::{Value, json};

use common::{TestWorkspace, fixture_path, point_collection};

fn layer_classify() -> Command {
    Command::cargo_bin("layer-classify").expect("binary exists")
}

fn stdout_json(args: &[&str]) -> Value {
    let output = layer_classify()
        .args(args)
        .output()
        .expect("run layer-classify");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn classify_single_point_builds_one_entry_legend() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "single.geojson",
        r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":{"type":"Point","coordinates":[0,0]},"properties":{"type":"A"}}]}"#,
    );
    let input = input.to_str().unwrap();

    layer_classify()
        .args(["classify", "-i", input, "-f", "type"])
        .assert()
        .success()
        .stdout(contains("A (1)"))
        .stdout(contains("100.0%"))
        .stdout(contains("#4e79a7"));

    let layers = stdout_json(&["fields", "-i", input, "--format", "json"]);
    let fields = layers[0][1]
        .as_array()
        .expect("field list")
        .iter()
        .map(|field| {
            (
                field["name"].as_str().unwrap_or_default().to_string(),
                field["type"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        fields,
        vec![
            ("OBJECTID".to_string(), "object-id".to_string()),
            ("FID".to_string(), "integer".to_string()),
            ("type".to_string(), "string".to_string()),
        ]
    );

    let summary = stdout_json(&["classify", "-i", input, "-f", "type", "--format", "json"]);
    assert_eq!(summary["stats"]["totalFeatures"], json!(1));
    assert_eq!(summary["stats"]["uniqueCount"], json!(1));
    let entries = summary["legend"]["entries"].as_array().expect("legend entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["label"], json!("A (1)"));
}

#[test]
fn classify_fixture_orders_legend_by_count() {
    let input = fixture_path("neighborhoods.geojson");
    let summary = stdout_json(&[
        "classify",
        "-i",
        input.to_str().unwrap(),
        "-f",
        "district",
        "--format",
        "json",
    ]);

    let labels = summary["legend"]["entries"]
        .as_array()
        .expect("legend entries")
        .iter()
        .map(|entry| entry["label"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["North (2)", "South (1)"]);
    assert_eq!(summary["stats"]["totalFeatures"], json!(4));
    assert_eq!(summary["stats"]["validCount"], json!(3));
    assert_eq!(summary["renderer"]["type"], json!("unique-value"));
}

#[test]
fn inspect_reports_kept_features_and_extent() {
    let input = fixture_path("neighborhoods.geojson");
    layer_classify()
        .args(["inspect", "-i", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("neighborhoods"))
        .stdout(contains("polygon"))
        .stdout(contains("0, -2, 4, 1"));
}

#[test]
fn fields_lists_generated_fields_first() {
    let input = fixture_path("neighborhoods.geojson");
    let output = layer_classify()
        .args(["fields", "-i", input.to_str().unwrap(), "--format", "csv"])
        .output()
        .expect("run fields");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8 output");
    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "layer,name,alias,type");
    assert_eq!(lines[1], "neighborhoods,OBJECTID,OBJECTID,object-id");
    assert_eq!(lines[2], "neighborhoods,FID,FID,integer");
    assert!(lines.contains(&"neighborhoods,density,density,double"));
    assert!(lines.contains(&"neighborhoods,population,population,integer"));
    assert!(lines.contains(&"neighborhoods,district,district,string"));
}

#[test]
fn stats_truncates_to_top_values() {
    let workspace = TestWorkspace::new();
    let values = (0..25).map(|i| json!(format!("v{i:02}"))).collect::<Vec<_>>();
    let input = workspace.write_json("many.geojson", &point_collection("code", &values));

    let stats = stdout_json(&[
        "stats",
        "-i",
        input.to_str().unwrap(),
        "-f",
        "code",
        "--format",
        "json",
    ]);
    assert_eq!(stats["uniqueCount"], json!(25));
    assert_eq!(stats["sortedValues"].as_array().map(Vec::len), Some(20));

    let all = stdout_json(&[
        "stats",
        "-i",
        input.to_str().unwrap(),
        "-f",
        "code",
        "--top",
        "0",
        "--format",
        "json",
    ]);
    assert_eq!(all["sortedValues"].as_array().map(Vec::len), Some(25));
}

#[test]
fn classify_honors_palette_override() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_json(
        "palette.geojson",
        &point_collection("kind", &[json!("a"), json!("b")]),
    );
    layer_classify()
        .args([
            "classify",
            "-i",
            input.to_str().unwrap(),
            "-f",
            "kind",
            "--palette",
            "set1",
        ])
        .assert()
        .success()
        .stdout(contains("#e41a1c"));
}

#[test]
fn classify_reads_yaml_config() {
    let workspace = TestWorkspace::new();
    let config = workspace.write(
        "viewer.yml",
        "top_values: 1\npalette:\n  - \"#112233\"\n  - \"#445566\"\n",
    );
    let input = workspace.write_json(
        "config.geojson",
        &point_collection("kind", &[json!("a"), json!("b"), json!("b")]),
    );
    layer_classify()
        .args([
            "classify",
            "-i",
            input.to_str().unwrap(),
            "-f",
            "kind",
            "-c",
            config.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("b (2)"))
        .stdout(contains("#112233"))
        .stdout(contains("a (1)").not());
}

#[test]
fn rejects_unsupported_extension() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("layer.kml", "<kml/>");
    layer_classify()
        .args(["inspect", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Unsupported file type"));
}

#[test]
fn rejects_file_over_configured_limit() {
    let workspace = TestWorkspace::new();
    let config = workspace.write("viewer.json", r#"{"max_upload_bytes": 16}"#);
    let input = workspace.write_json(
        "big.geojson",
        &point_collection("kind", &[json!("a"), json!("b")]),
    );
    layer_classify()
        .args([
            "inspect",
            "-i",
            input.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("exceeds the 16 byte upload limit"));
}

#[test]
fn rejects_malformed_geojson() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("broken.json", "{\"type\": \"FeatureCollection\", ");
    layer_classify()
        .args(["inspect", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Malformed input"));
}

#[test]
fn classify_rejects_unknown_field() {
    let input = fixture_path("neighborhoods.geojson");
    layer_classify()
        .args(["classify", "-i", input.to_str().unwrap(), "-f", "missing"])
        .assert()
        .failure()
        .stderr(contains("does not exist"));
}

#[test]
fn classify_rejects_object_id_field() {
    let input = fixture_path("neighborhoods.geojson");
    layer_classify()
        .args(["classify", "-i", input.to_str().unwrap(), "-f", "OBJECTID"])
        .assert()
        .failure()
        .stderr(contains("cannot be classified"));
}

#[test]
fn shapefile_upload_needs_a_feature_service() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_bytes("parcels.zip", b"PK\x03\x04");
    layer_classify()
        .args(["inspect", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("no feature service is configured"));
}

#[test]
fn classify_rejects_unknown_palette() {
    let input = fixture_path("neighborhoods.geojson");
    layer_classify()
        .args([
            "classify",
            "-i",
            input.to_str().unwrap(),
            "-f",
            "district",
            "--palette",
            "sunset",
        ])
        .assert()
        .failure()
        .stderr(contains("Unknown palette 'sunset'"));
}

mod common;

use common::{
    artifact_json, fixture_model, fixture_table, http_response, serve, temp_dir, write_fixture,
};
use creditdesk_core::{
    artifact::ExplanationArtifact,
    error::DeskError,
    explanation::{force_attribution, summary_explanation, summary_order, waterfall_steps},
    remote::RemoteClient,
    treeshap::explain_row,
};
use flate2::{write::GzEncoder, Compression};
use std::io::Write;
use std::time::Duration;

fn remote() -> RemoteClient {
    RemoteClient::new(Duration::from_secs(5), 0).unwrap()
}

/// Attributions add up to the model's raw score for every customer.
#[test]
fn attributions_reconstruct_raw_scores() {
    let dir = temp_dir("additivity");
    let table = fixture_table(&write_fixture(&dir));
    let model = fixture_model();
    for &id in table.ids() {
        let row = table.row(id).unwrap();
        let a = explain_row(&model, row);
        assert!(
            (a.output() - model.predict_raw(row)).abs() < 1e-9,
            "customer {id}: {} vs {}",
            a.output(),
            model.predict_raw(row)
        );
    }
}

/// The on-demand attribution refuses a feature order the model was not fit on.
#[test]
fn force_attribution_checks_feature_order() {
    let dir = temp_dir("force-order");
    let table = fixture_table(&write_fixture(&dir));
    let model = fixture_model();
    let mut swapped = table.columns().to_vec();
    swapped.swap(0, 1);
    let row = table.row(100001).unwrap();
    assert!(force_attribution(&model, table.columns(), row).is_ok());
    assert!(matches!(
        force_attribution(&model, &swapped, row),
        Err(DeskError::FeatureMismatch(_))
    ));
}

/// A positional artifact in table order reads the customer's own row.
#[test]
fn positional_artifact_reads_customer_row() {
    let dir = temp_dir("positional");
    let table = fixture_table(&write_fixture(&dir));
    let json = artifact_json(&table, &[0, 1, 2, 3], false, true);
    let artifact = ExplanationArtifact::from_bytes("shap.json", json.as_bytes()).unwrap();

    let expected = explain_row(&fixture_model(), table.row(100003).unwrap());
    let got = artifact.attribution_for(100003, &table).unwrap();
    assert_eq!(got.values, expected.values);
    let steps = waterfall_steps(&got, 10);
    let top = steps.last().unwrap();
    assert!((top.start + top.value - expected.output()).abs() < 1e-9);
}

/// Reordering the table without re-deriving the artifact is detected.
#[test]
fn reordered_positional_artifact_is_misaligned() {
    let dir = temp_dir("reordered");
    let table = fixture_table(&write_fixture(&dir));
    let json = artifact_json(&table, &[1, 0, 2, 3], false, true);
    let artifact = ExplanationArtifact::from_bytes("shap.json", json.as_bytes()).unwrap();

    let err = artifact.attribution_for(100001, &table).unwrap_err();
    assert!(matches!(err, DeskError::ArtifactMisaligned { .. }), "{err}");
    // Rows that did not move still resolve.
    assert!(artifact.attribution_for(100004, &table).is_ok());
}

/// Keyed artifacts resolve by id whatever their row order.
#[test]
fn keyed_artifact_survives_reordering() {
    let dir = temp_dir("keyed");
    let table = fixture_table(&write_fixture(&dir));
    let json = artifact_json(&table, &[3, 1, 0, 2], true, true);
    let artifact = ExplanationArtifact::from_bytes("shap.json", json.as_bytes()).unwrap();
    assert!(artifact.is_keyed());

    for &id in table.ids() {
        let expected = explain_row(&fixture_model(), table.row(id).unwrap());
        assert_eq!(artifact.attribution_for(id, &table).unwrap().values, expected.values);
    }
}

/// Without ids or data, a row-count mismatch blocks positional lookup.
#[test]
fn short_positional_artifact_is_misaligned() {
    let dir = temp_dir("short");
    let table = fixture_table(&write_fixture(&dir));
    let json = artifact_json(&table, &[0, 1, 2], false, false);
    let artifact = ExplanationArtifact::from_bytes("shap.json", json.as_bytes()).unwrap();
    assert!(matches!(
        artifact.attribution_for(100001, &table),
        Err(DeskError::ArtifactMisaligned { .. })
    ));
}

/// Gzip artifacts load from a local path.
#[test]
fn gzip_artifact_loads_from_disk() {
    let dir = temp_dir("gz-artifact");
    let table = fixture_table(&write_fixture(&dir));
    let json = artifact_json(&table, &[0, 1, 2, 3], true, true);
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(json.as_bytes()).unwrap();
    let path = dir.join("shap_values.json.gz");
    std::fs::write(&path, enc.finish().unwrap()).unwrap();

    let artifact = ExplanationArtifact::load(&path.to_string_lossy(), &remote()).unwrap();
    assert_eq!(artifact.len(), 4);
    artifact.check_features(table.columns()).unwrap();
}

/// Artifacts load from an http URL.
#[test]
fn artifact_loads_from_url() {
    let dir = temp_dir("url-artifact");
    let table = fixture_table(&write_fixture(&dir));
    let json = artifact_json(&table, &[0, 1, 2, 3], false, true);
    let (base, server) = serve(vec![http_response("200 OK", &json)]);

    let artifact = ExplanationArtifact::load(&format!("{base}/shap_values.json"), &remote()).unwrap();
    assert_eq!(artifact.len(), 4);
    assert!(artifact.attribution_for(100002, &table).is_ok());
    server.join().unwrap();
}

/// Summary features are ordered by mean |attribution|.
#[test]
fn summary_orders_by_importance() {
    let dir = temp_dir("summary");
    let table = fixture_table(&write_fixture(&dir));
    let json = artifact_json(&table, &[0, 1, 2, 3], false, true);
    let artifact = ExplanationArtifact::from_bytes("shap.json", json.as_bytes()).unwrap();

    let importance = artifact.mean_abs();
    let order = summary_order(&artifact, 20);
    assert_eq!(order.len(), 3);
    for pair in order.windows(2) {
        assert!(importance[pair[0]] >= importance[pair[1]]);
    }
    assert_eq!(summary_order(&artifact, 1).len(), 1);
}

/// The beeswarm names every shown feature and lays its dots out the same way
/// on every render. Without feature values the dots are grey.
#[test]
fn summary_beeswarm_is_repeatable() {
    let dir = temp_dir("beeswarm");
    let table = fixture_table(&write_fixture(&dir));
    let json = artifact_json(&table, &[0, 1, 2, 3], false, true);
    let artifact = ExplanationArtifact::from_bytes("shap.json", json.as_bytes()).unwrap();

    let first = summary_explanation(&artifact, 20).unwrap();
    let second = summary_explanation(&artifact, 20).unwrap();
    assert_eq!(first, second);
    for name in ["EXT_SOURCE_2", "DAYS_BIRTH", "AMT_CREDIT"] {
        assert!(first.svg.contains(name), "{name}");
    }
    assert_eq!(
        first.caption.as_deref(),
        Some("4 customers, top 3 of 3 features")
    );

    let bare = artifact_json(&table, &[0, 1, 2, 3], false, false);
    let bare = ExplanationArtifact::from_bytes("shap.json", bare.as_bytes()).unwrap();
    let grey = summary_explanation(&bare, 1).unwrap();
    assert!(grey.svg.to_ascii_uppercase().contains("#777777"));
    assert_eq!(grey.caption.as_deref(), Some("4 customers, top 1 of 3 features"));
}

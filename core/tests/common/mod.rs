//! Shared fixtures: a four-customer sample, a small two-tree model, the
//! matching explanation artifact, and a one-shot HTTP server.

#![allow(dead_code)]

use creditdesk_core::{
    config::DeskConfig,
    dataset::{load_feature_rows, FeatureTable},
    error::{DeskError, DeskResult},
    model::TreeEnsemble,
    prediction::{PredictionResult, ScoringService},
    treeshap::explain_row,
    types::CustomerId,
};
use std::cell::Cell;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread::JoinHandle;

pub const CUSTOMERS_CSV: &str = "\
SK_ID_CURR,CODE_GENDER,NAME_FAMILY_STATUS,NAME_INCOME_TYPE,AMT_INCOME_TOTAL,DAYS_BIRTH,DAYS_EMPLOYED
100001,F,Married,Working,202500.0,-9461,-637
100002,M,Single / not married,Pensioner,135000.0,-16765,365243
100003,F,Civil marriage,Commercial associate,270000.0,-19046,-1188
100004,M,Married,Working,67500.0,-12005,-225
";

pub const FEATURES_CSV: &str = "\
Unnamed: 0,SK_ID_CURR,EXT_SOURCE_2,DAYS_BIRTH,AMT_CREDIT
0,100001,0.2629,-9461,406597.5
1,100002,0.6222,-16765,
2,100003,0.5559,-19046,1293502.5
3,100004,0.6504,-12005,135000.0
";

pub const MODEL_JSON: &str = r#"{
    "name": "tree",
    "num_class": 1,
    "objective": "binary sigmoid:1",
    "feature_names": ["EXT_SOURCE_2", "DAYS_BIRTH", "AMT_CREDIT"],
    "tree_info": [{
        "tree_index": 0,
        "tree_structure": {
            "split_index": 0, "split_feature": 0, "threshold": 0.5, "decision_type": "<=",
            "default_left": true, "missing_type": "None", "internal_count": 100,
            "left_child": {
                "split_index": 1, "split_feature": 1, "threshold": -15000, "decision_type": "<=",
                "default_left": true, "missing_type": "None", "internal_count": 40,
                "left_child":  { "leaf_index": 0, "leaf_value": -0.1, "leaf_count": 15 },
                "right_child": { "leaf_index": 1, "leaf_value": 0.45, "leaf_count": 25 }
            },
            "right_child": { "leaf_index": 2, "leaf_value": -0.3, "leaf_count": 60 }
        }
    }, {
        "tree_index": 1,
        "tree_structure": {
            "split_index": 0, "split_feature": 2, "threshold": 500000, "decision_type": "<=",
            "default_left": true, "missing_type": "NaN", "internal_count": 100,
            "left_child":  { "leaf_index": 0, "leaf_value": 0.12, "leaf_count": 55 },
            "right_child": { "leaf_index": 1, "leaf_value": -0.08, "leaf_count": 45 }
        }
    }]
}"#;

/// Route library logs through the test harness; `RUST_LOG=debug` shows them.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Fresh per-test directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("creditdesk-{tag}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Write the sample datasets and model into `dir` and point a test config at
/// them. The explanation artifact is not written.
pub fn write_fixture(dir: &Path) -> DeskConfig {
    init_logging();
    std::fs::write(dir.join("customers.csv"), CUSTOMERS_CSV).expect("write customers");
    std::fs::write(dir.join("features.csv"), FEATURES_CSV).expect("write features");
    std::fs::write(dir.join("model.json"), MODEL_JSON).expect("write model");
    let mut config = DeskConfig::default_test();
    config.customers_path = dir.join("customers.csv");
    config.features_path = dir.join("features.csv");
    config.model_path = dir.join("model.json");
    config.explanation_source = dir.join("shap_values.json").to_string_lossy().into_owned();
    config
}

pub fn fixture_table(config: &DeskConfig) -> FeatureTable {
    load_feature_rows(&config.features_path, &config.id_column, &config.index_column)
        .expect("load features")
}

pub fn fixture_model() -> TreeEnsemble {
    TreeEnsemble::from_json(MODEL_JSON).expect("parse model")
}

/// Artifact JSON for `table`, computed with the fixture model. Rows follow
/// `order` (positions into the table).
pub fn artifact_json(table: &FeatureTable, order: &[usize], with_ids: bool, with_data: bool) -> String {
    let model = fixture_model();
    let mut values = Vec::new();
    let mut data = Vec::new();
    let mut ids = Vec::new();
    for &pos in order {
        let id = table.ids()[pos];
        let row = table.row(id).expect("row");
        let attribution = explain_row(&model, row);
        values.push(attribution.values);
        data.push(row.to_vec());
        ids.push(id);
    }
    let mut doc = serde_json::json!({
        "feature_names": table.columns(),
        "base_values": model.expected_value(),
        "values": values,
    });
    if with_data {
        doc["data"] = serde_json::json!(data);
    }
    if with_ids {
        doc["customer_ids"] = serde_json::json!(ids);
    }
    doc.to_string()
}

pub fn write_artifact(config: &DeskConfig, json: &str) {
    std::fs::write(&config.explanation_source, json).expect("write artifact");
}

/// Scoring stub returning a fixed answer and counting calls.
pub struct StubScoring {
    pub prediction: f64,
    pub decision: String,
    pub calls: Rc<Cell<usize>>,
}

impl StubScoring {
    pub fn new(prediction: f64, decision: &str) -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Self {
                prediction,
                decision: decision.to_string(),
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl ScoringService for StubScoring {
    fn predict(&self, _customer_id: CustomerId) -> DeskResult<PredictionResult> {
        self.calls.set(self.calls.get() + 1);
        Ok(PredictionResult {
            prediction: self.prediction,
            decision: self.decision.clone(),
        })
    }
}

/// Scoring stub that always fails with an HTTP 503.
pub struct DownScoring;

impl ScoringService for DownScoring {
    fn predict(&self, customer_id: CustomerId) -> DeskResult<PredictionResult> {
        Err(DeskError::HttpStatus {
            url: format!("http://scoring.invalid/predict/{customer_id}"),
            status: 503,
        })
    }
}

/// Serve each raw HTTP response to one connection, in order, then stop.
/// Returns the base URL and the server thread, which yields the request
/// lines it received.
pub fn serve(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let handle = std::thread::spawn(move || {
        let mut seen = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]).into_owned();
            seen.push(request.lines().next().unwrap_or_default().to_string());
            let _ = stream.write_all(response.as_bytes());
        }
        seen
    });
    (base, handle)
}

pub fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

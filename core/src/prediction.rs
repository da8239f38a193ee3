//! Prediction client for the external scoring service.

use crate::{
    error::{DeskError, DeskResult},
    remote::RemoteClient,
    types::CustomerId,
};
use serde::{Deserialize, Serialize};

/// Score and decision exactly as the scoring service returned them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: f64,
    pub decision: String,
}

/// The seam between the dashboard and whatever produces predictions.
pub trait ScoringService {
    fn predict(&self, customer_id: CustomerId) -> DeskResult<PredictionResult>;
}

pub struct HttpScoringClient {
    base_url: String,
    remote: RemoteClient,
}

impl HttpScoringClient {
    pub fn new(base_url: &str, remote: RemoteClient) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            remote,
        }
    }

    pub fn endpoint(&self, customer_id: CustomerId) -> String {
        format!("{}/predict/{customer_id}", self.base_url)
    }
}

impl ScoringService for HttpScoringClient {
    fn predict(&self, customer_id: CustomerId) -> DeskResult<PredictionResult> {
        let url = self.endpoint(customer_id);
        let body = self.remote.get_bytes(&url)?;
        let result = parse_prediction_body(&url, &body)?;
        log::info!(
            "customer {customer_id}: prediction={} decision={}",
            result.prediction,
            result.decision
        );
        Ok(result)
    }
}

/// Both fields are required; anything else in the body is ignored.
pub fn parse_prediction_body(url: &str, body: &[u8]) -> DeskResult<PredictionResult> {
    let malformed = |message: String| DeskError::MalformedResponse {
        url: url.to_string(),
        message,
    };
    let result: PredictionResult =
        serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;
    if !result.prediction.is_finite() {
        return Err(malformed("prediction is not a finite number".into()));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_expected_shape() {
        let r = parse_prediction_body("u", br#"{"prediction": 45.2, "decision": "ACCEPTED"}"#)
            .unwrap();
        assert_eq!(r.prediction, 45.2);
        assert_eq!(r.decision, "ACCEPTED");
    }

    #[test]
    fn extra_fields_are_ignored() {
        let r = parse_prediction_body(
            "u",
            br#"{"prediction": 12, "decision": "REFUSED", "model": "lgbm"}"#,
        )
        .unwrap();
        assert_eq!(r.prediction, 12.0);
    }

    #[test]
    fn missing_or_mistyped_fields_are_malformed() {
        let bodies: [&[u8]; 3] = [
            br#"{"prediction": 45.2}"#,
            br#"{"prediction": "45.2", "decision": "ACCEPTED"}"#,
            br#"<html>Application error</html>"#,
        ];
        for body in bodies {
            let err = parse_prediction_body("u", body).unwrap_err();
            assert!(matches!(err, DeskError::MalformedResponse { .. }), "{err}");
        }
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let remote = RemoteClient::new(std::time::Duration::from_secs(1), 0).unwrap();
        let client = HttpScoringClient::new("https://scoring.example/", remote);
        assert_eq!(
            client.endpoint(100001),
            "https://scoring.example/predict/100001"
        );
    }
}

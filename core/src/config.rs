use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "dashboard.json";

/// Fixed classification cutoff of the scoring service. Visual marker only.
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.320;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub customers_path: PathBuf,
    pub features_path: PathBuf,
    pub model_path: PathBuf,
    /// http(s) URL or local path of the precomputed attribution artifact.
    pub explanation_source: String,
    pub prediction_base_url: String,
    pub decision_threshold: f64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub id_column: String,
    pub index_column: String,
    pub waterfall_max_display: usize,
    pub summary_max_display: usize,
    pub force_max_labels: usize,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            customers_path: PathBuf::from("datas/customer_sample.csv.zip"),
            features_path: PathBuf::from("datas/sample_preproc.csv.zip"),
            model_path: PathBuf::from("models/lgbm_classifier.json"),
            explanation_source: "models/shap_values.json.gz".into(),
            prediction_base_url: "https://pretscore.herokuapp.com".into(),
            decision_threshold: DEFAULT_DECISION_THRESHOLD,
            request_timeout_secs: 10,
            max_retries: 0,
            id_column: "SK_ID_CURR".into(),
            index_column: "Unnamed: 0".into(),
            waterfall_max_display: 10,
            summary_max_display: 20,
            force_max_labels: 6,
        }
    }
}

impl DeskConfig {
    /// Load `<data_dir>/dashboard.json` if present, defaults otherwise.
    /// Relative paths are resolved against `data_dir`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/{CONFIG_FILE}");
        let mut config = if Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
            serde_json::from_str::<DeskConfig>(&content)
                .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?
        } else {
            log::info!("{path} not found; using built-in defaults");
            DeskConfig::default()
        };
        config.resolve_paths(Path::new(data_dir));
        config.validate()?;
        Ok(config)
    }

    /// In-memory config for tests: no retry, short timeout, local files.
    pub fn default_test() -> Self {
        Self {
            customers_path: PathBuf::from("customers.csv"),
            features_path: PathBuf::from("features.csv"),
            model_path: PathBuf::from("model.json"),
            explanation_source: "shap_values.json".into(),
            prediction_base_url: "http://127.0.0.1:9".into(),
            request_timeout_secs: 2,
            ..DeskConfig::default()
        }
    }

    fn resolve_paths(&mut self, data_dir: &Path) {
        for path in [
            &mut self.customers_path,
            &mut self.features_path,
            &mut self.model_path,
        ] {
            if path.is_relative() {
                *path = data_dir.join(&*path);
            }
        }
        if !is_remote(&self.explanation_source) && Path::new(&self.explanation_source).is_relative()
        {
            self.explanation_source = data_dir
                .join(&self.explanation_source)
                .to_string_lossy()
                .into_owned();
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            anyhow::bail!(
                "decision_threshold must be within [0, 1], got {}",
                self.decision_threshold
            );
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be > 0");
        }
        if self.waterfall_max_display < 2 || self.summary_max_display == 0 {
            anyhow::bail!("waterfall_max_display must be >= 2 and summary_max_display >= 1");
        }
        Ok(())
    }
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let config: DeskConfig =
            serde_json::from_str(r#"{ "max_retries": 2, "decision_threshold": 0.4 }"#).unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.decision_threshold, 0.4);
        assert_eq!(config.id_column, "SK_ID_CURR");
        assert_eq!(config.index_column, "Unnamed: 0");
    }

    #[test]
    fn relative_paths_resolve_against_data_dir() {
        let mut config = DeskConfig::default();
        config.explanation_source = "https://example.org/shap.json".into();
        config.resolve_paths(Path::new("/srv/desk"));
        assert_eq!(
            config.customers_path,
            PathBuf::from("/srv/desk/datas/customer_sample.csv.zip")
        );
        assert_eq!(config.explanation_source, "https://example.org/shap.json");
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let config = DeskConfig {
            decision_threshold: 32.0,
            ..DeskConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

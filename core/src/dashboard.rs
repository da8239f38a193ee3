//! View controller: application context, per-session view state, and the
//! page recomputation that runs after every command.
//!
//! RULES:
//!   - The profile section always renders for the selected customer.
//!   - Prediction, explanation and comparison sections render only when
//!     their toggle is on, and are recomputed from scratch on every render.
//!   - A failing section becomes `SectionView::Failed`; it never blocks the
//!     other sections.
//!   - The force plot does not depend on the artifact. When the artifact
//!     side fails, the explanation is `SectionView::Partial`: force plot
//!     plus the error.
//!   - The explanation artifact is cached only after a successful load.

use crate::{
    artifact::ExplanationArtifact,
    chart::{escape, fmt_num, gauge},
    command::DashboardCommand,
    comparison::{comparisons_html, dedupe, render_comparisons, ComparisonAttribute},
    config::DeskConfig,
    dataset::{load_customers, load_feature_rows, selectable_ids, FeatureTable, Population},
    derived::{age_years, tenure_label},
    error::{DeskError, DeskResult},
    explanation::{force_explanation, summary_explanation, waterfall_explanation},
    model::TreeEnsemble,
    prediction::{HttpScoringClient, ScoringService},
    remote::RemoteClient,
    types::{CustomerId, SessionId},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything loaded once at startup. Immutable for the life of the process.
pub struct AppContext {
    pub config: DeskConfig,
    pub population: Population,
    pub features: FeatureTable,
    pub model: TreeEnsemble,
    /// Ids present in both tables, in feature-table order.
    pub selectable_ids: Vec<CustomerId>,
    pub scoring: Box<dyn ScoringService>,
    pub remote: RemoteClient,
}

impl AppContext {
    /// Load datasets and model from the configured paths. Any failure here is
    /// fatal for the process.
    pub fn load(config: DeskConfig, scoring: Box<dyn ScoringService>) -> DeskResult<Self> {
        let remote = remote_client(&config)?;
        Self::load_with(config, scoring, remote)
    }

    /// `load` with the HTTP scoring client built from the config. The scoring
    /// client and the artifact loader share one HTTP client.
    pub fn load_with_http(config: DeskConfig) -> DeskResult<Self> {
        let remote = remote_client(&config)?;
        let scoring = HttpScoringClient::new(&config.prediction_base_url, remote.clone());
        Self::load_with(config, Box::new(scoring), remote)
    }

    fn load_with(
        config: DeskConfig,
        scoring: Box<dyn ScoringService>,
        remote: RemoteClient,
    ) -> DeskResult<Self> {
        let population = load_customers(&config.customers_path, &config.id_column)?;
        let features = load_feature_rows(&config.features_path, &config.id_column, &config.index_column)?;
        let model = TreeEnsemble::load(&config.model_path)?;
        Self::from_parts(config, population, features, model, scoring, remote)
    }

    pub fn from_parts(
        config: DeskConfig,
        population: Population,
        features: FeatureTable,
        model: TreeEnsemble,
        scoring: Box<dyn ScoringService>,
        remote: RemoteClient,
    ) -> DeskResult<Self> {
        model.check_features(features.columns())?;
        let selectable_ids = selectable_ids(&population, &features);
        if selectable_ids.is_empty() {
            return Err(DeskError::Other(anyhow::anyhow!(
                "no customer is present in both {} and {}",
                population.source(),
                features.source()
            )));
        }
        log::info!(
            "context ready: {} customers, {} feature rows, {} selectable",
            population.len(),
            features.len(),
            selectable_ids.len()
        );
        Ok(Self {
            config,
            population,
            features,
            model,
            selectable_ids,
            scoring,
            remote,
        })
    }

    pub fn is_selectable(&self, id: CustomerId) -> bool {
        self.selectable_ids.contains(&id)
    }
}

pub fn remote_client(config: &DeskConfig) -> DeskResult<RemoteClient> {
    RemoteClient::new(
        Duration::from_secs(config.request_timeout_secs),
        config.max_retries,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub customer_id: CustomerId,
    pub show_prediction: bool,
    pub show_explanation: bool,
    /// `None` when the comparison section is off.
    pub comparison: Option<Vec<ComparisonAttribute>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionView {
    Hidden,
    Ready { html: String },
    /// Rendered in part; `message` says why the rest is missing.
    Partial { html: String, message: String },
    Failed { message: String },
}

impl SectionView {
    fn from_result(section: &str, result: DeskResult<String>) -> Self {
        match result {
            Ok(html) => SectionView::Ready { html },
            Err(e) => {
                log::warn!("{section} section failed: {e}");
                SectionView::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SectionView::Ready { .. })
    }
}

/// The selected customer's displayed attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    pub customer_id: CustomerId,
    pub gender: String,
    pub family_status: String,
    pub age_years: i64,
    pub income_total: f64,
    pub income_type: String,
    pub tenure: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    pub session_id: SessionId,
    pub state: ViewState,
    pub profile: ProfileView,
    pub prediction: SectionView,
    pub explanation: SectionView,
    pub comparison: SectionView,
}

pub struct Dashboard {
    ctx: AppContext,
    session_id: SessionId,
    state: ViewState,
    artifact: Option<ExplanationArtifact>,
}

impl Dashboard {
    /// Start a session on the first selectable customer, all sections off.
    pub fn new(ctx: AppContext) -> Self {
        let customer_id = ctx.selectable_ids[0];
        let session_id = uuid::Uuid::new_v4().to_string();
        log::info!("session {session_id} started on customer {customer_id}");
        Self {
            ctx,
            session_id,
            state: ViewState {
                customer_id,
                show_prediction: false,
                show_explanation: false,
                comparison: None,
            },
            artifact: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Apply one command. On error the view state is left unchanged.
    pub fn apply(&mut self, cmd: DashboardCommand) -> DeskResult<()> {
        match cmd {
            DashboardCommand::SelectCustomer { customer_id } => {
                if !self.ctx.is_selectable(customer_id) {
                    return Err(DeskError::CustomerNotFound { id: customer_id });
                }
                log::info!("select customer {customer_id}");
                self.state.customer_id = customer_id;
            }
            DashboardCommand::SetPrediction { enabled } => self.state.show_prediction = enabled,
            DashboardCommand::SetExplanation { enabled } => self.state.show_explanation = enabled,
            DashboardCommand::SetComparison {
                enabled,
                attributes,
            } => {
                self.state.comparison = enabled.then(|| dedupe(&attributes));
            }
            DashboardCommand::GetState | DashboardCommand::Quit => {}
        }
        Ok(())
    }

    /// Recompute the page for the current view state.
    pub fn render(&mut self) -> DeskResult<PageView> {
        let customer_id = self.state.customer_id;
        let record = self.ctx.population.get(customer_id)?;
        let profile = ProfileView {
            customer_id,
            gender: record.gender.clone(),
            family_status: record.family_status.clone(),
            age_years: age_years(record.days_birth),
            income_total: record.income_total,
            income_type: record.income_type.clone(),
            tenure: tenure_label(record.days_employed),
        };

        let prediction = if self.state.show_prediction {
            SectionView::from_result("prediction", self.prediction_html(customer_id))
        } else {
            SectionView::Hidden
        };
        let explanation = if self.state.show_explanation {
            self.explanation_section(customer_id)
        } else {
            SectionView::Hidden
        };
        let comparison = match &self.state.comparison {
            Some(attributes) => {
                SectionView::from_result("comparison", self.comparison_html(customer_id, attributes))
            }
            None => SectionView::Hidden,
        };

        Ok(PageView {
            session_id: self.session_id.clone(),
            state: self.state.clone(),
            profile,
            prediction,
            explanation,
            comparison,
        })
    }

    fn prediction_html(&self, customer_id: CustomerId) -> DeskResult<String> {
        let result = self.ctx.scoring.predict(customer_id)?;
        let threshold_pct = self.ctx.config.decision_threshold * 100.0;
        Ok(format!(
            "<h2>Prédiction de solvabilité</h2>{}<p class=\"score\">score <b>{}</b>, décision <b>{}</b> (seuil {})</p>",
            gauge(result.prediction, threshold_pct, &result.decision)?,
            fmt_num(result.prediction),
            escape(&result.decision),
            fmt_num(threshold_pct)
        ))
    }

    fn explanation_section(&mut self, customer_id: CustomerId) -> SectionView {
        let force = match self.force_html(customer_id) {
            Ok(html) => html,
            Err(e) => return SectionView::from_result("explanation", Err(e)),
        };
        match self.artifact_html(customer_id) {
            Ok(rest) => SectionView::Ready {
                html: format!("{force}{rest}"),
            },
            Err(e) => {
                log::warn!("explanation section incomplete: {e}");
                SectionView::Partial {
                    html: force,
                    message: e.to_string(),
                }
            }
        }
    }

    fn force_html(&self, customer_id: CustomerId) -> DeskResult<String> {
        let row = self.ctx.features.row(customer_id)?;
        let force = force_explanation(
            &self.ctx.model,
            self.ctx.features.columns(),
            row,
            self.ctx.config.force_max_labels,
        )?;
        Ok(format!(
            "<h2>Interprétabilité du défaut de paiement</h2>{}",
            force.to_html()
        ))
    }

    fn artifact_html(&mut self, customer_id: CustomerId) -> DeskResult<String> {
        let (waterfall_max, summary_max) = (
            self.ctx.config.waterfall_max_display,
            self.ctx.config.summary_max_display,
        );
        let artifact = cached_artifact(&mut self.artifact, &self.ctx)?;
        let attribution = artifact.attribution_for(customer_id, &self.ctx.features)?;
        let waterfall = waterfall_explanation(&attribution, waterfall_max)?;
        let summary = summary_explanation(artifact, summary_max)?;
        Ok(format!(
            "<h2>Variables importantes du client</h2>{}<h2>Variables importantes du modèle</h2>{}",
            waterfall.to_html(),
            summary.to_html()
        ))
    }

    fn comparison_html(
        &self,
        customer_id: CustomerId,
        attributes: &[ComparisonAttribute],
    ) -> DeskResult<String> {
        let record = self.ctx.population.get(customer_id)?;
        if attributes.is_empty() {
            return Ok("<p class=\"hint\">Aucun attribut sélectionné.</p>".into());
        }
        let visuals = render_comparisons(&self.ctx.population, attributes, record)?;
        Ok(comparisons_html(&visuals))
    }
}

/// The cached artifact, loading it on first use. Failed loads are not cached.
fn cached_artifact<'a>(
    slot: &'a mut Option<ExplanationArtifact>,
    ctx: &AppContext,
) -> DeskResult<&'a ExplanationArtifact> {
    if slot.is_none() {
        let loaded = ExplanationArtifact::load(&ctx.config.explanation_source, &ctx.remote)?;
        loaded.check_features(ctx.features.columns())?;
        *slot = Some(loaded);
    }
    slot.as_ref()
        .ok_or_else(|| DeskError::Other(anyhow::anyhow!("explanation artifact missing after load")))
}

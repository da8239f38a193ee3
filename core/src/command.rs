use crate::{comparison::ComparisonAttribute, types::CustomerId};
use serde::{Deserialize, Serialize};

/// All analyst-issued commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardCommand {
    // ── Selection ─────────────────────────────────
    SelectCustomer { customer_id: CustomerId },

    // ── Section toggles ───────────────────────────
    SetPrediction { enabled: bool },
    SetExplanation { enabled: bool },
    SetComparison {
        enabled: bool,
        #[serde(default)]
        attributes: Vec<ComparisonAttribute>,
    },

    // ── Session ───────────────────────────────────
    GetState,
    Quit,
}

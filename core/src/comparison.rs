//! Population comparison charts: one distribution per selected attribute,
//! optionally marked with the selected customer's own value.

use crate::{
    chart::{histogram, histogram_svg, pie_svg, Histogram, Visual},
    dataset::{CustomerRecord, Population},
    derived::{age_years, tenure_years},
    error::DeskResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonAttribute {
    Gender,
    Age,
    FamilyStatus,
    IncomeTotal,
    IncomeType,
    Tenure,
}

impl ComparisonAttribute {
    pub const ALL: [ComparisonAttribute; 6] = [
        Self::Gender,
        Self::Age,
        Self::FamilyStatus,
        Self::IncomeTotal,
        Self::IncomeType,
        Self::Tenure,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Gender => "gender",
            Self::Age => "age",
            Self::FamilyStatus => "family_status",
            Self::IncomeTotal => "income_total",
            Self::IncomeType => "income_type",
            Self::Tenure => "tenure",
        }
    }

    /// Selector label shown to the analyst.
    pub fn label(self) -> &'static str {
        match self {
            Self::Gender => "GENRE",
            Self::Age => "ÂGE",
            Self::FamilyStatus => "STATUT",
            Self::IncomeTotal => "REVENUE TOTALE",
            Self::IncomeType => "TYPE DE REVENUE",
            Self::Tenure => "ANCIENNETE",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Gender => "Distribution du genre",
            Self::Age => "Distribution des âges",
            Self::FamilyStatus => "Distribution des statuts des clients",
            Self::IncomeTotal => "Distribution du revenue totale",
            Self::IncomeType => "Distribution du type de revenue",
            Self::Tenure => "Distribution d'ancienneté des clients",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Age | Self::IncomeTotal | Self::Tenure)
    }

    /// Year-valued attributes bin on whole years.
    fn integer_bins(self) -> bool {
        matches!(self, Self::Age | Self::Tenure)
    }

    fn axis_label(self) -> &'static str {
        match self {
            Self::Age => "âge",
            Self::IncomeTotal => "Totale Revenue",
            Self::Tenure => "Années",
            _ => "",
        }
    }

    /// Numeric value of this attribute for one customer. `None` for
    /// categorical attributes and for the tenure of a non-employed customer.
    pub fn numeric_value(self, record: &CustomerRecord) -> Option<f64> {
        match self {
            Self::Age => Some(age_years(record.days_birth) as f64),
            Self::IncomeTotal => Some(record.income_total),
            Self::Tenure => tenure_years(record.days_employed).map(|y| y as f64),
            _ => None,
        }
    }

    fn category<'a>(self, record: &'a CustomerRecord) -> &'a str {
        match self {
            Self::Gender => &record.gender,
            Self::FamilyStatus => &record.family_status,
            Self::IncomeType => &record.income_type,
            _ => "",
        }
    }
}

impl fmt::Display for ComparisonAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ComparisonAttribute {
    type Err = String;

    /// Accepts the snake_case key or the selector label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let lower = t.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.key() == lower || a.label() == t.to_uppercase())
            .or(match t.to_uppercase().as_str() {
                "AGE" => Some(Self::Age),
                "ANCIENNETÉ" => Some(Self::Tenure),
                _ => None,
            })
            .ok_or_else(|| format!("unknown comparison attribute '{t}'"))
    }
}

/// Keep selection order, drop repeats.
pub fn dedupe(attributes: &[ComparisonAttribute]) -> Vec<ComparisonAttribute> {
    let mut out = Vec::with_capacity(attributes.len());
    for &a in attributes {
        if !out.contains(&a) {
            out.push(a);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    Numeric {
        histogram: Histogram,
        marker: Option<f64>,
        /// Customers without a value (not employed, for tenure).
        excluded: usize,
    },
    /// Slices ordered by count descending, then label.
    Categorical { slices: Vec<(String, usize)> },
}

pub fn distribution(
    population: &Population,
    attribute: ComparisonAttribute,
    marker: Option<f64>,
) -> Distribution {
    let records = population.records();
    if attribute.is_numeric() {
        let values: Vec<f64> = records
            .iter()
            .filter_map(|r| attribute.numeric_value(r))
            .collect();
        Distribution::Numeric {
            histogram: histogram(&values, attribute.integer_bins()),
            marker,
            excluded: records.len() - values.len(),
        }
    } else {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for r in records {
            *counts.entry(attribute.category(r)).or_default() += 1;
        }
        let mut slices: Vec<(String, usize)> =
            counts.into_iter().map(|(k, c)| (k.to_string(), c)).collect();
        slices.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Distribution::Categorical { slices }
    }
}

pub fn render_distribution(attribute: ComparisonAttribute, dist: &Distribution) -> DeskResult<Visual> {
    Ok(match dist {
        Distribution::Numeric {
            histogram,
            marker,
            excluded,
        } => {
            let visual = Visual::new(
                attribute.title(),
                histogram_svg(histogram, attribute.axis_label(), *marker)?,
            );
            if *excluded > 0 {
                visual.with_caption(format!("{excluded} customers not employed, not shown"))
            } else {
                visual
            }
        }
        Distribution::Categorical { slices } => Visual::new(attribute.title(), pie_svg(slices)?),
    })
}

/// Charts for `attributes` in selection order, repeats rendered once.
pub fn render_comparisons(
    population: &Population,
    attributes: &[ComparisonAttribute],
    customer: &CustomerRecord,
) -> DeskResult<Vec<Visual>> {
    dedupe(attributes)
        .into_iter()
        .map(|a| {
            let dist = distribution(population, a, a.numeric_value(customer));
            render_distribution(a, &dist)
        })
        .collect()
}

pub fn comparisons_html(visuals: &[Visual]) -> String {
    visuals.iter().map(Visual::to_html).collect::<Vec<_>>().join("")
}

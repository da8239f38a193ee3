//! Presentation-friendly attributes derived from signed day counts.

use crate::types::Days;

pub const DAYS_PER_YEAR: f64 = 365.0;

/// `DAYS_EMPLOYED` value recorded for applicants with no current employer.
pub const NOT_EMPLOYED_SENTINEL: Days = 365_243;

/// Age in whole years from a (negative) days-since-birth count.
pub fn age_years(days_since_birth: Days) -> i64 {
    (days_since_birth as f64 / -DAYS_PER_YEAR).round_ties_even() as i64
}

/// Tenure in whole years from a (negative) days-employed count.
///
/// `None` means "not employed": the sentinel, or any positive count, which
/// would otherwise show up as a large negative tenure.
pub fn tenure_years(days_employed: Days) -> Option<i64> {
    if is_not_employed(days_employed) {
        return None;
    }
    Some((days_employed as f64 * -1.0 / DAYS_PER_YEAR).round_ties_even() as i64)
}

pub fn is_not_employed(days_employed: Days) -> bool {
    days_employed == NOT_EMPLOYED_SENTINEL || days_employed > 0
}

pub fn age_column(days: &[Days]) -> Vec<i64> {
    days.iter().map(|&d| age_years(d)).collect()
}

pub fn tenure_column(days: &[Days]) -> Vec<Option<i64>> {
    days.iter().map(|&d| tenure_years(d)).collect()
}

/// Display form used by the profile panel.
pub fn tenure_label(days_employed: Days) -> String {
    match tenure_years(days_employed) {
        Some(years) => format!("{years} years"),
        None => "not employed".into(),
    }
}

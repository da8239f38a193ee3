mod common;

use common::CUSTOMERS_CSV;
use creditdesk_core::{
    chart::{hex, MARKER_COLOR},
    comparison::{distribution, render_comparisons, ComparisonAttribute, Distribution},
    dataset::{read_customers, Population},
};
use ComparisonAttribute::*;

fn population() -> Population {
    read_customers(CUSTOMERS_CSV.as_bytes(), "inline", "SK_ID_CURR").unwrap()
}

/// Charts come out in the order of the latest selection, same content.
#[test]
fn selection_order_drives_display_order() {
    let pop = population();
    let customer = pop.get(100001).unwrap();
    let first = render_comparisons(&pop, &[Age, Gender], customer).unwrap();
    let second = render_comparisons(&pop, &[Gender, Age], customer).unwrap();

    let titles = |v: &[creditdesk_core::chart::Visual]| -> Vec<String> {
        v.iter().map(|c| c.title.clone()).collect()
    };
    assert_eq!(titles(&first), vec![Age.title(), Gender.title()]);
    assert_eq!(titles(&second), vec![Gender.title(), Age.title()]);
    assert_eq!(first[0], second[1]);
    assert_eq!(first[1], second[0]);
}

/// Zero, one or all six attributes; repeats render once.
#[test]
fn chart_count_follows_selection() {
    let pop = population();
    let customer = pop.get(100001).unwrap();
    assert!(render_comparisons(&pop, &[], customer).unwrap().is_empty());
    assert_eq!(render_comparisons(&pop, &[Tenure], customer).unwrap().len(), 1);
    assert_eq!(render_comparisons(&pop, &ComparisonAttribute::ALL, customer).unwrap().len(), 6);
    assert_eq!(render_comparisons(&pop, &[Age, Age, Gender, Age], customer).unwrap().len(), 2);
}

/// Numeric charts carry the customer's value as a dashed marker.
#[test]
fn numeric_charts_mark_the_customer() {
    let pop = population();
    let customer = pop.get(100001).unwrap();
    assert_eq!(Age.numeric_value(customer), Some(26.0));
    assert_eq!(IncomeTotal.numeric_value(customer), Some(202500.0));
    assert_eq!(Tenure.numeric_value(customer), Some(2.0));

    let charts = render_comparisons(&pop, &[Age, IncomeTotal, Tenure], customer).unwrap();
    let marker = hex(MARKER_COLOR);
    for chart in &charts {
        assert!(chart.svg.to_ascii_uppercase().contains(&marker), "{}", chart.title);
    }
}

/// Non-employed customers leave the tenure histogram and get no marker.
#[test]
fn tenure_excludes_not_employed() {
    let pop = population();
    let pensioner = pop.get(100002).unwrap();
    let marker = Tenure.numeric_value(pensioner);
    assert_eq!(marker, None);

    match distribution(&pop, Tenure, marker) {
        Distribution::Numeric {
            histogram,
            marker,
            excluded,
        } => {
            assert_eq!(excluded, 1);
            assert_eq!(histogram.counts.iter().sum::<usize>(), 3);
            assert_eq!(marker, None);
        }
        other => panic!("expected a histogram, got {other:?}"),
    }
    let charts = render_comparisons(&pop, &[Tenure], pensioner).unwrap();
    assert!(!charts[0].svg.to_ascii_uppercase().contains(&hex(MARKER_COLOR)));
    assert!(charts[0].caption.as_deref().unwrap_or_default().contains('1'));
}

/// Pie slices are sorted by count, then label, and cover everyone.
#[test]
fn categorical_slices_are_sorted() {
    let pop = population();
    match distribution(&pop, FamilyStatus, None) {
        Distribution::Categorical { slices } => {
            assert_eq!(
                slices,
                vec![
                    ("Married".to_string(), 2),
                    ("Civil marriage".to_string(), 1),
                    ("Single / not married".to_string(), 1),
                ]
            );
        }
        other => panic!("expected slices, got {other:?}"),
    }
}

/// Rendering the same selection twice gives identical charts.
#[test]
fn rendering_is_repeatable() {
    let pop = population();
    let customer = pop.get(100003).unwrap();
    let a = render_comparisons(&pop, &ComparisonAttribute::ALL, customer).unwrap();
    let b = render_comparisons(&pop, &ComparisonAttribute::ALL, customer).unwrap();
    assert_eq!(a, b);
}

//! Explanation section renderers: force plot, waterfall and summary beeswarm.
//!
//! All three plot raw-score (log-odds) attributions. The force plot is
//! computed on demand from the model; the waterfall and summary read the
//! precomputed artifact.

use crate::{
    artifact::ExplanationArtifact,
    chart::{
        axis_range, fmt_num, render_svg, small_text, Visual, GUIDE_COLOR, MARKER_COLOR,
        NEGATIVE_COLOR, POSITIVE_COLOR, WIDTH,
    },
    error::{DeskError, DeskResult},
    model::TreeEnsemble,
    rng::{PlotRng, BEESWARM_SEED},
    treeshap::{explain_row, Attribution},
};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters::style::text_anchor::HPos;

const ROW_HEIGHT: u32 = 24;
const LABEL_WIDTH: u32 = 220;
const LOW_VALUE_COLOR: RGBColor = RGBColor(0x00, 0x8B, 0xFB);
const HIGH_VALUE_COLOR: RGBColor = RGBColor(0xFF, 0x00, 0x51);
const MISSING_VALUE_COLOR: RGBColor = RGBColor(0x77, 0x77, 0x77);

/// Attribute `row` with the fitted model. `feature_names` must be the
/// model's own feature order.
pub fn force_attribution(
    model: &TreeEnsemble,
    feature_names: &[String],
    row: &[f64],
) -> DeskResult<Attribution> {
    model.check_features(feature_names)?;
    if row.len() != feature_names.len() {
        return Err(DeskError::FeatureMismatch(format!(
            "row has {} values for {} features",
            row.len(),
            feature_names.len()
        )));
    }
    Ok(explain_row(model, row))
}

pub fn force_explanation(
    model: &TreeEnsemble,
    feature_names: &[String],
    row: &[f64],
    max_labels: usize,
) -> DeskResult<Visual> {
    let attribution = force_attribution(model, feature_names, row)?;
    force_plot(&attribution, max_labels)
}

/// Horizontal force bar. Red segments push the output up from the left,
/// blue segments push it down from the right; both meet at f(x).
pub fn force_plot(attribution: &Attribution, max_labels: usize) -> DeskResult<Visual> {
    let out = attribution.output();
    let base = attribution.base_value;
    let ranked = attribution.ranked();
    let labelled: Vec<usize> = ranked.iter().copied().take(max_labels).collect();

    // (from, to, color, feature), largest contribution next to f(x).
    let mut segments = Vec::with_capacity(ranked.len());
    let mut edge = out;
    for &i in ranked.iter().filter(|&&i| attribution.values[i] > 0.0) {
        let v = attribution.values[i];
        segments.push((edge - v, edge, POSITIVE_COLOR, i));
        edge -= v;
    }
    let lo = edge.min(base);
    let mut edge = out;
    for &i in ranked.iter().filter(|&&i| attribution.values[i] < 0.0) {
        let v = -attribution.values[i];
        segments.push((edge, edge + v, NEGATIVE_COLOR, i));
        edge += v;
    }
    let (lo, hi) = axis_range(lo, edge.max(base));

    let svg = render_svg(WIDTH, 170, |root| {
        let mut chart = ChartBuilder::on(root)
            .margin(15)
            .x_label_area_size(25)
            .build_cartesian_2d(lo..hi, 0f64..1f64)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .disable_y_axis()
            .x_label_formatter(&|v| fmt_num(*v))
            .draw()?;

        chart.draw_series(segments.iter().map(|&(from, to, color, _)| {
            let mut bar = Rectangle::new([(from, 0.5), (to, 0.72)], color.filled());
            bar.set_margin(0, 0, 0, 1);
            bar
        }))?;
        let mut stagger = 0;
        for &(from, to, _, i) in &segments {
            if !labelled.contains(&i) {
                continue;
            }
            let y = 0.4 - 0.12 * f64::from(stagger % 3);
            stagger += 1;
            chart.draw_series(std::iter::once(Text::new(
                feature_label(attribution, i),
                ((from + to) / 2.0, y),
                small_text(HPos::Center),
            )))?;
        }
        for (value, caption, y) in [(base, "base value", 0.95), (out, "f(x)", 0.83)] {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(value, 0.46), (value, 0.76)],
                MARKER_COLOR.stroke_width(1),
            )))?;
            chart.draw_series(std::iter::once(Text::new(
                format!("{caption} {}", fmt_num(value)),
                (value, y),
                small_text(HPos::Center),
            )))?;
        }
        Ok(())
    })?;

    Ok(Visual::new("Force plot (log-odds)", svg).with_caption(format!(
        "base value {} → f(x) {}",
        fmt_num(base),
        fmt_num(out)
    )))
}

fn feature_label(attribution: &Attribution, feature: usize) -> String {
    format!(
        "{} = {}",
        attribution.feature_names[feature],
        fmt_num(attribution.data[feature])
    )
}

/// One bar of a waterfall, bottom row first.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallStep {
    pub label: String,
    pub value: f64,
    pub start: f64,
}

/// Rows of a waterfall from the baseline up to the output. When there are more
/// than `max_display` features, all but the top `max_display - 1` collapse
/// into a single "N other features" row.
pub fn waterfall_steps(attribution: &Attribution, max_display: usize) -> Vec<WaterfallStep> {
    let ranked = attribution.ranked();
    let (shown, rest) = if ranked.len() > max_display {
        ranked.split_at(max_display.saturating_sub(1))
    } else {
        (ranked.as_slice(), &[][..])
    };

    let mut bottom_up: Vec<(String, f64)> = Vec::with_capacity(shown.len() + 1);
    if !rest.is_empty() {
        let sum: f64 = rest.iter().map(|&i| attribution.values[i]).sum();
        bottom_up.push((format!("{} other features", rest.len()), sum));
    }
    for &i in shown.iter().rev() {
        bottom_up.push((feature_label(attribution, i), attribution.values[i]));
    }

    let mut cum = attribution.base_value;
    bottom_up
        .into_iter()
        .map(|(label, value)| {
            let step = WaterfallStep { label, value, start: cum };
            cum += value;
            step
        })
        .collect()
}

pub fn waterfall_explanation(attribution: &Attribution, max_display: usize) -> DeskResult<Visual> {
    let steps = waterfall_steps(attribution, max_display);
    let base = attribution.base_value;
    let out = attribution.output();
    let mut lo = base.min(out);
    let mut hi = base.max(out);
    for s in &steps {
        lo = lo.min(s.start).min(s.start + s.value);
        hi = hi.max(s.start).max(s.start + s.value);
    }
    let (lo, hi) = axis_range(lo, hi);
    // Room on the right for the value labels.
    let hi = hi + (hi - lo) * 0.15;
    let rows = steps.len().max(1) as f64;
    let height = 70 + ROW_HEIGHT * steps.len() as u32;

    let svg = render_svg(WIDTH, height, |root| {
        let mut chart = ChartBuilder::on(root)
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(LABEL_WIDTH)
            .build_cartesian_2d(lo..hi, 0f64..rows)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .disable_y_axis()
            .x_desc("log-odds")
            .x_label_formatter(&|v| fmt_num(*v))
            .draw()?;

        // steps[0] is the bottom row.
        for (row, step) in steps.iter().enumerate() {
            let y = row as f64 + 0.5;
            let (a, b) = (step.start, step.start + step.value);
            let color = if step.value >= 0.0 { POSITIVE_COLOR } else { NEGATIVE_COLOR };
            chart.draw_series(std::iter::once(Rectangle::new(
                [(a, y - 0.35), (b, y + 0.35)],
                color.filled(),
            )))?;
            let sign = if step.value >= 0.0 { "+" } else { "" };
            chart.draw_series(std::iter::once(
                EmptyElement::at((a.max(b), y))
                    + Text::new(
                        format!("{sign}{}", fmt_num(step.value)),
                        (3, 0),
                        small_text(HPos::Left),
                    ),
            ))?;
            let (px, py) = chart.backend_coord(&(lo, y));
            root.draw(&Text::new(
                step.label.clone(),
                (px - 6, py),
                small_text(HPos::Right),
            ))?;
        }
        for value in [base, out] {
            chart.draw_series(DashedLineSeries::new(
                vec![(value, 0.0), (value, rows)],
                3,
                3,
                GUIDE_COLOR.stroke_width(1),
            ))?;
        }
        Ok(())
    })?;

    Ok(Visual::new("Waterfall (log-odds)", svg).with_caption(format!(
        "E[f(x)] = {} → f(x) = {}",
        fmt_num(base),
        fmt_num(out)
    )))
}

/// Feature indices for the summary plot, by decreasing mean |attribution|.
pub fn summary_order(artifact: &ExplanationArtifact, max_display: usize) -> Vec<usize> {
    let importance = artifact.mean_abs();
    let mut order: Vec<usize> = (0..importance.len()).collect();
    order.sort_by(|&a, &b| importance[b].total_cmp(&importance[a]).then(a.cmp(&b)));
    order.truncate(max_display);
    order
}

/// Beeswarm of every row's attribution for the most important features.
/// Dot color runs from blue (low feature value) to red (high).
pub fn summary_explanation(artifact: &ExplanationArtifact, max_display: usize) -> DeskResult<Visual> {
    let order = summary_order(artifact, max_display);
    let values = artifact.values();
    let data = artifact.data();

    let mut lo = 0.0f64;
    let mut hi = 0.0f64;
    for row in values {
        for &f in &order {
            if row[f].is_finite() {
                lo = lo.min(row[f]);
                hi = hi.max(row[f]);
            }
        }
    }
    let (lo, hi) = axis_range(lo, hi);
    let rows = order.len().max(1) as f64;
    let height = 60 + ROW_HEIGHT * order.len() as u32;

    let svg = render_svg(WIDTH, height, |root| {
        let mut chart = ChartBuilder::on(root)
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(LABEL_WIDTH)
            .build_cartesian_2d(lo..hi, 0f64..rows)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .disable_y_axis()
            .x_desc("attribution (impact on log-odds)")
            .x_label_formatter(&|v| fmt_num(*v))
            .draw()?;
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(0.0, 0.0), (0.0, rows)],
            GUIDE_COLOR.stroke_width(1),
        )))?;

        // Most important feature on the top row.
        for (rank, &f) in order.iter().enumerate() {
            let y_mid = rows - rank as f64 - 0.5;
            let (px, py) = chart.backend_coord(&(lo, y_mid));
            root.draw(&Text::new(
                artifact.feature_names()[f].clone(),
                (px - 6, py),
                small_text(HPos::Right),
            ))?;

            let column: Option<Vec<f64>> = data.map(|d| d.iter().map(|r| r[f]).collect());
            let range = column.as_deref().and_then(finite_range);
            let mut rng = PlotRng::for_series(BEESWARM_SEED, f as u64);
            let mut dots = Vec::with_capacity(values.len());
            for (r, row) in values.iter().enumerate() {
                let jitter = rng.jitter(0.35);
                if !row[f].is_finite() {
                    continue;
                }
                let color = match (&column, range) {
                    (Some(col), Some((min, max))) if col[r].is_finite() => {
                        let t = if max > min { (col[r] - min) / (max - min) } else { 0.5 };
                        blend(t)
                    }
                    _ => MISSING_VALUE_COLOR,
                };
                dots.push(Circle::new((row[f], y_mid + jitter), 2, color.mix(0.8).filled()));
            }
            chart.draw_series(dots)?;
        }
        Ok(())
    })?;

    Ok(Visual::new("Summary", svg).with_caption(format!(
        "{} customers, top {} of {} features",
        artifact.len(),
        order.len(),
        artifact.feature_names().len()
    )))
}

fn finite_range(column: &[f64]) -> Option<(f64, f64)> {
    let mut finite = column.iter().copied().filter(|v| v.is_finite()).peekable();
    finite.peek()?;
    Some(finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    }))
}

fn blend(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(
        mix(LOW_VALUE_COLOR.0, HIGH_VALUE_COLOR.0),
        mix(LOW_VALUE_COLOR.1, HIGH_VALUE_COLOR.1),
        mix(LOW_VALUE_COLOR.2, HIGH_VALUE_COLOR.2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::hex;

    fn attribution(values: Vec<f64>) -> Attribution {
        let n = values.len();
        Attribution {
            feature_names: (0..n).map(|i| format!("f{i}")).collect(),
            data: (0..n).map(|i| i as f64).collect(),
            values,
            base_value: -1.0,
        }
    }

    #[test]
    fn waterfall_ends_at_model_output() {
        let a = attribution(vec![0.5, -0.2, 0.05, 0.3]);
        let steps = waterfall_steps(&a, 10);
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].start, -1.0);
        let last = steps.last().unwrap();
        assert!((last.start + last.value - a.output()).abs() < 1e-12);
        // Top row is the largest contribution.
        assert!(last.label.starts_with("f0 ="));
    }

    #[test]
    fn waterfall_collapses_the_tail() {
        let a = attribution((1..=15).map(|i| i as f64 / 100.0).collect());
        let steps = waterfall_steps(&a, 10);
        assert_eq!(steps.len(), 10);
        assert_eq!(steps[0].label, "6 other features");
        let tail: f64 = (1..=6).map(|i| i as f64 / 100.0).sum();
        assert!((steps[0].value - tail).abs() < 1e-12);
    }

    #[test]
    fn force_plot_colors_by_sign() {
        let a = attribution(vec![0.4, -0.3]);
        let v = force_plot(&a, 6).unwrap();
        let svg = v.svg.to_ascii_uppercase();
        assert!(svg.contains(&hex(POSITIVE_COLOR)));
        assert!(svg.contains(&hex(NEGATIVE_COLOR)));
        assert!(v.svg.contains("f0 = 0"));
        assert_eq!(v.caption.as_deref(), Some("base value -1 → f(x) -0.9"));
    }

    #[test]
    fn force_plot_labels_only_the_top_features() {
        let a = attribution(vec![0.4, -0.3, 0.01]);
        let v = force_plot(&a, 2).unwrap();
        assert!(v.svg.contains("f0 = 0"));
        assert!(v.svg.contains("f1 = 1"));
        assert!(!v.svg.contains("f2 = 2"));
    }

    #[test]
    fn waterfall_draws_every_row_label() {
        let a = attribution((1..=15).map(|i| i as f64 / 100.0).collect());
        let v = waterfall_explanation(&a, 10).unwrap();
        assert!(v.svg.contains("6 other features"));
        assert!(v.svg.contains("f14 = 14"));
        assert!(v.caption.unwrap().starts_with("E[f(x)] = -1"));
    }

    #[test]
    fn all_zero_attribution_still_renders() {
        let a = attribution(vec![0.0, 0.0]);
        assert!(force_plot(&a, 6).is_ok());
        assert!(waterfall_explanation(&a, 10).is_ok());
    }

    #[test]
    fn blend_endpoints() {
        let low = blend(0.0);
        let high = blend(1.0);
        assert_eq!((low.0, low.1, low.2), (0x00, 0x8B, 0xFB));
        assert_eq!((high.0, high.1, high.2), (0xFF, 0x00, 0x51));
    }
}

//! SVG chart primitives shared by the prediction, explanation and comparison
//! sections. Every chart is drawn with plotters into an in-memory SVG string;
//! the functions are deterministic so the same inputs always render
//! byte-identical markup.

use crate::error::DeskResult;
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;
use std::fmt::Write as _;

pub const POSITIVE_COLOR: RGBColor = RGBColor(0xEF, 0x55, 0x3B);
pub const NEGATIVE_COLOR: RGBColor = RGBColor(0x63, 0x6E, 0xFA);
pub const BAR_COLOR: RGBColor = RGBColor(0x63, 0x6E, 0xFA);
pub const MARKER_COLOR: RGBColor = RGBColor(0x22, 0x22, 0x22);
pub const THRESHOLD_COLOR: RGBColor = RGBColor(0xD6, 0x27, 0x28);
pub const TRACK_COLOR: RGBColor = RGBColor(0xE5, 0xEC, 0xF6);
pub const GUIDE_COLOR: RGBColor = RGBColor(0x99, 0x99, 0x99);
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(0x63, 0x6E, 0xFA),
    RGBColor(0xEF, 0x55, 0x3B),
    RGBColor(0x00, 0xCC, 0x96),
    RGBColor(0xAB, 0x63, 0xFA),
    RGBColor(0xFF, 0xA1, 0x5A),
    RGBColor(0x19, 0xD3, 0xF3),
    RGBColor(0xFF, 0x66, 0x92),
    RGBColor(0xB6, 0xE8, 0x80),
    RGBColor(0xFF, 0x97, 0xFF),
    RGBColor(0xFE, 0xCB, 0x52),
];

pub const WIDTH: u32 = 640;

pub type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// One rendered chart plus its heading and an optional caption.
#[derive(Debug, Clone, PartialEq)]
pub struct Visual {
    pub title: String,
    pub svg: String,
    pub caption: Option<String>,
}

impl Visual {
    pub fn new(title: impl Into<String>, svg: String) -> Self {
        Self {
            title: title.into(),
            svg,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn to_html(&self) -> String {
        let mut html = format!(
            "<figure class=\"chart\"><figcaption>{}</figcaption>{}",
            escape(&self.title),
            self.svg
        );
        if let Some(caption) = &self.caption {
            let _ = write!(html, "<p class=\"caption\">{}</p>", escape(caption));
        }
        html.push_str("</figure>");
        html
    }
}

/// Draw onto a white `width` x `height` canvas and return the SVG markup.
pub fn render_svg<F>(width: u32, height: u32, draw: F) -> DeskResult<String>
where
    F: FnOnce(&Area<'_>) -> DeskResult<()>,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
    }
    Ok(svg)
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `#RRGGBB` form of a palette color.
pub fn hex(color: RGBColor) -> String {
    format!("#{:02X}{:02X}{:02X}", color.0, color.1, color.2)
}

/// Compact number label: integers without decimals, others with up to three.
pub fn fmt_num(v: f64) -> String {
    if v.is_nan() {
        return "NaN".into();
    }
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    let s = format!("{v:.3}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub fn small_text(anchor: HPos) -> TextStyle<'static> {
    ("sans-serif", 11)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(anchor, VPos::Center))
}

fn large_text() -> TextStyle<'static> {
    ("sans-serif", 28)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center))
}

/// Widen a degenerate interval so it can back a chart axis.
pub fn axis_range(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo - 0.5, lo + 0.5)
    }
}

// ── Gauge ─────────────────────────────────────────

const GAUGE_CENTER: (f64, f64) = (160.0, 150.0);
const GAUGE_RADIUS: f64 = 120.0;
const ARC_STEPS: usize = 60;

fn gauge_point(pct: f64, radius: f64) -> (i32, i32) {
    let angle = PI * (1.0 - pct.clamp(0.0, 100.0) / 100.0);
    (
        (GAUGE_CENTER.0 + radius * angle.cos()).round() as i32,
        (GAUGE_CENTER.1 - radius * angle.sin()).round() as i32,
    )
}

fn gauge_arc(to_pct: f64) -> Vec<(i32, i32)> {
    (0..=ARC_STEPS)
        .map(|i| gauge_point(to_pct * i as f64 / ARC_STEPS as f64, GAUGE_RADIUS))
        .collect()
}

/// Half-circle gauge on a 0-100 scale with a threshold tick.
/// The arc is clamped to the dial; the label shows `score` as given.
pub fn gauge(score: f64, threshold: f64, label: &str) -> DeskResult<String> {
    render_svg(320, 190, |root| {
        root.draw(&PathElement::new(
            gauge_arc(100.0),
            TRACK_COLOR.stroke_width(24),
        ))?;
        if score > 0.0 {
            root.draw(&PathElement::new(
                gauge_arc(score.clamp(0.0, 100.0)),
                BAR_COLOR.stroke_width(24),
            ))?;
        }
        root.draw(&PathElement::new(
            vec![
                gauge_point(threshold, GAUGE_RADIUS - 18.0),
                gauge_point(threshold, GAUGE_RADIUS + 12.0),
            ],
            THRESHOLD_COLOR.stroke_width(4),
        ))?;
        for pct in [0.0, 25.0, 50.0, 75.0, 100.0] {
            root.draw(&Text::new(
                fmt_num(pct),
                gauge_point(pct, GAUGE_RADIUS + 26.0),
                small_text(HPos::Center),
            ))?;
        }
        let cx = GAUGE_CENTER.0 as i32;
        let cy = GAUGE_CENTER.1 as i32;
        root.draw(&Text::new(fmt_num(score), (cx, cy - 20), large_text()))?;
        root.draw(&Text::new(
            label.to_string(),
            (cx, cy + 20),
            small_text(HPos::Center),
        ))?;
        Ok(())
    })
}

// ── Histogram ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Sturges' rule: `ceil(log2 n) + 1` bins.
pub fn sturges_bins(n: usize) -> usize {
    if n <= 1 {
        1
    } else {
        (n as f64).log2().ceil() as usize + 1
    }
}

/// Bin `values` (non-finite values are skipped). With `integer_width` the bin
/// width is a whole number at least 1, for attributes measured in years.
pub fn histogram(values: &[f64], integer_width: bool) -> Histogram {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Histogram {
            edges: vec![0.0, 1.0],
            counts: vec![0],
        };
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let k = sturges_bins(finite.len());

    let (start, width, bins) = if integer_width {
        let start = min.floor();
        let width = ((max - start + 1.0) / k as f64).ceil().max(1.0);
        let bins = ((max - start) / width).floor() as usize + 1;
        (start, width, bins)
    } else if max > min {
        (min, (max - min) / k as f64, k)
    } else {
        (min - 0.5, 1.0, 1)
    };

    let edges = (0..=bins).map(|i| start + i as f64 * width).collect();
    let mut counts = vec![0usize; bins];
    for v in finite {
        let idx = (((v - start) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Histogram { edges, counts }
}

/// Bar chart of a histogram with an optional dashed vertical marker.
pub fn histogram_svg(hist: &Histogram, x_label: &str, marker: Option<f64>) -> DeskResult<String> {
    let marker = marker.filter(|m| m.is_finite());
    let lo = hist.edges.first().copied().unwrap_or(0.0);
    let hi = hist.edges.last().copied().unwrap_or(1.0);
    let (lo, hi) = match marker {
        Some(m) => axis_range(lo.min(m), hi.max(m)),
        None => axis_range(lo, hi),
    };
    let max_count = hist.counts.iter().copied().max().unwrap_or(0).max(1);
    let y_max = max_count as f64 * 1.1;

    render_svg(WIDTH, 260, |root| {
        let mut chart = ChartBuilder::on(root)
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(45)
            .build_cartesian_2d(lo..hi, 0f64..y_max)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(x_label)
            .x_label_formatter(&|v| fmt_num(*v))
            .y_label_formatter(&|v| fmt_num(v.round()))
            .draw()?;

        chart.draw_series(hist.counts.iter().enumerate().map(|(i, &count)| {
            let mut bar = Rectangle::new(
                [(hist.edges[i], 0.0), (hist.edges[i + 1], count as f64)],
                BAR_COLOR.filled(),
            );
            bar.set_margin(0, 0, 1, 1);
            bar
        }))?;

        if let Some(m) = marker {
            chart.draw_series(DashedLineSeries::new(
                vec![(m, 0.0), (m, y_max)],
                6,
                4,
                MARKER_COLOR.stroke_width(2),
            ))?;
            chart.draw_series(std::iter::once(
                EmptyElement::at((m, y_max))
                    + Text::new(fmt_num(m), (4, 8), small_text(HPos::Left)),
            ))?;
        }
        Ok(())
    })
}

// ── Pie ───────────────────────────────────────────

/// Pie of `(label, count)` slices drawn clockwise from twelve o'clock in the
/// given order, each labelled with its share.
pub fn pie_svg(slices: &[(String, usize)]) -> DeskResult<String> {
    let total: usize = slices.iter().map(|(_, c)| c).sum();
    let mut sizes = Vec::with_capacity(slices.len());
    let mut colors = Vec::with_capacity(slices.len());
    let mut labels = Vec::with_capacity(slices.len());
    for (i, (label, count)) in slices.iter().enumerate() {
        if *count > 0 {
            sizes.push(*count as f64);
            colors.push(PALETTE[i % PALETTE.len()]);
            labels.push(label.clone());
        }
    }

    render_svg(WIDTH, 300, |root| {
        if total == 0 {
            return Ok(());
        }
        let center = (WIDTH as i32 / 2, 150);
        let radius = 100.0;
        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
        pie.start_angle(-90.0);
        pie.label_style(small_text(HPos::Center));
        pie.percentages(("sans-serif", 11).into_font().color(&WHITE));
        root.draw(&pie)?;
        Ok(())
    })
}

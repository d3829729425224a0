//! Evidence-map figures.
//!
//! Figure content is computed into renderer-neutral chart models
//! ([`BarChart`], [`ScatterChart`]); a [`ChartRenderer`] turns a model into
//! a document. [`SvgRenderer`] is the shipped renderer.

use crate::models::{ranked, RobRating, VigilanceSummary, WorkRecord, MISSING_BUCKET};
use html_escape::encode_text;
use std::collections::BTreeMap;

/// Series colors per eligibility tier.
pub const TIER_COLORS: [(&str, &str); 3] = [
    ("T1_core", "#1f77b4"),
    ("T2_context", "#ff7f0e"),
    (MISSING_BUCKET, "#7f7f7f"),
];

/// Colors assigned to the most frequent primary categories, in rank order.
pub const CATEGORY_PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Color for points outside the top categories.
pub const DEFAULT_POINT_COLOR: &str = "#444444";

const LEGEND_MARKER_COLOR: &str = "#999999";
const TOP_CATEGORIES: usize = 8;

/// Label offsets (points) cycled through for core works sharing a position.
const LABEL_OFFSETS: [(f64, f64); 14] = [
    (12.0, 14.0),
    (12.0, -14.0),
    (-12.0, 14.0),
    (-12.0, -14.0),
    (24.0, 24.0),
    (24.0, -24.0),
    (-24.0, 24.0),
    (-24.0, -24.0),
    (36.0, 0.0),
    (-36.0, 0.0),
    (12.0, 30.0),
    (12.0, -30.0),
    (-12.0, 30.0),
    (-12.0, -30.0),
];

/// How the series of a bar chart are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarLayout {
    /// One horizontal bar per category, series stacked left to right.
    StackedHorizontal,
    /// Vertical bars per category, series side by side.
    GroupedVertical,
}

/// One colored series of per-category counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub color: &'static str,
    /// One value per chart category, in category order.
    pub values: Vec<usize>,
}

impl Series {
    pub fn total(&self) -> usize {
        self.values.iter().sum()
    }
}

/// Categorical count chart.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub value_label: String,
    pub layout: BarLayout,
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

impl BarChart {
    /// Sum of all series for the category at `index`.
    pub fn category_total(&self, index: usize) -> usize {
        self.series
            .iter()
            .map(|s| s.values.get(index).copied().unwrap_or(0))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Triangle,
    Square,
}

/// Text attached to a scatter point, offset in points from its anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLabel {
    pub text: String,
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub x: f64,
    /// Index into [`ScatterChart::y_categories`].
    pub y: usize,
    pub color: &'static str,
    pub marker: Marker,
    pub emphasized: bool,
    pub label: Option<PointLabel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: &'static str,
    pub marker: Marker,
}

/// Scatter over a log-scaled x axis and a categorical y axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterChart {
    pub title: String,
    pub x_label: String,
    /// Bottom to top.
    pub y_categories: Vec<String>,
    pub points: Vec<ScatterPoint>,
    pub legend: Vec<LegendEntry>,
}

/// Turns chart models into rendered documents.
pub trait ChartRenderer {
    fn render_bars(&self, chart: &BarChart) -> String;
    fn render_scatter(&self, chart: &ScatterChart) -> String;
}

fn tier_bucket(work: &WorkRecord) -> &'static str {
    work.tier().map(|t| t.as_str()).unwrap_or(MISSING_BUCKET)
}

fn category_totals(works: &[WorkRecord]) -> BTreeMap<String, usize> {
    let mut totals = BTreeMap::new();
    for work in works {
        *totals.entry(work.category_label().to_string()).or_insert(0) += 1;
    }
    totals
}

/// Fig 1: works per primary category, stacked by tier.
///
/// Categories run by descending total; tiers with no works are omitted.
pub fn study_counts_chart(works: &[WorkRecord], label: &str) -> BarChart {
    let totals = category_totals(works);
    let categories: Vec<String> = ranked(&totals).into_iter().map(|(c, _)| c.to_string()).collect();

    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for work in works {
        *counts
            .entry((tier_bucket(work), work.category_label()))
            .or_insert(0) += 1;
    }

    let series = TIER_COLORS
        .iter()
        .map(|(tier, color)| Series {
            label: tier.to_string(),
            color: *color,
            values: categories
                .iter()
                .map(|c| counts.get(&(*tier, c.as_str())).copied().unwrap_or(0))
                .collect(),
        })
        .filter(|s| s.total() > 0)
        .collect();

    BarChart {
        title: format!(
            "{}: Extracted Works by Primary Intervention Category (Unique Works)",
            label
        ),
        value_label: "Number of works".to_string(),
        layout: BarLayout::StackedHorizontal,
        categories,
        series,
    }
}

/// Fig 2: vigilance durability map.
///
/// One point per work with a vigilance outcome and a positive maximum
/// duration. Core works are labelled by id; labels sharing a rounded
/// position cycle through fixed offsets.
pub fn durability_chart(works: &[WorkRecord], label: &str) -> ScatterChart {
    let totals = category_totals(works);
    let top: Vec<&str> = ranked(&totals)
        .into_iter()
        .take(TOP_CATEGORIES)
        .map(|(c, _)| c)
        .collect();
    let color_for = |category: &str| {
        top.iter()
            .position(|c| *c == category)
            .map(|i| CATEGORY_PALETTE[i])
            .unwrap_or(DEFAULT_POINT_COLOR)
    };

    let axis = VigilanceSummary::DURABILITY_AXIS;
    let unclear = axis
        .iter()
        .position(|s| *s == VigilanceSummary::Unclear)
        .unwrap_or(0);

    let mut clusters: BTreeMap<(i64, usize), usize> = BTreeMap::new();
    let mut points = Vec::new();

    for work in works.iter().filter(|w| w.has_vigilance_outcome) {
        let x = match work.exposure_days_max {
            Some(x) if x > 0.0 => x,
            _ => continue,
        };
        let y = axis
            .iter()
            .position(|s| *s == work.vigilance_effect_summary)
            .unwrap_or(unclear);
        let marker = match tier_bucket(work) {
            "T1_core" => Marker::Circle,
            "T2_context" => Marker::Triangle,
            _ => Marker::Square,
        };

        let id_label = if work.is_core() {
            let seen = clusters.entry((x.round() as i64, y)).or_insert(0);
            let (dx, dy) = LABEL_OFFSETS[*seen % LABEL_OFFSETS.len()];
            *seen += 1;
            Some(PointLabel {
                text: work.short_id.clone(),
                dx,
                dy,
            })
        } else {
            None
        };

        points.push(ScatterPoint {
            x,
            y,
            color: color_for(work.category_label()),
            marker,
            emphasized: work.is_core(),
            label: id_label,
        });
    }

    let mut legend = vec![
        LegendEntry {
            label: "T1_core".to_string(),
            color: LEGEND_MARKER_COLOR,
            marker: Marker::Circle,
        },
        LegendEntry {
            label: "T2_context".to_string(),
            color: LEGEND_MARKER_COLOR,
            marker: Marker::Triangle,
        },
    ];
    legend.extend(top.iter().map(|c| LegendEntry {
        label: c.to_string(),
        color: color_for(*c),
        marker: Marker::Circle,
    }));

    ScatterChart {
        title: format!("{}: Vigilance Durability Map (Work-Level Summary)", label),
        x_label: "Repeated-use duration (days; max per work; log scale)".to_string(),
        y_categories: axis.iter().map(|s| s.as_str().to_string()).collect(),
        points,
        legend,
    }
}

/// Fig 3: overall risk-of-bias rating by tier.
///
/// Unrecognized ratings count toward the missing bucket.
pub fn risk_of_bias_chart(works: &[WorkRecord], label: &str) -> BarChart {
    let mut categories: Vec<String> = RobRating::ALL.iter().map(|r| r.as_str().to_string()).collect();
    categories.push(MISSING_BUCKET.to_string());

    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for work in works {
        let rating = RobRating::from_label(&work.rob_overall)
            .map(|r| r.as_str())
            .unwrap_or(MISSING_BUCKET);
        *counts.entry((tier_bucket(work), rating)).or_insert(0) += 1;
    }

    let series = TIER_COLORS
        .iter()
        .map(|(tier, color)| Series {
            label: tier.to_string(),
            color: *color,
            values: categories
                .iter()
                .map(|r| counts.get(&(*tier, r.as_str())).copied().unwrap_or(0))
                .collect(),
        })
        .collect();

    BarChart {
        title: format!("{}: Risk of Bias (Overall) Distribution by Tier", label),
        value_label: "Number of works".to_string(),
        layout: BarLayout::GroupedVertical,
        categories,
        series,
    }
}

/// Writes charts as standalone SVG documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgRenderer;

const FONT: &str = "font-family=\"Helvetica, Arial, sans-serif\"";
const CHAR_WIDTH: f64 = 7.0;

/// Round `max` up to a tick-friendly axis end; returns `(axis_max, step)`.
fn value_axis(max: usize) -> (usize, usize) {
    let mut magnitude = 1;
    let step = loop {
        if let Some(step) = [1, 2, 5]
            .iter()
            .map(|b| b * magnitude)
            .find(|s| max / s <= 8)
        {
            break step;
        }
        magnitude *= 10;
    };
    let axis_max = max.div_ceil(step).max(1) * step;
    (axis_max, step)
}

/// Decade bounds covering every x value; `(1, 10)` when there are none.
fn log_domain(xs: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
        (lo.min(x), hi.max(x))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return (1.0, 10.0);
    }
    let lo = lo.log10().floor() as i32;
    let mut hi = hi.log10().ceil() as i32;
    if hi <= lo {
        hi = lo + 1;
    }
    (10f64.powi(lo), 10f64.powi(hi))
}

fn svg_open(width: f64, height: f64) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w:.0}\" height=\"{h:.0}\" viewBox=\"0 0 {w:.0} {h:.0}\">\n\
         <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n",
        w = width,
        h = height
    )
}

fn svg_text(x: f64, y: f64, anchor: &str, size: f64, text: &str) -> String {
    format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"{}\" font-size=\"{}\" {}>{}</text>\n",
        x,
        y,
        anchor,
        size,
        FONT,
        encode_text(text)
    )
}

fn svg_line(x1: f64, y1: f64, x2: f64, y2: f64, style: &str) -> String {
    format!(
        "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" {}/>\n",
        x1, y1, x2, y2, style
    )
}

fn svg_marker(marker: Marker, cx: f64, cy: f64, r: f64, color: &str) -> String {
    let style = format!(
        "fill=\"{}\" fill-opacity=\"0.85\" stroke=\"white\" stroke-width=\"0.7\"",
        color
    );
    match marker {
        Marker::Circle => format!(
            "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{:.1}\" {}/>\n",
            cx, cy, r, style
        ),
        Marker::Square => format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" {}/>\n",
            cx - r,
            cy - r,
            2.0 * r,
            2.0 * r,
            style
        ),
        Marker::Triangle => format!(
            "<polygon points=\"{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}\" {}/>\n",
            cx,
            cy - r * 1.15,
            cx - r,
            cy + r * 0.75,
            cx + r,
            cy + r * 0.75,
            style
        ),
    }
}

/// Legend swatches laid out left to right from `(x, y)`.
fn svg_legend(entries: &[(String, &str, Marker)], x: f64, y: f64) -> String {
    let mut out = String::new();
    let mut cursor = x;
    for (label, color, marker) in entries {
        out.push_str(&svg_marker(*marker, cursor + 5.0, y - 4.0, 5.0, color));
        out.push_str(&svg_text(cursor + 14.0, y, "start", 11.0, label));
        cursor += 30.0 + label.chars().count() as f64 * CHAR_WIDTH;
    }
    out
}

impl SvgRenderer {
    fn stacked_horizontal(&self, chart: &BarChart) -> String {
        let longest = chart
            .categories
            .iter()
            .map(|c| c.chars().count())
            .max()
            .unwrap_or(0);
        let left = (longest as f64 * CHAR_WIDTH + 16.0).max(80.0);
        let plot_width = 640.0;
        let row = 26.0;
        let top = 48.0;
        let plot_height = chart.categories.len().max(1) as f64 * row;
        let width = left + plot_width + 40.0;
        let height = top + plot_height + 90.0;

        let max = (0..chart.categories.len())
            .map(|i| chart.category_total(i))
            .max()
            .unwrap_or(0);
        let (axis_max, step) = value_axis(max);
        let scale = plot_width / axis_max as f64;

        let mut svg = svg_open(width, height);
        svg.push_str(&svg_text(width / 2.0, 24.0, "middle", 14.0, &chart.title));

        for tick in (0..=axis_max).step_by(step) {
            let x = left + tick as f64 * scale;
            svg.push_str(&svg_line(
                x,
                top,
                x,
                top + plot_height,
                "stroke=\"#dddddd\" stroke-width=\"0.6\"",
            ));
            svg.push_str(&svg_text(
                x,
                top + plot_height + 16.0,
                "middle",
                11.0,
                &tick.to_string(),
            ));
        }

        for (i, category) in chart.categories.iter().enumerate() {
            let y = top + i as f64 * row;
            let mut offset = 0;
            for series in &chart.series {
                let value = series.values.get(i).copied().unwrap_or(0);
                if value == 0 {
                    continue;
                }
                svg.push_str(&format!(
                    "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\"><title>{}: {}</title></rect>\n",
                    left + offset as f64 * scale,
                    y + row * 0.15,
                    value as f64 * scale,
                    row * 0.7,
                    series.color,
                    encode_text(&series.label),
                    value
                ));
                offset += value;
            }
            svg.push_str(&svg_text(left - 8.0, y + row * 0.62, "end", 11.0, category));
        }

        svg.push_str(&svg_line(
            left,
            top,
            left,
            top + plot_height,
            "stroke=\"#333333\" stroke-width=\"1\"",
        ));
        svg.push_str(&svg_text(
            left + plot_width / 2.0,
            top + plot_height + 38.0,
            "middle",
            12.0,
            &chart.value_label,
        ));

        let entries: Vec<(String, &str, Marker)> = chart
            .series
            .iter()
            .map(|s| (s.label.clone(), s.color, Marker::Square))
            .collect();
        svg.push_str(&svg_legend(&entries, left, top + plot_height + 66.0));

        svg.push_str("</svg>\n");
        svg
    }

    fn grouped_vertical(&self, chart: &BarChart) -> String {
        let left = 70.0;
        let top = 48.0;
        let plot_width = 760.0;
        let plot_height = 320.0;
        let width = left + plot_width + 30.0;
        let height = top + plot_height + 100.0;

        let max = chart
            .series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .max()
            .unwrap_or(0);
        let (axis_max, step) = value_axis(max);
        let scale = plot_height / axis_max as f64;
        let baseline = top + plot_height;

        let groups = chart.categories.len().max(1) as f64;
        let group_width = plot_width / groups;
        let bar_width = group_width * 0.25;
        let n_series = chart.series.len() as f64;

        let mut svg = svg_open(width, height);
        svg.push_str(&svg_text(width / 2.0, 24.0, "middle", 14.0, &chart.title));

        for tick in (0..=axis_max).step_by(step) {
            let y = baseline - tick as f64 * scale;
            svg.push_str(&svg_line(
                left,
                y,
                left + plot_width,
                y,
                "stroke=\"#dddddd\" stroke-width=\"0.6\"",
            ));
            svg.push_str(&svg_text(left - 8.0, y + 4.0, "end", 11.0, &tick.to_string()));
        }

        for (i, category) in chart.categories.iter().enumerate() {
            let center = left + (i as f64 + 0.5) * group_width;
            for (j, series) in chart.series.iter().enumerate() {
                let value = series.values.get(i).copied().unwrap_or(0);
                let x = center + (j as f64 - (n_series - 1.0) / 2.0) * bar_width - bar_width / 2.0;
                let h = value as f64 * scale;
                svg.push_str(&format!(
                    "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\" fill-opacity=\"0.9\"><title>{} / {}: {}</title></rect>\n",
                    x,
                    baseline - h,
                    bar_width,
                    h,
                    series.color,
                    encode_text(&series.label),
                    encode_text(category),
                    value
                ));
            }
            svg.push_str(&svg_text(center, baseline + 18.0, "middle", 11.0, category));
        }

        svg.push_str(&svg_line(
            left,
            baseline,
            left + plot_width,
            baseline,
            "stroke=\"#333333\" stroke-width=\"1\"",
        ));
        svg.push_str(&format!(
            "<text x=\"18\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"12\" {} transform=\"rotate(-90 18 {:.1})\">{}</text>\n",
            top + plot_height / 2.0,
            FONT,
            top + plot_height / 2.0,
            encode_text(&chart.value_label)
        ));

        let entries: Vec<(String, &str, Marker)> = chart
            .series
            .iter()
            .map(|s| (s.label.clone(), s.color, Marker::Square))
            .collect();
        svg.push_str(&svg_legend(&entries, left, baseline + 50.0));

        svg.push_str("</svg>\n");
        svg
    }
}

impl ChartRenderer for SvgRenderer {
    fn render_bars(&self, chart: &BarChart) -> String {
        match chart.layout {
            BarLayout::StackedHorizontal => self.stacked_horizontal(chart),
            BarLayout::GroupedVertical => self.grouped_vertical(chart),
        }
    }

    fn render_scatter(&self, chart: &ScatterChart) -> String {
        let left = 90.0;
        let top = 48.0;
        let plot_width = 820.0;
        let plot_height = 380.0;
        let width = left + plot_width + 40.0;
        let height = top + plot_height + 110.0;
        let baseline = top + plot_height;

        let (lo, hi) = log_domain(chart.points.iter().map(|p| p.x));
        let (log_lo, log_hi) = (lo.log10(), hi.log10());
        let x_at = |x: f64| left + (x.log10() - log_lo) / (log_hi - log_lo) * plot_width;

        let rows = chart.y_categories.len().max(1) as f64;
        let y_at = |y: usize| baseline - (y as f64 + 0.5) / rows * plot_height;

        let mut svg = svg_open(width, height);
        svg.push_str(&svg_text(width / 2.0, 24.0, "middle", 14.0, &chart.title));

        let mut decade = log_lo.round() as i32;
        while decade <= log_hi.round() as i32 {
            let value = 10f64.powi(decade);
            let x = x_at(value);
            svg.push_str(&svg_line(
                x,
                top,
                x,
                baseline,
                "stroke=\"#bbbbbb\" stroke-width=\"0.6\" stroke-dasharray=\"2,3\"",
            ));
            svg.push_str(&svg_text(
                x,
                baseline + 16.0,
                "middle",
                11.0,
                &crate::models::format_days(value),
            ));
            for minor in 2..10 {
                let mx = value * minor as f64;
                if mx >= hi {
                    break;
                }
                let x = x_at(mx);
                svg.push_str(&svg_line(
                    x,
                    top,
                    x,
                    baseline,
                    "stroke=\"#e5e5e5\" stroke-width=\"0.5\" stroke-dasharray=\"1,3\"",
                ));
            }
            decade += 1;
        }

        for (i, category) in chart.y_categories.iter().enumerate() {
            svg.push_str(&svg_text(left - 10.0, y_at(i) + 4.0, "end", 11.0, category));
        }

        svg.push_str(&format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"none\" stroke=\"#333333\" stroke-width=\"1\"/>\n",
            left, top, plot_width, plot_height
        ));

        for point in &chart.points {
            let (cx, cy) = (x_at(point.x), y_at(point.y));
            let r = if point.emphasized { 6.0 } else { 5.0 };
            svg.push_str(&svg_marker(point.marker, cx, cy, r, point.color));
        }

        // Labels after markers so they stay on top.
        for point in &chart.points {
            let Some(ref label) = point.label else {
                continue;
            };
            let (cx, cy) = (x_at(point.x), y_at(point.y));
            let (lx, ly) = (cx + label.dx, cy - label.dy);
            let anchor = if label.dx >= 0.0 { "start" } else { "end" };
            svg.push_str(&svg_line(
                cx,
                cy,
                lx,
                ly,
                "stroke=\"#8c8c8c\" stroke-width=\"0.6\" stroke-opacity=\"0.7\"",
            ));
            svg.push_str(&format!(
                "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"{}\" font-size=\"8.5\" {} paint-order=\"stroke\" stroke=\"white\" stroke-width=\"3\">{}</text>\n",
                lx,
                ly + 3.0,
                anchor,
                FONT,
                encode_text(&label.text)
            ));
        }

        svg.push_str(&svg_text(
            left + plot_width / 2.0,
            baseline + 38.0,
            "middle",
            12.0,
            &chart.x_label,
        ));

        let entries: Vec<(String, &str, Marker)> = chart
            .legend
            .iter()
            .map(|e| (e.label.clone(), e.color, e.marker))
            .collect();
        let (first, rest) = entries.split_at(entries.len().min(6));
        svg.push_str(&svg_legend(first, left, baseline + 68.0));
        svg.push_str(&svg_legend(rest, left, baseline + 88.0));

        svg.push_str("</svg>\n");
        svg
    }
}

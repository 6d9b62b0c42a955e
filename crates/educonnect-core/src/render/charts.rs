//! Presentational charts over aggregates already computed by `query`.

use std::fmt::Write as _;

use super::html::escape;
use crate::query::{CoursePerformance, GradeDistribution, MonthlyAverage};

const DISTRIBUTION_COLORS: [&str; 5] = [
    "var(--chart-2)",
    "var(--chart-1)",
    "var(--chart-3)",
    "var(--chart-4)",
    "var(--destructive)",
];

pub fn distribution_chart(dist: &GradeDistribution) -> String {
    let total = dist.total();
    let degrees = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 360.0
        }
    };

    let mut start = 0.0;
    let mut stops = Vec::with_capacity(5);
    let mut legend = String::new();
    for ((letter, count), color) in dist.buckets().into_iter().zip(DISTRIBUTION_COLORS) {
        let end = start + degrees(count);
        stops.push(format!("{color} {start}deg {end}deg"));
        start = end;

        let _ = write!(
            legend,
            r#"<div class="legend-item"><div class="legend-color" style="background: {color}"></div><span class="legend-text">{letter}: {count} ({}%)</span></div>"#,
            dist.percent(count)
        );
    }
    if dist.unbucketed > 0 {
        let _ = write!(
            legend,
            r#"<div class="legend-item"><span class="legend-text">Other: {}</span></div>"#,
            dist.unbucketed
        );
    }

    format!(
        r#"<div class="chart-container"><h3 class="chart-title">Grade Distribution</h3><div class="pie-chart"><div class="pie-chart-visual" style="background: conic-gradient({})"></div><div class="pie-chart-legend">{legend}</div></div></div>"#,
        stops.join(", ")
    )
}

pub fn performance_chart(performance: &[CoursePerformance]) -> String {
    let mut bars = String::new();
    let mut labels = String::new();
    for (idx, course) in performance.iter().enumerate() {
        let name = escape(&course.name);
        let _ = write!(
            bars,
            r#"<div class="performance-bar" style="height: {}%; background: var(--chart-{})" data-value="{}%" title="{name}: {}%"></div>"#,
            course.average.max(10),
            idx % 4 + 1,
            course.average,
            course.average
        );
        let short: String = course.name.chars().take(8).collect();
        let _ = write!(
            labels,
            r#"<span class="performance-label">{}</span>"#,
            escape(&short)
        );
    }

    format!(
        r#"<div class="chart-container"><h3 class="chart-title">Course Performance</h3><div class="performance-chart">{bars}</div><div class="performance-labels">{labels}</div></div>"#
    )
}

pub fn progress_chart(months: &[MonthlyAverage]) -> String {
    let mut items = String::new();
    for month in months {
        let _ = write!(
            items,
            r#"<div class="progress-item"><span class="progress-label">{}</span><div class="progress-bar"><div class="progress-fill" style="width: {}%; background: var(--chart-2)"></div></div><span class="progress-value">{}%</span></div>"#,
            escape(&month.label),
            month.average,
            month.average
        );
    }

    format!(
        r#"<div class="chart-container"><h3 class="chart-title">Grade Progress</h3><div class="progress-chart">{items}</div></div>"#
    )
}

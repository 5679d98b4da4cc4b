// Grouped bar chart of a metric by school and year.

use crate::analyzer::{format_number, BarPoint};
use crate::models::UNKNOWN_YEAR;
use crate::render::html_escape;
use std::collections::BTreeSet;

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 380.0;
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 90.0;

const YEAR_PALETTE: [&str; 8] = [
    "#0d0887", "#5302a3", "#8b0aa5", "#b83289", "#db5c68", "#f48849", "#febd2a", "#2a9d8f",
];

pub fn year_label(year: i32) -> String {
    if year == UNKNOWN_YEAR {
        "Unknown".to_string()
    } else {
        year.to_string()
    }
}

pub fn render_bar_chart_svg(points: &[BarPoint], title: &str, value_label: &str) -> String {
    let schools: Vec<&str> = {
        let mut seen: Vec<&str> = Vec::new();
        for p in points {
            if !seen.contains(&p.school.as_str()) {
                seen.push(&p.school);
            }
        }
        seen
    };
    let years: Vec<i32> = points
        .iter()
        .map(|p| p.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let max = points.iter().map(|p| p.value).fold(0.0_f64, f64::max);
    let max = if max > 0.0 { max } else { 1.0 };

    let mut svg = format!(
        r#"<svg viewBox="0 0 {w} {h}" class="bar-chart" role="img" aria-label="{title}"><text x="{tx}" y="22" font-size="15" font-weight="600">{title}</text>"#,
        w = WIDTH,
        h = HEIGHT,
        tx = MARGIN_LEFT,
        title = html_escape(title),
    );

    // Axes and a few gridlines.
    for step in 0..=4 {
        let value = max * step as f64 / 4.0;
        let y = MARGIN_TOP + plot_h - plot_h * step as f64 / 4.0;
        svg.push_str(&format!(
            r#"<line x1="{x1}" y1="{y:.1}" x2="{x2}" y2="{y:.1}" stroke="lightgray" stroke-width="1" /><text x="{tx}" y="{ty:.1}" font-size="10" text-anchor="end">{label}</text>"#,
            x1 = MARGIN_LEFT,
            x2 = WIDTH - MARGIN_RIGHT,
            y = y,
            tx = MARGIN_LEFT - 6.0,
            ty = y + 3.0,
            label = format_number(value),
        ));
    }
    svg.push_str(&format!(
        r#"<text x="14" y="{y:.1}" font-size="11" transform="rotate(-90,14,{y:.1})" text-anchor="middle">{label}</text>"#,
        y = MARGIN_TOP + plot_h / 2.0,
        label = html_escape(value_label),
    ));

    if !schools.is_empty() {
        let group_w = plot_w / schools.len() as f64;
        let bar_w = (group_w * 0.8) / years.len().max(1) as f64;

        for (gi, school) in schools.iter().enumerate() {
            let group_x = MARGIN_LEFT + gi as f64 * group_w + group_w * 0.1;
            for p in points.iter().filter(|p| p.school == *school) {
                let yi = years.iter().position(|y| *y == p.year).unwrap_or(0);
                let bar_h = plot_h * p.value / max;
                svg.push_str(&format!(
                    r#"<rect class="bar" x="{x:.1}" y="{y:.1}" width="{bw:.1}" height="{bh:.1}" fill="{fill}"><title>{school} {year}: {value}</title></rect>"#,
                    x = group_x + yi as f64 * bar_w,
                    y = MARGIN_TOP + plot_h - bar_h,
                    bw = bar_w,
                    bh = bar_h,
                    fill = YEAR_PALETTE[yi % YEAR_PALETTE.len()],
                    school = html_escape(school),
                    year = year_label(p.year),
                    value = format_number(p.value),
                ));
            }
            let lx = MARGIN_LEFT + gi as f64 * group_w + group_w / 2.0;
            let ly = MARGIN_TOP + plot_h + 14.0;
            svg.push_str(&format!(
                r#"<text x="{lx:.1}" y="{ly:.1}" font-size="10" text-anchor="end" transform="rotate(-30,{lx:.1},{ly:.1})">{school}</text>"#,
                school = html_escape(school),
            ));
        }
    }

    // Legend
    for (yi, year) in years.iter().enumerate() {
        let x = MARGIN_LEFT + yi as f64 * 80.0;
        let y = HEIGHT - 16.0;
        svg.push_str(&format!(
            r#"<rect x="{x:.1}" y="{ry:.1}" width="10" height="10" fill="{fill}" /><text x="{tx:.1}" y="{y:.1}" font-size="11">{label}</text>"#,
            ry = y - 9.0,
            tx = x + 14.0,
            fill = YEAR_PALETTE[yi % YEAR_PALETTE.len()],
            label = year_label(*year),
        ));
    }

    svg.push_str("</svg>");
    svg
}

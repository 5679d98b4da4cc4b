//! State coordinates and the participant bubble map.

use crate::render::html_escape;
use tracing::debug;

/// Approximate centroid (lat, lon) of Indian states and union territories.
const STATE_COORDS: [(&str, f64, f64); 31] = [
    ("Andhra Pradesh", 15.9129, 79.7400),
    ("Arunachal Pradesh", 28.2180, 94.7278),
    ("Assam", 26.2006, 92.9376),
    ("Bihar", 25.0961, 85.3131),
    ("Chhattisgarh", 21.2787, 81.8661),
    ("Goa", 15.2993, 74.1240),
    ("Gujarat", 22.2587, 71.1924),
    ("Haryana", 29.0588, 76.0856),
    ("Himachal Pradesh", 31.1048, 77.1734),
    ("Jharkhand", 23.6102, 85.2799),
    ("Karnataka", 15.3173, 75.7139),
    ("Kerala", 10.8505, 76.2711),
    ("Madhya Pradesh", 22.9734, 78.6569),
    ("Maharashtra", 19.7515, 75.7139),
    ("Manipur", 24.6637, 93.9063),
    ("Meghalaya", 25.4670, 91.3662),
    ("Mizoram", 23.1645, 92.9376),
    ("Nagaland", 26.1584, 94.5624),
    ("Odisha", 20.9517, 85.0985),
    ("Punjab", 31.1471, 75.3412),
    ("Rajasthan", 27.0238, 74.2179),
    ("Sikkim", 27.5330, 88.5122),
    ("Tamil Nadu", 11.1271, 78.6569),
    ("Telangana", 18.1124, 79.0193),
    ("Tripura", 23.9408, 91.9882),
    ("Uttar Pradesh", 26.8467, 80.9462),
    ("Uttarakhand", 30.0668, 79.0193),
    ("West Bengal", 22.9868, 87.8550),
    ("Delhi", 28.7041, 77.1025),
    ("Jammu and Kashmir", 33.7782, 76.5762),
    ("Ladakh", 34.1526, 77.5770),
];

const LAT_RANGE: (f64, f64) = (6.0, 38.0);
const LON_RANGE: (f64, f64) = (68.0, 98.0);
const MAP_WIDTH: f64 = 600.0;
const MAP_HEIGHT: f64 = 640.0;
const MAX_BUBBLE_RADIUS: f64 = 36.0;
const MIN_BUBBLE_RADIUS: f64 = 4.0;

pub fn coordinates(state: &str) -> Option<(f64, f64)> {
    STATE_COORDS
        .iter()
        .find(|(name, _, _)| *name == state)
        .map(|&(_, lat, lon)| (lat, lon))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub state: String,
    pub count: usize,
    pub lat: f64,
    pub lon: f64,
}

/// Attach coordinates to per-state counts. States with no known coordinates
/// are dropped.
pub fn bubbles(counts: &[(String, usize)]) -> Vec<Bubble> {
    counts
        .iter()
        .filter_map(|(state, count)| match coordinates(state) {
            Some((lat, lon)) => Some(Bubble {
                state: state.clone(),
                count: *count,
                lat,
                lon,
            }),
            None => {
                debug!(%state, count, "no coordinates for state, leaving it off the map");
                None
            }
        })
        .collect()
}

/// Equirectangular projection of the lat/lon window onto the SVG canvas.
pub fn project(lat: f64, lon: f64) -> (f64, f64) {
    let x = (lon - LON_RANGE.0) / (LON_RANGE.1 - LON_RANGE.0) * MAP_WIDTH;
    let y = (LAT_RANGE.1 - lat) / (LAT_RANGE.1 - LAT_RANGE.0) * MAP_HEIGHT;
    (x, y)
}

/// Yellow-orange-brown ramp, `t` in [0, 1].
fn ylorbr(t: f64) -> String {
    const STOPS: [(f64, (u8, u8, u8)); 3] = [
        (0.0, (255, 247, 188)),
        (0.5, (254, 153, 41)),
        (1.0, (102, 37, 6)),
    ];
    let t = t.clamp(0.0, 1.0);
    let (lo, hi) = if t <= 0.5 { (STOPS[0], STOPS[1]) } else { (STOPS[1], STOPS[2]) };
    let local = (t - lo.0) / (hi.0 - lo.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * local).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        mix(lo.1 .0, hi.1 .0),
        mix(lo.1 .1, hi.1 .1),
        mix(lo.1 .2, hi.1 .2)
    )
}

pub fn render_bubble_map_svg(bubbles: &[Bubble]) -> String {
    let max = bubbles.iter().map(|b| b.count).max().unwrap_or(1).max(1) as f64;

    let mut svg = format!(
        r##"<svg viewBox="0 0 {w} {h}" class="bubble-map" role="img" aria-label="Participant distribution by state"><rect x="0" y="0" width="{w}" height="{h}" fill="#f4f7fb" />"##,
        w = MAP_WIDTH,
        h = MAP_HEIGHT,
    );

    // Largest first so small bubbles stay visible on top.
    let mut ordered: Vec<&Bubble> = bubbles.iter().collect();
    ordered.sort_by(|a, b| b.count.cmp(&a.count));

    for bubble in ordered {
        let (x, y) = project(bubble.lat, bubble.lon);
        let share = bubble.count as f64 / max;
        let r = (MIN_BUBBLE_RADIUS + (MAX_BUBBLE_RADIUS - MIN_BUBBLE_RADIUS) * share.sqrt())
            .round();
        let state = html_escape(&bubble.state);
        svg.push_str(&format!(
            r##"<g class="bubble"><circle cx="{x:.1}" cy="{y:.1}" r="{r}" fill="{fill}" fill-opacity="0.8" stroke="#7f3b08" stroke-width="1"><title>{state}: {count}</title></circle><text x="{x:.1}" y="{ty:.1}" font-size="11" text-anchor="middle">{state}</text></g>"##,
            x = x,
            y = y,
            r = r,
            fill = ylorbr(share),
            state = state,
            count = bubble.count,
            ty = y + r + 12.0,
        ));
    }

    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_states_are_dropped() {
        let counts = vec![
            ("Goa".to_string(), 3),
            ("Unknown".to_string(), 5),
            ("Central".to_string(), 1),
        ];
        let bubbles = bubbles(&counts);
        assert_eq!(bubbles.len(), 1);
        assert_eq!(bubbles[0].state, "Goa");
        assert_eq!(bubbles[0].count, 3);
    }

    #[test]
    fn projection_maps_window_corners() {
        assert_eq!(project(38.0, 68.0), (0.0, 0.0));
        assert_eq!(project(6.0, 98.0), (MAP_WIDTH, MAP_HEIGHT));
    }

    #[test]
    fn color_ramp_endpoints() {
        assert_eq!(ylorbr(0.0), "#fff7bc");
        assert_eq!(ylorbr(1.0), "#662506");
    }

    #[test]
    fn map_draws_one_circle_per_bubble() {
        let bubbles = bubbles(&[("Goa".to_string(), 3), ("Assam".to_string(), 1)]);
        let svg = render_bubble_map_svg(&bubbles);
        assert_eq!(svg.matches("<circle").count(), 2);
        assert!(svg.contains("Goa: 3"));
    }
}

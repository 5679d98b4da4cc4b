//! Wheel selector geometry and SVG.

use crate::render::html_escape;
use crate::selection::{ParticipationLabels, SelectionState};

/// Angle of slot 0; -90° puts it at the top.
pub const START_ANGLE_DEG: f64 = -90.0;

const OLIVE: &str = "#556B2F";
const SAFFRON: &str = "#D35400";
const ACTIVE_BLUE: &str = "#2980B9";
const NAVY: &str = "#002147";
const STEEL: &str = "#B0BEC5";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTone {
    /// Label is in the selected set.
    Active,
    /// Label sits under the rotation cursor but is not selected.
    Current,
    Default,
}

impl SlotTone {
    pub fn color(self) -> &'static str {
        match self {
            SlotTone::Active => ACTIVE_BLUE,
            SlotTone::Current => SAFFRON,
            SlotTone::Default => OLIVE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WheelSlot {
    pub label: String,
    pub angle_deg: f64,
    pub x: f64,
    pub y: f64,
    pub tone: SlotTone,
}

/// Place each label on a circle of `radius`, clockwise from the top.
pub fn layout(labels: &ParticipationLabels, state: &SelectionState, radius: f64) -> Vec<WheelSlot> {
    let step = 360.0 / labels.len() as f64;
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let angle_deg = START_ANGLE_DEG + i as f64 * step;
            let theta = angle_deg.to_radians();
            let tone = if state.selected_types.contains(label) {
                SlotTone::Active
            } else if i == state.rotation_index {
                SlotTone::Current
            } else {
                SlotTone::Default
            };
            WheelSlot {
                label: label.to_string(),
                angle_deg,
                x: radius * theta.cos(),
                y: radius * theta.sin(),
                tone,
            }
        })
        .collect()
}

/// Render the wheel. `wedge_href` builds the link for a clicked label and
/// `hub_href` is the link behind the hub.
pub fn render_wheel_svg(
    slots: &[WheelSlot],
    radius: f64,
    wedge_href: impl Fn(&str) -> String,
    hub_href: &str,
) -> String {
    let rx = radius * 0.4;
    let ry = radius * 0.2;
    let font_px = (radius * 0.068).round();
    let (hub_out, hub_mid, hub_in) = (radius * 0.6, radius * 0.4, radius * 0.24);
    let view = radius * 3.2;
    let half = view / 2.0;

    let mut svg = format!(
        r#"<svg viewBox="-{half:.0} -{half:.0} {view:.0} {view:.0}" width="500" height="500" id="wheel" role="img" aria-label="Participation type wheel">"#,
    );

    for slot in slots {
        let label = html_escape(&slot.label);
        svg.push_str(&format!(
            r#"<a href="{href}" class="wedge" data-label="{label}"><ellipse cx="{x:.1}" cy="{y:.1}" rx="{rx:.0}" ry="{ry:.0}" fill="{fill}" transform="rotate({a:.1},{x:.1},{y:.1})" /><text x="{x:.1}" y="{y:.1}" font-size="{font_px}" text-anchor="middle" dominant-baseline="middle" fill="white" transform="rotate({a:.1},{x:.1},{y:.1})">{label}</text></a>"#,
            href = html_escape(&wedge_href(&slot.label)),
            label = label,
            x = slot.x,
            y = slot.y,
            rx = rx,
            ry = ry,
            fill = slot.tone.color(),
            a = slot.angle_deg,
            font_px = font_px,
        ));
    }

    svg.push_str(&format!(
        r#"<a href="{href}" class="hub"><circle cx="0" cy="0" r="{o:.0}" fill="{navy}" /><circle cx="0" cy="0" r="{m:.0}" fill="{steel}" /><circle cx="0" cy="0" r="{i:.0}" fill="{navy}" /></a></svg>"#,
        href = html_escape(hub_href),
        o = hub_out,
        m = hub_mid,
        i = hub_in,
        navy = NAVY,
        steel = STEEL,
    ));
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn labels(names: &[&str]) -> ParticipationLabels {
        ParticipationLabels::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn four_slots_start_at_top_and_go_clockwise() {
        let slots = layout(&labels(&["A", "B", "C", "D"]), &SelectionState::default(), 250.0);
        assert_eq!(slots.len(), 4);
        assert!(close(slots[0].x, 0.0) && close(slots[0].y, -250.0));
        assert!(close(slots[1].x, 250.0) && close(slots[1].y, 0.0));
        assert!(close(slots[2].x, 0.0) && close(slots[2].y, 250.0));
        assert!(close(slots[3].x, -250.0) && close(slots[3].y, 0.0));
        assert!(close(slots[1].angle_deg, 0.0));
    }

    #[test]
    fn single_slot_sits_at_the_top() {
        let slots = layout(&labels(&["Only"]), &SelectionState::default(), 100.0);
        assert!(close(slots[0].x, 0.0) && close(slots[0].y, -100.0));
    }

    #[test]
    fn tones_prefer_active_over_current() {
        let state = SelectionState {
            rotation_index: 1,
            auto_rotate: true,
            selected_types: BTreeSet::from(["A".to_string()]),
        };
        let slots = layout(&labels(&["A", "B", "C"]), &state, 250.0);
        let tones: Vec<SlotTone> = slots.iter().map(|s| s.tone).collect();
        assert_eq!(tones, vec![SlotTone::Active, SlotTone::Current, SlotTone::Default]);

        let state = SelectionState {
            rotation_index: 0,
            ..state
        };
        let slots = layout(&labels(&["A", "B", "C"]), &state, 250.0);
        assert_eq!(slots[0].tone, SlotTone::Active);
        assert_eq!(slots[1].tone, SlotTone::Default);
    }

    #[test]
    fn svg_links_each_wedge_and_escapes_labels() {
        let slots = layout(&labels(&["R&D", "Trainee"]), &SelectionState::default(), 250.0);
        let svg = render_wheel_svg(&slots, 250.0, |label| format!("?pt={}", label), "?action=stop");
        assert_eq!(svg.matches("<ellipse").count(), 2);
        assert!(svg.contains("R&amp;D"));
        assert!(svg.contains(r#"href="?pt=Trainee""#));
        assert!(svg.contains(r#"viewBox="-400 -400 800 800""#));
        assert_eq!(svg.matches("<circle").count(), 3);
    }
}

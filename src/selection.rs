//! Rotation and selection state for the participation-type wheel.
//!
//! Transitions are pure: `SelectionState::apply` consumes a state and an
//! event and returns the next state. The label domain is passed in on every
//! call because it shifts whenever the filters change.

use std::collections::BTreeSet;

/// Sorted, distinct, non-empty participation-type labels.
///
/// An empty domain cannot be represented, so no transition ever reduces an
/// index modulo zero. Callers handle the empty case before reaching here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipationLabels(Vec<String>);

impl ParticipationLabels {
    pub fn new(labels: Vec<String>) -> Option<Self> {
        let unique: BTreeSet<String> = labels.into_iter().collect();
        if unique.is_empty() {
            None
        } else {
            Some(Self(unique.into_iter().collect()))
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    // Never empty by construction; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, index: usize) -> &str {
        &self.0[index % self.0.len()]
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_set(&self) -> BTreeSet<String> {
        self.0.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    /// Timer signal. Only acts while auto-rotation is on.
    Tick,
    Prev,
    Next,
    /// A wheel wedge was clicked.
    ToggleClick(String),
    SelectAll,
    /// The multiselect was edited directly.
    SetSelected(BTreeSet<String>),
    AutoRotate(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub rotation_index: usize,
    pub auto_rotate: bool,
    pub selected_types: BTreeSet<String>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            rotation_index: 0,
            auto_rotate: true,
            selected_types: BTreeSet::new(),
        }
    }
}

impl SelectionState {
    /// Bring a stored state in line with the current label domain: the index
    /// is wrapped into range and labels that left the domain are dropped.
    pub fn reconcile(mut self, labels: &ParticipationLabels) -> Self {
        self.rotation_index %= labels.len();
        self.selected_types.retain(|label| labels.contains(label));
        self
    }

    pub fn apply(mut self, event: SelectionEvent, labels: &ParticipationLabels) -> Self {
        let n = labels.len();
        self.rotation_index %= n;

        match event {
            SelectionEvent::Tick => {
                if self.auto_rotate {
                    self.rotation_index = (self.rotation_index + 1) % n;
                    self.focus_current(labels);
                }
            }
            SelectionEvent::Prev => {
                self.rotation_index = (self.rotation_index + n - 1) % n;
                self.auto_rotate = false;
                self.focus_current(labels);
            }
            SelectionEvent::Next => {
                self.rotation_index = (self.rotation_index + 1) % n;
                self.auto_rotate = false;
                self.focus_current(labels);
            }
            SelectionEvent::ToggleClick(label) => {
                self.auto_rotate = false;
                if labels.contains(&label) && !self.selected_types.remove(&label) {
                    self.selected_types.insert(label);
                }
            }
            SelectionEvent::SelectAll => {
                self.selected_types = labels.as_set();
            }
            SelectionEvent::SetSelected(selected) => {
                self.selected_types = selected
                    .into_iter()
                    .filter(|label| labels.contains(label))
                    .collect();
            }
            SelectionEvent::AutoRotate(on) => {
                self.auto_rotate = on;
            }
        }
        self
    }

    pub fn apply_all(
        self,
        events: impl IntoIterator<Item = SelectionEvent>,
        labels: &ParticipationLabels,
    ) -> Self {
        events
            .into_iter()
            .fold(self, |state, event| state.apply(event, labels))
    }

    pub fn current_label<'l>(&self, labels: &'l ParticipationLabels) -> &'l str {
        labels.get(self.rotation_index)
    }

    fn focus_current(&mut self, labels: &ParticipationLabels) {
        self.selected_types = BTreeSet::from([self.current_label(labels).to_string()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> ParticipationLabels {
        ParticipationLabels::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_domain_has_no_labels() {
        assert!(ParticipationLabels::new(Vec::new()).is_none());
    }

    #[test]
    fn ticks_rotate_and_wrap() {
        let labels = labels(&["X", "Y", "Z"]);
        let state = SelectionState::default()
            .apply(SelectionEvent::Tick, &labels)
            .apply(SelectionEvent::Tick, &labels);
        assert_eq!(state.rotation_index, 2);
        assert_eq!(state.selected_types, set(&["Z"]));

        let state = state.apply(SelectionEvent::Tick, &labels);
        assert_eq!(state.rotation_index, 0);
        assert_eq!(state.selected_types, set(&["X"]));
    }

    #[test]
    fn n_ticks_return_to_start() {
        for n in 1..=7 {
            let names: Vec<String> = (0..n).map(|i| format!("L{}", i)).collect();
            let labels = ParticipationLabels::new(names).unwrap();
            for start in 0..n {
                let initial = SelectionState {
                    rotation_index: start,
                    ..SelectionState::default()
                };
                let ticks = std::iter::repeat(SelectionEvent::Tick).take(n);
                let end = initial.apply_all(ticks, &labels);
                assert_eq!(end.rotation_index, start);
            }
        }
    }

    #[test]
    fn tick_is_ignored_when_auto_rotate_is_off() {
        let labels = labels(&["X", "Y"]);
        let state = SelectionState {
            auto_rotate: false,
            ..SelectionState::default()
        };
        let after = state.clone().apply(SelectionEvent::Tick, &labels);
        assert_eq!(after, state);
    }

    #[test]
    fn prev_wraps_backwards_and_stops_rotation() {
        let labels = labels(&["X", "Y", "Z"]);
        let state = SelectionState::default().apply(SelectionEvent::Prev, &labels);
        assert_eq!(state.rotation_index, 2);
        assert!(!state.auto_rotate);
        assert_eq!(state.selected_types, set(&["Z"]));

        let state = state.apply(SelectionEvent::Next, &labels);
        assert_eq!(state.rotation_index, 0);
        assert_eq!(state.selected_types, set(&["X"]));
    }

    #[test]
    fn manual_navigation_suppresses_later_ticks() {
        let labels = labels(&["X", "Y", "Z"]);
        let state = SelectionState::default()
            .apply(SelectionEvent::Next, &labels)
            .apply(SelectionEvent::Tick, &labels);
        assert_eq!(state.rotation_index, 1);
        assert_eq!(state.selected_types, set(&["Y"]));
    }

    #[test]
    fn toggle_click_is_its_own_inverse() {
        let labels = labels(&["X", "Y", "Z"]);
        let before = SelectionState {
            selected_types: set(&["X"]),
            auto_rotate: false,
            ..SelectionState::default()
        };

        for label in ["X", "Y", "Q"] {
            let after = before
                .clone()
                .apply(SelectionEvent::ToggleClick(label.to_string()), &labels)
                .apply(SelectionEvent::ToggleClick(label.to_string()), &labels);
            assert_eq!(after.selected_types, before.selected_types);
        }
    }

    #[test]
    fn toggle_click_adds_without_replacing() {
        let labels = labels(&["X", "Y", "Z"]);
        let state = SelectionState {
            selected_types: set(&["X"]),
            ..SelectionState::default()
        }
        .apply(SelectionEvent::ToggleClick("Z".to_string()), &labels);
        assert_eq!(state.selected_types, set(&["X", "Z"]));
        assert!(!state.auto_rotate);
    }

    #[test]
    fn select_all_and_set_selected_stay_inside_the_domain() {
        let labels = labels(&["X", "Y"]);
        let state = SelectionState::default().apply(SelectionEvent::SelectAll, &labels);
        assert_eq!(state.selected_types, set(&["X", "Y"]));

        let state = state.apply(SelectionEvent::SetSelected(set(&["Y", "Gone"])), &labels);
        assert_eq!(state.selected_types, set(&["Y"]));
    }

    #[test]
    fn auto_rotate_toggle_changes_nothing_else() {
        let labels = labels(&["X", "Y"]);
        let state = SelectionState {
            rotation_index: 1,
            auto_rotate: true,
            selected_types: set(&["X"]),
        };
        let after = state.clone().apply(SelectionEvent::AutoRotate(false), &labels);
        assert_eq!(after.rotation_index, 1);
        assert_eq!(after.selected_types, state.selected_types);
        assert!(!after.auto_rotate);
    }

    #[test]
    fn reconcile_clamps_index_and_prunes_selection() {
        let wide = labels(&["A", "B", "C", "D"]);
        let state = SelectionState::default()
            .apply(SelectionEvent::Prev, &wide)
            .apply(SelectionEvent::ToggleClick("A".to_string()), &wide);
        assert_eq!(state.rotation_index, 3);
        assert_eq!(state.selected_types, set(&["A", "D"]));

        let narrow = labels(&["A", "B"]);
        let state = state.reconcile(&narrow);
        assert_eq!(state.rotation_index, 1);
        assert_eq!(state.selected_types, set(&["A"]));
    }
}

use crate::analyzer::{ChartMetric, FilterCriteria, KpiSelection, MetricMode, Selector};
use crate::selection::SelectionEvent;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Prev,
    Next,
    Tick,
    /// Hub click: stop auto-rotation.
    Pause,
    /// Sidebar form submitted.
    Apply,
}

impl Action {
    pub fn param(self) -> &'static str {
        match self {
            Action::Prev => "prev",
            Action::Next => "next",
            Action::Tick => "tick",
            Action::Pause => "pause",
            Action::Apply => "apply",
        }
    }

    fn from_param(value: &str) -> Option<Self> {
        [Action::Prev, Action::Next, Action::Tick, Action::Pause, Action::Apply]
            .into_iter()
            .find(|a| a.param() == value)
    }
}

/// Everything one page request asks for, decoded from its query string.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRequest {
    pub name: Option<String>,
    pub eligible_only: bool,
    pub criteria: FilterCriteria,
    pub kpis: KpiSelection,
    pub chart_metric: ChartMetric,
    pub action: Option<Action>,
    pub clicked: Option<String>,
    pub auto_rotate: bool,
    pub select_all_types: bool,
    /// Multiselect contents, present only when the form carried the field.
    pub picked_types: Option<BTreeSet<String>>,
}

impl Default for DashboardRequest {
    fn default() -> Self {
        Self::from_pairs(&[])
    }
}

impl DashboardRequest {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let has = |key: &str| pairs.iter().any(|(k, _)| k == key);
        let first = |key: &str| {
            pairs
                .iter()
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.clone())
        };
        let all = |key: &str| -> Vec<String> {
            pairs
                .iter()
                .filter(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .collect()
        };

        // Unchecked checkboxes are simply absent, so their defaults only
        // apply before the form has been submitted once.
        let submitted = has("submitted");
        let checkbox = |key: &str, default: bool| if submitted { has(key) } else { default };

        let years = if checkbox("all_years", true) {
            Selector::All
        } else {
            Selector::Only(all("year").iter().filter_map(|y| y.parse::<i32>().ok()).collect())
        };
        let schools = if checkbox("all_schools", true) {
            Selector::All
        } else {
            Selector::Only(all("school").into_iter().collect())
        };
        let states = if checkbox("all_states", true) {
            Selector::All
        } else {
            Selector::Only(all("state").into_iter().collect())
        };

        let defaults = KpiSelection::default();
        let mode = |key: &str, fallback: MetricMode| {
            first(key)
                .and_then(|v| MetricMode::from_param(&v))
                .unwrap_or(fallback)
        };

        Self {
            name: first("name"),
            eligible_only: checkbox("eligible_only", false),
            criteria: FilterCriteria {
                years,
                schools,
                states,
            },
            kpis: KpiSelection {
                sessions: mode("metric_sessions", defaults.sessions),
                hours: mode("metric_hours", defaults.hours),
                participants: mode("metric_participants", defaults.participants),
            },
            chart_metric: first("chart_metric")
                .and_then(|v| ChartMetric::from_param(&v))
                .unwrap_or(ChartMetric::Sessions),
            action: first("action").and_then(|v| Action::from_param(&v)),
            clicked: first("pt"),
            auto_rotate: has("auto"),
            select_all_types: has("select_all_pts"),
            picked_types: has("pts_field").then(|| all("pts").into_iter().collect()),
        }
    }

    /// State-machine events carried by this request, in application order.
    pub fn events(&self) -> Vec<SelectionEvent> {
        let mut events = Vec::new();
        if self.action == Some(Action::Tick) {
            events.push(SelectionEvent::Tick);
        }
        if let Some(label) = &self.clicked {
            events.push(SelectionEvent::ToggleClick(label.clone()));
        }
        match self.action {
            Some(Action::Prev) => events.push(SelectionEvent::Prev),
            Some(Action::Next) => events.push(SelectionEvent::Next),
            Some(Action::Pause) => events.push(SelectionEvent::AutoRotate(false)),
            Some(Action::Apply) => {
                events.push(SelectionEvent::AutoRotate(self.auto_rotate));
                if self.select_all_types {
                    events.push(SelectionEvent::SelectAll);
                } else if let Some(picked) = &self.picked_types {
                    events.push(SelectionEvent::SetSelected(picked.clone()));
                }
            }
            Some(Action::Tick) | None => {}
        }
        events
    }

    /// Parameters that describe the current view (filters, metrics, name).
    /// Links rendered on the page carry these so a click keeps the view.
    pub fn view_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = vec![("submitted".into(), "1".into())];
        let mut push = |k: &str, v: String| pairs.push((k.to_string(), v));

        if let Some(name) = &self.name {
            push("name", name.clone());
        }
        if self.eligible_only {
            push("eligible_only", "on".into());
        }
        match &self.criteria.years {
            Selector::All => push("all_years", "on".into()),
            Selector::Only(years) => years.iter().for_each(|y| push("year", y.to_string())),
        }
        match &self.criteria.schools {
            Selector::All => push("all_schools", "on".into()),
            Selector::Only(schools) => schools.iter().for_each(|s| push("school", s.clone())),
        }
        match &self.criteria.states {
            Selector::All => push("all_states", "on".into()),
            Selector::Only(states) => states.iter().for_each(|s| push("state", s.clone())),
        }
        push("metric_sessions", self.kpis.sessions.param().into());
        push("metric_hours", self.kpis.hours.param().into());
        push("metric_participants", self.kpis.participants.param().into());
        push("chart_metric", self.chart_metric.param().into());
        pairs
    }

    /// `?query` keeping the current view and adding `extra`.
    pub fn href_with(&self, path: &str, extra: &[(&str, &str)]) -> String {
        let mut pairs = self.view_pairs();
        pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        format!("{}?{}", path, encode_query(&pairs))
    }
}

/// `application/x-www-form-urlencoded` serialization.
pub fn encode_query(pairs: &[(String, String)]) -> String {
    match reqwest::Url::parse_with_params("http://localhost/", pairs) {
        Ok(url) => url.query().unwrap_or_default().to_string(),
        Err(_) => String::new(),
    }
}

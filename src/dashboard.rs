//! One render pass: Filter -> Aggregate -> state transition -> page model.

use crate::analyzer::{
    compute_kpis, filter_by_name, filter_by_participation, filter_records, group_by_school_year,
    participation_labels, state_counts, BarPoint, Domains, KpiSummary, Profile, TrainingAnalyzer,
};
use crate::geo::{self, Bubble};
use crate::models::{Config, Field, Record, Table};
use crate::render;
use crate::request::DashboardRequest;
use crate::selection::{ParticipationLabels, SelectionState};
use crate::wheel::{self, WheelSlot};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Settings a pass needs from the configuration.
#[derive(Debug, Clone)]
pub struct PassSettings {
    pub title: String,
    pub eligibility_hours: f64,
    pub wheel_radius: f64,
    pub refresh_interval_secs: u64,
    pub logo_available: bool,
    pub logo_name: String,
}

impl PassSettings {
    pub fn from_config(config: &Config, logo_available: bool) -> Self {
        Self {
            title: config.title.clone(),
            eligibility_hours: config.eligibility_hours,
            wheel_radius: config.wheel_radius,
            refresh_interval_secs: config.refresh_interval_secs,
            logo_available,
            logo_name: config.logo_path.clone().unwrap_or_else(|| "logo".to_string()),
        }
    }
}

pub struct PageModel<'a> {
    pub settings: &'a PassSettings,
    pub request: &'a DashboardRequest,
    /// Name after validation against the picker options.
    pub name: Option<&'a str>,
    pub name_options: Vec<&'a str>,
    pub eligible_count: usize,
    pub profile: Option<Profile>,
    pub domains: Domains,
    pub outcome: ViewOutcome<'a>,
}

pub enum ViewOutcome<'a> {
    /// No participation type survives the filters.
    Empty,
    Ready(ReadyView<'a>),
}

pub struct ReadyView<'a> {
    pub labels: ParticipationLabels,
    pub state: SelectionState,
    pub slots: Vec<WheelSlot>,
    pub kpis: KpiSummary,
    pub bars: Vec<BarPoint>,
    pub bubbles: Vec<Bubble>,
    /// Rows of the selected participation types.
    pub rows: Vec<&'a Record>,
}

/// Filter stage shared by the page and the CSV export.
struct FilteredView<'a> {
    name: Option<&'a str>,
    domains: Domains,
    rows: Vec<&'a Record>,
}

fn filter_stage<'a>(
    table: &'a Table,
    request: &'a DashboardRequest,
    name_options: &[&'a str],
) -> FilteredView<'a> {
    let name = request
        .name
        .as_deref()
        .filter(|name| name_options.contains(name));

    let scoped: Vec<&Record> = match name {
        Some(name) => filter_by_name(table.records(), name),
        None => table.records().iter().collect(),
    };
    let domains = Domains::of(&scoped);
    let rows = filter_records(scoped, &request.criteria);

    FilteredView { name, domains, rows }
}

/// Run the full pipeline for one request. The returned state is the one to
/// store for the session; on an empty view it is the input state untouched.
pub fn render_pass<'a>(
    table: &'a Table,
    settings: &'a PassSettings,
    request: &'a DashboardRequest,
    state: SelectionState,
) -> (PageModel<'a>, SelectionState) {
    let analyzer = TrainingAnalyzer::new(table, settings.eligibility_hours);
    let eligible_count = analyzer.eligible_names().len();
    let name_options = analyzer.name_options(request.eligible_only);
    let view = filter_stage(table, request, &name_options);
    let profile = view.name.and_then(|name| analyzer.profile(name));

    let labels = ParticipationLabels::new(participation_labels(&view.rows));
    let (outcome, next_state) = match labels {
        None => {
            debug!("no participation types survive the filters");
            (ViewOutcome::Empty, state)
        }
        Some(labels) => {
            let events = request.events();
            let next = state.reconcile(&labels).apply_all(events.iter().cloned(), &labels);
            if !events.is_empty() {
                debug!(
                    ?events,
                    index = next.rotation_index,
                    auto = next.auto_rotate,
                    "selection updated"
                );
            }

            let rows = filter_by_participation(view.rows.iter().copied(), &next.selected_types);
            let kpis = compute_kpis(&rows, &request.kpis);
            let bars = group_by_school_year(&rows, request.chart_metric);
            let bubbles = geo::bubbles(&state_counts(&rows));
            let slots = wheel::layout(&labels, &next, settings.wheel_radius);

            let ready = ReadyView {
                labels,
                state: next.clone(),
                slots,
                kpis,
                bars,
                bubbles,
                rows,
            };
            (ViewOutcome::Ready(ready), next)
        }
    };

    let page = PageModel {
        settings,
        request,
        name: view.name,
        name_options,
        eligible_count,
        profile,
        domains: view.domains,
        outcome,
    };
    (page, next_state)
}

/// Rows the current view shows, without applying any selection event.
pub fn visible_rows<'a>(
    table: &'a Table,
    settings: &PassSettings,
    request: &'a DashboardRequest,
    state: &SelectionState,
) -> Vec<&'a Record> {
    let analyzer = TrainingAnalyzer::new(table, settings.eligibility_hours);
    let name_options = analyzer.name_options(request.eligible_only);
    let view = filter_stage(table, request, &name_options);
    match ParticipationLabels::new(participation_labels(&view.rows)) {
        Some(labels) => {
            let state = state.clone().reconcile(&labels);
            filter_by_participation(view.rows, &state.selected_types)
        }
        None => Vec::new(),
    }
}

pub fn export_csv(rows: &[&Record]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(Field::ALL.iter().map(|f| f.canonical_name()))?;
    for record in rows {
        writer.write_record(Field::ALL.iter().map(|f| record.field_text(*f)))?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Process-wide dashboard: the cached table plus settings.
pub struct Dashboard {
    table: Arc<Table>,
    settings: PassSettings,
    logo_path: Option<PathBuf>,
}

impl Dashboard {
    pub fn new(table: Table, config: &Config) -> Self {
        let logo_path = config.logo_path.as_ref().map(PathBuf::from);
        let logo_available = logo_path.as_ref().map(|p| p.is_file()).unwrap_or(false);
        if let Some(path) = logo_path.as_ref().filter(|_| !logo_available) {
            warn!(path = %path.display(), "logo not found, pages will show a notice instead");
        }
        info!(rows = table.len(), "dashboard ready");

        Self {
            table: Arc::new(table),
            settings: PassSettings::from_config(config, logo_available),
            logo_path: logo_path.filter(|_| logo_available),
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn settings(&self) -> &PassSettings {
        &self.settings
    }

    pub fn logo_path(&self) -> Option<&PathBuf> {
        self.logo_path.as_ref()
    }

    /// Render the page for `request`, returning the HTML and the next state.
    pub fn page(
        &self,
        request: &DashboardRequest,
        state: SelectionState,
    ) -> (String, SelectionState) {
        let (page, next) = render_pass(&self.table, &self.settings, request, state);
        (render::render_page(&page), next)
    }

    pub fn export(
        &self,
        request: &DashboardRequest,
        state: &SelectionState,
    ) -> Result<String, csv::Error> {
        let rows = visible_rows(&self.table, &self.settings, request, state);
        export_csv(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionEvent;

    fn record(name: &str, pt: &str, year: i32, hours: f64) -> Record {
        Record {
            name: Some(name.to_string()),
            participation_type: Some(pt.to_string()),
            year,
            school: "S1".to_string(),
            state: "Goa".to_string(),
            hours_completed: Some(hours),
            training_number: Some(format!("T{}", year)),
            ..Record::default()
        }
    }

    fn table() -> Table {
        Table::new(vec![
            record("A", "Trainee", 2022, 40.0),
            record("A", "Trainee", 2023, 55.0),
            record("B", "Trainer", 2023, 40.0),
            record("C", "Observer", 2024, 10.0),
        ])
    }

    fn settings() -> PassSettings {
        PassSettings::from_config(&Config::default(), false)
    }

    fn request(raw: &[(&str, &str)]) -> DashboardRequest {
        let pairs: Vec<(String, String)> = raw
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DashboardRequest::from_pairs(&pairs)
    }

    #[test]
    fn first_pass_has_nothing_selected() {
        let table = table();
        let settings = settings();
        let req = DashboardRequest::default();
        let (page, state) = render_pass(&table, &settings, &req, SelectionState::default());

        assert_eq!(state, SelectionState::default());
        match page.outcome {
            ViewOutcome::Ready(view) => {
                assert_eq!(view.labels.len(), 3);
                assert!(view.rows.is_empty());
                assert_eq!(view.kpis.participants.as_f64(), Some(0.0));
                assert_eq!(view.kpis.hours.as_f64(), None);
            }
            ViewOutcome::Empty => panic!("expected a ready view"),
        }
    }

    #[test]
    fn tick_selects_next_label_and_narrows_rows() {
        let table = table();
        let settings = settings();
        let req = request(&[("action", "tick")]);
        let (page, state) = render_pass(&table, &settings, &req, SelectionState::default());

        // Labels sort as Observer, Trainee, Trainer.
        assert_eq!(state.rotation_index, 1);
        let ViewOutcome::Ready(view) = page.outcome else {
            panic!("expected a ready view");
        };
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.kpis.hours.as_f64(), Some(95.0));
        assert_eq!(view.bubbles.len(), 1);
    }

    #[test]
    fn empty_filter_skips_transitions() {
        let table = table();
        let settings = settings();
        let req = request(&[
            ("submitted", "1"),
            ("all_schools", "on"),
            ("all_states", "on"),
            ("action", "next"),
        ]);
        let start = SelectionState {
            rotation_index: 2,
            ..SelectionState::default()
        };
        let (page, state) = render_pass(&table, &settings, &req, start.clone());
        assert!(matches!(page.outcome, ViewOutcome::Empty));
        assert_eq!(state, start);
    }

    #[test]
    fn narrowing_filters_clamp_the_stored_index() {
        let table = table();
        let settings = settings();
        let req = request(&[
            ("submitted", "1"),
            ("year", "2023"),
            ("all_schools", "on"),
            ("all_states", "on"),
        ]);
        let start = SelectionState {
            rotation_index: 2,
            auto_rotate: false,
            selected_types: ["Observer".to_string(), "Trainer".to_string()].into(),
        };
        let (_, state) = render_pass(&table, &settings, &req, start);
        // 2023 has Trainee and Trainer only.
        assert_eq!(state.rotation_index, 0);
        assert_eq!(state.selected_types, ["Trainer".to_string()].into());
    }

    #[test]
    fn profile_follows_a_valid_name_only() {
        let table = table();
        let settings = settings();

        let req = request(&[("name", "A")]);
        let (page, _) = render_pass(&table, &settings, &req, SelectionState::default());
        let profile = page.profile.expect("profile for A");
        assert!(profile.certificate.is_some());
        assert_eq!(page.domains.years, vec![2022, 2023]);

        let req = request(&[("submitted", "1"), ("eligible_only", "on"), ("name", "B")]);
        let (page, _) = render_pass(&table, &settings, &req, SelectionState::default());
        assert!(page.name.is_none());
        assert!(page.profile.is_none());
        assert_eq!(page.name_options, vec!["A"]);
        assert_eq!(page.eligible_count, 1);
    }

    #[test]
    fn export_contains_only_selected_types() {
        let table = table();
        let settings = settings();
        let labels = ParticipationLabels::new(vec!["Trainer".to_string()]).unwrap();
        let state = SelectionState::default().apply(SelectionEvent::SelectAll, &labels);

        let req = DashboardRequest::default();
        let rows = visible_rows(&table, &settings, &req, &state);
        let csv = export_csv(&rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Name,Designation,Email"));
        assert!(lines[1].starts_with("B,"));
    }
}

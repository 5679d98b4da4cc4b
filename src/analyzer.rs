use crate::models::{Record, Table, UNKNOWN_LABEL};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Either every value of a dimension, or an explicit subset of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector<T: Ord> {
    All,
    Only(BTreeSet<T>),
}

impl<T: Ord> Selector<T> {
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(set) => set.contains(value),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selector::All)
    }
}

impl<T: Ord> Default for Selector<T> {
    fn default() -> Self {
        Selector::All
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub years: Selector<i32>,
    pub schools: Selector<String>,
    pub states: Selector<String>,
}

impl FilterCriteria {
    /// True when no dimension is narrowed. An unrestricted filter can still
    /// produce an empty view if the table itself is empty.
    pub fn is_unrestricted(&self) -> bool {
        self.years.is_all() && self.schools.is_all() && self.states.is_all()
    }
}

/// Keep rows whose Year, School and State are all admitted. Order is preserved.
pub fn filter_records<'a>(
    rows: impl IntoIterator<Item = &'a Record>,
    criteria: &FilterCriteria,
) -> Vec<&'a Record> {
    rows.into_iter()
        .filter(|record| {
            criteria.years.admits(&record.year)
                && criteria.schools.admits(&record.school)
                && criteria.states.admits(&record.state)
        })
        .collect()
}

pub fn filter_by_name<'a>(
    rows: impl IntoIterator<Item = &'a Record>,
    name: &str,
) -> Vec<&'a Record> {
    rows.into_iter().filter(|record| record.name_is(name)).collect()
}

pub fn filter_by_participation<'a>(
    rows: impl IntoIterator<Item = &'a Record>,
    selected: &BTreeSet<String>,
) -> Vec<&'a Record> {
    rows.into_iter()
        .filter(|record| {
            record
                .participation_type
                .as_ref()
                .map(|pt| selected.contains(pt))
                .unwrap_or(false)
        })
        .collect()
}

/// Sorted distinct values of the filterable dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Domains {
    pub years: Vec<i32>,
    pub schools: Vec<String>,
    pub states: Vec<String>,
}

impl Domains {
    pub fn of(rows: &[&Record]) -> Self {
        let years: BTreeSet<i32> = rows.iter().map(|r| r.year).collect();
        let schools: BTreeSet<&str> = rows.iter().map(|r| r.school.as_str()).collect();
        let states: BTreeSet<&str> = rows.iter().map(|r| r.state.as_str()).collect();
        Self {
            years: years.into_iter().collect(),
            schools: schools.into_iter().map(str::to_string).collect(),
            states: states.into_iter().map(str::to_string).collect(),
        }
    }
}

/// Sorted distinct non-null participation types present in `rows`.
pub fn participation_labels(rows: &[&Record]) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.participation_type.as_deref())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricMode {
    Count,
    DistinctCount,
    Sum,
    Average,
}

impl MetricMode {
    pub const ALL: [MetricMode; 4] = [
        MetricMode::Count,
        MetricMode::DistinctCount,
        MetricMode::Sum,
        MetricMode::Average,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricMode::Count => "Count",
            MetricMode::DistinctCount => "Distinct Count",
            MetricMode::Sum => "Sum",
            MetricMode::Average => "Average",
        }
    }

    pub fn param(self) -> &'static str {
        match self {
            MetricMode::Count => "count",
            MetricMode::DistinctCount => "distinct",
            MetricMode::Sum => "sum",
            MetricMode::Average => "average",
        }
    }

    pub fn from_param(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.param() == value)
    }
}

/// One cell of a KPI column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnValue<'a> {
    Text(&'a str),
    Number(f64),
}

impl ColumnValue<'_> {
    fn as_number(&self) -> Option<f64> {
        match self {
            ColumnValue::Number(n) => Some(*n),
            ColumnValue::Text(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

#[derive(Hash, PartialEq, Eq)]
enum DistinctKey<'a> {
    Text(&'a str),
    Number(u64),
}

impl<'a> From<ColumnValue<'a>> for DistinctKey<'a> {
    fn from(value: ColumnValue<'a>) -> Self {
        match value {
            ColumnValue::Text(text) => DistinctKey::Text(text),
            // +0.0 so that 0.0 and -0.0 count once
            ColumnValue::Number(n) => DistinctKey::Number((n + 0.0).to_bits()),
        }
    }
}

/// Result of an aggregation. Sum and Average over no numeric values are
/// `Undefined` rather than zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Defined(f64),
    Undefined,
}

impl MetricValue {
    pub fn as_f64(self) -> Option<f64> {
        match self {
            MetricValue::Defined(v) => Some(v),
            MetricValue::Undefined => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Defined(v) => f.write_str(&format_number(*v)),
            MetricValue::Undefined => f.write_str("—"),
        }
    }
}

/// Thousands-separated; whole numbers without decimals, others with two.
pub fn format_number(value: f64) -> String {
    let negative = value < 0.0;
    let rounded = (value.abs() * 100.0).round() / 100.0;
    let whole = rounded.trunc() as u64;
    let cents = ((rounded - rounded.trunc()) * 100.0).round() as u64;

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if negative && (whole > 0 || cents > 0) { "-" } else { "" };
    if cents == 0 {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{:02}", sign, grouped, cents)
    }
}

pub fn metric_value(values: &[Option<ColumnValue<'_>>], mode: MetricMode) -> MetricValue {
    match mode {
        MetricMode::Count => MetricValue::Defined(values.len() as f64),
        MetricMode::DistinctCount => {
            let distinct: HashSet<DistinctKey> = values
                .iter()
                .flatten()
                .map(|v| DistinctKey::from(*v))
                .collect();
            MetricValue::Defined(distinct.len() as f64)
        }
        MetricMode::Sum | MetricMode::Average => {
            let numbers: Vec<f64> = values.iter().flatten().filter_map(|v| v.as_number()).collect();
            if numbers.is_empty() {
                return MetricValue::Undefined;
            }
            let sum: f64 = numbers.iter().sum();
            if mode == MetricMode::Sum {
                MetricValue::Defined(sum)
            } else {
                MetricValue::Defined(sum / numbers.len() as f64)
            }
        }
    }
}

/// Columns a KPI card can aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiColumn {
    TrainingNumber,
    HoursCompleted,
    Name,
}

impl KpiColumn {
    pub fn values<'a>(self, rows: &[&'a Record]) -> Vec<Option<ColumnValue<'a>>> {
        rows.iter()
            .map(|&record| match self {
                KpiColumn::TrainingNumber => {
                    record.training_number.as_deref().map(ColumnValue::Text)
                }
                KpiColumn::HoursCompleted => record.hours_completed.map(ColumnValue::Number),
                KpiColumn::Name => record.name.as_deref().map(ColumnValue::Text),
            })
            .collect()
    }
}

/// Aggregation mode chosen for each KPI card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KpiSelection {
    pub sessions: MetricMode,
    pub hours: MetricMode,
    pub participants: MetricMode,
}

impl Default for KpiSelection {
    fn default() -> Self {
        Self {
            sessions: MetricMode::DistinctCount,
            hours: MetricMode::Sum,
            participants: MetricMode::Count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiSummary {
    pub sessions: MetricValue,
    pub hours: MetricValue,
    pub participants: MetricValue,
    pub female: usize,
    pub male: usize,
}

pub fn compute_kpis(rows: &[&Record], selection: &KpiSelection) -> KpiSummary {
    let genders = gender_counts(rows);
    KpiSummary {
        sessions: metric_value(&KpiColumn::TrainingNumber.values(rows), selection.sessions),
        hours: metric_value(&KpiColumn::HoursCompleted.values(rows), selection.hours),
        participants: metric_value(&KpiColumn::Name.values(rows), selection.participants),
        female: genders.female,
        male: genders.male,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenderCounts {
    pub female: usize,
    pub male: usize,
}

/// Rows whose gender is neither "female" nor "male" (case-insensitive) count
/// towards neither total.
pub fn gender_counts(rows: &[&Record]) -> GenderCounts {
    GenderCounts {
        female: rows.iter().filter(|r| r.has_gender("female")).count(),
        male: rows.iter().filter(|r| r.has_gender("male")).count(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartMetric {
    Sessions,
    Participants,
    Hours,
}

impl ChartMetric {
    pub const ALL: [ChartMetric; 3] = [
        ChartMetric::Sessions,
        ChartMetric::Participants,
        ChartMetric::Hours,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChartMetric::Sessions => "Sessions",
            ChartMetric::Participants => "Participants",
            ChartMetric::Hours => "Hours",
        }
    }

    pub fn param(self) -> &'static str {
        match self {
            ChartMetric::Sessions => "sessions",
            ChartMetric::Participants => "participants",
            ChartMetric::Hours => "hours",
        }
    }

    pub fn from_param(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|metric| metric.param() == value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarPoint {
    pub school: String,
    pub year: i32,
    pub value: f64,
}

/// Group by (School, Year), sorted by school then year.
/// Sessions = distinct training numbers, Participants = non-null names,
/// Hours = summed hours (zero when a group has none).
pub fn group_by_school_year(rows: &[&Record], metric: ChartMetric) -> Vec<BarPoint> {
    let mut groups: BTreeMap<(&str, i32), Vec<&Record>> = BTreeMap::new();
    for &record in rows {
        groups
            .entry((record.school.as_str(), record.year))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|((school, year), members)| {
            let value = match metric {
                ChartMetric::Sessions => members
                    .iter()
                    .filter_map(|r| r.training_number.as_deref())
                    .collect::<HashSet<_>>()
                    .len() as f64,
                ChartMetric::Participants => {
                    members.iter().filter(|r| r.name.is_some()).count() as f64
                }
                ChartMetric::Hours => members.iter().filter_map(|r| r.hours_completed).sum::<f64>(),
            };
            BarPoint {
                school: school.to_string(),
                year,
                value,
            }
        })
        .collect()
}

/// Row count per state, largest first (ties by name).
pub fn state_counts(rows: &[&Record]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in rows {
        *counts.entry(record.state.as_str()).or_insert(0) += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(s, c)| (s.to_string(), c))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeTotal {
    pub participation_type: String,
    pub rows: usize,
    pub hours: f64,
}

/// Rows and hours per participation type, in label order.
pub fn participation_totals(rows: &[&Record]) -> Vec<TypeTotal> {
    let mut totals: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for record in rows {
        if let Some(pt) = record.participation_type.as_deref() {
            let entry = totals.entry(pt).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += record.hours_completed.unwrap_or(0.0);
        }
    }
    totals
        .into_iter()
        .map(|(pt, (rows, hours))| TypeTotal {
            participation_type: pt.to_string(),
            rows,
            hours,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    pub name: String,
    pub trainings: Vec<String>,
    pub total_hours: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub designation: Option<String>,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub gender: Option<String>,
    pub total_hours: Option<f64>,
    pub school: Option<String>,
    pub state: Option<String>,
    pub trainings: Vec<String>,
    pub certificate: Option<Certificate>,
}

pub struct TrainingAnalyzer<'a> {
    pub table: &'a Table,
    pub eligibility_hours: f64,
}

impl<'a> TrainingAnalyzer<'a> {
    pub fn new(table: &'a Table, eligibility_hours: f64) -> Self {
        Self {
            table,
            eligibility_hours,
        }
    }

    /// Total hours per name over the whole table, ignoring any filters.
    pub fn hours_by_name(&self) -> BTreeMap<&'a str, f64> {
        let mut totals: BTreeMap<&'a str, f64> = BTreeMap::new();
        for record in self.table.records() {
            if let Some(name) = record.name.as_deref() {
                *totals.entry(name).or_insert(0.0) += record.hours_completed.unwrap_or(0.0);
            }
        }
        totals
    }

    /// Names whose total hours reach the threshold, sorted.
    pub fn eligible_names(&self) -> Vec<&'a str> {
        self.hours_by_name()
            .into_iter()
            .filter(|(_, hours)| *hours >= self.eligibility_hours)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn is_eligible(&self, name: &str) -> bool {
        self.hours_by_name()
            .get(name)
            .map(|hours| *hours >= self.eligibility_hours)
            .unwrap_or(false)
    }

    /// Names offered in the participant picker.
    pub fn name_options(&self, eligible_only: bool) -> Vec<&'a str> {
        if eligible_only {
            self.eligible_names()
        } else {
            self.hours_by_name().into_keys().collect()
        }
    }

    /// Profile built from every row of `name`. Fields come from the first
    /// row; hours and trainings span all rows.
    pub fn profile(&self, name: &str) -> Option<Profile> {
        let rows = filter_by_name(self.table.records(), name);
        let first = rows.first()?;

        let hours: Vec<f64> = rows.iter().filter_map(|r| r.hours_completed).collect();
        let total_hours = if hours.is_empty() { None } else { Some(hours.iter().sum()) };

        let mut trainings: Vec<String> = Vec::new();
        for program in rows.iter().filter_map(|r| r.training_program.as_ref()) {
            if !trainings.contains(program) {
                trainings.push(program.clone());
            }
        }

        let known = |value: &str| (value != UNKNOWN_LABEL).then(|| value.to_string());

        let certificate = total_hours
            .filter(|total| *total >= self.eligibility_hours)
            .map(|total| Certificate {
                name: name.to_string(),
                trainings: trainings.clone(),
                total_hours: total,
            });

        Some(Profile {
            name: name.to_string(),
            designation: first.designation.clone(),
            email: first.email.clone(),
            contact_number: first.contact_number.clone(),
            gender: first.gender.clone(),
            total_hours,
            school: known(&first.school),
            state: known(&first.state),
            trainings,
            certificate,
        })
    }
}

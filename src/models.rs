use serde::{Deserialize, Serialize};
use std::path::Path;

/// Year value used when the source cell is empty or not numeric.
pub const UNKNOWN_YEAR: i32 = -1;
/// Placeholder for empty School and State cells.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    // Data source configuration
    pub data_source_mode: DataSourceMode,
    pub data_file: String,
    pub data_url: Option<String>,
    /// Worksheet read when the source is an xlsx workbook.
    pub sheet_name: String,
    pub logo_path: Option<String>,
    // Server
    pub bind_address: String,
    pub port: u16,
    pub refresh_interval_secs: u64,
    pub eligibility_hours: f64,
    pub wheel_radius: f64,
    pub log_filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSourceMode {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "internet")]
    Internet,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "National Security Training Analytics".to_string(),
            data_source_mode: DataSourceMode::Local,
            data_file: "training_data.csv".to_string(),
            data_url: None,
            sheet_name: "Data".to_string(),
            logo_path: Some("rru_logo.png".to_string()),
            bind_address: "127.0.0.1".to_string(),
            port: 8501,
            refresh_interval_secs: 5,
            eligibility_hours: 90.0,
            wheel_radius: 250.0,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the dashboard cannot render with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.wheel_radius.is_finite() && self.wheel_radius > 0.0) {
            anyhow::bail!("wheel_radius must be a positive number, got {}", self.wheel_radius);
        }
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("refresh_interval_secs must be at least 1");
        }
        if !(self.eligibility_hours.is_finite() && self.eligibility_hours >= 0.0) {
            anyhow::bail!(
                "eligibility_hours must be zero or more, got {}",
                self.eligibility_hours
            );
        }
        if self.sheet_name.trim().is_empty() {
            anyhow::bail!("sheet_name must not be empty");
        }
        Ok(())
    }

    pub fn save_to_file(&self, file_path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// Canonical record fields. Source headers are mapped onto these at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Designation,
    Email,
    ContactNumber,
    Gender,
    School,
    State,
    Country,
    TrainingProgram,
    TrainingNumber,
    ParticipationType,
    Year,
    HoursCompleted,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Name,
        Field::Designation,
        Field::Email,
        Field::ContactNumber,
        Field::Gender,
        Field::School,
        Field::State,
        Field::Country,
        Field::TrainingProgram,
        Field::TrainingNumber,
        Field::ParticipationType,
        Field::Year,
        Field::HoursCompleted,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Designation => "Designation",
            Field::Email => "Email",
            Field::ContactNumber => "Contact_Number",
            Field::Gender => "Gender",
            Field::School => "School",
            Field::State => "State",
            Field::Country => "Country",
            Field::TrainingProgram => "Training_Program",
            Field::TrainingNumber => "Training_Number",
            Field::ParticipationType => "Participation_Type",
            Field::Year => "Year",
            Field::HoursCompleted => "Hours_Completed",
        }
    }

    /// Columns the dashboard cannot work without.
    pub fn is_required(self) -> bool {
        !matches!(
            self,
            Field::Designation | Field::Email | Field::ContactNumber | Field::Country
        )
    }

    /// Resolve a (whitespace-normalized) source header to a field.
    pub fn from_header(header: &str) -> Option<Field> {
        RENAME
            .iter()
            .find(|(source, _)| *source == header)
            .map(|(_, field)| *field)
            .or_else(|| Field::ALL.into_iter().find(|f| f.canonical_name() == header))
    }
}

/// Source spreadsheet header -> canonical field.
pub const RENAME: [(&str, Field); 13] = [
    ("Name of the Training Program", Field::TrainingProgram),
    ("School", Field::School),
    ("Year", Field::Year),
    ("Name", Field::Name),
    ("Designation", Field::Designation),
    ("State/Central", Field::State),
    ("Email", Field::Email),
    ("Contact Number", Field::ContactNumber),
    ("Gender", Field::Gender),
    ("Participation type", Field::ParticipationType),
    ("Training number", Field::TrainingNumber),
    ("Country", Field::Country),
    ("Number of Hours", Field::HoursCompleted),
];

/// One (person, training program, year) row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub name: Option<String>,
    pub designation: Option<String>,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub gender: Option<String>,
    pub school: String,
    pub state: String,
    pub country: Option<String>,
    pub training_program: Option<String>,
    pub training_number: Option<String>,
    pub participation_type: Option<String>,
    pub year: i32,
    pub hours_completed: Option<f64>,
}

impl Record {
    pub fn has_gender(&self, wanted: &str) -> bool {
        self.gender
            .as_deref()
            .map(|g| g.to_lowercase() == wanted)
            .unwrap_or(false)
    }

    pub fn name_is(&self, wanted: &str) -> bool {
        self.name.as_deref() == Some(wanted)
    }

    /// Text form of a field as written to CSV exports and the raw data table.
    pub fn field_text(&self, field: Field) -> String {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        match field {
            Field::Name => text(&self.name),
            Field::Designation => text(&self.designation),
            Field::Email => text(&self.email),
            Field::ContactNumber => text(&self.contact_number),
            Field::Gender => text(&self.gender),
            Field::School => self.school.clone(),
            Field::State => self.state.clone(),
            Field::Country => text(&self.country),
            Field::TrainingProgram => text(&self.training_program),
            Field::TrainingNumber => text(&self.training_number),
            Field::ParticipationType => text(&self.participation_type),
            Field::Year => self.year.to_string(),
            Field::HoursCompleted => self
                .hours_completed
                .map(|h| h.to_string())
                .unwrap_or_default(),
        }
    }
}

/// The loaded table. Built once by the loader and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Table {
    records: Vec<Record>,
}

impl Table {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<Record> for Table {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

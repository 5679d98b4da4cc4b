use crate::error::DataError;
use crate::models::{Config, DataSourceMode, Field, Record, Table, UNKNOWN_LABEL, UNKNOWN_YEAR};
use calamine::{Data, Reader, Xlsx};
use regex::Regex;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

/// Worksheet read from workbooks unless configured otherwise.
pub const DEFAULT_SHEET: &str = "Data";

/// On-disk layout of the data source, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Xlsx,
}

impl DataFormat {
    /// `.xlsx` and `.xlsm` are workbooks; anything else is read as CSV.
    /// URLs are matched on their path, ignoring any query or fragment.
    pub fn from_source(source: &str) -> Self {
        let path = source.split(['?', '#']).next().unwrap_or(source);
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx") | Some("xlsm") => DataFormat::Xlsx,
            _ => DataFormat::Csv,
        }
    }
}

pub struct TableLoader {
    client: reqwest::Client,
    sheet_name: String,
}

impl Default for TableLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TableLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            sheet_name: DEFAULT_SHEET.to_string(),
        }
    }

    pub fn with_sheet_name(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = sheet_name.into();
        self
    }

    /// Load the table from whichever source the config points at.
    pub async fn load(&self, config: &Config) -> Result<Table, DataError> {
        match config.data_source_mode {
            DataSourceMode::Local => self.load_file(&config.data_file),
            DataSourceMode::Internet => {
                let url = config.data_url.as_deref().ok_or(DataError::NoUrl)?;
                self.load_url(url).await
            }
        }
    }

    pub fn load_file(&self, file_path: impl AsRef<Path>) -> Result<Table, DataError> {
        let path = file_path.as_ref();
        let content = std::fs::read(path).map_err(|source| DataError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let format = DataFormat::from_source(&path.to_string_lossy());
        let table = self.parse(&content, format)?;
        info!(path = %path.display(), ?format, rows = table.len(), "loaded training data");
        Ok(table)
    }

    pub async fn load_url(&self, url: &str) -> Result<Table, DataError> {
        info!(%url, "fetching training data");

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|source| DataError::Fetch {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(DataError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| DataError::Fetch {
            url: url.to_string(),
            source,
        })?;

        let format = DataFormat::from_source(url);
        let table = self.parse(body.as_ref(), format)?;
        info!(%url, ?format, rows = table.len(), "loaded training data");
        Ok(table)
    }

    fn parse(&self, content: &[u8], format: DataFormat) -> Result<Table, DataError> {
        match format {
            DataFormat::Csv => parse_csv(content),
            DataFormat::Xlsx => parse_xlsx(content, &self.sheet_name),
        }
    }
}

/// Trim a header and collapse runs of inner whitespace.
pub fn normalize_header(header: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    whitespace.replace_all(header.trim(), " ").into_owned()
}

/// Parse a CSV export of the attendance spreadsheet into a typed table.
pub fn parse_csv<R: std::io::Read>(reader: R) -> Result<Table, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader.records().map(|row| {
        row.map(|row| row.iter().map(str::to_string).collect())
            .map_err(DataError::from)
    });
    build_table(&headers, rows)
}

/// Parse one worksheet of an xlsx workbook. The first row holds the headers.
pub fn parse_xlsx(content: &[u8], sheet_name: &str) -> Result<Table, DataError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(content))?;
    let range = workbook.worksheet_range(sheet_name)?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
    let headers = rows.next().unwrap_or_default();
    build_table(&headers, rows.map(Ok))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Map headers onto fields, check required columns, and build typed records
/// with the null filling shared by every input format.
fn build_table(
    headers: &[String],
    rows: impl Iterator<Item = Result<Vec<String>, DataError>>,
) -> Result<Table, DataError> {
    let mut columns: HashMap<Field, usize> = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        let normalized = normalize_header(header);
        match Field::from_header(&normalized) {
            // First occurrence wins when a header repeats.
            Some(field) => {
                columns.entry(field).or_insert(index);
            }
            None => debug!(header = %normalized, "ignoring unmapped column"),
        }
    }

    if let Some(missing) = Field::ALL
        .into_iter()
        .find(|field| field.is_required() && !columns.contains_key(field))
    {
        return Err(DataError::MissingColumn(missing.canonical_name()));
    }

    let mut records = Vec::new();
    for row in rows {
        let row = row?;
        let cell = |field: Field| -> Option<String> {
            columns
                .get(&field)
                .and_then(|&index| row.get(index))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        records.push(Record {
            name: cell(Field::Name),
            designation: cell(Field::Designation),
            email: cell(Field::Email),
            contact_number: cell(Field::ContactNumber),
            gender: cell(Field::Gender),
            school: cell(Field::School).unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            state: cell(Field::State).unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            country: cell(Field::Country),
            training_program: cell(Field::TrainingProgram),
            training_number: cell(Field::TrainingNumber),
            participation_type: cell(Field::ParticipationType),
            year: cell(Field::Year)
                .as_deref()
                .and_then(parse_year)
                .unwrap_or(UNKNOWN_YEAR),
            hours_completed: cell(Field::HoursCompleted)
                .as_deref()
                .and_then(parse_number),
        });
    }

    Ok(Table::new(records))
}

fn parse_number(value: &str) -> Option<f64> {
    value
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Spreadsheet exports often write years as `2023.0`.
fn parse_year(value: &str) -> Option<i32> {
    parse_number(value).map(|year| year.trunc() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"Name,Designation,Email,Contact Number,Gender,School,State/Central,Country,Name of the Training Program,Training number,Participation type,Year,Number of Hours
Asha,Inspector,asha@example.org,12345,Female,School of Policing,Gujarat,India,Cyber Security,T1,Trainee,2023,40
Ravi,,,,Male,,,India,Forensics,T2,Trainer,2023.0,
Meena,,,,female,School of Policing,Assam,India,Cyber Security,T1,Trainee,,"1,250"
"#;

    #[test]
    fn parses_source_headers_and_fills_unknowns() {
        let table = parse_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);

        let asha = &table.records()[0];
        assert_eq!(asha.name.as_deref(), Some("Asha"));
        assert_eq!(asha.state, "Gujarat");
        assert_eq!(asha.training_program.as_deref(), Some("Cyber Security"));
        assert_eq!(asha.year, 2023);
        assert_eq!(asha.hours_completed, Some(40.0));

        let ravi = &table.records()[1];
        assert_eq!(ravi.designation, None);
        assert_eq!(ravi.school, UNKNOWN_LABEL);
        assert_eq!(ravi.state, UNKNOWN_LABEL);
        assert_eq!(ravi.year, 2023);
        assert_eq!(ravi.hours_completed, None);

        let meena = &table.records()[2];
        assert_eq!(meena.year, UNKNOWN_YEAR);
        assert_eq!(meena.hours_completed, Some(1250.0));
    }

    #[test]
    fn header_whitespace_is_normalized() {
        assert_eq!(
            normalize_header("  Name of the   Training\tProgram "),
            "Name of the Training Program"
        );
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let csv = "Name,Year\nAsha,2023\n";
        let err = parse_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn("Gender")));
    }

    #[test]
    fn optional_columns_may_be_absent() {
        let csv = "Name,Gender,School,State,Training_Program,Training_Number,Participation_Type,Year,Hours_Completed\n\
                   Asha,Female,S1,Goa,P1,1,Trainee,2022,12.5\n";
        let table = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.records()[0].email, None);
        assert_eq!(table.records()[0].hours_completed, Some(12.5));
    }

    #[test]
    fn load_file_reports_missing_path() {
        let loader = TableLoader::new();
        let err = loader.load_file("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, DataError::Read { .. }));
    }

    fn workbook(sheet: &str, rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match value.parse::<f64>() {
                    Ok(number) => worksheet.write_number(r, c, number).unwrap(),
                    Err(_) if value.is_empty() => continue,
                    Err(_) => worksheet.write_string(r, c, *value).unwrap(),
                };
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    const XLSX_HEADERS: &[&str] = &[
        "Name of the Training Program",
        "School",
        "Year",
        "Name",
        "State/Central",
        "Gender",
        "Participation type",
        "Training number",
        "Number of Hours",
    ];

    fn sample_workbook(sheet: &str) -> Vec<u8> {
        workbook(
            sheet,
            &[
                XLSX_HEADERS,
                &[
                    "Cyber Security",
                    "SITAICS",
                    "2023",
                    "Asha",
                    "Gujarat",
                    "Female",
                    "Trainee",
                    "T1",
                    "40",
                ],
                &["Forensics", "", "2022", "Ravi", "", "Male", "Trainer", "T2", ""],
            ],
        )
    }

    #[test]
    fn parses_workbook_sheet_through_the_rename_map() {
        let table = parse_xlsx(&sample_workbook("Data"), DEFAULT_SHEET).unwrap();
        assert_eq!(table.len(), 2);

        let asha = &table.records()[0];
        assert_eq!(asha.training_program.as_deref(), Some("Cyber Security"));
        assert_eq!(asha.year, 2023);
        assert_eq!(asha.hours_completed, Some(40.0));
        assert_eq!(asha.state, "Gujarat");

        let ravi = &table.records()[1];
        assert_eq!(ravi.school, UNKNOWN_LABEL);
        assert_eq!(ravi.state, UNKNOWN_LABEL);
        assert_eq!(ravi.hours_completed, None);
    }

    #[test]
    fn workbook_without_the_sheet_is_an_error() {
        let err = parse_xlsx(&sample_workbook("Sheet1"), DEFAULT_SHEET).unwrap_err();
        assert!(matches!(err, DataError::Xlsx(_)));
    }

    #[test]
    fn workbook_missing_required_column_is_fatal() {
        let content = workbook("Data", &[&["Name", "Year"], &["Asha", "2023"]]);
        let err = parse_xlsx(&content, DEFAULT_SHEET).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn("Gender")));
    }

    #[test]
    fn format_follows_the_extension() {
        assert_eq!(DataFormat::from_source("Training Data.XLSX"), DataFormat::Xlsx);
        assert_eq!(DataFormat::from_source("https://host/data.xlsx?dl=1"), DataFormat::Xlsx);
        assert_eq!(DataFormat::from_source("training_data.csv"), DataFormat::Csv);
        assert_eq!(DataFormat::from_source("export"), DataFormat::Csv);
    }

    #[test]
    fn load_file_reads_workbooks_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(&sample_workbook("Attendance")).unwrap();

        let table = TableLoader::new()
            .with_sheet_name("Attendance")
            .load_file(file.path())
            .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn load_file_reads_csv_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let table = TableLoader::new().load_file(file.path()).unwrap();
        assert_eq!(table.len(), 3);
    }
}

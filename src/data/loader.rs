//! Ordered data-source chain: local spreadsheet, remote UCI fetch, synthetic
//!
//! Every source either yields a fully normalized canonical frame or an error.
//! Errors are logged and the next source is tried; the synthetic generator
//! always terminates the chain.

use crate::config::Settings;
use crate::error::{Result, RiskError};
use calamine::{open_workbook_auto, Data, Reader};
use polars::prelude::*;
use serde::Deserialize;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::schema::{normalize, SourceShape};
use super::synthetic::SyntheticGenerator;

/// One place a training table can come from
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// The UCI spreadsheet (`.xls`/`.xlsx`) or its CSV export, header on the second row
    LocalFile(PathBuf),
    /// UCI ML repository dataset lookup by id
    Remote { api_url: String, dataset_id: u32 },
    Synthetic { rows: usize, seed: u64 },
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::LocalFile(path) => write!(f, "local file {}", path.display()),
            DataSource::Remote { api_url, dataset_id } => {
                write!(f, "remote {}?id={}", api_url, dataset_id)
            }
            DataSource::Synthetic { rows, seed } => {
                write!(f, "synthetic ({} rows, seed {})", rows, seed)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct UciDatasetResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<UciDataset>,
}

#[derive(Debug, Deserialize)]
struct UciDataset {
    #[serde(default)]
    data_url: Option<String>,
}

/// Loads the canonical training table, never failing on source errors.
#[derive(Debug, Clone)]
pub struct DataLoader {
    sources: Vec<DataSource>,
    timeout: Duration,
}

impl DataLoader {
    pub fn new(sources: Vec<DataSource>) -> Self {
        Self {
            sources,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the chain from settings.
    ///
    /// The forced-synthetic flag short-circuits everything. Otherwise the local
    /// export is tried when present, then the remote fetch, then synthetic data.
    pub fn from_settings(settings: &Settings) -> Self {
        let synthetic = DataSource::Synthetic {
            rows: settings.synthetic_rows,
            seed: settings.random_seed,
        };

        let sources = if settings.use_synthetic_data {
            vec![synthetic]
        } else {
            let mut sources = Vec::with_capacity(3);
            if settings.local_data_path.exists() {
                sources.push(DataSource::LocalFile(settings.local_data_path.clone()));
            }
            sources.push(DataSource::Remote {
                api_url: settings.uci_api_url.clone(),
                dataset_id: settings.uci_dataset_id,
            });
            sources.push(synthetic);
            sources
        };

        Self::new(sources).with_timeout(Duration::from_secs(settings.remote_timeout_secs))
    }

    pub fn sources(&self) -> &[DataSource] {
        &self.sources
    }

    /// Walk the chain and return the first table that loads and normalizes.
    pub async fn load(&self) -> Result<DataFrame> {
        for source in &self.sources {
            match self.attempt(source).await {
                Ok(df) => {
                    info!(source = %source, rows = df.height(), cols = df.width(), "Dataset loaded");
                    return Ok(df);
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Data source failed, trying next");
                }
            }
        }

        warn!("All configured data sources failed, using default synthetic data");
        SyntheticGenerator::default().generate()
    }

    async fn attempt(&self, source: &DataSource) -> Result<DataFrame> {
        match source {
            DataSource::LocalFile(path) => read_local_file(path),
            DataSource::Remote { api_url, dataset_id } => {
                fetch_uci_dataset(api_url, *dataset_id, self.timeout).await
            }
            DataSource::Synthetic { rows, seed } => {
                info!(rows = rows, seed = seed, "Generating synthetic data");
                SyntheticGenerator::new(*rows).with_seed(*seed).generate()
            }
        }
    }
}

const WORKBOOK_EXTENSIONS: &[&str] = &["xls", "xlsx", "xlsm", "xlsb", "ods"];

/// Read the local dataset, choosing the reader from the file extension.
pub fn read_local_file(path: &Path) -> Result<DataFrame> {
    let is_workbook = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| WORKBOOK_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w)))
        .unwrap_or(false);

    if is_workbook {
        read_spreadsheet(path)
    } else {
        read_spreadsheet_export(path)
    }
}

/// Read the first worksheet of the UCI workbook.
///
/// The row above the header carries the `X1..X23`/`Y` codes and is skipped.
/// Every data cell must be numeric or empty.
pub fn read_spreadsheet(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(RiskError::DataError(format!("{} does not exist", path.display())));
    }

    let shape = SourceShape::SpreadsheetExport;
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RiskError::DataError(format!("{} has no worksheets", path.display())))??;

    let mut rows = range.rows().skip(shape.header_offset());
    let header = rows
        .next()
        .ok_or_else(|| RiskError::DataError(format!("{} has no header row", path.display())))?;
    let body: Vec<&[Data]> = rows.collect();

    let columns = header
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| {
            let name = cell.to_string().trim().to_string();
            (!name.is_empty()).then_some((idx, name))
        })
        .map(|(idx, name)| {
            let values = body
                .iter()
                .enumerate()
                .map(|(row, cells)| cell_to_f64(cells.get(idx), &name, row))
                .collect::<Result<Vec<Option<f64>>>>()?;
            Ok(Column::new(name.as_str().into(), values))
        })
        .collect::<Result<Vec<Column>>>()?;

    info!(path = %path.display(), rows = body.len(), cols = columns.len(), "Read spreadsheet");
    normalize(&DataFrame::new(columns)?, shape)
}

fn cell_to_f64(cell: Option<&Data>, column: &str, row: usize) -> Result<Option<f64>> {
    match cell {
        None | Some(Data::Empty) => Ok(None),
        Some(Data::Int(v)) => Ok(Some(*v as f64)),
        Some(Data::Float(v)) => Ok(Some(*v)),
        Some(Data::Bool(v)) => Ok(Some(if *v { 1.0 } else { 0.0 })),
        Some(Data::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Data::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            RiskError::DataError(format!("non-numeric cell '{}' in column '{}', row {}", s, column, row))
        }),
        Some(other) => Err(RiskError::DataError(format!(
            "unsupported cell '{}' in column '{}', row {}",
            other, column, row
        ))),
    }
}

/// Read the CSV export of the spreadsheet, skipping the metadata line above the header.
pub fn read_spreadsheet_export(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(RiskError::DataError(format!("{} does not exist", path.display())));
    }

    let shape = SourceShape::SpreadsheetExport;
    let raw = CsvReadOptions::default()
        .with_has_header(true)
        .with_skip_rows(shape.header_offset())
        .with_infer_schema_length(Some(10_000))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    normalize(&raw, shape)
}

/// Resolve the dataset's CSV location through the UCI API, then download it.
async fn fetch_uci_dataset(api_url: &str, dataset_id: u32, timeout: Duration) -> Result<DataFrame> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("credit-risk/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let lookup_url = format!("{}?id={}", api_url, dataset_id);
    info!(url = %lookup_url, "Fetching dataset metadata");

    let meta: UciDatasetResponse = client
        .get(&lookup_url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let data_url = meta
        .data
        .and_then(|d| d.data_url)
        .ok_or_else(|| {
            RiskError::DataError(format!(
                "dataset {} has no data_url ({})",
                dataset_id,
                meta.message.unwrap_or_else(|| "no message".to_string())
            ))
        })?;

    info!(url = %data_url, "Downloading dataset");
    let bytes = client
        .get(&data_url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    parse_remote_csv(&bytes)
}

/// Parse a downloaded CSV and normalize it according to its detected shape.
pub fn parse_remote_csv(bytes: &[u8]) -> Result<DataFrame> {
    let raw = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    let names: Vec<&str> = raw.get_column_names().iter().map(|n| n.as_str()).collect();
    let shape = SourceShape::detect(&names);
    info!(shape = %shape, rows = raw.height(), "Normalizing remote dataset");
    normalize(&raw, shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::{canonical_columns, validate_canonical};
    use std::io::Write;

    fn readable_csv(with_metadata_row: bool) -> String {
        let mut out = String::new();
        if with_metadata_row {
            let meta: Vec<String> = std::iter::once(String::new())
                .chain((1..=23).map(|i| format!("X{}", i)))
                .chain(std::iter::once("Y".to_string()))
                .collect();
            out.push_str(&meta.join(","));
            out.push('\n');
        }
        out.push_str("ID,LIMIT_BAL,SEX,EDUCATION,MARRIAGE,AGE,PAY_0,PAY_2,PAY_3,PAY_4,PAY_5,PAY_6,");
        out.push_str("BILL_AMT1,BILL_AMT2,BILL_AMT3,BILL_AMT4,BILL_AMT5,BILL_AMT6,");
        out.push_str("PAY_AMT1,PAY_AMT2,PAY_AMT3,PAY_AMT4,PAY_AMT5,PAY_AMT6,default payment next month\n");
        out.push_str("1,20000,2,2,1,24,2,2,-1,-1,-2,-2,3913,3102,689,0,0,0,0,689,0,0,0,0,1\n");
        out.push_str("2,120000,2,2,2,26,-1,2,0,0,0,2,2682,1725,2682,3272,3455,3261,0,1000,1000,1000,0,2000,1\n");
        out
    }

    #[test]
    fn test_read_spreadsheet_export() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(readable_csv(true).as_bytes()).unwrap();

        let df = read_spreadsheet_export(file.path()).unwrap();
        validate_canonical(&df).unwrap();
        assert_eq!(df.height(), 2);

        let pay_1: Vec<f64> = df.column("pay_1").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(pay_1, vec![2.0, -1.0]);
    }

    fn write_workbook(path: &Path, csv: &str) {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (row, line) in csv.lines().enumerate() {
            for (col, cell) in line.split(',').enumerate() {
                let (row, col) = (row as u32, col as u16);
                match cell.parse::<f64>() {
                    Ok(value) => {
                        sheet.write_number(row, col, value).unwrap();
                    }
                    Err(_) if cell.is_empty() => {}
                    Err(_) => {
                        sheet.write_string(row, col, cell).unwrap();
                    }
                }
            }
        }
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_read_workbook_uses_second_row_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default of credit card clients.xlsx");
        write_workbook(&path, &readable_csv(true));

        let df = read_local_file(&path).unwrap();
        validate_canonical(&df).unwrap();
        assert_eq!(df.height(), 2);

        let pay_1: Vec<f64> = df.column("pay_1").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(pay_1, vec![2.0, -1.0]);
        let target: Vec<f64> = df.column("target").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(target, vec![1.0, 1.0]);
    }

    #[test]
    fn test_workbook_matches_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let xlsx = dir.path().join("clients.xlsx");
        let csv = dir.path().join("clients.csv");
        write_workbook(&xlsx, &readable_csv(true));
        std::fs::write(&csv, readable_csv(true)).unwrap();

        let from_workbook = read_local_file(&xlsx).unwrap();
        let from_export = read_local_file(&csv).unwrap();
        assert!(from_workbook.equals(&from_export));
    }

    #[test]
    fn test_malformed_workbook_is_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let text_cell = dir.path().join("text.xlsx");
        write_workbook(&text_cell, &readable_csv(true).replace(",24,", ",twenty-four,"));
        assert!(read_local_file(&text_cell).is_err());

        let no_header_offset = dir.path().join("flat.xlsx");
        write_workbook(&no_header_offset, &readable_csv(false));
        assert!(read_local_file(&no_header_offset).is_err());

        let not_a_workbook = dir.path().join("garbage.xls");
        std::fs::write(&not_a_workbook, b"not a spreadsheet").unwrap();
        assert!(read_local_file(&not_a_workbook).is_err());
    }

    #[test]
    fn test_parse_remote_readable_csv() {
        let df = parse_remote_csv(readable_csv(false).as_bytes()).unwrap();
        assert_eq!(df.shape(), (2, 24));
        let limit: Vec<f64> = df.column("limit_bal").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(limit, vec![20000.0, 120000.0]);
    }

    #[test]
    fn test_missing_local_file_errors() {
        let result = read_spreadsheet_export(Path::new("/nonexistent/credit.csv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_forced_synthetic_chain() {
        let settings = Settings {
            use_synthetic_data: true,
            ..Settings::default()
        };
        let loader = DataLoader::from_settings(&settings);
        assert_eq!(
            loader.sources(),
            &[DataSource::Synthetic { rows: 1000, seed: 42 }]
        );
    }

    #[test]
    fn test_chain_order_without_local_file() {
        let settings = Settings {
            local_data_path: PathBuf::from("/nonexistent/credit.csv"),
            ..Settings::default()
        };
        let loader = DataLoader::from_settings(&settings);
        assert!(matches!(loader.sources()[0], DataSource::Remote { .. }));
        assert!(matches!(loader.sources()[1], DataSource::Synthetic { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_sources_fall_back_to_synthetic() {
        let settings = Settings {
            local_data_path: PathBuf::from("/nonexistent/credit.csv"),
            uci_api_url: "http://127.0.0.1:9/api/dataset".to_string(),
            remote_timeout_secs: 2,
            synthetic_rows: 120,
            ..Settings::default()
        };

        let df = DataLoader::from_settings(&settings).load().await.unwrap();
        assert_eq!(df.shape(), (120, canonical_columns().len()));
        validate_canonical(&df).unwrap();
    }

    #[tokio::test]
    async fn test_empty_chain_still_yields_data() {
        let df = DataLoader::new(vec![]).load().await.unwrap();
        assert_eq!(df.width(), 24);
    }
}

//! Integration test: raw schema shapes and the data source chain

use credit_risk::config::Settings;
use credit_risk::data::loader::{parse_remote_csv, read_spreadsheet_export};
use credit_risk::data::{canonical_columns, normalize, DataLoader, DataSource, SourceShape, SyntheticGenerator};
use polars::prelude::*;
use std::io::Write;
use std::time::Duration;

const ROWS: [&str; 3] = [
    "1,20000,2,2,1,24,2,2,-1,-1,-2,-2,3913,3102,689,0,0,0,0,689,0,0,0,0,1",
    "2,120000,2,2,2,26,-1,2,0,0,0,2,2682,1725,2682,3272,3455,3261,0,1000,1000,1000,0,2000,1",
    "3,90000,2,2,2,34,0,0,0,0,0,0,29239,14027,13559,14331,14948,15549,1518,1500,1000,1000,1000,5000,0",
];

fn readable_header() -> String {
    [
        "ID,LIMIT_BAL,SEX,EDUCATION,MARRIAGE,AGE,PAY_0,PAY_2,PAY_3,PAY_4,PAY_5,PAY_6",
        "BILL_AMT1,BILL_AMT2,BILL_AMT3,BILL_AMT4,BILL_AMT5,BILL_AMT6",
        "PAY_AMT1,PAY_AMT2,PAY_AMT3,PAY_AMT4,PAY_AMT5,PAY_AMT6,default payment next month",
    ]
    .join(",")
}

fn coded_header() -> String {
    std::iter::once("ID".to_string())
        .chain((1..=23).map(|i| format!("X{}", i)))
        .chain(std::iter::once("Y".to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

fn csv(header: &str) -> String {
    let mut out = format!("{}\n", header);
    for row in ROWS {
        out.push_str(row);
        out.push('\n');
    }
    out
}

#[test]
fn test_all_shapes_normalize_identically() {
    let coded = parse_remote_csv(csv(&coded_header()).as_bytes()).unwrap();
    let readable = parse_remote_csv(csv(&readable_header()).as_bytes()).unwrap();

    // spreadsheet export: coded names on the first row, real header on the second
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}\n{}", coded_header(), csv(&readable_header())).unwrap();
    let exported = read_spreadsheet_export(file.path()).unwrap();

    assert!(coded.equals(&readable));
    assert!(readable.equals(&exported));

    let names: Vec<&str> = coded.get_column_names().iter().map(|n| n.as_str()).collect();
    assert_eq!(names, canonical_columns());
    assert_eq!(coded.height(), 3);
}

#[test]
fn test_pay_0_and_x6_surface_as_pay_1() {
    let coded = parse_remote_csv(csv(&coded_header()).as_bytes()).unwrap();
    let readable = parse_remote_csv(csv(&readable_header()).as_bytes()).unwrap();

    for df in [&coded, &readable] {
        let pay_1: Vec<f64> = df.column("pay_1").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(pay_1, vec![2.0, -1.0, 0.0]);
        assert!(df.column("pay_0").is_err());
        assert!(df.column("id").is_err());
    }
}

#[test]
fn test_missing_column_fails_normalization() {
    let df = df! { "LIMIT_BAL" => [1.0], "SEX" => [2.0] }.unwrap();
    assert!(normalize(&df, SourceShape::UciReadable).is_err());
}

#[tokio::test]
async fn test_unreachable_remote_and_no_local_file_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        local_data_path: dir.path().join("missing.csv"),
        uci_api_url: "http://127.0.0.1:9/api/dataset".to_string(),
        remote_timeout_secs: 2,
        synthetic_rows: 150,
        ..Settings::default()
    };

    let loader = DataLoader::from_settings(&settings);
    assert_eq!(loader.sources().len(), 2);

    let df = loader.load().await.unwrap();
    assert_eq!(df.height(), 150);
    assert!(df.equals(&SyntheticGenerator::new(150).generate().unwrap()));
}

#[tokio::test]
async fn test_local_export_is_preferred() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}\n{}", coded_header(), csv(&readable_header())).unwrap();

    let settings = Settings {
        local_data_path: file.path().to_path_buf(),
        uci_api_url: "http://127.0.0.1:9/api/dataset".to_string(),
        ..Settings::default()
    };
    let df = DataLoader::from_settings(&settings).load().await.unwrap();
    assert_eq!(df.height(), 3);
}

#[tokio::test]
async fn test_forced_synthetic_skips_other_sources() {
    let settings = Settings {
        use_synthetic_data: true,
        synthetic_rows: 40,
        random_seed: 9,
        ..Settings::default()
    };
    let loader = DataLoader::from_settings(&settings);
    assert!(matches!(loader.sources(), [DataSource::Synthetic { rows: 40, seed: 9 }]));

    let df = loader.load().await.unwrap();
    assert!(df.equals(&SyntheticGenerator::new(40).with_seed(9).generate().unwrap()));
}

#[tokio::test]
async fn test_broken_local_file_falls_through() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "not,a,credit\n1,2,3").unwrap();

    let loader = DataLoader::new(vec![
        DataSource::LocalFile(file.path().to_path_buf()),
        DataSource::Synthetic { rows: 12, seed: 42 },
    ])
    .with_timeout(Duration::from_secs(1));

    assert_eq!(loader.load().await.unwrap().height(), 12);
}

#[tokio::test]
async fn test_local_workbook_is_preferred() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("default of credit card clients.xlsx");

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    let body = csv(&readable_header());
    let lines = std::iter::once(coded_header()).chain(body.lines().map(String::from));
    for (row, line) in lines.enumerate() {
        for (col, cell) in line.split(',').enumerate().filter(|(_, c)| !c.is_empty()) {
            let (row, col) = (row as u32, col as u16);
            let written = match cell.parse::<f64>() {
                Ok(value) => sheet.write_number(row, col, value).map(|_| ()),
                Err(_) => sheet.write_string(row, col, cell).map(|_| ()),
            };
            written.unwrap();
        }
    }
    workbook.save(&path).unwrap();

    let settings = Settings {
        local_data_path: path,
        uci_api_url: "http://127.0.0.1:9/api/dataset".to_string(),
        ..Settings::default()
    };
    let loader = DataLoader::from_settings(&settings);
    assert!(matches!(loader.sources()[0], DataSource::LocalFile(_)));

    let df = loader.load().await.unwrap();
    assert_eq!(df.shape(), (3, canonical_columns().len()));
    let limit: Vec<f64> = df.column("limit_bal").unwrap().f64().unwrap().into_no_null_iter().collect();
    assert_eq!(limit, vec![20000.0, 120000.0, 90000.0]);
}

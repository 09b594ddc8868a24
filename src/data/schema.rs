//! Canonical credit-default schema and source-shape normalization
//!
//! Raw data arrives in one of three layouts. Each layout is described by a
//! static rename table; normalization is the same routine for all of them:
//! lower-case, rename, keep the canonical columns in order, cast to Float64.

use crate::error::{Result, RiskError};
use polars::prelude::*;
use std::fmt;

/// The 23 feature columns, in canonical order
pub const FEATURE_COLUMNS: [&str; 23] = [
    "limit_bal",
    "sex",
    "education",
    "marriage",
    "age",
    "pay_1",
    "pay_2",
    "pay_3",
    "pay_4",
    "pay_5",
    "pay_6",
    "bill_amt1",
    "bill_amt2",
    "bill_amt3",
    "bill_amt4",
    "bill_amt5",
    "bill_amt6",
    "pay_amt1",
    "pay_amt2",
    "pay_amt3",
    "pay_amt4",
    "pay_amt5",
    "pay_amt6",
];

/// Binary default-next-month label
pub const TARGET_COLUMN: &str = "target";

/// Numeric-encoded codes that are treated as categories
pub const CATEGORICAL_COLUMNS: [&str; 3] = ["sex", "education", "marriage"];

const UCI_CODED_RENAMES: &[(&str, &str)] = &[
    ("x1", "limit_bal"),
    ("x2", "sex"),
    ("x3", "education"),
    ("x4", "marriage"),
    ("x5", "age"),
    ("x6", "pay_1"),
    ("x7", "pay_2"),
    ("x8", "pay_3"),
    ("x9", "pay_4"),
    ("x10", "pay_5"),
    ("x11", "pay_6"),
    ("x12", "bill_amt1"),
    ("x13", "bill_amt2"),
    ("x14", "bill_amt3"),
    ("x15", "bill_amt4"),
    ("x16", "bill_amt5"),
    ("x17", "bill_amt6"),
    ("x18", "pay_amt1"),
    ("x19", "pay_amt2"),
    ("x20", "pay_amt3"),
    ("x21", "pay_amt4"),
    ("x22", "pay_amt5"),
    ("x23", "pay_amt6"),
    ("y", "target"),
];

const UCI_READABLE_RENAMES: &[(&str, &str)] = &[
    ("pay_0", "pay_1"),
    ("default payment next month", "target"),
    ("default_payment_next_month", "target"),
    ("default.payment.next.month", "target"),
];

/// Layout of a raw credit-default table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceShape {
    /// `X1..X23` features with a `Y` label, as served by the UCI API
    UciCoded,
    /// Descriptive upper-case names such as `LIMIT_BAL` and `PAY_0`
    UciReadable,
    /// Spreadsheet export whose real header sits on the second row
    SpreadsheetExport,
}

impl SourceShape {
    /// Column renames applied after lower-casing
    pub fn renames(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            SourceShape::UciCoded => UCI_CODED_RENAMES,
            SourceShape::UciReadable | SourceShape::SpreadsheetExport => UCI_READABLE_RENAMES,
        }
    }

    /// Number of metadata rows above the header line
    pub fn header_offset(&self) -> usize {
        match self {
            SourceShape::SpreadsheetExport => 1,
            SourceShape::UciCoded | SourceShape::UciReadable => 0,
        }
    }

    /// Guess the shape of a table fetched from the UCI repository.
    pub fn detect<S: AsRef<str>>(columns: &[S]) -> Self {
        let has = |name: &str| {
            columns
                .iter()
                .any(|c| c.as_ref().trim().eq_ignore_ascii_case(name))
        };
        if has("x1") && has("x23") && has("y") {
            SourceShape::UciCoded
        } else {
            SourceShape::UciReadable
        }
    }
}

impl fmt::Display for SourceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceShape::UciCoded => "uci-coded",
            SourceShape::UciReadable => "uci-readable",
            SourceShape::SpreadsheetExport => "spreadsheet-export",
        };
        write!(f, "{}", name)
    }
}

/// Canonical column list: the 23 features followed by the target
pub fn canonical_columns() -> Vec<&'static str> {
    FEATURE_COLUMNS
        .iter()
        .copied()
        .chain(std::iter::once(TARGET_COLUMN))
        .collect()
}

/// Canonical name for a raw column under the given shape
pub fn canonical_name(raw: &str, shape: SourceShape) -> String {
    let lower = raw.trim().to_lowercase();
    shape
        .renames()
        .iter()
        .find(|(from, _)| *from == lower)
        .map(|(_, to)| to.to_string())
        .unwrap_or(lower)
}

/// Convert a raw table into the canonical 23 + 1 Float64 layout.
///
/// Columns outside the canonical set (such as `id`) are dropped. A missing
/// canonical column is an error.
pub fn normalize(df: &DataFrame, shape: SourceShape) -> Result<DataFrame> {
    let renamed: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| canonical_name(name.as_str(), shape))
        .collect();

    let columns = canonical_columns()
        .into_iter()
        .map(|name| {
            let idx = renamed
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| RiskError::FeatureNotFound(format!("{} ({} shape)", name, shape)))?;
            let column = df.get_columns()[idx]
                .cast(&DataType::Float64)?
                .with_name(name.into());
            Ok(column)
        })
        .collect::<Result<Vec<Column>>>()?;

    Ok(DataFrame::new(columns)?)
}

/// Check that a frame already has the canonical layout.
pub fn validate_canonical(df: &DataFrame) -> Result<()> {
    let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
    let expected = canonical_columns();
    if names != expected {
        return Err(RiskError::ShapeError {
            expected: format!("{} canonical columns", expected.len()),
            actual: format!("{:?}", names),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const READABLE_HEADER: [&str; 25] = [
        "ID", "LIMIT_BAL", "SEX", "EDUCATION", "MARRIAGE", "AGE", "PAY_0", "PAY_2", "PAY_3",
        "PAY_4", "PAY_5", "PAY_6", "BILL_AMT1", "BILL_AMT2", "BILL_AMT3", "BILL_AMT4",
        "BILL_AMT5", "BILL_AMT6", "PAY_AMT1", "PAY_AMT2", "PAY_AMT3", "PAY_AMT4", "PAY_AMT5",
        "PAY_AMT6", "default payment next month",
    ];

    fn coded_header() -> Vec<String> {
        std::iter::once("ID".to_string())
            .chain((1..=23).map(|i| format!("X{}", i)))
            .chain(std::iter::once("Y".to_string()))
            .collect()
    }

    /// Two records with identical values laid out under the given header
    pub(crate) fn raw_frame(header: &[String]) -> DataFrame {
        let columns: Vec<Column> = header
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let values: Vec<i64> = (0..2).map(|i| (j as i64) * 10 + i).collect();
                Column::new(name.as_str().into(), values)
            })
            .collect();
        DataFrame::new(columns).unwrap()
    }

    pub(crate) fn readable_header() -> Vec<String> {
        READABLE_HEADER.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_shape() {
        assert_eq!(SourceShape::detect(&coded_header()), SourceShape::UciCoded);
        assert_eq!(SourceShape::detect(&readable_header()), SourceShape::UciReadable);
    }

    #[test]
    fn test_pay_zero_becomes_pay_one() {
        assert_eq!(canonical_name("PAY_0", SourceShape::UciReadable), "pay_1");
        assert_eq!(canonical_name("PAY_0", SourceShape::SpreadsheetExport), "pay_1");
        assert_eq!(canonical_name("X6", SourceShape::UciCoded), "pay_1");
        assert_eq!(canonical_name("Y", SourceShape::UciCoded), "target");
        assert_eq!(
            canonical_name("default payment next month", SourceShape::UciReadable),
            "target"
        );
    }

    #[test]
    fn test_all_shapes_normalize_identically() {
        let coded = normalize(&raw_frame(&coded_header()), SourceShape::UciCoded).unwrap();
        let readable = normalize(&raw_frame(&readable_header()), SourceShape::UciReadable).unwrap();
        let sheet =
            normalize(&raw_frame(&readable_header()), SourceShape::SpreadsheetExport).unwrap();

        validate_canonical(&coded).unwrap();
        assert_eq!(coded.shape(), (2, 24));
        assert!(coded.equals(&readable));
        assert!(readable.equals(&sheet));
        assert!(coded.column("id").is_err());
    }

    #[test]
    fn test_missing_column_is_error() {
        let mut header = readable_header();
        header.retain(|c| c != "AGE");
        let result = normalize(&raw_frame(&header), SourceShape::UciReadable);
        assert!(matches!(result, Err(RiskError::FeatureNotFound(_))));
    }

    #[test]
    fn test_header_offset() {
        assert_eq!(SourceShape::SpreadsheetExport.header_offset(), 1);
        assert_eq!(SourceShape::UciCoded.header_offset(), 0);
    }
}

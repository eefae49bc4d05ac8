use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// Amounts keyed by the standardized `"Month N"` labels.
pub type MonthlyData = BTreeMap<String, f64>;

/// Render the standardized label for fiscal position `n` (1-based).
pub fn month_label(n: usize) -> String {
    format!("Month {n}")
}

/// Intermediate representation from the CSV parser before reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    /// 1-based source line, counting the header row as line 1.
    pub row_index: usize,
    pub client_name: String,
    pub product_name: String,
    pub monthly_data: MonthlyData,
    pub total: f64,
}

/// A row whose client and product both resolved against the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRow {
    pub row_index: usize,
    pub client_id: i64,
    /// Canonical registry name, not the name as typed in the upload.
    pub client_name: String,
    pub product_id: i64,
    pub product_line: String,
    pub monthly_data: MonthlyData,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedClientEntry {
    pub row_index: usize,
    pub client_name: String,
    pub product_name: String,
    pub total: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedProductEntry {
    /// Row of the first occurrence of this product name.
    pub row_index: usize,
    pub client_name: String,
    pub product_name: String,
    pub total: f64,
    /// Rows in the batch carrying this unresolved product name.
    pub occurrences: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateRowEntry {
    pub row_index: usize,
    pub first_row_index: usize,
    pub client_name: String,
    pub product_name: String,
    pub total: f64,
    pub reason: String,
}

/// A client as the matcher sees it: the adapter has already resolved which
/// name field to display.
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    pub id: i64,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductLine {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadType {
    Ytd3,
    Ytd2,
    Ytd1,
    Budget,
    YtdActual,
}

pub const ALL_UPLOAD_TYPES: &[UploadType] = &[
    UploadType::Ytd3,
    UploadType::Ytd2,
    UploadType::Ytd1,
    UploadType::Budget,
    UploadType::YtdActual,
];

impl UploadType {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Ytd3 => "ytd-3",
            Self::Ytd2 => "ytd-2",
            Self::Ytd1 => "ytd-1",
            Self::Budget => "budget",
            Self::YtdActual => "ytd-actual",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ytd3 => "Actuals, three years prior",
            Self::Ytd2 => "Actuals, two years prior",
            Self::Ytd1 => "Actuals, prior year",
            Self::Budget => "Budget",
            Self::YtdActual => "Actuals, current year",
        }
    }

    /// Offset applied to the tenant's current financial year.
    pub fn year_offset(&self) -> i32 {
        match self {
            Self::Ytd3 => -3,
            Self::Ytd2 => -2,
            Self::Ytd1 => -1,
            Self::Budget | Self::YtdActual => 0,
        }
    }
}

impl fmt::Display for UploadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for UploadType {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_UPLOAD_TYPES
            .iter()
            .find(|t| t.key().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| TallyError::UnknownUploadType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadBatch {
    pub upload_id: i64,
    pub tenant_id: String,
    pub upload_type: UploadType,
    pub financial_year: String,
    pub uploaded_by: String,
    pub uploaded_at: String,
    pub row_count: i64,
    pub total_amount: f64,
    pub status: UploadStatus,
    pub filename: Option<String>,
    pub checksum: Option<String>,
}

/// Header fields supplied by the caller when saving a batch.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub tenant_id: String,
    pub upload_type: UploadType,
    pub financial_year: String,
    pub uploaded_by: String,
    pub filename: Option<String>,
    pub checksum: Option<String>,
}

/// One persisted client+product line. Unique on
/// `(tenant_id, upload_type, financial_year, client_id, product_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialDataRecord {
    pub tenant_id: String,
    pub upload_type: UploadType,
    pub financial_year: String,
    pub client_id: i64,
    pub client_name: String,
    pub product_id: i64,
    pub product_line: Option<String>,
    pub monthly_data: MonthlyData,
    pub total: f64,
    pub upload_id: i64,
}

/// Tenant fiscal settings as stored. Absent fields fall back to the
/// calendar defaults (March start, February end, reporting at year end).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FiscalConfig {
    pub current_financial_year: Option<String>,
    pub financial_year_start: Option<String>,
    pub financial_year_end: Option<String>,
    pub reporting_month: Option<String>,
}

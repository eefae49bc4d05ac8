use std::path::Path;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{Result, TallyError};
use crate::models::{month_label, MonthlyData, ParsedRow};

// `Month 1 (Mar)` keeps its number; bare and `M` forms must be the whole header.
const NUMBERED_MONTH: &str = r"^(?:month\s*(\d{1,2})(?:\D.*)?|m?(\d{1,2}))$";

const SHORT_MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const LONG_MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Keep only digits, `.` and `-`, then parse. Anything unparsable is zero.
pub fn clean_amount(raw: &str) -> f64 {
    let s: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    s.parse().unwrap_or(0.0)
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Month header detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonthHeaderStyle {
    /// `Month 1`, `month1`, `M1`, `1`
    Numbered,
    /// `Jan` .. `Dec`, assigned by position
    ShortName,
    /// `January` .. `December`, assigned by position
    LongName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthColumn {
    pub index: usize,
    pub header: String,
    pub label: String,
    pub style: MonthHeaderStyle,
}

fn numbered_month(re: &Regex, header: &str) -> Option<usize> {
    let caps = re.captures(header)?;
    let n: usize = caps.get(1).or_else(|| caps.get(2))?.as_str().parse().ok()?;
    (1..=12).contains(&n).then_some(n)
}

/// Fiscal position for a header. Named headers take the next free position,
/// which may run past 12.
fn classify_header(re: &Regex, header: &str, discovered: usize) -> Option<(usize, MonthHeaderStyle)> {
    let h = header.trim().to_lowercase();
    if let Some(n) = numbered_month(re, &h) {
        return Some((n, MonthHeaderStyle::Numbered));
    }
    // Named headers keep their column position, not their calendar month.
    if h.len() > 3 && LONG_MONTHS.iter().any(|m| h.starts_with(m)) {
        return Some((discovered + 1, MonthHeaderStyle::LongName));
    }
    if SHORT_MONTHS.iter().any(|m| h.starts_with(m)) {
        return Some((discovered + 1, MonthHeaderStyle::ShortName));
    }
    None
}

/// Scan every column after the first two (and not used for client/product)
/// for a month indicator. Named columns past the twelfth are ignored with a
/// warning; two columns resolving to the same label are an error.
pub fn detect_month_columns(headers: &[String], skip: &[usize]) -> Result<(Vec<MonthColumn>, Vec<String>)> {
    let re = Regex::new(NUMBERED_MONTH).map_err(|e| TallyError::Other(e.to_string()))?;
    let mut columns: Vec<MonthColumn> = Vec::new();
    let mut warnings = Vec::new();
    for (index, header) in headers.iter().enumerate().skip(2) {
        if skip.contains(&index) {
            continue;
        }
        let Some((n, style)) = classify_header(&re, header, columns.len()) else {
            continue;
        };
        if n > 12 {
            let msg = format!("Column \"{header}\" ignored: only 12 month columns are read.");
            log::warn!("{msg}");
            warnings.push(msg);
            continue;
        }
        let label = month_label(n);
        if let Some(first) = columns.iter().find(|c| c.label == label) {
            return Err(TallyError::DuplicateMonthColumn {
                label,
                first: first.header.clone(),
                second: header.clone(),
            });
        }
        columns.push(MonthColumn {
            index,
            header: header.clone(),
            label,
            style,
        });
    }
    Ok((columns, warnings))
}

fn find_column(headers: &[String], needle: &'static str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.to_lowercase().contains(needle))
        .ok_or(TallyError::MissingColumn(needle))
}

// ---------------------------------------------------------------------------
// parse_upload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ParseResult {
    pub headers: Vec<String>,
    pub month_columns: Vec<MonthColumn>,
    pub rows: Vec<ParsedRow>,
    pub total_amount: f64,
    /// Recoverable diagnostics, e.g. an unexpected month-column count.
    pub warnings: Vec<String>,
}

pub fn parse_upload(content: &str) -> Result<ParseResult> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut records = rdr.records();

    let headers: Vec<String> = match records.next() {
        Some(header) => header?.iter().map(|h| h.trim().to_string()).collect(),
        None => return Err(TallyError::EmptyUpload),
    };

    let client_idx = find_column(&headers, "client")?;
    let product_idx = find_column(&headers, "product")?;

    let (month_columns, mut warnings) = detect_month_columns(&headers, &[client_idx, product_idx])?;
    if month_columns.is_empty() {
        return Err(TallyError::NoMonthColumns);
    }

    if month_columns.len() != 12 {
        let msg = format!(
            "Expected 12 month columns, found {}. Amounts were read from the columns present.",
            month_columns.len()
        );
        log::warn!("{msg}");
        warnings.push(msg);
    }

    let mut rows = Vec::new();
    for (i, result) in records.enumerate() {
        // A malformed record fails the whole parse: no partial batches.
        let record = result?;
        let row_index = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(i + 2);

        let client_name = record.get(client_idx).unwrap_or("").trim().to_string();
        let product_name = record.get(product_idx).unwrap_or("").trim().to_string();
        if client_name.is_empty() || product_name.is_empty() {
            log::debug!("skipping row {row_index}: client or product is blank");
            continue;
        }

        let mut monthly_data = MonthlyData::new();
        for col in &month_columns {
            let amount = record.get(col.index).map(clean_amount).unwrap_or(0.0);
            monthly_data.insert(col.label.clone(), amount);
        }
        let total = monthly_data.values().sum();

        rows.push(ParsedRow {
            row_index,
            client_name,
            product_name,
            monthly_data,
            total,
        });
    }

    let total_amount = rows.iter().map(|r| r.total).sum();
    log::info!(
        "parsed {} rows across {} month columns",
        rows.len(),
        month_columns.len()
    );

    Ok(ParseResult {
        headers,
        month_columns,
        rows,
        total_amount,
        warnings,
    })
}

/// An upload file read from disk, with the checksum used to spot re-uploads.
pub struct UploadFile {
    pub filename: String,
    pub checksum: String,
    pub parsed: ParseResult,
}

pub fn read_upload(file_path: &Path) -> Result<UploadFile> {
    let data = std::fs::read(file_path)?;
    let checksum = compute_checksum(&data);
    let content = String::from_utf8_lossy(&data);
    let parsed = parse_upload(&content)?;
    Ok(UploadFile {
        filename: file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string(),
        checksum,
        parsed,
    })
}

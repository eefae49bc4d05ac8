use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::fiscal::FiscalCalendar;
use crate::models::{month_label, Client, FinancialDataRecord};

pub const UNKNOWN_PRODUCT_LINE: &str = "Unknown";

fn amount(record: &FinancialDataRecord, label: &str) -> f64 {
    record
        .monthly_data
        .get(label)
        .copied()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn by_total_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

// ---------------------------------------------------------------------------
// Year-to-date window
// ---------------------------------------------------------------------------

/// Which months count toward a year-to-date figure.
#[derive(Debug, Clone, PartialEq)]
pub enum YtdWindow {
    Months(Vec<String>),
    /// No cutoff is known, so the whole year counts as year-to-date.
    WholeYear,
}

impl YtdWindow {
    pub fn from_labels(labels: Vec<String>) -> Self {
        if labels.is_empty() {
            log::warn!("no year-to-date months configured; year-to-date figures use the whole year");
            Self::WholeYear
        } else {
            Self::Months(labels)
        }
    }

    pub fn from_calendar(calendar: &FiscalCalendar) -> Self {
        Self::from_labels(calendar.ytd_labels())
    }

    pub fn is_whole_year(&self) -> bool {
        matches!(self, Self::WholeYear)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum TotalBasis<'a> {
    FullYear,
    YearToDate(&'a YtdWindow),
}

impl TotalBasis<'_> {
    fn total(&self, record: &FinancialDataRecord) -> f64 {
        match self {
            Self::FullYear => full_year_total(record),
            Self::YearToDate(window) => ytd_total(record, window),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-record totals
// ---------------------------------------------------------------------------

/// Sum of `Month 1`..`Month 12`, or the stored total when there is no
/// monthly detail.
pub fn full_year_total(record: &FinancialDataRecord) -> f64 {
    if record.monthly_data.is_empty() {
        return if record.total.is_finite() { record.total } else { 0.0 };
    }
    (1..=12).map(|n| amount(record, &month_label(n))).sum()
}

pub fn ytd_total(record: &FinancialDataRecord, window: &YtdWindow) -> f64 {
    match window {
        YtdWindow::Months(labels) => labels.iter().map(|l| amount(record, l)).sum(),
        YtdWindow::WholeYear => full_year_total(record),
    }
}

fn sum_labels(records: &[FinancialDataRecord], labels: &[String]) -> f64 {
    records
        .iter()
        .map(|r| labels.iter().map(|l| amount(r, l)).sum::<f64>())
        .sum()
}

// ---------------------------------------------------------------------------
// By month
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MonthTotal {
    pub label: String,
    pub total: f64,
}

pub fn totals_by_month(records: &[FinancialDataRecord]) -> Vec<MonthTotal> {
    (1..=12)
        .map(|n| {
            let label = month_label(n);
            let total = records.iter().map(|r| amount(r, &label)).sum();
            MonthTotal { label, total }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Group by product line / client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ProductLineTotal {
    pub product_line: String,
    pub total: f64,
    pub record_count: usize,
}

pub fn group_by_product_line(records: &[FinancialDataRecord], basis: TotalBasis) -> Vec<ProductLineTotal> {
    let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for record in records {
        let key = record
            .product_line
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_PRODUCT_LINE)
            .to_string();
        let entry = groups.entry(key).or_default();
        entry.0 += basis.total(record);
        entry.1 += 1;
    }
    let mut buckets: Vec<ProductLineTotal> = groups
        .into_iter()
        .map(|(product_line, (total, record_count))| ProductLineTotal {
            product_line,
            total,
            record_count,
        })
        .collect();
    buckets.sort_by(|a, b| by_total_desc(a.total, b.total));
    buckets
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientTotal {
    pub client_id: i64,
    pub client_name: String,
    pub total: f64,
    pub record_count: usize,
}

pub fn group_by_client(records: &[FinancialDataRecord], basis: TotalBasis) -> Vec<ClientTotal> {
    let mut groups: BTreeMap<i64, ClientTotal> = BTreeMap::new();
    for record in records {
        let entry = groups.entry(record.client_id).or_insert_with(|| ClientTotal {
            client_id: record.client_id,
            client_name: record.client_name.clone(),
            total: 0.0,
            record_count: 0,
        });
        entry.total += basis.total(record);
        entry.record_count += 1;
    }
    let mut buckets: Vec<ClientTotal> = groups.into_values().collect();
    buckets.sort_by(|a, b| by_total_desc(a.total, b.total));
    buckets
}

// ---------------------------------------------------------------------------
// Variance
// ---------------------------------------------------------------------------

/// Percentage change from `prior` to `current`. `None` when there is no
/// meaningful baseline.
pub fn variance(current: f64, prior: Option<f64>) -> Option<f64> {
    match prior {
        Some(p) if p != 0.0 && p.is_finite() => Some((current - p) / p.abs() * 100.0),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Joining uploaded records to registry clients
// ---------------------------------------------------------------------------

/// Records belonging to `client`: by id first, and only when nothing matches
/// by id, by trimmed case-insensitive name.
pub fn records_for_client<'a>(records: &'a [FinancialDataRecord], client: &Client) -> Vec<&'a FinancialDataRecord> {
    let by_id: Vec<&FinancialDataRecord> = records.iter().filter(|r| r.client_id == client.id).collect();
    if !by_id.is_empty() {
        return by_id;
    }
    let wanted = client.display_name.trim().to_lowercase();
    records
        .iter()
        .filter(|r| r.client_name.trim().to_lowercase() == wanted)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientRevenue {
    pub client_id: i64,
    pub client_name: String,
    pub ytd: f64,
    pub full_year: f64,
    pub record_count: usize,
}

/// Year-to-date revenue for every registry client, in registry order.
pub fn client_ytd_revenue(
    records: &[FinancialDataRecord],
    clients: &[Client],
    window: &YtdWindow,
) -> Vec<ClientRevenue> {
    clients
        .iter()
        .map(|client| {
            let matched = records_for_client(records, client);
            ClientRevenue {
                client_id: client.id,
                client_name: client.display_name.clone(),
                ytd: matched.iter().map(|r| ytd_total(r, window)).sum(),
                full_year: matched.iter().map(|r| full_year_total(r)).sum(),
                record_count: matched.len(),
            }
        })
        .collect()
}

/// Year-to-date and full-year totals over every record at least one client
/// claims. A record two clients claim by name is counted once.
pub fn claimed_revenue_total(
    records: &[FinancialDataRecord],
    clients: &[Client],
    window: &YtdWindow,
) -> (f64, f64) {
    let mut seen: HashSet<*const FinancialDataRecord> = HashSet::new();
    let mut ytd = 0.0;
    let mut full_year = 0.0;
    for client in clients {
        for record in records_for_client(records, client) {
            if seen.insert(record as *const FinancialDataRecord) {
                ytd += ytd_total(record, window);
                full_year += full_year_total(record);
            }
        }
    }
    (ytd, full_year)
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub current: f64,
    /// `None` when nothing has been uploaded for the baseline.
    pub baseline: Option<f64>,
    pub variance: Option<f64>,
}

impl Comparison {
    fn new(current: f64, baseline: Option<f64>) -> Self {
        Self {
            current,
            baseline,
            variance: variance(current, baseline),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub financial_year: String,
    pub by_month: Vec<MonthTotal>,
    pub ytd_total: f64,
    pub remaining_total: f64,
    pub full_year_total: f64,
    pub ytd_is_whole_year: bool,
    pub by_product_line: Vec<ProductLineTotal>,
    pub by_client: Vec<ClientTotal>,
    /// Year-to-date actuals against the same months of the prior year.
    pub vs_prior_year: Comparison,
    /// Year-to-date actuals against the same months of the budget.
    pub vs_budget: Comparison,
}

fn baseline(records: Option<&[FinancialDataRecord]>, window: &YtdWindow) -> Option<f64> {
    records
        .filter(|r| !r.is_empty())
        .map(|r| r.iter().map(|rec| ytd_total(rec, window)).sum())
}

pub fn build_dashboard(
    actuals: &[FinancialDataRecord],
    prior_year: Option<&[FinancialDataRecord]>,
    budget: Option<&[FinancialDataRecord]>,
    calendar: &FiscalCalendar,
) -> Dashboard {
    let window = YtdWindow::from_calendar(calendar);
    let ytd: f64 = actuals.iter().map(|r| ytd_total(r, &window)).sum();
    let remaining_total = sum_labels(actuals, &calendar.remaining_labels());

    Dashboard {
        financial_year: calendar.current_financial_year.clone(),
        by_month: totals_by_month(actuals),
        ytd_total: ytd,
        remaining_total,
        full_year_total: actuals.iter().map(full_year_total).sum(),
        ytd_is_whole_year: window.is_whole_year(),
        by_product_line: group_by_product_line(actuals, TotalBasis::YearToDate(&window)),
        by_client: group_by_client(actuals, TotalBasis::YearToDate(&window)),
        vs_prior_year: Comparison::new(ytd, baseline(prior_year, &window)),
        vs_budget: Comparison::new(ytd, baseline(budget, &window)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FiscalConfig, MonthlyData, UploadType};

    fn record(client_id: i64, client: &str, product: Option<&str>, months: &[(usize, f64)]) -> FinancialDataRecord {
        let mut monthly_data = MonthlyData::new();
        for (n, v) in months {
            monthly_data.insert(month_label(*n), *v);
        }
        let total = monthly_data.values().sum();
        FinancialDataRecord {
            tenant_id: "t1".into(),
            upload_type: UploadType::YtdActual,
            financial_year: "2024/2025".into(),
            client_id,
            client_name: client.into(),
            product_id: 1,
            product_line: product.map(String::from),
            monthly_data,
            total,
            upload_id: 1,
        }
    }

    fn calendar(reporting: &str) -> FiscalCalendar {
        FiscalCalendar::build(
            &FiscalConfig {
                current_financial_year: Some("2024/2025".into()),
                financial_year_start: Some("March".into()),
                financial_year_end: Some("February".into()),
                reporting_month: Some(reporting.into()),
            },
            chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        )
    }

    fn window(n: usize) -> YtdWindow {
        YtdWindow::from_labels((1..=n).map(month_label).collect())
    }

    #[test]
    fn test_totals_by_month() {
        let records = vec![
            record(1, "Acme", Some("Training"), &[(1, 100.0), (2, 50.0)]),
            record(2, "Beta", Some("Training"), &[(1, 25.0), (12, 5.0)]),
        ];
        let months = totals_by_month(&records);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0], MonthTotal { label: "Month 1".into(), total: 125.0 });
        assert_eq!(months[1].total, 50.0);
        assert_eq!(months[2].total, 0.0);
        assert_eq!(months[11].total, 5.0);
    }

    #[test]
    fn test_ytd_total_uses_window() {
        let r = record(1, "Acme", None, &[(1, 10.0), (2, 20.0), (3, 30.0), (10, 1000.0)]);
        assert_eq!(ytd_total(&r, &window(2)), 30.0);
        assert_eq!(ytd_total(&r, &window(9)), 60.0);
    }

    #[test]
    fn test_empty_ytd_window_falls_back_to_whole_year() {
        let r = record(1, "Acme", None, &[(1, 10.0), (12, 5.0)]);
        let w = YtdWindow::from_labels(Vec::new());
        assert!(w.is_whole_year());
        assert_eq!(ytd_total(&r, &w), 15.0);
    }

    #[test]
    fn test_full_year_total_prefers_monthly_detail() {
        let mut r = record(1, "Acme", None, &[(1, 10.0), (2, 5.0)]);
        r.total = 999.0;
        assert_eq!(full_year_total(&r), 15.0);
        r.monthly_data.clear();
        assert_eq!(full_year_total(&r), 999.0);
    }

    #[test]
    fn test_malformed_amounts_contribute_zero() {
        let mut r = record(1, "Acme", None, &[(1, 10.0)]);
        r.monthly_data.insert("Month 2".into(), f64::NAN);
        r.monthly_data.insert("Bogus".into(), 50.0);
        assert_eq!(full_year_total(&r), 10.0);
        assert_eq!(totals_by_month(&[r])[1].total, 0.0);
    }

    #[test]
    fn test_group_by_product_line_sorted_desc() {
        let records = vec![
            record(1, "Acme", Some("Training"), &[(1, 10.0)]),
            record(2, "Beta", Some("Consulting"), &[(1, 50.0)]),
            record(3, "Gamma", Some("Training"), &[(1, 15.0)]),
            record(4, "Delta", None, &[(1, 1.0)]),
            record(5, "Echo", Some("  "), &[(1, 2.0)]),
        ];
        let buckets = group_by_product_line(&records, TotalBasis::FullYear);
        let names: Vec<&str> = buckets.iter().map(|b| b.product_line.as_str()).collect();
        assert_eq!(names, vec!["Consulting", "Training", "Unknown"]);
        assert_eq!(buckets[1].total, 25.0);
        assert_eq!(buckets[1].record_count, 2);
        assert_eq!(buckets[2].total, 3.0);
    }

    #[test]
    fn test_group_by_client_ytd() {
        let records = vec![
            record(1, "Acme", Some("Training"), &[(1, 10.0), (11, 500.0)]),
            record(1, "Acme", Some("Consulting"), &[(2, 10.0)]),
            record(2, "Beta", Some("Training"), &[(1, 30.0)]),
        ];
        let w = window(9);
        let buckets = group_by_client(&records, TotalBasis::YearToDate(&w));
        assert_eq!(buckets[0].client_name, "Beta");
        assert_eq!(buckets[0].total, 30.0);
        assert_eq!(buckets[1].total, 20.0);
        assert_eq!(buckets[1].record_count, 2);

        let full = group_by_client(&records, TotalBasis::FullYear);
        assert_eq!(full[0].client_name, "Acme");
        assert_eq!(full[0].total, 520.0);
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance(110.0, Some(100.0)), Some(10.0));
        assert_eq!(variance(50.0, Some(-100.0)), Some(150.0));
        assert_eq!(variance(100.0, Some(0.0)), None);
        assert_eq!(variance(100.0, None), None);
    }

    #[test]
    fn test_records_for_client_prefers_id() {
        let records = vec![
            record(1, "Acme", None, &[(1, 1.0)]),
            record(7, "acme ", None, &[(1, 2.0)]),
        ];
        let client = Client { id: 1, display_name: "Acme".into() };
        let found = records_for_client(&records, &client);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].client_id, 1);
    }

    #[test]
    fn test_records_for_client_falls_back_to_name() {
        let records = vec![
            record(7, " ACME ", None, &[(1, 2.0)]),
            record(8, "Beta", None, &[(1, 3.0)]),
        ];
        let renamed = Client { id: 42, display_name: "acme".into() };
        let found = records_for_client(&records, &renamed);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].client_id, 7);
        let stranger = Client { id: 43, display_name: "Nobody".into() };
        assert!(records_for_client(&records, &stranger).is_empty());
    }

    #[test]
    fn test_client_ytd_revenue() {
        let records = vec![
            record(1, "Acme", None, &[(1, 10.0), (12, 90.0)]),
            record(9, "Beta Old Id", None, &[(1, 5.0)]),
        ];
        let clients = vec![
            Client { id: 1, display_name: "Acme".into() },
            Client { id: 2, display_name: "beta old id".into() },
            Client { id: 3, display_name: "Gamma".into() },
        ];
        let revenue = client_ytd_revenue(&records, &clients, &window(9));
        assert_eq!(revenue[0].ytd, 10.0);
        assert_eq!(revenue[0].full_year, 100.0);
        assert_eq!(revenue[1].ytd, 5.0);
        assert_eq!(revenue[2].record_count, 0);
        assert_eq!(revenue[2].ytd, 0.0);
    }

    #[test]
    fn test_claimed_revenue_total_counts_shared_records_once() {
        let records = vec![
            record(9, "Acme", None, &[(1, 10.0), (12, 90.0)]),
            record(1, "Beta", None, &[(1, 5.0)]),
            record(8, "Unclaimed", None, &[(1, 1000.0)]),
        ];
        // Neither Acme entry owns record 9 by id, so both claim it by name.
        let clients = vec![
            Client { id: 2, display_name: "Acme".into() },
            Client { id: 3, display_name: " acme".into() },
            Client { id: 1, display_name: "Beta".into() },
        ];
        let w = window(9);
        let revenue = client_ytd_revenue(&records, &clients, &w);
        assert_eq!(revenue[0].ytd, 10.0);
        assert_eq!(revenue[1].ytd, 10.0);
        assert_eq!(claimed_revenue_total(&records, &clients, &w), (15.0, 105.0));
        assert_eq!(claimed_revenue_total(&records, &[], &w), (0.0, 0.0));
    }

    #[test]
    fn test_build_dashboard() {
        let cal = calendar("November");
        let actuals = vec![
            record(1, "Acme", Some("Training"), &[(1, 100.0), (9, 100.0), (10, 50.0)]),
            record(2, "Beta", Some("Consulting"), &[(2, 300.0)]),
        ];
        let prior = vec![record(1, "Acme", Some("Training"), &[(1, 250.0), (12, 1000.0)])];
        let dash = build_dashboard(&actuals, Some(prior.as_slice()), None, &cal);
        assert_eq!(dash.financial_year, "2024/2025");
        assert_eq!(dash.ytd_total, 500.0);
        assert_eq!(dash.remaining_total, 50.0);
        assert_eq!(dash.full_year_total, 550.0);
        assert!(!dash.ytd_is_whole_year);
        assert_eq!(dash.by_client[0].client_name, "Beta");
        assert_eq!(dash.by_product_line[0].product_line, "Consulting");
        assert_eq!(dash.vs_prior_year.baseline, Some(250.0));
        assert_eq!(dash.vs_prior_year.variance, Some(100.0));
        assert_eq!(dash.vs_budget.baseline, None);
        assert_eq!(dash.vs_budget.variance, None);
    }

    #[test]
    fn test_dashboard_without_reporting_month_uses_whole_year() {
        let cal = calendar("Smarch");
        let actuals = vec![record(1, "Acme", Some("Training"), &[(1, 10.0), (12, 5.0)])];
        let dash = build_dashboard(&actuals, None, Some(&[][..]), &cal);
        assert!(dash.ytd_is_whole_year);
        assert_eq!(dash.ytd_total, 15.0);
        assert_eq!(dash.remaining_total, 0.0);
        assert_eq!(dash.vs_budget.baseline, None);
    }
}

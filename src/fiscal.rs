use chrono::{Datelike, Month, NaiveDate};

use crate::models::{month_label, FiscalConfig};

const CALENDAR: [Month; 12] = [
    Month::January,
    Month::February,
    Month::March,
    Month::April,
    Month::May,
    Month::June,
    Month::July,
    Month::August,
    Month::September,
    Month::October,
    Month::November,
    Month::December,
];

pub const DEFAULT_START: Month = Month::March;

/// Parse `"March"`, `"mar"` or `"3"` into a month.
pub fn parse_month(raw: &str) -> Option<Month> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<usize>() {
        return (1..=12).contains(&n).then(|| CALENDAR[n - 1]);
    }
    raw.parse::<Month>().ok()
}

fn month0(month: Month) -> usize {
    month.number_from_month() as usize - 1
}

/// Shift both halves of `"startYear/endYear"` by `offset`. Anything not in
/// that two-part form comes back unchanged.
pub fn calculate_financial_year(current_fy: &str, offset: i32) -> String {
    let parts: Vec<&str> = current_fy.split('/').collect();
    if parts.len() != 2 {
        return current_fy.to_string();
    }
    match (parts[0].trim().parse::<i32>(), parts[1].trim().parse::<i32>()) {
        (Ok(start), Ok(end)) => format!("{}/{}", start + offset, end + offset),
        _ => current_fy.to_string(),
    }
}

/// `"2024/2025"`: two integer years, the second following the first.
pub fn is_valid_financial_year(fy: &str) -> bool {
    match fy.split_once('/') {
        Some((start, end)) => match (start.trim().parse::<i32>(), end.trim().parse::<i32>()) {
            (Ok(start), Ok(end)) => end == start + 1,
            _ => false,
        },
        None => false,
    }
}

/// Trailing year of `"2024/2025"`.
fn end_year_of(fy: &str) -> Option<i32> {
    let (_, end) = fy.rsplit_once('/')?;
    end.trim().parse().ok()
}

/// The financial year containing `today` for a year starting in `start`.
pub fn financial_year_containing(today: NaiveDate, start: Month) -> String {
    let y = today.year();
    // A calendar-year cycle ends in the year it starts.
    if start == Month::January {
        return format!("{}/{y}", y - 1);
    }
    if today.month() >= start.number_from_month() {
        format!("{y}/{}", y + 1)
    } else {
        format!("{}/{y}", y - 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FyMonth {
    /// Standardized `"Month N"` key used in monthly data.
    pub label: String,
    /// Calendar name, e.g. `"March"`.
    pub name: &'static str,
    /// 0 = January.
    pub calendar_month: u32,
    pub year: i32,
    pub fy_month_number: usize,
    pub is_ytd: bool,
    pub is_remaining: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FiscalCalendar {
    pub current_financial_year: String,
    pub fy_start_month: Month,
    pub fy_end_month: Month,
    pub reporting_month: Option<Month>,
    pub months: Vec<FyMonth>,
    pub ytd_months: Vec<FyMonth>,
    pub remaining_months: Vec<FyMonth>,
}

impl FiscalCalendar {
    pub fn from_config(config: &FiscalConfig) -> Self {
        Self::build(config, chrono::Local::now().date_naive())
    }

    /// Build the 12-month cycle. `today` supplies the year when the
    /// configured financial year is missing or unreadable.
    pub fn build(config: &FiscalConfig, today: NaiveDate) -> Self {
        let fy_start_month = match config.financial_year_start.as_deref() {
            None => DEFAULT_START,
            Some(raw) => parse_month(raw).unwrap_or_else(|| {
                log::warn!("unrecognized financial year start {raw:?}, using March");
                DEFAULT_START
            }),
        };
        let default_end = CALENDAR[(month0(fy_start_month) + 11) % 12];
        let fy_end_month = config
            .financial_year_end
            .as_deref()
            .and_then(parse_month)
            .unwrap_or(default_end);
        let reporting_month = match config.reporting_month.as_deref() {
            None => Some(fy_end_month),
            Some(raw) => parse_month(raw),
        };

        let current_financial_year = config
            .current_financial_year
            .clone()
            .unwrap_or_else(|| financial_year_containing(today, fy_start_month));
        let end_year = end_year_of(&current_financial_year).unwrap_or_else(|| {
            log::warn!(
                "cannot read end year from {current_financial_year:?}, using {}",
                today.year()
            );
            today.year()
        });

        let start0 = month0(fy_start_month);
        // The last fiscal month always lands in the end year.
        let mut year = if start0 == 0 { end_year } else { end_year - 1 };
        let mut months = Vec::with_capacity(12);
        for i in 0..12 {
            let m0 = (start0 + i) % 12;
            if i > 0 && m0 == 0 {
                year += 1;
            }
            months.push(FyMonth {
                label: month_label(i + 1),
                name: CALENDAR[m0].name(),
                calendar_month: m0 as u32,
                year,
                fy_month_number: i + 1,
                is_ytd: false,
                is_remaining: false,
            });
        }

        let position = reporting_month.and_then(|rm| {
            months
                .iter()
                .position(|m| m.calendar_month as usize == month0(rm))
                .map(|p| p + 1)
        });
        match position {
            Some(p) => {
                for m in months.iter_mut() {
                    m.is_ytd = m.fy_month_number <= p;
                    m.is_remaining = m.fy_month_number > p;
                }
            }
            None => log::warn!(
                "reporting month {:?} not found in the fiscal year; no months are marked year-to-date",
                config.reporting_month
            ),
        }

        let ytd_months = months.iter().filter(|m| m.is_ytd).cloned().collect();
        let remaining_months = months.iter().filter(|m| m.is_remaining).cloned().collect();

        Self {
            current_financial_year,
            fy_start_month,
            fy_end_month,
            reporting_month,
            months,
            ytd_months,
            remaining_months,
        }
    }

    /// Fiscal position (1-12) of the reporting month, if it was located.
    pub fn reporting_position(&self) -> Option<usize> {
        self.ytd_months.last().map(|m| m.fy_month_number)
    }

    pub fn ytd_labels(&self) -> Vec<String> {
        self.ytd_months.iter().map(|m| m.label.clone()).collect()
    }

    pub fn remaining_labels(&self) -> Vec<String> {
        self.remaining_months.iter().map(|m| m.label.clone()).collect()
    }

    /// `"March 2024"` style caption for a `"Month N"` label.
    pub fn caption(&self, label: &str) -> Option<String> {
        self.months
            .iter()
            .find(|m| m.label == label)
            .map(|m| format!("{} {}", m.name, m.year))
    }
}

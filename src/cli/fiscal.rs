use colored::Colorize;

use crate::cli::Context;
use crate::error::{Result, TallyError};
use crate::fiscal::{is_valid_financial_year, parse_month, FiscalCalendar};
use crate::repository::FiscalConfigRepository;

fn stored(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "(default)".dimmed().to_string())
}

pub fn show(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let config = store.fiscal_config(&ctx.tenant_id)?;
    let calendar = FiscalCalendar::from_config(&config);

    println!("{}", format!("Fiscal settings ({})", ctx.tenant_id).bold());
    println!("Financial year:   {}", stored(&config.current_financial_year));
    println!("Year starts:      {}", stored(&config.financial_year_start));
    println!("Year ends:        {}", stored(&config.financial_year_end));
    println!("Reporting month:  {}", stored(&config.reporting_month));
    println!();
    println!("{}", "In effect".bold());
    println!("Financial year:   {}", calendar.current_financial_year);
    println!("Year starts:      {}", calendar.fy_start_month.name());
    println!("Year ends:        {}", calendar.fy_end_month.name());
    match calendar.reporting_position() {
        Some(p) => println!("Year-to-date:     {p} of 12 months"),
        None => println!(
            "Year-to-date:     {}",
            "reporting month not in the year; year-to-date covers all 12 months".yellow()
        ),
    }
    Ok(())
}

fn month_name(raw: &str) -> Result<String> {
    parse_month(raw)
        .map(|m| m.name().to_string())
        .ok_or_else(|| TallyError::UnknownMonth(raw.to_string()))
}

pub fn set(
    ctx: &Context,
    year: Option<String>,
    start: Option<String>,
    end: Option<String>,
    reporting: Option<String>,
) -> Result<()> {
    let store = ctx.open_store()?;
    let mut config = store.fiscal_config(&ctx.tenant_id)?;

    if let Some(year) = year {
        let year = year.trim().to_string();
        if !is_valid_financial_year(&year) {
            return Err(TallyError::InvalidFinancialYear(year));
        }
        config.current_financial_year = Some(year);
    }
    if let Some(start) = start {
        config.financial_year_start = Some(month_name(&start)?);
    }
    if let Some(end) = end {
        config.financial_year_end = Some(month_name(&end)?);
    }
    if let Some(reporting) = reporting {
        config.reporting_month = Some(month_name(&reporting)?);
    }

    store.set_fiscal_config(&ctx.tenant_id, &config)?;
    println!("Updated fiscal settings for {}", ctx.tenant_id);
    Ok(())
}

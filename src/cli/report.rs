use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::aggregate::{
    claimed_revenue_total, client_ytd_revenue, group_by_product_line, totals_by_month, Comparison,
    TotalBasis, YtdWindow,
};
use crate::cli::Context;
use crate::error::Result;
use crate::fiscal::FiscalCalendar;
use crate::fmt::{money, percent};
use crate::models::UploadType;
use crate::repository::{ClientRepository, FiscalConfigRepository};
use crate::uploads::{load_dashboard, load_records};

fn signed(val: Option<f64>) -> String {
    match val {
        Some(v) if v >= 0.0 => percent(val).green().to_string(),
        Some(_) => percent(val).red().to_string(),
        None => percent(None),
    }
}

pub fn calendar(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let calendar = FiscalCalendar::from_config(&store.fiscal_config(&ctx.tenant_id)?);

    let mut table = Table::new();
    table.set_header(vec!["#", "Label", "Month", "Period"]);
    for m in &calendar.months {
        let period = if m.is_ytd {
            "year-to-date".green().to_string()
        } else if m.is_remaining {
            "remaining".dimmed().to_string()
        } else {
            String::new()
        };
        table.add_row(vec![
            Cell::new(m.fy_month_number),
            Cell::new(&m.label),
            Cell::new(format!("{} {}", m.name, m.year)),
            Cell::new(period),
        ]);
    }
    println!("Financial Year {}\n{table}", calendar.current_financial_year);
    Ok(())
}

pub fn months(ctx: &Context, upload_type: &str) -> Result<()> {
    let upload_type: UploadType = upload_type.parse()?;
    let store = ctx.open_store()?;
    let calendar = FiscalCalendar::from_config(&store.fiscal_config(&ctx.tenant_id)?);
    let (fy, records) = load_records(&store, &ctx.tenant_id, upload_type)?;

    let mut table = Table::new();
    table.set_header(vec!["Label", "Month", "Amount"]);
    let mut total = 0.0;
    for month in totals_by_month(&records) {
        total += month.total;
        table.add_row(vec![
            Cell::new(&month.label),
            Cell::new(calendar.caption(&month.label).unwrap_or_default()),
            Cell::new(money(month.total)),
        ]);
    }
    table.add_row(vec![Cell::new("Total".bold()), Cell::new(""), Cell::new(money(total))]);

    println!("{} {fy} by Month\n{table}", upload_type.label());
    Ok(())
}

pub fn products(ctx: &Context, upload_type: &str, ytd: bool) -> Result<()> {
    let upload_type: UploadType = upload_type.parse()?;
    let store = ctx.open_store()?;
    let calendar = FiscalCalendar::from_config(&store.fiscal_config(&ctx.tenant_id)?);
    let (fy, records) = load_records(&store, &ctx.tenant_id, upload_type)?;

    let window = YtdWindow::from_calendar(&calendar);
    let basis = if ytd {
        TotalBasis::YearToDate(&window)
    } else {
        TotalBasis::FullYear
    };
    let buckets = group_by_product_line(&records, basis);

    let mut table = Table::new();
    table.set_header(vec!["Product Line", "Records", "Amount"]);
    let mut total = 0.0;
    for bucket in &buckets {
        total += bucket.total;
        table.add_row(vec![
            Cell::new(&bucket.product_line),
            Cell::new(bucket.record_count),
            Cell::new(money(bucket.total)),
        ]);
    }
    table.add_row(vec![Cell::new("Total".bold()), Cell::new(""), Cell::new(money(total))]);

    let scope = if ytd { "Year-to-Date" } else { "Full Year" };
    println!("{} {fy} by Product Line ({scope})\n{table}", upload_type.label());
    Ok(())
}

pub fn clients(ctx: &Context, upload_type: &str) -> Result<()> {
    let upload_type: UploadType = upload_type.parse()?;
    let store = ctx.open_store()?;
    let calendar = FiscalCalendar::from_config(&store.fiscal_config(&ctx.tenant_id)?);
    let (fy, records) = load_records(&store, &ctx.tenant_id, upload_type)?;
    let clients = store.list_clients(&ctx.tenant_id)?;

    let window = YtdWindow::from_calendar(&calendar);
    let mut revenue = client_ytd_revenue(&records, &clients, &window);
    revenue.sort_by(|a, b| b.ytd.total_cmp(&a.ytd));

    let (ytd_total, full_year_total) = claimed_revenue_total(&records, &clients, &window);

    let mut table = Table::new();
    table.set_header(vec!["Client", "Records", "Year-to-Date", "Full Year"]);
    for r in &revenue {
        table.add_row(vec![
            Cell::new(&r.client_name),
            Cell::new(r.record_count),
            Cell::new(money(r.ytd)),
            Cell::new(money(r.full_year)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(money(ytd_total)),
        Cell::new(money(full_year_total)),
    ]);
    println!("{} {fy} by Client\n{table}", upload_type.label());
    Ok(())
}

fn comparison_row(table: &mut Table, label: &str, comparison: &Comparison) {
    table.add_row(vec![
        Cell::new(label),
        Cell::new(comparison.baseline.map(money).unwrap_or_else(|| "-".to_string())),
        Cell::new(signed(comparison.variance)),
    ]);
}

pub fn dashboard(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let (calendar, dash) = load_dashboard(&store, &ctx.tenant_id)?;

    let through = calendar
        .ytd_months
        .last()
        .map(|m| format!("through {} {}", m.name, m.year))
        .unwrap_or_else(|| "whole year".to_string());
    println!("{}", format!("Dashboard {} ({through})", dash.financial_year).bold());
    if dash.ytd_is_whole_year {
        println!(
            "{} reporting month is not set within the year; year-to-date covers all months.",
            "Note:".yellow().bold()
        );
    }

    let mut totals = Table::new();
    totals.set_header(vec!["", "Amount"]);
    totals.add_row(vec![Cell::new("Year-to-date".bold()), Cell::new(money(dash.ytd_total))]);
    totals.add_row(vec![Cell::new("Remaining months"), Cell::new(money(dash.remaining_total))]);
    totals.add_row(vec![Cell::new("Full year"), Cell::new(money(dash.full_year_total))]);
    println!("Totals\n{totals}");

    let mut compare = Table::new();
    compare.set_header(vec!["Compared with", "Same Period", "Variance"]);
    comparison_row(&mut compare, "Prior year", &dash.vs_prior_year);
    comparison_row(&mut compare, "Budget", &dash.vs_budget);
    println!("Year-to-Date {}\n{compare}", money(dash.ytd_total));

    let mut months = Table::new();
    months.set_header(vec!["Month", "Amount"]);
    for m in &dash.by_month {
        let caption = calendar.caption(&m.label).unwrap_or_else(|| m.label.clone());
        let cell = if calendar.ytd_months.iter().any(|y| y.label == m.label) {
            Cell::new(caption.bold())
        } else {
            Cell::new(caption)
        };
        months.add_row(vec![cell, Cell::new(money(m.total))]);
    }
    println!("By Month\n{months}");

    if !dash.by_product_line.is_empty() {
        let mut products = Table::new();
        products.set_header(vec!["Product Line", "Year-to-Date"]);
        for p in &dash.by_product_line {
            products.add_row(vec![Cell::new(&p.product_line), Cell::new(money(p.total))]);
        }
        println!("By Product Line\n{products}");
    }

    if !dash.by_client.is_empty() {
        let mut clients = Table::new();
        clients.set_header(vec!["Client", "Year-to-Date"]);
        for c in dash.by_client.iter().take(10) {
            clients.add_row(vec![Cell::new(&c.client_name), Cell::new(money(c.total))]);
        }
        println!("Top Clients\n{clients}");
    }
    Ok(())
}

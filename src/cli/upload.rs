use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::Context;
use crate::error::{Result, TallyError};
use crate::fmt::money;
use crate::matcher::{MatchResult, ValidationSummary};
use crate::models::UploadType;
use crate::parser::{read_upload, MonthHeaderStyle};
use crate::uploads::{current_financial_year, financial_year_for, reconcile_rows, save_financial_upload, SaveRequest};

pub fn run(ctx: &Context, file: &str, upload_type: &str, dry_run: bool) -> Result<()> {
    let upload_type: UploadType = upload_type.parse()?;
    let store = ctx.open_store()?;
    let upload = read_upload(Path::new(file))?;

    let fy = financial_year_for(upload_type, &current_financial_year(&store, &ctx.tenant_id)?);
    let parsed = &upload.parsed;
    println!(
        "{} {} for {}: {} rows, {} ({} of {} columns hold months)",
        "Upload".bold(),
        upload.filename,
        format!("{} {fy}", upload_type.label()).bold(),
        parsed.rows.len(),
        money(parsed.total_amount),
        parsed.month_columns.len(),
        parsed.headers.len()
    );
    if parsed.month_columns.iter().any(|c| c.style != MonthHeaderStyle::Numbered) {
        let mapping: Vec<String> = parsed
            .month_columns
            .iter()
            .map(|c| format!("{} = {}", c.header, c.label))
            .collect();
        println!("Month names read by position: {}", mapping.join(", "));
    }
    for warning in &parsed.warnings {
        println!("{} {warning}", "Warning:".yellow().bold());
    }

    let result = reconcile_rows(&store, &ctx.tenant_id, &parsed.rows)?;
    print_result(&result);
    if result.is_clean() {
        println!("{}", "Every row matched.".green());
    }

    if dry_run {
        println!("{}", "Dry run: nothing saved.".dimmed());
        return Ok(());
    }
    if result.matched_rows.is_empty() {
        return Err(TallyError::NothingToSave);
    }

    let request = SaveRequest {
        tenant_id: ctx.tenant_id.clone(),
        upload_type,
        uploaded_by: ctx.settings.uploader(),
        filename: Some(upload.filename.clone()),
        checksum: Some(upload.checksum.clone()),
    };
    let outcome = save_financial_upload(&store, request, &result.matched_rows)?;
    if let Some(previous) = outcome.replaced_identical {
        println!(
            "{} this file was already saved as upload {previous}; its records were overwritten.",
            "Warning:".yellow().bold()
        );
    }
    println!(
        "{} upload {}: {} records, {}",
        "Saved".green().bold(),
        outcome.batch.upload_id,
        outcome.batch.row_count,
        money(outcome.batch.total_amount)
    );
    Ok(())
}

fn print_result(result: &MatchResult) {
    if !result.matched_rows.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Row", "Client", "Product Line", "Total"]);
        for row in &result.matched_rows {
            table.add_row(vec![
                Cell::new(row.row_index),
                Cell::new(&row.client_name),
                Cell::new(&row.product_line),
                Cell::new(money(row.total)),
            ]);
        }
        println!("{}\n{table}", "Matched".green().bold());
    }

    if !result.unmatched_clients.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Row", "Client", "Product", "Total", "Reason"]);
        for entry in &result.unmatched_clients {
            table.add_row(vec![
                Cell::new(entry.row_index),
                Cell::new(&entry.client_name),
                Cell::new(&entry.product_name),
                Cell::new(money(entry.total)),
                Cell::new(&entry.reason),
            ]);
        }
        println!("{}\n{table}", "Unmatched clients".red().bold());
    }

    if !result.unmatched_products.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["First Row", "Product", "Rows", "Reason"]);
        for entry in &result.unmatched_products {
            table.add_row(vec![
                Cell::new(entry.row_index),
                Cell::new(&entry.product_name),
                Cell::new(entry.occurrences),
                Cell::new(&entry.reason),
            ]);
        }
        println!("{}\n{table}", "Unmatched products".red().bold());
    }

    if !result.duplicate_rows.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Row", "First Seen", "Client", "Product", "Total"]);
        for entry in &result.duplicate_rows {
            table.add_row(vec![
                Cell::new(entry.row_index),
                Cell::new(entry.first_row_index),
                Cell::new(&entry.client_name),
                Cell::new(&entry.product_name),
                Cell::new(money(entry.total)),
            ]);
        }
        println!("{}\n{table}", "Duplicates".yellow().bold());
    }

    print_summary(&result.summary);
}

fn print_summary(summary: &ValidationSummary) {
    let mut table = Table::new();
    table.set_header(vec!["", "Rows", "Amount"]);
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(summary.total_rows),
        Cell::new(money(summary.total_amount)),
    ]);
    table.add_row(vec![
        Cell::new("Matched"),
        Cell::new(summary.matched_count),
        Cell::new(money(summary.matched_amount)),
    ]);
    table.add_row(vec![
        Cell::new("Unmatched clients"),
        Cell::new(summary.unmatched_client_count),
        Cell::new(money(summary.unmatched_amount)),
    ]);
    table.add_row(vec![
        Cell::new("Unmatched products"),
        Cell::new(summary.unmatched_product_count),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new("Duplicates"),
        Cell::new(summary.duplicate_count),
        Cell::new(""),
    ]);
    println!("Summary\n{table}");
}

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::Context;
use crate::error::Result;
use crate::fmt::money;
use crate::models::UploadStatus;
use crate::uploads::{delete_financial_upload, list_uploads};

pub fn list(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let uploads = list_uploads(&store, &ctx.tenant_id)?;
    if uploads.is_empty() {
        println!("No uploads for tenant {}.", ctx.tenant_id);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Type", "Year", "Rows", "Total", "Status", "File", "By", "Uploaded",
    ]);
    for batch in uploads {
        let status = match batch.status {
            UploadStatus::Completed => batch.status.key().green().to_string(),
            UploadStatus::Processing => batch.status.key().yellow().to_string(),
            UploadStatus::Failed => batch.status.key().red().to_string(),
        };
        table.add_row(vec![
            Cell::new(batch.upload_id),
            Cell::new(batch.upload_type),
            Cell::new(&batch.financial_year),
            Cell::new(batch.row_count),
            Cell::new(money(batch.total_amount)),
            Cell::new(status),
            Cell::new(batch.filename.unwrap_or_default()),
            Cell::new(&batch.uploaded_by),
            Cell::new(&batch.uploaded_at),
        ]);
    }
    println!("Uploads ({})\n{table}", ctx.tenant_id);
    Ok(())
}

pub fn delete(ctx: &Context, upload_id: i64) -> Result<()> {
    let store = ctx.open_store()?;
    let Some(batch) = store.get_upload(upload_id, &ctx.tenant_id)? else {
        println!("No upload {upload_id} for tenant {}; nothing deleted.", ctx.tenant_id);
        return Ok(());
    };
    let removed = delete_financial_upload(&store, upload_id, &ctx.tenant_id)?;
    println!(
        "Deleted upload {upload_id} ({} {}): {removed} records removed",
        batch.upload_type, batch.financial_year
    );
    Ok(())
}

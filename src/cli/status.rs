use crate::cli::Context;
use crate::db::SqliteStore;
use crate::error::Result;
use crate::repository::{ClientRepository, ProductRepository, UploadRepository};
use crate::settings::settings_file_exists;
use crate::uploads::current_financial_year;

pub fn run(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;
    let db_path = settings.db_path();

    println!("User:       {}", settings.uploader());
    println!("Tenant:     {}", ctx.tenant_id);
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    if !settings_file_exists() {
        println!("Settings:   (defaults, no settings file)");
    }

    if db_path.exists() {
        let store = SqliteStore::open(&db_path)?;
        println!("Fiscal year: {}", current_financial_year(&store, &ctx.tenant_id)?);
        println!();
        println!("Clients:       {}", store.list_clients(&ctx.tenant_id)?.len());
        println!("Product lines: {}", store.list_products()?.len());
        println!("Uploads:       {}", store.list_by_tenant(&ctx.tenant_id)?.len());
        println!("Records:       {}", store.count_records(&ctx.tenant_id)?);
    } else {
        println!();
        println!("Database not found. Run `tally init` to set up.");
    }
    Ok(())
}

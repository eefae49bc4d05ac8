use comfy_table::{Cell, Table};

use crate::cli::Context;
use crate::error::Result;
use crate::repository::ClientRepository;

pub fn add(ctx: &Context, name: &str, company: Option<&str>, legal: Option<&str>) -> Result<()> {
    let store = ctx.open_store()?;
    let id = store.add_client(&ctx.tenant_id, Some(name), company, legal)?;
    println!("Added client {id}: {name}");
    Ok(())
}

pub fn list(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let clients = store.list_clients(&ctx.tenant_id)?;
    if clients.is_empty() {
        println!("No clients for tenant {}.", ctx.tenant_id);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name"]);
    for client in clients {
        table.add_row(vec![Cell::new(client.id), Cell::new(client.display_name)]);
    }
    println!("Clients ({})\n{table}", ctx.tenant_id);
    Ok(())
}

use comfy_table::{Cell, Table};

use crate::cli::Context;
use crate::error::Result;
use crate::repository::ProductRepository;

pub fn add(ctx: &Context, name: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let id = store.add_product(name)?;
    println!("Added product line {id}: {}", name.trim());
    Ok(())
}

pub fn list(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let products = store.list_products()?;
    if products.is_empty() {
        println!("No product lines.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Product Line"]);
    for product in products {
        table.add_row(vec![Cell::new(product.id), Cell::new(product.name)]);
    }
    println!("Product Lines\n{table}");
    Ok(())
}

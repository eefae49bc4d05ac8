use std::collections::HashMap;

use crate::models::{
    Client, DuplicateRowEntry, MatchedRow, ParsedRow, ProductLine, UnmatchedClientEntry,
    UnmatchedProductEntry,
};

pub const DUPLICATE_REASON: &str = "duplicate client/product combination";
const UNKNOWN_CLIENT_REASON: &str = "client not found";
const UNKNOWN_PRODUCT_REASON: &str = "product not found";

/// Lowercase, drop everything but word characters and whitespace, collapse
/// whitespace runs, trim.
pub fn normalize(name: &str) -> String {
    let stripped: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationSummary {
    pub total_rows: usize,
    pub matched_count: usize,
    pub unmatched_client_count: usize,
    pub unmatched_product_count: usize,
    pub duplicate_count: usize,
    /// Every parsed row, duplicates included.
    pub total_amount: f64,
    pub matched_amount: f64,
    /// Rows whose client did not resolve. Not `total - matched`.
    pub unmatched_amount: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub matched_rows: Vec<MatchedRow>,
    pub unmatched_clients: Vec<UnmatchedClientEntry>,
    pub unmatched_products: Vec<UnmatchedProductEntry>,
    pub duplicate_rows: Vec<DuplicateRowEntry>,
    pub summary: ValidationSummary,
}

impl MatchResult {
    pub fn is_clean(&self) -> bool {
        self.unmatched_clients.is_empty()
            && self.unmatched_products.is_empty()
            && self.duplicate_rows.is_empty()
    }
}

/// Reconcile parsed rows against registry snapshots. Never fails: rows that
/// cannot be resolved are reported, not rejected.
pub fn match_rows(rows: &[ParsedRow], clients: &[Client], products: &[ProductLine]) -> MatchResult {
    // The first registry entry wins when two names normalize alike.
    let mut client_map: HashMap<String, &Client> = HashMap::new();
    for client in clients {
        client_map.entry(normalize(&client.display_name)).or_insert(client);
    }
    let mut product_map: HashMap<String, &ProductLine> = HashMap::new();
    for product in products {
        product_map.entry(normalize(&product.name)).or_insert(product);
    }

    let mut result = MatchResult::default();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut unmatched_product_idx: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let norm_client = normalize(&row.client_name);
        let norm_product = normalize(&row.product_name);
        let key = format!("{norm_client}|{norm_product}");

        if let Some(&first_row_index) = seen.get(&key) {
            result.duplicate_rows.push(DuplicateRowEntry {
                row_index: row.row_index,
                first_row_index,
                client_name: row.client_name.clone(),
                product_name: row.product_name.clone(),
                total: row.total,
                reason: DUPLICATE_REASON.to_string(),
            });
            continue;
        }
        seen.insert(key, row.row_index);

        let client = client_map.get(&norm_client);
        let product = product_map.get(&norm_product);

        if client.is_none() {
            result.unmatched_clients.push(UnmatchedClientEntry {
                row_index: row.row_index,
                client_name: row.client_name.clone(),
                product_name: row.product_name.clone(),
                total: row.total,
                reason: UNKNOWN_CLIENT_REASON.to_string(),
            });
        }
        if product.is_none() {
            match unmatched_product_idx.get(&norm_product) {
                Some(&i) => result.unmatched_products[i].occurrences += 1,
                None => {
                    unmatched_product_idx.insert(norm_product, result.unmatched_products.len());
                    result.unmatched_products.push(UnmatchedProductEntry {
                        row_index: row.row_index,
                        client_name: row.client_name.clone(),
                        product_name: row.product_name.clone(),
                        total: row.total,
                        occurrences: 1,
                        reason: UNKNOWN_PRODUCT_REASON.to_string(),
                    });
                }
            }
        }

        if let (Some(client), Some(product)) = (client, product) {
            result.matched_rows.push(MatchedRow {
                row_index: row.row_index,
                client_id: client.id,
                client_name: client.display_name.clone(),
                product_id: product.id,
                product_line: product.name.clone(),
                monthly_data: row.monthly_data.clone(),
                total: row.total,
            });
        }
    }

    result.summary = ValidationSummary {
        total_rows: rows.len(),
        matched_count: result.matched_rows.len(),
        unmatched_client_count: result.unmatched_clients.len(),
        unmatched_product_count: result.unmatched_products.len(),
        duplicate_count: result.duplicate_rows.len(),
        total_amount: rows.iter().map(|r| r.total).sum(),
        matched_amount: result.matched_rows.iter().map(|r| r.total).sum(),
        unmatched_amount: result.unmatched_clients.iter().map(|e| e.total).sum(),
    };
    log::info!(
        "matched {}/{} rows ({} unknown clients, {} unknown products, {} duplicates)",
        result.summary.matched_count,
        result.summary.total_rows,
        result.summary.unmatched_client_count,
        result.summary.unmatched_product_count,
        result.summary.duplicate_count
    );
    result
}

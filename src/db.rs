use std::path::Path;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::models::{
    Client, FinancialDataRecord, FiscalConfig, MatchedRow, MonthlyData, NewUpload, ProductLine,
    UploadBatch, UploadStatus, UploadType,
};
use crate::repository::{
    ClientRepository, FiscalConfigRepository, ProductRepository, UploadRepository,
};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS clients (
    id INTEGER PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    name TEXT,
    company_name TEXT,
    legal_name TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS product_lines (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    upload_type TEXT NOT NULL,
    financial_year TEXT NOT NULL,
    uploaded_by TEXT NOT NULL,
    uploaded_at TEXT DEFAULT (datetime('now')),
    row_count INTEGER NOT NULL,
    total_amount REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'processing',
    filename TEXT,
    checksum TEXT
);

CREATE TABLE IF NOT EXISTS financial_records (
    id INTEGER PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    upload_type TEXT NOT NULL,
    financial_year TEXT NOT NULL,
    client_id INTEGER NOT NULL,
    client_name TEXT NOT NULL,
    product_id INTEGER NOT NULL,
    product_line TEXT,
    monthly_data TEXT NOT NULL,
    total REAL NOT NULL,
    upload_id INTEGER NOT NULL,
    UNIQUE (tenant_id, upload_type, financial_year, client_id, product_id),
    FOREIGN KEY (upload_id) REFERENCES uploads(id)
);

CREATE INDEX IF NOT EXISTS idx_financial_records_upload ON financial_records(upload_id);

CREATE TABLE IF NOT EXISTS fiscal_configs (
    tenant_id TEXT PRIMARY KEY,
    current_financial_year TEXT,
    financial_year_start TEXT,
    financial_year_end TEXT,
    reporting_month TEXT
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

impl ToSql for UploadType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.key()))
    }
}

impl FromSql for UploadType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|_| FromSqlError::InvalidType)
    }
}

impl FromSql for UploadStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let key = value.as_str()?;
        UploadStatus::from_key(key)
            .ok_or_else(|| FromSqlError::Other(format!("unknown upload status '{key}'").into()))
    }
}

/// First non-blank of the given name fields.
fn display_name(candidates: [Option<String>; 3]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

const UPLOAD_COLUMNS: &str = "id, tenant_id, upload_type, financial_year, uploaded_by, uploaded_at, \
     row_count, total_amount, status, filename, checksum";

fn upload_from_row(row: &Row) -> rusqlite::Result<UploadBatch> {
    Ok(UploadBatch {
        upload_id: row.get(0)?,
        tenant_id: row.get(1)?,
        upload_type: row.get(2)?,
        financial_year: row.get(3)?,
        uploaded_by: row.get(4)?,
        uploaded_at: row.get(5)?,
        row_count: row.get(6)?,
        total_amount: row.get(7)?,
        status: row.get(8)?,
        filename: row.get(9)?,
        checksum: row.get(10)?,
    })
}

/// SQLite-backed implementation of every repository the engine uses.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self::new(conn))
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn add_client(
        &self,
        tenant_id: &str,
        name: Option<&str>,
        company_name: Option<&str>,
        legal_name: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO clients (tenant_id, name, company_name, legal_name) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![tenant_id, name, company_name, legal_name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn add_product(&self, name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO product_lines (name) VALUES (?1)",
            [name.trim()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_upload(&self, upload_id: i64, tenant_id: &str) -> Result<Option<UploadBatch>> {
        let sql = format!("SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = ?1 AND tenant_id = ?2");
        Ok(self
            .conn
            .query_row(&sql, rusqlite::params![upload_id, tenant_id], upload_from_row)
            .optional()?)
    }

    pub fn count_records(&self, tenant_id: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT count(*) FROM financial_records WHERE tenant_id = ?1",
            [tenant_id],
            |r| r.get(0),
        )?)
    }
}

impl ClientRepository for SqliteStore {
    fn list_clients(&self, tenant_id: &str) -> Result<Vec<Client>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, company_name, legal_name FROM clients WHERE tenant_id = ?1 ORDER BY id",
        )?;
        let rows: Vec<(i64, Option<String>, Option<String>, Option<String>)> = stmt
            .query_map([tenant_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, name, company, legal)| {
                let resolved = display_name([name, company, legal]);
                if resolved.is_none() {
                    log::debug!("client {id} has no usable name, skipping");
                }
                resolved.map(|display_name| Client { id, display_name })
            })
            .collect())
    }
}

impl ProductRepository for SqliteStore {
    fn list_products(&self) -> Result<Vec<ProductLine>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM product_lines ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProductLine {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl UploadRepository for SqliteStore {
    fn save(&self, upload: &NewUpload, rows: &[MatchedRow]) -> Result<UploadBatch> {
        let total_amount: f64 = rows.iter().map(|r| r.total).sum();
        // Dropping the transaction on any early return rolls everything back.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO uploads (tenant_id, upload_type, financial_year, uploaded_by, row_count, \
             total_amount, status, filename, checksum) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'processing', ?7, ?8)",
            rusqlite::params![
                upload.tenant_id,
                upload.upload_type,
                upload.financial_year,
                upload.uploaded_by,
                rows.len() as i64,
                total_amount,
                upload.filename,
                upload.checksum,
            ],
        )?;
        let upload_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO financial_records (tenant_id, upload_type, financial_year, client_id, \
                 client_name, product_id, product_line, monthly_data, total, upload_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT (tenant_id, upload_type, financial_year, client_id, product_id) DO UPDATE SET \
                 client_name = excluded.client_name, product_line = excluded.product_line, \
                 monthly_data = excluded.monthly_data, total = excluded.total, upload_id = excluded.upload_id",
            )?;
            for row in rows {
                let monthly = serde_json::to_string(&row.monthly_data)?;
                stmt.execute(rusqlite::params![
                    upload.tenant_id,
                    upload.upload_type,
                    upload.financial_year,
                    row.client_id,
                    row.client_name,
                    row.product_id,
                    row.product_line,
                    monthly,
                    row.total,
                    upload_id,
                ])?;
            }
        }
        tx.execute(
            "UPDATE uploads SET status = 'completed' WHERE id = ?1",
            [upload_id],
        )?;
        let sql = format!("SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = ?1");
        let batch = tx.query_row(&sql, [upload_id], upload_from_row)?;
        tx.commit()?;
        Ok(batch)
    }

    fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<UploadBatch>> {
        let sql = format!("SELECT {UPLOAD_COLUMNS} FROM uploads WHERE tenant_id = ?1 ORDER BY id DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([tenant_id], upload_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn delete_by_id(&self, upload_id: i64, tenant_id: &str) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let owned = tx
            .prepare("SELECT 1 FROM uploads WHERE id = ?1 AND tenant_id = ?2")?
            .exists(rusqlite::params![upload_id, tenant_id])?;
        if !owned {
            return Ok(0);
        }
        let removed = tx.execute(
            "DELETE FROM financial_records WHERE upload_id = ?1 AND tenant_id = ?2",
            rusqlite::params![upload_id, tenant_id],
        )?;
        tx.execute(
            "DELETE FROM uploads WHERE id = ?1 AND tenant_id = ?2",
            rusqlite::params![upload_id, tenant_id],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    fn records_for(
        &self,
        tenant_id: &str,
        upload_type: UploadType,
        financial_year: &str,
    ) -> Result<Vec<FinancialDataRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT tenant_id, upload_type, financial_year, client_id, client_name, product_id, \
             product_line, monthly_data, total, upload_id FROM financial_records \
             WHERE tenant_id = ?1 AND upload_type = ?2 AND financial_year = ?3 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![tenant_id, upload_type, financial_year], |row| {
                let raw: String = row.get(7)?;
                let monthly_data: MonthlyData = serde_json::from_str(&raw).unwrap_or_else(|e| {
                    log::warn!("unreadable monthly data, treating as empty: {e}");
                    MonthlyData::new()
                });
                Ok(FinancialDataRecord {
                    tenant_id: row.get(0)?,
                    upload_type: row.get(1)?,
                    financial_year: row.get(2)?,
                    client_id: row.get(3)?,
                    client_name: row.get(4)?,
                    product_id: row.get(5)?,
                    product_line: row.get(6)?,
                    monthly_data,
                    total: row.get(8)?,
                    upload_id: row.get(9)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl FiscalConfigRepository for SqliteStore {
    fn fiscal_config(&self, tenant_id: &str) -> Result<FiscalConfig> {
        let config = self
            .conn
            .query_row(
                "SELECT current_financial_year, financial_year_start, financial_year_end, reporting_month \
                 FROM fiscal_configs WHERE tenant_id = ?1",
                [tenant_id],
                |row| {
                    Ok(FiscalConfig {
                        current_financial_year: row.get(0)?,
                        financial_year_start: row.get(1)?,
                        financial_year_end: row.get(2)?,
                        reporting_month: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(config.unwrap_or_default())
    }

    fn set_fiscal_config(&self, tenant_id: &str, config: &FiscalConfig) -> Result<()> {
        self.conn.execute(
            "INSERT INTO fiscal_configs (tenant_id, current_financial_year, financial_year_start, \
             financial_year_end, reporting_month) VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (tenant_id) DO UPDATE SET \
             current_financial_year = excluded.current_financial_year, \
             financial_year_start = excluded.financial_year_start, \
             financial_year_end = excluded.financial_year_end, \
             reporting_month = excluded.reporting_month",
            rusqlite::params![
                tenant_id,
                config.current_financial_year,
                config.financial_year_start,
                config.financial_year_end,
                config.reporting_month,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn matched(client_id: i64, product_id: i64, total: f64) -> MatchedRow {
        let mut monthly_data = MonthlyData::new();
        monthly_data.insert("Month 1".into(), total);
        MatchedRow {
            row_index: 2,
            client_id,
            client_name: format!("Client {client_id}"),
            product_id,
            product_line: format!("Product {product_id}"),
            monthly_data,
            total,
        }
    }

    fn new_upload(tenant: &str) -> NewUpload {
        NewUpload {
            tenant_id: tenant.into(),
            upload_type: UploadType::YtdActual,
            financial_year: "2024/2025".into(),
            uploaded_by: "alice".into(),
            filename: Some("actuals.csv".into()),
            checksum: Some("abc".into()),
        }
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, store) = test_store();
        let tables: Vec<String> = store
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["clients", "product_lines", "uploads", "financial_records", "fiscal_configs"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, store) = test_store();
        init_db(store.connection()).unwrap();
    }

    #[test]
    fn test_client_display_name_fallback() {
        let (_dir, store) = test_store();
        store.add_client("t1", Some("Acme"), Some("Acme Holdings"), None).unwrap();
        store.add_client("t1", Some("  "), Some("Beta Corp"), None).unwrap();
        store.add_client("t1", None, None, Some("Gamma LLP")).unwrap();
        store.add_client("t1", None, None, None).unwrap();
        store.add_client("t2", Some("Other Tenant"), None, None).unwrap();
        let names: Vec<String> = store
            .list_clients("t1")
            .unwrap()
            .into_iter()
            .map(|c| c.display_name)
            .collect();
        assert_eq!(names, vec!["Acme", "Beta Corp", "Gamma LLP"]);
    }

    #[test]
    fn test_save_writes_batch_and_records() {
        let (_dir, store) = test_store();
        let batch = store
            .save(&new_upload("t1"), &[matched(1, 10, 100.0), matched(2, 10, 50.0)])
            .unwrap();
        assert_eq!(batch.status, UploadStatus::Completed);
        assert_eq!(batch.row_count, 2);
        assert_eq!(batch.total_amount, 150.0);
        assert_eq!(batch.uploaded_by, "alice");
        let records = store.records_for("t1", UploadType::YtdActual, "2024/2025").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].upload_id, batch.upload_id);
        assert_eq!(records[0].monthly_data.get("Month 1"), Some(&100.0));
    }

    #[test]
    fn test_unknown_upload_status_is_an_error() {
        let (_dir, store) = test_store();
        let batch = store.save(&new_upload("t1"), &[matched(1, 10, 100.0)]).unwrap();
        store
            .connection()
            .execute("UPDATE uploads SET status = 'failed' WHERE id = ?1", [batch.upload_id])
            .unwrap();
        assert_eq!(store.list_by_tenant("t1").unwrap()[0].status, UploadStatus::Failed);

        store
            .connection()
            .execute("UPDATE uploads SET status = 'garbage' WHERE id = ?1", [batch.upload_id])
            .unwrap();
        assert!(store.list_by_tenant("t1").is_err());
    }

    #[test]
    fn test_save_upserts_on_natural_key() {
        let (_dir, store) = test_store();
        store.save(&new_upload("t1"), &[matched(1, 10, 100.0)]).unwrap();
        let second = store.save(&new_upload("t1"), &[matched(1, 10, 75.0)]).unwrap();
        let records = store.records_for("t1", UploadType::YtdActual, "2024/2025").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total, 75.0);
        assert_eq!(records[0].upload_id, second.upload_id);

        let mut budget = new_upload("t1");
        budget.upload_type = UploadType::Budget;
        store.save(&budget, &[matched(1, 10, 10.0)]).unwrap();
        assert_eq!(store.count_records("t1").unwrap(), 2);
    }

    #[test]
    fn test_failed_save_leaves_nothing_behind() {
        let (_dir, store) = test_store();
        store
            .connection()
            .execute_batch("CREATE TRIGGER reject AFTER INSERT ON financial_records WHEN NEW.client_id = 99 BEGIN SELECT RAISE(ABORT, 'boom'); END;")
            .unwrap();
        let result = store.save(&new_upload("t1"), &[matched(1, 10, 1.0), matched(99, 10, 2.0)]);
        assert!(result.is_err());
        assert!(store.list_by_tenant("t1").unwrap().is_empty());
        assert_eq!(store.count_records("t1").unwrap(), 0);
    }

    #[test]
    fn test_delete_cascades_and_is_tenant_scoped() {
        let (_dir, store) = test_store();
        let batch = store
            .save(&new_upload("t1"), &[matched(1, 10, 1.0), matched(2, 10, 2.0)])
            .unwrap();
        assert_eq!(store.delete_by_id(batch.upload_id, "t2").unwrap(), 0);
        assert_eq!(store.list_by_tenant("t1").unwrap().len(), 1);

        assert_eq!(store.delete_by_id(batch.upload_id, "t1").unwrap(), 2);
        assert!(store.list_by_tenant("t1").unwrap().is_empty());
        assert_eq!(store.count_records("t1").unwrap(), 0);
        // Idempotent
        assert_eq!(store.delete_by_id(batch.upload_id, "t1").unwrap(), 0);
    }

    #[test]
    fn test_list_by_tenant_newest_first() {
        let (_dir, store) = test_store();
        let a = store.save(&new_upload("t1"), &[matched(1, 10, 1.0)]).unwrap();
        let b = store.save(&new_upload("t1"), &[matched(2, 10, 1.0)]).unwrap();
        store.save(&new_upload("t2"), &[matched(3, 10, 1.0)]).unwrap();
        let ids: Vec<i64> = store.list_by_tenant("t1").unwrap().iter().map(|u| u.upload_id).collect();
        assert_eq!(ids, vec![b.upload_id, a.upload_id]);
    }

    #[test]
    fn test_malformed_monthly_data_reads_as_empty() {
        let (_dir, store) = test_store();
        store.save(&new_upload("t1"), &[matched(1, 10, 5.0)]).unwrap();
        store
            .connection()
            .execute("UPDATE financial_records SET monthly_data = 'not json'", [])
            .unwrap();
        let records = store.records_for("t1", UploadType::YtdActual, "2024/2025").unwrap();
        assert!(records[0].monthly_data.is_empty());
        assert_eq!(records[0].total, 5.0);
    }

    #[test]
    fn test_fiscal_config_roundtrip() {
        let (_dir, store) = test_store();
        assert_eq!(store.fiscal_config("t1").unwrap(), FiscalConfig::default());
        let cfg = FiscalConfig {
            current_financial_year: Some("2024/2025".into()),
            financial_year_start: Some("April".into()),
            financial_year_end: Some("March".into()),
            reporting_month: Some("November".into()),
        };
        store.set_fiscal_config("t1", &cfg).unwrap();
        assert_eq!(store.fiscal_config("t1").unwrap(), cfg);
        let updated = FiscalConfig {
            reporting_month: Some("December".into()),
            ..cfg
        };
        store.set_fiscal_config("t1", &updated).unwrap();
        assert_eq!(store.fiscal_config("t1").unwrap().reporting_month.as_deref(), Some("December"));
        assert_eq!(store.fiscal_config("t2").unwrap(), FiscalConfig::default());
    }
}

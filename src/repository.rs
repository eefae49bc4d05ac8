use crate::error::Result;
use crate::models::{
    Client, FinancialDataRecord, FiscalConfig, MatchedRow, NewUpload, ProductLine, UploadBatch,
    UploadType,
};

pub trait ClientRepository {
    /// Clients visible to `tenant_id`, each with its display name resolved.
    fn list_clients(&self, tenant_id: &str) -> Result<Vec<Client>>;
}

pub trait ProductRepository {
    fn list_products(&self) -> Result<Vec<ProductLine>>;
}

pub trait UploadRepository {
    /// Write the batch header and every record, or nothing at all.
    fn save(&self, upload: &NewUpload, rows: &[MatchedRow]) -> Result<UploadBatch>;

    /// Newest first.
    fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<UploadBatch>>;

    /// Remove a batch and its records. Returns the number of records removed;
    /// unknown ids, or ids owned by another tenant, remove nothing.
    fn delete_by_id(&self, upload_id: i64, tenant_id: &str) -> Result<usize>;

    fn records_for(
        &self,
        tenant_id: &str,
        upload_type: UploadType,
        financial_year: &str,
    ) -> Result<Vec<FinancialDataRecord>>;
}

pub trait FiscalConfigRepository {
    /// Stored settings for the tenant, or all-default when none are stored.
    fn fiscal_config(&self, tenant_id: &str) -> Result<FiscalConfig>;

    fn set_fiscal_config(&self, tenant_id: &str, config: &FiscalConfig) -> Result<()>;
}

use crate::aggregate::{build_dashboard, Dashboard};
use crate::error::{Result, TallyError};
use crate::fiscal::{calculate_financial_year, FiscalCalendar};
use crate::matcher::{match_rows, MatchResult};
use crate::models::{FinancialDataRecord, MatchedRow, NewUpload, ParsedRow, UploadBatch, UploadType};
use crate::repository::{
    ClientRepository, FiscalConfigRepository, ProductRepository, UploadRepository,
};

/// The financial year an upload of `upload_type` belongs to.
pub fn financial_year_for(upload_type: UploadType, current_fy: &str) -> String {
    calculate_financial_year(current_fy, upload_type.year_offset())
}

/// The tenant's current financial year, defaulted from today when unset.
pub fn current_financial_year<R: FiscalConfigRepository>(repo: &R, tenant_id: &str) -> Result<String> {
    let config = repo.fiscal_config(tenant_id)?;
    Ok(FiscalCalendar::from_config(&config).current_financial_year)
}

/// Match parsed rows against live snapshots of the tenant's clients and the
/// product catalogue.
pub fn reconcile_rows<R>(repo: &R, tenant_id: &str, rows: &[ParsedRow]) -> Result<MatchResult>
where
    R: ClientRepository + ProductRepository,
{
    let clients = repo.list_clients(tenant_id)?;
    let products = repo.list_products()?;
    Ok(match_rows(rows, &clients, &products))
}

pub struct SaveRequest {
    pub tenant_id: String,
    pub upload_type: UploadType,
    pub uploaded_by: String,
    pub filename: Option<String>,
    pub checksum: Option<String>,
}

pub struct SaveOutcome {
    pub batch: UploadBatch,
    /// An earlier upload of the byte-identical file into the same slot.
    pub replaced_identical: Option<i64>,
}

pub fn save_financial_upload<R>(repo: &R, request: SaveRequest, rows: &[MatchedRow]) -> Result<SaveOutcome>
where
    R: UploadRepository + FiscalConfigRepository,
{
    if rows.is_empty() {
        return Err(TallyError::NothingToSave);
    }
    let current = current_financial_year(repo, &request.tenant_id)?;
    let upload = NewUpload {
        financial_year: financial_year_for(request.upload_type, &current),
        tenant_id: request.tenant_id,
        upload_type: request.upload_type,
        uploaded_by: request.uploaded_by,
        filename: request.filename,
        checksum: request.checksum,
    };
    let replaced_identical = previous_identical(repo, &upload)?;
    if let Some(id) = replaced_identical {
        log::warn!("upload {id} already holds this exact file; records will be overwritten");
    }

    let batch = repo.save(&upload, rows)?;
    log::info!(
        "saved upload {} ({} {}) with {} records",
        batch.upload_id,
        batch.upload_type,
        batch.financial_year,
        batch.row_count
    );
    Ok(SaveOutcome {
        batch,
        replaced_identical,
    })
}

fn previous_identical<R: UploadRepository>(repo: &R, upload: &NewUpload) -> Result<Option<i64>> {
    let Some(checksum) = upload.checksum.as_deref() else {
        return Ok(None);
    };
    Ok(repo
        .list_by_tenant(&upload.tenant_id)?
        .into_iter()
        .find(|b| {
            b.upload_type == upload.upload_type
                && b.financial_year == upload.financial_year
                && b.checksum.as_deref() == Some(checksum)
        })
        .map(|b| b.upload_id))
}

pub fn list_uploads<R: UploadRepository>(repo: &R, tenant_id: &str) -> Result<Vec<UploadBatch>> {
    repo.list_by_tenant(tenant_id)
}

/// Delete a batch and every record it owns. Unknown ids report zero.
pub fn delete_financial_upload<R: UploadRepository>(repo: &R, upload_id: i64, tenant_id: &str) -> Result<usize> {
    let removed = repo.delete_by_id(upload_id, tenant_id)?;
    log::info!("deleted upload {upload_id} for {tenant_id}: {removed} records removed");
    Ok(removed)
}

/// Saved records of `upload_type` for the financial year that type maps to.
pub fn load_records<R>(repo: &R, tenant_id: &str, upload_type: UploadType) -> Result<(String, Vec<FinancialDataRecord>)>
where
    R: UploadRepository + FiscalConfigRepository,
{
    let fy = financial_year_for(upload_type, &current_financial_year(repo, tenant_id)?);
    let records = repo.records_for(tenant_id, upload_type, &fy)?;
    log::debug!("loaded {} {upload_type} records for {fy}", records.len());
    Ok((fy, records))
}

/// Current-year actuals compared with last year's actuals and the budget.
pub fn load_dashboard<R>(repo: &R, tenant_id: &str) -> Result<(FiscalCalendar, Dashboard)>
where
    R: UploadRepository + FiscalConfigRepository,
{
    let calendar = FiscalCalendar::from_config(&repo.fiscal_config(tenant_id)?);
    let (_, actuals) = load_records(repo, tenant_id, UploadType::YtdActual)?;
    let (_, prior) = load_records(repo, tenant_id, UploadType::Ytd1)?;
    let (_, budget) = load_records(repo, tenant_id, UploadType::Budget)?;
    let dashboard = build_dashboard(&actuals, Some(prior.as_slice()), Some(budget.as_slice()), &calendar);
    Ok((calendar, dashboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::models::{FiscalConfig, MonthlyData};
    use crate::parser::parse_upload;

    fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("test.db")).unwrap();
        store
            .set_fiscal_config(
                "t1",
                &FiscalConfig {
                    current_financial_year: Some("2024/2025".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        (dir, store)
    }

    fn request(upload_type: UploadType) -> SaveRequest {
        SaveRequest {
            tenant_id: "t1".into(),
            upload_type,
            uploaded_by: "alice".into(),
            filename: None,
            checksum: Some("sum".into()),
        }
    }

    fn matched(client_id: i64) -> MatchedRow {
        matched_with(client_id, &[])
    }

    fn matched_with(client_id: i64, months: &[(usize, f64)]) -> MatchedRow {
        let mut monthly_data = MonthlyData::new();
        for (n, v) in months {
            monthly_data.insert(crate::models::month_label(*n), *v);
        }
        MatchedRow {
            row_index: 2,
            client_id,
            client_name: "Acme".into(),
            product_id: 1,
            product_line: "Training".into(),
            total: monthly_data.values().sum(),
            monthly_data,
        }
    }

    #[test]
    fn test_financial_year_for_each_type() {
        assert_eq!(financial_year_for(UploadType::Ytd3, "2024/2025"), "2021/2022");
        assert_eq!(financial_year_for(UploadType::Ytd2, "2024/2025"), "2022/2023");
        assert_eq!(financial_year_for(UploadType::Ytd1, "2024/2025"), "2023/2024");
        assert_eq!(financial_year_for(UploadType::Budget, "2024/2025"), "2024/2025");
        assert_eq!(financial_year_for(UploadType::YtdActual, "2024/2025"), "2024/2025");
    }

    #[test]
    fn test_parse_reconcile_save_flow() {
        let (_dir, store) = test_store();
        store.add_client("t1", Some("Acme"), None, None).unwrap();
        store.add_product("Training").unwrap();
        let parsed = parse_upload(
            "Client Name,Product Name,Month 1,Month 2\nAcme,Training,1000,2000\nAcme,Training,5,5\nNobody,Training,1,1\n",
        )
        .unwrap();
        let result = reconcile_rows(&store, "t1", &parsed.rows).unwrap();
        assert_eq!(result.matched_rows.len(), 1);
        assert_eq!(result.duplicate_rows.len(), 1);
        assert_eq!(result.unmatched_clients.len(), 1);

        let outcome = save_financial_upload(&store, request(UploadType::Ytd1), &result.matched_rows).unwrap();
        assert_eq!(outcome.batch.financial_year, "2023/2024");
        assert_eq!(outcome.batch.total_amount, 3000.0);
        assert_eq!(outcome.replaced_identical, None);

        let records = store.records_for("t1", UploadType::Ytd1, "2023/2024").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client_name, "Acme");
    }

    #[test]
    fn test_save_rejects_empty_batch() {
        let (_dir, store) = test_store();
        let err = save_financial_upload(&store, request(UploadType::Budget), &[]).err().unwrap();
        assert!(matches!(err, TallyError::NothingToSave));
        assert!(list_uploads(&store, "t1").unwrap().is_empty());
    }

    #[test]
    fn test_reupload_of_identical_file_is_reported() {
        let (_dir, store) = test_store();
        let first = save_financial_upload(&store, request(UploadType::Budget), &[matched(1)]).unwrap();
        let second = save_financial_upload(&store, request(UploadType::Budget), &[matched(1)]).unwrap();
        assert_eq!(second.replaced_identical, Some(first.batch.upload_id));
        let other = save_financial_upload(&store, request(UploadType::YtdActual), &[matched(1)]).unwrap();
        assert_eq!(other.replaced_identical, None);
    }

    #[test]
    fn test_delete_removes_upload_from_listing() {
        let (_dir, store) = test_store();
        let saved = save_financial_upload(&store, request(UploadType::Budget), &[matched(1), matched(2)]).unwrap();
        let keep = save_financial_upload(&store, request(UploadType::YtdActual), &[matched(1)]).unwrap();
        assert_eq!(delete_financial_upload(&store, saved.batch.upload_id, "t1").unwrap(), 2);
        let ids: Vec<i64> = list_uploads(&store, "t1").unwrap().iter().map(|b| b.upload_id).collect();
        assert_eq!(ids, vec![keep.batch.upload_id]);
        assert!(store.records_for("t1", UploadType::Budget, "2024/2025").unwrap().is_empty());
        assert_eq!(delete_financial_upload(&store, 9999, "t1").unwrap(), 0);
    }

    #[test]
    fn test_load_records_uses_mapped_year() {
        let (_dir, store) = test_store();
        save_financial_upload(&store, request(UploadType::Ytd2), &[matched_with(1, &[(1, 10.0)])]).unwrap();
        let (fy, records) = load_records(&store, "t1", UploadType::Ytd2).unwrap();
        assert_eq!(fy, "2022/2023");
        assert_eq!(records.len(), 1);
        let (_, none) = load_records(&store, "t1", UploadType::Ytd3).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_load_dashboard_compares_against_prior_year() {
        let (_dir, store) = test_store();
        store
            .set_fiscal_config(
                "t1",
                &FiscalConfig {
                    current_financial_year: Some("2024/2025".into()),
                    financial_year_start: Some("March".into()),
                    financial_year_end: Some("February".into()),
                    reporting_month: Some("April".into()),
                },
            )
            .unwrap();
        save_financial_upload(&store, request(UploadType::YtdActual), &[matched_with(1, &[(1, 120.0), (2, 30.0), (3, 999.0)])])
            .unwrap();
        save_financial_upload(&store, request(UploadType::Ytd1), &[matched_with(1, &[(1, 100.0), (2, 50.0)])]).unwrap();

        let (calendar, dash) = load_dashboard(&store, "t1").unwrap();
        assert_eq!(calendar.reporting_position(), Some(2));
        assert_eq!(dash.ytd_total, 150.0);
        assert_eq!(dash.remaining_total, 999.0);
        assert_eq!(dash.vs_prior_year.baseline, Some(150.0));
        assert_eq!(dash.vs_prior_year.variance, Some(0.0));
        assert_eq!(dash.vs_budget.baseline, None);
    }
}

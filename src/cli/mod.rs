pub mod clients;
pub mod fiscal;
pub mod init;
pub mod products;
pub mod report;
pub mod status;
pub mod upload;
pub mod uploads;

use clap::{Parser, Subcommand};

use crate::db::SqliteStore;
use crate::error::{Result, TallyError};
use crate::settings::{load_settings, Settings};

#[derive(Parser)]
#[command(
    name = "tally",
    about = "Reconcile accountant CSV uploads against your client registry and report by fiscal year."
)]
pub struct Cli {
    /// Tenant to act on (default: tenant_id from settings)
    #[arg(long, global = true)]
    pub tenant: Option<String>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up tally: choose a data directory and initialize the database.
    Init {
        /// Path for tally data (default: ~/Documents/tally)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage the client registry.
    Clients {
        #[command(subcommand)]
        command: ClientsCommands,
    },
    /// Manage the product-line catalogue.
    Products {
        #[command(subcommand)]
        command: ProductsCommands,
    },
    /// Show or change the fiscal year settings.
    Fiscal {
        #[command(subcommand)]
        command: FiscalCommands,
    },
    /// Validate a CSV upload against the registry and save the matched rows.
    Upload {
        /// Path to the CSV file
        file: String,
        /// Upload type: ytd-3, ytd-2, ytd-1, budget, ytd-actual
        #[arg(long = "type")]
        upload_type: String,
        /// Validate and print the result without saving
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// List or delete saved uploads.
    Uploads {
        #[command(subcommand)]
        command: UploadsCommands,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Show current settings and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum ClientsCommands {
    /// Add a client.
    Add {
        /// Client name as it appears in uploads
        name: String,
        /// Company name
        #[arg(long)]
        company: Option<String>,
        /// Registered legal name
        #[arg(long)]
        legal: Option<String>,
    },
    /// List clients for the tenant.
    List,
}

#[derive(Subcommand)]
pub enum ProductsCommands {
    /// Add a product line.
    Add {
        /// Product line name, e.g. 'Training'
        name: String,
    },
    /// List product lines.
    List,
}

#[derive(Subcommand)]
pub enum FiscalCommands {
    /// Show the stored fiscal settings and the values in effect.
    Show,
    /// Update one or more fiscal settings.
    Set {
        /// Current financial year, e.g. 2024/2025
        #[arg(long)]
        year: Option<String>,
        /// First month of the financial year
        #[arg(long)]
        start: Option<String>,
        /// Last month of the financial year
        #[arg(long)]
        end: Option<String>,
        /// Last month with reported actuals
        #[arg(long)]
        reporting: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UploadsCommands {
    /// List uploads, newest first.
    List,
    /// Delete an upload and every record it saved.
    Delete {
        /// Upload ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// The twelve fiscal months and which are year-to-date.
    Calendar,
    /// Totals per fiscal month.
    Months {
        /// Upload type to report on
        #[arg(long = "type", default_value = "ytd-actual")]
        upload_type: String,
    },
    /// Totals per product line.
    Products {
        /// Upload type to report on
        #[arg(long = "type", default_value = "ytd-actual")]
        upload_type: String,
        /// Only count year-to-date months
        #[arg(long)]
        ytd: bool,
    },
    /// Year-to-date and full-year revenue per registry client.
    Clients {
        /// Upload type to report on
        #[arg(long = "type", default_value = "ytd-actual")]
        upload_type: String,
    },
    /// Current-year actuals against the prior year and the budget.
    Dashboard,
}

/// Settings plus the tenant every command acts on.
pub struct Context {
    pub settings: Settings,
    pub tenant_id: String,
}

impl Context {
    pub fn load(tenant: Option<String>) -> Self {
        let settings = load_settings();
        let tenant_id = tenant
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| settings.tenant_id.clone());
        Self { settings, tenant_id }
    }

    pub fn open_store(&self) -> Result<SqliteStore> {
        let path = self.settings.db_path();
        if !path.exists() {
            return Err(TallyError::NotInitialized(path.display().to_string()));
        }
        SqliteStore::open(&path)
    }
}

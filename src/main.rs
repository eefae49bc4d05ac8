mod aggregate;
mod cli;
mod db;
mod error;
mod fiscal;
mod fmt;
mod matcher;
mod models;
mod parser;
mod repository;
mod settings;
mod uploads;

use clap::Parser;

use cli::{
    ClientsCommands, Cli, Commands, Context, FiscalCommands, ProductsCommands, ReportCommands,
    UploadsCommands,
};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = Context::load(cli.tenant);
    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Clients { command } => match command {
            ClientsCommands::Add { name, company, legal } => {
                cli::clients::add(&ctx, &name, company.as_deref(), legal.as_deref())
            }
            ClientsCommands::List => cli::clients::list(&ctx),
        },
        Commands::Products { command } => match command {
            ProductsCommands::Add { name } => cli::products::add(&ctx, &name),
            ProductsCommands::List => cli::products::list(&ctx),
        },
        Commands::Fiscal { command } => match command {
            FiscalCommands::Show => cli::fiscal::show(&ctx),
            FiscalCommands::Set {
                year,
                start,
                end,
                reporting,
            } => cli::fiscal::set(&ctx, year, start, end, reporting),
        },
        Commands::Upload {
            file,
            upload_type,
            dry_run,
        } => cli::upload::run(&ctx, &file, &upload_type, dry_run),
        Commands::Uploads { command } => match command {
            UploadsCommands::List => cli::uploads::list(&ctx),
            UploadsCommands::Delete { id } => cli::uploads::delete(&ctx, id),
        },
        Commands::Report { command } => match command {
            ReportCommands::Calendar => cli::report::calendar(&ctx),
            ReportCommands::Months { upload_type } => cli::report::months(&ctx, &upload_type),
            ReportCommands::Products { upload_type, ytd } => {
                cli::report::products(&ctx, &upload_type, ytd)
            }
            ReportCommands::Clients { upload_type } => cli::report::clients(&ctx, &upload_type),
            ReportCommands::Dashboard => cli::report::dashboard(&ctx),
        },
        Commands::Status => cli::status::run(&ctx),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

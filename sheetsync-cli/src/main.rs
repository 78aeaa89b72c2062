use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use sheetsync_cli::cli::commands::{records, workbook as workbook_commands};
use sheetsync_cli::cli::{Cli, Commands};
use sheetsync_cli::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    log::debug!("Using config: {:?}", config);

    match cli.command {
        Commands::Sheets(args) => workbook_commands::handle_sheets_command(args),
        Commands::Find(args) => workbook_commands::handle_find_command(args),
        Commands::Set(args) => workbook_commands::handle_set_command(args, &config),
        Commands::Append(args) => workbook_commands::handle_append_command(args, &config),
        Commands::CreateSheet(args) => {
            workbook_commands::handle_create_sheet_command(args, &config)
        }
        Commands::History(args) => workbook_commands::handle_history_command(args),
        Commands::Tables(args) => records::handle_tables_command(args, &config).await,
        Commands::ModifyRecords(args) => {
            records::handle_modify_records_command(args, &config).await
        }
    }
}

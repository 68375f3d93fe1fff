use anyhow::Result;
use clap::Parser;

use ingresos_etl::cli::commands::{
    handle_inspect_command, handle_key_command, handle_run_command, handle_schema_command,
};
use ingresos_etl::cli::{Cli, Commands};
use ingresos_etl::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => handle_run_command(config, args).await,
        Commands::Inspect(args) => handle_inspect_command(config, args).await,
        Commands::Key {
            concepto,
            fecha,
            cuarto,
        } => handle_key_command(&concepto, &fecha, &cuarto),
        Commands::Schema => handle_schema_command(&config),
    }
}

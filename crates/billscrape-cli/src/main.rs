mod commands;
mod loader;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEFAULT_TEMP_DIR: &str = "temp";

#[derive(Debug, Parser)]
#[command(name = "billscrape")]
#[command(about = "Postpaid electricity bill scraper")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape bills for every customer number in the input files
    Run {
        /// `.txt`, `.yaml` or `.yml` identifier files
        inputs: Vec<PathBuf>,
        /// Also read every supported file in this directory
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long, default_value = "output/data_tagihan_listrik_output.json")]
        output: PathBuf,
        /// Remove the token cache and temporary files once the report is written
        #[arg(long)]
        clean: bool,
        #[arg(long, default_value = DEFAULT_TEMP_DIR)]
        temp_dir: PathBuf,
    },
    /// Obtain an access token and report its age
    Token,
    /// Remove the token cache and temporary files
    Clean {
        #[arg(long, default_value = DEFAULT_TEMP_DIR)]
        temp_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = billscrape_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run {
            inputs,
            dir,
            output,
            clean,
            temp_dir,
        }) => {
            commands::run_batch(&config, inputs, dir.as_deref(), &output).await?;
            if clean {
                commands::clean(&config, &temp_dir)?;
            }
        }
        Some(Commands::Token) => commands::show_token(&config).await?,
        Some(Commands::Clean { temp_dir }) => commands::clean(&config, &temp_dir)?,
        None => println!("billscrape: use --help to list commands"),
    }

    Ok(())
}

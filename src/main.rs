use clap::{Parser, Subcommand, builder::styling};
use divvy_pipeline::cli;
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::Path;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Divvy Pipeline: uploads the Divvy trip CSVs to Cloud Storage and loads them into BigQuery
#[derive(Parser)]
#[command(name = "divvy", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute (defaults to run)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload both CSV files, then load them into BigQuery
    Run,

    /// Print the ordered steps without contacting any remote service
    Plan,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if Path::new(&cli.env).exists() {
        dotenvy::from_filename(&cli.env)?;
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    let settings = cli::load_settings()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            log::info!(
                "Running divvy pipeline from {} into bucket {}",
                settings.data_dir.display().bright_black(),
                settings.bucket.cyan()
            );
            let summary = cli::run_pipeline(&settings).await?;
            log::info!(
                "✓ Uploaded {} file(s), loaded {} row(s) in {} chunk(s)",
                summary.uploaded,
                summary.rows,
                summary.chunks
            );
        }
        Commands::Plan => {
            for (i, step) in cli::plan(&settings).iter().enumerate() {
                log::info!("{}. {}", i + 1, step.to_string().bright_black());
            }
        }
    }

    Ok(())
}

use clap::{Parser, Subcommand};

mod app;
mod research;
mod sessions;

#[derive(Debug, Parser)]
#[command(name = "kwlens")]
#[command(about = "Cross-product keyword research for competing ASINs")]
struct Cli {
    /// User namespace for stored sessions.
    #[arg(long, global = true, default_value = "local", env = "KWLENS_USER")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a research pass over 1-10 product ASINs (first is yours).
    Research(research::ResearchArgs),
    /// Manage stored research sessions.
    Sessions {
        #[command(subcommand)]
        command: sessions::SessionCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = kwlens_core::load_app_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    match cli.command {
        Commands::Research(args) => research::run(&config, &cli.user, args).await,
        Commands::Sessions { command } => sessions::run(&config, &cli.user, command).await,
    }
}

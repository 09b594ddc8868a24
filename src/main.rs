//! Credit risk scoring - main entry point

use clap::Parser;
use credit_risk::cli::{cmd_generate, cmd_predict, cmd_serve, cmd_train, show_help, Cli, Commands};
use credit_risk::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credit_risk=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train { synthetic, rows, model_path, reports_dir }) => {
            cmd_train(settings, synthetic, rows, model_path, reports_dir).await?;
        }
        Some(Commands::Serve { host, port, model_path }) => {
            cmd_serve(settings, host, port, model_path).await?;
        }
        Some(Commands::Generate { output, rows, seed }) => {
            cmd_generate(&output, rows, seed)?;
        }
        Some(Commands::Predict { input, model_path }) => {
            cmd_predict(settings, &input, model_path)?;
        }
        None => show_help(),
    }

    Ok(())
}

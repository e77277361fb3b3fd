//! autoreg - command-line entry point

use autoreg::cli::{cmd_info, cmd_predict, cmd_train, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoreg=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, target, filetype, params, config, output } => {
            cmd_train(
                &data,
                &target,
                filetype.as_deref(),
                &params,
                config.as_deref(),
                output.as_deref(),
            )?;
        }
        Commands::Predict { model, data, filetype, params, output } => {
            cmd_predict(&model, &data, filetype.as_deref(), &params, output.as_deref())?;
        }
        Commands::Info { data, filetype } => {
            cmd_info(&data, filetype.as_deref())?;
        }
    }

    Ok(())
}

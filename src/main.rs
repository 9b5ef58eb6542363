use campus_events::cli::{Cli, dispatch};
use campus_events::response::failure;
use campus_events::{EventManager, Settings, init_tracing};
use clap::Parser;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(database) = &cli.database {
        settings.database_url = database.clone();
    }
    init_tracing(&settings);

    let result = EventManager::from_settings(&settings)
        .and_then(|mut manager| dispatch(&mut manager, &cli.command, &settings));

    match result {
        Ok(reply) => {
            println!("{}", reply.render(cli.format)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            if err.kind() == campus_events::ErrorKind::Internal {
                tracing::error!(error = %err, "command failed");
            }
            let envelope = failure(&err, settings.exposes_internal_errors());
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

mod config;
mod db;
mod delete_venue;
mod util;
mod web;

use clap::{Parser, Subcommand};
use config::{Config, load as config_load, validate as config_validate};
use delete_venue::{
    ClickOutcome, Confirm, DeleteControl,
    console::{AssumeYes, ConsoleNavigator, TerminalConfirm},
    http::HttpVenueClient,
};
use std::process::ExitCode;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fyyur", version, about = "Venue listings and the tools around them")]
struct Options {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the venue API (the default)
    Serve,

    /// Ask for confirmation, then delete a venue on the configured server
    DeleteVenue {
        /// The venue id, sent as-is
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the UTC instant a loosely delimited timestamp stands for
    ParseTimestamp { input: String },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = Options::parse();

    if let Some(Command::ParseTimestamp { input }) = &options.command {
        return parse_timestamp(input);
    }

    let config = match config_load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = config_validate(&config) {
        eprintln!("Configuration error: {err}");
        return ExitCode::FAILURE;
    }

    match options.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config),
        Command::DeleteVenue { id, yes } => delete(&config, id, yes),
        Command::ParseTimestamp { input } => parse_timestamp(&input),
    }
}

fn serve(config: Config) -> ExitCode {
    info!(
        db_path = %config.database.path,
        bind = %config.web.bind,
        port = config.web.port,
        "Effective configuration loaded"
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_signal = Arc::clone(&running);

    if let Err(err) = ctrlc::set_handler(move || {
        info!("Ctrl-C received, shutting down gracefully");
        running_signal.store(false, Ordering::SeqCst);
    }) {
        error!(error = %err, "Failed to install Ctrl-C handler");
        return ExitCode::FAILURE;
    }

    info!("fyyur starting");

    match web::start(
        &config.database.path,
        &config.web.bind,
        config.web.port,
        running,
    ) {
        Ok(()) => {
            info!("fyyur stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "Web server failed");
            ExitCode::FAILURE
        }
    }
}

fn delete(config: &Config, id: String, yes: bool) -> ExitCode {
    let remover = match HttpVenueClient::new(&config.client) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %format!("{err:#}"), "Failed to set up HTTP client");
            return ExitCode::FAILURE;
        }
    };

    let navigator = match ConsoleNavigator::new(&config.client.base_url) {
        Ok(navigator) => navigator,
        Err(err) => {
            error!(error = %format!("{err:#}"), "Failed to set up navigator");
            return ExitCode::FAILURE;
        }
    };

    let confirm: Box<dyn Confirm> = if yes {
        Box::new(AssumeYes)
    } else {
        Box::new(TerminalConfirm)
    };

    let Some(binding) = delete_venue::bind(
        Some(DeleteControl::new(id)),
        confirm,
        Box::new(remover),
        Box::new(navigator),
    ) else {
        return ExitCode::FAILURE;
    };

    let outcome = binding.click();
    let control = binding.unbind();

    match outcome {
        Ok(ClickOutcome::Declined) => {
            info!(venue_id = %control.data_id, "Nothing deleted");
            ExitCode::SUCCESS
        }
        Ok(ClickOutcome::Deleted { status }) => {
            info!(
                venue_id = %control.data_id,
                status = status.as_u16(),
                "Venue delete request completed"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(
                error = %format!("{err:#}"),
                venue_id = %control.data_id,
                "Venue could not be deleted"
            );
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn parse_timestamp(input: &str) -> ExitCode {
    match render_timestamp(input) {
        Some(rendered) => {
            println!("{rendered}");
            ExitCode::SUCCESS
        }
        None => {
            println!("Invalid Date");
            ExitCode::FAILURE
        }
    }
}

fn render_timestamp(input: &str) -> Option<String> {
    util::parse_iso_string(input)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let options = Options::try_parse_from(["fyyur"]).unwrap();

        assert!(options.command.is_none());
    }

    #[test]
    fn delete_venue_takes_id_and_yes() {
        let options = Options::try_parse_from(["fyyur", "delete-venue", "17", "--yes"]).unwrap();

        match options.command {
            Some(Command::DeleteVenue { id, yes }) => {
                assert_eq!(id, "17");
                assert!(yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn renders_timestamp_as_rfc3339() {
        assert_eq!(
            render_timestamp("2023-05-17T08:09:10.123Z").as_deref(),
            Some("2023-05-17T08:09:10.123Z")
        );
        assert_eq!(render_timestamp("2023-05-17"), None);
    }
}

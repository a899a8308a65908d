use clap::Parser;
use serde::Serialize;

use firecast::api::{AppState, run_http_server};
use firecast::cli::{Cli, Command};
use firecast::config::AppConfig;
use firecast::core::CoreResult;
use firecast::logging::init_logging;

fn print_json<T: Serialize>(result: CoreResult<T>) {
    let rendered = result
        .map_err(|e| e.to_string())
        .and_then(|value| serde_json::to_string_pretty(&value).map_err(|e| e.to_string()));
    match rendered {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    let level = cli.log_level.unwrap_or_else(|| config.log.level.clone());
    init_logging(&level, cli.log_format.unwrap_or(config.log.format));

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Startup error: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Serve { port } => {
            if let Err(e) = run_http_server(state, port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Portfolio { top } => print_json(state.portfolio_report(top)),
        Command::Fire(args) => print_json(state.fire(&args)),
        Command::Growth(args) => print_json(state.growth(&args)),
        Command::FairValue { ticker } => print_json(state.fair_value(&ticker)),
        Command::Stock { ticker } => print_json(state.stock(&ticker)),
    }
}

#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use color_eyre::Result;

mod cli;
mod dispatch;

use cli::DrestCli;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = DrestCli::parse();
    init_tracing(cli.trace, cli.verbose);

    match dispatch::run(&cli) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            eprintln!("drest: {err:#}");
            std::process::exit(dispatch::exit_code(&err));
        }
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("drest={level},drest_core={level},drest_cli={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

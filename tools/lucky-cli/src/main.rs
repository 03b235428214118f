use std::process::ExitCode;

use clap::Parser;
use lucky_api_server::init_tracing;
use lucky_cli::{run, Cli};

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

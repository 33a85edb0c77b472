use std::process::ExitCode;

use h2p_client::{ClientConfig, LogSink, handshake};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    let args: Vec<String> = std::env::args().collect();
    let [_, locator] = args.as_slice() else {
        let program = args.first().map_or("h2p-client", String::as_str);
        println!("usage: {program} <http://host[:port][/path]>");
        return ExitCode::FAILURE;
    };

    match run(locator) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the connection ended cleanly.
fn run(locator: &str) -> anyhow::Result<bool> {
    let config = ClientConfig::default();
    let mut sink = LogSink::new();
    let outcome = handshake::run_with(locator.as_bytes(), &config, &mut sink)?;
    info!(
        status = sink.status().unwrap_or("-"),
        frames = sink.frames(),
        body_bytes = sink.body_len(),
        decoder_errors = sink.errors(),
        "done"
    );
    Ok(outcome.is_clean())
}

// src/main.rs

use std::process::ExitCode;

use within::{cli, config, logging, run};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let invocation = cli::parse();

    match run_main(invocation).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("within: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_main(invocation: cli::Invocation) -> anyhow::Result<ExitCode> {
    let settings = config::load_settings(invocation.config.as_deref())?;
    logging::init_logging(invocation.log_level, settings.log_level)?;

    let summary = run(&invocation, &settings).await?;
    Ok(summary.exit_code())
}

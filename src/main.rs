//! Verifier binary: resolves the run configuration from the environment, runs every stage and
//! exits non-zero on the first failure.

use sequencer_verifier::probes::SystemdHost;
use sequencer_verifier::runtime::{
    emit_run_config_status, parse_runtime_args, render_config_explanation, RunController,
    RunReport,
};
use sequencer_verifier::utils::config::RunConfig;
use sequencer_verifier::utils::env_guard::load_env_file;
use sequencer_verifier::utils::rpc::AlloyChainCaller;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let runtime_args = parse_runtime_args()?;
    let applied = load_env_file(&runtime_args.env_file);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if applied > 0 {
        tracing::info!(
            "[BOOT] loaded {} keys from {}",
            applied,
            runtime_args.env_file.display()
        );
    }

    let config = match RunConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("[BOOT] configuration rejected: {}", err);
            std::process::exit(1);
        }
    };
    emit_run_config_status(&config);
    if runtime_args.explain_config {
        print!("{}", render_config_explanation(&config));
        return Ok(());
    }

    let host = Arc::new(SystemdHost::from_target(config.host_ssh_target.as_deref()));
    let caller = Arc::new(AlloyChainCaller::new(config.timeouts.chain_call));
    let report_path = config.report_path.clone();
    let controller = RunController::new(config, host, caller);

    let mut report = RunReport::start();
    let outcome = controller.run(&mut report).await;
    report.log_summary();
    if let Some(path) = report_path {
        match report.write_to(Path::new(&path)) {
            Ok(()) => tracing::info!("[VERIFY] run report written to {}", path),
            Err(err) => tracing::warn!("[VERIFY] {}", err),
        }
    }

    if let Err(failure) = outcome {
        tracing::error!("[VERIFY] {}", failure);
        std::process::exit(1);
    }
    Ok(())
}

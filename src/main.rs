use anyhow::Result;
use rinkload::{config::PipelineConfig, pipeline};
use std::{env, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    // usage: rinkload [CONFIG]
    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("RINKLOAD_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("rinkload.yaml"));
    let config = PipelineConfig::load(&config_path)?;
    info!(config = %config_path.display(), datasets = config.datasets.len(), "loaded config");

    // ─── 3) run every dataset ────────────────────────────────────────
    let report = pipeline::run(&config);

    for ds in &report.datasets {
        info!(table = %ds.table, status = ?ds.status, warnings = ds.warnings.len(), "summary");
        for w in &ds.warnings {
            warn!(table = %ds.table, "{}", w);
        }
    }
    let failed = report.failed().count();
    if failed > 0 {
        warn!(failed, "some datasets failed, see log above");
    }

    info!("all done");
    Ok(())
}

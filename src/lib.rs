pub mod agent_engine;
pub mod config;
pub mod device;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod protocol;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::agent_engine::{AgentConfig, AgentModels, PhoneAgent};
use crate::config::{AppConfig, LoggingConfig};
use crate::device::DeviceDriver;
use crate::errors::PhoneClawResult;
use crate::executor::safety::Interaction;
use crate::llm::registry::ProviderRegistry;

/// Installs the global subscriber: console always, plus a
/// `phoneclaw-YYYYMMDD-HHMMSS.log` file when enabled. Keep the returned guard
/// alive for the life of the process or buffered file output is lost.
pub fn init_tracing(logging: &LoggingConfig) -> PhoneClawResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer().with_target(false);

    let (file_layer, guard, path) = if logging.file {
        let dir = logging.dir.clone().unwrap_or_else(default_log_dir);
        std::fs::create_dir_all(&dir)?;
        let name = format!("phoneclaw-{}.log", chrono::Local::now().format("%Y%m%d-%H%M%S"));
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, &name));
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard), Some(dir.join(name)))
    } else {
        (None, None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    if let Some(path) = path {
        tracing::info!(path = %path.display(), "file logging enabled");
    }
    Ok(guard)
}

/// `logs/` next to the executable, or in the working directory.
fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Wires config, model clients, device and prompts into a ready agent.
/// Streaming thinking text goes to `thinking_sink` when one is given.
pub fn build_agent(
    config: &AppConfig,
    device: Arc<dyn DeviceDriver>,
    interaction: Arc<dyn Interaction>,
    thinking_sink: Option<mpsc::UnboundedSender<String>>,
) -> PhoneClawResult<PhoneAgent> {
    let mut registry = ProviderRegistry::from_config(&config.llm);
    if let Some(sink) = thinking_sink {
        registry = registry.with_thinking_sink(sink);
    }
    tracing::debug!(providers = ?registry.list_names(), mode = %config.agent.mode, "building agent");
    let models = AgentModels::from_registry(&registry, config.agent.mode)?;
    Ok(PhoneAgent::new(
        AgentConfig::from(&config.agent),
        models,
        device,
        interaction,
    ))
}

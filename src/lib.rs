pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

#[cfg(test)]
pub(crate) mod test_support;

use crate::agent_engine::confirmation::TerminalGate;
use crate::agent_engine::engine::{AgentEngine, EngineDeps};
use crate::agent_engine::loop_control::AbortHandle;
use crate::agent_engine::state::RunOutcome;
use crate::config::AppConfig;
use crate::errors::GridPilotResult;
use crate::executor::input::EnigoDriver;
use crate::llm::registry::ProviderRegistry;
use crate::perception::screenshot::PrimaryMonitor;

/// Install the global fmt subscriber. `RUST_LOG` wins; default level is `info`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Wire the real screen, input backend, model and terminal gate, then run `task`.
///
/// Fails only during startup (missing credentials, no input backend); the
/// run itself always yields an outcome.
pub async fn run_task(task: &str, config: &AppConfig, abort: AbortHandle) -> GridPilotResult<RunOutcome> {
    let registry = ProviderRegistry::from_config(config)?;
    let (provider, call) = registry.vision()?;
    tracing::info!(provider = %provider.name(), model = %call.model, "vision model resolved");

    let deps = EngineDeps {
        screen: Box::new(PrimaryMonitor::new()),
        driver: Box::new(EnigoDriver::new()?),
        provider,
        call,
        gate: Box::new(TerminalGate::new()),
    };
    let mut engine = AgentEngine::new(task, config, deps, abort);
    Ok(engine.run().await)
}

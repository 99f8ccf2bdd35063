mod events;

use std::process::ExitCode;
use std::sync::Arc;

use events::ServerEvent;
use tripwire_engine::{EngineConfig, WorkflowEngine};
use tripwire_nodes::{builtin_registry, LogMessageSink};

/// Optional JSON configuration file; environment overrides apply otherwise
const CONFIG_ENV: &str = "TRIPWIRE_CONFIG";

fn main() -> ExitCode {
    // Initialize logging - RUST_LOG overrides the default filter
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("Tripwire starting...");

    let config = load_config();
    let palette = std::env::args().any(|arg| arg == "--palette");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tripwire")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config, palette)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Tripwire stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> EngineConfig {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => match EngineConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load {}, using environment: {}", path, e);
                EngineConfig::from_env()
            }
        },
        Err(_) => EngineConfig::from_env(),
    }
}

async fn run(config: EngineConfig, palette: bool) -> tripwire_engine::Result<()> {
    let registry = builtin_registry(Arc::new(LogMessageSink))?;
    let engine = WorkflowEngine::builder(config).registry(registry).build()?;
    events::register_event_types(&engine);

    if palette {
        println!("{}", serde_json::to_string_pretty(&engine.node_types())?);
        return Ok(());
    }

    // A broken persisted graph must not take the host down
    if let Err(e) = engine.load_from_store() {
        log::error!("Failed to load workflow: {}", e);
    }

    engine.fire(ServerEvent::Started, true);
    engine.fire(ServerEvent::Started, false);

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down...");

    engine.fire(ServerEvent::Stopping, true);
    if !engine.shutdown().await {
        log::warn!("Worker pool did not drain within {:?}", engine.config().drain_timeout());
    }
    log::info!("Tripwire stopped");
    Ok(())
}

//! Orchestrator daemon entry point: parses CLI flags in the same style as
//! `eva-executive`, optionally supervises the Executive and Detector child
//! processes (startup order Executive → Detector → Orchestrator per spec
//! §4.6), then serves the UI-facing HTTP + WebSocket surface.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use eva_common::OrchestratorConfig;
use eva_orchestrator::alert_debouncer::AlertDebouncer;
use eva_orchestrator::frame_router::FrameRouter;
use eva_orchestrator::state::OrchestratorState;
use eva_orchestrator::tts::{HttpSynthesizer, MockSynthesizer, Synthesizer, TtsCache};
use eva_orchestrator::{detector_client, router, supervisor};
use tokio::sync::Mutex;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    config_path: Option<PathBuf>,
    port: Option<u16>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args { config_path: None, port: None };
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("eva-orchestrator {}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("USAGE:");
                println!("    eva-orchestrator [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --config <PATH>         JSON config document");
                println!("    --port <PORT>           Override config.server.port");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                Log level filter (e.g., debug, info, warn, error)");
                println!("    EVA_ORCH_PORT, EVA_EXECUTIVE_BASE_URL, EVA_DETECTOR_WS_URL, EVA_TTS_ENDPOINT");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("eva-orchestrator {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    eprintln!("error: --config requires a path argument");
                    std::process::exit(1);
                };
                parsed.config_path = Some(PathBuf::from(path));
            }
            "--port" => {
                i += 1;
                let Some(raw) = args.get(i) else {
                    eprintln!("error: --port requires a value");
                    std::process::exit(1);
                };
                match raw.parse() {
                    Ok(p) => parsed.port = Some(p),
                    Err(_) => {
                        eprintln!("error: --port expects a number, got '{raw}'");
                        std::process::exit(1);
                    }
                }
            }
            arg => {
                eprintln!("error: unknown argument '{arg}'");
                eprintln!("Try 'eva-orchestrator --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

/// Runs the server loop to completion with whichever [`Synthesizer`] the
/// environment selected — generic so the HTTP-backed and mock synthesizers
/// share one startup path instead of duplicating router/state wiring.
async fn serve<S: Synthesizer + 'static>(config: OrchestratorConfig, synthesizer: S) {
    let state = OrchestratorState {
        config: Arc::new(config.clone()),
        http: reqwest::Client::new(),
        synthesizer: Arc::new(synthesizer),
        frame_router: Arc::new(FrameRouter::new(config.frame_route_ttl_ms)),
        debouncer: Arc::new(AlertDebouncer::new(config.alerts.dedupe_window_ms, config.alerts.cooldown_ms)),
        ui: Arc::new(Mutex::new(None)),
        detector_tx: Arc::new(Mutex::new(None)),
        detector_connected: Arc::new(AtomicBool::new(false)),
        tts_cache: Arc::new(TtsCache::new(config.speech.cache_capacity)),
        start_time: Instant::now(),
    };

    detector_client::spawn(state.clone());

    let app = router::build_router(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.server.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind orchestrator listener");
            std::process::exit(1);
        }
    };

    info!(%addr, "eva-orchestrator listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "eva-orchestrator server exited with error");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_target(false)
        .init();

    let mut config = match &args.config_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(doc) => OrchestratorConfig::from_str(&doc).unwrap_or_else(|e| {
                error!(error = %e, path = %path.display(), "invalid config document; using defaults");
                OrchestratorConfig::default()
            }),
            Err(e) => {
                error!(error = %e, path = %path.display(), "could not read config file; using defaults");
                OrchestratorConfig::default()
            }
        },
        None => OrchestratorConfig::default(),
    }
    .apply_env_overrides();

    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!(port = config.server.port, executive = %config.executive_base_url, "eva-orchestrator starting");

    // Startup order per spec §4.6: Executive, then Detector, then (implicitly,
    // by virtue of being this process) the Orchestrator itself. Each is a
    // no-op when its `supervisor.*.enabled` is false — the common case where
    // an operator runs the daemons out-of-band.
    let executive_proc = match supervisor::start("executive", &config.supervisor.executive).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to start supervised executive process");
            std::process::exit(1);
        }
    };
    let detector_proc = match supervisor::start("detector", &config.supervisor.detector).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to start supervised detector process");
            std::process::exit(1);
        }
    };

    match HttpSynthesizer::from_env() {
        Some(synth) => serve(config.clone(), synth).await,
        None => {
            info!("EVA_TTS_ENDPOINT is not set; /speech will serve silence via a no-op synthesizer");
            serve(config.clone(), MockSynthesizer { bytes: Vec::new() }).await
        }
    }

    // Reverse shutdown order per spec §4.6: Detector, then Executive.
    if let Some(proc) = detector_proc {
        supervisor::stop(proc, config.supervisor.detector.shutdown_timeout_ms).await;
    }
    if let Some(proc) = executive_proc {
        supervisor::stop(proc, config.supervisor.executive.shutdown_timeout_ms).await;
    }
}

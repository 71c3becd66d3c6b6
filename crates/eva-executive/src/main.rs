//! Executive daemon entry point: parses CLI flags in the teacher's
//! `parse_args()` style, loads configuration, opens every store named in the
//! memory directory's filesystem layout, and serves the five HTTP endpoints.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use eva_common::{Config, TagWhitelist, TraceLogger, TraceLoggerConfig};
use eva_executive::jobs::JobsState;
use eva_executive::state::AppState;
use eva_executive::{persona, router, scheduler};
use eva_memory::{SemanticStore, SerialWriteQueue, ShortTermStore, ToneCache, VectorStore, WorkingLog};
use eva_model::HttpModelClient;
use tokio::sync::Mutex;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    config_path: Option<PathBuf>,
    memory_dir: Option<PathBuf>,
    port: Option<u16>,
}

/// Hand-rolled flag parsing, mirroring the teacher's `--data-dir` / `--help` /
/// `--version` convention rather than pulling in a CLI-parsing crate for three
/// flags.
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args { config_path: None, memory_dir: None, port: None };
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("eva-executive {}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("USAGE:");
                println!("    eva-executive [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --config <PATH>         JSON config document");
                println!("    --memory-dir <PATH>     Override config.memory.dir");
                println!("    --port <PORT>           Override config.server.port");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                Log level filter (e.g., debug, info, warn, error)");
                println!("    EVA_SERVER_PORT, EVA_MEMORY_DIR");
                println!("    EVA_MODEL_ENDPOINT, EVA_MODEL_PROVIDER, EVA_MODEL_ID, EVA_MODEL_API_KEY, EVA_MODEL_MAX_TOKENS");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("eva-executive {}", env!("CARGO_PKG_VERSION"));
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
            "--memory-dir" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    eprintln!("error: --memory-dir requires a path argument");
                    std::process::exit(1);
                };
                parsed.memory_dir = Some(PathBuf::from(path));
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
                eprintln!("Try 'eva-executive --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
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
            Ok(doc) => Config::from_str(&doc).unwrap_or_else(|e| {
                error!(error = %e, path = %path.display(), "invalid config document; using defaults");
                Config::default()
            }),
            Err(e) => {
                error!(error = %e, path = %path.display(), "could not read config file; using defaults");
                Config::default()
            }
        },
        None => Config::default(),
    }
    .apply_env_overrides();

    if let Some(dir) = args.memory_dir {
        config.memory.dir = dir;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!(port = config.server.port, memory_dir = %config.memory.dir.display(), "eva-executive starting");

    let memory_dir = config.memory.dir.clone();
    if let Err(e) = std::fs::create_dir_all(&memory_dir) {
        error!(error = %e, "failed to create memory directory");
        std::process::exit(1);
    }

    let persona_text = Arc::new(persona::load_persona(&memory_dir));
    let whitelist: Arc<TagWhitelist> = Arc::new(persona::load_tag_whitelist(&memory_dir));

    let working_log = Arc::new(WorkingLog::new(memory_dir.join("working_memory.log")));
    let short_term = match ShortTermStore::open(&memory_dir.join("short_term_memory.db")) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to open short-term store");
            std::process::exit(1);
        }
    };
    let semantic = match SemanticStore::open(&memory_dir.join("long_term_memory_db").join("semantic_memory.db")) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to open semantic store");
            std::process::exit(1);
        }
    };
    let vector = match VectorStore::open(&memory_dir.join("long_term_memory_db").join("lancedb")).await {
        Ok(v) => Arc::new(v),
        Err(e) => {
            error!(error = %e, "failed to open vector store");
            std::process::exit(1);
        }
    };

    let cache_dir = memory_dir.join("cache");
    if let Err(e) = std::fs::create_dir_all(&cache_dir) {
        error!(error = %e, "failed to create cache directory");
        std::process::exit(1);
    }
    let tone_cache = Arc::new(Mutex::new(ToneCache::load(cache_dir.join("personality_tone.json"))));

    let model = match HttpModelClient::from_env() {
        Some(m) => Arc::new(m),
        None => {
            error!("EVA_MODEL_ENDPOINT is not set; eva-executive requires a configured model endpoint");
            std::process::exit(1);
        }
    };

    let trace = Arc::new(TraceLogger::with_hot_reload(
        memory_dir.join("trace_config.json"),
        TraceLoggerConfig {
            path: memory_dir.join("trace.jsonl"),
            ..TraceLoggerConfig::default()
        },
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        model,
        queue: Arc::new(SerialWriteQueue::new()),
        working_log,
        short_term,
        semantic,
        vector,
        tone_cache,
        whitelist,
        persona: persona_text,
        trace,
        jobs: Arc::new(JobsState::new()),
        last_insight_request_at_ms: Arc::new(Mutex::new(None)),
        assets_dir: Arc::new(memory_dir.join("working_memory_assets")),
        cache_dir: Arc::new(cache_dir),
        start_time: Instant::now(),
    };

    scheduler::spawn(state.clone());

    let app = router::build_router(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.server.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, %addr, "failed to bind executive listener");
            std::process::exit(1);
        }
    };

    info!(%addr, "eva-executive listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "eva-executive server exited with error");
        std::process::exit(1);
    }
}

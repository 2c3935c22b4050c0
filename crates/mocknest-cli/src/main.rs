use clap::{Args, Parser, Subcommand};
use mocknest_core::{ProxyForwarder, ServerConfig, TlsConfig};
use mocknest_http::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod loader;
mod watch;

#[derive(Parser)]
#[command(name = "mocknest")]
#[command(about = "Mocknest - programmable HTTP/WebSocket/SSE mock server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(short = 'v', long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the mock server
    Serve(ServeArgs),
    /// Validate a mock catalog and exit
    Validate {
        /// Catalog file or directory
        #[arg(short, long)]
        mocks: PathBuf,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Listening TCP port
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Mock catalog file or directory
    #[arg(short, long)]
    mocks: Option<PathBuf>,

    /// Upstream base URL for unmatched requests (enables proxy fallback)
    #[arg(long)]
    proxy_target: Option<String>,

    /// Path to TLS certificate file (PEM)
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM)
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Enable a permissive CORS layer
    #[arg(long)]
    cors: bool,

    /// Scenario active at startup
    #[arg(long)]
    scenario: Option<String>,

    /// Trace ring capacity
    #[arg(long, default_value_t = 1000)]
    trace_limit: usize,

    /// Watch the catalog path and hot reload on change
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&cli.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let code = match cli.command {
        Commands::Serve(args) => match run_serve(args).await {
            Ok(()) => 0,
            Err(e) => {
                error!("startup failed: {}", e);
                1
            }
        },
        Commands::Validate { mocks } => match loader::load_records(&mocks) {
            Ok(records) => {
                info!("catalog is valid: {} mocks", records.len());
                0
            }
            Err(e) => {
                error!("catalog is invalid: {}", e);
                1
            }
        },
    };
    std::process::exit(code);
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    mocknest_data::install();

    let records = match &args.mocks {
        Some(path) => loader::load_records(path)?,
        None => {
            info!("no catalog given; starting with an empty mock set");
            Vec::new()
        }
    };

    let mut state = AppState::new(records, args.trace_limit);

    if let Some(scenario) = &args.scenario {
        state = state.with_initial_scenario(scenario);
        info!("initial scenario: {}", scenario);
    }

    if let Some(target) = &args.proxy_target {
        state = state.with_proxy(ProxyForwarder::new(target.clone())?);
        info!("proxy fallback enabled toward {}", target);
    }

    if let Some(path) = args.mocks.clone() {
        let store = state.store.clone();
        let watch_path = path.clone();
        let reload: mocknest_http::ReloadFn = Arc::new(move || {
            let records = loader::load_records(&path)?;
            Ok(store.swap(records))
        });
        state = state.with_reload(reload.clone());

        if args.watch {
            watch::spawn(watch_path, reload);
        }
    }

    let tls = match (args.tls_cert, args.tls_key) {
        (Some(cert_file), Some(key_file)) => Some(TlsConfig {
            cert_file,
            key_file,
        }),
        _ => None,
    };

    let config = ServerConfig {
        port: args.port,
        mocks_path: args.mocks,
        proxy_target: args.proxy_target,
        cors_enabled: args.cors,
        tls,
        initial_scenario: args.scenario,
        trace_limit: args.trace_limit,
        watch: args.watch,
    };

    mocknest_http::serve(&config, state)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

//! searchgate — entry point.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use searchgate_analytics::{AnalyticsRecorder, DisabledGeo, GeoLookup, Recorder};
use searchgate_core::{GatewayResult, Principal, User};
use searchgate_gateway::backend::AnalyticsIndexSink;
use searchgate_gateway::plugins::{PermissionsPlugin, SearchPlugin, UsersPlugin};
use searchgate_gateway::{
    EsBackend, EsPrincipalStore, Gateway, GatewayConfig, GatewayServer, PluginRegistry,
    PrincipalStore, SearchBackend,
};

struct Args {
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("searchgate {}", searchgate_gateway::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"searchgate - authenticating reverse proxy for a search cluster

USAGE:
    searchgate [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    ES_CLUSTER_URL            Upstream cluster base URL (required)
    USERNAME / PASSWORD       Bootstrap admin principal created on first run
    SEARCHGATE_LISTEN_ADDR    Listen address (default: 0.0.0.0)
    SEARCHGATE_LISTEN_PORT    Listen port (default: 8000)

EXAMPLES:
    ES_CLUSTER_URL=http://localhost:9200 USERNAME=admin PASSWORD=admin searchgate
    searchgate --config /etc/searchgate/gateway.toml
"
    );
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "searchgate=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let args = Args::parse();

    let config = match args.config {
        Some(path) => {
            info!("loading configuration from {:?}", path);
            match GatewayConfig::from_file(&path) {
                Ok(config) => config.with_env_overrides(),
                Err(e) => {
                    error!("failed to load configuration: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => GatewayConfig::default().with_env_overrides(),
    };

    if let Err(e) = config.validate() {
        error!("invalid configuration: {e}");
        std::process::exit(1);
    }

    info!("starting searchgate v{}", searchgate_gateway::VERSION);
    info!("upstream: {}", config.upstream.url);

    if let Err(e) = run(config).await {
        error!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run(config: GatewayConfig) -> GatewayResult<()> {
    let backend: Arc<dyn SearchBackend> = Arc::new(EsBackend::new(
        config.upstream.url.clone(),
        config.upstream.timeout,
    )?);

    if config.upstream.strict_startup {
        backend.ping().await?;
        info!("upstream cluster reachable");
    }

    let store = Arc::new(EsPrincipalStore::new(
        backend.clone(),
        config.principals.index.clone(),
    ));

    if let Err(e) = bootstrap_admin(store.as_ref(), &config).await {
        if config.upstream.strict_startup {
            return Err(e);
        }
        warn!("bootstrap admin not created: {e}");
    }

    let geo: Arc<dyn GeoLookup> = Arc::new(DisabledGeo);
    let sink = Arc::new(AnalyticsIndexSink::new(
        backend.clone(),
        config.analytics.index.clone(),
    ));
    let analytics = AnalyticsRecorder::spawn(sink, geo, config.analytics.to_analytics_config());

    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(UsersPlugin::new(store.clone())));
    registry.register(Arc::new(PermissionsPlugin::new(store.clone())));
    registry.register(Arc::new(SearchPlugin::new(
        backend.clone(),
        Recorder::new(analytics),
    )));
    registry.init_all()?;

    let gateway = Arc::new(Gateway::new(&registry, store));
    info!(routes = gateway.route_count(), "gateway assembled");

    GatewayServer::new(config, gateway).run().await
}

/// Creates the configured admin principal when it does not exist yet.
async fn bootstrap_admin(store: &EsPrincipalStore, config: &GatewayConfig) -> GatewayResult<()> {
    let (Some(username), Some(password)) = (
        config.principals.bootstrap_username.as_deref(),
        config.principals.bootstrap_password.as_deref(),
    ) else {
        return Ok(());
    };

    if store.get(username).await?.is_some() {
        return Ok(());
    }

    store
        .create(&Principal::User(User::admin(username, password)))
        .await?;
    info!(username, "bootstrap admin principal created");
    Ok(())
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router as AxumRouter;
use clap::Parser;
use relay_admin::handlers;
use relay_admin::AdminState;
use relay_core::config::{CacheBackend, HandlerType, RelayConfig, RouterRuleFile};
use relay_core::descriptor::PluginDescriptor;
use relay_plugin::{HandlerBuilder, PluginManager, StepBuildOptions};
use relay_proxy::ReverseProxyDispatcher;
use relay_store::RegistryClient;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Relay — adapter/gateway for Beckn-style commerce networks")]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "/etc/relay/relay.yaml")]
    config: PathBuf,

    /// Overrides `log.level` from the config file.
    #[arg(long)]
    log_level: Option<String>,

    /// Path to the router rule file referenced by router-bound plugins.
    #[arg(long, default_value = "router-rules.yaml")]
    router_rules: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = RelayConfig::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("fatal: failed to load config: {e}");
        std::process::exit(1);
    });

    relay_observability::init_tracing(cli.log_level.as_deref().unwrap_or(&config.log.level));
    info!(app = %config.app_name, version = env!("CARGO_PKG_VERSION"), "relay starting");

    let metrics = Arc::new(relay_observability::MetricsCollector::new().unwrap_or_else(|e| {
        error!(error = %e, "failed to construct metrics collector");
        std::process::exit(1);
    }));

    let manager = Arc::new(PluginManager::new());
    for descriptor in &config.plugin_manager.plugins {
        register_plugin(&manager, descriptor);
    }

    let cache_plugin_id = default_cache_plugin_id(&config);
    let cache = manager
        .instantiate(&cache_plugin_id, &plugin_config(&config, &cache_plugin_id))
        .await
        .unwrap_or_else(|e| fatal(&format!("failed to instantiate cache plugin {cache_plugin_id:?}: {e}")))
        .as_cache()
        .unwrap_or_else(|| fatal(&format!("plugin {cache_plugin_id:?} bound as cache does not provide Cache")));

    let registry_url = config.modules.iter().find_map(|m| m.handler.registry_url.clone());
    let registry_client = Arc::new(RegistryClient::new(registry_url.clone().unwrap_or_default()));

    let key_manager_provider = Arc::new(relay_plugins::KeyManagerProvider::new(
        Arc::clone(&cache),
        registry_url.map(|_| Arc::clone(&registry_client)),
    ));
    manager.register("__key-manager", key_manager_provider);
    let key_manager = manager
        .instantiate("__key-manager", &HashMap::new())
        .await
        .unwrap_or_else(|e| fatal(&format!("failed to instantiate key manager: {e}")))
        .as_key_manager()
        .unwrap_or_else(|| fatal("internal key-manager registration did not yield a KeyManager"));

    let publisher = find_publisher_plugin(&config).map(|id| async {
        manager
            .instantiate(&id, &plugin_config(&config, &id))
            .await
            .ok()
            .and_then(|cap| cap.as_publisher())
    });
    let publisher = match publisher {
        Some(fut) => fut.await,
        None => None,
    };
    let dispatcher: Arc<dyn relay_plugin::dispatch::RoutingDispatcher> =
        Arc::new(ReverseProxyDispatcher::new(reqwest::Client::new(), publisher));

    let step_opts = StepBuildOptions {
        enforce_signature_expiry: config.signing.enforce_signature_expiry,
    };

    let admin_state = Arc::new(AdminState {
        cache: Arc::clone(&cache),
        key_manager: Arc::clone(&key_manager),
        registry_client: Arc::clone(&registry_client),
        subscriber_ttl_floor_hours: config.cache.subscriber_ttl_floor_hours,
        metrics: Arc::clone(&metrics),
    });

    let mut std_router: AxumRouter<()> = AxumRouter::new();
    let mut admin_router: AxumRouter<Arc<AdminState>> = AxumRouter::new()
        .route("/healthz", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics_handler));

    for module in &config.modules {
        let descriptors: HashMap<String, HashMap<String, String>> =
            config.plugin_manager.plugins.iter().map(|d| (d.id.clone(), d.config.clone())).collect();

        match module.handler.handler_type {
            HandlerType::Std => {
                let builder = HandlerBuilder::new(
                    Arc::clone(&manager),
                    relay_plugins::builtin_step_factories(),
                    Some(Arc::clone(&dispatcher)),
                    step_opts,
                    descriptors,
                );
                let handler = builder
                    .build(&module.handler)
                    .await
                    .unwrap_or_else(|e| fatal(&format!("failed to build module {:?}: {e}", module.name)));
                let handler = Arc::new(handler);
                std_router = std_router.route(
                    &module.path,
                    post(move |req: axum::extract::Request| {
                        let handler = Arc::clone(&handler);
                        async move { handler.serve(req).await }
                    }),
                );
            }
            HandlerType::RegSub => {
                admin_router = admin_router.route(&module.path, axum::routing::any(handlers::reg_sub::handle));
            }
            HandlerType::NpSub => {
                admin_router = admin_router.route(&module.path, axum::routing::any(handlers::np_sub::handle));
            }
            HandlerType::LookUp => {
                admin_router = admin_router.route(&module.path, axum::routing::any(handlers::lookup::handle));
            }
        }
        info!(module = %module.name, path = %module.path, "module mounted");
    }

    if cli.router_rules.exists() {
        let _ = RouterRuleFile::load(&cli.router_rules);
    }

    let app = std_router.merge(admin_router.with_state(admin_state));

    let addr = format!("0.0.0.0:{}", config.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        fatal(&format!("failed to bind {addr}: {e}"));
    });
    info!(addr = %addr, "listening");

    let server = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        error!(error = %e, "server exited with error");
    }

    info!("draining complete, releasing plugins");
    manager.release_all().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining in-flight requests");
}

fn register_plugin(manager: &PluginManager, descriptor: &PluginDescriptor) {
    let id = descriptor.id.as_str();
    let provider: Option<Arc<dyn relay_plugin::Provider>> = match id {
        "ed25519-signer" => Some(Arc::new(relay_plugins::Ed25519SignerProvider)),
        "ed25519-sign-validator" => Some(Arc::new(relay_plugins::Ed25519SignValidatorProvider)),
        "json-schema-validator" => Some(Arc::new(relay_plugins::SchemaValidatorProvider)),
        "exact-match-router" => Some(Arc::new(relay_plugins::RouterProvider)),
        "logging-publisher" => Some(Arc::new(relay_plugins::LoggingPublisherProvider)),
        "memory-cache" => Some(Arc::new(relay_store::InMemoryCacheProvider)),
        #[cfg(feature = "etcd")]
        "etcd-cache" => Some(Arc::new(relay_store::EtcdCacheProvider)),
        other => {
            error!(plugin = other, "unrecognized plugin id in plugin_manager.plugins");
            None
        }
    };
    match provider {
        Some(provider) => manager.register(id, provider),
        None => std::process::exit(1),
    }
}

fn default_cache_plugin_id(config: &RelayConfig) -> String {
    match config.cache.backend {
        CacheBackend::Memory => "memory-cache".to_string(),
        CacheBackend::Etcd => "etcd-cache".to_string(),
    }
}

fn plugin_config(config: &RelayConfig, id: &str) -> HashMap<String, String> {
    config
        .plugin_manager
        .plugins
        .iter()
        .find(|d| d.id == id)
        .map(|d| d.config.clone())
        .unwrap_or_else(|| match id {
            "etcd-cache" => {
                let mut cfg = HashMap::new();
                cfg.insert("endpoints".to_string(), config.cache.etcd.endpoints.join(","));
                cfg.insert("prefix".to_string(), config.cache.etcd.prefix.clone());
                cfg
            }
            _ => HashMap::new(),
        })
}

fn find_publisher_plugin(config: &RelayConfig) -> Option<String> {
    config.modules.iter().find_map(|m| m.handler.plugins.publisher.clone())
}

fn fatal(message: &str) -> ! {
    error!("{message}");
    std::process::exit(1);
}

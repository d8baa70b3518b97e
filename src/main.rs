use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stx_chat::api;
use stx_chat::backend::{load_catalog, BackendContext, ReqwestTransport};
use stx_chat::config::{ClusterConfig, Config};
use stx_chat::registry::InstanceRegistry;
use stx_chat::retrieval::{Embedder, HashingEmbedder};
use stx_chat::models::ModelConfig;
use stx_chat::session::{run_terminal_chat, spawn_eviction, SessionController, SessionStore};

#[derive(Parser)]
#[command(name = "stx-chat")]
#[command(about = "Chat with the live state of a StarlingX distributed cloud")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port for HTTP API
        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// Subclouds manifest (overrides SUBCLOUDS_MANIFEST)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
    /// Chat from the terminal until `exit`
    Chat {
        /// Subclouds manifest (overrides SUBCLOUDS_MANIFEST)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Chat model
        #[arg(long)]
        model: Option<String>,

        /// Sampling temperature (0 to 2)
        #[arg(long)]
        temperature: Option<String>,
    },
    /// Print the registered cluster instances and exit
    Instances {
        /// Subclouds manifest (overrides SUBCLOUDS_MANIFEST)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "stx_chat=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(manifest: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(path) = manifest {
        config.cluster.manifest_path = path;
    }
    Ok(config)
}

/// Wire the model client, registry and backends into a controller.
async fn build_controller(config: &Config, store: SessionStore) -> anyhow::Result<SessionController> {
    let openai = Arc::new(config.openai_client()?);
    openai
        .validate_key()
        .await
        .context("the provided OpenAI API key is not valid")?;

    let embedder: Arc<dyn Embedder> = if config.uses_hashing_embedder() {
        tracing::info!("Using offline hashing embeddings");
        Arc::new(HashingEmbedder::default())
    } else {
        openai.clone()
    };

    let registry = Arc::new(InstanceRegistry::from_config(&config.cluster));
    tracing::info!("Registered {} cluster instance(s)", registry.len());

    let backends = BackendContext {
        transport: Arc::new(ReqwestTransport::new(&config.tls, config.request_timeout)?),
        llm: openai,
        platform_auth: config.platform.clone(),
        platform_catalog: load_catalog(config.platform_catalog.as_deref()),
    };

    Ok(SessionController::new(store, registry, embedder, backends))
}

async fn serve(host: String, port: u16, manifest: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(manifest)?;
    tracing::debug!(?config, "Loaded configuration");

    let store = SessionStore::new();
    spawn_eviction(store.clone(), config.session_idle_ttl);

    let controller = Arc::new(build_controller(&config, store).await?);
    let app = api::create_router(controller);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("stx-chat server listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn chat(
    manifest: Option<PathBuf>,
    model: Option<String>,
    temperature: Option<String>,
) -> anyhow::Result<()> {
    let model = ModelConfig::from_headers(model.as_deref(), temperature.as_deref())
        .map_err(anyhow::Error::msg)?;
    let config = load_config(manifest)?;
    let controller = build_controller(&config, SessionStore::new()).await?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let answered = run_terminal_chat(&controller, model, stdin, tokio::io::stdout()).await?;
    tracing::info!("Terminal chat ended after {} answer(s)", answered);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve {
            host,
            port,
            manifest,
        }) => serve(host, port, manifest).await,
        Some(Commands::Chat {
            manifest,
            model,
            temperature,
        }) => chat(manifest, model, temperature).await,
        Some(Commands::Instances { manifest }) => {
            let mut cluster = ClusterConfig::from_env().context("invalid configuration")?;
            if let Some(path) = manifest {
                cluster.manifest_path = path;
            }
            let registry = InstanceRegistry::from_config(&cluster);
            for instance in registry.list_instances() {
                println!(
                    "{}\t{}\t{}",
                    instance.name,
                    instance.node_type.as_str(),
                    instance.base_url
                );
            }
            Ok(())
        }
        None => serve("0.0.0.0".to_string(), 5000, None).await,
    }
}

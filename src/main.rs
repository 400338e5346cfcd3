use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::{info, warn};
use std::path::PathBuf;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use pow_ledger::api::{self, ApiDoc};
use pow_ledger::blockchain::storage::open_store;
use pow_ledger::blockchain::Blockchain;
use pow_ledger::config::Config;

// Load the persisted ledger, or create one with a genesis block
fn initialize_blockchain(config: &Config) -> anyhow::Result<Blockchain> {
    let store = open_store(&config.storage)
        .with_context(|| format!("failed to open store at {}", config.storage.path.display()))?;

    let blockchain = Blockchain::with_storage(&config.ledger, store)
        .context("failed to load ledger from storage")?;

    info!(
        "Ledger ready: {} blocks, difficulty {}, rewards to {}",
        blockchain.get_chain().len(),
        blockchain.difficulty(),
        blockchain.owner()
    );
    Ok(blockchain)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("failed to load configuration")?;

    let blockchain = web::Data::new(initialize_blockchain(&config)?);

    // Abort any in-flight proof search on Ctrl-C
    let watcher = blockchain.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received");
            watcher.cancel_mining();
        }
    });

    let bind = (config.api.host.clone(), config.api.port);
    info!("Starting HTTP server at http://{}:{}", bind.0, bind.1);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(blockchain.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi),
            )
    })
    .bind(bind)
    .with_context(|| format!("failed to bind {}:{}", config.api.host, config.api.port))?
    .run()
    .await?;

    Ok(())
}

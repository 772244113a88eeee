use std::sync::Arc;

use actix_web::{middleware as actix_middleware, web, App, HttpServer};

use tracker_server::config::{AppConfig, StorageBackend};
use tracker_server::credentials::CredentialService;
use tracker_server::db::{InMemoryStorage, MongoStorage, OfflineStorage, Storage};
use tracker_server::handlers;
use tracker_server::middleware::cors;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if it exists (for development)
    // Try loading from current directory first, then from server/ directory
    if dotenvy::dotenv().is_err() {
        dotenvy::from_filename("server/.env").ok();
    }

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting project tracker server...");

    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Hint: check CONFIG_PATH and the PORT/TOKEN_TTL_SECS/STORAGE_BACKEND/REQUIRE_AUTH variables");
        std::process::exit(1);
    });

    if config.uses_fallback_secret() {
        log::warn!("JWT_SECRET is not set; tokens are signed with the built-in fallback secret");
    }

    let credentials = CredentialService::new(config.jwt_secret(), config.token_ttl())
        .unwrap_or_else(|e| {
            eprintln!("Invalid token configuration: {}", e);
            std::process::exit(1);
        });

    log::info!("Tokens expire after {} seconds", credentials.ttl().as_secs());

    let storage = open_storage(&config).await;

    let require_auth = config.require_auth;
    if require_auth {
        log::info!("Project routes require a bearer token");
    }

    let storage_data = web::Data::from(storage.clone());
    let credentials_data = web::Data::new(credentials);

    log::info!("Starting HTTP server at {}:{}...", config.host, config.port);

    let http_result = HttpServer::new(move || {
        App::new()
            // Shared state
            .app_data(storage_data.clone())
            .app_data(credentials_data.clone())
            // Middleware
            .wrap(cors())
            .wrap(actix_middleware::Logger::default())
            .configure(handlers::configure(require_auth))
    })
    .bind((config.host.clone(), config.port))?
    .run()
    .await;

    storage.close().await;

    http_result
}

/// Picks the storage backend. A missing or malformed MongoDB URI does not
/// stop the server; requests fail until the configuration is fixed.
async fn open_storage(config: &AppConfig) -> Arc<dyn Storage> {
    if config.storage == StorageBackend::Memory {
        log::warn!("Using in-memory storage; data will not survive a restart");
        return Arc::new(InMemoryStorage::new());
    }

    let Some(uri) = config.mongo_uri.as_deref() else {
        log::error!("MONGO_URI is not set; storage requests will fail");
        return Arc::new(OfflineStorage::new("MONGO_URI is not set"));
    };

    let storage = match MongoStorage::connect(uri, config.database_name.as_deref()).await {
        Ok(storage) => storage,
        Err(err) => {
            log::error!("Error connecting to MongoDB: {}", err);
            return Arc::new(OfflineStorage::new(err.to_string()));
        }
    };

    log::info!("Using MongoDB database '{}'", storage.database_name());

    // Connect in the background so an unreachable server does not delay startup
    let background = storage.clone();
    tokio::spawn(async move {
        match background.ping().await {
            Ok(()) => log::info!("Connected to MongoDB"),
            Err(err) => {
                log::error!("Error connecting to MongoDB: {}", err);
                return;
            }
        }

        // Writes retry index creation themselves if this attempt fails
        if let Err(err) = background.ensure_indexes().await {
            log::error!("Failed to initialize database indexes: {}", err);
        }
    });

    Arc::new(storage)
}

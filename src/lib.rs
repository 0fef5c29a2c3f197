pub mod core;
pub mod auth;
pub mod http;
pub mod provider;
pub mod store;
pub mod util;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{event, Level};

use crate::http::server::Server;
use crate::provider::AuthorizationServer;
use crate::store::MemoryStore;
use crate::util::hash::HashingService;

#[derive(Debug, Parser)]
#[clap(
    name = "kouzad",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS")
)]
pub struct Config {
    /// Address the OAuth endpoints bind to.
    #[clap(long, env = "KOUZA_BIND", default_value = "127.0.0.1:8001")]
    pub bind: SocketAddr,
    /// Key for the keyed client-secret hashes.
    #[clap(env = "HASH_SECRET")]
    pub hash_secret: String,
    /// JSON file holding the registered client records.
    #[clap(env = "CLIENTS_FILE")]
    pub clients_file: String,
}

pub async fn kouzad(config: Config) -> Result<(), auth::Error> {
    let hasher = HashingService::with_secret_key(config.hash_secret);
    let store = Arc::new(MemoryStore::from_clients_file(&config.clients_file, hasher)?);

    let provider = Arc::new(AuthorizationServer::new(
        Arc::clone(&store),
        Arc::clone(&store),
    ));

    let sweeper = Arc::clone(&provider);
    tokio::spawn(async move {
        if let Err(e) = sweeper.start_clean_up_worker().await {
            event!(Level::ERROR, error = %e, "clean-up worker stopped");
        }
    });

    event!(Level::INFO, bind = %config.bind, "kouza authorization server listening");
    let server = Server::new(provider, store);
    server.serve(config.bind).await;

    Ok(())
}

use clap::Parser;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let config = kouza::Config::parse();
    if let Err(e) = kouza::kouzad(config).await {
        eprintln!("kouzad: {}", e);
        std::process::exit(1);
    }
}

//! idlink HTTP server
//!
//! A standalone server binary exposing identity resolution over JSON HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tracing::info;

use idlink::transport::{router, AppState};
use idlink::{ContactStore, IdentityResolver, SqliteContactStore};

/// Server configuration
struct Config {
    /// Address to bind to
    addr: SocketAddr,
    /// SQLite database file
    db_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|raw| raw.parse::<u16>().ok())
            .unwrap_or(3001);
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            db_path: PathBuf::from("./contacts.db"),
        }
    }
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    let port: u16 = args[i + 1].parse().unwrap_or_else(|_| {
                        eprintln!("error: invalid port number: {}", args[i + 1]);
                        std::process::exit(1);
                    });
                    config.addr.set_port(port);
                    i += 2;
                } else {
                    eprintln!("error: --port requires a value");
                    std::process::exit(1);
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.db_path = PathBuf::from(&args[i + 1]);
                    i += 2;
                } else {
                    eprintln!("error: --db requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                println!("idlink-server - identity resolution HTTP server");
                println!();
                println!("USAGE:");
                println!("    idlink-server [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -p, --port <PORT>    Port to listen on [default: 3001, env: PORT]");
                println!("    -d, --db <FILE>      SQLite database file [default: ./contacts.db]");
                println!("    -h, --help           Print help information");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idlink=info,tower_http=info".into()),
        )
        .init();

    let config = parse_args();

    info!(db = %config.db_path.display(), "opening contact store");
    let store: Arc<dyn ContactStore> = Arc::new(SqliteContactStore::open(&config.db_path)?);
    let resolver = Arc::new(IdentityResolver::new(store));
    let app = router(AppState::new(resolver));

    info!(addr = %config.addr, "starting server");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("shutting down gracefully");
        })
        .await?;

    Ok(())
}

use chrono::Utc;
use duckdb::Connection;
use sitepulse::config::Config;
use sitepulse::server;
use sitepulse::state::AppState;
use sitepulse::storage;
use sitepulse::storage::websites::Website;
use sitepulse::store::DuckDbStore;
use std::path::Path;
use std::sync::Arc;

const USAGE: &str = "usage:
  sitepulse [config.toml]
  sitepulse create-admin <username> [config.toml]
  sitepulse add-website <id> <domain> [owner-username] [config.toml]";

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("create-admin") => run_create_admin(&args[1..]),
        Some("add-website") => run_add_website(&args[1..]),
        Some("-h" | "--help") => println!("{USAGE}"),
        config_path => serve(config_path.map(Path::new)).await,
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sitepulse=info,tower_http=info".into());
    let json = std::env::var("SITEPULSE_LOG_FORMAT").is_ok_and(|v| v == "json");
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn open_database(config: &Config) -> Connection {
    let conn = match &config.database_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).expect("Failed to create database directory");
            }
            Connection::open(path).expect("Failed to open DuckDB")
        }
        None => {
            tracing::warn!("No database_path configured; using an in-memory database");
            Connection::open_in_memory().expect("Failed to open DuckDB")
        }
    };
    storage::migrations::run_migrations(&conn).expect("Failed to run migrations");
    conn
}

async fn serve(config_path: Option<&Path>) {
    let config = Config::load(config_path);

    tracing::info!(
        host = %config.host,
        port = config.port,
        timezone = %config.timezone,
        "Starting sitepulse"
    );

    let store = DuckDbStore::new(open_database(&config));
    let secret = std::env::var("SITEPULSE_SECRET").unwrap_or_else(|_| {
        tracing::warn!("No SITEPULSE_SECRET set, using a random secret. Share tokens will not survive a restart.");
        uuid::Uuid::new_v4().to_string()
    });
    let state = Arc::new(AppState::new(store, secret, &config));

    let app = server::build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");
}

/// Admin commands only make sense against a persistent database.
fn load_persistent_config(config_path: Option<&String>) -> Config {
    let config = Config::load(config_path.map(Path::new));
    if config.database_path.is_none() {
        eprintln!("database_path must be configured (or SITEPULSE_DATABASE set)");
        std::process::exit(2);
    }
    config
}

fn run_create_admin(args: &[String]) {
    let Some(username) = args.first() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let config = load_persistent_config(args.get(1));
    let conn = open_database(&config);

    let user = storage::users::create_user(&conn, username, true).expect("Failed to create user");
    let key = storage::users::create_api_key(&conn, &user.id).expect("Failed to create API key");
    tracing::info!(user_id = %user.id, username = %user.username, "Created admin user");
    println!("{key}");
}

fn run_add_website(args: &[String]) {
    let (Some(id), Some(domain)) = (args.first(), args.get(1)) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let config = load_persistent_config(args.get(3));
    let conn = open_database(&config);

    let user_id = args.get(2).map(|username| {
        conn.prepare("SELECT id FROM users WHERE username = ?")
            .and_then(|mut stmt| stmt.query_row([username], |row| row.get::<_, String>(0)))
            .unwrap_or_else(|e| {
                eprintln!("Unknown user {username}: {e}");
                std::process::exit(2);
            })
    });

    let website = Website {
        id: id.clone(),
        name: domain.clone(),
        domain: domain.clone(),
        user_id,
        created_at: Utc::now(),
    };
    storage::websites::create_website(&conn, &website).expect("Failed to create website");
    tracing::info!(website_id = %website.id, domain = %website.domain, "Created website");
}

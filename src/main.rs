use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use footprint::assistant::{Assistant, AssistantBackend, GeminiBackend};
use footprint::auth::{generate_password, hash_password, issue_session};
use footprint::config::{AppConfig, ServerConfig};
use footprint::emissions::{ClimatiqEstimator, EmissionCalculator, RetryPolicy};
use footprint::server::{AppState, create_router};
use footprint::store::{SqliteStore, Store};
use footprint::types::{NewProfile, NewUser, Role};

const NOT_INITIALIZED: &str =
    "Server not initialized. Run 'footprint admin init' first to create the database and admin account.";

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "footprint")]
#[command(about = "A self-hostable carbon footprint tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "3000")]
        port: u16,

        /// Data directory for the database and admin token
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// TOML settings file. Defaults to <data-dir>/footprint.toml when present.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and admin account)
    Init {
        /// Data directory for the database and admin token
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Email address for the admin account
        #[arg(long, default_value = "admin@footprint.local")]
        email: String,
    },
}

fn run_init(data_dir: String, email: String) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir: data_dir.into(),
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.data_dir)?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    let token_file = config.admin_token_path();
    if store.has_admin_user()? {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let password = generate_password();
    let admin = store.create_user(&NewUser {
        username: "admin".to_string(),
        email: email.trim().to_lowercase(),
        password_hash: hash_password(&password)?,
        role: Role::Admin,
        is_active: true,
    })?;
    store.create_profile(&NewProfile::for_user(admin.id))?;

    let (raw_token, _) = issue_session(&store, admin.id, None)?;
    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    println!();
    println!("========================================");
    println!("Admin account created (save these, they won't be shown again):");
    println!();
    println!("  Email:    {}", admin.email);
    println!("  Password: {password}");
    println!("  Token:    {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    Ok(())
}

fn build_state(store: Arc<SqliteStore>, settings: &AppConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn Store> = store;
    let emissions = &settings.emissions;

    let mut calculator = EmissionCalculator::new(store.clone(), emissions.default_region.clone());
    if let Some(key) = emissions.climatiq_api_key.as_deref() {
        let estimator = ClimatiqEstimator::new(
            emissions.climatiq_base_url.clone(),
            key,
            emissions.climatiq_region.clone(),
            emissions.timeout(),
        )?;
        let retry = RetryPolicy {
            retries: emissions.retries,
            delay: emissions.retry_delay(),
        };
        calculator = calculator.with_remote(Arc::new(estimator), retry);
        info!("Remote emission estimates enabled");
    }

    let backend = GeminiBackend::from_settings(&settings.assistant)?
        .map(|backend| Arc::new(backend) as Arc<dyn AssistantBackend>);
    if backend.is_some() {
        info!(model = %settings.assistant.gemini_model, "Assistant backend enabled");
    }

    Ok(AppState {
        store,
        calculator,
        assistant: Assistant::new(backend),
        auth: settings.auth.clone(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("footprint=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir, email } => {
                run_init(data_dir, email)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            config,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                config_file: config,
            };

            if !config.db_path().exists() {
                bail!(NOT_INITIALIZED);
            }
            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;
            if !store.has_admin_user()? {
                bail!(NOT_INITIALIZED);
            }

            dotenvy::dotenv().ok();
            let settings_file = config.resolved_config_file();
            if let Some(path) = &settings_file {
                info!("Loading settings from {}", path.display());
            }
            let settings = AppConfig::load(settings_file.as_deref())?;

            match store.delete_expired_sessions() {
                Ok(n) if n > 0 => info!("Removed {n} expired sessions"),
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to prune sessions: {e}"),
            }

            let state = Arc::new(build_state(Arc::new(store), &settings)?);
            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

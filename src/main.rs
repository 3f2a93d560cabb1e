use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use curesio_lib::accounts::{self, SignupRequest};
use curesio_lib::config::{self, Config};
use curesio_lib::core_state::CoreState;

#[derive(Parser)]
#[command(name = "curesio", version, about = "Curesio healthcare directory backend")]
struct Cli {
    /// Directory holding the database and uploaded media
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (API, admin console, media)
    Serve {
        /// Address to listen on, e.g. 0.0.0.0:8000
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Create a staff superuser for the admin console
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "CURESIO_SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

fn load_config(data_dir: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = Config::from_env().context("invalid environment configuration")?;
    if let Some(dir) = data_dir {
        config.db_path = dir.join(config::DB_FILE_NAME);
        config.media_dir = dir.join(config::MEDIA_DIR_NAME);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.data_dir)?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(addr) = bind {
                config.bind_addr = addr;
            }
            tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
            let addr = config.bind_addr;
            let core = Arc::new(CoreState::new(config));
            core.prepare().context("failed to prepare data directory")?;
            curesio_lib::api::serve(core, addr)
                .await
                .with_context(|| format!("server on {addr} failed"))?;
        }
        Command::CreateSuperuser {
            email,
            username,
            password,
        } => {
            let core = CoreState::new(config);
            core.prepare().context("failed to prepare data directory")?;
            let mut conn = core.open_db()?;
            let req = SignupRequest {
                email: Some(email),
                username: Some(username),
                password: Some(password),
            };
            let user = accounts::create_superuser(&mut conn, core.hasher(), &req)?;
            println!("Superuser created: {}", user.email);
        }
    }

    Ok(())
}

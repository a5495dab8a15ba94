use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wabridge")]
#[command(about = "WhatsApp relay gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: WABRIDGE_CONFIG_PATH or ~/.wabridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the relay: WhatsApp connector plus the HTTP send endpoint.
    Gateway {
        /// Config file path (default: WABRIDGE_CONFIG_PATH or ~/.wabridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 3001)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send a message through a running gateway (operator helper).
    Send {
        /// Target number (the @c.us suffix is appended when missing)
        #[arg(long)]
        numero: String,

        /// Message text
        #[arg(long)]
        mensaje: String,

        /// Config file path (default: WABRIDGE_CONFIG_PATH or ~/.wabridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("wabridge {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Send {
            numero,
            mensaje,
            config,
        }) => {
            if let Err(e) = run_send(config, numero, mensaje).await {
                log::error!("send failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, _path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{}",
        config.gateway.bind,
        config.gateway.port
    );
    lib::gateway::run_gateway(config).await
}

async fn run_send(
    config_path: Option<std::path::PathBuf>,
    numero: String,
    mensaje: String,
) -> anyhow::Result<()> {
    let (config, _path) = lib::config::load_config(config_path)?;
    let url = format!(
        "http://{}:{}/enviar_mensaje",
        config.gateway.bind.trim(),
        config.gateway.port
    );
    let body = serde_json::json!({ "numero": numero, "mensaje": mensaje });
    let res = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await?;
    let status = res.status();
    let payload: serde_json::Value = res.json().await.unwrap_or_default();
    if status.is_success() {
        println!(
            "{}",
            payload
                .get("estado")
                .and_then(|v| v.as_str())
                .unwrap_or("enviado")
        );
        Ok(())
    } else {
        let error = payload
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("send failed")
            .to_string();
        anyhow::bail!("{} ({})", error, status)
    }
}

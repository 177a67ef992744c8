use anyhow::{anyhow, Context, Result};
use charm_proxylib::{config, defaults, view, ProcessEnv, ProxyView};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "charm-proxylib")]
#[command(about = "Render Juju model proxy settings for charms")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Treat proxy settings as disabled
    #[arg(long)]
    disabled: bool,
    /// Emit only lower case variable names
    #[arg(long)]
    lowercase: bool,
    /// Prepend the Kubernetes cluster hosts to no_proxy
    #[arg(long)]
    k8s_defaults: bool,
    /// Extra host to prepend to no_proxy (repeatable)
    #[arg(long = "no-proxy", value_name = "HOST")]
    no_proxy: Vec<String>,
    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print KEY=value lines
    Env,
    /// Print the settings as a JSON object
    Json,
    /// Print a systemd [Service] drop-in
    Systemd {
        /// Service the drop-in is written for
        service: String,
    },
    /// Print container env records as JSON
    ContainerVars,
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    let _ = dotenvy::dotenv();
    init_tracing()?;

    let cli = Cli::parse();
    let mut lib_config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    }
    .context("loading configuration")?;

    if cli.disabled {
        lib_config.enabled = false;
    }
    if cli.lowercase {
        lib_config.uppercase = false;
    }
    if cli.k8s_defaults {
        lib_config.no_proxy_defaults = defaults::k8s_default_no_proxy()
            .into_iter()
            .chain(lib_config.no_proxy_defaults)
            .collect();
    }
    lib_config.no_proxy_defaults.extend(cli.no_proxy);

    if let Commands::Config = cli.command {
        let rendered = config::to_toml(&lib_config)?;
        println!("{}\n{}", "Configuration".bold(), rendered.trim_end().cyan());
        return Ok(());
    }

    let env = ProcessEnv;
    let proxy_view = checked(view::environ_with(&env, &lib_config.view_options()))?;

    match cli.command {
        Commands::Env => {
            for (name, value) in proxy_view.iter() {
                println!("{name}={value}");
            }
        }
        Commands::Json => {
            println!("{}", serde_json::to_string_pretty(&proxy_view)?);
        }
        Commands::Systemd { service } => {
            let content = view::systemd(&env, &proxy_view, &service)
                .with_context(|| format!("rendering systemd drop-in for {service}"))?;
            print!("{content}");
        }
        Commands::ContainerVars => {
            let records = view::container_vars(&proxy_view)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Config => {}
    }

    Ok(())
}

fn checked(proxy_view: ProxyView) -> Result<ProxyView> {
    match proxy_view.error() {
        Some(message) => Err(anyhow!("proxy settings are invalid: {message}")),
        None => Ok(proxy_view),
    }
}

fn init_tracing() -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

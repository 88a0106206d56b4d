use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use replika::config::{Config, ConfigError};
use replika::utils::format_duration;
use replika::{Command, Intent, RedisCommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "replika")]
#[command(about = "Primary/replica connection routing and RESP command framing for Redis-compatible stores")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Replika Team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an example configuration file
    Config {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Route one command through the configured topology and send it
    Send {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/replika.toml")]
        config: PathBuf,
        /// Routing intent; derived from the command name when omitted
        #[arg(short, long, value_enum)]
        intent: Option<IntentArg>,
        /// Command name followed by its arguments
        #[arg(required = true, num_args = 1..)]
        args: Vec<String>,
    },
    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum IntentArg {
    Read,
    Write,
}

impl From<IntentArg> for Intent {
    fn from(arg: IntentArg) -> Self {
        match arg {
            IntentArg::Read => Intent::Read,
            IntentArg::Write => Intent::Write,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { output } => generate_config(output)?,
        Commands::Validate { config } => validate_config(config)?,
        Commands::Send {
            config,
            intent,
            args,
        } => send_command(config, intent, args).await?,
        Commands::Version => show_version(),
    }

    Ok(())
}

async fn send_command(config_path: PathBuf, intent: Option<IntentArg>, args: Vec<String>) -> Result<()> {
    let config = Config::load_from_file(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(&config)?;

    let mut parts = args.into_iter();
    let Some(name) = parts.next() else {
        bail!("missing command name");
    };
    let command = parts.fold(Command::new(name), |command, arg| command.arg(arg));
    let intent = intent.map(Intent::from).unwrap_or_else(|| command.intent());

    let provider = replika::connect(&config).await?;
    let connection = provider.connection(intent).await?;
    info!(intent = %intent, peer = connection.peer(), ?command, "sending command");

    let command: Arc<dyn RedisCommand> = Arc::new(command);
    let written = connection.dispatch(command)?;
    let drain_timeout = Duration::from_millis(config.transport.connect_timeout_ms);
    let drained = connection.shutdown(drain_timeout).await;
    provider.close().await;
    if !drained {
        bail!(
            "Timed out after {} writing to {}",
            format_duration(drain_timeout),
            connection.peer()
        );
    }

    println!("Sent {} command(s) to {} ({})", written, connection.peer(), intent);
    Ok(())
}

fn generate_config(output: PathBuf) -> Result<()> {
    println!("Generating configuration file: {:?}", output);

    Config::create_example_config(&output).context("Failed to generate config")?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and run:");
    println!("  replika send --config {:?} PING", output);

    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<()> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid");
            println!("  Primary: {}", config.topology.primary);
            println!("  Replicas: {} instances", config.topology.replicas.len());
            for (i, replica) in config.topology.replicas.iter().enumerate() {
                println!("    {}: {}", i + 1, replica);
            }
            match config.topology.read_from {
                Some(read_from) => println!("  Read from: {:?}", read_from),
                None => println!("  Read from: primary (default)"),
            }
            println!(
                "  Connect timeout: {}",
                format_duration(Duration::from_millis(config.transport.connect_timeout_ms))
            );
            println!("  Auto flush: {}", config.transport.auto_flush);
        }
        Err(e) => {
            eprintln!("✗ Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            return Err(e.into());
        }
    }

    Ok(())
}

fn show_version() {
    println!("replika v{}", env!("CARGO_PKG_VERSION"));
    println!("Primary/replica connection routing and RESP command framing");
    println!();
    println!(
        "Built with Rust {}",
        option_env!("CARGO_PKG_RUST_VERSION").unwrap_or("unknown")
    );
    println!("Target: {}", std::env::consts::ARCH);
    println!();
    println!("Features:");
    println!("  • Write routing to the primary, policy-driven reads from replicas");
    println!("  • Lazily opened replica connections with one connect per node");
    println!("  • Topology-driven pruning of stale connections");
    println!("  • Ordered RESP framing with cancelled-command skipping");
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(level = %config.logging.level, format = %config.logging.format, "logging initialized");
    Ok(())
}

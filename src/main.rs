use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use xmppbot::application::errors::{BotError, ConfigError};
use xmppbot::domain::entities::PresenceState;
use xmppbot::infrastructure::adapters::ConsoleTransport;
use xmppbot::infrastructure::config::Config;
use xmppbot::plugins::PluginFactories;
use xmppbot::Bot;

#[derive(Parser)]
#[command(name = "xmppbot")]
#[command(about = "A plugin driven chat bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    overrides: Overrides,
}

/// Flags that take precedence over the config file
#[derive(Args, Clone, Debug)]
struct Overrides {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Account address, e.g. bot@example.org
    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true)]
    password: Option<String>,

    #[arg(long, global = true)]
    resource: Option<String>,

    #[arg(long, global = true)]
    server: Option<String>,

    #[arg(long, global = true)]
    port: Option<u16>,

    /// Connect without TLS
    #[arg(long, global = true)]
    notls: bool,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Presence state: away, chat, dnd, xa
    #[arg(long, global = true)]
    status: Option<String>,

    #[arg(long = "status-msg", global = true)]
    status_msg: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Print a sample config
    InitConfig,
}

impl Overrides {
    /// The config file when present, environment defaults otherwise, with
    /// the command line applied on top
    fn resolve(&self) -> Result<Config, ConfigError> {
        let mut config = if self.config.exists() {
            Config::load(&self.config)?
        } else {
            Config::load_env()
        };
        self.apply(&mut config)?;
        Ok(config)
    }

    fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(username) = &self.username {
            config.account.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.account.password = password.clone();
        }
        if let Some(resource) = &self.resource {
            config.account.resource = resource.clone();
        }
        if let Some(server) = &self.server {
            config.account.server = server.clone();
        }
        if let Some(port) = self.port {
            config.account.port = port;
        }
        if self.notls {
            config.account.no_tls = true;
        }
        if self.debug {
            config.setup.debug = true;
        }
        if let Some(status) = &self.status {
            status.parse::<PresenceState>().map_err(ConfigError::InvalidValue)?;
            config.setup.status = status.clone();
        }
        if let Some(message) = &self.status_msg {
            config.setup.status_message = message.clone();
        }
        config.validate()
    }
}

fn init_logging(debug: bool) {
    let level = if debug { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("xmppbot v{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Commands::InitConfig => match Config::sample().to_yaml() {
            Ok(yaml) => {
                println!("{}", yaml);
                println!("\nSave this to config.yaml and adjust as needed.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Run => {
            let config = match cli.overrides.resolve() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Invalid configuration: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            init_logging(config.setup.debug);

            let runtime = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to start runtime: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            match runtime.block_on(run_bot(config, cli.overrides)) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn run_bot(config: Config, overrides: Overrides) -> Result<(), BotError> {
    tracing::info!("Starting xmppbot as {}", config.bot_full_jid());

    let console_sender = config
        .setup
        .admin
        .first()
        .map(|admin| format!("{}/console", admin))
        .unwrap_or_else(|| "console@localhost/console".to_string());
    let transport = Arc::new(ConsoleTransport::new(console_sender));

    let path_known = Path::new(&overrides.config).exists();
    let mut bot = Bot::new(transport, config, PluginFactories::builtin());
    if path_known {
        bot = bot.with_config_loader(Box::new(move || overrides.resolve()));
    }

    bot.start().await?;
    tokio::select! {
        result = bot.run() => {
            bot.stop().await;
            result
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            bot.stop().await;
            Ok(())
        }
    }
}

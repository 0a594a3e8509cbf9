//! Command-line parsing and dispatch.
//!
//! With no subcommand the interactive form runs: pick an expert, type a
//! question, get the answer.

pub mod ask;
pub mod auth;
pub mod form;
pub mod settings;
pub mod status;

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::core::answer::Orchestrator;
use crate::core::client::openai::OpenAiFactory;
use crate::core::client::{ClientAdapter, ModelSettings};
use crate::core::config::Config;
use crate::core::credentials::CredentialResolver;
use crate::core::expert::ExpertRegistry;
use crate::core::secrets::open_store;

#[derive(Parser)]
#[command(name = "expert-mode", version)]
#[command(about = "Ask a question through one of a fixed set of expert personas")]
#[command(
    long_about = "expert-mode sends your question to an OpenAI-compatible chat model, \
framed by the system instruction of the expert you pick, and prints the answer.\n\n\
Credentials (first match wins):\n\
  secrets.toml      OPENAI_API_KEY, or api_key in an [openai] table\n\
                    (or the keyring when secrets_backend = \"keyring\")\n\
  OPENAI_API_KEY    environment variable\n\n\
Environment Variables (also read from a .env file in the working directory):\n\
  OPENAI_BASE_URL      Custom API base URL (defaults to https://api.openai.com/v1)\n\
  EXPERT_MODE_CONFIG   Path to config.toml\n\
  EXPERT_MODE_SECRETS  Path to secrets.toml\n\
  EXPERT_MODE_LOG      Log filter, e.g. expert_mode=debug"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Read configuration from this file instead of the default location
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log pipeline diagnostics to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pick an expert and type a question interactively (default)
    Form,
    /// Ask a single question; reads stdin when no text is given
    Ask {
        /// Expert code, e.g. A or B
        #[arg(short = 'e', long, value_name = "CODE")]
        expert: Option<String>,
        /// Question text
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// List the available experts
    Experts,
    /// Show whether an API key is available and where it comes from
    Status,
    /// Store an API key in the configured secret store
    Auth,
    /// Remove the stored API key from the configured secret store
    Deauth,
    /// Set a configuration value, or show all values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Reset a configuration value to its default
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

/// Configuration and expert table, loaded once per process.
pub struct AppContext {
    pub config_path: PathBuf,
    pub config: Config,
    pub experts: ExpertRegistry,
}

impl AppContext {
    pub fn load(config_override: Option<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let config_path = match config_override {
            Some(path) => path,
            None => Config::default_path()?,
        };
        let config = Config::load_from_path(&config_path)?;
        let experts = ExpertRegistry::from_config(&config);

        Ok(Self {
            config_path,
            config,
            experts,
        })
    }

    pub fn credential_resolver(&self) -> CredentialResolver {
        CredentialResolver::new(open_store(&self.config))
    }

    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.config.model().to_string(),
            temperature: self.config.temperature(),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator<'_> {
        let factory = OpenAiFactory::new(self.config.base_url())
            .with_timeout(self.config.request_timeout_secs.map(Duration::from_secs));

        Orchestrator::new(
            &self.experts,
            self.credential_resolver(),
            ClientAdapter::new(Box::new(factory), self.model_settings()),
        )
    }

    /// `default_expert` from the config when it names a known expert.
    pub fn default_expert_code(&self) -> &str {
        self.config
            .default_expert
            .as_deref()
            .and_then(|code| self.experts.find(code))
            .unwrap_or_else(|| self.experts.default_expert())
            .code
            .as_str()
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    // Before parsing, so `.env` can also set EXPERT_MODE_* variables.
    // Variables already in the environment win.
    let dotenv_path = dotenvy::dotenv().ok();
    let args = Args::parse();
    crate::logging::init(args.verbose);
    if let Some(path) = dotenv_path {
        debug!(path = %path.display(), "loaded .env");
    }

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let ctx = AppContext::load(args.config)?;

    match args.command.unwrap_or(Commands::Form) {
        Commands::Form => form::run_form(&ctx).await,
        Commands::Ask { expert, text } => ask::run_ask(&ctx, expert, text).await,
        Commands::Experts => {
            print!("{}", status::format_experts(&ctx.experts, ctx.default_expert_code()));
            Ok(())
        }
        Commands::Status => {
            print!("{}", status::format_status(&ctx));
            Ok(())
        }
        Commands::Auth => auth::run_auth(&ctx),
        Commands::Deauth => auth::run_deauth(&ctx),
        Commands::Set { key, value } => settings::run_set(&ctx, key, value),
        Commands::Unset { key } => settings::run_unset(&ctx, &key),
    }
}

//! ai-gateway CLI - Chat, completions, embeddings and images across AI providers

use ai_gateway::{
    api::{OpenRouterProvider, ProviderKind},
    config::Config,
    gateway::{
        Caller, ChatRequest, CompletionRequest, EmbedRequest, GatewaySettings, ImageRequest,
        RequestGateway,
    },
    metrics::UsageTracker,
    ratelimit::RateLimiter,
    registry::ProviderRegistry,
    tui::{TerminalRenderer, WaitSpinner},
    ChatArgs, ChatMessage, CompletionArgs, EmbedArgs, ImageArgs,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Environment variables reported by `config show`
const ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "OPENAI_ORGANIZATION",
    "ANTHROPIC_API_KEY",
    "OPENROUTER_API_KEY",
    "TOGETHER_API_KEY",
    "AI_GATEWAY_RATE_LIMIT",
    "AI_GATEWAY_RATE_LIMIT_PERIOD",
];

#[derive(Parser)]
#[command(name = "ai-gateway")]
#[command(about = "Send chat, completion, embedding and image requests to AI providers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (RUST_LOG takes precedence when set)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Config file (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// User id the local caller acts as
    #[arg(long, default_value = "1", global = true)]
    user_id: u64,

    /// Print a usage summary after the command
    #[arg(long, global = true)]
    usage: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a chat message
    Chat {
        /// Message text
        message: String,

        /// Provider name
        #[arg(short, long, default_value = "openai")]
        provider: String,

        /// Model to use (provider default when omitted)
        #[arg(short, long)]
        model: Option<String>,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        #[arg(short, long)]
        temperature: Option<f64>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Print the unified result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Complete a prompt
    Complete {
        prompt: String,

        #[arg(short, long, default_value = "openai")]
        provider: String,

        #[arg(short, long)]
        model: Option<String>,

        #[arg(long)]
        max_tokens: Option<u32>,

        #[arg(long)]
        json: bool,
    },

    /// Embed a text
    Embed {
        text: String,

        #[arg(short, long, default_value = "openai")]
        provider: String,

        #[arg(short, long)]
        model: Option<String>,

        /// Requested vector size
        #[arg(short, long)]
        dimensions: Option<u32>,

        #[arg(long)]
        json: bool,
    },

    /// Generate an image
    Image {
        prompt: String,

        #[arg(short, long, default_value = "openai")]
        provider: String,

        #[arg(short, long)]
        model: Option<String>,

        /// Image size, e.g. 1024x1024
        #[arg(short, long)]
        size: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List configured providers
    Providers {
        /// Only providers with an API key
        #[arg(long)]
        active: bool,
    },

    /// List a provider's models
    Models {
        provider: String,

        /// Fetch the live catalogue (OpenRouter only)
        #[arg(long)]
        live: bool,
    },

    /// Check API keys and endpoints
    Test {
        /// Provider to test (all active providers when omitted)
        provider: Option<String>,
    },

    /// Run a raw JSON request through the gateway
    Request {
        /// Operation path: chat, complete, embed or generate-image
        path: String,

        /// JSON payload
        #[arg(short, long)]
        body: String,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Show {
        /// Show only a section (gateway, rate_limit, providers) or one provider
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,

    /// Store a provider API key in the config file
    SetKey {
        /// Provider name (openai, anthropic, openrouter, together-ai)
        provider: String,
    },
}

/// Gateway wired from configuration, plus its usage tracker
struct App {
    gateway: RequestGateway,
    usage: UsageTracker,
    caller: Caller,
    renderer: TerminalRenderer,
}

impl App {
    fn new(config: &Config, user_id: u64) -> Result<Self> {
        let registry = ProviderRegistry::from_config(config)?;
        let usage = UsageTracker::new();
        let gateway = RequestGateway::new(
            Arc::new(registry),
            Arc::new(RateLimiter::new(config.rate_limit.clone())),
            Arc::new(usage.clone()),
            config.gateway.clone(),
        );

        // The local user acts with whatever capability the gateway demands
        let caller = Caller::new(user_id).with_capability(config.gateway.required_capability.clone());

        Ok(Self {
            gateway,
            usage,
            caller,
            renderer: TerminalRenderer::new(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Config(cmd) => run_config_command(cmd, cli.config),
        command => {
            let config = load_config(cli.config)?;
            let app = App::new(&config, cli.user_id)?;
            run_command(&app, &config, command).await?;

            if cli.usage {
                println!("\n{}", app.usage.summary());
            }
            Ok(())
        }
    }
}

async fn run_command(app: &App, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Chat {
            message,
            provider,
            model,
            system,
            temperature,
            max_tokens,
            json,
        } => {
            let mut args = ChatArgs::new(vec![ChatMessage::user(message)]);
            args.model = model;
            args.system = system;
            args.temperature = temperature;
            args.max_tokens = max_tokens;
            run_chat(app, provider, args, json).await
        }
        Commands::Complete {
            prompt,
            provider,
            model,
            max_tokens,
            json,
        } => {
            let mut args = CompletionArgs::new(prompt);
            args.model = model;
            args.max_tokens = max_tokens;
            run_complete(app, provider, args, json).await
        }
        Commands::Embed {
            text,
            provider,
            model,
            dimensions,
            json,
        } => {
            let args = EmbedArgs { model, dimensions };
            run_embed(app, provider, text, args, json).await
        }
        Commands::Image {
            prompt,
            provider,
            model,
            size,
            json,
        } => {
            let mut args = ImageArgs::new(prompt);
            args.model = model;
            args.size = size;
            run_image(app, provider, args, json).await
        }
        Commands::Providers { active } => {
            list_providers(app, active);
            Ok(())
        }
        Commands::Models { provider, live } => list_models(app, config, &provider, live).await,
        Commands::Test { provider } => run_test(app, provider).await,
        Commands::Request { path, body } => run_request(app, &path, &body).await,
        Commands::Config(_) => bail!("config commands run without a gateway"),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_existing(path)?,
        None => Config::load()?,
    };
    debug!("Loaded configuration with {} providers", config.providers.len());
    Ok(config)
}

/// Await `fut` behind a spinner
async fn waiting<F: Future>(msg: String, fut: F) -> F::Output {
    let mut spinner = WaitSpinner::new();
    spinner.start(msg);
    let output = fut.await;
    spinner.stop();
    output
}

async fn run_chat(app: &App, provider: String, args: ChatArgs, json: bool) -> Result<()> {
    let msg = format!("Waiting for {}", provider);
    let request = ChatRequest { provider, args };
    let result = waiting(msg, app.gateway.chat(&app.caller, request)).await?;

    if json {
        app.renderer.render_json(&serde_json::to_value(&result)?);
    } else {
        app.renderer.render_chat(&result);
    }
    Ok(())
}

async fn run_complete(app: &App, provider: String, args: CompletionArgs, json: bool) -> Result<()> {
    let msg = format!("Waiting for {}", provider);
    let request = CompletionRequest { provider, args };
    let result = waiting(msg, app.gateway.complete(&app.caller, request)).await?;

    if json {
        app.renderer.render_json(&serde_json::to_value(&result)?);
    } else {
        app.renderer.render_completion(&result);
    }
    Ok(())
}

async fn run_embed(
    app: &App,
    provider: String,
    text: String,
    args: EmbedArgs,
    json: bool,
) -> Result<()> {
    let msg = format!("Embedding with {}", provider);
    let request = EmbedRequest {
        provider,
        text,
        args,
    };
    let result = waiting(msg, app.gateway.embed(&app.caller, request)).await?;

    if json {
        app.renderer.render_json(&serde_json::to_value(&result)?);
    } else {
        app.renderer.render_embedding(&result);
    }
    Ok(())
}

async fn run_image(app: &App, provider: String, args: ImageArgs, json: bool) -> Result<()> {
    let msg = format!("Generating with {}", provider);
    let request = ImageRequest { provider, args };
    let result = waiting(msg, app.gateway.generate_image(&app.caller, request)).await?;

    if json {
        app.renderer.render_json(&serde_json::to_value(&result)?);
    } else {
        app.renderer.render_images(&result);
    }
    Ok(())
}

fn list_providers(app: &App, active_only: bool) {
    let registry = app.gateway.registry();
    app.renderer.render_title("Providers");

    for name in registry.names() {
        let Some(provider) = registry.get(&name) else {
            continue;
        };
        if active_only && !provider.is_active() {
            continue;
        }
        app.renderer.render_provider(
            &name,
            provider.display_name(),
            provider.is_active(),
            provider.capabilities(),
        );
    }
}

async fn list_models(app: &App, config: &Config, name: &str, live: bool) -> Result<()> {
    let provider = app
        .gateway
        .registry()
        .get(name)
        .with_context(|| format!("Unknown provider: {}", name))?;

    if live {
        let settings = config
            .providers
            .get(name)
            .with_context(|| format!("Provider {} is not in the config file", name))?;
        if settings.kind != ProviderKind::OpenRouter {
            bail!("--live is only available for OpenRouter providers");
        }

        let openrouter = OpenRouterProvider::new(settings.to_provider_config(name))?;
        let models = waiting("Fetching model catalogue".to_string(), openrouter.fetch_models()).await;
        app.renderer.render_title(&format!("{} models ({})", name, models.len()));
        app.renderer.render_models(&models, provider.default_model());
        return Ok(());
    }

    app.renderer.render_title(&format!("{} models", name));
    app.renderer.render_models(provider.models(), provider.default_model());
    Ok(())
}

async fn run_test(app: &App, name: Option<String>) -> Result<()> {
    let registry = app.gateway.registry();
    let providers = match name {
        Some(name) => vec![registry
            .get(&name)
            .with_context(|| format!("Unknown provider: {}", name))?],
        None => registry.active(),
    };

    if providers.is_empty() {
        app.renderer
            .render_info("No providers have an API key. Run 'ai-gateway config show' for details.");
        return Ok(());
    }

    let mut failures = 0;
    for provider in providers {
        let msg = format!("Testing {}", provider.name());
        match waiting(msg, provider.test_connection()).await {
            Ok(()) => app
                .renderer
                .render_success(&format!("{}: connection OK", provider.name())),
            Err(e) => {
                failures += 1;
                app.renderer
                    .render_error(&format!("{}: {}", provider.name(), e));
            }
        }
    }

    if failures > 0 {
        bail!("{} provider(s) failed the connection test", failures);
    }
    Ok(())
}

async fn run_request(app: &App, path: &str, body: &str) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(body).context("Request body must be valid JSON")?;

    let msg = format!("Running {}", path);
    let response = waiting(msg, app.gateway.dispatch(&app.caller, path, payload)).await;

    app.renderer.render_json(&response.body);
    if !response.is_success() {
        bail!("Request failed with status {}", response.status);
    }
    Ok(())
}

fn run_config_command(cmd: ConfigCommands, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(Config::default_path);

    match cmd {
        ConfigCommands::Init { force } => config_init(path, force)?,
        ConfigCommands::Show { section } => config_show(path, section)?,
        ConfigCommands::Path => config_path(path),
        ConfigCommands::Validate => config_validate(path)?,
        ConfigCommands::SetKey { provider } => config_set_key(path, &provider)?,
    }
    Ok(())
}

fn config_init(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists at: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    Config::default().save_to(path.clone())?;

    println!("Configuration file created at: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file to add your API keys, or");
    println!("  2. Set environment variables:");
    for kind in ProviderKind::ALL {
        println!("     export {}=your_key", kind.api_key_env());
    }
    println!();
    println!("Or store a key directly:");
    println!("  ai-gateway config set-key openai");

    Ok(())
}

fn config_show(path: PathBuf, section: Option<String>) -> Result<()> {
    let mut config = Config::load_from(path)?;

    // Mask API keys in display
    for settings in config.providers.values_mut() {
        if !settings.api_key.is_empty() {
            settings.api_key = "***".to_string();
        }
    }

    let display = match section.as_deref() {
        None => toml::to_string_pretty(&config)?,
        Some("gateway") => toml::to_string_pretty(&config.gateway)?,
        Some("rate_limit") => toml::to_string_pretty(&config.rate_limit)?,
        Some("providers") => toml::to_string_pretty(&config.providers)?,
        Some(name) => match config.providers.get(name) {
            Some(settings) => toml::to_string_pretty(settings)?,
            None => {
                println!("Unknown section: {}", name);
                println!(
                    "Available: gateway, rate_limit, providers, {}",
                    config.providers.keys().cloned().collect::<Vec<_>>().join(", ")
                );
                return Ok(());
            }
        },
    };

    println!("{}", display);

    println!("\n--- Environment Variables ---");
    for var in ENV_VARS {
        let status = if std::env::var(var).is_ok() { "set" } else { "not set" };
        println!("{}: {}", var, status);
    }

    Ok(())
}

fn config_path(path: PathBuf) {
    println!("{}", path.display());

    if path.exists() {
        println!("(file exists)");
    } else {
        println!("(file does not exist - run 'config init' to create)");
    }
}

fn config_validate(path: PathBuf) -> Result<()> {
    let config = Config::load_existing(path)?;

    match config.validate() {
        Ok(()) => {
            println!("Configuration is valid!");
            println!();
            println!("Configured providers:");
            for (name, settings) in &config.providers {
                let key = if settings.api_key.is_empty() {
                    "NO API KEY"
                } else {
                    "key set"
                };
                println!("  {} ({}): {} [{}]", name, settings.kind, settings.endpoint(), key);
            }

            let GatewaySettings {
                required_capability,
            } = &config.gateway;
            println!();
            println!("Required capability: {}", required_capability);
            if config.rate_limit.enabled {
                println!(
                    "Rate limit: {} requests per {}s",
                    config.rate_limit.limit, config.rate_limit.period_secs
                );
            } else {
                println!("Rate limit: disabled");
            }
        }
        Err(e) => {
            println!("Configuration validation failed:");
            println!("  {}", e);
        }
    }

    Ok(())
}

fn config_set_key(path: PathBuf, provider: &str) -> Result<()> {
    use std::io::{self, Write};

    let mut config = Config::load_file(path.clone())?;
    let Some(settings) = config.providers.get_mut(provider) else {
        println!("Unknown provider: {}", provider);
        println!(
            "Available: {}",
            config.providers.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        return Ok(());
    };
    let env_name = settings.kind.api_key_env();

    println!("Enter your {} API key:", provider);
    print!("> ");
    io::stdout().flush()?;

    let mut key = String::new();
    io::stdin().read_line(&mut key)?;
    let key = key.trim();

    if key.is_empty() {
        println!("No key entered, aborting.");
        return Ok(());
    }

    settings.api_key = key.to_string();
    config.save_to(path)?;

    println!();
    println!("API key saved to config file.");
    println!();
    println!("Alternatively, you can set the environment variable:");
    println!("  export {}=your_key", env_name);

    Ok(())
}

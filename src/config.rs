use crate::conversation::{DEFAULT_DIRECTIVE_VERSION, DEFAULT_SYSTEM_PROMPT, SystemDirective};
use crate::llm::orchestrator::{DEFAULT_FALLBACK_MESSAGE, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::llm::{CompletionSettings, DEFAULT_COMPLETION_BASE_URL, DEFAULT_MODEL, Provider, RetryPolicy, TurnSettings};
use crate::mcp::ToolProviderSettings;
use crate::mcp::client::{DEFAULT_PROTOCOL_VERSION, DEFAULT_TOOL_PROVIDER_URL};
use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Config file picked up from the working directory when none is given.
const CWD_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Completion API base URL
    #[arg(long, env = "LLM_BASE_URL")]
    pub base_url: Option<String>,

    /// Completion API key
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model identifier
    #[arg(long, env = "LLM_MODEL")]
    pub model: Option<String>,

    /// Tool provider JSON-RPC endpoint
    #[arg(long, env = "HTTP_MCP_SERVER_URL")]
    pub mcp_url: Option<String>,

    /// Run tool calls of one reply one after another
    #[arg(long)]
    pub sequential_tools: bool,

    /// Answer from the conversation alone, without offering tools
    #[arg(long)]
    pub no_tools: bool,

    /// Run a single turn with this message and exit
    #[arg(long)]
    pub once: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub completion: CompletionConfig,
    pub tool_provider: ToolProviderConfig,
    pub conversation: ConversationConfig,
}

#[derive(Deserialize, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
    /// Azure only.
    pub deployment_name: Option<String>,
    /// Azure only.
    pub api_version: Option<String>,
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("site_url", &self.site_url)
            .field("site_name", &self.site_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ToolProviderConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
    pub list_changed: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversationConfig {
    pub system_prompt: String,
    pub directive_version: String,
    pub fallback_message: String,
    pub turn_timeout_secs: u64,
    pub parallel_tool_calls: bool,
    pub completion_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(|e| ConfigError::Message(e.to_string()))?;
        Self::load_from_cli(&cli)
    }

    /// Layering: defaults < config file < `CONCIERGE_*` env < CLI flags (and
    /// the env vars clap reads for them).
    pub fn load_from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("completion.base_url", DEFAULT_COMPLETION_BASE_URL)?
            .set_default("completion.model", DEFAULT_MODEL)?
            .set_default("completion.max_tokens", i64::from(DEFAULT_MAX_TOKENS))?
            .set_default("completion.temperature", f64::from(DEFAULT_TEMPERATURE))?
            .set_default("completion.timeout_secs", 60)?
            .set_default("tool_provider.url", DEFAULT_TOOL_PROVIDER_URL)?
            .set_default("tool_provider.timeout_secs", 30)?
            .set_default("tool_provider.protocol_version", DEFAULT_PROTOCOL_VERSION)?
            .set_default("tool_provider.client_name", "mcp")?
            .set_default("tool_provider.client_version", "0.1.0")?
            .set_default("tool_provider.list_changed", true)?
            .set_default("conversation.system_prompt", DEFAULT_SYSTEM_PROMPT)?
            .set_default("conversation.directive_version", DEFAULT_DIRECTIVE_VERSION)?
            .set_default("conversation.fallback_message", DEFAULT_FALLBACK_MESSAGE)?
            .set_default("conversation.turn_timeout_secs", 120)?
            .set_default("conversation.parallel_tool_calls", true)?
            .set_default("conversation.completion_retries", 0)?
            .set_default("conversation.retry_base_delay_ms", 500)?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path).required(true));
        } else if Path::new(CWD_CONFIG_FILE).exists() {
            builder = builder.add_source(File::with_name(CWD_CONFIG_FILE).required(true));
        }

        // E.g. CONCIERGE_COMPLETION__MODEL=openai/gpt-4o
        builder = builder.add_source(
            Environment::with_prefix("CONCIERGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(url) = &cli.base_url {
            builder = builder.set_override("completion.base_url", url.as_str())?;
        }
        if let Some(key) = cli.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            builder = builder.set_override("completion.api_key", key)?;
        }
        if let Some(model) = &cli.model {
            builder = builder.set_override("completion.model", model.as_str())?;
        }
        if let Some(url) = &cli.mcp_url {
            builder = builder.set_override("tool_provider.url", url.as_str())?;
        }
        if cli.sequential_tools {
            builder = builder.set_override("conversation.parallel_tool_calls", false)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("completion.base_url", &self.completion.base_url),
            ("tool_provider.url", &self.tool_provider.url),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::Message(format!("{key} is not a valid URL ({value}): {e}")))?;
        }
        if self.completion.model.trim().is_empty() {
            return Err(ConfigError::Message("completion.model cannot be empty".to_string()));
        }
        if self.conversation.system_prompt.trim().is_empty() {
            return Err(ConfigError::Message(
                "conversation.system_prompt cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn completion_settings(&self) -> CompletionSettings {
        let c = &self.completion;
        let provider = match Provider::detect_from_url(&c.base_url) {
            Provider::AzureOpenAI { api_version, .. } => Provider::AzureOpenAI {
                deployment_name: c.deployment_name.clone().unwrap_or_else(|| c.model.clone()),
                api_version: c.api_version.clone().unwrap_or(api_version),
            },
            other => other,
        };

        CompletionSettings {
            base_url: c.base_url.clone(),
            api_key: c.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: c.model.clone(),
            provider,
            timeout: Duration::from_secs(c.timeout_secs),
            site_url: c.site_url.clone(),
            site_name: c.site_name.clone(),
        }
    }

    pub fn tool_provider_settings(&self) -> ToolProviderSettings {
        let t = &self.tool_provider;
        ToolProviderSettings {
            url: t.url.clone(),
            timeout: Duration::from_secs(t.timeout_secs),
            protocol_version: t.protocol_version.clone(),
            client_name: t.client_name.clone(),
            client_version: t.client_version.clone(),
            list_changed: t.list_changed,
        }
    }

    pub fn turn_settings(&self) -> TurnSettings {
        let conv = &self.conversation;
        TurnSettings {
            directive: SystemDirective::new(&conv.directive_version, &conv.system_prompt),
            fallback_message: conv.fallback_message.clone(),
            max_tokens: self.completion.max_tokens,
            temperature: self.completion.temperature,
            parallel_tool_calls: conv.parallel_tool_calls,
            turn_timeout: Duration::from_secs(conv.turn_timeout_secs),
            retry: RetryPolicy {
                max_retries: conv.completion_retries,
                base_delay: Duration::from_millis(conv.retry_base_delay_ms),
                ..RetryPolicy::default()
            },
        }
    }
}

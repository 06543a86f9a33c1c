use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Upper bound on the duration of a single relay call, in seconds.
    #[arg(long, env = "MAX_DURATION_SECS", default_value = "30")]
    pub max_duration_secs: u64,

    // --- Together Provider Args ---
    /// API Key for the Together provider.
    #[arg(long, env = "TOGETHER_API_KEY", hide_env_values = true)]
    pub together_api_key: Option<String>,

    /// Base URL of the Together OpenAI-compatible API (e.g., https://api.together.xyz/v1)
    #[arg(long, env = "TOGETHER_BASE_URL")] // No default, the provider default applies if None
    pub together_base_url: Option<String>,

    // --- OpenRouter Provider Args ---
    /// API Key for the OpenRouter provider.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    /// Base URL of the OpenRouter OpenAI-compatible API (e.g., https://openrouter.ai/api/v1)
    #[arg(long, env = "OPENROUTER_BASE_URL")]
    pub openrouter_base_url: Option<String>,

    // --- Prompt Args ---
    /// System instruction template prepended to every conversation. `{date}` is replaced with the current date.
    #[arg(long, env = "SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Optional path to a JSON prompt file ({"system_template": "..."}). Overrides --system-prompt.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format) for enabling HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

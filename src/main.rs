use clap::Parser;
use tutor_relay_rs::config::{
    load_env_file, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_MODEL, DEFAULT_UPSTREAM_URL,
};
use tutor_relay_rs::{server, RelayConfig};

#[derive(Parser, Debug)]
#[command(name = "tutor-relay")]
#[command(about = "Tutor relay - forwards a problem image and caption to a multimodal model and returns structured steps")]
struct CliArgs {
    /// Host address to bind the relay server
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port number to bind the relay server
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// API key presented to the upstream model API
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat-completions endpoint of the upstream model API
    #[arg(long, env = "UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    upstream_url: String,

    /// Model name sent with every upstream request
    #[arg(long, env = "MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = 120)]
    request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD_SIZE)]
    max_payload_size: usize,

    /// Log level (off, error, warn, info, debug, trace); RUST_LOG overrides it
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Headers checked for a caller-supplied request id
    #[arg(long, num_args = 0.., default_values_t = ["x-request-id".to_string(), "x-correlation-id".to_string()])]
    request_id_headers: Vec<String>,
}

impl CliArgs {
    fn to_relay_config(&self) -> RelayConfig {
        RelayConfig {
            host: self.host.clone(),
            port: self.port,
            api_key: self.api_key.clone().unwrap_or_default(),
            upstream_url: self.upstream_url.clone(),
            model: self.model.clone(),
            request_timeout_secs: self.request_timeout_secs,
            max_payload_size: self.max_payload_size,
            log_level: Some(if self.verbose {
                "debug".to_string()
            } else {
                self.log_level.clone()
            }),
            request_id_headers: self.request_id_headers.clone(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // `.env` must be loaded before clap reads the `env = ...` fallbacks.
    let env_file = load_env_file(None);
    let cli_args = CliArgs::parse();

    println!("Tutor relay starting...");
    if let Some(env_file) = env_file {
        println!("Loaded environment from {}", env_file.display());
    }
    println!("Host: {}:{}", cli_args.host, cli_args.port);
    println!("Upstream: {} ({})", cli_args.upstream_url, cli_args.model);

    let relay_config = cli_args.to_relay_config();
    relay_config.validate()?;

    actix_web::rt::System::new().block_on(server::startup(relay_config))?;

    Ok(())
}

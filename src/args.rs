use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SettingsAccess {
    /// Settings updates are applied one at a time.
    Serialized,
    /// Settings updates may interleave; the last write wins.
    Unsynchronized,
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Monzo driver for the Databox store", long_about = None)]
pub struct Args {
    #[arg(long, default_value_t = String::from(""), help = "The log directory e.g. '/var/logs'. If this is not provided, only logs out to stdout.")]
    pub base_log_dir: String,

    #[arg(long, env = "PORT", default_value_t = 8080u16)]
    pub port: u16,

    #[arg(
        long,
        env = "DATABOX_STORE_ENDPOINT",
        help = "Base URL of the Databox store e.g. 'https://databox-store:8080'"
    )]
    pub store_endpoint: String,

    #[arg(
        long,
        env = "MONZO_DEFAULT_SETTINGS",
        default_value_t = String::from("monzo-secret.json"),
        help = "JSON file holding the Monzo client_id and client_secret"
    )]
    pub default_settings: String,

    #[arg(
        long,
        env = "MONZO_REDIRECT_URI",
        default_value_t = String::from("http://localhost:3000/oauth/callback"),
        help = "OAuth redirect URI registered with Monzo"
    )]
    pub redirect_uri: String,

    #[arg(long, env = "MONZO_API_URL", default_value_t = String::from("https://api.monzo.com"))]
    pub api_url: String,

    #[arg(long, env = "MONZO_AUTH_URL", default_value_t = String::from("https://auth.monzo.com"))]
    pub auth_url: String,

    #[arg(
        long,
        env = "HTTPS_CERT_PATH",
        requires = "tls_key",
        help = "PEM certificate to serve HTTPS with"
    )]
    pub tls_cert: Option<String>,

    #[arg(
        long,
        env = "HTTPS_KEY_PATH",
        requires = "tls_cert",
        help = "PEM private key to serve HTTPS with"
    )]
    pub tls_key: Option<String>,

    #[arg(
        long,
        default_value_t = 60u64,
        help = "Interval in seconds between scheduler ticks"
    )]
    pub tick_interval: u64,

    #[arg(
        long,
        default_value_t = 60u32,
        help = "Interval in minutes between token refreshes"
    )]
    pub token_refresh_interval: u32,

    #[arg(
        long,
        default_value_t = 30u64,
        help = "Timeout in seconds for requests to Monzo and the store"
    )]
    pub request_timeout: u64,

    #[arg(long, value_enum, default_value_t = SettingsAccess::Serialized)]
    pub settings_access: SettingsAccess,
}

pub fn parse_args() -> Args {
    Args::parse()
}

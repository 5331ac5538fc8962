use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub random_org: RandomOrgConfig,
    #[serde(default)]
    pub shortener: ShortenerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub lottery: LotteryDefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdminConfig {
    /// Bearer token for `/api/v1/admin/*`; empty disables the admin API
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomOrgConfig {
    /// Empty key = external source unconfigured, local fallback only
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_random_org_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_shortener_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Empty token = notifications disabled
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub admin_chat_id: Option<i64>,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub send_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryDefaultsConfig {
    /// Create a default lottery when listing finds no open one
    #[serde(default = "default_true")]
    pub auto_create: bool,
    #[serde(default = "default_ticket_price")]
    pub default_ticket_price: i64,
    #[serde(default = "default_max_tickets")]
    pub default_max_tickets: i32,
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_random_org_endpoint() -> String {
    "https://api.random.org/json-rpc/4/invoke".to_string()
}

fn default_shortener_endpoint() -> String {
    "https://is.gd/create.php".to_string()
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_ticket_price() -> i64 {
    1
}

fn default_max_tickets() -> i32 {
    100
}

impl Default for RandomOrgConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_random_org_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_shortener_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_chat_id: None,
            api_base: default_telegram_api_base(),
            send_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LotteryDefaultsConfig {
    fn default() -> Self {
        Self {
            auto_create: true,
            default_ticket_price: default_ticket_price(),
            default_max_tickets: default_max_tickets(),
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // Without a config file everything comes from the environment
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => toml::from_str(&config_str)
                .map_err(|e| format!("failed to parse config file {config_path}: {e}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let database_url = env::var("DATABASE_URL")
                    .map_err(|_| "DATABASE_URL is not set and config.toml was not found")?;

                Config {
                    server: ServerConfig {
                        host: "0.0.0.0".to_string(),
                        port: 8080,
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: 10,
                    },
                    admin: AdminConfig::default(),
                    random_org: RandomOrgConfig::default(),
                    shortener: ShortenerConfig::default(),
                    telegram: TelegramConfig::default(),
                    lottery: LotteryDefaultsConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("cannot read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables win over file values.
    pub fn apply_env_overrides(&mut self) {
        fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
            env::var(name).ok().and_then(|v| v.parse::<T>().ok())
        }

        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(p) = get_env_parse("SERVER_PORT") {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(mc) = get_env_parse("DB_MAX_CONNECTIONS") {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("ADMIN_TOKEN") {
            self.admin.token = v;
        }

        if let Ok(v) = env::var("RANDOM_API_KEY") {
            self.random_org.api_key = v;
        }
        if let Ok(v) = env::var("RANDOM_ORG_ENDPOINT") {
            self.random_org.endpoint = v;
        }
        if let Some(n) = get_env_parse("RANDOM_ORG_TIMEOUT_SECS") {
            self.random_org.timeout_secs = n;
        }

        if let Some(b) = get_env_parse("SHORTENER_ENABLED") {
            self.shortener.enabled = b;
        }
        if let Ok(v) = env::var("SHORTENER_ENDPOINT") {
            self.shortener.endpoint = v;
        }
        if let Some(n) = get_env_parse("SHORTENER_TIMEOUT_SECS") {
            self.shortener.timeout_secs = n;
        }

        if let Ok(v) = env::var("BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(id) = get_env_parse("ADMIN_CHAT_ID") {
            self.telegram.admin_chat_id = Some(id);
        }
        if let Ok(v) = env::var("TELEGRAM_API_BASE") {
            self.telegram.api_base = v;
        }
        if let Some(n) = get_env_parse("TELEGRAM_SEND_TIMEOUT_SECS") {
            self.telegram.send_timeout_secs = n;
        }

        if let Some(b) = get_env_parse("LOTTERY_AUTO_CREATE") {
            self.lottery.auto_create = b;
        }
        if let Some(p) = get_env_parse("LOTTERY_DEFAULT_TICKET_PRICE") {
            self.lottery.default_ticket_price = p;
        }
        if let Some(m) = get_env_parse("LOTTERY_DEFAULT_MAX_TICKETS") {
            self.lottery.default_max_tickets = m;
        }
    }
}

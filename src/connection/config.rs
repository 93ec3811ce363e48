use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const ENV_HOSTNAME: &str = "DB_HOSTNAME";
pub const ENV_PORT: &str = "DB_PORT";
pub const ENV_USERNAME: &str = "DB_USERNAME";
pub const ENV_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_DATABASE: &str = "DB_DATABASE";
pub const ENV_PARSE_TIME: &str = "DB_PARSE_TIME";
pub const ENV_BACKEND: &str = "DB_BACKEND";
pub const ENV_MAX_CONNECTIONS: &str = "DB_MAX_CONNECTIONS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    MySql,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "memory" | "mem" | "in-memory" => Ok(Self::Memory),
            "mysql" | "mariadb" => Ok(Self::MySql),
            other => Err(format!(
                "{} must be one of: memory, mysql (got '{}')",
                ENV_BACKEND, other
            )),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Memory => write!(f, "memory"),
            Backend::MySql => write!(f, "mysql"),
        }
    }
}

/// Database connection configuration
///
/// Defaults match a stock local MySQL: `root:mysql@localhost:3306/bludgeon`.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database host
    pub host: String,

    /// Database port
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Password for authentication
    pub password: String,

    /// Database name
    pub database: String,

    /// Ask the driver to decode DATETIME columns into time values
    pub parse_time: bool,

    /// Which datastore to open
    pub backend: Backend,

    /// Maximum number of pooled connections
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            username: username.to_string(),
            password: password.to_string(),
            database: "bludgeon".to_string(),
            parse_time: false,
            backend: Backend::Memory,
            max_connections: 10,
        }
    }

    /// Set the database name
    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    /// Set the host
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn parse_time(mut self, parse_time: bool) -> Self {
        self.parse_time = parse_time;
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Defaults overridden by whichever `DB_*` keys are present in `envs`.
    pub fn from_env_map(envs: &HashMap<String, String>) -> Result<Self, String> {
        let mut config = Self::default();

        if let Some(host) = envs.get(ENV_HOSTNAME) {
            config.host = host.clone();
        }
        if let Some(port) = envs.get(ENV_PORT) {
            config.port = port
                .parse()
                .map_err(|_| format!("{} must be a valid u16, got '{}'", ENV_PORT, port))?;
        }
        if let Some(username) = envs.get(ENV_USERNAME) {
            config.username = username.clone();
        }
        if let Some(password) = envs.get(ENV_PASSWORD) {
            config.password = password.clone();
        }
        if let Some(database) = envs.get(ENV_DATABASE) {
            config.database = database.clone();
        }
        if let Some(parse_time) = envs.get(ENV_PARSE_TIME) {
            config.parse_time = parse_bool(parse_time)
                .ok_or_else(|| format!("{} must be a boolean, got '{}'", ENV_PARSE_TIME, parse_time))?;
        }
        if let Some(backend) = envs.get(ENV_BACKEND) {
            config.backend = backend.parse()?;
        }
        if let Some(max) = envs.get(ENV_MAX_CONNECTIONS) {
            config.max_connections = max
                .parse()
                .map_err(|_| format!("{} must be a valid u32, got '{}'", ENV_MAX_CONNECTIONS, max))?;
        }

        Ok(config)
    }

    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        let envs: HashMap<String, String> = std::env::vars().collect();
        Self::from_env_map(&envs)
    }

    /// MySQL DSN including the password. Never log this.
    pub fn mysql_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Convert to connection string
    pub fn to_url(&self) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}?parseTime={}",
            self.backend,
            self.username,
            "***", // Don't expose password
            self.host,
            self.port,
            self.database,
            self.parse_time
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("Host cannot be empty".to_string());
        }

        if self.username.is_empty() {
            return Err("Username cannot be empty".to_string());
        }

        if self.database.is_empty() {
            return Err("Database cannot be empty".to_string());
        }

        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("root", "mysql")
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

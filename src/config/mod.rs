//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Maximum concurrent connections / players
    pub max_players: usize,
    /// Number of selectable teams
    pub num_teams: i32,
    /// Simulation and broadcast ticks per second
    pub tick_rate: u32,
    /// Team kill count that ends the match
    pub kill_limit: u32,

    /// Optional tile map file; the compiled-in layout is used when unset
    pub map_file: Option<PathBuf>,
    /// Optional RNG seed for reproducible runs
    pub game_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:5555".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            max_players: parse_or("MAX_PLAYERS", 6)?,
            num_teams: parse_or("NUM_TEAMS", 3)?,
            tick_rate: parse_or("TICK_RATE", 20)?,
            kill_limit: parse_or("KILL_LIMIT", 15)?,

            map_file: env::var("MAP_FILE").ok().map(PathBuf::from),
            game_seed: match env::var("GAME_SEED") {
                Ok(v) => Some(v.parse().map_err(|_| ConfigError::Invalid("GAME_SEED"))?),
                Err(_) => None,
            },
        })
    }

    /// Simulation step in seconds
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(v) => v.parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

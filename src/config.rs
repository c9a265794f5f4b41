use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Tunables for room creation, turns and rewards
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub max_players: u32,
    pub total_rounds: u32,
    pub wheel_size: usize,
    pub turn_timeout: Duration,
    pub watchdog_interval: Duration,
    pub invite_expiry: Duration,
    pub win_reward_points: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 2,
            total_rounds: 3,
            wheel_size: 10,
            turn_timeout: Duration::from_secs(60),
            watchdog_interval: Duration::from_secs(5),
            invite_expiry: Duration::from_secs(60),
            win_reward_points: 100,
        }
    }
}

/// Process configuration read from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub pets_path: PathBuf,
    pub game: GameConfig,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key = %key, value = %raw, "Unparsable configuration value, using default");
                default
            }
        },
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = GameConfig::default();

        let game = GameConfig {
            max_players: parse_or(&lookup, "PETWHEEL_MAX_PLAYERS", defaults.max_players),
            total_rounds: parse_or(&lookup, "PETWHEEL_TOTAL_ROUNDS", defaults.total_rounds),
            wheel_size: parse_or(&lookup, "PETWHEEL_WHEEL_SIZE", defaults.wheel_size),
            turn_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PETWHEEL_TURN_TIMEOUT_SECS",
                defaults.turn_timeout.as_secs(),
            )),
            watchdog_interval: Duration::from_secs(parse_or(
                &lookup,
                "PETWHEEL_WATCHDOG_INTERVAL_SECS",
                defaults.watchdog_interval.as_secs(),
            )),
            invite_expiry: Duration::from_secs(parse_or(
                &lookup,
                "PETWHEEL_INVITE_EXPIRY_SECS",
                defaults.invite_expiry.as_secs(),
            )),
            win_reward_points: parse_or(
                &lookup,
                "PETWHEEL_WIN_REWARD_POINTS",
                defaults.win_reward_points,
            ),
        };

        Self {
            bind_addr: lookup("PETWHEEL_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            pets_path: lookup("PETWHEEL_PETS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/pets.json")),
            game,
        }
    }
}

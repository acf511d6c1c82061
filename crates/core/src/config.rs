use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SCHEDULE_URL: &str = "https://spla2.yuu26.com/league/schedule";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub display: DisplayConfig,
    pub schedule: ScheduleConfig,
    pub reactions: ReactionConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub token: SecretString,
    pub user_id: String,
}

#[derive(Clone, Debug)]
pub struct DisplayConfig {
    pub timezone: String,
}

#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ReactionConfig {
    pub join_emoji: String,
    pub leave_emoji: String,
    pub stop_emoji: String,
    pub leave_mode: LeaveMode,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Which reaction events count as leaving a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveMode {
    /// Removing the join reaction leaves.
    JoinRemoval,
    /// Adding the dedicated leave reaction leaves.
    Dedicated,
    Both,
}

impl LeaveMode {
    pub fn uses_join_removal(self) -> bool {
        matches!(self, Self::JoinRemoval | Self::Both)
    }

    pub fn uses_dedicated_emoji(self) -> bool {
        matches!(self, Self::Dedicated | Self::Both)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub bot_user_id: Option<String>,
    pub display_timezone: Option<String>,
    pub schedule_url: Option<String>,
    pub leave_mode: Option<LeaveMode>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot: BotConfig { token: String::new().into(), user_id: String::new() },
            display: DisplayConfig { timezone: "Asia/Tokyo".to_string() },
            schedule: ScheduleConfig { url: DEFAULT_SCHEDULE_URL.to_string(), timeout_secs: 5 },
            reactions: ReactionConfig {
                join_emoji: "✋".to_string(),
                leave_emoji: "↩".to_string(),
                stop_emoji: "🚫".to_string(),
                leave_mode: LeaveMode::JoinRemoval,
            },
            gateway: GatewayConfig { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LeaveMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "join_removal" => Ok(Self::JoinRemoval),
            "dedicated" => Ok(Self::Dedicated),
            "both" => Ok(Self::Both),
            other => Err(ConfigError::Validation(format!(
                "unsupported leave mode `{other}` (expected join_removal|dedicated|both)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("boshu.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Display timezone; only valid after `validate` succeeded.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        parse_timezone(&self.display.timezone)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(bot) = patch.bot {
            if let Some(bot_token_value) = bot.token {
                self.bot.token = secret_value(bot_token_value);
            }
            if let Some(user_id) = bot.user_id {
                self.bot.user_id = user_id;
            }
        }

        if let Some(display) = patch.display {
            if let Some(timezone) = display.timezone {
                self.display.timezone = timezone;
            }
        }

        if let Some(schedule) = patch.schedule {
            if let Some(url) = schedule.url {
                self.schedule.url = url;
            }
            if let Some(timeout_secs) = schedule.timeout_secs {
                self.schedule.timeout_secs = timeout_secs;
            }
        }

        if let Some(reactions) = patch.reactions {
            if let Some(join_emoji) = reactions.join_emoji {
                self.reactions.join_emoji = join_emoji;
            }
            if let Some(leave_emoji) = reactions.leave_emoji {
                self.reactions.leave_emoji = leave_emoji;
            }
            if let Some(stop_emoji) = reactions.stop_emoji {
                self.reactions.stop_emoji = stop_emoji;
            }
            if let Some(leave_mode) = reactions.leave_mode {
                self.reactions.leave_mode = leave_mode;
            }
        }

        if let Some(gateway) = patch.gateway {
            if let Some(max_retries) = gateway.max_retries {
                self.gateway.max_retries = max_retries;
            }
            if let Some(base_delay_ms) = gateway.base_delay_ms {
                self.gateway.base_delay_ms = base_delay_ms;
            }
            if let Some(max_delay_ms) = gateway.max_delay_ms {
                self.gateway.max_delay_ms = max_delay_ms;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let bot_token = read_env("BOSHU_BOT_TOKEN").or_else(|| read_env("DISCORD_BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.bot.token = secret_value(value);
        }
        if let Some(value) = read_env("BOSHU_BOT_USER_ID") {
            self.bot.user_id = value;
        }

        if let Some(value) = read_env("BOSHU_DISPLAY_TIMEZONE") {
            self.display.timezone = value;
        }

        if let Some(value) = read_env("BOSHU_SCHEDULE_URL") {
            self.schedule.url = value;
        }
        if let Some(value) = read_env("BOSHU_SCHEDULE_TIMEOUT_SECS") {
            self.schedule.timeout_secs = parse_u64("BOSHU_SCHEDULE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BOSHU_REACTIONS_JOIN_EMOJI") {
            self.reactions.join_emoji = value;
        }
        if let Some(value) = read_env("BOSHU_REACTIONS_LEAVE_EMOJI") {
            self.reactions.leave_emoji = value;
        }
        if let Some(value) = read_env("BOSHU_REACTIONS_STOP_EMOJI") {
            self.reactions.stop_emoji = value;
        }
        if let Some(value) = read_env("BOSHU_REACTIONS_LEAVE_MODE") {
            self.reactions.leave_mode = value.parse()?;
        }

        if let Some(value) = read_env("BOSHU_GATEWAY_MAX_RETRIES") {
            self.gateway.max_retries = parse_u32("BOSHU_GATEWAY_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("BOSHU_GATEWAY_BASE_DELAY_MS") {
            self.gateway.base_delay_ms = parse_u64("BOSHU_GATEWAY_BASE_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("BOSHU_GATEWAY_MAX_DELAY_MS") {
            self.gateway.max_delay_ms = parse_u64("BOSHU_GATEWAY_MAX_DELAY_MS", &value)?;
        }

        let log_level = read_env("BOSHU_LOGGING_LEVEL").or_else(|| read_env("BOSHU_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("BOSHU_LOGGING_FORMAT").or_else(|| read_env("BOSHU_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token) = overrides.bot_token {
            self.bot.token = secret_value(bot_token);
        }
        if let Some(bot_user_id) = overrides.bot_user_id {
            self.bot.user_id = bot_user_id;
        }
        if let Some(timezone) = overrides.display_timezone {
            self.display.timezone = timezone;
        }
        if let Some(schedule_url) = overrides.schedule_url {
            self.schedule.url = schedule_url;
        }
        if let Some(leave_mode) = overrides.leave_mode {
            self.reactions.leave_mode = leave_mode;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bot(&self.bot)?;
        parse_timezone(&self.display.timezone)?;
        validate_schedule(&self.schedule)?;
        validate_reactions(&self.reactions)?;
        validate_gateway(&self.gateway)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("boshu.toml"), PathBuf::from("config/boshu.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn parse_timezone(value: &str) -> Result<Tz, ConfigError> {
    value.trim().parse::<Tz>().map_err(|_| {
        ConfigError::Validation(format!(
            "display.timezone `{value}` is not a known IANA timezone (e.g. `Asia/Tokyo`)"
        ))
    })
}

fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    if bot.token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "bot.token is required. Set BOSHU_BOT_TOKEN (or DISCORD_BOT_TOKEN) to the bot's authentication token".to_string(),
        ));
    }

    if bot.user_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "bot.user_id is required so reactions on foreign messages can be ignored".to_string(),
        ));
    }

    Ok(())
}

fn validate_schedule(schedule: &ScheduleConfig) -> Result<(), ConfigError> {
    let url = schedule.url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "schedule.url must start with http:// or https://".to_string(),
        ));
    }

    if schedule.timeout_secs == 0 || schedule.timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "schedule.timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    Ok(())
}

fn validate_reactions(reactions: &ReactionConfig) -> Result<(), ConfigError> {
    let join = reactions.join_emoji.trim();
    let leave = reactions.leave_emoji.trim();
    let stop = reactions.stop_emoji.trim();

    if join.is_empty() || stop.is_empty() {
        return Err(ConfigError::Validation(
            "reactions.join_emoji and reactions.stop_emoji must not be empty".to_string(),
        ));
    }
    if join == stop {
        return Err(ConfigError::Validation(
            "reactions.join_emoji and reactions.stop_emoji must differ".to_string(),
        ));
    }

    if reactions.leave_mode.uses_dedicated_emoji() {
        if leave.is_empty() {
            return Err(ConfigError::Validation(
                "reactions.leave_emoji is required when reactions.leave_mode uses a dedicated emoji"
                    .to_string(),
            ));
        }
        if leave == join || leave == stop {
            return Err(ConfigError::Validation(
                "reactions.leave_emoji must differ from the join and stop emoji".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    if gateway.base_delay_ms > gateway.max_delay_ms {
        return Err(ConfigError::Validation(
            "gateway.base_delay_ms must not exceed gateway.max_delay_ms".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    bot: Option<BotPatch>,
    display: Option<DisplayPatch>,
    schedule: Option<SchedulePatch>,
    reactions: Option<ReactionsPatch>,
    gateway: Option<GatewayPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    token: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DisplayPatch {
    timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulePatch {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReactionsPatch {
    join_emoji: Option<String>,
    leave_emoji: Option<String>,
    stop_emoji: Option<String>,
    leave_mode: Option<LeaveMode>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LeaveMode, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_BOSHU_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("boshu.toml");
            fs::write(
                &path,
                r#"
[bot]
token = "${TEST_BOSHU_TOKEN}"
user_id = "900"

[reactions]
leave_mode = "both"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.bot.token.expose_secret() == "token-from-env",
                "bot token should be interpolated from environment",
            )?;
            ensure(config.bot.user_id == "900", "bot user id should come from the file")?;
            ensure(
                config.reactions.leave_mode == LeaveMode::Both,
                "leave mode should come from the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_BOSHU_TOKEN"]);
        result
    }

    #[test]
    fn legacy_token_variable_is_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("DISCORD_BOT_TOKEN", "legacy-token");
        env::set_var("BOSHU_BOT_USER_ID", "900");
        env::set_var("BOSHU_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.bot.token.expose_secret() == "legacy-token",
                "legacy token variable should be honored",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env alias",
            )?;
            ensure(config.display.timezone == "Asia/Tokyo", "default timezone should be Tokyo")?;
            Ok(())
        })();

        clear_vars(&["DISCORD_BOT_TOKEN", "BOSHU_BOT_USER_ID", "BOSHU_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BOSHU_BOT_TOKEN", "token-from-env");
        env::set_var("BOSHU_SCHEDULE_URL", "https://env.example/schedule");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("boshu.toml");
            fs::write(
                &path,
                r#"
[bot]
token = "token-from-file"
user_id = "900"

[schedule]
url = "https://file.example/schedule"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    display_timezone: Some("UTC".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.display.timezone == "UTC", "override timezone should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.schedule.url == "https://env.example/schedule",
                "env schedule url should win over file",
            )?;
            ensure(
                config.bot.token.expose_secret() == "token-from-env",
                "env token should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["BOSHU_BOT_TOKEN", "BOSHU_SCHEDULE_URL"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BOSHU_BOT_USER_ID", "900");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("bot.token")
            );
            ensure(has_message, "validation failure should mention bot.token")
        })();

        clear_vars(&["BOSHU_BOT_USER_ID"]);
        result
    }

    #[test]
    fn unknown_timezone_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some("token".to_string()),
                bot_user_id: Some("900".to_string()),
                display_timezone: Some("Mars/Olympus".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::Validation(ref message)) if message.contains("display.timezone")),
            "unknown timezone should fail validation",
        )
    }

    #[test]
    fn dedicated_leave_emoji_must_be_distinct() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BOSHU_REACTIONS_LEAVE_EMOJI", "✋");

        let result = (|| -> Result<(), String> {
            let outcome = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    bot_token: Some("token".to_string()),
                    bot_user_id: Some("900".to_string()),
                    leave_mode: Some(LeaveMode::Dedicated),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            });
            ensure(
                matches!(outcome, Err(ConfigError::Validation(ref message)) if message.contains("leave_emoji")),
                "duplicate leave emoji should fail validation",
            )
        })();

        clear_vars(&["BOSHU_REACTIONS_LEAVE_EMOJI"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BOSHU_BOT_TOKEN", "very-secret-token-value");
        env::set_var("BOSHU_BOT_USER_ID", "900");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("very-secret-token-value"),
                "debug output should not contain the bot token",
            )?;
            ensure(config.timezone().is_ok(), "default timezone should resolve")?;
            Ok(())
        })();

        clear_vars(&["BOSHU_BOT_TOKEN", "BOSHU_BOT_USER_ID"]);
        result
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use boshu_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct ConfigField {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    vec![
        ConfigField {
            key: "bot.token",
            value: redact_token(config.bot.token.expose_secret()),
            env_keys: &["BOSHU_BOT_TOKEN", "DISCORD_BOT_TOKEN"],
        },
        ConfigField {
            key: "bot.user_id",
            value: config.bot.user_id.clone(),
            env_keys: &["BOSHU_BOT_USER_ID"],
        },
        ConfigField {
            key: "display.timezone",
            value: config.display.timezone.clone(),
            env_keys: &["BOSHU_DISPLAY_TIMEZONE"],
        },
        ConfigField {
            key: "schedule.url",
            value: config.schedule.url.clone(),
            env_keys: &["BOSHU_SCHEDULE_URL"],
        },
        ConfigField {
            key: "schedule.timeout_secs",
            value: config.schedule.timeout_secs.to_string(),
            env_keys: &["BOSHU_SCHEDULE_TIMEOUT_SECS"],
        },
        ConfigField {
            key: "reactions.join_emoji",
            value: config.reactions.join_emoji.clone(),
            env_keys: &["BOSHU_REACTIONS_JOIN_EMOJI"],
        },
        ConfigField {
            key: "reactions.leave_emoji",
            value: config.reactions.leave_emoji.clone(),
            env_keys: &["BOSHU_REACTIONS_LEAVE_EMOJI"],
        },
        ConfigField {
            key: "reactions.stop_emoji",
            value: config.reactions.stop_emoji.clone(),
            env_keys: &["BOSHU_REACTIONS_STOP_EMOJI"],
        },
        ConfigField {
            key: "reactions.leave_mode",
            value: format!("{:?}", config.reactions.leave_mode),
            env_keys: &["BOSHU_REACTIONS_LEAVE_MODE"],
        },
        ConfigField {
            key: "gateway.max_retries",
            value: config.gateway.max_retries.to_string(),
            env_keys: &["BOSHU_GATEWAY_MAX_RETRIES"],
        },
        ConfigField {
            key: "gateway.base_delay_ms",
            value: config.gateway.base_delay_ms.to_string(),
            env_keys: &["BOSHU_GATEWAY_BASE_DELAY_MS"],
        },
        ConfigField {
            key: "gateway.max_delay_ms",
            value: config.gateway.max_delay_ms.to_string(),
            env_keys: &["BOSHU_GATEWAY_MAX_DELAY_MS"],
        },
        ConfigField {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["BOSHU_LOGGING_LEVEL", "BOSHU_LOG_LEVEL"],
        },
        ConfigField {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["BOSHU_LOGGING_FORMAT", "BOSHU_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("boshu.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/boshu.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let set_env = env_keys.iter().find(|env_key| {
        env::var(env_key).map(|value| !value.trim().is_empty()).unwrap_or(false)
    });
    if let Some(env_key) = set_env {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the first four characters so operators can tell tokens apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let prefix: String = trimmed.chars().take(4).collect();
    if prefix.chars().count() == trimmed.chars().count() {
        return "<redacted>".to_string();
    }
    format!("{prefix}***")
}

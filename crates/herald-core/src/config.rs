use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{LinkButton, PublishOptions, TelegramCredentials},
    errors::Error,
    Result,
};

/// Typed configuration loaded from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Destinations
    pub legacy_telegram: Option<TelegramCredentials>,
    pub telegram_api_url: Option<String>,
    pub notify_chat_id: Option<String>,

    // Storage
    pub store_path: PathBuf,

    // Size limits
    pub telegram_caption_limit: usize,
    pub telegram_text_limit: usize,
    pub max_content_length: usize,

    // Timing
    pub scheduler_interval: Duration,
    pub part_delay: Duration,
    pub chunk_delay: Duration,
    pub caption_followup_delay: Duration,

    // Publish defaults
    pub default_silent: bool,
    pub default_buttons: Vec<LinkButton>,
}

impl Config {
    /// Read the environment. Load `.env` first with [`load_dotenv`].
    pub fn load() -> Result<Self> {
        let legacy_telegram = legacy_credentials(
            env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty),
            env_str("TELEGRAM_CHANNEL_ID").and_then(non_empty),
            env_str("TELEGRAM_THREAD_ID"),
        )?;
        let telegram_api_url = env_str("TELEGRAM_API_URL").and_then(non_empty);
        let notify_chat_id = env_str("HERALD_NOTIFY_CHAT_ID").and_then(non_empty);

        let store_path = env_path("HERALD_STORE_PATH")
            .unwrap_or_else(|| PathBuf::from("herald-store.json"));

        // Safety margins under Telegram's 1024 / 4096.
        let telegram_caption_limit = positive("TELEGRAM_CAPTION_LIMIT", 1000)?;
        let telegram_text_limit = positive("TELEGRAM_TEXT_LIMIT", 4000)?;
        let max_content_length = positive("HERALD_MAX_CONTENT_LENGTH", 5000)?;

        let scheduler_interval =
            Duration::from_millis(env_u64("HERALD_SCHEDULER_INTERVAL_MS").unwrap_or(30_000));
        if scheduler_interval.is_zero() {
            return Err(Error::Config(
                "HERALD_SCHEDULER_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }
        let part_delay = Duration::from_millis(env_u64("HERALD_PART_DELAY_MS").unwrap_or(500));
        let chunk_delay =
            Duration::from_millis(env_u64("TELEGRAM_CHUNK_DELAY_MS").unwrap_or(300));
        let caption_followup_delay =
            Duration::from_millis(env_u64("TELEGRAM_CAPTION_FOLLOWUP_DELAY_MS").unwrap_or(500));

        let default_silent = env_bool("HERALD_SILENT").unwrap_or(false);
        let default_buttons = parse_buttons(env_str("HERALD_BUTTONS"))?;

        Ok(Self {
            legacy_telegram,
            telegram_api_url,
            notify_chat_id,
            store_path,
            telegram_caption_limit,
            telegram_text_limit,
            max_content_length,
            scheduler_interval,
            part_delay,
            chunk_delay,
            caption_followup_delay,
            default_silent,
            default_buttons,
        })
    }

    pub fn publish_defaults(&self) -> PublishOptions {
        PublishOptions {
            silent: self.default_silent,
            buttons: self.default_buttons.clone(),
        }
    }
}

fn legacy_credentials(
    token: Option<String>,
    channel: Option<String>,
    thread: Option<String>,
) -> Result<Option<TelegramCredentials>> {
    let message_thread_id = match thread.and_then(non_empty) {
        Some(raw) => Some(raw.trim().parse::<i32>().map_err(|_| {
            Error::Config(format!("TELEGRAM_THREAD_ID must be an integer, got {raw}"))
        })?),
        None => None,
    };

    match (token, channel) {
        (Some(bot_token), Some(channel_id)) => Ok(Some(TelegramCredentials {
            bot_token,
            channel_id,
            message_thread_id,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(Error::Config(
            "TELEGRAM_BOT_TOKEN is set but TELEGRAM_CHANNEL_ID is missing".to_string(),
        )),
        (None, Some(_)) => Err(Error::Config(
            "TELEGRAM_CHANNEL_ID is set but TELEGRAM_BOT_TOKEN is missing".to_string(),
        )),
    }
}

/// Parse `Label|https://url;Label2|https://url2`.
fn parse_buttons(v: Option<String>) -> Result<Vec<LinkButton>> {
    v.unwrap_or_default()
        .split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let Some((label, url)) = entry.split_once('|') else {
                return Err(Error::Config(format!(
                    "HERALD_BUTTONS entry must be Label|URL, got {entry}"
                )));
            };
            let (label, url) = (label.trim(), url.trim());
            if label.is_empty() || !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(Error::Config(format!(
                    "HERALD_BUTTONS entry has an empty label or a non-http URL: {entry}"
                )));
            }
            Ok(LinkButton {
                label: label.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

fn positive(key: &str, default: usize) -> Result<usize> {
    let v = env_usize(key).unwrap_or(default);
    if v == 0 {
        return Err(Error::Config(format!("{key} must be greater than 0")));
    }
    Ok(v)
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Export `KEY=value` pairs from a dotenv file into the process environment.
///
/// Variables already set win over the file. A missing file is not an error.
/// Returns how many variables were exported. Call this before anything reads
/// the environment, logging included.
pub fn load_dotenv(path: &Path) -> Result<usize> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut exported = 0;
    for (key, value) in parse_dotenv(&contents) {
        if env::var_os(&key).is_none() {
            env::set_var(key, value);
            exported += 1;
        }
    }
    Ok(exported)
}

/// Parse dotenv text: `KEY=value`, optional `export ` prefix, `#` comments,
/// single or double quoted values. Lines without `=` are ignored.
fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, raw) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return None;
            }
            Some((key.to_string(), dotenv_value(raw.trim())))
        })
        .collect()
}

fn dotenv_value(raw: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(inner) = raw.strip_prefix(quote) {
            if let Some(end) = inner.find(quote) {
                return inner[..end].to_string();
            }
        }
    }
    match raw.find(" #") {
        Some(i) => raw[..i].trim_end().to_string(),
        None => raw.to_string(),
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_button_list() {
        let buttons =
            parse_buttons(Some("Site|https://example.com; Docs | https://docs.example.com".into()))
                .unwrap();
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[1].label, "Docs");
        assert_eq!(buttons[1].url, "https://docs.example.com");

        assert!(parse_buttons(None).unwrap().is_empty());
        assert!(parse_buttons(Some("no-separator".into())).is_err());
        assert!(parse_buttons(Some("Label|ftp://x".into())).is_err());
    }

    #[test]
    fn legacy_credentials_need_token_and_channel() {
        let creds = legacy_credentials(Some("t".into()), Some("@c".into()), Some("12".into()))
            .unwrap()
            .unwrap();
        assert_eq!(creds.message_thread_id, Some(12));

        assert!(legacy_credentials(None, None, None).unwrap().is_none());
        assert!(legacy_credentials(Some("t".into()), None, None).is_err());
        assert!(legacy_credentials(None, Some("@c".into()), None).is_err());
        assert!(legacy_credentials(Some("t".into()), Some("@c".into()), Some("x".into())).is_err());
    }

    #[test]
    fn dotenv_lines_parse_like_a_shell_would_read_them() {
        let parsed = parse_dotenv(
            "# comment\n\
             TELEGRAM_BOT_TOKEN=123:abc\n\
             export RUST_LOG=herald=debug\n\
             HERALD_BUTTONS=\"Site|https://example.com # kept\"\n\
             TELEGRAM_CHANNEL_ID='@news' # trailing\n\
             HERALD_SILENT=true # trailing\n\
             not a pair\n\
             BAD KEY=x\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_BOT_TOKEN".to_string(), "123:abc".to_string()),
                ("RUST_LOG".to_string(), "herald=debug".to_string()),
                (
                    "HERALD_BUTTONS".to_string(),
                    "Site|https://example.com # kept".to_string()
                ),
                ("TELEGRAM_CHANNEL_ID".to_string(), "@news".to_string()),
                ("HERALD_SILENT".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn dotenv_does_not_override_the_environment() {
        let dir = std::env::temp_dir().join(format!("herald-dotenv-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".env");
        fs::write(
            &path,
            "HERALD_DOTENV_TEST_NEW=from-file\nHERALD_DOTENV_TEST_SET=from-file\n",
        )
        .unwrap();
        env::set_var("HERALD_DOTENV_TEST_SET", "from-env");

        assert_eq!(load_dotenv(&path).unwrap(), 1);
        assert_eq!(env::var("HERALD_DOTENV_TEST_NEW").unwrap(), "from-file");
        assert_eq!(env::var("HERALD_DOTENV_TEST_SET").unwrap(), "from-env");

        assert_eq!(load_dotenv(&dir.join("missing.env")).unwrap(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }
}

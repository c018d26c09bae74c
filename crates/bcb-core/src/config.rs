use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the bot, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,

    // Draft flow
    pub draft_ttl: Duration,

    // Exchange rates
    pub rates_file: PathBuf,
    pub rates_refresh_interval: Duration,
    pub rate_currencies: Vec<String>,
    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        // Drafts left untouched this long are discarded on next read.
        let draft_ttl = Duration::from_secs(env_u64("DRAFT_TTL_SECS").unwrap_or(3600));

        let rates_file =
            PathBuf::from(env_str("RATES_FILE").unwrap_or("exchangeRates.json".to_string()));
        let rates_refresh_interval =
            Duration::from_secs(env_u64("RATES_REFRESH_SECS").unwrap_or(1800));
        let rate_currencies = parse_csv_lower(
            env_str("RATE_CURRENCIES").or_else(|| Some("usdt,rub,sar,usd,kzt".to_string())),
        );
        let http_timeout = Duration::from_millis(env_u64("HTTP_TIMEOUT_MS").unwrap_or(10_000));

        Ok(Self {
            telegram_bot_token,
            draft_ttl,
            rates_file,
            rates_refresh_interval,
            rate_currencies,
            http_timeout,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_csv_lower(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

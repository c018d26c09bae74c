//! Exchange-rate cache and currency arithmetic.
//!
//! Rates are scraped from the Google search results page for "<from> to <to>"
//! and persisted to a JSON file with a fetch timestamp. Commands only ever
//! read the cached table; refreshing happens on a schedule in the background.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{errors::Error, Result};

/// Every fetched pair, keyed `rates[from][to]`, plus when the sweep ran.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RateTable {
    pub fetched_at: String,
    pub rates: HashMap<String, HashMap<String, f64>>,
}

impl RateTable {
    pub fn rate(&self, from: &str, to: &str) -> Option<f64> {
        self.rates
            .get(&from.to_lowercase())?
            .get(&to.to_lowercase())
            .copied()
    }
}

/// Port for fetching a single currency pair.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch(&self, from: &str, to: &str) -> Result<f64>;
}

/// Scrapes the rate Google shows for a "<from> to <to>" search.
pub struct GoogleRateSource {
    http: reqwest::Client,
}

impl GoogleRateSource {
    pub fn new(timeout: std::time::Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; bcb/0.1)")
            .build()
            .map_err(|e| Error::External(format!("http client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl RateSource for GoogleRateSource {
    async fn fetch(&self, from: &str, to: &str) -> Result<f64> {
        let url = format!("https://www.google.com/search?q={from}+to+{to}");
        let html = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::External(format!("rate fetch failed: {e}")))?
            .text()
            .await
            .map_err(|e| Error::External(format!("rate fetch failed: {e}")))?;

        parse_rate_from_html(&html)
            .ok_or_else(|| Error::External(format!("no rate found for {from}->{to}")))
    }
}

/// The conversion widget renders the number inside a `span.DFlfde` element.
/// Thousands separators vary by locale; the decimal comma is normalized.
pub fn parse_rate_from_html(html: &str) -> Option<f64> {
    let re = Regex::new(r#"class="DFlfde[^"]*"[^>]*>([0-9][0-9\s.,]*)<"#).expect("valid regex");
    let raw = re.captures(html)?.get(1)?.as_str();
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().ok()
}

/// Disk-backed table of every configured currency pair.
pub struct RateCache {
    path: PathBuf,
    currencies: Vec<String>,
}

impl RateCache {
    pub fn new(path: PathBuf, currencies: Vec<String>) -> Self {
        Self { path, currencies }
    }

    pub fn load(&self) -> Result<Option<RateTable>> {
        load_table(&self.path)
    }

    /// Fetch every pair and persist the result. Pairs that fail to fetch are
    /// logged and left out; the rest of the table still updates.
    pub async fn refresh(&self, source: &dyn RateSource) -> Result<RateTable> {
        let mut rates: HashMap<String, HashMap<String, f64>> = HashMap::new();
        for from in &self.currencies {
            let row = rates.entry(from.clone()).or_default();
            for to in &self.currencies {
                if from == to {
                    continue;
                }
                match source.fetch(from, to).await {
                    Ok(rate) => {
                        row.insert(to.clone(), rate);
                    }
                    Err(e) => warn!(from = %from, to = %to, error = %e, "rate fetch failed"),
                }
            }
        }

        let table = RateTable {
            fetched_at: Utc::now().to_rfc3339(),
            rates,
        };
        save_table(&self.path, &table)?;
        Ok(table)
    }
}

fn load_table(path: &Path) -> Result<Option<RateTable>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&txt)?))
}

fn save_table(path: &Path, table: &RateTable) -> Result<()> {
    let txt = serde_json::to_string_pretty(table)?;
    std::fs::write(path, txt)?;
    Ok(())
}

/// Outcome of running an amount through a full conversion cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProfitOutcome {
    pub final_amount: f64,
    pub profit: f64,
    pub profit_pct: f64,
}

/// Local -> USDT -> SAR -> local round trip at user-supplied rates.
pub fn profit_cycle(
    initial: f64,
    rate_usdt_local: f64,
    rate_usdt_sar: f64,
    rate_sar_local: f64,
) -> ProfitOutcome {
    let usdt = initial / rate_usdt_local;
    let sar = usdt * rate_usdt_sar;
    let final_amount = sar * rate_sar_local;
    let profit = final_amount - initial;
    ProfitOutcome {
        final_amount,
        profit,
        profit_pct: profit / initial * 100.0,
    }
}

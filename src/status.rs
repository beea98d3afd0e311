use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde::Deserialize;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Market state signalling that weights may be recomputed.
pub const MARKET_OPEN: i64 = 1;

static CLIENT: OnceCell<Client> = OnceCell::new();

fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// Round/market snapshot from the external status provider.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MarketStatus {
    #[serde(rename = "rodada_atual")]
    pub current_round: u32,
    #[serde(rename = "status_mercado")]
    pub market_state: i64,
}

impl MarketStatus {
    pub fn is_open(&self) -> bool {
        self.market_state == MARKET_OPEN
    }
}

pub fn fetch_market_status(url: &str) -> Result<MarketStatus> {
    let response = http_client()?
        .get(url)
        .send()
        .with_context(|| format!("request market status from {url}"))?
        .error_for_status()
        .context("market status endpoint returned an error")?;
    response
        .json::<MarketStatus>()
        .context("decode market status payload")
}

//! Public REST API
//!
//! Unauthenticated market information: service status, quotes, klines, and
//! trading rules.

use super::api_types::{KlineInterval, Kline, MarketStatus, PriceType, SymbolRule, Ticker};
use super::error::GmoError;
use super::http_client::GmoHttpClient;
use crate::infrastructure::config::RestSettings;

/// Client for the public REST endpoints.
#[derive(Debug, Clone)]
pub struct PublicApi {
    http: GmoHttpClient,
}

impl PublicApi {
    /// Create a client from REST settings.
    pub fn new(settings: &RestSettings) -> Result<Self, GmoError> {
        Ok(Self {
            http: GmoHttpClient::new(settings.public_url.clone(), settings.timeout)?,
        })
    }

    /// Service status.
    pub async fn status(&self) -> Result<MarketStatus, GmoError> {
        self.http.get("/v1/status", &[]).await?.into_data()
    }

    /// Latest quote for every symbol.
    pub async fn ticker(&self) -> Result<Vec<Ticker>, GmoError> {
        self.http.get("/v1/ticker", &[]).await?.into_data()
    }

    /// OHLC bars for one symbol.
    ///
    /// `date` is `YYYYMMDD` for intervals up to one hour and `YYYY` above.
    pub async fn klines(
        &self,
        symbol: &str,
        price_type: PriceType,
        interval: KlineInterval,
        date: &str,
    ) -> Result<Vec<Kline>, GmoError> {
        let query = [
            ("symbol", symbol.to_string()),
            ("priceType", price_type.as_str().to_string()),
            ("interval", interval.as_str().to_string()),
            ("date", date.to_string()),
        ];
        self.http.get("/v1/klines", &query).await?.into_data()
    }

    /// Trading rules for every symbol.
    pub async fn symbols(&self) -> Result<Vec<SymbolRule>, GmoError> {
        self.http.get("/v1/symbols", &[]).await?.into_data()
    }
}

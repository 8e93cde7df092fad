//! 주요 지수 현황 (`market`).
//!
//! S&P 500, NASDAQ, KOSPI, KOSDAQ, USD/KRW의 최근 종가와 전일 대비 변동을 제공합니다.
//! 조회에 실패한 지수는 결과에서 빠지며, 모두 실패하면 정적 기본값을 사용합니다.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::last_change;
use crate::error::FetchError;
use crate::provider::{round_to, FetchResult, Fetcher, QuoteSource};

/// 조회 대상 지수 `(표시 이름, 조회 심볼, 표시 심볼)`.
pub const MAJOR_INDICES: [(&str, &str, &str); 5] = [
    ("S&P 500", "^GSPC", "SPX"),
    ("NASDAQ", "^IXIC", "IXIC"),
    ("KOSPI", "^KS11", "KOSPI"),
    ("KOSDAQ", "^KQ11", "KOSDAQ"),
    ("USD/KRW", "KRW=X", "USDKRW"),
];

/// 지수 시세.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

/// `market` 데이터셋 스냅샷.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketOverview {
    pub indices: Vec<IndexQuote>,
}

impl MarketOverview {
    /// 외부 소스를 사용할 수 없을 때의 정적 값.
    pub fn fallback() -> Self {
        let quote = |name: &str, symbol: &str, price, change, change_percent| IndexQuote {
            name: name.to_string(),
            symbol: symbol.to_string(),
            price,
            change,
            change_percent,
        };

        Self {
            indices: vec![
                quote("S&P 500", "SPX", 4783.45, 1.24, 0.026),
                quote("NASDAQ", "IXIC", 15095.14, 45.32, 0.301),
                quote("KOSPI", "KOSPI", 2594.35, -8.45, -0.325),
            ],
        }
    }
}

/// 주요 지수 페처.
pub struct MarketFetcher {
    source: Arc<dyn QuoteSource>,
}

impl MarketFetcher {
    pub fn new(source: Arc<dyn QuoteSource>) -> Self {
        Self { source }
    }

    async fn fetch_index(
        &self,
        name: &str,
        symbol: &str,
        display: &str,
    ) -> Result<IndexQuote, FetchError> {
        let bars = self.source.daily_bars(symbol, "5d").await?;
        let last = bars
            .last()
            .ok_or_else(|| FetchError::NoData(symbol.to_string()))?;
        let (change, change_percent) = last_change(&bars).unwrap_or_default();

        Ok(IndexQuote {
            name: name.to_string(),
            symbol: display.to_string(),
            price: round_to(last.close, 2),
            change: round_to(change, 2),
            change_percent: round_to(change_percent, 3),
        })
    }
}

#[async_trait]
impl Fetcher for MarketFetcher {
    type Output = MarketOverview;

    fn name(&self) -> &'static str {
        super::MARKET
    }

    fn fallback(&self) -> MarketOverview {
        MarketOverview::fallback()
    }

    async fn fetch(&self) -> FetchResult<MarketOverview> {
        let results = join_all(
            MAJOR_INDICES
                .iter()
                .map(|(name, symbol, display)| self.fetch_index(name, symbol, display)),
        )
        .await;

        let mut indices = Vec::with_capacity(results.len());
        let mut last_error = None;
        for ((name, symbol, _), result) in MAJOR_INDICES.iter().zip(results) {
            match result {
                Ok(quote) => indices.push(quote),
                Err(e) => {
                    warn!(index = %name, symbol = %symbol, error = %e, "지수 조회 실패");
                    last_error = Some(e);
                }
            }
        }

        if indices.is_empty() {
            let reason = last_error.unwrap_or_else(|| FetchError::NoData("indices".to_string()));
            return FetchResult::failure(MarketOverview::fallback(), reason);
        }
        FetchResult::Success(MarketOverview { indices })
    }
}

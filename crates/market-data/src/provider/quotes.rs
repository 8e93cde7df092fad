//! 일봉 시세 소스.
//!
//! 지수, 섹터 ETF, 개별 종목의 OHLCV 일봉을 조회합니다.
//! 기본 구현은 Yahoo Finance이며, 테스트에서는 [`QuoteSource`]를 직접 구현해 대체합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;
use yahoo_finance_api as yahoo;

use super::{with_timeout, RetryPolicy};
use crate::error::FetchError;

/// 일봉 한 개.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// 일봉 시세 소스.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// `range`(예: `"5d"`, `"1y"`) 기간의 일봉을 오래된 순으로 반환합니다.
    async fn daily_bars(&self, symbol: &str, range: &str) -> Result<Vec<DailyBar>, FetchError>;
}

/// Yahoo Finance 일봉 소스.
///
/// 호출마다 제한 시간을 적용하고 요청 한도 초과 시 재시도합니다.
pub struct YahooQuoteSource {
    connector: yahoo::YahooConnector,
    timeout: Duration,
    retry: RetryPolicy,
}

impl YahooQuoteSource {
    /// 새로운 YahooQuoteSource 생성.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, FetchError> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| FetchError::Transport(format!("Yahoo connector: {}", e)))?;

        Ok(Self {
            connector,
            timeout,
            retry,
        })
    }

    async fn fetch_once(&self, symbol: &str, range: &str) -> Result<Vec<DailyBar>, FetchError> {
        let response = self
            .connector
            .get_quote_range(symbol, "1d", range)
            .await
            .map_err(|e| FetchError::from_message(format!("{}: {}", symbol, e)))?;

        let quotes = response
            .quotes()
            .map_err(|e| FetchError::Parse(format!("{}: {}", symbol, e)))?;

        let bars: Vec<DailyBar> = quotes.iter().filter_map(quote_to_bar).collect();
        if bars.is_empty() {
            return Err(FetchError::NoData(format!("{} ({})", symbol, range)));
        }

        debug!(symbol, range, count = bars.len(), "일봉 수신");
        Ok(bars)
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    async fn daily_bars(&self, symbol: &str, range: &str) -> Result<Vec<DailyBar>, FetchError> {
        self.retry
            .run(symbol, |_| with_timeout(self.timeout, self.fetch_once(symbol, range)))
            .await
    }
}

/// Yahoo 응답 한 건을 일봉으로 변환합니다. 종가가 비정상이면 건너뜁니다.
fn quote_to_bar(quote: &yahoo::Quote) -> Option<DailyBar> {
    if !quote.close.is_finite() || quote.close <= 0.0 {
        return None;
    }

    let timestamp = Utc.timestamp_opt(quote.timestamp as i64, 0).single()?;
    Some(DailyBar {
        timestamp,
        open: quote.open,
        high: quote.high,
        low: quote.low,
        close: quote.close,
        volume: quote.volume,
    })
}

/// 메모리 일봉 소스.
///
/// 심볼별로 미리 정한 일봉 또는 오류를 반환합니다. 등록되지 않은 심볼은 `NoData`.
#[derive(Default)]
pub struct StaticQuoteSource {
    responses: HashMap<String, Result<Vec<DailyBar>, FetchError>>,
    calls: AtomicUsize,
}

impl StaticQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 심볼의 일봉을 등록합니다.
    pub fn with_bars(mut self, symbol: &str, bars: Vec<DailyBar>) -> Self {
        self.responses.insert(symbol.to_string(), Ok(bars));
        self
    }

    /// 종가 목록으로 일봉을 만들어 등록합니다.
    ///
    /// 2024-01-02부터 하루 간격이며, 시가는 전일 종가(첫 봉은 종가와 같음)입니다.
    pub fn with_closes(self, symbol: &str, closes: &[f64]) -> Self {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).single().unwrap_or_default();
        let mut previous = closes.first().copied().unwrap_or_default();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = previous;
                previous = close;
                DailyBar {
                    timestamp: start + chrono::Duration::days(i as i64),
                    open,
                    high: open.max(close),
                    low: open.min(close),
                    close,
                    volume: 1_000_000,
                }
            })
            .collect();
        self.with_bars(symbol, bars)
    }

    /// 심볼 조회 시 반환할 오류를 등록합니다.
    pub fn with_error(mut self, symbol: &str, error: FetchError) -> Self {
        self.responses.insert(symbol.to_string(), Err(error));
        self
    }

    /// 지금까지의 호출 수.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for StaticQuoteSource {
    async fn daily_bars(&self, symbol: &str, range: &str) -> Result<Vec<DailyBar>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NoData(format!("{} ({})", symbol, range))))
    }
}

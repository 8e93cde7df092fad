//! 52주 신고가/신저가 (`week52`).
//!
//! 대표 종목 유니버스의 1년 일봉으로 현재가와 52주 고가/저가를 계산해 스냅샷으로 보관합니다.
//! 신고가/신저가 목록과 통계는 요청 시 스냅샷에서 계산합니다.
//!
//! - 신고가 근접: 현재가 ≥ 52주 고가 × 0.98
//! - 신저가 근접: 현재가 ≤ 52주 저가 × 1.02

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::provider::{round_to, DailyBar, FetchResult, Fetcher, QuoteSource};

/// 한 번에 조회하는 최대 종목 수.
pub const MAX_SCAN: usize = 50;

/// 동시 조회 수.
const CONCURRENCY: usize = 4;

const HIGH_THRESHOLD: f64 = 0.98;
const LOW_THRESHOLD: f64 = 1.02;

/// 유니버스 종목 `(심볼, 이름, 섹터)`.
pub const POPULAR_TICKERS: &[(&str, &str, &str)] = &[
    ("AAPL", "Apple", "Technology"),
    ("MSFT", "Microsoft", "Technology"),
    ("GOOGL", "Alphabet", "Communication Services"),
    ("AMZN", "Amazon", "Consumer Cyclical"),
    ("NVDA", "NVIDIA", "Technology"),
    ("META", "Meta Platforms", "Communication Services"),
    ("TSLA", "Tesla", "Consumer Cyclical"),
    ("BRK-B", "Berkshire Hathaway", "Financial Services"),
    ("V", "Visa", "Financial Services"),
    ("JNJ", "Johnson & Johnson", "Healthcare"),
    ("WMT", "Walmart", "Consumer Defensive"),
    ("UNH", "UnitedHealth", "Healthcare"),
    ("MA", "Mastercard", "Financial Services"),
    ("PG", "Procter & Gamble", "Consumer Defensive"),
    ("JPM", "JPMorgan Chase", "Financial Services"),
    ("HD", "Home Depot", "Consumer Cyclical"),
    ("DIS", "Walt Disney", "Communication Services"),
    ("BAC", "Bank of America", "Financial Services"),
    ("ADBE", "Adobe", "Technology"),
    ("NFLX", "Netflix", "Communication Services"),
    ("XOM", "Exxon Mobil", "Energy"),
    ("VZ", "Verizon", "Communication Services"),
    ("CMCSA", "Comcast", "Communication Services"),
    ("AVGO", "Broadcom", "Technology"),
    ("COST", "Costco", "Consumer Defensive"),
    ("PEP", "PepsiCo", "Consumer Defensive"),
    ("TMO", "Thermo Fisher Scientific", "Healthcare"),
    ("ABT", "Abbott Laboratories", "Healthcare"),
    ("CSCO", "Cisco", "Technology"),
    ("DHR", "Danaher", "Healthcare"),
    ("ACN", "Accenture", "Technology"),
    ("NKE", "Nike", "Consumer Cyclical"),
    ("MRK", "Merck", "Healthcare"),
    ("TXN", "Texas Instruments", "Technology"),
    ("PM", "Philip Morris", "Consumer Defensive"),
    ("LIN", "Linde", "Basic Materials"),
    ("NEE", "NextEra Energy", "Utilities"),
    ("HON", "Honeywell", "Industrials"),
    ("UPS", "United Parcel Service", "Industrials"),
    ("QCOM", "Qualcomm", "Technology"),
    ("RTX", "RTX", "Industrials"),
    ("AMGN", "Amgen", "Healthcare"),
    ("BMY", "Bristol-Myers Squibb", "Healthcare"),
    ("LOW", "Lowe's", "Consumer Cyclical"),
    ("INTU", "Intuit", "Technology"),
    ("SPGI", "S&P Global", "Financial Services"),
    ("005930.KS", "삼성전자", "Technology"),
    ("000660.KS", "SK하이닉스", "Technology"),
    ("035420.KS", "NAVER", "Communication Services"),
    ("005380.KS", "현대차", "Consumer Cyclical"),
    ("051910.KS", "LG화학", "Basic Materials"),
    ("006400.KS", "삼성SDI", "Technology"),
    ("035720.KS", "카카오", "Communication Services"),
    ("028260.KS", "삼성물산", "Industrials"),
    ("068270.KS", "셀트리온", "Healthcare"),
    ("105560.KS", "KB금융", "Financial Services"),
    ("055550.KS", "신한지주", "Financial Services"),
    ("012330.KS", "현대모비스", "Consumer Cyclical"),
    ("003670.KS", "포스코홀딩스", "Basic Materials"),
    ("207940.KS", "삼성바이오로직스", "Healthcare"),
    ("086790.KS", "하나금융지주", "Financial Services"),
];

/// 종목의 52주 현황.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Week52Stock {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub high_52week: f64,
    pub low_52week: f64,
    pub change: f64,
    pub change_percent: f64,
    pub sector: String,
    /// 거래량 (백만 주)
    pub volume: f64,
}

impl Week52Stock {
    /// 1년 일봉으로 계산합니다. 봉이 없으면 `None`.
    pub fn from_bars(symbol: &str, name: &str, sector: &str, bars: &[DailyBar]) -> Option<Self> {
        let last = bars.last()?;
        let high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let (change, change_percent) = super::last_change(bars)?;

        Some(Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price: round_to(last.close, 2),
            high_52week: round_to(high, 2),
            low_52week: round_to(low, 2),
            change: round_to(change, 2),
            change_percent: round_to(change_percent, 2),
            sector: sector.to_string(),
            volume: round_to(last.volume as f64 / 1e6, 1),
        })
    }

    pub fn is_near_high(&self) -> bool {
        self.high_52week > 0.0 && self.price >= self.high_52week * HIGH_THRESHOLD
    }

    pub fn is_near_low(&self) -> bool {
        self.low_52week > 0.0 && self.price <= self.low_52week * LOW_THRESHOLD
    }
}

/// 시장 폭 판단.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketBreadth {
    Strong,
    Neutral,
    Weak,
}

/// 52주 통계.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Week52Stats {
    pub highs_count: usize,
    pub lows_count: usize,
    /// 신고가 수 / 신저가 수 (신저가가 없으면 신고가 수)
    pub ratio: f64,
    pub market_breadth: MarketBreadth,
    pub total_scanned: usize,
}

/// `week52` 데이터셋 스냅샷.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Week52Universe {
    pub stocks: Vec<Week52Stock>,
}

impl Week52Universe {
    /// 신고가 근접 종목, 등락률 내림차순.
    pub fn highs(&self, limit: usize) -> Vec<Week52Stock> {
        let mut highs: Vec<_> = self
            .stocks
            .iter()
            .filter(|s| s.is_near_high())
            .cloned()
            .collect();
        highs.sort_by(|a, b| {
            b.change_percent
                .partial_cmp(&a.change_percent)
                .unwrap_or(Ordering::Equal)
        });
        highs.truncate(limit);
        highs
    }

    /// 신저가 근접 종목, 등락률 오름차순.
    pub fn lows(&self, limit: usize) -> Vec<Week52Stock> {
        let mut lows: Vec<_> = self
            .stocks
            .iter()
            .filter(|s| s.is_near_low())
            .cloned()
            .collect();
        lows.sort_by(|a, b| {
            a.change_percent
                .partial_cmp(&b.change_percent)
                .unwrap_or(Ordering::Equal)
        });
        lows.truncate(limit);
        lows
    }

    pub fn stats(&self) -> Week52Stats {
        let highs_count = self.stocks.iter().filter(|s| s.is_near_high()).count();
        let lows_count = self.stocks.iter().filter(|s| s.is_near_low()).count();
        let ratio = round_to(highs_count as f64 / lows_count.max(1) as f64, 2);

        let market_breadth = if highs_count == 0 && lows_count == 0 {
            MarketBreadth::Neutral
        } else if ratio >= 2.0 {
            MarketBreadth::Strong
        } else if ratio <= 0.5 {
            MarketBreadth::Weak
        } else {
            MarketBreadth::Neutral
        };

        Week52Stats {
            highs_count,
            lows_count,
            ratio,
            market_breadth,
            total_scanned: self.stocks.len(),
        }
    }
}

/// 52주 유니버스 페처.
pub struct Week52Fetcher {
    source: Arc<dyn QuoteSource>,
}

impl Week52Fetcher {
    pub fn new(source: Arc<dyn QuoteSource>) -> Self {
        Self { source }
    }

    async fn fetch_stock(
        &self,
        symbol: &str,
        name: &str,
        sector: &str,
    ) -> Result<Week52Stock, FetchError> {
        let bars = self.source.daily_bars(symbol, "1y").await?;
        Week52Stock::from_bars(symbol, name, sector, &bars)
            .ok_or_else(|| FetchError::NoData(symbol.to_string()))
    }
}

#[async_trait]
impl Fetcher for Week52Fetcher {
    type Output = Week52Universe;

    fn name(&self) -> &'static str {
        super::WEEK52
    }

    fn fallback(&self) -> Week52Universe {
        Week52Universe::default()
    }

    async fn fetch(&self) -> FetchResult<Week52Universe> {
        let mut lookups = Vec::with_capacity(MAX_SCAN);
        for &(symbol, name, sector) in POPULAR_TICKERS.iter().take(MAX_SCAN) {
            lookups.push(async move { (symbol, self.fetch_stock(symbol, name, sector).await) });
        }
        let results: Vec<_> = stream::iter(lookups)
            .buffered(CONCURRENCY)
            .collect()
            .await;

        let mut stocks = Vec::with_capacity(results.len());
        let mut last_error = None;
        for (symbol, result) in results {
            match result {
                Ok(stock) => stocks.push(stock),
                Err(e) => {
                    debug!(symbol, error = %e, "52주 종목 조회 실패");
                    last_error = Some(e);
                }
            }
        }

        if stocks.is_empty() {
            let reason = last_error.unwrap_or_else(|| FetchError::NoData("week52".to_string()));
            warn!(error = %reason, "52주 유니버스 조회 실패");
            return FetchResult::failure(Week52Universe::default(), reason);
        }
        FetchResult::Success(Week52Universe { stocks })
    }
}

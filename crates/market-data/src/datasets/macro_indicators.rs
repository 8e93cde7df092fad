//! 거시지표 (`macro_data`).
//!
//! VIX, 공포탐욕지수, 연방기금금리, M2 통화량, 국채 금리, 환율을 한 번에 가져옵니다.
//! 일부 지표만 성공해도 스냅샷을 갱신하며, 빠진 지표는 응답 조립 시
//! 정적 기본값으로 채웁니다 ([`MacroOverview::assemble`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::DatasetView;
use crate::error::FetchError;
use crate::provider::{
    round_to, DailyBar, FearGreedClient, FearGreedReading, FetchResult, Fetcher, FredClient,
    FredSeries, QuoteSource,
};

pub const VIX: &str = "vix";
pub const FEAR_GREED: &str = "fear_greed";
pub const FED_FUNDS_RATE: &str = "fed_funds_rate";
pub const M2: &str = "m2";
pub const TREASURY_10Y: &str = "treasury_10y";
pub const TREASURY_2Y: &str = "treasury_2y";
pub const USD_KRW: &str = "usd_krw";
pub const DXY: &str = "dxy";

/// 금리 지표 키.
pub const INTEREST_RATE_KEYS: [&str; 3] = [FED_FUNDS_RATE, TREASURY_10Y, TREASURY_2Y];
/// 환율 지표 키.
pub const EXCHANGE_RATE_KEYS: [&str; 2] = [USD_KRW, DXY];

/// 지표 하나.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    /// VIX 구간 또는 공포탐욕 분류
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// 값의 출처 (`yahoo`, `fred`, `alternative.me`, `vix`, `default`)
    pub source: String,
    /// 정적 기본값으로 채운 경우
    #[serde(default)]
    pub is_default: bool,
}

impl Indicator {
    fn new(name: &str, value: f64, source: &str) -> Self {
        Self {
            name: name.to_string(),
            value,
            unit: None,
            change: None,
            label: None,
            source: source.to_string(),
            is_default: false,
        }
    }

    fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    fn with_change(mut self, change: f64) -> Self {
        self.change = Some(change);
        self
    }

    fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    fn as_default(mut self) -> Self {
        self.source = "default".to_string();
        self.is_default = true;
        self
    }
}

/// VIX 수준 구간.
pub fn vix_status(value: f64) -> &'static str {
    match value {
        v if v < 12.0 => "Very Low",
        v if v < 20.0 => "Low",
        v if v < 30.0 => "Medium",
        _ => "High",
    }
}

/// 지표별 정적 기본값.
pub fn default_indicators() -> BTreeMap<String, Indicator> {
    let defaults = [
        (
            VIX,
            Indicator::new("VIX Index", 13.8, "default")
                .with_change(0.0)
                .with_label(vix_status(13.8)),
        ),
        (
            FEAR_GREED,
            Indicator::new("Fear & Greed Index", 50.0, "default").with_label("Neutral"),
        ),
        (
            FED_FUNDS_RATE,
            Indicator::new("Federal Funds Rate", 5.5, "default").with_unit("Percent"),
        ),
        (
            M2,
            Indicator::new("M2 Money Supply", 21.2, "default").with_unit("Trillion USD"),
        ),
        (
            TREASURY_10Y,
            Indicator::new("10-Year Treasury Yield", 4.35, "default").with_unit("Percent"),
        ),
        (
            TREASURY_2Y,
            Indicator::new("Short-Term Treasury Yield", 4.82, "default").with_unit("Percent"),
        ),
        (
            USD_KRW,
            Indicator::new("USD/KRW", 1308.50, "default").with_change(2.30),
        ),
        (
            DXY,
            Indicator::new("US Dollar Index", 104.25, "default").with_change(-0.15),
        ),
    ];

    defaults
        .into_iter()
        .map(|(key, indicator)| (key.to_string(), indicator.as_default()))
        .collect()
}

/// `macro_data` 데이터셋 스냅샷. 조회에 성공한 지표만 담습니다.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MacroSnapshot {
    pub indicators: BTreeMap<String, Indicator>,
}

/// 거시지표 응답.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroOverview {
    /// 모든 지표 (빠진 지표는 기본값)
    pub indicators: BTreeMap<String, Indicator>,
    pub last_update: Option<DateTime<Tz>>,
    pub next_update: String,
    /// 스냅샷이 없어 전체가 기본값인지 여부
    pub is_fallback: bool,
}

impl MacroOverview {
    /// 데이터셋 조회 결과로 응답을 조립합니다.
    ///
    /// 스냅샷에 없는 지표는 정적 기본값(`is_default = true`)으로 채웁니다.
    pub fn assemble(view: &DatasetView<MacroSnapshot>) -> Self {
        let mut indicators = default_indicators();
        for (key, indicator) in &view.data.indicators {
            indicators.insert(key.clone(), indicator.clone());
        }

        Self {
            indicators,
            last_update: view.last_update,
            next_update: view.next_update.clone(),
            is_fallback: view.is_fallback,
        }
    }

    /// 지정한 키의 지표만 추립니다.
    pub fn subset(&self, keys: &[&str]) -> BTreeMap<String, Indicator> {
        keys.iter()
            .filter_map(|key| {
                self.indicators
                    .get(*key)
                    .map(|indicator| (key.to_string(), indicator.clone()))
            })
            .collect()
    }

    pub fn indicator(&self, key: &str) -> Option<&Indicator> {
        self.indicators.get(key)
    }
}

/// 거시지표 페처.
pub struct MacroFetcher {
    quotes: Arc<dyn QuoteSource>,
    fred: Arc<FredClient>,
    fear_greed: Arc<FearGreedClient>,
}

impl MacroFetcher {
    pub fn new(
        quotes: Arc<dyn QuoteSource>,
        fred: Arc<FredClient>,
        fear_greed: Arc<FearGreedClient>,
    ) -> Self {
        Self {
            quotes,
            fred,
            fear_greed,
        }
    }

    async fn last_bar(&self, symbol: &str) -> Result<DailyBar, FetchError> {
        let bars = self.quotes.daily_bars(symbol, "5d").await?;
        bars.into_iter()
            .last()
            .ok_or_else(|| FetchError::NoData(symbol.to_string()))
    }

    async fn vix(&self) -> Result<Indicator, FetchError> {
        let bar = self.last_bar("^VIX").await?;
        Ok(Indicator::new("VIX Index", round_to(bar.close, 2), "yahoo")
            .with_change(round_to(bar.close - bar.open, 2))
            .with_label(vix_status(bar.close)))
    }

    async fn yield_rate(&self, symbol: &str, name: &str) -> Result<Indicator, FetchError> {
        let bar = self.last_bar(symbol).await?;
        Ok(Indicator::new(name, round_to(bar.close, 2), "yahoo").with_unit("Percent"))
    }

    async fn exchange_rate(&self, symbol: &str, name: &str) -> Result<Indicator, FetchError> {
        let bar = self.last_bar(symbol).await?;
        Ok(Indicator::new(name, round_to(bar.close, 2), "yahoo")
            .with_change(round_to(bar.close - bar.open, 2)))
    }

    async fn fed_funds(&self) -> Result<Indicator, FetchError> {
        let value = self.fred.latest(FredSeries::FedFunds).await?;
        Ok(Indicator::new("Federal Funds Rate", round_to(value, 2), "fred").with_unit("Percent"))
    }

    async fn m2(&self) -> Result<Indicator, FetchError> {
        // FRED M2SL은 십억 달러 단위
        let billions = self.fred.latest(FredSeries::M2).await?;
        Ok(
            Indicator::new("M2 Money Supply", round_to(billions / 1000.0, 2), "fred")
                .with_unit("Trillion USD"),
        )
    }
}

fn fear_greed_indicator(reading: &FearGreedReading, source: &str) -> Indicator {
    Indicator::new("Fear & Greed Index", reading.value, source).with_label(&reading.classification)
}

#[async_trait]
impl Fetcher for MacroFetcher {
    type Output = MacroSnapshot;

    fn name(&self) -> &'static str {
        super::MACRO_DATA
    }

    fn fallback(&self) -> MacroSnapshot {
        MacroSnapshot::default()
    }

    async fn fetch(&self) -> FetchResult<MacroSnapshot> {
        let (vix, sentiment, fed, m2, t10, t2, krw, dxy) = tokio::join!(
            self.vix(),
            self.fear_greed.latest(),
            self.fed_funds(),
            self.m2(),
            self.yield_rate("^TNX", "10-Year Treasury Yield"),
            self.yield_rate("^IRX", "Short-Term Treasury Yield"),
            self.exchange_rate("KRW=X", "USD/KRW"),
            self.exchange_rate("DX-Y.NYB", "US Dollar Index"),
        );

        // 공포탐욕지수 API 실패 시 VIX로 추정
        let sentiment = match (sentiment, &vix) {
            (Ok(reading), _) => Ok(fear_greed_indicator(&reading, "alternative.me")),
            (Err(e), Ok(vix)) => {
                debug!(error = %e, vix = vix.value, "공포탐욕지수를 VIX로 추정");
                Ok(fear_greed_indicator(&FearGreedReading::from_vix(vix.value), "vix"))
            }
            (Err(e), Err(_)) => Err(e),
        };

        let results = [
            (VIX, vix),
            (FEAR_GREED, sentiment),
            (FED_FUNDS_RATE, fed),
            (M2, m2),
            (TREASURY_10Y, t10),
            (TREASURY_2Y, t2),
            (USD_KRW, krw),
            (DXY, dxy),
        ];

        let mut indicators = BTreeMap::new();
        let mut last_error = None;
        for (key, result) in results {
            match result {
                Ok(indicator) => {
                    indicators.insert(key.to_string(), indicator);
                }
                Err(FetchError::NotConfigured(_)) => {}
                Err(e) => {
                    warn!(indicator = key, error = %e, "거시지표 조회 실패");
                    last_error = Some(e);
                }
            }
        }

        if indicators.is_empty() {
            let reason =
                last_error.unwrap_or_else(|| FetchError::NoData("macro indicators".to_string()));
            return FetchResult::failure(MacroSnapshot::default(), reason);
        }
        FetchResult::Success(MacroSnapshot { indicators })
    }
}

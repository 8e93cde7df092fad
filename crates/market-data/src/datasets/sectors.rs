//! 섹터 ETF 수익률 (`sectors`)과 섹터별 누적 수익률 추이.
//!
//! 미국 SPDR 섹터 ETF 11종과 한국 섹터 ETF 3종의 1일/1주/1개월/1년 수익률을 계산합니다.
//! 조회에 실패한 ETF는 수익률 0으로 표시합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FetchError;
use crate::provider::{round_to, DailyBar, FetchResult, Fetcher, QuoteSource};

/// 섹터 ETF 정보.
#[derive(Debug, Clone, Copy)]
pub struct SectorEtf {
    pub symbol: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// 시가총액 비중 (트리맵 크기)
    pub size: u32,
    pub market: &'static str,
}

const fn etf(
    symbol: &'static str,
    name: &'static str,
    description: &'static str,
    size: u32,
    market: &'static str,
) -> SectorEtf {
    SectorEtf {
        symbol,
        name,
        description,
        size,
        market,
    }
}

pub const SECTOR_ETFS: [SectorEtf; 14] = [
    etf("XLK", "기술", "소프트웨어, 하드웨어, 반도체", 28, "US"),
    etf("XLF", "금융", "은행, 보험, 자산관리", 13, "US"),
    etf("XLV", "헬스케어", "제약, 생명공학, 의료기기", 14, "US"),
    etf("XLY", "소비재", "자동차, 소매, 레저", 12, "US"),
    etf("XLC", "통신", "미디어, 엔터테인먼트, 통신", 9, "US"),
    etf("XLI", "산업재", "항공우주, 건설, 제조", 10, "US"),
    etf("XLE", "에너지", "석유, 가스, 에너지", 4, "US"),
    etf("XLU", "유틸리티", "전력, 수도, 가스 공급", 3, "US"),
    etf("XLRE", "부동산", "부동산 투자 신탁", 3, "US"),
    etf("XLB", "소재", "화학, 건설자재, 금속", 3, "US"),
    etf("XLP", "필수소비재", "식품, 음료, 생활용품", 6, "US"),
    etf("122630.KS", "한국IT", "한국 정보기술 섹터", 10, "KR"),
    etf("091180.KS", "한국금융", "한국 금융 섹터", 10, "KR"),
    etf("102960.KS", "한국필수소비재", "한국 필수소비재 섹터", 10, "KR"),
];

/// 추이 차트에 사용하는 주요 섹터.
pub const HISTORY_SECTORS: [&str; 5] = ["XLK", "XLF", "XLV", "XLE", "XLC"];

/// 섹터 ETF 정보를 심볼로 찾습니다.
pub fn sector_etf(symbol: &str) -> Option<&'static SectorEtf> {
    SECTOR_ETFS.iter().find(|etf| etf.symbol == symbol)
}

/// 섹터 수익률 (%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorReturn {
    pub name: String,
    pub symbol: String,
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
    /// 252거래일 수익률
    pub ytd: f64,
    pub description: String,
    pub size: u32,
    pub market: String,
    /// 조회 실패로 0을 채운 경우
    #[serde(default)]
    pub is_default: bool,
}

impl SectorReturn {
    fn zeroed(etf: &SectorEtf) -> Self {
        Self {
            name: etf.name.to_string(),
            symbol: etf.symbol.to_string(),
            daily: 0.0,
            weekly: 0.0,
            monthly: 0.0,
            ytd: 0.0,
            description: etf.description.to_string(),
            size: etf.size,
            market: etf.market.to_string(),
            is_default: true,
        }
    }

    fn from_bars(etf: &SectorEtf, bars: &[DailyBar]) -> Self {
        let ret = |days| trailing_return(bars, days).unwrap_or(0.0);
        Self {
            daily: ret(1),
            weekly: ret(5),
            monthly: ret(21),
            ytd: ret(252),
            is_default: false,
            ..Self::zeroed(etf)
        }
    }
}

/// `sectors` 데이터셋 스냅샷.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SectorPerformance {
    pub sectors: Vec<SectorReturn>,
}

impl SectorPerformance {
    /// 모든 섹터 수익률 0.
    pub fn fallback() -> Self {
        Self {
            sectors: SECTOR_ETFS.iter().map(SectorReturn::zeroed).collect(),
        }
    }
}

/// 마지막 종가의 `days`봉 전 종가 대비 수익률 (%, 소수 둘째 자리).
///
/// 봉이 `days`개 이하이면 `None`.
pub fn trailing_return(bars: &[DailyBar], days: usize) -> Option<f64> {
    if bars.len() <= days {
        return None;
    }
    let current = bars.last()?.close;
    let past = bars[bars.len() - days - 1].close;
    if past <= 0.0 {
        return None;
    }
    Some(round_to((current - past) / past * 100.0, 2))
}

/// 섹터 수익률 페처.
pub struct SectorFetcher {
    source: Arc<dyn QuoteSource>,
}

impl SectorFetcher {
    pub fn new(source: Arc<dyn QuoteSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Fetcher for SectorFetcher {
    type Output = SectorPerformance;

    fn name(&self) -> &'static str {
        super::SECTORS
    }

    fn fallback(&self) -> SectorPerformance {
        SectorPerformance::fallback()
    }

    async fn fetch(&self) -> FetchResult<SectorPerformance> {
        let results = join_all(
            SECTOR_ETFS
                .iter()
                .map(|etf| self.source.daily_bars(etf.symbol, "1y")),
        )
        .await;

        let mut sectors = Vec::with_capacity(SECTOR_ETFS.len());
        let mut last_error = None;
        for (etf, result) in SECTOR_ETFS.iter().zip(results) {
            match result {
                Ok(bars) => sectors.push(SectorReturn::from_bars(etf, &bars)),
                Err(e) => {
                    warn!(symbol = %etf.symbol, error = %e, "섹터 ETF 조회 실패");
                    sectors.push(SectorReturn::zeroed(etf));
                    last_error = Some(e);
                }
            }
        }

        if sectors.iter().all(|s| s.is_default) {
            let reason = last_error.unwrap_or_else(|| FetchError::NoData("sectors".to_string()));
            return FetchResult::failure(SectorPerformance::fallback(), reason);
        }
        FetchResult::Success(SectorPerformance { sectors })
    }
}

/// 추이 조회 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryPeriod {
    OneDay,
    FiveDays,
    #[default]
    OneMonth,
    ThreeMonths,
    OneYear,
}

impl HistoryPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryPeriod::OneDay => "1d",
            HistoryPeriod::FiveDays => "5d",
            HistoryPeriod::OneMonth => "1mo",
            HistoryPeriod::ThreeMonths => "3mo",
            HistoryPeriod::OneYear => "1y",
        }
    }

    /// 응답 캐시 키.
    pub fn cache_key(&self) -> String {
        format!("sectors:history:{}", self.as_str())
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(HistoryPeriod::OneDay),
            "5d" => Ok(HistoryPeriod::FiveDays),
            "1mo" => Ok(HistoryPeriod::OneMonth),
            "3mo" => Ok(HistoryPeriod::ThreeMonths),
            "1y" => Ok(HistoryPeriod::OneYear),
            other => Err(format!("지원하지 않는 기간: {} (1d, 5d, 1mo, 3mo, 1y)", other)),
        }
    }
}

/// 날짜별 섹터 누적 수익률.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorHistoryPoint {
    pub date: String,
    /// 섹터 이름 → 첫 종가 대비 수익률 (%)
    #[serde(flatten)]
    pub returns: BTreeMap<String, f64>,
}

/// 섹터 추이.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorHistory {
    pub period: String,
    pub data: Vec<SectorHistoryPoint>,
}

impl SectorHistory {
    pub fn empty(period: HistoryPeriod) -> Self {
        Self {
            period: period.as_str().to_string(),
            data: Vec::new(),
        }
    }
}

/// 주요 섹터의 기간 내 누적 수익률 추이를 조회합니다.
///
/// 날짜 축은 처음으로 데이터가 조회된 섹터를 기준으로 합니다.
///
/// # Errors
///
/// 모든 섹터 조회가 실패하면 마지막 오류.
pub async fn fetch_sector_history(
    source: &dyn QuoteSource,
    period: HistoryPeriod,
) -> Result<SectorHistory, FetchError> {
    let results = join_all(
        HISTORY_SECTORS
            .iter()
            .map(|symbol| source.daily_bars(symbol, period.as_str())),
    )
    .await;

    let mut series: Vec<(&'static str, Vec<DailyBar>)> = Vec::new();
    let mut last_error = None;
    for (symbol, result) in HISTORY_SECTORS.iter().zip(results) {
        match result {
            Ok(bars) if !bars.is_empty() => {
                let name = sector_etf(symbol).map(|etf| etf.name).unwrap_or(*symbol);
                series.push((name, bars));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(symbol = %symbol, period = %period, error = %e, "섹터 추이 조회 실패");
                last_error = Some(e);
            }
        }
    }

    let Some((_, axis)) = series.first() else {
        return Err(last_error.unwrap_or_else(|| FetchError::NoData("sector history".to_string())));
    };

    let data = axis
        .iter()
        .map(|bar| {
            let date = bar.timestamp.date_naive();
            let returns = series
                .iter()
                .filter_map(|(name, bars)| {
                    let base = bars.first()?.close;
                    let current = bars.iter().find(|b| b.timestamp.date_naive() == date)?;
                    (base > 0.0).then(|| {
                        (
                            name.to_string(),
                            round_to((current.close - base) / base * 100.0, 2),
                        )
                    })
                })
                .collect();

            SectorHistoryPoint {
                date: date.format("%Y-%m-%d").to_string(),
                returns,
            }
        })
        .collect();

    Ok(SectorHistory {
        period: period.as_str().to_string(),
        data,
    })
}

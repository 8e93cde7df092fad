//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! 데이터셋 코디네이터, 응답 캐시, 저장소는 기동 시 한 번 생성되어
//! `Arc<AppState>`로 핸들러와 백그라운드 작업에 주입됩니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use market_core::{AppConfig, Clock, CoreError, SystemClock};
use market_data::datasets::{
    MacroFetcher, MacroSnapshot, MarketFetcher, MarketOverview, SectorFetcher, SectorPerformance,
    Week52Fetcher, Week52Universe, MACRO_DATA, MARKET, SECTORS, WEEK52,
};
use market_data::provider::{FearGreedClient, FredClient, YahooQuoteSource};
use market_data::storage::{open_read_only, NewsStore, ReportStore};
use market_data::{
    DatasetCache, DatasetOptions, DatasetRegistry, ExpiringCache, FetchError, QuoteSource,
    RefreshSupervisor, RetryPolicy,
};

/// 상태 구성 실패.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("설정 오류: {0}")]
    Config(#[from] CoreError),

    #[error("데이터 소스 초기화 실패: {0}")]
    Source(#[from] FetchError),
}

/// 외부 데이터 소스 묶음.
///
/// 테스트에서는 네트워크 없는 소스로 교체합니다.
pub struct Sources {
    pub quotes: Arc<dyn QuoteSource>,
    pub fred: Arc<FredClient>,
    pub fear_greed: Arc<FearGreedClient>,
}

impl Sources {
    /// 설정에 따라 실제 외부 소스를 생성합니다.
    pub fn from_config(config: &AppConfig) -> Result<Self, StateError> {
        let timeout = Duration::from_secs(config.upstream.request_timeout_secs);
        let retry = RetryPolicy::from(&config.upstream.retry);

        Ok(Self {
            quotes: Arc::new(YahooQuoteSource::new(timeout, retry)?),
            fred: Arc::new(FredClient::new(
                config.upstream.fred_base_url.clone(),
                config.upstream.fred_api_key.clone(),
                timeout,
            )),
            fear_greed: Arc::new(FearGreedClient::new(
                config.upstream.fear_greed_url.clone(),
                timeout,
            )),
        })
    }
}

/// 애플리케이션 공유 상태.
pub struct AppState {
    pub config: Arc<AppConfig>,

    pub clock: Arc<dyn Clock>,

    /// 주요 지수
    pub market: Arc<DatasetCache<MarketOverview>>,

    /// 섹터 ETF 성과
    pub sectors: Arc<DatasetCache<SectorPerformance>>,

    /// 52주 신고가/신저가 유니버스
    pub week52: Arc<DatasetCache<Week52Universe>>,

    /// 거시경제 지표
    pub macro_data: Arc<DatasetCache<MacroSnapshot>>,

    /// 관리 엔드포인트/주기 작업용 데이터셋 핸들
    pub datasets: DatasetRegistry,

    /// 키별 TTL 응답 캐시 (섹터 추이, 리포트/뉴스 조회)
    pub responses: ExpiringCache<Value>,

    /// 섹터 추이 조회용 시세 소스
    pub quotes: Arc<dyn QuoteSource>,

    /// 리포트 저장소 (미설정 또는 연결 실패 시 None)
    pub reports: Option<ReportStore>,

    /// 뉴스 저장소 (미설정 또는 연결 실패 시 None)
    pub news: Option<NewsStore>,

    /// 분리 갱신 작업 감독자
    pub supervisor: RefreshSupervisor,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 주어진 소스와 시계로 상태를 구성합니다. 저장소는 비어 있습니다.
    pub fn new(
        config: AppConfig,
        sources: Sources,
        clock: Arc<dyn Clock>,
        supervisor: RefreshSupervisor,
    ) -> Result<Self, StateError> {
        let cache = &config.cache;

        let market = Arc::new(DatasetCache::new(
            MARKET,
            Arc::new(MarketFetcher::new(sources.quotes.clone())),
            DatasetOptions::from_config(&cache.market)?,
            clock.clone(),
            supervisor.clone(),
        ));
        let sectors = Arc::new(DatasetCache::new(
            SECTORS,
            Arc::new(SectorFetcher::new(sources.quotes.clone())),
            DatasetOptions::from_config(&cache.sectors)?,
            clock.clone(),
            supervisor.clone(),
        ));
        let week52 = Arc::new(DatasetCache::new(
            WEEK52,
            Arc::new(Week52Fetcher::new(sources.quotes.clone())),
            DatasetOptions::from_config(&cache.week52)?,
            clock.clone(),
            supervisor.clone(),
        ));
        let macro_data = Arc::new(DatasetCache::new(
            MACRO_DATA,
            Arc::new(MacroFetcher::new(
                sources.quotes.clone(),
                sources.fred,
                sources.fear_greed,
            )),
            DatasetOptions::from_config(&cache.macro_data)?,
            clock.clone(),
            supervisor.clone(),
        ));

        let mut datasets = DatasetRegistry::new();
        datasets.register(market.clone());
        datasets.register(sectors.clone());
        datasets.register(week52.clone());
        datasets.register(macro_data.clone());

        Ok(Self {
            config: Arc::new(config),
            clock,
            market,
            sectors,
            week52,
            macro_data,
            datasets,
            responses: ExpiringCache::new(),
            quotes: sources.quotes,
            reports: None,
            news: None,
            supervisor,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// 실제 외부 소스와 저장소로 상태를 구성합니다.
    ///
    /// 저장소를 열 수 없으면 경고를 남기고 해당 엔드포인트는 빈 결과를 반환합니다.
    pub async fn build(config: AppConfig, shutdown: CancellationToken) -> Result<Self, StateError> {
        let sources = Sources::from_config(&config)?;
        let reports_url = config.database.reports_url.clone();
        let news_url = config.database.news_url.clone();
        let max_connections = config.database.max_connections;

        let mut state = Self::new(
            config,
            sources,
            Arc::new(SystemClock),
            RefreshSupervisor::new(shutdown),
        )?;

        state.reports = open_store("reports", reports_url.as_deref(), max_connections)
            .await
            .map(ReportStore::new);
        state.news = open_store("news", news_url.as_deref(), max_connections)
            .await
            .map(NewsStore::new);

        info!(
            datasets = state.datasets.len(),
            reports = state.reports.is_some(),
            news = state.news.is_some(),
            "애플리케이션 상태 초기화 완료"
        );
        Ok(state)
    }

    /// 리포트 저장소를 설정합니다.
    pub fn with_reports(mut self, store: ReportStore) -> Self {
        self.reports = Some(store);
        self
    }

    /// 뉴스 저장소를 설정합니다.
    pub fn with_news(mut self, store: NewsStore) -> Self {
        self.news = Some(store);
        self
    }

    /// 리포트/뉴스 조회 결과 캐시 TTL.
    pub fn response_ttl(&self) -> Duration {
        Duration::from_secs(self.config.cache.response_ttl_secs)
    }

    /// 섹터 추이 캐시 TTL.
    pub fn sector_history_ttl(&self) -> Duration {
        Duration::from_secs(self.config.cache.sector_history_ttl_secs)
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }
}

async fn open_store(
    name: &str,
    url: Option<&str>,
    max_connections: u32,
) -> Option<sqlx::SqlitePool> {
    let url = url.filter(|u| !u.trim().is_empty())?;
    match open_read_only(url, max_connections).await {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!(store = name, error = %e, "저장소를 열 수 없습니다, 빈 결과로 응답합니다");
            None
        }
    }
}

/// 테스트용 AppState 생성 헬퍼.
///
/// 네트워크 없이 주어진 시세 소스만 사용합니다. FRED 키는 없고,
/// 공포탐욕지수 API는 닫힌 로컬 포트를 가리키므로 항상 VIX 기반 추정값이 사용됩니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state(quotes: Arc<dyn QuoteSource>) -> AppState {
    let timeout = Duration::from_secs(1);
    let sources = Sources {
        quotes,
        fred: Arc::new(FredClient::new("http://127.0.0.1:9", None, timeout)),
        fear_greed: Arc::new(FearGreedClient::new("http://127.0.0.1:9/fng/", timeout)),
    };

    AppState::new(
        AppConfig::default(),
        sources,
        Arc::new(SystemClock),
        RefreshSupervisor::default(),
    )
    .expect("기본 설정은 항상 유효")
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_data::provider::StaticQuoteSource;

    #[tokio::test]
    async fn test_state_registers_all_datasets() {
        let state = create_test_state(Arc::new(StaticQuoteSource::new()));

        let keys: Vec<&str> = state.datasets.keys().collect();
        assert_eq!(keys, vec!["macro_data", "market", "sectors", "week52"]);
        assert!(state.reports.is_none());
        assert!(state.news.is_none());
        assert!(state.responses.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_dataset_config_is_rejected() {
        let mut config = AppConfig::default();
        config.cache.week52.timezone = "Mars/Olympus".to_string();

        let sources = Sources {
            quotes: Arc::new(StaticQuoteSource::new()),
            fred: Arc::new(FredClient::new("http://127.0.0.1:9", None, Duration::from_secs(1))),
            fear_greed: Arc::new(FearGreedClient::new(
                "http://127.0.0.1:9/fng/",
                Duration::from_secs(1),
            )),
        };

        let result = AppState::new(
            config,
            sources,
            Arc::new(SystemClock),
            RefreshSupervisor::default(),
        );
        assert!(matches!(result, Err(StateError::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_store_url_is_none() {
        assert!(open_store("reports", None, 1).await.is_none());
        assert!(open_store("reports", Some("  "), 1).await.is_none());
        assert!(open_store("news", Some("sqlite://does/not/exist.db"), 1)
            .await
            .is_none());
    }
}

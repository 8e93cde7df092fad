//! 설정 관리.
//!
//! 기본값 → TOML 파일(선택) → `MARKET__` 접두사 환경 변수 순으로 덮어씁니다.
//! 모든 섹션은 `Default`를 구현하므로 설정 파일 없이도 기동할 수 있습니다.

use std::path::Path;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 리포트/뉴스 저장소 설정
    pub database: DatabaseConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 외부 데이터 소스 설정
    pub upstream: UpstreamConfig,
    /// 캐시 및 데이터셋 갱신 정책
    pub cache: CacheConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// CORS 허용 origin 목록
    pub allowed_origins: Vec<String>,
    /// HTTP 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 종료 시 백그라운드 갱신 완료 대기 시간 (초)
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            request_timeout_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// 리포트/뉴스 SQLite 저장소 설정.
///
/// URL이 비어 있으면 해당 저장소는 비활성화되고 엔드포인트는 빈 결과를 반환합니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 증권사 리포트 DB (예: `sqlite://data/reports.db`)
    pub reports_url: Option<String>,
    /// 뉴스 DB
    pub news_url: Option<String>,
    /// 풀당 최대 연결 수
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            reports_url: None,
            news_url: None,
            max_connections: 5,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 외부 데이터 소스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// 개별 네트워크 호출 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 요청 한도 초과 시 재시도 정책
    pub retry: RetryConfig,
    /// FRED API 키 (없으면 FRED 지표는 기본값으로 대체)
    pub fred_api_key: Option<String>,
    /// FRED API 기본 URL
    pub fred_base_url: String,
    /// 공포탐욕지수 API URL
    pub fear_greed_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            retry: RetryConfig::default(),
            fred_api_key: None,
            fred_base_url: "https://api.stlouisfed.org".to_string(),
            fear_greed_url: "https://api.alternative.me/fng/".to_string(),
        }
    }
}

/// 재시도 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간 (밀리초)
    pub base_delay_ms: u64,
    /// 최대 대기 시간 (밀리초)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 10_000,
        }
    }
}

/// 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 백그라운드 갱신 점검 주기 (초)
    pub scheduler_interval_secs: u64,
    /// 리포트/뉴스 조회 결과 캐시 TTL (초)
    pub response_ttl_secs: u64,
    /// 섹터 히스토리 캐시 TTL (초)
    pub sector_history_ttl_secs: u64,
    /// 주요 지수
    pub market: DatasetConfig,
    /// 섹터 ETF 성과
    pub sectors: DatasetConfig,
    /// 52주 신고가/신저가 유니버스
    pub week52: DatasetConfig,
    /// 거시경제 지표
    pub macro_data: DatasetConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            scheduler_interval_secs: 60,
            response_ttl_secs: 60,
            sector_history_ttl_secs: 300,
            market: DatasetConfig::ttl(60),
            sectors: DatasetConfig::ttl(180),
            week52: DatasetConfig::market_hours(None),
            macro_data: DatasetConfig::market_hours(Some(6 * 3600)),
        }
    }
}

impl CacheConfig {
    /// 데이터셋 키와 설정 쌍을 반환합니다.
    pub fn datasets(&self) -> [(&'static str, &DatasetConfig); 4] {
        [
            ("market", &self.market),
            ("sectors", &self.sectors),
            ("week52", &self.week52),
            ("macro_data", &self.macro_data),
        ]
    }
}

/// 신선도 판단 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicyKind {
    /// 고정 TTL
    Ttl,
    /// 장 시작 시각 기준 일 1회 + 최대 경과 시간
    MarketHours,
}

/// STALE 상태에서의 갱신 방식. EMPTY 상태는 항상 동기 갱신입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshModeKind {
    /// 요청자가 갱신 완료까지 대기
    Blocking,
    /// 백그라운드 갱신, 요청자는 기존 스냅샷을 즉시 받음
    Detached,
}

/// 데이터셋별 갱신 정책 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub policy: RefreshPolicyKind,
    /// TTL 정책의 유지 시간 (초)
    pub ttl_secs: u64,
    /// 기준 시간대 (IANA 이름)
    pub timezone: String,
    /// 일일 갱신 시각 (`HH:MM`, 기준 시간대)
    pub daily_refresh_at: String,
    /// 최대 허용 경과 시간 (초). 없으면 제한 없음
    pub max_staleness_secs: Option<u64>,
    pub mode: RefreshModeKind,
    /// 갱신 한 번의 전체 제한 시간 (초)
    ///
    /// 빈 데이터셋은 요청 안에서 동기로 채워지므로 `server.request_timeout_secs`보다 짧아야 합니다.
    pub refresh_timeout_secs: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self::ttl(60)
    }
}

impl DatasetConfig {
    /// TTL 정책 설정을 생성합니다.
    pub fn ttl(ttl_secs: u64) -> Self {
        Self {
            policy: RefreshPolicyKind::Ttl,
            ttl_secs,
            timezone: "America/New_York".to_string(),
            daily_refresh_at: "06:30".to_string(),
            max_staleness_secs: None,
            mode: RefreshModeKind::Blocking,
            refresh_timeout_secs: 20,
        }
    }

    /// 장 시간 기반 정책 설정을 생성합니다.
    pub fn market_hours(max_staleness_secs: Option<u64>) -> Self {
        Self {
            policy: RefreshPolicyKind::MarketHours,
            max_staleness_secs,
            mode: RefreshModeKind::Detached,
            refresh_timeout_secs: 25,
            ..Self::ttl(3600)
        }
    }

    /// 기준 시간대를 파싱합니다.
    pub fn timezone(&self) -> CoreResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| CoreError::Config(format!("timezone '{}': {}", self.timezone, e)))
    }

    /// 일일 갱신 시각을 파싱합니다.
    pub fn daily_refresh_time(&self) -> CoreResult<NaiveTime> {
        NaiveTime::parse_from_str(&self.daily_refresh_at, "%H:%M").map_err(|e| {
            CoreError::Config(format!(
                "daily_refresh_at '{}': {}",
                self.daily_refresh_at, e
            ))
        })
    }

    /// 설정 값의 유효성을 검사합니다.
    pub fn validate(&self) -> CoreResult<()> {
        if self.policy == RefreshPolicyKind::Ttl && self.ttl_secs == 0 {
            return Err(CoreError::Config("ttl_secs must be positive".to_string()));
        }
        if self.refresh_timeout_secs == 0 {
            return Err(CoreError::Config(
                "refresh_timeout_secs must be positive".to_string(),
            ));
        }
        self.timezone()?;
        self.daily_refresh_time()?;
        Ok(())
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("MARKET")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        config.apply_legacy_env();
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> CoreResult<Self> {
        Self::load("config/default.toml")
    }

    /// 접두사 없는 관용 환경 변수(`FRED_API_KEY`, `ALLOWED_ORIGINS`)를 반영합니다.
    fn apply_legacy_env(&mut self) {
        if self.upstream.fred_api_key.is_none() {
            self.upstream.fred_api_key = std::env::var("FRED_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            let origins: Vec<String> = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !origins.is_empty() {
                self.server.allowed_origins = origins;
            }
        }
    }

    /// 전체 설정의 유효성을 검사합니다.
    pub fn validate(&self) -> CoreResult<()> {
        if self.upstream.request_timeout_secs == 0 {
            return Err(CoreError::Config(
                "upstream.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.upstream.retry.max_attempts == 0 {
            return Err(CoreError::Config(
                "upstream.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.cache.response_ttl_secs == 0 || self.cache.sector_history_ttl_secs == 0 {
            return Err(CoreError::Config("cache TTLs must be positive".to_string()));
        }
        for (name, dataset) in self.cache.datasets() {
            dataset
                .validate()
                .map_err(|e| CoreError::Config(format!("cache.{}: {}", name, e)))?;
            if dataset.refresh_timeout_secs >= self.server.request_timeout_secs {
                return Err(CoreError::Config(format!(
                    "cache.{}.refresh_timeout_secs ({}) must be shorter than server.request_timeout_secs ({})",
                    name, dataset.refresh_timeout_secs, self.server.request_timeout_secs
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upstream.retry.max_attempts, 3);
        assert_eq!(config.cache.macro_data.policy, RefreshPolicyKind::MarketHours);
        assert_eq!(config.cache.macro_data.max_staleness_secs, Some(21_600));
        assert_eq!(config.cache.week52.max_staleness_secs, None);
        assert_eq!(config.cache.market.mode, RefreshModeKind::Blocking);
    }

    #[test]
    fn test_refresh_timeout_must_fit_in_request_timeout() {
        let mut config = AppConfig::default();
        for (_, dataset) in config.cache.datasets() {
            assert!(dataset.refresh_timeout_secs < config.server.request_timeout_secs);
        }

        config.cache.macro_data.refresh_timeout_secs = 30;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.macro_data.refresh_timeout_secs"));

        config.cache.macro_data.refresh_timeout_secs = 25;
        config.server.request_timeout_secs = 20;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_dataset_timezone_and_time() {
        let dataset = DatasetConfig::market_hours(None);
        assert_eq!(dataset.timezone().unwrap(), chrono_tz::America::New_York);
        assert_eq!(
            dataset.daily_refresh_time().unwrap(),
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_dataset_config() {
        let mut dataset = DatasetConfig::ttl(0);
        assert!(dataset.validate().is_err());

        dataset.ttl_secs = 30;
        dataset.timezone = "Mars/Olympus".to_string();
        assert!(matches!(dataset.validate(), Err(CoreError::Config(_))));

        dataset.timezone = "Asia/Seoul".to_string();
        dataset.daily_refresh_at = "25:99".to_string();
        assert!(dataset.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_toml_section() {
        let raw = r#"{"policy": "market_hours", "daily_refresh_at": "09:00", "mode": "blocking"}"#;
        let dataset: DatasetConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(dataset.policy, RefreshPolicyKind::MarketHours);
        assert_eq!(dataset.mode, RefreshModeKind::Blocking);
        assert_eq!(dataset.timezone, "America/New_York");
        assert!(dataset.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.cache.sectors.ttl_secs, 180);
    }
}

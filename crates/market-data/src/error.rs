//! 데이터 모듈 오류 타입.

use std::time::Duration;

use thiserror::Error;

/// 외부 데이터 소스 호출 오류.
///
/// 페처 경계에서 `FetchResult::Failure`로 변환되며 라우트 계층까지 전파되지 않습니다.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// 제한 시간 초과
    #[error("Upstream timeout after {0:?}")]
    Timeout(Duration),

    /// 요청 한도 초과 (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// 연결/전송 오류
    #[error("Transport error: {0}")]
    Transport(String),

    /// 비정상 HTTP 상태
    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    /// 응답 파싱 오류
    #[error("Parse error: {0}")]
    Parse(String),

    /// 응답은 정상이나 데이터가 없음
    #[error("No data: {0}")]
    NoData(String),

    /// 선택적 자격증명 미설정
    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl FetchError {
    /// 요청 한도 초과 오류인지 확인합니다.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited(_))
    }

    /// 재시도 대상인지 확인합니다. 요청 한도 초과만 재시도합니다.
    pub fn is_retryable(&self) -> bool {
        self.is_rate_limited()
    }

    /// 일시적인 오류인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::RateLimited(_) | FetchError::Transport(_) => true,
            FetchError::Status(code) => *code >= 500,
            _ => false,
        }
    }

    /// 메트릭 라벨용 분류 이름.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::RateLimited(_) => "rate_limited",
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::Parse(_) => "parse",
            FetchError::NoData(_) => "no_data",
            FetchError::NotConfigured(_) => "not_configured",
        }
    }

    /// 오류 메시지 텍스트에서 요청 한도 초과 여부를 판별합니다.
    ///
    /// 상태 코드를 노출하지 않는 클라이언트 라이브러리의 오류를 분류할 때 사용합니다.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("too many requests") {
            FetchError::RateLimited(message)
        } else {
            FetchError::Transport(message)
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout(Duration::ZERO);
        }
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return FetchError::RateLimited(err.to_string());
            }
            return FetchError::Status(status.as_u16());
        }
        if err.is_decode() {
            return FetchError::Parse(err.to_string());
        }
        FetchError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

/// 캐시 사용 오류 (호출자 버그).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// TTL은 양수여야 함
    #[error("TTL must be positive (key: {0})")]
    InvalidTtl(String),

    /// 등록되지 않은 데이터셋
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),
}

impl From<CacheError> for market_core::CoreError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::InvalidTtl(key) => {
                market_core::CoreError::InvalidInput(format!("non-positive TTL for {}", key))
            }
            CacheError::UnknownDataset(key) => market_core::CoreError::UnknownDataset(key),
        }
    }
}

/// 리포트/뉴스 저장소 오류.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 연결 실패
    #[error("Database connection error: {0}")]
    Connection(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            sqlx::Error::Database(db_err) => StoreError::Query(db_err.message().to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

//! 외부 데이터 Provider 모듈.
//!
//! 모든 데이터셋 페처가 따르는 계약([`Fetcher`], [`FetchResult`])과
//! 외부 소스 클라이언트를 정의합니다.
//!
//! ## 페처 계약
//! - 모든 네트워크 호출은 제한 시간([`with_timeout`])을 적용
//! - 타임아웃/전송 오류는 `FetchResult::Failure`로 변환되며 호출자에게 전파되지 않음
//! - 실패 시 데이터셋에 맞는 정적 기본값을 함께 제공
//! - 요청 한도 초과(HTTP 429)일 때만 지수 백오프로 재시도 ([`RetryPolicy`])
//!
//! ## 외부 소스
//! - `YahooQuoteSource`: 지수/ETF/종목 일봉 (Yahoo Finance)
//! - `FredClient`: 통계 시계열 (FRED, API 키 선택)
//! - `FearGreedClient`: 공포탐욕지수 JSON API

pub mod fear_greed;
pub mod fred;
pub mod quotes;
pub mod retry;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

pub use fear_greed::{FearGreedClient, FearGreedReading};
pub use fred::{FredClient, FredSeries};
pub use quotes::{DailyBar, QuoteSource, StaticQuoteSource, YahooQuoteSource};
pub use retry::RetryPolicy;

/// 페치 결과.
///
/// 실패한 경우에도 구조적으로 유효한 기본값을 함께 전달합니다.
#[derive(Debug, Clone)]
pub enum FetchResult<T> {
    Success(T),
    Failure { fallback: T, reason: FetchError },
}

impl<T> FetchResult<T> {
    /// 실패 결과를 생성합니다.
    pub fn failure(fallback: T, reason: FetchError) -> Self {
        FetchResult::Failure { fallback, reason }
    }

    /// `Result`를 변환합니다. 오류이면 `fallback`으로 기본값을 만듭니다.
    pub fn from_result(result: Result<T, FetchError>, fallback: impl FnOnce() -> T) -> Self {
        match result {
            Ok(value) => FetchResult::Success(value),
            Err(reason) => FetchResult::Failure {
                fallback: fallback(),
                reason,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success(_))
    }

    /// 성공 값 또는 기본값.
    pub fn value(&self) -> &T {
        match self {
            FetchResult::Success(value) => value,
            FetchResult::Failure { fallback, .. } => fallback,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            FetchResult::Success(value) => value,
            FetchResult::Failure { fallback, .. } => fallback,
        }
    }

    pub fn reason(&self) -> Option<&FetchError> {
        match self {
            FetchResult::Success(_) => None,
            FetchResult::Failure { reason, .. } => Some(reason),
        }
    }
}

/// 데이터셋 페처.
///
/// 하나의 데이터셋(지수, 섹터, 거시지표 등)을 외부 소스에서 가져옵니다.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// 데이터셋 스냅샷 타입
    type Output: Send + Sync + 'static;

    /// 로그/메트릭용 이름.
    fn name(&self) -> &'static str;

    /// 외부 소스를 전혀 사용할 수 없을 때 제공하는 정적 기본값.
    fn fallback(&self) -> Self::Output;

    /// 데이터를 가져옵니다. 실패는 `FetchResult::Failure`로 반환합니다.
    async fn fetch(&self) -> FetchResult<Self::Output>;
}

/// 네트워크 호출에 제한 시간을 적용합니다.
pub async fn with_timeout<T, F>(limit: Duration, future: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(limit)),
    }
}

/// 소수점 `places` 자리로 반올림.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_result_from_result() {
        let ok = FetchResult::from_result(Ok(3), || 0);
        assert!(ok.is_success());
        assert_eq!(ok.into_value(), 3);

        let failed = FetchResult::from_result(Err(FetchError::Status(503)), || 13);
        assert!(!failed.is_success());
        assert_eq!(failed.reason(), Some(&FetchError::Status(503)));
        assert_eq!(*failed.value(), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_converts_hang_to_failure() {
        let result: Result<(), FetchError> = with_timeout(Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(FetchError::Timeout(Duration::from_secs(5))));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(-0.1255, 3), -0.126);
    }
}

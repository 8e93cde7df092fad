//! 공통 에러 타입.
//!
//! 설정 로딩, 입력 검증 등 여러 크레이트가 공유하는 에러를 정의합니다.
//! 업스트림 장애는 여기서 다루지 않습니다 (`market-data`의 `FetchError` 참고).

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 등록되지 않은 데이터셋
    #[error("알 수 없는 데이터셋: {0}")]
    UnknownDataset(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 공통 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 호출자 버그(잘못된 사용)로 인한 에러인지 확인합니다.
    pub fn is_caller_bug(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidInput(_) | CoreError::UnknownDataset(_)
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_bug_classification() {
        assert!(CoreError::UnknownDataset("foo".to_string()).is_caller_bug());
        assert!(CoreError::InvalidInput("limit".to_string()).is_caller_bug());
        assert!(!CoreError::Config("bad tz".to_string()).is_caller_bug());
    }

    #[test]
    fn test_error_message() {
        let err = CoreError::UnknownDataset("weather".to_string());
        assert_eq!(err.to_string(), "알 수 없는 데이터셋: weather");
    }
}

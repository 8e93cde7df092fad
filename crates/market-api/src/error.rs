//! API 에러 응답 타입.
//!
//! 에러 응답은 호출자 실수(잘못된 쿼리, 알 수 없는 데이터셋)에만 사용합니다.
//! 외부 데이터 소스 장애는 에러가 아니라 기본값 응답으로 처리됩니다.

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use validator::ValidationErrors;

use market_data::{CacheError, FetchError, StoreError};

/// API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "UNKNOWN_DATASET",
///   "message": "Unknown dataset: crypto",
///   "details": null,
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "VALIDATION_ERROR", "UNKNOWN_DATASET")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiErrorResponse>)>;

/// 400 응답 생성.
pub fn bad_request(
    code: impl Into<String>,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiErrorResponse::new(code, message)),
    )
}

/// 404 응답 생성.
pub fn not_found(
    code: impl Into<String>,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiErrorResponse::new(code, message)),
    )
}

/// `validator` 검증 실패를 400 응답으로 변환합니다.
pub fn validation_error(errors: ValidationErrors) -> (StatusCode, Json<ApiErrorResponse>) {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ");

    bad_request("VALIDATION_ERROR", message)
}

/// 캐시 에러를 HTTP 응답으로 변환합니다.
pub fn cache_error(error: CacheError) -> (StatusCode, Json<ApiErrorResponse>) {
    match &error {
        CacheError::UnknownDataset(key) => (
            StatusCode::NOT_FOUND,
            Json(ApiErrorResponse::with_details(
                "UNKNOWN_DATASET",
                error.to_string(),
                serde_json::json!({ "dataset": key }),
            )),
        ),
        CacheError::InvalidTtl(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiErrorResponse::new("CACHE_ERROR", error.to_string())),
        ),
    }
}

/// 캐시를 거친 조회의 내부 실패 원인.
///
/// 핸들러는 이 에러를 로그로만 남기고 빈 결과로 응답합니다.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("응답 직렬화 실패: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Debug, Validate)]
    struct LimitQuery {
        #[validate(range(min = 1, max = 100, message = "limit은 1-100 사이여야 합니다"))]
        limit: u32,
    }

    #[test]
    fn test_api_error_response_new() {
        let error = ApiErrorResponse::new("TEST_ERROR", "Test message");
        assert_eq!(error.code(), "TEST_ERROR");
        assert_eq!(error.message(), "Test message");
        assert!(error.timestamp.is_some());
        assert!(error.details.is_none());
    }

    #[test]
    fn test_json_omits_missing_details() {
        let error = ApiErrorResponse::new("NOT_FOUND", "Resource not found");
        let json = serde_json::to_string(&error).unwrap();

        assert!(!json.contains("details"));
        assert!(json.contains(r#""code":"NOT_FOUND""#));
    }

    #[test]
    fn test_unknown_dataset_maps_to_404() {
        let (status, Json(body)) = cache_error(CacheError::UnknownDataset("crypto".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "UNKNOWN_DATASET");
        assert_eq!(body.details, Some(serde_json::json!({ "dataset": "crypto" })));
    }

    #[test]
    fn test_validation_error_uses_field_message() {
        let errors = LimitQuery { limit: 0 }.validate().unwrap_err();
        let (status, Json(body)) = validation_error(errors);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(body.message, "limit은 1-100 사이여야 합니다");
    }
}

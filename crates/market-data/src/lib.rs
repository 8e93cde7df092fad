//! 데이터 캐싱 및 조회.
//!
//! 이 crate는 다음을 제공합니다:
//! - 키별 TTL 캐시와 데이터셋 캐시 코디네이터 (장 시간 기반 갱신, single-flight)
//! - 외부 데이터 페처 계약과 요청 한도 재시도 정책
//! - 대시보드 데이터셋 (지수, 섹터, 52주, 거시지표)
//! - 리포트/뉴스 읽기 전용 저장소

pub mod cache;
pub mod datasets;
pub mod error;
pub mod provider;
pub mod storage;

pub use error::{CacheError, FetchError, Result, StoreError};

// 캐시 타입 재내보내기
pub use cache::{
    DatasetCache, DatasetControl, DatasetOptions, DatasetRegistry, DatasetState, DatasetStatus,
    DatasetView, ExpiringCache, MarketSchedule, RefreshMode, RefreshPolicy, RefreshSupervisor,
};

// 페처 재내보내기
pub use provider::{FetchResult, Fetcher, QuoteSource, RetryPolicy};

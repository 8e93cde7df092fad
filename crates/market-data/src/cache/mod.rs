//! 캐싱 레이어.
//!
//! - [`ExpiringCache`]: 키별 TTL 캐시 (파라미터가 있는 응답, 리포트/뉴스 조회)
//! - [`DatasetCache`]: 데이터셋 단위 코디네이터 (TTL 또는 장 시간 정책, single-flight)
//! - [`DatasetRegistry`]: 관리용 데이터셋 조회
//! - [`RefreshSupervisor`]: 백그라운드 갱신 작업 감독

pub mod dataset;
pub mod expiring;
pub mod registry;
pub mod schedule;
pub mod supervisor;

pub use dataset::{DatasetCache, DatasetControl, DatasetState, DatasetStatus, DatasetView};
pub use expiring::ExpiringCache;
pub use registry::DatasetRegistry;
pub use schedule::{DatasetOptions, MarketSchedule, RefreshMode, RefreshPolicy};
pub use supervisor::RefreshSupervisor;

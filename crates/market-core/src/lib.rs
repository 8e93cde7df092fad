//! # Market Core
//!
//! 마켓 대시보드 백엔드가 공유하는 기반 모듈을 제공합니다:
//! - 설정 관리 (`config` 크레이트, 환경 변수 오버라이드)
//! - 로깅 인프라 (`tracing`)
//! - 시각 공급자 ([`Clock`])
//! - 공통 에러 타입

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::*;
pub use error::*;
pub use logging::*;

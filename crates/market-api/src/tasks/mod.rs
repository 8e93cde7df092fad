//! 백그라운드 태스크 모듈.
//!
//! 서버 실행 중 주기적으로 실행되는 백그라운드 작업을 정의합니다.
//! - 데이터셋 갱신: 갱신이 필요한 데이터셋을 찾아 백그라운드 갱신 시작

pub mod refresh;

pub use refresh::start_refresh_scheduler;

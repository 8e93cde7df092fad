//! 데이터셋 주기 갱신 스케줄러.
//!
//! 기동 직후 모든 데이터셋을 한 번 데운 뒤, 일정 주기마다 갱신이 필요한 데이터셋에
//! 백그라운드 갱신을 시작합니다. 실제 가져오기는 각 데이터셋 캐시가 감독자를 통해
//! 수행하므로 스케줄러 자체는 가져오기를 기다리지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::set_background_tasks;
use crate::state::AppState;

/// 갱신 스케줄러를 시작합니다.
///
/// # Arguments
/// * `state` - 데이터셋 레지스트리를 가진 공유 상태
/// * `period` - 점검 주기
/// * `shutdown_token` - 종료 시그널 토큰
pub fn start_refresh_scheduler(
    state: Arc<AppState>,
    period: Duration,
    shutdown_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = period.as_secs(),
            datasets = state.datasets.len(),
            "데이터셋 갱신 스케줄러 시작"
        );

        // 첫 tick은 즉시 완료되므로 기동 직후 예열이 됩니다
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = state.datasets.refresh_stale();
                    if started > 0 {
                        debug!(started, "데이터셋 갱신 시작");
                    }
                    set_background_tasks(state.supervisor.active_tasks());
                }
                _ = shutdown_token.cancelled() => {
                    info!("갱신 스케줄러: 종료 시그널 수신");
                    break;
                }
            }
        }

        info!("데이터셋 갱신 스케줄러 종료됨");
    })
}

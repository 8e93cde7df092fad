//! 백그라운드 갱신 작업 감독.
//!
//! 분리(detached) 갱신은 모두 이 감독자를 통해 생성됩니다.
//! 작업의 패닉은 로그로 기록되고, 프로세스 종료 시 취소 토큰으로 중단한 뒤
//! 제한 시간 안에서 완료를 기다립니다.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// 백그라운드 작업 감독자.
#[derive(Debug, Clone)]
pub struct RefreshSupervisor {
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Default for RefreshSupervisor {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl RefreshSupervisor {
    /// 프로세스 종료 토큰에 연결된 감독자를 생성합니다.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            tracker: TaskTracker::new(),
            shutdown,
        }
    }

    /// 종료가 시작되었는지 확인합니다.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// 실행 중인 작업 수.
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// 감독 대상 작업을 생성합니다. 종료 중이면 생성하지 않고 `false`를 반환합니다.
    pub fn spawn<F>(&self, label: &str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            debug!(task = %label, "종료 중, 작업 생성 생략");
            return false;
        }

        // 추적 대상은 감시 작업 하나뿐이므로 작업 수는 갱신 수와 같음
        let token = self.shutdown.clone();
        let worker_label = label.to_string();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(task = %worker_label, "종료 신호로 작업 중단");
                }
                _ = task => {}
            }
        });

        let label = label.to_string();
        self.tracker.spawn(async move {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(task = %label, "백그라운드 작업 패닉");
                } else {
                    warn!(task = %label, error = %e, "백그라운드 작업 비정상 종료");
                }
            }
        });

        true
    }

    /// 작업 생성을 닫고 남은 작업이 끝날 때까지 최대 `grace`만큼 기다립니다.
    ///
    /// 모든 작업이 시간 안에 끝나면 `true`.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.shutdown.cancel();
        self.tracker.close();

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                info!("백그라운드 작업 종료 완료");
                true
            }
            Err(_) => {
                warn!(remaining = self.tracker.len(), "백그라운드 작업 종료 대기 시간 초과");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_spawned_task_runs() {
        let supervisor = RefreshSupervisor::default();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        assert!(supervisor.spawn("unit", async move {
            flag.store(true, Ordering::SeqCst);
        }));

        assert!(supervisor.shutdown(Duration::from_secs(1)).await);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let supervisor = RefreshSupervisor::default();
        supervisor.spawn("panicking", async {
            panic!("boom");
        });

        assert!(supervisor.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_tasks_counts_each_refresh_once() {
        let supervisor = RefreshSupervisor::default();

        supervisor.spawn("first", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        assert_eq!(supervisor.active_tasks(), 1);

        supervisor.spawn("second", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        assert_eq!(supervisor.active_tasks(), 2);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(supervisor.active_tasks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_long_task_and_rejects_new_ones() {
        let token = CancellationToken::new();
        let supervisor = RefreshSupervisor::new(token.clone());

        supervisor.spawn("hung-upstream", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        assert!(supervisor.shutdown(Duration::from_secs(5)).await);
        assert!(token.is_cancelled());
        assert!(!supervisor.spawn("late", async {}));
    }
}

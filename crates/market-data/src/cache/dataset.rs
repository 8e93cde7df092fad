//! 데이터셋 캐시 코디네이터.
//!
//! 하나의 논리적 데이터셋(거시지표, 52주 유니버스 등)의 마지막 정상 스냅샷을 보관하고,
//! 신선도 정책에 따라 갱신을 조율합니다.
//!
//! # 상태 전이
//!
//! ```text
//!            get_or_refresh (동기)
//!   EMPTY ─────────────────────────▶ POPULATING ──성공──▶ FRESH
//!     ▲                                  │  ▲                │
//!     │ invalidate                  실패 │  │ 갱신 시작       │ is_stale()
//!     │                                  ▼  │                ▼
//!     └──────────────────────────── (기존 스냅샷 유지) ◀──── STALE
//! ```
//!
//! # 동시성
//!
//! - 데이터셋마다 비동기 뮤텍스 하나로 갱신을 직렬화합니다 (single-flight).
//!   락을 기다린 호출자는 그 사이 끝난 갱신 결과를 그대로 사용하고 다시 가져오지 않습니다.
//! - 스냅샷은 `Arc<T>` 하나로 통째 교체되므로 읽는 쪽은 갱신 전 또는 갱신 후
//!   스냅샷 중 하나만 봅니다.
//! - 갱신 실패는 기존 `data`와 `last_update`를 건드리지 않습니다.
//! - `invalidate()`는 세대(epoch)를 올리고, 진행 중이던 이전 세대 갱신 결과는 버려집니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use market_core::Clock;
use metrics::counter;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::schedule::{DatasetOptions, RefreshMode};
use super::supervisor::RefreshSupervisor;
use crate::error::FetchError;
use crate::provider::{FetchResult, Fetcher};

/// 데이터셋 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetState {
    /// 데이터 없음
    Empty,
    /// 신선함
    Fresh,
    /// 갱신 필요
    Stale,
}

struct Snapshot<T> {
    data: Option<Arc<T>>,
    last_update: Option<DateTime<Utc>>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            last_update: self.last_update,
        }
    }
}

/// 호출자에게 전달되는 데이터셋 조회 결과.
#[derive(Debug, Clone)]
pub struct DatasetView<T> {
    /// 스냅샷, 또는 데이터가 없을 때 페처의 정적 기본값
    pub data: Arc<T>,
    /// 마지막 성공 갱신 시각 (기준 시간대)
    pub last_update: Option<DateTime<Tz>>,
    /// 다음 갱신 안내 문구
    pub next_update: String,
    pub state: DatasetState,
    /// `data`가 기본값인지 여부
    pub is_fallback: bool,
}

/// 관리/상태 조회용 데이터셋 요약.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatasetStatus {
    pub name: String,
    pub state: DatasetState,
    pub last_update: Option<DateTime<Tz>>,
    pub next_update: String,
    pub updating: bool,
    pub policy: String,
    pub mode: String,
}

enum RefreshOutcome<T> {
    Applied,
    Failed(T),
    Discarded,
}

/// 데이터셋 캐시.
pub struct DatasetCache<T> {
    name: String,
    fetcher: Arc<dyn Fetcher<Output = T>>,
    options: DatasetOptions,
    clock: Arc<dyn Clock>,
    supervisor: RefreshSupervisor,
    snapshot: RwLock<Snapshot<T>>,
    refresh_lock: Arc<Mutex<()>>,
    /// `invalidate()`마다 증가
    epoch: AtomicU64,
    /// 현재 세대에서 완료된 갱신 시도 수 (성공/실패 모두)
    completed: AtomicU64,
}

impl<T: Send + Sync + 'static> DatasetCache<T> {
    pub fn new(
        name: impl Into<String>,
        fetcher: Arc<dyn Fetcher<Output = T>>,
        options: DatasetOptions,
        clock: Arc<dyn Clock>,
        supervisor: RefreshSupervisor,
    ) -> Self {
        Self {
            name: name.into(),
            fetcher,
            options,
            clock,
            supervisor,
            snapshot: RwLock::new(Snapshot {
                data: None,
                last_update: None,
            }),
            refresh_lock: Arc::new(Mutex::new(())),
            epoch: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &DatasetOptions {
        &self.options
    }

    fn read_snapshot(&self) -> Snapshot<T> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_fresh(&self, snapshot: &Snapshot<T>, now: DateTime<Utc>) -> bool {
        snapshot.data.is_some() && !self.options.policy.is_stale(snapshot.last_update, now)
    }

    fn state_of(&self, snapshot: &Snapshot<T>, now: DateTime<Utc>) -> DatasetState {
        if snapshot.data.is_none() {
            DatasetState::Empty
        } else if self.options.policy.is_stale(snapshot.last_update, now) {
            DatasetState::Stale
        } else {
            DatasetState::Fresh
        }
    }

    fn view(&self, snapshot: Snapshot<T>, fallback: Option<T>) -> DatasetView<T> {
        let now = self.clock.now();
        let state = self.state_of(&snapshot, now);
        let next_update =
            self.options
                .policy
                .describe_next_refresh(snapshot.last_update, now, self.options.timezone);
        let last_update = snapshot
            .last_update
            .map(|at| at.with_timezone(&self.options.timezone));

        let (data, is_fallback) = match snapshot.data {
            Some(data) => (data, false),
            None => (
                Arc::new(fallback.unwrap_or_else(|| self.fetcher.fallback())),
                true,
            ),
        };

        DatasetView {
            data,
            last_update,
            next_update,
            state,
            is_fallback,
        }
    }

    /// 주 조회 경로.
    ///
    /// - EMPTY: 동기로 가져온 뒤 반환
    /// - FRESH: 즉시 반환
    /// - STALE: 정책에 따라 동기 갱신 또는 백그라운드 갱신 후 기존 스냅샷 반환
    pub async fn get_or_refresh(self: &Arc<Self>) -> DatasetView<T> {
        let snapshot = self.read_snapshot();
        let now = self.clock.now();

        if snapshot.data.is_none() {
            return self.populate().await;
        }
        if self.is_fresh(&snapshot, now) {
            return self.view(snapshot, None);
        }

        match self.options.mode {
            RefreshMode::Blocking => self.populate().await,
            RefreshMode::Detached => {
                self.spawn_refresh();
                self.view(snapshot, None)
            }
        }
    }

    /// 현재 스냅샷을 갱신 없이 반환합니다.
    pub fn peek(&self) -> DatasetView<T> {
        self.view(self.read_snapshot(), None)
    }

    /// 동기 갱신. 진행 중인 갱신이 있으면 그 결과를 기다려 공유합니다.
    async fn populate(&self) -> DatasetView<T> {
        let seen = self.completed.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        let snapshot = self.read_snapshot();
        if self.is_fresh(&snapshot, self.clock.now()) {
            return self.view(snapshot, None);
        }
        if self.completed.load(Ordering::Acquire) != seen {
            // 기다리는 동안 다른 호출자의 갱신 시도가 끝남
            debug!(dataset = %self.name, "진행 중이던 갱신 결과 공유");
            return self.view(snapshot, None);
        }

        match self.refresh_locked().await {
            RefreshOutcome::Failed(fallback) => self.view(self.read_snapshot(), Some(fallback)),
            RefreshOutcome::Applied | RefreshOutcome::Discarded => {
                self.view(self.read_snapshot(), None)
            }
        }
    }

    /// 갱신 락을 쥔 상태에서 한 번 가져옵니다.
    async fn refresh_locked(&self) -> RefreshOutcome<T> {
        let epoch = self.epoch.load(Ordering::Acquire);
        let started = Instant::now();
        let limit = self.options.refresh_timeout;

        let result = match tokio::time::timeout(limit, self.fetcher.fetch()).await {
            Ok(result) => result,
            Err(_) => FetchResult::failure(self.fetcher.fallback(), FetchError::Timeout(limit)),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if self.epoch.load(Ordering::Acquire) != epoch {
            debug!(dataset = %self.name, "무효화된 세대의 갱신 결과 폐기");
            return RefreshOutcome::Discarded;
        }

        let outcome = match result {
            FetchResult::Success(value) => {
                let now = self.clock.now();
                snapshot.data = Some(Arc::new(value));
                // last_update는 앞으로만 진행
                snapshot.last_update = Some(match snapshot.last_update {
                    Some(previous) if previous > now => previous,
                    _ => now,
                });
                drop(snapshot);

                info!(dataset = %self.name, elapsed_ms, "데이터셋 갱신 완료");
                counter!(
                    "dataset_refresh_total",
                    "dataset" => self.name.clone(),
                    "outcome" => "success"
                )
                .increment(1);
                RefreshOutcome::Applied
            }
            FetchResult::Failure { fallback, reason } => {
                let had_data = snapshot.data.is_some();
                drop(snapshot);

                warn!(
                    dataset = %self.name,
                    error = %reason,
                    elapsed_ms,
                    had_data,
                    "데이터셋 갱신 실패, 기존 스냅샷 유지"
                );
                counter!(
                    "dataset_refresh_total",
                    "dataset" => self.name.clone(),
                    "outcome" => "failure",
                    "reason" => reason.kind()
                )
                .increment(1);
                RefreshOutcome::Failed(fallback)
            }
        };

        self.completed.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// 백그라운드 갱신을 시작합니다. 이미 갱신 중이면 아무것도 하지 않습니다.
    fn spawn_refresh(self: &Arc<Self>) -> bool {
        let guard = match Arc::clone(&self.refresh_lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(dataset = %self.name, "이미 갱신 중");
                return false;
            }
        };

        let this = Arc::clone(self);
        self.supervisor.spawn(&self.name, async move {
            let _guard = guard;
            // 락 획득 직전에 다른 갱신이 끝났을 수 있음
            if this.is_fresh(&this.read_snapshot(), this.clock.now()) {
                return;
            }
            this.refresh_locked().await;
        })
    }

    /// EMPTY 또는 STALE이면 백그라운드 갱신을 시작합니다 (주기 작업용).
    pub fn refresh_if_stale(self: &Arc<Self>) -> bool {
        if self.is_fresh(&self.read_snapshot(), self.clock.now()) {
            return false;
        }
        self.spawn_refresh()
    }

    /// 데이터셋을 EMPTY로 되돌립니다. 가져오기는 하지 않습니다.
    pub fn invalidate(&self) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        self.epoch.fetch_add(1, Ordering::AcqRel);
        snapshot.data = None;
        snapshot.last_update = None;
        drop(snapshot);

        info!(dataset = %self.name, "데이터셋 캐시 무효화");
    }

    /// 무효화 후 즉시 동기 갱신합니다.
    pub async fn force_refresh(&self) -> DatasetView<T> {
        self.invalidate();
        self.populate().await
    }

    /// 갱신이 진행 중인지 확인합니다.
    pub fn is_updating(&self) -> bool {
        self.refresh_lock.try_lock().is_err()
    }

    pub fn status(&self) -> DatasetStatus {
        let snapshot = self.read_snapshot();
        let now = self.clock.now();

        DatasetStatus {
            name: self.name.clone(),
            state: self.state_of(&snapshot, now),
            last_update: snapshot
                .last_update
                .map(|at| at.with_timezone(&self.options.timezone)),
            next_update: self.options.policy.describe_next_refresh(
                snapshot.last_update,
                now,
                self.options.timezone,
            ),
            updating: self.is_updating(),
            policy: self.options.policy.label(),
            mode: match self.options.mode {
                RefreshMode::Blocking => "blocking".to_string(),
                RefreshMode::Detached => "detached".to_string(),
            },
        }
    }
}

/// 타입을 지운 데이터셋 관리 핸들.
#[async_trait]
pub trait DatasetControl: Send + Sync {
    fn name(&self) -> &str;

    fn status(&self) -> DatasetStatus;

    fn invalidate(&self);

    /// 무효화 후 동기 갱신하고 결과 상태를 반환합니다.
    async fn force_refresh(&self) -> DatasetStatus;

    /// 필요하면 백그라운드 갱신을 시작합니다.
    fn refresh_if_stale(self: Arc<Self>) -> bool;
}

#[async_trait]
impl<T: Send + Sync + 'static> DatasetControl for DatasetCache<T> {
    fn name(&self) -> &str {
        DatasetCache::name(self)
    }

    fn status(&self) -> DatasetStatus {
        DatasetCache::status(self)
    }

    fn invalidate(&self) {
        DatasetCache::invalidate(self)
    }

    async fn force_refresh(&self) -> DatasetStatus {
        DatasetCache::force_refresh(self).await;
        DatasetCache::status(self)
    }

    fn refresh_if_stale(self: Arc<Self>) -> bool {
        DatasetCache::refresh_if_stale(&self)
    }
}

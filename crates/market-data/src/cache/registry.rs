//! 데이터셋 레지스트리.
//!
//! 관리용 엔드포인트와 주기 갱신 작업이 데이터셋 키로 코디네이터를 찾을 수 있도록
//! 타입을 지운 핸들([`DatasetControl`])을 보관합니다. 기동 시 한 번 구성합니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::dataset::{DatasetControl, DatasetStatus};
use crate::error::CacheError;

/// 데이터셋 키 → 관리 핸들.
#[derive(Clone, Default)]
pub struct DatasetRegistry {
    datasets: BTreeMap<String, Arc<dyn DatasetControl>>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 데이터셋을 등록합니다. 같은 이름이 있으면 교체합니다.
    pub fn register(&mut self, dataset: Arc<dyn DatasetControl>) {
        self.datasets.insert(dataset.name().to_string(), dataset);
    }

    /// 데이터셋 핸들을 조회합니다.
    ///
    /// # Errors
    ///
    /// 등록되지 않은 키면 [`CacheError::UnknownDataset`].
    pub fn get(&self, key: &str) -> Result<Arc<dyn DatasetControl>, CacheError> {
        self.datasets
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::UnknownDataset(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// 모든 데이터셋 상태.
    pub fn statuses(&self) -> Vec<DatasetStatus> {
        self.datasets.values().map(|d| d.status()).collect()
    }

    /// 갱신이 필요한 데이터셋마다 백그라운드 갱신을 시작하고, 시작된 개수를 반환합니다.
    pub fn refresh_stale(&self) -> usize {
        let started = self
            .datasets
            .values()
            .filter(|d| Arc::clone(d).refresh_if_stale())
            .count();
        if started > 0 {
            debug!(started, "백그라운드 갱신 시작");
        }
        started
    }
}

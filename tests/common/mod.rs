//! Shared integration test infrastructure for s3prune.
//!
//! Provides an in-memory bucket (`InMemoryBucket`) that implements
//! `StorageTrait`, so whole pipeline runs can be exercised without S3.

#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use s3prune::config::BackoffConfig;
use s3prune::types::FailedKey;
use s3prune::{Config, S3pruneError, Storage, StorageTrait};

/// Upper bound for a single integration test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Default)]
struct BucketState {
    objects: Mutex<BTreeSet<String>>,
    throttles_left: AtomicUsize,
    delete_calls: AtomicUsize,
    delete_attempts_per_key: Mutex<Vec<String>>,
    list_markers: Mutex<Vec<Option<String>>>,
    refused: Mutex<VecDeque<String>>,
}

/// A sorted in-memory bucket.
///
/// Listing follows ListObjects marker semantics: keys strictly after the
/// marker, in lexicographic order. The first `throttles_left` delete calls
/// fail with a SlowDown error.
#[derive(Clone, Default)]
pub struct InMemoryBucket {
    state: Arc<BucketState>,
}

impl InMemoryBucket {
    pub fn with_objects<I: IntoIterator<Item = String>>(keys: I) -> Self {
        let bucket = InMemoryBucket::default();
        bucket.state.objects.lock().unwrap().extend(keys);
        bucket
    }

    pub fn throttling_first(self, calls: usize) -> Self {
        self.state.throttles_left.store(calls, Ordering::SeqCst);
        self
    }

    pub fn refusing(self, key: &str) -> Self {
        self.state.refused.lock().unwrap().push_back(key.to_string());
        self
    }

    pub fn boxed(&self) -> Storage {
        Box::new(self.clone())
    }

    pub fn remaining(&self) -> BTreeSet<String> {
        self.state.objects.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> usize {
        self.state.delete_calls.load(Ordering::SeqCst)
    }

    /// Keys passed to successful delete calls, in call order.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.state.delete_attempts_per_key.lock().unwrap().clone()
    }

    pub fn list_markers(&self) -> Vec<Option<String>> {
        self.state.list_markers.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageTrait for InMemoryBucket {
    async fn list_objects(
        &self,
        prefix: &str,
        marker: Option<String>,
        max_keys: i32,
    ) -> Result<Vec<String>> {
        self.state.list_markers.lock().unwrap().push(marker.clone());

        let objects = self.state.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| marker.as_ref().is_none_or(|m| key.as_str() > m.as_str()))
            .take(max_keys as usize)
            .cloned()
            .collect())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<Vec<FailedKey>> {
        self.state.delete_calls.fetch_add(1, Ordering::SeqCst);

        let throttled = self
            .state
            .throttles_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            tokio::time::sleep(Duration::from_millis(1)).await;
            return Err(anyhow!(S3pruneError::Throttled {
                code: "SlowDown".to_string(),
                message: "Please reduce your request rate.".to_string(),
            }));
        }

        let refused = self.state.refused.lock().unwrap().clone();
        let mut objects = self.state.objects.lock().unwrap();
        let mut deleted = self.state.delete_attempts_per_key.lock().unwrap();
        let mut failed = vec![];
        for key in keys {
            if refused.contains(key) {
                failed.push(FailedKey {
                    key: key.clone(),
                    error_code: "AccessDenied".to_string(),
                    error_message: "Access Denied".to_string(),
                });
                continue;
            }
            objects.remove(key);
            deleted.push(key.clone());
        }

        Ok(failed)
    }
}

pub fn make_keys(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i:05}.log")).collect()
}

/// Tighten timings so that throttled runs finish quickly.
pub fn fast_timings(config: &mut Config) {
    config.throttle_quiet_period_milliseconds = 20;
    config.backoff_config = BackoffConfig {
        initial_interval_milliseconds: 1,
        max_interval_milliseconds: 20,
        multiplier: 1.5,
    };
}

#[macro_export]
macro_rules! test_timeout {
    ($body:expr) => {
        tokio::time::timeout(common::TEST_TIMEOUT, $body)
            .await
            .expect("integration test timed out")
    };
}

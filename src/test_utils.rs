//! Shared test utilities for the s3prune library crate.
//!
//! This module provides canonical helper functions and a scripted
//! [`MockStorage`] used across multiple test modules.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::config::{BackoffConfig, Config};
use crate::storage::{Storage, StorageTrait};
use crate::types::FailedKey;
use crate::types::error::S3pruneError;

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Create a default [`Config`] suitable for most unit tests.
///
/// Key defaults: `pool_size=4`, `batch_size=1000`, bucket=`"test-bucket"`,
/// prefix=`"prefix/"`, short backoff and quiet period.
pub(crate) fn make_test_config() -> Config {
    let mut config = Config::for_prefix("test-bucket", "prefix/");
    config.pool_size = 4;
    config.throttle_quiet_period_milliseconds = 10;
    config.backoff_config = BackoffConfig {
        initial_interval_milliseconds: 1,
        max_interval_milliseconds: 10,
        multiplier: 1.5,
    };
    config
}

pub(crate) fn make_keys(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i:05}")).collect()
}

/// Scripted outcome of one `delete_objects` call.
#[derive(Debug, Clone)]
pub(crate) enum MockDeleteResponse {
    Ok,
    Throttle,
    Fail(String),
    /// The listed keys are refused; the rest of the batch is deleted.
    PartialFailure(Vec<String>),
}

#[derive(Default)]
struct MockState {
    delete_responses: Mutex<VecDeque<MockDeleteResponse>>,
    throttle_forever: bool,
    delete_latency: Option<Duration>,
    delete_calls: AtomicUsize,
    deleted_keys: Mutex<Vec<String>>,
    list_pages: Mutex<VecDeque<Result<Vec<String>>>>,
    list_markers: Mutex<Vec<Option<String>>>,
}

/// In-memory [`StorageTrait`] with scripted responses.
///
/// Delete calls consume the scripted responses in order and succeed once
/// the script is exhausted (unless built with `throttling_forever`).
/// Clones share state, so a test can keep a handle for assertions.
#[derive(Clone, Default)]
pub(crate) struct MockStorage {
    state: Arc<MockState>,
}

impl MockStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delete_responses(responses: Vec<MockDeleteResponse>) -> Self {
        MockStorage {
            state: Arc::new(MockState {
                delete_responses: Mutex::new(responses.into()),
                ..MockState::default()
            }),
        }
    }

    pub(crate) fn throttling_forever() -> Self {
        MockStorage {
            state: Arc::new(MockState {
                throttle_forever: true,
                ..MockState::default()
            }),
        }
    }

    /// Every delete call takes `latency` before it completes.
    pub(crate) fn with_delete_latency(latency: Duration) -> Self {
        MockStorage {
            state: Arc::new(MockState {
                delete_latency: Some(latency),
                ..MockState::default()
            }),
        }
    }

    pub(crate) fn with_list_pages(pages: Vec<Result<Vec<String>>>) -> Self {
        MockStorage {
            state: Arc::new(MockState {
                list_pages: Mutex::new(pages.into()),
                ..MockState::default()
            }),
        }
    }

    pub(crate) fn boxed(&self) -> Storage {
        Box::new(self.clone())
    }

    pub(crate) fn delete_calls(&self) -> usize {
        self.state.delete_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn deleted_keys(&self) -> Vec<String> {
        self.state.deleted_keys.lock().unwrap().clone()
    }

    pub(crate) fn list_markers(&self) -> Vec<Option<String>> {
        self.state.list_markers.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    async fn list_objects(
        &self,
        _prefix: &str,
        marker: Option<String>,
        max_keys: i32,
    ) -> Result<Vec<String>> {
        self.state.list_markers.lock().unwrap().push(marker);

        let page = self.state.list_pages.lock().unwrap().pop_front();
        match page {
            Some(Ok(keys)) => {
                assert!(keys.len() <= max_keys as usize);
                Ok(keys)
            }
            Some(Err(e)) => Err(e),
            None => Ok(vec![]),
        }
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<Vec<FailedKey>> {
        self.state.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.state.delete_latency {
            tokio::time::sleep(latency).await;
        }

        let response = if self.state.throttle_forever {
            MockDeleteResponse::Throttle
        } else {
            self.state
                .delete_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(MockDeleteResponse::Ok)
        };

        match response {
            MockDeleteResponse::Ok => {
                self.state
                    .deleted_keys
                    .lock()
                    .unwrap()
                    .extend(keys.iter().cloned());
                Ok(vec![])
            }
            MockDeleteResponse::Throttle => Err(anyhow!(S3pruneError::Throttled {
                code: "SlowDown".to_string(),
                message: "Please reduce your request rate.".to_string(),
            })),
            MockDeleteResponse::Fail(message) => Err(anyhow!(message)),
            MockDeleteResponse::PartialFailure(refused) => {
                let mut deleted = self.state.deleted_keys.lock().unwrap();
                deleted.extend(keys.iter().filter(|k| !refused.contains(k)).cloned());
                Ok(refused
                    .into_iter()
                    .map(|key| FailedKey {
                        key,
                        error_code: "AccessDenied".to_string(),
                        error_message: "Access Denied".to_string(),
                    })
                    .collect())
            }
        }
    }
}

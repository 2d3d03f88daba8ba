use async_trait::async_trait;

use crate::scanner::ObjectScanner;
use crate::storage::Storage;

/// Lists delete candidates under a prefix, one page per `scan`.
///
/// The last key of each page is the marker for the next request.
pub struct ListingScanner {
    target: Storage,
    prefix: String,
    marker: Option<String>,
    objects: Vec<String>,
    err: Option<anyhow::Error>,
}

impl ListingScanner {
    pub fn new(target: Storage, prefix: &str) -> Self {
        ListingScanner {
            target,
            prefix: prefix.to_string(),
            marker: None,
            objects: Vec::new(),
            err: None,
        }
    }
}

#[async_trait]
impl ObjectScanner for ListingScanner {
    async fn scan(&mut self, batch_size: usize) -> bool {
        self.objects.clear();
        if self.err.is_some() {
            return false;
        }

        let max_keys = i32::try_from(batch_size).unwrap_or(i32::MAX);
        match self
            .target
            .list_objects(&self.prefix, self.marker.clone(), max_keys)
            .await
        {
            Ok(keys) => {
                if let Some(last) = keys.last() {
                    self.marker = Some(last.clone());
                }
                self.objects = keys;
                !self.objects.is_empty()
            }
            Err(e) => {
                self.err = Some(e.context(format!("failed to list objects under {}.", self.prefix)));
                false
            }
        }
    }

    fn objects(&self) -> &[String] {
        &self.objects
    }

    fn err(&self) -> Option<&anyhow::Error> {
        self.err.as_ref()
    }

    fn take_err(&mut self) -> Option<anyhow::Error> {
        self.err.take()
    }
}

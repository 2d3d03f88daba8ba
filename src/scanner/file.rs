use std::path::Path;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use crate::scanner::ObjectScanner;

/// Reads delete candidates from a local file, one key per line.
///
/// A trailing `\r` is stripped and blank lines are skipped.
pub struct FileScanner {
    lines: Lines<BufReader<File>>,
    objects: Vec<String>,
    err: Option<anyhow::Error>,
}

impl FileScanner {
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .with_context(|| format!("failed to open objects file: {}", path.display()))?;

        Ok(FileScanner {
            lines: BufReader::new(file).lines(),
            objects: Vec::new(),
            err: None,
        })
    }
}

#[async_trait]
impl ObjectScanner for FileScanner {
    async fn scan(&mut self, batch_size: usize) -> bool {
        self.objects.clear();
        if self.err.is_some() {
            return false;
        }

        while self.objects.len() < batch_size {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    let key = line.strip_suffix('\r').unwrap_or(&line);
                    if !key.is_empty() {
                        self.objects.push(key.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    self.err = Some(anyhow!(e).context("failed to read objects file."));
                    self.objects.clear();
                    return false;
                }
            }
        }

        !self.objects.is_empty()
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

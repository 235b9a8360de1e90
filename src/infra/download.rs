//! Release artifact downloads
//!
//! Artifacts are streamed to disk and hashed while they arrive, so a
//! verified download never needs a second read of the file.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::config::defaults;
use crate::core::release::{Checksum, ChecksumAlgorithm};
use crate::error::DownloadError;

/// Called with `(received, total)` as bytes arrive; `total` is 0 when unknown
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A file written by [`DownloadManager`]
#[derive(Debug)]
pub struct DownloadResult {
    pub path: PathBuf,
    pub size: u64,
    pub checksum: Checksum,
}

/// How often and how patiently a failed request is repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub first_delay: Duration,
}

impl RetryPolicy {
    /// Pause before attempt `n + 1`, doubling each time up to 30s
    fn delay_after(&self, n: u32) -> Duration {
        let factor = 1u32.checked_shl(n.saturating_sub(1)).unwrap_or(u32::MAX);
        self.first_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: defaults::MAX_DOWNLOAD_RETRIES,
            first_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl DownloadManager {
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy::default())
    }

    /// Shorthand for tests and callers that only tune the numbers
    pub fn with_config(attempts: u32, first_delay_ms: u64) -> Self {
        Self::with_policy(RetryPolicy {
            attempts,
            first_delay: Duration::from_millis(first_delay_ms),
        })
    }

    pub fn with_policy(policy: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("talostpl/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();
        Self {
            client,
            policy: RetryPolicy {
                attempts: policy.attempts.max(1),
                ..policy
            },
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch `url` into `dest`, hashing with `algorithm`
    ///
    /// A partial file is removed once every attempt has failed.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        algorithm: ChecksumAlgorithm,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadResult, DownloadError> {
        let mut attempt = 1;
        loop {
            let err = match self.fetch(url, dest, algorithm, progress.as_ref()).await {
                Ok(done) => return Ok(done),
                Err(err) => err,
            };
            tracing::debug!("Attempt {attempt}/{} for {url} failed: {err}", self.policy.attempts);

            if attempt >= self.policy.attempts {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(err);
            }
            tokio::time::sleep(self.policy.delay_after(attempt)).await;
            attempt += 1;
        }
    }

    /// Fetch `url` into `dest` and compare it with `expected`
    ///
    /// The file is deleted again when the digest differs.
    pub async fn download_verified(
        &self,
        url: &str,
        dest: &Path,
        expected: &Checksum,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadResult, DownloadError> {
        let done = self
            .download(url, dest, expected.algorithm(), progress)
            .await?;
        if expected.matches(done.checksum.digest()) {
            return Ok(done);
        }

        let _ = tokio::fs::remove_file(dest).await;
        Err(DownloadError::ChecksumMismatch {
            file: dest.display().to_string(),
            expected: expected.to_string(),
            actual: done.checksum.to_string(),
        })
    }

    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        algorithm: ChecksumAlgorithm,
        progress: Option<&ProgressCallback>,
    ) -> Result<DownloadResult, DownloadError> {
        let network = |error: String| DownloadError::NetworkError {
            url: url.to_string(),
            error,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(network(format!("HTTP {status}")));
        }
        let total = response.content_length().unwrap_or(0);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, &e))?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| io_error(dest, &e))?;

        let mut hasher = algorithm.hasher();
        let mut received = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| network(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| io_error(dest, &e))?;
            hasher.update(&chunk);
            received += chunk.len() as u64;
            if let Some(report) = progress {
                report(received, total);
            }
        }
        file.flush().await.map_err(|e| io_error(dest, &e))?;

        Ok(DownloadResult {
            path: dest.to_path_buf(),
            size: received,
            checksum: Checksum::from_digest(algorithm, hasher.finalize_hex()),
        })
    }
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::new()
    }
}

fn io_error(path: &Path, error: &std::io::Error) -> DownloadError {
    DownloadError::IoError {
        path: path.to_path_buf(),
        error: error.to_string(),
    }
}

/// Hash a file already on disk
pub fn file_checksum(path: &Path, algorithm: ChecksumAlgorithm) -> Result<Checksum, DownloadError> {
    let content = std::fs::read(path).map_err(|e| io_error(path, &e))?;
    Ok(Checksum::compute(algorithm, &content))
}

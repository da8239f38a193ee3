//! Blocking HTTP access for the two latency-bound inputs: the scoring
//! endpoint and the remote explanation artifact.

use crate::error::{DeskError, DeskResult};
use std::time::Duration;

/// Cheap to clone: clones share one connection pool.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::blocking::Client,
    timeout: Duration,
    max_retries: u32,
}

impl RemoteClient {
    pub fn new(timeout: Duration, max_retries: u32) -> DeskResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| DeskError::Other(anyhow::anyhow!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            timeout,
            max_retries,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` and return the body of a 2xx response.
    /// Timeouts and transport failures are retried up to `max_retries` times.
    pub fn get_bytes(&self, url: &str) -> DeskResult<Vec<u8>> {
        let mut attempt = 0u32;
        loop {
            match self.get_once(url) {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!("{e}; retry {attempt}/{}", self.max_retries);
                }
                other => return other,
            }
        }
    }

    fn get_once(&self, url: &str) -> DeskResult<Vec<u8>> {
        log::debug!("GET {url}");
        let resp = self
            .http
            .get(url)
            .send()
            .map_err(|e| self.classify(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DeskError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().map_err(|e| self.classify(url, e))?;
        Ok(bytes.to_vec())
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> DeskError {
        if err.is_timeout() {
            DeskError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }
        } else {
            DeskError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

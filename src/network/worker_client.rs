// src/network/worker_client.rs
use crate::network::endpoint;
use crate::types::SearchTarget;
use crate::utils::error::PowError;
use reqwest::Client;
use std::time::Duration;

/// Client for the `/start`, `/cancel` and `/health-check` endpoints of workers
#[derive(Clone)]
pub struct WorkerClient {
    /// Shared HTTP client (connection pool)
    client: Client,
    /// Timeout applied to start and cancel requests
    request_timeout: Duration,
}

impl WorkerClient {
    /// Creates a new WorkerClient
    ///
    /// # Arguments
    /// * `client` - HTTP client to issue requests with
    /// * `request_timeout` - Deadline for start and cancel calls
    pub fn new(client: Client, request_timeout: Duration) -> Self {
        WorkerClient {
            client,
            request_timeout,
        }
    }

    /// Asks `worker` to search for `target`
    ///
    /// With a `completion` endpoint the worker answers immediately and
    /// reports the solution there later. Without one the call blocks until
    /// the worker has searched, and the solution text is returned.
    pub async fn start(
        &self,
        worker: &str,
        target: &SearchTarget,
        completion: Option<&str>,
    ) -> Result<String, PowError> {
        let url = endpoint(worker, "start")?;
        let difficulty = target.difficulty.to_string();
        let mut query = vec![
            ("prefix", target.prefix.as_str()),
            ("difficulty", difficulty.as_str()),
        ];
        if let Some(completion) = completion {
            query.push(("completionEndpoint", completion));
        }

        let mut request = self.client.get(url).query(&query);
        if completion.is_some() {
            request = request.timeout(self.request_timeout);
        }

        let body = request.send().await?.error_for_status()?.text().await?;
        Ok(body)
    }

    /// Asks `worker` to stop its current search
    pub async fn cancel(&self, worker: &str) -> Result<(), PowError> {
        let url = endpoint(worker, "cancel")?;
        self.client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Probes `worker`; only an HTTP 200 counts as healthy
    ///
    /// # Returns
    /// The worker's reported time on success
    pub async fn health_check(&self, worker: &str, timeout: Duration) -> Result<String, PowError> {
        let url = endpoint(worker, "health-check")?;
        let response = self.client.get(url).timeout(timeout).send().await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(PowError::ConnectionError(format!(
                "health check of {} answered {}",
                worker,
                response.status()
            )));
        }
        Ok(response.text().await?)
    }
}

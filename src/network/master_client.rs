// src/network/master_client.rs
use crate::network::{endpoint, parse_base};
use crate::types::{SearchTarget, Solution};
use crate::utils::error::PowError;
use reqwest::Client;
use std::time::Duration;

/// Client for the master's `/add-worker` and `/start` endpoints
#[derive(Clone)]
pub struct MasterClient {
    /// Shared HTTP client
    client: Client,
    /// Base address of the master, e.g. `http://localhost:8079`
    master: String,
    /// Timeout for registration calls
    request_timeout: Duration,
}

impl MasterClient {
    /// Creates a client for the master at `master`
    ///
    /// # Errors
    /// Returns `PowError` if the address is not an http(s) URL with a host
    pub fn new(client: Client, master: &str, request_timeout: Duration) -> Result<Self, PowError> {
        parse_base(master)?;
        Ok(MasterClient {
            client,
            master: master.trim().to_string(),
            request_timeout,
        })
    }

    /// Base address of the master
    pub fn address(&self) -> &str {
        &self.master
    }

    /// Announces a worker reachable at `worker_addr`
    pub async fn add_worker(&self, worker_addr: &str) -> Result<(), PowError> {
        let url = endpoint(&self.master, "add-worker")?;
        self.client
            .get(url)
            .query(&[("host", worker_addr)])
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Runs a cluster-wide search and waits for the solution
    ///
    /// No client-side timeout is applied; the master enforces its own.
    pub async fn start(&self, target: &SearchTarget) -> Result<String, PowError> {
        let url = endpoint(&self.master, "start")?;
        let difficulty = target.difficulty.to_string();
        let body = self
            .client
            .get(url)
            .query(&[
                ("prefix", target.prefix.as_str()),
                ("difficulty", difficulty.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

/// Delivers `solution` to a completion endpoint as `?solution=...`
///
/// `completion` is the full callback URL handed to the worker, usually
/// `http://<master>/completion`.
pub async fn report_solution(
    client: &Client,
    completion: &str,
    solution: &Solution,
    timeout: Duration,
) -> Result<(), PowError> {
    let url = parse_base(completion)?;
    client
        .get(url)
        .query(&[("solution", solution.as_str())])
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

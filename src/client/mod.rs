//! GRPC client plumbing for the target key-value service.
//!
//! The pool opens all connections eagerly at startup (all-or-nothing) and
//! hands them out round-robin. A [`KvClient`] is cheap to clone and safe for
//! concurrent use, so several workers may share one connection.

use crate::core::{BenchError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

/// Generated protobuf types for the `kvstore.v1` service.
pub mod proto {
    tonic::include_proto!("kvstore.v1");
}

use proto::key_value_store_client::KeyValueStoreClient;
use proto::{DeleteRequest, GetRequest, PutRequest};

/// Sentinel key probed during health checks.
const HEALTH_CHECK_KEY: &[u8] = b"health_check";

/// One client handle to the target service.
///
/// Wraps the generated tonic client; cloning shares the underlying HTTP/2
/// channel.
#[derive(Clone)]
pub struct KvClient {
    inner: KeyValueStoreClient<Channel>,
}

impl KvClient {
    fn new(channel: Channel) -> Self {
        KvClient {
            inner: KeyValueStoreClient::new(channel),
        }
    }

    /// Retrieve a value by key. `Ok(None)` means the key was not found.
    pub async fn get(&self, key: &[u8]) -> std::result::Result<Option<Vec<u8>>, Status> {
        let mut client = self.inner.clone();
        let response = client
            .get(GetRequest { key: key.to_vec() })
            .await?
            .into_inner();
        Ok(response.found.then_some(response.value))
    }

    /// Store a key-value pair.
    pub async fn put(&self, key: &[u8], value: Vec<u8>) -> std::result::Result<(), Status> {
        let mut client = self.inner.clone();
        client
            .put(PutRequest {
                key: key.to_vec(),
                value,
            })
            .await?;
        Ok(())
    }

    /// Remove a key-value pair.
    pub async fn delete(&self, key: &[u8]) -> std::result::Result<(), Status> {
        let mut client = self.inner.clone();
        client.delete(DeleteRequest { key: key.to_vec() }).await?;
        Ok(())
    }
}

/// Pool of independent GRPC connections to the target service.
pub struct ConnectionPool {
    clients: Vec<KvClient>,
    next: AtomicUsize,
}

impl ConnectionPool {
    /// Open `count` connections eagerly.
    ///
    /// All-or-nothing: if connection `k` fails, the already-opened channels
    /// are released and the error names connection `k`.
    pub async fn connect(endpoint: &str, count: usize) -> Result<Self> {
        let mut clients = Vec::with_capacity(count);
        for index in 0..count {
            let channel = Self::open_channel(endpoint).await.map_err(|source| {
                BenchError::Connect {
                    index,
                    target: endpoint.to_string(),
                    source,
                }
            })?;
            clients.push(KvClient::new(channel));
        }
        tracing::debug!(connections = count, endpoint, "connection pool ready");
        Ok(ConnectionPool {
            clients,
            next: AtomicUsize::new(0),
        })
    }

    async fn open_channel(
        endpoint: &str,
    ) -> std::result::Result<Channel, tonic::transport::Error> {
        Endpoint::from_shared(endpoint.to_string())?
            .connect_timeout(Duration::from_secs(10))
            .connect()
            .await
    }

    /// Assign the next connection in round-robin order.
    ///
    /// Acquisition happens once per worker at launch, so the shared counter
    /// is never on the hot path.
    ///
    /// Must not be called after [`close`](Self::close); the pool then holds
    /// no connections to hand out.
    pub fn acquire(&self) -> KvClient {
        debug_assert!(!self.clients.is_empty(), "acquire on a closed pool");
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        self.clients[idx].clone()
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if the pool holds no connections.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Probe every connection with a sentinel read under a total time budget.
    ///
    /// Returns the list of per-connection failures; an empty list means all
    /// probes succeeded. Failures do not abort the run.
    pub async fn health_check(&self, timeout: Duration) -> Vec<(usize, Status)> {
        let deadline = Instant::now() + timeout;
        let mut failures = Vec::new();
        for (index, client) in self.clients.iter().enumerate() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                failures.push((index, Status::deadline_exceeded("health check budget exhausted")));
                continue;
            }
            match tokio::time::timeout(remaining, client.get(HEALTH_CHECK_KEY)).await {
                Ok(Ok(_)) => {},
                Ok(Err(status)) => failures.push((index, status)),
                Err(_) => {
                    failures.push((index, Status::deadline_exceeded("health check timed out")))
                },
            }
        }
        failures
    }

    /// Release all connections. Idempotent.
    pub fn close(&mut self) {
        self.clients.clear();
    }
}

//! Lazy, self-healing adapter connections.
//!
//! A [`Connection`] starts disconnected and opens its client on first use
//! through a [`Connector`]. Every call is bounded by a time budget. A failed
//! connect or call drops the client and suspends the connection until the
//! next sweep, where the first call reconnects.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Opens a client handle for a service
#[async_trait]
pub trait Connector<C: ?Sized>: Send + Sync {
    /// Build the client and verify the service answers
    async fn connect(&self) -> Result<Arc<C>>;
}

/// Connector handing out an already-built client
pub struct Ready<C: ?Sized>(pub Arc<C>);

#[async_trait]
impl<C: ?Sized + Send + Sync> Connector<C> for Ready<C> {
    async fn connect(&self) -> Result<Arc<C>> {
        Ok(self.0.clone())
    }
}

/// Whether a client handle is currently held
pub enum ConnectionState<C: ?Sized> {
    /// No handle; the next call connects
    Disconnected,
    /// Live handle
    Connected(Arc<C>),
}

/// One adapter's connection, owned by the lifecycle engine
pub struct Connection<C: ?Sized> {
    service: &'static str,
    connector: Box<dyn Connector<C>>,
    state: ConnectionState<C>,
    timeout: Duration,
    suspended: bool,
}

impl<C: ?Sized + Send + Sync + 'static> Connection<C> {
    /// Create a disconnected connection
    pub fn new(service: &'static str, connector: Box<dyn Connector<C>>, timeout: Duration) -> Self {
        Self {
            service,
            connector,
            state: ConnectionState::Disconnected,
            timeout,
            suspended: false,
        }
    }

    /// Connection around a ready client
    pub fn ready(service: &'static str, client: Arc<C>, timeout: Duration) -> Self {
        Self::new(service, Box::new(Ready(client)), timeout)
    }

    /// Service name used in logs
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// True while a handle is held
    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    /// True after a failure in the current sweep
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Allow one reconnect attempt again
    pub fn begin_sweep(&mut self) {
        self.suspended = false;
    }

    /// Return the live handle, connecting if needed
    ///
    /// Returns `None` while suspended or when connecting fails.
    pub async fn ensure_connected(&mut self) -> Option<Arc<C>> {
        if let ConnectionState::Connected(client) = &self.state {
            return Some(client.clone());
        }
        if self.suspended {
            return None;
        }

        let attempt = tokio::time::timeout(self.timeout, self.connector.connect()).await;
        match attempt {
            Ok(Ok(client)) => {
                info!(service = self.service, "Connected");
                self.state = ConnectionState::Connected(client.clone());
                Some(client)
            }
            Ok(Err(e)) => {
                warn!(service = self.service, error = %e, "Connection failed");
                self.mark_failed();
                None
            }
            Err(_) => {
                warn!(service = self.service, "Connection timed out");
                self.mark_failed();
                None
            }
        }
    }

    /// Run `op` against the service within the time budget
    ///
    /// Returns `None` when the service is unavailable or the call fails; the
    /// failure is logged and the connection is dropped for this sweep.
    pub async fn call<T, F, Fut>(&mut self, operation: &str, op: F) -> Option<T>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = self.ensure_connected().await?;
        match tokio::time::timeout(self.timeout, op(client)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(service = self.service, operation, error = %e, "Service call failed");
                self.mark_failed();
                None
            }
            Err(_) => {
                let e = Error::Timeout {
                    service: self.service,
                };
                warn!(service = self.service, operation, error = %e, "Service call failed");
                self.mark_failed();
                None
            }
        }
    }

    /// Drop the handle and suspend until the next sweep
    pub fn mark_failed(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.suspended = true;
    }

    /// Drop the handle without suspending
    pub fn disconnect(&mut self) {
        if self.is_connected() {
            debug!(service = self.service, "Disconnected");
        }
        self.state = ConnectionState::Disconnected;
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        connects: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl Connector<str> for Arc<Flaky> {
        async fn connect(&self) -> Result<Arc<str>> {
            let n = self.connects.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(Error::client("test", "refused"))
            } else {
                Ok(Arc::from("handle"))
            }
        }
    }

    fn flaky(fail_first: usize) -> Arc<Flaky> {
        Arc::new(Flaky {
            connects: AtomicUsize::new(0),
            fail_first,
        })
    }

    #[tokio::test]
    async fn connects_lazily_once() {
        let connector = flaky(0);
        let mut conn: Connection<str> =
            Connection::new("test", Box::new(connector.clone()), Duration::from_secs(1));
        assert!(!conn.is_connected());

        assert_eq!(conn.call("a", |c| async move { Ok::<_, Error>(c.len()) }).await, Some(6));
        assert_eq!(conn.call("b", |c| async move { Ok::<_, Error>(c.len()) }).await, Some(6));
        assert!(conn.is_connected());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_connect_suspends_until_next_sweep() {
        let connector = flaky(1);
        let mut conn: Connection<str> =
            Connection::new("test", Box::new(connector.clone()), Duration::from_secs(1));

        assert!(conn.ensure_connected().await.is_none());
        assert!(conn.is_suspended());
        // no second attempt within the sweep
        assert!(conn.ensure_connected().await.is_none());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        conn.begin_sweep();
        assert!(conn.ensure_connected().await.is_some());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_call_drops_handle() {
        let connector = flaky(0);
        let mut conn: Connection<str> =
            Connection::new("test", Box::new(connector.clone()), Duration::from_secs(1));

        let result: Option<()> = conn
            .call("boom", |_| async { Err(Error::client("test", "boom")) })
            .await;
        assert!(result.is_none());
        assert!(!conn.is_connected());
        assert!(conn.is_suspended());

        conn.begin_sweep();
        assert_eq!(conn.call("ok", |_| async { Ok::<_, Error>(1) }).await, Some(1));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let mut conn: Connection<str> =
            Connection::ready("test", Arc::from("handle"), Duration::from_millis(50));

        let result = conn
            .call("slow", |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, Error>(())
            })
            .await;
        assert!(result.is_none());
        assert!(conn.is_suspended());
    }

    #[tokio::test]
    async fn disconnect_allows_reconnect() {
        let mut conn: Connection<str> =
            Connection::ready("test", Arc::from("handle"), Duration::from_secs(1));
        assert!(conn.ensure_connected().await.is_some());
        conn.disconnect();
        assert!(!conn.is_connected());
        assert!(!conn.is_suspended());
        assert!(conn.ensure_connected().await.is_some());
    }
}

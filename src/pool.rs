use crate::transport::{Connection, Dialer};
use std::io;
use std::sync::{Mutex, MutexGuard, TryLockError};

/// Per-write delivery failures. Never fatal to the sink.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("unable to dial collector: {0}")]
    Dial(#[source] io::Error),

    #[error("unable to write to conn: {0}")]
    Write(#[source] io::Error),

    #[error("unable to close conn: {0}")]
    Close(#[source] io::Error),
}

struct PoolState {
    idle: Vec<Box<dyn Connection>>,
    closed: bool,
}

/// Cache of idle connections to a single destination.
///
/// Checkout never waits on the pool: when nothing idle can be taken
/// immediately a fresh connection is dialed. Capacity only bounds how many
/// idle connections are retained; surplus check-ins are closed.
pub struct ConnectionPool {
    dialer: Box<dyn Dialer>,
    capacity: usize,
    state: Mutex<PoolState>,
}

impl ConnectionPool {
    pub fn new(dialer: impl Dialer + 'static, capacity: usize) -> Self {
        Self {
            dialer: Box::new(dialer),
            capacity,
            state: Mutex::new(PoolState {
                idle: Vec::with_capacity(capacity),
                closed: false,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.lock().idle.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Hand out an idle connection or dial a new one. The caller owns the
    /// connection until it is checked back in or dropped.
    pub async fn checkout(&self) -> Result<Box<dyn Connection>, DeliveryError> {
        if let Some(conn) = self.try_take_idle() {
            return Ok(conn);
        }
        self.dialer.dial().await.map_err(DeliveryError::Dial)
    }

    /// Return a connection for reuse, closing it instead when the pool is
    /// full or shut down.
    pub async fn checkin(&self, conn: Box<dyn Connection>) -> Result<(), DeliveryError> {
        let rejected = {
            let mut state = self.lock();
            if state.closed || state.idle.len() >= self.capacity {
                Some(conn)
            } else {
                state.idle.push(conn);
                None
            }
        };

        if let Some(mut conn) = rejected {
            conn.close().await.map_err(DeliveryError::Close)?;
        }
        Ok(())
    }

    /// Write one payload on a pooled connection. A connection that fails
    /// to write is closed and discarded; nothing is retried.
    pub async fn write(&self, payload: &[u8]) -> Result<(), DeliveryError> {
        let mut conn = self.checkout().await?;
        if let Err(err) = conn.write(payload).await {
            let _ = conn.close().await;
            return Err(DeliveryError::Write(err));
        }
        self.checkin(conn).await
    }

    /// Refuse further check-ins and close every idle connection.
    ///
    /// Connections checked out by in-flight writes are not touched; they
    /// are closed when those writes check them back in.
    pub async fn shutdown(&self) -> Result<(), DeliveryError> {
        let idle = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.idle)
        };

        let mut first_err = None;
        for mut conn in idle {
            if let Err(err) = conn.close().await {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(DeliveryError::Close(err)),
            None => Ok(()),
        }
    }

    fn try_take_idle(&self) -> Option<Box<dyn Connection>> {
        match self.state.try_lock() {
            Ok(mut state) => state.idle.pop(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().idle.pop(),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CountingDialer;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[tokio::test]
    async fn checked_in_connection_is_reused() {
        let (dialer, counters) = CountingDialer::new();
        let pool = ConnectionPool::new(dialer, 3);

        pool.write(b"one").await.unwrap();
        pool.write(b"two").await.unwrap();
        pool.write(b"three").await.unwrap();

        assert_eq!(counters.dials(), 1);
        assert_eq!(pool.idle_count(), 1);
        let ids: Vec<usize> = counters.writes().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn checkout_dials_when_pool_is_empty() {
        let (dialer, counters) = CountingDialer::new();
        let pool = ConnectionPool::new(dialer, 3);

        let first = pool.checkout().await.unwrap();
        let second = pool.checkout().await.unwrap();
        assert_eq!(counters.dials(), 2);

        pool.checkin(first).await.unwrap();
        pool.checkin(second).await.unwrap();
        assert_eq!(pool.idle_count(), 2);

        let _again = pool.checkout().await.unwrap();
        assert_eq!(counters.dials(), 2);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn checkin_beyond_capacity_closes_connection() {
        let (dialer, counters) = CountingDialer::new();
        let pool = ConnectionPool::new(dialer, 2);

        let mut conns = Vec::new();
        for _ in 0..3 {
            conns.push(pool.checkout().await.unwrap());
        }
        for conn in conns {
            pool.checkin(conn).await.unwrap();
        }

        assert_eq!(counters.dials(), 3);
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(counters.closes(), 1);
    }

    #[tokio::test]
    async fn failed_write_discards_connection() {
        let (dialer, counters) = CountingDialer::new();
        let pool = ConnectionPool::new(dialer, 3);

        pool.write(b"ok").await.unwrap();
        assert_eq!(pool.idle_count(), 1);

        counters.fail_writes.store(true, Ordering::SeqCst);
        let err = pool.write(b"lost").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Write(_)));
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(counters.closes(), 1);

        counters.fail_writes.store(false, Ordering::SeqCst);
        pool.write(b"fresh").await.unwrap();
        assert_eq!(counters.dials(), 2);
        assert_eq!(counters.writes().last().map(|(id, _)| *id), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_never_share_or_overfill() {
        let (dialer, counters) = CountingDialer::new();
        let pool = Arc::new(ConnectionPool::new(dialer, 2));

        let mut tasks = Vec::new();
        for task in 0..16 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move {
                for n in 0..16 {
                    pool.write(format!("{task}-{n}").as_bytes()).await?;
                    assert!(pool.idle_count() <= pool.capacity());
                }
                Ok::<_, DeliveryError>(())
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(pool.idle_count() <= 2);
        assert_eq!(counters.dials() - counters.closes(), pool.idle_count());

        let mut payloads: Vec<Vec<u8>> = counters.writes().into_iter().map(|(_, p)| p).collect();
        payloads.sort();
        payloads.dedup();
        assert_eq!(payloads.len(), 256);
    }

    #[tokio::test]
    async fn dial_failure_is_reported() {
        let (dialer, counters) = CountingDialer::new();
        counters.fail_dials.store(true, Ordering::SeqCst);
        let pool = ConnectionPool::new(dialer, 3);

        assert!(matches!(pool.write(b"x").await, Err(DeliveryError::Dial(_))));
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_idle_and_refuses_checkins() {
        let (dialer, counters) = CountingDialer::new();
        let pool = ConnectionPool::new(dialer, 3);

        let first = pool.checkout().await.unwrap();
        let second = pool.checkout().await.unwrap();
        let in_flight = pool.checkout().await.unwrap();
        pool.checkin(first).await.unwrap();
        pool.checkin(second).await.unwrap();

        pool.shutdown().await.unwrap();
        assert!(pool.is_closed());
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(counters.closes(), 2);

        pool.checkin(in_flight).await.unwrap();
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(counters.closes(), 3);
    }

    #[tokio::test]
    async fn shutdown_reports_close_errors_after_closing_all() {
        let (dialer, counters) = CountingDialer::new();
        let pool = ConnectionPool::new(dialer, 3);
        let first = pool.checkout().await.unwrap();
        let second = pool.checkout().await.unwrap();
        pool.checkin(first).await.unwrap();
        pool.checkin(second).await.unwrap();

        counters.fail_closes.store(true, Ordering::SeqCst);
        assert!(matches!(pool.shutdown().await, Err(DeliveryError::Close(_))));
        assert_eq!(counters.closes(), 2);
    }
}

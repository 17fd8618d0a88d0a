use crate::transport::{Connection, Dialer};
use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Shared switches and observations for [`CountingDialer`].
#[derive(Default)]
pub(crate) struct Counters {
    dials: AtomicUsize,
    closes: AtomicUsize,
    writes: Mutex<Vec<(usize, Vec<u8>)>>,
    pub fail_dials: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_closes: AtomicBool,
}

impl Counters {
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Every successful write as `(connection id, payload)`. Ids count up
    /// from zero in dial order.
    pub fn writes(&self) -> Vec<(usize, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }
}

pub(crate) struct CountingDialer {
    counters: Arc<Counters>,
}

impl CountingDialer {
    pub fn new() -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            Self {
                counters: Arc::clone(&counters),
            },
            counters,
        )
    }
}

#[async_trait]
impl Dialer for CountingDialer {
    async fn dial(&self) -> io::Result<Box<dyn Connection>> {
        if self.counters.fail_dials.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        }
        let id = self.counters.dials.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            id,
            in_use: AtomicBool::new(false),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeConnection {
    id: usize,
    in_use: AtomicBool,
    counters: Arc<Counters>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn write(&mut self, payload: &[u8]) -> io::Result<()> {
        if self.counters.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
        }
        // Two callers holding the same connection would overlap here.
        if self.in_use.swap(true, Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "connection shared by two writers"));
        }
        tokio::task::yield_now().await;
        self.in_use.store(false, Ordering::SeqCst);
        self.counters
            .writes
            .lock()
            .unwrap()
            .push((self.id, payload.to_vec()));
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_closes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "close failed"));
        }
        Ok(())
    }
}

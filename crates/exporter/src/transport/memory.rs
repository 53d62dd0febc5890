//! In-memory collector for tests and dry runs.
//!
//! Records every written payload and can be told to refuse dials or fail the
//! next writes, so connection-loss paths are reproducible without sockets.

use super::{Dialer, Transport};
use crate::BoxFuture;
use crate::error::ExportError;
use serde_json::Value;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct CollectorState {
    lines: Vec<String>,
    dials: usize,
    refuse_dials: bool,
    failing_writes: usize,
}

/// Shared handle to an in-memory collector; clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollector {
    state: Arc<Mutex<CollectorState>>,
}

impl MemoryCollector {
    /// Collector that accepts every dial and write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse (or accept again) subsequent dials.
    pub fn refuse_dials(&self, refuse: bool) {
        self.lock().refuse_dials = refuse;
    }

    /// Fail the next `count` writes, on any connection.
    pub fn fail_next_writes(&self, count: usize) {
        self.lock().failing_writes = count;
    }

    /// Dial attempts so far, including refused ones.
    #[must_use]
    pub fn dials(&self) -> usize {
        self.lock().dials
    }

    /// Raw written payloads, terminators included.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    /// Written payloads decoded as JSON; undecodable lines are skipped.
    #[must_use]
    pub fn payloads(&self) -> Vec<Value> {
        self.lock()
            .lines
            .iter()
            .filter_map(|line| serde_json::from_str(line.trim_end()).ok())
            .collect()
    }

    /// Forget every recorded payload.
    pub fn clear(&self) {
        self.lock().lines.clear();
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Dialer for MemoryCollector {
    fn dial<'a>(
        &'a self,
        address: &'a str,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Box<dyn Transport>, ExportError>> {
        let result = {
            let mut state = self.lock();
            state.dials += 1;
            if state.refuse_dials {
                Err(ExportError::Dial {
                    address: address.to_owned(),
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                })
            } else {
                Ok(Box::new(MemoryTransport {
                    collector: self.clone(),
                }) as Box<dyn Transport>)
            }
        };
        Box::pin(async move { result })
    }
}

#[derive(Debug)]
struct MemoryTransport {
    collector: MemoryCollector,
}

impl Transport for MemoryTransport {
    fn write_payload<'a>(
        &'a mut self,
        bytes: &'a [u8],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<(), ExportError>> {
        let result = {
            let mut state = self.collector.lock();
            if state.failing_writes > 0 {
                state.failing_writes -= 1;
                Err(ExportError::Write(io::Error::from(io::ErrorKind::BrokenPipe)))
            } else {
                state.lines.push(String::from_utf8_lossy(bytes).into_owned());
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn local_ip(&self) -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

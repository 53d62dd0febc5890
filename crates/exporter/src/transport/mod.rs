//! Collector connections.
//!
//! The exporter only talks to [`Dialer`] and [`Transport`]; [`TcpDialer`] is
//! the production implementation and [`memory::MemoryCollector`] backs tests.

use crate::BoxFuture;
use crate::error::ExportError;
use std::net::IpAddr;
use std::time::Duration;

pub mod memory;
mod tcp;

pub use tcp::{TcpDialer, TcpTransport};

/// An open connection to the collector.
pub trait Transport: Send {
    /// Write one encoded payload, bounded by `timeout`.
    fn write_payload<'a>(
        &'a mut self,
        bytes: &'a [u8],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<(), ExportError>>;

    /// Local address of the connection, reported as the default `hostName`.
    fn local_ip(&self) -> Option<IpAddr>;
}

/// Opens connections to the collector.
pub trait Dialer: Send + Sync {
    /// Connect to `address` (`host:port`), bounded by `timeout`.
    fn dial<'a>(
        &'a self,
        address: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Box<dyn Transport>, ExportError>>;
}

//! Plain TCP transport.

use super::{Dialer, Transport};
use crate::BoxFuture;
use crate::error::ExportError;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Dials collectors over TCP with `TCP_NODELAY` set.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial<'a>(
        &'a self,
        address: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Box<dyn Transport>, ExportError>> {
        Box::pin(async move {
            let dial_error = |source: std::io::Error| ExportError::Dial {
                address: address.to_owned(),
                source,
            };
            let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
                .await
                .map_err(|_| ExportError::timeout("dial", timeout))?
                .map_err(dial_error)?;
            stream.set_nodelay(true).map_err(dial_error)?;
            let local_ip = stream.local_addr().ok().map(|addr| addr.ip());
            Ok(Box::new(TcpTransport { stream, local_ip }) as Box<dyn Transport>)
        })
    }
}

/// A connected TCP stream.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    local_ip: Option<IpAddr>,
}

impl Transport for TcpTransport {
    fn write_payload<'a>(
        &'a mut self,
        bytes: &'a [u8],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<(), ExportError>> {
        Box::pin(async move {
            let write = async {
                self.stream.write_all(bytes).await?;
                self.stream.flush().await
            };
            tokio::time::timeout(timeout, write)
                .await
                .map_err(|_| ExportError::timeout("write", timeout))?
                .map_err(ExportError::Write)
        })
    }

    fn local_ip(&self) -> Option<IpAddr> {
        self.local_ip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn writes_reach_the_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr").to_string();
        let accept = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut line = String::new();
            tokio::io::BufReader::new(socket)
                .read_line(&mut line)
                .await
                .expect("read");
            line
        });

        let mut transport = TcpDialer
            .dial(&address, Duration::from_secs(1))
            .await
            .expect("dial");
        assert!(transport.local_ip().is_some_and(|ip| ip.is_loopback()));
        transport
            .write_payload(b"{\"id\":\"api\"}\r\n", Duration::from_secs(1))
            .await
            .expect("write");

        let line = accept.await.expect("join");
        assert_eq!(line, "{\"id\":\"api\"}\r\n");
    }

    #[tokio::test]
    async fn refused_dial_is_a_dial_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr").to_string();
        drop(listener);

        let result = TcpDialer.dial(&address, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ExportError::Dial { .. })));
    }
}

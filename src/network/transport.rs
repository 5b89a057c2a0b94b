use crate::utils::{HarnessError, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Open a TCP connection to `host:port`, giving up after `limit`.
pub async fn connect(host: &str, port: u16, limit: Duration) -> Result<TcpStream> {
    let addr = format!("{}:{}", host, port);
    match timeout(limit, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => {
            stream.set_nodelay(true)?;
            Ok(stream)
        }
        Ok(Err(e)) => Err(HarnessError::Connection(format!("{}: {}", addr, e))),
        Err(_) => Err(HarnessError::Connection(format!(
            "{}: no answer within {:?}",
            addr, limit
        ))),
    }
}

/// True when something accepts TCP connections on `host:port`.
pub async fn is_listening(host: &str, port: u16, limit: Duration) -> bool {
    connect(host, port, limit).await.is_ok()
}

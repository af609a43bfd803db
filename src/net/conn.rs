use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

#[derive(Error, Debug)]
pub enum ConnError {
    #[error("Connection timed out")]
    ConnectionTimeout,
    #[error("Connection refused: {0}")]
    ConnectionRefused(io::Error),
    #[error("Address resolution failed: {0}")]
    AddressResolutionFailed(String),
    #[error("Read timed out")]
    ReadTimeout,
    #[error("Write timed out")]
    WriteTimeout,
    #[error("Response exceeds {0} bytes")]
    ResponseTooLarge(usize),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Resolve `host:port` and connect to the first address that answers.
/// Both the lookup and every connect attempt are bounded by `connect_timeout`.
pub async fn connect_with_timeout(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream, ConnError> {
    let addrs: Vec<SocketAddr> = timeout(connect_timeout, tokio::net::lookup_host((host, port)))
        .await
        .map_err(|_| ConnError::ConnectionTimeout)?
        .map_err(|e| ConnError::AddressResolutionFailed(format!("{}:{}: {}", host, port, e)))?
        .collect();

    if addrs.is_empty() {
        return Err(ConnError::AddressResolutionFailed(format!(
            "{}:{}: no addresses",
            host, port
        )));
    }

    let mut last_err = ConnError::ConnectionTimeout;
    for addr in addrs {
        match timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                last_err = ConnError::ConnectionRefused(e);
            }
            Ok(Err(e)) => last_err = ConnError::IoError(e),
            Err(_) => last_err = ConnError::ConnectionTimeout,
        }
    }
    Err(last_err)
}

/// A request/response connection with bounded I/O: every write and read is
/// subject to `io_timeout`, and the accumulated response never grows past
/// `max_bytes`.
pub struct BoundedConnection<S> {
    stream: S,
    read_buffer: Vec<u8>,
    temp_buffer: Vec<u8>,
    io_timeout: Duration,
    max_bytes: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> BoundedConnection<S> {
    pub fn new(stream: S, io_timeout: Duration, max_bytes: usize) -> Self {
        BoundedConnection {
            stream,
            read_buffer: Vec::new(),
            temp_buffer: vec![0u8; 4096],
            io_timeout,
            max_bytes,
        }
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<(), ConnError> {
        timeout(self.io_timeout, async {
            self.stream.write_all(data).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| ConnError::WriteTimeout)??;
        Ok(())
    }

    /// Returns the number of bytes appended; 0 means the peer closed.
    pub async fn read(&mut self) -> Result<usize, ConnError> {
        let n = timeout(self.io_timeout, self.stream.read(&mut self.temp_buffer))
            .await
            .map_err(|_| ConnError::ReadTimeout)??;
        if self.read_buffer.len() + n > self.max_bytes {
            return Err(ConnError::ResponseTooLarge(self.max_bytes));
        }
        self.read_buffer.extend_from_slice(&self.temp_buffer[..n]);
        Ok(n)
    }

    /// Read until the peer closes the connection and hand back everything.
    pub async fn read_to_close(mut self) -> Result<Vec<u8>, ConnError> {
        loop {
            match self.read().await {
                Ok(0) => break,
                Ok(_) => {}
                // TLS peers often hang up without close_notify
                Err(ConnError::IoError(e))
                    if e.kind() == io::ErrorKind::UnexpectedEof && !self.read_buffer.is_empty() =>
                {
                    break
                }
                Err(e) => return Err(e),
            }
        }
        Ok(self.read_buffer)
    }
}

use std::{io, sync::Arc};

use bytes::BytesMut;
use swt_protocol::message::{DEFAULT_MAX_MESSAGE_LEN, NulTerminatedCodec};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, ToSocketAddrs},
};
use tokio_util::codec::{Decoder, Encoder};

use crate::{Transport, bridge::Bridge, packet::PacketLimits};

#[derive(Debug, Clone)]
pub struct Config {
    pub max_request_len: usize,
    pub limits: PacketLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_request_len: DEFAULT_MAX_MESSAGE_LEN,
            limits: PacketLimits::default(),
        }
    }
}

#[derive(Debug)]
pub struct Server<T: Transport> {
    bridge: Arc<Bridge<T>>,
    config: Config,
}

/// Builder to create a [Server] instance and modify configuration options
///
/// # Example
///
/// ```ignore
/// use swt_bridge::{packet::PacketLimits, server::Builder};
///
/// let server = Builder::new()
///     .max_request_len(64 * 1024)
///     .limits(PacketLimits::new(256, 64)?)
///     .build(my_transport);
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the longest request, in bytes, that this server accepts.
    pub fn max_request_len(mut self, len: usize) -> Self {
        self.config.max_request_len = len;
        self
    }

    /// Set the packet bound and padding, see [PacketLimits::new].
    pub fn limits(mut self, limits: PacketLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Build and return the server
    pub fn build<T: Transport + Send + Sync + 'static>(self, transport: T) -> Server<T> {
        Server::new(transport, self.config)
    }
}

impl<T> Server<T>
where
    T: Transport + Send + Sync + 'static,
{
    pub fn new(transport: T, config: Config) -> Server<T> {
        Server {
            bridge: Arc::new(Bridge::new(transport, config.limits)),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn listen(self, addr: impl ToSocketAddrs) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accept clients on an already bound listener until an accept error occurs.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        log::info!("Server listening on {}", listener.local_addr()?);
        loop {
            let (tcp, addr) = listener.accept().await?;
            log::info!("New client connection from {}", addr);
            let bridge = Arc::clone(&self.bridge);
            let codec = NulTerminatedCodec::new(self.config.max_request_len);
            tokio::spawn(async move {
                match handle_client(bridge, tcp, codec).await {
                    Ok(()) => log::info!("Client {} disconnected", addr),
                    Err(e) => log::error!("Client {} error: {}", addr, e),
                }
            });
        }
    }
}

async fn handle_client<T>(
    bridge: Arc<Bridge<T>>,
    mut tcp: TcpStream,
    mut codec: NulTerminatedCodec,
) -> io::Result<()>
where
    T: Transport + Send + Sync + 'static,
{
    let mut input = BytesMut::with_capacity(4096);
    let mut output = BytesMut::with_capacity(4096);
    loop {
        while let Some(request) = codec.decode(&mut input)? {
            log::debug!("Received request of {} bytes", request.len());
            log::trace!("Request: {:?}", request);
            let bridge = Arc::clone(&bridge);
            let response = tokio::task::spawn_blocking(move || bridge.handle(&request))
                .await
                .map_err(io::Error::other)?;
            let response = response.to_string();
            log::trace!("Response: {:?}", response);
            codec.encode(response, &mut output)?;
            tcp.write_all(&output).await?;
            output.clear();
        }
        if tcp.read_buf(&mut input).await? == 0 {
            if !input.is_empty() {
                log::warn!("Dropping {} bytes of unterminated request", input.len());
            }
            return Ok(());
        }
    }
}

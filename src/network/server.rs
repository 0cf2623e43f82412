//! TCP Server
//!
//! Accepts connections and hands each one to its own worker thread.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::Result;

/// What a server does with an accepted connection
pub trait Service: Send + Sync + 'static {
    /// Short name used for thread names and logs
    fn name(&self) -> &'static str;

    /// Serve one connection until it is done (blocking)
    fn serve(&self, stream: TcpStream) -> Result<()>;
}

/// Thread-per-connection TCP server
///
/// No pool and no backpressure: every accepted connection gets a fresh
/// thread.
pub struct Server<S: Service> {
    listener: TcpListener,
    local_addr: SocketAddr,
    service: Arc<S>,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl<S: Service> Server<S> {
    /// Bind the listener (port 0 picks a free port)
    pub fn bind(addr: &str, service: S) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            service: Arc::new(service),
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The address actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle that stops the accept loop from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            addr: self.local_addr,
        }
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Get the service
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Run the accept loop (blocking until shutdown)
    pub fn run(&self) -> Result<()> {
        tracing::info!("{} server listening on {}", self.service.name(), self.local_addr);

        for incoming in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let stream = match incoming {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("Accept failed on {}: {}", self.local_addr, e);
                    continue;
                }
            };

            self.dispatch(stream);
        }

        tracing::info!("{} server on {} stopped", self.service.name(), self.local_addr);
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let service = Arc::clone(&self.service);
        let active = Arc::clone(&self.active);
        active.fetch_add(1, Ordering::SeqCst);

        let spawned = thread::Builder::new()
            .name(format!("{}-conn", self.service.name()))
            .spawn(move || {
                tracing::debug!("Connection established from {}", peer);
                if let Err(e) = service.serve(stream) {
                    tracing::warn!("Connection {} ended with error: {}", peer, e);
                }
                active.fetch_sub(1, Ordering::SeqCst);
            });

        if let Err(e) = spawned {
            self.active.fetch_sub(1, Ordering::SeqCst);
            tracing::error!("Failed to spawn connection thread: {}", e);
        }
    }
}

/// Stops a running [`Server`]
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Signal the server to stop and wake its blocking accept
    ///
    /// Connections already being served run to completion.
    pub fn shutdown(&self) {
        if self.flag.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut wake_addr = self.addr;
        if wake_addr.ip().is_unspecified() {
            match wake_addr {
                SocketAddr::V4(_) => wake_addr.set_ip(Ipv4Addr::LOCALHOST.into()),
                SocketAddr::V6(_) => wake_addr.set_ip(Ipv6Addr::LOCALHOST.into()),
            }
        }
        let _ = TcpStream::connect_timeout(&wake_addr, Duration::from_secs(1));
    }

    /// Whether shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

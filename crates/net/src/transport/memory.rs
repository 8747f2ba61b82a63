//! In-memory transport for testing and single-process games
//!
//! This transport uses channels instead of network sockets, making it
//! perfect for:
//! - Unit and integration testing without network overhead
//! - Single-player games where the server runs in the same process
//! - Development and debugging
//!
//! Endpoints share a [`MemoryHub`]: servers bind ports on the hub and
//! clients connect by port. Datagrams travel over unbounded channels and
//! arrive in send order, so every delivery mode behaves reliable-ordered
//! here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crosswire_protocol::error::TransportError;
use crosswire_protocol::transport::{PeerId, Transport, TransportEvent, SERVER_PEER};
use crosswire_protocol::DeliveryMode;

/// One accepted connection, handed from the hub to the server endpoint.
struct PeerLink {
    peer_id: PeerId,
    to_client: UnboundedSender<Bytes>,
    from_client: UnboundedReceiver<Bytes>,
}

#[derive(Default)]
struct HubInner {
    next_peer_id: PeerId,
    servers: HashMap<u16, UnboundedSender<PeerLink>>,
}

/// Shared in-process "network" that memory transports connect through.
///
/// Clone the hub into every transport that should see the same ports:
///
/// ```
/// use crosswire_net::transport::{MemoryHub, MemoryTransport};
///
/// let hub = MemoryHub::new();
/// let server = MemoryTransport::new(hub.clone());
/// let client = MemoryTransport::new(hub.clone());
/// ```
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        // Single-threaded drivers cannot poison this lock; a panicked
        // test thread is the only way here, and then the state is moot.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bind(&self, port: u16) -> Result<UnboundedReceiver<PeerLink>, TransportError> {
        let mut inner = self.lock();
        if inner.servers.contains_key(&port) {
            return Err(TransportError::BindFailed {
                port,
                reason: "port already bound".to_string(),
            });
        }
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        inner.servers.insert(port, accept_tx);
        Ok(accept_rx)
    }

    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<(UnboundedSender<Bytes>, UnboundedReceiver<Bytes>), TransportError> {
        let mut inner = self.lock();
        let Some(accept_tx) = inner.servers.get(&port).cloned() else {
            return Err(TransportError::ConnectFailed {
                host: host.to_string(),
                port,
                reason: "no server bound".to_string(),
            });
        };
        inner.next_peer_id += 1;
        let peer_id = inner.next_peer_id;
        drop(inner);

        let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();
        accept_tx
            .send(PeerLink {
                peer_id,
                to_client: to_client_tx,
                from_client: to_server_rx,
            })
            .map_err(|_| TransportError::ConnectFailed {
                host: host.to_string(),
                port,
                reason: "server stopped".to_string(),
            })?;
        Ok((to_server_tx, to_client_rx))
    }

    fn release(&self, port: u16) {
        self.lock().servers.remove(&port);
    }
}

struct ServerPeer {
    peer_id: PeerId,
    tx: UnboundedSender<Bytes>,
    rx: UnboundedReceiver<Bytes>,
    open: bool,
}

struct ServerEndpoint {
    port: u16,
    max_clients: usize,
    accept_rx: UnboundedReceiver<PeerLink>,
    peers: Vec<ServerPeer>,
}

struct ClientEndpoint {
    tx: UnboundedSender<Bytes>,
    rx: UnboundedReceiver<Bytes>,
    announced: bool,
    open: bool,
}

enum Endpoint {
    Idle,
    Server(ServerEndpoint),
    Client(ClientEndpoint),
}

/// Channel-backed transport endpoint on a [`MemoryHub`].
pub struct MemoryTransport {
    hub: MemoryHub,
    endpoint: Endpoint,
}

impl MemoryTransport {
    pub fn new(hub: MemoryHub) -> Self {
        Self {
            hub,
            endpoint: Endpoint::Idle,
        }
    }
}

impl Transport for MemoryTransport {
    fn start_server(&mut self, port: u16, max_clients: usize) -> Result<(), TransportError> {
        if !matches!(self.endpoint, Endpoint::Idle) {
            return Err(TransportError::AlreadyStarted);
        }
        let accept_rx = self.hub.bind(port)?;
        self.endpoint = Endpoint::Server(ServerEndpoint {
            port,
            max_clients,
            accept_rx,
            peers: Vec::new(),
        });
        Ok(())
    }

    fn start_client(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        if !matches!(self.endpoint, Endpoint::Idle) {
            return Err(TransportError::AlreadyStarted);
        }
        let (tx, rx) = self.hub.connect(host, port)?;
        self.endpoint = Endpoint::Client(ClientEndpoint {
            tx,
            rx,
            announced: false,
            open: true,
        });
        Ok(())
    }

    fn update(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        match &mut self.endpoint {
            Endpoint::Idle => {}
            Endpoint::Server(server) => {
                // Accept pending connections up to capacity. Dropping the
                // link closes its channels, which the client observes as
                // a disconnect.
                while let Ok(link) = server.accept_rx.try_recv() {
                    if server.peers.len() >= server.max_clients {
                        continue;
                    }
                    events.push(TransportEvent::ClientConnected(link.peer_id));
                    server.peers.push(ServerPeer {
                        peer_id: link.peer_id,
                        tx: link.to_client,
                        rx: link.from_client,
                        open: true,
                    });
                }
                for peer in &mut server.peers {
                    loop {
                        match peer.rx.try_recv() {
                            Ok(bytes) => events.push(TransportEvent::Data {
                                bytes,
                                sender: peer.peer_id,
                            }),
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => {
                                peer.open = false;
                                events.push(TransportEvent::ClientDisconnected(peer.peer_id));
                                break;
                            }
                        }
                    }
                }
                server.peers.retain(|peer| peer.open);
            }
            Endpoint::Client(client) => {
                if !client.announced {
                    client.announced = true;
                    events.push(TransportEvent::ConnectedToServer);
                }
                loop {
                    match client.rx.try_recv() {
                        Ok(bytes) => events.push(TransportEvent::Data {
                            bytes,
                            sender: SERVER_PEER,
                        }),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            if client.open {
                                client.open = false;
                                events.push(TransportEvent::DisconnectedFromServer);
                            }
                            break;
                        }
                    }
                }
            }
        }
        events
    }

    fn send_to_client(&mut self, peer: PeerId, bytes: Bytes, _mode: DeliveryMode) {
        if let Endpoint::Server(server) = &mut self.endpoint {
            if let Some(p) = server.peers.iter().find(|p| p.peer_id == peer && p.open) {
                let _ = p.tx.send(bytes);
            }
        }
    }

    fn send_to_all(&mut self, bytes: Bytes, _mode: DeliveryMode) {
        if let Endpoint::Server(server) = &mut self.endpoint {
            for peer in server.peers.iter().filter(|p| p.open) {
                let _ = peer.tx.send(bytes.clone());
            }
        }
    }

    fn send_to_server(&mut self, bytes: Bytes, _mode: DeliveryMode) {
        if let Endpoint::Client(client) = &mut self.endpoint {
            if client.open {
                let _ = client.tx.send(bytes);
            }
        }
    }

    fn stop(&mut self) {
        if let Endpoint::Server(server) = std::mem::replace(&mut self.endpoint, Endpoint::Idle) {
            self.hub.release(server.port);
        }
    }
}

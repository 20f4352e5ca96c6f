//! Bridge mode.
//!
//! A bridge only accepts inbound exchange clients. Each one is paired with a
//! freshly discovered outbound transport and the two are spliced byte-for-byte
//! in both directions, so browser-bound clients can reach the TCP network
//! through the bridge host.
//!
//! Each splice task owns both endpoints of its pair, which is what makes
//! teardown idempotent and linked: when either side closes or errors, the
//! task winds down and both transports are dropped exactly once. The
//! endpoints never hold each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{GroupOptions, Params, DEFAULT_ACCEPT_PORT};
use crate::discovery::Discovery;
use crate::error::{GroupError, GroupResult};
use crate::exchange::ExchangeEvent;
use crate::group::coordinator::{run_accept, run_unaccept};
use crate::transport::Transport;

/// Capacity of the bridge broadcast bus.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Pacing delay before retrying outbound discovery when no method is enabled.
const NO_METHODS_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Identifier for one endpoint of a bridge pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeId(pub u64);

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bridge-{}", self.0)
    }
}

/// Events emitted by a bridge.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// An inbound client arrived and is being paired.
    Connection { client: BridgeId },
    /// An outbound attempt for a waiting client failed; it will be retried.
    ConnectError { error: Arc<GroupError> },
    /// A pair is spliced and relaying.
    Bridge { client: BridgeId, peer: BridgeId },
    /// A spliced pair collapsed on an error. Both endpoints are gone.
    PeerError {
        error: Arc<GroupError>,
        client: BridgeId,
        peer: BridgeId,
    },
    /// An unrecoverable bridge-level failure.
    Error { error: Arc<GroupError> },
}

/// Observer-facing snapshot of bridge state.
#[derive(Debug, Clone)]
pub struct BridgeSnapshot {
    /// Whether inbound clients are being accepted.
    pub accepting: bool,
    /// Whether the bridge was closed.
    pub closed: bool,
    /// Clients waiting for their outbound counterpart.
    pub pairing: usize,
    /// Pairs currently spliced.
    pub spliced: usize,
}

enum BridgeCommand {
    Close {
        done: oneshot::Sender<()>,
    },
    Accept {
        port: u16,
        done: oneshot::Sender<GroupResult<()>>,
    },
    Unaccept {
        done: oneshot::Sender<GroupResult<()>>,
    },
    Snapshot {
        done: oneshot::Sender<BridgeSnapshot>,
    },
}

enum Internal {
    Outbound {
        client: BridgeId,
        result: GroupResult<Transport>,
    },
    AcceptDone {
        result: GroupResult<()>,
        done: oneshot::Sender<GroupResult<()>>,
    },
    UnacceptDone {
        result: GroupResult<()>,
        done: Option<oneshot::Sender<GroupResult<()>>>,
    },
    PairClosed {
        client: BridgeId,
        peer: BridgeId,
        error: Option<Arc<GroupError>>,
    },
}

/// Handle to a running bridge.
#[derive(Clone)]
pub struct Bridge {
    cmd_tx: mpsc::UnboundedSender<BridgeCommand>,
    events: broadcast::Sender<BridgeEvent>,
}

impl Bridge {
    /// Create a bridge over the given params. Web discovery is forced off;
    /// outbound counterparts come from the DNS, static, and custom methods.
    pub fn new(params: Params, opts: GroupOptions) -> Self {
        let opts = opts.with_connect_web(false);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cmd_tx = spawn(Arc::new(params), opts, events.clone());
        Self { cmd_tx, events }
    }

    /// Subscribe to the bridge event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Bridges do not dial out on their own behalf; this always fails.
    pub fn connect(&self) -> GroupResult<()> {
        Err(GroupError::BridgeConnect)
    }

    /// Enable accepting inbound clients via the exchange.
    pub async fn accept(&self, port: Option<u16>) -> GroupResult<()> {
        let (done, rx) = oneshot::channel();
        self.command(BridgeCommand::Accept {
            port: port.unwrap_or(DEFAULT_ACCEPT_PORT),
            done,
        })?;
        rx.await.map_err(|_| GroupError::Closed)?
    }

    /// Disable accepting inbound clients. A no-op when not accepting.
    pub async fn unaccept(&self) -> GroupResult<()> {
        let (done, rx) = oneshot::channel();
        self.command(BridgeCommand::Unaccept { done })?;
        rx.await.map_err(|_| GroupError::Closed)?
    }

    /// Close the bridge: stop accepting and collapse every pair.
    pub async fn close(&self) -> GroupResult<()> {
        let (done, rx) = oneshot::channel();
        self.command(BridgeCommand::Close { done })?;
        rx.await.map_err(|_| GroupError::Closed)
    }

    /// Current observer-facing state.
    pub async fn snapshot(&self) -> GroupResult<BridgeSnapshot> {
        let (done, rx) = oneshot::channel();
        self.command(BridgeCommand::Snapshot { done })?;
        rx.await.map_err(|_| GroupError::Closed)
    }

    fn command(&self, cmd: BridgeCommand) -> GroupResult<()> {
        self.cmd_tx.send(cmd).map_err(|_| GroupError::Closed)
    }
}

struct Coordinator {
    params: Arc<Params>,
    discovery: Arc<Discovery>,
    events: broadcast::Sender<BridgeEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    closed: bool,
    accepting: bool,
    next_id: u64,
    /// Inbound clients waiting for their outbound counterpart.
    pairing: HashMap<BridgeId, Transport>,
    /// Splice tasks by client id.
    spliced: HashMap<BridgeId, JoinHandle<()>>,
}

fn spawn(
    params: Arc<Params>,
    opts: GroupOptions,
    events: broadcast::Sender<BridgeEvent>,
) -> mpsc::UnboundedSender<BridgeCommand> {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    let (internal_tx, mut internal_rx) = mpsc::unbounded_channel();
    let mut exchange_rx = params.exchange.as_ref().map(|e| e.subscribe());

    let discovery = Arc::new(Discovery::new(params.clone(), opts.connect_timeout, false));

    let mut coord = Coordinator {
        params,
        discovery,
        events,
        internal_tx,
        closed: false,
        accepting: false,
        next_id: 1,
        pairing: HashMap::new(),
        spliced: HashMap::new(),
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                maybe_cmd = cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => coord.handle_command(cmd),
                        None => break,
                    }
                }

                Some(internal) = internal_rx.recv() => {
                    coord.handle_internal(internal);
                }

                Some(event) = async {
                    match exchange_rx.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    coord.handle_exchange_event(event);
                }
            }
        }
    });

    cmd_tx
}

impl Coordinator {
    fn emit(&self, event: BridgeEvent) {
        let _ = self.events.send(event);
    }

    fn alloc_id(&mut self) -> BridgeId {
        let id = self.next_id;
        self.next_id += 1;
        BridgeId(id)
    }

    fn handle_command(&mut self, cmd: BridgeCommand) {
        match cmd {
            BridgeCommand::Close { done } => self.close(done),
            BridgeCommand::Accept { port, done } => self.accept(port, done),
            BridgeCommand::Unaccept { done } => self.unaccept(Some(done)),
            BridgeCommand::Snapshot { done } => {
                let _ = done.send(BridgeSnapshot {
                    accepting: self.accepting,
                    closed: self.closed,
                    pairing: self.pairing.len(),
                    spliced: self.spliced.len(),
                });
            }
        }
    }

    fn close(&mut self, done: oneshot::Sender<()>) {
        if !self.closed {
            tracing::info!(
                pairing = self.pairing.len(),
                spliced = self.spliced.len(),
                "Bridge closing"
            );
            self.closed = true;
            if self.accepting {
                self.unaccept(None);
            }
            // Dropping the waiting clients destroys their transports; aborting
            // a splice task drops both of its endpoints.
            self.pairing.clear();
            for (_, handle) in self.spliced.drain() {
                handle.abort();
            }
        }
        let _ = done.send(());
    }

    fn accept(&mut self, port: u16, done: oneshot::Sender<GroupResult<()>>) {
        if self.closed {
            let _ = done.send(Err(GroupError::Closed));
            return;
        }
        let Some(exchange) = self.params.exchange.clone() else {
            let _ = done.send(Err(GroupError::NoExchange));
            return;
        };
        if self.accepting {
            let _ = done.send(Ok(()));
            return;
        }

        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = run_accept(exchange.as_ref(), port).await;
            let _ = internal.send(Internal::AcceptDone { result, done });
        });
    }

    fn unaccept(&mut self, done: Option<oneshot::Sender<GroupResult<()>>>) {
        if !self.accepting {
            if let Some(done) = done {
                let _ = done.send(Ok(()));
            }
            return;
        }
        let Some(exchange) = self.params.exchange.clone() else {
            self.accepting = false;
            if let Some(done) = done {
                let _ = done.send(Ok(()));
            }
            return;
        };

        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = run_unaccept(exchange.as_ref()).await;
            let _ = internal.send(Internal::UnacceptDone { result, done });
        });
    }

    fn handle_exchange_event(&mut self, event: ExchangeEvent) {
        match event {
            ExchangeEvent::Peer {
                transport,
                incoming,
            } => {
                if !incoming || self.closed {
                    return;
                }
                let client = self.alloc_id();
                tracing::info!(%client, "Inbound bridge client");
                self.emit(BridgeEvent::Connection { client });
                self.pairing.insert(client, transport);
                self.spawn_outbound(client, None);
            }
            ExchangeEvent::Error(e) => {
                self.emit(BridgeEvent::Error {
                    error: Arc::new(e.into()),
                });
            }
        }
    }

    /// Fetch one outbound transport for a waiting client.
    fn spawn_outbound(&self, client: BridgeId, delay: Option<Duration>) {
        let discovery = self.discovery.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let result = discovery.next_transport().await;
            let _ = internal.send(Internal::Outbound { client, result });
        });
    }

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Outbound { client, result } => self.handle_outbound(client, result),
            Internal::AcceptDone { result, done } => {
                if self.closed {
                    if result.is_ok() {
                        self.accepting = true;
                        self.unaccept(None);
                    }
                    let _ = done.send(Err(GroupError::Closed));
                    return;
                }
                if result.is_ok() {
                    self.accepting = true;
                    tracing::info!("Bridge accepting incoming clients");
                }
                let _ = done.send(result);
            }
            Internal::UnacceptDone { result, done } => {
                self.accepting = false;
                match done {
                    Some(done) => {
                        let _ = done.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            self.emit(BridgeEvent::Error { error: Arc::new(e) });
                        }
                    }
                }
            }
            Internal::PairClosed {
                client,
                peer,
                error,
            } => {
                self.spliced.remove(&client);
                match error {
                    Some(error) => {
                        tracing::debug!(%client, %peer, %error, "Bridge pair errored");
                        self.emit(BridgeEvent::PeerError {
                            error,
                            client,
                            peer,
                        });
                    }
                    None => {
                        tracing::debug!(%client, %peer, "Bridge pair closed");
                    }
                }
            }
        }
    }

    fn handle_outbound(&mut self, client: BridgeId, result: GroupResult<Transport>) {
        if self.closed {
            return;
        }
        // The client may already be gone (bridge closed and reopened ids never
        // collide, so a missing entry means it was dropped).
        if !self.pairing.contains_key(&client) {
            return;
        }

        match result {
            Err(e) => {
                tracing::debug!(%client, error = %e, "Outbound attempt failed, retrying");
                let delay = matches!(e, GroupError::NoDiscoveryMethods)
                    .then_some(NO_METHODS_RETRY_DELAY);
                self.emit(BridgeEvent::ConnectError { error: Arc::new(e) });
                self.spawn_outbound(client, delay);
            }
            Ok(outbound) => {
                let Some(client_transport) = self.pairing.remove(&client) else {
                    return;
                };
                let peer = self.alloc_id();
                tracing::info!(%client, %peer, "Bridge pair spliced");
                self.emit(BridgeEvent::Bridge { client, peer });

                let internal = self.internal_tx.clone();
                let handle = tokio::spawn(splice(
                    client,
                    peer,
                    client_transport,
                    outbound,
                    internal,
                ));
                self.spliced.insert(client, handle);
            }
        }
    }
}

/// Relay bytes both ways until either side closes or errors, then drop both
/// endpoints. EOF on one side shuts down the matching write half of the
/// other, so close propagates per direction.
async fn splice(
    client: BridgeId,
    peer: BridgeId,
    mut client_transport: Transport,
    mut outbound: Transport,
    internal: mpsc::UnboundedSender<Internal>,
) {
    let error = match tokio::io::copy_bidirectional(&mut client_transport, &mut outbound).await {
        Ok((to_peer, to_client)) => {
            tracing::debug!(%client, %peer, to_peer, to_client, "Splice drained");
            None
        }
        Err(e) => Some(Arc::new(GroupError::Io(e))),
    };
    let _ = internal.send(Internal::PairClosed {
        client,
        peer,
        error,
    });
}

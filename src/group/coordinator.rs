//! The group coordinator task.
//!
//! One task owns every piece of mutable group state: the admitted-peer list,
//! the pre-ready set, the tx pool, the waiter maps, the phase. Everything
//! else (dials, DNS lookups, exchange sessions, peer requests) runs in
//! worker tasks that report back over channels, so no handler here ever
//! blocks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::seq::SliceRandom;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval};

use crate::config::{GroupOptions, Params};
use crate::discovery::{normalize_web_seed, Discovery};
use crate::error::{GroupError, GroupResult};
use crate::exchange::{Exchange, ExchangeAcceptOptions, ExchangeEvent};
use crate::group::events::GroupEvent;
use crate::group::{GroupSnapshot, Phase};
use crate::peer::{
    run_request, Peer, PeerConnector, PeerEvent, PeerId, PeerRequest, RequestError,
    RequestOutcome, RequestPayload,
};
use crate::protocol::{Block, MerkleBlock, Message, Transaction};
use crate::transport::Transport;
use crate::txpool::TxPool;

/// Pacing delay before retrying discovery when no method is enabled, so an
/// unconfigured-but-connecting group polls instead of spinning.
const NO_METHODS_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Operations sent from the public handle to the coordinator.
pub(crate) enum GroupCommand {
    Connect,
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
    Send {
        command: String,
        payload: Bytes,
        assert: bool,
        done: oneshot::Sender<GroupResult<usize>>,
    },
    RandomPeer {
        done: oneshot::Sender<GroupResult<Arc<dyn Peer>>>,
    },
    Request {
        request: PeerRequest,
        done: oneshot::Sender<GroupResult<RequestOutcome>>,
    },
    WaitBlock {
        hash: [u8; 32],
        done: oneshot::Sender<Block>,
    },
    WaitMerkleBlock {
        hash: [u8; 32],
        done: oneshot::Sender<MerkleBlock>,
    },
    WaitTx {
        hash: [u8; 32],
        done: oneshot::Sender<Transaction>,
    },
    Snapshot {
        done: oneshot::Sender<GroupSnapshot>,
    },
}

/// Completions reported back to the coordinator by its worker tasks.
enum Internal {
    Discovered {
        result: GroupResult<Transport>,
    },
    RequestDone {
        peer: PeerId,
        request: PeerRequest,
        result: Result<RequestPayload, RequestError>,
        done: oneshot::Sender<GroupResult<RequestOutcome>>,
    },
    AcceptDone {
        result: GroupResult<()>,
        done: oneshot::Sender<GroupResult<()>>,
    },
    UnacceptDone {
        result: GroupResult<()>,
        done: Option<oneshot::Sender<GroupResult<()>>>,
    },
}

struct Coordinator {
    opts: GroupOptions,
    params: Arc<Params>,
    connector: Arc<dyn PeerConnector>,
    discovery: Arc<Discovery>,
    events: broadcast::Sender<GroupEvent>,
    peer_event_tx: mpsc::UnboundedSender<PeerEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,

    phase: Phase,
    accepting: bool,
    decay_requested: bool,
    next_peer_id: u64,
    /// Admitted peers in admission order.
    peers: Vec<(PeerId, Arc<dyn Peer>)>,
    /// Wrapped but not yet ready.
    pending: HashMap<PeerId, Arc<dyn Peer>>,
    /// Peers whose listeners were detached; their late events are ignored.
    detached: HashSet<PeerId>,
    txpool: TxPool,
    /// Admissions still owed to the web-seed bootstrap before `fill_peers`.
    web_seed_bootstrap: Option<usize>,
    close_waiters: Vec<oneshot::Sender<()>>,
    block_waiters: HashMap<[u8; 32], Vec<oneshot::Sender<Block>>>,
    merkle_waiters: HashMap<[u8; 32], Vec<oneshot::Sender<MerkleBlock>>>,
    tx_waiters: HashMap<[u8; 32], Vec<oneshot::Sender<Transaction>>>,
}

/// Spawn the coordinator task, returning its command channel.
pub(crate) fn spawn(
    params: Arc<Params>,
    opts: GroupOptions,
    connector: Arc<dyn PeerConnector>,
    events: broadcast::Sender<GroupEvent>,
) -> mpsc::UnboundedSender<GroupCommand> {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    let (peer_event_tx, mut peer_event_rx) = mpsc::unbounded_channel();
    let (internal_tx, mut internal_rx) = mpsc::unbounded_channel();
    let mut exchange_rx = params.exchange.as_ref().map(|e| e.subscribe());

    let discovery = Arc::new(Discovery::new(
        params.clone(),
        opts.connect_timeout,
        opts.connect_web,
    ));

    let mut coord = Coordinator {
        opts,
        params,
        connector,
        discovery,
        events,
        peer_event_tx,
        internal_tx,
        phase: Phase::Idle,
        accepting: false,
        decay_requested: false,
        next_peer_id: 1,
        peers: Vec::new(),
        pending: HashMap::new(),
        detached: HashSet::new(),
        txpool: TxPool::new(),
        web_seed_bootstrap: None,
        close_waiters: Vec::new(),
        block_waiters: HashMap::new(),
        merkle_waiters: HashMap::new(),
        tx_waiters: HashMap::new(),
    };

    tokio::spawn(async move {
        let mut decay_timer: Option<Interval> = None;

        loop {
            // The tx-pool timer starts on first admission and stops on close.
            if coord.phase == Phase::Closed {
                decay_timer = None;
            } else if coord.decay_requested && decay_timer.is_none() {
                decay_timer = Some(interval_at(
                    Instant::now() + crate::txpool::DECAY_INTERVAL,
                    crate::txpool::DECAY_INTERVAL,
                ));
            }

            tokio::select! {
                maybe_cmd = cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => coord.handle_command(cmd),
                        // Every handle is gone; tear the task down.
                        None => break,
                    }
                }

                Some(event) = peer_event_rx.recv() => {
                    coord.handle_peer_event(event);
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

                _ = async {
                    match decay_timer.as_mut() {
                        Some(timer) => { timer.tick().await; }
                        None => std::future::pending().await,
                    }
                } => {
                    coord.txpool.decay();
                }
            }
        }
    });

    cmd_tx
}

impl Coordinator {
    fn emit(&self, event: GroupEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn alloc_peer_id(&mut self) -> PeerId {
        let id = self.next_peer_id;
        self.next_peer_id += 1;
        PeerId::new(id)
    }

    // ---- commands ----------------------------------------------------------

    fn handle_command(&mut self, cmd: GroupCommand) {
        match cmd {
            GroupCommand::Connect => self.connect(),
            GroupCommand::Close { done } => self.close(done),
            GroupCommand::Accept { port, done } => self.accept(port, done),
            GroupCommand::Unaccept { done } => self.unaccept(Some(done)),
            GroupCommand::Send {
                command,
                payload,
                assert,
                done,
            } => {
                let _ = done.send(self.broadcast_send(&command, payload, assert));
            }
            GroupCommand::RandomPeer { done } => {
                let result = self
                    .random_admitted()
                    .map(|(_, peer)| peer)
                    .ok_or(GroupError::NotConnected);
                let _ = done.send(result);
            }
            GroupCommand::Request { request, done } => {
                if self.phase == Phase::Closed {
                    // Completion is dropped silently.
                    return;
                }
                self.dispatch_request(request, done);
            }
            GroupCommand::WaitBlock { hash, done } => {
                if self.phase != Phase::Closed {
                    self.block_waiters.entry(hash).or_default().push(done);
                }
            }
            GroupCommand::WaitMerkleBlock { hash, done } => {
                if self.phase != Phase::Closed {
                    self.merkle_waiters.entry(hash).or_default().push(done);
                }
            }
            GroupCommand::WaitTx { hash, done } => {
                if self.phase != Phase::Closed {
                    self.tx_waiters.entry(hash).or_default().push(done);
                }
            }
            GroupCommand::Snapshot { done } => {
                let _ = done.send(GroupSnapshot {
                    phase: self.phase,
                    accepting: self.accepting,
                    peer_count: self.peers.len(),
                    tx_pool_size: self.txpool.len(),
                });
            }
        }
    }

    /// Transition idle → connecting and start filling the pool. Web seeds go
    /// first when web discovery is on: the exchange producer only becomes
    /// eligible once some web peers exist.
    fn connect(&mut self) {
        if self.phase != Phase::Idle {
            tracing::debug!(phase = ?self.phase, "connect() ignored");
            return;
        }
        self.phase = Phase::Connecting;
        tracing::info!(
            magic = %self.params.magic_hex(),
            target = self.opts.num_peers,
            "PeerGroup connecting"
        );

        let web_exchange = if self.opts.connect_web && !self.params.web_seeds.is_empty() {
            self.params.exchange.clone()
        } else {
            None
        };

        if let Some(exchange) = web_exchange {
            let n_seeds = self
                .params
                .web_seeds
                .len()
                .min((self.opts.num_peers / 2).max(1));
            self.web_seed_bootstrap = Some(n_seeds);

            for seed in self.params.web_seeds.iter().take(n_seeds) {
                match normalize_web_seed(seed, self.params.default_web_port) {
                    Ok(normalized) => {
                        let exchange = exchange.clone();
                        let internal = self.internal_tx.clone();
                        tokio::spawn(async move {
                            let result = exchange
                                .connect(
                                    &normalized.transport,
                                    &normalized.address,
                                    normalized.opts,
                                )
                                .await
                                .map_err(GroupError::from);
                            let _ = internal.send(Internal::Discovered { result });
                        });
                    }
                    Err(e) => {
                        self.emit(GroupEvent::ConnectError {
                            error: Arc::new(e),
                            peer: None,
                        });
                    }
                }
            }
        } else {
            self.fill_peers();
        }
    }

    /// Issue one discovery attempt per missing peer.
    fn fill_peers(&mut self) {
        let deficit = self.opts.num_peers.saturating_sub(self.peers.len());
        tracing::debug!(
            deficit,
            connected = self.peers.len(),
            "Filling peer pool"
        );
        for _ in 0..deficit {
            self.spawn_connect_peer(None);
        }
    }

    /// Run one discovery attempt in a worker task.
    fn spawn_connect_peer(&self, delay: Option<Duration>) {
        let discovery = self.discovery.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let result = discovery.next_transport().await;
            let _ = internal.send(Internal::Discovered { result });
        });
    }

    fn close(&mut self, done: oneshot::Sender<()>) {
        if self.phase == Phase::Closed {
            self.close_waiters.push(done);
            self.check_close_waiters();
            return;
        }

        tracing::info!(peers = self.peers.len(), "PeerGroup closing");
        self.phase = Phase::Closed;
        self.web_seed_bootstrap = None;
        self.block_waiters.clear();
        self.merkle_waiters.clear();
        self.tx_waiters.clear();

        if self.accepting {
            self.unaccept(None);
        }

        let reason = Arc::new(GroupError::Closing);
        for (_, peer) in self.peers.iter() {
            peer.disconnect(Some(reason.clone()));
        }
        // Pending pre-ready peers are turned away when their `Ready` arrives.

        self.close_waiters.push(done);
        self.check_close_waiters();
    }

    fn check_close_waiters(&mut self) {
        if self.phase == Phase::Closed && self.peers.is_empty() {
            for waiter in self.close_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    fn accept(&mut self, port: u16, done: oneshot::Sender<GroupResult<()>>) {
        if self.phase == Phase::Closed {
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
            // Accepting without an exchange cannot happen.
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

    fn broadcast_send(
        &mut self,
        command: &str,
        payload: Bytes,
        assert: bool,
    ) -> GroupResult<usize> {
        if assert && self.peers.is_empty() {
            return Err(GroupError::NotConnected);
        }
        let mut delivered = 0;
        for (id, peer) in self.peers.iter() {
            match peer.send(command, payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(peer = %id, error = %e, "Failed to send to peer");
                }
            }
        }
        Ok(delivered)
    }

    fn random_admitted(&self) -> Option<(PeerId, Arc<dyn Peer>)> {
        self.peers
            .choose(&mut rand::thread_rng())
            .map(|(id, peer)| (*id, peer.clone()))
    }

    // ---- requests ----------------------------------------------------------

    /// Pick a random peer and run the request against it. Timeouts come back
    /// through [`Internal::RequestDone`] and retry here against another peer;
    /// retries are unbounded by design of the dispatch contract.
    fn dispatch_request(
        &mut self,
        request: PeerRequest,
        done: oneshot::Sender<GroupResult<RequestOutcome>>,
    ) {
        let Some((id, peer)) = self.random_admitted() else {
            let _ = done.send(Err(GroupError::NotConnected));
            return;
        };

        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = run_request(peer.as_ref(), request.clone()).await;
            let _ = internal.send(Internal::RequestDone {
                peer: id,
                request,
                result,
                done,
            });
        });
    }

    // ---- worker completions ------------------------------------------------

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Discovered { result } => self.handle_discovered(result),
            Internal::RequestDone {
                peer,
                request,
                result,
                done,
            } => self.handle_request_done(peer, request, result, done),
            Internal::AcceptDone { result, done } => {
                if self.phase == Phase::Closed {
                    // Closed while enabling; undo and report.
                    if result.is_ok() {
                        self.accepting = true;
                        self.unaccept(None);
                    }
                    let _ = done.send(Err(GroupError::Closed));
                    return;
                }
                if result.is_ok() {
                    self.accepting = true;
                    tracing::info!("Accepting incoming peers");
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
                        // Close-path unaccept surfaces failures as group errors.
                        if let Err(e) = result {
                            self.emit(GroupEvent::Error { error: Arc::new(e) });
                        }
                    }
                }
            }
        }
    }

    /// One discovery attempt finished (C6 entry).
    fn handle_discovered(&mut self, result: GroupResult<Transport>) {
        if self.phase == Phase::Closed {
            // Late results are discarded; dropping the transport destroys it.
            return;
        }

        match result {
            Ok(transport) => self.wrap_transport(transport),
            Err(e) => {
                tracing::debug!(error = %e, "Discovery attempt failed");
                let delay = matches!(e, GroupError::NoDiscoveryMethods)
                    .then_some(NO_METHODS_RETRY_DELAY);
                self.emit(GroupEvent::ConnectError {
                    error: Arc::new(e),
                    peer: None,
                });
                if self.phase == Phase::Connecting {
                    self.spawn_connect_peer(delay);
                }
            }
        }
    }

    /// Wrap an established transport and hold the peer until it reports ready.
    fn wrap_transport(&mut self, transport: Transport) {
        let id = self.alloc_peer_id();
        let peer = self.connector.wrap(
            id,
            transport,
            &self.opts.peer_opts,
            self.peer_event_tx.clone(),
        );
        tracing::debug!(peer = %id, "Peer wrapped, awaiting readiness");
        self.pending.insert(id, peer);
    }

    fn handle_request_done(
        &mut self,
        peer: PeerId,
        request: PeerRequest,
        result: Result<RequestPayload, RequestError>,
        done: oneshot::Sender<GroupResult<RequestOutcome>>,
    ) {
        if self.phase == Phase::Closed {
            // Completion is dropped silently.
            return;
        }

        match result {
            Err(e) if e.is_timeout() => {
                let error = Arc::new(GroupError::Request(e));
                tracing::debug!(peer = %peer, "Request timed out, retrying on another peer");
                self.emit(GroupEvent::RequestError {
                    error: error.clone(),
                });
                self.drop_peer(peer, Some(error));
                self.dispatch_request(request, done);
            }
            Err(e) => {
                let _ = done.send(Err(GroupError::Request(e)));
            }
            Ok(payload) => {
                let _ = done.send(Ok(RequestOutcome { peer, payload }));
            }
        }
    }

    // ---- peer lifecycle ----------------------------------------------------

    fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Ready { peer } => self.handle_ready(peer),
            PeerEvent::Disconnected { peer, error } => self.handle_disconnected(peer, error),
            PeerEvent::Error { peer, error } => self.handle_peer_error(peer, error),
            PeerEvent::Message { peer, message } => self.handle_message(peer, message),
        }
    }

    fn handle_ready(&mut self, id: PeerId) {
        let Some(peer) = self.pending.remove(&id) else {
            return;
        };
        if self.phase == Phase::Closed {
            peer.disconnect(Some(Arc::new(GroupError::Closing)));
            return;
        }
        self.admit(id, peer);
    }

    /// Admission: append, keep the aging timer running, enforce the hard
    /// limit, surface the peer.
    fn admit(&mut self, id: PeerId, peer: Arc<dyn Peer>) {
        self.peers.push((id, peer));
        self.decay_requested = true;

        if self.opts.hard_limit && self.peers.len() > self.opts.num_peers {
            let oldest = self.peers[0].0;
            self.drop_peer(oldest, Some(Arc::new(GroupError::OverLimit)));
        }

        tracing::info!(peer = %id, count = self.peers.len(), "Peer admitted");
        self.emit(GroupEvent::Peer { peer: id });

        if let Some(remaining) = self.web_seed_bootstrap.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.web_seed_bootstrap = None;
                self.fill_peers();
            }
        }
    }

    fn handle_disconnected(&mut self, id: PeerId, error: Option<Arc<GroupError>>) {
        if self.detached.remove(&id) {
            // Already dropped from this side; the peer's own notice is stale.
            return;
        }

        if self.pending.remove(&id).is_some() {
            // Died before readiness.
            let error = error
                .unwrap_or_else(|| Arc::new(GroupError::Peer("disconnected".to_string())));
            self.emit(GroupEvent::ConnectError {
                error,
                peer: Some(id),
            });
            if self.phase == Phase::Connecting {
                self.spawn_connect_peer(None);
            }
            return;
        }

        if let Some(pos) = self.peers.iter().position(|(pid, _)| *pid == id) {
            self.peers.remove(pos);
            tracing::info!(peer = %id, count = self.peers.len(), "Peer disconnected");
            self.emit(GroupEvent::Disconnect { peer: id, error });
            self.check_close_waiters();
            if self.phase == Phase::Connecting {
                self.fill_peers();
            }
        }
    }

    fn handle_peer_error(&mut self, id: PeerId, error: Arc<GroupError>) {
        if self.detached.contains(&id) {
            return;
        }

        if let Some(peer) = self.pending.remove(&id) {
            // Pre-ready failure: one-shot, the matching disconnect is stale.
            self.detached.insert(id);
            self.emit(GroupEvent::ConnectError {
                error,
                peer: Some(id),
            });
            peer.disconnect(None);
            if self.phase == Phase::Connecting {
                self.spawn_connect_peer(None);
            }
            return;
        }

        if let Some((_, peer)) = self.peers.iter().find(|(pid, _)| *pid == id) {
            tracing::warn!(peer = %id, error = %error, "Peer error");
            self.emit(GroupEvent::PeerError {
                error: error.clone(),
                peer: id,
            });
            peer.disconnect(Some(error));
            // Removal happens on its Disconnected event.
        }
    }

    /// Drop an admitted peer from this side: remove it now, detach its
    /// listeners, tell it to go away. Used for hard-limit eviction and
    /// request-timeout disconnects, where the list must shrink immediately.
    fn drop_peer(&mut self, id: PeerId, reason: Option<Arc<GroupError>>) {
        let Some(pos) = self.peers.iter().position(|(pid, _)| *pid == id) else {
            return;
        };
        let (_, peer) = self.peers.remove(pos);
        self.detached.insert(id);
        tracing::info!(peer = %id, count = self.peers.len(), "Peer dropped");
        self.emit(GroupEvent::Disconnect {
            peer: id,
            error: reason.clone(),
        });
        peer.disconnect(reason);
        self.check_close_waiters();
        if self.phase == Phase::Connecting {
            self.fill_peers();
        }
    }

    // ---- traffic -----------------------------------------------------------

    fn handle_message(&mut self, id: PeerId, message: Message) {
        // Only admitted peers feed the group bus.
        if !self.peers.iter().any(|(pid, _)| *pid == id) {
            return;
        }

        self.emit(GroupEvent::Message {
            peer: id,
            message: message.clone(),
        });

        match message {
            Message::Block(block) => {
                if let Some(waiters) = self.block_waiters.remove(&block.header.hash) {
                    for waiter in waiters {
                        let _ = waiter.send(block.clone());
                    }
                }
                self.emit(GroupEvent::Block { block });
            }
            Message::MerkleBlock(merkle_block) => {
                if let Some(waiters) = self.merkle_waiters.remove(&merkle_block.header.hash) {
                    for waiter in waiters {
                        let _ = waiter.send(merkle_block.clone());
                    }
                }
                self.emit(GroupEvent::MerkleBlock { merkle_block });
            }
            Message::Tx(tx) => {
                self.txpool.insert(tx.clone());
                if let Some(waiters) = self.tx_waiters.remove(&tx.hash) {
                    for waiter in waiters {
                        let _ = waiter.send(tx.clone());
                    }
                }
                self.emit(GroupEvent::Tx { tx });
            }
            Message::Headers(_) | Message::Other { .. } => {}
        }
    }

    // ---- exchange ----------------------------------------------------------

    fn handle_exchange_event(&mut self, event: ExchangeEvent) {
        match event {
            ExchangeEvent::Peer {
                transport,
                incoming,
            } => {
                if !incoming || self.phase == Phase::Closed {
                    // Outbound sessions arrive through their completions;
                    // late inbound transports are destroyed.
                    return;
                }
                tracing::debug!("Incoming exchange peer");
                self.wrap_transport(transport);
            }
            ExchangeEvent::Error(e) => {
                self.emit(GroupEvent::Error {
                    error: Arc::new(e.into()),
                });
            }
        }
    }
}

/// Enable acceptance: websocket first, then webrtc. A missing webrtc
/// transport counts as success; any other webrtc failure rolls websocket
/// back before surfacing.
pub(crate) async fn run_accept(exchange: &dyn Exchange, port: u16) -> GroupResult<()> {
    exchange
        .accept("websocket", ExchangeAcceptOptions { port })
        .await?;

    match exchange.accept("webrtc", ExchangeAcceptOptions { port }).await {
        Ok(()) => Ok(()),
        Err(crate::exchange::ExchangeError::TransportNotFound { .. }) => Ok(()),
        Err(e) => {
            if let Err(undo) = exchange.unaccept("websocket").await {
                tracing::warn!(error = %undo, "Failed to undo websocket accept");
            }
            Err(e.into())
        }
    }
}

/// Disable acceptance on both transports, surfacing the first failure.
pub(crate) async fn run_unaccept(exchange: &dyn Exchange) -> GroupResult<()> {
    let websocket = exchange.unaccept("websocket").await.err();
    let webrtc = exchange.unaccept("webrtc").await.err();
    match websocket.or(webrtc) {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

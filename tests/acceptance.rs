//! Acceptance tests for the peer group.
//!
//! These tests verify the coordinator's observable contract over mock
//! collaborators:
//! 1. Static discovery - a pool fills to target over real TCP dials
//! 2. Replenishment - failed attempts and peer disconnects are made up
//! 3. Request dispatch - timeouts drop the peer and retry elsewhere
//! 4. Hard limit - the oldest peer is evicted on overflow
//! 5. Close - completion fires once the pool drains, then silence
//! 6. Inventory - transactions deduplicate and hash waiters resolve
//! 7. Web seeds - bootstrap admissions gate the main fill
//! 8. Bridge - inbound clients splice to fresh outbound transports

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};

use peergroup::discovery::NewPeerProducer;
use peergroup::exchange::{
    Exchange, ExchangeAcceptOptions, ExchangeConnectOptions, ExchangeError, ExchangeEvent,
};
use peergroup::peer::{
    Peer, PeerConnector, PeerEvent, PeerId, PeerOptions, RequestError, RequestOptions,
};
use peergroup::{
    Block, BlockHeader, Bridge, BridgeEvent, GroupError, GroupEvent, GroupOptions, GroupResult,
    Message, Params, PeerGroup, Phase, Transaction, Transport, WebSeed,
};

/// Timeout for every awaited expectation.
const WAIT: Duration = Duration::from_secs(5);

// ---- mock peer ------------------------------------------------------------

/// Shared request scripting across every peer a connector builds.
#[derive(Default)]
struct RequestScript {
    /// The next request (on whichever peer) times out.
    timeout_once: AtomicBool,
    /// Peers that received a request, in order.
    calls: Mutex<Vec<PeerId>>,
}

struct MockPeer {
    id: PeerId,
    events: mpsc::UnboundedSender<PeerEvent>,
    disconnected: AtomicBool,
    sent: Mutex<Vec<(String, Bytes)>>,
    script: Arc<RequestScript>,
}

impl MockPeer {
    fn new(
        id: PeerId,
        events: mpsc::UnboundedSender<PeerEvent>,
        script: Arc<RequestScript>,
    ) -> Self {
        Self {
            id,
            events,
            disconnected: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            script,
        }
    }

    fn sent_commands(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    /// Simulate the remote side dropping the session.
    fn induce_disconnect(&self) {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(PeerEvent::Disconnected {
                peer: self.id,
                error: None,
            });
        }
    }

    /// Feed a decoded message into the group, as the driver loop would.
    fn emit_message(&self, message: Message) {
        let _ = self.events.send(PeerEvent::Message {
            peer: self.id,
            message,
        });
    }

    fn take_timeout(&self) -> bool {
        self.script.timeout_once.swap(false, Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.script.calls.lock().unwrap().push(self.id);
    }
}

#[async_trait]
impl Peer for MockPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn send(&self, command: &str, payload: Bytes) -> GroupResult<()> {
        self.sent.lock().unwrap().push((command.to_string(), payload));
        Ok(())
    }

    fn disconnect(&self, reason: Option<Arc<GroupError>>) {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(PeerEvent::Disconnected {
                peer: self.id,
                error: reason,
            });
        }
    }

    async fn get_blocks(
        &self,
        hashes: Vec<[u8; 32]>,
        _opts: RequestOptions,
    ) -> Result<Vec<Block>, RequestError> {
        self.record_call();
        if self.take_timeout() {
            return Err(RequestError::Timeout);
        }
        Ok(hashes
            .into_iter()
            .map(|hash| Block {
                header: BlockHeader {
                    hash,
                    prev_hash: [0u8; 32],
                    height: 0,
                    timestamp: 0,
                },
                txids: Vec::new(),
            })
            .collect())
    }

    async fn get_transactions(
        &self,
        _block_hash: [u8; 32],
        txids: Vec<[u8; 32]>,
    ) -> Result<Vec<Transaction>, RequestError> {
        self.record_call();
        if self.take_timeout() {
            return Err(RequestError::Timeout);
        }
        Ok(txids
            .into_iter()
            .map(|hash| Transaction {
                hash,
                raw: Bytes::new(),
            })
            .collect())
    }

    async fn get_headers(
        &self,
        _locator: Vec<[u8; 32]>,
        _opts: RequestOptions,
    ) -> Result<Vec<BlockHeader>, RequestError> {
        self.record_call();
        if self.take_timeout() {
            return Err(RequestError::Timeout);
        }
        Ok(Vec::new())
    }
}

/// Connector whose peers are ready the moment they are wrapped.
#[derive(Default)]
struct MockConnector {
    created: Mutex<Vec<Arc<MockPeer>>>,
    script: Arc<RequestScript>,
}

impl MockConnector {
    fn created(&self) -> Vec<Arc<MockPeer>> {
        self.created.lock().unwrap().clone()
    }
}

impl PeerConnector for MockConnector {
    fn wrap(
        &self,
        id: PeerId,
        transport: Transport,
        _opts: &PeerOptions,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Arc<dyn Peer> {
        drop(transport);
        let peer = Arc::new(MockPeer::new(id, events.clone(), self.script.clone()));
        self.created.lock().unwrap().push(peer.clone());
        let _ = events.send(PeerEvent::Ready { peer: id });
        peer
    }
}

// ---- mock discovery producer ----------------------------------------------

fn dead_transport() -> Transport {
    let (a, _b) = tokio::io::duplex(8);
    Box::new(a)
}

/// Producer handing out fresh throwaway transports, with an optional failure
/// script (`false` entries fail with a connect timeout).
#[derive(Default)]
struct AutoProducer {
    calls: AtomicUsize,
    failures: Mutex<VecDeque<bool>>,
}

impl AutoProducer {
    fn with_script(script: Vec<bool>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures: Mutex::new(script.into()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewPeerProducer for AutoProducer {
    async fn get_new_peer(&self) -> GroupResult<Transport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ok = self.failures.lock().unwrap().pop_front().unwrap_or(true);
        if ok {
            Ok(dead_transport())
        } else {
            Err(GroupError::ConnectTimeout)
        }
    }
}

/// Producer handing out pre-built transports (or failures) in order.
struct QueueProducer {
    queue: Mutex<VecDeque<GroupResult<Transport>>>,
}

impl QueueProducer {
    fn new(items: Vec<GroupResult<Transport>>) -> Self {
        Self {
            queue: Mutex::new(items.into()),
        }
    }
}

#[async_trait]
impl NewPeerProducer for QueueProducer {
    async fn get_new_peer(&self) -> GroupResult<Transport> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GroupError::ConnectTimeout))
    }
}

// ---- mock exchange ---------------------------------------------------------

struct MockExchange {
    subscriber: Mutex<Option<mpsc::UnboundedSender<ExchangeEvent>>>,
    connect_calls: AtomicUsize,
    get_new_peer_calls: AtomicUsize,
    web_peer_count: AtomicUsize,
    accepted: Mutex<Vec<String>>,
    webrtc_available: bool,
}

impl MockExchange {
    fn new(webrtc_available: bool) -> Self {
        Self {
            subscriber: Mutex::new(None),
            connect_calls: AtomicUsize::new(0),
            get_new_peer_calls: AtomicUsize::new(0),
            web_peer_count: AtomicUsize::new(0),
            accepted: Mutex::new(Vec::new()),
            webrtc_available,
        }
    }

    fn set_web_peer_count(&self, n: usize) {
        self.web_peer_count.store(n, Ordering::SeqCst);
    }

    fn accepted_transports(&self) -> Vec<String> {
        self.accepted.lock().unwrap().clone()
    }

    /// Surface an inbound peer session, as the real exchange would.
    fn push_incoming(&self, transport: Transport) {
        let guard = self.subscriber.lock().unwrap();
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(ExchangeEvent::Peer {
                transport,
                incoming: true,
            });
        }
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn connect(
        &self,
        _transport: &str,
        _address: &str,
        _opts: ExchangeConnectOptions,
    ) -> Result<Transport, ExchangeError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(dead_transport())
    }

    async fn accept(
        &self,
        transport: &str,
        _opts: ExchangeAcceptOptions,
    ) -> Result<(), ExchangeError> {
        if transport == "webrtc" && !self.webrtc_available {
            return Err(ExchangeError::TransportNotFound {
                transport: transport.to_string(),
            });
        }
        self.accepted.lock().unwrap().push(transport.to_string());
        Ok(())
    }

    async fn unaccept(&self, transport: &str) -> Result<(), ExchangeError> {
        self.accepted.lock().unwrap().retain(|t| t != transport);
        Ok(())
    }

    async fn get_new_peer(&self) -> Result<Transport, ExchangeError> {
        self.get_new_peer_calls.fetch_add(1, Ordering::SeqCst);
        Ok(dead_transport())
    }

    fn peer_count(&self) -> usize {
        self.web_peer_count.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ExchangeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.subscriber.lock().unwrap() = Some(tx);
        rx
    }
}

// ---- helpers ---------------------------------------------------------------

async fn wait_for_peer_count(group: &PeerGroup, n: usize) {
    timeout(WAIT, async {
        loop {
            if group.peer_count().await.unwrap() == n {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("peer count never reached {n}"));
}

async fn next_matching<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    pred: impl Fn(&T) -> bool,
) -> T {
    timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event not seen")
}

fn producer_group(
    num_peers: usize,
    producer: Arc<dyn NewPeerProducer>,
) -> (PeerGroup, Arc<MockConnector>) {
    let connector = Arc::new(MockConnector::default());
    let params = Params::new(0xfeedbeef).with_new_peer_producer(producer);
    let opts = GroupOptions::default()
        .with_num_peers(num_peers)
        .with_connect_timeout(Duration::from_millis(500));
    let group = PeerGroup::new(params, opts, connector.clone());
    (group, connector)
}

// ---- scenarios -------------------------------------------------------------

/// S1: three static peers over real TCP dials fill the pool, and a broadcast
/// reaches every admitted peer.
#[tokio::test]
async fn test_static_peers_fill_and_broadcast() {
    let mut listeners = Vec::new();
    let mut static_peers = Vec::new();
    for _ in 0..3 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        static_peers.push(format!("127.0.0.1:{}", listener.local_addr().unwrap().port()));
        listeners.push(listener);
    }

    let connector = Arc::new(MockConnector::default());
    let params = Params::new(0xfeedbeef).with_static_peers(static_peers);
    let opts = GroupOptions::default().with_num_peers(3);
    let group = PeerGroup::new(params, opts, connector.clone());

    let mut events = group.subscribe();
    group.connect().unwrap();

    for _ in 0..3 {
        next_matching(&mut events, |e| matches!(e, GroupEvent::Peer { .. })).await;
    }
    assert_eq!(group.peer_count().await.unwrap(), 3);

    let delivered = group.send("ping", Bytes::new(), true).await.unwrap();
    assert_eq!(delivered, 3);
    for peer in connector.created() {
        assert_eq!(peer.sent_commands(), vec!["ping".to_string()]);
    }
}

/// S2: a timed-out discovery attempt surfaces as a connect error and the
/// replenisher retries until the pool reaches target.
#[tokio::test]
async fn test_connect_error_replenishes() {
    let producer = Arc::new(AutoProducer::with_script(vec![true, false, true]));
    let (group, _connector) = producer_group(2, producer.clone());

    let mut events = group.subscribe();
    group.connect().unwrap();

    let event = next_matching(&mut events, |e| {
        matches!(e, GroupEvent::ConnectError { .. })
    })
    .await;
    if let GroupEvent::ConnectError { error, peer } = event {
        assert_eq!(error.to_string(), "Connection timed out");
        assert!(peer.is_none());
    }

    wait_for_peer_count(&group, 2).await;
    assert_eq!(producer.calls(), 3);
}

/// S3: an admitted peer disconnecting triggers exactly one replacement
/// attempt and the pool returns to target.
#[tokio::test]
async fn test_disconnect_replenishes() {
    let producer = Arc::new(AutoProducer::default());
    let (group, connector) = producer_group(2, producer.clone());

    let mut events = group.subscribe();
    group.connect().unwrap();
    wait_for_peer_count(&group, 2).await;

    connector.created()[0].induce_disconnect();

    let event = next_matching(&mut events, |e| {
        matches!(e, GroupEvent::Disconnect { .. })
    })
    .await;
    if let GroupEvent::Disconnect { error, .. } = event {
        assert!(error.is_none());
    }

    wait_for_peer_count(&group, 2).await;
    assert_eq!(producer.calls(), 3);
}

/// S4: a request that times out disconnects the slow peer, emits a request
/// error, and retries the same call on a different peer.
#[tokio::test]
async fn test_request_timeout_retries_elsewhere() {
    let producer = Arc::new(AutoProducer::default());
    let (group, connector) = producer_group(2, producer.clone());

    group.connect().unwrap();
    wait_for_peer_count(&group, 2).await;
    let mut events = group.subscribe();

    let script = connector.script.clone();
    script.timeout_once.store(true, Ordering::SeqCst);

    let wanted = [7u8; 32];
    let (blocks, served_by) = group
        .get_blocks(vec![wanted], RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].header.hash, wanted);

    let calls = script.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2, "one timeout, one retry");
    assert_ne!(calls[0], calls[1], "retry must pick a different peer");
    assert_eq!(served_by, calls[1]);

    next_matching(&mut events, |e| {
        matches!(e, GroupEvent::RequestError { .. })
    })
    .await;
    let event = next_matching(&mut events, |e| {
        matches!(e, GroupEvent::Disconnect { .. })
    })
    .await;
    if let GroupEvent::Disconnect { peer, error } = event {
        assert_eq!(peer, calls[0]);
        assert_eq!(error.unwrap().to_string(), "Request timed out");
    }
}

/// With the hard limit on, spontaneous inbound admissions evict the oldest
/// peer so the pool never exceeds target.
#[tokio::test]
async fn test_hard_limit_evicts_oldest() {
    let exchange = Arc::new(MockExchange::new(false));
    let connector = Arc::new(MockConnector::default());
    let producer = Arc::new(AutoProducer::default());
    let params = Params::new(0xfeedbeef)
        .with_new_peer_producer(producer)
        .with_exchange(exchange.clone());
    let opts = GroupOptions::default().with_num_peers(2).with_hard_limit(true);
    let group = PeerGroup::new(params, opts, connector.clone());

    group.connect().unwrap();
    wait_for_peer_count(&group, 2).await;
    let first_admitted = connector.created()[0].id();

    // webrtc is unavailable; accept must still succeed.
    group.accept(None).await.unwrap();
    assert!(group.snapshot().await.unwrap().accepting);
    assert_eq!(exchange.accepted_transports(), vec!["websocket".to_string()]);

    let mut events = group.subscribe();
    exchange.push_incoming(dead_transport());

    let event = next_matching(&mut events, |e| {
        matches!(e, GroupEvent::Disconnect { .. })
    })
    .await;
    if let GroupEvent::Disconnect { peer, error } = event {
        assert_eq!(peer, first_admitted);
        assert_eq!(error.unwrap().to_string(), "PeerGroup over limit");
    }
    assert_eq!(group.peer_count().await.unwrap(), 2);

    group.unaccept().await.unwrap();
    assert!(!group.snapshot().await.unwrap().accepting);
    assert!(exchange.accepted_transports().is_empty());
}

/// Close resolves once the pool drains, peers get the closing reason, and
/// the bus goes silent.
#[tokio::test]
async fn test_close_drains_and_silences() {
    let producer = Arc::new(AutoProducer::default());
    let (group, _connector) = producer_group(3, producer.clone());

    group.connect().unwrap();
    wait_for_peer_count(&group, 3).await;

    let mut events = group.subscribe();
    group.close().await.unwrap();

    let snapshot = group.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Closed);
    assert_eq!(snapshot.peer_count, 0);

    // The only events left are the drain's disconnects.
    let mut disconnects = 0;
    loop {
        match events.try_recv() {
            Ok(GroupEvent::Disconnect { error, .. }) => {
                disconnects += 1;
                assert_eq!(error.unwrap().to_string(), "PeerGroup closing");
            }
            Ok(other) => panic!("unexpected event after close: {other:?}"),
            Err(broadcast::error::TryRecvError::Empty) => break,
            Err(e) => panic!("bus error: {e}"),
        }
    }
    assert_eq!(disconnects, 3);

    sleep(Duration::from_millis(50)).await;
    assert!(matches!(
        events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

/// Operations that assert on the pool fail synchronously when it is empty.
#[tokio::test]
async fn test_empty_pool_assertions() {
    let (group, _connector) = producer_group(2, Arc::new(AutoProducer::default()));

    let err = group.send("ping", Bytes::new(), true).await.unwrap_err();
    assert_eq!(err.to_string(), "Not connected to any peers");

    // Without the assertion the broadcast is a no-op.
    assert_eq!(group.send("ping", Bytes::new(), false).await.unwrap(), 0);

    assert!(group.random_peer().await.is_err());
    let err = group
        .get_headers(vec![[0u8; 32]], RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Not connected to any peers");
}

/// Transactions deduplicate in the inventory pool and hash waiters wake when
/// their object arrives.
#[tokio::test]
async fn test_tx_inventory_and_waiters() {
    let producer = Arc::new(AutoProducer::default());
    let (group, connector) = producer_group(1, producer.clone());

    group.connect().unwrap();
    wait_for_peer_count(&group, 1).await;
    let peer = connector.created()[0].clone();

    let hash = [9u8; 32];
    let waiter = {
        let group = group.clone();
        tokio::spawn(async move { group.wait_for_tx(hash).await })
    };
    // Let the waiter register before the transaction arrives.
    sleep(Duration::from_millis(20)).await;

    let mut events = group.subscribe();
    let tx = Transaction {
        hash,
        raw: Bytes::from_static(b"raw"),
    };
    peer.emit_message(Message::Tx(tx.clone()));
    peer.emit_message(Message::Tx(tx.clone()));

    let woken = timeout(WAIT, waiter).await.unwrap().unwrap().unwrap();
    assert_eq!(woken.hash, hash);

    // Both observations surface on the bus, one entry in the pool.
    next_matching(&mut events, |e| matches!(e, GroupEvent::Tx { .. })).await;
    next_matching(&mut events, |e| matches!(e, GroupEvent::Tx { .. })).await;
    assert_eq!(group.snapshot().await.unwrap().tx_pool_size, 1);
}

/// Block waiters resolve off the content-addressed path.
#[tokio::test]
async fn test_block_waiter_and_stream() {
    let producer = Arc::new(AutoProducer::default());
    let (group, connector) = producer_group(1, producer.clone());

    group.connect().unwrap();
    wait_for_peer_count(&group, 1).await;
    let peer = connector.created()[0].clone();

    let hash = [3u8; 32];
    let waiter = {
        let group = group.clone();
        tokio::spawn(async move { group.wait_for_block(hash).await })
    };
    sleep(Duration::from_millis(20)).await;

    let mut blocks = group.block_stream();
    peer.emit_message(Message::Block(Block {
        header: BlockHeader {
            hash,
            prev_hash: [0u8; 32],
            height: 5,
            timestamp: 0,
        },
        txids: Vec::new(),
    }));

    let woken = timeout(WAIT, waiter).await.unwrap().unwrap().unwrap();
    assert_eq!(woken.header.hash, hash);

    let streamed = timeout(WAIT, blocks.recv()).await.unwrap().unwrap();
    assert_eq!(streamed.header.height, 5);
}

/// S6: with web mode on, the configured web seeds are opened first and the
/// main fill only starts once their admissions are in.
#[tokio::test]
async fn test_web_seed_bootstrap_gates_fill() {
    let exchange = Arc::new(MockExchange::new(true));
    exchange.set_web_peer_count(3);

    let connector = Arc::new(MockConnector::default());
    let params = Params::new(0xfeedbeef)
        .with_exchange(exchange.clone())
        .with_web_seeds(vec![
            WebSeed::Url("wss://seed-a.example.com:8192".to_string()),
            WebSeed::Url("seed-b.example.com".to_string()),
            WebSeed::Record {
                transport: "websocket".to_string(),
                address: "seed-c.example.com".to_string(),
                port: None,
            },
        ]);
    let opts = GroupOptions::default().with_num_peers(8).with_connect_web(true);
    let group = PeerGroup::new(params, opts, connector.clone());

    group.connect().unwrap();
    wait_for_peer_count(&group, 8).await;

    assert_eq!(exchange.connect_calls.load(Ordering::SeqCst), 3);
    // A fill before the three bootstrap admissions would have issued eight
    // attempts; gating leaves exactly the deficit.
    assert_eq!(exchange.get_new_peer_calls.load(Ordering::SeqCst), 5);
}

// ---- bridge ----------------------------------------------------------------

/// S5: an inbound client is paired with a fresh outbound transport, bytes
/// relay both ways, and closing one side reaches the other exactly once.
#[tokio::test]
async fn test_bridge_splices_inbound_to_outbound() {
    let (mut client_test, client_bridge) = tokio::io::duplex(1024);
    let (out_bridge, mut out_test) = tokio::io::duplex(1024);

    let exchange = Arc::new(MockExchange::new(false));
    let producer = Arc::new(QueueProducer::new(vec![Ok(
        Box::new(out_bridge) as Transport
    )]));
    let params = Params::new(0xfeedbeef)
        .with_exchange(exchange.clone())
        .with_new_peer_producer(producer);
    let bridge = Bridge::new(params, GroupOptions::default());

    // Outbound dialing is not a bridge operation.
    let err = bridge.connect().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Do not use connect() with Bridge, only incoming connections are allowed"
    );

    let mut events = bridge.subscribe();
    bridge.accept(None).await.unwrap();
    exchange.push_incoming(Box::new(client_bridge));

    next_matching(&mut events, |e| matches!(e, BridgeEvent::Connection { .. })).await;
    let event = next_matching(&mut events, |e| matches!(e, BridgeEvent::Bridge { .. })).await;
    if let BridgeEvent::Bridge { client, peer } = event {
        assert_ne!(client, peer);
    }

    client_test.write_all(b"hello").await.unwrap();
    let mut buf = [0u8; 5];
    timeout(WAIT, out_test.read_exact(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf, b"hello");

    out_test.write_all(b"world").await.unwrap();
    timeout(WAIT, client_test.read_exact(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf, b"world");

    // Closing the client reaches the outbound side as EOF.
    drop(client_test);
    let n = timeout(WAIT, out_test.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(n, 0);

    bridge.close().await.unwrap();
}

/// A failed outbound attempt is retried for the same waiting client.
#[tokio::test]
async fn test_bridge_retries_outbound() {
    let (_client_test, client_bridge) = tokio::io::duplex(64);
    let (out_bridge, _out_test) = tokio::io::duplex(64);

    let exchange = Arc::new(MockExchange::new(false));
    let producer = Arc::new(QueueProducer::new(vec![
        Err(GroupError::ConnectTimeout),
        Ok(Box::new(out_bridge) as Transport),
    ]));
    let params = Params::new(0xfeedbeef)
        .with_exchange(exchange.clone())
        .with_new_peer_producer(producer);
    let bridge = Bridge::new(params, GroupOptions::default());

    let mut events = bridge.subscribe();
    bridge.accept(None).await.unwrap();
    exchange.push_incoming(Box::new(client_bridge));

    let event = next_matching(&mut events, |e| {
        matches!(e, BridgeEvent::ConnectError { .. })
    })
    .await;
    if let BridgeEvent::ConnectError { error } = event {
        assert_eq!(error.to_string(), "Connection timed out");
    }
    next_matching(&mut events, |e| matches!(e, BridgeEvent::Bridge { .. })).await;

    let snapshot = bridge.snapshot().await.unwrap();
    assert_eq!(snapshot.spliced, 1);
    assert_eq!(snapshot.pairing, 0);
}

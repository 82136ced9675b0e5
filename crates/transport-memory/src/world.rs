//! Channel-backed endpoints sharing one in-process world.

use crate::TrafficAnalyzer;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use meso_transport::{Completion, Token, Transport, TransportError};
use meso_types::{Pid, Tag};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// How often a blocked wait re-checks peer liveness.
const LIVENESS_POLL: Duration = Duration::from_millis(20);

/// Configuration for the in-memory world.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Interval between "still waiting" warnings while a receive is blocked.
    pub stall_warning: Duration,
    /// Abort a blocked receive with [`TransportError::Timeout`] after this long.
    ///
    /// `None` waits indefinitely (only warnings are logged).
    pub wait_deadline: Option<Duration>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            stall_warning: Duration::from_secs(5),
            wait_deadline: None,
        }
    }
}

impl MemoryConfig {
    /// Builder: set the stall warning interval.
    pub fn with_stall_warning(mut self, interval: Duration) -> Self {
        self.stall_warning = interval;
        self
    }

    /// Builder: set a wait deadline.
    pub fn with_wait_deadline(mut self, deadline: Duration) -> Self {
        self.wait_deadline = Some(deadline);
        self
    }
}

struct Envelope {
    from: Pid,
    tag: Tag,
    frame: Vec<u8>,
}

struct Shared {
    senders: Vec<Sender<Envelope>>,
    alive: Vec<AtomicBool>,
    traffic: Arc<TrafficAnalyzer>,
}

/// A set of connected endpoints, one per rank.
pub struct MemoryWorld {
    endpoints: Vec<MemoryTransport>,
    traffic: Arc<TrafficAnalyzer>,
}

impl MemoryWorld {
    /// Create a world of `size` connected endpoints.
    pub fn connect(size: usize, config: MemoryConfig) -> Self {
        let traffic = Arc::new(TrafficAnalyzer::new());
        let (senders, inboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| channel::unbounded()).unzip();
        let shared = Arc::new(Shared {
            senders,
            alive: (0..size).map(|_| AtomicBool::new(true)).collect(),
            traffic: Arc::clone(&traffic),
        });

        let endpoints = inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| MemoryTransport {
                rank: Pid(rank as u32),
                shared: Arc::clone(&shared),
                inbox,
                state: Mutex::new(EndpointState::default()),
                config: config.clone(),
            })
            .collect();

        Self { endpoints, traffic }
    }

    /// Number of endpoints.
    pub fn size(&self) -> usize {
        self.endpoints.len()
    }

    /// Shared traffic analyzer.
    pub fn traffic(&self) -> Arc<TrafficAnalyzer> {
        Arc::clone(&self.traffic)
    }

    /// Take the endpoints, ordered by rank.
    pub fn into_endpoints(self) -> Vec<MemoryTransport> {
        self.endpoints
    }
}

enum Pending {
    Send,
    Receive { from: Pid, tag: Tag },
}

/// Matching state of one endpoint.
///
/// For any (sender, tag) key at most one of `unmatched` and `posted` is
/// non-empty: a frame either finds a waiting receive or queues.
#[derive(Default)]
struct EndpointState {
    next_token: u64,
    pending: HashMap<Token, Pending>,
    unmatched: HashMap<(Pid, Tag), VecDeque<Vec<u8>>>,
    posted: HashMap<(Pid, Tag), VecDeque<Token>>,
    delivered: HashMap<Token, Vec<u8>>,
}

impl EndpointState {
    fn mint(&mut self, pending: Pending) -> Token {
        let token = Token::new(self.next_token);
        self.next_token += 1;
        self.pending.insert(token, pending);
        token
    }

    fn accept(&mut self, envelope: Envelope) {
        let key = (envelope.from, envelope.tag);
        if let Some(queue) = self.posted.get_mut(&key) {
            if let Some(token) = queue.pop_front() {
                if queue.is_empty() {
                    self.posted.remove(&key);
                }
                self.delivered.insert(token, envelope.frame);
                return;
            }
        }
        self.unmatched
            .entry(key)
            .or_default()
            .push_back(envelope.frame);
    }

    fn post(&mut self, from: Pid, tag: Tag) -> Token {
        let token = self.mint(Pending::Receive { from, tag });
        let key = (from, tag);
        let queued = self.unmatched.get_mut(&key).and_then(VecDeque::pop_front);
        match queued {
            Some(frame) => {
                if self.unmatched.get(&key).is_some_and(VecDeque::is_empty) {
                    self.unmatched.remove(&key);
                }
                self.delivered.insert(token, frame);
            }
            None => self.posted.entry(key).or_default().push_back(token),
        }
        token
    }

    fn abandon(&mut self, token: Token, from: Pid, tag: Tag) {
        if let Some(queue) = self.posted.get_mut(&(from, tag)) {
            queue.retain(|t| *t != token);
        }
    }
}

/// One rank's endpoint in a [`MemoryWorld`].
pub struct MemoryTransport {
    rank: Pid,
    shared: Arc<Shared>,
    inbox: Receiver<Envelope>,
    state: Mutex<EndpointState>,
    config: MemoryConfig,
}

impl MemoryTransport {
    fn drain_inbox(&self, state: &mut EndpointState) {
        while let Ok(envelope) = self.inbox.try_recv() {
            state.accept(envelope);
        }
    }

    fn peer_alive(&self, pid: Pid) -> bool {
        self.shared.alive[pid.index()].load(Ordering::Acquire)
    }

    fn await_frame(&self, token: Token, from: Pid, tag: Tag) -> Result<Vec<u8>, TransportError> {
        let started = Instant::now();
        let mut last_warning = started;

        loop {
            {
                // Sample liveness before draining: a departed peer's frames
                // are all in the inbox by the time the flag drops.
                let peer_gone = !self.peer_alive(from);
                let mut state = self.state.lock();
                self.drain_inbox(&mut state);
                if let Some(frame) = state.delivered.remove(&token) {
                    return Ok(frame);
                }
                if peer_gone {
                    state.abandon(token, from, tag);
                    return Err(TransportError::PeerDisconnected(from));
                }
            }

            let waited = started.elapsed();
            if let Some(deadline) = self.config.wait_deadline {
                if waited >= deadline {
                    self.state.lock().abandon(token, from, tag);
                    warn!(
                        rank = self.rank.0,
                        from = from.0,
                        tag = tag.0,
                        waited_ms = waited.as_millis() as u64,
                        "Receive deadline exceeded"
                    );
                    return Err(TransportError::Timeout { from, tag, waited });
                }
            }
            if last_warning.elapsed() >= self.config.stall_warning {
                warn!(
                    rank = self.rank.0,
                    from = from.0,
                    tag = tag.0,
                    waited_ms = waited.as_millis() as u64,
                    "Receive still waiting"
                );
                last_warning = Instant::now();
            }

            match self.inbox.recv_timeout(LIVENESS_POLL) {
                Ok(envelope) => self.state.lock().accept(envelope),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TransportError::PeerDisconnected(from));
                }
            }
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.shared.alive[self.rank.index()].store(false, Ordering::Release);
    }
}

impl Transport for MemoryTransport {
    fn rank(&self) -> Pid {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.shared.senders.len()
    }

    fn send(&self, to: Pid, tag: Tag, frame: Vec<u8>) -> Result<(), TransportError> {
        self.check_rank(to)?;
        let len = frame.len();
        self.shared.senders[to.index()]
            .send(Envelope {
                from: self.rank,
                tag,
                frame,
            })
            .map_err(|_| TransportError::PeerDisconnected(to))?;
        self.shared.traffic.record(self.rank, to, tag, len);
        trace!(rank = self.rank.0, to = to.0, tag = tag.0, bytes = len, "Frame sent");
        Ok(())
    }

    fn recv(&self, from: Pid, tag: Tag) -> Result<Vec<u8>, TransportError> {
        let token = self.irecv(from, tag)?;
        match self.wait(token)? {
            Completion::Received(frame) => Ok(frame),
            Completion::Sent => Err(TransportError::UnknownToken(token)),
        }
    }

    fn isend(&self, to: Pid, tag: Tag, frame: Vec<u8>) -> Result<Token, TransportError> {
        // Channels are unbounded, so the send completes immediately.
        self.send(to, tag, frame)?;
        Ok(self.state.lock().mint(Pending::Send))
    }

    fn irecv(&self, from: Pid, tag: Tag) -> Result<Token, TransportError> {
        self.check_rank(from)?;
        let mut state = self.state.lock();
        self.drain_inbox(&mut state);
        Ok(state.post(from, tag))
    }

    fn wait(&self, token: Token) -> Result<Completion, TransportError> {
        let pending = self
            .state
            .lock()
            .pending
            .remove(&token)
            .ok_or(TransportError::UnknownToken(token))?;
        match pending {
            Pending::Send => Ok(Completion::Sent),
            Pending::Receive { from, tag } => self
                .await_frame(token, from, tag)
                .map(Completion::Received),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn pair() -> (MemoryTransport, MemoryTransport) {
        let mut endpoints = MemoryWorld::connect(2, MemoryConfig::default()).into_endpoints();
        let b = endpoints.pop().unwrap();
        let a = endpoints.pop().unwrap();
        (a, b)
    }

    #[test]
    fn test_fifo_per_tag() {
        let (a, b) = pair();
        for i in 0..5u8 {
            a.send(Pid(1), Tag(7), vec![i]).unwrap();
        }
        for i in 0..5u8 {
            assert_eq!(b.recv(Pid(0), Tag(7)).unwrap(), vec![i]);
        }
    }

    #[test]
    fn test_tags_do_not_interfere() {
        let (a, b) = pair();
        a.send(Pid(1), Tag(1), vec![1]).unwrap();
        a.send(Pid(1), Tag(2), vec![2]).unwrap();
        assert_eq!(b.recv(Pid(0), Tag(2)).unwrap(), vec![2]);
        assert_eq!(b.recv(Pid(0), Tag(1)).unwrap(), vec![1]);
    }

    #[test]
    fn test_posted_receives_match_in_posting_order() {
        let (a, b) = pair();
        let first = b.irecv(Pid(0), Tag(3)).unwrap();
        let second = b.irecv(Pid(0), Tag(3)).unwrap();
        a.isend(Pid(1), Tag(3), vec![10]).unwrap();
        a.isend(Pid(1), Tag(3), vec![20]).unwrap();
        // Waiting out of order still yields posting-order matches
        assert_eq!(b.wait(second).unwrap(), Completion::Received(vec![20]));
        assert_eq!(b.wait(first).unwrap(), Completion::Received(vec![10]));
    }

    #[test]
    fn test_send_token_completes() {
        let (a, _b) = pair();
        let token = a.isend(Pid(1), Tag(0), vec![]).unwrap();
        assert_eq!(a.wait(token).unwrap(), Completion::Sent);
        assert_eq!(a.wait(token), Err(TransportError::UnknownToken(token)));
    }

    #[test]
    fn test_unknown_rank_rejected() {
        let (a, _b) = pair();
        assert!(matches!(
            a.send(Pid(2), Tag(0), vec![]),
            Err(TransportError::UnknownRank { world_size: 2, .. })
        ));
        assert!(a.irecv(Pid(9), Tag(0)).is_err());
    }

    #[traced_test]
    #[test]
    fn test_deadline_times_out() {
        let config = MemoryConfig::default()
            .with_stall_warning(Duration::from_millis(10))
            .with_wait_deadline(Duration::from_millis(60));
        let endpoints = MemoryWorld::connect(2, config).into_endpoints();
        let err = endpoints[0].recv(Pid(1), Tag(4)).unwrap_err();
        assert!(matches!(err, TransportError::Timeout { tag: Tag(4), .. }));
        assert!(logs_contain("Receive still waiting"));
    }

    #[test]
    fn test_departed_peer_disconnects_waiters() {
        let (a, b) = pair();
        a.send(Pid(1), Tag(5), vec![1]).unwrap();
        drop(a);
        // Frames sent before departure still arrive
        assert_eq!(b.recv(Pid(0), Tag(5)).unwrap(), vec![1]);
        assert_eq!(
            b.recv(Pid(0), Tag(5)),
            Err(TransportError::PeerDisconnected(Pid(0)))
        );
    }

    #[test]
    fn test_cross_thread_exchange() {
        let (a, b) = pair();
        std::thread::scope(|s| {
            s.spawn(move || {
                let token = a.irecv(Pid(1), Tag(9)).unwrap();
                a.send(Pid(1), Tag(8), vec![1, 2, 3]).unwrap();
                assert_eq!(a.wait(token).unwrap(), Completion::Received(vec![3, 2, 1]));
            });
            s.spawn(move || {
                let mut frame = b.recv(Pid(0), Tag(8)).unwrap();
                frame.reverse();
                b.send(Pid(0), Tag(9), frame).unwrap();
            });
        });
    }

    #[test]
    fn test_traffic_recorded() {
        let world = MemoryWorld::connect(2, MemoryConfig::default());
        let traffic = world.traffic();
        let endpoints = world.into_endpoints();
        endpoints[0].send(Pid(1), Tag(33), vec![0; 100]).unwrap();
        endpoints[1].send(Pid(0), Tag(33), vec![0; 50]).unwrap();
        let (messages, bytes) = traffic.totals();
        assert_eq!((messages, bytes), (2, 150));
    }
}

mod common;

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use binrpc_service::{Server, ServerConfig, ServerError};
use binrpc_transport::{AcceptWaker, Connection, Listener, TransportError};

use common::server_table;

enum Step {
    /// Fail with an error the loop should retry.
    Transient,
    /// Fail with an error the loop should not retry.
    Fatal,
    /// Hand out a connection whose peer hangs up immediately.
    Accept,
    /// Sleep briefly, then fail transiently. Repeats forever.
    Idle,
}

struct HangUpConn {
    closed: Arc<AtomicBool>,
}

impl Connection for HangUpConn {
    fn write_all(&mut self, _buf: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::Closed)
    }

    fn read_full(&mut self, _buf: &mut [u8]) -> Result<(), TransportError> {
        Err(TransportError::Eof)
    }

    fn set_deadline(&mut self, _deadline: Option<Instant>) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_alive(&mut self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

struct ScriptedListener {
    steps: Mutex<VecDeque<Step>>,
    accepts: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl ScriptedListener {
    fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            accepts: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Listener for ScriptedListener {
    type Conn = HangUpConn;

    fn accept(&self) -> Result<(HangUpConn, String), TransportError> {
        self.accepts.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut steps = self.steps.lock().expect("steps lock should not be poisoned");
            match steps.front() {
                Some(Step::Idle) => Step::Idle,
                _ => steps.pop_front().unwrap_or(Step::Fatal),
            }
        };
        match step {
            Step::Transient => Err(TransportError::Accept(io::Error::from(
                io::ErrorKind::ConnectionAborted,
            ))),
            Step::Fatal => Err(TransportError::Accept(io::Error::from(
                io::ErrorKind::InvalidInput,
            ))),
            Step::Accept => Ok((
                HangUpConn {
                    closed: Arc::clone(&self.closed),
                },
                "scripted-peer".to_string(),
            )),
            Step::Idle => {
                thread::sleep(Duration::from_millis(5));
                Err(TransportError::Accept(io::Error::from(
                    io::ErrorKind::Interrupted,
                )))
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

fn fast_backoff(max_retry: u32) -> ServerConfig {
    ServerConfig {
        accept_delay: Duration::from_micros(1),
        accept_max_delay: Duration::from_micros(50),
        accept_max_retry: max_retry,
        ..ServerConfig::default()
    }
}

fn serve<L: Listener>(config: ServerConfig, listener: L) -> binrpc_service::ServerHandle {
    Server::new(config, server_table())
        .expect("server config should be valid")
        .serve(listener)
        .expect("accept thread should start")
}

#[test]
fn transient_errors_exhaust_retries() {
    let listener = ScriptedListener::new((0..10).map(|_| Step::Transient));
    let accepts = Arc::clone(&listener.accepts);

    let err = serve(fast_backoff(5), listener)
        .join()
        .expect_err("accept loop should give up");
    match err {
        ServerError::AcceptRetriesExhausted { retries, source } => {
            assert_eq!(retries, 5);
            assert!(source.is_transient());
        }
        other => panic!("expected AcceptRetriesExhausted, got {other:?}"),
    }
    assert_eq!(accepts.load(Ordering::SeqCst), 6);
}

#[test]
fn fatal_error_stops_immediately() {
    let listener = ScriptedListener::new([Step::Fatal]);
    let accepts = Arc::clone(&listener.accepts);

    let err = serve(fast_backoff(5), listener)
        .join()
        .expect_err("accept loop should stop");
    assert!(matches!(err, ServerError::Accept(_)), "got {err:?}");
    assert_eq!(accepts.load(Ordering::SeqCst), 1);
}

#[test]
fn accepted_connection_resets_backoff() {
    let steps = [
        Step::Transient,
        Step::Transient,
        Step::Transient,
        Step::Accept,
        Step::Transient,
        Step::Transient,
        Step::Transient,
        Step::Fatal,
    ];
    let listener = ScriptedListener::new(steps);
    let closed = Arc::clone(&listener.closed);

    // Six transient errors in total, but never more than three in a row.
    let err = serve(fast_backoff(4), listener)
        .join()
        .expect_err("accept loop should stop on the fatal error");
    assert!(matches!(err, ServerError::Accept(_)), "got {err:?}");

    let deadline = Instant::now() + Duration::from_secs(2);
    while !closed.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(
        closed.load(Ordering::SeqCst),
        "served connection should be closed after the peer hangs up"
    );
}

#[test]
fn shutdown_stops_a_retrying_loop() {
    let listener = ScriptedListener::new([Step::Idle]);
    let handle = serve(fast_backoff(u32::MAX), listener);
    thread::sleep(Duration::from_millis(20));
    assert!(!handle.is_finished());

    handle.stop().expect("stopped loop should report success");
}

/// Blocks in `accept` until its waker fires.
struct BlockingListener {
    wake_rx: Mutex<Receiver<()>>,
    wake_tx: Mutex<Sender<()>>,
}

impl BlockingListener {
    fn new() -> Self {
        let (wake_tx, wake_rx) = mpsc::channel();
        Self {
            wake_rx: Mutex::new(wake_rx),
            wake_tx: Mutex::new(wake_tx),
        }
    }
}

impl Listener for BlockingListener {
    type Conn = HangUpConn;

    fn accept(&self) -> Result<(HangUpConn, String), TransportError> {
        let rx = self.wake_rx.lock().expect("wake lock should not be poisoned");
        let _ = rx.recv();
        Err(TransportError::Accept(io::Error::from(
            io::ErrorKind::Interrupted,
        )))
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn waker(&self) -> Option<AcceptWaker> {
        let tx = Mutex::new(
            self.wake_tx
                .lock()
                .expect("wake lock should not be poisoned")
                .clone(),
        );
        Some(Box::new(move || {
            let _ = tx.lock().expect("wake lock should not be poisoned").send(());
        }))
    }
}

#[test]
fn shutdown_wakes_a_blocked_custom_listener() {
    let handle = serve(fast_backoff(5), BlockingListener::new());
    thread::sleep(Duration::from_millis(20));
    assert!(!handle.is_finished());

    let started = Instant::now();
    handle.stop().expect("woken loop should report success");
    assert!(started.elapsed() < Duration::from_secs(2));
}

// tests/proxy_gate.rs

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use buildwatch::proxy::{ProxyGate, serve};
use buildwatch_test_utils::{init_tracing, with_timeout};

#[test]
fn pauses_nest_until_every_pause_is_resumed() {
    let gate = ProxyGate::new();
    gate.pause();
    gate.pause();
    assert_eq!(gate.depth(), 2);

    gate.resume();
    assert!(gate.is_paused());
    gate.resume();
    assert!(!gate.is_paused());
}

#[test]
fn resume_without_pause_is_a_no_op() {
    let gate = ProxyGate::new();
    gate.resume();
    assert_eq!(gate.depth(), 0);
    gate.pause();
    assert!(gate.is_paused());
}

#[test]
fn guard_resumes_on_drop() {
    let gate = ProxyGate::new();
    {
        let _outer = gate.hold();
        let _inner = gate.hold();
        assert_eq!(gate.depth(), 2);
    }
    assert!(!gate.is_paused());
}

#[tokio::test]
async fn open_gate_admits_immediately() {
    let gate = ProxyGate::new();
    with_timeout(gate.admit()).await;
    assert_eq!(gate.held(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn held_requests_are_released_in_arrival_order() {
    let gate = ProxyGate::new();
    gate.pause();
    gate.pause();

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for id in 0..3 {
        let gate = gate.clone();
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            gate.admit().await;
            order.lock().unwrap().push(id);
        }));
        // Let each request reach the queue before the next one.
        tokio::task::yield_now().await;
    }
    assert_eq!(gate.held(), 3);

    gate.resume();
    tokio::task::yield_now().await;
    assert!(order.lock().unwrap().is_empty(), "still paused once");

    gate.resume();
    for handle in handles {
        with_timeout(handle).await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn shutdown_releases_everything_and_ignores_later_pauses() {
    let gate = ProxyGate::new();
    gate.pause();
    let waiter = {
        let gate = gate.clone();
        tokio::spawn(async move { gate.admit().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    gate.shutdown();
    with_timeout(waiter).await.unwrap();

    gate.pause();
    assert!(!gate.is_paused());
    with_timeout(gate.admit()).await;
}

async fn echo_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                while let Ok(n) = stream.read(&mut buf).await {
                    if n == 0 || stream.write_all(&buf[..n]).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    addr
}

#[tokio::test]
async fn proxy_holds_connections_while_paused() {
    init_tracing();
    let upstream = echo_upstream().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();

    let gate = ProxyGate::new();
    let (stop_tx, stop_rx) = watch::channel(false);
    let server = tokio::spawn(serve(listener, upstream, gate.clone(), stop_rx));

    let guard = gate.hold();
    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    client.write_all(b"ping").await.unwrap();

    let mut buf = [0u8; 4];
    let early = tokio::time::timeout(Duration::from_millis(100), client.read_exact(&mut buf)).await;
    assert!(early.is_err(), "request must wait while the proxy is paused");
    assert_eq!(gate.held(), 1);

    drop(guard);
    with_timeout(client.read_exact(&mut buf)).await.unwrap();
    assert_eq!(&buf, b"ping");

    stop_tx.send(true).unwrap();
    with_timeout(server).await.unwrap().unwrap();
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn echo_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                while let Ok(n) = stream.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                    if stream.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    port
}

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn round_trip(public_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(("127.0.0.1", public_port)).await.unwrap();
    stream.write_all(payload).await.unwrap();
    let mut buf = vec![0u8; payload.len()];
    stream.read_exact(&mut buf).await.unwrap();
    buf
}

#[tokio::test]
async fn rejects_connection_when_no_workers_registered() {
    let public_port = free_port().await;
    let proxy = ProxyCluster::start(public_port).await.unwrap();

    let mut stream = TcpStream::connect(("127.0.0.1", public_port)).await.unwrap();
    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(n, 0, "connection should be closed with no data");

    proxy.stop();
}

#[tokio::test]
async fn round_robins_across_registered_workers() {
    let upstream_a = echo_server().await;
    let upstream_b = echo_server().await;
    let public_port = free_port().await;
    let proxy = ProxyCluster::start(public_port).await.unwrap();
    proxy.add_worker(0, upstream_a);
    proxy.add_worker(1, upstream_b);
    assert_eq!(proxy.worker_count(), 2);

    for _ in 0..4 {
        let echoed = round_trip(public_port, b"hello").await;
        assert_eq!(echoed, b"hello");
    }

    proxy.stop();
}

#[tokio::test]
async fn removed_worker_is_skipped() {
    let upstream_a = echo_server().await;
    let public_port = free_port().await;
    let proxy = ProxyCluster::start(public_port).await.unwrap();
    proxy.add_worker(0, upstream_a);
    proxy.add_worker(1, 1); // bogus port, should never be chosen once removed
    proxy.remove_worker(1);
    assert_eq!(proxy.worker_count(), 1);

    let echoed = round_trip(public_port, b"ok").await;
    assert_eq!(echoed, b"ok");

    proxy.stop();
}

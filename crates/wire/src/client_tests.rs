// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::frame::write_frame;
use serde_json::json;
use tokio::net::UnixListener;

fn temp_sock(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("fleetwatch-wire-test-{}-{}", std::process::id(), name))
}

#[tokio::test]
async fn connect_fails_cleanly_when_nothing_is_listening() {
    let client = ControlClient::new(temp_sock("no-daemon"));
    let err = client.send("ping", json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::Connect { .. }));
}

#[tokio::test]
async fn round_trip_returns_response_data() {
    let path = temp_sock("roundtrip");
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut reader = FrameReader::new(&mut stream);
        let raw = reader.next_object().await.unwrap().unwrap();
        let req: Request = serde_json::from_value(raw).unwrap();
        let resp = Response::ok(req.id, json!({"pong": true}));
        write_frame(&mut stream, &resp).await.unwrap();
    });

    let client = ControlClient::new(&path);
    let data = client.send("ping", json!({})).await.unwrap();
    assert_eq!(data, json!({"pong": true}));
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn rejected_response_surfaces_daemon_error_message() {
    let path = temp_sock("rejected");
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut reader = FrameReader::new(&mut stream);
        let raw = reader.next_object().await.unwrap().unwrap();
        let req: Request = serde_json::from_value(raw).unwrap();
        let resp = Response::err(req.id, "app not found");
        write_frame(&mut stream, &resp).await.unwrap();
    });

    let client = ControlClient::new(&path);
    let err = client.send("status", json!({"name": "ghost"})).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(msg) if msg == "app not found"));
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn send_times_out_when_daemon_never_responds() {
    let path = temp_sock("timeout");
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).unwrap();

    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let client = ControlClient::new(&path).with_timeout(Duration::from_millis(50));
    let err = client.send("ping", json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)));
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn send_stream_collects_chunks_until_done() {
    let path = temp_sock("stream");
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut reader = FrameReader::new(&mut stream);
        let raw = reader.next_object().await.unwrap().unwrap();
        let req: Request = serde_json::from_value(raw).unwrap();
        write_frame(&mut stream, &StreamChunk::chunk(req.id.clone(), json!("line 1"))).await.unwrap();
        write_frame(&mut stream, &StreamChunk::chunk(req.id.clone(), json!("line 2"))).await.unwrap();
        write_frame(&mut stream, &StreamChunk::end(req.id)).await.unwrap();
    });

    let client = ControlClient::new(&path);
    let mut collected = Vec::new();
    client.send_stream("logs", json!({"name": "web"}), |chunk| collected.push(chunk)).await.unwrap();
    assert_eq!(collected, vec![json!("line 1"), json!("line 2")]);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn request_for_round_trips_every_command_variant() {
    let commands = [
        Command::List,
        Command::Status { name: "web".into() },
        Command::Start { name: "web".into() },
        Command::Stop { name: "all".into() },
        Command::Restart { name: "web".into() },
        Command::Reload { name: "all".into() },
        Command::Delete { name: "web".into() },
        Command::Metrics,
        Command::Logs { name: "web".into(), lines: Some(10) },
        Command::Ping,
        Command::Dump,
        Command::KillDaemon,
    ];
    for command in commands {
        let req = request_for(&command);
        let back = Command::try_from(&req).unwrap();
        assert_eq!(back, command);
    }
}

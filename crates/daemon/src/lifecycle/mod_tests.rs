// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn shutdown_removes_socket_and_lock_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        state_dir: dir.path().join("state"),
        runtime_dir: dir.path().join("run"),
        socket_path: dir.path().join("run").join("fleetwatch.sock"),
        lock_path: dir.path().join("state").join("daemon.pid"),
    };

    let result = startup(&config).await.unwrap();
    assert!(config.socket_path.exists());

    result.daemon.shutdown().await;

    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
}

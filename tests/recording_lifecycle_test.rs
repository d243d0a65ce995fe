mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{board, board_with};
use soundboard::application::service_container::test_helpers::MockAudioDevice;
use soundboard::application::{RecordingState, ToggleOutcome};
use soundboard::domain::AudioHandle;
use soundboard::{SoundboardError, SoundboardEvent};
use tokio::sync::Notify;
use tokio::time::timeout;

/// 録音状態が条件を満たすまで待つ
async fn wait_recording(
    board: &common::TestBoard,
    pred: impl FnMut(&RecordingState) -> bool,
) -> RecordingState {
    let mut rx = board.controller.watch_recording();
    let state = *rx.wait_for(pred).await.unwrap();
    state
}

#[tokio::test]
async fn test_concurrent_start_only_one_wins() {
    let gate = Arc::new(Notify::new());
    let board = board_with(4, MockAudioDevice::new().with_capture_gate(gate.clone()));

    let controller = board.controller.clone();
    let first = tokio::spawn(async move { controller.on_record_toggle().await });
    let requesting = wait_recording(&board, |s| !s.is_idle()).await;
    assert_eq!(requesting, RecordingState::Requesting { slot: 0, session_id: 1 });

    // デバイス準備中の 2 つ目の開始要求は拒否される
    assert_eq!(
        board.controller.on_record_toggle().await,
        Err(SoundboardError::RecordingInProgress)
    );

    gate.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome, ToggleOutcome::Started { slot: 0, session_id: 1 });
    assert_eq!(
        board.controller.recording_state(),
        RecordingState::Active { slot: 0, session_id: 1 }
    );
    assert_eq!(board.device.open_captures(), 1);
}

#[tokio::test]
async fn test_permission_denied_then_retry() {
    let mut board = board(4);
    board.device.script(|s| s.deny_permission = true);

    assert_eq!(
        board.controller.on_record_toggle().await,
        Err(SoundboardError::PermissionDenied)
    );
    assert_eq!(board.controller.recording_state(), RecordingState::Idle);
    assert_eq!(board.device.open_captures(), 0);

    board.device.script(|s| s.deny_permission = false);
    let outcome = board.controller.on_record_toggle().await.unwrap();
    // 失敗したセッションも ID を消費する
    assert_eq!(outcome, ToggleOutcome::Started { slot: 0, session_id: 2 });
    assert_eq!(board.device.permission_requests(), 2);

    let events = board.drain_events();
    assert_eq!(
        events,
        vec![
            SoundboardEvent::Error(SoundboardError::PermissionDenied),
            SoundboardEvent::RecordingStarted { slot: 0, session_id: 2 },
        ]
    );
}

#[tokio::test]
async fn test_begin_capture_failure_returns_to_idle() {
    let board = board(4);
    board.device.script(|s| s.fail_begin_capture = true);

    let result = board.controller.on_record_toggle().await;
    assert!(matches!(result, Err(SoundboardError::RecordingFailed(_))));
    assert_eq!(board.controller.recording_state(), RecordingState::Idle);
    assert_eq!(board.controller.snapshot().unwrap().recording, None);
}

#[tokio::test]
async fn test_capture_failure_on_stop_leaves_slot_empty() {
    let board = board(4);
    board.controller.on_record_toggle().await.unwrap();
    board.device.script(|s| s.fail_end_capture = true);

    let result = board.controller.on_record_toggle().await;
    assert!(matches!(result, Err(SoundboardError::RecordingFailed(_))));
    assert_eq!(board.controller.recording_state(), RecordingState::Idle);
    assert_eq!(board.recorded(), vec![false; 4]);
    assert_eq!(board.device.open_captures(), 0);

    // 次の録音は同じスロットから
    board.device.script(|s| s.fail_end_capture = false);
    let outcome = board.controller.on_record_toggle().await.unwrap();
    assert!(matches!(outcome, ToggleOutcome::Started { slot: 0, .. }));
}

#[tokio::test]
async fn test_shutdown_while_active_releases_capture() {
    let board = board(4);
    board.controller.on_record_toggle().await.unwrap();

    board.controller.shutdown().await.unwrap();

    assert_eq!(board.controller.recording_state(), RecordingState::Idle);
    assert_eq!(board.device.open_captures(), 0);
    assert_eq!(board.device.released(), vec![AudioHandle::new("h1")]);
    assert_eq!(board.recorded(), vec![false; 4]);

    // 終了後の録音要求は拒否
    assert_eq!(
        board.controller.on_record_toggle().await,
        Err(SoundboardError::ShutDown)
    );
}

#[tokio::test]
async fn test_shutdown_waits_for_pending_stop() {
    let gate = Arc::new(Notify::new());
    let board = board_with(4, MockAudioDevice::new().with_flush_gate(gate.clone()));
    board.controller.on_record_toggle().await.unwrap();

    let controller = board.controller.clone();
    let stop = tokio::spawn(async move { controller.on_record_toggle().await });
    wait_recording(&board, |s| matches!(s, RecordingState::Stopping { .. })).await;

    let controller = board.controller.clone();
    let shutdown = tokio::spawn(async move { controller.shutdown().await });
    tokio::task::yield_now().await;
    assert!(!shutdown.is_finished());

    gate.notify_one();
    // 終了中に確定しようとした録音は破棄される
    assert_eq!(stop.await.unwrap(), Err(SoundboardError::ShutDown));
    shutdown.await.unwrap().unwrap();

    assert_eq!(board.recorded(), vec![false; 4]);
    assert_eq!(board.device.released(), vec![AudioHandle::new("h1")]);
}

#[tokio::test]
async fn test_long_press_proceeds_while_capture_pending() {
    let gate = Arc::new(Notify::new());
    let board = board_with(4, MockAudioDevice::new().with_capture_gate(gate.clone()));

    // 1 本目はゲートを素通しさせて slot 0 を埋める
    gate.notify_one();
    board.controller.on_record_toggle().await.unwrap();
    board.controller.on_record_toggle().await.unwrap();

    let controller = board.controller.clone();
    let pending = tokio::spawn(async move { controller.on_record_toggle().await });
    let requesting = wait_recording(&board, |s| !s.is_idle()).await;
    assert_eq!(requesting.target(), Some(1));

    // 録音デバイス待ちの間も別スロットのクリアは処理される
    assert!(board.controller.on_slot_long_press(0).await.unwrap());
    assert_eq!(board.recorded(), vec![false; 4]);
    assert!(!pending.is_finished());

    gate.notify_one();
    let outcome = pending.await.unwrap().unwrap();
    assert_eq!(outcome, ToggleOutcome::Started { slot: 1, session_id: 2 });
}

#[tokio::test]
async fn test_long_press_on_recording_target_is_allowed() {
    let board = board(4);
    board.controller.on_record_toggle().await.unwrap();

    // 録音先はまだ空なので何も起きない
    assert!(!board.controller.on_slot_long_press(0).await.unwrap());

    let outcome = board.controller.on_record_toggle().await.unwrap();
    assert_eq!(outcome, ToggleOutcome::Stopped { slot: 0, session_id: 1 });
    assert_eq!(board.recorded(), vec![true, false, false, false]);
}

#[tokio::test]
async fn test_configure_failure_returns_to_idle() {
    let mut board = board(4);
    board.device.script(|s| s.fail_configure = true);

    let result = board.controller.on_record_toggle().await;
    assert!(matches!(result, Err(SoundboardError::RecordingFailed(_))));
    assert_eq!(board.controller.recording_state(), RecordingState::Idle);
    assert_eq!(board.device.open_captures(), 0);

    let events = board.drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        SoundboardEvent::Error(SoundboardError::RecordingFailed(msg)) if msg.contains("audio mode rejected")
    ));

    board.device.script(|s| s.fail_configure = false);
    let outcome = board.controller.on_record_toggle().await.unwrap();
    assert!(matches!(outcome, ToggleOutcome::Started { slot: 0, .. }));
}

#[tokio::test]
async fn test_abandoned_toggle_does_not_block_shutdown() {
    let gate = Arc::new(Notify::new());
    let board = board_with(4, MockAudioDevice::new().with_capture_gate(gate));

    // デバイス待ちのまま呼び出し側がトグルを破棄する
    let result = timeout(
        Duration::from_millis(20),
        board.controller.on_record_toggle(),
    )
    .await;
    assert!(result.is_err());
    assert_eq!(board.controller.recording_state(), RecordingState::Idle);
    assert_eq!(board.controller.snapshot().unwrap().recording, None);

    timeout(Duration::from_secs(1), board.controller.shutdown())
        .await
        .expect("shutdown should not hang")
        .unwrap();
}

#[tokio::test]
async fn test_abandoned_stop_allows_next_recording() {
    let gate = Arc::new(Notify::new());
    let board = board_with(4, MockAudioDevice::new().with_flush_gate(gate));
    board.controller.on_record_toggle().await.unwrap();

    let result = timeout(
        Duration::from_millis(20),
        board.controller.on_record_toggle(),
    )
    .await;
    assert!(result.is_err());
    assert_eq!(board.controller.recording_state(), RecordingState::Idle);
    assert_eq!(board.recorded(), vec![false; 4]);

    let outcome = board.controller.on_record_toggle().await.unwrap();
    assert_eq!(outcome, ToggleOutcome::Started { slot: 0, session_id: 2 });
}

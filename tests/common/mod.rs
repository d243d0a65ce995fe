use std::sync::Arc;
use std::time::Duration;

use soundboard::application::service_container::test_helpers::MockAudioDevice;
use soundboard::application::{ControllerConfig, SoundboardController};
use soundboard::{ServiceContainer, SoundboardEvent};
use tokio::sync::mpsc::UnboundedReceiver;

pub struct TestBoard {
    pub device: Arc<MockAudioDevice>,
    pub controller: Arc<SoundboardController>,
    pub events: UnboundedReceiver<SoundboardEvent>,
}

/// モックデバイスでボードを組み立てる
pub fn board(capacity: usize) -> TestBoard {
    board_with(capacity, MockAudioDevice::new())
}

pub fn board_with(capacity: usize, device: MockAudioDevice) -> TestBoard {
    let device = Arc::new(device);
    let config = ControllerConfig {
        capacity,
        ..ControllerConfig::default()
    };
    let mut container = ServiceContainer::with_dependencies(config, device.clone())
        .expect("Failed to create test container");
    let events = container.take_event_rx().expect("event receiver");
    TestBoard {
        device,
        controller: container.controller,
        events,
    }
}

impl TestBoard {
    /// 受信済みイベントをすべて取り出す
    pub fn drain_events(&mut self) -> Vec<SoundboardEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// 条件に合うイベントが届くまで待つ（タイムアウト 1 秒）
    pub async fn wait_event(
        &mut self,
        pred: impl Fn(&SoundboardEvent) -> bool,
    ) -> SoundboardEvent {
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                match self.events.recv().await {
                    Some(event) if pred(&event) => return event,
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    /// 録音済みフラグの一覧
    pub fn recorded(&self) -> Vec<bool> {
        self.controller.snapshot().unwrap().recorded_flags()
    }
}

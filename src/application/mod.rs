pub mod events;
pub mod playback_service;
pub mod recording_service;
pub mod service_container;
pub mod soundboard_controller;
pub mod traits;

pub use events::{BoardSnapshot, SoundboardEvent};
pub use playback_service::{PlaybackService, PlaybackSession};
pub use recording_service::{RecordingContext, RecordingService, RecordingState, StoppedRecording};
pub use service_container::ServiceContainer;
pub use soundboard_controller::{
    ControllerConfig, DEFAULT_CAPACITY, SlotPressOutcome, SoundboardController, ToggleOutcome,
};
pub use traits::AudioDevice;

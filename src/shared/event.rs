// This is free and unencumbered software released into the public domain.

use super::{CameraError, CameraId, Frame, Severity};
use bytes::Bytes;
use std::{
    path::PathBuf,
    sync::{
        Arc,
        mpsc::{Receiver, SyncSender, TrySendError, sync_channel},
    },
};

/// Everything the session reports back to the host.
#[derive(Debug)]
pub enum CameraEvent {
    Opened { id: CameraId },
    Closed,
    Error { error: CameraError, severity: Severity },
    PictureTaken(Bytes),
    PreviewFrame(Frame),
    RecordingStarted { path: PathBuf },
    RecordingPaused,
    RecordingResumed,
    RecordingStopped { path: PathBuf },
}

impl CameraEvent {
    pub fn warning(error: CameraError) -> Self {
        Self::Error {
            error,
            severity: Severity::Warning,
        }
    }

    pub fn error(error: CameraError) -> Self {
        Self::Error {
            error,
            severity: Severity::Error,
        }
    }
}

/// Receives events. Runs on the session's owner thread, so it should hand the
/// event to the host's own executor rather than do real work.
pub type EventSink = Arc<dyn Fn(CameraEvent) + Send + Sync + 'static>;

/// A sink that queues events on a bounded channel for the host to poll.
///
/// Delivery never blocks the session: when the queue is full the event is
/// dropped and logged.
pub fn channel_sink(capacity: usize) -> (EventSink, Receiver<CameraEvent>) {
    let (tx, rx) = sync_channel::<CameraEvent>(capacity.max(1));
    let sink: EventSink = Arc::new(move |event| deliver(&tx, event));
    (sink, rx)
}

fn deliver(tx: &SyncSender<CameraEvent>, event: CameraEvent) {
    match tx.try_send(event) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {},
        Err(TrySendError::Full(CameraEvent::PreviewFrame(_))) => {
            log!(trace, "event queue full, dropping preview frame");
        },
        Err(TrySendError::Full(_event)) => {
            log!(warn, event = ?_event, "event queue full, dropping event");
        },
    }
}

/// A sink that discards everything.
pub fn null_sink() -> EventSink {
    Arc::new(|_| {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_instead_of_waiting() {
        let (sink, events) = channel_sink(1);
        sink(CameraEvent::Opened { id: 2 });
        sink(CameraEvent::Closed);
        sink(CameraEvent::warning(CameraError::NotOpen));
        assert!(matches!(events.try_recv(), Ok(CameraEvent::Opened { id: 2 })));
        assert!(events.try_recv().is_err());

        sink(CameraEvent::Closed);
        assert!(matches!(events.try_recv(), Ok(CameraEvent::Closed)));
    }
}

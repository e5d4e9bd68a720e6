//! Progress reporting for one upload session.
//!
//! Byte counts from every concurrent transfer feed one tracker, which
//! publishes snapshots on a `watch` channel. Published values never go
//! backwards.

use crate::error::Result;
use crate::state::UploadState;
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;

/// Point-in-time view of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub state: UploadState,
    pub bytes_sent: u64,
    pub total_bytes: u64,
    /// 0..=100
    pub percent: u8,
}

impl UploadProgress {
    fn initial(total_bytes: u64) -> Self {
        Self {
            state: UploadState::Idle,
            bytes_sent: 0,
            total_bytes,
            percent: 0,
        }
    }
}

pub fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let sent = sent.min(total);
    ((u128::from(sent) * 100) / u128::from(total)) as u8
}

pub(crate) struct ProgressTracker {
    upload_id: String,
    total: u64,
    sent: AtomicU64,
    muted: AtomicBool,
    sender: watch::Sender<UploadProgress>,
    event_bus: EventBus,
}

impl ProgressTracker {
    pub(crate) fn new(upload_id: String, total: u64, event_bus: EventBus) -> Self {
        let (sender, _) = watch::channel(UploadProgress::initial(total));
        Self {
            upload_id,
            total,
            sent: AtomicU64::new(0),
            muted: AtomicBool::new(false),
            sender,
            event_bus,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.sender.subscribe()
    }

    pub(crate) fn state(&self) -> UploadState {
        self.sender.borrow().state
    }

    /// Account for `bytes` more handed to storage.
    pub(crate) fn add_bytes(&self, bytes: u64) {
        if self.muted.load(Ordering::SeqCst) {
            return;
        }
        let sent = (self.sent.fetch_add(bytes, Ordering::SeqCst) + bytes).min(self.total);
        let percent = percent_of(sent, self.total);

        // The event is emitted while the watch lock is held so concurrent
        // reporters publish percents to the bus in increasing order.
        self.sender.send_if_modified(|progress| {
            if progress.state.is_terminal() || sent <= progress.bytes_sent {
                return false;
            }
            progress.bytes_sent = sent;
            if percent > progress.percent {
                progress.percent = percent;
                let _ = self.event_bus.emit(CoreEvent::Upload(UploadEvent::Progress {
                    upload_id: self.upload_id.clone(),
                    percent,
                }));
            }
            true
        });
    }

    /// Stop accepting byte counts. In-flight transfers may still report after
    /// a cancel; those reports are dropped.
    pub(crate) fn mute(&self) {
        self.muted.store(true, Ordering::SeqCst);
    }

    /// Move to `to`, publishing the new state. Completion pins progress at 100.
    pub(crate) fn set_state(&self, to: UploadState) -> Result<()> {
        let mut outcome = Ok(());
        self.sender.send_if_modified(|progress| match progress.state.transition(to) {
            Ok(state) => {
                progress.state = state;
                if state == UploadState::Completed {
                    progress.bytes_sent = self.total;
                    progress.percent = 100;
                }
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(total: u64) -> ProgressTracker {
        ProgressTracker::new("u1".into(), total, EventBus::new(64))
    }

    #[test]
    fn test_percent_math() {
        assert_eq!(percent_of(0, 0), 0);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(3, 3), 100);
        assert_eq!(percent_of(10, 3), 100);
        assert_eq!(percent_of(5 * 1024 * 1024 * 1024, 5 * 1024 * 1024 * 1024 + 1), 99);
    }

    #[test]
    fn test_bytes_accumulate_and_clamp() {
        let t = tracker(200);
        t.set_state(UploadState::Presigning).unwrap();
        t.set_state(UploadState::Transferring).unwrap();
        let rx = t.subscribe();

        t.add_bytes(50);
        assert_eq!(rx.borrow().percent, 25);
        t.add_bytes(500);
        assert_eq!(rx.borrow().bytes_sent, 200);
        assert_eq!(rx.borrow().percent, 100);
    }

    #[test]
    fn test_completion_forces_full_progress() {
        let t = tracker(0);
        for state in [
            UploadState::Presigning,
            UploadState::Transferring,
            UploadState::Confirming,
            UploadState::Completed,
        ] {
            t.set_state(state).unwrap();
        }
        let snapshot = *t.subscribe().borrow();
        assert_eq!(snapshot.percent, 100);
        assert_eq!(snapshot.state, UploadState::Completed);
    }

    #[test]
    fn test_muted_tracker_ignores_late_reports() {
        let t = tracker(100);
        t.set_state(UploadState::Presigning).unwrap();
        t.set_state(UploadState::Transferring).unwrap();
        t.add_bytes(10);
        t.mute();
        t.add_bytes(80);
        assert_eq!(t.subscribe().borrow().percent, 10);
    }

    #[test]
    fn test_invalid_state_is_not_published() {
        let t = tracker(100);
        assert!(t.set_state(UploadState::Confirming).is_err());
        assert_eq!(t.state(), UploadState::Idle);
    }

    #[tokio::test]
    async fn test_progress_events_only_on_percent_change() {
        let bus = EventBus::new(64);
        let mut events = bus.subscribe();
        let t = ProgressTracker::new("u1".into(), 1000, bus);
        t.set_state(UploadState::Presigning).unwrap();
        t.set_state(UploadState::Transferring).unwrap();

        t.add_bytes(1);
        t.add_bytes(9);
        t.add_bytes(1);

        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Upload(UploadEvent::Progress {
                upload_id: "u1".into(),
                percent: 1
            })
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_reporters_emit_increasing_percents() {
        for _ in 0..50 {
            let bus = EventBus::new(256);
            let mut events = bus.subscribe();
            let t = std::sync::Arc::new(ProgressTracker::new("u1".into(), 10_000, bus));
            t.set_state(UploadState::Presigning).unwrap();
            t.set_state(UploadState::Transferring).unwrap();

            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let t = t.clone();
                    std::thread::spawn(move || {
                        for _ in 0..125 {
                            t.add_bytes(10);
                        }
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }

            let mut last = 0u8;
            while let Ok(event) = events.try_recv() {
                if let CoreEvent::Upload(UploadEvent::Progress { percent, .. }) = event {
                    assert!(percent > last, "progress went from {} to {}", last, percent);
                    last = percent;
                }
            }
            assert_eq!(last, 100);
        }
    }
}

// EventLoopBridge - feeds UI events from input threads into the event loop
//
// The controller runs on a single-threaded tokio runtime and handles one event
// at a time. Input sources (the stdin reader, a camera or lifecycle hook) run
// elsewhere and hand events over through a bounded channel.

use crate::metrics::Metrics;
use crate::ui::commands::{CommandError, UiEvent};
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Bounded to 100 events so a stalled event loop cannot grow memory without limit
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Sending side of the UI event channel
///
/// Cloneable; every input source gets its own handle.
#[derive(Clone)]
pub struct EventLoopBridge {
    event_tx: mpsc::Sender<UiEvent>,
    metrics: Arc<Metrics>,
}

impl EventLoopBridge {
    /// Create the bridge and the receiver the event loop drains
    pub fn new(metrics: Arc<Metrics>) -> (Self, mpsc::Receiver<UiEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { event_tx, metrics }, event_rx)
    }

    /// Queue an event without blocking. Returns false when it was dropped.
    pub fn send(&self, event: UiEvent) -> bool {
        match self.event_tx.try_send(event) {
            Ok(_) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.metrics.record_ui_channel_full();
                tracing::warn!("UI event channel full - dropping {:?}", event);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Failed to send UI event - event loop has stopped");
                false
            }
        }
    }

    /// Parse one input line and queue the result. Parse errors are returned, not queued.
    pub fn send_line(&self, line: &str) -> Result<bool, CommandError> {
        let event = line.parse::<UiEvent>()?;
        Ok(self.send(event))
    }

    /// Read `input` line by line on a background thread until EOF or `quit`.
    ///
    /// EOF queues [`UiEvent::Quit`] so the event loop shuts down cleanly.
    pub fn spawn_reader<R>(&self, input: R) -> std::thread::JoinHandle<()>
    where
        R: BufRead + Send + 'static,
    {
        let bridge = self.clone();
        std::thread::spawn(move || {
            tracing::debug!("Input reader thread started");

            for line in input.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("Failed to read input: {}", e);
                        break;
                    }
                };

                match line.parse::<UiEvent>() {
                    Ok(UiEvent::Quit) => break,
                    Ok(event) => {
                        // Blocking here is fine, this thread only reads input
                        if bridge.event_tx.blocking_send(event).is_err() {
                            tracing::debug!("Event loop gone, stopping input reader");
                            return;
                        }
                    }
                    Err(CommandError::Empty) => {}
                    Err(e) => eprintln!("{}", e),
                }
            }

            bridge.send(UiEvent::Quit);
            tracing::debug!("Input reader thread terminated");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_full_channel_drops_and_counts() {
        let metrics = Arc::new(Metrics::new());
        let (bridge, _rx) = EventLoopBridge::new(metrics.clone());

        for _ in 0..EVENT_CHANNEL_CAPACITY {
            assert!(bridge.send(UiEvent::Back));
        }
        assert!(!bridge.send(UiEvent::Back));
        assert_eq!(metrics.ui_channel_full.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_closed_channel_reports_false() {
        let (bridge, rx) = EventLoopBridge::new(Arc::new(Metrics::new()));
        drop(rx);
        assert!(!bridge.send(UiEvent::Back));
    }

    #[test]
    fn test_send_line_parses() {
        let (bridge, mut rx) = EventLoopBridge::new(Arc::new(Metrics::new()));
        assert_eq!(bridge.send_line("next"), Ok(true));
        assert!(bridge.send_line("fly").is_err());
        assert_eq!(rx.try_recv().unwrap(), UiEvent::Next);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_reader_skips_bad_lines_and_ends_with_quit() {
        let (bridge, mut rx) = EventLoopBridge::new(Arc::new(Metrics::new()));
        let input = Cursor::new("open scan\n\nbogus\nscan abc\n");

        bridge.spawn_reader(input).join().unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::Open(crate::models::Screen::ScanQrCode)
        );
        assert_eq!(rx.try_recv().unwrap(), UiEvent::Scan("abc".to_string()));
        assert_eq!(rx.try_recv().unwrap(), UiEvent::Quit);
    }
}

//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits state change events on mutations
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple threads
//! - Keeps navigation, notices and session teardown consistent

use clubapp::models::{Notice, Screen, Session, User, WizardStage};
use clubapp::{StateChange, StateManager};
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::time::{Duration, timeout};

fn session() -> Session {
    Session {
        access_token: "jwt".to_string(),
        refresh_token: String::new(),
        expires_at: None,
        user: User {
            id: "u1".to_string(),
            email: Some("ada@example.com".to_string()),
        },
    }
}

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<StateChange>) -> StateChange {
    timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

#[tokio::test]
async fn test_initialization_events() {
    let state = StateManager::new();
    let mut rx = state.subscribe();

    state.finish_initialization(Some(session()));

    assert_eq!(next_event(&mut rx).await, StateChange::Initialized);
    assert_eq!(
        next_event(&mut rx).await,
        StateChange::SessionChanged { signed_in: true }
    );
    assert_eq!(
        next_event(&mut rx).await,
        StateChange::ScreenChanged {
            screen: Screen::Home
        }
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();
    let mut rx3 = state.subscribe();

    state.show_notice(Notice::new("Success", "Successfully checked in!"));

    for rx in [&mut rx1, &mut rx2, &mut rx3] {
        let event = next_event(rx).await;
        assert!(
            matches!(&event, StateChange::NoticeShown { notice } if notice.title == "Success"),
            "Expected NoticeShown event, got: {:?}",
            event
        );
    }
}

#[tokio::test]
async fn test_identical_notices_are_each_reported() {
    let state = StateManager::new();
    let mut rx = state.subscribe();

    let notice = Notice::new("Invalid QR Code", "Scanned QR code is not a valid club ID.");
    state.show_notice(notice.clone());
    state.show_notice(notice.clone());

    assert_eq!(
        next_event(&mut rx).await,
        StateChange::NoticeShown {
            notice: notice.clone()
        }
    );
    assert_eq!(next_event(&mut rx).await, StateChange::NoticeShown { notice });
    assert_eq!(state.snapshot().notice_seq, 2);
}

#[tokio::test]
async fn test_navigation_stack() {
    let state = StateManager::new();
    state.set_session(session());

    state.navigate(Screen::ScanQrCode);
    // Re-opening the current screen does not stack it twice
    state.navigate(Screen::ScanQrCode);
    assert_eq!(
        state.snapshot().screen_stack,
        vec![Screen::Home, Screen::ScanQrCode]
    );

    state.navigate_back();
    state.navigate_back();
    assert_eq!(state.snapshot().screen_stack, vec![Screen::Home]);
}

#[tokio::test]
async fn test_no_event_without_change() {
    let state = StateManager::new();
    let mut rx = state.subscribe();

    let changes = state.set_scan_locked(false);
    assert!(changes.is_empty());
    assert!(rx.try_recv().is_err());

    let changes = state.set_scan_locked(true);
    assert_eq!(changes, vec![StateChange::ScanLockChanged { held: true }]);
}

#[tokio::test]
async fn test_reset_clears_session_state() {
    let state = StateManager::new();
    state.set_session(session());
    state.navigate(Screen::BookingWizard);
    state.set_wizard_stage(Some(WizardStage::Time));
    state.set_scan_locked(true);

    let mut counts = IndexMap::new();
    counts.insert("c1".to_string(), 4);
    state.set_visits(counts, IndexMap::new());

    let mut rx = state.subscribe();
    let changes = state.reset_session_state();

    assert!(changes.contains(&StateChange::SessionChanged { signed_in: false }));
    assert!(changes.contains(&StateChange::WizardStageChanged { stage: None }));
    assert_eq!(changes.last(), Some(&StateChange::StateReset));

    let snapshot = state.snapshot();
    assert!(!snapshot.is_signed_in());
    assert!(!snapshot.scan_locked);
    assert!(snapshot.visit_counts.is_empty());
    assert_eq!(snapshot.current_screen(), Screen::Welcome);

    // Every change also went out on the channel
    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        received.push(event);
    }
    assert_eq!(received, changes);
}

#[test]
fn test_concurrent_updates() {
    let state = Arc::new(StateManager::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let state = state.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    state.show_notice(Notice::new("Tick", ""));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(state.snapshot().notice_seq, 400);
}

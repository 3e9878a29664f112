// UI module - console frontend and event loop bridge
//
// This module contains:
// - UiEvent: one parsed line of input (tap, camera payload, lifecycle change)
// - EventLoopBridge: bounded channel from input threads into the event loop
// - AppController: dispatches events to services and renders state changes

pub mod bridge;
pub mod commands;
pub mod controller;

pub use bridge::EventLoopBridge;
pub use commands::{CommandError, UiEvent};
pub use controller::{AppController, Collaborators};

//! Two-finger pinch recognition.
//!
//! [`GestureTracker`] follows one session per target from first contact to
//! release and hands the finished session to [`classify`], which decides
//! between tap, zoom in, zoom out, or nothing. [`attach`] binds a tracker to a
//! single target; the `input` and `daemon` modules drive it from Linux evdev
//! multitouch devices.

pub mod actions;
pub mod attach;
pub mod config;
pub mod daemon;
pub mod gestures;
pub mod input;
pub mod schedule;
pub mod tracker;

pub use actions::{Activator, NoopActivator};
pub use attach::{Attachment, Capabilities, attach};
pub use config::{Config, HandlerResult, Settings};
pub use gestures::{ClassificationResult, GestureKind, classify};
pub use schedule::TimerQueue;
pub use tracker::{GestureTracker, MoveSample, Session, TouchPoint};

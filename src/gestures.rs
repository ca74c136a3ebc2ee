//! Pinch classification: turns a finished two-finger session into a gesture.

use serde::Serialize;

use crate::config::Settings;
use crate::tracker::{Session, TouchPoint};

/// Per-axis movement below this is "stationary" for tap detection.
pub const TAP_MOVE_LIMIT: f64 = 15.0;
/// Sessions shorter than this (ms) may still be taps.
pub const TAP_MAX_MS: u64 = 100;

pub const MIN_SPEED: u8 = 1;
pub const MAX_SPEED: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Tap,
    ZoomIn,
    ZoomOut,
    None,
}

impl GestureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tap => "tap",
            Self::ZoomIn => "zoom_in",
            Self::ZoomOut => "zoom_out",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult<T> {
    pub kind: GestureKind,
    /// 1 (slow) ..= 5 (fast)
    pub a_speed: u8,
    pub b_speed: u8,
    pub a_delta_x: f64,
    pub a_delta_y: f64,
    pub b_delta_x: f64,
    pub b_delta_y: f64,
    pub target: T,
}

#[derive(Debug, Clone, Copy)]
struct Displacement {
    x: f64,
    y: f64,
}

impl Displacement {
    fn between(start: TouchPoint, cur: TouchPoint) -> Self {
        Self {
            x: (cur.x - start.x).abs(),
            y: (cur.y - start.y).abs(),
        }
    }

    fn below(&self, limit_x: f64, limit_y: f64) -> bool {
        self.x < limit_x && self.y < limit_y
    }
}

/// Classify a session that lasted `duration_ms`.
///
/// A positive pinch delta (fingers closed in) maps to [`GestureKind::ZoomIn`],
/// a negative one (fingers spread) to [`GestureKind::ZoomOut`]. A short,
/// nearly stationary session is always a [`GestureKind::Tap`], whatever the
/// pinch delta. Zoom is only reported once any single axis of either finger
/// reaches the configured threshold.
pub fn classify<T: Clone>(
    session: &Session<T>,
    duration_ms: u64,
    settings: &Settings,
) -> ClassificationResult<T> {
    let a = Displacement::between(session.a_start, session.a_cur);
    let b = Displacement::between(session.b_start, session.b_cur);

    let pinch_delta =
        session.a_start.distance(session.b_start) - session.a_cur.distance(session.b_cur);

    let is_tap = a.below(TAP_MOVE_LIMIT, TAP_MOVE_LIMIT)
        && b.below(TAP_MOVE_LIMIT, TAP_MOVE_LIMIT)
        && duration_ms < TAP_MAX_MS;

    let kind = if is_tap {
        GestureKind::Tap
    } else if a.below(settings.move_x, settings.move_y) && b.below(settings.move_x, settings.move_y)
    {
        GestureKind::None
    } else if pinch_delta > 0.0 {
        GestureKind::ZoomIn
    } else if pinch_delta < 0.0 {
        GestureKind::ZoomOut
    } else {
        GestureKind::None
    };

    ClassificationResult {
        kind,
        a_speed: speed(a.x + a.y, duration_ms),
        b_speed: speed(b.x + b.y, duration_ms),
        a_delta_x: a.x,
        a_delta_y: a.y,
        b_delta_x: b.x,
        b_delta_y: b.y,
        target: session.target.clone(),
    }
}

/// Displacement over squared duration, rounded and clamped to `1..=5`.
///
/// Not a physical unit; it only grades how "fast" a pinch felt. A zero
/// duration counts as the fastest possible gesture.
pub fn speed(displacement: f64, duration_ms: u64) -> u8 {
    let ms = duration_ms as f64;
    let denom = ms / 6.0 * ms;
    if denom <= f64::EPSILON {
        return MAX_SPEED;
    }
    let raw = (displacement * 60.0 / denom).round();
    if !raw.is_finite() {
        return MAX_SPEED;
    }
    raw.clamp(MIN_SPEED as f64, MAX_SPEED as f64) as u8
}

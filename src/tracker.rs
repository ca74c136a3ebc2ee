//! Per-target two-finger session tracking.

use anyhow::Result;
use log::{debug, trace};
use serde::Serialize;
use std::{collections::HashMap, fmt, hash::Hash, rc::Rc};

use crate::actions::Activator;
use crate::config::Config;
use crate::gestures::{self, ClassificationResult, GestureKind};
use crate::schedule::TimerQueue;

/// Delay before a tap re-issues the default action. Re-dispatching inside the
/// pass that suppressed the native action would get swallowed or doubled.
pub const TAP_REDISPATCH_DELAY_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TouchPoint {
    pub x: f64,
    pub y: f64,
}

impl TouchPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: TouchPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Live positions handed to the `multi_touch_move` callback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoveSample {
    pub a: TouchPoint,
    pub b: TouchPoint,
    pub time_ms: u64,
}

/// An in-progress two-finger gesture. Existing in the tracker means active.
#[derive(Debug, Clone)]
pub struct Session<T> {
    pub target: T,
    pub start_time_ms: u64,
    pub a_start: TouchPoint,
    pub b_start: TouchPoint,
    pub a_cur: TouchPoint,
    pub b_cur: TouchPoint,
}

impl<T> Session<T> {
    pub fn begin(target: T, a: TouchPoint, b: TouchPoint, time_ms: u64) -> Self {
        Self {
            target,
            start_time_ms: time_ms,
            a_start: a,
            b_start: b,
            a_cur: a,
            b_cur: b,
        }
    }
}

pub struct GestureTracker<T> {
    config: Config<T>,
    activator: Rc<dyn Activator<T>>,
    sessions: HashMap<T, Session<T>>,
    timers: TimerQueue,
}

impl<T> fmt::Debug for GestureTracker<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureTracker")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .field("pending_tasks", &self.timers.pending())
            .finish()
    }
}

impl<T> GestureTracker<T>
where
    T: Eq + Hash + Clone + fmt::Debug + 'static,
{
    pub fn new(config: Config<T>, activator: Rc<dyn Activator<T>>) -> Self {
        Self {
            config,
            activator,
            sessions: HashMap::new(),
            timers: TimerQueue::new(),
        }
    }

    pub fn config(&self) -> &Config<T> {
        &self.config
    }

    pub fn is_active(&self, target: &T) -> bool {
        self.sessions.contains_key(target)
    }

    /// Deferred tasks (tap re-dispatches) not yet run.
    pub fn pending_tasks(&self) -> usize {
        self.timers.pending()
    }

    /// Two contacts landed on `target`. Returns false, leaving the running
    /// session untouched, if one is already in progress.
    pub fn on_start(&mut self, target: T, a: TouchPoint, b: TouchPoint, time_ms: u64) -> bool {
        self.timers.set_now(time_ms);
        if self.sessions.contains_key(&target) {
            trace!("{target:?}: duplicate start ignored");
            return false;
        }
        debug!("{target:?}: session start a={a:?} b={b:?} t={time_ms}");
        self.sessions
            .insert(target.clone(), Session::begin(target, a, b, time_ms));
        true
    }

    /// New positions for both contacts. Ignored (returns false) without an
    /// active session.
    pub fn on_move(
        &mut self,
        target: &T,
        a: TouchPoint,
        b: TouchPoint,
        time_ms: u64,
    ) -> Result<bool> {
        self.timers.set_now(time_ms);
        let Some(session) = self.sessions.get_mut(target) else {
            return Ok(false);
        };
        session.a_cur = a;
        session.b_cur = b;
        trace!("{target:?}: move a={a:?} b={b:?}");

        if let Some(on_move) = self.config.multi_touch_move.as_mut() {
            on_move(&MoveSample { a, b, time_ms })?;
        }
        Ok(true)
    }

    /// Contacts lifted. Classifies and dispatches the session if there was
    /// one; otherwise this is just a reset.
    pub fn on_end(
        &mut self,
        target: &T,
        time_ms: u64,
    ) -> Result<Option<ClassificationResult<T>>> {
        self.timers.set_now(time_ms);
        let Some(session) = self.sessions.remove(target) else {
            return Ok(None);
        };

        let duration = time_ms.saturating_sub(session.start_time_ms);
        let result = gestures::classify(&session, duration, &self.config.settings);
        debug!(
            "{target:?}: session end after {duration}ms -> {} (speed a={} b={})",
            result.kind.as_str(),
            result.a_speed,
            result.b_speed
        );
        self.dispatch(&result)?;
        Ok(Some(result))
    }

    /// Run deferred work that is due by `now_ms`.
    pub fn poll(&mut self, now_ms: u64) -> Result<usize> {
        self.timers.advance_to(now_ms)
    }

    fn dispatch(&mut self, result: &ClassificationResult<T>) -> Result<()> {
        match result.kind {
            GestureKind::Tap => {
                // without suppression the native action already went through
                if self.config.settings.prevent_default {
                    let activator = Rc::clone(&self.activator);
                    let target = result.target.clone();
                    self.timers.schedule(
                        TAP_REDISPATCH_DELAY_MS,
                        Box::new(move || activator.activate(&target)),
                    );
                }
            }
            GestureKind::ZoomIn => {
                if let Some(f) = self.config.zoom_in.as_mut() {
                    f(result)?;
                }
            }
            GestureKind::ZoomOut => {
                if let Some(f) = self.config.zoom_out.as_mut() {
                    f(result)?;
                }
            }
            GestureKind::None => {}
        }
        Ok(())
    }
}

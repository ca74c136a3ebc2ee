//! Binding a gesture tracker to one target.

use anyhow::Result;
use log::{debug, info};
use std::{fmt, hash::Hash, rc::Rc};

use crate::actions::Activator;
use crate::config::Config;
use crate::gestures::ClassificationResult;
use crate::tracker::{GestureTracker, TouchPoint};

/// What the input source behind a target can do.
pub trait Capabilities {
    fn supports_multitouch(&self) -> bool;
}

impl Capabilities for bool {
    fn supports_multitouch(&self) -> bool {
        *self
    }
}

/// Handle returned by [`attach`]. Detached handles ignore every call.
pub struct Attachment<T> {
    target: T,
    tracker: Option<GestureTracker<T>>,
}

/// Attach pinch tracking to `target`. Without multitouch support the handle
/// is inert: nothing is tracked and no callback ever fires.
pub fn attach<T, C>(
    target: T,
    caps: &C,
    config: Config<T>,
    activator: Rc<dyn Activator<T>>,
) -> Attachment<T>
where
    T: Eq + Hash + Clone + fmt::Debug + 'static,
    C: Capabilities + ?Sized,
{
    if !caps.supports_multitouch() {
        info!("{target:?}: no multitouch support; not attaching");
        return Attachment {
            target,
            tracker: None,
        };
    }
    debug!("{target:?}: attached with {:?}", config.settings);
    Attachment {
        target,
        tracker: Some(GestureTracker::new(config, activator)),
    }
}

impl<T> Attachment<T>
where
    T: Eq + Hash + Clone + fmt::Debug + 'static,
{
    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn is_live(&self) -> bool {
        self.tracker.is_some()
    }

    /// True while a two-finger session is in progress.
    pub fn is_tracking(&self) -> bool {
        self.tracker
            .as_ref()
            .is_some_and(|t| t.is_active(&self.target))
    }

    /// Whether the adapter should keep the platform away from the touch stream.
    pub fn prevent_default(&self) -> bool {
        self.tracker
            .as_ref()
            .is_some_and(|t| t.config().settings.prevent_default)
    }

    pub fn start(&mut self, a: TouchPoint, b: TouchPoint, time_ms: u64) -> bool {
        match self.tracker.as_mut() {
            Some(t) => t.on_start(self.target.clone(), a, b, time_ms),
            None => false,
        }
    }

    pub fn move_to(&mut self, a: TouchPoint, b: TouchPoint, time_ms: u64) -> Result<bool> {
        match self.tracker.as_mut() {
            Some(t) => t.on_move(&self.target, a, b, time_ms),
            None => Ok(false),
        }
    }

    pub fn end(&mut self, time_ms: u64) -> Result<Option<ClassificationResult<T>>> {
        match self.tracker.as_mut() {
            Some(t) => t.on_end(&self.target, time_ms),
            None => Ok(None),
        }
    }

    pub fn poll(&mut self, now_ms: u64) -> Result<usize> {
        match self.tracker.as_mut() {
            Some(t) => t.poll(now_ms),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::NoopActivator;
    use crate::gestures::GestureKind;
    use std::cell::Cell;

    fn counting_config(hits: Rc<Cell<u32>>) -> Config<u32> {
        let (a, b, c) = (hits.clone(), hits.clone(), hits);
        Config::default()
            .on_zoom_in(move |_| {
                a.set(a.get() + 1);
                Ok(())
            })
            .on_zoom_out(move |_| {
                b.set(b.get() + 1);
                Ok(())
            })
            .on_multi_touch_move(move |_| {
                c.set(c.get() + 1);
                Ok(())
            })
    }

    #[test]
    fn without_multitouch_nothing_fires() {
        let hits = Rc::new(Cell::new(0));
        let mut h = attach(1u32, &false, counting_config(hits.clone()), Rc::new(NoopActivator));
        assert!(!h.is_live());
        assert!(!h.prevent_default());

        assert!(!h.start(TouchPoint::new(0.0, 0.0), TouchPoint::new(100.0, 0.0), 0));
        assert!(!h.move_to(TouchPoint::new(0.0, 0.0), TouchPoint::new(300.0, 0.0), 100).unwrap());
        assert!(h.end(200).unwrap().is_none());
        assert_eq!(h.poll(10_000).unwrap(), 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn live_attachment_tracks_its_target() {
        let hits = Rc::new(Cell::new(0));
        let mut h = attach(9u32, &true, counting_config(hits.clone()), Rc::new(NoopActivator));
        assert!(h.is_live());
        assert!(h.prevent_default());
        assert_eq!(*h.target(), 9);

        assert!(h.start(TouchPoint::new(0.0, 0.0), TouchPoint::new(100.0, 0.0), 0));
        assert!(h.is_tracking());
        h.move_to(TouchPoint::new(0.0, 0.0), TouchPoint::new(300.0, 0.0), 100)
            .unwrap();
        let r = h.end(200).unwrap().unwrap();
        assert_eq!(r.kind, GestureKind::ZoomOut);
        assert_eq!(r.target, 9);
        assert!(!h.is_tracking());
        // one move sample plus one zoom
        assert_eq!(hits.get(), 2);
    }
}

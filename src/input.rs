//! Multitouch input: device discovery, slot tracking and the frame feed
//! that turns contact lists into start/move/end calls (evdev 0.13).

use anyhow::Result;
use evdev::{AbsoluteAxisCode, Device, EventType};
use log::trace;
use serde::Serialize;
use std::{fmt, hash::Hash};

use crate::attach::{Attachment, Capabilities};
use crate::gestures::ClassificationResult;
use crate::tracker::TouchPoint;

const MAX_SLOTS: usize = 10;

/// Stable identity of a touch device: its `/dev/input/event*` path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub multitouch: bool,
}

impl DeviceInfo {
    pub fn id(&self) -> DeviceId {
        DeviceId(self.path.clone())
    }
}

impl Capabilities for DeviceInfo {
    fn supports_multitouch(&self) -> bool {
        self.multitouch
    }
}

fn has_multitouch(dev: &Device) -> bool {
    dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
    })
}

/// Every readable event device reporting absolute axes, multitouch or not.
pub fn probe_devices() -> Vec<DeviceInfo> {
    let mut out = vec![];
    if let Ok(rd) = std::fs::read_dir("/dev/input") {
        for e in rd.flatten() {
            let p = e.path();
            if !p
                .file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.starts_with("event"))
            {
                continue;
            }
            if let Ok(dev) = Device::open(&p) {
                if !dev.supported_events().contains(EventType::ABSOLUTE) {
                    continue;
                }
                out.push(DeviceInfo {
                    path: p.display().to_string(),
                    name: dev.name().unwrap_or("unknown").to_string(),
                    multitouch: has_multitouch(&dev),
                });
            }
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

pub fn discover_multitouch() -> Vec<DeviceInfo> {
    probe_devices()
        .into_iter()
        .filter(|d| d.multitouch)
        .collect()
}

/// Axis range of a device, read from its absinfo when available.
pub fn position_ranges(dev: &Device) -> Option<((i32, i32), (i32, i32))> {
    let mut x = None;
    let mut y = None;
    for (code, info) in dev.get_absinfo().ok()? {
        if code == AbsoluteAxisCode::ABS_MT_POSITION_X {
            x = Some((info.minimum(), info.maximum()));
        } else if code == AbsoluteAxisCode::ABS_MT_POSITION_Y {
            y = Some((info.minimum(), info.maximum()));
        }
    }
    Some((x?, y?))
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    active: bool,
    x_norm: f64,
    y_norm: f64,
}

/// Per-slot contact state for one multitouch device (protocol B).
#[derive(Debug)]
pub struct SlotTracker {
    slots: Vec<Slot>,
    cur_slot: usize,
    x_min: i32,
    x_max: i32,
    y_min: i32,
    y_max: i32,
    scale: f64,
}

impl SlotTracker {
    pub fn new(scale: f64) -> Self {
        Self {
            slots: vec![Slot::default(); MAX_SLOTS],
            cur_slot: 0,
            x_min: 0,
            x_max: 4096,
            y_min: 0,
            y_max: 4096,
            scale,
        }
    }

    pub fn set_norm_ranges(&mut self, x_min: i32, x_max: i32, y_min: i32, y_max: i32) {
        self.x_min = x_min;
        self.x_max = x_max.max(x_min + 1);
        self.y_min = y_min;
        self.y_max = y_max.max(y_min + 1);
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot.clamp(0, MAX_SLOTS as i32 - 1) as usize;
    }

    /// A negative id releases the current slot.
    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        self.slots[self.cur_slot].active = tracking_id >= 0;
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        let nx = (raw - self.x_min) as f64 / (self.x_max - self.x_min) as f64;
        self.slots[self.cur_slot].x_norm = nx.clamp(0.0, 1.0);
    }

    pub fn on_pos_y(&mut self, raw: i32) {
        let ny = (raw - self.y_min) as f64 / (self.y_max - self.y_min) as f64;
        self.slots[self.cur_slot].y_norm = ny.clamp(0.0, 1.0);
    }

    /// Active contacts in slot order, in gesture units.
    pub fn contacts(&self) -> Vec<TouchPoint> {
        self.slots
            .iter()
            .filter(|s| s.active)
            .map(|s| TouchPoint::new(s.x_norm * self.scale, s.y_norm * self.scale))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedOutcome<T> {
    Idle,
    Started,
    Moved,
    Ended(Option<ClassificationResult<T>>),
}

/// Turn one synchronized frame of contacts into the matching tracker call.
///
/// Two or more contacts start a session (first two slots are fingers a and
/// b) or move it; fewer than two end it.
pub fn feed_frame<T>(
    attachment: &mut Attachment<T>,
    contacts: &[TouchPoint],
    time_ms: u64,
) -> Result<FeedOutcome<T>>
where
    T: Eq + Hash + Clone + fmt::Debug + 'static,
{
    let tracking = attachment.is_tracking();
    match contacts {
        [a, b, ..] if !tracking => Ok(if attachment.start(*a, *b, time_ms) {
            FeedOutcome::Started
        } else {
            FeedOutcome::Idle
        }),
        [a, b, ..] => {
            attachment.move_to(*a, *b, time_ms)?;
            Ok(FeedOutcome::Moved)
        }
        _ if tracking => {
            trace!("{:?}: {} contact(s) left", attachment.target(), contacts.len());
            Ok(FeedOutcome::Ended(attachment.end(time_ms)?))
        }
        _ => Ok(FeedOutcome::Idle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::NoopActivator;
    use crate::attach::attach;
    use crate::config::Config;
    use crate::gestures::GestureKind;
    use std::rc::Rc;

    fn p(x: f64, y: f64) -> TouchPoint {
        TouchPoint::new(x, y)
    }

    #[test]
    fn slots_normalise_into_gesture_units() {
        let mut t = SlotTracker::new(1000.0);
        t.set_norm_ranges(0, 2000, 0, 1000);

        t.on_slot(0);
        t.on_tracking_id(11);
        t.on_pos_x(500);
        t.on_pos_y(250);
        t.on_slot(1);
        t.on_tracking_id(12);
        t.on_pos_x(3000); // out of range -> clamped
        t.on_pos_y(1000);

        assert_eq!(t.contacts(), vec![p(250.0, 250.0), p(1000.0, 1000.0)]);

        t.on_slot(0);
        t.on_tracking_id(-1);
        assert_eq!(t.contacts(), vec![p(1000.0, 1000.0)]);
    }

    #[test]
    fn degenerate_ranges_do_not_divide_by_zero() {
        let mut t = SlotTracker::new(1.0);
        t.set_norm_ranges(10, 10, 5, 0);
        t.on_tracking_id(1);
        t.on_pos_x(10);
        t.on_pos_y(5);
        assert_eq!(t.contacts(), vec![p(0.0, 0.0)]);
    }

    #[test]
    fn feed_drives_a_full_session() {
        let mut h = attach(DeviceId("pad".into()), &true, Config::default(), Rc::new(NoopActivator));

        assert_eq!(feed_frame(&mut h, &[p(0.0, 0.0)], 0).unwrap(), FeedOutcome::Idle);
        assert_eq!(
            feed_frame(&mut h, &[p(0.0, 0.0), p(100.0, 0.0)], 10).unwrap(),
            FeedOutcome::Started
        );
        assert_eq!(
            feed_frame(&mut h, &[p(0.0, 0.0), p(160.0, 0.0), p(500.0, 500.0)], 100).unwrap(),
            FeedOutcome::Moved
        );
        match feed_frame(&mut h, &[p(0.0, 0.0)], 210).unwrap() {
            FeedOutcome::Ended(Some(r)) => {
                assert_eq!(r.kind, GestureKind::ZoomOut);
                assert_eq!(r.target, DeviceId("pad".into()));
            }
            other => panic!("expected a classified end, got {other:?}"),
        }
        assert_eq!(feed_frame(&mut h, &[], 220).unwrap(), FeedOutcome::Idle);
    }

    #[test]
    fn feed_is_idle_when_detached() {
        let info = DeviceInfo {
            path: "/dev/input/event3".into(),
            name: "keyboard-ish".into(),
            multitouch: false,
        };
        let mut h = attach(info.id(), &info, Config::default(), Rc::new(NoopActivator));
        assert_eq!(
            feed_frame(&mut h, &[p(0.0, 0.0), p(1.0, 1.0)], 0).unwrap(),
            FeedOutcome::Idle
        );
        assert_eq!(feed_frame(&mut h, &[], 50).unwrap(), FeedOutcome::Idle);
    }
}

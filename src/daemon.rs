//! Event loop: reads every multitouch device, feeds frames into one
//! attachment per device and turns classifications into synthetic input.

use anyhow::Result;
use evdev::{AbsoluteAxisCode, Device, EventType, SynchronizationCode};
use log::{error, info, trace, warn};
use std::{
    cell::RefCell,
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crate::actions::{ActionActivator, UinputSink};
use crate::attach::{Attachment, attach};
use crate::config::{Config, Profile};
use crate::gestures::ClassificationResult;
use crate::input::{self, DeviceId, DeviceInfo, FeedOutcome, SlotTracker};

#[derive(Debug, Clone, Default)]
pub struct DaemonOptions {
    /// Print each classified session as a JSON line on stdout.
    pub json: bool,
}

struct Surface {
    dev: Device,
    slots: SlotTracker,
    attachment: Attachment<DeviceId>,
    grabbed: bool,
}

struct Clock(Instant);

impl Clock {
    fn now_ms(&self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}

fn config_for(profile: &Profile, sink: &Rc<RefCell<UinputSink>>) -> Config<DeviceId> {
    let (zi_sink, zo_sink) = (sink.clone(), sink.clone());
    let zoom_in = profile.bindings.zoom_in.clone();
    let zoom_out = profile.bindings.zoom_out.clone();
    Config::new(profile.gesture)
        .on_zoom_in(move |r: &ClassificationResult<DeviceId>| {
            info!("{}: zoom in (speed {}/{}) -> {zoom_in}", r.target, r.a_speed, r.b_speed);
            zi_sink.borrow_mut().run(&zoom_in)
        })
        .on_zoom_out(move |r: &ClassificationResult<DeviceId>| {
            info!("{}: zoom out (speed {}/{}) -> {zoom_out}", r.target, r.a_speed, r.b_speed);
            zo_sink.borrow_mut().run(&zoom_out)
        })
        .on_multi_touch_move(|m| {
            trace!("a=({:.1},{:.1}) b=({:.1},{:.1})", m.a.x, m.a.y, m.b.x, m.b.y);
            Ok(())
        })
}

fn open_surface(
    info: &DeviceInfo,
    profile: &Profile,
    sink: &Rc<RefCell<UinputSink>>,
) -> Option<Surface> {
    let activator = Rc::new(ActionActivator::new(sink.clone(), profile.bindings.tap.clone()));
    let attachment = attach(info.id(), info, config_for(profile, sink), activator);
    if !attachment.is_live() {
        return None;
    }

    let mut dev = match Device::open(&info.path) {
        Ok(dev) => dev,
        Err(e) => {
            warn!("failed to open {}: {e}", info.path);
            return None;
        }
    };
    if let Err(e) = dev.set_nonblocking(true) {
        warn!("{}: cannot switch to non-blocking reads: {e}", info.path);
        return None;
    }

    let mut slots = SlotTracker::new(profile.input.scale);
    if let Some(((x_min, x_max), (y_min, y_max))) = input::position_ranges(&dev) {
        slots.set_norm_ranges(x_min, x_max, y_min, y_max);
    }
    info!("attached to {} ({})", info.name, info.path);
    Some(Surface {
        dev,
        slots,
        attachment,
        grabbed: false,
    })
}

fn report(result: &ClassificationResult<DeviceId>, opts: &DaemonOptions) {
    if opts.json {
        match serde_json::to_string(result) {
            Ok(line) => println!("{line}"),
            Err(e) => error!("failed to encode result: {e}"),
        }
    }
}

fn wait_for_shutdown(shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(200));
    }
}

pub fn run(profile: Profile, opts: DaemonOptions) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))?;

    info!("daemon: profile '{}'", profile.display_name());

    let sink = match UinputSink::new() {
        Ok(s) => s,
        Err(e) => {
            warn!("uinput unavailable ({e}); gestures will be logged only");
            UinputSink::noop()
        }
    };
    let sink = Rc::new(RefCell::new(sink));

    let devices = input::probe_devices();
    let mut surfaces: Vec<Surface> = devices
        .iter()
        .filter_map(|d| open_surface(d, &profile, &sink))
        .collect();

    if surfaces.is_empty() {
        warn!("no multitouch devices detected; pipeline idle");
        wait_for_shutdown(&shutdown);
        return Ok(());
    }

    let clock = Clock(Instant::now());
    while !shutdown.load(Ordering::Relaxed) {
        let mut any_event = false;

        for s in surfaces.iter_mut() {
            let Ok(events) = s.dev.fetch_events() else {
                continue;
            };
            for ev in events {
                any_event = true;
                if ev.event_type() == EventType::ABSOLUTE {
                    match ev.code() {
                        c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => s.slots.on_slot(ev.value()),
                        c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                            s.slots.on_tracking_id(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => {
                            s.slots.on_pos_x(ev.value())
                        }
                        c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => {
                            s.slots.on_pos_y(ev.value())
                        }
                        _ => {}
                    }
                } else if ev.event_type() == EventType::SYNCHRONIZATION
                    && ev.code() == SynchronizationCode::SYN_REPORT.0
                {
                    let contacts = s.slots.contacts();
                    match input::feed_frame(&mut s.attachment, &contacts, clock.now_ms()) {
                        Ok(FeedOutcome::Ended(Some(result))) => report(&result, &opts),
                        Ok(_) => {}
                        Err(e) => error!("{}: dispatch failed: {e}", s.attachment.target()),
                    }
                }
            }

            // hold the device only while a suppressed session runs
            let want = s.attachment.prevent_default() && s.attachment.is_tracking();
            if want && !s.grabbed {
                match s.dev.grab() {
                    Ok(()) => {
                        s.grabbed = true;
                        info!("{}: grabbed (two fingers down)", s.attachment.target());
                    }
                    Err(e) => warn!("{}: grab failed: {e}", s.attachment.target()),
                }
            } else if !want && s.grabbed {
                let _ = s.dev.ungrab();
                s.grabbed = false;
                info!("{}: released", s.attachment.target());
            }
        }

        let now = clock.now_ms();
        for s in surfaces.iter_mut() {
            if let Err(e) = s.attachment.poll(now) {
                error!("{}: deferred tap failed: {e}", s.attachment.target());
            }
        }

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }

    for s in surfaces.iter_mut().filter(|s| s.grabbed) {
        let _ = s.dev.ungrab();
    }
    info!("daemon: shutting down");
    Ok(())
}

use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, fs, path::PathBuf};

use pinchzoom::config::{self, Profile};
use pinchzoom::daemon::{self, DaemonOptions};
use pinchzoom::tracker::{Session, TouchPoint};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            match topic {
                Some(t) => print_subcmd_help(&t),
                None => print_help(),
            }
            Ok(())
        }

        Some("run") => {
            let path: Option<PathBuf> = pargs.opt_value_from_str("--profile")?;
            let json = pargs.contains("--json");
            let profile = match path {
                Some(p) => Profile::load(&p)?,
                None => Profile::load_or_install_default()?,
            };
            daemon::run(profile, DaemonOptions { json })
        }

        Some("devices") => {
            let devices = pinchzoom::input::probe_devices();
            let report = serde_json::json!({
                "devices": devices,
                "uinput_present": PathBuf::from("/dev/uinput").exists(),
                "input_group_member": check_in_input_group(),
                "hints": {
                    "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
                }
            });
            print_json(&report);
            Ok(())
        }

        Some("check") => {
            let path: PathBuf = match pargs.opt_free_from_str()? {
                Some(p) => p,
                None => config::default_profile_path()?,
            };
            let profile = Profile::load(&path)?;
            println!(
                "ok: profile '{}' at {} (move_x={}, move_y={}, prevent_default={})",
                profile.display_name(),
                path.display(),
                profile.gesture.move_x,
                profile.gesture.move_y,
                profile.gesture.prevent_default
            );
            Ok(())
        }

        Some("classify") => {
            // usage: pinchzoom classify AX AY BX BY AX2 AY2 BX2 BY2 MS
            let usage = "usage: pinchzoom classify AX AY BX BY AX2 AY2 BX2 BY2 MS";
            // options first; pico-args wants free args last
            let settings = match pargs.opt_value_from_str::<_, PathBuf>("--profile")? {
                Some(p) => Profile::load(&p)?.gesture,
                None => config::Settings::default(),
            };
            let mut coord = || -> Result<f64> {
                pargs.free_from_str().map_err(|_| anyhow!(usage))
            };
            let a0 = TouchPoint::new(coord()?, coord()?);
            let b0 = TouchPoint::new(coord()?, coord()?);
            let a1 = TouchPoint::new(coord()?, coord()?);
            let b1 = TouchPoint::new(coord()?, coord()?);
            let ms: u64 = pargs.free_from_str().map_err(|_| anyhow!(usage))?;

            let mut session = Session::begin("cli", a0, b0, 0);
            session.a_cur = a1;
            session.b_cur = b1;
            let result = pinchzoom::classify(&session, ms, &settings);
            print_json(&serde_json::to_value(&result)?);
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"pinchzoom — two-finger pinch recognizer for Linux touchpads

USAGE:
  pinchzoom help [command]               Show general or command-specific help
  pinchzoom run [--profile PATH] [--json]
                                         Recognize pinches until interrupted
  pinchzoom devices                      List touch devices and permissions
  pinchzoom check [PATH]                 Validate a profile
  pinchzoom classify AX AY BX BY AX2 AY2 BX2 BY2 MS [--profile PATH]
                                         Classify one session offline

TIPS:
  - Profile: ~/.config/pinchzoom/profile.toml (installed on first run)
  - RUST_LOG=pinchzoom=trace shows every touch sample
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: pinchzoom run [--profile PATH] [--json]\nReads multitouch devices and runs the bound actions. --json prints each finished session."
        ),
        "devices" => println!(
            "usage: pinchzoom devices\nLists devices with absolute axes, whether they are multitouch, and uinput access."
        ),
        "check" => println!(
            "usage: pinchzoom check [PATH]\nParses and validates a profile (default: the user profile)."
        ),
        "classify" => println!(
            "usage: pinchzoom classify AX AY BX BY AX2 AY2 BX2 BY2 MS [--profile PATH]\nStart and end positions of fingers a and b, then the duration in ms."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_json(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .filter_map(|line| line.split(':').nth(3))
        .any(|members| members.split(',').any(|u| u == user))
}

use anyhow::{Result, anyhow};
use log::{info, warn};
use serde::Deserialize;
use std::{cell::RefCell, fmt, rc::Rc, str::FromStr};

/// Re-issues the platform's default activation (a click) on a target.
pub trait Activator<T> {
    fn activate(&self, target: &T) -> Result<()>;
}

/// For adapters that have no native action to give back.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopActivator;

impl<T> Activator<T> for NoopActivator {
    fn activate(&self, _target: &T) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyToken {
    Ctrl,
    Alt,
    Shift,
    Super,
    Tab,
    Minus,
    Equal,
}

impl FromStr for KeyToken {
    type Err = anyhow::Error;

    fn from_str(tok: &str) -> Result<Self> {
        let k = match tok.trim().to_ascii_uppercase().as_str() {
            "CTRL" | "CONTROL" => Self::Ctrl,
            "ALT" => Self::Alt,
            "SHIFT" => Self::Shift,
            "SUPER" | "META" | "WIN" => Self::Super,
            "TAB" => Self::Tab,
            "MINUS" | "-" => Self::Minus,
            "EQUAL" | "=" => Self::Equal,
            other => return Err(anyhow!("unsupported key token: {other}")),
        };
        Ok(k)
    }
}

/// What a binding does when its gesture fires.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Action {
    None,
    Mouse(MouseButton),
    Scroll(i32),
    Key(Vec<KeyToken>),
}

impl Action {
    /// Build a chord action from a literal known to be valid.
    pub(crate) fn key_chord(chord: &str) -> Self {
        chord.parse().unwrap_or(Action::None)
    }
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "none" {
            return Ok(Action::None);
        }
        if let Some(rest) = s.strip_prefix("mouse:") {
            let btn = match rest.trim().to_ascii_lowercase().as_str() {
                "left" => MouseButton::Left,
                "right" => MouseButton::Right,
                "middle" => MouseButton::Middle,
                other => return Err(anyhow!("unknown mouse button: {other}")),
            };
            return Ok(Action::Mouse(btn));
        }
        if let Some(rest) = s.strip_prefix("scroll:") {
            let steps: i32 = rest
                .trim()
                .parse()
                .map_err(|_| anyhow!("scroll steps must be an integer, got '{rest}'"))?;
            return Ok(Action::Scroll(steps));
        }
        if let Some(rest) = s.strip_prefix("key:") {
            let keys = rest
                .split('+')
                .map(KeyToken::from_str)
                .collect::<Result<Vec<_>>>()?;
            return Ok(Action::Key(keys));
        }
        Err(anyhow!("invalid action '{s}'"))
    }
}

impl TryFrom<String> for Action {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::None => write!(f, "none"),
            Action::Mouse(b) => write!(f, "mouse:{}", format!("{b:?}").to_ascii_lowercase()),
            Action::Scroll(n) => write!(f, "scroll:{n}"),
            Action::Key(keys) => {
                let names: Vec<_> = keys
                    .iter()
                    .map(|k| format!("{k:?}").to_ascii_uppercase())
                    .collect();
                write!(f, "key:{}", names.join("+"))
            }
        }
    }
}

pub struct UinputSink {
    #[allow(dead_code)]
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self {
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self { linux: None })
        }
    }

    pub fn noop() -> Self {
        Self { linux: None }
    }

    pub fn is_noop(&self) -> bool {
        self.linux.is_none()
    }

    pub fn run(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::None => Ok(()),
            Action::Mouse(b) => self.click_mouse(*b),
            Action::Scroll(steps) => self.scroll_vertical(*steps),
            Action::Key(keys) => self.key_chord(keys),
        }
    }

    pub fn scroll_vertical(&mut self, steps: i32) -> Result<()> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.scroll_vertical(steps)?;
        }
        Ok(())
    }

    pub fn click_mouse(&mut self, which: MouseButton) -> Result<()> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.click(which)?;
        }
        Ok(())
    }

    /// Press every key in order, then release in reverse.
    pub fn key_chord(&mut self, keys: &[KeyToken]) -> Result<()> {
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            for k in keys {
                dev.key_send(map_key(*k), 1)?;
            }
            dev.sync()?;
            for k in keys.iter().rev() {
                dev.key_send(map_key(*k), 0)?;
            }
            dev.sync()?;
        }
        Ok(())
    }
}

/// Runs a bound action through a shared sink whenever a tap is re-issued.
pub struct ActionActivator {
    sink: Rc<RefCell<UinputSink>>,
    action: Action,
}

impl ActionActivator {
    pub fn new(sink: Rc<RefCell<UinputSink>>, action: Action) -> Self {
        Self { sink, action }
    }
}

impl<T> Activator<T> for ActionActivator {
    fn activate(&self, _target: &T) -> Result<()> {
        self.sink.borrow_mut().run(&self.action)
    }
}

#[cfg(target_os = "linux")]
fn map_key(tok: KeyToken) -> uinput::event::keyboard::Key {
    use uinput::event::keyboard::Key as K;
    match tok {
        KeyToken::Ctrl => K::LeftControl,
        KeyToken::Alt => K::LeftAlt,
        KeyToken::Shift => K::LeftShift,
        KeyToken::Super => K::LeftMeta,
        KeyToken::Tab => K::Tab,
        KeyToken::Minus => K::Minus,
        KeyToken::Equal => K::Equal,
    }
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        use uinput::event::{controller::Mouse, keyboard, relative};

        let dev = uinput::default()?
            .name("Pinchzoom Virtual Input")?
            .event(relative::Position::X)?
            .event(relative::Position::Y)?
            .event(relative::Wheel::Vertical)?
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?
            .event(keyboard::Key::LeftControl)?
            .event(keyboard::Key::LeftAlt)?
            .event(keyboard::Key::LeftShift)?
            .event(keyboard::Key::LeftMeta)?
            .event(keyboard::Key::Tab)?
            .event(keyboard::Key::Minus)?
            .event(keyboard::Key::Equal)?
            .create()?;

        info!("uinput: created virtual device");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn key_send(&mut self, key: uinput::event::keyboard::Key, val: i32) -> Result<()> {
        self.dev.send(key, val)?;
        Ok(())
    }

    fn click(&mut self, which: MouseButton) -> Result<()> {
        use uinput::event::controller::Mouse;
        let button = || match which {
            MouseButton::Left => Mouse::Left,
            MouseButton::Right => Mouse::Right,
            MouseButton::Middle => Mouse::Middle,
        };
        self.dev.send(button(), 1)?;
        self.sync()?;
        self.dev.send(button(), 0)?;
        self.sync()
    }

    fn scroll_vertical(&mut self, steps: i32) -> Result<()> {
        use uinput::event::relative::Wheel;
        self.dev.send(Wheel::Vertical, steps)?;
        self.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bindings() {
        assert_eq!("mouse:left".parse::<Action>().unwrap(), Action::Mouse(MouseButton::Left));
        assert_eq!(" scroll:-3 ".parse::<Action>().unwrap(), Action::Scroll(-3));
        assert_eq!(
            "key:ctrl+=".parse::<Action>().unwrap(),
            Action::Key(vec![KeyToken::Ctrl, KeyToken::Equal])
        );
        assert_eq!("none".parse::<Action>().unwrap(), Action::None);
        assert_eq!("".parse::<Action>().unwrap(), Action::None);
    }

    #[test]
    fn rejects_bad_bindings() {
        assert!("mouse:fourth".parse::<Action>().is_err());
        assert!("scroll:lots".parse::<Action>().is_err());
        assert!("key:CTRL+F13".parse::<Action>().is_err());
        assert!("cmd:rm -rf".parse::<Action>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for s in ["none", "mouse:middle", "scroll:2", "key:CTRL+SHIFT+TAB"] {
            let a: Action = s.parse().unwrap();
            assert_eq!(a.to_string(), s);
        }
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let sink = Rc::new(RefCell::new(UinputSink::noop()));
        assert!(sink.borrow().is_noop());
        let act = ActionActivator::new(sink, Action::Mouse(MouseButton::Left));
        Activator::<u32>::activate(&act, &1).unwrap();
        Activator::<&str>::activate(&NoopActivator, &"x").unwrap();
    }
}

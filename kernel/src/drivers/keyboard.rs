/// PS/2 keyboard — IRQ 1, set-1 scancodes.
///
/// The decode state machine is pure: it tracks the shift and caps-lock
/// modifiers and turns make codes into key events. The IRQ glue reads the
/// scancode from port 0x60 and prints whatever decodes.
#[cfg(target_arch = "x86")]
use crate::interrupts::irq::IRQ_REGISTRY;
#[cfg(target_arch = "x86")]
use crate::interrupts::Iregs;
use spin::Mutex;

pub const DATA_PORT: u16 = 0x60;
pub const STATUS_PORT: u16 = 0x64;

/// Bit 7 of a set-1 scancode marks a key release (break code).
const RELEASE_MASK: u8 = 0x80;
const SCANCODE_MASK: u8 = 0x7F;

const SC_LSHIFT: u8 = 0x2A;
const SC_RSHIFT: u8 = 0x36;
const SC_CAPSLOCK: u8 = 0x3A;
const SC_LCTRL: u8 = 0x1D;
const SC_BACKSPACE: u8 = 0x0E;
const SC_ENTER: u8 = 0x1C;
const SC_ESC: u8 = 0x01;
const SC_LALT: u8 = 0x38;
const SC_SPACE: u8 = 0x39;
const SC_TAB: u8 = 0x0F;

/// A decoded key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    /// Printable ASCII, case already applied.
    Char(u8),
    /// Named non-printable key.
    Special(&'static str),
}

#[derive(Clone, Copy)]
pub struct KeyboardState {
    shift_held: bool,
    caps_lock: bool,
}

impl KeyboardState {
    pub const fn new() -> Self {
        Self {
            shift_held: false,
            caps_lock: false,
        }
    }

    /// Feed one scancode through the state machine. Modifier codes update
    /// state and yield nothing; other codes yield an event on press only.
    pub fn handle_scancode(&mut self, code: u8, released: bool) -> Option<KeyEvent> {
        match code {
            SC_LSHIFT | SC_RSHIFT => {
                self.shift_held = !released;
                None
            }
            SC_CAPSLOCK => {
                if !released {
                    self.caps_lock = !self.caps_lock;
                }
                None
            }
            _ if released => None,
            _ => special_name(code)
                .map(KeyEvent::Special)
                .or_else(|| printable(code).map(|c| KeyEvent::Char(self.apply_case(c)))),
        }
    }

    fn apply_case(&self, c: u8) -> u8 {
        if c.is_ascii_lowercase() && (self.shift_held ^ self.caps_lock) {
            c - 0x20
        } else {
            c
        }
    }
}

/// QWERTY map for the printable keys the kernel cares about.
fn printable(code: u8) -> Option<u8> {
    let c = match code {
        0x02 => b'1',
        0x03 => b'2',
        0x04 => b'3',
        0x05 => b'4',
        0x06 => b'5',
        0x07 => b'6',
        0x08 => b'7',
        0x09 => b'8',
        0x0A => b'9',
        0x0B => b'0',
        0x10 => b'q',
        0x11 => b'w',
        0x12 => b'e',
        0x13 => b'r',
        0x14 => b't',
        0x15 => b'y',
        0x16 => b'u',
        0x17 => b'i',
        0x18 => b'o',
        0x19 => b'p',
        0x1E => b'a',
        0x1F => b's',
        0x20 => b'd',
        0x21 => b'f',
        0x22 => b'g',
        0x23 => b'h',
        0x24 => b'j',
        0x25 => b'k',
        0x26 => b'l',
        0x2C => b'z',
        0x2D => b'x',
        0x2E => b'c',
        0x2F => b'v',
        0x30 => b'b',
        0x31 => b'n',
        0x32 => b'm',
        _ => return None,
    };
    Some(c)
}

fn special_name(code: u8) -> Option<&'static str> {
    let name = match code {
        SC_LCTRL => "LCTRL",
        SC_BACKSPACE => "BACKSPACE",
        SC_ENTER => "ENTER",
        SC_ESC => "ESC",
        SC_LALT => "LALT",
        SC_SPACE => "SPACE",
        SC_TAB => "TAB",
        _ => return None,
    };
    Some(name)
}

pub static KEYBOARD: Mutex<KeyboardState> = Mutex::new(KeyboardState::new());

/// IRQ 1 handler: read the scancode and the press/release bit, decode,
/// print.
#[cfg(target_arch = "x86")]
fn on_irq1(_frame: &mut Iregs) {
    use crate::arch::x86::inb;

    let code = inb(DATA_PORT) & SCANCODE_MASK;
    let released = inb(DATA_PORT) & RELEASE_MASK != 0;

    match KEYBOARD.lock().handle_scancode(code, released) {
        Some(KeyEvent::Char(c)) => crate::serial_println!("'{}'", c as char),
        Some(KeyEvent::Special(name)) => crate::serial_println!("[{}]", name),
        None => {}
    }
}

/// Reset the modifier state and install the IRQ 1 handler.
#[cfg(target_arch = "x86")]
pub fn init() {
    *KEYBOARD.lock() = KeyboardState::new();
    IRQ_REGISTRY.lock().install(1, on_irq1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(state: &mut KeyboardState, code: u8) -> Option<KeyEvent> {
        state.handle_scancode(code, false)
    }

    fn release(state: &mut KeyboardState, code: u8) -> Option<KeyEvent> {
        state.handle_scancode(code, true)
    }

    #[test]
    fn shift_uppercases_while_held() {
        let mut kb = KeyboardState::new();
        assert_eq!(press(&mut kb, SC_LSHIFT), None);
        assert_eq!(press(&mut kb, 0x1E), Some(KeyEvent::Char(b'A')));
        assert_eq!(release(&mut kb, SC_LSHIFT), None);
        assert_eq!(press(&mut kb, 0x1E), Some(KeyEvent::Char(b'a')));
    }

    #[test]
    fn caps_lock_latches_on_press_only() {
        let mut kb = KeyboardState::new();
        assert_eq!(press(&mut kb, SC_CAPSLOCK), None);
        assert_eq!(release(&mut kb, SC_CAPSLOCK), None);
        assert_eq!(press(&mut kb, 0x1E), Some(KeyEvent::Char(b'A')));
        // A second press toggles back off
        press(&mut kb, SC_CAPSLOCK);
        assert_eq!(press(&mut kb, 0x1E), Some(KeyEvent::Char(b'a')));
    }

    #[test]
    fn shift_and_caps_cancel_out() {
        let mut kb = KeyboardState::new();
        press(&mut kb, SC_CAPSLOCK);
        press(&mut kb, SC_LSHIFT);
        assert_eq!(press(&mut kb, 0x10), Some(KeyEvent::Char(b'q')));
    }

    #[test]
    fn digits_ignore_modifiers() {
        let mut kb = KeyboardState::new();
        press(&mut kb, SC_LSHIFT);
        assert_eq!(press(&mut kb, 0x02), Some(KeyEvent::Char(b'1')));
    }

    #[test]
    fn release_emits_nothing() {
        let mut kb = KeyboardState::new();
        assert_eq!(release(&mut kb, 0x1E), None);
    }

    #[test]
    fn special_keys_are_named() {
        let mut kb = KeyboardState::new();
        assert_eq!(press(&mut kb, SC_ENTER), Some(KeyEvent::Special("ENTER")));
        assert_eq!(press(&mut kb, SC_TAB), Some(KeyEvent::Special("TAB")));
        assert_eq!(press(&mut kb, 0x7F), None); // unmapped
    }
}

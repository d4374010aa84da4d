//! Input Injection Module
//!
//! Synthetic keyboard and mouse input through the Windows SendInput API. Every
//! primitive is a single synchronous OS call with no retry; sequencing and
//! timing belong to the orchestrator.
//!
//! Text goes out as Unicode key events, never through the clipboard.

use crate::error::InputError;
use crate::locator::WindowHandle;
use std::fmt;
use std::time::Duration;

#[cfg(target_os = "windows")]
use std::thread;
#[cfg(target_os = "windows")]
use tracing::{debug, error, warn};
#[cfg(target_os = "windows")]
use zeroize::Zeroizing;

#[cfg(target_os = "windows")]
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEINPUT,
    MOUSE_EVENT_FLAGS, VIRTUAL_KEY, VK_CONTROL, VK_DELETE, VK_MENU, VK_RETURN, VK_SHIFT, VK_TAB,
};

/// Delay between keystrokes in milliseconds
const KEYSTROKE_DELAY_MS: u64 = 5;

/// Screen coordinates of the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// Window bounds in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WindowRect {
    /// Point at `(dx, dy)` from the top-left corner
    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position {
            x: self.left + dx,
            y: self.top + dy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Enter,
    Delete,
    /// A letter or digit, sent by virtual-key code
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

/// A key pressed while holding zero or more modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl KeyChord {
    pub const TAB: KeyChord = KeyChord::plain(Key::Tab);
    pub const ENTER: KeyChord = KeyChord::plain(Key::Enter);
    pub const DELETE: KeyChord = KeyChord::plain(Key::Delete);
    pub const SELECT_ALL: KeyChord = KeyChord::ctrl(Key::Char('a'));

    pub const fn plain(key: Key) -> Self {
        Self {
            modifiers: Modifiers {
                ctrl: false,
                alt: false,
                shift: false,
            },
            key,
        }
    }

    pub const fn ctrl(key: Key) -> Self {
        Self {
            modifiers: Modifiers {
                ctrl: true,
                alt: false,
                shift: false,
            },
            key,
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt+")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift+")?;
        }
        match self.key {
            Key::Tab => f.write_str("Tab"),
            Key::Enter => f.write_str("Enter"),
            Key::Delete => f.write_str("Delete"),
            Key::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
        }
    }
}

/// Low-level input primitives
pub trait InputDriver: Send + Sync {
    /// Bring the window to the foreground
    fn focus_window(&self, window: WindowHandle) -> Result<(), InputError>;

    fn window_rect(&self, window: WindowHandle) -> Result<WindowRect, InputError>;

    /// Move the pointer and press+release the left button.
    ///
    /// Callers go through [`click_preserving_pointer`] so the user's pointer
    /// ends up where it was.
    fn click_at(&self, x: i32, y: i32) -> Result<(), InputError>;

    fn send_key_chord(&self, chord: KeyChord) -> Result<(), InputError>;

    /// Type `text` into whatever control currently has keyboard focus
    fn send_text(&self, text: &str) -> Result<(), InputError>;

    fn capture_pointer_position(&self) -> Result<Position, InputError>;

    fn restore_pointer_position(&self, position: Position);
}

/// Puts the pointer back where it was when the guard was created
pub struct PointerGuard<'a, D: InputDriver + ?Sized> {
    driver: &'a D,
    position: Position,
}

impl<'a, D: InputDriver + ?Sized> PointerGuard<'a, D> {
    pub fn capture(driver: &'a D) -> Result<Self, InputError> {
        let position = driver.capture_pointer_position()?;
        Ok(Self { driver, position })
    }
}

impl<D: InputDriver + ?Sized> Drop for PointerGuard<'_, D> {
    fn drop(&mut self) {
        self.driver.restore_pointer_position(self.position);
    }
}

/// Click at `(x, y)` and restore the pointer, whatever the click returned.
/// No click is issued if the current position can't be read.
pub fn click_preserving_pointer<D: InputDriver + ?Sized>(
    driver: &D,
    x: i32,
    y: i32,
) -> Result<(), InputError> {
    let _guard = PointerGuard::capture(driver)?;
    driver.click_at(x, y)
}

/// Input driver that uses SendInput
pub struct SendInputDriver {
    /// Delay between keystrokes
    #[cfg_attr(not(target_os = "windows"), allow(dead_code))]
    keystroke_delay: Duration,
}

impl SendInputDriver {
    /// Create a new driver with default settings
    pub fn new() -> Self {
        Self {
            keystroke_delay: Duration::from_millis(KEYSTROKE_DELAY_MS),
        }
    }
}

impl Default for SendInputDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "windows")]
fn to_hwnd(window: WindowHandle) -> windows::Win32::Foundation::HWND {
    windows::Win32::Foundation::HWND(window.0 as *mut core::ffi::c_void)
}

#[cfg(target_os = "windows")]
fn keyboard_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

#[cfg(target_os = "windows")]
fn send_inputs(inputs: &[INPUT], what: &str) -> Result<(), InputError> {
    // SendInput returns the number of events successfully inserted
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        error!("SendInput failed for {}", what);
        return Err(InputError::InjectionFailed(format!(
            "SendInput inserted {} of {} events for {}",
            sent,
            inputs.len(),
            what
        )));
    }
    Ok(())
}

#[cfg(target_os = "windows")]
fn virtual_key(key: Key) -> Result<VIRTUAL_KEY, InputError> {
    match key {
        Key::Tab => Ok(VK_TAB),
        Key::Enter => Ok(VK_RETURN),
        Key::Delete => Ok(VK_DELETE),
        // VK codes for A-Z and 0-9 equal their uppercase ASCII values
        Key::Char(c) if c.is_ascii_alphanumeric() => {
            Ok(VIRTUAL_KEY(c.to_ascii_uppercase() as u16))
        }
        Key::Char(c) => Err(InputError::InjectionFailed(format!(
            "no virtual key for '{}'",
            c
        ))),
    }
}

#[cfg(target_os = "windows")]
impl SendInputDriver {
    /// Release all modifier keys (Ctrl, Alt, Shift)
    /// so a key still held by the user can't turn Tab into Alt+Tab
    fn release_modifiers(&self) -> Result<(), InputError> {
        let inputs: Vec<INPUT> = [VK_CONTROL, VK_MENU, VK_SHIFT]
            .into_iter()
            .map(|vk| keyboard_input(vk, 0, KEYEVENTF_KEYUP))
            .collect();
        send_inputs(&inputs, "modifier release")?;

        // Small delay to ensure keys are released
        thread::sleep(Duration::from_millis(30));
        Ok(())
    }

    /// Send a single character as a Unicode key down/up pair.
    /// Characters outside the BMP go out as two surrogate units.
    fn send_unicode_char(&self, ch: char) -> Result<(), InputError> {
        // Text is usually a password; don't leave its code units on the stack
        let mut units = Zeroizing::new([0u16; 2]);
        for &unit in ch.encode_utf16(&mut *units).iter() {
            let inputs = [
                keyboard_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE),
                keyboard_input(VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE | KEYEVENTF_KEYUP),
            ];
            send_inputs(&inputs, "character")?;
        }
        Ok(())
    }
}

#[cfg(target_os = "windows")]
impl InputDriver for SendInputDriver {
    fn focus_window(&self, window: WindowHandle) -> Result<(), InputError> {
        use windows::Win32::UI::WindowsAndMessaging::SetForegroundWindow;

        if window.0 == 0 {
            return Err(InputError::WindowFailed("null window handle".to_string()));
        }

        // Windows may refuse foreground activation; the focus click that
        // follows is what actually moves keyboard focus in that case
        let activated = unsafe { SetForegroundWindow(to_hwnd(window)) };
        if !activated.as_bool() {
            warn!("SetForegroundWindow refused for {:?}", window);
        }
        Ok(())
    }

    fn window_rect(&self, window: WindowHandle) -> Result<WindowRect, InputError> {
        use windows::Win32::Foundation::RECT;
        use windows::Win32::UI::WindowsAndMessaging::GetWindowRect;

        let mut rect = RECT::default();
        unsafe { GetWindowRect(to_hwnd(window), &mut rect) }.map_err(|e| {
            InputError::WindowFailed(format!("could not get window dimensions: {}", e))
        })?;

        Ok(WindowRect {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        })
    }

    fn click_at(&self, x: i32, y: i32) -> Result<(), InputError> {
        use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

        debug!("Clicking at ({}, {})", x, y);
        unsafe { SetCursorPos(x, y) }
            .map_err(|e| InputError::InjectionFailed(format!("SetCursorPos failed: {}", e)))?;

        let button = |flags: MOUSE_EVENT_FLAGS| INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: 0,
                    dy: 0,
                    mouseData: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        send_inputs(
            &[button(MOUSEEVENTF_LEFTDOWN), button(MOUSEEVENTF_LEFTUP)],
            "mouse click",
        )
    }

    fn send_key_chord(&self, chord: KeyChord) -> Result<(), InputError> {
        self.release_modifiers()?;
        debug!("Pressing {}", chord);

        let vk = virtual_key(chord.key)?;
        let held: Vec<VIRTUAL_KEY> = [
            (chord.modifiers.ctrl, VK_CONTROL),
            (chord.modifiers.alt, VK_MENU),
            (chord.modifiers.shift, VK_SHIFT),
        ]
        .into_iter()
        .filter_map(|(on, vk)| on.then_some(vk))
        .collect();

        let none = KEYBD_EVENT_FLAGS(0);
        let mut inputs: Vec<INPUT> = held.iter().map(|&m| keyboard_input(m, 0, none)).collect();
        inputs.push(keyboard_input(vk, 0, none));
        inputs.push(keyboard_input(vk, 0, KEYEVENTF_KEYUP));
        inputs.extend(held.iter().rev().map(|&m| keyboard_input(m, 0, KEYEVENTF_KEYUP)));

        send_inputs(&inputs, "key chord")
    }

    fn send_text(&self, text: &str) -> Result<(), InputError> {
        self.release_modifiers()?;
        debug!("Typing {} characters", text.chars().count());

        for ch in text.chars() {
            self.send_unicode_char(ch)?;
            thread::sleep(self.keystroke_delay);
        }
        Ok(())
    }

    fn capture_pointer_position(&self) -> Result<Position, InputError> {
        use windows::Win32::Foundation::POINT;
        use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }
            .map_err(|e| InputError::InjectionFailed(format!("GetCursorPos failed: {}", e)))?;
        Ok(Position {
            x: point.x,
            y: point.y,
        })
    }

    fn restore_pointer_position(&self, position: Position) {
        use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

        if let Err(e) = unsafe { SetCursorPos(position.x, position.y) } {
            warn!("Could not restore pointer to {:?}: {}", position, e);
        }
    }
}

// Non-Windows stub implementation
#[cfg(not(target_os = "windows"))]
impl InputDriver for SendInputDriver {
    fn focus_window(&self, _window: WindowHandle) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }

    fn window_rect(&self, _window: WindowHandle) -> Result<WindowRect, InputError> {
        Err(InputError::Unsupported)
    }

    fn click_at(&self, _x: i32, _y: i32) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }

    fn send_key_chord(&self, _chord: KeyChord) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }

    fn send_text(&self, _text: &str) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }

    fn capture_pointer_position(&self) -> Result<Position, InputError> {
        Err(InputError::Unsupported)
    }

    fn restore_pointer_position(&self, _position: Position) {}
}

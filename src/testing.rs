//! Scripted stand-ins for the OS, shared by the unit tests

use crate::error::InputError;
use crate::input_injector::{InputDriver, KeyChord, Position, WindowRect};
use crate::locator::{ProcessHost, WindowHandle};
use crate::notifier::{Notifier, Severity};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const FAKE_PID: u32 = 4242;
pub const FAKE_WINDOW: WindowHandle = WindowHandle(0x1A2B);
pub const FAKE_RECT: WindowRect = WindowRect {
    left: 300,
    top: 200,
    right: 1580,
    bottom: 920,
};

#[derive(Default)]
struct HostState {
    running: bool,
    existing: Vec<PathBuf>,
    appear_after_polls: Option<usize>,
    polls_since_launch: usize,
    process_checks: usize,
    launched: Vec<(PathBuf, String)>,
    launch_error: Option<String>,
    has_window: bool,
    window_after_lookups: usize,
    window_lookups: usize,
}

/// Process table and filesystem driven by a script
pub struct FakeHost {
    state: Mutex<HostState>,
}

impl FakeHost {
    /// Client already running with its window up
    pub fn running() -> Self {
        Self {
            state: Mutex::new(HostState {
                running: true,
                has_window: true,
                ..HostState::default()
            }),
        }
    }

    /// Client not running; `existing` are the executables present on disk.
    /// A launched client never shows up unless `appearing_after` is set.
    pub fn absent(existing: &[&str]) -> Self {
        Self {
            state: Mutex::new(HostState {
                existing: existing.iter().map(PathBuf::from).collect(),
                has_window: true,
                ..HostState::default()
            }),
        }
    }

    /// After a launch, the process shows up on check number `polls + 1`
    pub fn appearing_after(self, polls: usize) -> Self {
        self.state.lock().unwrap().appear_after_polls = Some(polls);
        self
    }

    pub fn failing_launch(self, message: &str) -> Self {
        self.state.lock().unwrap().launch_error = Some(message.to_string());
        self
    }

    /// The first `lookups` window queries come back empty
    pub fn window_after_lookups(self, lookups: usize) -> Self {
        self.state.lock().unwrap().window_after_lookups = lookups;
        self
    }

    pub fn without_window(self) -> Self {
        self.state.lock().unwrap().has_window = false;
        self
    }

    pub fn launched(&self) -> Vec<(PathBuf, String)> {
        self.state.lock().unwrap().launched.clone()
    }

    pub fn process_checks(&self) -> usize {
        self.state.lock().unwrap().process_checks
    }

    pub fn window_lookups(&self) -> usize {
        self.state.lock().unwrap().window_lookups
    }
}

impl ProcessHost for FakeHost {
    fn find_processes(&self, _name: &str) -> Vec<u32> {
        let mut state = self.state.lock().unwrap();
        state.process_checks += 1;

        if !state.running && !state.launched.is_empty() {
            state.polls_since_launch += 1;
            if let Some(after) = state.appear_after_polls {
                if state.polls_since_launch > after {
                    state.running = true;
                }
            }
        }

        if state.running {
            vec![FAKE_PID]
        } else {
            Vec::new()
        }
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.state.lock().unwrap().existing.iter().any(|p| p == path)
    }

    fn launch(&self, path: &Path, args: &str) -> std::io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(ref message) = state.launch_error {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                message.clone(),
            ));
        }
        state.launched.push((path.to_path_buf(), args.to_string()));
        Ok(())
    }

    fn main_window(&self, pids: &[u32]) -> Option<WindowHandle> {
        let mut state = self.state.lock().unwrap();
        state.window_lookups += 1;
        let ready = state.window_lookups > state.window_after_lookups;
        (state.running && state.has_window && ready && pids.contains(&FAKE_PID))
            .then_some(FAKE_WINDOW)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Focus(WindowHandle),
    WindowRect(WindowHandle),
    CapturePointer,
    Click(i32, i32),
    RestorePointer(Position),
    Chord(KeyChord),
    Text(String),
}

#[derive(Default)]
struct DriverFailures {
    capture: bool,
    click: bool,
    window_rect: bool,
    text: bool,
}

/// Input driver that records every call instead of touching the desktop
pub struct RecordingDriver {
    started: Instant,
    calls: Mutex<Vec<(Duration, DriverCall)>>,
    pointer: Mutex<Position>,
    fail: DriverFailures,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            calls: Mutex::new(Vec::new()),
            pointer: Mutex::new(Self::POINTER_START),
            fail: DriverFailures::default(),
        }
    }

    const POINTER_START: Position = Position { x: 640, y: 360 };

    pub fn pointer_start(&self) -> Position {
        Self::POINTER_START
    }

    pub fn failing_capture(mut self) -> Self {
        self.fail.capture = true;
        self
    }

    pub fn failing_click(mut self) -> Self {
        self.fail.click = true;
        self
    }

    pub fn failing_window_rect(mut self) -> Self {
        self.fail.window_rect = true;
        self
    }

    pub fn failing_text(mut self) -> Self {
        self.fail.text = true;
        self
    }

    fn record(&self, call: DriverCall) {
        let at = self.started.elapsed();
        self.calls.lock().unwrap().push((at, call));
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.timeline().into_iter().map(|(_, call)| call).collect()
    }

    /// Calls with the (virtual) time since the driver was created
    pub fn timeline(&self) -> Vec<(Duration, DriverCall)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pointer(&self) -> Position {
        *self.pointer.lock().unwrap()
    }

    pub fn restore_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, DriverCall::RestorePointer(_)))
            .count()
    }

    pub fn click_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, DriverCall::Click(..)))
            .count()
    }
}

impl InputDriver for RecordingDriver {
    fn focus_window(&self, window: WindowHandle) -> Result<(), InputError> {
        self.record(DriverCall::Focus(window));
        Ok(())
    }

    fn window_rect(&self, window: WindowHandle) -> Result<WindowRect, InputError> {
        self.record(DriverCall::WindowRect(window));
        if self.fail.window_rect {
            return Err(InputError::WindowFailed("window vanished".to_string()));
        }
        Ok(FAKE_RECT)
    }

    fn click_at(&self, x: i32, y: i32) -> Result<(), InputError> {
        self.record(DriverCall::Click(x, y));
        *self.pointer.lock().unwrap() = Position { x, y };
        if self.fail.click {
            return Err(InputError::InjectionFailed("click blocked".to_string()));
        }
        Ok(())
    }

    fn send_key_chord(&self, chord: KeyChord) -> Result<(), InputError> {
        self.record(DriverCall::Chord(chord));
        Ok(())
    }

    fn send_text(&self, text: &str) -> Result<(), InputError> {
        self.record(DriverCall::Text(text.to_string()));
        if self.fail.text {
            return Err(InputError::InjectionFailed("text blocked".to_string()));
        }
        Ok(())
    }

    fn capture_pointer_position(&self) -> Result<Position, InputError> {
        self.record(DriverCall::CapturePointer);
        if self.fail.capture {
            return Err(InputError::InjectionFailed("no cursor".to_string()));
        }
        Ok(self.pointer())
    }

    fn restore_pointer_position(&self, position: Position) {
        self.record(DriverCall::RestorePointer(position));
        *self.pointer.lock().unwrap() = position;
    }
}

/// Notifier that keeps every message
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, Severity)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }
}

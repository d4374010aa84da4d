//! Process Locator
//!
//! Makes sure the Riot Client is running and finds its main window. Process
//! existence and window existence are separate events on Windows: the client
//! can run for seconds before it creates a window, so both are polled with
//! bounded retries.

use crate::config::AppConfig;
use crate::error::LocatorError;
use crate::timings::Timings;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Process name of the Riot Client UI, without the `.exe` suffix
pub const RIOT_CLIENT_PROCESS: &str = "Riot Client";

/// Arguments passed to RiotClientServices.exe when we start it ourselves
pub const RIOT_CLIENT_LAUNCH_ARGS: &str =
    "--launch-product=league_of_legends --launch-patchline=live";

/// What to look for and how to start it
#[derive(Debug, Clone)]
pub struct TargetApp {
    pub process_name: String,
    pub candidate_paths: Vec<PathBuf>,
    pub launch_args: String,
}

impl TargetApp {
    pub fn riot_client(config: &AppConfig) -> Self {
        Self {
            process_name: RIOT_CLIENT_PROCESS.to_string(),
            candidate_paths: config.candidate_paths(),
            launch_args: RIOT_CLIENT_LAUNCH_ARGS.to_string(),
        }
    }
}

/// A running target process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub process_name: String,
    /// Every process id currently carrying the target's name
    pub pids: Vec<u32>,
    /// False when we launched the process during this attempt
    pub was_already_running: bool,
}

/// Raw top-level window handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// OS operations the locator depends on
pub trait ProcessHost: Send + Sync {
    /// Ids of all processes whose name matches, lowest first
    fn find_processes(&self, name: &str) -> Vec<u32>;

    fn file_exists(&self, path: &Path) -> bool;

    /// Start `path` with whitespace-separated `args` and return without waiting
    fn launch(&self, path: &Path, args: &str) -> std::io::Result<()>;

    /// First visible, unowned top-level window belonging to any of `pids`
    fn main_window(&self, pids: &[u32]) -> Option<WindowHandle>;
}

pub struct ProcessLocator<H: ProcessHost> {
    host: H,
    timings: Timings,
}

impl<H: ProcessHost> ProcessLocator<H> {
    pub fn new(host: H, timings: Timings) -> Self {
        Self { host, timings }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Return the running target, launching the first existing candidate if needed
    pub async fn ensure_running(
        &self,
        target: &TargetApp,
        cancel: &CancellationToken,
    ) -> Result<ProcessHandle, LocatorError> {
        let pids = self.host.find_processes(&target.process_name);
        if !pids.is_empty() {
            debug!("'{}' already running (pids {:?})", target.process_name, pids);
            return Ok(ProcessHandle {
                process_name: target.process_name.clone(),
                pids,
                was_already_running: true,
            });
        }

        let exe = target
            .candidate_paths
            .iter()
            .find(|path| self.host.file_exists(path))
            .ok_or_else(|| {
                warn!(
                    "No Riot Client executable among {} candidates",
                    target.candidate_paths.len()
                );
                LocatorError::ExecutableNotFound {
                    tried: target.candidate_paths.len(),
                }
            })?;

        info!("Launching {}", exe.display());
        self.host
            .launch(exe, &target.launch_args)
            .map_err(|e| LocatorError::LaunchFailed {
                path: exe.display().to_string(),
                reason: e.to_string(),
            })?;

        for attempt in 1..=self.timings.poll_attempts {
            let pids = self.host.find_processes(&target.process_name);
            if !pids.is_empty() {
                info!(
                    "'{}' appeared after {} checks",
                    target.process_name, attempt
                );
                return Ok(ProcessHandle {
                    process_name: target.process_name.clone(),
                    pids,
                    was_already_running: false,
                });
            }
            pause(self.timings.poll_interval, cancel).await?;
        }

        warn!(
            "'{}' did not appear within {:?}",
            target.process_name,
            self.timings.max_poll_duration()
        );
        Err(LocatorError::LaunchTimeout {
            attempts: self.timings.poll_attempts,
        })
    }

    /// Find the main window, after a warm-up if the process was just launched
    pub async fn wait_for_window(
        &self,
        process: &ProcessHandle,
        settle_delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<WindowHandle, LocatorError> {
        if !process.was_already_running {
            debug!("Fresh launch, settling for {:?}", settle_delay);
            pause(settle_delay, cancel).await?;
        }

        if let Some(window) = self.host.main_window(&process.pids) {
            debug!("Found main window {:?}", window);
            return Ok(window);
        }

        debug!("No main window yet, retrying once");
        pause(self.timings.window_retry_delay, cancel).await?;

        // The pid set can change while the client hands off between processes
        let mut pids = self.host.find_processes(&process.process_name);
        if pids.is_empty() {
            pids = process.pids.clone();
        }

        self.host.main_window(&pids).ok_or_else(|| {
            warn!("No main window for '{}'", process.process_name);
            LocatorError::WindowNotFound {
                pid: pids.first().copied().unwrap_or_default(),
            }
        })
    }
}

async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), LocatorError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LocatorError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Compare a process image name against a target name, ignoring `.exe` and case
fn process_name_matches(image_name: &str, wanted: &str) -> bool {
    let stem = image_name
        .len()
        .checked_sub(4)
        .filter(|&cut| image_name.is_char_boundary(cut))
        .filter(|&cut| image_name[cut..].eq_ignore_ascii_case(".exe"))
        .map_or(image_name, |cut| &image_name[..cut]);
    stem.eq_ignore_ascii_case(wanted)
}

/// The real host: sysinfo for processes, Win32 for windows
pub struct SystemProcessHost {
    system: Mutex<System>,
}

impl SystemProcessHost {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProcessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHost for SystemProcessHost {
    fn find_processes(&self, name: &str) -> Vec<u32> {
        let Ok(mut system) = self.system.lock() else {
            warn!("Process table lock poisoned");
            return Vec::new();
        };
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut pids: Vec<u32> = system
            .processes()
            .iter()
            .filter(|(_, process)| process_name_matches(&process.name().to_string_lossy(), name))
            .map(|(pid, _)| pid.as_u32())
            .collect();
        pids.sort_unstable();
        pids
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn launch(&self, path: &Path, args: &str) -> std::io::Result<()> {
        let mut command = std::process::Command::new(path);
        command.args(args.split_whitespace());
        if let Some(dir) = path.parent() {
            command.current_dir(dir);
        }
        // The child is left running on its own
        command.spawn().map(|_| ())
    }

    #[cfg(target_os = "windows")]
    fn main_window(&self, pids: &[u32]) -> Option<WindowHandle> {
        use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
        use windows::Win32::UI::WindowsAndMessaging::{
            EnumWindows, GetWindow, GetWindowThreadProcessId, IsWindowVisible, GW_OWNER,
        };

        unsafe extern "system" fn collect(hwnd: HWND, lparam: LPARAM) -> BOOL {
            let found = &mut *(lparam.0 as *mut Vec<(isize, u32)>);
            if IsWindowVisible(hwnd).as_bool() {
                let owner = GetWindow(hwnd, GW_OWNER).unwrap_or_default();
                if owner.0.is_null() {
                    let mut pid: u32 = 0;
                    GetWindowThreadProcessId(hwnd, Some(&mut pid));
                    found.push((hwnd.0 as isize, pid));
                }
            }
            TRUE
        }

        let mut found: Vec<(isize, u32)> = Vec::new();
        unsafe {
            let _ = EnumWindows(
                Some(collect),
                LPARAM(&mut found as *mut Vec<(isize, u32)> as isize),
            );
        }

        found
            .into_iter()
            .find(|(_, pid)| pids.contains(pid))
            .map(|(raw, _)| WindowHandle(raw))
    }

    #[cfg(not(target_os = "windows"))]
    fn main_window(&self, _pids: &[u32]) -> Option<WindowHandle> {
        None
    }
}

//! Error Types for LoL Account Launcher
//!
//! Each component has its own error enum. `LoginFailure` is the terminal
//! taxonomy of a single login attempt, and `LauncherError` covers everything
//! the command-line front end can run into.

use thiserror::Error;

/// Result type alias using the application error type
pub type Result<T> = std::result::Result<T, LauncherError>;

/// Errors raised by a secret vault backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// The OS refused access to its credential store
    #[error("access to the credential store was denied: {0}")]
    AccessDenied(String),

    /// Any other failure reading or writing the credential store
    #[error("credential storage failure: {0}")]
    StorageFailure(String),
}

/// Errors raised while finding or starting the target process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// None of the candidate executables exist on disk
    #[error("no executable found (tried {tried} candidate paths)")]
    ExecutableNotFound { tried: usize },

    /// Spawning the executable failed
    #[error("failed to launch {path}: {reason}")]
    LaunchFailed { path: String, reason: String },

    /// The process never showed up after launching
    #[error("process did not appear after {attempts} polls")]
    LaunchTimeout { attempts: u32 },

    /// The process exists but has no usable main window
    #[error("no main window found for process {pid}")]
    WindowNotFound { pid: u32 },

    /// The attempt was cancelled while waiting
    #[error("cancelled")]
    Cancelled,
}

/// Errors raised by the input driver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// SendInput (or a sibling call) rejected the events
    #[error("failed to inject input: {0}")]
    InjectionFailed(String),

    /// A window query or activation failed
    #[error("window operation failed: {0}")]
    WindowFailed(String),

    /// Synthetic input is not available on this platform
    #[error("input injection is only supported on Windows")]
    Unsupported,
}

/// Why a login attempt ended without completing the keystroke script
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    #[error("Could not find Riot Client executable. Please start it manually.")]
    ExecutableNotFound,

    #[error("Failed to start Riot Client: {0}")]
    LaunchFailed(String),

    #[error("Riot Client did not start in time.")]
    LaunchTimeout,

    #[error("Could not find the main window of the Riot Client.")]
    WindowNotFound,

    #[error("An error occurred during UI automation: {0}")]
    AutomationError(String),

    #[error("Could not read the saved password: {0}")]
    VaultReadFailed(String),

    /// No secret is stored under the account's key
    #[error("Could not retrieve password.")]
    VaultMissing,

    #[error("Login cancelled.")]
    Cancelled,
}

impl From<LocatorError> for LoginFailure {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::ExecutableNotFound { .. } => LoginFailure::ExecutableNotFound,
            LocatorError::LaunchFailed { reason, .. } => LoginFailure::LaunchFailed(reason),
            LocatorError::LaunchTimeout { .. } => LoginFailure::LaunchTimeout,
            LocatorError::WindowNotFound { .. } => LoginFailure::WindowNotFound,
            LocatorError::Cancelled => LoginFailure::Cancelled,
        }
    }
}

impl From<InputError> for LoginFailure {
    fn from(err: InputError) -> Self {
        LoginFailure::AutomationError(err.to_string())
    }
}

/// Main error type for the application
#[derive(Error, Debug)]
pub enum LauncherError {
    // ===== Vault Errors =====
    /// Credential store error
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    // ===== Account Registry Errors =====
    /// Account database error
    #[error("Account database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No account matches the given id or username
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    // ===== Configuration Errors =====
    /// Settings could not be read or written
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ===== Prompt Errors =====
    /// Interactive input was empty or unreadable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ===== I/O Errors =====
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

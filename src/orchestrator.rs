//! Login Orchestrator
//!
//! Runs one login transaction against the Riot Client:
//!
//! `Idle → EnsuringProcess → LocatingWindow → Focusing → ClearingUsername →
//! TypingUsername → AdvancingField → ClearingPassword → TypingPassword →
//! Submitting → Done`
//!
//! The form is filled by tab navigation from a known baseline rather than by
//! clicking on field coordinates. This assumes the client's tab order stays
//! as it is today; if it changes, input lands in the wrong fields and nothing
//! here can tell.
//!
//! Only one attempt may run at a time since it drives the global pointer and
//! keyboard focus. Callers serialize attempts.

use crate::error::{InputError, LoginFailure};
use crate::input_injector::{click_preserving_pointer, InputDriver, KeyChord};
use crate::locator::{ProcessHost, ProcessLocator, TargetApp, WindowHandle};
use crate::notifier::Severity;
use crate::timings::{Timings, BASELINE_TABS, FOCUS_CLICK_OFFSET};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Message shown when the keystroke script ran to the end
pub const SUCCESS_MESSAGE: &str = "Login request sent.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The scripted sequence completed. Whether the Riot servers accepted the
    /// credentials is not visible from here.
    Success,
    Failed(LoginFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    EnsuringProcess,
    LocatingWindow,
    Focusing,
    ClearingUsername,
    TypingUsername,
    AdvancingField,
    ClearingPassword,
    TypingPassword,
    Submitting,
    Done(Outcome),
}

/// Terminal result of one attempt
#[derive(Debug, Clone)]
pub struct LoginReport {
    pub outcome: Outcome,
    /// Every state visited, in order, ending with `Done`
    pub trail: Vec<AttemptState>,
    pub elapsed: Duration,
}

impl LoginReport {
    /// Report for an attempt turned away before leaving `Idle`
    pub fn rejected(failure: LoginFailure) -> Self {
        warn!("Login rejected before start: {}", failure);
        let outcome = Outcome::Failed(failure);
        Self {
            trail: vec![AttemptState::Idle, AttemptState::Done(outcome.clone())],
            outcome,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn failure(&self) -> Option<&LoginFailure> {
        match self.outcome {
            Outcome::Success => None,
            Outcome::Failed(ref failure) => Some(failure),
        }
    }

    /// Text for the notifier
    pub fn message(&self) -> String {
        match self.outcome {
            Outcome::Success => SUCCESS_MESSAGE.to_string(),
            Outcome::Failed(ref failure) => failure.to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self.outcome {
            Outcome::Success => Severity::Info,
            Outcome::Failed(_) => Severity::Error,
        }
    }
}

/// One in-flight attempt. Never persisted; the password is only borrowed.
struct LoginAttempt<'a> {
    account_username: &'a str,
    password: &'a SecretString,
    start_time: Instant,
    state: AttemptState,
    trail: Vec<AttemptState>,
}

impl<'a> LoginAttempt<'a> {
    fn new(account_username: &'a str, password: &'a SecretString) -> Self {
        Self {
            account_username,
            password,
            start_time: Instant::now(),
            state: AttemptState::Idle,
            trail: vec![AttemptState::Idle],
        }
    }

    fn enter(&mut self, state: AttemptState) {
        debug!("{:?} -> {:?}", self.state, state);
        self.state = state.clone();
        self.trail.push(state);
    }

    fn finish(mut self, outcome: Outcome) -> LoginReport {
        self.enter(AttemptState::Done(outcome.clone()));
        let elapsed = self.start_time.elapsed();
        match outcome {
            Outcome::Success => info!(
                "Login sequence for '{}' completed in {:?}",
                self.account_username, elapsed
            ),
            Outcome::Failed(ref failure) => warn!(
                "Login for '{}' failed after {:?}: {}",
                self.account_username, elapsed, failure
            ),
        }
        LoginReport {
            outcome,
            trail: self.trail,
            elapsed,
        }
    }

    fn fail(self, failure: LoginFailure) -> LoginReport {
        self.finish(Outcome::Failed(failure))
    }
}

pub struct LoginOrchestrator<H: ProcessHost, D: InputDriver> {
    locator: ProcessLocator<H>,
    driver: D,
    target: TargetApp,
    timings: Timings,
}

impl<H: ProcessHost, D: InputDriver> LoginOrchestrator<H, D> {
    pub fn new(host: H, driver: D, target: TargetApp, timings: Timings) -> Self {
        Self {
            locator: ProcessLocator::new(host, timings),
            driver,
            target,
            timings,
        }
    }

    pub fn locator(&self) -> &ProcessLocator<H> {
        &self.locator
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Run one login attempt to completion.
    ///
    /// `cancel` is honoured until the first input reaches the desktop. After
    /// that the sequence always runs to its end or its first error.
    pub async fn run(
        &self,
        account_username: &str,
        password: &SecretString,
        cancel: &CancellationToken,
    ) -> LoginReport {
        let mut attempt = LoginAttempt::new(account_username, password);
        info!("Starting login for '{}'", account_username);

        if cancel.is_cancelled() {
            return attempt.fail(LoginFailure::Cancelled);
        }

        attempt.enter(AttemptState::EnsuringProcess);
        let process = match self.locator.ensure_running(&self.target, cancel).await {
            Ok(process) => process,
            Err(e) => return attempt.fail(e.into()),
        };

        attempt.enter(AttemptState::LocatingWindow);
        let window = match self
            .locator
            .wait_for_window(&process, self.timings.settle_delay, cancel)
            .await
        {
            Ok(window) => window,
            Err(e) => return attempt.fail(e.into()),
        };

        if cancel.is_cancelled() {
            return attempt.fail(LoginFailure::Cancelled);
        }

        match self.fill_login_form(&mut attempt, window).await {
            Ok(()) => attempt.finish(Outcome::Success),
            Err(e) => attempt.fail(e.into()),
        }
    }

    async fn fill_login_form(
        &self,
        attempt: &mut LoginAttempt<'_>,
        window: WindowHandle,
    ) -> Result<(), InputError> {
        let driver = &self.driver;
        let timings = &self.timings;

        attempt.enter(AttemptState::Focusing);
        let rect = driver.window_rect(window)?;
        driver.focus_window(window)?;
        sleep(timings.activation_delay).await;

        let (dx, dy) = FOCUS_CLICK_OFFSET;
        let focus_point = rect.offset(dx, dy);
        click_preserving_pointer(driver, focus_point.x, focus_point.y)?;
        sleep(timings.post_click_delay).await;

        for _ in 0..BASELINE_TABS {
            driver.send_key_chord(KeyChord::TAB)?;
            sleep(timings.tab_delay).await;
        }

        attempt.enter(AttemptState::ClearingUsername);
        self.clear_field().await?;

        attempt.enter(AttemptState::TypingUsername);
        driver.send_text(attempt.account_username)?;
        sleep(timings.field_delay).await;

        attempt.enter(AttemptState::AdvancingField);
        driver.send_key_chord(KeyChord::TAB)?;
        sleep(timings.field_delay).await;

        attempt.enter(AttemptState::ClearingPassword);
        self.clear_field().await?;

        attempt.enter(AttemptState::TypingPassword);
        driver.send_text(attempt.password.expose_secret())?;
        sleep(timings.pre_submit_delay).await;

        attempt.enter(AttemptState::Submitting);
        driver.send_key_chord(KeyChord::ENTER)
    }

    async fn clear_field(&self) -> Result<(), InputError> {
        self.driver.send_key_chord(KeyChord::SELECT_ALL)?;
        self.driver.send_key_chord(KeyChord::DELETE)?;
        sleep(self.timings.field_delay).await;
        Ok(())
    }
}

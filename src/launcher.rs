//! Entry point for the presentation layer
//!
//! `Launcher::login` turns an account reference into a finished attempt: it
//! pulls the password out of the vault, runs the orchestrator and reports the
//! outcome to the notifier exactly once.

use crate::config::AppConfig;
use crate::error::LoginFailure;
use crate::input_injector::{InputDriver, SendInputDriver};
use crate::locator::{ProcessHost, SystemProcessHost, TargetApp};
use crate::notifier::Notifier;
use crate::orchestrator::{LoginOrchestrator, LoginReport};
use crate::timings::Timings;
use crate::vault::{SecretVault, StoredSecret};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub struct Launcher<H: ProcessHost, D: InputDriver> {
    vault: Arc<dyn SecretVault>,
    orchestrator: LoginOrchestrator<H, D>,
    notifier: Arc<dyn Notifier>,
}

impl Launcher<SystemProcessHost, SendInputDriver> {
    /// Launcher wired to the real desktop
    pub fn system(
        config: &AppConfig,
        vault: Arc<dyn SecretVault>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let orchestrator = LoginOrchestrator::new(
            SystemProcessHost::new(),
            SendInputDriver::new(),
            TargetApp::riot_client(config),
            Timings::from_config(config),
        );
        Self::new(vault, orchestrator, notifier)
    }
}

impl<H: ProcessHost, D: InputDriver> Launcher<H, D> {
    pub fn new(
        vault: Arc<dyn SecretVault>,
        orchestrator: LoginOrchestrator<H, D>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            vault,
            orchestrator,
            notifier,
        }
    }

    pub fn orchestrator(&self) -> &LoginOrchestrator<H, D> {
        &self.orchestrator
    }

    /// Log `account_username` in with the password stored under `secret_key`
    pub async fn login(&self, account_username: &str, secret_key: &str) -> LoginReport {
        self.login_with_cancel(account_username, secret_key, &CancellationToken::new())
            .await
    }

    pub async fn login_with_cancel(
        &self,
        account_username: &str,
        secret_key: &str,
        cancel: &CancellationToken,
    ) -> LoginReport {
        let report = match self.resolve_secret(secret_key) {
            Ok(secret) => {
                self.orchestrator
                    .run(account_username, &secret.password, cancel)
                    .await
            }
            Err(failure) => LoginReport::rejected(failure),
        };

        self.notifier.notify(&report.message(), report.severity());
        report
    }

    fn resolve_secret(&self, secret_key: &str) -> Result<StoredSecret, LoginFailure> {
        if secret_key.is_empty() {
            error!("Account has no saved password");
            return Err(LoginFailure::VaultMissing);
        }

        match self.vault.retrieve(secret_key) {
            Ok(Some(secret)) => {
                debug!("Resolved secret {}", secret_key);
                Ok(secret)
            }
            Ok(None) => {
                error!("No secret stored under {}", secret_key);
                Err(LoginFailure::VaultMissing)
            }
            Err(e) => {
                error!("Vault read for {} failed: {}", secret_key, e);
                Err(LoginFailure::VaultReadFailed(e.to_string()))
            }
        }
    }
}

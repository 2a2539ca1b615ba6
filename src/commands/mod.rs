//! Top-level command orchestration.
pub mod run;

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::config::Profile;
use crate::config::validation;
use crate::logging::Log;

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// The loaded profile.
    pub profile: Profile,
}

impl CommandSetup {
    /// Load the profile at `path`, print its banner, and report validation
    /// warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile does not exist or fails to load.
    pub fn init(path: &Path, log: &dyn Log) -> Result<Self> {
        if !path.is_file() {
            anyhow::bail!("profile '{}' not found", path.display());
        }

        log.stage("Loading profile");
        let profile = Profile::load(path)
            .with_context(|| format!("loading profile {}", path.display()))?;

        if let Some(banner) = &profile.settings().banner {
            log.stage(banner);
        }

        let settings = profile.settings();
        log.info(&format!(
            "profile: {} ({} sections)",
            path.display(),
            profile.sections().len()
        ));
        log.debug(&format!(
            "retry {} every {}ms, sweep result '{}', concurrency {}",
            settings.retry.count,
            settings.retry.delay.as_millis(),
            settings.sweep_result,
            settings.concurrency
        ));

        let warnings = validation::validate(&profile);
        if !warnings.is_empty() {
            log.warn(&format!("found {} profile warning(s):", warnings.len()));
            for warning in &warnings {
                log.warn(&format!("  {warning}"));
            }
        }

        Ok(Self { profile })
    }
}

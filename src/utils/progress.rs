use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while a run is in progress; a no-op when quiet.
pub struct ProgressReporter {
    spinner: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new_spinner(message: &str, quiet: bool) -> Self {
        if quiet {
            return Self { spinner: None };
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self {
            spinner: Some(spinner),
        }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    pub fn finish_with_message(&self, message: &str) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message.to_string());
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(spinner) = &self.spinner {
            if !spinner.is_finished() {
                spinner.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_reporter_is_inert() {
        let reporter = ProgressReporter::new_spinner("Assembling forcing...", true);
        reporter.set_message("Merging sources...");
        reporter.finish_with_message("done");
        assert!(reporter.spinner.is_none());
    }
}

//! Live terminal display of a tracker tree

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use provision_config::DisplayConfig;
use provision_errors::{ConfigError, ProgressError};
use provision_progress::{Outcome, Status, Tracker};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Bar positions are scaled to this many ticks so every unit renders alike
const BAR_TICKS: u64 = 1000;

/// Polls a [`Tracker`] and mirrors its status tree as indicatif bars.
///
/// Each tracker gets one bar the first time it shows up initialized, indented
/// by its depth in the tree. Trackers of unknown size render as spinners.
pub struct ProgressRenderer {
    multi: MultiProgress,
    bars: HashMap<Uuid, ProgressBar>,
    bar_style: ProgressStyle,
    spinner_style: ProgressStyle,
}

impl ProgressRenderer {
    /// Renderer drawing to stderr
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the configured template does
    /// not parse.
    pub fn new(config: &DisplayConfig) -> Result<Self, ConfigError> {
        Self::with_draw_target(config, ProgressDrawTarget::stderr())
    }

    /// Renderer drawing to `target`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the configured template does
    /// not parse.
    pub fn with_draw_target(
        config: &DisplayConfig,
        target: ProgressDrawTarget,
    ) -> Result<Self, ConfigError> {
        let bar_style = ProgressStyle::with_template(&config.template)
            .map_err(|e| ConfigError::InvalidValue {
                field: "display.template".to_string(),
                value: format!("{}: {e}", config.template),
            })?
            .progress_chars(&config.progress_chars);
        let spinner_style = ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {msg}")
            .map_err(|e| ConfigError::InvalidValue {
                field: "display.template".to_string(),
                value: e.to_string(),
            })?;

        Ok(Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
            bar_style,
            spinner_style,
        })
    }

    /// Redraw from `status`, adding bars for newly seen trackers
    pub fn render(&mut self, status: &Status) {
        let mut previous: Option<ProgressBar> = None;

        for (depth, task) in status.flatten() {
            if !task.initialized {
                continue;
            }

            let bar = self.bars.entry(task.id).or_insert_with(|| {
                let bar = match &previous {
                    Some(prev) => self.multi.insert_after(prev, ProgressBar::hidden()),
                    None => self.multi.add(ProgressBar::hidden()),
                };
                if task.is_indeterminate() {
                    bar.set_style(self.spinner_style.clone());
                } else {
                    bar.set_style(self.bar_style.clone());
                    bar.set_length(BAR_TICKS);
                }
                bar.set_prefix(format!("{}{}", "  ".repeat(depth), task.operation));
                bar
            });
            previous = Some(bar.clone());

            if bar.is_finished() {
                continue;
            }

            match task.fraction() {
                Some(fraction) => bar.set_position(scale(fraction)),
                None => bar.tick(),
            }

            let message = message(task);
            match task.outcome() {
                Some(Ok(())) => bar.finish_with_message(message),
                Some(Err(err)) => bar.abandon_with_message(format!("{message} failed: {err}")),
                None => bar.set_message(message),
            }
        }
    }

    /// Render `tracker` every `interval` until it closes, then render once
    /// more and return its outcome
    pub async fn run(&mut self, tracker: &Tracker, interval: Duration) -> Outcome {
        let mut join = tracker.join();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                outcome = join.recv() => break outcome,
                _ = ticker.tick() => self.render(&tracker.status()),
            }
        };

        self.render(&tracker.status());
        outcome.unwrap_or_else(|| Err(ProgressError::Abandoned.into()))
    }

    #[cfg(test)]
    fn bar(&self, id: Uuid) -> Option<&ProgressBar> {
        self.bars.get(&id)
    }
}

fn message(task: &Status) -> String {
    let progress = task.format_progress();
    if task.stage.is_empty() {
        progress
    } else {
        format!("{} ({progress})", task.stage)
    }
}

fn scale(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * BAR_TICKS as f64).round() as u64
}

//! Terminal progress display for a run

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::state::{RunCounts, SceneResult};

const TEMPLATE: &str = "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Scene progress bar; hidden when disabled
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    pub fn new(total: usize, enabled: bool) -> Self {
        let bar = if enabled {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden())
        };

        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message("starting");

        Self { bar }
    }

    /// Fold one finished scene into the bar
    pub fn update(&self, result: &SceneResult, counts: RunCounts) {
        self.bar.set_position(counts.completed as u64);
        self.bar.set_message(format!(
            "{} ok, {} failed (last: {})",
            counts.successful, counts.failed, result.scene
        ));
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Remove the bar before the summary is printed
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

// Progress line for the CLI.
//
// Renders each ProgressSnapshot on a single self-overwriting line on stdout.
// The final line also carries a short summary when requested.

use indicatif::{HumanCount, HumanDuration, ProgressBar, ProgressDrawTarget, ProgressStyle};
use s3prune::{ProgressReporter, ProgressSnapshot};
use tracing::info;

pub struct ProgressIndicator {
    progress_text: ProgressBar,
    show_progress: bool,
    show_result: bool,
}

impl ProgressIndicator {
    pub fn new(show_progress: bool, show_result: bool) -> Self {
        Self::with_draw_target(show_progress, show_result, ProgressDrawTarget::stdout())
    }

    fn with_draw_target(show_progress: bool, show_result: bool, target: ProgressDrawTarget) -> Self {
        let progress_text = ProgressBar::with_draw_target(None, target);
        progress_text.set_style(ProgressStyle::with_template("{wide_msg}").unwrap());

        ProgressIndicator {
            progress_text,
            show_progress,
            show_result,
        }
    }
}

impl ProgressReporter for ProgressIndicator {
    fn report(&self, snapshot: &ProgressSnapshot) {
        if self.show_progress {
            self.progress_text.set_message(snapshot.to_string());
        }
    }

    fn finish(&self, snapshot: &ProgressSnapshot) {
        info!(
            message = "deletion summary",
            seen_objects = snapshot.seen,
            deleted_objects = snapshot.completed,
            workers = snapshot.workers,
            deleted_objects_per_sec = snapshot.rate().unwrap_or(0),
            duration_sec = snapshot.elapsed.as_secs_f64(),
            dry_run = snapshot.dry_run,
        );

        if self.show_result {
            self.progress_text.finish_with_message(format!(
                "{}, {} objects deleted in {}",
                snapshot,
                HumanCount(snapshot.completed),
                HumanDuration(snapshot.elapsed),
            ));
        } else {
            self.progress_text.finish_and_clear();
        }
    }
}

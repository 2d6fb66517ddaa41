//! CLI progress reporting. Not part of the core pipeline — [`orchestrator`]
//! only needs a plain `FnMut(u64, u64)`; this module is the thing `main.rs`
//! hands it.

use indicatif::{ProgressBar, ProgressStyle};

/// Wraps an [`indicatif::ProgressBar`] to match the orchestrator's
/// `(blocks_done, total_blocks)` progress callback shape.
pub struct ScanProgress {
    bar: ProgressBar,
}

impl ScanProgress {
    pub fn new(total_blocks: u64) -> Self {
        let bar = ProgressBar::new(total_blocks);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks ({eta})",
            )
            .expect("static template is valid")
            .progress_chars("=> "),
        );
        Self { bar }
    }

    /// Callback suitable for [`crate::orchestrator::run_scan`].
    pub fn callback(&self) -> impl FnMut(u64, u64) + '_ {
        move |done, total| {
            if self.bar.length() != Some(total) {
                self.bar.set_length(total);
            }
            self.bar.set_position(done);
        }
    }

    pub fn finish(&self, message: impl Into<std::borrow::Cow<'static, str>>) {
        self.bar.finish_with_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_updates_position_and_length() {
        let progress = ScanProgress::new(0);
        let mut cb = progress.callback();
        cb(5, 10);
        assert_eq!(progress.bar.position(), 5);
        assert_eq!(progress.bar.length(), Some(10));
    }
}

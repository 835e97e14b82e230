use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::Mutex;

/// Hooks the pipeline calls as it moves through its phases. `tree` is
/// `"source"` or `"destination"`. Every method defaults to a no-op.
pub trait ProgressReporter: Send + Sync {
    fn on_walk_start(&self, _tree: &str) {}
    fn on_walk_complete(&self, _tree: &str, _files: usize, _directories: usize) {}
    fn on_hash_start(&self, _tree: &str, _total: usize) {}
    fn on_hash_progress(&self, _tree: &str, _done: usize, _total: usize) {}
    fn on_hash_complete(&self, _tree: &str, _unique: usize) {}
    fn on_place_start(&self, _total: usize) {}
    fn on_place_progress(&self, _done: usize, _total: usize) {}
    fn on_place_complete(&self, _placed: usize) {}
}

pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Terminal progress bars, one per phase.
pub struct BarReporter {
    bars: MultiProgress,
    current: Mutex<Option<ProgressBar>>,
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl BarReporter {
    pub fn new() -> Self {
        Self {
            bars: MultiProgress::new(),
            current: Mutex::new(None),
        }
    }

    fn replace(&self, pb: ProgressBar) {
        let mut current = self.current.lock();
        if let Some(old) = current.take() {
            old.finish_and_clear();
        }
        *current = Some(pb);
    }

    fn finish(&self, message: String) {
        if let Some(pb) = self.current.lock().take() {
            pb.finish_with_message(message);
        }
    }

    fn spinner(&self, message: String) -> ProgressBar {
        let pb = self.bars.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn bar(&self, total: usize, message: String) -> ProgressBar {
        let pb = self.bars.add(ProgressBar::new(total as u64));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message(message);
        pb
    }

    pub fn clear(&self) {
        let _ = self.bars.clear();
    }
}

impl ProgressReporter for BarReporter {
    fn on_walk_start(&self, tree: &str) {
        self.replace(self.spinner(format!("Scanning {tree} tree...")));
    }

    fn on_walk_complete(&self, tree: &str, files: usize, directories: usize) {
        self.finish(format!(
            "Found {files} files in {directories} directories ({tree})"
        ));
    }

    fn on_hash_start(&self, tree: &str, total: usize) {
        self.replace(self.bar(total, format!("Hashing {tree}")));
    }

    fn on_hash_progress(&self, _tree: &str, done: usize, _total: usize) {
        if let Some(pb) = self.current.lock().as_ref() {
            pb.set_position(done as u64);
        }
    }

    fn on_hash_complete(&self, tree: &str, unique: usize) {
        self.finish(format!("{unique} unique contents ({tree})"));
    }

    fn on_place_start(&self, total: usize) {
        self.replace(self.bar(total, "Placing".to_string()));
    }

    fn on_place_progress(&self, done: usize, _total: usize) {
        if let Some(pb) = self.current.lock().as_ref() {
            pb.set_position(done as u64);
        }
    }

    fn on_place_complete(&self, placed: usize) {
        self.finish(format!("{placed} files placed"));
    }
}

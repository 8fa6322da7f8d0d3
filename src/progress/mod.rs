use indicatif::{ProgressBar, ProgressStyle};

const TRANSFER_TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Trait for progress reporting
pub trait ProgressReporter: Send + Sync {
    fn start(&self, total: u64);
    fn update(&self, current: u64);
    fn finish(&self);
    fn set_message(&self, msg: &str);
}

/// Indicatif-based progress reporter
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// Byte-oriented bar labelled with `name`. A total of 0 means unknown
    /// until `start` is called.
    pub fn transfer(name: &str, total: u64) -> Self {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template(TRANSFER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message(name.to_string());

        Self { bar }
    }
}

impl ProgressReporter for IndicatifProgress {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
    }

    fn update(&self, current: u64) {
        self.bar.set_position(current);
    }

    fn finish(&self) {
        self.bar.finish_with_message("Complete");
    }

    fn set_message(&self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }
}

/// No-op progress reporter for when progress reporting is disabled
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    fn start(&self, _total: u64) {}
    fn update(&self, _current: u64) {}
    fn finish(&self) {}
    fn set_message(&self, _msg: &str) {}
}

/// Hands out reporters, or no-ops when progress output is turned off
pub struct ProgressFactory {
    enabled: bool,
}

impl ProgressFactory {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn file_transfer(&self, file_name: &str, total_bytes: u64) -> Box<dyn ProgressReporter> {
        if !self.enabled {
            return Box::new(NoOpProgress);
        }
        Box::new(IndicatifProgress::transfer(file_name, total_bytes))
    }
}

use crate::stream::IngestSummary;
use crate::ui::theme;
use crate::ui::Icons;
use indicatif::{HumanDuration, ProgressBar};
use owo_colors::OwoColorize;
use std::time::Duration;

/// Record counter shown while a stream is ingested
pub struct IngestProgress {
    pb: ProgressBar,
}

impl IngestProgress {
    pub fn new() -> Self {
        let pb = if console::Term::stdout().is_term() {
            let pb = ProgressBar::new_spinner().with_message("Ingesting records");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };
        Self { pb }
    }

    pub fn update(&self, summary: &IngestSummary) {
        self.pb.set_position((summary.vertices + summary.edges) as u64);
        if (summary.vertices + summary.edges) % 1000 == 0 {
            self.pb.set_message(format!(
                "Ingesting: {} vertices, {} edges",
                summary.vertices, summary.edges
            ));
        }
    }

    pub fn finish_with_summary(&self, duration: Duration, summary: &IngestSummary) {
        self.pb.finish_and_clear();
        println!();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().success.clone()),
            format!("Complete in {}", HumanDuration(duration)).style(theme().success.clone())
        );
        println!(
            "  {} {}  {} {}  {} {}",
            Icons::ARTIFACT.style(theme().info.clone()),
            summary.vertices,
            Icons::LINK.style(theme().info.clone()),
            summary.edges,
            Icons::WARN.style(theme().warn.clone()),
            summary.skipped_lines + summary.rejected
        );
    }
}

impl Default for IngestProgress {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_message(message.to_string());
        if console::Term::stdout().is_term() {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        Self { pb }
    }

    pub fn set_message(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }

    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }
}

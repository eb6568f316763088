pub mod config;
pub mod relay;
pub mod render;
pub mod report;
pub mod scheduler;
pub mod tooltip;

use colored::Colorize;

pub use config::{ConfigError, ScanConfig};
pub use relay::{Relay, RelayHandle, RelayInbox, RelayMessage, RelayReply, TransportError};
pub use render::{RenderSummary, badge_for, render};
pub use report::{AnnotationReport, ReportFormat};
pub use scheduler::{CycleCallback, CycleOutcome, ScanScheduler, SchedulerConfig};

pub fn print_banner() {
    println!();
    println!("  {}", "S W A R M W A T C H".bright_cyan().bold());
    println!(
        "  {} {}\n",
        "bot swarm risk annotations".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}

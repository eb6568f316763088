// Summaries of what has been annotated on a page

use chrono::Utc;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use swarmwatch_scanner::Page;
use swarmwatch_scanner::extract::SCAN_MARKER;

const SNIPPET_CHARS: usize = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub label: String,
    pub risk: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationReport {
    pub host: String,
    pub generated_at: String,
    pub scanned: usize,
    pub counts: RiskCounts,
    pub rows: Vec<AnnotationRow>,
}

fn snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(SNIPPET_CHARS).collect();
    format!("{}…", cut.trim_end())
}

impl AnnotationReport {
    /// One row per scanned element, in document order.
    pub fn gather(page: &Page) -> Self {
        let mut counts = RiskCounts::default();
        let mut rows = Vec::new();

        let scanned = page.elements_with_attr(SCAN_MARKER);
        for el in &scanned {
            // Nested replies get their own rows
            let nested: Vec<_> = scanned
                .iter()
                .copied()
                .filter(|other| page.contains(*el, *other))
                .collect();
            let text = page.text_excluding(*el, &nested);
            for annotation in page.annotations_for(*el) {
                let badge = &annotation.badge;
                let risk = badge.data("risk").unwrap_or("LOW").to_string();
                match risk.as_str() {
                    "HIGH" => counts.high += 1,
                    "MEDIUM" => counts.medium += 1,
                    _ => counts.low += 1,
                }
                rows.push(AnnotationRow {
                    label: badge.label.clone(),
                    risk,
                    score: badge.data("score").and_then(|s| s.parse().ok()),
                    flags: badge
                        .data("flags")
                        .map(|f| f.lines().map(str::to_string).collect())
                        .unwrap_or_default(),
                    snippet: snippet(&text),
                });
            }
        }

        Self {
            host: page.host().to_string(),
            generated_at: Utc::now().to_rfc3339(),
            scanned: scanned.len(),
            counts,
            rows,
        }
    }

    pub fn render(&self, format: &ReportFormat) -> String {
        match format {
            ReportFormat::Text => self.render_text(),
            ReportFormat::Json => serde_json::to_string_pretty(self).unwrap_or_default(),
        }
    }

    fn render_text(&self) -> String {
        let mut report = String::new();
        report.push_str(&format!("{}\n\n", "━".repeat(60).bright_blue()));
        report.push_str(&format!("📊 Annotations for {}\n", self.host.bright_white().bold()));
        report.push_str(&format!("  Comments scanned: {}\n", self.scanned));
        report.push_str(&format!(
            "  {} high, {} medium, {} low\n",
            self.counts.high.to_string().red().bold(),
            self.counts.medium.to_string().yellow().bold(),
            self.counts.low.to_string().green().bold()
        ));

        if self.rows.is_empty() {
            report.push_str("\n  No annotations yet.\n");
            return report;
        }

        report.push('\n');
        for row in &self.rows {
            let label = match row.risk.as_str() {
                "HIGH" => row.label.red().bold(),
                "MEDIUM" => row.label.yellow().bold(),
                _ => row.label.green(),
            };
            report.push_str(&format!("  {}  {}\n", label, row.snippet.bright_black()));
            for flag in &row.flags {
                report.push_str(&format!("      • {}\n", flag.yellow()));
            }
        }
        report
    }
}

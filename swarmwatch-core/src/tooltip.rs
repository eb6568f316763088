// The single page-wide tooltip shared by every badge's hover listeners.
// Last writer wins; listeners run one at a time on the page thread.

use swarmwatch_scanner::AnalysisResult;
use swarmwatch_scanner::page::{Overlay, OverlaySlot, PointerEvent};

pub const TOOLTIP_ID: &str = "bsd-tooltip";
pub const POINTER_OFFSET: f64 = 15.0;
pub const MAX_WIDTH: f64 = 250.0;
const EDGE_MARGIN: f64 = 10.0;

/// What a badge's tooltip says about its comment.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipReport {
    pub bot_score: u32,
    pub misinfo_risk: u32,
    pub linguistic_risk: u32,
    pub swarm_risk: u32,
    pub metadata_risk: u32,
    pub flags: Vec<String>,
}

impl From<&AnalysisResult> for TooltipReport {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            bot_score: result.bot_score,
            misinfo_risk: result.breakdown.misinfo_risk,
            linguistic_risk: result.breakdown.linguistic_risk,
            swarm_risk: result.breakdown.swarm_risk,
            metadata_risk: result.breakdown.metadata_risk,
            flags: result.flags.clone(),
        }
    }
}

impl TooltipReport {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            "Analysis Report".to_string(),
            format!("🤖 Bot Score: {}%", self.bot_score),
            format!("📢 Misinfo Risk: {}", self.misinfo_risk),
            format!("🧠 AI Pattern: {}", self.linguistic_risk),
            format!("🕸️ Swarm: {}", self.swarm_risk),
            format!("👤 Metadata: {}", self.metadata_risk),
        ];
        if self.flags.is_empty() {
            lines.push("No suspicious patterns.".to_string());
        } else {
            lines.extend(self.flags.iter().map(|flag| format!("• {}", flag)));
        }
        lines
    }
}

fn create() -> Overlay {
    Overlay {
        element_id: TOOLTIP_ID.to_string(),
        visible: false,
        left: 0.0,
        top: 0.0,
        max_width: MAX_WIDTH,
        lines: Vec::new(),
    }
}

/// Tooltip position for a pointer, kept clear of the visible viewport's right
/// edge. Pointer coordinates are page coordinates, so the edge moves with `scroll_x`.
pub fn position(event: &PointerEvent, viewport_width: f64, scroll_x: f64) -> (f64, f64) {
    let max_left = (scroll_x + viewport_width - MAX_WIDTH - EDGE_MARGIN).max(scroll_x);
    let left = (event.page_x + POINTER_OFFSET).min(max_left);
    (left, event.page_y + POINTER_OFFSET)
}

pub fn show(slot: &mut OverlaySlot, report: &TooltipReport, event: &PointerEvent) {
    let (left, top) = position(event, slot.viewport_width(), slot.scroll_x());
    let tooltip = slot.get_or_create(create);
    tooltip.lines = report.lines();
    tooltip.left = left;
    tooltip.top = top;
    tooltip.visible = true;
}

pub fn follow(slot: &mut OverlaySlot, event: &PointerEvent) {
    let (left, top) = position(event, slot.viewport_width(), slot.scroll_x());
    if let Some(tooltip) = slot.get_mut() {
        tooltip.left = left;
        tooltip.top = top;
    }
}

pub fn hide(slot: &mut OverlaySlot) {
    if let Some(tooltip) = slot.get_mut() {
        tooltip.visible = false;
    }
}

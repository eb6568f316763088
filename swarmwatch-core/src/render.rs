use crate::tooltip::{self, TooltipReport};
use std::rc::Rc;
use swarmwatch_scanner::extract::{is_scanned, mark_scanned};
use swarmwatch_scanner::page::{OverlaySlot, PointerEvent, PointerEventKind};
use swarmwatch_scanner::{AnalysisResult, Badge, IdentityMap, Page, PlatformAdapter, RiskLevel};
use tracing::debug;

/// Badge for a result. Depends only on the risk level and score.
pub fn badge_for(result: &AnalysisResult) -> Badge {
    let score = result.bot_score.min(100);
    let badge = match result.risk_level {
        RiskLevel::High => Badge::new(format!("🤖 BOT: {}%", score), "#dc2626", "white")
            .with_accent("#dc2626"),
        RiskLevel::Medium => Badge::new(format!("⚠️ CHECK: {}%", score), "#f59e0b", "black")
            .with_accent("#f59e0b"),
        RiskLevel::Low | RiskLevel::Unknown => {
            Badge::new("✓ OK", "#22c55e", "white").with_opacity(0.8)
        }
    };
    badge
        .with_data("risk", result.risk_level.as_str())
        .with_data("score", score)
}

fn with_tooltip(badge: Badge, report: TooltipReport) -> Badge {
    let report = Rc::new(report);
    badge
        .on(
            PointerEventKind::Enter,
            Rc::new(move |slot: &mut OverlaySlot, event: &PointerEvent| {
                tooltip::show(slot, &report, event)
            }),
        )
        .on(
            PointerEventKind::Move,
            Rc::new(|slot: &mut OverlaySlot, event: &PointerEvent| tooltip::follow(slot, event)),
        )
        .on(
            PointerEventKind::Leave,
            Rc::new(|slot: &mut OverlaySlot, _event: &PointerEvent| tooltip::hide(slot)),
        )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub rendered: usize,
    /// Results whose element is unknown to this cycle or no longer on the page.
    pub stale: usize,
    pub already_scanned: usize,
}

/// Applies one cycle's results to the page. Consumes that cycle's identity map.
pub fn render(
    page: &mut Page,
    adapter: &dyn PlatformAdapter,
    results: Vec<AnalysisResult>,
    identity: IdentityMap,
) -> RenderSummary {
    let mut summary = RenderSummary::default();

    for result in results {
        let Some(el) = identity
            .resolve(&result.comment_id)
            .filter(|el| page.is_attached(*el))
        else {
            debug!("Dropping result for {}: element gone", result.comment_id);
            summary.stale += 1;
            continue;
        };

        if is_scanned(page, el) {
            summary.already_scanned += 1;
            continue;
        }
        mark_scanned(page, el);

        let mut badge = badge_for(&result);
        if !result.flags.is_empty() {
            badge = badge.with_data("flags", result.flags.join("\n"));
        }
        let badge = with_tooltip(badge, TooltipReport::from(&result));
        adapter.insert_annotation(page, el, badge);
        summary.rendered += 1;
    }

    summary
}

// Tests for the scan cycle and its scheduling

use scraper::Selector;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use swarmwatch_core::relay::{self, RelayInbox, RelayMessage, RelayReply, TransportError};
use swarmwatch_core::{CycleOutcome, RenderSummary, ScanScheduler, SchedulerConfig};
use swarmwatch_scanner::extract::is_scanned;
use swarmwatch_scanner::page::{PointerEvent, PointerEventKind};
use swarmwatch_scanner::{AdapterRegistry, AnalysisResult, CommentRecord, ElementId, Page};
use tokio::task::{JoinHandle, LocalSet};
use tokio::time::Instant;

const TWEETS: &str = r#"<html><body>
    <div data-testid="tweetText">ok comment one</div>
    <div data-testid="tweetText">short</div>
    <div data-testid="tweetText">another fine comment</div>
</body></html>"#;

fn tweet_elements(page: &Page) -> Vec<ElementId> {
    page.select(&Selector::parse(r#"[data-testid="tweetText"]"#).unwrap())
}

fn scored(record: &CommentRecord, score: u32, level: &str, flags: &[&str]) -> AnalysisResult {
    serde_json::from_value(json!({
        "comment_id": record.id,
        "bot_score": score,
        "breakdown": {"metadata_risk": 20, "linguistic_risk": 20, "swarm_risk": 40, "misinfo_risk": 2},
        "risk_level": level,
        "flags": flags,
    }))
    .unwrap()
}

/// Scores by text: anything mentioning "one" is HIGH, everything else LOW.
fn score_by_text(payload: &[CommentRecord]) -> Option<RelayReply> {
    let data = payload
        .iter()
        .map(|r| {
            if r.text.contains("one") {
                scored(r, 82, "HIGH", &["repetitive phrasing"])
            } else {
                scored(r, 5, "LOW", &[])
            }
        })
        .collect();
    Some(RelayReply::Success { data })
}

/// Answers envelopes with `respond`; `None` drops the reply slot unanswered.
fn spawn_scripted_relay<F>(mut inbox: RelayInbox, respond: F) -> (JoinHandle<()>, Rc<Cell<usize>>)
where
    F: Fn(&[CommentRecord]) -> Option<RelayReply> + 'static,
{
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let handle = tokio::task::spawn_local(async move {
        while let Some(envelope) = inbox.recv().await {
            counter.set(counter.get() + 1);
            let RelayMessage::AnalyzeComments { payload } = envelope.message;
            if let Some(reply) = respond(&payload) {
                let _ = envelope.reply.send(reply);
            }
        }
    });
    (handle, calls)
}

fn scheduler(page: Page, handle: relay::RelayHandle) -> ScanScheduler {
    ScanScheduler::new(
        Rc::new(RefCell::new(page)),
        Rc::new(AdapterRegistry::new().unwrap()),
        handle,
        SchedulerConfig::default(),
    )
}

#[tokio::test]
async fn test_end_to_end_example() {
    LocalSet::new()
        .run_until(async {
            let (handle, inbox) = relay::channel();
            spawn_scripted_relay(inbox, score_by_text);
            let scheduler = scheduler(Page::parse("x.com", TWEETS), handle);

            let outcome = scheduler.run_cycle().await;
            assert_eq!(
                outcome,
                CycleOutcome::Rendered(RenderSummary {
                    rendered: 2,
                    stale: 0,
                    already_scanned: 0
                })
            );

            let page = scheduler.page();
            let page = page.borrow();
            let els = tweet_elements(&page);
            assert!(is_scanned(&page, els[0]));
            assert!(!is_scanned(&page, els[1]));
            assert!(is_scanned(&page, els[2]));

            let first = page.annotations_within(els[0]);
            assert_eq!(first.len(), 1);
            assert_eq!(first[0].badge.label, "🤖 BOT: 82%");
            assert_eq!(first[0].badge.background, "#dc2626");
            assert_eq!(page.style(els[0], "border-left"), Some("4px solid #dc2626"));

            let third = page.annotations_within(els[2]);
            assert_eq!(third[0].badge.label, "✓ OK");
            assert_eq!(third[0].badge.opacity, Some(0.8));
            assert_eq!(page.style(els[2], "border-left"), None);

            assert!(page.annotations_within(els[1]).is_empty());
        })
        .await;
}

#[tokio::test]
async fn test_second_cycle_is_idle() {
    LocalSet::new()
        .run_until(async {
            let (handle, inbox) = relay::channel();
            let (_relay, calls) = spawn_scripted_relay(inbox, score_by_text);
            let scheduler = scheduler(Page::parse("x.com", TWEETS), handle);

            assert!(matches!(scheduler.run_cycle().await, CycleOutcome::Rendered(_)));
            assert_eq!(scheduler.run_cycle().await, CycleOutcome::Idle);
            assert_eq!(calls.get(), 1);
            assert_eq!(scheduler.page().borrow().annotations().len(), 2);
        })
        .await;
}

#[tokio::test]
async fn test_unknown_host_never_reaches_relay() {
    LocalSet::new()
        .run_until(async {
            let (handle, inbox) = relay::channel();
            let (_relay, calls) = spawn_scripted_relay(inbox, score_by_text);
            let scheduler = scheduler(Page::parse("news.example.com", TWEETS), handle);

            assert_eq!(scheduler.run_cycle().await, CycleOutcome::NoAdapter);
            assert_eq!(calls.get(), 0);
            assert!(scheduler.page().borrow().annotations().is_empty());
        })
        .await;
}

#[tokio::test]
async fn test_missing_flags_render_and_tooltip() {
    LocalSet::new()
        .run_until(async {
            let (handle, inbox) = relay::channel();
            spawn_scripted_relay(inbox, |payload| {
                let data = payload
                    .iter()
                    .map(|r| {
                        serde_json::from_value(json!({
                            "comment_id": r.id,
                            "bot_score": 45,
                            "breakdown": {"metadata_risk": 20, "linguistic_risk": 20, "swarm_risk": 0},
                            "risk_level": "MEDIUM"
                        }))
                        .unwrap()
                    })
                    .collect();
                Some(RelayReply::Success { data })
            });
            let scheduler = scheduler(Page::parse("x.com", TWEETS), handle);

            assert!(matches!(scheduler.run_cycle().await, CycleOutcome::Rendered(_)));

            let page = scheduler.page();
            let mut page = page.borrow_mut();
            assert!(page.dispatch_pointer(0, PointerEvent::new(PointerEventKind::Enter, 40.0, 60.0)));
            let tooltip = page.overlay().get().unwrap();
            assert!(tooltip.visible);
            assert_eq!((tooltip.left, tooltip.top), (55.0, 75.0));
            assert!(tooltip.lines.contains(&"No suspicious patterns.".to_string()));
            assert!(tooltip.lines.contains(&"📢 Misinfo Risk: 0".to_string()));
        })
        .await;
}

#[tokio::test]
async fn test_one_tooltip_shared_by_all_badges() {
    LocalSet::new()
        .run_until(async {
            let (handle, inbox) = relay::channel();
            spawn_scripted_relay(inbox, score_by_text);
            let scheduler = scheduler(Page::parse("x.com", TWEETS).with_viewport_width(1000.0), handle);
            scheduler.run_cycle().await;

            let page = scheduler.page();
            let mut page = page.borrow_mut();
            page.dispatch_pointer(0, PointerEvent::new(PointerEventKind::Enter, 10.0, 10.0));
            page.dispatch_pointer(0, PointerEvent::new(PointerEventKind::Leave, 10.0, 10.0));
            page.dispatch_pointer(1, PointerEvent::new(PointerEventKind::Enter, 990.0, 10.0));
            page.dispatch_pointer(1, PointerEvent::new(PointerEventKind::Move, 995.0, 20.0));

            let tooltip = page.overlay().get().unwrap();
            assert_eq!(page.overlay().created_count(), 1);
            assert!(tooltip.visible);
            assert!(tooltip.left + tooltip.max_width <= 1000.0);
            assert_eq!(tooltip.top, 35.0);
            assert!(tooltip.lines.contains(&"🤖 Bot Score: 5%".to_string()));
        })
        .await;
}

#[tokio::test]
async fn test_element_removed_before_results_arrive() {
    LocalSet::new()
        .run_until(async {
            let page = Rc::new(RefCell::new(Page::parse("x.com", TWEETS)));
            let (handle, inbox) = relay::channel();

            // The page drops the first tweet while the batch is out for scoring
            let doomed = tweet_elements(&page.borrow())[0];
            let page_in_relay = page.clone();
            spawn_scripted_relay(inbox, move |payload| {
                page_in_relay.borrow_mut().remove(doomed);
                score_by_text(payload)
            });

            let scheduler = ScanScheduler::new(
                page.clone(),
                Rc::new(AdapterRegistry::new().unwrap()),
                handle,
                SchedulerConfig::default(),
            );

            let outcome = scheduler.run_cycle().await;
            assert_eq!(
                outcome,
                CycleOutcome::Rendered(RenderSummary {
                    rendered: 1,
                    stale: 1,
                    already_scanned: 0
                })
            );
            assert_eq!(page.borrow().annotations().len(), 1);
            assert_eq!(page.borrow().annotations()[0].badge.label, "✓ OK");
        })
        .await;
}

#[tokio::test]
async fn test_relay_error_aborts_cycle_and_next_cycle_retries() {
    LocalSet::new()
        .run_until(async {
            let (handle, inbox) = relay::channel();
            let attempts = Rc::new(Cell::new(0));
            let counter = attempts.clone();
            spawn_scripted_relay(inbox, move |payload| {
                counter.set(counter.get() + 1);
                if counter.get() == 1 {
                    Some(RelayReply::Error {
                        error: "Server error: 503".to_string(),
                    })
                } else {
                    score_by_text(payload)
                }
            });
            let scheduler = scheduler(Page::parse("x.com", TWEETS), handle);

            assert_eq!(
                scheduler.run_cycle().await,
                CycleOutcome::Failed(TransportError::Relay("Server error: 503".to_string()))
            );
            {
                let page = scheduler.page();
                let page = page.borrow();
                assert!(page.annotations().is_empty());
                assert!(tweet_elements(&page).iter().all(|el| !is_scanned(&page, *el)));
            }

            assert!(matches!(
                scheduler.run_cycle().await,
                CycleOutcome::Rendered(RenderSummary { rendered: 2, .. })
            ));
            assert_eq!(attempts.get(), 2);
        })
        .await;
}

#[tokio::test]
async fn test_unanswered_reply_is_disconnect() {
    LocalSet::new()
        .run_until(async {
            let (handle, inbox) = relay::channel();
            spawn_scripted_relay(inbox, |_| None);
            let scheduler = scheduler(Page::parse("x.com", TWEETS), handle);

            assert_eq!(
                scheduler.run_cycle().await,
                CycleOutcome::Failed(TransportError::Disconnected)
            );
            assert!(scheduler.page().borrow().annotations().is_empty());
        })
        .await;
}

#[tokio::test]
async fn test_torn_down_relay_is_disconnect() {
    LocalSet::new()
        .run_until(async {
            let (handle, inbox) = relay::channel();
            drop(inbox);
            let scheduler = scheduler(Page::parse("x.com", TWEETS), handle);

            assert_eq!(
                scheduler.run_cycle().await,
                CycleOutcome::Failed(TransportError::Disconnected)
            );
        })
        .await;
}

#[tokio::test]
async fn test_new_comments_from_infinite_scroll() {
    LocalSet::new()
        .run_until(async {
            let (handle, inbox) = relay::channel();
            spawn_scripted_relay(inbox, score_by_text);
            let scheduler = scheduler(Page::parse("x.com", TWEETS), handle);

            scheduler.run_cycle().await;
            {
                let page = scheduler.page();
                let mut page = page.borrow_mut();
                let body = page.body().unwrap();
                page.append_html(body, r#"<div data-testid="tweetText">freshly loaded reply</div>"#);
            }

            assert_eq!(
                scheduler.run_cycle().await,
                CycleOutcome::Rendered(RenderSummary {
                    rendered: 1,
                    stale: 0,
                    already_scanned: 0
                })
            );
            let page = scheduler.page();
            let page = page.borrow();
            let els = tweet_elements(&page);
            assert_eq!(els.len(), 4);
            assert!(is_scanned(&page, els[3]));
            assert_eq!(page.annotations().len(), 3);
        })
        .await;
}

#[tokio::test]
async fn test_overlapping_cycles_render_each_element_once() {
    LocalSet::new()
        .run_until(async {
            let (handle, mut inbox) = relay::channel();
            let scheduler = scheduler(Page::parse("x.com", TWEETS), handle);

            let first = scheduler.spawn_cycle();
            let second = scheduler.spawn_cycle();
            let envelope_a = inbox.recv().await.unwrap();
            let envelope_b = inbox.recv().await.unwrap();
            assert_eq!(scheduler.in_flight(), 2);

            for envelope in [envelope_a, envelope_b] {
                let RelayMessage::AnalyzeComments { payload } = envelope.message;
                let reply = score_by_text(&payload).unwrap();
                envelope.reply.send(reply).unwrap();
            }

            let outcomes = [first.await.unwrap(), second.await.unwrap()];
            let rendered: usize = outcomes
                .iter()
                .map(|o| match o {
                    CycleOutcome::Rendered(summary) => summary.rendered,
                    _ => 0,
                })
                .sum();
            assert_eq!(rendered, 2);
            assert_eq!(scheduler.page().borrow().annotations().len(), 2);
            assert_eq!(scheduler.in_flight(), 0);
        })
        .await;
}

#[tokio::test]
async fn test_single_flight_skips_while_busy() {
    LocalSet::new()
        .run_until(async {
            let (handle, mut inbox) = relay::channel();
            let config = SchedulerConfig {
                single_flight: true,
                ..SchedulerConfig::default()
            };
            let scheduler = ScanScheduler::new(
                Rc::new(RefCell::new(Page::parse("x.com", TWEETS))),
                Rc::new(AdapterRegistry::new().unwrap()),
                handle,
                config,
            );

            let first = scheduler.spawn_cycle();
            let envelope = inbox.recv().await.unwrap();
            assert_eq!(scheduler.in_flight(), 1);

            let second = scheduler.spawn_cycle();
            assert_eq!(second.await.unwrap(), CycleOutcome::Skipped);

            envelope
                .reply
                .send(RelayReply::Success { data: vec![] })
                .unwrap();
            assert_eq!(
                first.await.unwrap(),
                CycleOutcome::Rendered(RenderSummary::default())
            );
        })
        .await;
}

#[tokio::test]
async fn test_aborted_cycle_releases_single_flight_slot() {
    LocalSet::new()
        .run_until(async {
            let (handle, mut inbox) = relay::channel();
            let config = SchedulerConfig {
                single_flight: true,
                ..SchedulerConfig::default()
            };
            let scheduler = ScanScheduler::new(
                Rc::new(RefCell::new(Page::parse("x.com", TWEETS))),
                Rc::new(AdapterRegistry::new().unwrap()),
                handle,
                config,
            );

            let first = scheduler.spawn_cycle();
            let _abandoned = inbox.recv().await.unwrap();
            assert_eq!(scheduler.in_flight(), 1);

            first.abort();
            assert!(first.await.unwrap_err().is_cancelled());
            assert_eq!(scheduler.in_flight(), 0);

            let next = scheduler.spawn_cycle();
            let envelope = inbox.recv().await.unwrap();
            assert_eq!(scheduler.in_flight(), 1);
            envelope
                .reply
                .send(RelayReply::Success { data: vec![] })
                .unwrap();
            assert_eq!(
                next.await.unwrap(),
                CycleOutcome::Rendered(RenderSummary::default())
            );
            assert_eq!(scheduler.in_flight(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_schedule_initial_delay_then_interval() {
    LocalSet::new()
        .run_until(async {
            let (handle, inbox) = relay::channel();
            spawn_scripted_relay(inbox, score_by_text);

            let start = Instant::now();
            let finished: Rc<RefCell<Vec<(Duration, CycleOutcome)>>> = Rc::new(RefCell::new(Vec::new()));
            let log = finished.clone();
            let scheduler = scheduler(Page::parse("x.com", TWEETS), handle).with_cycle_callback(
                Rc::new(move |outcome: &CycleOutcome| {
                    log.borrow_mut().push((start.elapsed(), outcome.clone()));
                }),
            );

            let outcomes = scheduler.run_cycles(3).await;

            assert_eq!(outcomes.len(), 3);
            assert!(matches!(outcomes[0], CycleOutcome::Rendered(_)));
            assert_eq!(outcomes[1], CycleOutcome::Idle);
            assert_eq!(outcomes[2], CycleOutcome::Idle);

            let times: Vec<Duration> = finished.borrow().iter().map(|(t, _)| *t).collect();
            assert_eq!(
                times,
                vec![
                    Duration::from_secs(2),
                    Duration::from_secs(5),
                    Duration::from_secs(10)
                ]
            );
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_run_cycles_zero() {
    LocalSet::new()
        .run_until(async {
            let (handle, _inbox) = relay::channel();
            let scheduler = scheduler(Page::parse("x.com", TWEETS), handle);

            assert!(scheduler.run_cycles(0).await.is_empty());
        })
        .await;
}

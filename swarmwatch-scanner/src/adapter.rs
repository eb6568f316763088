// Per-site strategies for locating comments, reading their text and placing badges

use crate::error::{Result, ScanError};
use crate::page::{Badge, ElementId, Page};
use scraper::Selector;
use tracing::debug;

/// Capability set every supported site provides.
pub trait PlatformAdapter {
    fn name(&self) -> &'static str;

    /// Candidate comment containers. May overlap across UI revisions;
    /// de-duplication is the extractor's job.
    fn candidates(&self, page: &Page) -> Vec<ElementId>;

    /// Comment text, or an empty string when the expected sub-element is missing.
    fn extract_text(&self, page: &Page, el: ElementId) -> String;

    /// Places `badge` next to a sensible anchor inside or near `el`.
    fn insert_annotation(&self, page: &mut Page, el: ElementId, badge: Badge);

    /// Stable id the platform itself assigns to the comment, if any.
    fn native_id(&self, _page: &Page, _el: ElementId) -> Option<String> {
        None
    }

    fn author(&self, _page: &Page, _el: ElementId) -> Option<String> {
        None
    }
}

fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScanError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Paints the side border the badge asks for on the comment container.
fn paint_accent(page: &mut Page, el: ElementId, badge: &Badge) {
    if let Some(accent) = &badge.accent {
        page.set_style(el, "border-left", &format!("4px solid {}", accent));
    }
}

pub struct RedditAdapter {
    comment: Selector,
    body: Selector,
    author_name: Selector,
    tracker: Selector,
}

impl RedditAdapter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            comment: compile("shreddit-comment")?,
            body: compile(r#"div[slot="comment"]"#)?,
            author_name: compile(r#"span[slot="authorName"]"#)?,
            tracker: compile(".faceplate-tracker")?,
        })
    }
}

impl PlatformAdapter for RedditAdapter {
    fn name(&self) -> &'static str {
        "reddit"
    }

    fn candidates(&self, page: &Page) -> Vec<ElementId> {
        page.select(&self.comment)
    }

    fn extract_text(&self, page: &Page, el: ElementId) -> String {
        page.select_within(el, &self.body)
            .map(|body| page.text(body))
            .unwrap_or_default()
    }

    fn insert_annotation(&self, page: &mut Page, el: ElementId, badge: Badge) {
        paint_accent(page, el, &badge);
        let header = page
            .select_within(el, &self.author_name)
            .or_else(|| page.select_within(el, &self.tracker));
        match header {
            Some(anchor) => page.insert_after(el, anchor, badge),
            None => page.prepend(el, badge),
        }
    }

    fn native_id(&self, page: &Page, el: ElementId) -> Option<String> {
        page.attr(el, "thingid").filter(|id| !id.trim().is_empty())
    }

    fn author(&self, page: &Page, el: ElementId) -> Option<String> {
        page.attr(el, "author").filter(|a| !a.trim().is_empty())
    }
}

pub struct FacebookAdapter {
    comment: Selector,
}

impl FacebookAdapter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // Comment and post bodies carry dir="auto" inside an article
            comment: compile(r#"div[role="article"] div[dir="auto"]"#)?,
        })
    }
}

impl PlatformAdapter for FacebookAdapter {
    fn name(&self) -> &'static str {
        "facebook"
    }

    fn candidates(&self, page: &Page) -> Vec<ElementId> {
        page.select(&self.comment)
    }

    fn extract_text(&self, page: &Page, el: ElementId) -> String {
        page.text(el)
    }

    fn insert_annotation(&self, page: &mut Page, el: ElementId, badge: Badge) {
        // Side borders land on every nested dir="auto" block here, so skip them.
        page.prepend(el, badge);
    }
}

pub struct TwitterAdapter {
    tweet_text: Selector,
}

impl TwitterAdapter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tweet_text: compile(r#"[data-testid="tweetText"]"#)?,
        })
    }
}

impl PlatformAdapter for TwitterAdapter {
    fn name(&self) -> &'static str {
        "twitter"
    }

    fn candidates(&self, page: &Page) -> Vec<ElementId> {
        page.select(&self.tweet_text)
    }

    fn extract_text(&self, page: &Page, el: ElementId) -> String {
        page.text(el)
    }

    fn insert_annotation(&self, page: &mut Page, el: ElementId, badge: Badge) {
        paint_accent(page, el, &badge);
        page.prepend(el, badge);
    }
}

/// The fixed set of supported sites, with selectors compiled once.
pub struct AdapterRegistry {
    reddit: RedditAdapter,
    facebook: FacebookAdapter,
    twitter: TwitterAdapter,
}

impl AdapterRegistry {
    pub fn new() -> Result<Self> {
        Ok(Self {
            reddit: RedditAdapter::new()?,
            facebook: FacebookAdapter::new()?,
            twitter: TwitterAdapter::new()?,
        })
    }

    /// Adapter for `host`, or `None` for an unsupported site.
    pub fn resolve(&self, host: &str) -> Option<&dyn PlatformAdapter> {
        let host = host.to_lowercase();
        let adapter: Option<&dyn PlatformAdapter> = if host.contains("reddit") {
            Some(&self.reddit)
        } else if host.contains("facebook") {
            Some(&self.facebook)
        } else if host.contains("twitter") || host == "x.com" || host.ends_with(".x.com") {
            Some(&self.twitter)
        } else {
            None
        };

        match adapter {
            Some(a) => debug!("Host {} resolved to {} adapter", host, a.name()),
            None => debug!("No adapter for host {}", host),
        }
        adapter
    }
}

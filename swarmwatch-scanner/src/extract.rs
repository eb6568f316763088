use crate::adapter::PlatformAdapter;
use crate::model::{CommentRecord, UNKNOWN_AUTHOR};
use crate::page::{ElementId, Page};
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Attribute written onto an element once its badge has been rendered.
pub const SCAN_MARKER: &str = "data-bot-scanned";
pub const SCANNED: &str = "true";

const MAX_ACCOUNT_AGE_DAYS: u32 = 365;
const MAX_POST_VOLUME: u32 = 5000;

/// Length thresholds, counted in characters.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Raw element content must be longer than this.
    pub min_raw_chars: usize,
    /// Extracted comment text must be at least this long.
    pub min_text_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_raw_chars: 10,
            min_text_chars: 5,
        }
    }
}

/// Maps comment ids to the elements they came from, for one cycle only.
///
/// Not `Clone`. Consumed when the owning cycle's results are rendered.
#[derive(Debug, Default)]
pub struct IdentityMap {
    elements: HashMap<String, ElementId>,
}

impl IdentityMap {
    pub fn resolve(&self, comment_id: &str) -> Option<ElementId> {
        self.elements.get(comment_id).copied()
    }

    pub fn contains(&self, comment_id: &str) -> bool {
        self.elements.contains_key(comment_id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn insert(&mut self, comment_id: String, el: ElementId) {
        self.elements.insert(comment_id, el);
    }
}

/// Output of one extraction pass.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<CommentRecord>,
    pub identity: IdentityMap,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn is_scanned(page: &Page, el: ElementId) -> bool {
    page.attr(el, SCAN_MARKER).is_some()
}

pub fn mark_scanned(page: &mut Page, el: ElementId) {
    page.set_attr(el, SCAN_MARKER, SCANNED);
}

#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ExtractOptions {
        self.options
    }

    /// Collects unscanned, long-enough comments from `page`.
    ///
    /// Returns an empty extraction when there is no adapter or nothing left to scan.
    pub fn extract(&self, page: &Page, adapter: Option<&dyn PlatformAdapter>) -> Extraction {
        let Some(adapter) = adapter else {
            return Extraction::default();
        };

        let mut extraction = Extraction::default();
        let mut rng = rand::rng();

        for el in adapter.candidates(page) {
            if is_scanned(page, el) {
                continue;
            }
            if page.text(el).chars().count() <= self.options.min_raw_chars {
                continue;
            }

            let text = adapter.extract_text(page, el);
            if text.chars().count() < self.options.min_text_chars {
                debug!("Skipping {:?}: extracted text too short", el);
                continue;
            }

            let id = adapter
                .native_id(page, el)
                .filter(|native| !extraction.identity.contains(native))
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            let author = adapter
                .author(page, el)
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

            debug!("Extracted comment {} ({} chars)", id, text.chars().count());
            extraction.identity.insert(id.clone(), el);
            extraction.records.push(CommentRecord {
                id,
                author,
                text,
                account_age_days: rng.random_range(0..MAX_ACCOUNT_AGE_DAYS),
                post_volume: rng.random_range(0..MAX_POST_VOLUME),
            });
        }

        extraction
    }
}

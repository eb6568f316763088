// Live page model: a parsed HTML document plus the mutable state a browser
// would hold on top of it (attributes written at runtime, inline styles,
// injected badges, the floating overlay and its pointer listeners).

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// Handle to an element of a [`Page`]. Stable for the lifetime of the element.
pub type ElementId = NodeId;

pub const DEFAULT_VIEWPORT_WIDTH: f64 = 1280.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventKind {
    Enter,
    Move,
    Leave,
}

/// Pointer position in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub page_x: f64,
    pub page_y: f64,
}

impl PointerEvent {
    pub fn new(kind: PointerEventKind, page_x: f64, page_y: f64) -> Self {
        Self {
            kind,
            page_x,
            page_y,
        }
    }
}

/// A floating element appended to the body, e.g. a tooltip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    pub element_id: String,
    pub visible: bool,
    pub left: f64,
    pub top: f64,
    pub max_width: f64,
    pub lines: Vec<String>,
}

/// Page-wide slot holding at most one overlay. Created lazily on first use.
#[derive(Debug)]
pub struct OverlaySlot {
    viewport_width: f64,
    scroll_x: f64,
    overlay: Option<Overlay>,
    created: usize,
}

impl OverlaySlot {
    pub fn new(viewport_width: f64) -> Self {
        Self {
            viewport_width,
            scroll_x: 0.0,
            overlay: None,
            created: 0,
        }
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    /// Horizontal scroll offset, in page coordinates.
    pub fn scroll_x(&self) -> f64 {
        self.scroll_x
    }

    pub fn set_scroll_x(&mut self, scroll_x: f64) {
        self.scroll_x = scroll_x.max(0.0);
    }

    pub fn get(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    /// Existing overlay, or a new one built by `create` if none exists yet.
    pub fn get_or_create(&mut self, create: impl FnOnce() -> Overlay) -> &mut Overlay {
        if self.overlay.is_none() {
            self.created += 1;
        }
        self.overlay.get_or_insert_with(create)
    }

    pub fn get_mut(&mut self) -> Option<&mut Overlay> {
        self.overlay.as_mut()
    }

    /// How many overlays have ever been created on this page.
    pub fn created_count(&self) -> usize {
        self.created
    }
}

pub type PointerListener = Rc<dyn Fn(&mut OverlaySlot, &PointerEvent)>;

/// Inline annotation element injected next to a comment.
#[derive(Clone)]
pub struct Badge {
    pub label: String,
    pub background: String,
    pub color: String,
    pub opacity: Option<f32>,
    /// Side-border color applied to the comment container, if any.
    pub accent: Option<String>,
    /// `data-*` attributes carried by the badge element.
    pub data: BTreeMap<String, String>,
    listeners: Vec<(PointerEventKind, PointerListener)>,
}

impl Badge {
    pub fn new(label: impl Into<String>, background: &str, color: &str) -> Self {
        Self {
            label: label.into(),
            background: background.to_string(),
            color: color.to_string(),
            opacity: None,
            accent: None,
            data: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn with_accent(mut self, accent: &str) -> Self {
        self.accent = Some(accent.to_string());
        self
    }

    pub fn with_data(mut self, key: &str, value: impl ToString) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn data(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn on(mut self, kind: PointerEventKind, listener: PointerListener) -> Self {
        self.listeners.push((kind, listener));
        self
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Badge")
            .field("label", &self.label)
            .field("background", &self.background)
            .field("color", &self.color)
            .field("opacity", &self.opacity)
            .field("accent", &self.accent)
            .field("data", &self.data)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Inserted as the next sibling of the anchor.
    After,
    /// Inserted as the first child of the anchor.
    Prepend,
}

#[derive(Debug, Clone)]
pub struct Annotation {
    /// The comment element the badge belongs to.
    pub owner: ElementId,
    pub anchor: ElementId,
    pub placement: Placement,
    pub badge: Badge,
}

pub struct Page {
    host: String,
    document: Html,
    attributes: HashMap<ElementId, BTreeMap<String, String>>,
    styles: HashMap<ElementId, BTreeMap<String, String>>,
    annotations: Vec<Annotation>,
    overlay: OverlaySlot,
}

impl Page {
    pub fn parse(host: &str, html: &str) -> Self {
        Self {
            host: host.to_lowercase(),
            document: Html::parse_document(html),
            attributes: HashMap::new(),
            styles: HashMap::new(),
            annotations: Vec::new(),
            overlay: OverlaySlot::new(DEFAULT_VIEWPORT_WIDTH),
        }
    }

    pub fn with_viewport_width(mut self, width: f64) -> Self {
        self.overlay = OverlaySlot::new(width);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn body(&self) -> Option<ElementId> {
        self.document
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "body")
            .map(|el| el.id())
    }

    /// Attached elements matching `selector`, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<ElementId> {
        self.document
            .root_element()
            .select(selector)
            .map(|el| el.id())
            .collect()
    }

    /// First descendant of `el` matching `selector`.
    pub fn select_within(&self, el: ElementId, selector: &Selector) -> Option<ElementId> {
        self.element(el)?.select(selector).next().map(|found| found.id())
    }

    pub fn is_attached(&self, el: ElementId) -> bool {
        let root = self.document.tree.root().id();
        match self.document.tree.get(el) {
            Some(node) => node.id() == root || node.ancestors().any(|a| a.id() == root),
            None => false,
        }
    }

    fn element(&self, el: ElementId) -> Option<ElementRef<'_>> {
        if !self.is_attached(el) {
            return None;
        }
        self.document.tree.get(el).and_then(ElementRef::wrap)
    }

    pub fn tag_name(&self, el: ElementId) -> Option<&str> {
        self.element(el).map(|e| e.value().name())
    }

    /// Text content with runs of whitespace collapsed. Empty for detached elements.
    pub fn text(&self, el: ElementId) -> String {
        self.element(el)
            .map(|e| {
                e.text()
                    .flat_map(|chunk| chunk.split_whitespace())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    /// Like [`Page::text`], leaving out the subtrees rooted at `skip`.
    pub fn text_excluding(&self, el: ElementId, skip: &[ElementId]) -> String {
        let Some(element) = self.element(el) else {
            return String::new();
        };
        let mut chunks = Vec::new();
        collect_text(*element, skip, &mut chunks);
        chunks
            .iter()
            .flat_map(|chunk| chunk.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn attr(&self, el: ElementId, name: &str) -> Option<String> {
        if let Some(value) = self.attributes.get(&el).and_then(|attrs| attrs.get(name)) {
            return Some(value.clone());
        }
        self.element(el)?.value().attr(name).map(str::to_string)
    }

    pub fn set_attr(&mut self, el: ElementId, name: &str, value: &str) {
        self.attributes
            .entry(el)
            .or_default()
            .insert(name.to_string(), value.to_string());
    }

    /// Attached elements that had `name` written at runtime, in document order.
    pub fn elements_with_attr(&self, name: &str) -> Vec<ElementId> {
        let mut found: Vec<ElementId> = self
            .attributes
            .iter()
            .filter(|(el, attrs)| attrs.contains_key(name) && self.is_attached(**el))
            .map(|(el, _)| *el)
            .collect();
        found.sort();
        found
    }

    pub fn style(&self, el: ElementId, property: &str) -> Option<&str> {
        self.styles
            .get(&el)
            .and_then(|styles| styles.get(property))
            .map(String::as_str)
    }

    pub fn set_style(&mut self, el: ElementId, property: &str, value: &str) {
        self.styles
            .entry(el)
            .or_default()
            .insert(property.to_string(), value.to_string());
    }

    pub fn insert_after(&mut self, owner: ElementId, anchor: ElementId, badge: Badge) {
        self.annotations.push(Annotation {
            owner,
            anchor,
            placement: Placement::After,
            badge,
        });
    }

    pub fn prepend(&mut self, container: ElementId, badge: Badge) {
        self.annotations.push(Annotation {
            owner: container,
            anchor: container,
            placement: Placement::Prepend,
            badge,
        });
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Annotations anchored on `el` or anywhere inside it.
    pub fn annotations_within(&self, el: ElementId) -> Vec<&Annotation> {
        self.annotations
            .iter()
            .filter(|a| a.anchor == el || self.contains(el, a.anchor))
            .collect()
    }

    /// Annotations placed on behalf of `owner`, wherever they were anchored.
    pub fn annotations_for(&self, owner: ElementId) -> Vec<&Annotation> {
        self.annotations.iter().filter(|a| a.owner == owner).collect()
    }

    /// True when `node` sits strictly inside `ancestor`.
    pub fn contains(&self, ancestor: ElementId, node: ElementId) -> bool {
        self.document
            .tree
            .get(node)
            .map(|n| n.ancestors().any(|a| a.id() == ancestor))
            .unwrap_or(false)
    }

    /// Detaches `el` and its subtree from the document.
    pub fn remove(&mut self, el: ElementId) -> bool {
        if !self.is_attached(el) {
            return false;
        }
        match self.document.tree.get_mut(el) {
            Some(mut node) => {
                node.detach();
                true
            }
            None => false,
        }
    }

    /// Parses `fragment` and appends it under `parent`, as infinite scroll would.
    /// Returns the ids of the top-level elements that were added.
    pub fn append_html(&mut self, parent: ElementId, fragment: &str) -> Vec<ElementId> {
        if !self.is_attached(parent) {
            return Vec::new();
        }
        let source = Html::parse_fragment(fragment);
        let mut added = Vec::new();
        for child in source.root_element().children() {
            if let Some(id) = graft(&mut self.document.tree, parent, child)
                && child.value().is_element()
            {
                added.push(id);
            }
        }
        added
    }

    pub fn overlay(&self) -> &OverlaySlot {
        &self.overlay
    }

    pub fn scroll_to(&mut self, scroll_x: f64) {
        self.overlay.set_scroll_x(scroll_x);
    }

    /// Runs the listeners registered for `event.kind` on the badge of annotation `index`.
    pub fn dispatch_pointer(&mut self, index: usize, event: PointerEvent) -> bool {
        let Some(annotation) = self.annotations.get(index) else {
            return false;
        };
        let mut fired = false;
        for (kind, listener) in &annotation.badge.listeners {
            if *kind == event.kind {
                listener(&mut self.overlay, &event);
                fired = true;
            }
        }
        fired
    }
}

fn collect_text<'a>(node: NodeRef<'a, Node>, skip: &[ElementId], out: &mut Vec<&'a str>) {
    for child in node.children() {
        if skip.contains(&child.id()) {
            continue;
        }
        match child.value() {
            Node::Text(text) => out.push(text),
            Node::Element(_) => collect_text(child, skip, out),
            _ => {}
        }
    }
}

fn graft(tree: &mut Tree<Node>, parent: NodeId, source: NodeRef<'_, Node>) -> Option<NodeId> {
    let id = tree.get_mut(parent)?.append(source.value().clone()).id();
    for child in source.children() {
        graft(tree, id, child);
    }
    Some(id)
}

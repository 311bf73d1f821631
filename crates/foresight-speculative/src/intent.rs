//! Deciding whether an input target is a prefetch candidate

use foresight_network::PageKey;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Minimal view of a document node.
///
/// Hosts implement this over their own element handles. Equality must mean
/// "same node", since pointer transitions between children of one link are
/// detected by comparing the resolved link nodes.
pub trait DomNode: Clone + PartialEq {
    /// Link attributes, when this node is itself a navigable link
    fn link(&self) -> Option<LinkAttributes>;

    /// Parent node, `None` at the root
    fn parent(&self) -> Option<Self>;
}

/// Attributes of a navigable link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkAttributes {
    /// Raw `href`, possibly relative
    pub href: Option<String>,
    /// Browsing-context target (`_blank`, a frame name, ...)
    pub target: Option<String>,
    /// Forced download
    pub download: bool,
    /// Per-element opt-out marker
    pub opt_out: bool,
    /// Per-element opt-in marker; overrides the opt-out
    pub opt_in: bool,
}

impl LinkAttributes {
    /// Link pointing at `href`
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Default::default()
        }
    }

    /// Set the browsing-context target
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Mark as a download link
    pub fn download(mut self) -> Self {
        self.download = true;
        self
    }

    /// Add the opt-out marker
    pub fn opt_out(mut self) -> Self {
        self.opt_out = true;
        self
    }

    /// Add the opt-in marker
    pub fn opt_in(mut self) -> Self {
        self.opt_in = true;
        self
    }
}

/// Walk from `start` up through its ancestors to the first link.
pub fn find_link<N: DomNode>(start: &N) -> Option<(N, LinkAttributes)> {
    let mut current = Some(start.clone());
    while let Some(node) = current {
        if let Some(link) = node.link() {
            return Some((node, link));
        }
        current = node.parent();
    }
    None
}

/// Why a target is not a prefetch candidate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// No link among the target and its ancestors
    #[error("no link element")]
    NoLink,
    /// Link without an href
    #[error("link has no href")]
    MissingHref,
    /// Href does not resolve to a URL
    #[error("unresolvable href: {0}")]
    InvalidHref(String),
    /// Link opens a new browsing context
    #[error("link opens in another browsing context")]
    NewContext,
    /// Link forces a download
    #[error("link is a download")]
    Download,
    /// Link leaves the current origin
    #[error("link points to another origin")]
    CrossOrigin,
    /// Link only moves to a fragment of the current page
    #[error("same-page anchor")]
    SamePageAnchor,
    /// Link carries the opt-out marker
    #[error("link opted out")]
    OptedOut,
    /// Caller-supplied predicate refused the URL
    #[error("refused by candidate filter")]
    Filtered,
}

/// Caller-supplied candidate predicate
pub type CandidateFilter = Arc<dyn Fn(&Url) -> bool + Send + Sync>;

/// An accepted prefetch candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<N> {
    /// Link node the target resolved to
    pub node: N,
    /// Absolute page key of the link
    pub key: PageKey,
}

/// Classifies input targets as prefetch candidates.
///
/// Classification depends on mutable link attributes and on the current
/// page, so nothing is memoized; call it once per event.
#[derive(Clone, Default)]
pub struct IntentClassifier {
    filter: Option<CandidateFilter>,
}

impl IntentClassifier {
    /// Classifier without a caller predicate
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the caller predicate
    pub fn with_filter(mut self, filter: CandidateFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Resolve `target` to a link and classify it against `page`
    pub fn classify<N: DomNode>(&self, target: &N, page: &Url) -> Result<Candidate<N>, Rejection> {
        let (node, link) = find_link(target).ok_or(Rejection::NoLink)?;
        let key = self.classify_link(&link, page)?;
        Ok(Candidate { node, key })
    }

    /// Boolean form of [`IntentClassifier::classify`]
    pub fn is_candidate<N: DomNode>(&self, target: &N, page: &Url) -> bool {
        self.classify(target, page).is_ok()
    }

    /// Classify an already located link
    pub fn classify_link(&self, link: &LinkAttributes, page: &Url) -> Result<PageKey, Rejection> {
        let href = link.href.as_deref().ok_or(Rejection::MissingHref)?;

        if link.target.as_deref().is_some_and(|t| !t.is_empty()) {
            return Err(Rejection::NewContext);
        }
        if link.download {
            return Err(Rejection::Download);
        }

        let key =
            PageKey::resolve(page, href).map_err(|e| Rejection::InvalidHref(e.to_string()))?;

        let origin = page.origin().ascii_serialization();
        if !key.as_str().starts_with(&format!("{}/", origin)) {
            return Err(Rejection::CrossOrigin);
        }

        if key.has_fragment() && key.same_document(page) {
            return Err(Rejection::SamePageAnchor);
        }

        if link.opt_out && !link.opt_in {
            return Err(Rejection::OptedOut);
        }

        if let Some(filter) = &self.filter {
            if !filter(key.url()) {
                return Err(Rejection::Filtered);
            }
        }

        Ok(key)
    }
}

impl std::fmt::Debug for IntentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentClassifier")
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

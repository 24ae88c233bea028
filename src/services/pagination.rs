use crate::models::FeedItem;

/// The candidate pool is this many times the requested page size
pub const POOL_MULTIPLIER: usize = 4;

/// Default ceiling on the candidate pool
pub const DEFAULT_POOL_CAP: usize = 200;

/// A deck with fewer unseen cards than this asks for the next page
pub const REFILL_THRESHOLD: usize = 5;

/// Number of candidates to fetch for a page of `limit` titles
pub fn pool_size(limit: i64, cap: usize) -> usize {
    if limit <= 0 {
        return 0;
    }
    (limit as usize).saturating_mul(POOL_MULTIPLIER).min(cap)
}

/// Takes `[offset, offset + limit)` out of a ranked list. Negative or
/// out-of-range arguments produce an empty page.
pub fn page_slice<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    if offset < 0 || limit <= 0 {
        return Vec::new();
    }
    items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

/// Client-side buffer of feed items for one browsing session.
///
/// The swipe loop shows `items[position]`, advances after every swipe and
/// requests the page at `next_offset()` once `needs_refill()` turns true.
#[derive(Debug, Default, Clone)]
pub struct Deck {
    items: Vec<FeedItem>,
    position: usize,
    exhausted: bool,
}

impl Deck {
    pub fn new() -> Self {
        Self::default()
    }

    /// The card on top of the deck
    pub fn current(&self) -> Option<&FeedItem> {
        self.items.get(self.position)
    }

    /// Moves past the current card, returning it
    pub fn advance(&mut self) -> Option<&FeedItem> {
        let index = self.position;
        if index < self.items.len() {
            self.position += 1;
        }
        self.items.get(index)
    }

    /// Appends a freshly fetched page. An empty page marks the deck exhausted.
    pub fn extend(&mut self, page: Vec<FeedItem>) {
        if page.is_empty() {
            self.exhausted = true;
        }
        self.items.extend(page);
    }

    pub fn remaining(&self) -> usize {
        self.items.len() - self.position
    }

    /// Offset for the next page request: everything delivered so far
    pub fn next_offset(&self) -> i64 {
        self.items.len() as i64
    }

    pub fn needs_refill(&self) -> bool {
        !self.exhausted && self.remaining() < REFILL_THRESHOLD
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.remaining() == 0
    }

    /// Drops everything for a full refresh. Cached pages for the session
    /// must be cleared alongside.
    pub fn reset(&mut self) {
        self.items.clear();
        self.position = 0;
        self.exhausted = false;
    }
}

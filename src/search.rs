//! # Peer Search Module
//!
//! Window arithmetic and query building for the peer search listing.

use serde::{Deserialize, Serialize};

use crate::store::{SearchQuery, DEFAULT_LEVEL_ID};

/// Pagination direction requested from the listing keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageMove {
    Next,
    Previous,
    First,
}

/// One window over `total` search results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
    pub total: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize, total: usize) -> Self {
        Self {
            offset,
            limit: limit.max(1),
            total,
        }
    }

    /// 1-based number of this page
    pub fn number(&self) -> usize {
        self.offset / self.limit + 1
    }

    /// Number of pages, at least one
    pub fn count(&self) -> usize {
        self.total.div_ceil(self.limit).max(1)
    }

    pub fn has_prev(&self) -> bool {
        self.offset > 0
    }

    pub fn has_next(&self) -> bool {
        self.offset + self.limit < self.total
    }

    /// Offset after applying `movement`; stays put at the edges
    pub fn moved(&self, movement: PageMove) -> usize {
        match movement {
            PageMove::Next if self.has_next() => self.offset + self.limit,
            PageMove::Previous => self.offset.saturating_sub(self.limit),
            PageMove::First => 0,
            PageMove::Next => self.offset,
        }
    }
}

/// Build the store query for a role and level choice.
///
/// The default level means "any level".
pub fn build_query(role: &str, level_id: i32, offset: usize, limit: usize) -> SearchQuery {
    SearchQuery {
        role: role.to_string(),
        level_id: (level_id != DEFAULT_LEVEL_ID).then_some(level_id),
        offset,
        limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_numbers() {
        let page = Page::new(10, 10, 25);
        assert_eq!(page.number(), 2);
        assert_eq!(page.count(), 3);
        assert!(page.has_prev());
        assert!(page.has_next());

        let last = Page::new(20, 10, 25);
        assert!(!last.has_next());
        assert_eq!(last.moved(PageMove::Next), 20);
        assert_eq!(last.moved(PageMove::Previous), 10);
        assert_eq!(last.moved(PageMove::First), 0);
    }

    #[test]
    fn test_empty_result() {
        let page = Page::new(0, 10, 0);
        assert_eq!(page.count(), 1);
        assert!(!page.has_prev());
        assert!(!page.has_next());
    }

    #[test]
    fn test_default_level_matches_any() {
        assert_eq!(build_query("qa", DEFAULT_LEVEL_ID, 0, 10).level_id, None);
        assert_eq!(build_query("qa", 4, 0, 10).level_id, Some(4));
    }
}

//! Pagination window builder
//!
//! Builds the page list rendered by list endpoints: always the first and
//! last page, the pages around the active page, and `".."` gap markers
//! where pages were elided.

use serde::ser::{Serialize, Serializer};

/// How many pages to show on each side of the active page.
const WINDOW: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u64),
    Gap,
}

impl Serialize for PageItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageItem::Page(n) => serializer.serialize_u64(*n),
            PageItem::Gap => serializer.serialize_str(".."),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
    pub total: u64,
    pub active_page: u64,
    pub pages: Vec<PageItem>,
}

/// Compute the pagination window for an offset/limit/total triple.
pub fn create_pagination(offset: u64, limit: u64, total: u64) -> Pagination {
    let limit = limit.max(1);
    let total_pages = total.div_ceil(limit).max(1);
    let active_page = (offset / limit + 1).min(total_pages);

    let mut pages = Vec::new();
    pages.push(PageItem::Page(1));

    if total_pages > 1 {
        let start = active_page.saturating_sub(WINDOW).max(2);
        let end = (active_page + WINDOW).min(total_pages - 1);

        if start > 2 {
            pages.push(PageItem::Gap);
        }
        for page in start..=end {
            pages.push(PageItem::Page(page));
        }
        if end < total_pages - 1 {
            pages.push(PageItem::Gap);
        }
        pages.push(PageItem::Page(total_pages));
    }

    Pagination {
        offset,
        limit,
        total,
        active_page,
        pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(p: &Pagination) -> Vec<String> {
        p.pages
            .iter()
            .map(|i| match i {
                PageItem::Page(n) => n.to_string(),
                PageItem::Gap => "..".to_string(),
            })
            .collect()
    }

    #[test]
    fn middle_window_with_gaps() {
        let p = create_pagination(120, 20, 256);
        assert_eq!(p.active_page, 7);
        assert_eq!(
            pages(&p),
            vec!["1", "..", "3", "4", "5", "6", "7", "8", "9", "10", "11", "..", "13"]
        );
    }

    #[test]
    fn first_page_no_leading_gap() {
        let p = create_pagination(0, 20, 256);
        assert_eq!(p.active_page, 1);
        assert_eq!(pages(&p), vec!["1", "2", "3", "4", "5", "..", "13"]);
    }

    #[test]
    fn last_page_no_trailing_gap() {
        let p = create_pagination(240, 20, 256);
        assert_eq!(p.active_page, 13);
        assert_eq!(pages(&p), vec!["1", "..", "9", "10", "11", "12", "13"]);
    }

    #[test]
    fn single_page() {
        let p = create_pagination(0, 20, 5);
        assert_eq!(p.active_page, 1);
        assert_eq!(pages(&p), vec!["1"]);
    }

    #[test]
    fn empty_total_still_has_one_page() {
        let p = create_pagination(0, 20, 0);
        assert_eq!(p.active_page, 1);
        assert_eq!(pages(&p), vec!["1"]);
    }

    #[test]
    fn offset_past_end_clamps_active_page() {
        let p = create_pagination(10_000, 20, 256);
        assert_eq!(p.active_page, 13);
    }

    #[test]
    fn gap_serializes_as_string() {
        let p = create_pagination(120, 20, 256);
        let json = serde_json::to_string(&p.pages).unwrap();
        assert!(json.starts_with("[1,\"..\""));
    }
}

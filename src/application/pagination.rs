//! Page-number pagination over ordered post listings.
//!
//! Mirrors the behaviour visitors expect from `?page=N` links: garbage falls
//! back to the first page and overshooting lands on the last page.

use serde::Serialize;

/// Number of posts rendered per page on every listing.
pub const PAGE_SIZE: u32 = 10;

/// A resolved page position, computed before the slice is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub count: u64,
    pub per_page: u32,
}

impl PageWindow {
    /// Clamp the raw `page` query value against the total `count`.
    pub fn resolve(raw_page: Option<&str>, count: u64, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        let num_pages = num_pages(count, per_page);
        let requested = parse_page_number(raw_page);
        let number = requested.clamp(1, num_pages);

        Self {
            number,
            num_pages,
            count,
            per_page,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }

    /// Attach the fetched slice to this window.
    pub fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
        }
    }
}

/// One page of results plus the metadata templates need for navigation.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub count: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            number: 1,
            num_pages: 1,
            count: 0,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_previous() || self.has_next()
    }

    pub fn previous_page_number(&self) -> Option<u32> {
        self.has_previous().then(|| self.number - 1)
    }

    pub fn next_page_number(&self) -> Option<u32> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
        }
    }
}

/// Page numbers are 1-based; anything unparsable or non-positive means page 1.
pub fn parse_page_number(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value >= 1)
        .unwrap_or(1)
}

fn num_pages(count: u64, per_page: u32) -> u32 {
    if count == 0 {
        return 1;
    }
    let pages = count.div_ceil(u64::from(per_page));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

//! Page-number pagination shared by every feed.
//!
//! Semantics follow the usual paginator contract: a missing or non-numeric
//! page parameter yields the first page, while a numeric value outside
//! `1..=num_pages` clamps to the last page. An empty listing still has one
//! (empty) page.

use std::num::NonZeroU32;

use serde::Serialize;

/// Window into an ordered listing, handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u64,
}

impl PageRequest {
    pub fn new(limit: u32, offset: u64) -> Self {
        Self { limit, offset }
    }
}

/// One page of results plus the metadata templates need for navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total_count: u64,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_page_number(&self) -> Option<u64> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<u64> {
        self.has_previous().then(|| self.number - 1)
    }

    /// 1-based index of the first item on this page, 0 when the listing is empty.
    pub fn start_index(&self) -> u64 {
        if self.total_count == 0 {
            0
        } else {
            (self.number - 1) * u64::from(self.page_size) + 1
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total_count: self.total_count,
            page_size: self.page_size,
        }
    }
}

/// Interpretation of the raw `?page=` query value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    /// Missing or not an integer.
    First,
    /// Integer outside the representable range; always past the end.
    Overflow,
    Requested(i64),
}

impl PageNumber {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Self::First;
        };

        match value.parse::<i64>() {
            Ok(number) => Self::Requested(number),
            Err(_) if looks_numeric(value) => Self::Overflow,
            Err(_) => Self::First,
        }
    }
}

fn looks_numeric(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: NonZeroU32,
}

impl Paginator {
    pub fn new(page_size: NonZeroU32) -> Self {
        Self { page_size }
    }

    pub fn num_pages(&self, total_count: u64) -> u64 {
        if total_count == 0 {
            1
        } else {
            total_count.div_ceil(u64::from(self.page_size.get()))
        }
    }

    /// Resolve the requested page against the listing size.
    pub fn resolve(&self, requested: PageNumber, total_count: u64) -> u64 {
        let last = self.num_pages(total_count);
        match requested {
            PageNumber::First => 1,
            PageNumber::Overflow => last,
            PageNumber::Requested(number) if number < 1 => last,
            PageNumber::Requested(number) => {
                let number = number.unsigned_abs();
                if number > last { last } else { number }
            }
        }
    }

    pub fn request_for(&self, number: u64) -> PageRequest {
        let limit = self.page_size.get();
        let offset = number.saturating_sub(1).saturating_mul(u64::from(limit));
        PageRequest::new(limit, offset)
    }

    pub fn page<T>(&self, number: u64, total_count: u64, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(total_count),
            total_count,
            page_size: self.page_size.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paginator(size: u32) -> Paginator {
        Paginator::new(NonZeroU32::new(size).expect("non-zero"))
    }

    #[test]
    fn page_count_is_ceiling_of_total_over_size() {
        for size in 1..=12u32 {
            let paginator = paginator(size);
            for total in 1..=40u64 {
                let expected = total.div_ceil(u64::from(size));
                assert_eq!(paginator.num_pages(total), expected, "size={size} total={total}");
            }
        }
    }

    #[test]
    fn empty_listing_has_one_page() {
        let paginator = paginator(10);
        assert_eq!(paginator.num_pages(0), 1);
        assert_eq!(paginator.resolve(PageNumber::Requested(3), 0), 1);
    }

    #[test]
    fn last_page_holds_the_remainder() {
        for size in 1..=12u32 {
            let paginator = paginator(size);
            for total in 1..=40u64 {
                let last = paginator.num_pages(total);
                let request = paginator.request_for(last);
                let remaining = total - request.offset;
                let on_last = remaining.min(u64::from(request.limit));
                let expected = match total % u64::from(size) {
                    0 => u64::from(size),
                    rest => rest,
                };
                assert_eq!(on_last, expected, "size={size} total={total}");
            }
        }
    }

    #[test]
    fn non_numeric_page_falls_back_to_first() {
        let paginator = paginator(10);
        assert_eq!(paginator.resolve(PageNumber::parse(None), 13), 1);
        assert_eq!(paginator.resolve(PageNumber::parse(Some("abc")), 13), 1);
        assert_eq!(paginator.resolve(PageNumber::parse(Some("2.0")), 13), 1);
        assert_eq!(paginator.resolve(PageNumber::parse(Some("")), 13), 1);
    }

    #[test]
    fn out_of_range_page_clamps_to_last() {
        let paginator = paginator(10);
        assert_eq!(paginator.resolve(PageNumber::parse(Some("0")), 13), 2);
        assert_eq!(paginator.resolve(PageNumber::parse(Some("-1")), 13), 2);
        assert_eq!(paginator.resolve(PageNumber::parse(Some("99")), 13), 2);
        assert_eq!(
            paginator.resolve(PageNumber::parse(Some("99999999999999999999999")), 13),
            2
        );
        assert_eq!(paginator.resolve(PageNumber::parse(Some(" 2 ")), 13), 2);
    }

    #[test]
    fn page_metadata_reports_neighbours() {
        let paginator = paginator(10);
        let first = paginator.page(1, 13, vec![0u8; 10]);
        assert!(first.has_next());
        assert!(!first.has_previous());
        assert_eq!(first.next_page_number(), Some(2));
        assert_eq!(first.start_index(), 1);

        let second = paginator.page(2, 13, vec![0u8; 3]);
        assert!(!second.has_next());
        assert_eq!(second.previous_page_number(), Some(1));
        assert_eq!(second.start_index(), 11);
        assert_eq!(second.len(), 3);
    }
}

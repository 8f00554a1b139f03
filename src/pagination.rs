//! Sliding window of page buttons for a result listing.

use crate::PAGE_SIZE;
use std::ops::RangeInclusive;

pub const MAX_PAGE_BUTTONS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub current: u32,
    pub total_pages: u32,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageButton {
    pub label: String,
    pub page: u32,
    pub disabled: bool,
    pub active: bool,
}

impl PageWindow {
    /// Returns `None` when everything fits on a single page.
    pub fn new(total_items: u64, current: u32) -> Option<Self> {
        let total_pages = total_pages(total_items);
        if total_pages <= 1 {
            return None;
        }
        let current = current.max(1);
        let span = i64::from(MAX_PAGE_BUTTONS);
        let mut start = (i64::from(current) - span / 2).max(1);
        let end = (start + span - 1).min(i64::from(total_pages));
        if end - start + 1 < span {
            start = (end - span + 1).max(1);
        }
        Some(Self {
            current,
            total_pages,
            start: start as u32,
            end: end as u32,
        })
    }

    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }

    pub fn first_disabled(&self) -> bool {
        self.current == 1
    }

    pub fn last_disabled(&self) -> bool {
        self.current == self.total_pages
    }

    /// First-page jump, the numbered window, then last-page jump.
    pub fn buttons(&self) -> Vec<PageButton> {
        let mut buttons = Vec::with_capacity(MAX_PAGE_BUTTONS as usize + 2);
        buttons.push(PageButton {
            label: "«".to_string(),
            page: 1,
            disabled: self.first_disabled(),
            active: self.current == 1,
        });
        buttons.extend(self.pages().map(|page| PageButton {
            label: page.to_string(),
            page,
            disabled: false,
            active: page == self.current,
        }));
        buttons.push(PageButton {
            label: "»".to_string(),
            page: self.total_pages,
            disabled: self.last_disabled(),
            active: self.current == self.total_pages,
        });
        buttons
    }
}

pub fn total_pages(total_items: u64) -> u32 {
    total_items
        .div_ceil(u64::from(PAGE_SIZE))
        .min(u64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_of_eleven() {
        let window = PageWindow::new(501, 1).unwrap();
        assert_eq!(window.total_pages, 11);
        assert_eq!(window.pages(), 1..=7);
        assert!(window.first_disabled());
        assert!(!window.last_disabled());
        let buttons = window.buttons();
        assert_eq!(buttons.len(), 9);
        assert_eq!(buttons.last().unwrap().page, 11);
        assert!(buttons[1].active);
    }

    #[test]
    fn window_centres_on_current_page() {
        assert_eq!(PageWindow::new(501, 6).unwrap().pages(), 3..=9);
    }

    #[test]
    fn window_clamps_at_the_end() {
        let window = PageWindow::new(501, 11).unwrap();
        assert_eq!(window.pages(), 5..=11);
        assert!(window.last_disabled());
        assert!(!window.first_disabled());
    }

    #[test]
    fn short_listings_show_every_page() {
        assert_eq!(PageWindow::new(120, 2).unwrap().pages(), 1..=3);
    }

    #[test]
    fn single_page_has_no_window() {
        assert!(PageWindow::new(0, 1).is_none());
        assert!(PageWindow::new(50, 1).is_none());
        assert_eq!(total_pages(51), 2);
    }

    #[test]
    fn page_past_the_end_stays_in_range() {
        let window = PageWindow::new(120, 40).unwrap();
        assert_eq!(window.pages(), 1..=3);
    }
}

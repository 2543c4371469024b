/// Page sizes offered to the user.
pub const PAGE_SIZE_CHOICES: [usize; 4] = [5, 10, 20, 50];

pub const DEFAULT_PAGE_SIZE: usize = 10;

pub fn is_valid_page_size(size: usize) -> bool {
    PAGE_SIZE_CHOICES.contains(&size)
}

/// 1-based page cursor over the incomplete partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    current_page: usize,
    items_per_page: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            items_per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(current_page: usize, items_per_page: usize) -> Self {
        Self {
            current_page: current_page.max(1),
            items_per_page: items_per_page.max(1),
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn total_pages(&self, total_items: usize) -> usize {
        total_items.div_ceil(self.items_per_page)
    }

    /// Pulls a page that ran past the end back onto the last valid page.
    pub fn clamped(self, total_items: usize) -> Self {
        let last = self.total_pages(total_items).max(1);
        Self {
            current_page: self.current_page.clamp(1, last),
            ..self
        }
    }

    pub fn bounds(&self, total_items: usize) -> (usize, usize) {
        let start = (self.current_page - 1)
            .saturating_mul(self.items_per_page)
            .min(total_items);
        let end = start.saturating_add(self.items_per_page).min(total_items);
        (start, end)
    }

    pub fn slice<'s, T>(&self, items: &'s [T]) -> &'s [T] {
        let (start, end) = self.bounds(items.len());
        &items[start..end]
    }

    pub fn page_info(&self, total_items: usize) -> PageInfo {
        let (start, end) = self.bounds(total_items);
        PageInfo {
            page: self.current_page,
            total_pages: self.total_pages(total_items),
            total_items,
            start,
            end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// Half-open index range of the page within the partition.
    pub start: usize,
    pub end: usize,
}

impl PageInfo {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

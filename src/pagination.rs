//! Pagination state and paging strategies.
//!
//! A table pages its rows through a [`PagingStrategy`]. Two strategies
//! exist:
//!
//! - [`LocalPaging`] owns the page index and slices the full row
//!   collection in memory.
//! - [`DelegatedPaging`] renders the rows it is given as the current page
//!   and forwards every navigation request to the caller, who re-fetches
//!   and reports the new state back.

use std::ops::Range;

use serde::Serialize;
use tokio::sync::mpsc;

/// Page sizes offered by the page-size selector.
pub const PAGE_SIZE_OPTIONS: [usize; 4] = [10, 25, 50, 100];

/// Page size used until the user picks another one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Maximum number of page-number buttons shown at once.
pub const MAX_PAGE_BUTTONS: usize = 5;

/// Number of pages needed for `total_records` rows. Zero rows means zero pages.
pub fn page_count(total_records: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total_records.div_ceil(page_size)
}

/// Page numbers to show as buttons.
///
/// The window is centered on `current_page` and slid to fit inside
/// `[1, total_pages]` at the extremes.
pub fn page_window(current_page: usize, total_pages: usize) -> Vec<usize> {
    if total_pages == 0 {
        return Vec::new();
    }

    let len = MAX_PAGE_BUTTONS.min(total_pages);
    let current = current_page.clamp(1, total_pages);

    let mut start = current.saturating_sub(MAX_PAGE_BUTTONS / 2).max(1);
    let mut end = start + len - 1;
    if end > total_pages {
        end = total_pages;
        start = end + 1 - len;
    }

    (start..=end).collect()
}

/// Keep only the ASCII digits of a jump-to-page input.
pub fn sanitize_jump_input(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Target page of a jump-to-page input, if it names a valid page.
pub fn resolve_jump(raw: &str, total_pages: usize) -> Option<usize> {
    sanitize_jump_input(raw)
        .parse::<usize>()
        .ok()
        .filter(|page| (1..=total_pages).contains(page))
}

/// Fall back to the default page size for values outside the option set.
pub fn normalize_page_size(size: usize) -> usize {
    if PAGE_SIZE_OPTIONS.contains(&size) {
        size
    } else {
        DEFAULT_PAGE_SIZE
    }
}

/// Current position in a paged collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageState {
    /// 1-based page number.
    pub current_page: usize,
    pub page_size: usize,
    /// Total rows across all pages.
    pub total_records: usize,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            total_records: 0,
        }
    }
}

impl PageState {
    pub fn total_pages(&self) -> usize {
        page_count(self.total_records, self.page_size)
    }

    /// Move to `page` if it exists. Returns whether the page changed.
    pub fn go_to(&mut self, page: usize) -> bool {
        if (1..=self.total_pages()).contains(&page) && page != self.current_page {
            self.current_page = page;
            true
        } else {
            false
        }
    }

    /// Change the page size and return to the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        if page_size == 0 {
            return;
        }
        self.page_size = page_size;
        self.current_page = 1;
    }

    /// Slice bounds of the current page within `row_count` rows.
    pub fn row_range(&self, row_count: usize) -> Range<usize> {
        let start = self
            .current_page
            .saturating_sub(1)
            .saturating_mul(self.page_size)
            .min(row_count);
        let end = start.saturating_add(self.page_size).min(row_count);
        start..end
    }

    /// 1-based index of the first row on the page, or 0 when empty.
    pub fn first_index(&self) -> usize {
        if self.total_records == 0 {
            0
        } else {
            (self.current_page - 1) * self.page_size + 1
        }
    }

    /// 1-based index of the last row on the page.
    pub fn last_index(&self) -> usize {
        (self.current_page * self.page_size).min(self.total_records)
    }
}

/// A navigation request emitted by a delegated table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PageRequest {
    Page(usize),
    PageSize(usize),
}

/// Callback receiving a page number or page size.
pub type PageHandler = Box<dyn FnMut(usize) + Send>;

/// Pagination driven by the caller.
///
/// Supplying this to a table is what makes its pagination controlled.
pub struct ExternalPaging {
    pub state: PageState,
    pub on_page_change: PageHandler,
    pub on_page_size_change: Option<PageHandler>,
}

impl ExternalPaging {
    pub fn new(state: PageState, on_page_change: impl FnMut(usize) + Send + 'static) -> Self {
        Self {
            state,
            on_page_change: Box::new(on_page_change),
            on_page_size_change: None,
        }
    }

    pub fn on_page_size_change(mut self, handler: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_page_size_change = Some(Box::new(handler));
        self
    }

    /// Paging whose requests are delivered over a channel.
    pub fn channel(state: PageState) -> (Self, mpsc::UnboundedReceiver<PageRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let size_tx = tx.clone();

        let paging = Self::new(state, move |page| {
            let _ = tx.send(PageRequest::Page(page));
        })
        .on_page_size_change(move |size| {
            let _ = size_tx.send(PageRequest::PageSize(size));
        });

        (paging, rx)
    }
}

/// How a table turns its rows into pages.
pub trait PagingStrategy: Send {
    /// Page state given the number of rows handed to the table.
    fn state(&self, row_count: usize) -> PageState;

    /// Which of the table's rows belong to the visible page.
    fn visible_range(&self, row_count: usize) -> Range<usize>;

    /// Navigate to an already validated page.
    fn navigate(&mut self, page: usize);

    /// Change the page size; the table returns to page 1.
    fn resize(&mut self, page_size: usize);

    /// The table's row collection was replaced.
    fn rows_changed(&mut self, _row_count: usize) {}

    /// New state reported by the caller.
    fn sync(&mut self, _state: PageState) {}

    /// Whether navigation is delegated to the caller.
    fn is_controlled(&self) -> bool;
}

/// Self-contained paging over an in-memory collection.
#[derive(Debug, Clone)]
pub struct LocalPaging {
    current_page: usize,
    page_size: usize,
    row_count: usize,
}

impl LocalPaging {
    pub fn new(page_size: usize) -> Self {
        Self {
            current_page: 1,
            page_size: page_size.max(1),
            row_count: 0,
        }
    }
}

impl PagingStrategy for LocalPaging {
    fn state(&self, row_count: usize) -> PageState {
        PageState {
            current_page: self.current_page,
            page_size: self.page_size,
            total_records: row_count,
        }
    }

    fn visible_range(&self, row_count: usize) -> Range<usize> {
        self.state(row_count).row_range(row_count)
    }

    fn navigate(&mut self, page: usize) {
        self.current_page = page;
    }

    fn resize(&mut self, page_size: usize) {
        self.page_size = page_size;
        self.current_page = 1;
    }

    fn rows_changed(&mut self, row_count: usize) {
        if row_count != self.row_count {
            self.row_count = row_count;
            self.current_page = 1;
        }
    }

    fn is_controlled(&self) -> bool {
        false
    }
}

/// Paging that forwards navigation to the caller.
pub struct DelegatedPaging {
    external: ExternalPaging,
}

impl DelegatedPaging {
    pub fn new(external: ExternalPaging) -> Self {
        Self { external }
    }
}

impl PagingStrategy for DelegatedPaging {
    fn state(&self, _row_count: usize) -> PageState {
        self.external.state
    }

    fn visible_range(&self, row_count: usize) -> Range<usize> {
        0..row_count
    }

    fn navigate(&mut self, page: usize) {
        (self.external.on_page_change)(page);
    }

    fn resize(&mut self, page_size: usize) {
        // The selector and pager reflect the reset right away; rows follow
        // once the caller syncs.
        self.external.state.page_size = page_size;
        self.external.state.current_page = 1;
        if let Some(handler) = self.external.on_page_size_change.as_mut() {
            handler(page_size);
        }
        (self.external.on_page_change)(1);
    }

    fn sync(&mut self, state: PageState) {
        self.external.state = state;
    }

    fn is_controlled(&self) -> bool {
        true
    }
}

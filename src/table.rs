//! Generic paginated table view.
//!
//! A [`TableView`] holds rows of any serializable type, a column
//! specification and pagination UI state, and produces a [`TableRender`]
//! describing what to draw. It performs no I/O: in controlled mode every
//! navigation request is handed to the caller through [`ExternalPaging`].
//!
//! # Usage
//!
//! ```ignore
//! let columns = vec![
//!     Column::field("IMEI", "imei"),
//!     Column::render("Type", |a: &Alert| Cell::text(&a.alert_type)),
//! ];
//! let mut table = TableView::new(columns, |a: &Alert| a.id.to_string(),
//!     TableOptions::default(), PaginationConfig::default());
//! table.set_rows(alerts);
//! let render = table.render();
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::pagination::{
    DEFAULT_PAGE_SIZE, DelegatedPaging, ExternalPaging, LocalPaging, PAGE_SIZE_OPTIONS,
    PageState, PagingStrategy, page_window, sanitize_jump_input,
};

/// Renderable content of one table cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cell {
    Text {
        text: String,
    },
    /// Colored pill.
    Badge {
        label: String,
        class: String,
    },
    /// Horizontal gauge filled to `fill` percent.
    Meter {
        fill: f64,
        label: String,
        class: String,
    },
    Link {
        label: String,
        href: String,
        title: String,
    },
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Cell::Text { text: text.into() }
    }
}

/// How a column obtains its value from a row.
pub enum Accessor<T> {
    /// A named field of the row's serialized form.
    Field(String),
    /// A function producing the cell.
    Render(Box<dyn Fn(&T) -> Cell + Send + Sync>),
}

/// One table column.
pub struct Column<T> {
    pub header: String,
    pub accessor: Accessor<T>,
    /// Styling hint applied to the header and every cell.
    pub class: Option<String>,
}

impl<T> Column<T> {
    pub fn field(header: &str, name: &str) -> Self {
        Self {
            header: header.to_string(),
            accessor: Accessor::Field(name.to_string()),
            class: None,
        }
    }

    pub fn render(header: &str, render: impl Fn(&T) -> Cell + Send + Sync + 'static) -> Self {
        Self {
            header: header.to_string(),
            accessor: Accessor::Render(Box::new(render)),
            class: None,
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }
}

/// Display options.
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Show the page-size selector and navigation.
    pub pagination: bool,
    /// Show the built-in search box.
    pub searchable: bool,
    pub search_placeholder: String,
    pub empty_message: String,
    pub loading_message: String,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            pagination: true,
            searchable: false,
            search_placeholder: "Search...".to_string(),
            empty_message: "No data available".to_string(),
            loading_message: "Loading data...".to_string(),
        }
    }
}

/// Pagination configuration.
///
/// Supplying `external` makes pagination controlled by the caller;
/// otherwise the table pages its rows itself.
pub struct PaginationConfig {
    pub page_size_options: Vec<usize>,
    pub default_page_size: usize,
    pub external: Option<ExternalPaging>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size_options: PAGE_SIZE_OPTIONS.to_vec(),
            default_page_size: DEFAULT_PAGE_SIZE,
            external: None,
        }
    }
}

impl PaginationConfig {
    pub fn controlled(external: ExternalPaging) -> Self {
        Self {
            external: Some(external),
            ..Self::default()
        }
    }
}

/// What the table should display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableRender {
    Loading {
        message: String,
    },
    Empty {
        message: String,
    },
    Rows {
        search: Option<SearchBox>,
        headers: Vec<HeaderCell>,
        rows: Vec<RenderedRow>,
        pager: Option<PagerView>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchBox {
    pub placeholder: String,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderCell {
    pub label: String,
    pub class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedRow {
    pub key: String,
    pub cells: Vec<RenderedCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedCell {
    pub cell: Cell,
    pub class: Option<String>,
}

/// Pagination controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagerView {
    pub current_page: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub page_size_options: Vec<usize>,
    pub total_records: usize,
    /// "Showing `first_index` to `last_index` of `total_records`".
    pub first_index: usize,
    pub last_index: usize,
    /// Page-number buttons.
    pub window: Vec<usize>,
    pub has_previous: bool,
    pub has_next: bool,
    pub jump_input: String,
}

type KeyFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// A paginated table over rows of type `T`.
pub struct TableView<T> {
    columns: Vec<Column<T>>,
    key_fn: KeyFn<T>,
    rows: Vec<T>,
    loading: bool,
    options: TableOptions,
    page_size_options: Vec<usize>,
    paging: Box<dyn PagingStrategy>,
    jump_input: String,
    search_term: String,
    on_search: Option<Box<dyn FnMut(&str) + Send>>,
}

impl<T: Serialize> TableView<T> {
    pub fn new(
        columns: Vec<Column<T>>,
        key_fn: impl Fn(&T) -> String + Send + Sync + 'static,
        options: TableOptions,
        pagination: PaginationConfig,
    ) -> Self {
        let paging: Box<dyn PagingStrategy> = match pagination.external {
            Some(external) => Box::new(DelegatedPaging::new(external)),
            None => Box::new(LocalPaging::new(pagination.default_page_size)),
        };

        Self {
            columns,
            key_fn: Box::new(key_fn),
            rows: Vec::new(),
            loading: false,
            options,
            page_size_options: pagination.page_size_options,
            paging,
            jump_input: String::new(),
            search_term: String::new(),
            on_search: None,
        }
    }

    /// Receive every edit of the built-in search box.
    pub fn on_search(mut self, handler: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_search = Some(Box::new(handler));
        self
    }

    pub fn set_rows(&mut self, rows: Vec<T>) {
        self.paging.rows_changed(rows.len());
        self.rows = rows;
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn set_empty_message(&mut self, message: &str) {
        self.options.empty_message = message.to_string();
    }

    /// Report the caller's page state in controlled mode.
    pub fn sync_external(&mut self, state: PageState) {
        self.paging.sync(state);
    }

    pub fn is_controlled(&self) -> bool {
        self.paging.is_controlled()
    }

    pub fn page_state(&self) -> PageState {
        self.paging.state(self.rows.len())
    }

    pub fn total_pages(&self) -> usize {
        self.page_state().total_pages()
    }

    /// Navigate to `page`. Out-of-range targets and the current page are ignored.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        let state = self.page_state();
        if !(1..=state.total_pages()).contains(&page) || page == state.current_page {
            return false;
        }
        self.paging.navigate(page);
        true
    }

    pub fn first_page(&mut self) -> bool {
        self.go_to_page(1)
    }

    pub fn previous_page(&mut self) -> bool {
        let current = self.page_state().current_page;
        self.go_to_page(current.saturating_sub(1))
    }

    pub fn next_page(&mut self) -> bool {
        let current = self.page_state().current_page;
        self.go_to_page(current + 1)
    }

    pub fn last_page(&mut self) -> bool {
        let last = self.total_pages();
        self.go_to_page(last)
    }

    /// Edit the jump-to-page input; non-digits are dropped.
    pub fn set_jump_input(&mut self, raw: &str) {
        self.jump_input = sanitize_jump_input(raw);
    }

    pub fn jump_input(&self) -> &str {
        &self.jump_input
    }

    /// Submit the jump-to-page input.
    ///
    /// A numeric input is consumed whether or not it names a valid page.
    pub fn submit_jump(&mut self) -> bool {
        let Ok(page) = self.jump_input.parse::<usize>() else {
            return false;
        };
        self.jump_input.clear();
        self.go_to_page(page)
    }

    /// Choose a new page size; the table returns to page 1.
    pub fn set_page_size(&mut self, page_size: usize) {
        if page_size == 0 {
            return;
        }
        self.paging.resize(page_size);
    }

    pub fn set_search(&mut self, term: &str) {
        self.search_term = term.to_string();
        if let Some(handler) = self.on_search.as_mut() {
            handler(term);
        }
    }

    pub fn render(&self) -> TableRender {
        if self.loading {
            return TableRender::Loading {
                message: self.options.loading_message.clone(),
            };
        }

        if self.rows.is_empty() {
            return TableRender::Empty {
                message: self.options.empty_message.clone(),
            };
        }

        let headers = self
            .columns
            .iter()
            .map(|column| HeaderCell {
                label: column.header.clone(),
                class: column.class.clone(),
            })
            .collect();

        let range = if self.options.pagination {
            self.paging.visible_range(self.rows.len())
        } else {
            0..self.rows.len()
        };
        let rows = self.rows[range]
            .iter()
            .map(|row| self.render_row(row))
            .collect();

        let search = self.options.searchable.then(|| SearchBox {
            placeholder: self.options.search_placeholder.clone(),
            term: self.search_term.clone(),
        });

        TableRender::Rows {
            search,
            headers,
            rows,
            pager: self.options.pagination.then(|| self.pager()),
        }
    }

    fn render_row(&self, row: &T) -> RenderedRow {
        let needs_fields = self
            .columns
            .iter()
            .any(|column| matches!(column.accessor, Accessor::Field(_)));
        let serialized = if needs_fields {
            serde_json::to_value(row).unwrap_or(Value::Null)
        } else {
            Value::Null
        };

        let cells = self
            .columns
            .iter()
            .map(|column| {
                let cell = match &column.accessor {
                    Accessor::Field(name) => Cell::text(field_text(&serialized, name)),
                    Accessor::Render(render) => render(row),
                };
                RenderedCell {
                    cell,
                    class: column.class.clone(),
                }
            })
            .collect();

        RenderedRow {
            key: (self.key_fn)(row),
            cells,
        }
    }

    fn pager(&self) -> PagerView {
        let state = self.page_state();
        let total_pages = state.total_pages();

        PagerView {
            current_page: state.current_page,
            total_pages,
            page_size: state.page_size,
            page_size_options: self.page_size_options.clone(),
            total_records: state.total_records,
            first_index: state.first_index(),
            last_index: state.last_index(),
            window: page_window(state.current_page, total_pages),
            has_previous: state.current_page > 1,
            has_next: state.current_page < total_pages,
            jump_input: self.jump_input.clone(),
        }
    }
}

/// Text of a named field in a serialized row. Missing fields render empty.
fn field_text(row: &Value, name: &str) -> String {
    match row.get(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

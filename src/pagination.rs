/// Splits an ordered listing of `total` rows into pages of `per_page`.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total: usize,
    per_page: usize,
}

/// The slice of rows selected by [`Paginator::page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: usize,
    pub num_pages: usize,
    pub offset: usize,
    pub limit: usize,
}

/// One page of a listing, as handed to templates.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
}

impl Paginator {
    pub fn new(total: usize, per_page: usize) -> Self {
        Self {
            total,
            per_page: per_page.max(1),
        }
    }

    /// Number of pages; an empty listing still has one (empty) page.
    pub fn num_pages(&self) -> usize {
        self.total.div_ceil(self.per_page).max(1)
    }

    /// Resolve a raw `?page=` value. Missing or garbage input falls back to
    /// the first page, numbers past the end clamp to the last page.
    pub fn page(&self, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages();
        let number = requested
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, num_pages);

        let offset = (number - 1) * self.per_page;
        let limit = self.per_page.min(self.total.saturating_sub(offset));

        PageWindow {
            number,
            num_pages,
            offset,
            limit,
        }
    }

    /// Paginate rows already held in memory.
    pub fn slice<T: Clone>(&self, rows: &[T], requested: Option<&str>) -> Page<T> {
        let window = self.page(requested);
        let end = (window.offset + window.limit).min(rows.len());
        let start = window.offset.min(end);
        Page::new(rows[start..end].to_vec(), window)
    }
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn previous_page_number(&self) -> usize {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_page_number(&self) -> usize {
        (self.number + 1).min(self.num_pages)
    }
}

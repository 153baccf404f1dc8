use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

/// Page
///
/// One slice of an ordered listing plus the metadata a client needs to render
/// pagination controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// The resolved 1-based page number after clamping.
    pub number: usize,
    pub page_size: usize,
    pub total_items: usize,
    /// `ceil(total_items / page_size)`; zero for an empty listing.
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// PageQuery
///
/// The `?page=` query parameter. Kept as a raw string so that garbage input
/// resolves to the first page instead of a 400 from the extractor.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(1)
    }
}

/// paginate
///
/// Slices `items` into the requested page. Out-of-range requests never fail:
/// page numbers below 1 resolve to the first page and numbers past the end
/// resolve to the last page. A zero `page_size` is treated as 1.
pub fn paginate<T>(items: Vec<T>, page_number: i64, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);

    let last = total_pages.max(1) as i64;
    let number = page_number.clamp(1, last) as usize;

    let start = (number - 1) * page_size;
    let items: Vec<T> = items.into_iter().skip(start).take(page_size).collect();

    Page {
        items,
        number,
        page_size,
        total_items,
        total_pages,
        has_next: number < total_pages,
        has_previous: number > 1,
    }
}

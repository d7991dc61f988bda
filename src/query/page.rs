use crate::value::Record;
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u64 = 15;

/// One page of results. `next` and `prev` are -1 when there is no such page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Paginated {
    pub total: u64,
    pub page: u64,
    pub next: i64,
    pub prev: i64,
    pub pagesize: u64,
    pub pages: u64,
    pub data: Vec<Record>,
}

impl Paginated {
    pub fn new(total: u64, page: u64, pagesize: u64, data: Vec<Record>) -> Self {
        let next = if page.saturating_mul(pagesize) < total {
            i64::try_from(page).ok().and_then(|p| p.checked_add(1)).unwrap_or(-1)
        } else {
            -1
        };
        let prev = if page > 1 {
            i64::try_from(page - 1).unwrap_or(i64::MAX)
        } else {
            -1
        };
        Paginated {
            total,
            page,
            next,
            prev,
            pagesize,
            pages: total.div_ceil(pagesize.max(1)),
            data,
        }
    }
}

//! Page metadata for list responses.

use crate::error::AppError;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub previous: Option<u64>,
    pub next: Option<u64>,
    pub current: u64,
    pub per_page: u64,
    pub total: u64,
    pub pages: u64,
}

/// Compute page links for `current` (1-based) given page size and row total.
/// An empty result set has zero pages and no links in either direction.
pub fn paginate(current: u64, per_page: u64, total: u64) -> Result<Pagination, AppError> {
    if per_page == 0 {
        return Err(AppError::Validation("per_page must be positive".into()));
    }
    if current == 0 {
        return Err(AppError::Validation("page must be positive".into()));
    }
    let pages = total.div_ceil(per_page);
    let (previous, next) = if pages == 0 {
        (None, None)
    } else {
        let previous = if current == 1 { None } else { Some(current - 1) };
        let next = if current >= pages { None } else { Some(current + 1) };
        (previous, next)
    };
    Ok(Pagination {
        previous,
        next,
        current,
        per_page,
        total,
        pages,
    })
}

/// `page` / `per_page` as read from request data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    /// `page` defaults to 1 and `per_page` to `default_per_page`; `per_page` is capped at `max_per_page`.
    /// Accepts JSON numbers or numeric strings (query-string values arrive as strings).
    pub fn from_data(data: &Map<String, Value>, default_per_page: u32, max_per_page: u32) -> Result<Self, AppError> {
        let page = read_positive(data, "page")?.unwrap_or(1);
        let per_page = read_positive(data, "per_page")?
            .unwrap_or(u64::from(default_per_page))
            .min(u64::from(max_per_page));
        let offset_fits = (page - 1)
            .checked_mul(per_page)
            .is_some_and(|o| i64::try_from(o).is_ok());
        if !offset_fits {
            return Err(AppError::Validation(format!("page {} is out of range", page)));
        }
        Ok(PageRequest { page, per_page })
    }

    /// Rows to skip. Fits in an `i64` for any request built by `from_data`.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

fn read_positive(data: &Map<String, Value>, key: &str) -> Result<Option<u64>, AppError> {
    let n = match data.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    match n {
        Some(n) if n > 0 => Ok(Some(n)),
        _ => Err(AppError::Validation(format!("{} must be a positive integer", key))),
    }
}

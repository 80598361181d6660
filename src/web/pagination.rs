use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::web::error::AppError;

const MAX_PAGE_SIZE: u64 = 100;

/// `page` and `limit` query parameters. Kept as strings so a malformed
/// `limit` falls back to the default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
}

impl PageParams {
    pub fn resolve(&self, default_size: u64) -> Result<PageRequest, AppError> {
        let page = match self.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|page| *page >= 1)
                .ok_or_else(invalid_page)?,
        };
        let size = self
            .limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|size| *size >= 1)
            .unwrap_or(default_size)
            .clamp(1, MAX_PAGE_SIZE);
        Ok(PageRequest { page, size })
    }
}

fn invalid_page() -> AppError {
    AppError::NotFound("Invalid page.".to_string())
}

impl PageRequest {
    fn page_count(&self, count: u64) -> u64 {
        count.div_ceil(self.size).max(1)
    }

    /// Rejects pages past the end. Page 1 always exists.
    pub fn within(self, count: u64) -> Result<PageRequest, AppError> {
        if self.page > self.page_count(count) {
            return Err(invalid_page());
        }
        Ok(self)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: u64, request: PageRequest, uri: &Uri) -> Self {
        let pages = request.page_count(count);
        Page {
            count,
            next: (request.page < pages).then(|| page_link(uri, request.page + 1)),
            previous: (request.page > 1).then(|| page_link(uri, request.page - 1)),
            results,
        }
    }
}

/// Rebuilds the request path with `page` replaced. Page 1 drops the parameter.
fn page_link(uri: &Uri, page: u64) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty() && *pair != "page" && !pair.starts_with("page="))
        .map(str::to_string)
        .collect();
    if page > 1 {
        pairs.push(format!("page={page}"));
    }
    if pairs.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), pairs.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, limit: Option<&str>) -> PageParams {
        PageParams {
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(
            params(None, None).resolve(6).unwrap(),
            PageRequest { page: 1, size: 6 }
        );
        assert_eq!(params(Some("2"), Some("500")).resolve(6).unwrap().size, 100);
        assert_eq!(params(None, Some("0")).resolve(6).unwrap().size, 6);
        assert_eq!(params(None, Some("abc")).resolve(6).unwrap().size, 6);
        assert!(params(Some("0"), None).resolve(6).is_err());
        assert!(params(Some("x"), None).resolve(6).is_err());
    }

    #[test]
    fn past_the_end_is_404_but_empty_first_page_is_fine() {
        let first = PageRequest { page: 1, size: 6 };
        assert!(first.within(0).is_ok());
        let third = PageRequest { page: 3, size: 6 };
        assert!(third.within(12).is_err());
        assert!(third.within(13).is_ok());
    }

    #[test]
    fn links_keep_other_parameters() {
        let uri: Uri = "/api/recipes/?tags=lunch&page=2&limit=1".parse().unwrap();
        let page: Page<i32> = Page::new(vec![1], 3, PageRequest { page: 2, size: 1 }, &uri);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/recipes/?tags=lunch&limit=1&page=3")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/recipes/?tags=lunch&limit=1")
        );

        let last: Page<i32> = Page::new(vec![1], 3, PageRequest { page: 3, size: 1 }, &uri);
        assert!(last.next.is_none());
    }
}

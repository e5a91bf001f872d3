use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

// page/limit query parameters shared by every listing endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, pq: &PageQuery) -> Self {
        Paginated {
            items,
            total,
            total_pages: total_pages(total, pq.limit()),
            current_page: pq.page(),
        }
    }
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_and_limit_are_clamped() {
        let pq = PageQuery { page: Some(0), limit: Some(500) };
        assert_eq!(pq.page(), 1);
        assert_eq!(pq.limit(), 100);

        let pq = PageQuery { page: None, limit: None };
        assert_eq!(pq.page(), 1);
        assert_eq!(pq.limit(), 10);
        assert_eq!(pq.offset(), 0);

        let pq = PageQuery { page: Some(3), limit: Some(20) };
        assert_eq!(pq.offset(), 40);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(25, 10), 3);
    }
}

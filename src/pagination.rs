pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Limit/offset pair derived from 1-based page parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn from_page(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        Pagination {
            limit,
            offset: (page - 1) * limit,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::from_page(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Pagination::from_page(None, None);
        assert_eq!(p.limit, 10);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_offset_from_page() {
        let p = Pagination::from_page(Some(3), Some(25));
        assert_eq!(p.limit, 25);
        assert_eq!(p.offset, 50);
    }

    #[test]
    fn test_clamps_out_of_range_input() {
        let p = Pagination::from_page(Some(0), Some(0));
        assert_eq!(p.limit, 1);
        assert_eq!(p.offset, 0);

        let p = Pagination::from_page(Some(-5), Some(10_000));
        assert_eq!(p.limit, MAX_PAGE_SIZE);
        assert_eq!(p.offset, 0);
    }
}

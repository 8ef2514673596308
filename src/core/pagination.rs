use serde::Serialize;

/// Normalizes raw paging inputs to the 1-based page / nonzero limit
/// contract shared by every feed read.
pub fn clamp_paging(page: usize, limit: usize) -> (usize, usize) {
    (page.max(1), limit.max(1))
}

/// Pagination envelope shared by every feed listing. `has_more` follows the
/// offset contract: `(page - 1) * limit + items.len() < total`.
#[derive(Serialize, Clone)]
pub struct Page<T> {
    pub posts: Vec<T>,
    #[serde(rename = "currentPage")]
    pub current_page: usize,
    pub pages: usize,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
    #[serde(rename = "totalPosts")]
    pub total_posts: usize,
}

impl<T> Page<T> {
    pub fn new(posts: Vec<T>, page: usize, limit: usize, total: usize) -> Self {
        let (page, limit) = clamp_paging(page, limit);
        let skip = (page - 1) * limit;
        Page {
            has_more: skip + posts.len() < total,
            pages: total.div_ceil(limit),
            current_page: page,
            total_posts: total,
            posts,
        }
    }
}

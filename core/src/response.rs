use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One run of candidate text, highlighted or not. A suggestion's blocks
/// concatenate back to the exact original text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub hl: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub weight: f32,
    pub data: Map<String, Value>,
    pub text: Vec<TextBlock>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse {
    pub suggestions: Vec<Suggestion>,
    pub page_number: usize,
    pub total_pages_count: usize,
    pub total_items_count: usize,
}

/// Pagination as requested by the client. Present only when the request
/// carried a `page` parameter; `count == 0` means an unbounded page size.
#[derive(Debug, Clone, Copy, Default)]
pub struct PagingParams {
    pub count: usize,
    pub page: usize,
}

impl PagingParams {
    pub fn apply(&self, mut suggestions: Vec<Suggestion>) -> PaginatedResponse {
        let total_items_count = suggestions.len();
        let total_pages_count = if self.count != 0 {
            total_items_count.div_ceil(self.count)
        } else {
            1
        };
        if self.page != 0 && self.count != 0 {
            let offset = self.page * self.count;
            suggestions = if offset < suggestions.len() {
                suggestions.split_off(offset)
            } else {
                Vec::new()
            };
        }
        if self.count != 0 {
            suggestions.truncate(self.count);
        }
        PaginatedResponse {
            suggestions,
            page_number: self.page,
            total_pages_count,
            total_items_count,
        }
    }
}

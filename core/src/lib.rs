pub mod index;
pub mod item;
pub mod normalize;
pub mod persist;
pub mod query;
pub mod response;
pub mod shard;
pub mod trie;

pub use index::{build_suggest_data, version_stamp, StoredItem, SuggestData};
pub use item::{load_items, Item};
pub use persist::{load_suggest, save_suggest};
pub use query::{get_suggestions, highlight};
pub use response::{PaginatedResponse, PagingParams, SuggestResponse, Suggestion, TextBlock};
pub use shard::{build_sharded, shard_path, ShardedBuildParams};

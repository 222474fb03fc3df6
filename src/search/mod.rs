mod fts5_index;
mod search_index;

pub use fts5_index::Fts5SearchIndex;
pub use search_index::*;

pub mod entry;
pub mod page;
pub mod tag;

pub use entry::{Entry, EntryDetail};
pub use page::Page;
pub use tag::{normalize_tag_name, Tag, TagWithCount};

//! Viewer state: buffered entries, filtering, scrolling and drill-down

pub mod debounce;
pub mod detail;
pub mod filter;
pub mod scroll;
pub mod selection;
pub mod stream;

pub use debounce::Debouncer;
pub use detail::{CaretMove, DetailView};
pub use filter::{Filter, KindFilter};
pub use scroll::AutoScroll;
pub use stream::{MessageStream, StoredEntry};

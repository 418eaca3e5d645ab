//! Paging viewport controller for document readers: a horizontally or
//! vertically scrolling strip of pages with fling, pinch and double-tap zoom,
//! plus the document chooser that feeds it.

pub mod chooser;
pub mod config;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod phase;
pub mod placement;
pub mod provider;
pub mod scroller;
pub mod store;
pub mod view;
pub mod window;

pub use chooser::{scan, ChooserItem, DocumentLister, FsDocumentLister, ItemKind, Purpose};
pub use config::{GestureConfig, Orientation, ViewerConfig};
pub use error::ViewError;
pub use geometry::{Point, Rect, Size};
pub use gesture::{Gesture, GestureDetector, PointerAction, PointerEvent};
pub use phase::{Phase, Touch};
pub use provider::{ContentProvider, NoHooks, PageContent, PageHooks};
pub use scroller::{ScrollDriver, Scroller};
pub use store::{
    id_for_path, FilePositionStore, ListPosition, MemoryPositionStore, PositionStore,
};
pub use view::ReaderView;

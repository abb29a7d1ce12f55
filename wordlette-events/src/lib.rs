//! Typed publish/subscribe with before/listen/after phase ordering.
//!
//! ## Example
//!
//! ```
//! use wordlette_events::{Event, EventDispatch};
//!
//! #[derive(Clone)]
//! struct PageSaved { slug: String }
//!
//! impl Event for PageSaved {
//!     fn event_name(&self) -> &str { "page_saved" }
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//! }
//!
//! # async fn demo() -> Result<(), wordlette_events::DispatchError> {
//! let dispatch = EventDispatch::new();
//! let handle = dispatch.listen(|event: PageSaved| async move {
//!     println!("saved {}", event.slug);
//!     Ok(())
//! });
//! dispatch.emit(PageSaved { slug: "home".into() }).await?;
//! dispatch.stop(handle);
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod event;

pub use dispatch::{DispatchError, EventDispatch, ListenerGuard, ListenerHandle};
pub use event::Event;

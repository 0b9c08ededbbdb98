//! Segment index resolution and download scheduling for one media track.
//!
//! ```text
//! ┌───────────────────────┐                ┌────────────────────┐
//! │                       │   segments()   │                    │
//! │     SegmentIndex      ├────────────────►  SharedValue       │
//! │  Base/List/Template/  │                │  <WantList>        │
//! │       Timeline        │                │                    │
//! └───────────▲───────────┘                └─────────┬──────────┘
//!             │ live bounds                          │ on_update
//! ┌───────────┴───────────┐                ┌─────────▼──────────┐
//! │                       │                │                    ├───┐
//! │    BoundsEstimator    │                │   DownloadQueue    │   │create_request
//! │                       │                │                    ◄───┘
//! └───────────────────────┘                │  [init] [media]    │
//!                                          └─────────┬──────────┘
//!                                                    │ DownloadQueueEvent
//!                                                    ▼
//!                                              buffering sink
//! ```
//!
//! Everything here is single-threaded: values are shared through `Rc` and
//! progress is reported through callbacks, never by blocking.

pub mod bounds;
pub mod cancel;
pub mod error;
pub mod event;
pub mod index;
pub mod queue;
pub mod segment;
pub mod shared;

pub use error::{SeglineError, SeglineResult};
pub use index::SegmentIndex;
pub use queue::{DownloadQueue, DownloadQueueBuilder, DownloadQueueEvent, SegmentFetcher, WantList};
pub use segment::{ByteRange, Segment, TrackType};

//! Resolution of segment indexes.
//!
//! A [`SegmentIndex`] turns the declarative description of a Representation's
//! segments into concrete [`Segment`]s for any requested time window. Four
//! shapes exist, one per way manifests describe segments:
//!
//! | shape                  | manifest element                         |
//! |------------------------|------------------------------------------|
//! | [`BaseIndex`]          | `SegmentBase`, segments from a `sidx`    |
//! | [`ListIndex`]          | `SegmentList`                            |
//! | [`TemplateIndex`]      | `SegmentTemplate@duration`               |
//! | [`TimelineIndex`]      | `SegmentTemplate` + `SegmentTimeline`    |

mod base;
mod context;
mod descriptor;
mod entries;
mod list;
mod template;
mod timeline;
mod url;

pub use base::BaseIndex;
pub use context::{
    Diagnostics, InbandEventFilter, InbandEventScheme, IndexConfig, IndexContext,
    IndexContextBuilder, TracingDiagnostics,
};
pub use descriptor::{
    BaseDescriptor, IndexDescriptor, InitializationDescriptor, ListDescriptor, ListItemDescriptor,
    TemplateDescriptor, TimelineDescriptor,
};
pub use entries::TimelineEntry;
pub use list::{ListIndex, ListItem};
pub use template::TemplateIndex;
pub use timeline::TimelineIndex;
pub use url::{SegmentUrlTemplate, Template};

use serde::Serialize;

use self::entries::IndexScale;
use crate::{segment::ByteRange, Segment, SeglineError};

/// A position an index may or may not be able to give.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum IndexBound {
    /// Position in seconds.
    Known(f64),
    /// There is no such position, e.g. no segment is available.
    Absent,
    /// Not known yet, typically until the bounds of a live presentation are.
    Unknown,
}

impl IndexBound {
    pub fn known(self) -> Option<f64> {
        match self {
            Self::Known(position) => Some(position),
            Self::Absent | Self::Unknown => None,
        }
    }

    pub fn map<F>(self, f: F) -> Self
    where
        F: FnOnce(f64) -> f64,
    {
        match self {
            Self::Known(position) => Self::Known(f(position)),
            other => other,
        }
    }
}

/// Whether segments not announced yet are expected in a time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentExpectation {
    Expected,
    NotExpected,
    Unknown,
}

/// Where the initialization segment of a Representation lives.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InitSource {
    pub url: Option<SegmentUrlTemplate>,
    pub range: Option<ByteRange>,
    pub index_range: Option<ByteRange>,
}

impl InitSource {
    pub fn segment(&self, scale: IndexScale, number: u64) -> Segment {
        Segment {
            id: "init".to_string(),
            time: 0.,
            end: 0.,
            duration: 0.,
            is_init: true,
            range: self.range,
            index_range: self.index_range,
            number: None,
            url: self.url.as_ref().map(|url| url.detokenize(0, number)),
            complete: true,
            timestamp_offset: scale.timestamp_offset(),
        }
    }
}

/// Whether `candidates` holds a segment identical to `segment`.
pub(crate) fn find_segment(candidates: &[Segment], segment: &Segment) -> bool {
    candidates
        .iter()
        .any(|candidate| candidate == segment && candidate.range == segment.range)
}

/// Segment index of one Representation.
#[derive(Debug, Clone)]
pub enum SegmentIndex {
    Base(BaseIndex),
    List(ListIndex),
    Template(TemplateIndex),
    Timeline(TimelineIndex),
}

macro_rules! dispatch {
    ($self:expr, $index:ident => $body:expr) => {
        match $self {
            SegmentIndex::Base($index) => $body,
            SegmentIndex::List($index) => $body,
            SegmentIndex::Template($index) => $body,
            SegmentIndex::Timeline($index) => $body,
        }
    };
}

impl SegmentIndex {
    fn context(&self) -> &IndexContext {
        dispatch!(self, index => &index.context)
    }

    fn scale(&self) -> IndexScale {
        dispatch!(self, index => index.scale)
    }

    pub fn timescale(&self) -> u64 {
        self.scale().timescale
    }

    /// The initialization segment, if the Representation declares one.
    pub fn init_segment(&self) -> Option<Segment> {
        dispatch!(self, index => index.init_segment())
    }

    /// Segments overlapping `[from, from + duration)`, in seconds, in
    /// chronological order.
    pub fn segments(&self, from: f64, duration: f64) -> Vec<Segment> {
        dispatch!(self, index => index.segments(from, duration))
    }

    pub fn first_available_position(&self) -> IndexBound {
        dispatch!(self, index => index.first_available_position())
    }

    pub fn last_available_position(&self) -> IndexBound {
        dispatch!(self, index => index.last_available_position())
    }

    /// End of the last segment this index will ever hold.
    pub fn end(&self) -> IndexBound {
        dispatch!(self, index => index.end())
    }

    /// Whether the manifest should be refreshed before asking for segments
    /// in `[from, to]`.
    pub fn should_refresh(&self, from: f64, to: f64) -> bool {
        match self {
            Self::Base(_) | Self::Template(_) => false,
            Self::List(index) => index.should_refresh(from, to),
            Self::Timeline(index) => index.should_refresh(from, to),
        }
    }

    pub fn await_segment_between(&self, start: f64, end: f64) -> SegmentExpectation {
        dispatch!(self, index => index.await_segment_between(start, end))
    }

    /// `None` when it cannot be known yet.
    pub fn is_segment_still_available(&self, segment: &Segment) -> Option<bool> {
        dispatch!(self, index => index.is_segment_still_available(segment))
    }

    /// Where to seek to if `time` falls in a hole of the index.
    pub fn check_discontinuity(&self, time: f64) -> Option<f64> {
        match self {
            Self::Base(index) => index.check_discontinuity(time),
            Self::Timeline(index) => index.check_discontinuity(time),
            Self::List(_) | Self::Template(_) => None,
        }
    }

    /// Whether `error` may come from a manifest lagging behind the server.
    pub fn can_be_out_of_sync_error(&self, error: &SeglineError) -> bool {
        match self {
            Self::Template(_) | Self::Timeline(_) => {
                self.context().is_dynamic && error.status() == Some(404)
            }
            Self::Base(_) | Self::List(_) => false,
        }
    }

    pub fn is_still_awaiting_future_segments(&self) -> bool {
        match self {
            Self::Base(_) => false,
            Self::List(index) => index.is_still_awaiting_future_segments(),
            Self::Template(index) => index.is_still_awaiting_future_segments(),
            Self::Timeline(index) => index.is_still_awaiting_future_segments(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        match self {
            Self::Base(index) => index.initialized,
            Self::List(_) | Self::Template(_) | Self::Timeline(_) => true,
        }
    }

    /// Injects entries parsed out of band. Only base indexes accept them.
    pub fn initialize(&mut self, entries: Vec<TimelineEntry>) {
        match self {
            Self::Base(index) => index.initialize(entries),
            Self::List(_) | Self::Template(_) | Self::Timeline(_) => {
                tracing::debug!("Index does not need initialization, ignoring entries");
            }
        }
    }

    /// Replaces this index with `other`.
    pub fn replace(&mut self, other: &Self) {
        *self = other.clone();
    }

    /// Updates this index with a refreshed version of it.
    pub fn update(&mut self, other: &Self) {
        match (self, other) {
            (Self::Timeline(index), Self::Timeline(other)) => index.update(other),
            (Self::Base(index), Self::Base(other)) => index.update(other),
            (this, other) => this.replace(other),
        }
    }

    /// Whether inband events of `scheme` should be surfaced.
    pub fn accepts_inband_event(&self, scheme: &InbandEventScheme) -> bool {
        self.context()
            .inband_event_filter
            .as_ref()
            .is_some_and(|filter| filter(scheme))
    }
}

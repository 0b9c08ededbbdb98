use super::{
    entries::{check_entries, IndexScale, TimelineEntry, TimelineSource},
    find_segment, InitSource, IndexBound, IndexContext, SegmentExpectation, SegmentUrlTemplate,
};
use crate::segment::Segment;

/// Index of a Representation addressed by byte ranges of a single resource,
/// typically described by a side-loaded `sidx` box.
///
/// The index starts uninitialized when the manifest only gives the `sidx`
/// location, and becomes usable once its entries are injected with
/// [`BaseIndex::initialize`].
#[derive(Debug, Clone)]
pub struct BaseIndex {
    pub(crate) context: IndexContext,
    pub(crate) scale: IndexScale,
    pub(crate) timeline: Vec<TimelineEntry>,
    pub(crate) media: Option<SegmentUrlTemplate>,
    pub(crate) init: Option<InitSource>,
    pub(crate) start_number: Option<u64>,
    pub(crate) end_number: Option<u64>,
    pub(crate) initialized: bool,
}

impl BaseIndex {
    pub(crate) fn new(
        context: IndexContext,
        scale: IndexScale,
        timeline: Vec<TimelineEntry>,
        media: Option<SegmentUrlTemplate>,
        init: Option<InitSource>,
        start_number: Option<u64>,
        end_number: Option<u64>,
    ) -> Self {
        let initialized = !timeline.is_empty();
        Self {
            context,
            scale,
            timeline,
            media,
            init,
            start_number,
            end_number,
            initialized,
        }
    }

    fn source(&self) -> TimelineSource<'_> {
        TimelineSource {
            timeline: &self.timeline,
            scale: self.scale,
            media: self.media.as_ref(),
            start_number: self.start_number,
            end_number: self.end_number,
            availability_time_complete: true,
            scaled_period_end: self.scaled_period_end(),
        }
    }

    fn scaled_period_end(&self) -> Option<f64> {
        self.context
            .scaled_period_end(self.scale.timescale as f64, self.scale.index_time_offset)
    }

    pub fn init_segment(&self) -> Option<Segment> {
        self.init
            .as_ref()
            .map(|init| init.segment(self.scale, self.start_number.unwrap_or(1)))
    }

    pub fn segments(&self, from: f64, duration: f64) -> Vec<Segment> {
        self.source()
            .segments(from, duration, self.context.period_end, None)
    }

    pub fn first_available_position(&self) -> IndexBound {
        if !self.initialized {
            return IndexBound::Unknown;
        }
        match self.timeline.first() {
            Some(first) => IndexBound::Known(self.scale.from_index_time(first.start as f64)),
            None => IndexBound::Absent,
        }
    }

    pub fn last_available_position(&self) -> IndexBound {
        if !self.initialized {
            return IndexBound::Unknown;
        }
        match self.source().last_requestable_segment_end(None) {
            Some(end) => {
                let end = self.scaled_period_end().map_or(end, |period_end| end.min(period_end));
                IndexBound::Known(self.scale.from_index_time(end))
            }
            None => IndexBound::Absent,
        }
    }

    pub fn end(&self) -> IndexBound {
        self.last_available_position()
    }

    pub fn await_segment_between(&self, _start: f64, _end: f64) -> SegmentExpectation {
        if self.initialized {
            SegmentExpectation::NotExpected
        } else {
            SegmentExpectation::Unknown
        }
    }

    pub fn is_segment_still_available(&self, segment: &Segment) -> Option<bool> {
        if segment.is_init {
            return Some(true);
        }
        if !self.initialized {
            return None;
        }
        let tolerance = 1. / self.scale.timescale as f64;
        Some(find_segment(&self.segments(segment.time, tolerance), segment))
    }

    pub fn check_discontinuity(&self, time: f64) -> Option<f64> {
        self.source().check_discontinuity(time, None)
    }

    /// Injects entries parsed from the segment index. Only the first call with
    /// valid entries has an effect.
    pub fn initialize(&mut self, entries: Vec<TimelineEntry>) {
        if self.initialized {
            tracing::debug!("Base index already initialized, ignoring entries");
            return;
        }
        if let Err(err) = check_entries(&entries) {
            self.context
                .diagnostics
                .warn(&format!("Ignoring segment index entries: {err}"));
            return;
        }
        tracing::debug!(entries = entries.len(), "Initializing base index");
        self.timeline = entries;
        self.initialized = true;
    }

    /// Takes `other`'s parameters, keeping the entries already injected when
    /// `other` has none.
    pub fn update(&mut self, other: &Self) {
        if other.initialized || !self.initialized {
            *self = other.clone();
            return;
        }
        let timeline = std::mem::take(&mut self.timeline);
        *self = other.clone();
        self.timeline = timeline;
        self.initialized = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bounds::BoundsEstimator, segment::ByteRange};
    use std::rc::Rc;

    fn index(timeline: Vec<TimelineEntry>) -> BaseIndex {
        let context = IndexContext::builder(Rc::new(BoundsEstimator::new_static(Some(20.))))
            .period(0., Some(20.))
            .build();
        BaseIndex::new(
            context,
            IndexScale::new(1000, 0, 0.),
            timeline,
            None,
            Some(InitSource {
                url: None,
                range: Some(ByteRange::new(0, Some(799))),
                index_range: Some(ByteRange::new(800, Some(899))),
            }),
            None,
            None,
        )
    }

    fn sidx() -> Vec<TimelineEntry> {
        vec![
            TimelineEntry::new(0, 4000, 0).with_range(ByteRange::new(900, Some(1999))),
            TimelineEntry::new(4000, 4000, 0).with_range(ByteRange::new(2000, Some(2999))),
            TimelineEntry::new(8000, 2000, 0).with_range(ByteRange::new(3000, Some(3499))),
        ]
    }

    #[test]
    fn test_uninitialized() {
        let index = index(Vec::new());
        assert!(!index.initialized);
        assert!(index.segments(0., 10.).is_empty());
        assert_eq!(index.first_available_position(), IndexBound::Unknown);
        assert_eq!(index.await_segment_between(0., 10.), SegmentExpectation::Unknown);

        let init = index.init_segment().unwrap();
        assert!(init.is_init);
        assert_eq!(init.index_range, Some(ByteRange::new(800, Some(899))));
    }

    #[test]
    fn test_initialize_once() {
        let mut index = index(Vec::new());
        index.initialize(sidx());
        index.initialize(vec![TimelineEntry::new(0, 1, 0)]);

        let segments = index.segments(3., 6.);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].range, Some(ByteRange::new(2000, Some(2999))));
        assert_eq!(segments[2].end, 10.);
        assert_eq!(segments[0].number, None);
        assert_eq!(index.last_available_position(), IndexBound::Known(10.));
    }

    #[test]
    fn test_update_keeps_injected_entries() {
        let mut base = index(Vec::new());
        base.initialize(sidx());
        base.update(&index(Vec::new()));

        assert!(base.initialized);
        assert_eq!(base.segments(0., 10.).len(), 3);
    }
}

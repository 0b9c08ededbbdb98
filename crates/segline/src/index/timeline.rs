use super::{
    entries::{calculate_repeat, index_segment_end, update_timeline, IndexScale, TimelineEntry, TimelineSource},
    find_segment, InitSource, IndexBound, IndexContext, SegmentExpectation, SegmentUrlTemplate,
};
use crate::segment::Segment;

/// Index of a Representation described by an explicit, repeat-encoded
/// `SegmentTimeline`.
///
/// Entries are stored as announced. Open-ended repetitions are resolved on
/// each query against the current bounds of the presentation, and segments
/// evicted from the time shift buffer are filtered out of the results rather
/// than removed.
#[derive(Debug, Clone)]
pub struct TimelineIndex {
    pub(crate) context: IndexContext,
    pub(crate) scale: IndexScale,
    pub(crate) timeline: Vec<TimelineEntry>,
    pub(crate) start_number: u64,
    pub(crate) end_number: Option<u64>,
    pub(crate) media: Option<SegmentUrlTemplate>,
    pub(crate) init: Option<InitSource>,
}

impl TimelineIndex {
    pub(crate) fn new(
        context: IndexContext,
        scale: IndexScale,
        timeline: Vec<TimelineEntry>,
        start_number: u64,
        end_number: Option<u64>,
        media: Option<SegmentUrlTemplate>,
        init: Option<InitSource>,
    ) -> Self {
        Self {
            context,
            scale,
            timeline,
            start_number,
            end_number,
            media,
            init,
        }
    }

    fn source(&self) -> TimelineSource<'_> {
        TimelineSource {
            timeline: &self.timeline,
            scale: self.scale,
            media: self.media.as_ref(),
            start_number: Some(self.start_number),
            end_number: self.end_number,
            availability_time_complete: self.context.availability_time_complete,
            scaled_period_end: self.scaled_period_end(),
        }
    }

    fn scaled_period_end(&self) -> Option<f64> {
        self.context
            .scaled_period_end(self.scale.timescale as f64, self.scale.index_time_offset)
    }

    fn maximum_position(&self) -> Option<f64> {
        if !self.context.is_dynamic {
            return None;
        }
        self.context
            .bounds
            .estimated_maximum_position(self.context.availability_time_offset)
    }

    fn minimum_position(&self) -> Option<f64> {
        if !self.context.is_dynamic {
            return None;
        }
        self.context.bounds.estimated_minimum_segment_time()
    }

    pub fn init_segment(&self) -> Option<Segment> {
        self.init
            .as_ref()
            .map(|init| init.segment(self.scale, self.start_number))
    }

    pub fn segments(&self, from: f64, duration: f64) -> Vec<Segment> {
        self.source().segments(
            from,
            duration,
            self.maximum_position(),
            self.minimum_position(),
        )
    }

    pub fn first_available_position(&self) -> IndexBound {
        let Some(first) = self.timeline.first() else {
            return IndexBound::Absent;
        };
        let Some(minimum) = self.minimum_position() else {
            return IndexBound::Known(self.scale.from_index_time(first.start as f64));
        };

        let scaled_min = self.scale.to_index_time(minimum);
        let max_repeat_time = self.source().max_repeat_time(self.maximum_position());
        for (i, entry) in self.timeline.iter().enumerate() {
            let repeat = calculate_repeat(entry, self.timeline.get(i + 1), max_repeat_time);
            let start = entry.start as f64;
            let duration = entry.duration as f64;
            let k = ((scaled_min - start) / duration).ceil().max(0.);
            if k <= repeat as f64 {
                return IndexBound::Known(self.scale.from_index_time(start + k * duration));
            }
        }
        // everything was evicted
        IndexBound::Absent
    }

    pub fn last_available_position(&self) -> IndexBound {
        let Some(last) = self.timeline.last() else {
            return IndexBound::Absent;
        };
        let maximum = self.maximum_position();
        let scaled_period_end = self.scaled_period_end();
        if self.context.is_dynamic
            && maximum.is_none()
            && last.repeat_count < 0
            && scaled_period_end.is_none()
        {
            return IndexBound::Unknown;
        }

        match self.source().last_requestable_segment_end(maximum) {
            Some(end) => {
                let end = scaled_period_end.map_or(end, |period_end| end.min(period_end));
                IndexBound::Known(self.scale.from_index_time(end))
            }
            None => IndexBound::Absent,
        }
    }

    pub fn end(&self) -> IndexBound {
        if self.is_still_awaiting_future_segments() {
            return match self.context.period_end {
                Some(end) => IndexBound::Known(end),
                None => IndexBound::Unknown,
            };
        }
        self.last_available_position()
    }

    /// Whether `to` lies past the last known entry while more are expected.
    pub fn should_refresh(&self, _from: f64, to: f64) -> bool {
        if !self.context.is_dynamic || !self.is_still_awaiting_future_segments() {
            return false;
        }
        let Some(last) = self.timeline.last() else {
            return true;
        };
        let max_repeat_time = self.source().max_repeat_time(self.maximum_position());
        let last_end = index_segment_end(last, None, max_repeat_time);
        self.scale.to_index_time(to) >= last_end
    }

    pub fn await_segment_between(&self, start: f64, end: f64) -> SegmentExpectation {
        if !self.context.is_dynamic {
            return SegmentExpectation::NotExpected;
        }
        if !self.context.bounds.last_position_is_known() {
            return SegmentExpectation::Unknown;
        }

        let rounding = 1.;
        let scaled_period_start = self.scale.to_index_time(self.context.period_start);
        let scaled_period_end = self.scaled_period_end();
        let capped = |time: f64| scaled_period_end.map_or(time, |end| time.min(end));
        let scaled_end = self.scale.to_index_time(end);

        if let Some(last_end) = self
            .source()
            .last_requestable_segment_end(self.maximum_position())
        {
            if capped(last_end) + rounding >= capped(scaled_end) {
                return SegmentExpectation::NotExpected;
            }
        }

        let expected = match scaled_period_end {
            None => scaled_end + rounding > scaled_period_start,
            Some(period_end) => {
                let scaled_start = self.scale.to_index_time(start) - rounding;
                scaled_start < period_end && scaled_end + rounding > scaled_period_start
            }
        };
        if expected {
            SegmentExpectation::Expected
        } else {
            SegmentExpectation::NotExpected
        }
    }

    pub fn is_still_awaiting_future_segments(&self) -> bool {
        if !self.context.is_dynamic {
            return false;
        }
        let scaled_period_end = self.scaled_period_end();

        let Some(last) = self.timeline.last() else {
            // nothing announced in this Period yet
            if let (Some(period_end), Some(live_edge)) =
                (scaled_period_end, self.context.bounds.estimated_live_edge())
            {
                if self.scale.to_index_time(live_edge) > period_end {
                    return false;
                }
            }
            return self.context.is_last_period;
        };

        let Some(period_end) = scaled_period_end else {
            return true;
        };
        index_segment_end(last, None, Some(period_end)) + 1. < period_end
    }

    pub fn is_segment_still_available(&self, segment: &Segment) -> Option<bool> {
        if segment.is_init {
            return Some(true);
        }
        if self.context.is_dynamic && !self.context.bounds.last_position_is_known() {
            return None;
        }
        let tolerance = 1. / self.scale.timescale as f64;
        Some(find_segment(&self.segments(segment.time, tolerance), segment))
    }

    pub fn check_discontinuity(&self, time: f64) -> Option<f64> {
        self.source()
            .check_discontinuity(time, self.maximum_position())
    }

    /// Merges a refreshed version of this index.
    ///
    /// Known entries older than `other`'s first one are kept, along with the
    /// numbering they imply.
    pub fn update(&mut self, other: &Self) {
        let mut timeline = std::mem::take(&mut self.timeline);
        let replaced = update_timeline(&mut timeline, &other.timeline, &*other.context.diagnostics);
        let start_number = if replaced {
            other.start_number
        } else {
            self.start_number
        };
        tracing::debug!(
            replaced,
            entries = timeline.len(),
            "Updated segment timeline"
        );

        *self = Self {
            timeline,
            start_number,
            ..other.clone()
        };
    }
}

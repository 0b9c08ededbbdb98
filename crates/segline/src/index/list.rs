use super::{
    entries::IndexScale, find_segment, InitSource, IndexBound, IndexContext, SegmentExpectation,
};
use crate::segment::{ByteRange, Segment};

/// One `SegmentURL` element.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    /// Resolved media URL, `None` for the Representation's own URL.
    pub url: Option<String>,
    pub range: Option<ByteRange>,
}

/// Index of a Representation described by an explicit list of segments of
/// equal duration.
#[derive(Debug, Clone)]
pub struct ListIndex {
    pub(crate) context: IndexContext,
    pub(crate) scale: IndexScale,
    /// Duration of every segment, in timescale units.
    pub(crate) duration: u64,
    pub(crate) items: Vec<ListItem>,
    pub(crate) init: Option<InitSource>,
}

impl ListIndex {
    pub(crate) fn new(
        context: IndexContext,
        scale: IndexScale,
        duration: u64,
        items: Vec<ListItem>,
        init: Option<InitSource>,
    ) -> Self {
        Self {
            context,
            scale,
            duration,
            items,
            init,
        }
    }

    fn timescale(&self) -> f64 {
        self.scale.timescale as f64
    }

    /// End of the last listed segment, in seconds, ignoring the Period end.
    fn listed_end(&self) -> f64 {
        self.items.len() as f64 * self.duration as f64 / self.timescale() + self.context.period_start
    }

    pub fn init_segment(&self) -> Option<Segment> {
        self.init.as_ref().map(|init| init.segment(self.scale, 1))
    }

    pub fn segments(&self, from: f64, duration: f64) -> Vec<Segment> {
        let timescale = self.timescale();
        let segment_duration = self.duration as f64;
        let up = (from - self.context.period_start) * timescale;
        let to = (from + duration - self.context.period_start) * timescale;
        if to <= 0. || self.items.is_empty() {
            return Vec::new();
        }

        let first = (up / segment_duration).floor().max(0.) as usize;
        let last = ((to / segment_duration).ceil() as usize).min(self.items.len());
        (first..last)
            .map(|i| {
                let item = &self.items[i];
                let time = i as f64 * segment_duration;
                Segment {
                    id: i.to_string(),
                    time: time / timescale + self.context.period_start,
                    end: (time + segment_duration) / timescale + self.context.period_start,
                    duration: segment_duration / timescale,
                    is_init: false,
                    range: item.range,
                    index_range: None,
                    number: None,
                    url: item.url.clone(),
                    complete: true,
                    timestamp_offset: self.scale.timestamp_offset(),
                }
            })
            .collect()
    }

    pub fn first_available_position(&self) -> IndexBound {
        if self.items.is_empty() {
            return IndexBound::Absent;
        }
        IndexBound::Known(self.context.period_start)
    }

    pub fn last_available_position(&self) -> IndexBound {
        if self.items.is_empty() {
            return IndexBound::Absent;
        }
        let end = self.listed_end();
        IndexBound::Known(self.context.period_end.map_or(end, |period_end| end.min(period_end)))
    }

    pub fn end(&self) -> IndexBound {
        self.last_available_position()
    }

    /// Whether `to` falls outside of the listed segments of a dynamic
    /// Representation.
    pub fn should_refresh(&self, _from: f64, to: f64) -> bool {
        if !self.context.is_dynamic {
            return false;
        }
        let i = ((to - self.context.period_start) * self.timescale() / self.duration as f64).floor();
        !(i >= 0. && (i as usize) < self.items.len())
    }

    pub fn await_segment_between(&self, start: f64, end: f64) -> SegmentExpectation {
        if !self.context.is_dynamic {
            return SegmentExpectation::NotExpected;
        }
        let rounding = 1. / self.timescale();
        if end <= self.listed_end() + rounding {
            return SegmentExpectation::NotExpected;
        }
        if self
            .context
            .period_end
            .is_some_and(|period_end| start - rounding >= period_end)
        {
            return SegmentExpectation::NotExpected;
        }
        SegmentExpectation::Expected
    }

    pub fn is_still_awaiting_future_segments(&self) -> bool {
        if !self.context.is_dynamic {
            return false;
        }
        let rounding = 1. / self.timescale();
        self.context
            .period_end
            .is_none_or(|period_end| self.listed_end() + rounding < period_end)
    }

    pub fn is_segment_still_available(&self, segment: &Segment) -> Option<bool> {
        if segment.is_init {
            return Some(true);
        }
        let tolerance = 1. / self.timescale();
        Some(find_segment(&self.segments(segment.time, tolerance), segment))
    }
}

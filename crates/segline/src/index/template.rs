use super::{
    entries::IndexScale, find_segment, InitSource, IndexBound, IndexContext, SegmentExpectation,
    SegmentUrlTemplate,
};
use crate::segment::Segment;

/// Index of a Representation whose segments all share one duration and are
/// addressed by number or time through a URL template.
///
/// Nothing is listed: for dynamic content, the segments available are deduced
/// from the estimated bounds of the presentation.
#[derive(Debug, Clone)]
pub struct TemplateIndex {
    pub(crate) context: IndexContext,
    pub(crate) scale: IndexScale,
    pub(crate) presentation_time_offset: u64,
    /// Duration of every segment, in timescale units.
    pub(crate) duration: u64,
    pub(crate) start_number: u64,
    pub(crate) end_number: Option<u64>,
    pub(crate) media: Option<SegmentUrlTemplate>,
    pub(crate) init: Option<InitSource>,
}

impl TemplateIndex {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        context: IndexContext,
        scale: IndexScale,
        presentation_time_offset: u64,
        duration: u64,
        start_number: u64,
        end_number: Option<u64>,
        media: Option<SegmentUrlTemplate>,
        init: Option<InitSource>,
    ) -> Self {
        Self {
            context,
            scale,
            presentation_time_offset,
            duration,
            start_number,
            end_number,
            media,
            init,
        }
    }

    fn timescale(&self) -> f64 {
        self.scale.timescale as f64
    }

    /// Period end relative to the Period start, in timescale units.
    ///
    /// Static content without a Period end falls back to the declared end of
    /// the content.
    fn relative_period_end(&self) -> Option<f64> {
        let end = match self.context.period_end {
            Some(end) => Some(end),
            None if !self.context.is_dynamic => {
                self.context.bounds.estimated_maximum_position(0.)
            }
            None => None,
        }?;
        Some((end - self.context.period_start) * self.timescale())
    }

    fn cap_segment_count(&self, count: f64) -> f64 {
        match self.end_number {
            Some(end) => count.min(end.saturating_sub(self.start_number) as f64 + 1.),
            None => count,
        }
    }

    /// Start of the first available segment, relative to the Period start.
    fn first_segment_start(&self) -> IndexBound {
        if !self.context.is_dynamic {
            return IndexBound::Known(0.);
        }

        if self.relative_period_end().is_none_or(|end| end == 0.) {
            let maximum = self
                .context
                .bounds
                .estimated_maximum_position(self.context.availability_time_offset);
            if maximum.is_some_and(|maximum| maximum < self.context.period_start) {
                // Period in the future
                return IndexBound::Absent;
            }
        }

        let Some(first_position) = self.context.bounds.estimated_minimum_segment_time() else {
            return IndexBound::Unknown;
        };
        let segment_time = if first_position > self.context.period_start {
            (first_position - self.context.period_start) * self.timescale()
        } else {
            0.
        };
        let duration = self.duration as f64;
        IndexBound::Known((segment_time / duration).floor() * duration)
    }

    /// Start of the last available segment, relative to the Period start.
    fn last_segment_start(&self) -> IndexBound {
        let duration = self.duration as f64;
        let relative_end = self.relative_period_end();

        if self.context.is_dynamic {
            let Some(last_position) = self
                .context
                .bounds
                .estimated_maximum_position(self.context.availability_time_offset)
            else {
                return IndexBound::Unknown;
            };
            let reachable = (last_position - self.context.period_start) * self.timescale();

            let count = match relative_end {
                Some(end) if end < reachable => (end / duration).ceil(),
                // only segments fully produced
                _ => (reachable / duration).floor(),
            };
            let count = self.cap_segment_count(count);
            if count < 1. {
                return IndexBound::Absent;
            }
            return IndexBound::Known((count - 1.) * duration);
        }

        let maximum = relative_end.unwrap_or(0.);
        let count = self.cap_segment_count((maximum / duration).ceil());
        if count < 1. {
            return IndexBound::Absent;
        }
        let regular = (count - 1.) * duration;
        // A Period end slightly past a multiple of the duration does not
        // announce one more segment.
        let minimum_duration = self.context.config.minimum_segment_size * self.timescale();
        if self.end_number.is_some() || maximum - regular > minimum_duration || count < 2. {
            IndexBound::Known(regular)
        } else {
            IndexBound::Known((count - 2.) * duration)
        }
    }

    pub fn init_segment(&self) -> Option<Segment> {
        self.init
            .as_ref()
            .map(|init| init.segment(self.scale, self.start_number))
    }

    pub fn segments(&self, from: f64, duration: f64) -> Vec<Segment> {
        let mut segments = Vec::new();
        let (IndexBound::Known(first), IndexBound::Known(last)) =
            (self.first_segment_start(), self.last_segment_start())
        else {
            return segments;
        };

        let timescale = self.timescale();
        let segment_duration = self.duration as f64;
        let scaled_period_start = self.context.period_start * timescale;
        let up = from * timescale - scaled_period_start;
        let to = (from + duration) * timescale - scaled_period_start;
        let start_position = first.max(up);
        if last.min(to) + segment_duration <= start_position {
            return segments;
        }

        let relative_end = self.relative_period_end();
        let mut k = (start_position / segment_duration).floor() as u64;
        loop {
            let time = k as f64 * segment_duration;
            if time > last || time >= to {
                break;
            }
            let number = self.start_number + k;
            if self.end_number.is_some_and(|end| number > end) {
                break;
            }

            let real_duration = match relative_end {
                Some(end) if time + segment_duration > end => end - time,
                _ => segment_duration,
            };
            let real_time = time + scaled_period_start;
            let manifest_time = time as u64 + self.presentation_time_offset;
            segments.push(Segment {
                id: number.to_string(),
                time: real_time / timescale,
                end: (real_time + real_duration) / timescale,
                duration: real_duration / timescale,
                is_init: false,
                range: None,
                index_range: None,
                number: Some(number),
                url: self
                    .media
                    .as_ref()
                    .map(|media| media.detokenize(manifest_time, number)),
                complete: true,
                timestamp_offset: self.scale.timestamp_offset(),
            });
            k += 1;
        }

        segments
    }

    pub fn first_available_position(&self) -> IndexBound {
        let timescale = self.timescale();
        let period_start = self.context.period_start;
        self.first_segment_start()
            .map(|start| start / timescale + period_start)
    }

    pub fn last_available_position(&self) -> IndexBound {
        let timescale = self.timescale();
        let period_start = self.context.period_start;
        let relative_end = self.relative_period_end().unwrap_or(f64::INFINITY);
        let duration = self.duration as f64;
        self.last_segment_start()
            .map(|start| (start + duration).min(relative_end) / timescale + period_start)
    }

    pub fn end(&self) -> IndexBound {
        if !self.context.is_dynamic {
            return self.last_available_position();
        }
        match self.context.period_end {
            Some(end) => IndexBound::Known(end),
            None => IndexBound::Unknown,
        }
    }

    pub fn await_segment_between(&self, start: f64, end: f64) -> SegmentExpectation {
        if !self.context.is_dynamic {
            return SegmentExpectation::NotExpected;
        }

        let timescale = self.timescale();
        let rounding = 1.;
        let scaled_period_start = self.context.period_start * timescale;
        let scaled_end = end * timescale - scaled_period_start;
        let relative_end = self.relative_period_end();
        let capped = |time: f64| relative_end.map_or(time, |end| time.min(end));

        match self.last_segment_start() {
            IndexBound::Unknown => return SegmentExpectation::Unknown,
            IndexBound::Known(last) => {
                if capped(last + self.duration as f64) + rounding >= capped(scaled_end) {
                    return SegmentExpectation::NotExpected;
                }
            }
            IndexBound::Absent => {}
        }

        let expected = match relative_end {
            None => scaled_end + rounding >= 0.,
            Some(relative_end) => {
                let scaled_start = start * timescale - scaled_period_start;
                scaled_start - rounding < relative_end && scaled_end + rounding >= 0.
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
        let Some(relative_end) = self.relative_period_end() else {
            return true;
        };
        match self.last_segment_start() {
            IndexBound::Known(last) => last + self.duration as f64 + 1. < relative_end,
            IndexBound::Absent | IndexBound::Unknown => true,
        }
    }

    pub fn is_segment_still_available(&self, segment: &Segment) -> Option<bool> {
        if segment.is_init {
            return Some(true);
        }
        if matches!(self.first_segment_start(), IndexBound::Unknown)
            || matches!(self.last_segment_start(), IndexBound::Unknown)
        {
            return None;
        }
        let tolerance = 1. / self.timescale();
        Some(find_segment(&self.segments(segment.time, tolerance), segment))
    }
}

//! Arithmetic over repeat-encoded timelines, shared by the Base and Timeline
//! index shapes.
//!
//! All values handled here are in index time: the Representation's timescale
//! units, offset by its presentation time offset.

use serde::{Deserialize, Serialize};

use super::{context::Diagnostics, url::SegmentUrlTemplate};
use crate::{
    segment::{ByteRange, Segment},
    SeglineError, SeglineResult,
};

/// One `S` element of a `SegmentTimeline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub start: u64,
    pub duration: u64,
    /// Additional repetitions. Negative means "until the next entry, the
    /// Period end, or forever".
    #[serde(default)]
    pub repeat_count: i64,
    #[serde(default)]
    pub range: Option<ByteRange>,
}

impl TimelineEntry {
    pub fn new(start: u64, duration: u64, repeat_count: i64) -> Self {
        Self {
            start,
            duration,
            repeat_count,
            range: None,
        }
    }

    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }
}

/// Conversion between seconds and index time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct IndexScale {
    pub timescale: u64,
    /// `presentation_time_offset - period_start * timescale`.
    pub index_time_offset: f64,
}

impl IndexScale {
    pub fn new(timescale: u64, presentation_time_offset: u64, period_start: f64) -> Self {
        Self {
            timescale,
            index_time_offset: presentation_time_offset as f64 - period_start * timescale as f64,
        }
    }

    pub fn to_index_time(&self, seconds: f64) -> f64 {
        seconds * self.timescale as f64 + self.index_time_offset
    }

    pub fn from_index_time(&self, time: f64) -> f64 {
        (time - self.index_time_offset) / self.timescale as f64
    }

    /// Offset to add to container timestamps, in seconds.
    pub fn timestamp_offset(&self) -> f64 {
        -(self.index_time_offset / self.timescale as f64)
    }
}

/// Rejects entries without duration or out of chronological order.
pub(crate) fn check_entries(entries: &[TimelineEntry]) -> SeglineResult<()> {
    if let Some(entry) = entries.iter().find(|entry| entry.duration == 0) {
        return Err(SeglineError::InvalidDescriptor(format!(
            "timeline entry starting at {} has no duration",
            entry.start
        )));
    }
    if entries.windows(2).any(|pair| pair[1].start < pair[0].start) {
        return Err(SeglineError::InvalidDescriptor(
            "timeline entries are not in chronological order".to_string(),
        ));
    }
    Ok(())
}

/// Resolves the repeat count of `entry`.
///
/// A negative count extends the entry until `next` starts, else until
/// `max_position` (index time), else indefinitely.
pub(crate) fn calculate_repeat(
    entry: &TimelineEntry,
    next: Option<&TimelineEntry>,
    max_position: Option<f64>,
) -> i64 {
    if entry.repeat_count >= 0 {
        return entry.repeat_count;
    }
    if entry.duration == 0 {
        return 0;
    }

    let segment_end = match (next, max_position) {
        (Some(next), _) => next.start as f64,
        (None, Some(max_position)) => max_position,
        (None, None) => f64::MAX,
    };
    // saturating cast for the unbounded case
    ((segment_end - entry.start as f64) / entry.duration as f64).ceil() as i64 - 1
}

/// End of the last repetition of `entry`, in index time.
pub(crate) fn index_segment_end(
    entry: &TimelineEntry,
    next: Option<&TimelineEntry>,
    max_position: Option<f64>,
) -> f64 {
    let repeat = calculate_repeat(entry, next, max_position);
    entry.start as f64 + (repeat as f64 + 1.) * entry.duration as f64
}

/// Index of the repetition of an entry containing `wanted`, 0 if before it.
fn wanted_repeat_index(start: f64, duration: f64, wanted: f64) -> i64 {
    let diff = wanted - start;
    if diff > 0. {
        (diff / duration).floor() as i64
    } else {
        0
    }
}

/// Everything needed to turn a timeline into segments.
pub(crate) struct TimelineSource<'a> {
    pub timeline: &'a [TimelineEntry],
    pub scale: IndexScale,
    pub media: Option<&'a SegmentUrlTemplate>,
    /// `None` when segments are not numbered.
    pub start_number: Option<u64>,
    pub end_number: Option<u64>,
    pub availability_time_complete: bool,
    /// Period end, in index time.
    pub scaled_period_end: Option<f64>,
}

impl TimelineSource<'_> {
    /// Upper bound used to resolve negative repeat counts, in index time.
    pub fn max_repeat_time(&self, maximum_position: Option<f64>) -> Option<f64> {
        match (maximum_position, self.scaled_period_end) {
            (Some(max), Some(end)) => Some(self.scale.to_index_time(max).min(end)),
            (Some(max), None) => Some(self.scale.to_index_time(max)),
            (None, end) => end,
        }
    }

    /// Segments overlapping `[from, from + duration)`, in seconds.
    ///
    /// `maximum_position` caps the window and resolves open-ended repeats.
    /// Segments starting before `minimum_position` are left out.
    pub fn segments(
        &self,
        from: f64,
        duration: f64,
        maximum_position: Option<f64>,
        minimum_position: Option<f64>,
    ) -> Vec<Segment> {
        let mut segments = Vec::new();
        let timeline = self.timeline;
        if timeline.is_empty() {
            return segments;
        }

        let wanted_end = match maximum_position {
            Some(max) => (from + duration).min(max),
            None => from + duration,
        };
        let scaled_up = self.scale.to_index_time(from);
        let scaled_to = self.scale.to_index_time(wanted_end);
        let scaled_min = minimum_position.map(|min| self.scale.to_index_time(min));
        let max_repeat_time = self.max_repeat_time(maximum_position);
        let mut base_number = self.start_number.unwrap_or(0);

        for (i, entry) in timeline.iter().enumerate() {
            if entry.duration == 0 {
                continue;
            }
            let repeat = calculate_repeat(entry, timeline.get(i + 1), max_repeat_time);
            let start = entry.start as f64;
            let entry_duration = entry.duration as f64;

            let mut k = wanted_repeat_index(start, entry_duration, scaled_up);
            let mut segment_time = start + k as f64 * entry_duration;
            while segment_time < scaled_to && k <= repeat {
                let number = base_number.saturating_add(k as u64);
                if self.end_number.is_some_and(|end| number > end) {
                    return segments;
                }
                if scaled_min.is_none_or(|min| segment_time >= min) {
                    let is_last = i == timeline.len() - 1 && k == repeat;
                    segments.push(self.build_segment(entry, segment_time, number, is_last));
                }
                k += 1;
                segment_time = start + k as f64 * entry_duration;
            }

            if segment_time >= scaled_to {
                return segments;
            }
            base_number = base_number.saturating_add(repeat.saturating_add(1).max(0) as u64);
            if self.end_number.is_some_and(|end| base_number > end) {
                return segments;
            }
        }

        segments
    }

    fn build_segment(
        &self,
        entry: &TimelineEntry,
        segment_time: f64,
        number: u64,
        is_last: bool,
    ) -> Segment {
        let timescale = self.scale.timescale as f64;
        let mut time = segment_time - self.scale.index_time_offset;
        let mut real_duration = entry.duration as f64;
        if time < 0. {
            real_duration += time;
            time = 0.;
        }

        Segment {
            id: (segment_time as u64).to_string(),
            time: time / timescale,
            end: (time + real_duration) / timescale,
            duration: real_duration / timescale,
            is_init: false,
            range: entry.range,
            index_range: None,
            number: self.start_number.map(|_| number),
            url: self
                .media
                .map(|media| media.detokenize(segment_time as u64, number)),
            complete: self.availability_time_complete || !is_last,
            timestamp_offset: self.scale.timestamp_offset(),
        }
    }

    /// End, in index time, of the last segment available at `maximum_position`.
    ///
    /// Without a maximum position, the end of the whole timeline.
    pub fn last_requestable_segment_end(&self, maximum_position: Option<f64>) -> Option<f64> {
        let timeline = self.timeline;
        let last = timeline.last()?;
        let Some(maximum_position) = maximum_position else {
            return Some(index_segment_end(last, None, self.scaled_period_end));
        };

        let scaled_max = self.scale.to_index_time(maximum_position);
        for i in (0..timeline.len()).rev() {
            let entry = &timeline[i];
            let start = entry.start as f64;
            let duration = entry.duration as f64;
            if start + duration <= scaled_max {
                let end = index_segment_end(entry, timeline.get(i + 1), self.scaled_period_end);
                if end <= scaled_max {
                    return Some(end);
                }
                let available = ((scaled_max - start) / duration).floor();
                return Some(start + available * duration);
            }
        }
        None
    }

    /// Start of the next entry, in seconds, if `time` falls in a hole of the
    /// timeline.
    pub fn check_discontinuity(&self, time: f64, maximum_position: Option<f64>) -> Option<f64> {
        let timeline = self.timeline;
        let scaled_time = self.scale.to_index_time(time);
        if scaled_time < 0. {
            return None;
        }

        let after = timeline.partition_point(|entry| entry.start as f64 <= scaled_time);
        if after == 0 || after >= timeline.len() {
            return None;
        }
        let entry = &timeline[after - 1];
        let next = &timeline[after];
        let end = index_segment_end(entry, Some(next), self.max_repeat_time(maximum_position));
        if scaled_time < end {
            return None;
        }
        Some(self.scale.from_index_time(next.start as f64))
    }
}

/// Merges a refreshed timeline into `old`.
///
/// Entries `old` knows about that precede `new` are kept. Returns `true` when
/// no common boundary was found and `old` was replaced wholesale.
pub(crate) fn update_timeline(
    old: &mut Vec<TimelineEntry>,
    new: &[TimelineEntry],
    diagnostics: &dyn Diagnostics,
) -> bool {
    let Some(first_new) = new.first() else {
        return false;
    };
    let Some(last_old) = old.last() else {
        *old = new.to_vec();
        return true;
    };

    let new_start = first_new.start;
    if index_segment_end(last_old, Some(first_new), None) < new_start as f64 {
        diagnostics.warn("Manifest update: not enough data to merge timelines");
        *old = new.to_vec();
        return true;
    }

    for i in (0..old.len()).rev() {
        let current = old[i].clone();
        if current.start == new_start {
            old.truncate(i);
            old.extend_from_slice(new);
            return false;
        }
        if current.start > new_start {
            continue;
        }

        if current.start + current.duration > new_start {
            diagnostics.warn("Manifest update removed all previous segments");
            *old = new.to_vec();
            return true;
        }

        if current.repeat_count <= 0 {
            if current.repeat_count < 0 {
                old[i].repeat_count =
                    ((new_start - current.start) / current.duration) as i64 - 1;
            }
            old.truncate(i + 1);
            old.extend_from_slice(new);
            return false;
        }

        let current_end = current.start + current.duration * (current.repeat_count as u64 + 1);
        if current_end <= new_start {
            old.truncate(i + 1);
            old.extend_from_slice(new);
            return false;
        }

        // `new` starts within the repetitions of `current`
        let diff = new_start - current.start;
        let repeats_before = (diff / current.duration) as i64 - 1;
        if diff % current.duration == 0 && current.duration == first_new.duration {
            let repeat_count = if first_new.repeat_count < 0 {
                -1
            } else {
                first_new.repeat_count + repeats_before + 1
            };
            old.truncate(i);
            old.extend_from_slice(new);
            old[i].start = current.start;
            old[i].repeat_count = repeat_count;
            return false;
        }

        diagnostics.warn("Manifest update removed previous segments");
        old[i].repeat_count = repeats_before;
        old.truncate(i + 1);
        old.extend_from_slice(new);
        return false;
    }

    // every known entry starts after the new timeline
    diagnostics.warn("Manifest update: new timeline starts before every known segment");
    *old = new.to_vec();
    true
}

use serde::{Deserialize, Serialize};

use crate::{SeglineError, SeglineResult};

/// Inclusive byte range, as written in manifests and sidx references.
///
/// Deserializes from either a `first-last` string or a `{ start, end }`
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawByteRange")]
pub struct ByteRange {
    pub start: u64,
    /// Last byte included. `None` reads until the end of the resource.
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end + 1 - self.start)
    }

    pub fn to_http_range(&self) -> String {
        if let Some(end) = self.end {
            format!("bytes={}-{}", self.start, end)
        } else {
            format!("bytes={}-", self.start)
        }
    }

    /// Parses a `first-last` byte-range-spec (IETF RFC 7233, 2.1).
    pub fn parse<S>(s: S) -> SeglineResult<Self>
    where
        S: AsRef<str>,
    {
        let s = s.as_ref();
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| SeglineError::InvalidMediaRange(s.to_string()))?;

        let start = start
            .trim()
            .parse::<u64>()
            .map_err(|_| SeglineError::InvalidMediaRange(s.to_string()))?;
        let end = match end.trim() {
            "" => None,
            end => Some(
                end.parse::<u64>()
                    .map_err(|_| SeglineError::InvalidMediaRange(s.to_string()))?,
            ),
        };
        if end.is_some_and(|end| end < start) {
            return Err(SeglineError::InvalidMediaRange(s.to_string()));
        }

        Ok(Self { start, end })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawByteRange {
    Spec(String),
    Bounds { start: u64, end: Option<u64> },
}

impl TryFrom<RawByteRange> for ByteRange {
    type Error = SeglineError;

    fn try_from(raw: RawByteRange) -> SeglineResult<Self> {
        match raw {
            RawByteRange::Spec(spec) => Self::parse(spec),
            RawByteRange::Bounds { start, end } => Ok(Self::new(start, end)),
        }
    }
}

/// An addressable piece of a Representation.
///
/// Segments are values: an index produces fresh ones on each query. Two
/// segments are considered the same when their `id`, `time` and `end` match,
/// whatever index refresh produced them.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub id: String,
    /// Start, in seconds.
    pub time: f64,
    /// End, in seconds.
    pub end: f64,
    pub duration: f64,
    pub is_init: bool,
    pub range: Option<ByteRange>,
    /// Byte range of the segment index, only set on initialization segments.
    pub index_range: Option<ByteRange>,
    /// Sequence number. `None` for init segments and list-based indexes.
    pub number: Option<u64>,
    /// Resolved URL. `None` when the segment lives at the Representation's URL.
    pub url: Option<String>,
    /// `false` while the server is still producing this segment.
    pub complete: bool,
    /// Offset to add to the container timestamps, in seconds.
    pub timestamp_offset: f64,
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.time == other.time && self.end == other.end
    }
}

/// Kind of media a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    #[default]
    Video,
    Audio,
    Text,
}

impl TrackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
        }
    }
}

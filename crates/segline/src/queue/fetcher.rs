use std::{fmt, rc::Rc};

use crate::{
    cancel::CancellationScope,
    segment::{Segment, TrackType},
    SeglineError, SeglineResult,
};

/// Identifies the track a queue downloads segments for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueContent {
    pub track_type: TrackType,
    pub period_id: Option<String>,
    pub adaptation_id: Option<String>,
    pub representation_id: String,
}

/// What a fetcher is asked to load.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub segment: Segment,
    pub content: QueueContent,
}

/// Time information found in a media chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkInfo {
    /// Start of the chunk, in seconds.
    pub time: f64,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ParsedInitSegment<T> {
    pub data: Option<T>,
    /// Timescale of the media segments, found in the init segment.
    pub timescale: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ParsedMediaChunk<T> {
    pub data: Option<T>,
    /// Size of the chunk, in bytes.
    pub chunk_size: Option<usize>,
    /// Offset to apply to the chunk's timestamps, in seconds.
    pub chunk_offset: f64,
    pub info: Option<ChunkInfo>,
    /// The chunk revealed the manifest to be outdated.
    pub needs_manifest_refresh: bool,
}

#[derive(Debug, Clone)]
pub enum ParsedChunk<T> {
    Init(ParsedInitSegment<T>),
    Media(ParsedMediaChunk<T>),
}

impl<T> ParsedChunk<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Media(_) => "media",
        }
    }
}

/// Parses a loaded chunk, given the timescale found in the init segment.
pub type ChunkParser<T> = Box<dyn FnOnce(Option<u32>) -> SeglineResult<ParsedChunk<T>>>;

/// Callbacks a fetcher reports the progress of one request through.
///
/// A request ends by calling exactly one of [`RequestCallbacks::ended`] and
/// [`RequestCallbacks::failed`], unless its scope is cancelled first.
pub struct RequestCallbacks<T> {
    pub(crate) on_chunk: Rc<dyn Fn(ChunkParser<T>)>,
    pub(crate) on_all_chunks_received: Rc<dyn Fn()>,
    pub(crate) on_retry: Rc<dyn Fn(SeglineError)>,
    pub(crate) before_interrupted: Rc<dyn Fn()>,
    pub(crate) before_ended: Rc<dyn Fn()>,
    pub(crate) on_failure: Rc<dyn Fn(SeglineError)>,
}

impl<T> Clone for RequestCallbacks<T> {
    fn clone(&self) -> Self {
        Self {
            on_chunk: self.on_chunk.clone(),
            on_all_chunks_received: self.on_all_chunks_received.clone(),
            on_retry: self.on_retry.clone(),
            before_interrupted: self.before_interrupted.clone(),
            before_ended: self.before_ended.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

impl<T> fmt::Debug for RequestCallbacks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCallbacks").finish_non_exhaustive()
    }
}

impl<T> RequestCallbacks<T> {
    /// A chunk was loaded.
    pub fn chunk<P>(&self, parser: P)
    where
        P: FnOnce(Option<u32>) -> SeglineResult<ParsedChunk<T>> + 'static,
    {
        (self.on_chunk)(Box::new(parser))
    }

    /// Every chunk of the segment was loaded.
    pub fn all_chunks_received(&self) {
        (self.on_all_chunks_received)()
    }

    /// A transient error happened, the request is being retried.
    pub fn retry(&self, error: SeglineError) {
        (self.on_retry)(error)
    }

    /// The request is being aborted following a cancellation.
    pub fn interrupted(&self) {
        (self.before_interrupted)()
    }

    /// The request succeeded.
    pub fn ended(&self) {
        (self.before_ended)()
    }

    /// The request failed for good.
    pub fn failed(&self, error: SeglineError) {
        (self.on_failure)(error)
    }
}

/// Loads segments over the network.
///
/// Requests may report through their callbacks synchronously, from within
/// `create_request`, or later.
pub trait SegmentFetcher<T> {
    type Request;

    /// Starts loading `context.segment`. The request must stop reporting
    /// once `scope` is cancelled.
    fn create_request(
        &self,
        context: RequestContext,
        priority: i32,
        callbacks: RequestCallbacks<T>,
        scope: CancellationScope,
    ) -> Self::Request;

    fn update_priority(&self, request: &Self::Request, priority: i32);
}

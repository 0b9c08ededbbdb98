//! Scheduling of segment requests for one track.
//!
//! The caller publishes what it wants loaded in a [`SharedValue<WantList>`],
//! most urgent first. The [`DownloadQueue`] keeps at most one request in
//! flight for the initialization segment and one for media segments, always
//! targeting the head of the current want-list:
//!
//! ```text
//!                  ┌──────────────────┐  create_request  ┌───────────────┐
//!  WantList ──────►│  DownloadQueue   ├─────────────────►│ SegmentFetcher│
//!  (SharedValue)   │                  │◄─────────────────┤               │
//!                  │ init slot        │    callbacks     └───────────────┘
//!                  │ media slot ──┐   │
//!                  └──────────────┼───┘
//!                                 │ media chunks wait for the init timescale
//!                                 ▼
//!                     DownloadQueueEvent listeners
//! ```

mod fetcher;

pub use fetcher::{
    ChunkInfo, ChunkParser, ParsedChunk, ParsedInitSegment, ParsedMediaChunk, QueueContent,
    RequestCallbacks, RequestContext, SegmentFetcher,
};

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use tokio::sync::mpsc;

use crate::{
    cancel::CancellationScope,
    event::{EventEmitter, ListenerId},
    segment::{Segment, TrackType},
    shared::{ObserveOptions, SharedValue},
    SeglineError, SeglineResult,
};

/// A segment the caller wants loaded, with the priority to load it with.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedSegment {
    pub segment: Segment,
    pub priority: i32,
}

impl QueuedSegment {
    pub fn new(segment: Segment, priority: i32) -> Self {
        Self { segment, priority }
    }
}

/// Segments the caller wants loaded, most urgent first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WantList {
    pub init_segment: Option<QueuedSegment>,
    pub segment_queue: Vec<QueuedSegment>,
}

#[derive(Debug, Clone)]
pub enum DownloadQueueEvent<T> {
    ParsedInitSegment {
        segment: Segment,
        parsed: ParsedInitSegment<T>,
    },
    ParsedMediaSegment {
        segment: Segment,
        parsed: ParsedMediaChunk<T>,
    },
    /// Every chunk of the segment was loaded and relayed.
    FullyLoadedSegment(Segment),
    /// A request failed with a transient error and is being retried.
    RequestRetry {
        segment: Segment,
        error: SeglineError,
    },
    /// The last wanted media segment was loaded and nothing follows it.
    EmptyQueue,
    /// A request failed for good. The queue is stopped.
    Error(SeglineError),
}

#[derive(Default)]
struct RequestFlags {
    /// Ended, failed or cancelled. No callback has any effect past this point.
    complete: Cell<bool>,
    /// Chunks were received before the init timescale was known.
    waiting_on_init: Cell<bool>,
}

struct RequestRecord<R> {
    id: u64,
    segment: Segment,
    priority: i32,
    request: Rc<R>,
    scope: CancellationScope,
}

struct QueueState<R> {
    /// `Some` while started.
    scope: Option<CancellationScope>,
    init_request: Option<RequestRecord<R>>,
    media_request: Option<RequestRecord<R>>,
    /// Id of the media segment fully loaded but waiting for the init timescale
    /// to be relayed.
    media_awaiting_init: Option<String>,
    /// Id of the last init segment loaded.
    init_loaded: Option<String>,
    next_request_id: u64,
    /// Id of the last request started in each slot. A request whose id no
    /// longer matches once `create_request` returns was superseded from
    /// inside that call.
    latest_init_id: u64,
    latest_media_id: u64,
}

struct QueueInner<T: 'static, F: SegmentFetcher<T> + 'static> {
    content: QueueContent,
    want_list: SharedValue<WantList>,
    fetcher: F,
    /// Timescale parsed from the init segment. `Some(None)` once known to be
    /// absent.
    init_timescale: SharedValue<Option<Option<u32>>>,
    events: EventEmitter<DownloadQueueEvent<T>>,
    state: RefCell<QueueState<F::Request>>,
}

/// Downloads the segments of a [`WantList`], one init and one media segment at
/// a time.
pub struct DownloadQueue<T: 'static, F: SegmentFetcher<T> + 'static> {
    inner: Rc<QueueInner<T, F>>,
}

impl<T: 'static, F: SegmentFetcher<T> + 'static> Clone for DownloadQueue<T, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static, F: SegmentFetcher<T> + 'static> DownloadQueue<T, F> {
    /// `has_init_segment` tells whether media chunks must wait for an init
    /// segment to be parsed.
    pub fn new(
        content: QueueContent,
        want_list: SharedValue<WantList>,
        fetcher: F,
        has_init_segment: bool,
    ) -> Self {
        let init_timescale = SharedValue::new(if has_init_segment { None } else { Some(None) });
        Self {
            inner: Rc::new(QueueInner {
                content,
                want_list,
                fetcher,
                init_timescale,
                events: EventEmitter::new(),
                state: RefCell::new(QueueState {
                    scope: None,
                    init_request: None,
                    media_request: None,
                    media_awaiting_init: None,
                    init_loaded: None,
                    next_request_id: 0,
                    latest_init_id: 0,
                    latest_media_id: 0,
                }),
            }),
        }
    }

    /// Starts following the want-list. Does nothing if already started.
    pub fn start(&self) {
        let scope = {
            let mut state = self.inner.state.borrow_mut();
            if state.scope.is_some() {
                return;
            }
            let scope = CancellationScope::new();
            state.scope = Some(scope.clone());
            scope
        };
        tracing::debug!(
            track = self.inner.content.track_type.as_str(),
            representation = %self.inner.content.representation_id,
            "Starting download queue"
        );

        let weak = Rc::downgrade(&self.inner);
        self.inner.want_list.on_update(
            move |want_list, _| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_init_queue_update(want_list);
                }
            },
            ObserveOptions::default()
                .emit_current_value()
                .clear_on(&scope),
        );

        let weak = Rc::downgrade(&self.inner);
        self.inner.want_list.on_update(
            move |want_list, _| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_media_queue_update(want_list);
                }
            },
            ObserveOptions::default()
                .emit_current_value()
                .clear_on(&scope),
        );
    }

    /// Cancels every pending request and stops following the want-list.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Init segment currently being loaded.
    pub fn get_requested_init_segment(&self) -> Option<Segment> {
        let state = self.inner.state.borrow();
        state.init_request.as_ref().map(|record| record.segment.clone())
    }

    /// Media segment currently being loaded.
    pub fn get_requested_media_segment(&self) -> Option<Segment> {
        let state = self.inner.state.borrow();
        state.media_request.as_ref().map(|record| record.segment.clone())
    }

    pub fn subscribe<L>(&self, listener: L) -> ListenerId
    where
        L: Fn(&DownloadQueueEvent<T>) + 'static,
    {
        self.inner.events.add_listener(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.inner.events.remove_listener(id);
    }

    /// Forwards every event to a channel, for async consumers.
    pub fn event_channel(&self) -> mpsc::UnboundedReceiver<DownloadQueueEvent<T>>
    where
        T: Clone,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(move |event| {
            // a dropped receiver only means nobody listens anymore
            let _ = tx.send(event.clone());
        });
        rx
    }
}

impl<T: 'static, F: SegmentFetcher<T> + 'static> QueueInner<T, F> {
    fn active_scope(&self) -> Option<CancellationScope> {
        self.state
            .borrow()
            .scope
            .clone()
            .filter(|scope| !scope.is_cancelled())
    }

    fn is_stopped(&self) -> bool {
        self.active_scope().is_none()
    }

    fn next_request_id(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_request_id += 1;
        state.next_request_id
    }

    fn stop(&self) {
        let scope = {
            let mut state = self.state.borrow_mut();
            state.media_awaiting_init = None;
            state.scope.take()
        };
        if let Some(scope) = scope {
            tracing::debug!(
                representation = %self.content.representation_id,
                "Stopping download queue"
            );
            scope.cancel();
        }
    }

    fn fail(&self, flags: &RequestFlags, error: SeglineError) {
        if flags.complete.replace(true) {
            return;
        }
        tracing::error!(
            representation = %self.content.representation_id,
            "Segment request failed: {error}"
        );
        self.stop();
        self.events.emit(&DownloadQueueEvent::Error(error));
    }

    fn on_media_queue_update(self: &Rc<Self>, want_list: &WantList) {
        if self.is_stopped() {
            return;
        }
        let head = want_list.segment_queue.first();
        let (current, awaiting) = {
            let state = self.state.borrow();
            let current = state
                .media_request
                .as_ref()
                .map(|record| (record.segment.id.clone(), record.priority, record.request.clone()));
            (current, state.media_awaiting_init.clone())
        };

        if let (Some(head), Some(awaiting)) = (head, awaiting) {
            if head.segment.id == awaiting {
                return;
            }
        }

        match (head, current) {
            (None, _) => {
                let previous = {
                    let mut state = self.state.borrow_mut();
                    state.latest_media_id = 0;
                    state.media_request.take()
                };
                if let Some(previous) = previous {
                    tracing::debug!("No more media segment to request, cancelling queue");
                    previous.scope.cancel();
                }
            }
            (Some(head), None) => {
                tracing::debug!(segment = %head.segment.id, "Media segments need to be requested");
                self.restart_media_queue();
            }
            (Some(head), Some((id, priority, request))) => {
                if head.segment.id != id {
                    tracing::debug!(
                        previous = %id,
                        next = %head.segment.id,
                        "Next media segment changed, cancelling previous"
                    );
                    self.restart_media_queue();
                } else if head.priority != priority {
                    tracing::debug!(
                        segment = %id,
                        priority = head.priority,
                        "Priority of next media segment changed"
                    );
                    self.fetcher.update_priority(&request, head.priority);
                    if let Some(record) = self.state.borrow_mut().media_request.as_mut() {
                        record.priority = head.priority;
                    }
                }
            }
        }
    }

    fn clear_media_slot(&self) {
        let mut state = self.state.borrow_mut();
        state.media_request = None;
        state.latest_media_id = 0;
    }

    fn restart_media_queue(self: &Rc<Self>) {
        let previous = self.state.borrow_mut().media_request.take();
        if let Some(previous) = previous {
            previous.scope.cancel();
        }
        let head = self
            .want_list
            .with_value(|want_list| want_list.segment_queue.first().cloned());
        self.request_media(head);
    }

    fn request_media(self: &Rc<Self>, queued: Option<QueuedSegment>) {
        let Some(queue_scope) = self.active_scope() else {
            self.clear_media_slot();
            return;
        };
        let Some(QueuedSegment { segment, priority }) = queued else {
            self.clear_media_slot();
            tracing::debug!("Media queue is empty");
            self.events.emit(&DownloadQueueEvent::EmptyQueue);
            return;
        };

        let id = self.next_request_id();
        self.state.borrow_mut().latest_media_id = id;
        let scope = queue_scope.child();
        let flags = Rc::new(RequestFlags::default());

        {
            let weak = Rc::downgrade(self);
            let flags = flags.clone();
            let segment_id = segment.id.clone();
            scope.register(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let mut state = inner.state.borrow_mut();
                if state.media_request.as_ref().is_some_and(|record| record.id == id) {
                    state.media_request = None;
                }
                if flags.complete.replace(true) {
                    return;
                }
                if state.media_awaiting_init.as_deref() == Some(segment_id.as_str()) {
                    state.media_awaiting_init = None;
                }
                flags.waiting_on_init.set(false);
            });
        }

        let callbacks = self.media_callbacks(id, &segment, &scope, &flags);
        let context = RequestContext {
            segment: segment.clone(),
            content: self.content.clone(),
        };
        tracing::debug!(segment = %segment.id, priority, "Requesting media segment");
        let request = self
            .fetcher
            .create_request(context, priority, callbacks, scope.clone());

        // ended or cancelled synchronously
        if flags.complete.get() || scope.is_cancelled() {
            return;
        }
        if self.state.borrow().latest_media_id != id {
            tracing::debug!(segment = %segment.id, "Media request superseded while being created");
            scope.cancel();
            return;
        }
        self.state.borrow_mut().media_request = Some(RequestRecord {
            id,
            segment,
            priority,
            request: Rc::new(request),
            scope,
        });
    }

    fn media_callbacks(
        self: &Rc<Self>,
        id: u64,
        segment: &Segment,
        scope: &CancellationScope,
        flags: &Rc<RequestFlags>,
    ) -> RequestCallbacks<T> {
        let on_chunk = {
            let weak = Rc::downgrade(self);
            let segment = segment.clone();
            let scope = scope.clone();
            let flags = flags.clone();
            move |parser: ChunkParser<T>| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if scope.is_cancelled() || flags.complete.get() {
                    return;
                }
                if let Some(timescale) = inner.init_timescale.get_value() {
                    inner.relay_media_chunk(&segment, &flags, parser(timescale));
                    return;
                }

                flags.waiting_on_init.set(true);
                let weak = weak.clone();
                let segment = segment.clone();
                let flags = flags.clone();
                inner.init_timescale.wait_until_defined(
                    move |timescale| {
                        if let Some(inner) = weak.upgrade() {
                            inner.relay_media_chunk(&segment, &flags, parser(timescale));
                        }
                    },
                    Some(&scope),
                );
            }
        };

        let on_all_chunks_received = {
            let weak = Rc::downgrade(self);
            let segment = segment.clone();
            let scope = scope.clone();
            let flags = flags.clone();
            move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if scope.is_cancelled() || flags.complete.get() {
                    return;
                }
                if !flags.waiting_on_init.get() {
                    inner
                        .events
                        .emit(&DownloadQueueEvent::FullyLoadedSegment(segment.clone()));
                    return;
                }

                inner.state.borrow_mut().media_awaiting_init = Some(segment.id.clone());
                let weak = weak.clone();
                let segment = segment.clone();
                let flags = flags.clone();
                inner.init_timescale.wait_until_defined(
                    move |_| {
                        let Some(inner) = weak.upgrade() else {
                            return;
                        };
                        {
                            let mut state = inner.state.borrow_mut();
                            if state.media_awaiting_init.as_deref() == Some(segment.id.as_str()) {
                                state.media_awaiting_init = None;
                            }
                        }
                        flags.waiting_on_init.set(false);
                        inner
                            .events
                            .emit(&DownloadQueueEvent::FullyLoadedSegment(segment));
                    },
                    Some(&scope),
                );
            }
        };

        let before_ended = {
            let weak = Rc::downgrade(self);
            let segment_id = segment.id.clone();
            let scope = scope.clone();
            let flags = flags.clone();
            move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if scope.is_cancelled() || flags.complete.get() {
                    return;
                }
                if !flags.waiting_on_init.get() {
                    inner.continue_media_queue(id, &segment_id, &flags, &scope);
                    return;
                }

                let weak = weak.clone();
                let segment_id = segment_id.clone();
                let flags = flags.clone();
                let request_scope = scope.clone();
                inner.init_timescale.wait_until_defined(
                    move |_| {
                        if let Some(inner) = weak.upgrade() {
                            inner.continue_media_queue(id, &segment_id, &flags, &request_scope);
                        }
                    },
                    Some(&scope),
                );
            }
        };

        RequestCallbacks {
            on_chunk: Rc::new(on_chunk),
            on_all_chunks_received: Rc::new(on_all_chunks_received),
            on_retry: self.retry_callback(segment, scope),
            before_interrupted: interrupted_callback(segment),
            before_ended: Rc::new(before_ended),
            on_failure: self.failure_callback(flags),
        }
    }

    fn retry_callback(
        self: &Rc<Self>,
        segment: &Segment,
        scope: &CancellationScope,
    ) -> Rc<dyn Fn(SeglineError)> {
        let weak = Rc::downgrade(self);
        let segment = segment.clone();
        let scope = scope.clone();
        Rc::new(move |error| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if scope.is_cancelled() {
                return;
            }
            tracing::warn!(segment = %segment.id, "Segment request failed, retrying: {error}");
            inner.events.emit(&DownloadQueueEvent::RequestRetry {
                segment: segment.clone(),
                error,
            });
        })
    }

    fn failure_callback(self: &Rc<Self>, flags: &Rc<RequestFlags>) -> Rc<dyn Fn(SeglineError)> {
        let weak = Rc::downgrade(self);
        let flags = flags.clone();
        Rc::new(move |error| {
            if let Some(inner) = weak.upgrade() {
                inner.fail(&flags, error);
            }
        })
    }

    fn relay_media_chunk(
        &self,
        segment: &Segment,
        flags: &RequestFlags,
        parsed: SeglineResult<ParsedChunk<T>>,
    ) {
        match parsed {
            Ok(ParsedChunk::Media(parsed)) => {
                self.events.emit(&DownloadQueueEvent::ParsedMediaSegment {
                    segment: segment.clone(),
                    parsed,
                });
            }
            Ok(other) => self.fail(
                flags,
                SeglineError::UnexpectedSegmentType {
                    expected: "media",
                    actual: other.kind(),
                },
            ),
            Err(error) => self.fail(flags, error),
        }
    }

    /// Requests the segment following `segment_id` in the current want-list.
    fn continue_media_queue(
        self: &Rc<Self>,
        id: u64,
        segment_id: &str,
        flags: &RequestFlags,
        scope: &CancellationScope,
    ) {
        {
            let mut state = self.state.borrow_mut();
            if state.media_request.as_ref().is_some_and(|record| record.id == id) {
                state.media_request = None;
            }
        }
        flags.complete.set(true);
        scope.release();

        let next = self.want_list.with_value(|want_list| {
            let mut queue = want_list.segment_queue.iter();
            match queue.next() {
                Some(head) if head.segment.id == segment_id => queue.next().cloned(),
                head => head.cloned(),
            }
        });
        self.request_media(next);
    }

    fn on_init_queue_update(self: &Rc<Self>, want_list: &WantList) {
        if self.is_stopped() {
            return;
        }
        let wanted = want_list.init_segment.as_ref();
        let (current, loaded) = {
            let state = self.state.borrow();
            let current = state
                .init_request
                .as_ref()
                .map(|record| (record.segment.id.clone(), record.priority, record.request.clone()));
            (current, state.init_loaded.clone())
        };

        match (wanted, current) {
            (Some(wanted), Some((id, priority, request))) if wanted.segment.id == id => {
                if wanted.priority != priority {
                    tracing::debug!(priority = wanted.priority, "Priority of init segment changed");
                    self.fetcher.update_priority(&request, wanted.priority);
                    if let Some(record) = self.state.borrow_mut().init_request.as_mut() {
                        record.priority = wanted.priority;
                    }
                }
            }
            (Some(wanted), None) if loaded.as_deref() == Some(wanted.segment.id.as_str()) => {}
            (None, None) => {
                let mut state = self.state.borrow_mut();
                state.init_loaded = None;
                state.latest_init_id = 0;
            }
            (wanted, _) => self.restart_init_request(wanted.cloned()),
        }
    }

    fn restart_init_request(self: &Rc<Self>, queued: Option<QueuedSegment>) {
        let previous = {
            let mut state = self.state.borrow_mut();
            state.init_loaded = None;
            state.latest_init_id = 0;
            state.init_request.take()
        };
        if let Some(previous) = previous {
            tracing::debug!(segment = %previous.segment.id, "Cancelling init segment request");
            previous.scope.cancel();
        }

        let Some(queue_scope) = self.active_scope() else {
            return;
        };
        let Some(QueuedSegment { segment, priority }) = queued else {
            return;
        };

        let id = self.next_request_id();
        self.state.borrow_mut().latest_init_id = id;
        let scope = queue_scope.child();
        let flags = Rc::new(RequestFlags::default());

        {
            let weak = Rc::downgrade(self);
            let flags = flags.clone();
            scope.register(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut state = inner.state.borrow_mut();
                    if state.init_request.as_ref().is_some_and(|record| record.id == id) {
                        state.init_request = None;
                    }
                }
                flags.complete.set(true);
            });
        }

        let on_chunk = {
            let weak = Rc::downgrade(self);
            let segment = segment.clone();
            let scope = scope.clone();
            let flags = flags.clone();
            move |parser: ChunkParser<T>| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if scope.is_cancelled() || flags.complete.get() {
                    return;
                }
                match parser(None) {
                    Ok(ParsedChunk::Init(parsed)) => {
                        let timescale = parsed.timescale;
                        inner.events.emit(&DownloadQueueEvent::ParsedInitSegment {
                            segment: segment.clone(),
                            parsed,
                        });
                        // releases media chunks waiting for it
                        inner.init_timescale.set_value(Some(timescale));
                    }
                    Ok(other) => inner.fail(
                        &flags,
                        SeglineError::UnexpectedSegmentType {
                            expected: "init",
                            actual: other.kind(),
                        },
                    ),
                    Err(error) => inner.fail(&flags, error),
                }
            }
        };

        let on_all_chunks_received = {
            let weak = Rc::downgrade(self);
            let segment = segment.clone();
            let scope = scope.clone();
            move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !scope.is_cancelled() {
                    inner
                        .events
                        .emit(&DownloadQueueEvent::FullyLoadedSegment(segment.clone()));
                }
            }
        };

        let before_ended = {
            let weak = Rc::downgrade(self);
            let segment_id = segment.id.clone();
            let scope = scope.clone();
            let flags = flags.clone();
            move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if scope.is_cancelled() || flags.complete.replace(true) {
                    return;
                }
                {
                    let mut state = inner.state.borrow_mut();
                    if state.init_request.as_ref().is_some_and(|record| record.id == id) {
                        state.init_request = None;
                    }
                    state.init_loaded = Some(segment_id.clone());
                }
                scope.release();
            }
        };

        let callbacks = RequestCallbacks {
            on_chunk: Rc::new(on_chunk),
            on_all_chunks_received: Rc::new(on_all_chunks_received),
            on_retry: self.retry_callback(&segment, &scope),
            before_interrupted: interrupted_callback(&segment),
            before_ended: Rc::new(before_ended),
            on_failure: self.failure_callback(&flags),
        };
        let context = RequestContext {
            segment: segment.clone(),
            content: self.content.clone(),
        };
        tracing::debug!(segment = %segment.id, priority, "Requesting init segment");
        let request = self
            .fetcher
            .create_request(context, priority, callbacks, scope.clone());

        if flags.complete.get() || scope.is_cancelled() {
            return;
        }
        if self.state.borrow().latest_init_id != id {
            tracing::debug!(segment = %segment.id, "Init request superseded while being created");
            scope.cancel();
            return;
        }
        self.state.borrow_mut().init_request = Some(RequestRecord {
            id,
            segment,
            priority,
            request: Rc::new(request),
            scope,
        });
    }
}

impl<T: 'static, F: SegmentFetcher<T> + 'static> Drop for QueueInner<T, F> {
    fn drop(&mut self) {
        if let Some(scope) = self.state.get_mut().scope.take() {
            scope.cancel();
        }
    }
}

fn interrupted_callback(segment: &Segment) -> Rc<dyn Fn()> {
    let segment_id = segment.id.clone();
    Rc::new(move || {
        tracing::info!(segment = %segment_id, "Segment request interrupted");
    })
}

/// Builder of [`DownloadQueue`]s.
pub struct DownloadQueueBuilder {
    content: QueueContent,
    has_init_segment: bool,
}

impl DownloadQueueBuilder {
    pub fn new() -> Self {
        Self {
            content: QueueContent::default(),
            has_init_segment: true,
        }
    }

    pub fn content(mut self, content: QueueContent) -> Self {
        self.content = content;
        self
    }

    pub fn track_type(mut self, track_type: TrackType) -> Self {
        self.content.track_type = track_type;
        self
    }

    pub fn representation_id<S: Into<String>>(mut self, id: S) -> Self {
        self.content.representation_id = id.into();
        self
    }

    pub fn has_init_segment(mut self, has_init_segment: bool) -> Self {
        self.has_init_segment = has_init_segment;
        self
    }

    pub fn build<T, F>(self, want_list: SharedValue<WantList>, fetcher: F) -> DownloadQueue<T, F>
    where
        T: 'static,
        F: SegmentFetcher<T> + 'static,
    {
        DownloadQueue::new(self.content, want_list, fetcher, self.has_init_segment)
    }
}

impl Default for DownloadQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

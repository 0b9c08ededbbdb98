use std::{cell::RefCell, rc::Rc};

use bytes::Bytes;
use segline::{
    queue::{DownloadQueue, DownloadQueueBuilder, DownloadQueueEvent, QueuedSegment, WantList},
    shared::SharedValue,
    Segment, SeglineError, TrackType,
};

use crate::{fetcher::RecordingFetcher, init_test_tracing};

fn segment(id: &str, time: f64) -> Segment {
    Segment {
        id: id.to_string(),
        time,
        end: time + 2.,
        duration: 2.,
        is_init: false,
        range: None,
        index_range: None,
        number: id.parse().ok(),
        url: Some(format!("https://cdn.example.com/{id}.m4s")),
        complete: true,
        timestamp_offset: 0.,
    }
}

fn init_segment() -> Segment {
    Segment {
        id: "init".to_string(),
        time: 0.,
        end: 0.,
        duration: 0.,
        is_init: true,
        range: None,
        index_range: None,
        number: None,
        url: Some("https://cdn.example.com/init.mp4".to_string()),
        complete: true,
        timestamp_offset: 0.,
    }
}

fn want(init: Option<i32>, media: &[(&str, i32)]) -> WantList {
    WantList {
        init_segment: init.map(|priority| QueuedSegment::new(init_segment(), priority)),
        segment_queue: media
            .iter()
            .enumerate()
            .map(|(i, (id, priority))| QueuedSegment::new(segment(id, i as f64 * 2.), *priority))
            .collect(),
    }
}

type TestQueue = DownloadQueue<Bytes, RecordingFetcher>;

fn setup(want_list: WantList, has_init: bool) -> (SharedValue<WantList>, RecordingFetcher, TestQueue) {
    init_test_tracing();
    let want_list = SharedValue::new(want_list);
    let fetcher = RecordingFetcher::default();
    let queue = DownloadQueueBuilder::new()
        .track_type(TrackType::Audio)
        .representation_id("audio-128k")
        .has_init_segment(has_init)
        .build(want_list.clone(), fetcher.clone());
    (want_list, fetcher, queue)
}

fn record(queue: &TestQueue) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    queue.subscribe(move |event| {
        let entry = match event {
            DownloadQueueEvent::ParsedInitSegment { segment, parsed } => {
                format!("init:{}:{}", segment.id, parsed.timescale.unwrap_or_default())
            }
            DownloadQueueEvent::ParsedMediaSegment { segment, parsed } => {
                let data = parsed.data.clone().unwrap_or_default();
                format!("media:{}:{}", segment.id, String::from_utf8_lossy(&data))
            }
            DownloadQueueEvent::FullyLoadedSegment(segment) => format!("loaded:{}", segment.id),
            DownloadQueueEvent::RequestRetry { segment, error } => {
                format!("retry:{}:{error}", segment.id)
            }
            DownloadQueueEvent::EmptyQueue => "empty".to_string(),
            DownloadQueueEvent::Error(error) => format!("error:{error}"),
        };
        sink.borrow_mut().push(entry);
    });
    log
}

#[test]
fn test_media_chunks_wait_for_init_timescale() {
    let (_want_list, fetcher, queue) = setup(want(Some(0), &[("1", 0), ("2", 0)]), true);
    let log = record(&queue);
    queue.start();
    assert_eq!(fetcher.requested(), vec!["init", "1"]);

    let media = fetcher.request("1");
    media.send_media(b"a");
    media.send_media(b"b");
    media.send_media(b"c");
    media.finish();
    assert!(log.borrow().is_empty());
    assert!(fetcher.parsed_with().is_empty());
    assert_eq!(fetcher.requested(), vec!["init", "1"]);

    let init = fetcher.request("init");
    init.send_init(90000);
    assert_eq!(
        *log.borrow(),
        vec![
            "init:init:90000",
            "media:1:a",
            "media:1:b",
            "media:1:c",
            "loaded:1",
        ]
    );
    assert_eq!(fetcher.parsed_with(), vec![Some(90000); 3]);
    assert_eq!(fetcher.requested(), vec!["init", "1", "2"]);

    init.finish();
    assert_eq!(log.borrow().last().map(String::as_str), Some("loaded:init"));
    assert_eq!(queue.get_requested_init_segment(), None);
    assert_eq!(queue.get_requested_media_segment().map(|s| s.id), Some("2".to_string()));
}

#[test]
fn test_loaded_init_is_not_requested_again() {
    let (want_list, fetcher, queue) = setup(want(Some(0), &[("1", 0)]), true);
    queue.start();

    let init = fetcher.request("init");
    init.send_init(1000);
    init.finish();

    want_list.set_value(want(Some(0), &[("1", 0), ("2", 0)]));
    assert_eq!(fetcher.requested(), vec!["init", "1"]);
}

#[test]
fn test_priority_update_without_restart() {
    let (want_list, fetcher, queue) = setup(want(Some(5), &[("1", 10), ("2", 10)]), true);
    queue.start();
    let init = fetcher.request("init");
    let media = fetcher.request("1");

    want_list.set_value(want(Some(1), &[("1", 0), ("2", 10)]));
    assert_eq!(fetcher.requested(), vec!["init", "1"]);
    assert_eq!(
        fetcher.priority_updates(),
        vec![("init".to_string(), 1), ("1".to_string(), 0)]
    );
    assert_eq!(init.priority.get(), 1);
    assert_eq!(media.priority.get(), 0);
    assert!(!media.scope.is_cancelled());

    // same priorities again: nothing to do
    want_list.set_value(want(Some(1), &[("1", 0), ("2", 10)]));
    assert_eq!(fetcher.priority_updates().len(), 2);
}

#[test]
fn test_head_change_cancels_in_flight_request() {
    let (want_list, fetcher, queue) = setup(want(None, &[("1", 0)]), false);
    let log = record(&queue);
    queue.start();
    let first = fetcher.request("1");

    want_list.set_value(want(None, &[("5", 0)]));
    assert!(first.scope.is_cancelled());
    assert_eq!(fetcher.requested(), vec!["1", "5"]);
    assert_eq!(queue.get_requested_media_segment().map(|s| s.id), Some("5".to_string()));

    first.send_media(b"late");
    first.finish();
    assert!(log.borrow().is_empty());
    assert_eq!(fetcher.requested(), vec!["1", "5"]);
}

#[test]
fn test_advancement_uses_latest_want_list() {
    let (want_list, fetcher, queue) = setup(want(None, &[("1", 0), ("2", 0), ("3", 0)]), false);
    queue.start();

    // same head, so the request in flight is kept
    want_list.set_value(want(None, &[("1", 0), ("4", 0)]));
    assert_eq!(fetcher.requested(), vec!["1"]);

    fetcher.request("1").finish();
    assert_eq!(fetcher.requested(), vec!["1", "4"]);
}

#[test]
fn test_successive_want_list_changes_keep_in_flight_request() {
    let (want_list, fetcher, queue) = setup(want(None, &[("A", 0)]), false);
    queue.start();
    let first = fetcher.request("A");

    want_list.set_value(want(None, &[("A", 0), ("B", 0)]));
    want_list.set_value(want(None, &[("A", 0), ("C", 0)]));
    assert!(!first.scope.is_cancelled());
    assert_eq!(fetcher.requested(), vec!["A"]);

    first.finish();
    assert_eq!(fetcher.requested(), vec!["A", "C"]);
    assert_eq!(queue.get_requested_media_segment().map(|s| s.id), Some("C".to_string()));
}

#[test]
fn test_want_list_change_during_media_request_creation() {
    let (want_list, fetcher, queue) = setup(want(None, &[("A", 0)]), false);
    let log = record(&queue);
    fetcher.on_create(|request| {
        if request.segment.id == "A" {
            request.callbacks.retry(SeglineError::Timeout);
        }
    });
    let updated = want_list.clone();
    queue.subscribe(move |event| {
        if matches!(event, DownloadQueueEvent::RequestRetry { segment, .. } if segment.id == "A") {
            updated.set_value(want(None, &[("B", 0)]));
        }
    });
    queue.start();

    assert_eq!(fetcher.requested(), vec!["A", "B"]);
    assert!(fetcher.request("A").scope.is_cancelled());
    assert_eq!(fetcher.live(), vec!["B"]);
    assert_eq!(queue.get_requested_media_segment().map(|s| s.id), Some("B".to_string()));

    // the superseded request cannot advance the queue
    let stale = fetcher.request("A");
    stale.send_media(b"late");
    stale.finish();
    assert_eq!(*log.borrow(), vec!["retry:A:Request timeout"]);
    assert_eq!(fetcher.requested(), vec!["A", "B"]);

    // the request kept in the slot is the one a head change cancels
    want_list.set_value(want(None, &[("C", 0)]));
    assert!(fetcher.request("B").scope.is_cancelled());
    assert_eq!(fetcher.live(), vec!["C"]);
}

#[test]
fn test_init_dropped_during_its_request_creation() {
    let (want_list, fetcher, queue) = setup(want(Some(0), &[]), true);
    fetcher.on_create(|request| {
        if request.segment.is_init {
            request.callbacks.retry(SeglineError::HttpError(503));
        }
    });
    let updated = want_list.clone();
    queue.subscribe(move |event| {
        if matches!(event, DownloadQueueEvent::RequestRetry { segment, .. } if segment.is_init) {
            updated.set_value(want(None, &[]));
        }
    });
    queue.start();

    assert_eq!(fetcher.requested(), vec!["init"]);
    assert!(fetcher.request("init").scope.is_cancelled());
    assert_eq!(queue.get_requested_init_segment(), None);
    assert!(fetcher.live().is_empty());
}

#[test]
fn test_empty_queue_after_last_segment() {
    let (_want_list, fetcher, queue) = setup(want(None, &[("1", 0)]), false);
    let log = record(&queue);
    queue.start();

    let media = fetcher.request("1");
    media.send_media(b"payload");
    media.finish();
    assert_eq!(*log.borrow(), vec!["media:1:payload", "loaded:1", "empty"]);
    assert_eq!(queue.get_requested_media_segment(), None);
}

#[test]
fn test_emptied_want_list_cancels_request() {
    let (want_list, fetcher, queue) = setup(want(None, &[("1", 0)]), false);
    let log = record(&queue);
    queue.start();

    want_list.set_value(WantList::default());
    assert!(fetcher.request("1").scope.is_cancelled());
    assert_eq!(queue.get_requested_media_segment(), None);
    // nothing was exhausted, the request was only dropped
    assert!(log.borrow().is_empty());

    want_list.set_value(want(None, &[("2", 0)]));
    assert_eq!(fetcher.requested(), vec!["1", "2"]);
}

#[test]
fn test_retry_is_not_fatal() {
    let (_want_list, fetcher, queue) = setup(want(None, &[("1", 0)]), false);
    let log = record(&queue);
    queue.start();

    let media = fetcher.request("1");
    media.callbacks.retry(SeglineError::Timeout);
    media.finish();
    assert_eq!(*log.borrow(), vec!["retry:1:Request timeout", "loaded:1", "empty"]);
}

#[test]
fn test_fatal_error_stops_both_slots() {
    let (want_list, fetcher, queue) = setup(want(Some(0), &[("1", 0), ("2", 0)]), true);
    let log = record(&queue);
    queue.start();
    let init = fetcher.request("init");
    let media = fetcher.request("1");

    media.callbacks.failed(SeglineError::HttpError(404));
    assert!(init.scope.is_cancelled());
    assert!(media.scope.is_cancelled());
    assert_eq!(*log.borrow(), vec!["error:HTTP error: 404"]);
    assert_eq!(queue.get_requested_init_segment(), None);
    assert_eq!(queue.get_requested_media_segment(), None);

    want_list.set_value(want(Some(0), &[("3", 0)]));
    assert_eq!(fetcher.requested(), vec!["init", "1"]);
}

#[test]
fn test_integrity_error_is_fatal() {
    let (_want_list, fetcher, queue) = setup(want(None, &[("1", 0), ("2", 0)]), false);
    let log = record(&queue);
    queue.start();

    let media = fetcher.request("1");
    media.send_corrupted("truncated mdat");
    media.finish();
    assert_eq!(*log.borrow(), vec!["error:Segment integrity error: truncated mdat"]);
    assert_eq!(fetcher.requested(), vec!["1"]);
}

#[test]
fn test_init_request_yielding_media_is_fatal() {
    let (_want_list, fetcher, queue) = setup(want(Some(0), &[]), true);
    let log = record(&queue);
    queue.start();

    fetcher.request("init").send_media(b"moof");
    assert_eq!(*log.borrow(), vec!["error:Expected init segment, got media"]);
}

#[test]
fn test_restart_after_stop() {
    let (_want_list, fetcher, queue) = setup(want(None, &[("1", 0)]), false);
    queue.start();
    queue.start();
    assert_eq!(fetcher.requested(), vec!["1"]);

    queue.stop();
    assert!(fetcher.request("1").scope.is_cancelled());

    queue.start();
    assert_eq!(fetcher.requested(), vec!["1", "1"]);
    assert!(!fetcher.request("1").scope.is_cancelled());
}

#[tokio::test]
async fn test_event_channel() -> anyhow::Result<()> {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (_want_list, fetcher, queue) = setup(want(None, &[("1", 0)]), false);
            let mut events = queue.event_channel();
            queue.start();

            let request = fetcher.request("1");
            tokio::task::spawn_local(async move {
                tokio::task::yield_now().await;
                request.send_media(b"abc");
                request.finish();
            });

            match events.recv().await {
                Some(DownloadQueueEvent::ParsedMediaSegment { segment, parsed }) => {
                    assert_eq!(segment.id, "1");
                    assert_eq!(parsed.data, Some(Bytes::from_static(b"abc")));
                }
                other => panic!("unexpected event: {other:?}"),
            }
            assert!(matches!(
                events.recv().await,
                Some(DownloadQueueEvent::FullyLoadedSegment(segment)) if segment.id == "1"
            ));
            assert!(matches!(events.recv().await, Some(DownloadQueueEvent::EmptyQueue)));
        })
        .await;

    Ok(())
}

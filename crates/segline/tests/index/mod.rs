use std::{cell::RefCell, rc::Rc};

use segline::{
    bounds::{BoundsConfig, BoundsEstimator, ManualClock},
    index::{Diagnostics, IndexBound, IndexContext, SegmentExpectation, TimelineEntry},
    ByteRange, SegmentIndex, SeglineError,
};
use url::Url;

use crate::{init_test_tracing, AssertWrapper};

fn static_context(period_end: Option<f64>) -> IndexContext {
    init_test_tracing();
    IndexContext::builder(Rc::new(BoundsEstimator::new_static(period_end)))
        .period(0., period_end)
        .build()
}

#[derive(Default)]
struct Recorder(RefCell<Vec<String>>);

impl Diagnostics for Recorder {
    fn warn(&self, message: &str) {
        self.0.borrow_mut().push(message.to_string());
    }
}

#[test]
fn test_timeline_repeat_expansion() {
    let index = SegmentIndex::from_json(
        r#"{
            "type": "timeline",
            "media": "seg-$Number$.m4s",
            "timeline": [
                { "start": 0, "duration": 4, "repeatCount": -1 },
                { "start": 20, "duration": 4 }
            ]
        }"#,
        static_context(Some(24.)),
    )
    .assert_success();

    let segments = index.segments(0., 20.);
    let times: Vec<f64> = segments.iter().map(|s| s.time).collect();
    assert_eq!(times, vec![0., 4., 8., 12., 16.]);
    assert_eq!(segments[0].url.as_deref(), Some("seg-1.m4s"));
    assert_eq!(segments[4].url.as_deref(), Some("seg-5.m4s"));

    let all = index.segments(0., 24.);
    assert_eq!(all.len(), 6);
    assert_eq!(all[5].number, Some(6));
    assert_eq!(index.end(), IndexBound::Known(24.));
    assert!(!index.is_still_awaiting_future_segments());
}

#[test]
fn test_template_urls_and_period_end() {
    let context = IndexContext::builder(Rc::new(BoundsEstimator::new_static(None)))
        .period(0., Some(7.))
        .representation("video-1", Some(500_000))
        .base_url(Url::parse("https://cdn.example.com/live/").assert_success())
        .build();
    let index = SegmentIndex::from_json(
        r#"{
            "type": "template",
            "timescale": 1000,
            "duration": 2000,
            "startNumber": 10,
            "media": "$RepresentationID$/$Bandwidth$/$Number$.m4s",
            "initialization": { "url": "$RepresentationID$/init.mp4" }
        }"#,
        context,
    )
    .assert_success();

    let init = index.init_segment().assert_success();
    assert!(init.is_init);
    assert_eq!(
        init.url.as_deref(),
        Some("https://cdn.example.com/live/video-1/init.mp4")
    );

    let segments = index.segments(0., 10.);
    let ids: Vec<&str> = segments.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["10", "11", "12", "13"]);
    assert_eq!(
        segments[0].url.as_deref(),
        Some("https://cdn.example.com/live/video-1/500000/10.m4s")
    );
    // the last segment is cut by the Period end
    assert_eq!(segments[3].end, 7.);
    assert_eq!(segments[3].duration, 1.);
    assert_eq!(index.last_available_position(), IndexBound::Known(7.));
}

#[test]
fn test_list_index() {
    let index = SegmentIndex::from_json(
        r#"{
            "type": "list",
            "duration": 2,
            "list": [
                { "media": "a.m4s" },
                { "media": "b.m4s", "mediaRange": { "start": 0, "end": 99 } },
                { "media": "c.m4s", "mediaRange": "100-199" }
            ]
        }"#,
        static_context(None),
    )
    .assert_success();

    let segments = index.segments(0., 100.);
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[1].range, Some(ByteRange::new(0, Some(99))));
    assert_eq!(segments[2].url.as_deref(), Some("c.m4s"));
    assert_eq!(segments[2].range, Some(ByteRange::new(100, Some(199))));
    assert_eq!(index.first_available_position(), IndexBound::Known(0.));
    assert_eq!(index.last_available_position(), IndexBound::Known(6.));
    assert!(!index.should_refresh(0., 6.));
}

#[test]
fn test_base_index_initialization() {
    let mut index = SegmentIndex::from_json(
        r#"{
            "type": "base",
            "timescale": 1000,
            "indexRange": { "start": 700, "end": 999 },
            "initialization": { "range": { "start": 0, "end": 699 } }
        }"#,
        static_context(Some(12.)),
    )
    .assert_success();

    assert!(!index.is_initialized());
    assert!(index.segments(0., 100.).is_empty());
    assert_eq!(index.first_available_position(), IndexBound::Unknown);
    assert_eq!(index.await_segment_between(0., 4.), SegmentExpectation::Unknown);
    let init = index.init_segment().assert_success();
    assert_eq!(init.range, Some(ByteRange::new(0, Some(699))));
    assert_eq!(init.index_range, Some(ByteRange::new(700, Some(999))));

    index.initialize(vec![TimelineEntry::new(0, 4000, 2)]);
    assert!(index.is_initialized());
    let times: Vec<f64> = index.segments(0., 100.).iter().map(|s| s.time).collect();
    assert_eq!(times, vec![0., 4., 8.]);
    assert_eq!(index.last_available_position(), IndexBound::Known(12.));

    // only the first initialization counts
    index.initialize(vec![TimelineEntry::new(0, 1000, 0)]);
    assert_eq!(index.segments(0., 100.).len(), 3);
}

#[test]
fn test_invalid_descriptors() {
    let context = static_context(None);
    let err = SegmentIndex::from_json(
        r#"{ "type": "template", "timescale": 0, "duration": 2 }"#,
        context.clone(),
    )
    .unwrap_err();
    assert!(matches!(err, SeglineError::InvalidDescriptor(_)));

    SegmentIndex::from_json(
        r#"{ "type": "timeline", "timeline": [
            { "start": 10, "duration": 2 },
            { "start": 0, "duration": 2 }
        ] }"#,
        context.clone(),
    )
    .assert_error();

    SegmentIndex::from_json(r#"{ "type": "playlist" }"#, context).assert_error();
}

fn assert_same_index(index: &SegmentIndex, expected: &SegmentIndex) {
    assert_eq!(index.segments(0., 8.), expected.segments(0., 8.));
    assert_eq!(index.first_available_position(), expected.first_available_position());
    assert_eq!(index.last_available_position(), expected.last_available_position());
    assert_eq!(index.end(), expected.end());
    assert_eq!(
        index.init_segment().and_then(|init| init.url),
        expected.init_segment().and_then(|init| init.url)
    );
    assert_eq!(index.should_refresh(0., 8.), expected.should_refresh(0., 8.));
    assert_eq!(
        index.is_still_awaiting_future_segments(),
        expected.is_still_awaiting_future_segments()
    );
}

#[test]
fn test_replace_round_trip() {
    let template = SegmentIndex::from_json(
        r#"{
            "type": "template",
            "duration": 2,
            "media": "$Number$.m4s",
            "initialization": { "url": "template-init.mp4" }
        }"#,
        static_context(Some(8.)),
    )
    .assert_success();
    let timeline = SegmentIndex::from_json(
        r#"{
            "type": "timeline",
            "media": "$Time$.m4s",
            "initialization": { "url": "timeline-init.mp4" },
            "timeline": [{ "start": 0, "duration": 2, "repeatCount": 2 }]
        }"#,
        static_context(Some(6.)),
    )
    .assert_success();

    let mut index = template.clone();
    index.replace(&timeline);
    assert!(matches!(index, SegmentIndex::Timeline(_)));
    assert_same_index(&index, &timeline);

    index.replace(&template);
    assert!(matches!(index, SegmentIndex::Template(_)));
    assert_same_index(&index, &template);
    assert_eq!(
        index.init_segment().and_then(|init| init.url).as_deref(),
        Some("template-init.mp4")
    );

    // updating with another shape replaces too
    index.update(&timeline);
    assert!(matches!(index, SegmentIndex::Timeline(_)));
    assert_same_index(&index, &timeline);
}

#[test]
fn test_base_index_rejects_invalid_entries() {
    init_test_tracing();
    let recorder = Rc::new(Recorder::default());
    let context = IndexContext::builder(Rc::new(BoundsEstimator::new_static(Some(10.))))
        .period(0., Some(10.))
        .diagnostics(recorder.clone())
        .build();
    let mut index = SegmentIndex::from_json(
        r#"{ "type": "base", "indexRange": "700-999" }"#,
        context,
    )
    .assert_success();

    index.initialize(vec![TimelineEntry::new(0, 0, -1)]);
    assert!(!index.is_initialized());
    assert!(index.segments(0., 10.).is_empty());

    index.initialize(vec![TimelineEntry::new(4, 2, 0), TimelineEntry::new(0, 2, 0)]);
    assert!(!index.is_initialized());
    assert_eq!(recorder.0.borrow().len(), 2);

    // a later valid call still initializes
    index.initialize(vec![TimelineEntry::new(0, 2, -1)]);
    assert!(index.is_initialized());
    let times: Vec<f64> = index.segments(0., 10.).iter().map(|s| s.time).collect();
    assert_eq!(times, vec![0., 2., 4., 6., 8.]);
}

#[test]
fn test_timeline_update_reports_replacement() {
    let recorder = Rc::new(Recorder::default());
    let mut index = SegmentIndex::from_json(
        r#"{ "type": "timeline", "timeline": [{ "start": 0, "duration": 4, "repeatCount": 4 }] }"#,
        static_context(None),
    )
    .assert_success();
    let refreshed_context = IndexContext::builder(Rc::new(BoundsEstimator::new_static(None)))
        .diagnostics(recorder.clone())
        .build();
    let refreshed = SegmentIndex::from_json(
        r#"{ "type": "timeline", "timeline": [{ "start": 100, "duration": 4, "repeatCount": 1 }] }"#,
        refreshed_context,
    )
    .assert_success();

    index.update(&refreshed);
    assert_eq!(recorder.0.borrow().len(), 1);
    let times: Vec<f64> = index.segments(0., 200.).iter().map(|s| s.time).collect();
    assert_eq!(times, vec![100., 104.]);
}

#[test]
fn test_live_template_end_never_decreases() {
    let clock = Rc::new(ManualClock::new(0.));
    let bounds = Rc::new(BoundsEstimator::new(
        BoundsConfig {
            is_dynamic: true,
            ..Default::default()
        },
        clock.clone(),
    ));
    let index = SegmentIndex::from_json(
        r#"{ "type": "template", "duration": 2, "media": "$Number$.m4s" }"#,
        IndexContext::builder(bounds.clone()).period(0., None).build(),
    )
    .assert_success();

    assert_eq!(index.last_available_position(), IndexBound::Unknown);
    bounds.set_last_position(10., None);

    let mut last = Vec::new();
    for _ in 0..10 {
        last.push(index.last_available_position().known().assert_success());
        clock.advance(0.7);
    }
    assert!(last.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(last[0], 10.);
    assert!(last[9] > last[0]);
    assert_eq!(index.end(), IndexBound::Unknown);
    assert!(index.is_still_awaiting_future_segments());
}

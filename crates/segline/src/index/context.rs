use std::{fmt, rc::Rc};

use url::Url;

use crate::bounds::BoundsEstimator;

/// Receives warnings raised while resolving or updating an index.
pub trait Diagnostics {
    fn warn(&self, message: &str);
}

/// Forwards warnings to `tracing`.
#[derive(Debug, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// An `InbandEventStream` declared by a Representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InbandEventScheme {
    pub scheme_id_uri: String,
    pub value: Option<String>,
}

pub type InbandEventFilter = Rc<dyn Fn(&InbandEventScheme) -> bool>;

/// Tunables shared by every index shape.
#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    /// Segments shorter than this, in seconds, are not worth requesting.
    pub minimum_segment_size: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            minimum_segment_size: 0.005,
        }
    }
}

/// Parameters of a Representation, fixed when its index is built.
#[derive(Clone)]
pub struct IndexContext {
    /// Start of the Period, in seconds.
    pub period_start: f64,
    /// End of the Period, in seconds, if known.
    pub period_end: Option<f64>,
    pub is_dynamic: bool,
    pub is_last_period: bool,
    pub representation_id: Option<String>,
    pub representation_bitrate: Option<u64>,
    pub base_url: Option<Url>,
    /// Seconds by which segments are available before their nominal end.
    pub availability_time_offset: f64,
    /// `false` when the last announced segment may still be in production.
    pub availability_time_complete: bool,
    pub bounds: Rc<BoundsEstimator>,
    pub inband_event_filter: Option<InbandEventFilter>,
    pub diagnostics: Rc<dyn Diagnostics>,
    pub config: IndexConfig,
}

impl IndexContext {
    pub fn builder(bounds: Rc<BoundsEstimator>) -> IndexContextBuilder {
        IndexContextBuilder::new(bounds)
    }

    /// Period end as a bound for repeat resolution, `None` when open-ended.
    pub(crate) fn scaled_period_end(&self, timescale: f64, index_time_offset: f64) -> Option<f64> {
        self.period_end
            .map(|end| end * timescale + index_time_offset)
    }
}

impl fmt::Debug for IndexContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexContext")
            .field("period_start", &self.period_start)
            .field("period_end", &self.period_end)
            .field("is_dynamic", &self.is_dynamic)
            .field("is_last_period", &self.is_last_period)
            .field("representation_id", &self.representation_id)
            .field("representation_bitrate", &self.representation_bitrate)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("availability_time_offset", &self.availability_time_offset)
            .field("availability_time_complete", &self.availability_time_complete)
            .field("bounds", &self.bounds)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub struct IndexContextBuilder {
    bounds: Rc<BoundsEstimator>,
    period_start: f64,
    period_end: Option<f64>,
    is_dynamic: Option<bool>,
    is_last_period: bool,
    representation_id: Option<String>,
    representation_bitrate: Option<u64>,
    base_url: Option<Url>,
    availability_time_offset: f64,
    availability_time_complete: bool,
    inband_event_filter: Option<InbandEventFilter>,
    diagnostics: Option<Rc<dyn Diagnostics>>,
    config: IndexConfig,
}

impl IndexContextBuilder {
    pub fn new(bounds: Rc<BoundsEstimator>) -> Self {
        Self {
            bounds,
            period_start: 0.,
            period_end: None,
            is_dynamic: None,
            is_last_period: true,
            representation_id: None,
            representation_bitrate: None,
            base_url: None,
            availability_time_offset: 0.,
            availability_time_complete: true,
            inband_event_filter: None,
            diagnostics: None,
            config: IndexConfig::default(),
        }
    }

    pub fn period(mut self, start: f64, end: Option<f64>) -> Self {
        self.period_start = start;
        self.period_end = end;
        self
    }

    /// Defaults to the bounds estimator's own flag.
    pub fn dynamic(mut self, is_dynamic: bool) -> Self {
        self.is_dynamic = Some(is_dynamic);
        self
    }

    pub fn last_period(mut self, is_last_period: bool) -> Self {
        self.is_last_period = is_last_period;
        self
    }

    pub fn representation<S: Into<String>>(mut self, id: S, bitrate: Option<u64>) -> Self {
        self.representation_id = Some(id.into());
        self.representation_bitrate = bitrate;
        self
    }

    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn availability_time_offset(mut self, offset: f64) -> Self {
        self.availability_time_offset = offset;
        self
    }

    pub fn availability_time_complete(mut self, complete: bool) -> Self {
        self.availability_time_complete = complete;
        self
    }

    pub fn inband_event_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&InbandEventScheme) -> bool + 'static,
    {
        self.inband_event_filter = Some(Rc::new(filter));
        self
    }

    pub fn diagnostics(mut self, diagnostics: Rc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> IndexContext {
        IndexContext {
            period_start: self.period_start,
            period_end: self.period_end,
            is_dynamic: self.is_dynamic.unwrap_or_else(|| self.bounds.is_dynamic()),
            is_last_period: self.is_last_period,
            representation_id: self.representation_id,
            representation_bitrate: self.representation_bitrate,
            base_url: self.base_url,
            availability_time_offset: self.availability_time_offset,
            availability_time_complete: self.availability_time_complete,
            bounds: self.bounds,
            inband_event_filter: self.inband_event_filter,
            diagnostics: self
                .diagnostics
                .unwrap_or_else(|| Rc::new(TracingDiagnostics)),
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let bounds = Rc::new(BoundsEstimator::new_static(Some(60.)));
        let context = IndexContext::builder(bounds)
            .period(10., Some(70.))
            .representation("v1", Some(500_000))
            .build();

        assert!(!context.is_dynamic);
        assert!(context.is_last_period);
        assert!(context.availability_time_complete);
        assert_eq!(context.representation_id.as_deref(), Some("v1"));
        assert_eq!(context.config.minimum_segment_size, 0.005);
        assert_eq!(context.scaled_period_end(1000., -10_000.), Some(60_000.));
    }
}

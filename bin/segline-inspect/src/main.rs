use std::{fs, path::PathBuf, rc::Rc};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use segline::{
    bounds::{BoundsConfig, BoundsEstimator, SystemClock},
    index::{IndexBound, IndexContext},
    Segment, SegmentIndex,
};
use serde::Serialize;
use url::Url;

/// Resolve the segments of a JSON index descriptor
#[derive(Parser, Debug, Clone)]
#[clap(version, author)]
pub struct InspectArgs {
    /// Path to the index descriptor
    #[clap(short, long)]
    descriptor: PathBuf,

    /// Start of the window to resolve, in seconds
    #[clap(long, default_value = "0")]
    from: f64,

    /// Duration of the window to resolve, in seconds
    #[clap(long, default_value = "60")]
    duration: f64,

    #[clap(long, default_value = "0")]
    period_start: f64,

    #[clap(long)]
    period_end: Option<f64>,

    /// Treat the presentation as live
    #[clap(long)]
    dynamic: bool,

    /// Last position known to be available, in seconds
    #[clap(long)]
    position: Option<f64>,

    /// Availability start time of a live presentation, in RFC 3339
    #[clap(long)]
    availability_start_time: Option<DateTime<Utc>>,

    #[clap(long)]
    time_shift_buffer_depth: Option<f64>,

    /// Base URL segment URLs are resolved against
    #[clap(long)]
    base_url: Option<Url>,

    /// Value of `$RepresentationID$`
    #[clap(long)]
    representation_id: Option<String>,

    /// Value of `$Bandwidth$`
    #[clap(long)]
    bandwidth: Option<u64>,

    /// Debug output
    #[clap(long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Inspection {
    init: Option<Segment>,
    segments: Vec<Segment>,
    first_available_position: IndexBound,
    last_available_position: IndexBound,
    end: IndexBound,
    should_refresh: bool,
    awaiting_future_segments: bool,
}

impl InspectArgs {
    fn bounds(&self) -> BoundsEstimator {
        if !self.dynamic {
            return BoundsEstimator::new_static(self.position.or(self.period_end));
        }

        let bounds = BoundsEstimator::new(
            BoundsConfig {
                is_dynamic: true,
                availability_start_time: self.availability_start_time,
                time_shift_buffer_depth: self.time_shift_buffer_depth,
                content_end: None,
            },
            Rc::new(SystemClock::new()),
        );
        if let Some(position) = self.position {
            bounds.set_last_position(position, None);
        } else if self.availability_start_time.is_some() {
            // local clock stands in for the server's
            bounds.set_server_time(Utc::now(), 0., 0.);
        }
        bounds
    }

    fn context(&self) -> IndexContext {
        let mut builder = IndexContext::builder(Rc::new(self.bounds()))
            .period(self.period_start, self.period_end)
            .dynamic(self.dynamic);
        if let Some(id) = &self.representation_id {
            builder = builder.representation(id.clone(), self.bandwidth);
        }
        if let Some(base_url) = &self.base_url {
            builder = builder.base_url(base_url.clone());
        }
        builder.build()
    }

    fn run(&self) -> anyhow::Result<Inspection> {
        let descriptor = fs::read_to_string(&self.descriptor)
            .with_context(|| format!("failed to read {}", self.descriptor.display()))?;
        let index = SegmentIndex::from_json(&descriptor, self.context())?;

        let segments = index.segments(self.from, self.duration);
        tracing::info!(count = segments.len(), "Resolved segments");

        Ok(Inspection {
            init: index.init_segment(),
            segments,
            first_available_position: index.first_available_position(),
            last_available_position: index.last_available_position(),
            end: index.end(),
            should_refresh: index.should_refresh(self.from, self.from + self.duration),
            awaiting_future_segments: index.is_still_awaiting_future_segments(),
        })
    }
}

fn main() -> anyhow::Result<()> {
    let args = InspectArgs::parse();
    let default_level = if args.verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let inspection = args.run()?;
    println!("{}", serde_json::to_string_pretty(&inspection)?);
    Ok(())
}

//! Serializable descriptions of segment indexes.
//!
//! Manifest parsers produce these. They carry what the manifest declares and
//! nothing derived, the [`IndexContext`] supplying the Representation-level
//! parameters.

use serde::Deserialize;

use super::{
    base::BaseIndex,
    entries::{check_entries, IndexScale, TimelineEntry},
    list::{ListIndex, ListItem},
    template::TemplateIndex,
    timeline::TimelineIndex,
    url::{merge_baseurls, SegmentUrlTemplate},
    IndexContext, InitSource, SegmentIndex,
};
use crate::{segment::ByteRange, SeglineError, SeglineResult};

fn default_timescale() -> u64 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializationDescriptor {
    /// URL template of the initialization segment. May use
    /// `$RepresentationID$` and `$Bandwidth$`.
    pub url: Option<String>,
    pub range: Option<ByteRange>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseDescriptor {
    #[serde(default = "default_timescale")]
    pub timescale: u64,
    #[serde(default)]
    pub presentation_time_offset: u64,
    pub initialization: Option<InitializationDescriptor>,
    /// Byte range of the `sidx` box.
    pub index_range: Option<ByteRange>,
    /// URL of the media resource, when not the Representation's own.
    pub media: Option<String>,
    pub start_number: Option<u64>,
    pub end_number: Option<u64>,
    /// Entries already known, e.g. from a previously parsed `sidx`.
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemDescriptor {
    pub media: Option<String>,
    pub media_range: Option<ByteRange>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDescriptor {
    #[serde(default = "default_timescale")]
    pub timescale: u64,
    #[serde(default)]
    pub presentation_time_offset: u64,
    /// Duration of every segment, in timescale units.
    pub duration: u64,
    pub initialization: Option<InitializationDescriptor>,
    pub list: Vec<ListItemDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    #[serde(default = "default_timescale")]
    pub timescale: u64,
    #[serde(default)]
    pub presentation_time_offset: u64,
    /// Duration of every segment, in timescale units.
    pub duration: u64,
    pub start_number: Option<u64>,
    pub end_number: Option<u64>,
    pub media: Option<String>,
    pub initialization: Option<InitializationDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDescriptor {
    #[serde(default = "default_timescale")]
    pub timescale: u64,
    #[serde(default)]
    pub presentation_time_offset: u64,
    pub start_number: Option<u64>,
    pub end_number: Option<u64>,
    pub media: Option<String>,
    pub initialization: Option<InitializationDescriptor>,
    pub timeline: Vec<TimelineEntry>,
}

/// Description of a segment index, tagged by `type`.
///
/// ```json
/// { "type": "template", "timescale": 90000, "duration": 360000,
///   "media": "$RepresentationID$/$Number$.m4s" }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexDescriptor {
    Base(BaseDescriptor),
    List(ListDescriptor),
    Template(TemplateDescriptor),
    Timeline(TimelineDescriptor),
}

fn check_timescale(timescale: u64) -> SeglineResult<()> {
    if timescale == 0 {
        return Err(SeglineError::InvalidDescriptor(
            "timescale must be positive".to_string(),
        ));
    }
    Ok(())
}

impl IndexContext {
    fn media_template(&self, media: Option<&str>) -> SeglineResult<Option<SegmentUrlTemplate>> {
        media
            .map(|media| {
                SegmentUrlTemplate::new(
                    media,
                    self.base_url.as_ref(),
                    self.representation_id.as_deref(),
                    self.representation_bitrate,
                )
            })
            .transpose()
    }

    fn init_source(
        &self,
        initialization: Option<&InitializationDescriptor>,
        index_range: Option<ByteRange>,
    ) -> SeglineResult<Option<InitSource>> {
        if initialization.is_none() && index_range.is_none() {
            return Ok(None);
        }
        let initialization = initialization.cloned().unwrap_or_default();
        Ok(Some(InitSource {
            url: self.media_template(initialization.url.as_deref())?,
            range: initialization.range,
            index_range,
        }))
    }

    fn resolve_url(&self, url: &str) -> SeglineResult<String> {
        Ok(match &self.base_url {
            Some(base_url) => merge_baseurls(base_url, url)?.to_string(),
            None => url.to_string(),
        })
    }
}

impl SegmentIndex {
    /// Builds the index described by `descriptor`.
    pub fn new(descriptor: IndexDescriptor, context: IndexContext) -> SeglineResult<Self> {
        let index = match descriptor {
            IndexDescriptor::Base(desc) => {
                check_timescale(desc.timescale)?;
                check_entries(&desc.timeline)?;
                let scale = IndexScale::new(
                    desc.timescale,
                    desc.presentation_time_offset,
                    context.period_start,
                );
                let media = context.media_template(desc.media.as_deref())?;
                let init = context.init_source(desc.initialization.as_ref(), desc.index_range)?;
                Self::Base(BaseIndex::new(
                    context,
                    scale,
                    desc.timeline,
                    media,
                    init,
                    desc.start_number,
                    desc.end_number,
                ))
            }
            IndexDescriptor::List(desc) => {
                check_timescale(desc.timescale)?;
                if desc.duration == 0 {
                    return Err(SeglineError::InvalidDescriptor(
                        "segment list has no duration".to_string(),
                    ));
                }
                let scale = IndexScale::new(
                    desc.timescale,
                    desc.presentation_time_offset,
                    context.period_start,
                );
                let items = desc
                    .list
                    .iter()
                    .map(|item| {
                        Ok(ListItem {
                            url: item
                                .media
                                .as_deref()
                                .map(|media| context.resolve_url(media))
                                .transpose()?,
                            range: item.media_range,
                        })
                    })
                    .collect::<SeglineResult<Vec<_>>>()?;
                let init = context.init_source(desc.initialization.as_ref(), None)?;
                Self::List(ListIndex::new(context, scale, desc.duration, items, init))
            }
            IndexDescriptor::Template(desc) => {
                check_timescale(desc.timescale)?;
                if desc.duration == 0 {
                    return Err(SeglineError::InvalidDescriptor(
                        "segment template has no duration".to_string(),
                    ));
                }
                let scale = IndexScale::new(
                    desc.timescale,
                    desc.presentation_time_offset,
                    context.period_start,
                );
                let media = context.media_template(desc.media.as_deref())?;
                let init = context.init_source(desc.initialization.as_ref(), None)?;
                Self::Template(TemplateIndex::new(
                    context,
                    scale,
                    desc.presentation_time_offset,
                    desc.duration,
                    desc.start_number.unwrap_or(1),
                    desc.end_number,
                    media,
                    init,
                ))
            }
            IndexDescriptor::Timeline(desc) => {
                check_timescale(desc.timescale)?;
                check_entries(&desc.timeline)?;
                let scale = IndexScale::new(
                    desc.timescale,
                    desc.presentation_time_offset,
                    context.period_start,
                );
                let media = context.media_template(desc.media.as_deref())?;
                let init = context.init_source(desc.initialization.as_ref(), None)?;
                Self::Timeline(TimelineIndex::new(
                    context,
                    scale,
                    desc.timeline,
                    desc.start_number.unwrap_or(1),
                    desc.end_number,
                    media,
                    init,
                ))
            }
        };

        tracing::debug!(
            representation = ?index.context().representation_id,
            timescale = index.timescale(),
            "Built segment index"
        );
        Ok(index)
    }

    /// Builds the index described by a JSON document.
    pub fn from_json(json: &str, context: IndexContext) -> SeglineResult<Self> {
        let descriptor: IndexDescriptor = serde_json::from_str(json)
            .map_err(|e| SeglineError::InvalidDescriptor(e.to_string()))?;
        Self::new(descriptor, context)
    }
}

// References:
// 1. https://github.com/clitic/vsd/blob/30ca1985e4a467ea3304b11c08d3176deaafd22a/vsd/src/dash/template.rs
// 2. https://github.com/emarsden/dash-mpd-rs/blob/6ebdfb4759adbda8233b5b3520804e23ff86e7de/src/fetch.rs#L435-L466

use regex::{Regex, Replacer};
use std::{collections::HashMap, sync::LazyLock};
use url::Url;

use crate::SeglineResult;

// From https://dashif.org/docs/DASH-IF-IOP-v4.3.pdf:
// "For the avoidance of doubt, only %0[width]d is permitted and no other identifiers."
//
// Example template: "$RepresentationID$/$Number%06d$.m4s"
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$(RepresentationID|Number|Time|Bandwidth)(?:%0(\d+)d)?\$")
        .expect("template regex is valid")
});

pub struct Template<'a> {
    args: HashMap<&'a str, String>,
    /// Turn `$$` into `$`. Only done on the last substitution pass.
    unescape: bool,
}

impl Template<'_> {
    pub const REPRESENTATION_ID: &'static str = "RepresentationID";
    pub const NUMBER: &'static str = "Number";
    pub const TIME: &'static str = "Time";
    pub const BANDWIDTH: &'static str = "Bandwidth";

    pub fn new() -> Self {
        Self {
            args: HashMap::with_capacity(4),
            unescape: false,
        }
    }

    pub fn insert(&mut self, key: &'static str, value: String) -> &mut Self {
        self.args.insert(key, value);
        self
    }

    pub fn insert_optional(&mut self, key: &'static str, value: Option<String>) -> &mut Self {
        if let Some(value) = value {
            self.args.insert(key, value);
        }
        self
    }

    pub fn unescape(&mut self) -> &mut Self {
        self.unescape = true;
        self
    }

    pub fn resolve(&self, template: &str) -> String {
        TEMPLATE_REGEX
            .replace_all(template, TemplateReplacer(self))
            .to_string()
    }
}

impl Default for Template<'_> {
    fn default() -> Self {
        Self::new()
    }
}

struct TemplateReplacer<'a, 'b>(&'a Template<'b>);

impl Replacer for TemplateReplacer<'_, '_> {
    fn replace_append(&mut self, caps: &regex::Captures<'_>, dst: &mut String) {
        let whole = &caps[0];
        let Some(key) = caps.get(1) else {
            // `$$`
            dst.push_str(if self.0.unescape { "$" } else { whole });
            return;
        };
        let Some(value) = self.0.args.get(key.as_str()) else {
            dst.push_str(whole);
            return;
        };

        match caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
            Some(width) => dst.push_str(&format!("{value:0>width$}")),
            None => dst.push_str(value),
        }
    }
}

/// Media URL template with Representation-level tokens already substituted.
///
/// Only `$Time$` and `$Number$` remain to be filled in per segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentUrlTemplate(String);

impl SegmentUrlTemplate {
    /// Resolves `template` against `base_url` and substitutes Representation
    /// tokens.
    pub fn new(
        template: &str,
        base_url: Option<&Url>,
        representation_id: Option<&str>,
        bandwidth: Option<u64>,
    ) -> SeglineResult<Self> {
        let template = match base_url {
            Some(base_url) => merge_baseurls(base_url, template)?.to_string(),
            None => template.to_string(),
        };

        let mut args = Template::new();
        args.insert_optional(Template::REPRESENTATION_ID, representation_id.map(String::from))
            .insert_optional(Template::BANDWIDTH, bandwidth.map(|b| b.to_string()));
        Ok(Self(args.resolve(&template)))
    }

    /// Expands the template for one segment. Depends on `time` and `number` only.
    pub fn detokenize(&self, time: u64, number: u64) -> String {
        Template::new()
            .insert(Template::TIME, time.to_string())
            .insert(Template::NUMBER, number.to_string())
            .unescape()
            .resolve(&self.0)
    }

    /// The template with no per-segment token substituted.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub(crate) fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("file://")
        || s.starts_with("ftp://")
}

pub(crate) fn merge_baseurls(current: &Url, new: &str) -> SeglineResult<Url> {
    if is_absolute_url(new) {
        Ok(Url::parse(new)?)
    } else {
        // The query of the base URL is kept unless the new URL has its own:
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=secret, /video42.mp4) =>
        //   https://example.com/video42.mp4?auth=secret
        let mut merged = current.join(new)?;
        if merged.query().is_none() {
            merged.set_query(current.query());
        }
        Ok(merged)
    }
}

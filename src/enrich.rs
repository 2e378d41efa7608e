use chrono::DateTime;
use serde_json::{Map, Value};

use crate::config::SinkConfig;
use crate::decode::Event;

/// Stamps the wall-clock rendering of `timestamp` into `time_key`. An
/// absent timestamp leaves any pre-existing value of the field untouched.
pub fn stamp_time(fields: &mut Map<String, Value>, timestamp: Option<i64>, time_key: &str) {
    let Some(seconds) = timestamp else {
        return;
    };
    let value = match DateTime::from_timestamp(seconds, 0) {
        Some(at) => Value::String(at.to_rfc3339()),
        // out of chrono's representable range; keep the raw integer
        None => Value::from(seconds),
    };
    fields.insert(time_key.to_string(), value);
}

/// Stamps the event's tag into `tag_key`, overwriting any existing value.
pub fn stamp_tag(fields: &mut Map<String, Value>, tag: &str, tag_key: &str) {
    fields.insert(tag_key.to_string(), Value::String(tag.to_string()));
}

/// Applies the configured enrichment steps in fixed order (time, then tag)
/// and hands back the record keyed by its tag for grouping.
pub fn enrich(event: Event, config: &SinkConfig) -> (String, Map<String, Value>) {
    let Event {
        tag,
        timestamp,
        mut fields,
    } = event;

    if config.include_time_key {
        stamp_time(&mut fields, timestamp, &config.time_key);
    }
    if config.include_tag_key {
        stamp_tag(&mut fields, &tag, &config.tag_key);
    }

    (tag, fields)
}

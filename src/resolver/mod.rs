//! Change resolution over dataset modification timestamps
//!
//! Given the previous checkpoint and the rows returned by the change source,
//! this module decides which cache tags must be purged in the current run. The
//! logic is pure (no I/O), so the whole decision table is unit-testable.
//!
//! The interesting case is a *date-only* modification value. A literal like
//! `2024-06-10` is interpreted as midnight, but the change it announces may
//! land at any instant within that day, possibly still in the future. Such a
//! change is therefore purged twice: once when first observed (optimistic early
//! purge, while the end-of-day bound is still ahead of the current time) and
//! once more on a later run after the bound has definitely passed
//! (confirmatory purge). Datasets between the two phases are tracked in the
//! `date_only_watch` map carried by the checkpoint.

pub mod encode;

use crate::sparql::DatasetChange;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Offset from midnight to the end of the same day.
const END_OF_DAY_MS: i64 = 24 * 60 * 60 * 1000 - 1;

/// Inputs to one resolution pass, besides the change rows themselves.
#[derive(Debug, Clone)]
pub struct ResolveParams<'a> {
    /// Lower bound: changes older than this are considered already handled
    pub previous_date: DateTime<Utc>,
    /// Start time of the current run
    pub now: DateTime<Utc>,
    /// Date-only watch map carried over from the previous checkpoint
    pub watch: BTreeMap<String, DateTime<Utc>>,
    /// Tag covering the unnamed cache partition
    pub default_entry_name: &'a str,
    /// Expand each dataset IRI into its URL-encoded forms as well
    pub support_url_encoded: bool,
}

/// What the resolver decided for a single dataset row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// No modification literal was present
    SkippedMissing,
    /// The literal's datatype is not a date or dateTime type
    SkippedNotDateTime { datatype: String },
    /// The literal could not be parsed as a timestamp
    SkippedUnparseable { value: String },
    /// Modified before the previous run, nothing to do
    Unchanged { modified: DateTime<Utc> },
    /// Tags were added to the purge set
    Purged {
        modified: DateTime<Utc>,
        phase: PurgePhase,
    },
    /// Date-only change already watched; its ambiguity window is still open
    Deferred { until: DateTime<Utc> },
}

/// Which rule produced a purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgePhase {
    /// Regular dateTime change at or past the previous-run bound
    Immediate,
    /// Date-only change seen for the first time, bound still in the future
    DateOnlyEarly,
    /// Date-only change whose bound has passed, purged a final time
    DateOnlyConfirm,
}

/// Per-dataset decision, kept for the operator audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub dataset: String,
    pub action: Action,
}

impl Decision {
    fn new(dataset: &str, action: Action) -> Self {
        Self {
            dataset: dataset.to_string(),
            action,
        }
    }
}

/// Output of one resolution pass.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Cache tags to purge this run
    pub tags: BTreeSet<String>,
    /// Updated date-only watch map to persist with the checkpoint
    pub watch: BTreeMap<String, DateTime<Utc>>,
    /// One decision per input row, in input order
    pub decisions: Vec<Decision>,
}

/// Decide which cache tags to purge for the given change rows.
pub fn resolve(changes: &[DatasetChange], params: ResolveParams) -> Resolution {
    let mut tags = BTreeSet::new();
    let mut watch = params.watch;
    let mut decisions = Vec::with_capacity(changes.len());

    for change in changes {
        let dataset = change.dataset.as_str();

        let Some(literal) = change.last_modified.as_ref() else {
            decisions.push(Decision::new(dataset, Action::SkippedMissing));
            continue;
        };

        // Defensive: the query already casts to xsd:dateTime, but endpoints have
        // been seen returning mixed datatypes on schema:dateModified.
        if let Some(datatype) = literal.datatype.as_deref() {
            if !datatype.contains("date") {
                decisions.push(Decision::new(
                    dataset,
                    Action::SkippedNotDateTime {
                        datatype: datatype.to_string(),
                    },
                ));
                continue;
            }
        }

        let Some(parsed) = parse_timestamp(&literal.value) else {
            decisions.push(Decision::new(
                dataset,
                Action::SkippedUnparseable {
                    value: literal.value.clone(),
                },
            ));
            continue;
        };

        // A value at exactly midnight is taken to be a date without a time
        // component; shift it to the end of that day so the comparison covers
        // any instant the change may actually have happened.
        let is_date_only =
            parsed.hour() == 0 && parsed.minute() == 0 && parsed.second() == 0;
        let modified = if is_date_only {
            parsed + Duration::milliseconds(END_OF_DAY_MS)
        } else {
            parsed
        };

        if modified < params.previous_date {
            decisions.push(Decision::new(dataset, Action::Unchanged { modified }));
            continue;
        }

        let action = if !is_date_only {
            add_tags(&mut tags, dataset, params.support_url_encoded);
            Action::Purged {
                modified,
                phase: PurgePhase::Immediate,
            }
        } else if !watch.contains_key(dataset) && params.now <= modified {
            watch.insert(dataset.to_string(), params.now);
            add_tags(&mut tags, dataset, params.support_url_encoded);
            Action::Purged {
                modified,
                phase: PurgePhase::DateOnlyEarly,
            }
        } else if params.now > modified {
            watch.remove(dataset);
            add_tags(&mut tags, dataset, params.support_url_encoded);
            Action::Purged {
                modified,
                phase: PurgePhase::DateOnlyConfirm,
            }
        } else {
            Action::Deferred { until: modified }
        };
        decisions.push(Decision::new(dataset, action));
    }

    // The unnamed partition holds responses assembled from many datasets, so it
    // goes stale whenever any named entry does.
    if !tags.is_empty() {
        tags.insert(params.default_entry_name.to_string());
    }

    Resolution {
        tags,
        watch,
        decisions,
    }
}

fn add_tags(tags: &mut BTreeSet<String>, dataset: &str, support_url_encoded: bool) {
    tags.insert(dataset.to_string());
    if support_url_encoded {
        tags.insert(encode::encode_uri(dataset));
        tags.insert(encode::encode_uri_component(dataset));
    }
}

/// Parse a modification timestamp leniently.
///
/// Endpoints return RFC 3339 values with an offset, naive dateTime values, or
/// bare dates; naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    None
}

//! One reconciliation pass
//!
//! Wires the components in sequence: load checkpoint, query the change source,
//! resolve the purge set, fan out the purge requests, write the checkpoint
//! back. Every resolver decision and every purge outcome is logged so one run
//! leaves a complete audit trail.

use crate::config::Config;
use crate::error::Result;
use crate::purge::{CachePurger, PurgeOutcome};
use crate::resolver::{self, Action, Decision, PurgePhase, ResolveParams};
use crate::sparql::SparqlClient;
use crate::storage::{Checkpoint, CheckpointStore, S3CheckpointStore};
use chrono::{Duration, SecondsFormat, Utc};
use tracing::{debug, error, info, warn};

/// Aggregate result of one pass, used to derive the exit status.
#[derive(Debug, Clone, Copy)]
pub struct SweepSummary {
    /// Distinct cache tags resolved for purging
    pub tags_resolved: usize,
    /// Purge requests issued
    pub purges_attempted: usize,
    /// Purge requests that did not return 200
    pub purges_failed: usize,
}

impl SweepSummary {
    pub fn all_succeeded(&self) -> bool {
        self.purges_failed == 0
    }
}

/// Run one pass: query, diff, purge, checkpoint.
pub async fn run(config: &Config) -> Result<SweepSummary> {
    let started = Utc::now();
    let fallback_previous = config
        .default_previous_date
        .unwrap_or_else(|| started - Duration::hours(24));

    let store: Option<Box<dyn CheckpointStore>> = if config.checkpoint.enabled {
        match S3CheckpointStore::new(&config.checkpoint.s3).await {
            Ok(store) => Some(Box::new(store)),
            Err(e) => {
                warn!("Checkpoint store unavailable, continuing without it: {}", e);
                None
            }
        }
    } else {
        None
    };

    let checkpoint = Checkpoint::load(store.as_deref(), &config.checkpoint, fallback_previous).await;

    let sparql = SparqlClient::new(&config.sparql)?;
    let changes = sparql.modified_datasets().await?;
    info!(
        "Checking {} datasets for modifications after {}",
        changes.len(),
        checkpoint
            .previous_run
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    );

    let resolution = resolver::resolve(
        &changes,
        ResolveParams {
            previous_date: checkpoint.previous_run,
            now: started,
            watch: checkpoint.date_only_watch,
            default_entry_name: &config.cache.default_entry_name,
            support_url_encoded: config.cache.support_url_encoded,
        },
    );
    for decision in &resolution.decisions {
        log_decision(decision);
    }

    info!("Found {} cache entries to clear", resolution.tags.len());
    let purger = CachePurger::new(&config.cache)?;
    let outcomes = purger.purge_all(&resolution.tags).await;
    for outcome in &outcomes {
        log_outcome(outcome);
    }

    if let Some(store) = store.as_deref() {
        let updated = Checkpoint {
            previous_run: started,
            date_only_watch: resolution.watch,
        };
        if let Err(e) = updated.persist(store, &config.checkpoint).await {
            error!("Failed to persist checkpoint: {}", e);
        }
    }

    let purges_failed = outcomes.iter().filter(|o| !o.succeeded()).count();
    if purges_failed > 0 {
        error!("Failed to clear {} cache entries", purges_failed);
    }

    Ok(SweepSummary {
        tags_resolved: resolution.tags.len(),
        purges_attempted: outcomes.len(),
        purges_failed,
    })
}

fn log_decision(decision: &Decision) {
    let dataset = &decision.dataset;
    match &decision.action {
        Action::SkippedMissing => {
            info!("  - {} has no dateModified value, skipping", dataset);
        }
        Action::SkippedNotDateTime { datatype } => {
            info!(
                "  - {} does not have a dateTime value ({}), skipping",
                dataset, datatype
            );
        }
        Action::SkippedUnparseable { value } => {
            warn!(
                "  - {} has an unparseable dateModified value {:?}, skipping",
                dataset, value
            );
        }
        Action::Unchanged { modified } => {
            debug!(
                "  - {} unchanged since previous run (last modified {})",
                dataset, modified
            );
        }
        Action::Purged { modified, phase } => {
            let reason = match phase {
                PurgePhase::Immediate => "modified",
                PurgePhase::DateOnlyEarly => "date-only change, early purge",
                PurgePhase::DateOnlyConfirm => "date-only change, confirmatory purge",
            };
            info!(
                "  - {} was last modified on {} ({})",
                dataset, modified, reason
            );
        }
        Action::Deferred { until } => {
            info!(
                "  - {} is already watched, confirmatory purge due after {}",
                dataset, until
            );
        }
    }
}

fn log_outcome(outcome: &PurgeOutcome) {
    match (&outcome.status, &outcome.error) {
        (Some(status), _) if outcome.succeeded() => {
            info!("  - {} ({}):\n{}", outcome.tag, status, outcome.body);
        }
        (Some(status), _) => {
            error!(
                "  - {} failed ({}):\n{}",
                outcome.tag, status, outcome.body
            );
        }
        (None, Some(e)) => {
            error!("  - {} failed: {}", outcome.tag, e);
        }
        (None, None) => {
            error!("  - {} failed with no response", outcome.tag);
        }
    }
}

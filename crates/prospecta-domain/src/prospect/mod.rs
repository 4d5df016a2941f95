//! Prospect record aggregation.
//!
//! Enriches establishment rows with their company, partners and activity
//! codes through the request's loaders. Every load for every root is
//! enqueued before anything is awaited, so a page of roots costs one store
//! call per entity type no matter how many roots share a key.
//!
//! Failure handling per relation:
//! - company: required; a failed lookup skips the record
//! - partners: a failed lookup degrades to an empty list
//! - primary activity: a failed lookup degrades to `None`
//! - secondary activities: only codes that resolve are kept


use std::fmt;

use prospecta_storage::{ActivityCode, Company, Establishment, Partner, RegistryStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::loader::{join_pending, Pending};
use crate::registry::LoaderRegistry;
use crate::validation::{validate_activity_code, validate_base_id};

/// An establishment enriched with its related entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectRecord {
    pub company: Company,
    pub establishment: Establishment,
    pub partners: Vec<Partner>,
    pub primary_activity: Option<ActivityCode>,
    pub secondary_activities: Vec<ActivityCode>,
}

/// Why a root produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The root's base-id failed validation.
    MalformedBaseId { reason: String },
    /// The company lookup failed or found nothing.
    CompanyUnavailable { error: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedBaseId { reason } => write!(f, "malformed base-id: {reason}"),
            Self::CompanyUnavailable { error } => write!(f, "company unavailable: {error}"),
        }
    }
}

/// A root that was left out of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub establishment_id: i64,
    pub base_id: String,
    pub reason: SkipReason,
}

/// Result of aggregating a list of roots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProspectBatch {
    /// Enriched records, in root order.
    pub records: Vec<ProspectRecord>,
    /// Roots that produced no record, in root order.
    pub skipped: Vec<SkippedRecord>,
}

/// Splits a comma-delimited activity list into trimmed, non-empty codes.
pub fn split_activity_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(String::from)
        .collect()
}

/// Loads issued for one root, awaited in the second phase.
struct PlannedRecord {
    establishment: Establishment,
    base_id: String,
    company: Pending<Company>,
    partners: Pending<Vec<Partner>>,
    primary_activity: Option<Pending<ActivityCode>>,
    secondary_activities: Vec<Pending<ActivityCode>>,
}

enum Plan {
    Load(Box<PlannedRecord>),
    Skip(SkippedRecord),
}

/// Aggregates roots into prospect records using the request's loaders.
///
/// Output order follows root order; skipped roots are reported in
/// [`ProspectBatch::skipped`] and logged.
#[instrument(skip_all, fields(roots = roots.len()))]
pub async fn assemble<S: RegistryStore>(
    loaders: &LoaderRegistry<S>,
    roots: Vec<Establishment>,
) -> ProspectBatch {
    let plans: Vec<Plan> = roots
        .into_iter()
        .map(|establishment| plan(loaders, establishment))
        .collect();

    let mut batch = ProspectBatch::default();
    for plan in plans {
        match plan {
            Plan::Skip(skipped) => batch.skipped.push(skipped),
            Plan::Load(planned) => match resolve(*planned).await {
                Ok(record) => batch.records.push(record),
                Err(skipped) => batch.skipped.push(skipped),
            },
        }
    }

    debug!(
        records = batch.records.len(),
        skipped = batch.skipped.len(),
        "Assembled prospect records"
    );
    batch
}

fn plan<S: RegistryStore>(loaders: &LoaderRegistry<S>, establishment: Establishment) -> Plan {
    let base_id = match validate_base_id(&establishment.base_id) {
        Ok(base_id) => base_id.to_string(),
        Err(e) => {
            warn!(
                establishment_id = establishment.id,
                base_id = %establishment.base_id,
                error = %e,
                "Skipping record with malformed base-id"
            );
            return Plan::Skip(SkippedRecord {
                establishment_id: establishment.id,
                base_id: establishment.base_id,
                reason: SkipReason::MalformedBaseId {
                    reason: e.to_string(),
                },
            });
        }
    };

    let company = loaders.companies().load(base_id.clone());
    let partners = loaders.partners().load(base_id.clone());
    let primary_activity = validate_activity_code(&establishment.primary_activity)
        .ok()
        .map(|code| loaders.activity_codes().load(code.to_string()));
    let secondary_activities = loaders
        .activity_codes()
        .load_many(split_activity_codes(&establishment.secondary_activities));

    Plan::Load(Box::new(PlannedRecord {
        establishment,
        base_id,
        company,
        partners,
        primary_activity,
        secondary_activities,
    }))
}

async fn resolve(planned: PlannedRecord) -> Result<ProspectRecord, SkippedRecord> {
    let PlannedRecord {
        establishment,
        base_id,
        company,
        partners,
        primary_activity,
        secondary_activities,
    } = planned;

    let company = match company.await {
        Ok(company) => company,
        Err(e) => {
            warn!(
                establishment_id = establishment.id,
                base_id = %base_id,
                error = %e,
                "Skipping record without company"
            );
            return Err(SkippedRecord {
                establishment_id: establishment.id,
                base_id,
                reason: SkipReason::CompanyUnavailable {
                    error: e.to_string(),
                },
            });
        }
    };

    let partners = partners.await.unwrap_or_else(|e| {
        warn!(base_id = %base_id, error = %e, "Partners unavailable, using empty list");
        Vec::new()
    });

    let primary_activity = match primary_activity {
        Some(pending) => match pending.await {
            Ok(code) => Some(code),
            Err(e) => {
                warn!(
                    establishment_id = establishment.id,
                    code = %establishment.primary_activity,
                    error = %e,
                    "Primary activity unavailable"
                );
                None
            }
        },
        None => None,
    };

    let secondary_activities = join_pending(secondary_activities)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(code) => Some(code),
            Err(e) => {
                debug!(establishment_id = establishment.id, error = %e, "Dropping secondary activity");
                None
            }
        })
        .collect();

    Ok(ProspectRecord {
        company,
        establishment,
        partners,
        primary_activity,
        secondary_activities,
    })
}

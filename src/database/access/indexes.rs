use std::time::Duration;

use crate::consts::*;
use crate::database::store::IndexSpec;

const DEFAULT_INDEXES: &[&str] = &[GUID_FIELD, NAME_FIELD, CUSTOMERS_FIELD];

/// Indexes registered for `collection` at startup.
pub fn indexes_for(collection: &str) -> Vec<IndexSpec> {
    let mut indexes: Vec<IndexSpec> = DEFAULT_INDEXES.iter().map(|f| IndexSpec::new(f)).collect();
    let extra: &[&str] = match collection {
        CLUSTERS_COLLECTION => &["lastPostureScanTriggered", "attributes.alias"],
        CUSTOMER_CONFIG_COLLECTION => &["scope.cluster"],
        REGISTRY_CRON_JOB_COLLECTION => &["clusterName", "registryName"],
        RUNTIME_INCIDENT_COLLECTION => &["creationTimestamp", "creationDayDate", "relatedAlerts.guid"],
        INTEGRATION_REFERENCE_COLLECTION => &["relatedObjects.cveID", "relatedObjects.severity"],
        ATTACK_CHAINS_COLLECTION => &["attackChainID", "clusterName"],
        WORKFLOWS_COLLECTION => &[UPDATED_TIME_FIELD],
        _ => &[],
    };
    indexes.extend(extra.iter().map(|f| IndexSpec::new(f)));
    if collection == USERS_NOTIFICATIONS_CACHE_COLLECTION {
        indexes.push(IndexSpec::ttl(EXPIRY_TIME_FIELD, Duration::ZERO));
    }
    indexes
}

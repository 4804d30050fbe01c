//! Every collection path the service exposes, registered through the route
//! factory.

pub mod attack_chains;
pub mod cloud_credentials;
pub mod customer;
pub mod customer_config;
pub mod notification;
pub mod runtime;

use axum::Router;

use crate::config::AppConfig;
use crate::consts::*;
use crate::document::DocumentKind;
use crate::query::QueryParamsConfig;
use crate::routes::{RouteError, RouteOptions};
use crate::schema::{ApiRegistry, FieldType, SchemaInfo};
use crate::state::AppState;
use crate::validator::CacheTtl;

/// Builds the tenant-scoped routes of all collections and records each path
/// in `registry`.
pub fn routes(registry: &mut ApiRegistry, config: &AppConfig) -> Result<Router<AppState>, RouteError> {
    let options = vec![
        cluster(),
        customer::options(),
        notification::options(),
        customer_config::options(),
        RouteOptions::policy(
            POSTURE_EXCEPTION_POLICY_PATH,
            POSTURE_EXCEPTION_POLICIES_COLLECTION,
            DocumentKind::Standard,
            Some(QueryParamsConfig::attributes()),
            false,
        )
        .with_schema(SchemaInfo::new().with_array_paths(&["posturePolicies", "resources"])),
        RouteOptions::policy(
            VULNERABILITY_EXCEPTION_POLICY_PATH,
            VULNERABILITY_EXCEPTION_POLICIES_COLLECTION,
            DocumentKind::Standard,
            Some(QueryParamsConfig::attributes()),
            false,
        )
        .with_schema(SchemaInfo::new().with_array_paths(&["vulnerabilities", "resources"])),
        RouteOptions::policy(FRAMEWORK_PATH, FRAMEWORKS_COLLECTION, DocumentKind::Framework, None, false)
            .with_name_query_param(FRAMEWORK_NAME_PARAM),
        repository(),
        registry_cron_job(),
        integration_reference(),
        runtime::incidents(),
        runtime::alerts(),
        workflows(),
        RouteOptions::policy(
            COLLABORATION_CONFIG_PATH,
            COLLABORATION_CONFIG_COLLECTION,
            DocumentKind::Standard,
            Some(QueryParamsConfig::flat()),
            false,
        ),
        attack_chains::options(),
        users_notifications_cache(config.defaults.notifications_cache_ttl_days),
        runtime_incident_policy(),
        users_notifications_vulnerabilities(),
        container_image_registries(),
        cloud_credentials::options(),
        user(),
    ];

    let mut router = Router::new();
    for opts in options {
        router = router.merge(opts.build(registry)?);
    }
    Ok(router)
}

fn cluster() -> RouteOptions {
    RouteOptions::new(CLUSTER_PATH, CLUSTERS_COLLECTION, DocumentKind::Cluster)
        .with_schema(SchemaInfo::new().with_timestamp_field("subscription_date"))
        .with_name_query_param(NAME_FIELD)
        .with_unique_short_name(NAME_FIELD)
        .with_v2_list(true)
}

fn repository() -> RouteOptions {
    RouteOptions::new(REPOSITORY_PATH, REPOSITORIES_COLLECTION, DocumentKind::Repository)
        .with_schema(SchemaInfo::new().with_timestamp_field("creationDate"))
        .with_name_query_param(NAME_FIELD)
        .with_unique_short_name("repoName")
        .with_v2_list(true)
}

fn registry_cron_job() -> RouteOptions {
    RouteOptions::new(REGISTRY_CRON_JOB_PATH, REGISTRY_CRON_JOB_COLLECTION, DocumentKind::RegistryCronJob)
        .with_schema(SchemaInfo::new().with_timestamp_field(UPDATED_TIME_FIELD))
        .with_name_query_param(NAME_FIELD)
        .with_delete_by_name(true)
        .with_query_config(QueryParamsConfig::flat())
}

fn integration_reference() -> RouteOptions {
    RouteOptions::new(
        INTEGRATION_REFERENCE_PATH,
        INTEGRATION_REFERENCE_COLLECTION,
        DocumentKind::Standard,
    )
    .with_schema(
        SchemaInfo::new()
            .with_array_paths(&["relatedObjects"])
            .with_field_type(CREATION_TIME_FIELD, FieldType::Date),
    )
    .with_names_list(false)
    .with_post_unique_name(false)
    .with_v2_list(true)
}

fn workflows() -> RouteOptions {
    let schema = SchemaInfo::new()
        .with_array_paths(&[
            "scope",
            "conditions",
            "notifications",
            "notifications.teamsWebhookURLs",
            "notifications.slackChannels",
            "notifications.jiraTicketIdentifiers",
        ])
        .with_field_type(CREATION_TIME_FIELD, FieldType::Date)
        .with_timestamp_field(CREATION_TIME_FIELD);
    RouteOptions::new(WORKFLOWS_PATH, WORKFLOWS_COLLECTION, DocumentKind::Standard)
        .with_schema(schema)
        .with_name_query_param(POLICY_NAME_PARAM)
        .with_delete_by_name(true)
        .with_post_unique_name(false)
        .with_post_mandatory_name(true)
        .with_v2_list(true)
}

fn users_notifications_cache(ttl_days: i64) -> RouteOptions {
    RouteOptions::new(
        USERS_NOTIFICATIONS_CACHE_PATH,
        USERS_NOTIFICATIONS_CACHE_COLLECTION,
        DocumentKind::Cache,
    )
    .with_names_list(false)
    .with_post_unique_name(false)
    .with_post_validator(CacheTtl::days(ttl_days))
    .with_put_validator(CacheTtl::days(ttl_days))
    .with_v2_list(true)
}

fn runtime_incident_policy() -> RouteOptions {
    let schema = SchemaInfo::new()
        .with_array_paths(&[
            "notifications",
            "actions",
            "scope.riskFactors",
            "scope.designators",
            "incidentTypeIDs",
            "managedRuleSetIDs",
        ])
        .with_field_type(CREATION_TIME_FIELD, FieldType::Date)
        .with_timestamp_field(CREATION_TIME_FIELD);
    RouteOptions::new(
        RUNTIME_INCIDENT_POLICY_PATH,
        RUNTIME_INCIDENT_POLICY_COLLECTION,
        DocumentKind::Standard,
    )
    .with_schema(schema)
    .with_name_query_param(POLICY_NAME_PARAM)
    .with_delete_by_name(true)
    .with_post_unique_name(false)
    .with_put_guid(true)
    .with_post_mandatory_name(true)
    .with_v2_list(true)
}

fn users_notifications_vulnerabilities() -> RouteOptions {
    RouteOptions::new(
        USERS_NOTIFICATIONS_VULNERABILITIES_PATH,
        USERS_NOTIFICATIONS_VULNERABILITIES_COLLECTION,
        DocumentKind::Standard,
    )
    .with_schema(SchemaInfo::new().with_array_paths(&["workloads", "images", "wlids"]))
    .with_names_list(false)
    .with_post_unique_name(false)
    .with_v2_list(true)
}

fn container_image_registries() -> RouteOptions {
    let schema = SchemaInfo::new()
        .with_field_type(CREATION_TIME_FIELD, FieldType::Date)
        .with_field_type(UPDATED_TIME_FIELD, FieldType::Date)
        .with_timestamp_field(UPDATED_TIME_FIELD);
    RouteOptions::new(
        CONTAINER_IMAGE_REGISTRIES_PATH,
        CONTAINER_IMAGE_REGISTRIES_COLLECTION,
        DocumentKind::Standard,
    )
    .with_schema(schema)
    .with_post_unique_name(false)
    .with_v2_list(true)
}

fn user() -> RouteOptions {
    RouteOptions::new(USER_PATH, USERS_COLLECTION, DocumentKind::Standard)
        .with_names_list(false)
        .with_get_by_guid_only(true)
        .with_post_unique_name(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_collection_is_registered() {
        let mut registry = ApiRegistry::new();
        routes(&mut registry, &AppConfig::development()).unwrap();

        let paths = registry.paths();
        for path in [
            "cluster",
            "customer",
            "customer/notificationConfig",
            "v1_customer_configuration",
            "v1_posture_exception_policy",
            "v1_vulnerability_exception_policy",
            "v1_opa_framework",
            "v1_repository",
            "v1_registry_cron_job",
            "integrationReference",
            "runtimeIncident",
            "runtimeAlert",
            "workflows",
            "collaborationConfig",
            "attackChainsState",
            "usersNotificationsCache",
            "runtimeIncidentPolicy",
            "usersNotificationsVulnerabilities",
            "containerImageRegistries",
            "cloudCredentials",
            "user",
        ] {
            assert!(paths.iter().any(|p| p == path), "{} not registered", path);
        }
        assert_eq!(
            registry.get("runtimeAlert").unwrap().db_collection,
            RUNTIME_INCIDENT_COLLECTION
        );
        assert_eq!(
            registry.get("/cluster").unwrap().schema.timestamp_field(),
            "subscription_date"
        );
        assert_eq!(
            registry.get("/containerImageRegistries").unwrap().schema.timestamp_field(),
            UPDATED_TIME_FIELD
        );
    }
}

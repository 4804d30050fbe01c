// Field names shared by every stored document
pub const ID_FIELD: &str = "_id";
pub const GUID_FIELD: &str = "guid";
pub const NAME_FIELD: &str = "name";
pub const CUSTOMERS_FIELD: &str = "customers";
pub const ATTRIBUTES_FIELD: &str = "attributes";
pub const SHORT_NAME_ATTRIBUTE: &str = "alias";
pub const CREATION_TIME_FIELD: &str = "creationTime";
pub const UPDATED_TIME_FIELD: &str = "updatedTime";
pub const EXPIRY_TIME_FIELD: &str = "expiryTime";

/// Cookie and query parameter carrying the tenant identifier
pub const CUSTOMER_GUID: &str = "customerGUID";
/// Cookie segment granting admin access
pub const ADMIN_ACCESS: &str = "adminAccess";

// Query parameters
pub const LIST_PARAM: &str = "list";
pub const POLICY_NAME_PARAM: &str = "policyName";
pub const CUSTOMERS_PARAM: &str = "customers";
pub const LIMIT_PARAM: &str = "limit";
pub const SKIP_PARAM: &str = "skip";
pub const FROM_DATE_PARAM: &str = "fromDate";
pub const TO_DATE_PARAM: &str = "toDate";
pub const PROJECTION_PARAM: &str = "projection";
pub const CONFIG_NAME_PARAM: &str = "configName";
pub const FRAMEWORK_NAME_PARAM: &str = "frameworkName";
pub const CLUSTER_NAME_PARAM: &str = "clusterName";
pub const SCOPE_PARAM: &str = "scope";
pub const UNMERGED_PARAM: &str = "unmerged";

// Collections
pub const CLUSTERS_COLLECTION: &str = "clusters";
pub const CUSTOMERS_COLLECTION: &str = "customers";
pub const POSTURE_EXCEPTION_POLICIES_COLLECTION: &str = "v1_posture_exception_policies";
pub const VULNERABILITY_EXCEPTION_POLICIES_COLLECTION: &str = "v1_vulnerability_exception_policies";
pub const CUSTOMER_CONFIG_COLLECTION: &str = "v1_customer_configurations";
pub const FRAMEWORKS_COLLECTION: &str = "v1_opa_frameworks";
pub const REPOSITORIES_COLLECTION: &str = "v1_repositories";
pub const REGISTRY_CRON_JOB_COLLECTION: &str = "v1_registry_cron_jobs";
pub const INTEGRATION_REFERENCE_COLLECTION: &str = "integration_references";
pub const RUNTIME_INCIDENT_COLLECTION: &str = "runtime_incidents";
pub const WORKFLOWS_COLLECTION: &str = "workflows";
pub const COLLABORATION_CONFIG_COLLECTION: &str = "collaboration_configs";
pub const ATTACK_CHAINS_COLLECTION: &str = "attack_chains";
pub const USERS_NOTIFICATIONS_CACHE_COLLECTION: &str = "users_notifications_cache";
pub const RUNTIME_INCIDENT_POLICY_COLLECTION: &str = "runtime_incident_policies";
pub const USERS_NOTIFICATIONS_VULNERABILITIES_COLLECTION: &str = "users_notifications_vulnerabilities";
pub const CONTAINER_IMAGE_REGISTRIES_COLLECTION: &str = "container_image_registries";
pub const CLOUD_CREDENTIALS_COLLECTION: &str = "cloud_credentials";
pub const USERS_COLLECTION: &str = "users";

// Public paths
pub const CLUSTER_PATH: &str = "/cluster";
pub const CUSTOMER_PATH: &str = "/customer";
pub const NOTIFICATION_CONFIG_PATH: &str = "/customer/notificationConfig";
pub const POSTURE_EXCEPTION_POLICY_PATH: &str = "/v1_posture_exception_policy";
pub const VULNERABILITY_EXCEPTION_POLICY_PATH: &str = "/v1_vulnerability_exception_policy";
pub const CUSTOMER_CONFIG_PATH: &str = "/v1_customer_configuration";
pub const FRAMEWORK_PATH: &str = "/v1_opa_framework";
pub const REPOSITORY_PATH: &str = "/v1_repository";
pub const REGISTRY_CRON_JOB_PATH: &str = "/v1_registry_cron_job";
pub const INTEGRATION_REFERENCE_PATH: &str = "/integrationReference";
pub const RUNTIME_INCIDENT_PATH: &str = "/runtimeIncident";
pub const RUNTIME_ALERT_PATH: &str = "/runtimeAlert";
pub const WORKFLOWS_PATH: &str = "/workflows";
pub const COLLABORATION_CONFIG_PATH: &str = "/collaborationConfig";
pub const ATTACK_CHAINS_PATH: &str = "/attackChainsState";
pub const USERS_NOTIFICATIONS_CACHE_PATH: &str = "/usersNotificationsCache";
pub const RUNTIME_INCIDENT_POLICY_PATH: &str = "/runtimeIncidentPolicy";
pub const USERS_NOTIFICATIONS_VULNERABILITIES_PATH: &str = "/usersNotificationsVulnerabilities";
pub const CONTAINER_IMAGE_REGISTRIES_PATH: &str = "/containerImageRegistries";
pub const CLOUD_CREDENTIALS_PATH: &str = "/cloudCredentials";
pub const USER_PATH: &str = "/user";
pub const TENANT_PATH: &str = "/customer_tenant";
pub const ADMIN_PATH: &str = "/admin";

/// Name of the global customer configuration document
pub const GLOBAL_CONFIG_NAME: &str = "default";
pub const DEFAULT_CUSTOMER_CONFIG_KEY: &str = "defaultCustomerConfig";
/// Name of a tenant's own customer configuration document
pub const CUSTOMER_CONFIG_NAME: &str = "CustomerConfig";
pub const CUSTOMER_SCOPE: &str = "customer";
pub const DEFAULT_SCOPE: &str = "default";

use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::{DataAccess, DbError, Scope};
use crate::consts::{CLUSTERS_COLLECTION, CUSTOMERS_COLLECTION, CUSTOMERS_FIELD, ID_FIELD};
use crate::database::engine::group::{filter_rows, group_count, key_to_string, match_filters_for_unwind, unwind};
use crate::database::engine::COMPOSITE_SEPARATOR;
use crate::database::results::{AggResult, FieldCount, Metadata, UniqueValuesResponse};
use crate::database::store::StoreQuery;
use crate::filter::{FilterBuilder, FindOptions, SortBuilder};
use crate::schema::SchemaInfo;

/// Upper bound, and default, of a template page.
pub const TEMPLATE_MAX_LIMIT: usize = 10_000;

/// Pre-registered aggregations reachable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationTemplate {
    /// Tenants owning a cluster whose last posture scan lies in `[fromDate, toDate]`.
    CustomersWithScansBetweenDates,
}

impl AggregationTemplate {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "customersWithScansBetweenDates" => Some(Self::CustomersWithScansBetweenDates),
            _ => None,
        }
    }
}

impl DataAccess {
    pub async fn aggregate_for_customer(
        &self,
        scope: &Scope,
        mut opts: FindOptions,
        schema: &SchemaInfo,
    ) -> Result<UniqueValuesResponse, DbError> {
        let filter = std::mem::take(opts.filter_mut());
        opts.set_filter(scope.scoped(filter, false)?);
        self.admin_aggregate(scope, &opts, schema).await
    }

    /// Distinct values and their counts for every group field, computed
    /// concurrently. A composite field `a|b` yields pipe-joined tuples.
    pub async fn admin_aggregate(
        &self,
        scope: &Scope,
        opts: &FindOptions,
        schema: &SchemaInfo,
    ) -> Result<UniqueValuesResponse, DbError> {
        let collection = scope.collection()?;
        if opts.group().is_empty() {
            return Err(DbError::EmptyGroup);
        }

        let tasks = opts
            .group()
            .iter()
            .map(|field| self.unique_values_for_field(collection, field, opts, schema));
        let per_field = try_join_all(tasks).await?;

        let mut response = UniqueValuesResponse::default();
        for (field, groups) in per_field {
            let values = groups.iter().map(|g| g.field.clone()).collect();
            response.fields.insert(field.clone(), values);
            response.fields_count.insert(field, groups);
        }
        Ok(response)
    }

    async fn unique_values_for_field(
        &self,
        collection: &str,
        field: &str,
        opts: &FindOptions,
        schema: &SchemaInfo,
    ) -> Result<(String, Vec<FieldCount>), DbError> {
        let components: Vec<&str> = field.split(COMPOSITE_SEPARATOR).collect();
        let mut filter = FilterBuilder::new().with_filter(opts.filter().clone());
        for component in &components {
            filter = filter.add_exists(*component, true);
        }
        let predicate = filter.build();
        let no_sort = SortBuilder::new();
        let docs = self.store.find(collection, StoreQuery::new(&predicate, &no_sort)).await?;

        let array = schema.array_details(components[0]);
        let rows = if array.is_array {
            let mut unwind_filter = FilterBuilder::new().with_filter(opts.unwind_filter().clone());
            for component in &components {
                unwind_filter = unwind_filter.add_exists(*component, true);
            }
            let rematch = match_filters_for_unwind(&array.array_path, &unwind_filter.build());
            filter_rows(unwind(&docs, &array.array_path), &rematch)?
        } else {
            docs
        };

        let groups = group_count(&rows, &components, opts.skip(), opts.limit());
        let counts = groups
            .into_iter()
            .map(|g| FieldCount {
                field: key_to_string(&g.key),
                count: g.count,
            })
            .collect();
        Ok((field.to_string(), counts))
    }

    /// Runs a named template. A limit of zero or above the maximum becomes
    /// the maximum; `nextSkip` is zero once the last page was served.
    pub async fn aggregate_with_template(
        &self,
        name: &str,
        limit: usize,
        skip: usize,
        args: &Map<String, Value>,
    ) -> Result<AggResult, DbError> {
        let template = AggregationTemplate::from_name(name).ok_or_else(|| DbError::UnknownTemplate(name.to_string()))?;
        let limit = if limit == 0 || limit > TEMPLATE_MAX_LIMIT {
            TEMPLATE_MAX_LIMIT
        } else {
            limit
        };

        let page = match template {
            AggregationTemplate::CustomersWithScansBetweenDates => {
                self.customers_with_scans_between(args, limit, skip).await?
            }
        };
        let next_skip = if skip + page.window < page.total {
            skip + page.window
        } else {
            0
        };
        Ok(AggResult {
            metadata: Metadata {
                total: page.total,
                limit,
                next_skip,
            },
            results: page.results,
        })
    }

    async fn customers_with_scans_between(
        &self,
        args: &Map<String, Value>,
        limit: usize,
        skip: usize,
    ) -> Result<TemplatePage, DbError> {
        let from = args.get("fromDate").cloned().ok_or(DbError::TemplateArgument("fromDate"))?;
        let to = args.get("toDate").cloned().ok_or(DbError::TemplateArgument("toDate"))?;

        let predicate = FilterBuilder::new()
            .with_range("lastPostureScanTriggered", from, to)
            .build();
        let no_sort = SortBuilder::new();
        let clusters = self
            .store
            .find(CLUSTERS_COLLECTION, StoreQuery::new(&predicate, &no_sort))
            .await?;

        let owners: BTreeSet<String> = clusters
            .iter()
            .filter_map(|c| c.get(CUSTOMERS_FIELD).and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        let total = owners.len();
        let window: Vec<&String> = owners.iter().skip(skip).take(limit).collect();
        if window.is_empty() {
            return Ok(TemplatePage {
                total,
                window: 0,
                results: Vec::new(),
            });
        }

        let registry_filter = FilterBuilder::new().with_ids(&window).build();
        let mut sort = SortBuilder::new();
        sort.add_ascending(&[ID_FIELD]);
        let records = self
            .store
            .find(CUSTOMERS_COLLECTION, StoreQuery::new(&registry_filter, &sort))
            .await?;

        // registry records keyed by tenant, in tenant order
        let by_id: BTreeMap<&str, &Value> = records
            .iter()
            .filter_map(|r| r.get(ID_FIELD).and_then(Value::as_str).map(|id| (id, r)))
            .collect();
        let results = window
            .iter()
            .filter_map(|tenant| by_id.get(tenant.as_str()).map(|r| (*r).clone()))
            .collect();
        Ok(TemplatePage {
            total,
            window: window.len(),
            results,
        })
    }
}

/// One page of template output. `window` counts the keys the page covered,
/// which may exceed `results` when a key has no matching record.
struct TemplatePage {
    total: usize,
    window: usize,
    results: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::store::DocumentStore;
    use serde_json::json;
    use std::sync::Arc;

    fn references() -> Vec<Value> {
        let related = |sev: &str, comp: &str| json!({"severity": sev, "component": comp});
        vec![
            json!({"_id": "1", "customers": ["t1"], "name": "r1", "relatedObjects": [related("critical", "component1"), related("high", "component2")]}),
            json!({"_id": "2", "customers": ["t1"], "name": "r2", "relatedObjects": [related("critical", "component2"), related("low", "component1")]}),
            json!({"_id": "3", "customers": ["t1"], "name": "r3", "relatedObjects": [related("high", "component1")]}),
            json!({"_id": "4", "customers": ["t2"], "name": "r4", "relatedObjects": [related("medium", "component9")]}),
        ]
    }

    async fn access_with(collection: &str, docs: Vec<Value>) -> DataAccess {
        let store = Arc::new(MemoryStore::new());
        store.insert_many(collection, &docs).await.unwrap();
        DataAccess::new(store)
    }

    #[tokio::test]
    async fn unique_values_per_plain_field() {
        let access = access_with("integration_references", references()).await;
        let scope = Scope::new("t1", "integration_references");
        let mut opts = FindOptions::new();
        opts.add_group(&["name"]);
        let schema = SchemaInfo::new().with_array_paths(&["relatedObjects"]);
        let result = access.aggregate_for_customer(&scope, opts, &schema).await.unwrap();
        assert_eq!(result.fields["name"], vec!["r1", "r2", "r3"]);
        assert_eq!(result.fields_count["name"][0].count, 1);
    }

    #[tokio::test]
    async fn composite_fields_pair_values_from_one_element() {
        let access = access_with("integration_references", references()).await;
        let scope = Scope::new("t1", "integration_references");
        let schema = SchemaInfo::new().with_array_paths(&["relatedObjects"]);

        let severity = FilterBuilder::new()
            .with_in("severity", vec![json!("critical"), json!("high")])
            .with_in("component", vec![json!("component1"), json!("component2")])
            .warp_element_match()
            .warp_with_field("relatedObjects");
        let mut opts = FindOptions::new();
        opts.set_filter(severity);
        opts.add_group(&["relatedObjects.severity|relatedObjects.component"]);

        let result = access.aggregate_for_customer(&scope, opts, &schema).await.unwrap();
        assert_eq!(
            result.fields["relatedObjects.severity|relatedObjects.component"],
            vec![
                "critical|component1",
                "critical|component2",
                "high|component1",
                "high|component2"
            ]
        );
    }

    #[tokio::test]
    async fn empty_group_is_rejected() {
        let access = access_with("integration_references", references()).await;
        let scope = Scope::new("t1", "integration_references");
        let err = access
            .admin_aggregate(&scope, &FindOptions::new(), &SchemaInfo::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::EmptyGroup));
    }

    #[tokio::test]
    async fn active_customers_template_pages_through_tenants() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_many(
                CLUSTERS_COLLECTION,
                &[
                    json!({"_id": "c1", "customers": ["t2"], "lastPostureScanTriggered": "2024-03-01T00:00:00Z"}),
                    json!({"_id": "c2", "customers": ["t1"], "lastPostureScanTriggered": "2024-03-02T00:00:00Z"}),
                    json!({"_id": "c3", "customers": ["t1"], "lastPostureScanTriggered": "2024-03-03T00:00:00Z"}),
                    json!({"_id": "c4", "customers": ["t3"], "lastPostureScanTriggered": "2023-01-01T00:00:00Z"}),
                ],
            )
            .await
            .unwrap();
        store
            .insert_many(
                CUSTOMERS_COLLECTION,
                &[
                    json!({"_id": "t1", "guid": "t1"}),
                    json!({"_id": "t2", "guid": "t2"}),
                    json!({"_id": "t3", "guid": "t3"}),
                ],
            )
            .await
            .unwrap();
        let access = DataAccess::new(store);
        let mut args = Map::new();
        args.insert("fromDate".to_string(), json!("2024-01-01T00:00:00Z"));
        args.insert("toDate".to_string(), json!("2024-12-31T00:00:00Z"));

        let first = access
            .aggregate_with_template("customersWithScansBetweenDates", 1, 0, &args)
            .await
            .unwrap();
        assert_eq!(first.metadata, Metadata { total: 2, limit: 1, next_skip: 1 });
        assert_eq!(first.results[0]["guid"], "t1");

        let last = access
            .aggregate_with_template("customersWithScansBetweenDates", 1, 1, &args)
            .await
            .unwrap();
        assert_eq!(last.metadata.next_skip, 0);
        assert_eq!(last.results[0]["guid"], "t2");

        let all = access
            .aggregate_with_template("customersWithScansBetweenDates", 0, 0, &args)
            .await
            .unwrap();
        assert_eq!(all.metadata.limit, TEMPLATE_MAX_LIMIT);

        let err = access.aggregate_with_template("nope", 1, 0, &args).await.unwrap_err();
        assert!(matches!(err, DbError::UnknownTemplate(_)));
    }

    #[tokio::test]
    async fn tenant_without_registry_record_still_advances_skip() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_many(
                CLUSTERS_COLLECTION,
                &[
                    json!({"_id": "c1", "customers": ["t1"], "lastPostureScanTriggered": "2024-03-01T00:00:00Z"}),
                    json!({"_id": "c2", "customers": ["t2"], "lastPostureScanTriggered": "2024-03-02T00:00:00Z"}),
                    json!({"_id": "c3", "customers": ["t3"], "lastPostureScanTriggered": "2024-03-03T00:00:00Z"}),
                ],
            )
            .await
            .unwrap();
        // t1 has clusters but no registry record
        store
            .insert_many(
                CUSTOMERS_COLLECTION,
                &[json!({"_id": "t2", "guid": "t2"}), json!({"_id": "t3", "guid": "t3"})],
            )
            .await
            .unwrap();
        let access = DataAccess::new(store);
        let mut args = Map::new();
        args.insert("fromDate".to_string(), json!("2024-01-01T00:00:00Z"));
        args.insert("toDate".to_string(), json!("2024-12-31T00:00:00Z"));

        let first = access
            .aggregate_with_template("customersWithScansBetweenDates", 2, 0, &args)
            .await
            .unwrap();
        assert_eq!(first.metadata, Metadata { total: 3, limit: 2, next_skip: 2 });
        assert_eq!(first.results.len(), 1);
        assert_eq!(first.results[0]["guid"], "t2");

        let second = access
            .aggregate_with_template("customersWithScansBetweenDates", 2, 2, &args)
            .await
            .unwrap();
        assert_eq!(second.metadata.next_skip, 0);
        assert_eq!(second.results.len(), 1);
        assert_eq!(second.results[0]["guid"], "t3");
    }
}

use serde_json::Value;

use super::{DataAccess, DbError, Scope};
use crate::database::engine::group::filter_rows;
use crate::database::engine::{path, project, sort_docs};
use crate::database::results::SearchResult;
use crate::database::store::StoreQuery;
use crate::filter::{FilterBuilder, FindOptions, ProjectionBuilder, SortBuilder};

impl DataAccess {
    /// Every document owned by the tenant, optionally with global ones.
    pub async fn get_all_for_customer(&self, scope: &Scope, include_globals: bool) -> Result<Vec<Value>, DbError> {
        self.find_for_customer(scope, FindOptions::new(), include_globals).await
    }

    pub async fn find_for_customer(
        &self,
        scope: &Scope,
        mut opts: FindOptions,
        with_globals: bool,
    ) -> Result<Vec<Value>, DbError> {
        let filter = std::mem::take(opts.filter_mut());
        opts.set_filter(scope.scoped(filter, with_globals)?);
        self.admin_find(scope, &opts).await
    }

    /// Filter, sort, skip and limit, then projection. No tenant predicate.
    pub async fn admin_find(&self, scope: &Scope, opts: &FindOptions) -> Result<Vec<Value>, DbError> {
        let collection = scope.collection()?;
        let filter = opts.filter().build();
        let query = StoreQuery::new(&filter, opts.sort()).window(opts.skip(), opts.limit());
        let docs = self.store.find(collection, query).await?;
        Ok(project_all(docs, opts.projection()))
    }

    pub async fn find_paginated_for_customer(&self, scope: &Scope, mut opts: FindOptions) -> Result<SearchResult, DbError> {
        let filter = std::mem::take(opts.filter_mut());
        opts.set_filter(scope.scoped(filter, false)?);
        self.admin_find_paginated(scope, &opts).await
    }

    /// Total count of the filter plus one sorted, windowed, projected page.
    /// A limit of zero only counts.
    pub async fn admin_find_paginated(&self, scope: &Scope, opts: &FindOptions) -> Result<SearchResult, DbError> {
        let collection = scope.collection()?;
        let filter = opts.filter().build();
        let total = self.store.count(collection, &filter).await?;
        if opts.limit() == Some(0) || total == 0 {
            return Ok(SearchResult::new(total, Vec::new()));
        }
        let query = StoreQuery::new(&filter, opts.sort()).window(opts.skip(), opts.limit());
        let page = self.store.find(collection, query).await?;
        Ok(SearchResult::new(total, project_all(page, opts.projection())))
    }

    /// Paginates the elements of the array at `nested_path` inside one parent
    /// document. Each element is matched, sorted and projected on its own.
    pub async fn find_nested_paginated(
        &self,
        scope: &Scope,
        parent_id: &str,
        nested_path: &str,
        opts: &FindOptions,
        admin: bool,
    ) -> Result<SearchResult, DbError> {
        let collection = scope.collection()?;
        let mut parent_filter = FilterBuilder::new().with_id(parent_id);
        if !admin {
            parent_filter = scope.scoped(parent_filter, false)?;
        }
        let predicate = parent_filter.build();
        let no_sort = SortBuilder::new();
        let parents = self
            .store
            .find(collection, StoreQuery::new(&predicate, &no_sort).window(0, Some(1)))
            .await?;
        let Some(parent) = parents.first() else {
            return Ok(SearchResult::new(0, Vec::new()));
        };

        let elements = match path::get(parent, nested_path) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let mut rows = filter_rows(elements, &opts.filter().build())?;
        let total = rows.len() as u64;
        sort_docs(&mut rows, opts.sort());

        let page = rows.into_iter().skip(opts.skip());
        let page: Vec<Value> = match opts.limit() {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        };
        Ok(SearchResult::new(total, project_all(page, opts.projection())))
    }

    /// Tenant documents matching `filter`.
    pub async fn count_docs(&self, scope: &Scope, filter: FilterBuilder) -> Result<u64, DbError> {
        let collection = scope.collection()?;
        let filter = scope.scoped_first(filter)?.build();
        Ok(self.store.count(collection, &filter).await?)
    }

    pub async fn doc_exists(&self, scope: &Scope, filter: FilterBuilder) -> Result<bool, DbError> {
        Ok(self.count_docs(scope, filter).await? > 0)
    }

    pub async fn doc_with_name_exists(&self, scope: &Scope, name: &str) -> Result<bool, DbError> {
        self.doc_exists(scope, FilterBuilder::new().with_name(name)).await
    }

    pub async fn get_doc_by_guid(&self, scope: &Scope, guid: &str) -> Result<Option<Value>, DbError> {
        let filter = scope.scoped_first(FilterBuilder::new().with_id(guid))?;
        self.first(scope, &filter).await
    }

    pub async fn get_doc_by_name(&self, scope: &Scope, name: &str) -> Result<Option<Value>, DbError> {
        let filter = scope.scoped_first(FilterBuilder::new().with_name(name))?;
        self.first(scope, &filter).await
    }

    /// First document matching `filter` as given, without a tenant predicate.
    pub async fn get_doc(&self, scope: &Scope, filter: &FilterBuilder) -> Result<Option<Value>, DbError> {
        self.first(scope, filter).await
    }

    async fn first(&self, scope: &Scope, filter: &FilterBuilder) -> Result<Option<Value>, DbError> {
        let collection = scope.collection()?;
        let predicate = filter.build();
        let sort = SortBuilder::new();
        let mut docs = self
            .store
            .find(collection, StoreQuery::new(&predicate, &sort).window(0, Some(1)))
            .await?;
        Ok(if docs.is_empty() { None } else { Some(docs.remove(0)) })
    }
}

fn project_all(docs: Vec<Value>, projection: &ProjectionBuilder) -> Vec<Value> {
    if projection.is_empty() {
        return docs;
    }
    docs.iter().map(|doc| project(doc, projection)).collect()
}

use super::builder::FilterBuilder;
use super::projection::ProjectionBuilder;
use super::sort::SortBuilder;

/// Everything a read path needs: predicate, shape, order and window.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    filter: FilterBuilder,
    unwind_filter: Option<FilterBuilder>,
    projection: ProjectionBuilder,
    sort: SortBuilder,
    group: Vec<String>,
    limit: Option<usize>,
    skip: usize,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&self) -> &FilterBuilder {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut FilterBuilder {
        &mut self.filter
    }

    pub fn set_filter(&mut self, filter: FilterBuilder) -> &mut Self {
        self.filter = filter;
        self
    }

    /// Filter re-applied after array unwinding; defaults to the main filter.
    pub fn unwind_filter(&self) -> &FilterBuilder {
        self.unwind_filter.as_ref().unwrap_or(&self.filter)
    }

    pub fn set_unwind_filter(&mut self, filter: FilterBuilder) -> &mut Self {
        self.unwind_filter = Some(filter);
        self
    }

    pub fn projection(&self) -> &ProjectionBuilder {
        &self.projection
    }

    pub fn projection_mut(&mut self) -> &mut ProjectionBuilder {
        &mut self.projection
    }

    pub fn sort(&self) -> &SortBuilder {
        &self.sort
    }

    pub fn sort_mut(&mut self) -> &mut SortBuilder {
        &mut self.sort
    }

    pub fn group(&self) -> &[String] {
        &self.group
    }

    pub fn add_group<S: AsRef<str>>(&mut self, fields: &[S]) -> &mut Self {
        self.group.extend(fields.iter().map(|f| f.as_ref().to_string()));
        self
    }

    /// `None` is unbounded; `Some(0)` returns no rows.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    pub fn set_skip(&mut self, skip: usize) -> &mut Self {
        self.skip = skip;
        self
    }

    /// Zero-based page number.
    pub fn set_pagination(&mut self, page: usize, per_page: usize) -> &mut Self {
        self.skip = page.saturating_mul(per_page);
        self.limit = Some(per_page);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pagination_translates_to_skip_and_limit() {
        let mut opts = FindOptions::new();
        opts.set_pagination(2, 25);
        assert_eq!(opts.skip(), 50);
        assert_eq!(opts.limit(), Some(25));
    }

    #[test]
    fn unwind_filter_falls_back_to_filter() {
        let mut opts = FindOptions::new();
        opts.set_filter(FilterBuilder::new().with_name("a"));
        assert_eq!(opts.unwind_filter().build(), json!({"name": "a"}));

        opts.set_unwind_filter(FilterBuilder::new().with_name("b"));
        assert_eq!(opts.unwind_filter().build(), json!({"name": "b"}));
    }
}

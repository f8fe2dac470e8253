//! Construction of ready-to-consume list models.

use std::sync::Arc;

use calstream_core::env::Environment;
use calstream_core::types::{Category, Direction};
use calstream_store::builder::ListConstraints;
use calstream_store::{BlockFetcher, Query, QueryBuilder, RecordStore};
use chrono::NaiveDate;

use super::{ListModel, MonthGroupedModel};
use crate::error::ServiceResult;
use crate::stream::{ComplexStream, InstanceStream, SimpleStream};

/// All-day streams are registered first so they win date ties.
const CATEGORIES: [Category; 2] = [Category::AllDay, Category::Timed];

/// Builds list models over one record store.
#[derive(Clone)]
pub struct ModelFactory {
    store: Arc<dyn RecordStore>,
    builder: QueryBuilder,
    env: Arc<Environment>,
}

impl std::fmt::Debug for ModelFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelFactory")
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

impl ModelFactory {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, env: Arc<Environment>) -> Self {
        Self {
            store,
            builder: QueryBuilder::new(Arc::clone(&env)),
            env,
        }
    }

    fn fetcher(&self, query: Query) -> BlockFetcher {
        BlockFetcher::new(Arc::clone(&self.store), query, self.env.page_size)
    }

    /// ## Summary
    /// Agenda listing from `anchor` in `direction`, one entry per day an
    /// occurrence spans.
    #[must_use]
    pub fn agenda(
        &self,
        anchor: NaiveDate,
        direction: Direction,
        constraints: &ListConstraints,
    ) -> ListModel {
        CATEGORIES
            .into_iter()
            .fold(ListModel::new(direction), |model, category| {
                let query = self
                    .builder
                    .complex_query(anchor, direction, category)
                    .and_filter(self.builder.list_filter(category, constraints));
                let stream: Box<dyn InstanceStream> = Box::new(ComplexStream::new(
                    self.fetcher(query),
                    Arc::clone(&self.env),
                    category,
                    direction,
                    anchor,
                ));
                model.with_stream(stream)
            })
    }

    /// ## Summary
    /// Keyword search from `anchor` in `direction`; each occurrence appears
    /// once, on its start date.
    #[must_use]
    pub fn search(&self, keyword: &str, anchor: NaiveDate, direction: Direction) -> ListModel {
        let constraints = ListConstraints::default().with_keyword(keyword);
        CATEGORIES
            .into_iter()
            .fold(ListModel::new(direction), |model, category| {
                let query = self
                    .builder
                    .simple_query(anchor, direction, category)
                    .and_filter(self.builder.list_filter(category, &constraints));
                model.with_stream(self.simple(query, category))
            })
    }

    /// ## Summary
    /// Occurrences overlapping `[from, to)`, ascending; used to list
    /// deletion candidates when `constraints` asks for editable books only.
    #[must_use]
    pub fn range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        constraints: &ListConstraints,
    ) -> ListModel {
        CATEGORIES
            .into_iter()
            .fold(ListModel::new(Direction::Forward), |model, category| {
                let query = self
                    .builder
                    .range_query(from, to, category)
                    .and_filter(self.builder.list_filter(category, constraints));
                model.with_stream(self.simple(query, category))
            })
    }

    /// Agenda listing with a placeholder for every empty month.
    #[must_use]
    pub fn month_grid(
        &self,
        anchor: NaiveDate,
        direction: Direction,
        constraints: &ListConstraints,
    ) -> MonthGroupedModel {
        MonthGroupedModel::new(self.agenda(anchor, direction, constraints), anchor)
    }

    /// ## Summary
    /// Pre-warms the forward and backward agenda models around `anchor`
    /// concurrently. Both are returned only after their prefetch finished.
    ///
    /// ## Errors
    /// Returns [`crate::error::ServiceError::JoinError`] if a background
    /// prefetch task panicked.
    pub async fn prepare_around(
        &self,
        anchor: NaiveDate,
        constraints: &ListConstraints,
    ) -> ServiceResult<(ListModel, ListModel)> {
        let forward = self.agenda(anchor, Direction::Forward, constraints);
        let backward = self.agenda(anchor, Direction::Backward, constraints);
        tokio::try_join!(prepare(forward), prepare(backward))
    }

    fn simple(&self, query: Query, category: Category) -> Box<dyn InstanceStream> {
        Box::new(SimpleStream::new(
            self.fetcher(query),
            Arc::clone(&self.env),
            category,
        ))
    }
}

/// ## Summary
/// Runs `prefetch(true)` on a blocking task and hands the model back once
/// the task has joined.
///
/// ## Errors
/// Returns [`crate::error::ServiceError::JoinError`] if the task panicked.
pub async fn prepare(mut model: ListModel) -> ServiceResult<ListModel> {
    let model = tokio::task::spawn_blocking(move || {
        model.prefetch(true);
        model
    })
    .await?;
    tracing::debug!(direction = %model.direction(), "List model prepared");
    Ok(model)
}

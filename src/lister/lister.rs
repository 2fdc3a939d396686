//! Lister
//!
//! Composes offset, filter, order and limit into one query, runs it through
//! the storage collaborator, converts rows and computes the next token.

use std::sync::Arc;

use super::collection::Collection;
use super::storage::{PageRow, Storage};
use crate::cel::{Environment, ExpressionCache};
use crate::config::QueryConfig;
use crate::context::RequestContext;
use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event};
use crate::pagination::{
    Filter, LastItem, Limit, Offset, Order, OrderValue, PageSizeLimits, PageToken, SqlQuery,
};

/// A list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub parent: String,
    pub filter: String,
    pub order_by: String,
    /// 0 means the configured default
    pub page_size: i32,
    /// Empty for the first page
    pub page_token: String,
}

/// One page of converted rows
#[derive(Debug, Clone, PartialEq)]
pub struct ListResponse<W> {
    pub items: Vec<W>,
    /// Empty when this is the last page
    pub next_page_token: String,
}

/// A query ready to hand to storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedList {
    pub query: SqlQuery,
    pub order: Order,
    pub page_size: usize,
}

/// Lists one collection
#[derive(Debug, Clone)]
pub struct Lister {
    collection: Collection,
    environment: Environment,
    limits: PageSizeLimits,
    cache: Option<Arc<ExpressionCache>>,
}

impl Lister {
    pub fn new(collection: Collection) -> Self {
        Self::with_config(collection, &QueryConfig::default())
    }

    pub fn with_config(collection: Collection, config: &QueryConfig) -> Self {
        Self {
            collection,
            environment: Environment::new(collection.view()),
            limits: PageSizeLimits::from_config(config),
            cache: None,
        }
    }

    /// Share compiled filters through `cache`
    pub fn with_cache(mut self, cache: Arc<ExpressionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Validate the request and compose its query
    pub fn prepare(&self, request: &ListRequest) -> QueryResult<PreparedList> {
        let order = Order::parse(&request.order_by, self.collection.sortable_fields())?;
        let token = self.decode_token(request, &order)?;
        let scope = self.collection.scope(&request.parent)?;
        let limit = Limit::new(&self.limits, request.page_size)?;

        let mut filter = Filter::new(&self.environment, scope, &request.filter);
        if let Some(cache) = &self.cache {
            filter = filter.with_cache(cache);
        }

        let mut query = SqlQuery::new(self.collection.table());
        query.apply(&Offset::new(&order, token.as_ref().map(|t| &t.last_item)))?;
        query.apply(&filter)?;
        query.apply(&order)?;
        query.apply(&limit)?;

        Ok(PreparedList {
            query,
            order,
            page_size: limit.page_size(),
        })
    }

    fn decode_token(&self, request: &ListRequest, order: &Order) -> QueryResult<Option<PageToken>> {
        let result = PageToken::decode(&request.page_token)
            .map_err(QueryError::from)
            .and_then(|token| match token {
                Some(token) => {
                    token.check_continuity(&request.parent, &request.filter, order)?;
                    Ok(Some(token))
                }
                None => Ok(None),
            });
        if let Err(err) = &result {
            log_event_with_fields(
                Event::PageTokenRejected,
                &[("collection", self.collection.name()), ("error", &err.to_string())],
            );
        }
        result
    }

    /// List one page
    pub fn list<R, W, S, F>(
        &self,
        ctx: &RequestContext,
        storage: &S,
        request: &ListRequest,
        convert: F,
    ) -> QueryResult<ListResponse<W>>
    where
        R: PageRow,
        S: Storage<R> + ?Sized,
        F: Fn(&R) -> QueryResult<W>,
    {
        let prepared = self.prepare(request)?;
        let request_id = ctx.request_id.to_string();

        let mut rows = storage.query(ctx, &prepared.query).map_err(|err| {
            log_event_with_fields(
                Event::StorageFailed,
                &[
                    ("collection", self.collection.name()),
                    ("error", &err.to_string()),
                    ("request_id", &request_id),
                ],
            );
            QueryError::from(err)
        })?;

        let has_more = rows.len() > prepared.page_size;
        rows.truncate(prepared.page_size);

        let items = rows.iter().map(&convert).collect::<QueryResult<Vec<W>>>()?;

        let next_page_token = match rows.last() {
            Some(last) if has_more => self.next_token(request, &prepared.order, last)?,
            _ => String::new(),
        };

        log_event_with_fields(
            Event::PageListed,
            &[
                ("collection", self.collection.name()),
                ("has_more", if has_more { "true" } else { "false" }),
                ("items", &items.len().to_string()),
                ("request_id", &request_id),
            ],
        );

        Ok(ListResponse {
            items,
            next_page_token,
        })
    }

    fn next_token<R: PageRow>(
        &self,
        request: &ListRequest,
        order: &Order,
        last: &R,
    ) -> QueryResult<String> {
        let order_by = if order.is_custom() {
            let value = last.order_value(&order.column_name).ok_or_else(|| {
                QueryError::Internal(format!(
                    "row {} has no value for order column {}",
                    last.unique_id(),
                    order.column_name
                ))
            })?;
            Some(OrderValue {
                field_name: order.field_name.clone(),
                value,
                direction: order.direction,
            })
        } else {
            None
        };

        let token = PageToken {
            parent: request.parent.clone(),
            filter: request.filter.clone(),
            last_item: LastItem {
                uid: last.unique_id().to_string(),
                order_by,
            },
        };
        Ok(token.encode()?)
    }
}

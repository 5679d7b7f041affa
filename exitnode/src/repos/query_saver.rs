use shared::models::query::{Query, QueryResult};
use shared::utilities::errors::AppError;
use sqlx::PgPool;

use super::query::QueryRepository;

/// Ambient identity hydrated onto a query record before it is first
/// persisted. Fields already set by the driver are never overwritten.
#[derive(Debug, Clone, Default)]
pub struct QuerySaverArgs {
    pub project_id: Option<i64>,
    pub region_id: Option<i64>,
    pub exitnode: Option<String>,
}

impl QuerySaverArgs {
    pub fn apply(&self, q: &mut Query) {
        if q.project_id.is_none() {
            q.project_id = self.project_id;
        }
        if q.region_id.is_none() {
            q.region_id = self.region_id;
        }
        if q.exitnode.is_empty() {
            if let Some(exitnode) = &self.exitnode {
                q.exitnode = exitnode.clone();
            }
        }
    }
}

/// Wraps the query repository with ambient identity, so drivers and the
/// query-API helper can save records tagged by project/region/exitnode
/// without threading that context through every call site. Holds its own
/// pool handle (cheap to clone, `sqlx::PgPool` is reference-counted
/// internally) so callers don't need to carry one separately.
#[derive(Clone)]
pub struct QuerySaver {
    pool: PgPool,
    args: QuerySaverArgs,
}

impl QuerySaver {
    pub fn new(pool: PgPool, args: QuerySaverArgs) -> Self {
        QuerySaver { pool, args }
    }

    #[tracing::instrument(name = "query_saver.save", skip(self, query), err)]
    pub async fn save(&self, query: &mut Query) -> Result<(), AppError> {
        self.args.apply(query);
        QueryRepository::save(&self.pool, query).await
    }

    pub async fn finish_save_result(&self, query_id: i64, result: &QueryResult) -> Result<(), AppError> {
        QueryRepository::finish_save_result(&self.pool, query_id, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::query::QueryDestination;

    fn pending() -> Query {
        Query::pending(QueryDestination::Api, "url".into(), "d".into(), "POST".into(), "{}".into())
    }

    #[test]
    fn apply_fills_in_unset_identity_fields() {
        let args = QuerySaverArgs {
            project_id: Some(7),
            region_id: Some(3),
            exitnode: Some("exit-1".to_string()),
        };
        let mut q = pending();
        args.apply(&mut q);

        assert_eq!(q.project_id, Some(7));
        assert_eq!(q.region_id, Some(3));
        assert_eq!(q.exitnode, "exit-1");
    }

    #[test]
    fn apply_never_overwrites_fields_already_set() {
        let args = QuerySaverArgs {
            project_id: Some(7),
            region_id: Some(3),
            exitnode: Some("exit-1".to_string()),
        };
        let mut q = pending();
        q.project_id = Some(99);
        q.exitnode = "already-set".to_string();
        args.apply(&mut q);

        assert_eq!(q.project_id, Some(99));
        assert_eq!(q.region_id, Some(3));
        assert_eq!(q.exitnode, "already-set");
    }
}

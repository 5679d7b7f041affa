use shared::models::region::Region;
use shared::utilities::errors::AppError;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::filters::{self, Filter};

pub struct RegionRepository;

impl RegionRepository {
    #[tracing::instrument(name = "region_repository.find", skip(pool, filters), err)]
    pub async fn find(pool: &PgPool, filters: &[Filter]) -> Result<Vec<Region>, AppError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM regions WHERE 1 = 1");
        filters::apply_all(&mut qb, filters);

        let regions = qb.build_query_as::<Region>().fetch_all(pool).await?;
        Ok(regions)
    }
}

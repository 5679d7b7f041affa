use shared::models::project::Project;
use shared::utilities::errors::AppError;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::filters::{self, Filter};

pub struct NewProject {
    pub region_id: i64,
    pub name: String,
    pub provider_project_id: String,
    pub connection_string: String,
    pub created_by_exitnode: String,
    pub pg_version: i32,
    pub provisioner: String,
    pub suspend_timeout_seconds: i32,
    pub current_mode: String,
}

pub struct ProjectRepository;

impl ProjectRepository {
    /// Returns the most recently created project in the region, including
    /// soft-deleted ones — a fresh soft-delete still counts as "recently
    /// touched" for the create-project gap check.
    #[tracing::instrument(name = "project_repository.find_last_created_project", skip(pool), err)]
    pub async fn find_last_created_project(
        pool: &PgPool,
        region_id: i64,
    ) -> Result<Option<Project>, AppError> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT * FROM projects
            WHERE region_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(region_id)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    #[tracing::instrument(name = "project_repository.find_all_by_region", skip(pool), err)]
    pub async fn find_all_by_region(pool: &PgPool, region_id: i64) -> Result<Vec<Project>, AppError> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT * FROM projects
            WHERE region_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(region_id)
        .fetch_all(pool)
        .await?;

        Ok(projects)
    }

    #[tracing::instrument(name = "project_repository.find_random_projects", skip(pool, filters), err)]
    pub async fn find_random_projects(
        pool: &PgPool,
        filters: &[Filter],
        n: i64,
    ) -> Result<Vec<Project>, AppError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT projects.* FROM projects \
             LEFT JOIN regions ON regions.id = projects.region_id \
             WHERE projects.deleted_at IS NULL",
        );
        filters::apply_all(&mut qb, filters);
        qb.push(" ORDER BY RANDOM() LIMIT ");
        qb.push_bind(n);

        let projects = qb.build_query_as::<Project>().fetch_all(pool).await?;
        Ok(projects)
    }

    #[tracing::instrument(name = "project_repository.create", skip(pool, new), err)]
    pub async fn create(pool: &PgPool, new: NewProject) -> Result<Project, AppError> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (
                region_id, name, provider_project_id, connection_string,
                created_by_exitnode, pg_version, provisioner,
                suspend_timeout_seconds, current_mode
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(new.region_id)
        .bind(new.name)
        .bind(new.provider_project_id)
        .bind(new.connection_string)
        .bind(new.created_by_exitnode)
        .bind(new.pg_version)
        .bind(new.provisioner)
        .bind(new.suspend_timeout_seconds)
        .bind(new.current_mode)
        .fetch_one(pool)
        .await?;

        Ok(project)
    }

    /// Soft-deletes a project by setting `deleted_at`. Idempotent: deleting
    /// an already-deleted project just re-stamps the timestamp.
    #[tracing::instrument(name = "project_repository.delete", skip(pool), err)]
    pub async fn delete(pool: &PgPool, project_id: i64) -> Result<Project, AppError> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects SET deleted_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(project_id)
        .fetch_one(pool)
        .await?;

        Ok(project)
    }

    #[tracing::instrument(name = "project_repository.update_mode", skip(pool), err)]
    pub async fn update_mode(
        pool: &PgPool,
        project_id: i64,
        new_mode: &str,
    ) -> Result<Project, AppError> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects SET current_mode = $2, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(new_mode)
        .fetch_one(pool)
        .await?;

        Ok(project)
    }
}


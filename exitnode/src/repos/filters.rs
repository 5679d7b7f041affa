use sqlx::{Postgres, QueryBuilder};

/// A composable SQL predicate applied to a region/project query.
///
/// `Raw` carries operator-supplied SQL (the `REGION_FILTERS` env var, or a
/// rule's `RawProjectFilter` arg) and is trusted only because both sources
/// are configuration, never end-user input. `FieldEq` is built from
/// `shared::models::project::matrix_fields` to reproduce a project's
/// "matrix" of attributes.
#[derive(Debug, Clone)]
pub enum Filter {
    RegionProvider(String),
    Raw(String),
    FieldEq(String, serde_json::Value),
}

impl Filter {
    /// Appends `AND <predicate>` to an in-progress query. Callers are
    /// responsible for starting the `WHERE` clause.
    pub fn push_and(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" AND ");
        match self {
            Filter::RegionProvider(provider) => {
                qb.push("regions.provider = ");
                qb.push_bind(provider.clone());
            }
            Filter::Raw(sql) => {
                qb.push('(');
                qb.push(sql);
                qb.push(')');
            }
            Filter::FieldEq(field, value) => {
                qb.push(format!("{field}::text = "));
                qb.push_bind(json_scalar_to_text(value));
            }
        }
    }
}

/// Renders a JSON scalar the way Postgres would render the same value cast
/// to text, so a `field::text = $1` comparison lines up regardless of the
/// column's native type.
fn json_scalar_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn apply_all(qb: &mut QueryBuilder<'_, Postgres>, filters: &[Filter]) {
    for filter in filters {
        filter.push_and(qb);
    }
}

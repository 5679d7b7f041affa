/// A named, durable monotonic counter. Used to form unique project names per
/// exit node.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Sequence {
    pub key: String,
    pub val: i64,
}

pub mod driver;
pub mod models;
pub mod pgx_conn;
pub mod serverless;
pub mod vercel_sl;

pub use driver::{CloseableDriver, Driver, ManyQueriesDriver};
pub use models::{Name, SingleQuery};
pub use pgx_conn::PgxConnection;
pub use serverless::Serverless;
pub use vercel_sl::VercelSl;

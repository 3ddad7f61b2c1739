pub mod pool;
pub mod repository;
pub mod schema;
pub mod storage;

pub use pool::{create_pool, open_connection, DbPool};
pub use repository::{
    repository_factory, Filter, RawClause, Record, RepositoryRegistry, SqliteRepository,
};
pub use schema::{Field, FieldType, FieldValue, Schema};
pub use storage::Storage;

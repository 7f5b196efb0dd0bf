pub mod memory;
pub mod postgres;
pub mod redis;
pub mod store;

pub use memory::MemoryDatasetStore;
pub use postgres::{create_pool, run_migrations, PgDatasetStore};
pub use self::redis::create_redis_client;
pub use self::redis::Cache;
pub use self::redis::CacheKey;
pub use self::redis::CacheWriterHandle;
pub use store::DatasetStore;

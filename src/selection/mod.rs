pub mod hash;
pub mod pool;
pub mod selector;

pub use hash::string_hash;
pub use pool::{load_pool, FilePoolSource, PoolSource, RestCountriesSource, StaticPoolSource};
pub use selector::{date_key, select_index, DailySelector, DAILY_CACHE_KEY};

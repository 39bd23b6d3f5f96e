//! Data layer: provider adapters, normalization, rate limiting, retry, and
//! multi-source resolution.

pub mod eastmoney;
pub mod local;
pub mod normalize;
pub mod provider;
pub mod rate_limit;
pub mod resolver;
pub mod retry;
pub mod tushare;
pub mod universe;
pub mod validate;

pub use eastmoney::EastmoneyProvider;
pub use local::{FixtureError, LocalCsvProvider};
pub use normalize::{normalize, parse_numeric, IndicatorTable, TableError};
pub use provider::{FetchError, FundamentalsProvider, RawSnapshot};
pub use rate_limit::RateLimiter;
pub use resolver::MultiSourceResolver;
pub use retry::RetryPolicy;
pub use tushare::TushareProvider;
pub use universe::{EntityUniverse, UniverseError};
pub use validate::{Bounds, ValidationFailure, ValidationRules};

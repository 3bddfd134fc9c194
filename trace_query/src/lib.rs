//! Trace fetch layer (§4.2): translates a [`request::FetchSpansRequest`]
//! into an iterator tree over `parquetquery`'s engine and materializes
//! [`tempo_model::Spanset`]s from it.

pub mod error;
pub mod exec;
pub mod nest;
pub mod request;
pub mod resolver;
pub mod value_predicate;

pub use error::{Error, Result};
pub use exec::{FetchSpansExecutor, Pools, Results};
pub use request::{Condition, FetchSpansRequest, Op};
pub use resolver::{ColumnResolver, MapColumnResolver};

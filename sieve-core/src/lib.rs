mod as_value;
mod batch;
mod collection;
mod connection;
mod driver;
mod entity;
mod error;
mod executor;
mod field;
mod join;
mod model;
mod plan;
mod predicate;
mod query;
mod relations;
mod sql_executor;
mod transaction;
mod util;
mod value;
mod writer;

pub use ::anyhow::Context as ErrorContext;
pub use as_value::*;
pub use batch::*;
pub use collection::*;
pub use connection::*;
pub use driver::*;
pub use entity::*;
pub use error::*;
pub use executor::*;
pub use field::*;
pub use join::*;
pub use model::*;
pub use plan::*;
pub use predicate::*;
pub use query::*;
pub use relations::*;
pub use sql_executor::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
pub use writer::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;

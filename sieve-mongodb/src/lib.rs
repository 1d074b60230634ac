mod bson_value;
mod connection;
mod document_plan;
mod driver;

pub use bson_value::*;
pub use connection::*;
pub use document_plan::*;
pub use driver::*;
pub use mongodb::bson;

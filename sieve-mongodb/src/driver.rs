use crate::MongoConnection;
use sieve_core::Driver;

#[derive(Default, Debug, Clone, Copy)]
pub struct MongoDriver;

impl MongoDriver {
    pub const fn new() -> Self {
        Self
    }
}

impl Driver for MongoDriver {
    type Connection = MongoConnection;

    const NAME: &'static str = "mongodb";
}

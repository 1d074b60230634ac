use crate::PostgresConnection;
use sieve_core::Driver;

#[derive(Default, Debug, Clone, Copy)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub const fn new() -> Self {
        Self
    }
}

impl Driver for PostgresDriver {
    type Connection = PostgresConnection;

    const NAME: &'static str = "postgres";
}

mod batches;
mod books;
mod pagination;
mod simple;
#[cfg(not(feature = "disable-transactions"))]
mod transactions;
mod updates;

use crate::{
    batches::batches, books::books, pagination::pagination, simple::simple, updates::updates,
};
use log::LevelFilter;
use sieve::Connection;
use std::env;
#[cfg(not(feature = "disable-transactions"))]
use transactions::transactions;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Runs every scenario against `connection`, then closes it.
pub async fn execute_tests<C: Connection>(mut connection: C) {
    simple(&mut connection).await;
    pagination(&mut connection).await;
    batches(&mut connection).await;
    books(&mut connection).await;
    updates(&mut connection).await;
    #[cfg(not(feature = "disable-transactions"))]
    transactions(&mut connection).await;
    connection
        .disconnect()
        .await
        .expect("Could not disconnect");
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}

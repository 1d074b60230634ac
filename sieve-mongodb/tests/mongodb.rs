
#[cfg(test)]
mod tests {
    use super::init::init;
    use sieve_core::{Connection, Driver, ErrorKind, Executor, ModelCollection};
    use sieve_mongodb::{MongoConnection, MongoDriver};
    use sieve_tests::{execute_tests, init_logs, silent_logs};
    use std::sync::Mutex;

    static MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn mongodb() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let (url, container) = init().await;
        let error_msg = format!("Could not connect to `{url}`");
        let connection = MongoDriver::new().connect(&url).await.expect(&error_msg);
        execute_tests(connection).await;
        drop(container);
    }

    #[tokio::test]
    async fn no_schema_changes_in_transactions() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let (url, container) = init().await;
        let mut connection = MongoConnection::connect(&url)
            .await
            .expect("Could not connect");
        let collection = ModelCollection::new("mongodb_schema");
        let mut transaction = connection.begin().await.expect("Could not begin");
        silent_logs! {
            let result = transaction.delete_schema(&collection).await;
            assert!(matches!(
                result.as_ref().err().and_then(ErrorKind::of),
                Some(ErrorKind::NotSupported(..))
            ));
        }
        transaction.rollback().await.expect("Could not roll back");
        drop(transaction);
        connection
            .delete_schema(&collection)
            .await
            .expect("Dropping outside a transaction works");
        connection.disconnect().await.expect("Could not disconnect");
        drop(container);
    }

    #[tokio::test]
    async fn wrong_url() {
        silent_logs! {
            let result = MongoConnection::connect("postgres://localhost/db").await;
            assert!(matches!(
                result.as_ref().err().and_then(ErrorKind::of),
                Some(ErrorKind::ConnectFailed { .. })
            ));
        }
    }

    #[tokio::test]
    async fn unreachable_server() {
        silent_logs! {
            let result = MongoConnection::connect("mongodb://127.0.0.1:1/none?serverSelectionTimeoutMS=500").await;
            assert!(matches!(
                result.as_ref().err().and_then(ErrorKind::of),
                Some(ErrorKind::ConnectFailed { .. })
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use sieve_core::{
        AsValue, Connection, ErrorKind, GenericSqlWriter, SqlExecutor, SqlWriter, Statement,
    };
    use sieve_sqlite::SqliteConnection;
    use sieve_tests::{init_logs, silent_logs};
    use std::{path::Path, sync::Mutex};
    use tokio::fs;

    static MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn create_database() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/creation.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH)
                .await
                .expect(format!("Failed to remove test database file {}", DB_PATH).as_str());
        }
        assert!(
            !Path::new(DB_PATH).exists(),
            "Database file should not exist before test"
        );
        SqliteConnection::connect(&format!("sqlite://{}?mode=rwc", DB_PATH))
            .await
            .expect("Could not open the database");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
        SqliteConnection::connect(&format!("sqlite://{}?mode=ro", DB_PATH))
            .await
            .expect("Could not open the database");
        fs::remove_file(DB_PATH)
            .await
            .expect(format!("Failed to remove existing test database file {}", DB_PATH).as_str());
        silent_logs! {
            let missing = SqliteConnection::connect(&format!("sqlite://{}?mode=ro", DB_PATH)).await;
            assert!(
                matches!(
                    missing.as_ref().err().and_then(ErrorKind::of),
                    Some(ErrorKind::ConnectFailed { .. })
                ),
                "Should not be able to open in read only unexisting database"
            );
        }
    }

    #[tokio::test]
    async fn wrong_url() {
        silent_logs! {
            let result = SqliteConnection::connect("postgres://some_value").await;
            assert!(matches!(
                result.as_ref().err().and_then(ErrorKind::of),
                Some(ErrorKind::ConnectFailed { .. })
            ));
        };
    }

    #[tokio::test]
    async fn raw_statements() {
        init_logs();
        let mut connection = SqliteConnection::connect("sqlite://:memory:")
            .await
            .expect("Could not open an in memory database");
        let affected = connection
            .execute(Statement::new(
                "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);",
            ))
            .await
            .expect("Could not create the table");
        assert_eq!(affected.rows_affected, 0);
        let affected = connection
            .execute(Statement {
                sql: "INSERT INTO notes (body) VALUES (?), (?);".into(),
                params: vec![
                    String::from("first").as_value(),
                    String::from("second").as_value(),
                ],
            })
            .await
            .expect("Could not insert");
        assert_eq!(affected.rows_affected, 2);
        assert_eq!(affected.last_affected_id, Some(2));
        silent_logs! {
            let several = connection
                .execute(Statement::new("DELETE FROM notes; DELETE FROM notes;"))
                .await;
            assert!(several.is_err());
            let mismatched = connection
                .execute(Statement::new("DELETE FROM notes WHERE id = ?;"))
                .await;
            assert!(mismatched.is_err());
        }
        let mut sql = String::new();
        GenericSqlWriter.write_transaction_begin(&mut sql);
        connection
            .execute(Statement::new(sql))
            .await
            .expect("Could not begin");
        connection.abandon_native();
        connection
            .begin_native()
            .await
            .expect("The abandoned transaction is rolled back");
        connection
            .rollback_native()
            .await
            .expect("Could not roll back");
        connection.disconnect().await.expect("Could not disconnect");
    }
}

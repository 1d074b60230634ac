#[cfg(test)]
mod tests {
    use sieve::{
        Connection, Error, ErrorKind, Executor, FieldDef, Group, ModelDef, ModelRef, Result, Row,
        Transaction, TransactionState, Value, Window,
    };
    use std::time::Duration;
    use tokio::time::timeout;

    /// Connection keeping track of the native transaction calls it receives.
    #[derive(Default)]
    struct Journal {
        calls: Vec<&'static str>,
        rows: u64,
        fail_commit: bool,
        stall: bool,
    }

    impl Executor for Journal {
        async fn fetch_rows(&mut self, _predicate: &Group, _window: Window) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn count_rows(&mut self, _predicate: &Group) -> Result<u64> {
            Ok(self.rows)
        }

        async fn insert_rows(&mut self, _model: &ModelRef, rows: Vec<Row>) -> Result<Vec<Row>> {
            self.rows += rows.len() as u64;
            Ok(rows)
        }

        async fn update_rows(
            &mut self,
            _predicate: &Group,
            _assignments: &[(&str, Value)],
        ) -> Result<u64> {
            Ok(0)
        }

        async fn delete_rows(&mut self, _predicate: &Group) -> Result<u64> {
            Ok(0)
        }

        async fn create_models(&mut self, _models: &[ModelRef]) -> Result<()> {
            Ok(())
        }

        async fn drop_models(&mut self, _models: &[ModelRef]) -> Result<()> {
            Ok(())
        }
    }

    impl Connection for Journal {
        async fn connect(_url: &str) -> Result<Journal> {
            Ok(Journal::default())
        }

        async fn begin_native(&mut self) -> Result<()> {
            self.calls.push("begin");
            Ok(())
        }

        async fn commit_native(&mut self) -> Result<()> {
            self.calls.push("commit");
            if self.stall {
                std::future::pending::<()>().await;
            }
            if self.fail_commit {
                return Err(Error::msg("The backend refused to commit"));
            }
            Ok(())
        }

        async fn rollback_native(&mut self) -> Result<()> {
            self.calls.push("rollback");
            if self.stall {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        fn abandon_native(&mut self) {
            self.calls.push("abandon");
        }
    }

    fn is_state_error<T>(result: &Result<T>) -> bool {
        matches!(
            result.as_ref().err().and_then(ErrorKind::of),
            Some(ErrorKind::TransactionStateError(..))
        )
    }

    #[tokio::test]
    async fn explicit_commit_and_rollback() {
        let mut connection = Journal::connect("journal://").await.expect("connect");
        {
            let mut transaction = connection.begin().await.expect("Could not begin");
            assert_eq!(transaction.state(), TransactionState::Open);
            assert_eq!(transaction.depth(), 0);
            transaction.open().await.expect("Opening twice does nothing");
            assert_eq!(
                transaction.count_rows(&Group::new()).await.expect("count"),
                0
            );
            transaction.commit().await.expect("Could not commit");
            assert_eq!(transaction.state(), TransactionState::Committed);
            assert!(is_state_error(&transaction.commit().await));
            assert!(is_state_error(&transaction.rollback().await));
            assert!(is_state_error(&transaction.count_rows(&Group::new()).await));
            assert!(is_state_error(&transaction.open().await));
        }
        {
            let mut transaction = connection.begin().await.expect("Could not begin");
            transaction.rollback().await.expect("Could not roll back");
            assert_eq!(transaction.state(), TransactionState::RolledBack);
        }
        assert_eq!(connection.calls, ["begin", "commit", "begin", "rollback"]);

        let mut unopened = Transaction::new(&mut connection);
        assert_eq!(unopened.state(), TransactionState::Unopened);
        assert!(is_state_error(&unopened.commit().await));
        assert!(is_state_error(&unopened.begin().await.map(|_| ())));
        drop(unopened);
        assert_eq!(connection.calls.len(), 4);
    }

    #[tokio::test]
    async fn dropped_while_open() {
        let mut connection = Journal::default();
        {
            let _transaction = connection.begin().await.expect("Could not begin");
        }
        assert_eq!(connection.calls, ["begin", "abandon"]);

        // A closed transaction leaves nothing to abandon
        {
            let mut transaction = connection.begin().await.expect("Could not begin");
            transaction.commit().await.expect("Could not commit");
        }
        assert_eq!(connection.calls, ["begin", "abandon", "begin", "commit"]);
    }

    #[tokio::test]
    async fn nested_transactions_reach_the_backend_once() {
        let mut connection = Journal::default();
        {
            let mut outer = connection.begin().await.expect("Could not begin");
            {
                let mut inner = outer.begin().await.expect("Could not nest");
                assert_eq!(inner.depth(), 1);
                let mut deepest = inner.begin().await.expect("Could not nest");
                assert_eq!(deepest.depth(), 2);
                deepest.commit().await.expect("Could not commit the deepest");
                drop(deepest);
                inner.commit().await.expect("Could not commit the inner");
            }
            assert!(!outer.is_poisoned());
            outer.commit().await.expect("Could not commit the outer");
        }
        assert_eq!(connection.calls, ["begin", "commit"]);
    }

    #[tokio::test]
    async fn inner_rollback_poisons_the_tree() {
        let mut connection = Journal::default();
        {
            let mut outer = connection.begin().await.expect("Could not begin");
            {
                let mut inner = outer.begin().await.expect("Could not nest");
                inner.rollback().await.expect("Could not roll back the inner");
                assert!(inner.is_poisoned());
            }
            assert!(outer.is_poisoned());
            assert!(outer.is_open());
            let error = outer.commit().await.expect_err("The tree is poisoned");
            assert!(matches!(
                ErrorKind::of(&error),
                Some(ErrorKind::TransactionStateError(..))
            ));
            assert_eq!(outer.state(), TransactionState::RolledBack);
        }
        assert_eq!(connection.calls, ["begin", "rollback"]);

        // Dropping an open nested transaction poisons as well
        {
            let mut outer = connection.begin().await.expect("Could not begin");
            {
                let _inner = outer.begin().await.expect("Could not nest");
            }
            assert!(outer.is_poisoned());
            assert!(outer.commit().await.is_err());
        }
        assert_eq!(connection.calls[2..], ["begin", "rollback"]);
    }

    #[tokio::test]
    async fn scoped_bodies() {
        let mut connection = Journal::default();
        let model = ModelDef::builder("note")
            .fields([FieldDef::of::<i64>("id")])
            .build()
            .expect("Could not declare the note model");
        let seen = connection
            .transaction(async |transaction: &mut Transaction<'_, Journal>| -> Result<u64> {
                let rows = vec![
                    Row::from([Value::Int64(Some(1))]),
                    Row::from([Value::Int64(Some(2))]),
                ];
                transaction.insert_rows(&model, rows).await?;
                transaction.count_rows(&Group::new()).await
            })
            .await
            .expect("Could not run the scoped transaction");
        assert_eq!(seen, 2);
        assert_eq!(connection.calls, ["begin", "commit"]);

        let failed = connection
            .transaction(async |_: &mut Transaction<'_, Journal>| -> Result<()> {
                Err(Error::msg("The body gave up"))
            })
            .await;
        assert_eq!(
            failed.expect_err("The body failed").to_string(),
            "The body gave up"
        );
        assert_eq!(connection.calls[2..], ["begin", "rollback"]);

        // Closed by the body, nothing left to do on the way out
        connection
            .transaction(async |transaction: &mut Transaction<'_, Journal>| -> Result<()> {
                transaction.rollback().await
            })
            .await
            .expect("Could not run the scoped transaction");
        assert_eq!(connection.calls[4..], ["begin", "rollback"]);

        // Nested bodies commit into the outer one
        connection
            .transaction(async |outer: &mut Transaction<'_, Journal>| -> Result<()> {
                outer
                    .transaction(async |inner: &mut Transaction<'_, Journal>| -> Result<()> {
                        assert_eq!(inner.depth(), 1);
                        Ok(())
                    })
                    .await?;
                assert!(!outer.is_poisoned());
                Ok(())
            })
            .await
            .expect("Could not run the nested transactions");
        assert_eq!(connection.calls[6..], ["begin", "commit"]);
    }

    #[tokio::test]
    async fn native_failures_are_classified() {
        let mut connection = Journal {
            fail_commit: true,
            ..Default::default()
        };
        let mut transaction = connection.begin().await.expect("Could not begin");
        let error = transaction.commit().await.expect_err("The backend refuses");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::OperationFailed { .. })
        ));
        assert_eq!(transaction.state(), TransactionState::Committed);
    }

    #[tokio::test]
    async fn abandoned_commit_and_rollback() {
        let mut connection = Journal {
            stall: true,
            ..Default::default()
        };
        {
            let mut transaction = connection.begin().await.expect("Could not begin");
            let elapsed = timeout(Duration::from_millis(20), transaction.commit()).await;
            assert!(elapsed.is_err());
            assert!(transaction.is_open());
        }
        assert_eq!(connection.calls, ["begin", "commit", "abandon"]);

        {
            let mut transaction = connection.begin().await.expect("Could not begin");
            let elapsed = timeout(Duration::from_millis(20), transaction.rollback()).await;
            assert!(elapsed.is_err());
            assert_eq!(transaction.state(), TransactionState::Open);
        }
        assert_eq!(connection.calls[3..], ["begin", "rollback", "abandon"]);
    }
}

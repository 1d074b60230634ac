use sieve::{
    AsValue, Connection, Entity, Error, ErrorKind, Executor, FieldDef, ModelCollection, ModelDef,
    ModelRef, Result, Row, RowDecode, Transaction, TransactionState, Value, when,
};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

static COLLECTION: LazyLock<ModelCollection> =
    LazyLock::new(|| ModelCollection::new("transactions"));

static ENTRY: LazyLock<ModelRef> = LazyLock::new(|| {
    ModelDef::builder("entry")
        .storage_name("transaction_entries")
        .fields([
            FieldDef::of::<i64>("id").key(),
            FieldDef::of::<String>("memo"),
            FieldDef::of::<i32>("amount"),
        ])
        .collection(&COLLECTION)
        .build()
        .expect("Could not declare the entry model")
});

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    id: i64,
    memo: String,
    amount: i32,
}

impl Entity for Entry {
    fn model() -> &'static ModelRef {
        &ENTRY
    }

    fn row(&self) -> Row {
        vec![
            self.id.as_value(),
            self.memo.clone().as_value(),
            self.amount.as_value(),
        ]
        .into_boxed_slice()
    }

    fn from_row(row: Row) -> Result<Self> {
        Ok(Self {
            id: row.decode(0)?,
            memo: row.decode(1)?,
            amount: row.decode(2)?,
        })
    }

    fn assign(&mut self, _field: &FieldDef, _value: Value) -> Result<()> {
        Ok(())
    }
}

fn entry(id: i64, memo: &str) -> Entry {
    Entry {
        id,
        memo: memo.into(),
        amount: id as i32 * 10,
    }
}

fn is_state_error<T>(result: &Result<T>) -> bool {
    matches!(
        result.as_ref().err().and_then(ErrorKind::of),
        Some(ErrorKind::TransactionStateError(..))
    )
}

async fn stored<X: Executor>(executor: &mut X, ids: &[i64]) -> u64 {
    let model = Entry::model();
    let group = ids.iter().fold(when(model), |group, &id| {
        group.or(model.field("id").equals(id))
    });
    executor.count(&group).await.expect("Could not count the entries")
}

pub async fn transactions<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let model = Entry::model();

    // Setup
    connection
        .delete_schema(&COLLECTION)
        .await
        .expect("Could not drop the transaction models");
    connection
        .apply_schema(&COLLECTION)
        .await
        .expect("Could not create the transaction models");

    // Rolled back explicitly
    {
        let mut transaction = connection.begin().await.expect("Could not begin");
        assert_eq!(transaction.state(), TransactionState::Open);
        transaction
            .add(&mut [entry(1, "rolled back")])
            .await
            .expect("Could not add inside the transaction");
        assert_eq!(stored(&mut transaction, &[1]).await, 1);
        transaction.rollback().await.expect("Could not roll back");
        assert_eq!(transaction.state(), TransactionState::RolledBack);
        assert!(is_state_error(&transaction.count(&when(model)).await));
        assert!(is_state_error(&transaction.commit().await));
    }
    assert_eq!(stored(connection, &[1]).await, 0);

    // Committed explicitly
    {
        let mut transaction = connection.begin().await.expect("Could not begin");
        transaction
            .add(&mut [entry(2, "committed"), entry(3, "committed")])
            .await
            .expect("Could not add inside the transaction");
        transaction.commit().await.expect("Could not commit");
        assert!(is_state_error(&transaction.rollback().await));
    }
    assert_eq!(stored(connection, &[2, 3]).await, 2);

    // A failing body rolls back
    let failed = connection
        .transaction(async |transaction: &mut Transaction<'_, C>| -> Result<()> {
            transaction.add(&mut [entry(4, "failed body")]).await?;
            Err(Error::msg("The body gave up"))
        })
        .await;
    assert!(failed.is_err());
    assert_eq!(stored(connection, &[4]).await, 0);

    // A succeeding body commits and hands its value back
    let seen = connection
        .transaction(async |transaction: &mut Transaction<'_, C>| -> Result<u64> {
            transaction.add(&mut [entry(5, "scoped")]).await?;
            transaction.count(&when(model)).await
        })
        .await
        .expect("Could not run the scoped transaction");
    assert_eq!(seen, 3);
    assert_eq!(stored(connection, &[5]).await, 1);

    // Dropped while open, the connection stays usable and nothing is kept
    {
        let mut transaction = connection.begin().await.expect("Could not begin");
        transaction
            .add(&mut [entry(6, "abandoned")])
            .await
            .expect("Could not add inside the transaction");
    }
    assert_eq!(stored(connection, &[6]).await, 0);
    assert_eq!(
        connection.count(&when(model)).await.expect("count"),
        3,
        "Only the committed entries are stored"
    );

    #[cfg(not(feature = "disable-nested-transactions"))]
    nested(connection).await;
}

#[cfg(not(feature = "disable-nested-transactions"))]
async fn nested<C: Connection>(connection: &mut C) {
    // Both levels commit
    {
        let mut outer = connection.begin().await.expect("Could not begin");
        outer
            .add(&mut [entry(10, "outer")])
            .await
            .expect("Could not add in the outer transaction");
        {
            let mut inner = outer.begin().await.expect("Could not nest");
            assert_eq!(inner.depth(), 1);
            inner
                .add(&mut [entry(11, "inner")])
                .await
                .expect("Could not add in the inner transaction");
            inner.commit().await.expect("Could not commit the inner");
        }
        outer.commit().await.expect("Could not commit the outer");
    }
    assert_eq!(stored(connection, &[10, 11]).await, 2);

    // The inner rolls back, the outer commit fails and nothing is kept
    {
        let mut outer = connection.begin().await.expect("Could not begin");
        outer
            .add(&mut [entry(20, "outer")])
            .await
            .expect("Could not add in the outer transaction");
        {
            let mut inner = outer.begin().await.expect("Could not nest");
            inner
                .add(&mut [entry(21, "inner")])
                .await
                .expect("Could not add in the inner transaction");
            inner.rollback().await.expect("Could not roll back the inner");
        }
        assert!(outer.is_poisoned());
        let commit = outer.commit().await;
        assert!(is_state_error(&commit));
        assert_eq!(outer.state(), TransactionState::RolledBack);
    }
    assert_eq!(stored(connection, &[20, 21]).await, 0);

    // The inner commits, the outer rolls back
    {
        let mut outer = connection.begin().await.expect("Could not begin");
        outer
            .transaction(async |inner: &mut Transaction<'_, C>| -> Result<()> {
                inner.add(&mut [entry(31, "inner")]).await
            })
            .await
            .expect("Could not run the nested transaction");
        outer
            .add(&mut [entry(30, "outer")])
            .await
            .expect("Could not add in the outer transaction");
        outer.rollback().await.expect("Could not roll back the outer");
    }
    assert_eq!(stored(connection, &[30, 31]).await, 0);

    // A nested body failing poisons the outer transaction
    let result = connection
        .transaction(async |outer: &mut Transaction<'_, C>| -> Result<()> {
            outer.add(&mut [entry(40, "outer")]).await?;
            let nested = outer
                .transaction(async |inner: &mut Transaction<'_, C>| -> Result<()> {
                    inner.add(&mut [entry(41, "inner")]).await?;
                    Err(Error::msg("The inner body gave up"))
                })
                .await;
            assert!(nested.is_err());
            Ok(())
        })
        .await;
    assert!(is_state_error(&result));
    assert_eq!(stored(connection, &[40, 41]).await, 0);
}

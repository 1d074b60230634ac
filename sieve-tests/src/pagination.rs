use sieve::{
    AsValue, Entity, Executor, FieldDef, ModelCollection, ModelDef, ModelRef, Result, Row,
    RowDecode, Value, when,
};
use std::{collections::BTreeSet, sync::LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

static COLLECTION: LazyLock<ModelCollection> =
    LazyLock::new(|| ModelCollection::new("pagination"));

static ITEM: LazyLock<ModelRef> = LazyLock::new(|| {
    ModelDef::builder("item")
        .storage_name("pagination_items")
        .fields([
            FieldDef::of::<i64>("id").key(),
            FieldDef::of::<String>("label"),
            FieldDef::of::<i32>("bucket"),
        ])
        .collection(&COLLECTION)
        .build()
        .expect("Could not declare the item model")
});

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: i64,
    label: String,
    bucket: i32,
}

impl Entity for Item {
    fn model() -> &'static ModelRef {
        &ITEM
    }

    fn row(&self) -> Row {
        vec![
            self.id.as_value(),
            self.label.clone().as_value(),
            self.bucket.as_value(),
        ]
        .into_boxed_slice()
    }

    fn from_row(row: Row) -> Result<Self> {
        Ok(Self {
            id: row.decode(0)?,
            label: row.decode(1)?,
            bucket: row.decode(2)?,
        })
    }

    fn assign(&mut self, field: &FieldDef, value: Value) -> Result<()> {
        if field.name == "id" {
            self.id = AsValue::try_from_value(value)?;
        }
        Ok(())
    }
}

pub async fn pagination<X: Executor>(executor: &mut X) {
    let _lock = MUTEX.lock().await;
    let model = Item::model();

    // Setup
    executor
        .delete_schema(&COLLECTION)
        .await
        .expect("Could not drop the pagination models");
    executor
        .apply_schema(&COLLECTION)
        .await
        .expect("Could not create the pagination models");

    // Inserted out of order so that storage order does not match the sort
    let mut items = (1..=20)
        .rev()
        .map(|i| Item {
            id: i,
            label: format!("item {:02}", i),
            bucket: (i % 3) as i32,
        })
        .collect::<Vec<_>>();
    executor.add(&mut items).await.expect("Could not add the items");

    // Pages partition the rows
    let sorted = when(model).sort([model.field("id").asc()]);
    let mut seen = BTreeSet::new();
    for page in 0..4 {
        let rows = executor
            .fetch::<Item>(&sorted.clone().limit(5, page))
            .get()
            .await
            .expect("Could not fetch a page");
        assert_eq!(rows.len(), 5, "Page {} must be full", page);
        let ids = rows.iter().map(|v| v.id).collect::<Vec<_>>();
        let expected = ((page as i64 * 5 + 1)..=(page as i64 * 5 + 5)).collect::<Vec<_>>();
        assert_eq!(ids, expected);
        for id in ids {
            assert!(seen.insert(id), "Row {} is on two pages", id);
        }
    }
    assert_eq!(seen, (1..=20).collect::<BTreeSet<_>>());
    let past_the_end = executor
        .fetch::<Item>(&sorted.clone().limit(5, 4))
        .get()
        .await
        .expect("Could not fetch past the last page");
    assert!(past_the_end.is_empty());

    // A limit larger than the batch size
    let descending = executor
        .fetch::<Item>(&when(model).sort([model.field("id").desc()]).limit(12, 0))
        .batch_size(5)
        .get()
        .await
        .expect("Could not fetch in small batches");
    assert_eq!(
        descending.iter().map(|v| v.id).collect::<Vec<_>>(),
        (9..=20).rev().collect::<Vec<_>>()
    );

    // Two sort keys, the second breaks ties of the first
    let by_bucket = executor
        .fetch::<Item>(
            &when(model.field("bucket").not_equals(0))
                .sort([model.field("bucket").desc(), model.field("id").asc()])
                .limit(4, 1),
        )
        .get()
        .await
        .expect("Could not fetch by bucket");
    assert_eq!(
        by_bucket.iter().map(|v| v.id).collect::<Vec<_>>(),
        vec![14, 17, 20, 1]
    );

    // Counting ignores paging
    assert_eq!(
        executor
            .count(&sorted.clone().limit(5, 1))
            .await
            .expect("Could not count"),
        20
    );
}

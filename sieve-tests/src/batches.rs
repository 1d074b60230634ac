use sieve::{
    AsValue, Entity, Executor, FieldDef, ModelCollection, ModelDef, ModelRef, Result, ResultExt,
    Row, RowDecode, Value,
    stream::{StreamExt, TryStreamExt},
    when,
};
use std::{pin::pin, sync::LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

static COLLECTION: LazyLock<ModelCollection> = LazyLock::new(|| ModelCollection::new("batches"));

static READING: LazyLock<ModelRef> = LazyLock::new(|| {
    ModelDef::builder("reading")
        .storage_name("batch_readings")
        .fields([
            FieldDef::of::<i64>("id"),
            FieldDef::of::<String>("sensor"),
            FieldDef::of::<f64>("value"),
        ])
        .collection(&COLLECTION)
        .build()
        .expect("Could not declare the reading model")
});

#[derive(Debug, Clone, PartialEq)]
struct Reading {
    id: Option<i64>,
    sensor: String,
    value: f64,
}

impl Entity for Reading {
    fn model() -> &'static ModelRef {
        &READING
    }

    fn row(&self) -> Row {
        vec![
            self.id.as_value(),
            self.sensor.clone().as_value(),
            self.value.as_value(),
        ]
        .into_boxed_slice()
    }

    fn from_row(row: Row) -> Result<Self> {
        Ok(Self {
            id: row.decode(0)?,
            sensor: row.decode(1)?,
            value: row.decode(2)?,
        })
    }

    fn assign(&mut self, field: &FieldDef, value: Value) -> Result<()> {
        if field.name == "id" {
            self.id = AsValue::try_from_value(value)?;
        }
        Ok(())
    }
}

const READINGS: usize = 230;

pub async fn batches<X: Executor>(executor: &mut X) {
    let _lock = MUTEX.lock().await;
    let model = Reading::model();

    // Setup
    executor
        .delete_schema(&COLLECTION)
        .await
        .expect("Could not drop the batch models");
    executor
        .apply_schema(&COLLECTION)
        .await
        .expect("Could not create the batch models");
    let mut readings = (0..READINGS)
        .map(|i| Reading {
            id: None,
            sensor: if i % 2 == 0 { "north" } else { "south" }.into(),
            value: i as f64 / 4.0,
        })
        .collect::<Vec<_>>();
    executor
        .add(&mut readings)
        .await
        .expect("Could not add the readings");

    // Everything, more rows than one batch holds
    let all = executor
        .fetch::<Reading>(&when(model).sort([model.field("value").asc()]))
        .get()
        .await
        .expect("Could not fetch every reading");
    assert_eq!(all, readings);
    assert_eq!(
        executor.count(&when(model)).await.expect("Could not count"),
        READINGS as u64
    );

    // Batch by batch, then nothing once exhausted
    let mut batches = executor.fetch::<Reading>(&when(model).sort([model.field("id").asc()]));
    let mut sizes = Vec::new();
    loop {
        let batch = batches.next_batch().await.expect("Could not pull a batch");
        if batch.is_empty() {
            break;
        }
        sizes.push(batch.len());
    }
    assert_eq!(sizes, vec![100, 100, 30]);
    assert!(batches.state().is_exhausted());
    assert!(
        batches
            .next_batch()
            .await
            .expect("An exhausted sequence does not fail")
            .is_empty()
    );

    // The caller window bounds the batches
    let mut bounded = executor.fetch::<Reading>(
        &when(model.field("sensor").equals("north"))
            .sort([model.field("id").asc()])
            .limit(60, 1),
    );
    let first = bounded.next_batch().await.expect("Could not pull a batch");
    let second = bounded.next_batch().await.expect("Could not pull a batch");
    assert_eq!(first.len(), 55);
    assert!(second.is_empty());
    assert_eq!(first[0].value, readings[120].value);

    // Streaming pulls batches underneath
    let stream = executor
        .fetch::<Reading>(&when(model.field("sensor").equals("south")))
        .batch_size(40)
        .into_stream();
    let south = stream.try_collect::<Vec<_>>().await.expect("Could not stream");
    assert_eq!(south.len(), READINGS / 2);
    assert!(south.iter().all(|r| r.sensor == "south"));
    {
        let mut stream = pin!(
            executor
                .fetch::<Reading>(&when(model).sort([model.field("value").desc()]))
                .into_stream()
        );
        let top = stream
            .next()
            .await
            .expect("The stream has items")
            .expect("Could not read the first item");
        assert_eq!(top, readings[READINGS - 1]);
    }

    // Single item
    let lowest = executor
        .one::<Reading>(&when(model).sort([model.field("value").asc()]))
        .await
        .expect("Could not fetch one reading");
    assert_eq!(lowest, readings[0]);
    assert!(
        executor
            .one::<Reading>(&when(model.field("value").lt(0)))
            .await
            .is_empty_result()
    );
}

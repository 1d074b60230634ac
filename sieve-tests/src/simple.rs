use rust_decimal::Decimal;
use sieve::{
    AsValue, CompareOp, Comparison, Entity, ErrorKind, Executor, FieldDef, ModelCollection,
    ModelDef, ModelRef, Result, ResultExt, Row, RowDecode, Value, when,
};
use std::sync::LazyLock;
use time::{
    Date, PrimitiveDateTime,
    macros::{date, datetime},
};
use tokio::sync::Mutex;
use uuid::Uuid;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

static COLLECTION: LazyLock<ModelCollection> = LazyLock::new(|| ModelCollection::new("simple"));

static SAMPLE: LazyLock<ModelRef> = LazyLock::new(|| {
    ModelDef::builder("sample")
        .storage_name("simple_samples")
        .fields([
            FieldDef::of::<i64>("id"),
            FieldDef::of::<bool>("flag"),
            FieldDef::of::<i16>("small"),
            FieldDef::of::<i32>("count"),
            FieldDef::of::<f64>("ratio"),
            FieldDef::of::<Decimal>("price"),
            FieldDef::of::<String>("name").store_as("sample_name"),
            FieldDef::of::<String>("note").nullable(),
            FieldDef::of::<Date>("day"),
            FieldDef::of::<PrimitiveDateTime>("at"),
            FieldDef::of::<Uuid>("token"),
            FieldDef::of::<Box<[u8]>>("payload").nullable(),
        ])
        .collection(&COLLECTION)
        .build()
        .expect("Could not declare the sample model")
});

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: Option<i64>,
    pub flag: bool,
    pub small: i16,
    pub count: i32,
    pub ratio: f64,
    pub price: Decimal,
    pub name: String,
    pub note: Option<String>,
    pub day: Date,
    pub at: PrimitiveDateTime,
    pub token: Uuid,
    pub payload: Option<Box<[u8]>>,
}

impl Entity for Sample {
    fn model() -> &'static ModelRef {
        &SAMPLE
    }

    fn row(&self) -> Row {
        vec![
            self.id.as_value(),
            self.flag.as_value(),
            self.small.as_value(),
            self.count.as_value(),
            self.ratio.as_value(),
            self.price.as_value(),
            self.name.clone().as_value(),
            self.note.clone().as_value(),
            self.day.as_value(),
            self.at.as_value(),
            self.token.as_value(),
            self.payload.clone().as_value(),
        ]
        .into_boxed_slice()
    }

    fn from_row(row: Row) -> Result<Self> {
        Ok(Self {
            id: row.decode(0)?,
            flag: row.decode(1)?,
            small: row.decode(2)?,
            count: row.decode(3)?,
            ratio: row.decode(4)?,
            price: row.decode(5)?,
            name: row.decode(6)?,
            note: row.decode(7)?,
            day: row.decode(8)?,
            at: row.decode(9)?,
            token: row.decode(10)?,
            payload: row.decode(11)?,
        })
    }

    fn assign(&mut self, field: &FieldDef, value: Value) -> Result<()> {
        if field.name == "id" {
            self.id = AsValue::try_from_value(value)?;
        }
        Ok(())
    }
}

fn samples() -> Vec<Sample> {
    vec![
        Sample {
            id: None,
            flag: true,
            small: -12,
            count: 1_000_000,
            ratio: 0.25,
            price: Decimal::new(1234, 2),
            name: "üöÄ Emoji test 🔥".into(),
            note: Some("it's \"quoted\"".into()),
            day: date!(2024 - 02 - 29),
            at: datetime!(2024-02-29 13:45:10),
            token: Uuid::parse_str("5b4a0c6f-4f54-4a4b-9e2b-51a8f2f1b0c1").expect("valid uuid"),
            payload: Some(vec![0u8, 1, 2, 254, 255].into()),
        },
        Sample {
            id: None,
            flag: false,
            small: 7,
            count: -3,
            ratio: 1e-9,
            price: Decimal::new(-5, 1),
            name: "plain".into(),
            note: None,
            day: date!(1970 - 01 - 01),
            at: datetime!(1999-12-31 23:59:59),
            token: Uuid::new_v4(),
            payload: None,
        },
        Sample {
            id: None,
            flag: true,
            small: 0,
            count: 42,
            ratio: -7.5,
            price: Decimal::ZERO,
            name: "汉字 and ascii".into(),
            note: None,
            day: date!(2001 - 09 - 11),
            at: datetime!(2001-09-11 08:46:00),
            token: Uuid::new_v4(),
            payload: None,
        },
    ]
}

pub async fn simple<X: Executor>(executor: &mut X) {
    let _lock = MUTEX.lock().await;
    let model = Sample::model();

    // Setup
    executor
        .delete_schema(&COLLECTION)
        .await
        .expect("Could not drop the simple models");
    executor
        .apply_schema(&COLLECTION)
        .await
        .expect("Could not create the simple models");
    assert_eq!(executor.count(&when(model)).await.expect("count"), 0);

    // Insert, keys are generated
    let mut samples = samples();
    executor.add(&mut samples).await.expect("Could not add the samples");
    assert!(samples.iter().all(|s| s.id.is_some()));
    let mut ids = samples.iter().filter_map(|s| s.id).collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3, "Generated keys must be distinct");
    assert_eq!(executor.count(&when(model)).await.expect("count"), 3);

    // Unicode text round trip through a filter
    let fetched = executor
        .one::<Sample>(&when(model.field("name").equals("üöÄ Emoji test 🔥")))
        .await
        .expect("Could not fetch the unicode sample");
    assert_eq!(fetched, samples[0]);

    // Every field round trips through the key
    for sample in &samples {
        let fetched = executor
            .one::<Sample>(&sample.identity())
            .await
            .expect("Could not fetch a sample by key");
        assert_eq!(&fetched, sample);
    }

    // Null checks
    let without_note = executor
        .fetch::<Sample>(&when(model.field("note").is_null()).sort([model.field("id").asc()]))
        .get()
        .await
        .expect("Could not fetch the samples without note");
    assert_eq!(
        without_note.iter().map(|s| s.id).collect::<Vec<_>>(),
        vec![samples[1].id, samples[2].id]
    );
    assert_eq!(
        executor
            .count(&when(model.field("note").equals(Value::Varchar(None))))
            .await
            .expect("count"),
        2
    );
    assert_eq!(
        executor
            .count(&when(model.field("note").is_not_null()))
            .await
            .expect("count"),
        1
    );

    // Comparisons with the literal on either side
    let positive = executor
        .count(&when(model.field("count").gt(0)))
        .await
        .expect("count");
    assert_eq!(positive, 2);
    let flipped = Comparison::new(0, CompareOp::Lt, model.field("count"));
    assert_eq!(executor.count(&when(flipped)).await.expect("count"), positive);
    assert_eq!(
        executor
            .count(&when(model.field("flag").equals(true)).and(model.field("small").lte(0)))
            .await
            .expect("count"),
        2
    );

    // Sorting in both directions
    let by_ratio = executor
        .fetch::<Sample>(&when(model).sort([model.field("ratio").desc()]))
        .get()
        .await
        .expect("Could not fetch sorted samples");
    assert_eq!(
        by_ratio.iter().map(|s| s.ratio).collect::<Vec<_>>(),
        vec![0.25, 1e-9, -7.5]
    );

    // Nothing found is an empty list for fetch, an error for one
    let none = executor
        .fetch::<Sample>(&when(model.field("name").equals("missing")))
        .get()
        .await
        .expect("Fetching nothing is not an error");
    assert!(none.is_empty());
    let missing = executor
        .one::<Sample>(&when(model.field("name").equals("missing")))
        .await;
    assert!(missing.is_empty_result());
    assert!(matches!(
        ErrorKind::of(missing.as_ref().expect_err("no sample")),
        Some(ErrorKind::EmptyResult)
    ));
    assert_eq!(
        executor
            .one::<Sample>(&when(model.field("name").equals("missing")))
            .await
            .map(|s| s.count)
            .or_use(-1),
        -1
    );
}

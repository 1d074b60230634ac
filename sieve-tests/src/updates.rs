use sieve::{
    AsValue, Entity, ErrorKind, Executor, FieldDef, ModelCollection, ModelDef, ModelRef, Result,
    ResultExt, Row, RowDecode, Value, when,
};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

static COLLECTION: LazyLock<ModelCollection> = LazyLock::new(|| ModelCollection::new("updates"));

static PROFILE: LazyLock<ModelRef> = LazyLock::new(|| {
    ModelDef::builder("profile")
        .storage_name("update_profiles")
        .fields([
            FieldDef::of::<i64>("id"),
            FieldDef::of::<String>("handle").unique(),
            FieldDef::of::<i32>("score"),
            FieldDef::of::<String>("bio").nullable(),
            FieldDef::of::<bool>("active"),
        ])
        .collection(&COLLECTION)
        .build()
        .expect("Could not declare the profile model")
});

#[derive(Debug, Clone, PartialEq)]
struct Profile {
    id: Option<i64>,
    handle: String,
    score: i32,
    bio: Option<String>,
    active: bool,
}

impl Entity for Profile {
    fn model() -> &'static ModelRef {
        &PROFILE
    }

    fn row(&self) -> Row {
        vec![
            self.id.as_value(),
            self.handle.clone().as_value(),
            self.score.as_value(),
            self.bio.clone().as_value(),
            self.active.as_value(),
        ]
        .into_boxed_slice()
    }

    fn from_row(row: Row) -> Result<Self> {
        Ok(Self {
            id: row.decode(0)?,
            handle: row.decode(1)?,
            score: row.decode(2)?,
            bio: row.decode(3)?,
            active: row.decode(4)?,
        })
    }

    fn assign(&mut self, field: &FieldDef, value: Value) -> Result<()> {
        if field.name == "id" {
            self.id = AsValue::try_from_value(value)?;
        }
        Ok(())
    }
}

fn profile(handle: &str, score: i32) -> Profile {
    Profile {
        id: None,
        handle: handle.into(),
        score,
        bio: Some(format!("Hi, I am {}", handle)),
        active: true,
    }
}

pub async fn updates<X: Executor>(executor: &mut X) {
    let _lock = MUTEX.lock().await;
    let model = Profile::model();

    // Setup
    executor
        .delete_schema(&COLLECTION)
        .await
        .expect("Could not drop the update models");
    executor
        .apply_schema(&COLLECTION)
        .await
        .expect("Could not create the update models");
    let mut profiles = ["ada", "bob", "cyd", "dee", "eve"]
        .into_iter()
        .zip([10, 20, 30, 40, 50])
        .map(|(handle, score)| profile(handle, score))
        .collect::<Vec<_>>();
    executor
        .add(&mut profiles)
        .await
        .expect("Could not add the profiles");

    // Update through a predicate
    let deactivated = executor
        .update(
            &when(model.field("score").gte(30)),
            &[("active", false.as_value())],
        )
        .await
        .expect("Could not deactivate the profiles");
    assert_eq!(deactivated, 3);
    assert_eq!(
        executor
            .count(&when(model.field("active").equals(false)))
            .await
            .expect("count"),
        3
    );
    let nobody = executor
        .update(
            &when(model.field("handle").equals("zed")),
            &[("score", 0.as_value())],
        )
        .await
        .expect("Updating nothing is not an error");
    assert_eq!(nobody, 0);

    // Setting a value to null
    let cleared = executor
        .update(
            &when(model.field("handle").equals("ada")),
            &[("bio", Value::Varchar(None)), ("score", 11.as_value())],
        )
        .await
        .expect("Could not clear the bio");
    assert_eq!(cleared, 1);
    let mut ada = profiles[0].clone();
    ada.reload(executor).await.expect("Could not reload ada");
    assert_eq!(ada.bio, None);
    assert_eq!(ada.score, 11);
    assert_eq!(ada.id, profiles[0].id);

    // Unknown fields are rejected
    let unknown = executor
        .update(&when(model), &[("nickname", Value::Varchar(Some("x".into())))])
        .await;
    assert!(matches!(
        unknown.as_ref().err().and_then(ErrorKind::of),
        Some(ErrorKind::UnknownField { .. })
    ));

    // Save writes every field of the record back
    let mut bob = profiles[1].clone();
    bob.score = 99;
    bob.bio = None;
    bob.active = false;
    assert_eq!(bob.save(executor).await.expect("Could not save bob"), 1);
    let stored = executor
        .one::<Profile>(&bob.identity())
        .await
        .expect("Could not fetch bob");
    assert_eq!(stored, bob);

    // Reload drops local changes
    let mut edited = bob.clone();
    edited.handle = "robert".into();
    edited.score = -1;
    edited.reload(executor).await.expect("Could not reload bob");
    assert_eq!(edited, bob);

    // Delete a single record, then through a predicate
    assert_eq!(
        profiles[2]
            .delete(executor)
            .await
            .expect("Could not delete cyd"),
        1
    );
    assert!(
        executor
            .one::<Profile>(&profiles[2].identity())
            .await
            .is_empty_result()
    );
    let mut gone = profiles[2].clone();
    assert!(gone.reload(executor).await.is_empty_result());
    assert_eq!(
        executor
            .delete(&when(model.field("score").gt(40)))
            .await
            .expect("Could not delete the top scores"),
        2
    );
    let remaining = executor
        .fetch::<Profile>(&when(model).sort([model.field("handle").asc()]))
        .get()
        .await
        .expect("Could not fetch the remaining profiles");
    assert_eq!(
        remaining.iter().map(|p| p.handle.as_str()).collect::<Vec<_>>(),
        vec!["ada", "dee"]
    );

    // An empty filter on a single model deletes everything
    assert_eq!(
        executor
            .delete(&when(model))
            .await
            .expect("Could not delete every profile"),
        2
    );
    assert_eq!(
        executor
            .count(&when(model))
            .await
            .value_or(u64::MAX),
        0
    );
}

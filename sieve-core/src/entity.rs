use crate::{Executor, FieldDef, Group, ModelRef, Result, Row, Value, when};
use std::future::Future;

/// A Rust type stored as the records of a model.
pub trait Entity: Send + Sync + Sized {
    /// Schema descriptor, built once and registered in its collection.
    fn model() -> &'static ModelRef;

    /// Values of every field, in the field order of the model.
    fn row(&self) -> Row;

    fn from_row(row: Row) -> Result<Self>;

    /// Writes back a value generated by the backend, the auto increment key.
    fn assign(&mut self, field: &FieldDef, value: Value) -> Result<()>;

    /// Predicate matching this record: every key field equal to its current value.
    fn identity(&self) -> Group {
        let model = Self::model();
        let row = self.row();
        model
            .primary_key_indices()
            .iter()
            .fold(when(model), |group, &i| {
                let field = &model.fields()[i];
                group.and(model.field(field.name.clone()).equals(row[i].clone()))
            })
    }

    /// Replaces `self` with the stored version of the record.
    fn reload<X: Executor>(&mut self, executor: &mut X) -> impl Future<Output = Result<()>> + Send {
        async move {
            *self = executor.one::<Self>(&self.identity()).await?;
            Ok(())
        }
    }

    /// Stores every non key field, returns the number of records changed.
    fn save<X: Executor>(&self, executor: &mut X) -> impl Future<Output = Result<u64>> + Send {
        async move {
            let model = Self::model();
            let row = self.row();
            let assignments = model
                .fields()
                .iter()
                .zip(row.iter())
                .filter(|(field, _)| !model.primary_key().any(|key| key.name == field.name))
                .map(|(field, value)| (field.name.as_ref(), value.clone()))
                .collect::<Vec<_>>();
            executor.update(&self.identity(), &assignments).await
        }
    }

    /// Deletes the stored record, returns the number of records removed.
    fn delete<X: Executor>(&self, executor: &mut X) -> impl Future<Output = Result<u64>> + Send {
        async move { executor.delete(&self.identity()).await }
    }

    /// Records reached through the relation called `relation`.
    fn fetch_related<X: Executor, R: Entity>(
        &self,
        executor: &mut X,
        relation: &str,
    ) -> impl Future<Output = Result<Vec<R>>> + Send {
        executor.fetch_related::<Self, R>(self, relation)
    }
}

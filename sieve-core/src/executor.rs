use crate::{
    Batches, Entity, ErrorKind, Group, ModelCollection, ModelRef, Operation, RelationKind, Result,
    Row, Value, Window, operation_failed,
};
use std::future::Future;

/// Name of the model a predicate returns, for error messages.
fn target_name(predicate: &Group) -> String {
    predicate
        .models()
        .first()
        .map(|m| m.name().to_string())
        .unwrap_or_default()
}

/// Operations every backend, and every transaction on it, provides.
///
/// Backends implement the row level primitives, the typed operations on top of them are shared.
pub trait Executor: Send + Sized {
    /// Rows of the primary model of `predicate` inside `window`, every field in model order.
    fn fetch_rows(
        &mut self,
        predicate: &Group,
        window: Window,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Number of rows `predicate` matches, paging ignored.
    fn count_rows(&mut self, predicate: &Group) -> impl Future<Output = Result<u64>> + Send;

    /// Stores `rows` of `model` and returns them with the generated keys filled in.
    fn insert_rows(
        &mut self,
        model: &ModelRef,
        rows: Vec<Row>,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Sets the named fields on the rows `predicate` matches, returns how many changed.
    fn update_rows(
        &mut self,
        predicate: &Group,
        assignments: &[(&str, Value)],
    ) -> impl Future<Output = Result<u64>> + Send;

    fn delete_rows(&mut self, predicate: &Group) -> impl Future<Output = Result<u64>> + Send;

    /// Creates the storage of `models` when missing.
    fn create_models(&mut self, models: &[ModelRef]) -> impl Future<Output = Result<()>> + Send;

    fn drop_models(&mut self, models: &[ModelRef]) -> impl Future<Output = Result<()>> + Send;

    /// Batches of the `E` records matching `predicate`.
    fn fetch<E: Entity>(&mut self, predicate: &Group) -> Batches<'_, Self, E> {
        Batches::new(self, predicate.targeting(E::model()))
    }

    /// First matching record, [`ErrorKind::EmptyResult`] when there is none.
    fn one<E: Entity>(&mut self, predicate: &Group) -> impl Future<Output = Result<E>> + Send {
        self.fetch::<E>(predicate).one()
    }

    fn count(&mut self, predicate: &Group) -> impl Future<Output = Result<u64>> + Send {
        async move {
            self.count_rows(predicate)
                .await
                .map_err(|e| operation_failed(e, Operation::Count, &target_name(predicate)))
        }
    }

    /// Stores `entities`, assigning the generated keys back to them.
    fn add<E: Entity>(&mut self, entities: &mut [E]) -> impl Future<Output = Result<()>> + Send {
        async move {
            if entities.is_empty() {
                return Ok(());
            }
            let model = E::model();
            let rows = entities.iter().map(Entity::row).collect::<Vec<_>>();
            let generated = model
                .auto_increment_index()
                .filter(|&i| rows.iter().any(|row| row[i].is_null()));
            let stored = self
                .insert_rows(model, rows)
                .await
                .map_err(|e| operation_failed(e, Operation::Add, model.name()))?;
            if let Some(i) = generated {
                let field = &model.fields()[i];
                for (entity, row) in entities.iter_mut().zip(stored) {
                    if entity.row()[i].is_null() {
                        entity.assign(field, row[i].clone())?;
                    }
                }
            }
            Ok(())
        }
    }

    fn update(
        &mut self,
        predicate: &Group,
        assignments: &[(&str, Value)],
    ) -> impl Future<Output = Result<u64>> + Send {
        async move {
            self.update_rows(predicate, assignments)
                .await
                .map_err(|e| operation_failed(e, Operation::Update, &target_name(predicate)))
        }
    }

    /// Deletes what `predicate` matches. An empty predicate naming a single model deletes all its
    /// records.
    fn delete(&mut self, predicate: &Group) -> impl Future<Output = Result<u64>> + Send {
        async move {
            self.delete_rows(predicate)
                .await
                .map_err(|e| operation_failed(e, Operation::Delete, &target_name(predicate)))
        }
    }

    /// Creates the storage of every model of `collection`, in registration order.
    fn apply_schema(
        &mut self,
        collection: &ModelCollection,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            self.create_models(&collection.models())
                .await
                .map_err(|e| operation_failed(e, Operation::ApplySchema, collection.name()))
        }
    }

    /// Drops the storage of every model of `collection`, in reverse registration order.
    fn delete_schema(
        &mut self,
        collection: &ModelCollection,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            let mut models = collection.models();
            models.reverse();
            self.drop_models(&models)
                .await
                .map_err(|e| operation_failed(e, Operation::DeleteSchema, collection.name()))
        }
    }

    /// Records of `R` related to `entity` through its relation called `relation`.
    fn fetch_related<E: Entity, R: Entity>(
        &mut self,
        entity: &E,
        relation: &str,
    ) -> impl Future<Output = Result<Vec<R>>> + Send {
        async move {
            let model = E::model();
            let Some(relation) = model.relation(relation) else {
                return Err(ErrorKind::UnknownField {
                    model: model.name().to_string(),
                    field: relation.to_string(),
                }
                .into_error());
            };
            let target = relation.target_model(model)?;
            if target != *R::model() {
                return Err(crate::Error::msg(format!(
                    "Relation `{}` of `{}` leads to `{}`, not to `{}`",
                    relation.name,
                    model.name(),
                    target.name(),
                    R::model().name()
                )));
            }
            let mut predicate = relation.predicate(model, &entity.row())?;
            if relation.kind == RelationKind::One {
                predicate = predicate.limit(1, 0);
            }
            self.fetch::<R>(&predicate).get().await
        }
    }
}

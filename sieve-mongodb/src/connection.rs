use crate::{DocumentPlan, MongoDriver, document_field, document_to_row, row_to_document};
use mongodb::{
    Client, ClientSession, Collection, Database, IndexModel,
    bson::{Bson, Document, doc},
    error::{Error as MongoError, ErrorKind as MongoErrorKind},
    options::{ClientOptions, IndexOptions, ReturnDocument},
};
use sieve_core::{
    Connection, Driver, Error, ErrorContext, ErrorKind, Executor, FieldDef, Group, ModelRef,
    Result, Row, Tag, Value, Window, connect_failed, convert_to, expect_scheme,
    stream::TryStreamExt,
};
use std::time::Duration;

/// Database used when the URL names none.
pub const DEFAULT_DATABASE: &str = "sieve";

/// Collection holding the last generated value of every integer key.
pub const COUNTERS: &str = "sieve_counters";

/// MongoDB refuses to create a collection that exists with this code.
const NAMESPACE_EXISTS: i32 = 48;

/// Runs a driver action inside the open transaction, if any.
macro_rules! in_session {
    ($session:expr, $action:expr) => {
        match $session {
            Some(session) => $action.session(&mut *session).await,
            None => $action.await,
        }
    };
}

/// Connection to a MongoDB deployment, transactions need a replica set.
pub struct MongoConnection {
    client: Client,
    database: Database,
    session: Option<ClientSession>,
}

fn counter_name(model: &ModelRef, field: &FieldDef) -> String {
    format!("{}__{}", model.storage_name(), field.storage_name())
}

fn already_exists(error: &MongoError) -> bool {
    matches!(*error.kind, MongoErrorKind::Command(ref e) if e.code == NAMESPACE_EXISTS)
}

fn pipeline_text(pipeline: &[Document]) -> String {
    pipeline
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl MongoConnection {
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, model: &ModelRef) -> Collection<Document> {
        self.database.collection(model.storage_name())
    }

    async fn aggregate(&mut self, model: &ModelRef, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "db.{}.aggregate([{}])",
                model.storage_name(),
                pipeline_text(&pipeline)
            );
        }
        let collection = self.collection(model);
        let documents = match self.session.as_mut() {
            Some(session) => {
                let mut cursor = collection.aggregate(pipeline).session(&mut *session).await?;
                cursor.stream(session).try_collect::<Vec<_>>().await?
            }
            None => collection.aggregate(pipeline).await?.try_collect().await?,
        };
        Ok(documents)
    }

    /// Filter selecting the primary documents matched by `plan`.
    async fn scope(&mut self, plan: &DocumentPlan<'_>) -> Result<Document> {
        if !plan.is_joined() {
            return Ok(plan.filter()?.unwrap_or_default());
        }
        let pipeline = plan.key_pipeline()?;
        let keys = self
            .aggregate(plan.primary(), pipeline)
            .await?
            .into_iter()
            .filter_map(|mut document| document.remove("_id"))
            .collect::<Vec<_>>();
        Ok(doc! { "_id": { "$in": keys } })
    }

    /// Next value of the counter generating the key `field` of `model`.
    async fn next_key(&mut self, model: &ModelRef, field: &FieldDef) -> Result<Value> {
        let name = counter_name(model, field);
        let counters = self.database.collection::<Document>(COUNTERS);
        let action = counters
            .find_one_and_update(doc! { "_id": name.as_str() }, doc! { "$inc": { "seq": 1i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After);
        let counter = in_session!(self.session.as_mut(), action)?
            .with_context(|| format!("Counter `{}` was not returned", name))?;
        let next = counter.get_i64("seq")?;
        convert_to(Value::Int64(Some(next)), &field.value_type)
    }

    async fn create_indexes(&mut self, model: &ModelRef) -> Result<()> {
        let mut indexes = Vec::new();
        let key = model.primary_key_indices();
        if key.len() > 1 {
            let mut keys = Document::new();
            for &index in key {
                keys.insert(document_field(model, index), 1);
            }
            indexes.push(keys);
        }
        for (index, field) in model.fields().iter().enumerate() {
            let name = document_field(model, index);
            if field.tags.has(Tag::Unique) && name != "_id" {
                let mut keys = Document::new();
                keys.insert(name, 1);
                indexes.push(keys);
            }
        }
        let collection = self.collection(model);
        for keys in indexes {
            log::debug!("db.{}.createIndex({}, {{ unique: true }})", model.storage_name(), keys);
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            in_session!(self.session.as_mut(), collection.create_index(index))?;
        }
        Ok(())
    }
}

impl Executor for MongoConnection {
    async fn fetch_rows(&mut self, predicate: &Group, window: Window) -> Result<Vec<Row>> {
        let plan = DocumentPlan::new(predicate)?.with_window(window);
        let pipeline = plan.fetch_pipeline()?;
        let model = plan.primary().clone();
        let documents = self.aggregate(&model, pipeline).await?;
        documents
            .iter()
            .map(|document| document_to_row(&model, document))
            .collect()
    }

    async fn count_rows(&mut self, predicate: &Group) -> Result<u64> {
        let plan = DocumentPlan::new(predicate)?;
        let pipeline = plan.count_pipeline()?;
        let model = plan.primary().clone();
        let documents = self.aggregate(&model, pipeline).await?;
        let count = match documents.first().and_then(|d| d.get("count")) {
            Some(Bson::Int32(v)) => u64::try_from(*v)?,
            Some(Bson::Int64(v)) => u64::try_from(*v)?,
            _ => 0,
        };
        Ok(count)
    }

    async fn insert_rows(&mut self, model: &ModelRef, rows: Vec<Row>) -> Result<Vec<Row>> {
        if rows.is_empty() {
            return Ok(rows);
        }
        let generated = model.auto_increment_index();
        let mut result = Vec::with_capacity(rows.len());
        let mut documents = Vec::with_capacity(rows.len());
        for mut row in rows {
            if let Some(i) = generated.filter(|&i| row[i].is_null()) {
                row[i] = self.next_key(model, &model.fields()[i]).await?;
            }
            documents.push(row_to_document(model, &row)?);
            result.push(row);
        }
        log::debug!(
            "db.{}.insertMany([{}])",
            model.storage_name(),
            pipeline_text(&documents)
        );
        let collection = self.collection(model);
        in_session!(self.session.as_mut(), collection.insert_many(&documents))?;
        Ok(result)
    }

    async fn update_rows(
        &mut self,
        predicate: &Group,
        assignments: &[(&str, Value)],
    ) -> Result<u64> {
        let plan = DocumentPlan::new(predicate)?;
        let update = plan.assignments(assignments)?;
        let model = plan.primary().clone();
        let filter = self.scope(&plan).await?;
        log::debug!("db.{}.updateMany({}, {})", model.storage_name(), filter, update);
        let collection = self.collection(&model);
        let result = in_session!(
            self.session.as_mut(),
            collection.update_many(filter, update)
        )?;
        Ok(result.matched_count)
    }

    async fn delete_rows(&mut self, predicate: &Group) -> Result<u64> {
        let plan = DocumentPlan::new(predicate)?;
        let model = plan.primary().clone();
        let filter = self.scope(&plan).await?;
        log::debug!("db.{}.deleteMany({})", model.storage_name(), filter);
        let collection = self.collection(&model);
        let result = in_session!(self.session.as_mut(), collection.delete_many(filter))?;
        Ok(result.deleted_count)
    }

    async fn create_models(&mut self, models: &[ModelRef]) -> Result<()> {
        for model in models {
            log::debug!("db.createCollection(\"{}\")", model.storage_name());
            let created = in_session!(
                self.session.as_mut(),
                self.database.create_collection(model.storage_name())
            );
            match created {
                Err(e) if !already_exists(&e) => return Err(e.into()),
                _ => {}
            }
            self.create_indexes(model).await?;
        }
        Ok(())
    }

    async fn drop_models(&mut self, models: &[ModelRef]) -> Result<()> {
        if self.session.is_some() {
            let error = ErrorKind::NotSupported(
                "dropping collections inside a transaction".into(),
            )
            .into_error();
            log::error!("{:#}", error);
            return Err(error);
        }
        let counters = self.database.collection::<Document>(COUNTERS);
        for model in models {
            log::debug!("db.{}.drop()", model.storage_name());
            self.collection(model).drop().await?;
            if let Some(field) = model.auto_increment() {
                counters
                    .delete_one(doc! { "_id": counter_name(model, field) })
                    .await?;
            }
        }
        Ok(())
    }
}

impl Connection for MongoConnection {
    /// Opens `mongodb://host:port/database?options`, the database defaults to
    /// [`DEFAULT_DATABASE`]. Options are the ones of the MongoDB connection string.
    async fn connect(url: &str) -> Result<MongoConnection> {
        if !url.starts_with("mongodb+srv://") {
            expect_scheme(url, MongoDriver::NAME)?;
        }
        let mut options = ClientOptions::parse(url)
            .await
            .map_err(|e| connect_failed(Error::new(e), url))?;
        options
            .server_selection_timeout
            .get_or_insert(Duration::from_secs(5));
        let database = options
            .default_database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.into());
        let client =
            Client::with_options(options).map_err(|e| connect_failed(Error::new(e), url))?;
        let database = client.database(&database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| connect_failed(Error::new(e), url))?;
        Ok(Self {
            client,
            database,
            session: None,
        })
    }

    async fn disconnect(self) -> Result<()> {
        drop(self.session);
        self.client.shutdown().await;
        Ok(())
    }

    async fn begin_native(&mut self) -> Result<()> {
        log::debug!("startTransaction()");
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        self.session = Some(session);
        Ok(())
    }

    async fn commit_native(&mut self) -> Result<()> {
        log::debug!("commitTransaction()");
        let Some(mut session) = self.session.take() else {
            return Err(ErrorKind::TransactionStateError("no transaction to commit".into()).into_error());
        };
        session.commit_transaction().await?;
        Ok(())
    }

    async fn rollback_native(&mut self) -> Result<()> {
        log::debug!("abortTransaction()");
        let Some(mut session) = self.session.take() else {
            return Err(
                ErrorKind::TransactionStateError("no transaction to roll back".into()).into_error(),
            );
        };
        session.abort_transaction().await?;
        Ok(())
    }

    /// The driver aborts the transaction of a session dropped while it is in progress.
    fn abandon_native(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_core::ModelDef;

    #[test]
    fn counters_are_named_after_collection_and_field() {
        let model = ModelDef::builder("counted")
            .storage_name("counted_things")
            .fields([FieldDef::of::<i64>("id"), FieldDef::of::<String>("name")])
            .build()
            .expect("Could not declare the model");
        let field = model.auto_increment().expect("integer key");
        assert_eq!(counter_name(&model, field), "counted_things__id");
    }
}

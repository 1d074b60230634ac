use crate::value_to_bson;
use mongodb::bson::{Bson, Document, doc};
use sieve_core::{
    CompareOp, Comparison, ErrorKind, Group, LogicalOp, ModelRef, Operand, Order, QueryPlan,
    Reference, Result, Token, Value, Window, convert_to, unscoped_join_error,
};

/// Name of the document field storing `model.fields()[index]`.
///
/// A single key stored as `id` lives in the document identifier `_id`, every other field keeps
/// its storage name.
pub fn document_field(model: &ModelRef, index: usize) -> &str {
    let name = model.fields()[index].storage_name();
    if model.primary_key_indices() == [index] && matches!(name, "id" | "_id") {
        "_id"
    } else {
        name
    }
}

fn operator(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "$eq",
        CompareOp::Ne => "$ne",
        CompareOp::Gt => "$gt",
        CompareOp::Gte => "$gte",
        CompareOp::Lt => "$lt",
        CompareOp::Lte => "$lte",
    }
}

fn single(key: impl Into<String>, value: impl Into<Bson>) -> Document {
    let mut document = Document::new();
    document.insert(key, value);
    document
}

/// Conditions of one level of nesting, a disjunction of conjunctions.
#[derive(Default)]
struct Alternatives {
    terms: Vec<Vec<Document>>,
    pending_or: bool,
}

impl Alternatives {
    fn push(&mut self, condition: Document) {
        if self.pending_or || self.terms.is_empty() {
            self.terms.push(Vec::new());
            self.pending_or = false;
        }
        if let Some(all) = self.terms.last_mut() {
            all.push(condition);
        }
    }

    fn or(&mut self) {
        if !self.terms.is_empty() {
            self.pending_or = true;
        }
    }

    fn finish(self) -> Option<Document> {
        let mut any = self
            .terms
            .into_iter()
            .filter_map(|mut all| match all.len() {
                0 => None,
                1 => all.pop(),
                _ => Some(doc! { "$and": all }),
            })
            .collect::<Vec<_>>();
        match any.len() {
            0 => None,
            1 => any.pop(),
            _ => Some(doc! { "$or": any }),
        }
    }
}

/// Aggregation pipelines and filter documents compiled from a predicate.
///
/// Every joined model enters through a `$lookup` whose single result is unwound into the field
/// `_sieve_joined_<model>_<n>`, conditions on it use that prefix.
#[derive(Debug)]
pub struct DocumentPlan<'g> {
    plan: QueryPlan<'g>,
    aliases: Vec<String>,
}

impl<'g> DocumentPlan<'g> {
    pub fn new(group: &'g Group) -> Result<Self> {
        let plan = QueryPlan::new(group)?;
        let aliases = plan
            .joins
            .iter()
            .enumerate()
            .map(|(n, step)| format!("_sieve_joined_{}_{}", step.model.name(), n))
            .collect();
        Ok(Self { plan, aliases })
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.plan = self.plan.with_window(window);
        self
    }

    pub fn primary(&self) -> &ModelRef {
        &self.plan.primary
    }

    pub fn is_joined(&self) -> bool {
        self.plan.is_joined()
    }

    /// Path of a field inside the documents flowing through the pipeline.
    pub fn path(&self, model: &ModelRef, index: usize) -> Result<String> {
        let field = document_field(model, index);
        if *model == self.plan.primary {
            return Ok(field.to_string());
        }
        match self.plan.joins.iter().position(|step| step.model == *model) {
            Some(n) => Ok(format!("{}.{}", self.aliases[n], field)),
            None => Err(ErrorKind::MalformedPredicate(format!(
                "model `{}` is not part of the query",
                model.name()
            ))
            .into_error()),
        }
    }

    fn reference_path(&self, reference: &Reference) -> Result<String> {
        self.path(&reference.model, reference.field_index()?)
    }

    fn expression(&self, operand: &Operand) -> Result<Bson> {
        Ok(match operand {
            Operand::Reference(r) => Bson::String(format!("${}", self.reference_path(r)?)),
            Operand::Literal(v) => single("$literal", value_to_bson(v)?).into(),
        })
    }

    fn comparison(&self, comparison: &Comparison) -> Result<Document> {
        let comparison = comparison.normalized();
        if let (Some(is_null), Operand::Reference(r)) =
            (comparison.null_check(), &comparison.left)
        {
            let op = if is_null { "$eq" } else { "$ne" };
            return Ok(single(self.reference_path(r)?, single(op, Bson::Null)));
        }
        let op = operator(comparison.op);
        match (&comparison.left, &comparison.right) {
            (Operand::Reference(r), Operand::Literal(v)) => {
                let field = r.field_def()?;
                let value = convert_to(v.clone(), &field.value_type).unwrap_or_else(|_| v.clone());
                Ok(single(
                    self.reference_path(r)?,
                    single(op, value_to_bson(&value)?),
                ))
            }
            (left, right) => Ok(single(
                "$expr",
                single(
                    op,
                    vec![self.expression(left)?, self.expression(right)?],
                ),
            )),
        }
    }

    /// Filter document of the predicate, `None` when nothing restricts it.
    pub fn filter(&self) -> Result<Option<Document>> {
        let mut stack = vec![Alternatives::default()];
        for token in self.plan.tokens() {
            match token {
                Token::Open => stack.push(Alternatives::default()),
                Token::Close => {
                    if stack.len() < 2 {
                        return Err(ErrorKind::MalformedPredicate(
                            "a group is closed before being opened".into(),
                        )
                        .into_error());
                    }
                    let nested = stack.pop().and_then(Alternatives::finish);
                    if let (Some(condition), Some(parent)) = (nested, stack.last_mut()) {
                        parent.push(condition);
                    }
                }
                Token::Logical(LogicalOp::Or) => {
                    if let Some(current) = stack.last_mut() {
                        current.or();
                    }
                }
                Token::Logical(LogicalOp::And) => {}
                Token::Reference(r) if r.is_model() => {}
                token => {
                    let condition = match token {
                        Token::Reference(r) => single(self.reference_path(r)?, true),
                        Token::Literal(v) => single("$expr", single("$literal", value_to_bson(v)?)),
                        Token::Comparison(c) => self.comparison(c)?,
                        _ => continue,
                    };
                    if let Some(current) = stack.last_mut() {
                        current.push(condition);
                    }
                }
            }
        }
        Ok(stack.into_iter().next().and_then(Alternatives::finish))
    }

    /// `$lookup` and `$unwind` stages bringing in the joined models, documents without a match are dropped.
    pub fn lookup_stages(&self) -> Result<Vec<Document>> {
        let mut stages = Vec::with_capacity(self.plan.joins.len() * 2);
        for (step, alias) in self.plan.joins.iter().zip(&self.aliases) {
            let mut variables = Document::new();
            let mut conditions = Vec::with_capacity(step.on.len());
            for (i, (joined, entering)) in step.on.iter().enumerate() {
                let variable = format!("v{}", i);
                variables.insert(
                    variable.clone(),
                    format!("${}", self.path(&joined.model, joined.field)?),
                );
                conditions.push(doc! {
                    "$eq": [
                        format!("${}", document_field(&entering.model, entering.field)),
                        format!("$${}", variable),
                    ]
                });
            }
            stages.push(doc! {
                "$lookup": {
                    "from": step.model.storage_name(),
                    "let": variables,
                    "pipeline": [{ "$match": { "$expr": { "$and": conditions } } }],
                    "as": alias.as_str(),
                }
            });
            stages.push(doc! {
                "$unwind": {
                    "path": format!("${}", alias),
                    "preserveNullAndEmptyArrays": false,
                }
            });
        }
        Ok(stages)
    }

    pub fn sort(&self) -> Result<Option<Document>> {
        let mut sort = Document::new();
        for r in self.plan.sorting() {
            let direction = match r.order {
                Order::ASC => 1,
                Order::DESC => -1,
            };
            sort.insert(self.reference_path(r)?, direction);
        }
        Ok((!sort.is_empty()).then_some(sort))
    }

    fn filtered(&self) -> Result<Vec<Document>> {
        let mut pipeline = self.lookup_stages()?;
        if let Some(filter) = self.filter()? {
            pipeline.push(doc! { "$match": filter });
        }
        Ok(pipeline)
    }

    /// Documents of the primary model, sorted and paged.
    pub fn fetch_pipeline(&self) -> Result<Vec<Document>> {
        let mut pipeline = self.filtered()?;
        if let Some(sort) = self.sort()? {
            pipeline.push(doc! { "$sort": sort });
        }
        let window = self.plan.window;
        if window.offset > 0 {
            pipeline.push(single("$skip", i64::try_from(window.offset)?));
        }
        if let Some(limit) = window.limit {
            pipeline.push(single("$limit", i64::try_from(limit)?));
        }
        if self.is_joined() {
            let mut projection = Document::new();
            for index in 0..self.plan.primary.fields().len() {
                projection.insert(document_field(&self.plan.primary, index), 1);
            }
            pipeline.push(doc! { "$project": projection });
        }
        Ok(pipeline)
    }

    /// A single document `{ count: n }`, or none when nothing matches. Paging is ignored.
    pub fn count_pipeline(&self) -> Result<Vec<Document>> {
        let mut pipeline = self.filtered()?;
        pipeline.push(doc! { "$count": "count" });
        Ok(pipeline)
    }

    /// Identifiers of the primary documents matched through the joins, the predicate must
    /// restrict them.
    pub fn key_pipeline(&self) -> Result<Vec<Document>> {
        let Some(filter) = self.filter()? else {
            return Err(unscoped_join_error(&self.plan));
        };
        let mut pipeline = self.lookup_stages()?;
        pipeline.push(doc! { "$match": filter });
        pipeline.push(doc! { "$project": { "_id": 1 } });
        Ok(pipeline)
    }

    /// Document setting the assigned fields of the primary model.
    pub fn assignments(&self, assignments: &[(&str, Value)]) -> Result<Document> {
        let model = &self.plan.primary;
        if assignments.is_empty() {
            return Err(sieve_core::Error::msg(format!(
                "Nothing to update on `{}`",
                model.name()
            )));
        }
        let mut set = Document::new();
        for (name, value) in assignments {
            let reference = model.field(name.to_string());
            let index = reference.field_index()?;
            let value = convert_to(value.clone(), &model.fields()[index].value_type)?;
            set.insert(document_field(model, index), value_to_bson(&value)?);
        }
        Ok(doc! { "$set": set })
    }
}

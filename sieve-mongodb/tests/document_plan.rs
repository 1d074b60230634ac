#[cfg(test)]
mod tests {
    use sieve_core::{
        AsValue, CompareOp, Comparison, ErrorKind, FieldDef, ModelCollection, ModelDef, ModelRef,
        Window, when,
    };
    use sieve_mongodb::{
        DocumentPlan,
        bson::{Document, doc},
        document_field,
    };
    use std::sync::LazyLock;

    static COLLECTION: LazyLock<ModelCollection> =
        LazyLock::new(|| ModelCollection::new("mongodb_plan"));

    static ORDER: LazyLock<ModelRef> = LazyLock::new(|| {
        ModelDef::builder("order")
            .storage_name("orders")
            .fields([
                FieldDef::of::<i64>("id"),
                FieldDef::of::<String>("customer"),
                FieldDef::of::<f64>("total"),
                FieldDef::of::<bool>("paid"),
                FieldDef::of::<String>("note").nullable(),
            ])
            .collection(&COLLECTION)
            .build()
            .expect("Could not declare the order model")
    });

    static LINE: LazyLock<ModelRef> = LazyLock::new(|| {
        ModelDef::builder("line")
            .storage_name("order_lines")
            .fields([
                FieldDef::of::<i64>("order")
                    .key()
                    .store_as("order_id")
                    .references("order", "id"),
                FieldDef::of::<i32>("position").key(),
            ])
            .collection(&COLLECTION)
            .build()
            .expect("Could not declare the line model")
    });

    fn models() -> (&'static ModelRef, &'static ModelRef) {
        let models = (&*ORDER, &*LINE);
        COLLECTION.finalize().expect("Every reference resolves");
        models
    }

    #[test]
    fn identifiers() {
        let (order, line) = models();
        assert_eq!(document_field(order, 0), "_id");
        assert_eq!(document_field(order, 1), "customer");
        assert_eq!(document_field(line, 0), "order_id");
        assert_eq!(document_field(line, 1), "position");
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let (order, _) = models();
        let group = when(order.field("paid").equals(true))
            .and(order.field("id").gt(10))
            .or(Comparison::new(100.0, CompareOp::Lte, order.field("total")));
        let plan = DocumentPlan::new(&group).expect("Could not plan the query");
        assert_eq!(
            plan.filter().expect("Could not compile the filter"),
            Some(doc! {
                "$or": [
                    { "$and": [{ "paid": { "$eq": true } }, { "_id": { "$gt": 10i64 } }] },
                    { "total": { "$gte": 100.0 } },
                ]
            })
        );
    }

    #[test]
    fn nulls_and_fields_compared_to_fields() {
        let (order, _) = models();
        let group = when(order.field("note").is_null())
            .and(order.field("customer").not_equals(order.field("note")))
            .or(when(order.field("note").is_not_null()).and(order.field("total").lt(0)));
        let plan = DocumentPlan::new(&group).expect("Could not plan the query");
        assert_eq!(
            plan.filter().expect("Could not compile the filter"),
            Some(doc! {
                "$or": [
                    {
                        "$and": [
                            { "note": { "$eq": null } },
                            { "$expr": { "$ne": ["$customer", "$note"] } },
                        ]
                    },
                    { "$and": [{ "note": { "$ne": null } }, { "total": { "$lt": 0.0 } }] },
                ]
            })
        );

        let group = when(order);
        let plan = DocumentPlan::new(&group).expect("Could not plan the query");
        assert_eq!(plan.filter().expect("Could not compile the filter"), None);
        assert_eq!(
            plan.count_pipeline().expect("Could not compile the count"),
            vec![doc! { "$count": "count" }]
        );
    }

    #[test]
    fn joins_become_lookups() {
        let (order, line) = models();
        let group = when(line)
            .and(order.field("paid").equals(false))
            .sort([line.field("position").asc()])
            .limit(10, 1);
        let plan = DocumentPlan::new(&group).expect("Could not plan the query");
        let lookup = [
            doc! {
                "$lookup": {
                    "from": "orders",
                    "let": { "v0": "$order_id" },
                    "pipeline": [{ "$match": { "$expr": { "$and": [{ "$eq": ["$_id", "$$v0"] }] } } }],
                    "as": "_sieve_joined_order_0",
                }
            },
            doc! {
                "$unwind": { "path": "$_sieve_joined_order_0", "preserveNullAndEmptyArrays": false }
            },
            doc! { "$match": { "_sieve_joined_order_0.paid": { "$eq": false } } },
        ];
        let mut expected = lookup.to_vec();
        expected.extend([
            doc! { "$sort": { "position": 1 } },
            doc! { "$skip": 10i64 },
            doc! { "$limit": 10i64 },
            doc! { "$project": { "order_id": 1, "position": 1 } },
        ]);
        assert_eq!(plan.fetch_pipeline().expect("Could not compile the fetch"), expected);

        let mut expected = lookup.to_vec();
        expected.push(doc! { "$count": "count" });
        assert_eq!(plan.count_pipeline().expect("Could not compile the count"), expected);

        let mut expected = lookup.to_vec();
        expected.push(doc! { "$project": { "_id": 1 } });
        assert_eq!(plan.key_pipeline().expect("Could not compile the keys"), expected);

        let plan = DocumentPlan::new(&group)
            .expect("Could not plan the query")
            .with_window(Window::new(0, None));
        let stages = plan.fetch_pipeline().expect("Could not compile the fetch");
        assert!(
            !stages
                .iter()
                .any(|s: &Document| s.contains_key("$skip") || s.contains_key("$limit"))
        );
    }

    #[test]
    fn unscoped_joins_and_assignments() {
        let (order, line) = models();
        let group = when(line).and(order);
        let plan = DocumentPlan::new(&group).expect("Could not plan the query");
        let error = plan
            .key_pipeline()
            .expect_err("A join without filter must be rejected");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::MalformedPredicate(..))
        ));

        let group = when(order.field("customer").equals("ada"));
        let plan = DocumentPlan::new(&group).expect("Could not plan the query");
        assert_eq!(
            plan.assignments(&[("total", 3.as_value()), ("note", None::<String>.as_value())])
                .expect("Could not compile the assignments"),
            doc! { "$set": { "total": 3.0, "note": null } }
        );
        let error = plan
            .assignments(&[("discount", 3.as_value())])
            .expect_err("Unknown fields are rejected");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::UnknownField { .. })
        ));
        assert!(plan.assignments(&[]).is_err());
    }
}

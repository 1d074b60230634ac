#[cfg(test)]
mod tests {
    use sieve::{
        ErrorKind, FieldDef, ModelCollection, ModelDef, ModelRef, QueryPlan, Relation, Value, when,
    };
    use time::Date;
    use uuid::Uuid;

    fn model(collection: &ModelCollection, name: &str, fields: Vec<FieldDef>) -> ModelRef {
        ModelDef::builder(name.to_string())
            .fields(fields)
            .collection(collection)
            .build()
            .expect("Could not declare the model")
    }

    #[test]
    fn primary_key_selection() {
        let collection = ModelCollection::new("schema_keys");
        let tagged = model(
            &collection,
            "tagged",
            vec![
                FieldDef::of::<i64>("id"),
                FieldDef::of::<String>("code").key(),
                FieldDef::of::<i32>("year").key(),
            ],
        );
        assert_eq!(tagged.primary_key_indices(), [1, 2]);
        assert_eq!(tagged.auto_increment_index(), None);

        let named = model(
            &collection,
            "named",
            vec![
                FieldDef::of::<i32>("rank"),
                FieldDef::of::<Uuid>("uid").store_as("_id"),
            ],
        );
        assert_eq!(named.primary_key_indices(), [1]);
        assert!(named.auto_increment().is_none());

        let integer = model(
            &collection,
            "integer",
            vec![FieldDef::of::<String>("label"), FieldDef::of::<u16>("number")],
        );
        assert_eq!(integer.primary_key_indices(), [1]);
        assert_eq!(integer.auto_increment_index(), Some(1));

        let first = model(
            &collection,
            "first",
            vec![FieldDef::of::<String>("label"), FieldDef::of::<Date>("day")],
        );
        assert_eq!(first.primary_key_indices(), [0]);
        assert_eq!(
            first.primary_key().map(|f| f.name.as_ref()).collect::<Vec<_>>(),
            ["label"]
        );
    }

    #[test]
    fn declaration_errors() {
        let collection = ModelCollection::new("schema_errors");
        let duplicate = ModelDef::builder("duplicate")
            .fields([
                FieldDef::of::<i32>("a"),
                FieldDef::of::<i32>("b").store_as("A"),
            ])
            .collection(&collection)
            .build();
        assert!(matches!(
            duplicate.as_ref().err().and_then(ErrorKind::of),
            Some(ErrorKind::DuplicateStorageName { first, second, .. }) if first == "a" && second == "b"
        ));
        let empty = ModelDef::builder("empty").collection(&collection).build();
        assert!(empty.is_err());
        assert!(collection.models().is_empty());

        let plain = model(&collection, "plain", vec![FieldDef::of::<i32>("x")]);
        assert!(matches!(
            plain.expect_field("y").err().as_ref().and_then(ErrorKind::of),
            Some(ErrorKind::UnknownField { .. })
        ));
    }

    #[test]
    fn registration() {
        let collection = ModelCollection::new("schema_registration");
        let a = model(&collection, "a", vec![FieldDef::of::<i32>("id")]);
        let b = model(&collection, "b", vec![FieldDef::of::<i32>("id")]);
        assert_eq!(collection.models(), vec![a.clone(), b.clone()]);
        assert_eq!(a.collection().expect("The collection is alive"), collection);
        assert!(collection.contains(&a));

        // Same name again replaces the previous model, keeping its position
        let again = model(&collection, "a", vec![FieldDef::of::<i64>("id")]);
        assert_eq!(collection.models(), vec![again.clone(), b.clone()]);
        assert!(!collection.contains(&a));
        assert_ne!(a, again);

        assert_eq!(collection.remove("b"), Some(b));
        assert_eq!(collection.get("b"), None);
        assert_eq!(collection.models(), vec![again]);
    }

    #[test]
    fn join_paths() {
        let collection = ModelCollection::new("schema_joins");
        let student = model(
            &collection,
            "student",
            vec![FieldDef::of::<i32>("id"), FieldDef::of::<String>("name")],
        );
        let course = model(
            &collection,
            "course",
            vec![FieldDef::of::<i32>("id"), FieldDef::of::<String>("title")],
        );
        let enrollment = model(
            &collection,
            "enrollment",
            vec![
                FieldDef::of::<i32>("student").key().references("student", "id"),
                FieldDef::of::<i32>("course").key().references("course", "id"),
            ],
        );
        let island = model(&collection, "island", vec![FieldDef::of::<i32>("id")]);
        collection.finalize().expect("Every reference resolves");
        let index = collection.references().expect("The index builds");
        assert_eq!(index.references().len(), 2);

        // Through the association model
        let steps = index
            .join_path(&[student.clone()], &course)
            .expect("The course is reachable");
        assert_eq!(
            steps.iter().map(|s| s.model.clone()).collect::<Vec<_>>(),
            vec![enrollment.clone(), course.clone()]
        );
        let (joined, entering) = &steps[0].on[0];
        assert_eq!((joined.model.clone(), joined.field), (student.clone(), 0));
        assert_eq!((entering.model.clone(), entering.field), (enrollment.clone(), 0));
        let (joined, entering) = &steps[1].on[0];
        assert_eq!(joined.field_def().name, "course");
        assert_eq!(entering.field_def().name, "id");

        // Already in the query
        assert!(
            index
                .join_path(&[student.clone(), course.clone()], &course)
                .expect("Nothing to join")
                .is_empty()
        );

        let error = index
            .join_path(&[student.clone()], &island)
            .expect_err("The island is not linked");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::JoinResolutionFailed { .. })
        ));
        let error = QueryPlan::new(&when(&student).and(&island))
            .expect_err("The island cannot be joined");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::JoinResolutionFailed { .. })
        ));
    }

    #[test]
    fn unresolved_references() {
        let collection = ModelCollection::new("schema_unresolved");
        let orphan = model(
            &collection,
            "orphan",
            vec![
                FieldDef::of::<i32>("id"),
                FieldDef::of::<i32>("parent").references("parent", "id"),
            ],
        );
        let error = collection.finalize().expect_err("The parent is missing");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::UnresolvedReference { model, .. }) if model == "orphan"
        ));

        // Declaring the target later resolves it
        let parent = model(&collection, "parent", vec![FieldDef::of::<i32>("id")]);
        collection.finalize().expect("Every reference resolves now");
        let steps = collection
            .references()
            .expect("The index builds")
            .join_path(&[orphan], &parent)
            .expect("The parent is reachable");
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn relations() {
        let collection = ModelCollection::new("schema_relations");
        let owner = ModelDef::builder("owner")
            .fields([FieldDef::of::<i32>("id"), FieldDef::of::<String>("name")])
            .relation(Relation::many("pets", "pet"))
            .collection(&collection)
            .build()
            .expect("Could not declare the owner model");
        let pet = model(
            &collection,
            "pet",
            vec![
                FieldDef::of::<i32>("id"),
                FieldDef::of::<i32>("owner").references("owner", "id"),
            ],
        );
        let relation = owner.relation("pets").expect("The relation is declared");
        assert_eq!(relation.target_model(&owner).expect("The pet exists"), pet);
        let row = [Value::Int32(Some(7)), Value::Varchar(Some("Ann".into()))];
        let predicate = relation
            .predicate(&owner, &row)
            .expect("Could not build the predicate");
        assert_eq!(predicate, when(&pet).and(pet.field("owner").equals(7)));
        assert!(owner.relation("cars").is_none());
    }
}

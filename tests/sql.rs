#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rust_decimal::Decimal;
    use sieve::{
        AsValue, CompareOp, Comparison, ErrorKind, FieldDef, GenericSqlWriter, ModelCollection,
        ModelDef, ModelRef, QueryPlan, SqlWriter, Value, when,
    };
    use std::sync::LazyLock;
    use uuid::Uuid;

    const WRITER: GenericSqlWriter = GenericSqlWriter;

    static COLLECTION: LazyLock<ModelCollection> =
        LazyLock::new(|| ModelCollection::new("generic_sql"));

    static AUTHOR: LazyLock<ModelRef> = LazyLock::new(|| {
        ModelDef::builder("author")
            .storage_name("authors")
            .fields([FieldDef::of::<i32>("id"), FieldDef::of::<String>("name")])
            .collection(&COLLECTION)
            .build()
            .expect("Could not declare the author model")
    });

    static BOOK: LazyLock<ModelRef> = LazyLock::new(|| {
        ModelDef::builder("book")
            .storage_name("books")
            .fields([
                FieldDef::of::<i64>("id"),
                FieldDef::of::<String>("title").unique(),
                FieldDef::of::<i32>("pages"),
                FieldDef::of::<String>("subtitle").nullable(),
                FieldDef::of::<i32>("author")
                    .store_as("author_id")
                    .references("author", "id"),
                FieldDef::of::<Decimal>("price"),
                FieldDef::of::<Uuid>("code"),
            ])
            .collection(&COLLECTION)
            .build()
            .expect("Could not declare the book model")
    });

    fn models() -> (&'static ModelRef, &'static ModelRef) {
        let models = (&*AUTHOR, &*BOOK);
        COLLECTION.finalize().expect("Every reference resolves");
        models
    }

    #[test]
    fn create_and_drop() {
        let (author, book) = models();
        assert_eq!(
            WRITER.write_create_table(book, false).sql,
            indoc! {r#"
                CREATE TABLE "books" (
                "id" BIGINT PRIMARY KEY,
                "title" VARCHAR NOT NULL UNIQUE,
                "pages" INTEGER NOT NULL,
                "subtitle" VARCHAR,
                "author_id" INTEGER NOT NULL,
                "price" DECIMAL NOT NULL,
                "code" UUID NOT NULL
                );
            "#}
            .trim()
        );
        assert_eq!(
            WRITER.write_create_table(author, true).sql,
            indoc! {r#"
                CREATE TABLE IF NOT EXISTS "authors" (
                "id" INTEGER PRIMARY KEY,
                "name" VARCHAR NOT NULL
                );
            "#}
            .trim()
        );
        assert_eq!(WRITER.write_drop_table(book, false).sql, r#"DROP TABLE "books";"#);
        assert_eq!(
            WRITER.write_drop_table(author, true).sql,
            r#"DROP TABLE IF EXISTS "authors";"#
        );
    }

    #[test]
    fn nested_conditions_and_nulls() {
        let (_, book) = models();
        let group = when(book.field("pages").gt(100)).and(
            when(book.field("subtitle").is_null()).or(book.field("subtitle").equals("Vol. 2")),
        );
        let plan = QueryPlan::new(&group).expect("Could not plan the query");
        let statement = WRITER.write_count(&plan).expect("Could not write the count");
        assert_eq!(
            statement.sql,
            indoc! {r#"
                SELECT COUNT(*)
                FROM "books"
                WHERE "books"."pages" > ? AND ("books"."subtitle" IS NULL OR "books"."subtitle" = ?);
            "#}
            .trim()
        );
        assert_eq!(
            statement.params,
            [100.as_value(), String::from("Vol. 2").as_value()]
        );

        // A literal on the left is moved to the right
        let group = when(book.field("subtitle").not_equals(Value::Varchar(None)))
            .and(Comparison::new(10, CompareOp::Gte, book.field("pages")));
        let plan = QueryPlan::new(&group).expect("Could not plan the query");
        let statement = WRITER.write_count(&plan).expect("Could not write the count");
        assert!(statement.sql.ends_with(
            r#"WHERE "books"."subtitle" IS NOT NULL AND "books"."pages" <= ?;"#
        ));
        assert_eq!(statement.params, [10.as_value()]);
    }

    #[test]
    fn select_through_join() {
        let (author, book) = models();
        let group = when(book)
            .and(author.field("name").equals("Le Guin"))
            .and(when(book.field("pages").lt(500)).or(when(author).and(author)))
            .sort([book.field("title").asc(), author.field("name").desc()])
            .limit(20, 1);
        let plan = QueryPlan::new(&group).expect("Could not plan the query");
        let statement = WRITER.write_select(&plan).expect("Could not write the select");
        assert_eq!(
            statement.sql,
            indoc! {r#"
                SELECT "books"."id", "books"."title", "books"."pages", "books"."subtitle", "books"."author_id", "books"."price", "books"."code"
                FROM "books"
                INNER JOIN "authors" ON "books"."author_id" = "authors"."id"
                WHERE "authors"."name" = ? AND "books"."pages" < ?
                ORDER BY "books"."title" ASC, "authors"."name" DESC
                LIMIT 20
                OFFSET 20;
            "#}
            .trim()
        );
        assert_eq!(
            statement.params,
            [String::from("Le Guin").as_value(), 500.as_value()]
        );

        // Nothing to filter, sort or page
        let group = when(book);
        let plan = QueryPlan::new(&group).expect("Could not plan the query");
        let statement = WRITER.write_select(&plan).expect("Could not write the select");
        assert!(statement.sql.ends_with("\nFROM \"books\";"));
        assert!(statement.params.is_empty());
    }

    #[test]
    fn insert() {
        let (author, book) = models();
        let row = [
            None::<i64>.as_value(),
            String::from("The Dispossessed").as_value(),
            387.as_value(),
            None::<String>.as_value(),
            1.as_value(),
            Decimal::new(1299, 2).as_value(),
            Uuid::nil().as_value(),
        ];
        let statement = WRITER.write_insert(book, &row).expect("Could not write the insert");
        assert_eq!(
            statement.sql,
            r#"INSERT INTO "books" ("title", "pages", "subtitle", "author_id", "price", "code") VALUES (?, ?, ?, ?, ?, ?);"#
        );
        assert_eq!(statement.params, &row[1..]);
        assert!(WRITER.write_last_insert_id().is_none());

        // An explicit key is written like any other column
        let statement = WRITER
            .write_insert(author, &[7.as_value(), String::from("Le Guin").as_value()])
            .expect("Could not write the insert");
        assert_eq!(
            statement.sql,
            r#"INSERT INTO "authors" ("id", "name") VALUES (?, ?);"#
        );

        let error = WRITER
            .write_insert(author, &[7.as_value()])
            .expect_err("The row is missing a value");
        assert!(error.to_string().contains("has 2 fields but the row has 1 values"));
    }

    #[test]
    fn update_and_delete() {
        let (author, book) = models();
        let group = when(book.field("id").equals(3));
        let plan = QueryPlan::new(&group).expect("Could not plan the query");
        let statement = WRITER
            .write_update(
                &plan,
                &[
                    ("title", String::from("Lathe").as_value()),
                    ("subtitle", None::<String>.as_value()),
                ],
            )
            .expect("Could not write the update");
        assert_eq!(
            statement.sql,
            indoc! {r#"
                UPDATE "books" SET "title" = ?, "subtitle" = ?
                WHERE "books"."id" = ?;
            "#}
            .trim()
        );
        assert_eq!(statement.params.len(), 3);

        let error = WRITER
            .write_update(&plan, &[])
            .expect_err("Nothing to update");
        assert!(error.to_string().contains("Nothing to update"));
        let error = WRITER
            .write_update(&plan, &[("isbn", 1.as_value())])
            .expect_err("The book has no isbn");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::UnknownField { .. })
        ));

        let group = when(book).and(author.field("name").equals("Le Guin"));
        let plan = QueryPlan::new(&group).expect("Could not plan the query");
        let statement = WRITER
            .write_update(&plan, &[("pages", 300.as_value())])
            .expect("Could not write the update");
        assert_eq!(
            statement.sql,
            indoc! {r#"
                UPDATE "books" SET "pages" = ?
                WHERE "books"."id" IN (SELECT "books"."id" FROM "books"
                INNER JOIN "authors" ON "books"."author_id" = "authors"."id"
                WHERE "authors"."name" = ?);
            "#}
            .trim()
        );
        assert_eq!(
            statement.params,
            [300.as_value(), String::from("Le Guin").as_value()]
        );

        let group = when(book);
        let plan = QueryPlan::new(&group).expect("Could not plan the query");
        assert_eq!(
            WRITER.write_delete(&plan).expect("Could not write the delete").sql,
            r#"DELETE FROM "books";"#
        );

        let group = when(book).and(author);
        let plan = QueryPlan::new(&group).expect("Could not plan the query");
        let error = WRITER
            .write_delete(&plan)
            .expect_err("A join without filter must be rejected");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::MalformedPredicate(..))
        ));
    }

    #[test]
    fn transactions() {
        let mut out = String::new();
        WRITER.write_transaction_begin(&mut out);
        WRITER.write_transaction_commit(&mut out);
        WRITER.write_transaction_rollback(&mut out);
        assert_eq!(out, "BEGIN;COMMIT;ROLLBACK;");
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use sieve_core::{
        AsValue, FieldDef, ModelCollection, ModelDef, ModelRef, QueryPlan, SqlWriter, Window, when,
    };
    use sieve_sqlite::SqliteSqlWriter;
    use std::sync::LazyLock;
    use time::Date;

    const WRITER: SqliteSqlWriter = SqliteSqlWriter;

    static COLLECTION: LazyLock<ModelCollection> =
        LazyLock::new(|| ModelCollection::new("sqlite_writer"));

    static ORDER: LazyLock<ModelRef> = LazyLock::new(|| {
        ModelDef::builder("order")
            .storage_name("orders")
            .fields([
                FieldDef::of::<i64>("id"),
                FieldDef::of::<String>("customer"),
                FieldDef::of::<f64>("total"),
                FieldDef::of::<Date>("placed"),
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
                FieldDef::of::<Box<[u8]>>("scan").nullable(),
            ])
            .collection(&COLLECTION)
            .build()
            .expect("Could not declare the line model")
    });

    fn models() -> (&'static ModelRef, &'static ModelRef) {
        (&*ORDER, &*LINE)
    }

    #[test]
    fn create_and_drop() {
        let (order, line) = models();
        assert_eq!(
            WRITER.write_create_table(order, true).sql,
            indoc! {r#"
                CREATE TABLE IF NOT EXISTS "orders" (
                "id" INTEGER PRIMARY KEY,
                "customer" TEXT NOT NULL,
                "total" REAL NOT NULL,
                "placed" TEXT NOT NULL,
                "paid" INTEGER NOT NULL,
                "note" TEXT
                );
            "#}
            .trim()
        );
        assert_eq!(
            WRITER.write_create_table(line, false).sql,
            indoc! {r#"
                CREATE TABLE "order_lines" (
                "order_id" INTEGER,
                "position" INTEGER,
                "scan" BLOB,
                PRIMARY KEY ("order_id", "position")
                );
            "#}
            .trim()
        );
        assert_eq!(
            WRITER.write_drop_table(line, true).sql,
            r#"DROP TABLE IF EXISTS "order_lines";"#
        );
    }

    #[test]
    fn paging() {
        let (order, _) = models();
        let group = when(order.field("customer").equals("ada"))
            .sort([order.field("placed").desc()])
            .limit(10, 2);
        let plan = QueryPlan::new(&group).expect("Could not plan the query");
        let statement = WRITER.write_select(&plan).expect("Could not write the select");
        assert_eq!(
            statement.sql,
            indoc! {r#"
                SELECT "orders"."id", "orders"."customer", "orders"."total", "orders"."placed", "orders"."paid", "orders"."note"
                FROM "orders"
                WHERE "orders"."customer" = ?
                ORDER BY "orders"."placed" DESC
                LIMIT 10
                OFFSET 20;
            "#}
            .trim()
        );
        assert_eq!(statement.params.len(), 1);

        // An offset without a limit needs a negative limit in front
        let group = when(order);
        let plan = QueryPlan::new(&group)
            .expect("Could not plan the query")
            .with_window(Window::new(30, None));
        let statement = WRITER.write_select(&plan).expect("Could not write the select");
        assert!(statement.sql.ends_with("\nLIMIT -1\nOFFSET 30;"));
        assert!(statement.params.is_empty());
    }

    #[test]
    fn insert_and_key_recovery() {
        let (order, _) = models();
        let row = [
            None::<i64>.as_value(),
            String::from("ada").as_value(),
            12.5f64.as_value(),
            Date::MIN.as_value(),
            true.as_value(),
            None::<String>.as_value(),
        ];
        let statement = WRITER
            .write_insert(order, &row)
            .expect("Could not write the insert");
        assert_eq!(
            statement.sql,
            r#"INSERT INTO "orders" ("customer", "total", "placed", "paid", "note") VALUES (?, ?, ?, ?, ?);"#
        );
        assert_eq!(statement.params.len(), 5);
        assert_eq!(
            WRITER.write_last_insert_id().map(|v| v.sql),
            Some("SELECT last_insert_rowid();".to_string())
        );
    }

    #[test]
    fn delete_through_join() {
        let (order, line) = models();
        COLLECTION.finalize().expect("Every reference resolves");
        let group = when(line).and(order.field("paid").equals(false));
        let plan = QueryPlan::new(&group).expect("Could not plan the query");
        let statement = WRITER.write_delete(&plan).expect("Could not write the delete");
        assert_eq!(
            statement.sql,
            indoc! {r#"
                DELETE FROM "order_lines"
                WHERE ("order_lines"."order_id", "order_lines"."position") IN (SELECT "order_lines"."order_id", "order_lines"."position" FROM "order_lines"
                INNER JOIN "orders" ON "order_lines"."order_id" = "orders"."id"
                WHERE "orders"."paid" = ?);
            "#}
            .trim()
        );
    }
}

use sieve::{
    AsValue, Entity, ErrorKind, Executor, FieldDef, ModelCollection, ModelDef, ModelRef, Relation,
    Result, Row, RowDecode, Value, when,
};
use std::{collections::BTreeSet, sync::LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

static COLLECTION: LazyLock<ModelCollection> = LazyLock::new(|| ModelCollection::new("books"));

static AUTHOR: LazyLock<ModelRef> = LazyLock::new(|| {
    ModelDef::builder("author")
        .storage_name("library_authors")
        .fields([
            FieldDef::of::<i64>("id").key().store_as("author_id"),
            FieldDef::of::<String>("name"),
            FieldDef::of::<String>("country"),
        ])
        .relation(Relation::many("books", "book"))
        .collection(&COLLECTION)
        .build()
        .expect("Could not declare the author model")
});

static BOOK: LazyLock<ModelRef> = LazyLock::new(|| {
    ModelDef::builder("book")
        .storage_name("library_books")
        .fields([
            FieldDef::of::<i64>("id").key(),
            FieldDef::of::<String>("title"),
            FieldDef::of::<i64>("author").references("author", "id"),
            FieldDef::of::<i32>("year"),
        ])
        .relation(Relation::one("author", "author"))
        .relation(Relation::many("tags", "tag").via("book_tag"))
        .collection(&COLLECTION)
        .build()
        .expect("Could not declare the book model")
});

static TAG: LazyLock<ModelRef> = LazyLock::new(|| {
    ModelDef::builder("tag")
        .storage_name("library_tags")
        .fields([
            FieldDef::of::<i64>("id").key(),
            FieldDef::of::<String>("label").unique(),
        ])
        .relation(Relation::many("books", "book").via("book_tag"))
        .collection(&COLLECTION)
        .build()
        .expect("Could not declare the tag model")
});

static BOOK_TAG: LazyLock<ModelRef> = LazyLock::new(|| {
    ModelDef::builder("book_tag")
        .storage_name("library_book_tags")
        .fields([
            FieldDef::of::<i64>("book").key().references("book", "id"),
            FieldDef::of::<i64>("tag").key().references("tag", "id"),
        ])
        .collection(&COLLECTION)
        .build()
        .expect("Could not declare the book tag model")
});

/// Registers every model, in dependency order.
fn collection() -> &'static ModelCollection {
    LazyLock::force(&AUTHOR);
    LazyLock::force(&BOOK);
    LazyLock::force(&TAG);
    LazyLock::force(&BOOK_TAG);
    &COLLECTION
}

#[derive(Debug, Clone, PartialEq)]
struct Author {
    id: i64,
    name: String,
    country: String,
}

impl Entity for Author {
    fn model() -> &'static ModelRef {
        &AUTHOR
    }

    fn row(&self) -> Row {
        vec![
            self.id.as_value(),
            self.name.clone().as_value(),
            self.country.clone().as_value(),
        ]
        .into_boxed_slice()
    }

    fn from_row(row: Row) -> Result<Self> {
        Ok(Self {
            id: row.decode(0)?,
            name: row.decode(1)?,
            country: row.decode(2)?,
        })
    }

    fn assign(&mut self, field: &FieldDef, value: Value) -> Result<()> {
        if field.name == "id" {
            self.id = AsValue::try_from_value(value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Book {
    id: i64,
    title: String,
    author: i64,
    year: i32,
}

impl Entity for Book {
    fn model() -> &'static ModelRef {
        &BOOK
    }

    fn row(&self) -> Row {
        vec![
            self.id.as_value(),
            self.title.clone().as_value(),
            self.author.as_value(),
            self.year.as_value(),
        ]
        .into_boxed_slice()
    }

    fn from_row(row: Row) -> Result<Self> {
        Ok(Self {
            id: row.decode(0)?,
            title: row.decode(1)?,
            author: row.decode(2)?,
            year: row.decode(3)?,
        })
    }

    fn assign(&mut self, field: &FieldDef, value: Value) -> Result<()> {
        if field.name == "id" {
            self.id = AsValue::try_from_value(value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Tag {
    id: i64,
    label: String,
}

impl Entity for Tag {
    fn model() -> &'static ModelRef {
        &TAG
    }

    fn row(&self) -> Row {
        vec![self.id.as_value(), self.label.clone().as_value()].into_boxed_slice()
    }

    fn from_row(row: Row) -> Result<Self> {
        Ok(Self {
            id: row.decode(0)?,
            label: row.decode(1)?,
        })
    }

    fn assign(&mut self, _field: &FieldDef, _value: Value) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct BookTag {
    book: i64,
    tag: i64,
}

impl Entity for BookTag {
    fn model() -> &'static ModelRef {
        &BOOK_TAG
    }

    fn row(&self) -> Row {
        vec![self.book.as_value(), self.tag.as_value()].into_boxed_slice()
    }

    fn from_row(row: Row) -> Result<Self> {
        Ok(Self {
            book: row.decode(0)?,
            tag: row.decode(1)?,
        })
    }

    fn assign(&mut self, _field: &FieldDef, _value: Value) -> Result<()> {
        Ok(())
    }
}

fn author(id: i64, name: &str, country: &str) -> Author {
    Author {
        id,
        name: name.into(),
        country: country.into(),
    }
}

fn book(id: i64, title: &str, author: i64, year: i32) -> Book {
    Book {
        id,
        title: title.into(),
        author,
        year,
    }
}

fn ids<E>(values: &[E], id: impl Fn(&E) -> i64) -> BTreeSet<i64> {
    values.iter().map(id).collect()
}

pub async fn books<X: Executor>(executor: &mut X) {
    let _lock = MUTEX.lock().await;
    let collection = collection();
    collection
        .finalize()
        .expect("Every reference of the library resolves");

    // Setup
    executor
        .delete_schema(collection)
        .await
        .expect("Could not drop the library models");
    executor
        .apply_schema(collection)
        .await
        .expect("Could not create the library models");

    let mut authors = vec![
        author(1, "J.R.R. Tolkien", "UK"),
        author(2, "Italo Calvino", "IT"),
        author(3, "Ursula K. Le Guin", "US"),
        author(4, "Nobody Yet", "FR"),
    ];
    let mut books = vec![
        book(1, "The Hobbit", 1, 1937),
        book(2, "The Fellowship of the Ring", 1, 1954),
        book(3, "Invisible Cities", 2, 1972),
        book(4, "If on a winter's night a traveler", 2, 1979),
        book(5, "The Baron in the Trees", 2, 1957),
        book(6, "A Wizard of Earthsea", 3, 1968),
        book(7, "The Dispossessed", 3, 1974),
    ];
    let mut tags = vec![
        Tag {
            id: 1,
            label: "fantasy".into(),
        },
        Tag {
            id: 2,
            label: "classic".into(),
        },
        Tag {
            id: 3,
            label: "science fiction".into(),
        },
    ];
    let mut book_tags = vec![
        BookTag { book: 1, tag: 1 },
        BookTag { book: 1, tag: 2 },
        BookTag { book: 2, tag: 1 },
        BookTag { book: 6, tag: 1 },
        BookTag { book: 7, tag: 3 },
        BookTag { book: 3, tag: 2 },
    ];
    executor.add(&mut authors).await.expect("Could not add the authors");
    executor.add(&mut books).await.expect("Could not add the books");
    executor.add(&mut tags).await.expect("Could not add the tags");
    executor
        .add(&mut book_tags)
        .await
        .expect("Could not add the book tags");

    // Books filtered on their author, through a join
    for author in &authors {
        let fetched = executor
            .fetch::<Book>(&when(AUTHOR.field("id").equals(author.id)))
            .get()
            .await
            .expect("Could not fetch books by author");
        assert_eq!(
            ids(&fetched, |b| b.id),
            ids(
                &books.iter().filter(|b| b.author == author.id).cloned().collect::<Vec<_>>(),
                |b| b.id
            ),
            "Books of {}",
            author.name
        );
    }

    // Count and fetch agree, joins and compound filters included
    let predicates = [
        when(Book::model()).and(AUTHOR.field("country").equals("UK")),
        when(BOOK.field("year").lt(1940)).or(BOOK.field("year").gt(1975)),
        when(Book::model())
            .and(AUTHOR.field("name").not_equals("Italo Calvino"))
            .and(when(BOOK.field("year").gte(1954)).or(BOOK.field("title").equals("The Hobbit"))),
        when(Book::model()).and(TAG.field("label").equals("fantasy")),
        when(Book::model()).and(AUTHOR.field("country").equals("NZ")),
    ];
    let expected = [2, 2, 4, 3, 0];
    for (predicate, expected) in predicates.iter().zip(expected) {
        let fetched = executor
            .fetch::<Book>(predicate)
            .get()
            .await
            .expect("Could not fetch the books");
        let counted = executor.count(predicate).await.expect("Could not count the books");
        assert_eq!(fetched.len() as u64, counted, "{:?}", predicate);
        assert_eq!(counted, expected, "{:?}", predicate);
    }

    // Many to many through the association model
    let fantasy = executor
        .fetch::<Book>(
            &when(TAG.field("label").equals("fantasy")).sort([BOOK.field("year").asc()]),
        )
        .get()
        .await
        .expect("Could not fetch the fantasy books");
    assert_eq!(
        fantasy.iter().map(|b| b.id).collect::<Vec<_>>(),
        vec![1, 2, 6]
    );

    // Related records
    let hobbit = &books[0];
    let tolkien = hobbit
        .fetch_related::<_, Author>(executor, "author")
        .await
        .expect("Could not load the author of a book");
    assert_eq!(tolkien, vec![authors[0].clone()]);
    let calvino = authors[1]
        .fetch_related::<_, Book>(executor, "books")
        .await
        .expect("Could not load the books of an author");
    assert_eq!(ids(&calvino, |b| b.id), BTreeSet::from([3, 4, 5]));
    let hobbit_tags = hobbit
        .fetch_related::<_, Tag>(executor, "tags")
        .await
        .expect("Could not load the tags of a book");
    assert_eq!(ids(&hobbit_tags, |t| t.id), BTreeSet::from([1, 2]));
    let classics = tags[1]
        .fetch_related::<_, Book>(executor, "books")
        .await
        .expect("Could not load the books of a tag");
    assert_eq!(ids(&classics, |b| b.id), BTreeSet::from([1, 3]));
    assert!(
        authors[3]
            .fetch_related::<_, Book>(executor, "books")
            .await
            .expect("An author without books is not an error")
            .is_empty()
    );
    let unknown = hobbit.fetch_related::<_, Tag>(executor, "publisher").await;
    assert!(matches!(
        unknown.as_ref().err().and_then(ErrorKind::of),
        Some(ErrorKind::UnknownField { .. })
    ));

    // A join with nothing filtering it would touch every row
    let unscoped = executor
        .delete(&when(Book::model()).and(Author::model()))
        .await;
    assert!(matches!(
        unscoped.as_ref().err().and_then(ErrorKind::of),
        Some(ErrorKind::MalformedPredicate(..))
    ));
    assert_eq!(executor.count(&when(Book::model())).await.expect("count"), 7);

    // Update and delete through a join only touch the joined rows
    let updated = executor
        .update(
            &when(Book::model()).and(AUTHOR.field("name").equals("Ursula K. Le Guin")),
            &[("year", 2000.as_value())],
        )
        .await
        .expect("Could not update through a join");
    assert_eq!(updated, 2);
    assert_eq!(
        executor
            .count(&when(BOOK.field("year").equals(2000)))
            .await
            .expect("count"),
        2
    );
    let deleted = executor
        .delete(&when(Book::model()).and(AUTHOR.field("country").equals("IT")))
        .await
        .expect("Could not delete through a join");
    assert_eq!(deleted, 3);
    assert_eq!(executor.count(&when(Book::model())).await.expect("count"), 4);
    assert_eq!(executor.count(&when(Author::model())).await.expect("count"), 4);

    // Composite key identity
    let removed = book_tags[1]
        .delete(executor)
        .await
        .expect("Could not delete a book tag");
    assert_eq!(removed, 1);
    assert_eq!(
        executor
            .count(&when(BOOK_TAG.field("book").equals(1)))
            .await
            .expect("count"),
        1
    );

    // A book whose author is missing never joins, whatever the filter
    let mut orphans = vec![book(8, "Unsigned Pamphlet", 99, 1990)];
    executor.add(&mut orphans).await.expect("Could not add the orphan book");
    assert_eq!(executor.count(&when(Book::model())).await.expect("count"), 5);
    let predicate = when(Book::model()).and(AUTHOR.field("name").not_equals("Italo Calvino"));
    let fetched = executor
        .fetch::<Book>(&predicate)
        .get()
        .await
        .expect("Could not fetch the books");
    assert_eq!(ids(&fetched, |b| b.id), BTreeSet::from([1, 2, 6, 7]));
    assert_eq!(executor.count(&predicate).await.expect("count"), 4);
}

#[cfg(test)]
mod tests {
    use sieve::{
        CompareOp, Comparison, ErrorKind, FieldDef, Group, GroupFlag, LogicalOp, ModelCollection,
        ModelDef, ModelRef, Node, Operand, Order, QueryPlan, Token, Value, Window, when,
    };
    use std::{
        collections::HashSet,
        sync::LazyLock,
    };

    static COLLECTION: LazyLock<ModelCollection> =
        LazyLock::new(|| ModelCollection::new("predicate"));

    static SHIP: LazyLock<ModelRef> = LazyLock::new(|| {
        ModelDef::builder("ship")
            .fields([
                FieldDef::of::<i32>("id"),
                FieldDef::of::<String>("name"),
                FieldDef::of::<f64>("tonnage"),
                FieldDef::of::<i32>("port").references("port", "id"),
            ])
            .collection(&COLLECTION)
            .build()
            .expect("Could not declare the ship model")
    });

    static PORT: LazyLock<ModelRef> = LazyLock::new(|| {
        ModelDef::builder("port")
            .fields([FieldDef::of::<i32>("id"), FieldDef::of::<String>("city")])
            .collection(&COLLECTION)
            .build()
            .expect("Could not declare the port model")
    });

    fn kinds(group: &Group) -> Vec<&'static str> {
        group
            .tokens()
            .map(|token| match token {
                Token::Open => "(",
                Token::Close => ")",
                Token::Logical(LogicalOp::And) => "and",
                Token::Logical(LogicalOp::Or) => "or",
                Token::Reference(r) if r.is_model() => "model",
                Token::Reference(..) => "field",
                Token::Literal(..) => "literal",
                Token::Comparison(..) => "cmp",
            })
            .collect()
    }

    #[test]
    fn tokens_follow_the_nesting() {
        let ship = &*SHIP;
        let group = when(ship.field("tonnage").gt(1000))
            .and(ship.field("name").equals("Endurance"))
            .or(when(ship.field("port").equals(1)).and(ship.field("port").equals(2)));
        assert_eq!(
            kinds(&group),
            ["(", "cmp", "and", "cmp", "or", "(", "cmp", "and", "cmp", ")", ")"]
        );

        // A single condition is never wrapped, an empty group adds nothing
        let group = when(when(ship.field("tonnage").gt(1000))).and(Group::new());
        assert_eq!(kinds(&group), ["cmp"]);

        // Models declare, they are not joined by operators
        let group = when(ship).and(ship.field("name").is_null()).and(&*PORT);
        assert_eq!(kinds(&group), ["(", "model", "cmp", "model", ")"]);
        assert_eq!(group.models(), vec![SHIP.clone(), PORT.clone()]);
    }

    #[test]
    fn raw_nodes() {
        let ship = &*SHIP;
        let mut group = Group::new();
        group
            .push(Node::Flag(GroupFlag::Open))
            .push(ship.field("tonnage").lt(10))
            .push(Node::Logical(LogicalOp::Or))
            .push(ship.field("tonnage").gt(100))
            .push(Node::Flag(GroupFlag::Close));
        assert_eq!(kinds(&group), ["(", "(", "cmp", "or", "cmp", ")", ")"]);
        assert!(QueryPlan::new(&group).is_ok());

        let mut unbalanced = Group::new();
        unbalanced
            .push(Node::Flag(GroupFlag::Open))
            .push(ship.field("tonnage").lt(10));
        let error = QueryPlan::new(&unbalanced).expect_err("Unbalanced groups are rejected");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::MalformedPredicate(..))
        ));
    }

    #[test]
    fn plans_need_a_model_and_known_fields() {
        let error = QueryPlan::new(&Group::new()).expect_err("No model to return");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::MalformedPredicate(..))
        ));
        let error = QueryPlan::new(&when(SHIP.field("speed").gt(3)))
            .expect_err("The ship has no speed");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::UnknownField { model, field }) if model == "ship" && field == "speed"
        ));
    }

    #[test]
    fn freezing() {
        let ship = &*SHIP;
        let group = when(ship.field("name").equals("Fram"));
        {
            let _tokens = group.tokens();
            assert!(group.is_frozen());
        }
        assert!(!group.is_frozen());

        let frozen = group.freeze();
        assert!(frozen.is_frozen());
        let unchanged = frozen
            .and(ship.field("tonnage").gt(1))
            .limit(3, 0)
            .sort([ship.field("id").asc()]);
        assert_eq!(kinds(&unchanged), ["cmp"]);
        assert_eq!(unchanged.max_results(), None);
        assert!(unchanged.sorting().is_empty());

        let copy = unchanged.clone();
        assert!(!copy.is_frozen());
        assert_eq!(kinds(&copy.and(ship.field("tonnage").gt(1))), ["(", "cmp", "and", "cmp", ")"]);
    }

    #[test]
    fn sorting_and_paging() {
        let ship = &*SHIP;
        let group = when(ship)
            .sort([
                ship.field("name").asc(),
                ship.field("tonnage").desc(),
                ship.field("name").desc(),
            ])
            .and(when(ship.field("id").gt(0)).sort([PORT.field("city").desc()]))
            .limit(10, 2);
        let sorting = group
            .sorting()
            .iter()
            .map(|r| (r.field.as_deref().unwrap_or_default(), r.order))
            .collect::<Vec<_>>();
        assert_eq!(
            sorting,
            [
                ("name", Order::ASC),
                ("tonnage", Order::DESC),
                ("city", Order::DESC)
            ]
        );
        assert_eq!(group.offset(), 20);
        assert_eq!(Window::of(&group), Window::new(20, Some(10)));
        assert_eq!(group.models(), vec![SHIP.clone(), PORT.clone()]);
        assert_eq!(Window::of(&when(ship)), Window::new(0, None));
    }

    #[test]
    fn equality_and_hashing() {
        let ship = &*SHIP;
        let make = || when(ship.field("name").equals("Terra Nova")).or(ship.field("id").lt(4));
        assert_eq!(make(), make());
        assert_ne!(make(), make().limit(1, 0));
        assert_ne!(make(), when(ship.field("name").equals("Terra Nova")));
        let set = HashSet::from([make(), make(), make().limit(1, 0)]);
        assert_eq!(set.len(), 2);

        // Same conditions, operators swapped
        let a = || ship.field("id").gt(1);
        let b = || ship.field("name").equals("Nimrod");
        let c = || ship.field("tonnage").lt(800.0);
        assert_ne!(when(a()).and(b()).or(c()), when(a()).or(b()).and(c()));

        // Built differently, equal token for token
        let chained = when(a()).and(b());
        let mut added = Group::new();
        added.add(a(), LogicalOp::Or).add(b(), LogicalOp::And);
        let nested = when(when(a()).and(b()));
        assert_eq!(chained, added);
        assert_eq!(chained, nested);
        let set = HashSet::from([chained, added, nested]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn targeting_puts_the_model_first() {
        let group = when(PORT.field("city").equals("Hobart")).limit(5, 1);
        let targeted = group.targeting(&SHIP);
        assert_eq!(targeted.models(), vec![SHIP.clone(), PORT.clone()]);
        assert_eq!(targeted.offset(), 5);
        assert_eq!(targeted.targeting(&SHIP), targeted);
    }

    #[test]
    fn comparisons() {
        let flipped = Comparison::new(3, CompareOp::Lt, SHIP.field("id")).normalized();
        assert_eq!(flipped.op, CompareOp::Gt);
        assert!(matches!(flipped.left, Operand::Reference(..)));
        assert_eq!(flipped.right, Operand::Literal(Value::Int32(Some(3))));

        assert_eq!(SHIP.field("name").is_null().null_check(), Some(true));
        assert_eq!(SHIP.field("name").is_not_null().null_check(), Some(false));
        assert_eq!(
            SHIP.field("name").equals(Value::Varchar(None)).null_check(),
            Some(true)
        );
        assert_eq!(SHIP.field("name").equals("Nimrod").null_check(), None);
        assert_eq!(SHIP.field("id").gt(Value::Null).null_check(), None);
    }
}

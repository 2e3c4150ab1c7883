//! End-to-end resolution and emission tests
//!
//! Each test builds a small record graph by hand, resolves it into a suite,
//! and checks registration, foreign-key filling, ordering, and the emitted
//! SQL.

use seedgraph::{
    emit_suite_to_string, resolve, BelongsTo, Computed, Factory, HasMany, Identity, ManyToMany,
    Record, SeedError, SqlOptions, Value,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_order_with_line_items() {
    init_tracing();
    let items: Vec<Record> = (1..=3)
        .map(|qty| Record::new("LineItem", Identity::auto("id")).with("qty", qty))
        .collect();
    let order = Record::new("Order", Identity::auto("id"))
        .with("items", HasMany::new(items.clone()).referring(["order_id"]));

    let suite = resolve(&order).unwrap();

    assert_eq!(suite["Order"].len(), 1);
    assert_eq!(suite["LineItem"].len(), 3);
    assert_eq!(order.value("id").unwrap(), Value::Int(1));
    for (i, item) in items.iter().enumerate() {
        assert_eq!(item.value("id").unwrap(), Value::Int(i as i64 + 1));
        assert_eq!(item.value("order_id").unwrap(), Value::Int(1));
    }
    // the schema everything points at comes first
    let schemas = suite.schemas();
    assert_eq!(schemas, vec!["Order", "LineItem"]);
}

#[test]
fn test_mutual_references_terminate() {
    let a = Record::new("A", Identity::auto("id"));
    let b = Record::new("B", Identity::auto("id"));
    a.set("b_id", BelongsTo::to(&b));
    b.set("a_id", BelongsTo::to(&a));

    let suite = resolve(&a).unwrap();
    assert_eq!(suite["A"].len(), 1);
    assert_eq!(suite["B"].len(), 1);
    assert_eq!(a.value("b_id").unwrap(), Value::Int(1));
    assert_eq!(b.value("a_id").unwrap(), Value::Int(1));
}

#[test]
fn test_shared_record_registers_once() {
    let team = Record::new("Team", Identity::auto("id"));
    let players: Vec<Record> = (0..2)
        .map(|_| Record::new("Player", Identity::auto("id")).with("team_id", BelongsTo::to(&team)))
        .collect();
    let roster = Record::new("Roster", Identity::auto("id")).with(
        "players",
        HasMany::new(players).referring(["roster_id"]),
    );

    let suite = resolve(&roster).unwrap();
    assert_eq!(suite["Team"].len(), 1);
    assert_eq!(suite["Player"].len(), 2);
}

#[test]
fn test_nested_collections_with_explicit_fields() {
    let grandchild = Record::new("Task", Identity::auto("id")).with("name", "t");
    let child = Record::new("Stage", Identity::auto("id"))
        .with("code", "build")
        .with(
            "tasks",
            HasMany::new([grandchild.clone()])
                .referring(["stage_code"])
                .referred(["code"]),
        );
    let root = Record::new("Pipeline", Identity::auto("id"))
        .with("stages", HasMany::new([child]).referring(["pipeline_id"]));

    let suite = resolve(&root).unwrap();
    assert_eq!(suite.schemas(), vec!["Pipeline", "Stage", "Task"]);
    assert_eq!(
        grandchild.value("stage_code").unwrap(),
        Value::Text("build".into())
    );
}

#[test]
fn test_foreign_key_inferred_from_child_declaration() {
    let child = Record::new("Comment", Identity::auto("id"))
        .with("post_ref", BelongsTo::schema("Post").local(["post_id"]));
    let root = Record::new("Post", Identity::auto("id"))
        .with("comments", HasMany::new([child.clone()]));

    resolve(&root).unwrap();
    assert_eq!(child.value("post_id").unwrap(), Value::Int(1));
}

#[test]
fn test_explicit_local_field_keeps_reference_out_of_emission() {
    let parent = Record::new("Node", Identity::field("id")).with("id", 10);
    let child = Record::new("Node", Identity::field("id"))
        .with("id", 11)
        .with("parent", BelongsTo::to(&parent).local(["parent_id"]));

    let suite = resolve(&child).unwrap();
    assert_eq!(child.value("parent_id").unwrap(), Value::Int(10));

    let sql = emit_suite_to_string(&suite, &SqlOptions::default()).unwrap();
    assert!(sql.contains("(`id`, `parent_id`)"));
    assert!(!sql.contains("`parent`"));
}

#[test]
fn test_absent_reference_resolves_null() {
    let node = Record::new("Node", Identity::auto("id"))
        .with("parent", BelongsTo::none().local(["parent_id"]));
    let suite = resolve(&node).unwrap();
    assert_eq!(node.value("parent_id").unwrap(), Value::Null);
    let sql = emit_suite_to_string(&suite, &SqlOptions::default()).unwrap();
    assert!(sql.contains("(1, NULL)"));
}

#[test]
fn test_computed_field_sees_filled_foreign_key() {
    let parent = Record::new("Parent", Identity::auto("id"));
    let child = Record::new("Child", Identity::auto("id")).with(
        "label",
        Computed::new(|record: &Record, _| {
            format!(
                "child-of-{}",
                record.value("parent_id").map(|v| v.to_string()).unwrap_or_default()
            )
        }),
    );
    parent.set("children", HasMany::new([child.clone()]).referring(["parent_id"]));

    resolve(&parent).unwrap();
    assert_eq!(
        child.value("label").unwrap(),
        Value::Text("child-of-1".into())
    );
}

// =============================================================================
// Many-to-many
// =============================================================================

#[test]
fn test_join_records_materialize_per_pair() {
    let tags: Vec<Record> = ["red", "blue"]
        .iter()
        .map(|name| Record::new("Tag", Identity::auto("id")).with("name", *name))
        .collect();
    let post = Record::new("Post", Identity::auto("id")).with(
        "tags",
        ManyToMany::new(tags, ["post_id"], ["tag_id"]).via("PostTag"),
    );

    let suite = resolve(&post).unwrap();
    assert_eq!(suite["PostTag"].len(), 2);
    for (i, join) in suite["PostTag"].records().iter().enumerate() {
        assert_eq!(join.value("post_id").unwrap(), Value::Int(1));
        assert_eq!(join.value("tag_id").unwrap(), Value::Int(i as i64 + 1));
    }
    // the declaring side first, then the other side, the join schema last
    assert_eq!(suite.schemas(), vec!["Post", "Tag", "PostTag"]);
}

#[test]
fn test_many_to_many_without_join_schema() {
    let tag = Record::new("Tag", Identity::auto("id"));
    let post = Record::new("Post", Identity::auto("id"))
        .with("tags", ManyToMany::new([tag], ["post_id"], ["tag_id"]));
    let suite = resolve(&post).unwrap();
    assert_eq!(suite["Tag"].len(), 1);
    assert!(suite.get("PostTag").is_none());
    // the declaring schema emits before the related schema
    assert_eq!(suite.schemas(), vec!["Post", "Tag"]);
}

// =============================================================================
// Validation errors
// =============================================================================

#[test]
fn test_referring_count_mismatch_message() {
    let child = Record::new("Child", Identity::auto("id"));
    let root = Record::new("Root", Identity::auto("id")).with(
        "items",
        HasMany::new([child])
            .referring(["a", "b"])
            .referred(["id"]),
    );
    let err = resolve(&root).unwrap_err();
    assert!(matches!(err, SeedError::ReferringCountMismatch { .. }));
    assert!(err.to_string().contains("(2 != 1)"));
}

#[test]
fn test_many_to_many_own_identity_arity_checked() {
    let tag = Record::new("Tag", Identity::auto("id"));
    let post = Record::new("Post", Identity::fields(["region", "num"]))
        .with("region", "eu")
        .with("num", 1)
        .with("tags", ManyToMany::new([tag], ["post_id"], ["tag_id"]));
    match resolve(&post).unwrap_err() {
        SeedError::ThisSideCountMismatch {
            fields, identity, ..
        } => {
            assert_eq!((fields, identity), (1, 2));
        }
        other => panic!("expected ThisSideCountMismatch, got {}", other),
    }
}

#[test]
fn test_many_to_many_arity_checked_against_identity() {
    let tag = Record::new("Tag", Identity::auto("id"));
    let post = Record::new("Post", Identity::auto("id")).with(
        "tags",
        ManyToMany::new([tag], ["post_id"], ["tag_id", "tag_kind"]),
    );
    assert!(matches!(
        resolve(&post).unwrap_err(),
        SeedError::OtherSideCountMismatch { .. }
    ));
}

// =============================================================================
// Emission
// =============================================================================

#[test]
fn test_full_emission_round() {
    let factory = Factory::new("customer")
        .identity(Identity::auto("id"))
        .default_field("active", true);
    let customer = factory.build_with([("name", "acme".into())]);
    let orders: Vec<Record> = (1..=2)
        .map(|n| {
            Record::new("order", Identity::auto("id"))
                .with("number", format!("ord-{}", n))
                .with("customer", BelongsTo::to(&customer).local(["customer_id"]))
        })
        .collect();
    let root = Record::new("batch", Identity::auto("id"))
        .with("orders", HasMany::new(orders).referring(["batch_id"]));

    let suite = resolve(&root).unwrap();
    let sql = emit_suite_to_string(&suite, &SqlOptions::default()).unwrap();

    let customer_pos = sql.find("INSERT INTO `customer`").unwrap();
    let order_pos = sql.find("INSERT INTO `order`").unwrap();
    assert!(customer_pos < order_pos);
    assert!(sql.contains("'acme'"));
    assert!(sql.contains("'ord-1'"));
    // both orders batch into one statement
    assert_eq!(sql.matches("INSERT INTO `order`").count(), 1);
}

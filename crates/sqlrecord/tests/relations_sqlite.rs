mod common;

use common::{Recording, seed_role, seed_user, setup};
use sqlrecord::prelude::*;
use sqlrecord::{ModelErrorKind, PendingCall};

fn seed_post(conn: &Recording, author_id: i64, title: &str) -> i64 {
    conn.raw(&format!(
        "INSERT INTO posts (author_id, title, version) VALUES ({author_id}, '{title}', 1)"
    ));
    conn.rows("SELECT MAX(id) AS id FROM posts", &[])[0]
        .get_by_name("id")
        .and_then(Value::as_i64)
        .expect("post id")
}

#[test]
fn belongs_to_resolves_once_and_is_cached() {
    let (conn, orm) = setup();
    let ann = seed_user(&conn, "ann");
    let post_id = seed_post(&conn, ann, "Hello");

    let mut post = orm.factory_with("post", post_id).expect("factory");
    post.column("title").expect("load post");
    conn.clear();

    let author = post
        .get("author")
        .expect("author")
        .into_record()
        .expect("record");
    assert!(author.loaded());
    assert_eq!(author.column("username").expect("username"), Value::from("ann"));
    assert_eq!(conn.count(), 1);
    assert_eq!(
        conn.last().as_deref(),
        Some(
            "SELECT \"users\".* FROM \"users\" WHERE \"users\".\"id\" = ?1 \
             ORDER BY \"users\".\"id\" ASC LIMIT 1"
        )
    );

    post.get("author").expect("cached author");
    assert_eq!(conn.count(), 1);
}

#[test]
fn missing_parents_are_cached_too() {
    let (conn, orm) = setup();
    let mut post = orm.factory("post").expect("factory");
    post.set("title", "orphan").expect("set");
    post.save().expect("save");
    conn.clear();

    let author = post
        .get("author")
        .expect("author")
        .into_record()
        .expect("record");
    assert!(!author.loaded());
    post.get("author").expect("author again");
    assert_eq!(conn.count(), 1);
}

#[test]
fn has_one_is_keyed_by_the_target_foreign_key() {
    let (conn, orm) = setup();
    let ann = seed_user(&conn, "ann");
    conn.raw(&format!(
        "INSERT INTO profiles (user_id, bio) VALUES ({ann}, 'likes rust')"
    ));

    let mut user = orm.factory_with("user", ann).expect("factory");
    let profile = user
        .get("profile")
        .expect("profile")
        .into_record()
        .expect("record");
    assert_eq!(profile.column("bio").expect("bio"), Value::from("likes rust"));
    assert_eq!(profile.column("user_id").expect("user_id"), Value::Int(ann));
}

#[test]
fn has_many_through_builds_a_pivot_join() {
    let (conn, orm) = setup();
    let user = orm.factory_with("user", 5).expect("factory");
    let mut roles = user.has_many("roles").expect("roles");
    conn.clear();

    let found = roles.find_all().expect("find_all");
    assert!(found.is_empty());
    assert_eq!(
        conn.last().as_deref(),
        Some(
            "SELECT \"roles\".* FROM \"roles\" \
             INNER JOIN \"roles_users\" ON \"roles_users\".\"role_id\" = \"roles\".\"id\" \
             WHERE \"roles_users\".\"user_id\" = ?1 ORDER BY \"roles\".\"id\" ASC"
        )
    );
}

#[test]
fn has_many_query_accepts_more_conditions() {
    let (conn, orm) = setup();
    let ann = seed_user(&conn, "ann");
    let bob = seed_user(&conn, "bob");
    seed_post(&conn, ann, "first");
    seed_post(&conn, ann, "second");
    seed_post(&conn, bob, "other");

    let mut user = orm.factory_with("user", ann).expect("factory");
    let mut posts = user
        .get("posts")
        .expect("posts")
        .into_query()
        .expect("query");
    assert_eq!(posts.find_all().expect("find_all").len(), 2);

    let mut posts = user.has_many("posts").expect("posts");
    let found = posts
        .where_("title", Op::Eq, "second")
        .find_all()
        .expect("find_all");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].object().get("title"), Some(&Value::from("second")));
}

#[test]
fn pivot_rows_are_added_checked_and_removed() {
    let (conn, orm) = setup();
    let ann = seed_user(&conn, "ann");
    let login = seed_role(&conn, "login");
    let admin = seed_role(&conn, "admin");

    let mut user = orm.factory_with("user", ann).expect("factory");
    let login = orm.factory_with("role", login).expect("login");
    let admin = orm.factory_with("role", admin).expect("admin");

    user.add("roles", &login, &[("granted_by", Value::from("root"))])
        .expect("add");
    assert!(user.has("roles", &login).expect("has login"));
    assert!(!user.has("roles", &admin).expect("has admin"));

    let pivot = conn.rows(
        "SELECT granted_by FROM roles_users WHERE user_id = ?1",
        &[Value::Int(ann)],
    );
    assert_eq!(pivot.len(), 1);
    assert_eq!(pivot[0].get_by_name("granted_by"), Some(&Value::from("root")));

    let roles = user
        .get("roles")
        .expect("roles")
        .into_query()
        .expect("query")
        .find_all()
        .expect("find_all");
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].object().get("name"), Some(&Value::from("login")));

    user.remove("roles", &login).expect("remove");
    assert!(!user.has("roles", &login).expect("has after remove"));
}

#[test]
fn pivot_operations_need_a_pivot_table() {
    let (conn, orm) = setup();
    let ann = seed_user(&conn, "ann");
    let mut user = orm.factory_with("user", ann).expect("factory");
    let post = orm.factory("post").expect("post");

    let err = user.add("posts", &post, &[]).expect_err("no pivot");
    assert_eq!(err.model_kind(), Some(ModelErrorKind::InvalidRelation));

    let err = user.related("roles").expect_err("not one-to-one");
    assert_eq!(err.model_kind(), Some(ModelErrorKind::InvalidRelation));
}

#[test]
fn set_related_copies_the_parent_key() {
    let (conn, orm) = setup();
    let mut author = orm.factory("user").expect("factory");
    author.set("id", 42).expect("set id");
    author.set("username", "ann").expect("set username");
    author.save().expect("save");
    assert_eq!(author.pk(), Value::Int(42));

    let mut post = orm.factory("post").expect("factory");
    post.set_related("author", author).expect("set_related");
    assert_eq!(post.object().get("author_id"), Some(&Value::Int(42)));
    assert_eq!(post.changed().len(), 1);
    assert!(post.changed().contains("author_id"));

    conn.clear();
    let cached = post
        .get("author")
        .expect("author")
        .into_record()
        .expect("record");
    assert_eq!(cached.column("username").expect("username"), Value::from("ann"));
    assert_eq!(conn.count(), 0);

    let err = post
        .set_related("title", orm.factory("user").expect("user"))
        .expect_err("not a relation");
    assert!(err.is_unknown_property());
}

#[test]
fn changing_the_foreign_key_drops_the_cached_parent() {
    let (conn, orm) = setup();
    let ann = seed_user(&conn, "ann");
    let bob = seed_user(&conn, "bob");
    let post_id = seed_post(&conn, ann, "Hello");

    let mut post = orm.factory_with("post", post_id).expect("factory");
    let author = post.get("author").expect("author").into_record().expect("record");
    assert_eq!(author.column("username").expect("username"), Value::from("ann"));

    post.set("author_id", bob).expect("set fk");
    let author = post.get("author").expect("author").into_record().expect("record");
    assert_eq!(author.column("username").expect("username"), Value::from("bob"));
}

#[test]
fn with_joins_each_path_segment_once() {
    let (_conn, orm) = setup();
    let mut post = orm.factory("post").expect("factory");
    post.with("author:profile")
        .expect("with")
        .with("author:profile")
        .expect("with again")
        .with("author")
        .expect("parent path");

    let joins = post
        .pending()
        .iter()
        .filter(|call| matches!(call, PendingCall::Join { .. }))
        .count();
    assert_eq!(joins, 2);

    // Paths that are not one-to-one are ignored
    let mut user = orm.factory("user").expect("factory");
    user.with("roles").expect("with has_many");
    assert!(user.pending().is_empty());
}

#[test]
fn with_loads_joined_records_without_further_queries() {
    let (conn, orm) = setup();
    let ann = seed_user(&conn, "ann");
    conn.raw(&format!("INSERT INTO profiles (user_id, bio) VALUES ({ann}, 'hi')"));
    let post_id = seed_post(&conn, ann, "Hello");

    let mut post = orm.factory("post").expect("factory");
    post.with("author:profile")
        .expect("with")
        .find_by_pk(post_id)
        .expect("find");
    assert!(post.loaded());
    assert_eq!(post.column("title").expect("title"), Value::from("Hello"));
    assert!(post.pending().is_empty());
    conn.clear();

    let author = post.get("author").expect("author").into_record().expect("record");
    assert!(author.loaded());
    assert_eq!(author.column("username").expect("username"), Value::from("ann"));
    let profile = author.get("profile").expect("profile").into_record().expect("record");
    assert_eq!(profile.column("bio").expect("bio"), Value::from("hi"));
    assert_eq!(conn.count(), 0);
}

#[test]
fn find_all_with_joins_fills_every_record() {
    let (conn, orm) = setup();
    let ann = seed_user(&conn, "ann");
    let bob = seed_user(&conn, "bob");
    seed_post(&conn, ann, "first");
    seed_post(&conn, bob, "second");

    let mut posts = orm.factory("post").expect("factory");
    let found = posts.with("author").expect("with").find_all().expect("find_all");
    assert_eq!(found.len(), 2);
    conn.clear();

    let names: Vec<Value> = found
        .into_iter()
        .map(|mut post| {
            let author = post.get("author").expect("author").into_record().expect("record");
            author.column("username").expect("username")
        })
        .collect();
    assert_eq!(names, vec![Value::from("ann"), Value::from("bob")]);
    assert_eq!(conn.count(), 0);
}

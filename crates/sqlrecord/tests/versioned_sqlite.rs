mod common;

use common::{Recording, setup};
use sqlrecord::prelude::*;

fn history(conn: &Recording, post_id: &Value) -> Vec<(i64, String)> {
    conn.rows(
        "SELECT version, title FROM posts_versions WHERE post_id = ?1 ORDER BY version",
        std::slice::from_ref(post_id),
    )
    .into_iter()
    .map(|row| {
        let version = row.get_by_name("version").and_then(Value::as_i64).expect("version");
        let title = row
            .get_by_name("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        (version, title)
    })
    .collect()
}

fn saved_post(orm: &Orm, titles: &[&str]) -> Versioned {
    let mut post = Versioned::new(orm.factory("post").expect("factory"));
    for title in titles {
        post.set("title", *title).expect("set title");
        post.save().expect("save");
    }
    post
}

#[test]
fn every_save_writes_a_history_row() {
    let (conn, orm) = setup();
    let post = saved_post(&orm, &["draft 1", "draft 2", "draft 3"]);

    assert_eq!(post.last_version(), Some(3));
    assert_eq!(post.object().get("version"), Some(&Value::Int(3)));
    assert_eq!(
        history(&conn, &post.pk()),
        vec![
            (1, "draft 1".to_string()),
            (2, "draft 2".to_string()),
            (3, "draft 3".to_string()),
        ]
    );
}

#[test]
fn saving_a_keyed_record_continues_from_the_stored_version() {
    let (conn, orm) = setup();
    conn.raw("INSERT INTO posts (id, title, version) VALUES (7, 'imported', 4)");

    let mut post = Versioned::new(orm.factory_with("post", 7).expect("factory"));
    post.set("title", "edited").expect("set");
    post.save().expect("save");

    assert_eq!(post.last_version(), Some(5));
    assert_eq!(post.object().get("title"), Some(&Value::from("edited")));
    assert_eq!(history(&conn, &Value::Int(7)), vec![(5, "edited".to_string())]);
}

#[test]
fn a_failed_save_does_not_skip_a_version() {
    let (conn, orm) = setup();
    let mut post = saved_post(&orm, &["draft 1"]);

    conn.raw("ALTER TABLE posts RENAME TO posts_moved");
    post.set("title", "draft 2").expect("set");
    assert!(post.save().is_err());
    assert_eq!(post.last_version(), Some(1));

    conn.raw("ALTER TABLE posts_moved RENAME TO posts");
    post.save().expect("save");
    assert_eq!(post.last_version(), Some(2));
    assert_eq!(
        history(&conn, &post.pk()),
        vec![(1, "draft 1".to_string()), (2, "draft 2".to_string())]
    );
}

#[test]
fn restore_saves_an_old_state_as_a_new_version() {
    let (conn, orm) = setup();
    let mut post = saved_post(&orm, &["draft 1", "draft 2", "draft 3"]);

    post.restore(1).expect("restore");
    assert_eq!(post.last_version(), Some(4));
    assert_eq!(post.object().get("title"), Some(&Value::from("draft 1")));

    let rows = conn.rows("SELECT title, version FROM posts WHERE id = ?1", &[post.pk()]);
    assert_eq!(rows[0].get_by_name("title"), Some(&Value::from("draft 1")));
    assert_eq!(rows[0].get_by_name("version"), Some(&Value::Int(4)));
    assert_eq!(history(&conn, &post.pk()).len(), 4);

    // Unknown versions leave the record alone
    post.restore(99).expect("restore missing");
    assert_eq!(post.last_version(), Some(4));
}

#[test]
fn previous_shows_the_earlier_version_without_saving() {
    let (conn, orm) = setup();
    let saved = saved_post(&orm, &["draft 1", "draft 2"]);
    let id = saved.pk();

    let mut post = Versioned::new(orm.factory_with("post", id.clone()).expect("factory"));
    post.column("title").expect("load");
    conn.clear();

    post.previous().expect("previous");
    assert_eq!(post.object().get("title"), Some(&Value::from("draft 1")));
    assert_eq!(post.object().get("version"), Some(&Value::Int(1)));
    assert_eq!(post.pk(), id);
    assert_eq!(post.last_version(), Some(2));
    assert_eq!(conn.count(), 1);
    assert!(conn.last().expect("sql").contains("\"posts_versions\""));
}

#[test]
fn previous_on_an_unloaded_record_does_nothing() {
    let (conn, orm) = setup();
    let mut post = Versioned::new(orm.factory("post").expect("factory"));
    post.previous().expect("previous");
    assert_eq!(post.last_version(), None);
    assert_eq!(conn.count(), 0);
}

#[test]
fn delete_removes_the_history() {
    let (conn, orm) = setup();
    let mut post = saved_post(&orm, &["draft 1", "draft 2"]);
    let other = saved_post(&orm, &["kept"]);

    post.delete().expect("delete");
    assert!(!post.loaded());
    assert_eq!(post.last_version(), None);
    assert_eq!(conn.count_rows("posts"), 1);
    assert_eq!(history(&conn, &other.pk()).len(), 1);
    assert_eq!(conn.count_rows("posts_versions"), 1);
}

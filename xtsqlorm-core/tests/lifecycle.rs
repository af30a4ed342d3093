mod common;

use common::{fixture, Post, User};
use xtsqlorm::{record, Error, Operations, Repository};

#[tokio::test]
async fn create_stamps_timestamps_and_version() {
    let fx = fixture().await;
    let posts: Repository<Post> = Repository::new(fx.provider.clone());

    let post = posts.create(&record! { "title" => "hello" }).await.unwrap();
    assert_eq!(post.version, 0);
    assert!(post.created_at.is_some());
    assert_eq!(post.created_at, post.updated_at);
    assert_eq!(post.deleted_at, None);

    let kept = posts
        .create(&record! { "title" => "old", "created_at" => "2001-02-03 04:05:06" })
        .await
        .unwrap();
    assert_eq!(kept.created_at.as_deref(), Some("2001-02-03 04:05:06"));
}

#[tokio::test]
async fn updates_bump_the_version() {
    let fx = fixture().await;
    let posts: Repository<Post> = Repository::new(fx.provider.clone());
    let post = posts
        .create(&record! { "title" => "a", "updated_at" => "2001-01-01 00:00:00" })
        .await
        .unwrap();

    let post = posts.update(post.id, &record! { "title" => "b" }).await.unwrap().unwrap();
    assert_eq!(post.version, 1);
    assert_ne!(post.updated_at.as_deref(), Some("2001-01-01 00:00:00"));

    let post = posts
        .update(post.id, &record! { "title" => "c", "version" => 1 })
        .await
        .unwrap()
        .unwrap();
    assert_eq!((post.title.as_str(), post.version), ("c", 2));
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let fx = fixture().await;
    let posts: Repository<Post> = Repository::new(fx.provider.clone());
    let post = posts.create(&record! { "title" => "draft" }).await.unwrap();
    posts.update(post.id, &record! { "title" => "first" }).await.unwrap();

    let err = posts
        .update(post.id, &record! { "title" => "second", "version" => 0 })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::VersionConflict { id, .. } if id == post.id));
    assert_eq!(posts.get_by_id(post.id).await.unwrap().unwrap().title, "first");

    // A guarded update of a missing row is still just "not found"
    let missing = posts
        .update(999, &record! { "title" => "x", "version" => 0 })
        .await
        .unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn soft_delete_and_restore() {
    let fx = fixture().await;
    let posts: Repository<Post> = Repository::new(fx.provider.clone());
    let a = posts.create(&record! { "title" => "a" }).await.unwrap();
    let b = posts.create(&record! { "title" => "b" }).await.unwrap();

    assert!(posts.soft_delete(a.id).await.unwrap());
    assert!(!posts.soft_delete(a.id).await.unwrap());
    assert!(!posts.soft_delete(999).await.unwrap());

    let active = posts.get_active(None, None).await.unwrap();
    assert_eq!(active.iter().map(|p| p.id).collect::<Vec<_>>(), vec![b.id]);
    let deleted = posts.get_deleted(None, None).await.unwrap();
    assert_eq!(deleted.len(), 1);
    assert!(deleted[0].deleted_at.is_some());
    assert_eq!(posts.get_all(None, None).await.unwrap().len(), 2);

    assert!(posts.restore(a.id).await.unwrap());
    assert!(!posts.restore(a.id).await.unwrap());
    assert_eq!(posts.get_active(None, None).await.unwrap().len(), 2);
    assert!(posts.get_deleted(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn purge_removes_only_old_deletions() {
    let fx = fixture().await;
    let ops: Operations<Post> = Operations::for_model(fx.provider.clone());
    let old = ops.create(&record! { "title" => "old" }).await.unwrap();
    let recent = ops.create(&record! { "title" => "recent" }).await.unwrap();
    let live = ops.create(&record! { "title" => "live" }).await.unwrap();

    ops.update(old.id, &record! { "deleted_at" => "2000-01-01 00:00:00" })
        .await
        .unwrap();
    assert!(ops.soft_delete(recent.id).await.unwrap());

    assert_eq!(ops.permanent_delete_old_records(30).await.unwrap(), 1);
    assert!(!ops.exists(old.id).await.unwrap());
    assert!(ops.exists(recent.id).await.unwrap());
    assert!(ops.exists(live.id).await.unwrap());
}

#[tokio::test]
async fn soft_delete_needs_a_marker_column() {
    let fx = fixture().await;
    let users: Repository<User> = Repository::new(fx.provider.clone());
    let alice = users.create(&record! { "username" => "alice" }).await.unwrap();

    assert!(matches!(users.soft_delete(alice.id).await, Err(Error::Schema(_))));
    assert!(matches!(users.get_deleted(None, None).await, Err(Error::Schema(_))));
    assert!(users.exists(alice.id).await.unwrap());
}

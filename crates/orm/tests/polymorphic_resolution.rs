mod common;

use std::sync::Arc;

use common::{insert, kinds, Fixture};
use polymorphic_orm::{
    Criteria, DiscriminatorMatch, FindOne, Operation, OrmError, PolymorphicRepository, Record,
    RelationDeclaration, Repository, ResolverConfig, Resolved, SaveOptions,
};
use serde_json::json;

#[tokio::test]
async fn test_non_polymorphic_kind_passes_through() {
    let fixture = Fixture::new();
    let photos = fixture.engine("Photo");
    let wrapped = fixture.polymorphic(photos.clone());
    assert!(!wrapped.is_polymorphic());

    let saved = wrapped
        .save(Record::new("Photo").with("url", "a.png"), SaveOptions::default())
        .await
        .unwrap();
    assert_eq!(saved, Record::new("Photo").with("id", 1).with("url", "a.png"));

    let all = Criteria::new();
    assert_eq!(wrapped.find(&all).await.unwrap(), photos.find(&all).await.unwrap());
    assert_eq!(
        wrapped.find_one(&FindOne::by_id(1)).await.unwrap(),
        photos.find_one(&FindOne::by_id(1)).await.unwrap()
    );
    assert_eq!(
        wrapped.create(Some(Record::new("Photo").with("url", "b.png"))).await.unwrap(),
        photos.create(Some(Record::new("Photo").with("url", "b.png"))).await.unwrap()
    );

    assert!(fixture
        .journal
        .entries()
        .iter()
        .all(|entry| entry.kind.as_str() == "Photo"));
}

#[tokio::test]
async fn test_parent_hydration() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register("Comment", RelationDeclaration::parent("owner", || vec!["Post".into(), "Video".into()]))
        .unwrap();

    let posts = fixture.engine("Post");
    let comments = fixture.engine("Comment");
    fixture.engine("Video");

    let post = insert(&posts, Record::new("Post").with("id", 5).with("title", "hello")).await;
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", 5)).await;
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", 99)).await;

    let repository = fixture.polymorphic(comments);
    let linked = repository.find_one(&FindOne::by_id(1)).await.unwrap().unwrap();
    assert_eq!(linked.parent("owner"), Some(&post));

    let dangling = repository.find_one(&FindOne::by_id(2)).await.unwrap().unwrap();
    assert!(dangling.parent("owner").is_none());
    assert_eq!(dangling.relation("owner"), Some(&Resolved::Single(None)));
}

#[tokio::test]
async fn test_parent_without_discriminator_skips_lookup() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register("Comment", RelationDeclaration::parent("owner", || vec!["Post".into()]))
        .unwrap();
    fixture.engine("Post");
    let comments = fixture.engine("Comment");
    insert(&comments, Record::new("Comment").with("body", "orphan")).await;
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", serde_json::Value::Null)).await;

    let repository = fixture.polymorphic(comments);
    let found = repository.find(&Criteria::new()).await.unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|comment| comment.parent("owner").is_none()));
    assert!(fixture.journal.entries().iter().all(|entry| entry.kind.as_str() != "Post"));
}

#[tokio::test]
async fn test_parent_declared_has_many_stays_single() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register(
            "Comment",
            RelationDeclaration::parent("owner", || vec!["Post".into()]).has_many(true),
        )
        .unwrap();

    let posts = fixture.engine("Post");
    let comments = fixture.engine("Comment");
    let post = insert(&posts, Record::new("Post").with("id", 5)).await;
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", 5)).await;
    insert(&comments, Record::new("Comment").with("body", "orphan")).await;

    let repository = fixture.polymorphic(comments);
    let linked = repository.find_one(&FindOne::by_id(1)).await.unwrap().unwrap();
    assert_eq!(linked.parent("owner"), Some(&post));
    assert_eq!(linked.relation("owner"), Some(&Resolved::Single(Some(Box::new(post)))));

    let orphan = repository.find_one(&FindOne::by_id(2)).await.unwrap().unwrap();
    assert_eq!(orphan.relation("owner"), Some(&Resolved::Single(None)));
}

#[tokio::test]
async fn test_children_concatenate_in_target_order() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register(
            "Post",
            RelationDeclaration::children("responses", || vec!["Comment".into(), "Reply".into()]),
        )
        .unwrap();

    let posts = fixture.engine("Post");
    let comments = fixture.engine("Comment");
    let replies = fixture.engine("Reply");

    insert(&posts, Record::new("Post").with("id", 7)).await;
    // The reply is stored first; the result still lists comments first.
    insert(&replies, Record::new("Reply").with("entityType", "Post").with("entityId", 7)).await;
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", 7)).await;
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", 7)).await;
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", 8)).await;
    insert(&comments, Record::new("Comment").with("entityType", "Video").with("entityId", 7)).await;

    let repository = fixture.polymorphic(posts);
    let post = repository.find_one(&FindOne::by_id(7)).await.unwrap().unwrap();
    let responses = post.children("responses");

    assert_eq!(responses.len(), 3);
    assert_eq!(kinds(responses), vec!["Comment", "Comment", "Reply"]);
    assert_eq!(responses[0].get("id"), Some(&json!(1)));
    assert_eq!(responses[1].get("id"), Some(&json!(2)));
}

#[tokio::test]
async fn test_single_valued_children_keep_first_candidate() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register(
            "Post",
            RelationDeclaration::children("pinned", || vec!["Comment".into(), "Reply".into()]).has_many(false),
        )
        .unwrap();

    let posts = fixture.engine("Post");
    let comments = fixture.engine("Comment");
    let replies = fixture.engine("Reply");
    insert(&posts, Record::new("Post").with("id", 1)).await;
    insert(&posts, Record::new("Post").with("id", 2)).await;
    insert(&replies, Record::new("Reply").with("entityType", "Post").with("entityId", 1)).await;
    insert(&replies, Record::new("Reply").with("entityType", "Post").with("entityId", 2)).await;
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", 2)).await;

    let repository = fixture.polymorphic(posts);
    let found = repository.find(&Criteria::new()).await.unwrap();

    assert_eq!(found[0].parent("pinned").map(|r| r.kind().as_str()), Some("Reply"));
    assert_eq!(found[1].parent("pinned").map(|r| r.kind().as_str()), Some("Comment"));
}

#[tokio::test]
async fn test_target_kind_discriminator_mode() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register("Post", RelationDeclaration::children("tags", || vec!["Tag".into()]))
        .unwrap();

    let posts = fixture.engine("Post");
    let tags = fixture.engine("Tag");
    insert(&posts, Record::new("Post").with("id", 3)).await;
    insert(&tags, Record::new("Tag").with("entityType", "Tag").with("entityId", 3)).await;
    insert(&tags, Record::new("Tag").with("entityType", "Post").with("entityId", 3)).await;

    let by_target = fixture.polymorphic_with(
        posts.clone(),
        ResolverConfig::new().with_discriminator_match(DiscriminatorMatch::TargetKind),
    );
    let post = by_target.find_one(&FindOne::by_id(3)).await.unwrap().unwrap();
    assert_eq!(post.children("tags").len(), 1);
    assert_eq!(post.children("tags")[0].get("entityType"), Some(&json!("Tag")));

    let by_owner = fixture.polymorphic(posts);
    let post = by_owner.find_one(&FindOne::by_id(3)).await.unwrap().unwrap();
    assert_eq!(post.children("tags")[0].get("entityType"), Some(&json!("Post")));
}

#[tokio::test]
async fn test_hydration_is_idempotent() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register("Post", RelationDeclaration::children("comments", || vec!["Comment".into()]))
        .unwrap();

    let posts = fixture.engine("Post");
    let comments = fixture.engine("Comment");
    let post = insert(&posts, Record::new("Post").with("title", "t")).await;
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", 1)).await;

    let repository = fixture.polymorphic(posts);
    let first = repository.hydrate_one(post.clone()).await.unwrap();
    let second = repository.hydrate_one(post).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(repository.hydrate_one(first.clone()).await.unwrap(), first);
}

#[tokio::test]
async fn test_hydrate_many_preserves_input_order() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register("Post", RelationDeclaration::children("comments", || vec!["Comment".into()]))
        .unwrap();

    let posts = fixture.engine("Post");
    let comments = fixture.engine("Comment");
    for id in 1..=4 {
        insert(&posts, Record::new("Post").with("id", id)).await;
        for _ in 0..id {
            insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", id)).await;
        }
    }

    let repository = fixture.polymorphic(posts.clone());
    let mut loaded = posts.find(&Criteria::new()).await.unwrap();
    loaded.reverse();

    let hydrated = repository.hydrate_many(loaded).await.unwrap();
    let counts: Vec<usize> = hydrated.iter().map(|post| post.children("comments").len()).collect();
    assert_eq!(counts, vec![4, 3, 2, 1]);
}

#[tokio::test]
async fn test_lazy_relations_only_resolve_explicitly() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register("Post", RelationDeclaration::children("comments", || vec!["Comment".into()]).eager(false))
        .unwrap();

    let posts = fixture.engine("Post");
    let comments = fixture.engine("Comment");
    insert(&posts, Record::new("Post").with("id", 1)).await;
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", 1)).await;

    let repository = fixture.polymorphic(posts);
    let post = repository.find_one(&FindOne::by_id(1)).await.unwrap().unwrap();
    assert!(post.relation("comments").is_none());

    let post = repository.hydrate_one(post).await.unwrap();
    assert_eq!(post.children("comments").len(), 1);
}

#[tokio::test]
async fn test_find_one_without_match_skips_hydration() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register("Post", RelationDeclaration::children("comments", || vec!["Comment".into()]))
        .unwrap();

    let repository = fixture.polymorphic(fixture.engine("Post"));
    assert!(repository.find_one(&FindOne::by_id(42)).await.unwrap().is_none());

    // Comment has no repository, so any hydration attempt would have failed.
    let entries = fixture.journal.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, Operation::FindOne);
}

#[tokio::test]
async fn test_unmapped_children_kind_fails_hydration() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register(
            "Post",
            RelationDeclaration::children("attachments", || vec!["Comment".into(), "Tag".into()]),
        )
        .unwrap();

    let posts = fixture.engine("Post");
    fixture.engine("Comment");
    insert(&posts, Record::new("Post").with("id", 1)).await;

    let repository = fixture.polymorphic(posts);
    let err = repository.find_one(&FindOne::by_id(1)).await.unwrap_err();
    assert_eq!(err, OrmError::RepositoryNotFound("Tag".to_string()));

    let err = repository.find(&Criteria::new()).await.unwrap_err();
    assert!(err.is_repository_not_found());
}

#[tokio::test]
async fn test_unmapped_parent_kind_fails_hydration() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register("Comment", RelationDeclaration::parent("owner", || vec!["Post".into()]))
        .unwrap();

    let comments = fixture.engine("Comment");
    insert(&comments, Record::new("Comment").with("entityType", "Article").with("entityId", 1)).await;

    let repository = fixture.polymorphic(comments);
    let err = repository.find(&Criteria::new()).await.unwrap_err();
    assert_eq!(err, OrmError::RepositoryNotFound("Article".to_string()));
}

#[tokio::test]
async fn test_custom_repository_token() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register("Comment", RelationDeclaration::parent("owner", || vec!["Post".into()]))
        .unwrap();

    let live = fixture.engine("Post");
    let archive = fixture.unregistered_engine("Post");
    fixture
        .repositories
        .register_custom("Post", "ArchivedPostRepository", archive.clone());

    insert(&live, Record::new("Post").with("id", 1).with("title", "live")).await;
    insert(&archive, Record::new("Post").with("id", 1).with("title", "archived")).await;

    let comments = fixture.engine("Comment");
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", 1)).await;

    let repository = fixture.polymorphic(comments);
    let comment = repository.find_one(&FindOne::by_id(1)).await.unwrap().unwrap();
    assert_eq!(
        comment.parent("owner").and_then(|post| post.get("title")),
        Some(&json!("archived"))
    );
}

#[tokio::test]
async fn test_nested_hydration_through_polymorphic_target() {
    let fixture = Fixture::new();
    fixture
        .registry
        .register("Comment", RelationDeclaration::parent("owner", || vec!["Post".into()]))
        .unwrap();
    fixture
        .registry
        .register("Post", RelationDeclaration::children("tags", || vec!["Tag".into()]))
        .unwrap();

    let posts = fixture.unregistered_engine("Post");
    let tags = fixture.engine("Tag");
    let comments = fixture.engine("Comment");

    let polymorphic_posts = fixture.polymorphic(posts.clone());
    fixture.repositories.register(Arc::new(polymorphic_posts) as Arc<dyn Repository>);

    insert(&posts, Record::new("Post").with("id", 2)).await;
    insert(&tags, Record::new("Tag").with("entityType", "Post").with("entityId", 2).with("name", "rust")).await;
    insert(&comments, Record::new("Comment").with("entityType", "Post").with("entityId", 2)).await;

    let repository: PolymorphicRepository = fixture.polymorphic(comments);
    let comment = repository.find_one(&FindOne::by_id(1)).await.unwrap().unwrap();
    let owner = comment.parent("owner").unwrap();

    assert_eq!(owner.children("tags").len(), 1);
    assert_eq!(
        comment.to_json(),
        json!({
            "id": 1,
            "entityType": "Post",
            "entityId": 2,
            "owner": {
                "id": 2,
                "tags": [{"id": 1, "entityType": "Post", "entityId": 2, "name": "rust"}]
            }
        })
    );
}

use std::sync::Arc;

use super::*;
use crate::models::{Conversation, Message, Model, builtin_models};
use crate::storage::sqlite::Sqlite;
use crate::store::{ConversationStore, Seed};

async fn repository() -> (Repository, ArcStorage) {
    let storage: ArcStorage = Arc::new(Sqlite::new(None).await.expect("Failed to open storage"));
    (Repository::new(storage.clone()), storage)
}

#[tokio::test]
async fn test_load_empty_storage() {
    let (repo, _) = repository().await;
    let snapshot = repo.load(&Catalog::default()).await.unwrap();
    assert!(snapshot.conversations.is_empty());
    assert_eq!(snapshot.default_model, None);
}

#[tokio::test]
async fn test_save_and_load() {
    let (repo, storage) = repository().await;

    let mut store = ConversationStore::new(Catalog::default());
    store.set_default_model("qwen-max").unwrap();
    let id = store.create(Seed::default().with_title("Second"));
    store
        .update(&id, |c| c.append_message(Message::new_user("hello")))
        .unwrap();

    repo.save(&store.snapshot()).await.unwrap();
    assert_eq!(
        storage.get_item(DEFAULT_MODEL_KEY).await.unwrap().as_deref(),
        Some("qwen-max")
    );

    let snapshot = repo.load(&Catalog::default()).await.unwrap();
    assert_eq!(snapshot.default_model.as_deref(), Some("qwen-max"));
    assert_eq!(snapshot.conversations.len(), 2);

    let restored = ConversationStore::from_snapshot(Catalog::default(), snapshot);
    assert_eq!(restored.active_id(), id);
    assert_eq!(restored.active().title(), "Second");
    assert_eq!(restored.active().messages()[0].content(), "hello");
    assert_eq!(restored.default_model(), "qwen-max");
}

#[tokio::test]
async fn test_load_corrupted_storage() {
    let (repo, storage) = repository().await;
    storage.set_item(CONVERSATIONS_KEY, "{not json").await.unwrap();
    storage.set_item(DEFAULT_MODEL_KEY, "  ").await.unwrap();

    let snapshot = repo.load(&Catalog::default()).await.unwrap();
    assert!(snapshot.conversations.is_empty());
    assert_eq!(snapshot.default_model, None);

    let store = ConversationStore::from_snapshot(Catalog::default(), snapshot);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_load_uses_stored_default_model_for_unknown_ids() {
    let (repo, storage) = repository().await;
    let raw = serde_json::to_string(&vec![
        Conversation::default().with_id("a"),
    ])
    .unwrap()
    .replace("\"qwen3\"", "\"gpt-2\"");
    storage.set_item(CONVERSATIONS_KEY, &raw).await.unwrap();
    storage.set_item(DEFAULT_MODEL_KEY, "qwen-plus").await.unwrap();

    let snapshot = repo.load(&Catalog::default()).await.unwrap();
    assert_eq!(snapshot.conversations[0].model_id(), "qwen-plus");
}

#[tokio::test]
async fn test_save_without_default_model_removes_key() {
    let (repo, storage) = repository().await;
    storage.set_item(DEFAULT_MODEL_KEY, "qwen3").await.unwrap();

    repo.save(&Snapshot::default()).await.unwrap();
    assert_eq!(storage.get_item(DEFAULT_MODEL_KEY).await.unwrap(), None);
    assert_eq!(
        storage.get_item(CONVERSATIONS_KEY).await.unwrap().as_deref(),
        Some("[]")
    );
}

fn served_catalog() -> Catalog {
    let mut models = builtin_models();
    models.push(Model::new("qwen-turbo"));
    Catalog::new(models)
}

#[tokio::test]
async fn test_served_model_survives_restart() {
    let (repo, _) = repository().await;

    let mut store = repo.restore(served_catalog()).await;
    let id = store.active_id().to_string();
    store.set_model(&id, "qwen-turbo").unwrap();
    store.set_default_model("qwen-turbo").unwrap();
    repo.save(&store.snapshot()).await.unwrap();

    let mut restored = repo.restore(served_catalog()).await;
    assert_eq!(restored.reconcile_models(served_catalog().models().to_vec()), 0);
    assert_eq!(restored.get(&id).unwrap().model_id(), "qwen-turbo");
    assert_eq!(restored.default_model(), "qwen-turbo");

    // Once the server stops serving it, reconciliation moves everything off it.
    let mut shrunk = repo.restore(Catalog::new(builtin_models())).await;
    assert_eq!(shrunk.get(&id).unwrap().model_id(), "qwen3");
    assert_eq!(shrunk.default_model(), "qwen3");
    assert_eq!(shrunk.reconcile_models(builtin_models()), 0);
}

#[tokio::test]
async fn test_restore_seeds_fresh_store() {
    let (repo, _) = repository().await;
    let store = repo.restore(served_catalog()).await;
    assert_eq!(store.len(), 1);
    assert!(store.catalog().has_model("qwen-turbo"));
}

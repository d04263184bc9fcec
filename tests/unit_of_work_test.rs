mod common;

use std::sync::Arc;

use serde_json::json;
use tracked_unit_of_work::{
    DbContext, DynamicResponse, Entity, MemoryStore, PagingModel, SortDirection, Store, StoreError,
    UnitOfWork, UnitOfWorkError, UnitOfWorkFactory, UnitOfWorkOptions, ValidationPolicy,
};
use uuid::Uuid;

use common::{registry, Auction, Bidder, Orchid, OrchidSummary, RecordingObserver};

fn factory() -> UnitOfWorkFactory<MemoryStore> {
    UnitOfWorkFactory::new(MemoryStore::new(), registry())
}

#[tokio::test]
async fn test_repository_is_cached_per_entity_kind() {
    let factory = factory();
    let mut uow = factory.begin();

    let orchids1 = uow.repository::<Orchid>().expect("Failed to get orchid repository");
    let orchids2 = uow.repository::<Orchid>().expect("Failed to get orchid repository");
    let auctions = uow.repository::<Auction>().expect("Failed to get auction repository");

    assert!(Arc::ptr_eq(&orchids1, &orchids2));
    assert_ne!(
        Arc::as_ptr(&orchids1) as *const (),
        Arc::as_ptr(&auctions) as *const ()
    );

    // A change staged through one handle is visible through the other
    let orchid = Orchid::new("Phalaenopsis", 120);
    orchids1.add(orchid.clone()).await.expect("Failed to stage orchid");
    let found = orchids2
        .find(orchid.id)
        .await
        .expect("Failed to find orchid")
        .expect("Staged orchid not visible");
    assert_eq!(found, orchid);
    assert_eq!(orchids2.pending().await.unwrap(), 1);
    assert_eq!(auctions.pending().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unregistered_and_conflicting_kinds_are_rejected() {
    let factory = factory();
    let mut uow = factory.begin();

    let err = uow.repository::<Bidder>().err().expect("Bidder is not registered");
    assert!(matches!(err, UnitOfWorkError::UnregisteredEntity("bidders")));

    uow.repository::<Orchid>().expect("Failed to get orchid repository");
    let err = uow
        .repository::<OrchidSummary>()
        .err()
        .expect("Kind already bound to Orchid");
    assert!(matches!(err, UnitOfWorkError::KindConflict("orchids")));
}

#[tokio::test]
async fn test_unit_of_work_without_registry_accepts_any_kind() {
    let store = MemoryStore::new();
    let mut uow = UnitOfWork::new(DbContext::new(store.open_session()));

    let bidders = uow.repository::<Bidder>().expect("Failed to get bidder repository");
    bidders
        .add(Bidder { id: Uuid::new_v4() })
        .await
        .expect("Failed to stage bidder");
    assert_eq!(uow.commit_async().await.expect("Failed to commit"), 1);
    assert_eq!(store.row_count("bidders"), 1);
}

#[tokio::test]
async fn test_commit_async_returns_affected_count() {
    let factory = factory();
    let mut uow = factory.begin();
    let orchids = uow.repository::<Orchid>().unwrap();
    let auctions = uow.repository::<Auction>().unwrap();

    let orchid = Orchid::new("Cattleya", 300);
    orchids.add(orchid.clone()).await.unwrap();
    auctions.add(Auction::new(orchid.id, 350)).await.unwrap();

    let affected = uow.commit_async().await.expect("Failed to commit");

    assert_eq!(affected, 2);
    assert_eq!(factory.store().writes(), 1);
    assert_eq!(factory.store().row_count(Orchid::KIND), 1);
    assert_eq!(factory.store().row_count(Auction::KIND), 1);
    assert_eq!(orchids.pending().await.unwrap(), 0);

    // Nothing staged: nothing written
    assert_eq!(uow.commit_async().await.unwrap(), 0);
    assert_eq!(factory.store().writes(), 1);
}

#[tokio::test]
async fn test_commit_async_reports_every_validation_failure() {
    let factory = factory();
    let mut uow = factory.begin();
    let orchids = uow.repository::<Orchid>().unwrap();

    orchids.add(Orchid::new("", 10)).await.unwrap();
    orchids.add(Orchid::new("Dendrobium", 0)).await.unwrap();

    let err = uow.commit_async().await.expect_err("Validation should fail");
    let UnitOfWorkError::Validation(errors) = &err else {
        panic!("Expected validation error, got {err:?}");
    };
    assert_eq!(errors.len(), 2);
    assert_eq!(
        err.to_string(),
        "Properties Name Error: The Name field is required.\n\
         Properties Price Error: Price must be positive."
    );

    assert_eq!(factory.store().writes(), 0);
    assert_eq!(factory.store().row_count(Orchid::KIND), 0);
    // Staged changes survive the rejected commit
    assert_eq!(orchids.pending().await.unwrap(), 2);
}

#[tokio::test]
async fn test_invalid_entity_blocks_commit_until_removed() {
    let factory = factory();
    let mut uow = factory.begin();
    let orchids = uow.repository::<Orchid>().unwrap();

    let invalid = Orchid::new("", 50);
    let valid = Orchid::new("Vanda", 80);
    orchids.add(invalid.clone()).await.unwrap();
    orchids.add(valid.clone()).await.unwrap();

    let err = uow.commit_async().await.expect_err("Validation should fail");
    assert!(err.to_string().contains("Name"));
    assert_eq!(factory.store().writes(), 0);

    orchids.remove(invalid.id).await.unwrap();
    let affected = uow.commit_async().await.expect("Failed to commit");

    assert_eq!(affected, 1);
    assert_eq!(factory.store().row_count(Orchid::KIND), 1);
    assert_eq!(orchids.find(valid.id).await.unwrap(), Some(valid));
}

#[tokio::test]
async fn test_sync_commit_skips_validation_by_default() {
    let factory = factory();

    let mut rejected = factory.begin();
    rejected
        .repository::<Orchid>()
        .unwrap()
        .add(Orchid::new("", 10))
        .await
        .unwrap();
    assert!(matches!(
        rejected.commit_async().await,
        Err(UnitOfWorkError::Validation(_))
    ));

    let mut accepted = factory.begin();
    accepted
        .repository::<Orchid>()
        .unwrap()
        .add(Orchid::new("", 10))
        .await
        .unwrap();
    assert_eq!(accepted.commit().expect("Sync commit should not validate"), 1);
    assert_eq!(factory.store().row_count(Orchid::KIND), 1);
}

#[tokio::test]
async fn test_sync_commit_fails_fast_when_context_is_borrowed() {
    let factory = factory();
    let mut uow = factory.begin();
    uow.repository::<Orchid>()
        .unwrap()
        .add(Orchid::new("Vanda", 40))
        .await
        .unwrap();

    let guard = uow.executor().lock().await.unwrap();
    assert!(matches!(uow.commit(), Err(UnitOfWorkError::Busy)));
    drop(guard);

    assert_eq!(uow.commit().expect("Commit should succeed once released"), 1);
    assert_eq!(factory.store().row_count(Orchid::KIND), 1);
}

#[tokio::test]
async fn test_sync_commit_validates_when_policy_is_always() {
    let factory = factory().with_options(UnitOfWorkOptions {
        validation: ValidationPolicy::Always,
    });
    let mut uow = factory.begin();
    uow.repository::<Orchid>()
        .unwrap()
        .add(Orchid::new("", 10))
        .await
        .unwrap();

    assert!(matches!(uow.commit(), Err(UnitOfWorkError::Validation(_))));
    assert_eq!(factory.store().writes(), 0);
}

#[tokio::test]
async fn test_store_rejection_is_propagated() {
    let factory = factory();
    let existing = Orchid::new("Oncidium", 40);
    factory.store().seed(
        Orchid::KIND,
        [(existing.id, serde_json::to_value(&existing).unwrap())],
    );

    let mut uow = factory.begin();
    let orchids = uow.repository::<Orchid>().unwrap();
    orchids.add(Orchid::new("Miltonia", 20)).await.unwrap();
    orchids.add(existing.clone()).await.unwrap();

    let err = uow.commit_async().await.expect_err("Duplicate key should fail");
    assert!(matches!(
        err,
        UnitOfWorkError::Store(StoreError::Conflict { kind: "orchids", id }) if id == existing.id
    ));
    assert_eq!(factory.store().row_count(Orchid::KIND), 1);
    assert_eq!(orchids.pending().await.unwrap(), 2);
}

#[tokio::test]
async fn test_find_prefers_staged_state() {
    let factory = factory();
    let stored = Orchid::new("Paphiopedilum", 90);
    factory.store().seed(
        Orchid::KIND,
        [(stored.id, serde_json::to_value(&stored).unwrap())],
    );

    let mut uow = factory.begin();
    let orchids = uow.repository::<Orchid>().unwrap();
    assert_eq!(orchids.find(stored.id).await.unwrap(), Some(stored.clone()));

    let mut repriced = stored.clone();
    repriced.price = 95;
    orchids.update(repriced.clone()).await.unwrap();
    assert_eq!(orchids.find(stored.id).await.unwrap(), Some(repriced));

    orchids.remove(stored.id).await.unwrap();
    assert_eq!(orchids.find(stored.id).await.unwrap(), None);

    assert_eq!(uow.commit_async().await.unwrap(), 1);
    assert_eq!(factory.store().row_count(Orchid::KIND), 0);
}

#[tokio::test]
async fn test_list_total_is_independent_of_page_size() {
    let factory = factory();
    factory.store().seed(
        Orchid::KIND,
        (1..=7).map(|n| {
            let orchid = Orchid::new(&format!("orchid-{n}"), n * 10);
            (orchid.id, serde_json::to_value(&orchid).unwrap())
        }),
    );

    let mut uow = factory.begin();
    let orchids = uow.repository::<Orchid>().unwrap();

    let paging = PagingModel::new(2, 3).sorted_by("price", SortDirection::Ascending);
    let page = orchids.list(&paging).await.expect("Failed to list orchids");
    let prices: Vec<_> = page.items.iter().map(|o| o.price).collect();

    assert_eq!(prices, vec![40, 50, 60]);
    assert_eq!(page.meta_data.total, 7);
    assert_eq!(page.total_pages(), 3);

    let everything = orchids.list(&PagingModel::default()).await.unwrap();
    assert_eq!(everything.items.len(), 7);
    assert_eq!(everything.meta_data.total, 7);
    assert_eq!((everything.meta_data.page, everything.meta_data.size), (1, 50));

    let response = DynamicResponse::from(page.map(|o| o.name));
    assert_eq!(
        serde_json::to_value(&response).unwrap()["metaData"],
        json!({"page": 2, "size": 3, "total": 7})
    );
}

#[tokio::test]
async fn test_observers_are_notified() {
    let factory = factory();
    let mut uow = factory.begin();
    let observer = RecordingObserver::new();
    uow.register_observer(observer.clone());

    let orchids = uow.repository::<Orchid>().unwrap();
    orchids.add(Orchid::new("Zygopetalum", 70)).await.unwrap();
    uow.commit_async().await.unwrap();

    orchids.add(Orchid::new("Masdevallia", 30)).await.unwrap();
    uow.discard().await.unwrap();
    assert_eq!(orchids.pending().await.unwrap(), 0);

    // Rejected commits notify nobody
    orchids.add(Orchid::new("", 30)).await.unwrap();
    assert!(uow.commit_async().await.is_err());

    assert_eq!(observer.commits(), vec![1]);
    assert_eq!(observer.discards(), 1);
    assert_eq!(factory.store().row_count(Orchid::KIND), 1);
}

#[tokio::test]
async fn test_dispose_is_idempotent() {
    let factory = factory();
    let mut uow = factory.begin();
    let orchids = uow.repository::<Orchid>().unwrap();

    uow.dispose();
    uow.dispose();
    drop(uow);

    assert_eq!(factory.store().opened_sessions(), 1);
    assert_eq!(factory.store().closed_sessions(), 1);

    // Handles outliving their unit of work can no longer reach the context
    let err = orchids.add(Orchid::new("Lycaste", 10)).await.unwrap_err();
    assert!(matches!(err, UnitOfWorkError::Disposed));
}

#[tokio::test]
async fn test_dispose_while_context_is_borrowed_releases_it_afterwards() {
    let factory = factory();
    let mut uow = factory.begin();
    let orchids = uow.repository::<Orchid>().unwrap();

    let executor = uow.executor().clone();
    let guard = executor.lock().await.unwrap();
    uow.dispose();
    assert!(executor.is_closed());
    assert_eq!(factory.store().closed_sessions(), 0);

    // The borrower closes the session once it lets go
    drop(guard);
    assert_eq!(factory.store().closed_sessions(), 1);
    drop(uow);

    let err = orchids.add(Orchid::new("Lycaste", 10)).await.unwrap_err();
    assert!(matches!(err, UnitOfWorkError::Disposed));
    assert!(matches!(executor.lock().await, Err(UnitOfWorkError::Disposed)));
    assert_eq!(factory.store().closed_sessions(), 1);
    assert_eq!(factory.store().writes(), 0);
}

#[tokio::test]
async fn test_disposed_unit_of_work_rejects_operations() {
    let factory = factory();
    let mut uow = factory.begin();
    uow.dispose();

    assert!(uow.is_disposed());
    assert!(matches!(
        uow.repository::<Orchid>(),
        Err(UnitOfWorkError::Disposed)
    ));
    assert!(matches!(uow.commit(), Err(UnitOfWorkError::Disposed)));
    assert!(matches!(
        uow.commit_async().await,
        Err(UnitOfWorkError::Disposed)
    ));
}

#[tokio::test]
async fn test_context_is_released_on_error_paths() {
    async fn place_bid(factory: &UnitOfWorkFactory<MemoryStore>) -> Result<u64, UnitOfWorkError> {
        let mut uow = factory.begin();
        let orchids = uow.repository::<Orchid>()?;
        orchids.add(Orchid::new("", 0)).await?;
        uow.commit_async().await
    }

    let factory = factory();
    assert!(place_bid(&factory).await.is_err());

    assert_eq!(factory.store().opened_sessions(), 1);
    assert_eq!(factory.store().closed_sessions(), 1);
    assert_eq!(factory.store().writes(), 0);
}

#[tokio::test]
async fn test_units_of_work_are_isolated() {
    let factory = factory();
    let mut first = factory.begin();
    let mut second = factory.begin();

    let orchid = Orchid::new("Brassia", 60);
    first.repository::<Orchid>().unwrap().add(orchid.clone()).await.unwrap();

    let seen = second.repository::<Orchid>().unwrap().find(orchid.id).await.unwrap();
    assert_eq!(seen, None);

    first.commit_async().await.unwrap();
    let seen = second.repository::<Orchid>().unwrap().find(orchid.id).await.unwrap();
    assert_eq!(seen, Some(orchid));
}

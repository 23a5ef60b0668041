use std::sync::Arc;

use symstore_backend::{InMemoryObjectBackend, InMemoryTableBackend};
use symstore_storage::{
    PackageItem, PackageName, PackageState, SourceName, StorageConfig, StorageError, StorageFeed,
    StorageItem, StorageResult, StorageService, SymbolName,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct Harness {
    objects: Arc<InMemoryObjectBackend>,
    tables: Arc<InMemoryTableBackend>,
    service: StorageService,
}

impl Harness {
    fn new() -> Self {
        init_tracing();
        let objects = Arc::new(InMemoryObjectBackend::new().with_creation_lag(2).with_page_size(2));
        let tables = Arc::new(InMemoryTableBackend::new().with_creation_lag(2).with_page_size(2));
        let service = StorageService::new(objects.clone(), tables.clone(), StorageConfig::for_tests());
        Self {
            objects,
            tables,
            service,
        }
    }

    fn feed(&self) -> StorageFeed {
        self.service.feed(Some("nuget")).unwrap()
    }
}

fn current() -> PackageState {
    PackageState::new("Current")
}

async fn write(item: &impl StorageItem, body: &[u8]) -> StorageResult<()> {
    let mut writer = item.put().await?;
    writer.write_bytes(body);
    writer.commit().await
}

fn package(feed: &StorageFeed, owner: Option<&str>, state: PackageState) -> PackageItem {
    feed.package(owner, state, PackageName::new("Serilog", "2.10.0"))
}

#[test]
fn feed_name_scenarios() {
    let service = StorageService::in_memory();
    assert_eq!(service.feed(None).unwrap().name(), "feed-default");
    assert_eq!(service.feed(Some("myfeed")).unwrap().name(), "feed-named-myfeed");
    let err = service.feed(Some("MyFeed")).unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(
        service.feed(Some("myfeed")).unwrap().name(),
        service.feed(Some("myfeed")).unwrap().name()
    );
}

#[tokio::test]
async fn package_round_trip() {
    let h = Harness::new();
    let feed = h.feed();
    let item = package(&feed, Some("alice"), current());

    let mut writer = item.put().await.unwrap();
    writer.write_bytes(b"PK\x03\x04 nupkg");
    assert!(!item.exists().await.unwrap());
    writer.commit().await.unwrap();

    assert!(item.exists().await.unwrap());
    assert_eq!(item.get().await.unwrap().unwrap().as_ref(), b"PK\x03\x04 nupkg");
    assert_eq!(
        feed.query_packages(&current()).await.unwrap(),
        vec![PackageName::new("Serilog", "2.10.0")]
    );
}

#[tokio::test]
async fn shared_symbol_is_reference_counted() {
    let h = Harness::new();
    let feed = h.feed();
    let key = SymbolName::new("Serilog.pdb", "3F2A9C");
    let pkg_a = PackageName::new("A", "1.0");
    let pkg_b = PackageName::new("B", "1.0");

    write(&feed.symbol(Some(pkg_a.clone()), key.clone()), b"pdb").await.unwrap();
    write(&feed.symbol(Some(pkg_b.clone()), key.clone()), b"pdb").await.unwrap();

    assert!(!feed.symbol(Some(pkg_a), key.clone()).delete().await.unwrap());
    let remaining = feed.symbol(None, key.clone());
    assert!(remaining.exists().await.unwrap());
    assert_eq!(
        remaining.package_names().list().await.unwrap().into_iter().collect::<Vec<_>>(),
        vec![pkg_b.clone()]
    );

    assert!(feed.symbol(Some(pkg_b), key.clone()).delete().await.unwrap());
    assert!(!remaining.exists().await.unwrap());
}

#[tokio::test]
async fn source_requires_package_name() {
    let h = Harness::new();
    let feed = h.feed();
    let src = feed.source(None, SourceName::new("Program.cs", "ab12"));
    assert!(matches!(
        src.put().await,
        Err(StorageError::MissingPackageName { .. })
    ));
    assert!(src.get().await.unwrap().is_none());
}

#[tokio::test]
async fn ownership_transfer() {
    let h = Harness::new();
    let feed = h.feed();
    let by_alice = package(&feed, Some("alice"), current());
    let by_bob = package(&feed, Some("bob"), current());

    write(&by_alice, b"v1").await.unwrap();
    let alice_path = by_alice.path_for("alice");
    write(&by_bob, b"v2").await.unwrap();

    assert!(!h.objects.contains(feed.name(), &alice_path));
    assert!(h.objects.contains(feed.name(), &by_bob.path_for("bob")));
    let anyone = package(&feed, None, current());
    assert_eq!(anyone.owner().await.unwrap().as_deref(), Some("bob"));
    assert_eq!(anyone.get().await.unwrap().unwrap(), "v2");
    assert_eq!(h.tables.row_count(feed.table_name()), 1);
}

#[tokio::test]
async fn move_between_states() {
    let h = Harness::new();
    let feed = h.feed();
    let submitted = package(&feed, Some("alice"), PackageState::new("Submitted"));
    write(&submitted, b"payload").await.unwrap();

    let moved = submitted
        .move_to(current(), submitted.name().clone())
        .await
        .unwrap()
        .expect("package exists");

    assert!(!submitted.exists().await.unwrap());
    assert!(moved.exists().await.unwrap());
    assert!(package(&feed, None, current()).exists().await.unwrap());
    assert_eq!(moved.get().await.unwrap().unwrap(), "payload");
    assert!(feed
        .query_packages(&PackageState::new("Submitted"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn deletes_are_idempotent() {
    let h = Harness::new();
    let feed = h.feed();
    let item = package(&feed, Some("alice"), current());
    assert!(!item.delete().await.unwrap());
    assert!(!feed
        .symbol(Some(PackageName::new("A", "1")), SymbolName::new("x.pdb", "1"))
        .delete()
        .await
        .unwrap());

    write(&item, b"x").await.unwrap();
    assert!(item.delete().await.unwrap());
    assert!(!item.delete().await.unwrap());

    // Writing again after a delete reuses the existing bucket and table.
    write(&item, b"y").await.unwrap();
    assert_eq!(item.get().await.unwrap().unwrap(), "y");
}

#[tokio::test]
async fn feeds_are_listed_and_deleted() {
    let h = Harness::new();
    write(&package(&h.feed(), Some("alice"), current()), b"x").await.unwrap();
    let default_feed = h.service.feed(None).unwrap();
    write(&package(&default_feed, Some("bob"), current()), b"y").await.unwrap();

    let mut feeds = h.service.query_feeds().await.unwrap();
    feeds.sort();
    assert_eq!(feeds, vec![None, Some("nuget".to_string())]);

    let outcome = h.service.delete_feed(Some("nuget")).await.unwrap();
    assert!(outcome.is_consistent() && outcome.any());
    assert_eq!(h.service.query_feeds().await.unwrap(), vec![None]);
    assert!(package(&default_feed, None, current()).exists().await.unwrap());
}

#[tokio::test]
async fn independent_packages_publish_concurrently() {
    let h = Harness::new();
    let feed = h.feed();
    let mut tasks = Vec::new();
    for i in 0..8 {
        let item = feed.package(
            Some("alice"),
            current(),
            PackageName::new(format!("pkg{i}"), "1.0"),
        );
        tasks.push(tokio::spawn(async move {
            write(&item, format!("body {i}").as_bytes()).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut names = feed.query_packages(&current()).await.unwrap();
    names.sort();
    assert_eq!(names.len(), 8);
    assert_eq!(names[0], PackageName::new("pkg0", "1.0"));
    assert_eq!(
        feed.query_packages_by_owner("alice", &current()).await.unwrap().len(),
        8
    );
}

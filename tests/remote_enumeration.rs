//! `RemoteTraverser` driven through `MockAdapter`: wildcard matching and
//! service-level (account) container enumeration, which the local-only
//! tests in `enumeration.rs` can't exercise.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use azcopy_core::backend::mock::MockAdapter;
use azcopy_core::credential::CredentialDescriptor;
use azcopy_core::filter::FilterChain;
use azcopy_core::location::ResourceRef;
use azcopy_core::monitor::void::NullMonitor;
use azcopy_core::stored_object::{EntityType, FolderPropertyOption};
use azcopy_core::traverse::{IdentityPreprocessor, ObjectSink, Result, SinkDecision, Traverser, TraverseOptions};
use azcopy_core::traverse::remote::RemoteTraverser;

struct CollectSink {
    paths: Vec<String>,
}

#[async_trait::async_trait]
impl ObjectSink for CollectSink {
    async fn accept(&mut self, object: azcopy_core::stored_object::StoredObject) -> Result<SinkDecision> {
        self.paths.push(object.relative_path);
        Ok(SinkDecision::Continue)
    }
}

fn opts<'a>(filters: &'a FilterChain, cancelled: &'a AtomicBool) -> TraverseOptions<'a> {
    TraverseOptions {
        recursive: true,
        filters,
        monitor: &NullMonitor,
        preprocessor: &IdentityPreprocessor,
        cancelled,
    }
}

#[tokio::test]
async fn wildcard_suffix_is_equivalent_to_its_expanded_prefix_listing() {
    let adapter = Arc::new(MockAdapter::blob_like());
    adapter.put("c", MockAdapter::make_object("logs/2024/a.txt", EntityType::File, 1));
    adapter.put("c", MockAdapter::make_object("logs/2024/b.csv", EntityType::File, 1));
    adapter.put("c", MockAdapter::make_object("logs/2023/old.txt", EntityType::File, 1));

    let wildcard_resource = ResourceRef::parse("https://acct.blob.core.windows.net/c/logs/2024/*.txt").unwrap();
    let wildcard_traverser = RemoteTraverser::new(
        adapter.clone(),
        wildcard_resource,
        CredentialDescriptor::anonymous(),
        FolderPropertyOption::NoFolders,
    );
    let filters = FilterChain::new();
    let cancelled = AtomicBool::new(false);
    let mut wildcard_sink = CollectSink { paths: Vec::new() };
    wildcard_traverser
        .traverse(&opts(&filters, &cancelled), &mut wildcard_sink)
        .await
        .unwrap();
    assert_eq!(wildcard_sink.paths, vec!["a.txt".to_owned()]);

    let prefix_resource = ResourceRef::parse("https://acct.blob.core.windows.net/c/logs/2024/").unwrap();
    let prefix_traverser = RemoteTraverser::new(
        adapter,
        prefix_resource,
        CredentialDescriptor::anonymous(),
        FolderPropertyOption::NoFolders,
    );
    let mut prefix_sink = CollectSink { paths: Vec::new() };
    prefix_traverser
        .traverse(&opts(&filters, &cancelled), &mut prefix_sink)
        .await
        .unwrap();
    let txt_only: Vec<_> = prefix_sink.paths.into_iter().filter(|p| p.ends_with(".txt")).collect();
    assert_eq!(txt_only, wildcard_sink.paths);
}

#[tokio::test]
async fn account_level_traversal_visits_only_containers_matching_the_glob() {
    let adapter = Arc::new(MockAdapter::blob_like());
    adapter.put("logs-2024", MockAdapter::make_object("a.txt", EntityType::File, 1));
    adapter.put("logs-2023", MockAdapter::make_object("b.txt", EntityType::File, 1));
    adapter.put("other", MockAdapter::make_object("c.txt", EntityType::File, 1));

    let resource = ResourceRef::parse("https://acct.blob.core.windows.net/logs-*/").unwrap();
    assert!(resource.is_service_level());
    let traverser = RemoteTraverser::new(adapter, resource, CredentialDescriptor::anonymous(), FolderPropertyOption::NoFolders);

    let filters = FilterChain::new();
    let cancelled = AtomicBool::new(false);
    let mut sink = CollectSink { paths: Vec::new() };
    traverser.traverse(&opts(&filters, &cancelled), &mut sink).await.unwrap();

    assert_eq!(sink.paths.len(), 2);
    assert!(sink.paths.contains(&"a.txt".to_owned()));
    assert!(sink.paths.contains(&"b.txt".to_owned()));
}

#[tokio::test]
async fn pagination_across_continuation_tokens_yields_every_object_exactly_once() {
    let adapter = Arc::new(MockAdapter::blob_like());
    for i in 0..37 {
        adapter.put("c", MockAdapter::make_object(&format!("f{i:03}.txt"), EntityType::File, 1));
    }
    adapter.set_page_size("c", 8);

    let resource = ResourceRef::parse("https://acct.blob.core.windows.net/c/").unwrap();
    let traverser = RemoteTraverser::new(adapter, resource, CredentialDescriptor::anonymous(), FolderPropertyOption::NoFolders);

    let filters = FilterChain::new();
    let cancelled = AtomicBool::new(false);
    let mut sink = CollectSink { paths: Vec::new() };
    traverser.traverse(&opts(&filters, &cancelled), &mut sink).await.unwrap();

    assert_eq!(sink.paths.len(), 37);
    let unique: std::collections::HashSet<_> = sink.paths.iter().collect();
    assert_eq!(unique.len(), 37);
}

#[tokio::test]
async fn object_level_reference_to_a_missing_object_is_not_found() {
    let adapter = Arc::new(MockAdapter::blob_like());
    let resource = ResourceRef::parse("https://acct.blob.core.windows.net/c/missing.txt").unwrap();
    let traverser = RemoteTraverser::new(adapter, resource, CredentialDescriptor::anonymous(), FolderPropertyOption::NoFolders);

    let filters = FilterChain::new();
    let cancelled = AtomicBool::new(false);
    let mut sink = CollectSink { paths: Vec::new() };
    let err = traverser.traverse(&opts(&filters, &cancelled), &mut sink).await.unwrap_err();
    assert!(matches!(err, azcopy_core::traverse::Error::Backend(azcopy_core::backend::Error::NotFound { .. })));
}

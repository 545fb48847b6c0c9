//! End-to-end enumeration over a real local filesystem tree: Traverser ->
//! FilterChain -> EnumerationOrchestrator -> TransferProcessor -> STE.
//!
//! Grounded on `conserve`'s `tests/archive.rs` style of exercising the
//! library's public API directly against an `assert_fs::TempDir`, rather
//! than shelling out to the binary.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use pretty_assertions::assert_eq;

use azcopy_core::cli::cook;
use azcopy_core::credential::CredentialDescriptor;
use azcopy_core::filter::{ExcludePathFilter, FilterChain};
use azcopy_core::job::{JobID, JobPartTemplate, MAX_TRANSFERS_PER_PART};
use azcopy_core::location::{FromTo, Location, ResourceRef};
use azcopy_core::monitor::collect::CollectingMonitor;
use azcopy_core::monitor::Counter;
use azcopy_core::orchestrator::EnumerationOrchestrator;
use azcopy_core::processor::TransferProcessor;
use azcopy_core::ste::InProcessSte;
use azcopy_core::stored_object::FolderPropertyOption;
use azcopy_core::traverse::SymlinkPolicy;

fn template(source_root: &str) -> JobPartTemplate {
    JobPartTemplate {
        job_id: JobID::for_test(7),
        from_to: FromTo::new(Location::Local, Location::Blob),
        source_root: source_root.to_owned(),
        destination_root: "https://acct.blob.core.windows.net/c/dest".to_owned(),
        source_credential: CredentialDescriptor::anonymous(),
        destination_credential: CredentialDescriptor::anonymous(),
        put_md5: false,
        preserve_permissions: false,
        preserve_smb_info: false,
        preserve_posix_properties: false,
        s2s_preserve_access_tier: false,
    }
}

#[tokio::test]
async fn recursive_copy_of_a_real_tree_schedules_every_file() {
    let dir = TempDir::new().unwrap();
    dir.child("a.txt").write_str("x").unwrap();
    dir.child("sub/b.txt").write_str("y").unwrap();
    dir.child("sub/c.log").write_str("z").unwrap();

    let resource = ResourceRef::parse(dir.path().to_str().unwrap()).unwrap();
    let credential = CredentialDescriptor::anonymous();
    let traverser = cook::traverser_for(
        &resource,
        &credential,
        FolderPropertyOption::AllFoldersExceptRoot,
        SymlinkPolicy::Follow,
        None,
    );

    let filters = FilterChain::new();
    let monitor = Arc::new(CollectingMonitor::new());
    let ste = Arc::new(InProcessSte::new());
    let mut processor = TransferProcessor::new(
        template(dir.path().to_str().unwrap()),
        ste.clone(),
        monitor.clone(),
        MAX_TRANSFERS_PER_PART,
    );

    let orchestrator = EnumerationOrchestrator::new(traverser, filters, monitor.clone(), true);
    let cancelled = AtomicBool::new(false);
    let summary = orchestrator.run(&mut processor, &cancelled).await.unwrap();
    processor.dispatch_final().await.unwrap();

    assert_eq!(summary.transfers_scheduled, 3);
    assert_eq!(summary.folders_scheduled, 1); // "sub", root excluded
    assert!(!summary.nothing_scheduled());

    let parts = ste.accepted_parts();
    let paths: Vec<_> = parts.iter().flat_map(|p| p.transfers.iter().map(|t| t.source.clone())).collect();
    assert!(paths.iter().any(|p| p.ends_with("a.txt")));
    assert!(paths.iter().any(|p| p.ends_with("sub/b.txt")));
    assert!(paths.iter().any(|p| p.ends_with("sub/c.log")));
}

#[tokio::test]
async fn exclude_path_filter_drops_an_entire_subtree() {
    let dir = TempDir::new().unwrap();
    dir.child("keep.txt").write_str("x").unwrap();
    dir.child("logs/today.txt").write_str("y").unwrap();
    dir.child("logs/yesterday.txt").write_str("y").unwrap();

    let resource = ResourceRef::parse(dir.path().to_str().unwrap()).unwrap();
    let credential = CredentialDescriptor::anonymous();
    let traverser = cook::traverser_for(
        &resource,
        &credential,
        FolderPropertyOption::AllFoldersExceptRoot,
        SymlinkPolicy::Follow,
        None,
    );

    let filters = FilterChain::new().push(ExcludePathFilter::new("logs", true).unwrap());
    let monitor = Arc::new(CollectingMonitor::new());
    let ste = Arc::new(InProcessSte::new());
    let mut processor = TransferProcessor::new(
        template(dir.path().to_str().unwrap()),
        ste.clone(),
        monitor.clone(),
        MAX_TRANSFERS_PER_PART,
    );

    let orchestrator = EnumerationOrchestrator::new(traverser, filters, monitor, true);
    let cancelled = AtomicBool::new(false);
    let summary = orchestrator.run(&mut processor, &cancelled).await.unwrap();
    processor.dispatch_final().await.unwrap();

    assert_eq!(summary.transfers_scheduled, 1);
    let parts = ste.accepted_parts();
    let paths: Vec<_> = parts.iter().flat_map(|p| p.transfers.iter().map(|t| t.source.clone())).collect();
    assert!(paths.iter().any(|p| p.ends_with("keep.txt")));
    assert!(!paths.iter().any(|p| p.contains("logs")));
}

#[tokio::test]
async fn part_boundedness_holds_over_a_real_traversal() {
    let dir = TempDir::new().unwrap();
    for i in 0..9 {
        dir.child(format!("f{i}.txt")).write_str("x").unwrap();
    }

    let resource = ResourceRef::parse(dir.path().to_str().unwrap()).unwrap();
    let credential = CredentialDescriptor::anonymous();
    let traverser = cook::traverser_for(
        &resource,
        &credential,
        FolderPropertyOption::NoFolders,
        SymlinkPolicy::Follow,
        None,
    );

    let filters = FilterChain::new();
    let monitor = Arc::new(CollectingMonitor::new());
    let ste = Arc::new(InProcessSte::new());
    let mut processor = TransferProcessor::new(template(dir.path().to_str().unwrap()), ste.clone(), monitor.clone(), 4);

    let orchestrator = EnumerationOrchestrator::new(traverser, filters, monitor, false);
    let cancelled = AtomicBool::new(false);
    let summary = orchestrator.run(&mut processor, &cancelled).await.unwrap();
    processor.dispatch_final().await.unwrap();

    assert_eq!(summary.transfers_scheduled, 9);
    let parts = ste.accepted_parts();
    assert_eq!(parts.len(), 3); // ceil(9/4) = 3 parts
    for part in &parts[..parts.len() - 1] {
        assert_eq!(part.transfers.len(), 4);
    }
    assert_eq!(parts.last().unwrap().transfers.len(), 1);
    assert!(parts.last().unwrap().is_final_part);
}

#[tokio::test]
async fn empty_directory_with_no_matches_reports_nothing_scheduled() {
    let dir = TempDir::new().unwrap();
    let resource = ResourceRef::parse(dir.path().to_str().unwrap()).unwrap();
    let credential = CredentialDescriptor::anonymous();
    let traverser = cook::traverser_for(
        &resource,
        &credential,
        FolderPropertyOption::AllFoldersExceptRoot,
        SymlinkPolicy::Follow,
        None,
    );

    let filters = FilterChain::new();
    let monitor = Arc::new(CollectingMonitor::new());
    let ste = Arc::new(InProcessSte::new());
    let mut processor = TransferProcessor::new(template(dir.path().to_str().unwrap()), ste, monitor.clone(), MAX_TRANSFERS_PER_PART);

    let orchestrator = EnumerationOrchestrator::new(traverser, filters, monitor.clone(), true);
    let cancelled = AtomicBool::new(false);
    let summary = orchestrator.run(&mut processor, &cancelled).await.unwrap();
    processor.dispatch_final().await.unwrap();

    assert!(summary.nothing_scheduled());
    assert_eq!(monitor.counter(Counter::PartsDispatched), 1);
}

#[tokio::test]
async fn list_of_files_restricts_traversal_to_named_children() {
    let dir = TempDir::new().unwrap();
    dir.child("a.txt").write_str("x").unwrap();
    dir.child("b.txt").write_str("y").unwrap();
    dir.child("sub/c.txt").write_str("z").unwrap();

    let resource = ResourceRef::parse(dir.path().to_str().unwrap()).unwrap();
    let credential = CredentialDescriptor::anonymous();
    let list = vec!["a.txt".to_owned(), "sub/c.txt".to_owned()];
    let traverser = cook::traverser_for(
        &resource,
        &credential,
        FolderPropertyOption::NoFolders,
        SymlinkPolicy::Follow,
        Some(&list),
    );

    let filters = FilterChain::new();
    let monitor = Arc::new(CollectingMonitor::new());
    let ste = Arc::new(InProcessSte::new());
    let mut processor = TransferProcessor::new(template(dir.path().to_str().unwrap()), ste.clone(), monitor.clone(), MAX_TRANSFERS_PER_PART);

    let orchestrator = EnumerationOrchestrator::new(traverser, filters, monitor, true);
    let cancelled = AtomicBool::new(false);
    let summary = orchestrator.run(&mut processor, &cancelled).await.unwrap();
    processor.dispatch_final().await.unwrap();

    assert_eq!(summary.transfers_scheduled, 2);
    let parts = ste.accepted_parts();
    let paths: Vec<_> = parts.iter().flat_map(|p| p.transfers.iter().map(|t| t.source.clone())).collect();
    assert!(paths.iter().any(|p| p.ends_with("a.txt")));
    assert!(paths.iter().any(|p| p.ends_with("sub/c.txt")));
    assert!(!paths.iter().any(|p| p.ends_with("b.txt")));
}

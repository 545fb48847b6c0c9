//! The full path from parsed CLI args through `cook` to a dispatched job,
//! without going through the `azcopy` binary itself.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use clap::Parser;
use indoc::indoc;

use azcopy_core::cli::cook::{self, Action};
use azcopy_core::cli::{Cli, Command};
use azcopy_core::job::{JobID, JobPartTemplate, MAX_TRANSFERS_PER_PART};
use azcopy_core::monitor::collect::CollectingMonitor;
use azcopy_core::orchestrator::EnumerationOrchestrator;
use azcopy_core::processor::TransferProcessor;
use azcopy_core::ste::InProcessSte;

#[tokio::test]
async fn a_local_to_local_copy_cooks_and_runs_end_to_end() {
    let source = TempDir::new().unwrap();
    source.child("a.txt").write_str("hello").unwrap();
    source.child("sub/b.txt").write_str("world").unwrap();
    let destination = TempDir::new().unwrap();

    let cli = Cli::parse_from([
        "azcopy",
        "copy",
        source.path().to_str().unwrap(),
        destination.path().to_str().unwrap(),
        "--recursive",
    ]);
    let Action::Copy(plan) = cook::cook(&cli).unwrap() else {
        panic!("expected a Copy action");
    };

    let template = JobPartTemplate {
        job_id: JobID::for_test(99),
        from_to: plan.from_to,
        source_root: plan.source.object_key.clone(),
        destination_root: plan.destination.object_key.clone(),
        source_credential: plan.source_credential.clone(),
        destination_credential: plan.destination_credential.clone(),
        put_md5: plan.put_md5,
        preserve_permissions: plan.preserve_permissions,
        preserve_smb_info: plan.preserve_smb_info,
        preserve_posix_properties: plan.preserve_posix_properties,
        s2s_preserve_access_tier: plan.s2s_preserve_access_tier,
    };
    let monitor = Arc::new(CollectingMonitor::new());
    let ste = Arc::new(InProcessSte::new());
    let mut processor = TransferProcessor::new(template, ste.clone(), monitor.clone(), MAX_TRANSFERS_PER_PART);

    let traverser = cook::traverser_for(
        &plan.source,
        &plan.source_credential,
        plan.folder_option,
        plan.symlink_policy,
        plan.list_of_files.as_deref(),
    );
    let orchestrator = EnumerationOrchestrator::new(traverser, plan.filters, monitor, plan.recursive);
    let cancelled = AtomicBool::new(false);
    let summary = orchestrator.run(&mut processor, &cancelled).await.unwrap();
    processor.dispatch_final().await.unwrap();

    assert_eq!(summary.transfers_scheduled, 2);
    assert!(!summary.nothing_scheduled());
}

#[test]
fn service_level_blob_account_requires_recursive_at_the_cli_layer() {
    let cli = Cli::parse_from(["azcopy", "copy", "https://acct.blob.core.windows.net/", "/tmp/dest"]);
    assert!(matches!(cli.command, Command::Copy(_)));
    let err = cook::cook(&cli).unwrap_err();
    assert!(matches!(err, azcopy_core::cli::Error::ServiceLevelRequiresRecursive));
}

#[tokio::test]
async fn list_of_files_flows_from_a_real_file_through_cook_to_the_processor() {
    let source = TempDir::new().unwrap();
    source.child("keep-a.txt").write_str("x").unwrap();
    source.child("keep-b.txt").write_str("y").unwrap();
    source.child("skip-c.txt").write_str("z").unwrap();
    let destination = TempDir::new().unwrap();

    let list_file = TempDir::new().unwrap();
    let list_path = list_file.child("list.txt");
    list_path
        .write_str(indoc! {"
            keep-a.txt
            keep-b.txt
        "})
        .unwrap();

    let cli = Cli::parse_from([
        "azcopy",
        "copy",
        source.path().to_str().unwrap(),
        destination.path().to_str().unwrap(),
        "--recursive",
        "--list-of-files",
        list_path.path().to_str().unwrap(),
    ]);
    let Action::Copy(plan) = cook::cook(&cli).unwrap() else {
        panic!("expected a Copy action");
    };
    assert_eq!(
        plan.list_of_files,
        Some(vec!["keep-a.txt".to_owned(), "keep-b.txt".to_owned()])
    );

    let template = JobPartTemplate {
        job_id: JobID::for_test(100),
        from_to: plan.from_to,
        source_root: plan.source.object_key.clone(),
        destination_root: plan.destination.object_key.clone(),
        source_credential: plan.source_credential.clone(),
        destination_credential: plan.destination_credential.clone(),
        put_md5: plan.put_md5,
        preserve_permissions: plan.preserve_permissions,
        preserve_smb_info: plan.preserve_smb_info,
        preserve_posix_properties: plan.preserve_posix_properties,
        s2s_preserve_access_tier: plan.s2s_preserve_access_tier,
    };
    let monitor = Arc::new(CollectingMonitor::new());
    let ste = Arc::new(InProcessSte::new());
    let mut processor = TransferProcessor::new(template, ste.clone(), monitor.clone(), MAX_TRANSFERS_PER_PART);
    let traverser = cook::traverser_for(
        &plan.source,
        &plan.source_credential,
        plan.folder_option,
        plan.symlink_policy,
        plan.list_of_files.as_deref(),
    );
    let orchestrator = EnumerationOrchestrator::new(traverser, plan.filters, monitor, plan.recursive);
    let cancelled = AtomicBool::new(false);
    let summary = orchestrator.run(&mut processor, &cancelled).await.unwrap();
    processor.dispatch_final().await.unwrap();

    assert_eq!(summary.transfers_scheduled, 2);
    let paths: Vec<_> = ste
        .accepted_parts()
        .iter()
        .flat_map(|p| p.transfers.iter().map(|t| t.source.clone()))
        .collect();
    assert!(!paths.iter().any(|p| p.ends_with("skip-c.txt")));
}

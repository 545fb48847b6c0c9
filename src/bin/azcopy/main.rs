//! `azcopy` binary entry point.
//!
//! Grounded on `conserve::bin::conserve::main`: parse args, initialize
//! logging, dispatch to the cooked command, map the result to a process
//! exit code.

use std::io::Write;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use azcopy_core::cli::cook::{self, Action, CopyPlan, ListPlan, RemovePlan, SetPropertiesPlan, SyncPlan};
use azcopy_core::cli::Cli;
use azcopy_core::config::Config;
use azcopy_core::credential::CredentialDescriptor;
use azcopy_core::error::{Error, Result};
use azcopy_core::job::{JobID, JobPartTemplate};
use azcopy_core::location::FromTo;
use azcopy_core::logging::{self, LoggingOptions};
use azcopy_core::monitor::tracing_monitor::TracingMonitor;
use azcopy_core::monitor::Monitor;
use azcopy_core::orchestrator::{EnumerationOrchestrator, JobSummary};
use azcopy_core::processor::TransferProcessor;
use azcopy_core::ste::InProcessSte;
use azcopy_core::stored_object::{BlobProps, ContentProps, EntityType, StoredObject};
use azcopy_core::sync::{self, DeleteDestinationPolicy};
use azcopy_core::traverse::{IdentityPreprocessor, ObjectSink, SinkDecision, Traverser, TraverseOptions};

#[repr(u8)]
enum CommandExitCode {
    Success = 0,
    Failed = 1,
    Partial = 2,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let job_id_for_log = cli.log_dir.is_some().then(JobID::new_random);

    let log_guard = match logging::init(LoggingOptions {
        verbose: cli.verbose,
        log_dir: cli.log_dir.clone(),
        job_id: job_id_for_log,
    }) {
        Ok(guard) => guard,
        Err(message) => {
            eprintln!("failed to initialize logging: {message}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(&cli));
    drop(log_guard);

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            let mut cause = std::error::Error::source(&e);
            while let Some(c) = cause {
                eprintln!("  caused by: {c}");
                cause = c.source();
            }
            ExitCode::from(CommandExitCode::Failed as u8)
        }
    }
}

async fn run(cli: &Cli) -> Result<CommandExitCode> {
    let action = cook::cook(cli)?;
    let monitor: Arc<dyn Monitor> = Arc::new(TracingMonitor::new());
    let config = Config {
        log_dir: cli.log_dir.clone(),
        ..Config::default()
    };

    match action {
        Action::Copy(plan) => run_copy(plan, monitor, &config).await,
        Action::Sync(plan) => run_sync(plan, monitor, &config).await,
        Action::Remove(plan) => run_remove(plan, monitor, &config).await,
        Action::List(plan) => run_list(plan, monitor).await,
        Action::SetProperties(plan) => run_set_properties(plan, monitor, &config).await,
        Action::Unimplemented(name) => {
            eprintln!("{name}: not implemented in this core; handled by the credential/job-admin subsystem");
            Ok(CommandExitCode::Failed)
        }
    }
}

fn exit_code_for(summary: &JobSummary) -> Result<CommandExitCode> {
    if summary.nothing_scheduled() {
        return Err(Error::NothingScheduled {
            context: "no objects matched the given source and filters".to_owned(),
        });
    }
    if summary.objects_failed > 0 {
        Ok(CommandExitCode::Partial)
    } else {
        Ok(CommandExitCode::Success)
    }
}

fn synthetic_object(name: &str) -> StoredObject {
    StoredObject {
        name: name.to_owned(),
        relative_path: name.to_owned(),
        entity_type: EntityType::File,
        last_modified: time::OffsetDateTime::now_utc(),
        size: 0,
        content_md5: None,
        content_props: ContentProps::default(),
        blob_props: BlobProps::default(),
        metadata: Default::default(),
        container_name: String::new(),
        version_id: None,
    }
}

async fn run_copy(plan: CopyPlan, monitor: Arc<dyn Monitor>, config: &Config) -> Result<CommandExitCode> {
    let job_id = JobID::new_random();
    let template = JobPartTemplate {
        job_id,
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
    let ste = Arc::new(InProcessSte::new());
    let mut processor = TransferProcessor::new(template, ste, Arc::clone(&monitor), config.max_transfers_per_part);

    if plan.source_is_pipe {
        let leaf = plan.destination.object_key.rsplit('/').next().unwrap_or_default();
        processor.schedule(&synthetic_object(leaf)).await?;
        processor.dispatch_final().await?;
        info!(%job_id, "piped upload scheduled as a single block-blob transfer");
        return Ok(CommandExitCode::Success);
    }

    let traverser = cook::traverser_for(
        &plan.source,
        &plan.source_credential,
        plan.folder_option,
        plan.symlink_policy,
        plan.list_of_files.as_deref(),
    );
    let orchestrator = EnumerationOrchestrator::new(traverser, plan.filters, monitor, plan.recursive);
    let cancelled = AtomicBool::new(false);
    let summary = orchestrator.run(&mut processor, &cancelled).await?;
    info!(?summary, %job_id, "copy enumeration complete");
    exit_code_for(&summary)
}

async fn run_remove(plan: RemovePlan, monitor: Arc<dyn Monitor>, config: &Config) -> Result<CommandExitCode> {
    let job_id = JobID::new_random();
    let template = JobPartTemplate {
        job_id,
        from_to: plan.from_to,
        source_root: plan.resource.object_key.clone(),
        destination_root: String::new(),
        source_credential: plan.credential.clone(),
        destination_credential: CredentialDescriptor::anonymous(),
        put_md5: false,
        preserve_permissions: false,
        preserve_smb_info: false,
        preserve_posix_properties: false,
        s2s_preserve_access_tier: false,
    };
    let ste = Arc::new(InProcessSte::new());
    let mut processor = TransferProcessor::new(template, ste, Arc::clone(&monitor), config.max_transfers_per_part);

    let traverser = cook::traverser_for(
        &plan.resource,
        &plan.credential,
        plan.folder_option,
        plan.symlink_policy,
        plan.list_of_files.as_deref(),
    );
    let orchestrator = EnumerationOrchestrator::new(traverser, plan.filters, monitor, plan.recursive);
    let cancelled = AtomicBool::new(false);
    let summary = orchestrator.run(&mut processor, &cancelled).await?;
    info!(?summary, %job_id, "remove enumeration complete");
    exit_code_for(&summary)
}

async fn run_set_properties(plan: SetPropertiesPlan, monitor: Arc<dyn Monitor>, config: &Config) -> Result<CommandExitCode> {
    let job_id = JobID::new_random();
    if let Some(tier) = &plan.tier {
        info!(%tier, "requested tier change");
    }
    for (key, value) in &plan.metadata {
        info!(%key, %value, "requested metadata change");
    }
    let from_to = FromTo::new(plan.resource.location, plan.resource.location);
    let template = JobPartTemplate {
        job_id,
        from_to,
        source_root: plan.resource.object_key.clone(),
        destination_root: plan.resource.object_key.clone(),
        source_credential: plan.credential.clone(),
        destination_credential: plan.credential.clone(),
        put_md5: false,
        preserve_permissions: false,
        preserve_smb_info: false,
        preserve_posix_properties: false,
        s2s_preserve_access_tier: false,
    };
    let ste = Arc::new(InProcessSte::new());
    let mut processor = TransferProcessor::new(template, ste, Arc::clone(&monitor), config.max_transfers_per_part);

    let traverser = cook::traverser_for(&plan.resource, &plan.credential, plan.folder_option, plan.symlink_policy, None);
    let orchestrator = EnumerationOrchestrator::new(traverser, plan.filters, monitor, true);
    let cancelled = AtomicBool::new(false);
    let summary = orchestrator.run(&mut processor, &cancelled).await?;
    info!(?summary, %job_id, "set-properties enumeration complete");
    exit_code_for(&summary)
}

/// Prints one line per listed object to stdout; never dispatches a job part.
struct ListSink {
    machine_readable: bool,
    properties: Vec<String>,
    count: u64,
}

#[async_trait::async_trait]
impl ObjectSink for ListSink {
    async fn accept(&mut self, object: StoredObject) -> azcopy_core::traverse::Result<SinkDecision> {
        self.count += 1;
        if self.machine_readable {
            println!("{}\t{}", object.relative_path, object.size);
        } else {
            let mut line = object.relative_path.clone();
            if self.properties.iter().any(|p| p.eq_ignore_ascii_case("ContentLength")) {
                line.push_str(&format!("; Content Length: {}", object.size));
            }
            if self.properties.iter().any(|p| p.eq_ignore_ascii_case("LastModifiedTime")) {
                line.push_str(&format!("; Last Modified: {}", object.last_modified));
            }
            if self.properties.iter().any(|p| p.eq_ignore_ascii_case("Md5")) {
                if let Some(md5) = &object.content_md5 {
                    line.push_str(&format!("; Content MD5: {}", hex::encode(md5)));
                }
            }
            println!("INFO: {line}");
        }
        Ok(SinkDecision::Continue)
    }
}

async fn run_list(plan: ListPlan, monitor: Arc<dyn Monitor>) -> Result<CommandExitCode> {
    let traverser = cook::traverser_for(&plan.resource, &plan.credential, plan.folder_option, plan.symlink_policy, None);
    let filters = azcopy_core::filter::FilterChain::new();
    let preprocessor = IdentityPreprocessor;
    let cancelled = AtomicBool::new(false);
    let opts = TraverseOptions {
        recursive: true,
        filters: &filters,
        monitor: monitor.as_ref(),
        preprocessor: &preprocessor,
        cancelled: &cancelled,
    };
    let mut sink = ListSink {
        machine_readable: plan.machine_readable,
        properties: plan.properties,
        count: 0,
    };
    traverser.traverse(&opts, &mut sink).await?;
    std::io::stdout().flush().ok();
    Ok(CommandExitCode::Success)
}

async fn run_sync(plan: SyncPlan, monitor: Arc<dyn Monitor>, config: &Config) -> Result<CommandExitCode> {
    let source_traverser = cook::traverser_for(&plan.source, &plan.source_credential, plan.folder_option, plan.symlink_policy, None);
    let destination_traverser = cook::traverser_for(
        &plan.destination,
        &plan.destination_credential,
        plan.folder_option,
        plan.symlink_policy,
        None,
    );

    let copy_job_id = JobID::new_random();
    let copy_template = JobPartTemplate {
        job_id: copy_job_id,
        from_to: FromTo::new(plan.source.location, plan.destination.location),
        source_root: plan.source.object_key.clone(),
        destination_root: plan.destination.object_key.clone(),
        source_credential: plan.source_credential.clone(),
        destination_credential: plan.destination_credential.clone(),
        put_md5: plan.put_md5,
        preserve_permissions: false,
        preserve_smb_info: false,
        preserve_posix_properties: false,
        s2s_preserve_access_tier: false,
    };
    let ste = Arc::new(InProcessSte::new());
    let mut copy_processor = TransferProcessor::new(copy_template, ste.clone(), Arc::clone(&monitor), config.max_transfers_per_part);

    let cancelled = AtomicBool::new(false);
    let (summary, destination_only) = sync::diff_and_schedule_copies(
        source_traverser.as_ref(),
        destination_traverser.as_ref(),
        &plan.filters,
        monitor.as_ref(),
        &mut copy_processor,
        &plan.options,
        &cancelled,
    )
    .await?;
    copy_processor.dispatch_final().await?;

    let policy = resolve_delete_policy(plan.options.delete_destination, destination_only.len() as u64);
    let mut deleted = 0u64;
    if policy != DeleteDestinationPolicy::Never && !destination_only.is_empty() {
        let delete_template = JobPartTemplate {
            job_id: copy_job_id,
            from_to: FromTo::to_trash(plan.destination.location),
            source_root: plan.destination.object_key.clone(),
            destination_root: String::new(),
            source_credential: plan.destination_credential.clone(),
            destination_credential: CredentialDescriptor::anonymous(),
            put_md5: false,
            preserve_permissions: false,
            preserve_smb_info: false,
            preserve_posix_properties: false,
            s2s_preserve_access_tier: false,
        };
        let mut delete_processor = TransferProcessor::new(delete_template, ste, Arc::clone(&monitor), config.max_transfers_per_part);
        deleted = sync::schedule_deletions(destination_only, &mut delete_processor, policy).await?;
        delete_processor.dispatch_final().await?;
    }

    info!(copied = summary.copied, deleted, %copy_job_id, "sync complete");
    if summary.copied == 0 && deleted == 0 {
        return Err(Error::NothingScheduled {
            context: "source and destination already match".to_owned(),
        });
    }
    Ok(CommandExitCode::Success)
}

/// `Prompt` is resolved here, the one place the dispatcher owns the stdin
/// interaction, before `sync::schedule_deletions` ever sees it.
fn resolve_delete_policy(policy: DeleteDestinationPolicy, destination_only_count: u64) -> DeleteDestinationPolicy {
    if policy != DeleteDestinationPolicy::Prompt || destination_only_count == 0 {
        return policy;
    }
    eprint!(
        "{destination_only_count} entit{} exist only at the destination. Delete them? (y/N) ",
        if destination_only_count == 1 { "y" } else { "ies" }
    );
    std::io::stderr().flush().ok();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return DeleteDestinationPolicy::Never;
    }
    if answer.trim().eq_ignore_ascii_case("y") {
        DeleteDestinationPolicy::Always
    } else {
        DeleteDestinationPolicy::Never
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_short_circuits_without_prompting() {
        assert_eq!(
            resolve_delete_policy(DeleteDestinationPolicy::Never, 5),
            DeleteDestinationPolicy::Never
        );
    }

    #[test]
    fn prompt_with_nothing_destination_only_skips_stdin() {
        assert_eq!(
            resolve_delete_policy(DeleteDestinationPolicy::Prompt, 0),
            DeleteDestinationPolicy::Prompt
        );
    }
}

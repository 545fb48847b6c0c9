//! Cooking: turns parsed CLI args into validated plans (`spec.md` §4.7).
//!
//! "Accepts cooked arguments, derives `FromTo`, constructs the credential
//! descriptors for source and destination independently, and returns an
//! orchestrator instance. Validation gates live here."

use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::backend::{self, BackendAdapter};
use crate::cli::{
    CopyArgs, DeleteDestinationArg, Error, FilterArgs, ListArgs, RemoveArgs, Result, SetPropertiesArgs, SyncArgs,
};
use crate::credential::CredentialDescriptor;
use crate::filter::{DateFilter, ExcludeNameFilter, ExcludePathFilter, FilterChain, IncludeFilter};
use crate::location::{Destination, FromTo, Location, ResourceRef};
use crate::stored_object::FolderPropertyOption;
use crate::sync::DeleteDestinationPolicy;
use crate::traverse::list_driven::ListDrivenTraverser;
use crate::traverse::local::LocalTraverser;
use crate::traverse::remote::RemoteTraverser;
use crate::traverse::{SymlinkPolicy, Traverser};

/// One cooked, ready-to-run request.
pub enum Action {
    Copy(CopyPlan),
    Sync(SyncPlan),
    Remove(RemovePlan),
    List(ListPlan),
    SetProperties(SetPropertiesPlan),
    /// `login`/`logout`/`env`/`jobs`: named in the CLI surface for
    /// completeness, but their behavior belongs to external collaborators
    /// (`spec.md` §1) with no pipeline logic behind them here.
    Unimplemented(&'static str),
}

pub struct CopyPlan {
    pub source: ResourceRef,
    pub destination: ResourceRef,
    pub from_to: FromTo,
    pub source_credential: CredentialDescriptor,
    pub destination_credential: CredentialDescriptor,
    pub recursive: bool,
    pub filters: FilterChain,
    pub folder_option: FolderPropertyOption,
    pub symlink_policy: SymlinkPolicy,
    pub put_md5: bool,
    pub preserve_permissions: bool,
    pub preserve_smb_info: bool,
    pub preserve_posix_properties: bool,
    pub s2s_preserve_access_tier: bool,
    /// `None` for a piped-stdin source: there is nothing to traverse, the
    /// dispatcher schedules exactly one synthetic object.
    pub source_is_pipe: bool,
    /// Children to visit directly, one per line of `--list-of-files`,
    /// instead of discovering the set by walking `source`.
    pub list_of_files: Option<Vec<String>>,
}

pub struct SyncPlan {
    pub source: ResourceRef,
    pub destination: ResourceRef,
    pub source_credential: CredentialDescriptor,
    pub destination_credential: CredentialDescriptor,
    pub filters: FilterChain,
    pub folder_option: FolderPropertyOption,
    pub symlink_policy: SymlinkPolicy,
    pub put_md5: bool,
    pub options: crate::sync::SyncOptions,
}

pub struct RemovePlan {
    pub resource: ResourceRef,
    pub from_to: FromTo,
    pub credential: CredentialDescriptor,
    pub recursive: bool,
    pub filters: FilterChain,
    pub folder_option: FolderPropertyOption,
    pub symlink_policy: SymlinkPolicy,
    pub list_of_files: Option<Vec<String>>,
}

pub struct ListPlan {
    pub resource: ResourceRef,
    pub credential: CredentialDescriptor,
    pub folder_option: FolderPropertyOption,
    pub symlink_policy: SymlinkPolicy,
    pub machine_readable: bool,
    pub properties: Vec<String>,
}

pub struct SetPropertiesPlan {
    pub resource: ResourceRef,
    pub credential: CredentialDescriptor,
    pub filters: FilterChain,
    pub folder_option: FolderPropertyOption,
    pub symlink_policy: SymlinkPolicy,
    pub tier: Option<String>,
    pub metadata: HashMap<String, String>,
}

pub fn cook(cli: &crate::cli::Cli) -> Result<Action> {
    match &cli.command {
        crate::cli::Command::Copy(args) => Ok(Action::Copy(cook_copy(args)?)),
        crate::cli::Command::Sync(args) => Ok(Action::Sync(cook_sync(args)?)),
        crate::cli::Command::Remove(args) => Ok(Action::Remove(cook_remove(args)?)),
        crate::cli::Command::List(args) => Ok(Action::List(cook_list(args)?)),
        crate::cli::Command::SetProperties(args) => Ok(Action::SetProperties(cook_set_properties(args)?)),
        crate::cli::Command::Login => Ok(Action::Unimplemented("login")),
        crate::cli::Command::Logout => Ok(Action::Unimplemented("logout")),
        crate::cli::Command::Env => Ok(Action::Unimplemented("env")),
        crate::cli::Command::Jobs => Ok(Action::Unimplemented("jobs")),
    }
}

fn cook_copy(args: &CopyArgs) -> Result<CopyPlan> {
    let source = ResourceRef::parse(&args.source)?;
    let destination = ResourceRef::parse(&args.destination)?;
    let from_to = FromTo::new(source.location, destination.location);

    validate_from_to_override(args.from_to.as_deref(), from_to)?;
    validate_supported_from_to(from_to)?;
    validate_service_level_recursive(&source, args.recursive)?;
    validate_pipe_source(&source, &destination, args.recursive)?;
    validate_posix_properties(args.preserve_posix_properties, from_to)?;

    let filters = build_filter_chain(&args.filters, args.recursive)?;
    let folder_option = folder_option_for(from_to.source, from_to.destination);

    Ok(CopyPlan {
        source_credential: credential_for(&source),
        destination_credential: credential_for(&destination),
        source,
        destination,
        from_to,
        recursive: args.recursive,
        filters,
        folder_option,
        symlink_policy: SymlinkPolicy::Follow,
        put_md5: args.put_md5,
        preserve_permissions: args.preserve_permissions,
        preserve_smb_info: args.preserve_smb_info,
        preserve_posix_properties: args.preserve_posix_properties,
        s2s_preserve_access_tier: args.s2s_preserve_access_tier,
        source_is_pipe: source.location == Location::Pipe,
        list_of_files: read_list_of_files(args.list_of_files.as_deref())?,
    })
}

fn cook_sync(args: &SyncArgs) -> Result<SyncPlan> {
    let source = ResourceRef::parse(&args.source)?;
    let destination = ResourceRef::parse(&args.destination)?;
    let from_to = FromTo::new(source.location, destination.location);

    validate_service_level_recursive(&source, args.recursive)?;

    let filters = build_filter_chain(&args.filters, args.recursive)?;
    let folder_option = folder_option_for(from_to.source, from_to.destination);

    let delete_destination = match args.delete_destination {
        DeleteDestinationArg::True => DeleteDestinationPolicy::Always,
        DeleteDestinationArg::False => DeleteDestinationPolicy::Never,
        DeleteDestinationArg::Prompt => DeleteDestinationPolicy::Prompt,
    };

    Ok(SyncPlan {
        source_credential: credential_for(&source),
        destination_credential: credential_for(&destination),
        source,
        destination,
        filters,
        folder_option,
        symlink_policy: SymlinkPolicy::Follow,
        put_md5: args.put_md5,
        options: crate::sync::SyncOptions {
            compare_hash: args.compare_hash,
            delete_destination,
            ..crate::sync::SyncOptions::default()
        },
    })
}

fn cook_remove(args: &RemoveArgs) -> Result<RemovePlan> {
    let resource = ResourceRef::parse(&args.uri)?;
    validate_service_level_recursive(&resource, args.recursive)?;

    let filters = build_filter_chain(&args.filters, args.recursive)?;
    let folder_option = folder_option_for(resource.location, Destination::Trash);

    Ok(RemovePlan {
        credential: credential_for(&resource),
        from_to: FromTo::to_trash(resource.location),
        resource,
        recursive: args.recursive,
        filters,
        folder_option,
        symlink_policy: SymlinkPolicy::Follow,
        list_of_files: read_list_of_files(args.list_of_files.as_deref())?,
    })
}

/// Reads `--list-of-files`: one relative child path per line, blank lines
/// and `#`-prefixed comments ignored.
fn read_list_of_files(path: Option<&std::path::Path>) -> Result<Option<Vec<String>>> {
    let Some(path) = path else { return Ok(None) };
    let contents = std::fs::read_to_string(path)?;
    let children = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect();
    Ok(Some(children))
}

fn cook_list(args: &ListArgs) -> Result<ListPlan> {
    let resource = ResourceRef::parse(&args.container_uri)?;
    let properties = args
        .properties
        .as_deref()
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect();

    Ok(ListPlan {
        credential: credential_for(&resource),
        folder_option: FolderPropertyOption::NoFolders,
        symlink_policy: SymlinkPolicy::Follow,
        resource,
        machine_readable: args.machine_readable,
        properties,
    })
}

fn cook_set_properties(args: &SetPropertiesArgs) -> Result<SetPropertiesPlan> {
    let resource = ResourceRef::parse(&args.uri)?;
    let filters = build_filter_chain(&args.filters, true)?;
    let metadata = parse_metadata(args.metadata.as_deref());

    Ok(SetPropertiesPlan {
        credential: credential_for(&resource),
        folder_option: FolderPropertyOption::NoFolders,
        symlink_policy: SymlinkPolicy::Follow,
        resource,
        filters,
        tier: args.tier.clone(),
        metadata,
    })
}

fn validate_service_level_recursive(resource: &ResourceRef, recursive: bool) -> Result<()> {
    if resource.is_service_level() && !recursive {
        return Err(Error::ServiceLevelRequiresRecursive);
    }
    Ok(())
}

fn validate_pipe_source(source: &ResourceRef, destination: &ResourceRef, recursive: bool) -> Result<()> {
    if source.location != Location::Pipe {
        return Ok(());
    }
    if recursive || !destination.is_object_level() || destination.is_directory_syntactic() {
        return Err(Error::PipeRequiresSingleObjectDestination);
    }
    Ok(())
}

/// `--from-to` is a redundant override (e.g. `LocalBlob`) for cases where the
/// URL alone doesn't pin down the endpoint family; since both endpoints are
/// already parsed here, it only needs to agree with what was inferred.
fn validate_from_to_override(raw: Option<&str>, inferred: FromTo) -> Result<()> {
    let Some(raw) = raw else { return Ok(()) };
    const LOCATIONS: [Location; 5] = [
        Location::Local,
        Location::Blob,
        Location::File,
        Location::BlobFS,
        Location::S3,
    ];
    let mut matches_inferred = false;
    for &src in &LOCATIONS {
        let Some(rest) = raw.strip_prefix(src.to_string().as_str()) else { continue };
        for &dst in &LOCATIONS {
            if rest == dst.to_string() && FromTo::new(src, dst) == inferred {
                matches_inferred = true;
            }
        }
    }
    if matches_inferred {
        Ok(())
    } else {
        Err(Error::IncompatibleFlags(format!(
            "--from-to {raw} does not match the endpoints inferred from source/destination ({inferred})"
        )))
    }
}

/// `Pipe` is a stdin-only source; nothing may ever target it as a
/// destination.
fn validate_supported_from_to(from_to: FromTo) -> Result<()> {
    if from_to.destination == Destination::Location(Location::Pipe) {
        return Err(Error::UnsupportedFromTo {
            source: from_to.source.to_string(),
            destination: "Pipe".to_owned(),
        });
    }
    Ok(())
}

fn validate_posix_properties(preserve_posix_properties: bool, from_to: FromTo) -> Result<()> {
    if !preserve_posix_properties {
        return Ok(());
    }
    let supported = matches!(
        (from_to.source, from_to.destination),
        (Location::Local, Destination::Location(Location::Blob))
            | (Location::Blob, Destination::Location(Location::Local))
            | (Location::Blob, Destination::Location(Location::Blob))
    );
    if !supported {
        return Err(Error::PosixPropertiesUnsupported {
            from_to: from_to.to_string(),
        });
    }
    Ok(())
}

fn build_filter_chain(args: &FilterArgs, recursive: bool) -> Result<FilterChain> {
    let mut chain = FilterChain::new()
        .push(IncludeFilter::new(&args.include_pattern, recursive)?)
        .push(ExcludeNameFilter::new(&args.exclude_pattern, recursive)?)
        .push(ExcludePathFilter::new(&args.exclude_path, recursive)?);

    let after = parse_date(&args.include_after, "include-after")?;
    let before = parse_date(&args.include_before, "include-before")?;
    if after.is_some() || before.is_some() {
        chain = chain.push(DateFilter { after, before });
    }
    Ok(chain)
}

fn parse_date(value: &Option<String>, flag: &'static str) -> Result<Option<OffsetDateTime>> {
    let Some(raw) = value else { return Ok(None) };
    OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
        .map(Some)
        .map_err(|e| Error::InvalidDate {
            flag,
            value: raw.clone(),
            message: e.to_string(),
        })
}

fn parse_metadata(raw: Option<&str>) -> HashMap<String, String> {
    raw.unwrap_or_default()
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .collect()
}

/// A folder entity is only worth emitting when both sides of the transfer
/// represent folders as first-class, addressable things.
fn folder_option_for(source: Location, destination: Destination) -> FolderPropertyOption {
    let source_has_folders = source != Location::Pipe;
    let destination_has_folders = match destination {
        Destination::Trash => true,
        Destination::Location(Location::Pipe) => false,
        Destination::Location(_) => true,
    };
    if source_has_folders && destination_has_folders {
        FolderPropertyOption::AllFoldersExceptRoot
    } else {
        FolderPropertyOption::NoFolders
    }
}

/// Construct a `CredentialDescriptor` for one endpoint from whatever is
/// available without prompting: an embedded SAS token, then well-known
/// environment variables, falling back to anonymous. Real credential
/// acquisition (OAuth device-code flow, SharedKey lookup, AWS profile
/// resolution) is an external collaborator per `spec.md` §1; this exists
/// only so the core has something to hand the Backend Adapter in tests and
/// simple invocations.
fn credential_for(resource: &ResourceRef) -> CredentialDescriptor {
    if let Some(sas) = &resource.sas_token {
        return CredentialDescriptor::from_sas(sas.clone());
    }
    match resource.location {
        Location::S3 => match (std::env::var("AWS_ACCESS_KEY_ID"), std::env::var("AWS_SECRET_ACCESS_KEY")) {
            (Ok(key), Ok(secret)) => CredentialDescriptor::s3_access(key, secret),
            _ => CredentialDescriptor::anonymous(),
        },
        Location::Blob | Location::File | Location::BlobFS => match std::env::var("AZCOPY_OAUTH_TOKEN") {
            Ok(token) => CredentialDescriptor::oauth(token),
            Err(_) => CredentialDescriptor::anonymous(),
        },
        Location::Local | Location::Pipe => CredentialDescriptor::anonymous(),
    }
}

/// Build the `Traverser` for one resolved endpoint. When `list_of_files` is
/// `Some`, the returned traverser visits exactly those children instead of
/// discovering the set by walking `resource`.
pub fn traverser_for(
    resource: &ResourceRef,
    credential: &CredentialDescriptor,
    folder_option: FolderPropertyOption,
    symlink_policy: SymlinkPolicy,
    list_of_files: Option<&[String]>,
) -> Box<dyn Traverser> {
    if let Some(children) = list_of_files {
        let adapter = match resource.location {
            Location::Local => None,
            location => Some(adapter_for(location)),
        };
        return Box::new(ListDrivenTraverser::new(
            resource.location,
            adapter,
            resource.clone(),
            credential.clone(),
            children.to_vec(),
            symlink_policy,
            folder_option,
        ));
    }
    match resource.location {
        Location::Local => Box::new(LocalTraverser::new(resource, symlink_policy, folder_option)),
        _ => Box::new(RemoteTraverser::new(
            adapter_for(resource.location),
            resource.clone(),
            credential.clone(),
            folder_option,
        )),
    }
}

fn adapter_for(location: Location) -> Arc<dyn BackendAdapter> {
    match location {
        Location::Blob => Arc::new(backend::blob::BlobAdapter::new()),
        Location::File => Arc::new(backend::file::FileAdapter::new()),
        Location::BlobFS => Arc::new(backend::blobfs::BlobFsAdapter::new()),
        Location::S3 => Arc::new(backend::s3::S3Adapter::new()),
        Location::Local | Location::Pipe => unreachable!("local/pipe endpoints never build a remote adapter"),
    }
}

//! Key and name derivation.
//!
//! Every string produced here is part of the persisted format: bucket and
//! table names, `*`-joined table keys and `/`-joined object paths must stay
//! bit-exact so existing deployments remain readable.

use symstore_types::{PackageName, PackageState, SourceName, SymbolName};

use crate::error::{StorageError, StorageResult};

/// Prefix shared by every feed bucket.
pub const FEED_PREFIX: &str = "feed-";
/// Marker for explicitly named feeds, following [`FEED_PREFIX`].
pub const NAMED_FEED_PREFIX: &str = "named-";
/// Marker for the default (unnamed) feed, following [`FEED_PREFIX`].
pub const DEFAULT_FEED_NAME: &str = "default";

/// Separator of composite table keys.
pub const KEY_SEPARATOR: char = '*';

fn is_bucket_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.'
}

fn is_table_char(c: char) -> bool {
    is_bucket_char(c) || c == '_'
}

/// Strip everything outside `[A-Za-z0-9.-]` and lower-case the rest.
pub fn sanitize_bucket_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| is_bucket_char(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Bucket backing a feed. `None` selects the default feed.
///
/// Named feeds must already be lower-case; anything else is rejected rather
/// than folded, so two spellings can never silently share a bucket.
pub fn bucket_name(feed: Option<&str>) -> StorageResult<String> {
    let qualified = match feed {
        Some(name) => {
            if name.to_lowercase() != name {
                return Err(StorageError::InvalidFeedName(name.to_string()));
            }
            format!("{FEED_PREFIX}{NAMED_FEED_PREFIX}{name}")
        }
        None => format!("{FEED_PREFIX}{DEFAULT_FEED_NAME}"),
    };
    Ok(sanitize_bucket_name(&qualified))
}

/// Table backing a feed, derived from its bucket name.
pub fn table_name(bucket: &str) -> String {
    bucket.chars().filter(|c| is_table_char(*c)).collect()
}

/// Reverse of [`bucket_name`] for feed listing.
///
/// - `Ok(None)`: not a feed bucket at all.
/// - `Ok(Some(None))`: the default feed.
/// - `Ok(Some(Some(name)))`: a named feed.
/// - `Err(NamingViolation)`: carries the feed prefix but neither marker.
pub fn feed_from_bucket(bucket: &str) -> StorageResult<Option<Option<String>>> {
    let Some(rest) = bucket.strip_prefix(FEED_PREFIX) else {
        return Ok(None);
    };
    if rest == DEFAULT_FEED_NAME {
        return Ok(Some(None));
    }
    match rest.strip_prefix(NAMED_FEED_PREFIX) {
        Some(name) => Ok(Some(Some(name.to_string()))),
        None => Err(StorageError::NamingViolation(bucket.to_string())),
    }
}

/// Partition of the package rows in one state: `pkg*{state}`.
pub fn package_partition_key(state: &PackageState) -> String {
    format!("pkg{KEY_SEPARATOR}{}", state.key_form())
}

/// Sort key of a package row: `{id}*{version}`.
pub fn package_sort_key(name: &PackageName) -> String {
    format!("{}{KEY_SEPARATOR}{}", name.id(), name.version())
}

/// Decode a sort key produced by [`package_sort_key`].
pub fn parse_package_sort_key(key: &str) -> StorageResult<PackageName> {
    let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
    match parts.as_slice() {
        [id, version] => Ok(PackageName::new(*id, *version)),
        _ => Err(StorageError::MalformedSortKey(key.to_string())),
    }
}

/// Partition holding a symbol's reference set: `pdb*{image}*{hash}`.
pub fn symbol_partition_key(name: &SymbolName) -> String {
    format!(
        "pdb{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
        name.image_name(),
        name.symbol_hash()
    )
}

/// Partition holding a source file's reference set: `src*{file}*{hash}`.
pub fn source_partition_key(name: &SourceName) -> String {
    format!("src{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}", name.file_name(), name.hash())
}

/// Object path of a package blob. The owner is part of the path, so an
/// ownership change relocates the blob.
pub fn package_path(
    state: &PackageState,
    owner: &str,
    name: &PackageName,
    extension: &str,
) -> String {
    format!(
        "pkg/{state}/{owner}/{id}/{version}/{id}.{version}.{extension}",
        state = state.key_form(),
        id = name.id(),
        version = name.version(),
    )
}

/// Object path of a shared symbol blob.
pub fn symbol_path(name: &SymbolName) -> String {
    format!("pdb/{}/{}", name.image_name(), name.symbol_hash())
}

/// Object path of a shared source blob.
pub fn source_path(name: &SourceName) -> String {
    format!("src/{}/{}", name.file_name(), name.hash())
}

/// Drop the first two `/` segments of an object key (`pkg/{state}/...`
/// becomes `{owner}/...`).
pub fn strip_internal_prefix(key: &str) -> String {
    key.split('/').skip(2).collect::<Vec<_>>().join("/")
}

//! Catalogue model for porksync
//!
//! A catalogue is a YAML document mapping domains to the address their A
//! records should carry:
//!
//! ```yaml
//! sk: sk1_...
//! pk: pk1_...
//!
//! # flat entry: the domain itself
//! example.org:
//!   address: localhost
//!
//! # nested entry: subdomains plus the reserved keys
//! example.com:
//!   __address: localhost
//!   __ssl: /etc/ssl/example.com/
//!   www:
//!     address: localhost
//!   mail:
//!     address: mx.provider.net
//!
//! # disabled
//! _old.example.net:
//!   address: localhost
//! ```
//!
//! The YAML tree is validated once, here, into [`Catalogue`]. A malformed
//! document or missing credentials reject the whole file; a malformed
//! entry is recorded in [`Catalogue::rejected`] and skipped at run time.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Address token meaning "this machine's own public address"
pub const OWN_ADDRESS_TOKEN: &str = "localhost";

/// Reserved key for the root domain's own target in a nested entry
pub const ROOT_ADDRESS_KEY: &str = "__address";

/// Reserved key for the certificate directory of a domain
pub const SSL_KEY: &str = "__ssl";

/// Leaf field holding the address
pub const ADDRESS_FIELD: &str = "address";

/// Files, directories and entries starting with this are disabled
pub const IGNORE_PREFIX: char = '_';

/// Catalogue field for the secret API key
pub const SECRET_KEY_FIELD: &str = "sk";

/// Catalogue field for the public API key
pub const PUBLIC_KEY_FIELD: &str = "pk";

/// Environment fallback for the secret API key
pub const SECRET_KEY_ENV: &str = "PORKSYNC_SK";

/// Environment fallback for the public API key
pub const PUBLIC_KEY_ENV: &str = "PORKSYNC_PK";

/// Registrar credential pair
///
/// The Debug implementation does NOT expose the secret key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    secret_key: String,
    public_key: String,
}

impl Credentials {
    /// Create a credential pair; both halves must be non-empty
    pub fn new(secret_key: impl Into<String>, public_key: impl Into<String>) -> Result<Self> {
        let secret_key = secret_key.into();
        let public_key = public_key.into();

        if secret_key.trim().is_empty() {
            return Err(Error::config(format!("'{}' is required", SECRET_KEY_FIELD)));
        }
        if public_key.trim().is_empty() {
            return Err(Error::config(format!("'{}' is required", PUBLIC_KEY_FIELD)));
        }

        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Secret API key
    /// ⚠️ NEVER log this value
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Public API key
    pub fn public_key(&self) -> &str {
        &self.public_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_key", &"<REDACTED>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Credentials supplied outside the catalogue (environment)
///
/// Keys present in a catalogue file win over these.
#[derive(Clone, Default)]
pub struct CredentialDefaults {
    pub secret_key: Option<String>,
    pub public_key: Option<String>,
}

impl CredentialDefaults {
    /// Read the defaults through a variable lookup (normally `std::env::var`)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            secret_key: non_empty(SECRET_KEY_ENV),
            public_key: non_empty(PUBLIC_KEY_ENV),
        }
    }
}

impl fmt::Debug for CredentialDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialDefaults")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<REDACTED>"))
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Where a catalogue leaf should point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSpec {
    /// This machine's own public address (`"localhost"`)
    OwnAddress,
    /// The first IPv4 address a DNS lookup of this hostname returns
    Host(String),
}

impl AddressSpec {
    /// Interpret a catalogue `address` value
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::config("address cannot be empty"));
        }
        if raw == OWN_ADDRESS_TOKEN {
            Ok(AddressSpec::OwnAddress)
        } else {
            Ok(AddressSpec::Host(raw.to_string()))
        }
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpec::OwnAddress => f.write_str(OWN_ADDRESS_TOKEN),
            AddressSpec::Host(host) => f.write_str(host),
        }
    }
}

/// A single `{address}` mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub address: AddressSpec,
}

impl Leaf {
    pub fn new(address: AddressSpec) -> Self {
        Self { address }
    }
}

/// One domain of the catalogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// `domain: {address: ...}`, targets the domain itself
    Leaf(Leaf),

    /// Subdomain mappings plus the reserved keys
    Nested {
        /// `__address`, the root domain's own target
        root: Option<Leaf>,
        /// Subdomain label → leaf
        subdomains: BTreeMap<String, Leaf>,
        /// `__ssl`, directory holding the domain's PEM files
        ssl: Option<PathBuf>,
    },
}

impl Entry {
    /// Every fully-qualified name this entry manages, with its address
    pub fn targets(&self, domain: &str) -> Vec<Target> {
        match self {
            Entry::Leaf(leaf) => vec![Target::new(domain, &leaf.address)],
            Entry::Nested {
                root, subdomains, ..
            } => {
                let mut targets = Vec::with_capacity(subdomains.len() + 1);
                if let Some(leaf) = root {
                    targets.push(Target::new(domain, &leaf.address));
                }
                for (label, leaf) in subdomains {
                    targets.push(Target::new(format!("{}.{}", label, domain), &leaf.address));
                }
                targets
            }
        }
    }

    /// Certificate directory, if the entry carries `__ssl`
    pub fn ssl_path(&self) -> Option<&Path> {
        match self {
            Entry::Nested { ssl: Some(path), .. } => Some(path.as_path()),
            _ => None,
        }
    }
}

/// A fully-qualified name and the address it should resolve to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub fqdn: String,
    pub address: AddressSpec,
}

impl Target {
    pub fn new(fqdn: impl Into<String>, address: &AddressSpec) -> Self {
        Self {
            fqdn: fqdn.into(),
            address: address.clone(),
        }
    }
}

/// An entry that failed validation and will be skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// Domain or `subdomain.domain` the entry was for
    pub name: String,
    /// Why it was rejected
    pub reason: String,
}

/// A validated catalogue loaded from one file
#[derive(Debug, Clone)]
pub struct Catalogue {
    /// File the catalogue came from
    pub source: PathBuf,

    /// Registrar credentials for every domain in this catalogue
    pub credentials: Credentials,

    /// Domain → entry
    pub domains: BTreeMap<String, Entry>,

    /// Entries that failed validation
    pub rejected: Vec<RejectedEntry>,
}

impl Catalogue {
    /// Parse and validate a catalogue document
    ///
    /// # Parameters
    ///
    /// - `source`: Where the text came from (used in messages)
    /// - `text`: YAML document
    /// - `defaults`: Credentials used when the document omits `sk`/`pk`
    pub fn from_yaml_str(
        source: impl Into<PathBuf>,
        text: &str,
        defaults: &CredentialDefaults,
    ) -> Result<Self> {
        let source = source.into();
        let document: Value = serde_yaml::from_str(text).map_err(|e| {
            Error::config(format!("{}: not a valid YAML document: {}", source.display(), e))
        })?;

        let Value::Mapping(root) = document else {
            return Err(Error::config(format!(
                "{}: top level must be a mapping of domains",
                source.display()
            )));
        };

        let credentials = read_credentials(&source, &root, defaults)?;

        let mut domains = BTreeMap::new();
        let mut rejected = Vec::new();

        for (key, value) in &root {
            let Some(domain) = key.as_str() else {
                rejected.push(RejectedEntry {
                    name: format!("{:?}", key),
                    reason: "domain key is not a string".to_string(),
                });
                continue;
            };

            if domain == SECRET_KEY_FIELD || domain == PUBLIC_KEY_FIELD {
                continue;
            }

            if domain.starts_with(IGNORE_PREFIX) {
                tracing::debug!("{}: {} is disabled, skipping", source.display(), domain);
                continue;
            }

            match parse_entry(domain, value, &mut rejected) {
                Ok(entry) => {
                    domains.insert(domain.to_string(), entry);
                }
                Err(reason) => rejected.push(RejectedEntry {
                    name: domain.to_string(),
                    reason,
                }),
            }
        }

        Ok(Self {
            source,
            credentials,
            domains,
            rejected,
        })
    }

    /// Load and validate one catalogue file
    pub fn load_file(path: &Path, defaults: &CredentialDefaults) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("{}: cannot read catalogue: {}", path.display(), e))
        })?;
        Self::from_yaml_str(path, &text, defaults)
    }

    /// Total number of targets across all domains
    pub fn target_count(&self) -> usize {
        self.domains
            .iter()
            .map(|(domain, entry)| entry.targets(domain).len())
            .sum()
    }
}

/// Load every catalogue at `path`
///
/// A file yields one catalogue. A directory is walked recursively in
/// file-name order; files and directories whose name starts with `_` are
/// skipped.
///
/// Any unreadable or invalid file fails the whole load.
pub fn load_catalogues(path: &Path, defaults: &CredentialDefaults) -> Result<Vec<Catalogue>> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        Error::config(format!(
            "Catalogue path {} is not accessible: {}",
            path.display(),
            e
        ))
    })?;

    if metadata.is_file() {
        return Ok(vec![Catalogue::load_file(path, defaults)?]);
    }

    let mut catalogues = Vec::new();
    let walker = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        // depth 0 is the root itself, which is never ignored
        .filter_entry(|entry| entry.depth() == 0 || !is_ignored(entry.file_name()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            Error::config(format!("Failed to walk {}: {}", path.display(), e))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        tracing::debug!("Loading catalogue {}", entry.path().display());
        catalogues.push(Catalogue::load_file(entry.path(), defaults)?);
    }

    Ok(catalogues)
}

fn is_ignored(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .is_some_and(|name| name.starts_with(IGNORE_PREFIX))
}

fn read_credentials(
    source: &Path,
    root: &Mapping,
    defaults: &CredentialDefaults,
) -> Result<Credentials> {
    let field = |name: &str, fallback: &Option<String>| -> Result<String> {
        match root.get(name) {
            Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.clone()),
            Some(Value::String(_)) | Some(Value::Null) | None => fallback.clone().ok_or_else(|| {
                Error::config(format!("{}: '{}' is required", source.display(), name))
            }),
            Some(_) => Err(Error::config(format!(
                "{}: '{}' must be a string",
                source.display(),
                name
            ))),
        }
    };

    let secret_key = field(SECRET_KEY_FIELD, &defaults.secret_key)?;
    let public_key = field(PUBLIC_KEY_FIELD, &defaults.public_key)?;

    Credentials::new(secret_key, public_key)
        .map_err(|e| Error::config(format!("{}: {}", source.display(), e)))
}

/// Validate one domain's value
///
/// Subdomain-level failures are pushed to `rejected` and the rest of the
/// entry is kept; an `Err` rejects the whole domain.
fn parse_entry(
    domain: &str,
    value: &Value,
    rejected: &mut Vec<RejectedEntry>,
) -> std::result::Result<Entry, String> {
    let Value::Mapping(mapping) = value else {
        return Err(format!(
            "expected a mapping with '{}' or subdomains, found {}",
            ADDRESS_FIELD,
            value_kind(value)
        ));
    };

    if mapping.contains_key(ADDRESS_FIELD) {
        if mapping.len() != 1 {
            return Err(format!(
                "a flat entry may only contain '{}'",
                ADDRESS_FIELD
            ));
        }
        return parse_leaf(value).map(Entry::Leaf);
    }

    let mut root = None;
    let mut ssl = None;
    let mut subdomains = BTreeMap::new();

    for (key, value) in mapping {
        let Some(label) = key.as_str() else {
            rejected.push(RejectedEntry {
                name: domain.to_string(),
                reason: format!("subdomain key {:?} is not a string", key),
            });
            continue;
        };

        match label {
            ROOT_ADDRESS_KEY => {
                let address = value
                    .as_str()
                    .ok_or_else(|| format!("'{}' must be a string", ROOT_ADDRESS_KEY))?;
                let address = AddressSpec::parse(address)
                    .map_err(|e| format!("'{}': {}", ROOT_ADDRESS_KEY, e))?;
                root = Some(Leaf::new(address));
            }
            SSL_KEY => {
                let path = value
                    .as_str()
                    .filter(|path| !path.trim().is_empty())
                    .ok_or_else(|| format!("'{}' must be a non-empty path", SSL_KEY))?;
                ssl = Some(PathBuf::from(path));
            }
            label if label.starts_with(IGNORE_PREFIX) => {
                tracing::debug!("{}.{} is disabled, skipping", label, domain);
            }
            label => match parse_leaf(value) {
                Ok(leaf) => {
                    subdomains.insert(label.to_string(), leaf);
                }
                Err(reason) => rejected.push(RejectedEntry {
                    name: format!("{}.{}", label, domain),
                    reason,
                }),
            },
        }
    }

    Ok(Entry::Nested {
        root,
        subdomains,
        ssl,
    })
}

fn parse_leaf(value: &Value) -> std::result::Result<Leaf, String> {
    let address = match value.get(ADDRESS_FIELD) {
        Some(Value::String(address)) => address,
        Some(other) => {
            return Err(format!(
                "'{}' must be a string, found {}",
                ADDRESS_FIELD,
                value_kind(other)
            ));
        }
        None => return Err(format!("missing '{}'", ADDRESS_FIELD)),
    };

    AddressSpec::parse(address)
        .map(Leaf::new)
        .map_err(|e| e.to_string())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "nothing",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

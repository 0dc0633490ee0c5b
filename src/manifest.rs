//! The manifest model: parsing a deployment's asset-group listing and
//! diffing two manifests to find the URLs a new deployment must prefetch.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Recognized and free-form top-level manifest settings.
///
/// `dev` and `index` are the only keys the engine itself interprets;
/// anything else round-trips through `extra` untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    /// When true, every request is satisfied straight from the network
    /// and no cache is ever consulted.
    pub dev: bool,
    /// The URL `/` is rewritten to when present.
    pub index: Option<String>,
    /// Unrecognized metadata keys, preserved verbatim.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One entry in a group's `urls` map: a cached URL and its optional
/// content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The URL this entry caches.
    pub url: String,
    /// Build-tool-supplied content hash, if any. Not verified by this
    /// crate (integrity checking is out of scope).
    pub hash: Option<String>,
    /// Name of the owning group. A lookup key, not an ownership edge:
    /// entries do not own groups, and resolving it means looking the
    /// name back up in the enclosing [`Manifest::groups`].
    pub group: String,
}

/// A fallback rule: requests whose URL starts with `prefix` are
/// rewritten to `fallback_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEntry {
    /// The URL prefix a request must start with to match this rule.
    pub prefix: String,
    /// The URL to rewrite matching requests to.
    pub fallback_to: String,
}

/// A named, versioned-as-a-unit bundle of cacheable content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Unique within the enclosing manifest.
    pub name: String,
    /// URL to entry, in manifest-text insertion order.
    pub urls: IndexMap<String, Entry>,
    /// Prefix to fallback rule, in manifest-text insertion order.
    pub fallback: IndexMap<String, FallbackEntry>,
}

impl Group {
    /// The cache name this group's content is stored under.
    ///
    /// Derived from the group name alone, the bare form of §3's
    /// `ngsw.cache.<name>[.v<version>]` — stable across activations
    /// regardless of content, which is what lets the lifecycle
    /// controller reuse a cache across a deployment that didn't touch
    /// this group, and what lets the activate-time GC sweep (§3,
    /// Invariant 4) key purely off group name without reconstructing a
    /// version fingerprint.
    pub fn cache_name(&self) -> String {
        cache_name_for(&self.name)
    }
}

/// The cache name a group is assigned, given its name (§3:
/// `ngsw.cache.<name>[.v<version>]`, bare form).
pub fn cache_name_for(group_name: &str) -> String {
    format!("ngsw.cache.{group_name}")
}

/// An immutable snapshot of one deployment: a typed manifest tree plus
/// the raw text it was parsed from, retained for byte-exact comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Top-level settings.
    pub metadata: Metadata,
    /// Group name to group, in manifest-text insertion order.
    pub groups: IndexMap<String, Group>,
}

impl Manifest {
    /// Look up a group's derived cache name by name.
    pub fn cache_name(&self, group_name: &str) -> Option<String> {
        self.groups.get(group_name).map(Group::cache_name)
    }
}

/// A manifest together with the exact text it was parsed from.
///
/// The lifecycle controller and diff function compare `text` rather
/// than re-serializing `manifest`, since the spec's byte-exact
/// equality invariant (§3, Invariant 3 / `ManifestDelta.changed`) is
/// defined over the original bytes, not a canonicalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSnapshot {
    /// The parsed manifest.
    pub manifest: Manifest,
    /// The exact text `manifest` was parsed from.
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawManifest {
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    groups: IndexMap<String, RawGroup>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawGroup {
    #[serde(default)]
    urls: IndexMap<String, RawEntry>,
    #[serde(default)]
    fallback: IndexMap<String, RawFallbackEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawEntry {
    #[serde(default)]
    hash: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawFallbackEntry {
    #[serde(rename = "fallbackTo")]
    fallback_to: String,
}

/// Parse manifest text into a [`ManifestSnapshot`].
///
/// The on-disk grammar is out of scope for the original spec; this
/// crate accepts the JSON shape documented in its expanded spec
/// (`SPEC_FULL.md` §3.1), the same way the spec describes the parser's
/// duty as "accept what the build tooling emits".
pub fn parse(text: &str) -> Result<ManifestSnapshot> {
    let raw: RawManifest = serde_json::from_str(text)?;

    let mut metadata = Metadata::default();
    let mut extra = raw.metadata;
    if let Some(dev) = extra.remove("dev") {
        metadata.dev = dev.as_bool().unwrap_or(false);
    }
    if let Some(index) = extra.remove("index") {
        metadata.index = index.as_str().map(str::to_owned);
    }
    metadata.extra = extra;

    let mut groups = IndexMap::with_capacity(raw.groups.len());
    for (name, raw_group) in raw.groups {
        let urls = raw_group
            .urls
            .into_iter()
            .map(|(url, raw_entry)| {
                let entry = Entry {
                    url: url.clone(),
                    hash: raw_entry.hash,
                    group: name.clone(),
                };
                (url, entry)
            })
            .collect();
        let fallback = raw_group
            .fallback
            .into_iter()
            .map(|(prefix, raw_fallback)| {
                let entry = FallbackEntry {
                    prefix: prefix.clone(),
                    fallback_to: raw_fallback.fallback_to,
                };
                (prefix, entry)
            })
            .collect();
        groups.insert(name.clone(), Group { name, urls, fallback });
    }

    Ok(ManifestSnapshot { manifest: Manifest { metadata, groups }, text: text.to_string() })
}

/// Re-serialize a manifest back to its JSON text form.
///
/// Used only to build manifests programmatically (e.g. in tests); the
/// lifecycle controller otherwise always carries a manifest's
/// originally-parsed text alongside it rather than round-tripping
/// through this function, since §8's round-trip law is `parse(serialize(M))
/// = M`, not `serialize(parse(text)) = text`.
pub fn serialize(manifest: &Manifest) -> Result<String> {
    let mut metadata = manifest.metadata.extra.clone();
    if manifest.metadata.dev {
        metadata.insert("dev".to_string(), serde_json::Value::Bool(true));
    }
    if let Some(index) = &manifest.metadata.index {
        metadata.insert(
            "index".to_string(),
            serde_json::Value::String(index.clone()),
        );
    }

    let groups = manifest
        .groups
        .iter()
        .map(|(name, group)| {
            let urls = group
                .urls
                .iter()
                .map(|(url, entry)| {
                    (url.clone(), RawEntry { hash: entry.hash.clone() })
                })
                .collect();
            let fallback = group
                .fallback
                .iter()
                .map(|(prefix, entry)| {
                    (
                        prefix.clone(),
                        RawFallbackEntry {
                            fallback_to: entry.fallback_to.clone(),
                        },
                    )
                })
                .collect();
            (name.clone(), RawGroup { urls, fallback })
        })
        .collect();

    let raw = RawManifest { metadata, groups };
    Ok(serde_json::to_string(&raw)?)
}

/// Resolve a manifest-supplied URL (a request target, an asset URL, or
/// `MANIFEST_URL` itself) for use in a [`crate::request::Request`].
///
/// The manifest format carries no origin of its own (§6: "the on-disk
/// grammar is out of scope") and a bare path like `/index.html` is the
/// common shape, so absolute URLs are used as-is and bare paths are
/// resolved against a fixed local placeholder origin.
pub fn local_url(path_or_url: &str) -> Result<Url> {
    path_or_url
        .parse::<Url>()
        .or_else(|_| Url::parse(&format!("http://ngsw.local{path_or_url}")))
        .map_err(Error::InvalidUrl)
}

/// Per-group added/removed URL sets between two manifests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupDelta {
    /// URLs present in the fresh group but not in the cached one.
    pub added: Vec<String>,
    /// URLs present in the cached group but not in the fresh one.
    pub removed: Vec<String>,
}

/// The result of comparing a freshly-fetched manifest against a
/// previously-stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDelta {
    /// The fresh manifest.
    pub current: Manifest,
    /// The fresh manifest's raw text.
    pub current_text: String,
    /// The manifest being compared against, if any.
    pub previous: Option<Manifest>,
    /// False only when `previous` exists and its text is byte-identical
    /// to `current_text`.
    pub changed: bool,
    /// Per-group added/removed URL sets. Empty for every group when
    /// `changed` is false.
    pub per_group: IndexMap<String, GroupDelta>,
}

/// Diff a freshly-parsed manifest against the currently cached one, if
/// any.
///
/// When `cached` is `None`, every group and URL in `fresh` is reported
/// as `added` (a cold install). When the two texts are byte-identical,
/// `changed` is false and every group's delta is empty, which is what
/// lets two consecutive installs of the same deployment skip all
/// network fetches.
pub fn diff(
    fresh: &ManifestSnapshot,
    cached: Option<&ManifestSnapshot>,
) -> ManifestDelta {
    let changed = match cached {
        None => true,
        Some(cached) => cached.text != fresh.text,
    };

    let mut per_group = IndexMap::with_capacity(fresh.manifest.groups.len());

    if changed {
        let empty = IndexMap::new();
        let cached_groups =
            cached.map(|c| &c.manifest.groups).unwrap_or(&empty);

        for (name, group) in &fresh.manifest.groups {
            let cached_group = cached_groups.get(name);
            let added = group
                .urls
                .keys()
                .filter(|url| {
                    !cached_group
                        .map(|g| g.urls.contains_key(*url))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            let removed = cached_group
                .map(|g| {
                    g.urls
                        .keys()
                        .filter(|url| !group.urls.contains_key(*url))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            per_group.insert(name.clone(), GroupDelta { added, removed });
        }

        // Groups present in cached but gone entirely from fresh: every
        // URL they held is removed.
        for (name, cached_group) in cached_groups {
            if !fresh.manifest.groups.contains_key(name) {
                per_group.insert(
                    name.clone(),
                    GroupDelta {
                        added: Vec::new(),
                        removed: cached_group.urls.keys().cloned().collect(),
                    },
                );
            }
        }
    } else {
        for name in fresh.manifest.groups.keys() {
            per_group.insert(name.clone(), GroupDelta::default());
        }
    }

    ManifestDelta {
        current: fresh.manifest.clone(),
        current_text: fresh.text.clone(),
        previous: cached.map(|c| c.manifest.clone()),
        changed,
        per_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text() -> &'static str {
        r#"{
            "metadata": { "dev": false, "index": "/index.html" },
            "groups": {
                "app": {
                    "urls": { "/index.html": { "hash": "h1" } },
                    "fallback": { "/deep/": { "fallbackTo": "/index.html" } }
                }
            }
        }"#
    }

    #[test]
    fn parses_metadata_and_groups() {
        let snapshot = parse(sample_text()).unwrap();
        assert!(!snapshot.manifest.metadata.dev);
        assert_eq!(
            snapshot.manifest.metadata.index.as_deref(),
            Some("/index.html")
        );
        let group = snapshot.manifest.groups.get("app").unwrap();
        assert_eq!(group.name, "app");
        assert_eq!(group.cache_name(), "ngsw.cache.app");
        let entry = group.urls.get("/index.html").unwrap();
        assert_eq!(entry.hash.as_deref(), Some("h1"));
        assert_eq!(entry.group, "app");
        let fallback = group.fallback.get("/deep/").unwrap();
        assert_eq!(fallback.fallback_to, "/index.html");
    }

    #[test]
    fn round_trips_through_serialize_and_parse() {
        let snapshot = parse(sample_text()).unwrap();
        let text = serialize(&snapshot.manifest).unwrap();
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed.manifest, snapshot.manifest);
    }

    #[test]
    fn diff_against_self_is_unchanged() {
        let snapshot = parse(sample_text()).unwrap();
        let delta = diff(&snapshot, Some(&snapshot));
        assert!(!delta.changed);
        for group_delta in delta.per_group.values() {
            assert!(group_delta.added.is_empty());
            assert!(group_delta.removed.is_empty());
        }
    }

    #[test]
    fn diff_against_none_adds_everything() {
        let snapshot = parse(sample_text()).unwrap();
        let delta = diff(&snapshot, None);
        assert!(delta.changed);
        let app = delta.per_group.get("app").unwrap();
        assert_eq!(app.added, vec!["/index.html".to_string()]);
        assert!(app.removed.is_empty());
    }

    #[test]
    fn diff_reports_added_removed_and_dropped_groups() {
        let previous = parse(
            r#"{
                "groups": {
                    "a": { "urls": { "/a1": {}, "/a2": {} } },
                    "b": { "urls": { "/b1": {} } }
                }
            }"#,
        )
        .unwrap();
        let fresh = parse(
            r#"{
                "groups": {
                    "a": { "urls": { "/a1": {}, "/a3": {} } },
                    "c": { "urls": { "/c1": {} } }
                }
            }"#,
        )
        .unwrap();

        let delta = diff(&fresh, Some(&previous));
        assert!(delta.changed);

        let a = delta.per_group.get("a").unwrap();
        assert_eq!(a.added, vec!["/a3".to_string()]);
        assert_eq!(a.removed, vec!["/a2".to_string()]);

        let b = delta.per_group.get("b").unwrap();
        assert!(b.added.is_empty());
        assert_eq!(b.removed, vec!["/b1".to_string()]);

        let c = delta.per_group.get("c").unwrap();
        assert_eq!(c.added, vec!["/c1".to_string()]);
        assert!(c.removed.is_empty());
    }
}

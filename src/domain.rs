use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kinds of upstream entity; each has its own replay cache namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    NameUsages,
    Datasets,
    References,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::NameUsages => "nameusages",
            EntityKind::Datasets => "datasets",
            EntityKind::References => "references",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders a boolean the way the import schema expects it.
pub fn flag_text(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// A scalar JSON value read as text. `null` and absent fields become the
/// empty string, numbers are rendered in decimal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text(String);

impl Text {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for Text {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Text::default()),
            Value::String(value) => Ok(Text(value)),
            Value::Number(value) => Ok(Text(value.to_string())),
            Value::Bool(value) => Ok(Text(flag_text(value).to_string())),
            other => Err(de::Error::custom(format!(
                "expected a scalar value, found {other}"
            ))),
        }
    }
}

fn non_empty(value: &Option<Text>) -> Option<&str> {
    value
        .as_ref()
        .map(Text::as_str)
        .filter(|value| !value.is_empty())
}

fn text_or_empty(value: &Option<Text>) -> &str {
    value.as_ref().map(Text::as_str).unwrap_or("")
}

/// One step of a classification chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RankedName {
    pub rank: String,
    pub name: String,
}

/// One row of the name usage search result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    #[serde(default)]
    classification: Option<Vec<RankedName>>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    sector_dataset_key: Option<Text>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Usage {
    #[serde(default)]
    id: Option<Text>,
    #[serde(default)]
    parent_id: Option<Text>,
    #[serde(default)]
    status: Option<Text>,
    #[serde(default)]
    name: Option<Name>,
    #[serde(default)]
    accepted: Option<AcceptedUsage>,
    #[serde(default)]
    extinct: Option<bool>,
    #[serde(default)]
    temporal_range_start: Option<Text>,
    #[serde(default)]
    temporal_range_end: Option<Text>,
    #[serde(default)]
    link: Option<Text>,
    #[serde(default)]
    reference_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Name {
    #[serde(default)]
    id: Option<Text>,
    #[serde(default)]
    scientific_name: Option<Text>,
    #[serde(default)]
    authorship: Option<Text>,
    #[serde(default)]
    rank: Option<Text>,
    #[serde(default)]
    combination_authorship: Option<Authorship>,
    #[serde(default)]
    identifier: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Authorship {
    #[serde(default)]
    authors: Option<Vec<String>>,
    #[serde(default)]
    year: Option<Text>,
}

/// The accepted usage embedded in a synonym.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcceptedUsage {
    #[serde(default)]
    id: Option<Text>,
    #[serde(default)]
    label: Option<Text>,
    #[serde(default)]
    name: Option<Name>,
}

impl AcceptedUsage {
    /// `None` when absent or empty.
    pub fn id(&self) -> Option<&str> {
        non_empty(&self.id)
    }

    /// Display label, possibly carrying the extinction glyph. Empty when absent.
    pub fn label(&self) -> &str {
        text_or_empty(&self.label)
    }

    /// Empty when absent.
    pub fn scientific_name(&self) -> &str {
        self.name
            .as_ref()
            .map(|name| text_or_empty(&name.scientific_name))
            .unwrap_or("")
    }

    /// Empty when absent.
    pub fn authorship(&self) -> &str {
        self.name
            .as_ref()
            .map(|name| text_or_empty(&name.authorship))
            .unwrap_or("")
    }
}

impl UsageRecord {
    fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    fn name(&self) -> Option<&Name> {
        self.usage().and_then(|usage| usage.name.as_ref())
    }

    /// Root-to-leaf classification chain, empty when absent.
    pub fn classification(&self) -> &[RankedName] {
        self.classification.as_deref().unwrap_or(&[])
    }

    /// `None` when absent or empty; required for every exported row.
    pub fn usage_id(&self) -> Option<&str> {
        self.usage().and_then(|usage| non_empty(&usage.id))
    }

    /// Empty for root usages.
    pub fn parent_id(&self) -> &str {
        self.usage()
            .map(|usage| text_or_empty(&usage.parent_id))
            .unwrap_or("")
    }

    /// `None` when absent or empty; required for every exported row.
    pub fn name_id(&self) -> Option<&str> {
        self.name().and_then(|name| non_empty(&name.id))
    }

    pub fn rank(&self) -> &str {
        self.name()
            .map(|name| text_or_empty(&name.rank))
            .unwrap_or("")
    }

    pub fn scientific_name(&self) -> &str {
        self.name()
            .map(|name| text_or_empty(&name.scientific_name))
            .unwrap_or("")
    }

    /// Full authorship string; empty when the name carries none.
    pub fn authorship(&self) -> &str {
        self.name()
            .map(|name| text_or_empty(&name.authorship))
            .unwrap_or("")
    }

    /// Authors of the combination; empty without a combination authorship.
    pub fn combination_authors(&self) -> &[String] {
        self.name()
            .and_then(|name| name.combination_authorship.as_ref())
            .and_then(|authorship| authorship.authors.as_deref())
            .unwrap_or(&[])
    }

    /// Empty without a combination authorship.
    pub fn combination_year(&self) -> &str {
        self.name()
            .and_then(|name| name.combination_authorship.as_ref())
            .map(|authorship| text_or_empty(&authorship.year))
            .unwrap_or("")
    }

    /// Taxonomic status such as `accepted` or `synonym`; empty when absent.
    pub fn status(&self) -> &str {
        self.usage()
            .map(|usage| text_or_empty(&usage.status))
            .unwrap_or("")
    }

    pub fn is_synonym(&self) -> bool {
        self.status() == "synonym"
    }

    pub fn accepted(&self) -> Option<&AcceptedUsage> {
        self.usage().and_then(|usage| usage.accepted.as_ref())
    }

    /// `None` when the source does not say.
    pub fn extinct(&self) -> Option<bool> {
        self.usage().and_then(|usage| usage.extinct)
    }

    pub fn temporal_range_start(&self) -> &str {
        self.usage()
            .map(|usage| text_or_empty(&usage.temporal_range_start))
            .unwrap_or("")
    }

    pub fn temporal_range_end(&self) -> &str {
        self.usage()
            .map(|usage| text_or_empty(&usage.temporal_range_end))
            .unwrap_or("")
    }

    pub fn link(&self) -> &str {
        self.usage()
            .map(|usage| text_or_empty(&usage.link))
            .unwrap_or("")
    }

    /// Reference ids in source order; empty when absent.
    pub fn reference_ids(&self) -> &[String] {
        self.usage()
            .and_then(|usage| usage.reference_ids.as_deref())
            .unwrap_or(&[])
    }

    /// External identifiers of the name; empty when absent.
    pub fn identifiers(&self) -> &[String] {
        self.name()
            .and_then(|name| name.identifier.as_deref())
            .unwrap_or(&[])
    }

    /// Key of the source dataset merged into this usage; `None` for usages
    /// without a sector.
    pub fn sector_dataset_key(&self) -> Option<&str> {
        non_empty(&self.sector_dataset_key)
    }

    /// Short label for diagnostics.
    pub fn describe(&self) -> String {
        match self.usage_id() {
            Some(id) => format!("usage {id}"),
            None => format!("usage without id ({})", self.scientific_name()),
        }
    }
}

/// An agent (person or organisation) attached to dataset metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Agent {
    #[serde(default)]
    name: Option<Text>,
}

impl Agent {
    /// Empty when the agent carries no display name.
    pub fn name(&self) -> &str {
        text_or_empty(&self.name)
    }
}

/// Dataset metadata as returned by the dataset endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRecord {
    #[serde(default)]
    alias: Option<Text>,
    #[serde(default)]
    title: Text,
    #[serde(default)]
    issued: Text,
    #[serde(default)]
    version: Text,
    #[serde(default)]
    description: Text,
    #[serde(default)]
    contact: Option<Agent>,
    #[serde(default)]
    creator: Option<Vec<Agent>>,
    #[serde(default)]
    editor: Option<Vec<Agent>>,
    #[serde(default)]
    publisher: Option<Agent>,
    #[serde(default)]
    contributor: Option<Vec<Agent>>,
    #[serde(default)]
    doi: Text,
    #[serde(default)]
    license: Text,
    #[serde(default)]
    geographic_scope: Text,
    #[serde(default)]
    temporal_scope: Text,
    #[serde(default)]
    taxonomic_scope: Text,
    #[serde(default)]
    confidence: Text,
    #[serde(default)]
    completeness: Text,
    #[serde(default)]
    logo: Text,
    #[serde(default)]
    created: Text,
    #[serde(default)]
    modified: Text,
    #[serde(default, rename = "type")]
    kind: Text,
    #[serde(default)]
    origin: Text,
}

fn join_people(people: &Option<Vec<Agent>>) -> String {
    people
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .map(Agent::name)
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// One row of the dataset table. Every field defaults to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetMeta {
    pub dataset_id: String,
    pub alias: String,
    pub title: String,
    pub issued: String,
    pub version: String,
    pub description: String,
    pub contact: String,
    pub creator: String,
    pub editor: String,
    pub publisher: String,
    pub contributor: String,
    pub doi: String,
    pub license: String,
    pub geographic_scope: String,
    pub temporal_scope: String,
    pub taxonomic_scope: String,
    pub confidence: String,
    pub completeness: String,
    pub logo: String,
    pub created: String,
    pub modified: String,
    pub kind: String,
    pub origin: String,
}

impl DatasetMeta {
    pub fn from_record(key: &str, record: DatasetRecord) -> Self {
        Self {
            dataset_id: key.to_string(),
            alias: non_empty(&record.alias).unwrap_or("").to_string(),
            contact: record
                .contact
                .as_ref()
                .map(|agent| agent.name().to_string())
                .unwrap_or_default(),
            creator: join_people(&record.creator),
            editor: join_people(&record.editor),
            publisher: record
                .publisher
                .as_ref()
                .map(|agent| agent.name().to_string())
                .unwrap_or_default(),
            contributor: join_people(&record.contributor),
            title: record.title.into_string(),
            issued: record.issued.into_string(),
            version: record.version.into_string(),
            description: record.description.into_string(),
            doi: record.doi.into_string(),
            license: record.license.into_string(),
            geographic_scope: record.geographic_scope.into_string(),
            temporal_scope: record.temporal_scope.into_string(),
            taxonomic_scope: record.taxonomic_scope.into_string(),
            confidence: record.confidence.into_string(),
            completeness: record.completeness.into_string(),
            logo: record.logo.into_string(),
            created: record.created.into_string(),
            modified: record.modified.into_string(),
            kind: record.kind.into_string(),
            origin: record.origin.into_string(),
        }
    }

    /// Short name shown next to each usage: the alias, or the title for
    /// datasets without one.
    pub fn display_alias(&self) -> &str {
        if self.alias.is_empty() {
            &self.title
        } else {
            &self.alias
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CslName {
    #[serde(default)]
    family: Text,
    #[serde(default)]
    given: Text,
    #[serde(default)]
    literal: Text,
}

impl CslName {
    fn render(&self) -> String {
        if !self.literal.is_empty() {
            return self.literal.as_str().to_string();
        }
        match (self.family.is_empty(), self.given.is_empty()) {
            (false, false) => format!("{}, {}", self.family.as_str(), self.given.as_str()),
            (false, true) => self.family.as_str().to_string(),
            (true, false) => self.given.as_str().to_string(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Csl {
    #[serde(default)]
    id: Text,
    #[serde(default, rename = "type")]
    kind: Text,
    #[serde(default)]
    author: Option<Vec<CslName>>,
    #[serde(default)]
    title: Text,
    #[serde(default, rename = "container-title")]
    container_title: Text,
    #[serde(default)]
    volume: Text,
    #[serde(default)]
    page: Text,
}

/// Reference as returned by the release reference endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceRecord {
    #[serde(default)]
    year: Text,
    #[serde(default)]
    citation: Text,
    #[serde(default)]
    csl: Option<Csl>,
}

/// One row of the reference table. Every field defaults to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceMeta {
    pub reference_id: String,
    pub source_id: String,
    pub kind: String,
    pub authors: String,
    pub year: String,
    pub title: String,
    pub citation: String,
    pub journal: String,
    pub volume: String,
    pub page: String,
}

impl ReferenceMeta {
    pub fn from_record(id: &str, record: ReferenceRecord) -> Self {
        let csl = record.csl.unwrap_or_default();
        let authors = csl
            .author
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(CslName::render)
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            reference_id: id.to_string(),
            source_id: csl.id.into_string(),
            kind: csl.kind.into_string(),
            authors,
            year: record.year.into_string(),
            title: csl.title.into_string(),
            citation: record.citation.into_string(),
            journal: csl.container_title.into_string(),
            volume: csl.volume.into_string(),
            page: csl.page.into_string(),
        }
    }
}

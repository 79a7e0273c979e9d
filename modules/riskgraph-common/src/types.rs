use serde::Deserialize;

/// One raw tabular row as produced by the upstream extraction process.
///
/// The three entity columns are string-encoded list literals
/// (e.g. `"['Orpea', 'Korian']"`); any of them may be missing, null,
/// or garbage. `controverts` is the upstream column name, kept as the
/// wire name only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordRow {
    #[serde(default)]
    pub companies: Option<serde_json::Value>,
    #[serde(default)]
    pub sectors: Option<serde_json::Value>,
    #[serde(default, rename = "controverts")]
    pub controversies: Option<serde_json::Value>,
    /// Article title.
    #[serde(default)]
    pub label: Option<String>,
    /// Article URL — the natural key of the article node.
    #[serde(default)]
    pub link: Option<String>,
}

/// A row after tolerant parsing: cleaned entity name lists plus the
/// article descriptor. Empty lists are valid and simply contribute no
/// edges downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    pub companies: Vec<String>,
    pub sectors: Vec<String>,
    pub controversies: Vec<String>,
    pub article: ArticleRef,
}

/// Article identity: `url` is the natural key, `name` is descriptive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArticleRef {
    pub name: String,
    pub url: String,
}

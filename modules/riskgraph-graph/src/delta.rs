//! Corpus-wide graph delta: the deduplicated set of node and edge
//! creation intents derived from parsed rows.
//!
//! Deduplication is global, not per-row — downstream write volume
//! stays proportional to unique entities and edges rather than raw
//! row count. Node intents collapse on (label, natural key); edge
//! intents collapse on the full (start, end, type) tuple. First-seen
//! order is kept so batches are deterministic for a given input.

use std::collections::HashSet;

use neo4rs::{query, Query};

use riskgraph_common::ParsedRow;

/// Intent to upsert one node, keyed by its natural identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeIntent {
    Company { name: String },
    Sector { sector_name: String },
    Controversy { name: String },
    Article { name: String, url: String },
}

impl NodeIntent {
    /// (label, natural key). Article identity is its URL — the name is
    /// descriptive and does not participate in identity.
    pub fn identity(&self) -> (&'static str, &str) {
        match self {
            NodeIntent::Company { name } => ("Company", name),
            NodeIntent::Sector { sector_name } => ("Sector", sector_name),
            NodeIntent::Controversy { name } => ("Controversy", name),
            NodeIntent::Article { url, .. } => ("Article", url),
        }
    }

    /// Parameter-bound upsert statement. MERGE on the natural key only;
    /// descriptive properties are set on create and left untouched on
    /// match, so re-loading never rewrites existing nodes.
    pub(crate) fn to_query(&self) -> Query {
        match self {
            NodeIntent::Company { name } => {
                query("MERGE (n:Company {name: $name})").param("name", name.as_str())
            }
            NodeIntent::Sector { sector_name } => {
                query("MERGE (n:Sector {sector_name: $sector_name})")
                    .param("sector_name", sector_name.as_str())
            }
            NodeIntent::Controversy { name } => {
                query("MERGE (n:Controversy {name: $name})").param("name", name.as_str())
            }
            NodeIntent::Article { name, url } => {
                query("MERGE (n:Article {url: $url}) ON CREATE SET n.name = $name")
                    .param("url", url.as_str())
                    .param("name", name.as_str())
            }
        }
    }
}

/// Intent to upsert one directed edge between nodes referenced by
/// their natural keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeIntent {
    /// Company -[BELONGS_TO]-> Sector
    BelongsTo { company: String, sector: String },
    /// Article -[MENTIONS]-> Company
    Mentions { article_url: String, company: String },
    /// Article -[LINKED_TO]-> Controversy
    LinkedTo { article_url: String, controversy: String },
}

impl EdgeIntent {
    /// Parameter-bound edge upsert. Endpoints are matched by natural
    /// key; when either endpoint is absent the MATCH yields nothing
    /// and the statement is a no-op rather than an error.
    pub(crate) fn to_query(&self) -> Query {
        match self {
            EdgeIntent::BelongsTo { company, sector } => query(
                "MATCH (a:Company {name: $company}) \
                 MATCH (b:Sector {sector_name: $sector}) \
                 MERGE (a)-[:BELONGS_TO]->(b)",
            )
            .param("company", company.as_str())
            .param("sector", sector.as_str()),
            EdgeIntent::Mentions { article_url, company } => query(
                "MATCH (a:Article {url: $url}) \
                 MATCH (b:Company {name: $company}) \
                 MERGE (a)-[:MENTIONS]->(b)",
            )
            .param("url", article_url.as_str())
            .param("company", company.as_str()),
            EdgeIntent::LinkedTo { article_url, controversy } => query(
                "MATCH (a:Article {url: $url}) \
                 MATCH (b:Controversy {name: $controversy}) \
                 MERGE (a)-[:LINKED_TO]->(b)",
            )
            .param("url", article_url.as_str())
            .param("controversy", controversy.as_str()),
        }
    }
}

/// Deduplicated node and edge intents for a whole input corpus.
/// Nodes are always applied before edges.
#[derive(Debug, Default)]
pub struct GraphDelta {
    nodes: Vec<NodeIntent>,
    edges: Vec<EdgeIntent>,
}

impl GraphDelta {
    pub fn from_rows(rows: &[ParsedRow]) -> Self {
        let mut delta = GraphDelta::default();
        let mut seen_nodes: HashSet<(&'static str, String)> = HashSet::new();
        let mut seen_edges: HashSet<EdgeIntent> = HashSet::new();

        for row in rows {
            for company in &row.companies {
                delta.push_node(NodeIntent::Company { name: company.clone() }, &mut seen_nodes);
            }
            for sector in &row.sectors {
                delta.push_node(
                    NodeIntent::Sector { sector_name: sector.clone() },
                    &mut seen_nodes,
                );
            }
            for controversy in &row.controversies {
                delta.push_node(
                    NodeIntent::Controversy { name: controversy.clone() },
                    &mut seen_nodes,
                );
            }
            delta.push_node(
                NodeIntent::Article {
                    name: row.article.name.clone(),
                    url: row.article.url.clone(),
                },
                &mut seen_nodes,
            );

            for company in &row.companies {
                for sector in &row.sectors {
                    delta.push_edge(
                        EdgeIntent::BelongsTo {
                            company: company.clone(),
                            sector: sector.clone(),
                        },
                        &mut seen_edges,
                    );
                }
                delta.push_edge(
                    EdgeIntent::Mentions {
                        article_url: row.article.url.clone(),
                        company: company.clone(),
                    },
                    &mut seen_edges,
                );
            }
            for controversy in &row.controversies {
                delta.push_edge(
                    EdgeIntent::LinkedTo {
                        article_url: row.article.url.clone(),
                        controversy: controversy.clone(),
                    },
                    &mut seen_edges,
                );
            }
        }

        delta
    }

    /// Build a delta from pre-assembled intents, applying the same
    /// identity-based deduplication as [`GraphDelta::from_rows`].
    pub fn from_parts(nodes: Vec<NodeIntent>, edges: Vec<EdgeIntent>) -> Self {
        let mut delta = GraphDelta::default();
        let mut seen_nodes: HashSet<(&'static str, String)> = HashSet::new();
        let mut seen_edges: HashSet<EdgeIntent> = HashSet::new();
        for node in nodes {
            delta.push_node(node, &mut seen_nodes);
        }
        for edge in edges {
            delta.push_edge(edge, &mut seen_edges);
        }
        delta
    }

    fn push_node(&mut self, intent: NodeIntent, seen: &mut HashSet<(&'static str, String)>) {
        let (label, key) = intent.identity();
        if seen.insert((label, key.to_string())) {
            self.nodes.push(intent);
        }
    }

    fn push_edge(&mut self, intent: EdgeIntent, seen: &mut HashSet<EdgeIntent>) {
        if seen.insert(intent.clone()) {
            self.edges.push(intent);
        }
    }

    pub fn nodes(&self) -> &[NodeIntent] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeIntent] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

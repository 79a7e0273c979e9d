//! Read-only aggregate queries for the dashboard.
//!
//! All Cypher is parameter-bound — sector and controversy names come
//! from user input and may contain quotes or anything else. Store
//! failures at this boundary degrade to an empty result with a
//! warning; the caller renders "no data" instead of crashing.
//!
//! Raw sector/controversy names stay canonical in the store. The
//! activity/category remaps from [`Mappings`] are applied here, on the
//! way out, only.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use neo4rs::query;
use serde::Serialize;
use tracing::warn;

use riskgraph_common::Mappings;

use crate::GraphClient;

/// Activities whose article share is at or below this percentage merge
/// into the "Other" bucket of the overview rollup.
const OTHER_ACTIVITY_SHARE: f64 = 1.0;
/// Same, for controversies within one sector.
const OTHER_CONTROVERSY_SHARE: f64 = 5.0;

const OVERVIEW: &str = "
MATCH (article:Article)-[:MENTIONS]->(:Company)-[:BELONGS_TO]->(sector:Sector)
OPTIONAL MATCH (article)-[:LINKED_TO]->(:Controversy)
OPTIONAL MATCH (article)-[:LEADS_TO]->(perf:Company_Performance)
RETURN sector.sector_name AS sector_name,
       COUNT(DISTINCT article) AS number_of_articles,
       MIN(perf.diff_2_months) AS min_perf_diff_2_months";

const CONTROVERSY_REPARTITION: &str = "
MATCH (sector:Sector {sector_name: $sector})<-[:BELONGS_TO]-(:Company)
      <-[:MENTIONS]-(article:Article)-[:LINKED_TO]->(controversy:Controversy)
RETURN controversy.name AS controversy_name,
       COUNT(DISTINCT article) AS number_of_articles";

const FINANCIAL_IMPACT: &str = "
MATCH (sector:Sector {sector_name: $sector})<-[:BELONGS_TO]-(:Company)
      <-[:MENTIONS]-(article:Article)-[:LINKED_TO]->(controversy:Controversy)
MATCH (article)-[:LEADS_TO]->(perf:Company_Performance)
RETURN perf.diff_2_months AS perf,
       controversy.name AS controversy,
       sector.sector_name AS sector";

const SECTOR_ARTICLES: &str = "
MATCH (sector:Sector {sector_name: $sector})<-[:BELONGS_TO]-(:Company)
      <-[:MENTIONS]-(article:Article)-[:LINKED_TO]->(controversy:Controversy)
OPTIONAL MATCH (article)-[:LEADS_TO]->(perf:Company_Performance)
RETURN article.name AS name,
       article.url AS url,
       article.date AS date,
       perf.diff_1_month AS diff_1_month,
       perf.diff_2_months AS diff_2_months,
       controversy.name AS controversy";

/// One activity row of the overview rollup, sorted by descending share.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRollup {
    pub activity: String,
    pub number_of_articles: i64,
    pub percentage: f64,
    pub min_perf_diff_2_months: Option<f64>,
}

/// Article share of one controversy category within a sector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControversyShare {
    pub controversy: String,
    pub number_of_articles: i64,
    pub percentage: f64,
}

/// Worst 2-month performance delta per (category, sector) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialImpact {
    pub controversy: String,
    pub sector: String,
    pub min_perf_diff_2_months: f64,
}

/// One article of a sector, with its controversy category and
/// performance deltas. Listings are ordered most-negative 1-month
/// delta first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorArticle {
    pub name: String,
    pub url: String,
    pub controversy: String,
    pub diff_1_month: Option<f64>,
    pub diff_2_months: Option<f64>,
    pub date: Option<String>,
}

#[derive(Debug)]
struct SectorCount {
    sector_name: String,
    number_of_articles: i64,
    min_perf: Option<f64>,
}

#[derive(Debug)]
struct ControversyCount {
    controversy: String,
    number_of_articles: i64,
}

#[derive(Debug)]
struct ImpactRow {
    perf: f64,
    controversy: String,
    sector: String,
}

/// Read-side wrapper over the graph, with the display mappings loaded
/// once and held immutably.
pub struct AggregateReader {
    client: GraphClient,
    mappings: Mappings,
}

impl AggregateReader {
    pub fn new(client: GraphClient, mappings: Mappings) -> Self {
        Self { client, mappings }
    }

    /// Per-activity rollup across the whole graph: distinct article
    /// count, share of total, and worst 2-month delta per activity.
    pub async fn activity_overview(&self) -> Vec<ActivityRollup> {
        let rows = match self.fetch_overview().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "overview query failed, returning no data");
                return Vec::new();
            }
        };
        rollup_activities(&rows, &self.mappings)
    }

    /// Article share per controversy category within one sector.
    /// Empty when the sector has no matching articles.
    pub async fn controversy_repartition(&self, sector: &str) -> Vec<ControversyShare> {
        let rows = match self.fetch_repartition(sector).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(sector, error = %e, "repartition query failed, returning no data");
                return Vec::new();
            }
        };
        repartition_controversies(&rows, &self.mappings)
    }

    /// Worst 2-month delta per (controversy category, sector) group.
    pub async fn financial_impact(&self, sector: &str) -> Vec<FinancialImpact> {
        let rows = match self.fetch_impact(sector).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(sector, error = %e, "financial impact query failed, returning no data");
                return Vec::new();
            }
        };
        impact_extremes(&rows, &self.mappings)
    }

    /// All articles of a sector, deduplicated by (url, category) and
    /// ordered by ascending 1-month delta so the largest losses lead.
    pub async fn sector_articles(&self, sector: &str) -> Vec<SectorArticle> {
        let rows = match self.fetch_articles(sector).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(sector, error = %e, "article listing query failed, returning no data");
                return Vec::new();
            }
        };
        dedup_and_rank_articles(rows, &self.mappings)
    }

    async fn fetch_overview(&self) -> Result<Vec<SectorCount>, neo4rs::Error> {
        let mut stream = self.client.graph.execute(query(OVERVIEW)).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(SectorCount {
                sector_name: row.get("sector_name").unwrap_or_default(),
                number_of_articles: row.get("number_of_articles").unwrap_or_default(),
                min_perf: row.get("min_perf_diff_2_months").unwrap_or(None),
            });
        }
        Ok(rows)
    }

    async fn fetch_repartition(&self, sector: &str) -> Result<Vec<ControversyCount>, neo4rs::Error> {
        let q = query(CONTROVERSY_REPARTITION).param("sector", sector);
        let mut stream = self.client.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(ControversyCount {
                controversy: row.get("controversy_name").unwrap_or_default(),
                number_of_articles: row.get("number_of_articles").unwrap_or_default(),
            });
        }
        Ok(rows)
    }

    async fn fetch_impact(&self, sector: &str) -> Result<Vec<ImpactRow>, neo4rs::Error> {
        let q = query(FINANCIAL_IMPACT).param("sector", sector);
        let mut stream = self.client.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(ImpactRow {
                perf: row.get("perf").unwrap_or_default(),
                controversy: row.get("controversy").unwrap_or_default(),
                sector: row.get("sector").unwrap_or_default(),
            });
        }
        Ok(rows)
    }

    async fn fetch_articles(&self, sector: &str) -> Result<Vec<SectorArticle>, neo4rs::Error> {
        let q = query(SECTOR_ARTICLES).param("sector", sector);
        let mut stream = self.client.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(SectorArticle {
                name: row.get("name").unwrap_or_default(),
                url: row.get("url").unwrap_or_default(),
                controversy: row.get("controversy").unwrap_or_default(),
                diff_1_month: row.get("diff_1_month").unwrap_or(None),
                diff_2_months: row.get("diff_2_months").unwrap_or(None),
                date: row.get("date").unwrap_or(None),
            });
        }
        Ok(rows)
    }
}

/// Remap sectors to activities, drop empty activities, compute shares,
/// fold small activities into "Other", sort by descending share.
fn rollup_activities(rows: &[SectorCount], mappings: &Mappings) -> Vec<ActivityRollup> {
    // Group raw sectors by activity first so shares are computed over
    // displayed groups, not raw sector names.
    let mut by_activity: HashMap<String, (i64, Option<f64>)> = HashMap::new();
    for row in rows {
        let activity = mappings.activity(&row.sector_name);
        if activity.is_empty() {
            continue;
        }
        let entry = by_activity.entry(activity.to_string()).or_insert((0, None));
        entry.0 += row.number_of_articles;
        entry.1 = min_opt(entry.1, row.min_perf);
    }

    let total: i64 = by_activity.values().map(|(count, _)| count).sum();
    if total == 0 {
        return Vec::new();
    }

    let mut merged: HashMap<String, ActivityRollup> = HashMap::new();
    for (activity, (count, min_perf)) in by_activity {
        let percentage = count as f64 / total as f64 * 100.0;
        let bucket = if percentage <= OTHER_ACTIVITY_SHARE {
            "Other".to_string()
        } else {
            activity
        };
        let entry = merged.entry(bucket.clone()).or_insert(ActivityRollup {
            activity: bucket,
            number_of_articles: 0,
            percentage: 0.0,
            min_perf_diff_2_months: None,
        });
        entry.number_of_articles += count;
        entry.percentage += percentage;
        entry.min_perf_diff_2_months = min_opt(entry.min_perf_diff_2_months, min_perf);
    }

    let mut out: Vec<ActivityRollup> = merged.into_values().collect();
    out.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(Ordering::Equal)
    });
    out
}

/// Remap controversies to categories, compute shares within the
/// sector, fold small categories into "Other", sort by descending
/// share. Counts are conserved: the rows always sum to the sector
/// total.
fn repartition_controversies(
    rows: &[ControversyCount],
    mappings: &Mappings,
) -> Vec<ControversyShare> {
    let mut by_category: HashMap<String, i64> = HashMap::new();
    for row in rows {
        *by_category
            .entry(mappings.category(&row.controversy).to_string())
            .or_insert(0) += row.number_of_articles;
    }

    let total: i64 = by_category.values().sum();
    if total == 0 {
        return Vec::new();
    }

    let mut merged: HashMap<String, ControversyShare> = HashMap::new();
    for (category, count) in by_category {
        let percentage = count as f64 / total as f64 * 100.0;
        let bucket = if percentage <= OTHER_CONTROVERSY_SHARE {
            "Other".to_string()
        } else {
            category
        };
        let entry = merged.entry(bucket.clone()).or_insert(ControversyShare {
            controversy: bucket,
            number_of_articles: 0,
            percentage: 0.0,
        });
        entry.number_of_articles += count;
        entry.percentage += percentage;
    }

    let mut out: Vec<ControversyShare> = merged.into_values().collect();
    out.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(Ordering::Equal)
    });
    out
}

/// Group by (remapped controversy, sector) and keep the most negative
/// 2-month delta per group — the largest loss.
fn impact_extremes(rows: &[ImpactRow], mappings: &Mappings) -> Vec<FinancialImpact> {
    let mut by_group: HashMap<(String, String), f64> = HashMap::new();
    for row in rows {
        let key = (
            mappings.category(&row.controversy).to_string(),
            row.sector.clone(),
        );
        by_group
            .entry(key)
            .and_modify(|min| *min = min.min(row.perf))
            .or_insert(row.perf);
    }

    let mut out: Vec<FinancialImpact> = by_group
        .into_iter()
        .map(|((controversy, sector), min_perf)| FinancialImpact {
            controversy,
            sector,
            min_perf_diff_2_months: min_perf,
        })
        .collect();
    out.sort_by(|a, b| {
        a.min_perf_diff_2_months
            .partial_cmp(&b.min_perf_diff_2_months)
            .unwrap_or(Ordering::Equal)
    });
    out
}

/// Remap categories, keep the first row per (url, category), and order
/// by ascending 1-month delta with unknown deltas last.
fn dedup_and_rank_articles(rows: Vec<SectorArticle>, mappings: &Mappings) -> Vec<SectorArticle> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut out = Vec::new();
    for mut row in rows {
        row.controversy = mappings.category(&row.controversy).to_string();
        if seen.insert((row.url.clone(), row.controversy.clone())) {
            out.push(row);
        }
    }

    out.sort_by(|a, b| match (a.diff_1_month, b.diff_1_month) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    out
}

fn min_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (Some(x), None) => Some(x),
        (None, y) => y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn identity() -> Mappings {
        Mappings::default()
    }

    fn sector_count(name: &str, count: i64, min_perf: Option<f64>) -> SectorCount {
        SectorCount {
            sector_name: name.to_string(),
            number_of_articles: count,
            min_perf,
        }
    }

    #[test]
    fn rollup_keeps_activities_above_the_one_percent_boundary() {
        // Total 67: the smallest group holds 2 articles, a 2.99% share,
        // so nothing merges into Other at the 1% threshold.
        let rows = vec![
            sector_count("A", 10, Some(-3.0)),
            sector_count("B", 5, None),
            sector_count("C", 50, Some(-12.5)),
            sector_count("D", 2, Some(1.0)),
        ];
        let out = rollup_activities(&rows, &identity());

        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|r| r.activity != "Other"));
        assert_eq!(out[0].activity, "C");
        assert_eq!(out[0].number_of_articles, 50);
        assert_eq!(out[0].min_perf_diff_2_months, Some(-12.5));
        let share_sum: f64 = out.iter().map(|r| r.percentage).sum();
        assert!((share_sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rollup_merges_small_activities_into_other() {
        // 1/150 = 0.67% <= 1% merges; 2/150 = 1.33% stays.
        let rows = vec![
            sector_count("Big", 147, Some(-1.0)),
            sector_count("Tiny", 1, Some(-9.0)),
            sector_count("Small", 2, Some(-2.0)),
        ];
        let out = rollup_activities(&rows, &identity());

        assert_eq!(out.len(), 3);
        let other = out.iter().find(|r| r.activity == "Other").unwrap();
        assert_eq!(other.number_of_articles, 1);
        assert_eq!(other.min_perf_diff_2_months, Some(-9.0));
        assert!(out.iter().any(|r| r.activity == "Small"));

        let total: i64 = out.iter().map(|r| r.number_of_articles).sum();
        assert_eq!(total, 150);
    }

    #[test]
    fn rollup_groups_sectors_by_activity_before_computing_shares() {
        let mappings = Mappings::from_parts(
            HashMap::from([
                ("Gold Mining".to_string(), "Mining".to_string()),
                ("Coal Mining".to_string(), "Mining".to_string()),
            ]),
            HashMap::new(),
            vec![],
        );
        let rows = vec![
            sector_count("Gold Mining", 30, Some(-5.0)),
            sector_count("Coal Mining", 20, Some(-8.0)),
            sector_count("Retail", 50, None),
        ];
        let out = rollup_activities(&rows, &mappings);

        assert_eq!(out.len(), 2);
        let mining = out.iter().find(|r| r.activity == "Mining").unwrap();
        assert_eq!(mining.number_of_articles, 50);
        assert_eq!(mining.min_perf_diff_2_months, Some(-8.0));
        assert!((mining.percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn rollup_excludes_empty_activities() {
        let mappings = Mappings::from_parts(
            HashMap::from([("Noise".to_string(), String::new())]),
            HashMap::new(),
            vec![],
        );
        let rows = vec![
            sector_count("Noise", 40, Some(-99.0)),
            sector_count("Retail", 60, Some(-1.0)),
        ];
        let out = rollup_activities(&rows, &mappings);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].activity, "Retail");
        assert!((out[0].percentage - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rollup_of_nothing_is_empty() {
        assert!(rollup_activities(&[], &identity()).is_empty());
    }

    #[test]
    fn repartition_conserves_counts_through_the_other_bucket() {
        let rows = vec![
            ControversyCount { controversy: "Fraud".into(), number_of_articles: 60 },
            ControversyCount { controversy: "Pollution".into(), number_of_articles: 35 },
            ControversyCount { controversy: "Bribery".into(), number_of_articles: 3 },
            ControversyCount { controversy: "Spying".into(), number_of_articles: 2 },
        ];
        let out = repartition_controversies(&rows, &identity());

        // 3% and 2% shares both fold into Other at the 5% threshold.
        assert_eq!(out.len(), 3);
        let other = out.iter().find(|r| r.controversy == "Other").unwrap();
        assert_eq!(other.number_of_articles, 5);

        let total: i64 = out.iter().map(|r| r.number_of_articles).sum();
        assert_eq!(total, 100);
        let share_sum: f64 = out.iter().map(|r| r.percentage).sum();
        assert!((share_sum - 100.0).abs() < 1e-9);
        assert_eq!(out[0].controversy, "Fraud");
    }

    #[test]
    fn repartition_remaps_before_grouping() {
        let mappings = Mappings::from_parts(
            HashMap::new(),
            HashMap::from([
                ("Oil Spill".to_string(), "Environment".to_string()),
                ("Deforestation".to_string(), "Environment".to_string()),
            ]),
            vec![],
        );
        let rows = vec![
            ControversyCount { controversy: "Oil Spill".into(), number_of_articles: 30 },
            ControversyCount { controversy: "Deforestation".into(), number_of_articles: 30 },
            ControversyCount { controversy: "Fraud".into(), number_of_articles: 40 },
        ];
        let out = repartition_controversies(&rows, &mappings);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].controversy, "Environment");
        assert_eq!(out[0].number_of_articles, 60);
    }

    #[test]
    fn impact_takes_the_most_negative_delta_per_group() {
        let rows = vec![
            ImpactRow { perf: -4.0, controversy: "Fraud".into(), sector: "Banks".into() },
            ImpactRow { perf: -19.5, controversy: "Fraud".into(), sector: "Banks".into() },
            ImpactRow { perf: 2.0, controversy: "Strike".into(), sector: "Banks".into() },
        ];
        let out = impact_extremes(&rows, &identity());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].controversy, "Fraud");
        assert_eq!(out[0].min_perf_diff_2_months, -19.5);
        assert_eq!(out[1].min_perf_diff_2_months, 2.0);
    }

    #[test]
    fn articles_dedup_by_url_and_category_and_rank_losses_first() {
        let article = |url: &str, controversy: &str, diff: Option<f64>| SectorArticle {
            name: format!("article {url}"),
            url: url.to_string(),
            controversy: controversy.to_string(),
            diff_1_month: diff,
            diff_2_months: None,
            date: None,
        };
        let rows = vec![
            article("http://x/1", "Fraud", Some(-2.0)),
            // Same article matched through a second company: dropped.
            article("http://x/1", "Fraud", Some(-2.0)),
            article("http://x/2", "Fraud", Some(-11.0)),
            article("http://x/3", "Fraud", None),
            // Same url, different controversy: kept.
            article("http://x/1", "Strike", Some(0.5)),
        ];
        let out = dedup_and_rank_articles(rows, &identity());

        assert_eq!(out.len(), 4);
        assert_eq!(out[0].url, "http://x/2");
        assert_eq!(out[1].url, "http://x/1");
        assert_eq!(out[2].url, "http://x/1");
        // Unknown deltas sink to the bottom.
        assert_eq!(out[3].url, "http://x/3");
    }
}

//! Tolerant row parsing.
//!
//! The upstream extraction process emits entity columns as Python-style
//! list literals inside strings, with the occasional doubled-quote
//! artifact from CSV round-trips. Dirty input is the norm: a malformed
//! list field degrades to an empty list for that field and the rest of
//! the row still goes through. Nothing here ever aborts a run.

use serde_json::Value;
use tracing::warn;

use riskgraph_common::{ArticleRef, ParsedRow, RecordRow, RiskGraphError};

/// Parse one raw row. Returns `None` only when the row has no usable
/// article URL — without its natural key the article node cannot be
/// identified, so the whole row is skipped (and logged).
pub fn parse_row(row: &RecordRow) -> Option<ParsedRow> {
    let url = row.link.as_deref().unwrap_or("").trim();
    if url.is_empty() {
        warn!(label = row.label.as_deref().unwrap_or(""), "row has no article url, skipping");
        return None;
    }

    Some(ParsedRow {
        companies: parse_list_field(row.companies.as_ref(), "companies"),
        sectors: parse_list_field(row.sectors.as_ref(), "sectors"),
        controversies: parse_list_field(row.controversies.as_ref(), "controverts"),
        article: ArticleRef {
            name: row.label.clone().unwrap_or_default(),
            url: url.to_string(),
        },
    })
}

/// Parse a single list-encoded field. Non-string values and malformed
/// literals yield an empty list; whitespace-only entity names are
/// dropped silently.
fn parse_list_field(value: Option<&Value>, field: &str) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Value::String(raw) = value else {
        if !value.is_null() {
            warn!(field, value = %value, "list field is not a string, treating as empty");
        }
        return Vec::new();
    };

    match parse_list_literal(raw) {
        Ok(items) => items
            .into_iter()
            .filter(|item| !item.trim().is_empty())
            .collect(),
        Err(e) => {
            warn!(field, raw = raw.as_str(), error = %e, "malformed list field, treating as empty");
            Vec::new()
        }
    }
}

/// Parse a Python-style list literal of strings, e.g. `['a', "b"]`.
///
/// Doubled double-quotes (`""`) are collapsed first — a common CSV
/// quoting artifact in the upstream output. Anything that is not a
/// bracketed sequence of quoted strings is an error.
pub fn parse_list_literal(raw: &str) -> Result<Vec<String>, RiskGraphError> {
    let cleaned = raw.replace("\"\"", "\"");
    let trimmed = cleaned.trim();

    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| RiskGraphError::Parse("not a list literal".to_string()))?;

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let Some(&quote) = chars.peek() else {
            break;
        };
        if quote != '\'' && quote != '"' {
            return Err(RiskGraphError::Parse(format!(
                "unexpected character {quote:?}, expected a quoted string"
            )));
        }
        chars.next();

        let mut item = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        item.push(escaped);
                    }
                }
                c if c == quote => {
                    closed = true;
                    break;
                }
                c => item.push(c),
            }
        }
        if !closed {
            return Err(RiskGraphError::Parse("unterminated string".to_string()));
        }
        items.push(item);
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(companies: Value, sectors: Value, controversies: Value) -> RecordRow {
        serde_json::from_value(json!({
            "companies": companies,
            "sectors": sectors,
            "controverts": controversies,
            "label": "Orpea scandal",
            "link": "http://x/1",
        }))
        .unwrap()
    }

    #[test]
    fn parses_single_and_double_quoted_lists() {
        assert_eq!(
            parse_list_literal("['Orpea', 'Korian']").unwrap(),
            vec!["Orpea", "Korian"]
        );
        assert_eq!(
            parse_list_literal(r#"["Orpea", "Korian"]"#).unwrap(),
            vec!["Orpea", "Korian"]
        );
        assert_eq!(parse_list_literal("[]").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn collapses_doubled_quotes() {
        assert_eq!(
            parse_list_literal(r#"[""Orpea"", ""Korian""]"#).unwrap(),
            vec!["Orpea", "Korian"]
        );
    }

    #[test]
    fn keeps_quotes_of_the_other_kind_inside_items() {
        assert_eq!(
            parse_list_literal(r#"['McDonald"s Corp']"#).unwrap(),
            vec![r#"McDonald"s Corp"#]
        );
        assert_eq!(
            parse_list_literal(r"['O\'Leary Mining']").unwrap(),
            vec!["O'Leary Mining"]
        );
    }

    #[test]
    fn malformed_literals_are_errors() {
        assert!(parse_list_literal("").is_err());
        assert!(parse_list_literal("not a list").is_err());
        assert!(parse_list_literal("[unquoted]").is_err());
        assert!(parse_list_literal("[1, 2]").is_err());
        assert!(parse_list_literal("['unterminated").is_err());
    }

    #[test]
    fn malformed_field_degrades_to_empty_without_dropping_the_row() {
        let parsed = parse_row(&row(json!("garbage"), json!(42), json!(null))).unwrap();
        assert!(parsed.companies.is_empty());
        assert!(parsed.sectors.is_empty());
        assert!(parsed.controversies.is_empty());
        assert_eq!(parsed.article.url, "http://x/1");
        assert_eq!(parsed.article.name, "Orpea scandal");
    }

    #[test]
    fn whitespace_only_names_are_dropped() {
        let parsed = parse_row(&row(json!("['  ', 'Orpea', '']"), json!("[]"), json!("[]"))).unwrap();
        assert_eq!(parsed.companies, vec!["Orpea"]);
    }

    #[test]
    fn row_without_link_is_skipped() {
        let no_link: RecordRow = serde_json::from_value(json!({
            "companies": "['Orpea']",
            "label": "No link here",
        }))
        .unwrap();
        assert!(parse_row(&no_link).is_none());

        let blank_link: RecordRow = serde_json::from_value(json!({
            "companies": "['Orpea']",
            "link": "   ",
        }))
        .unwrap();
        assert!(parse_row(&blank_link).is_none());
    }
}

//! Codebase scoping for ad hoc queries.
//!
//! Rewrites a query so that every entity variable introduced by a MATCH
//! clause is constrained to one codebase (or the shared `global` one),
//! without the caller hand-writing tenant filters.
//!
//! This is lightweight pattern matching over clause keywords and node
//! patterns, not a query-language parser, and it is known to be fragile:
//! keywords inside string literals confuse the clause splitter, and
//! variables introduced by a later MATCH are spliced into the first WHERE
//! even if they are not yet in scope there. Hardening this further would
//! require a real query parser; callers needing exotic queries can use the
//! logged cross-codebase bypass instead.

use crate::client::GraphStore;
use crate::error::StoreError;
use neo4rs::{query, DetachedRowStream};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};
use trellis_core::GLOBAL_CODEBASE;

/// Clause keywords used to segment the query text.
fn keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(MATCH|WHERE|RETURN|WITH|UNWIND|MERGE|CREATE|DELETE|SET|REMOVE|CALL|ORDER|SKIP|LIMIT|UNION)\b",
        )
        .expect("clause keyword pattern")
    })
}

/// A node-pattern variable: an identifier right after an opening paren,
/// followed by a label, a closing paren or a property map. Relationship
/// variables live in brackets and are deliberately not captured.
fn node_var_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(\s*([A-Za-z_][A-Za-z0-9_]*)\s*[:){]").expect("node variable pattern")
    })
}

/// Clauses that shape, group, order or limit results; a missing WHERE is
/// inserted immediately before the first of these.
const TERMINAL_CLAUSES: &[&str] = &["RETURN", "WITH", "ORDER", "SKIP", "LIMIT"];

struct Clause<'a> {
    keyword: String,
    start: usize,
    body: &'a str,
    end: usize,
}

fn split_clauses(cypher: &str) -> Vec<Clause<'_>> {
    let matches: Vec<_> = keyword_re().find_iter(cypher).collect();
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let end = matches.get(i + 1).map(|n| n.start()).unwrap_or(cypher.len());
            Clause {
                keyword: m.as_str().to_uppercase(),
                start: m.start(),
                body: &cypher[m.end()..end],
                end,
            }
        })
        .collect()
}

/// Entity variables introduced by MATCH clauses, in order of appearance.
fn match_variables(clauses: &[Clause<'_>]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut variables = Vec::new();
    for clause in clauses.iter().filter(|c| c.keyword == "MATCH") {
        for capture in node_var_re().captures_iter(clause.body) {
            let name = capture[1].to_string();
            if seen.insert(name.clone()) {
                variables.push(name);
            }
        }
    }
    variables
}

/// Rewrites `cypher` so every matched entity variable is constrained to
/// `codebase_id` or the global codebase.
///
/// Queries introducing no entity variables are returned unchanged.
pub fn scope_to_codebase(cypher: &str, codebase_id: &str) -> String {
    let clauses = split_clauses(cypher);
    let variables = match_variables(&clauses);
    if variables.is_empty() {
        debug!("query introduces no entity variables, left unscoped");
        return cypher.to_string();
    }

    let escaped = codebase_id.replace('\\', "\\\\").replace('\'', "\\'");
    let predicate = variables
        .iter()
        .map(|v| format!("{v}.codebaseId IN ['{escaped}', '{GLOBAL_CODEBASE}']"))
        .collect::<Vec<_>>()
        .join(" AND ");

    if let Some(clause) = clauses.iter().find(|c| c.keyword == "WHERE") {
        // Parenthesize the existing condition so an OR keeps its meaning.
        let body = clause.body.trim();
        return format!(
            "{}WHERE {} AND ({}) {}",
            &cypher[..clause.start],
            predicate,
            body,
            cypher[clause.end..].trim_start()
        )
        .trim_end()
        .to_string();
    }

    if let Some(clause) = clauses
        .iter()
        .find(|c| TERMINAL_CLAUSES.contains(&c.keyword.as_str()))
    {
        return format!(
            "{}WHERE {} {}",
            &cypher[..clause.start],
            predicate,
            &cypher[clause.start..]
        );
    }

    format!("{cypher} WHERE {predicate}")
}

impl GraphStore {
    /// Runs an ad hoc query scoped to one codebase.
    pub async fn execute_scoped(
        &self,
        cypher: &str,
        codebase_id: &str,
    ) -> Result<DetachedRowStream, StoreError> {
        let scoped = scope_to_codebase(cypher, codebase_id);
        debug!(query = %scoped, "executing scoped query");
        self.execute(query(&scoped)).await
    }

    /// Runs an ad hoc query across all codebases, bypassing scoping.
    pub async fn execute_cross_codebase(
        &self,
        cypher: &str,
    ) -> Result<DetachedRowStream, StoreError> {
        warn!(query = %cypher, "privileged cross-codebase query, scoping bypassed");
        self.execute(query(cypher)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_inserted_before_return() {
        let scoped = scope_to_codebase("MATCH (n:File) RETURN n", "app");
        assert_eq!(
            scoped,
            "MATCH (n:File) WHERE n.codebaseId IN ['app', 'global'] RETURN n"
        );
    }

    #[test]
    fn test_filter_spliced_into_existing_where() {
        let scoped = scope_to_codebase(
            "MATCH (n:File) WHERE n.name = 'a' OR n.name = 'b' RETURN n",
            "app",
        );
        assert_eq!(
            scoped,
            "MATCH (n:File) WHERE n.codebaseId IN ['app', 'global'] AND \
             (n.name = 'a' OR n.name = 'b') RETURN n"
        );
    }

    #[test]
    fn test_all_match_variables_constrained() {
        let scoped = scope_to_codebase(
            "MATCH (a:File) MATCH (b:Component) RETURN a, b",
            "app",
        );
        assert!(scoped.contains("a.codebaseId IN ['app', 'global'] AND b.codebaseId IN ['app', 'global']"));
    }

    #[test]
    fn test_relationship_variables_not_constrained() {
        let scoped = scope_to_codebase("MATCH (a)-[r:CALLS]->(b) RETURN a, b", "app");
        assert!(scoped.contains("a.codebaseId"));
        assert!(scoped.contains("b.codebaseId"));
        assert!(!scoped.contains("r.codebaseId"));
    }

    #[test]
    fn test_anonymous_nodes_ignored() {
        let scoped = scope_to_codebase("MATCH (:File)-[:IMPORTS]->(f:File) RETURN f", "app");
        assert!(scoped.contains("f.codebaseId"));
        assert!(!scoped.contains("File.codebaseId"));
    }

    #[test]
    fn test_query_without_variables_unchanged() {
        assert_eq!(scope_to_codebase("RETURN 1", "app"), "RETURN 1");
    }

    #[test]
    fn test_codebase_quotes_escaped() {
        let scoped = scope_to_codebase("MATCH (n) RETURN n", "o'brien");
        assert!(scoped.contains("IN ['o\\'brien', 'global']"));
    }

    #[test]
    fn test_filter_appended_when_no_terminal_clause() {
        let scoped = scope_to_codebase("MATCH (n:File)", "app");
        assert_eq!(
            scoped,
            "MATCH (n:File) WHERE n.codebaseId IN ['app', 'global']"
        );
    }

    #[test]
    fn test_property_map_variable_captured() {
        let scoped = scope_to_codebase("MATCH (n {name: 'App'}) RETURN n", "app");
        assert!(scoped.contains("n.codebaseId IN ['app', 'global']"));
    }
}

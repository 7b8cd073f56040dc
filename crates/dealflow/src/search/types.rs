use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchResultType {
  Lead,
  Task,
  Deal,
  Company,
  Contact,
}

impl SearchResultType {
  pub const ALL: [SearchResultType; 5] = [
    SearchResultType::Lead,
    SearchResultType::Task,
    SearchResultType::Deal,
    SearchResultType::Company,
    SearchResultType::Contact,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      SearchResultType::Lead => "lead",
      SearchResultType::Task => "task",
      SearchResultType::Deal => "deal",
      SearchResultType::Company => "company",
      SearchResultType::Contact => "contact",
    }
  }
}

impl fmt::Display for SearchResultType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One hit returned by the global search endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: SearchResultType,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub priority: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assignee: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tags: Option<Vec<String>>,
}

/// Body of `GET /search/global`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
  #[serde(default)]
  pub results: Vec<SearchResult>,
}

/// A dispatched query; `generation` identifies it against later dispatches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
  pub text: String,
  pub dispatched_at: DateTime<Utc>,
  pub generation: u64,
}

impl SearchQuery {
  pub fn new(text: impl Into<String>, generation: u64) -> Self {
    Self { text: text.into(), dispatched_at: Utc::now(), generation }
  }
}

/// What the search overlay renders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSessionState {
  pub search_term: String,
  pub results: Vec<SearchResult>,
  pub is_open: bool,
  pub is_searching: bool,
  pub has_error: bool,
}

/// Parameters of one remote search call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
  pub query: String,
  pub organization_id: String,
  pub workspace_id: String,
  pub token: String,
  pub types: Vec<SearchResultType>,
  pub limit: usize,
}

impl SearchRequest {
  /// Query-string pairs in the order the endpoint documents them
  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
      ("query", self.query.clone()),
      ("workspaceId", self.workspace_id.clone()),
      ("organizationId", self.organization_id.clone()),
    ];
    if !self.types.is_empty() {
      let types: Vec<&str> = self.types.iter().map(SearchResultType::as_str).collect();
      pairs.push(("types", types.join(",")));
    }
    pairs.push(("limit", self.limit.to_string()));
    pairs
  }
}

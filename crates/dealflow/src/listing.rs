//! Client-side filtering, sorting and pagination for settings lists
//!
//! Tag and team lists are small enough to fetch whole, so the views filter,
//! order and page them in memory.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  #[default]
  Ascending,
  Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
  pub field: String,
  #[serde(default)]
  pub direction: SortDirection,
}

/// Comparable value extracted from an item for sorting
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
  Number(i64),
  Text(String),
}

impl SortKey {
  pub fn text(value: &str) -> Self {
    SortKey::Text(value.to_lowercase())
  }
}

pub trait Listable {
  /// Fields matched by the free-text filter
  fn search_fields(&self) -> Vec<&str>;

  /// Sort key for `field`, or `None` when the item has no such field
  fn sort_key(&self, field: &str) -> Option<SortKey>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
  #[serde(default)]
  pub filter: Option<String>,
  #[serde(default)]
  pub sort: Option<SortSpec>,
  /// 1-based
  #[serde(default = "default_page")]
  pub page: usize,
  #[serde(default = "default_page_size")]
  pub page_size: usize,
}

fn default_page() -> usize {
  1
}
fn default_page_size() -> usize {
  10
}

impl Default for ListQuery {
  fn default() -> Self {
    Self { filter: None, sort: None, page: default_page(), page_size: default_page_size() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub page: usize,
  pub page_size: usize,
  pub total_items: usize,
  pub total_pages: usize,
}

/// Case-insensitive substring match against each item's search fields
pub fn filter<'a, T: Listable>(items: &'a [T], needle: &str) -> Vec<&'a T> {
  let needle = needle.trim().to_lowercase();
  if needle.is_empty() {
    return items.iter().collect();
  }

  items
    .iter()
    .filter(|item| item.search_fields().iter().any(|field| field.to_lowercase().contains(&needle)))
    .collect()
}

/// Stable sort; items lacking the field go last regardless of direction
pub fn sort<T: Listable>(items: &mut [&T], spec: &SortSpec) {
  items.sort_by(|a, b| {
    match (a.sort_key(&spec.field), b.sort_key(&spec.field)) {
      (Some(x), Some(y)) => match spec.direction {
        SortDirection::Ascending => x.cmp(&y),
        SortDirection::Descending => y.cmp(&x),
      },
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => Ordering::Equal,
    }
  });
}

pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
  let page_size = page_size.max(1);
  let total_items = items.len();
  let total_pages = total_items.div_ceil(page_size).max(1);
  let page = page.clamp(1, total_pages);

  let items = items.into_iter().skip((page - 1) * page_size).take(page_size).collect();
  Page { items, page, page_size, total_items, total_pages }
}

impl ListQuery {
  /// Filter, then sort, then paginate
  pub fn apply<T: Listable + Clone>(&self, items: &[T]) -> Page<T> {
    let mut selected = filter(items, self.filter.as_deref().unwrap_or(""));
    if let Some(spec) = &self.sort {
      sort(&mut selected, spec);
    }
    let owned: Vec<T> = selected.into_iter().cloned().collect();
    paginate(owned, self.page, self.page_size)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub color: Option<String>,
  #[serde(default)]
  pub usage_count: u32,
}

impl Listable for Tag {
  fn search_fields(&self) -> Vec<&str> {
    vec![self.name.as_str()]
  }

  fn sort_key(&self, field: &str) -> Option<SortKey> {
    match field {
      "name" => Some(SortKey::text(&self.name)),
      "usageCount" | "usage_count" => Some(SortKey::Number(i64::from(self.usage_count))),
      "color" => self.color.as_deref().map(SortKey::text),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamRole {
  Owner,
  Admin,
  Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
  pub id: String,
  pub name: String,
  pub email: String,
  pub role: TeamRole,
}

impl Listable for TeamMember {
  fn search_fields(&self) -> Vec<&str> {
    vec![self.name.as_str(), self.email.as_str()]
  }

  fn sort_key(&self, field: &str) -> Option<SortKey> {
    match field {
      "name" => Some(SortKey::text(&self.name)),
      "email" => Some(SortKey::text(&self.email)),
      "role" => Some(SortKey::Number(self.role as i64)),
      _ => None,
    }
  }
}

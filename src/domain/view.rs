//! Derived view over the task collection: lifecycle filter, search, favorite/tag
//! narrowing and multi-key sorting, plus tag frequency aggregation.
//!
//! Everything here is pure. Callers re-run [`compute_view`] whenever the collection or
//! the [`ViewParams`] change; nothing is cached between calls.

use icu_collator::{Collator, CollatorOptions};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use super::{DomainError, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterType {
    /// Tasks that are not soft-deleted.
    #[default]
    Home,
    /// Soft-deleted tasks only.
    Trash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortCategory {
    #[default]
    CreatedAt,
    DueDate,
    LastUpdated,
    Text,
    Favorite,
    TagName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

fn normalize_variant(value: &str) -> String {
    value.trim().to_ascii_uppercase().replace('-', "_")
}

impl FromStr for FilterType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_variant(s).as_str() {
            "HOME" => Ok(FilterType::Home),
            "TRASH" => Ok(FilterType::Trash),
            _ => Err(DomainError::UnknownVariant {
                kind: "filter",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for SortCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_variant(s).as_str() {
            "CREATED_AT" => Ok(SortCategory::CreatedAt),
            "DUE_DATE" => Ok(SortCategory::DueDate),
            "LAST_UPDATED" => Ok(SortCategory::LastUpdated),
            "TEXT" => Ok(SortCategory::Text),
            "FAVORITE" => Ok(SortCategory::Favorite),
            "TAG_NAME" => Ok(SortCategory::TagName),
            _ => Err(DomainError::UnknownVariant {
                kind: "sort category",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for SortDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_variant(s).as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            _ => Err(DomainError::UnknownVariant {
                kind: "sort direction",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for SortCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortCategory::CreatedAt => "CREATED_AT",
            SortCategory::DueDate => "DUE_DATE",
            SortCategory::LastUpdated => "LAST_UPDATED",
            SortCategory::Text => "TEXT",
            SortCategory::Favorite => "FAVORITE",
            SortCategory::TagName => "TAG_NAME",
        };
        f.write_str(name)
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ASC"),
            SortDirection::Desc => f.write_str("DESC"),
        }
    }
}

/// Presentation-owned state that drives [`compute_view`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewParams {
    pub filter: FilterType,
    pub search_term: String,
    pub show_only_favorites: bool,
    pub selected_tags: BTreeSet<String>,
    pub sort_category: SortCategory,
    pub sort_direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub tasks: Vec<Task>,
    pub tag_counts: Vec<TagCount>,
}

pub fn compute_view(tasks: &[Task], params: &ViewParams) -> View {
    let mut visible: Vec<Task> = tasks
        .iter()
        .filter(|task| matches_lifecycle(task, params.filter))
        .filter(|task| matches_search(task, &params.search_term))
        .filter(|task| matches_favorite_and_tags(task, params))
        .cloned()
        .collect();

    visible.sort_by(|a, b| {
        params
            .sort_direction
            .apply(compare_by(a, b, params.sort_category))
    });

    View {
        tasks: visible,
        tag_counts: tag_counts(tasks),
    }
}

fn matches_lifecycle(task: &Task, filter: FilterType) -> bool {
    match filter {
        FilterType::Home => !task.deleted,
        FilterType::Trash => task.deleted,
    }
}

fn matches_search(task: &Task, search_term: &str) -> bool {
    if search_term.trim().is_empty() {
        return true;
    }

    let needle = search_term.to_lowercase();
    task.text.to_lowercase().contains(&needle) || task.details.to_lowercase().contains(&needle)
}

fn matches_favorite_and_tags(task: &Task, params: &ViewParams) -> bool {
    // Trash ignores favorite and tag narrowing.
    if params.filter == FilterType::Trash {
        return true;
    }
    if params.show_only_favorites && !task.is_favorite {
        return false;
    }
    if !params.selected_tags.is_empty() {
        return task
            .tag_label()
            .is_some_and(|tag| params.selected_tags.contains(tag));
    }
    true
}

/// Ascending comparison for one category, before the direction is applied.
///
/// The "favorites first" and "missing due date last" rules are part of this
/// ascending order, so a descending sort inverts them too.
fn compare_by(a: &Task, b: &Task, category: SortCategory) -> Ordering {
    let by_created = || a.created_at.cmp(&b.created_at);

    match category {
        SortCategory::CreatedAt => by_created(),
        SortCategory::LastUpdated => a.updated_at.cmp(&b.updated_at),
        SortCategory::Text => locale_cmp(&a.text, &b.text),
        SortCategory::Favorite => match (a.is_favorite, b.is_favorite) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => by_created(),
        },
        SortCategory::DueDate => match (a.due_date, b.due_date) {
            (left, right) if left == right => by_created(),
            (None, _) => Ordering::Greater,
            (_, None) => Ordering::Less,
            (Some(left), Some(right)) => left.cmp(&right),
        },
        SortCategory::TagName => match (a.tag_label(), b.tag_label()) {
            (None, None) => by_created(),
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(left), Some(right)) => locale_cmp(left, right).then_with(by_created),
        },
    }
}

thread_local! {
    // Root-locale collation, built once per thread.
    static COLLATOR: Option<Collator> =
        Collator::try_new(&Default::default(), CollatorOptions::new()).ok();
}

/// Root-locale collation order: accents and case only break ties, kana order by
/// reading, and lowercase sorts before uppercase on otherwise equal text.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => a
            .to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| b.cmp(a)),
    })
}

/// Count tags over every non-deleted task, most frequent first. Equal counts keep the
/// order in which the tag was first seen.
pub fn tag_counts(tasks: &[Task]) -> Vec<TagCount> {
    let mut counts: Vec<TagCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for task in tasks.iter().filter(|task| !task.deleted) {
        let Some(tag) = task.tag_label() else {
            continue;
        };
        match index.get(tag) {
            Some(&slot) => counts[slot].count += 1,
            None => {
                index.insert(tag, counts.len());
                counts.push(TagCount {
                    name: tag.to_string(),
                    count: 1,
                });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

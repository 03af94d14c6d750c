//! Category listing and substring search over the catalog.

use std::collections::BTreeMap;

use studyshelf_core::{Catalog, Document};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub name: String,
    pub count: usize,
}

/// A category as shown on the grid page, including ones with no documents yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCard {
    pub name: String,
    pub glyph: String,
    pub color: Option<(u8, u8, u8)>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome<'a> {
    NotSearching,
    Results(BTreeMap<String, Vec<&'a Document>>),
}

impl<'a> SearchOutcome<'a> {
    pub fn is_searching(&self) -> bool {
        matches!(self, SearchOutcome::Results(_))
    }

    pub fn is_no_results(&self) -> bool {
        matches!(self, SearchOutcome::Results(groups) if groups.is_empty())
    }

    pub fn total(&self) -> usize {
        match self {
            SearchOutcome::NotSearching => 0,
            SearchOutcome::Results(groups) => groups.values().map(Vec::len).sum(),
        }
    }

    /// Results flattened in display order: categories sorted, documents in catalog order.
    pub fn flatten(&self) -> Vec<&'a Document> {
        match self {
            SearchOutcome::NotSearching => Vec::new(),
            SearchOutcome::Results(groups) => groups.values().flatten().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryListing<'a> {
    Documents(Vec<&'a Document>),
    Empty,
}

impl<'a> CategoryListing<'a> {
    pub fn documents(&self) -> &[&'a Document] {
        match self {
            CategoryListing::Documents(docs) => docs,
            CategoryListing::Empty => &[],
        }
    }
}

pub const EMPTY_CATEGORY_PLACEHOLDER: &str = "No documents yet";

pub fn list_categories(catalog: &Catalog) -> Vec<CategorySummary> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for doc in catalog.documents() {
        *counts.entry(doc.category.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(name, count)| CategorySummary {
            name: name.to_string(),
            count,
        })
        .collect()
}

pub fn category_grid(catalog: &Catalog) -> Vec<CategoryCard> {
    catalog
        .categories()
        .iter()
        .map(|(name, info)| CategoryCard {
            name: name.clone(),
            glyph: info.glyph.clone(),
            color: info.rgb(),
            count: catalog
                .documents()
                .iter()
                .filter(|doc| &doc.category == name)
                .count(),
        })
        .collect()
}

pub fn category_listing<'a>(catalog: &'a Catalog, category: &str) -> CategoryListing<'a> {
    let docs: Vec<&Document> = catalog
        .documents()
        .iter()
        .filter(|doc| doc.category == category)
        .collect();
    if docs.is_empty() {
        CategoryListing::Empty
    } else {
        CategoryListing::Documents(docs)
    }
}

pub fn filter<'a>(catalog: &'a Catalog, query: &str) -> SearchOutcome<'a> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return SearchOutcome::NotSearching;
    }

    let mut groups: BTreeMap<String, Vec<&Document>> = BTreeMap::new();
    for doc in catalog.documents() {
        if matches_needle(doc, &needle) {
            groups.entry(doc.category.clone()).or_default().push(doc);
        }
    }
    SearchOutcome::Results(groups)
}

/// Case-insensitive substring match against title, category and description.
pub fn matches_query(doc: &Document, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    needle.is_empty() || matches_needle(doc, &needle)
}

fn matches_needle(doc: &Document, needle: &str) -> bool {
    doc.title.to_lowercase().contains(needle)
        || doc.category.to_lowercase().contains(needle)
        || doc
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
}

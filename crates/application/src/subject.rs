//! Search box scoped to one subject page.

use studyshelf_core::{Catalog, Document, DocumentId};

use crate::catalog_view::matches_query;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectResults<'a> {
    All(Vec<&'a Document>),
    Matches(Vec<&'a Document>),
    NoResults,
}

impl<'a> SubjectResults<'a> {
    pub fn documents(&self) -> &[&'a Document] {
        match self {
            SubjectResults::All(docs) | SubjectResults::Matches(docs) => docs,
            SubjectResults::NoResults => &[],
        }
    }
}

/// Live filter over the documents of a subject supplied at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectSearch {
    subject: String,
    query: String,
    visible: Vec<DocumentId>,
}

impl SubjectSearch {
    pub fn new(subject: impl Into<String>, catalog: &Catalog) -> Self {
        let mut search = Self {
            subject: subject.into(),
            query: String::new(),
            visible: Vec::new(),
        };
        search.refresh(catalog);
        search
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, catalog: &Catalog, query: &str) {
        self.query = query.to_string();
        self.refresh(catalog);
    }

    pub fn clear(&mut self, catalog: &Catalog) {
        self.set_query(catalog, "");
    }

    pub fn results<'a>(&self, catalog: &'a Catalog) -> SubjectResults<'a> {
        let docs: Vec<&Document> = self
            .visible
            .iter()
            .filter_map(|id| catalog.document(*id))
            .collect();
        if self.query.trim().is_empty() {
            SubjectResults::All(docs)
        } else if docs.is_empty() {
            SubjectResults::NoResults
        } else {
            SubjectResults::Matches(docs)
        }
    }

    pub fn subject_documents<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Document> {
        catalog
            .documents()
            .iter()
            .filter(|doc| doc.category == self.subject)
            .collect()
    }

    pub fn count_label(&self, catalog: &Catalog) -> String {
        let count = self.subject_documents(catalog).len();
        if count == 1 {
            "1 document".to_string()
        } else {
            format!("{count} documents")
        }
    }

    fn refresh(&mut self, catalog: &Catalog) {
        let query = self.query.clone();
        self.visible = self
            .subject_documents(catalog)
            .into_iter()
            .filter(|doc| matches_query(doc, &query))
            .map(|doc| doc.id)
            .collect();
        log::debug!(
            "subject search {:?} query={:?} -> {} documents",
            self.subject,
            self.query,
            self.visible.len()
        );
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Rejections raised while validating a selection request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("sheet name is required")]
    MissingSheet,

    #[error("question limit must be > 0")]
    InvalidLimit,

    #[error("at least one category must be selected")]
    CategoriesRequired,

    #[error("unknown question order: {0}")]
    UnknownOrder(String),
}

//
// ─── ORDER ─────────────────────────────────────────────────────────────────────
//

/// How selected questions are ordered before truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionOrder {
    /// Ascending question ID.
    #[default]
    Sequential,
    /// Uniform random permutation.
    Random,
}

impl QuestionOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionOrder::Sequential => "sequential",
            QuestionOrder::Random => "random",
        }
    }
}

impl fmt::Display for QuestionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionOrder {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "random" => Ok(Self::Random),
            _ => Err(SelectionError::UnknownOrder(s.to_owned())),
        }
    }
}

//
// ─── CATEGORY FILTER ───────────────────────────────────────────────────────────
//

/// What an empty category set means for a selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryPolicy {
    /// Empty set is rejected with `SelectionError::CategoriesRequired`.
    RequireExplicit,
    /// Empty set selects every category in the sheet.
    #[default]
    EmptyMeansAll,
}

/// Resolved category filter handed to the question repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Only(BTreeSet<String>),
}

impl CategoryFilter {
    /// Returns true when a question in `category` passes this filter.
    #[must_use]
    pub fn matches(&self, category: &str) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(set) => set.contains(category),
        }
    }
}

//
// ─── CRITERIA ──────────────────────────────────────────────────────────────────
//

/// A player's request for a set of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub sheet: String,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    pub limit: u32,
    #[serde(default)]
    pub order: QuestionOrder,
}

impl SelectionCriteria {
    #[must_use]
    pub fn new(sheet: impl Into<String>, limit: u32, order: QuestionOrder) -> Self {
        Self {
            sheet: sheet.into(),
            categories: BTreeSet::new(),
            limit,
            order,
        }
    }

    /// Add categories to the filter. Blank names are ignored.
    #[must_use]
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.extend(
            categories
                .into_iter()
                .map(Into::into)
                .map(|c: String| c.trim().to_owned())
                .filter(|c| !c.is_empty()),
        );
        self
    }

    /// Validate the request and resolve its category filter under `policy`.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::MissingSheet` for a blank sheet name,
    /// `SelectionError::InvalidLimit` when `limit == 0`, and
    /// `SelectionError::CategoriesRequired` when the set is empty under
    /// `CategoryPolicy::RequireExplicit`.
    pub fn resolve(&self, policy: CategoryPolicy) -> Result<CategoryFilter, SelectionError> {
        if self.sheet.trim().is_empty() {
            return Err(SelectionError::MissingSheet);
        }
        if self.limit == 0 {
            return Err(SelectionError::InvalidLimit);
        }
        if self.categories.is_empty() {
            return match policy {
                CategoryPolicy::RequireExplicit => Err(SelectionError::CategoriesRequired),
                CategoryPolicy::EmptyMeansAll => Ok(CategoryFilter::All),
            };
        }
        Ok(CategoryFilter::Only(self.categories.clone()))
    }
}

use std::collections::{BTreeMap, HashSet};

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::quiz::Quiz;
use super::ContentError;
use crate::offline::{Destination, OfflineCache, Request};
use crate::progress::{Category, ItemId};

/// One entry of a content dataset. Fields other than `id` are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ItemId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContentItem {
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Heading for list views: `title`, else `question` (quizzes).
    pub fn title(&self) -> Option<&str> {
        self.field_str("title").or_else(|| self.field_str("question"))
    }

    pub fn description(&self) -> Option<&str> {
        self.field_str("description")
    }
}

/// The four datasets, keyed by category.
#[derive(Debug, Clone, Default)]
pub struct ContentLibrary {
    datasets: BTreeMap<Category, Vec<ContentItem>>,
}

impl ContentLibrary {
    /// Fetch every dataset through the offline cache.
    ///
    /// Fails if any dataset can neither be fetched live nor served from the
    /// cache, or does not parse.
    pub async fn load(cache: &OfflineCache) -> Result<Self, ContentError> {
        let loads = Category::ALL.into_iter().map(|category| async move {
            let request = Request::get(category.dataset_path(), Destination::Data);
            let outcome = cache.intercept(request).await;
            debug!(category = %category, source = outcome.label(), "Dataset fetched");
            let response = outcome
                .into_result()
                .map_err(|source| ContentError::Unavailable { category, source })?;
            if !response.ok() {
                return Err(ContentError::BadStatus {
                    category,
                    status: response.status,
                });
            }
            let items = parse_dataset(category, &response.body)?;
            Ok((category, items))
        });

        let mut library = Self::default();
        for (category, items) in try_join_all(loads).await? {
            library.datasets.insert(category, items);
        }
        info!(
            anatomy = library.items(Category::Anatomy).len(),
            techniques = library.items(Category::Techniques).len(),
            cases = library.items(Category::Cases).len(),
            quizzes = library.items(Category::Quizzes).len(),
            "Content loaded"
        );
        Ok(library)
    }

    /// Insert a dataset from raw JSON, replacing any previous one.
    pub fn insert_json(&mut self, category: Category, json: &[u8]) -> Result<(), ContentError> {
        let items = parse_dataset(category, json)?;
        self.datasets.insert(category, items);
        Ok(())
    }

    /// Items of `category` in dataset order; empty if not loaded.
    pub fn items(&self, category: Category) -> &[ContentItem] {
        self.datasets.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// `None` when no such item exists.
    pub fn find(&self, category: Category, id: ItemId) -> Option<&ContentItem> {
        self.items(category).iter().find(|item| item.id == id)
    }

    pub fn quiz(&self, id: ItemId) -> Result<Option<Quiz>, ContentError> {
        self.find(Category::Quizzes, id).map(Quiz::from_item).transpose()
    }
}

fn parse_dataset(category: Category, json: &[u8]) -> Result<Vec<ContentItem>, ContentError> {
    let items: Vec<ContentItem> =
        serde_json::from_slice(json).map_err(|source| ContentError::Parse { category, source })?;

    let mut seen = HashSet::with_capacity(items.len());
    for item in &items {
        if !seen.insert(item.id) {
            return Err(ContentError::DuplicateId { category, id: item.id });
        }
    }
    Ok(items)
}

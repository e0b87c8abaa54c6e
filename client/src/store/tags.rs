//! Tags store.

use super::{EntityStore, StoreOptions};
use crate::connectivity::Connectivity;
use crate::persistence::PersistenceAdapter;
use cardbox_engine::{ordering, Tag};
use std::sync::Arc;

/// Store of tags, newest first.
pub type TagsStore = EntityStore<Tag>;

impl EntityStore<Tag> {
    pub fn tags(
        adapter: Arc<dyn PersistenceAdapter<Tag>>,
        connectivity: Connectivity,
        options: StoreOptions,
    ) -> Self {
        Self::new(
            "tags",
            adapter,
            connectivity,
            options,
            ordering::sort_by_recency::<Tag>,
        )
    }

    pub fn get_tag_by_id(&self, id: &str) -> Option<Tag> {
        self.get(id)
    }

    /// Known tags among `ids`; unknown ids are skipped.
    pub fn tags_by_ids<'a>(&self, ids: impl IntoIterator<Item = &'a String>) -> Vec<Tag> {
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }
}

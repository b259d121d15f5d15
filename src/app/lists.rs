use tracing::info;
use uuid::Uuid;

use super::{item_mut, required_text, App, AppError};
use crate::keys::{self, LISTS_SEEDED_KEY, LIST_META_KEY};
use crate::model::{ListItem, ListMeta};
use crate::outbox::OutboxTask;
use crate::store::Origin;

const DEFAULT_LISTS: [(&str, &str); 3] = [
    ("goals2026", "🚀 Goals 2026"),
    ("shopping", "🛒 Shopping List"),
    ("chores", "🧹 Weekly Chores"),
];

impl App {
    pub fn list_meta(&self) -> Result<Vec<ListMeta>, AppError> {
        Ok(self.store.get(LIST_META_KEY, Vec::new())?)
    }

    fn find_list(&self, id: &str) -> Result<ListMeta, AppError> {
        self.list_meta()?
            .into_iter()
            .find(|list| list.id == id)
            .ok_or_else(|| AppError::NotFound(format!("list '{}'", id)))
    }

    /// Seeds the built-in lists once, keeping any custom lists created
    /// before. Returns false when seeding already happened.
    pub fn init_default_lists(&self) -> Result<bool, AppError> {
        if self.store.contains(LISTS_SEEDED_KEY)? {
            return Ok(false);
        }
        let existing = self.list_meta()?;
        let mut merged: Vec<ListMeta> = DEFAULT_LISTS
            .iter()
            .map(|(id, title)| ListMeta {
                id: (*id).to_string(),
                title: (*title).to_string(),
            })
            .collect();
        merged.extend(
            existing
                .into_iter()
                .filter(|list| !DEFAULT_LISTS.iter().any(|(id, _)| *id == list.id)),
        );
        self.write(LIST_META_KEY, &merged)?;
        self.store.set_untracked(LISTS_SEEDED_KEY, &true)?;
        info!(lists = merged.len(), "seeded default lists");
        Ok(true)
    }

    pub fn create_list(&self, title: &str) -> Result<ListMeta, AppError> {
        let created = ListMeta {
            id: format!("custom-{}", Uuid::now_v7()),
            title: required_text(title, "list title")?,
        };
        let mut meta = self.list_meta()?;
        meta.push(created.clone());
        self.write(LIST_META_KEY, &meta)?;
        Ok(created)
    }

    /// Remote lists are keyed by title, so a rename removes the old remote
    /// list and re-pushes the items under the new title.
    ///
    /// The remote delete is only queued while signed in, and the outbox
    /// lives in memory. A rename made signed out (or never settled) leaves
    /// the old-titled list on the remote, and a later list created with
    /// that title picks its items back up on pull.
    pub fn rename_list(&self, id: &str, title: &str) -> Result<ListMeta, AppError> {
        let title = required_text(title, "list title")?;
        let mut meta = self.list_meta()?;
        let entry = meta
            .iter_mut()
            .find(|list| list.id == id)
            .ok_or_else(|| AppError::NotFound(format!("list '{}'", id)))?;
        if entry.title == title {
            return Ok(entry.clone());
        }
        let old_title = std::mem::replace(&mut entry.title, title);
        let renamed = entry.clone();

        self.queue(OutboxTask::DeleteList { title: old_title });
        self.write(LIST_META_KEY, &meta)?;
        let items_key = keys::list_key(id);
        if let Some(raw) = self.store.get_raw(&items_key)? {
            self.store.set_raw(&items_key, &raw, Origin::Local)?;
            self.queue(OutboxTask::Push { key: items_key });
        }
        Ok(renamed)
    }

    /// Removes the list locally and queues the remote delete by title.
    /// As with [`App::rename_list`], the delete is only queued while signed
    /// in and is lost if the process exits before settling, so the remote
    /// copy can outlive the local one.
    pub fn delete_list(&self, id: &str) -> Result<ListMeta, AppError> {
        let removed = self.find_list(id)?;
        let remaining: Vec<ListMeta> = self
            .list_meta()?
            .into_iter()
            .filter(|list| list.id != id)
            .collect();

        self.store.delete(&keys::list_key(id), Origin::Local)?;
        self.store.remove_untracked(&keys::list_icon_key(id))?;
        self.queue(OutboxTask::DeleteList {
            title: removed.title.clone(),
        });
        self.write(LIST_META_KEY, &remaining)?;
        Ok(removed)
    }

    pub fn list_items(&self, id: &str) -> Result<Vec<ListItem>, AppError> {
        self.read_records(&keys::list_key(id))
    }

    pub fn set_list_items(&self, id: &str, items: &[ListItem]) -> Result<(), AppError> {
        self.find_list(id)?;
        self.write(&keys::list_key(id), items)
    }

    pub fn add_list_item(&self, id: &str, text: &str) -> Result<Vec<ListItem>, AppError> {
        let mut items = self.list_items(id)?;
        items.push(ListItem {
            text: required_text(text, "item")?,
            done: false,
        });
        self.set_list_items(id, &items)?;
        Ok(items)
    }

    pub fn set_list_item_done(
        &self,
        id: &str,
        index: usize,
        done: bool,
    ) -> Result<ListItem, AppError> {
        let mut items = self.list_items(id)?;
        let item = item_mut(&mut items, index, "item")?;
        item.done = done;
        let updated = item.clone();
        self.set_list_items(id, &items)?;
        Ok(updated)
    }

    pub fn list_icon(&self, id: &str) -> Result<String, AppError> {
        Ok(self
            .store
            .get(&keys::list_icon_key(id), self.default_icon.clone())?)
    }
}

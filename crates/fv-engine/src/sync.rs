//! # Reconciliation
//!
//! A `LocalView` is the immediately-rendered copy of a store table. Every
//! mutation goes through one of three protocols:
//!
//! - `optimistic_update`: apply locally, write, restore the prior record on failure.
//! - `confirmed_insert`: write first (the store assigns the id), then append.
//! - `confirmed_delete`: write first, remove locally only once the store agrees.
//!
//! A failed mutation leaves the view exactly as it was before the attempt.

use std::future::Future;

use fv_core::error::{AppError, Result};
use fv_core::models::{DeadlineEntry, DeadlineType, Machine};
use uuid::Uuid;

/// Records addressable by a stable identifier.
pub trait Keyed {
    fn key(&self) -> Uuid;
}

impl Keyed for Machine {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Keyed for DeadlineType {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Keyed for DeadlineEntry {
    fn key(&self) -> Uuid {
        self.deadline.id
    }
}

/// Insertion-ordered collection keyed by id.
#[derive(Debug, Clone)]
pub struct LocalView<T> {
    items: Vec<T>,
}

impl<T> Default for LocalView<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Keyed> LocalView<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.items.iter().find(|item| item.key() == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    /// Replaces the record in place (keeping its position) or appends it.
    /// Returns the record it replaced.
    pub fn upsert(&mut self, item: T) -> Option<T> {
        match self.items.iter().position(|existing| existing.key() == item.key()) {
            Some(idx) => Some(std::mem::replace(&mut self.items[idx], item)),
            None => {
                self.items.push(item);
                None
            }
        }
    }

    pub fn remove(&mut self, id: Uuid) -> Option<T> {
        let idx = self.items.iter().position(|item| item.key() == id)?;
        Some(self.items.remove(idx))
    }

    /// Keeps only the records matching `keep`. Returns how many were dropped.
    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(keep);
        before - self.items.len()
    }

    /// Swaps in a fresh snapshot. Duplicate ids keep their first occurrence.
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.clear();
        for item in items {
            if !self.contains(item.key()) {
                self.items.push(item);
            }
        }
    }
}

impl<T: Keyed> FromIterator<T> for LocalView<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut view = LocalView::new();
        view.replace_all(iter);
        view
    }
}

/// Applies `staged` to the view, then awaits `write`. The store's answer
/// replaces the staged record; a missing row or a store failure puts the
/// previous record back.
pub async fn optimistic_update<T, F>(
    view: &mut LocalView<T>,
    entity: &'static str,
    staged: T,
    write: F,
) -> Result<T>
where
    T: Keyed + Clone,
    F: Future<Output = anyhow::Result<Option<T>>>,
{
    let id = staged.key();
    let previous = view.upsert(staged);

    match write.await {
        Ok(Some(confirmed)) => {
            view.upsert(confirmed.clone());
            Ok(confirmed)
        }
        Ok(None) => {
            restore(view, id, previous);
            tracing::warn!(entity, %id, "update target vanished from store; rolled back");
            Err(AppError::NotFound(entity, id.to_string()))
        }
        Err(err) => {
            restore(view, id, previous);
            tracing::warn!(entity, %id, error = %err, "store rejected update; rolled back");
            Err(AppError::store(err))
        }
    }
}

/// Awaits `write` and appends the store-confirmed record.
pub async fn confirmed_insert<T, F>(view: &mut LocalView<T>, entity: &'static str, write: F) -> Result<T>
where
    T: Keyed + Clone,
    F: Future<Output = anyhow::Result<T>>,
{
    match write.await {
        Ok(created) => {
            view.upsert(created.clone());
            Ok(created)
        }
        Err(err) => {
            tracing::warn!(entity, error = %err, "store rejected insert");
            Err(AppError::store(err))
        }
    }
}

/// Awaits `write` and removes the record only when the store confirms.
pub async fn confirmed_delete<T, F>(
    view: &mut LocalView<T>,
    entity: &'static str,
    id: Uuid,
    write: F,
) -> Result<T>
where
    T: Keyed,
    F: Future<Output = anyhow::Result<bool>>,
{
    match write.await {
        Ok(true) => view
            .remove(id)
            .ok_or_else(|| AppError::NotFound(entity, id.to_string())),
        Ok(false) => {
            tracing::warn!(entity, %id, "delete target missing from store");
            Err(AppError::NotFound(entity, id.to_string()))
        }
        Err(err) => {
            tracing::warn!(entity, %id, error = %err, "store rejected delete");
            Err(AppError::store(err))
        }
    }
}

fn restore<T: Keyed>(view: &mut LocalView<T>, id: Uuid, previous: Option<T>) {
    match previous {
        Some(previous) => {
            view.upsert(previous);
        }
        None => {
            view.remove(id);
        }
    }
}

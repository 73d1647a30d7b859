//! Folder listing and run result models.

use crate::{Error, ListingFields, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// One entry of an epost folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderItem {
    /// Item identifier. The service sends either a number or a string; both
    /// are kept in their textual form.
    pub id: String,
    /// Short description shown in the inbox (sender and document name).
    pub description: String,
}

impl FolderItem {
    /// Local file name for this item: `{description}.{id}.pdf`.
    ///
    /// Every `/` becomes `-` so a description never creates subdirectories.
    pub fn file_name(&self) -> String {
        format!("{}.{}.pdf", self.description, self.id).replace('/', "-")
    }
}

/// A decoded folder listing page.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Reported folder size, when present.
    pub total: Option<u64>,
    /// Items on this page. Empty means pagination is finished.
    pub items: Vec<FolderItem>,
}

impl ListingPage {
    /// Decode a listing body using the configured field names.
    ///
    /// # Errors
    /// Returns [`Error::ResponseParse`] if the item array is missing or an item
    /// lacks its id or description.
    pub fn from_value(value: &Value, fields: &ListingFields) -> Result<Self> {
        let total = value.get(&fields.total).and_then(Value::as_u64);

        let list = value
            .get(&fields.items)
            .and_then(Value::as_array)
            .ok_or_else(|| Error::ResponseParse {
                msg: format!(
                    "missing or non-array `{}` (response: {})",
                    fields.items,
                    json_snippet(value)
                ),
            })?;

        let items = list
            .iter()
            .map(|record| item_from_value(record, fields))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { total, items })
    }
}

fn item_from_value(record: &Value, fields: &ListingFields) -> Result<FolderItem> {
    let id = match record.get(&fields.item_id) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(Error::ResponseParse {
                msg: format!(
                    "item without `{}` (item: {})",
                    fields.item_id,
                    json_snippet(record)
                ),
            });
        }
    };

    let description = record
        .get(&fields.description)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ResponseParse {
            msg: format!(
                "item {id} without `{}` (item: {})",
                fields.description,
                json_snippet(record)
            ),
        })?
        .to_string();

    Ok(FolderItem { id, description })
}

fn json_snippet(value: &Value) -> String {
    let raw = value.to_string();
    raw.chars().take(200).collect()
}

/// Outcome of one folder item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemStatus {
    /// The file already existed; nothing was requested.
    AlreadyDownloaded {
        /// Existing file.
        path: PathBuf,
    },
    /// The document was fetched and written.
    Downloaded {
        /// Written file.
        path: PathBuf,
    },
    /// The document request returned a non-200 status.
    Failed {
        /// HTTP status code.
        status: u16,
    },
}

/// Result record for one processed folder item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    /// Folder the item was listed in.
    pub folder: u64,
    /// Item identifier.
    pub item: String,
    /// Item short description.
    pub description: String,
    /// What happened.
    pub status: ItemStatus,
}

impl fmt::Display for ItemResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            ItemStatus::AlreadyDownloaded { path } => {
                write!(f, "Already downloaded '{}', skipping", path.display())
            }
            ItemStatus::Downloaded { path } => write!(f, "Downloaded '{}'", path.display()),
            ItemStatus::Failed { status } => write!(
                f,
                "Downloading '{}' failed with HTTP '{}'",
                self.description, status
            ),
        }
    }
}

/// Counters and per-item results of one download run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    /// Folder size reported by the first listing page.
    pub total: u64,
    /// Items skipped as already present or newly downloaded.
    pub processed: u64,
    /// Items written to disk during this run.
    pub downloaded: u64,
    /// One record per item, in listing order.
    pub results: Vec<ItemResult>,
}

impl DownloadReport {
    /// Results whose download request failed.
    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, ItemStatus::Failed { .. }))
    }

    pub(crate) fn record(&mut self, folder: u64, item: &FolderItem, status: ItemStatus) {
        match status {
            ItemStatus::AlreadyDownloaded { .. } => self.processed += 1,
            ItemStatus::Downloaded { .. } => {
                self.processed += 1;
                self.downloaded += 1;
            }
            ItemStatus::Failed { .. } => {}
        }
        self.results.push(ItemResult {
            folder,
            item: item.id.clone(),
            description: item.description.clone(),
            status,
        });
    }
}

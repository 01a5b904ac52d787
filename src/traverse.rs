//! Walks the three inventory views and flattens files into records.

use tracing::{debug, info};

use crate::client::FileSource;
use crate::error::{DriveError, Result};
use crate::models::{DriveFile, FileRecord};
use crate::query::{children_query, root_files_query, root_folders_query, shared_with_me_query};

/// One folder listing still being consumed.
struct Frame {
    items: std::vec::IntoIter<DriveFile>,
    path: String,
}

/// Lists files from a [`FileSource`] and turns them into [`FileRecord`]s.
pub struct Traverser<'a, S: FileSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: FileSource + ?Sized> Traverser<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Non-folder items directly under root. Paths are empty.
    pub async fn list_root_files(&self) -> Result<Vec<FileRecord>> {
        let files = self.source.list_files(&root_files_query()).await?;
        let records = files
            .iter()
            .map(|file| to_record(file, ""))
            .collect::<Result<Vec<_>>>()?;

        info!(count = records.len(), "listed root files");
        Ok(records)
    }

    /// Every file below the root folders, or below `folder_id` when given.
    ///
    /// `path` is prepended to every emitted record's path.
    pub async fn list_files_recursively(
        &self,
        folder_id: Option<&str>,
        path: &str,
    ) -> Result<Vec<FileRecord>> {
        let query = match folder_id {
            Some(id) => children_query(id),
            None => root_folders_query(),
        };
        let records = self.walk(&query, path).await?;

        info!(count = records.len(), "listed folder tree");
        Ok(records)
    }

    /// Every file in the "shared with me" view, descending into shared folders.
    pub async fn list_shared_with_me_files_recursively(
        &self,
        folder_id: Option<&str>,
        path: &str,
    ) -> Result<Vec<FileRecord>> {
        let query = match folder_id {
            Some(id) => children_query(id),
            None => shared_with_me_query(),
        };
        let records = self.walk(&query, path).await?;

        info!(count = records.len(), "listed shared with me");
        Ok(records)
    }

    /// Depth-first walk in listing order using an explicit stack.
    ///
    /// A folder's subtree is emitted at the folder's position among its siblings.
    async fn walk(&self, query: &str, path: &str) -> Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        let mut stack = vec![self.open(query, path.to_string()).await?];

        while let Some(frame) = stack.last_mut() {
            let Some(item) = frame.items.next() else {
                stack.pop();
                continue;
            };

            if item.is_folder() {
                let child_path = format!("{}{}/", frame.path, item.name);
                let child = self.open(&children_query(&item.id), child_path).await?;
                stack.push(child);
            } else {
                records.push(to_record(&item, &frame.path)?);
            }
        }

        Ok(records)
    }

    async fn open(&self, query: &str, path: String) -> Result<Frame> {
        let items = self.source.list_files(query).await?;
        debug!(path = %path, count = items.len(), "listed folder");
        Ok(Frame {
            items: items.into_iter(),
            path,
        })
    }
}

/// Flatten a Drive item into a report record.
pub fn to_record(file: &DriveFile, path: &str) -> Result<FileRecord> {
    let owner_email = file
        .owners
        .as_ref()
        .and_then(|owners| owners.first())
        .and_then(|owner| owner.email_address.clone())
        .ok_or_else(|| DriveError::MissingField {
            file: file.name.clone(),
            field: "owner",
        })?;

    let mut shared_with: Vec<String> = Vec::new();
    for permission in file.permissions.iter().flatten().filter(|p| p.is_user()) {
        let email = permission
            .email_address
            .as_ref()
            .ok_or_else(|| DriveError::MissingField {
                file: file.name.clone(),
                field: "permission email",
            })?;
        if !shared_with.contains(email) {
            shared_with.push(email.clone());
        }
    }

    Ok(FileRecord {
        name: file.name.clone(),
        path: path.to_string(),
        owner_email,
        shared_with,
        shared_with_me: file.is_shared_with_me(),
    })
}

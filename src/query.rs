//! Drive query strings for the three inventory views.

use crate::models::FOLDER_MIME_TYPE;

/// Fields requested on every files.list call.
pub const LIST_FIELDS: &str =
    "nextPageToken, files(id, name, mimeType, owners, permissions, sharedWithMeTime)";

/// Non-folder items directly under root.
pub fn root_files_query() -> String {
    format!(
        "mimeType != '{}' and trashed = false and 'root' in parents",
        FOLDER_MIME_TYPE
    )
}

/// Folders directly under root.
pub fn root_folders_query() -> String {
    format!(
        "mimeType = '{}' and trashed = false and 'root' in parents",
        FOLDER_MIME_TYPE
    )
}

/// Everything inside the given folder.
pub fn children_query(folder_id: &str) -> String {
    format!("'{}' in parents and trashed = false", escape(folder_id))
}

/// Items other users have shared with the authenticated user.
pub fn shared_with_me_query() -> String {
    "sharedWithMe and trashed = false".to_string()
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

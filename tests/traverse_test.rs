//! Tests for Traverser against an in-memory drive.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use drive_inventory::query::{
    children_query, root_files_query, root_folders_query, shared_with_me_query,
};
use drive_inventory::{report, DriveError, DriveFile, FileSource, Result, Traverser};

const FOLDER: &str = "application/vnd.google-apps.folder";

/// Answers queries from a fixed table and remembers what was asked.
#[derive(Default)]
struct FakeDrive {
    listings: HashMap<String, Vec<DriveFile>>,
    calls: Mutex<Vec<String>>,
}

impl FakeDrive {
    fn with(mut self, query: String, items: Vec<Value>) -> Self {
        let files = items
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        self.listings.insert(query, files);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileSource for FakeDrive {
    async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>> {
        self.calls.lock().unwrap().push(query.to_string());
        Ok(self.listings.get(query).cloned().unwrap_or_default())
    }
}

fn folder(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "mimeType": FOLDER,
        "owners": [{"emailAddress": "owner@x.com"}]
    })
}

fn doc(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "mimeType": "text/plain",
        "owners": [{"emailAddress": "owner@x.com"}]
    })
}

mod root_files {
    use super::*;

    #[tokio::test]
    async fn count_matches_listing() {
        let drive = FakeDrive::default().with(
            root_files_query(),
            vec![doc("1", "a.txt"), doc("2", "b.txt"), doc("3", "c.txt")],
        );

        let records = Traverser::new(&drive).list_root_files().await.unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.path.is_empty()));
        assert_eq!(drive.calls(), vec![root_files_query()]);
    }

    #[tokio::test]
    async fn empty_root() {
        let drive = FakeDrive::default();
        let records = Traverser::new(&drive).list_root_files().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn missing_owner_fails() {
        let drive = FakeDrive::default().with(
            root_files_query(),
            vec![json!({"id": "1", "name": "orphan.txt", "mimeType": "text/plain"})],
        );

        let err = Traverser::new(&drive).list_root_files().await.unwrap_err();
        assert!(matches!(err, DriveError::MissingField { .. }));
    }
}

mod recursive {
    use super::*;

    fn nested_drive() -> FakeDrive {
        FakeDrive::default()
            .with(root_folders_query(), vec![folder("a", "A"), folder("c", "C")])
            .with(children_query("a"), vec![doc("x", "x.txt"), folder("b", "B"), doc("y", "y.txt")])
            .with(children_query("b"), vec![doc("f", "f.txt")])
            .with(children_query("c"), vec![doc("z", "z.txt")])
    }

    #[tokio::test]
    async fn paths_join_ancestor_names() {
        let drive = nested_drive();
        let records = Traverser::new(&drive)
            .list_files_recursively(None, "")
            .await
            .unwrap();

        let f = records.iter().find(|r| r.name == "f.txt").unwrap();
        assert_eq!(f.path, "A/B/");
        let x = records.iter().find(|r| r.name == "x.txt").unwrap();
        assert_eq!(x.path, "A/");
    }

    #[tokio::test]
    async fn depth_first_in_listing_order() {
        let drive = nested_drive();
        let records = Traverser::new(&drive)
            .list_files_recursively(None, "")
            .await
            .unwrap();

        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["x.txt", "f.txt", "y.txt", "z.txt"]);

        assert_eq!(
            drive.calls(),
            vec![
                root_folders_query(),
                children_query("a"),
                children_query("b"),
                children_query("c"),
            ]
        );
    }

    #[tokio::test]
    async fn starts_from_given_folder_and_path() {
        let drive = nested_drive();
        let records = Traverser::new(&drive)
            .list_files_recursively(Some("a"), "A/")
            .await
            .unwrap();

        let pairs: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.name.as_str(), r.path.as_str()))
            .collect();
        assert_eq!(pairs, vec![("x.txt", "A/"), ("f.txt", "A/B/"), ("y.txt", "A/")]);
    }

    #[tokio::test]
    async fn empty_folders_emit_nothing() {
        let drive = FakeDrive::default().with(root_folders_query(), vec![folder("e", "Empty")]);
        let records = Traverser::new(&drive)
            .list_files_recursively(None, "")
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn deep_tree() {
        let mut drive = FakeDrive::default().with(root_folders_query(), vec![folder("d0", "d0")]);
        for depth in 0..200 {
            let next = format!("d{}", depth + 1);
            drive = drive.with(children_query(&format!("d{}", depth)), vec![folder(&next, &next)]);
        }
        drive = drive.with(children_query("d200"), vec![doc("leaf", "leaf.txt")]);

        let records = Traverser::new(&drive)
            .list_files_recursively(None, "")
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path.matches('/').count(), 201);
        assert!(records[0].path.starts_with("d0/d1/d2/"));
        assert!(records[0].path.ends_with("d200/"));
    }
}

mod shared_with_me {
    use super::*;

    #[tokio::test]
    async fn descends_into_shared_folders() {
        let shared_doc = json!({
            "id": "s1",
            "name": "shared.txt",
            "mimeType": "text/plain",
            "owners": [{"emailAddress": "other@x.com"}],
            "sharedWithMeTime": "2024-02-01T00:00:00Z"
        });
        let drive = FakeDrive::default()
            .with(shared_with_me_query(), vec![shared_doc, folder("sf", "Team")])
            .with(children_query("sf"), vec![doc("n", "notes.txt")]);

        let records = Traverser::new(&drive)
            .list_shared_with_me_files_recursively(None, "")
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "shared.txt");
        assert_eq!(records[0].path, "");
        assert!(records[0].shared_with_me);
        assert_eq!(records[1].name, "notes.txt");
        assert_eq!(records[1].path, "Team/");
        assert!(!records[1].shared_with_me);
    }
}

mod combined {
    use super::*;

    #[tokio::test]
    async fn row_count_is_sum_of_views() {
        let drive = FakeDrive::default()
            .with(root_files_query(), vec![doc("r", "r.txt")])
            .with(root_folders_query(), vec![folder("a", "A")])
            .with(children_query("a"), vec![doc("x", "x.txt"), doc("y", "y.txt")])
            .with(shared_with_me_query(), vec![folder("a", "A")]);

        let traverser = Traverser::new(&drive);
        let root = traverser.list_root_files().await.unwrap();
        let tree = traverser.list_files_recursively(None, "").await.unwrap();
        let shared = traverser
            .list_shared_with_me_files_recursively(None, "")
            .await
            .unwrap();
        let expected = root.len() + tree.len() + shared.len();

        let records = report::combine(root, tree, shared);
        assert_eq!(records.len(), expected);
        assert_eq!(records.len(), 5);
        assert_eq!(records.iter().filter(|r| r.name == "x.txt").count(), 2);
    }
}

//! Folder trees built from flat folder lists.

use std::collections::{HashMap, HashSet};

use super::folder::Folder;
use super::metadata::StoredFile;

/// A folder with its files and child folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNode {
    /// The folder itself.
    pub folder: Folder,
    /// Files directly in the folder.
    pub files: Vec<StoredFile>,
    /// Child folders, by name.
    pub children: Vec<FolderNode>,
}

impl FolderNode {
    /// Number of folders in this subtree, including this one.
    pub fn folder_count(&self) -> usize {
        1 + self.children.iter().map(FolderNode::folder_count).sum::<usize>()
    }

    /// Find a node by folder ID anywhere in this subtree.
    pub fn find(&self, id: i64) -> Option<&FolderNode> {
        if self.folder.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// Find a node by folder ID in a forest.
pub fn find_in_forest(forest: &[FolderNode], id: i64) -> Option<&FolderNode> {
    forest.iter().find_map(|n| n.find(id))
}

fn sort_key(folder: &Folder) -> String {
    folder.name.to_lowercase()
}

/// Arrange `folders` into a forest.
///
/// A folder whose parent is not in the list becomes a top-level node, so a
/// user granted on a subfolder but not on its parent still sees it.
pub fn build_forest(
    folders: Vec<Folder>,
    mut files: HashMap<i64, Vec<StoredFile>>,
) -> Vec<FolderNode> {
    let ids: HashSet<i64> = folders.iter().map(|f| f.id).collect();
    let mut by_parent: HashMap<i64, Vec<Folder>> = HashMap::new();
    let mut tops = Vec::new();

    for folder in folders {
        match folder.parent_id {
            Some(parent) if ids.contains(&parent) => {
                by_parent.entry(parent).or_default().push(folder)
            }
            _ => tops.push(folder),
        }
    }

    fn attach(
        folder: Folder,
        by_parent: &mut HashMap<i64, Vec<Folder>>,
        files: &mut HashMap<i64, Vec<StoredFile>>,
    ) -> FolderNode {
        let mut kids = by_parent.remove(&folder.id).unwrap_or_default();
        kids.sort_by_key(sort_key);
        let children = kids
            .into_iter()
            .map(|k| attach(k, by_parent, files))
            .collect();
        let own_files = files.remove(&folder.id).unwrap_or_default();
        FolderNode {
            folder,
            files: own_files,
            children,
        }
    }

    tops.sort_by_key(sort_key);
    tops.into_iter()
        .map(|f| attach(f, &mut by_parent, &mut files))
        .collect()
}

/// Group files by folder ID.
pub fn group_files(files: Vec<StoredFile>) -> HashMap<i64, Vec<StoredFile>> {
    let mut grouped: HashMap<i64, Vec<StoredFile>> = HashMap::new();
    for file in files {
        grouped.entry(file.folder_id).or_default().push(file);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: i64, name: &str, parent_id: Option<i64>) -> Folder {
        Folder {
            id,
            name: name.to_string(),
            path: format!("/{name}"),
            parent_id,
            created_by: None,
            is_public: false,
            created_at: "2024-01-01 00:00:00".to_string(),
            updated_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    fn file(id: i64, folder_id: i64) -> StoredFile {
        StoredFile {
            id,
            folder_id,
            name: format!("f{id}.txt"),
            mime_type: "text/plain".to_string(),
            size: 1,
            stored_name: format!("blob{id}"),
            created_by: None,
            is_public: false,
            created_at: "2024-01-01 00:00:00".to_string(),
            updated_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_build_nested_forest() {
        let folders = vec![
            folder(3, "b", Some(1)),
            folder(1, "Root", None),
            folder(2, "A", Some(1)),
            folder(4, "leaf", Some(2)),
            folder(5, "Other", None),
        ];
        let forest = build_forest(folders, group_files(vec![file(10, 4), file(11, 1)]));

        let tops: Vec<_> = forest.iter().map(|n| n.folder.name.as_str()).collect();
        assert_eq!(tops, vec!["Other", "Root"]);

        let root = &forest[1];
        let kids: Vec<_> = root.children.iter().map(|n| n.folder.id).collect();
        assert_eq!(kids, vec![2, 3]);
        assert_eq!(root.files.len(), 1);
        assert_eq!(root.folder_count(), 4);

        let leaf = find_in_forest(&forest, 4).unwrap();
        assert_eq!(leaf.files[0].id, 10);
        assert!(find_in_forest(&forest, 99).is_none());
    }

    #[test]
    fn test_orphans_become_top_level() {
        // Folder 1 is not visible, so 2 and 4 surface at the top.
        let folders = vec![folder(2, "x", Some(1)), folder(3, "y", Some(2)), folder(4, "z", Some(1))];
        let forest = build_forest(folders, HashMap::new());

        let tops: Vec<_> = forest.iter().map(|n| n.folder.id).collect();
        assert_eq!(tops, vec![2, 4]);
        assert_eq!(forest[0].children[0].folder.id, 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_forest(Vec::new(), HashMap::new()).is_empty());
    }
}

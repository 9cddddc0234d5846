//! Virtual MAP folder tree.
//!
//! Every session owns a tree rooted at an unnamed root with the fixed
//! `telecom/msg` spine. SMS/MMS instances get the standard mailbox folders;
//! email instances mirror the account's folders from the backing store.
//!
//! Nodes live in an arena and refer to each other by [`FolderId`], so parent
//! links carry no ownership.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};
use xml::writer::{EmitterConfig, XmlEvent};

use crate::error::{Error, Result};
use crate::store::MessageStore;

/// Synthetic parent id of the top-level email folders.
pub const EMAIL_ROOT_ID: u64 = 0;

/// Mailbox folders present on every instance.
const MANDATORY_FOLDERS: [&str; 4] = ["inbox", "outbox", "sent", "deleted"];

/// Index of a folder in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FolderId(usize);

#[derive(Debug, Clone)]
struct FolderNode {
    name: String,
    parent: Option<FolderId>,
    children: BTreeMap<String, FolderId>,
    has_sms_mms: bool,
    email_folder_id: Option<u64>,
}

/// Snapshot of a folder handed to the message store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    /// Full path, e.g. `telecom/msg/inbox`.
    pub path: String,
    /// Folder name.
    pub name: String,
    /// Backing email folder, if any.
    pub email_folder_id: Option<u64>,
    /// Whether the folder holds SMS/MMS content.
    pub has_sms_mms: bool,
}

/// In-memory folder tree.
#[derive(Debug, Clone)]
pub struct FolderTree {
    nodes: Vec<FolderNode>,
}

impl Default for FolderTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FolderTree {
    /// Creates a tree holding only the root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![FolderNode {
                name: "root".to_string(),
                parent: None,
                children: BTreeMap::new(),
                has_sms_mms: false,
                email_folder_id: None,
            }],
        }
    }

    /// Builds the tree for the shared SMS/MMS instance.
    #[must_use]
    pub fn for_sms_mms() -> Self {
        let mut tree = Self::new();
        let msg = tree.msg_spine();
        for name in MANDATORY_FOLDERS.iter().chain(&["draft"]) {
            tree.add_with_sms_mms_flag(msg, name);
        }
        tree
    }

    /// Builds the tree for an email account, mirroring the store's folders.
    ///
    /// Recursion stops at `max_depth` levels below `telecom/msg` and at any
    /// folder id seen before; both cases are logged and the branch is cut.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the store while listing folders.
    pub async fn for_email<S: MessageStore>(store: &S, max_depth: usize) -> Result<Self> {
        let mut tree = Self::new();
        let msg = tree.msg_spine();
        for name in MANDATORY_FOLDERS {
            tree.add(msg, name);
        }

        let mut visited = HashSet::from([EMAIL_ROOT_ID]);
        let mut pending = vec![(msg, EMAIL_ROOT_ID, 0_usize)];
        while let Some((node, parent_id, depth)) = pending.pop() {
            if depth >= max_depth {
                warn!(parent_id, depth, "email folder tree too deep, truncating");
                continue;
            }
            for folder in store.email_folders(parent_id).await? {
                if !visited.insert(folder.id) {
                    warn!(folder_id = folder.id, parent_id, "email folder cycle, skipping");
                    continue;
                }
                let child = tree.add_with_email_id(node, &folder.name, folder.id);
                pending.push((child, folder.id, depth + 1));
            }
        }
        debug!(folders = tree.nodes.len(), "built email folder tree");
        Ok(tree)
    }

    fn msg_spine(&mut self) -> FolderId {
        let telecom = self.add(self.root(), "telecom");
        self.add(telecom, "msg")
    }

    /// The root folder.
    #[must_use]
    pub const fn root(&self) -> FolderId {
        FolderId(0)
    }

    /// Adds a child folder, returning the existing one if the name is taken.
    pub fn add(&mut self, parent: FolderId, name: &str) -> FolderId {
        let key = name.to_lowercase();
        if let Some(&existing) = self.nodes[parent.0].children.get(&key) {
            return existing;
        }
        let id = FolderId(self.nodes.len());
        self.nodes.push(FolderNode {
            name: name.to_string(),
            parent: Some(parent),
            children: BTreeMap::new(),
            has_sms_mms: false,
            email_folder_id: None,
        });
        self.nodes[parent.0].children.insert(key, id);
        id
    }

    /// Adds a child folder that holds SMS/MMS content.
    pub fn add_with_sms_mms_flag(&mut self, parent: FolderId, name: &str) -> FolderId {
        let id = self.add(parent, name);
        self.nodes[id.0].has_sms_mms = true;
        id
    }

    /// Adds a child folder backed by an email folder.
    pub fn add_with_email_id(&mut self, parent: FolderId, name: &str, email_id: u64) -> FolderId {
        let id = self.add(parent, name);
        self.nodes[id.0].email_folder_id = Some(email_id);
        id
    }

    /// Looks up a direct child by name, ignoring case.
    #[must_use]
    pub fn child(&self, node: FolderId, name: &str) -> Option<FolderId> {
        self.nodes[node.0].children.get(&name.to_lowercase()).copied()
    }

    /// Parent of a folder; `None` for the root.
    #[must_use]
    pub fn parent(&self, node: FolderId) -> Option<FolderId> {
        self.nodes[node.0].parent
    }

    /// Folder name.
    #[must_use]
    pub fn name(&self, node: FolderId) -> &str {
        &self.nodes[node.0].name
    }

    /// Number of direct children.
    #[must_use]
    pub fn child_count(&self, node: FolderId) -> usize {
        self.nodes[node.0].children.len()
    }

    /// Whether the folder holds SMS/MMS content.
    #[must_use]
    pub fn has_sms_mms(&self, node: FolderId) -> bool {
        self.nodes[node.0].has_sms_mms
    }

    /// Backing email folder id.
    #[must_use]
    pub fn email_folder_id(&self, node: FolderId) -> Option<u64> {
        self.nodes[node.0].email_folder_id
    }

    /// Slash-separated path from below the root; the root itself is `""`.
    #[must_use]
    pub fn full_path(&self, node: FolderId) -> String {
        let mut names = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            names.push(self.name(current));
            current = parent;
        }
        names.reverse();
        names.join("/")
    }

    /// Finds an email-backed folder directly under `telecom/msg`.
    #[must_use]
    pub fn find_email_folder_by_name(&self, name: &str) -> Option<FolderId> {
        let telecom = self.child(self.root(), "telecom")?;
        let msg = self.child(telecom, "msg")?;
        self.child(msg, name)
            .filter(|&id| self.email_folder_id(id).is_some())
    }

    /// Finds the folder backed by an email folder id, depth-first from root.
    #[must_use]
    pub fn find_email_folder_by_id(&self, email_id: u64) -> Option<FolderId> {
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            if self.email_folder_id(node) == Some(email_id) {
                return Some(node);
            }
            stack.extend(self.nodes[node.0].children.values().rev());
        }
        None
    }

    /// Store-facing description of a folder.
    #[must_use]
    pub fn folder_ref(&self, node: FolderId) -> FolderRef {
        FolderRef {
            path: self.full_path(node),
            name: self.name(node).to_string(),
            email_folder_id: self.email_folder_id(node),
            has_sms_mms: self.has_sms_mms(node),
        }
    }

    /// Renders the `x-obex/folder-listing` XML for a window of children.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Range`] if `offset` exceeds the child count.
    pub fn encode_listing(&self, node: FolderId, offset: usize, count: usize) -> Result<Vec<u8>> {
        let children = &self.nodes[node.0].children;
        if offset > children.len() {
            return Err(Error::Range(format!(
                "folder listing offset {offset} beyond {} children",
                children.len()
            )));
        }

        let mut buf = Vec::new();
        let mut writer = EmitterConfig::new()
            .perform_indent(true)
            .create_writer(&mut buf);
        writer.write(XmlEvent::start_element("folder-listing").attr("version", "1.0"))?;
        for &child in children.values().skip(offset).take(count) {
            writer.write(XmlEvent::start_element("folder").attr("name", self.name(child)))?;
            writer.write(XmlEvent::end_element())?;
        }
        writer.write(XmlEvent::end_element())?;
        Ok(buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;

    fn listing_names(xml: &[u8]) -> Vec<String> {
        let text = String::from_utf8(xml.to_vec()).unwrap();
        text.split("<folder name=\"")
            .skip(1)
            .map(|s| s.split('"').next().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_add_is_case_insensitive_and_idempotent() {
        let mut tree = FolderTree::new();
        let root = tree.root();
        let upper = tree.add(root, "INBOX");
        let lower = tree.add(root, "inbox");
        assert_eq!(upper, lower);
        assert_eq!(tree.child_count(root), 1);
        assert_eq!(tree.name(upper), "INBOX");
        assert_eq!(tree.child(root, "Inbox"), Some(upper));
    }

    #[test]
    fn test_root_path_is_empty() {
        let tree = FolderTree::for_sms_mms();
        assert_eq!(tree.full_path(tree.root()), "");
        assert!(tree.parent(tree.root()).is_none());
    }

    #[test]
    fn test_sms_mms_layout() {
        let tree = FolderTree::for_sms_mms();
        let telecom = tree.child(tree.root(), "telecom").unwrap();
        let msg = tree.child(telecom, "msg").unwrap();
        assert_eq!(tree.child_count(msg), 5);

        let inbox = tree.child(msg, "inbox").unwrap();
        assert_eq!(tree.full_path(inbox), "telecom/msg/inbox");
        assert!(tree.has_sms_mms(inbox));
        assert!(tree.child(msg, "draft").is_some());
        assert_eq!(tree.parent(inbox), Some(msg));
    }

    #[test]
    fn test_listing_window() {
        let tree = FolderTree::for_sms_mms();
        let msg = tree
            .child(tree.child(tree.root(), "telecom").unwrap(), "msg")
            .unwrap();

        let all = tree.encode_listing(msg, 0, 1024).unwrap();
        assert_eq!(
            listing_names(&all),
            vec!["deleted", "draft", "inbox", "outbox", "sent"]
        );
        assert!(String::from_utf8(all).unwrap().contains("<folder-listing version=\"1.0\">"));

        let window = tree.encode_listing(msg, 1, 2).unwrap();
        assert_eq!(listing_names(&window), vec!["draft", "inbox"]);

        let tail = tree.encode_listing(msg, 4, 10).unwrap();
        assert_eq!(listing_names(&tail), vec!["sent"]);

        assert!(listing_names(&tree.encode_listing(msg, 0, 0).unwrap()).is_empty());
        assert!(listing_names(&tree.encode_listing(msg, 5, 3).unwrap()).is_empty());
        assert!(matches!(
            tree.encode_listing(msg, 6, 1),
            Err(Error::Range(_))
        ));
    }

    #[test]
    fn test_listing_escapes_names() {
        let mut tree = FolderTree::new();
        let root = tree.root();
        tree.add(root, "a&b");
        let xml = String::from_utf8(tree.encode_listing(root, 0, 10).unwrap()).unwrap();
        assert!(xml.contains("a&amp;b"));
    }

    #[test]
    fn test_email_lookup() {
        let mut tree = FolderTree::new();
        let telecom = tree.add(tree.root(), "telecom");
        let msg = tree.add(telecom, "msg");
        let plain = tree.add(msg, "outbox");
        let inbox = tree.add_with_email_id(msg, "INBOX", 11);
        let nested = tree.add_with_email_id(inbox, "Receipts", 12);

        assert_eq!(tree.find_email_folder_by_name("inbox"), Some(inbox));
        assert_eq!(tree.find_email_folder_by_name("outbox"), None);
        assert_eq!(tree.find_email_folder_by_name("receipts"), None);
        assert_eq!(tree.find_email_folder_by_id(12), Some(nested));
        assert_eq!(tree.find_email_folder_by_id(99), None);
        assert_eq!(tree.email_folder_id(plain), None);

        let folder = tree.folder_ref(nested);
        assert_eq!(folder.path, "telecom/msg/INBOX/Receipts");
        assert_eq!(folder.email_folder_id, Some(12));
        assert!(!folder.has_sms_mms);
    }
}

//! Client-side data model for grouped files, collections and gateway requests.
//!
//! The server is the source of truth for everything in here. These types are
//! what the client caches between refreshes and what it sends back to the
//! gateway when the user mutates something.

pub mod error;
pub mod file_kind;
pub mod normalize;
pub mod search;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use file_kind::FileKind;

/// The reserved group holding the current user's own uploads.
pub const MY_UPLOADS_GROUP: &str = "My Uploads";

/// Opaque, immutable identifier of a file on the server.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        FileId(value.to_string())
    }
}

impl From<String> for FileId {
    fn from(value: String) -> Self {
        FileId(value)
    }
}

/// A single file as the gateway reports it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FileRecord {
    pub id: FileId,
    pub filename: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default, with = "lenient_date")]
    pub upload_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub detail_summary: Option<String>,
}

impl FileRecord {
    /// Classifies the file by its reported type, falling back to the
    /// filename extension when the server sent none or an unknown one.
    pub fn kind(&self) -> FileKind {
        match FileKind::from_file_type(&self.file_type) {
            FileKind::Other => FileKind::from_filename(&self.filename),
            kind => kind,
        }
    }
}

/// A folder: a named partition of files, derived server-side.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Group {
    pub group_name: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

impl Group {
    pub fn is_my_uploads(&self) -> bool {
        self.group_name == MY_UPLOADS_GROUP
    }

    /// The group id that scopes searches and uploads inside this folder.
    ///
    /// Falls back to the group id of an existing file when the group itself
    /// does not report one. `None` for "My Uploads" and for empty shared groups.
    pub fn effective_group_id(&self) -> Option<String> {
        if self.is_my_uploads() {
            return None;
        }
        self.group_id
            .clone()
            .or_else(|| self.files.iter().find_map(|f| f.group_id.clone()))
    }
}

/// Maps user ids to display names. Only used for labels.
pub type KnownUsers = HashMap<String, String>;

/// Resolves an owner id to a display label, falling back to the raw id.
pub fn user_label<'a>(known_users: &'a KnownUsers, owner_id: &'a str) -> &'a str {
    known_users
        .get(owner_id)
        .map(String::as_str)
        .unwrap_or(owner_id)
}

/// The full grouped-file snapshot returned by `list_files`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FileSnapshot {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub known_users: KnownUsers,
}

impl FileSnapshot {
    pub fn find_group(&self, group_name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.group_name == group_name)
    }

    pub fn find_file(&self, id: &FileId) -> Option<&FileRecord> {
        self.groups
            .iter()
            .flat_map(|g| g.files.iter())
            .find(|f| &f.id == id)
    }
}

/// A user-curated, shareable set of file references.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub file_ids: BTreeSet<FileId>,
}

/// A collection with its member files resolved.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CollectionDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

impl CollectionDetail {
    pub fn member_ids(&self) -> BTreeSet<FileId> {
        self.files.iter().map(|f| f.id.clone()).collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<FileRecord>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UploadRequest {
    pub user_id: String,
    pub group_id: Option<String>,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Partial update for a file. Absent fields are left untouched server-side.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewCollection {
    pub name: String,
    pub owner_id: String,
}

/// Local-only narrowing applied on top of cached folder contents.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LocalFilter {
    pub uploader: Option<String>,
    pub kind: file_kind::KindFilter,
    pub tag: Option<String>,
}

impl LocalFilter {
    pub fn is_empty(&self) -> bool {
        self.uploader.is_none() && self.kind == file_kind::KindFilter::All && self.tag.is_none()
    }
}

/// Accepts RFC 3339 timestamps as well as the naive ISO timestamps the
/// backend writes, which carry no offset and are UTC.
mod lenient_date {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
            return Some(date.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_record_accepts_naive_and_missing_dates() {
        let naive: FileRecord = serde_json::from_value(json!({
            "id": "f1",
            "filename": "notes.pdf",
            "upload_date": "2024-03-01T10:15:00.123456"
        }))
        .unwrap();
        assert_eq!(
            naive.upload_date.unwrap().to_rfc3339(),
            "2024-03-01T10:15:00.123456+00:00"
        );

        let missing: FileRecord =
            serde_json::from_value(json!({"id": "f2", "filename": "a.png"})).unwrap();
        assert!(missing.upload_date.is_none());
        assert!(missing.tags.is_empty());
    }

    #[test]
    fn test_unparseable_date_is_dropped_not_rejected() {
        let record: FileRecord = serde_json::from_value(json!({
            "id": "f1",
            "filename": "x.pdf",
            "upload_date": "yesterday"
        }))
        .unwrap();
        assert!(record.upload_date.is_none());
    }

    #[test]
    fn test_kind_falls_back_to_extension() {
        let record: FileRecord = serde_json::from_value(json!({
            "id": "f1",
            "filename": "scan.PNG"
        }))
        .unwrap();
        assert_eq!(record.kind(), FileKind::Image);

        let record: FileRecord = serde_json::from_value(json!({
            "id": "f2",
            "filename": "notes.png",
            "file_type": "pdf"
        }))
        .unwrap();
        assert_eq!(record.kind(), FileKind::Pdf);
    }

    #[test]
    fn test_effective_group_id_inference() {
        let file = |group: Option<&str>| FileRecord {
            id: FileId::from("f"),
            filename: "f.pdf".into(),
            file_type: "pdf".into(),
            tags: vec![],
            owner_id: "u1".into(),
            group_id: group.map(str::to_string),
            upload_date: None,
            url: String::new(),
            detail_summary: None,
        };

        let shared = Group {
            group_name: "CS101".into(),
            group_id: None,
            files: vec![file(None), file(Some("g-cs101"))],
        };
        assert_eq!(shared.effective_group_id().as_deref(), Some("g-cs101"));

        let empty = Group {
            group_name: "Empty".into(),
            group_id: None,
            files: vec![],
        };
        assert_eq!(empty.effective_group_id(), None);

        let mine = Group {
            group_name: MY_UPLOADS_GROUP.into(),
            group_id: None,
            files: vec![file(Some("g-other"))],
        };
        assert_eq!(mine.effective_group_id(), None);
    }

    #[test]
    fn test_search_request_omits_absent_scopes() {
        let request = SearchRequest {
            query: "calculus".into(),
            user_id: "u1".into(),
            group_id: None,
            owner_id: Some("u2".into()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"query": "calculus", "user_id": "u1", "owner_id": "u2"})
        );
    }

    #[test]
    fn test_user_label_falls_back_to_id() {
        let mut users = KnownUsers::new();
        users.insert("u1".into(), "Aom".into());
        assert_eq!(user_label(&users, "u1"), "Aom");
        assert_eq!(user_label(&users, "u9"), "u9");
    }
}

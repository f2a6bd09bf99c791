//! Adds a selection of files to a collection without introducing duplicates.
//!
//! The merge always reads the collection's membership from the gateway, takes
//! the set union with the selection and writes the union back as a full
//! replacement. Running the same merge twice converges to the same set.
//! Concurrent edits between the read and the write are not detected; the last
//! write wins.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::core::error::ClientError;
use crate::core::FileId;
use crate::gateway::{GatewayError, RemoteGateway};

/// Outcome of a successful merge.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct MergeReport {
    pub collection_id: String,
    pub collection_name: String,
    /// Ids that were not members before the merge.
    pub added: usize,
    /// Membership size after the merge.
    pub total: usize,
}

impl MergeReport {
    pub fn message(&self) -> String {
        match self.added {
            0 => format!(
                "All selected files were already in \"{}\"",
                self.collection_name
            ),
            1 => format!("1 new file added to \"{}\"", self.collection_name),
            n => format!("{} new files added to \"{}\"", n, self.collection_name),
        }
    }
}

/// The set union of the current membership and the selection.
pub fn merged_membership(
    existing: &BTreeSet<FileId>,
    selection: &BTreeSet<FileId>,
) -> BTreeSet<FileId> {
    existing.union(selection).cloned().collect()
}

/// Fetch, union and replace the membership of `collection_id`.
pub async fn merge_into(
    gateway: &dyn RemoteGateway,
    collection_id: &str,
    selection: &BTreeSet<FileId>,
) -> Result<MergeReport, ClientError> {
    if selection.is_empty() {
        return Err(ClientError::validation("No files are selected"));
    }

    let detail = gateway
        .get_collection_detail(collection_id)
        .await
        .map_err(|e| stale_collection(e, collection_id))?;
    let existing = detail.member_ids();
    let merged = merged_membership(&existing, selection);

    tracing::info!(
        "Merging {} selected files into collection {} ({} existing members)",
        selection.len(),
        collection_id,
        existing.len()
    );

    gateway
        .replace_collection_files(collection_id, &merged)
        .await
        .map_err(|e| stale_collection(e, collection_id))?;

    Ok(MergeReport {
        collection_id: collection_id.to_string(),
        collection_name: detail.name,
        added: merged.len() - existing.len(),
        total: merged.len(),
    })
}

fn stale_collection(error: GatewayError, collection_id: &str) -> ClientError {
    match error {
        GatewayError::NotFound(_) => ClientError::StaleReference {
            kind: "Collection",
            name: collection_id.to_string(),
        },
        other => ClientError::Network(other),
    }
}

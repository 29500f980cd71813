use mongodb::bson::{oid::ObjectId, spec::BinarySubtype, Binary};
use serde::{Deserialize, Serialize};

/// A content entry freshly fetched from the fabric during one pass, not yet
/// reconciled against storage. Lives only for the duration of that pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentObject {
    pub object_id: String,
    pub object_name: String,
    pub display_title: String,
    pub version_hash: String,
    pub image: Option<Vec<u8>>,
    pub copyright: Option<String>,
    pub creator: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<String>,
    pub synopsis: Option<String>,
}

/// Durable counterpart of a [`ContentObject`], resident in the `catalogs`
/// collection. `object_id` is the join key across passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub object_id: String,
    pub object_name: String,
    pub display_title: String,
    pub version_hash: String,
    pub image: Option<Binary>,
    pub copyright: Option<String>,
    pub creator: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<String>,
    pub synopsis: Option<String>,
}

impl From<ContentObject> for CatalogRecord {
    fn from(candidate: ContentObject) -> Self {
        Self {
            id: None,
            object_id: candidate.object_id,
            object_name: candidate.object_name,
            display_title: candidate.display_title,
            version_hash: candidate.version_hash,
            image: candidate.image.map(binary_from_bytes),
            copyright: candidate.copyright,
            creator: candidate.creator,
            release_date: candidate.release_date,
            runtime: candidate.runtime,
            synopsis: candidate.synopsis,
        }
    }
}

impl CatalogRecord {
    /// Stage candidate fields onto this record, field by field. A field
    /// counts as changed only when this record already defines it and the
    /// values differ; `Option` fields that are `None` here are never
    /// overwritten. Returns whether anything was staged.
    pub fn apply_candidate(&mut self, candidate: &ContentObject) -> bool {
        let mut changed = false;

        if self.object_name != candidate.object_name {
            self.object_name = candidate.object_name.clone();
            changed = true;
        }
        if self.display_title != candidate.display_title {
            self.display_title = candidate.display_title.clone();
            changed = true;
        }
        if self.version_hash != candidate.version_hash {
            self.version_hash = candidate.version_hash.clone();
            changed = true;
        }

        if self.image.is_some()
            && self.image.as_ref().map(|b| b.bytes.as_slice()) != candidate.image.as_deref()
        {
            self.image = candidate.image.clone().map(binary_from_bytes);
            changed = true;
        }

        changed |= stage_defined(&mut self.copyright, &candidate.copyright);
        changed |= stage_defined(&mut self.creator, &candidate.creator);
        changed |= stage_defined(&mut self.release_date, &candidate.release_date);
        changed |= stage_defined(&mut self.runtime, &candidate.runtime);
        changed |= stage_defined(&mut self.synopsis, &candidate.synopsis);

        changed
    }
}

/// Overwrite `existing` with the candidate value only when `existing` is
/// defined and differs. Returns whether it was overwritten.
fn stage_defined(existing: &mut Option<String>, candidate: &Option<String>) -> bool {
    if existing.is_some() && existing != candidate {
        *existing = candidate.clone();
        true
    } else {
        false
    }
}

fn binary_from_bytes(bytes: Vec<u8>) -> Binary {
    Binary {
        subtype: BinarySubtype::Generic,
        bytes,
    }
}

//! Upload schemas and table-to-schema resolution
//!
//! A schema describes the columns of one remote data table. The only
//! property the packager cares about is which columns are attachment-typed:
//! their cell values are remote file-handle IDs rather than scalars, and
//! drive the bulk attachment download and CSV rewrite.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Set of remote table ids carrying survey metadata for a study
pub type SurveyTableSet = BTreeSet<String>;

/// Identifier for one revision of an upload schema
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaKey {
    /// Study the schema belongs to
    pub study_id: String,
    /// Schema identifier within the study
    pub schema_id: String,
    /// Schema revision, higher is newer
    pub revision: i32,
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-v{}", self.study_id, self.schema_id, self.revision)
    }
}

/// Column types a schema field can take
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    /// Opaque binary attachment; cell values are file-handle IDs
    AttachmentBlob,
    /// CSV attachment; cell values are file-handle IDs
    AttachmentCsv,
    /// JSON blob attachment; cell values are file-handle IDs
    AttachmentJsonBlob,
    /// JSON table attachment; cell values are file-handle IDs
    AttachmentJsonTable,
    /// Boolean scalar
    Boolean,
    /// Calendar date scalar (no time zone)
    CalendarDate,
    /// Floating-point scalar
    Float,
    /// Integer scalar
    Int,
    /// String scalar
    String,
    /// Timestamp scalar
    Timestamp,
}

impl FieldType {
    /// Whether cell values of this type are remote file-handle IDs
    pub fn is_attachment(self) -> bool {
        matches!(
            self,
            FieldType::AttachmentBlob
                | FieldType::AttachmentCsv
                | FieldType::AttachmentJsonBlob
                | FieldType::AttachmentJsonTable
        )
    }
}

/// One named, typed column of an upload schema
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Column name as it appears in the exported CSV header
    pub name: String,
    /// Column type
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Schema for one remote data table: an identifier plus an ordered field list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSchema {
    /// Schema identifier
    pub key: SchemaKey,
    /// Ordered column definitions
    pub fields: Vec<FieldDefinition>,
}

impl UploadSchema {
    /// Names of all attachment-typed fields
    pub fn attachment_field_names(&self) -> HashSet<&str> {
        self.fields
            .iter()
            .filter(|field| field.field_type.is_attachment())
            .map(|field| field.name.as_str())
            .collect()
    }

    /// Whether the schema declares any attachment-typed field
    pub fn has_attachment_fields(&self) -> bool {
        self.fields
            .iter()
            .any(|field| field.field_type.is_attachment())
    }
}

/// Mapping from remote table id to the schema that describes it.
///
/// Several schema revisions may be backed by the same remote table; the
/// highest revision wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableMapping {
    tables: BTreeMap<String, UploadSchema>,
}

impl TableMapping {
    /// Empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema for a table. If the table already has a schema,
    /// the one with the higher revision is kept.
    pub fn insert(&mut self, table_id: impl Into<String>, schema: UploadSchema) {
        let table_id = table_id.into();
        match self.tables.get(&table_id) {
            Some(existing) if existing.key.revision >= schema.key.revision => {}
            _ => {
                self.tables.insert(table_id, schema);
            }
        }
    }

    /// Schema for a table, if registered
    pub fn get(&self, table_id: &str) -> Option<&UploadSchema> {
        self.tables.get(table_id)
    }

    /// Iterate tables in id order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &UploadSchema)> {
        self.tables.iter()
    }

    /// Number of mapped tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no tables are mapped
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/*!
 * Source records and dataset loading.
 *
 * A dataset is an ordered collection of records with unique integer ids.
 * Each record carries either a single plain text or a set of named fields
 * (for bilingual corpora, e.g. an Arabic original next to an English
 * rendering). The loaded `SourceSet` is the source of truth for a run and
 * never changes afterwards.
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

use crate::errors::DatasetError;

/// Text to translate for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RecordPayload {
    /// A single text
    Plain(String),
    /// Named fields in document order
    Structured(Vec<PayloadField>),
}

/// One named field of a structured payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadField {
    pub name: String,
    pub text: String,
}

impl RecordPayload {
    /// Whether the payload has nothing to translate
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Plain(text) => text.trim().is_empty(),
            Self::Structured(fields) => fields.iter().all(|f| f.text.trim().is_empty()),
        }
    }
}

/// One input unit of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub payload: RecordPayload,
}

impl Record {
    /// Create a record with a plain text payload
    pub fn plain(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            payload: RecordPayload::Plain(text.into()),
        }
    }

    /// Create a record with named fields
    pub fn structured<N, T>(id: u64, fields: impl IntoIterator<Item = (N, T)>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            id,
            payload: RecordPayload::Structured(
                fields
                    .into_iter()
                    .map(|(name, text)| PayloadField {
                        name: name.into(),
                        text: text.into(),
                    })
                    .collect(),
            ),
        }
    }
}

/// The validated, ordered source-of-truth record set
#[derive(Debug, Clone)]
pub struct SourceSet {
    records: Vec<Record>,
    positions: HashMap<u64, usize>,
}

impl SourceSet {
    /// Build a source set, rejecting an empty set, duplicate ids and empty payloads
    pub fn new(records: Vec<Record>) -> Result<Self, DatasetError> {
        if records.is_empty() {
            return Err(DatasetError::NoRecords("dataset contains no records".to_string()));
        }
        let mut positions = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if record.payload.is_empty() {
                return Err(DatasetError::EmptyPayload(record.id));
            }
            if positions.insert(record.id, position).is_some() {
                return Err(DatasetError::DuplicateId(record.id));
            }
        }
        Ok(Self { records, positions })
    }

    /// Load a dataset file.
    ///
    /// `records_key` names the field holding the record array when the
    /// document is an object; without it, the only array-valued field is used.
    pub fn load<P: AsRef<Path>>(path: P, records_key: Option<&str>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content, records_key)
    }

    /// Parse a dataset from its JSON text
    pub fn from_json_str(content: &str, records_key: Option<&str>) -> Result<Self, DatasetError> {
        let document: Value = serde_json::from_str(content)?;
        let items = locate_records(&document, records_key)?;

        let records = items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_record(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(records)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.positions.contains_key(&id)
    }

    /// Position of a record in source order
    pub fn position(&self, id: u64) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// SHA-256 over ids and payloads, used to tie persisted batches to their input
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            hasher.update(record.id.to_le_bytes());
            match &record.payload {
                RecordPayload::Plain(text) => {
                    hasher.update(b"P");
                    hasher.update(text.as_bytes());
                }
                RecordPayload::Structured(fields) => {
                    hasher.update(b"S");
                    for field in fields {
                        hasher.update(field.name.as_bytes());
                        hasher.update([0u8]);
                        hasher.update(field.text.as_bytes());
                        hasher.update([0u8]);
                    }
                }
            }
            hasher.update([0xffu8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

fn locate_records<'a>(
    document: &'a Value,
    records_key: Option<&str>,
) -> Result<&'a Vec<Value>, DatasetError> {
    match document {
        Value::Array(items) => Ok(items),
        Value::Object(map) => {
            if let Some(key) = records_key {
                return map
                    .get(key)
                    .and_then(Value::as_array)
                    .ok_or_else(|| DatasetError::NoRecords(format!("no array under key '{}'", key)));
            }

            let mut arrays = map.iter().filter_map(|(k, v)| v.as_array().map(|a| (k, a)));
            match (arrays.next(), arrays.next()) {
                (Some((_, items)), None) => Ok(items),
                (None, _) => Err(DatasetError::NoRecords("document has no array field".to_string())),
                (Some((first, _)), Some((second, _))) => Err(DatasetError::NoRecords(format!(
                    "ambiguous record array ('{}', '{}', ...); set output.records_key",
                    first, second
                ))),
            }
        }
        _ => Err(DatasetError::NoRecords("document is neither an array nor an object".to_string())),
    }
}

fn parse_record(index: usize, item: &Value) -> Result<Record, DatasetError> {
    let object = item.as_object().ok_or(DatasetError::NotAnObject { index })?;
    let id_value = object.get("id").ok_or(DatasetError::MissingId { index })?;
    let id = id_value.as_u64().ok_or_else(|| DatasetError::InvalidId {
        index,
        value: id_value.to_string(),
    })?;

    let fields: Vec<PayloadField> = object
        .iter()
        .filter(|(name, _)| name.as_str() != "id")
        .filter_map(|(name, value)| {
            flatten_value(value).map(|text| PayloadField {
                name: name.clone(),
                text,
            })
        })
        .collect();

    let payload = match fields.as_slice() {
        [only] if only.name == "text" => RecordPayload::Plain(only.text.clone()),
        _ => RecordPayload::Structured(fields),
    };

    Ok(Record { id, payload })
}

/// Nested objects are joined into one line: `{"narrator": "A", "text": "B"}` becomes `A B`
fn flatten_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => {
            let joined = join_object(map);
            if joined.is_empty() { None } else { Some(joined) }
        }
        _ => None,
    }
}

fn join_object(map: &Map<String, Value>) -> String {
    map.values()
        .filter_map(flatten_value)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

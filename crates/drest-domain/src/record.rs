use serde_json::{Map, Value};

use crate::id::RecordId;
use crate::payload::embedded_identity;

const ID_FIELD: &str = "id";

/// Fields starting with `_` (such as `_meta`) are bookkeeping, never sent back.
pub fn is_public_field(key: &str) -> bool {
    !key.starts_with('_')
}

/// Field values of one record plus the snapshot they were last loaded with.
#[derive(Debug, Clone, Default)]
pub struct RecordState {
    data: Map<String, Value>,
    clean: Map<String, Value>,
    id: Option<RecordId>,
}

impl RecordState {
    /// A record nobody has saved yet; every field counts as changed.
    pub fn unsaved(data: Map<String, Value>) -> Self {
        let id = data.get(ID_FIELD).and_then(RecordId::from_value);
        Self {
            data,
            clean: Map::new(),
            id,
        }
    }

    /// A record as read from the server.
    pub fn loaded(data: Map<String, Value>) -> Self {
        let mut state = Self::default();
        state.load(data);
        state
    }

    /// Merges server data in and marks the result clean.
    ///
    /// The id is read from the merged fields, so a partial answer keeps a known id.
    pub fn load(&mut self, data: Map<String, Value>) {
        for (key, value) in data {
            self.data.insert(key, value);
        }
        let id = self
            .data
            .get("_meta")
            .and_then(|meta| meta.get(ID_FIELD))
            .or_else(|| self.data.get(ID_FIELD))
            .and_then(RecordId::from_value);
        if let Some(id) = &id {
            self.data
                .entry(ID_FIELD.to_string())
                .or_insert_with(|| id.to_value());
        }
        self.clean = self.public_data();
        self.id = id;
    }

    pub fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    /// Drops the id after the server deleted the record.
    pub fn forget_id(&mut self) {
        self.id = None;
        self.data.remove(ID_FIELD);
        self.clean.remove(ID_FIELD);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        if field == ID_FIELD {
            self.id = RecordId::from_value(&value);
        }
        self.data.insert(field.to_string(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            self.id = None;
        }
        self.clean.remove(field);
        self.data.remove(field)
    }

    /// All fields, including bookkeeping ones.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn public_data(&self) -> Map<String, Value> {
        self.data
            .iter()
            .filter(|(key, _)| is_public_field(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Public fields that are new or differ from the loaded snapshot.
    pub fn diff(&self) -> Map<String, Value> {
        self.data
            .iter()
            .filter(|(key, value)| {
                is_public_field(key) && self.clean.get(key.as_str()) != Some(*value)
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.diff().is_empty()
    }

    /// Body for the next save, or `None` when there is nothing to send.
    pub fn save_payload(&self) -> Option<Value> {
        let data = if self.id.is_none() {
            self.public_data()
        } else {
            self.diff()
        };
        if data.is_empty() {
            return None;
        }
        Some(Value::Object(serialize(data)))
    }
}

impl PartialEq for RecordState {
    fn eq(&self, other: &Self) -> bool {
        self.public_data() == other.public_data()
    }
}

/// Replaces embedded records by their ids, also inside arrays.
pub fn serialize(mut data: Map<String, Value>) -> Map<String, Value> {
    for value in data.values_mut() {
        match value {
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Some((_, id)) = embedded_identity(item) {
                        *item = id.to_value();
                    }
                }
            }
            other => {
                if let Some((_, id)) = embedded_identity(other) {
                    *other = id.to_value();
                }
            }
        }
    }
    data
}

use std::fmt;

use drest_domain::{unpack, RecordId, RecordState};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DrestError, Result};
use crate::resource::Resource;
use crate::transport::Method;

/// One record of a resource, with change tracking.
///
/// Field edits stay local until [`Record::save`], which POSTs new records and
/// PATCHes only the changed fields of existing ones.
#[derive(Clone, Debug)]
pub struct Record {
    resource: Resource,
    state: RecordState,
}

impl Record {
    pub(crate) fn loaded(resource: Resource, fields: Map<String, Value>) -> Self {
        Self {
            resource,
            state: RecordState::loaded(fields),
        }
    }

    pub(crate) fn unsaved(resource: Resource, fields: Map<String, Value>) -> Self {
        Self {
            resource,
            state: RecordState::unsaved(fields),
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn id(&self) -> Option<&RecordId> {
        self.state.id()
    }

    pub fn is_new(&self) -> bool {
        self.state.id().is_none()
    }

    pub fn is_dirty(&self) -> bool {
        self.is_new() || self.state.is_dirty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.state.get(field)
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.state.set(field, value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.state.remove(field)
    }

    /// Public fields, without bookkeeping keys such as `_meta`.
    pub fn data(&self) -> Map<String, Value> {
        self.state.public_data()
    }

    pub fn raw(&self) -> &Map<String, Value> {
        self.state.raw()
    }

    /// Sends pending changes. Nothing is sent when there are none.
    ///
    /// # Errors
    /// Returns the API error when the server rejects the payload.
    pub fn save(&mut self) -> Result<()> {
        let Some(payload) = self.state.save_payload() else {
            debug!(record = %self, "nothing to save");
            return Ok(());
        };
        let id = self.state.id().cloned();
        let method = if id.is_some() {
            Method::Patch
        } else {
            Method::Post
        };
        let response = self
            .resource
            .request(method, id.as_ref(), &[], Some(payload))?;
        self.absorb(response);
        Ok(())
    }

    /// Re-reads the record from the server.
    ///
    /// # Errors
    /// Returns [`DrestError::DoesNotExist`] for records without id, or the API error.
    pub fn reload(&mut self) -> Result<()> {
        let id = self.require_id()?;
        let response = self.resource.request(Method::Get, Some(&id), &[], None)?;
        self.absorb(response);
        Ok(())
    }

    /// Deletes the record on the server and forgets its id.
    ///
    /// # Errors
    /// Returns [`DrestError::DoesNotExist`] for records without id, or the API error.
    pub fn delete(&mut self) -> Result<()> {
        let id = self.require_id()?;
        self.resource.request(Method::Delete, Some(&id), &[], None)?;
        self.state.forget_id();
        Ok(())
    }

    /// The embedded object at `field` as a record.
    ///
    /// Objects typed with `_meta` belong to that resource, others to the resource
    /// named like the field.
    pub fn related(&self, field: &str) -> Option<Record> {
        let value = self.state.get(field)?;
        if !value.is_object() {
            return None;
        }
        self.resource
            .client()
            .resource(field)
            .load_record(value.clone())
    }

    /// Like [`Record::related`] for arrays of embedded objects. Bare ids are skipped.
    pub fn related_many(&self, field: &str) -> Vec<Record> {
        let Some(Value::Array(items)) = self.state.get(field) else {
            return Vec::new();
        };
        let resource = self.resource.client().resource(field);
        items
            .iter()
            .filter(|item| item.is_object())
            .filter_map(|item| resource.load_record(item.clone()))
            .collect()
    }

    fn require_id(&self) -> Result<RecordId> {
        self.state
            .id()
            .cloned()
            .ok_or_else(|| DrestError::DoesNotExist {
                url: self.resource.path(None),
            })
    }

    fn absorb(&mut self, response: Value) {
        match unpack(self.resource.name(), response) {
            Value::Object(fields) => self.state.load(fields),
            _ => self.state.load(Map::new()),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{}.{id}", self.resource.name()),
            None => write!(f, "{}.", self.resource.name()),
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

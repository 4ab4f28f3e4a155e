use std::fmt;

use drest_domain::{embedded_identity, RecordId};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::client::DrestClient;
use crate::error::{DrestError, Result};
use crate::query::{Query, QueryIter};
use crate::record::Record;
use crate::transport::Method;

/// A single resource of a DREST API, such as `users`.
///
/// Reading methods (`filter`, `get`, `list`, ...) start a fresh [`Query`].
#[derive(Clone, Debug)]
pub struct Resource {
    client: DrestClient,
    name: String,
}

impl Resource {
    pub(crate) fn new(client: DrestClient, name: &str) -> Self {
        Self {
            client,
            name: name.to_ascii_lowercase(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &DrestClient {
        &self.client
    }

    pub(crate) fn path(&self, id: Option<&RecordId>) -> String {
        let mut path = match id {
            Some(id) => format!("{}/{id}", self.name),
            None => self.name.clone(),
        };
        if self.client.trailing_slash() {
            path.push('/');
        }
        path
    }

    /// Performs a request against this resource, or one of its records when `id` is set.
    ///
    /// # Errors
    /// See [`DrestClient::request`].
    pub fn request(
        &self,
        method: Method,
        id: Option<&RecordId>,
        params: &[(String, String)],
        data: Option<Value>,
    ) -> Result<Value> {
        self.client.request(method, &self.path(id), params, data)
    }

    /// Turns an unpacked payload into records.
    ///
    /// Arrays load element-wise; values that are not objects are skipped.
    pub fn load(&self, data: Value) -> Vec<Record> {
        match data {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| self.load_record(item))
                .collect(),
            other => self.load_record(other).into_iter().collect(),
        }
    }

    /// Loads one object. Embedded objects typed for another resource are attached to it.
    pub fn load_record(&self, data: Value) -> Option<Record> {
        let identity = embedded_identity(&data);
        let Value::Object(mut fields) = data else {
            return None;
        };
        let Some((kind, id)) = identity else {
            return Some(Record::loaded(self.clone(), fields));
        };
        fields.insert("id".to_string(), id.to_value());
        let resource = if kind == self.name {
            self.clone()
        } else {
            self.client.resource(&kind)
        };
        Some(Record::loaded(resource, fields))
    }

    /// A record that exists only locally until [`Record::save`] is called.
    ///
    /// # Errors
    /// Returns an error when `data` is not a JSON object.
    pub fn new_record(&self, data: Value) -> Result<Record> {
        Ok(Record::unsaved(self.clone(), object_fields(data)?))
    }

    /// Creates and saves a record.
    ///
    /// # Errors
    /// Returns an error when `data` is not an object or the server rejects it.
    pub fn create(&self, data: Value) -> Result<Record> {
        let mut record = self.new_record(data)?;
        record.save()?;
        Ok(record)
    }

    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    pub fn all(&self) -> Query {
        self.query()
    }

    pub fn filter(&self, key: &str, value: impl Into<Value>) -> Query {
        self.query().filter(key, value)
    }

    pub fn exclude(&self, key: &str, value: impl Into<Value>) -> Query {
        self.query().exclude(key, value)
    }

    pub fn including<I, S>(&self, fields: I) -> Query
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query().including(fields)
    }

    pub fn excluding<I, S>(&self, fields: I) -> Query
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query().excluding(fields)
    }

    pub fn sort<I, S>(&self, fields: I) -> Query
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query().sort(fields)
    }

    pub fn extra(&self, key: &str, value: impl Into<Value>) -> Query {
        self.query().extra(key, value)
    }

    /// # Errors
    /// See [`Query::get`].
    pub fn get(&self, id: impl Into<RecordId>) -> Result<Record> {
        self.query().get(id)
    }

    /// # Errors
    /// See [`Query::first`].
    pub fn first(&self) -> Result<Option<Record>> {
        self.query().first()
    }

    /// # Errors
    /// See [`Query::list`].
    pub fn list(&self) -> Result<Vec<Record>> {
        self.query().list()
    }

    /// # Errors
    /// See [`Query::map`].
    pub fn map(&self, field: &str) -> Result<IndexMap<String, Record>> {
        self.query().map(field)
    }

    /// # Errors
    /// See [`Query::count`].
    pub fn count(&self) -> Result<u64> {
        self.query().count()
    }

    pub fn iter(&self) -> QueryIter {
        self.query().iter()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn object_fields(data: Value) -> Result<Map<String, Value>> {
    match data {
        Value::Object(fields) => Ok(fields),
        Value::Null => Ok(Map::new()),
        other => Err(DrestError::InvalidData(format!(
            "record data must be a JSON object, got {other}"
        ))),
    }
}

use std::collections::VecDeque;

use drest_domain::{unpack, PageMeta, QuerySpec, RecordId, PAGE_PARAM, PER_PAGE_PARAM};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{DrestError, Result};
use crate::record::Record;
use crate::resource::Resource;
use crate::transport::Method;

/// A lazily evaluated read of one resource.
///
/// Builder steps return a new query; nothing is sent until records are consumed.
#[derive(Clone, Debug)]
pub struct Query {
    resource: Resource,
    spec: QuerySpec,
}

impl Query {
    pub(crate) fn new(resource: Resource) -> Self {
        Self {
            resource,
            spec: QuerySpec::new(),
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    #[must_use]
    pub fn all(self) -> Self {
        self
    }

    #[must_use]
    pub fn filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.spec = self.spec.filter(key, value);
        self
    }

    #[must_use]
    pub fn exclude(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.spec = self.spec.exclude(key, value);
        self
    }

    #[must_use]
    pub fn including<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec = self.spec.including(fields);
        self
    }

    #[must_use]
    pub fn excluding<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec = self.spec.excluding(fields);
        self
    }

    #[must_use]
    pub fn sort<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec = self.spec.sort(fields);
        self
    }

    #[must_use]
    pub fn extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.spec = self.spec.extra(key, value);
        self
    }

    /// Iterates over every matching record, fetching pages on demand.
    pub fn iter(&self) -> QueryIter {
        QueryIter::new(self.clone())
    }

    /// # Errors
    /// Returns the first error raised while fetching pages.
    pub fn list(&self) -> Result<Vec<Record>> {
        self.iter().collect()
    }

    /// The first matching record, fetched as a one-element page.
    ///
    /// # Errors
    /// Returns an error when the request fails.
    pub fn first(&self) -> Result<Option<Record>> {
        if let Some(mocks) = self.mocks() {
            return Ok(self.resource.load(Value::Array(mocks.to_vec())).into_iter().next());
        }
        let single = self.spec.clone().extra(PER_PAGE_PARAM, 1);
        let page = requested_page(&self.spec).unwrap_or(1);
        let (records, _) = self.fetch_page(&single, page)?;
        Ok(records.into_iter().next())
    }

    /// Reads one record by id, honoring the query's included and excluded fields.
    ///
    /// # Errors
    /// Returns [`DrestError::DoesNotExist`] when the server (or the mock table) has no
    /// such record.
    pub fn get(&self, id: impl Into<RecordId>) -> Result<Record> {
        let id = id.into();
        if let Some(mocks) = self.mocks() {
            debug!(resource = %self.resource, %id, "serving record from mocks");
            return self
                .resource
                .load(Value::Array(mocks.to_vec()))
                .into_iter()
                .find(|record| record.id() == Some(&id))
                .ok_or_else(|| DrestError::DoesNotExist {
                    url: self.resource.path(Some(&id)),
                });
        }
        let response = self.resource.request(
            Method::Get,
            Some(&id),
            &self.spec.field_params(),
            None,
        )?;
        self.resource
            .load_record(unpack(self.resource.name(), response))
            .ok_or_else(|| DrestError::InvalidResponse {
                url: self.resource.path(Some(&id)),
                message: "expected a record object".into(),
            })
    }

    /// Indexes matching records by `field`, in server order. Pass `"id"` to key by id.
    ///
    /// # Errors
    /// Returns [`DrestError::MissingField`] when a record lacks `field`.
    pub fn map(&self, field: &str) -> Result<IndexMap<String, Record>> {
        let mut mapped = IndexMap::new();
        for record in self.iter() {
            let record = record?;
            let key = match record.get(field) {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => {
                    return Err(DrestError::MissingField {
                        record: record.to_string(),
                        field: field.to_string(),
                    })
                }
                Some(other) => other.to_string(),
            };
            mapped.insert(key, record);
        }
        Ok(mapped)
    }

    /// Number of matching records, taken from `meta.total_results` when the server reports it.
    ///
    /// # Errors
    /// Returns an error when a request fails.
    pub fn count(&self) -> Result<u64> {
        if let Some(mocks) = self.mocks() {
            let loaded = self.resource.load(Value::Array(mocks.to_vec()));
            return Ok(loaded.len() as u64);
        }
        let single = self.spec.clone().extra(PER_PAGE_PARAM, 1);
        let (_, meta) = self.fetch_page(&single, 1)?;
        match meta.total_results {
            Some(total) => Ok(total),
            None => Ok(self.list()?.len() as u64),
        }
    }

    fn mocks(&self) -> Option<&[Value]> {
        self.resource.client().mock_records(self.resource.name())
    }

    fn fetch_page(&self, spec: &QuerySpec, page: u64) -> Result<(Vec<Record>, PageMeta)> {
        let params = spec.to_params(Some(page));
        let response = self.resource.request(Method::Get, None, &params, None)?;
        let meta = PageMeta::from_envelope(&response);
        let records = self.resource.load(unpack(self.resource.name(), response));
        debug!(
            resource = %self.resource,
            page,
            total_pages = ?meta.total_pages,
            records = records.len(),
            "fetched page"
        );
        Ok((records, meta))
    }
}

/// Page number given through an explicit `page` extra.
fn requested_page(spec: &QuerySpec) -> Option<u64> {
    spec.extra_value(PAGE_PARAM).and_then(|value| match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    })
}

impl IntoIterator for &Query {
    type Item = Result<Record>;
    type IntoIter = QueryIter;

    fn into_iter(self) -> QueryIter {
        self.iter()
    }
}

/// Page-by-page iterator over the records of a [`Query`].
///
/// A query carrying an explicit `page` parameter reads that page only.
#[derive(Debug)]
pub struct QueryIter {
    query: Query,
    next_page: u64,
    single_page: bool,
    total_pages: Option<u64>,
    buffer: VecDeque<Record>,
    done: bool,
}

impl QueryIter {
    fn new(query: Query) -> Self {
        let requested = requested_page(&query.spec);
        Self {
            query,
            next_page: requested.unwrap_or(1),
            single_page: requested.is_some(),
            total_pages: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn exhausted(&self) -> bool {
        match self.total_pages {
            Some(_) if self.single_page => true,
            Some(total) => self.next_page > total,
            None => false,
        }
    }
}

impl Iterator for QueryIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            if let Some(mocks) = self.query.mocks() {
                debug!(resource = %self.query.resource, "serving query from mocks");
                let records = self.query.resource.load(Value::Array(mocks.to_vec()));
                self.buffer.extend(records);
                self.done = true;
                continue;
            }
            if self.exhausted() {
                self.done = true;
                return None;
            }
            match self.query.fetch_page(&self.query.spec, self.next_page) {
                Ok((records, meta)) => {
                    self.total_pages = Some(meta.total_pages.unwrap_or(1));
                    if records.is_empty() {
                        self.done = true;
                    }
                    self.buffer.extend(records);
                    self.next_page += 1;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scripted_client, ScriptedTransport};
    use crate::DrestClient;
    use serde_json::json;
    use std::sync::Arc;

    fn page(records: Value, page: u64, total_pages: u64, total_results: u64) -> Value {
        json!({
            "users": records,
            "meta": {
                "page": page,
                "per_page": 1,
                "total_pages": total_pages,
                "total_results": total_results,
            },
        })
    }

    fn query_of(transport: &Arc<ScriptedTransport>) -> Query {
        scripted_client(transport).resource("users").query()
    }

    fn sent_pairs(transport: &ScriptedTransport, index: usize) -> Vec<(String, String)> {
        transport.requests()[index]
            .url
            .query_pairs()
            .into_owned()
            .collect()
    }

    #[test]
    fn iteration_walks_every_page() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, page(json!([{"id": 1}]), 1, 2, 2));
        transport.push_json(200, page(json!([{"id": 2}]), 2, 2, 2));
        let records = query_of(&transport).extra("per_page", 1).list().unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id().unwrap().to_string()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(transport.requests().len(), 2);
        assert!(sent_pairs(&transport, 1).contains(&("page".into(), "2".into())));
    }

    #[test]
    fn missing_meta_means_single_page() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, json!({"users": [{"id": 1}, {"id": 2}]}));
        assert_eq!(query_of(&transport).list().unwrap().len(), 2);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn empty_page_stops_iteration() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, page(json!([]), 1, 5, 0));
        assert!(query_of(&transport).list().unwrap().is_empty());
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn explicit_page_reads_only_that_page() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, page(json!([{"id": 3}]), 3, 5, 5));
        let records = query_of(&transport).extra("page", 3).list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(transport.requests().len(), 1);
        assert!(sent_pairs(&transport, 0).contains(&("page".into(), "3".into())));
    }

    #[test]
    fn errors_end_iteration() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_raw(404, "");
        let mut iter = query_of(&transport).iter();
        assert!(matches!(iter.next(), Some(Err(DrestError::DoesNotExist { .. }))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn builder_steps_reach_the_wire() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, json!({"users": []}));
        query_of(&transport)
            .filter("name__icontains", "john")
            .exclude("id", 4)
            .including(["location.*"])
            .excluding(["birthday"])
            .sort(["-name"])
            .list()
            .unwrap();
        let pairs = sent_pairs(&transport, 0);
        for expected in [
            ("filter{name.icontains}", "john"),
            ("filter{-id}", "4"),
            ("include[]", "location.*"),
            ("exclude[]", "birthday"),
            ("sort[]", "-name"),
            ("page", "1"),
        ] {
            assert!(
                pairs.contains(&(expected.0.to_string(), expected.1.to_string())),
                "missing {expected:?} in {pairs:?}"
            );
        }
    }

    #[test]
    fn first_requests_a_single_record() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, page(json!([{"id": 9, "name": "a"}]), 1, 4, 4));
        transport.push_json(200, page(json!([]), 1, 0, 0));
        let query = query_of(&transport);
        let first = query.first().unwrap().unwrap();
        assert_eq!(first.get("name"), Some(&json!("a")));
        assert!(sent_pairs(&transport, 0).contains(&("per_page".into(), "1".into())));
        assert!(query.first().unwrap().is_none());
    }

    #[test]
    fn first_keeps_an_explicit_page() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, page(json!([{"id": 4}]), 4, 9, 9));
        let first = query_of(&transport).extra("page", 4).first().unwrap().unwrap();
        assert_eq!(first.id(), Some(&RecordId::from(4_i64)));
        let pairs = sent_pairs(&transport, 0);
        assert!(pairs.contains(&("page".into(), "4".into())));
        assert!(!pairs.contains(&("page".into(), "1".into())));
    }

    #[test]
    fn get_sends_field_params_only() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, json!({"user": {"id": 5, "name": "joe"}}));
        let record = query_of(&transport)
            .filter("name", "ignored")
            .including(["location.*"])
            .get(5_i64)
            .unwrap();
        assert_eq!(record.to_string(), "users.5");
        let request = &transport.requests()[0];
        assert_eq!(request.url.path(), "/users/5");
        assert_eq!(
            sent_pairs(&transport, 0),
            vec![("include[]".to_string(), "location.*".to_string())]
        );
    }

    #[test]
    fn map_keys_by_field_value() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, json!({"users": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]}));
        transport.push_json(200, json!({"users": [{"id": 1}]}));
        let query = query_of(&transport);
        let by_id = query.map("id").unwrap();
        assert_eq!(by_id.keys().collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(by_id["2"].get("name"), Some(&json!("b")));
        let err = query.map("name").unwrap_err();
        assert_eq!(
            err,
            DrestError::MissingField {
                record: "users.1".into(),
                field: "name".into()
            }
        );
    }

    #[test]
    fn count_prefers_total_results() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, page(json!([{"id": 1}]), 1, 7, 7));
        transport.push_json(200, json!({"users": [{"id": 1}, {"id": 2}]}));
        transport.push_json(200, json!({"users": [{"id": 1}, {"id": 2}]}));
        let query = query_of(&transport);
        assert_eq!(query.count().unwrap(), 7);
        assert_eq!(query.count().unwrap(), 2);
    }

    #[test]
    fn mocks_short_circuit_the_api() {
        let transport = Arc::new(ScriptedTransport::default());
        let client = DrestClient::builder("api.test")
            .mock("Users", vec![json!({"id": 1, "name": "test"}), json!({"id": 2})])
            .transport(transport.clone())
            .build()
            .unwrap();
        let users = client.resource("users");
        let listed = users.filter("name", "nobody").list().unwrap();
        assert_eq!(
            listed.iter().map(|r| Value::Object(r.data())).collect::<Vec<_>>(),
            vec![json!({"id": 1, "name": "test"}), json!({"id": 2})]
        );
        assert_eq!(users.get(2_i64).unwrap().id(), Some(&RecordId::from(2_i64)));
        assert!(matches!(
            users.get(3_i64),
            Err(DrestError::DoesNotExist { .. })
        ));
        assert_eq!(users.count().unwrap(), 2);
        assert_eq!(users.first().unwrap().unwrap().get("name"), Some(&json!("test")));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn mock_count_matches_loaded_records() {
        let client = DrestClient::builder("api.test")
            .mock("users", vec![json!({"id": 1}), json!(7), json!(null), json!({"id": 2})])
            .transport(Arc::new(ScriptedTransport::default()))
            .build()
            .unwrap();
        let users = client.resource("users");
        assert_eq!(users.list().unwrap().len(), 2);
        assert_eq!(users.count().unwrap(), 2);
    }
}

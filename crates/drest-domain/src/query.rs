use serde_json::Value;

pub const PAGE_PARAM: &str = "page";
pub const PER_PAGE_PARAM: &str = "per_page";

const INCLUDE_PARAM: &str = "include[]";
const EXCLUDE_PARAM: &str = "exclude[]";
const SORT_PARAM: &str = "sort[]";

/// Filter, field selection, ordering and raw parameters of a DREST query.
///
/// Builder steps consume the spec and return the extended one, so a spec can be
/// cloned and branched freely.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    filters: Vec<(String, Value)>,
    includes: Vec<String>,
    excludes: Vec<String>,
    orders: Vec<String>,
    extras: Vec<(String, Value)>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `filter{key}=value`. Django style `__` lookups become dotted paths.
    #[must_use]
    pub fn filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.filters.push((filter_key(key, false), value.into()));
        self
    }

    /// Adds the negated filter `filter{-key}=value`.
    #[must_use]
    pub fn exclude(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.filters.push((filter_key(key, true), value.into()));
        self
    }

    #[must_use]
    pub fn including<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn excluding<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn sort<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.orders.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Sets a raw parameter, replacing an earlier value for the same key.
    #[must_use]
    pub fn extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.extras.iter_mut().find(|(existing, _)| existing == key) {
            Some(slot) => slot.1 = value,
            None => self.extras.push((key.to_string(), value)),
        }
        self
    }

    pub fn extra_value(&self, key: &str) -> Option<&Value> {
        self.extras
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Full parameter list for a collection request. `page` overrides any `page` extra.
    pub fn to_params(&self, page: Option<u64>) -> Vec<(String, String)> {
        let mut params = Vec::new();
        for (key, value) in &self.filters {
            push_value(&mut params, key, value);
        }
        params.extend(self.field_params());
        for order in &self.orders {
            params.push((SORT_PARAM.to_string(), order.clone()));
        }
        for (key, value) in &self.extras {
            if page.is_some() && key == PAGE_PARAM {
                continue;
            }
            push_value(&mut params, key, value);
        }
        if let Some(page) = page {
            params.push((PAGE_PARAM.to_string(), page.to_string()));
        }
        params
    }

    /// Only the `include[]`/`exclude[]` parameters, as sent for single-record reads.
    pub fn field_params(&self) -> Vec<(String, String)> {
        let includes = self
            .includes
            .iter()
            .map(|field| (INCLUDE_PARAM.to_string(), field.clone()));
        let excludes = self
            .excludes
            .iter()
            .map(|field| (EXCLUDE_PARAM.to_string(), field.clone()));
        includes.chain(excludes).collect()
    }
}

fn filter_key(key: &str, negate: bool) -> String {
    let path = key.replace("__", ".");
    if negate {
        format!("filter{{-{path}}}")
    } else {
        format!("filter{{{path}}}")
    }
}

fn push_value(params: &mut Vec<(String, String)>, key: &str, value: &Value) {
    if let Value::Array(items) = value {
        for item in items {
            params.push((key.to_string(), render_scalar(item)));
        }
    } else {
        params.push((key.to_string(), render_scalar(value)));
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(params: &[(&str, &str)]) -> Vec<(String, String)> {
        params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn filters_use_dotted_lookups() {
        let spec = QuerySpec::new()
            .filter("name__icontains", "john")
            .exclude("location__name", "home");
        assert_eq!(
            spec.to_params(None),
            pairs(&[
                ("filter{name.icontains}", "john"),
                ("filter{-location.name}", "home"),
            ])
        );
    }

    #[test]
    fn params_follow_filter_field_sort_extra_order() {
        let spec = QuerySpec::new()
            .extra("per_page", 10)
            .sort(["-name"])
            .excluding(["birthday"])
            .including(["events.*"])
            .filter("id", 3);
        assert_eq!(
            spec.to_params(Some(2)),
            pairs(&[
                ("filter{id}", "3"),
                ("include[]", "events.*"),
                ("exclude[]", "birthday"),
                ("sort[]", "-name"),
                ("per_page", "10"),
                ("page", "2"),
            ])
        );
    }

    #[test]
    fn list_values_repeat_the_parameter() {
        let spec = QuerySpec::new().filter("id__in", json!([1, 2, "x"]));
        assert_eq!(
            spec.to_params(None),
            pairs(&[
                ("filter{id.in}", "1"),
                ("filter{id.in}", "2"),
                ("filter{id.in}", "x"),
            ])
        );
    }

    #[test]
    fn scalars_render_without_json_quoting() {
        let spec = QuerySpec::new()
            .filter("active", true)
            .filter("deleted", json!(null))
            .filter("score", 1.5);
        assert_eq!(
            spec.to_params(None),
            pairs(&[
                ("filter{active}", "true"),
                ("filter{deleted}", ""),
                ("filter{score}", "1.5"),
            ])
        );
    }

    #[test]
    fn later_extras_replace_earlier_ones() {
        let spec = QuerySpec::new().extra("per_page", 5).extra("per_page", 1);
        assert_eq!(spec.extra_value("per_page"), Some(&json!(1)));
        assert_eq!(spec.to_params(None), pairs(&[("per_page", "1")]));
    }

    #[test]
    fn explicit_page_overrides_page_extra() {
        let spec = QuerySpec::new().extra("page", 9);
        assert_eq!(spec.to_params(Some(1)), pairs(&[("page", "1")]));
        assert_eq!(spec.to_params(None), pairs(&[("page", "9")]));
    }

    #[test]
    fn field_params_skip_filters_and_sorts() {
        let spec = QuerySpec::new()
            .filter("name", "x")
            .sort(["name"])
            .including(["location.*"])
            .excluding(["*"]);
        assert_eq!(
            spec.field_params(),
            pairs(&[("include[]", "location.*"), ("exclude[]", "*")])
        );
    }
}

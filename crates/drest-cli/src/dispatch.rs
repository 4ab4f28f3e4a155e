use std::time::Duration;

use anyhow::{Context, Result};
use drest_core::{
    Authentication, ClientConfig, DrestClient, DrestError, Method, Query, Record, RecordId,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cli::{Assignment, DrestCli, DrestCommand, FieldSelection, ListArgs};

/// Runs the selected command and returns the JSON to print.
pub fn run(cli: &DrestCli) -> Result<Value> {
    let config = client_config(cli)?;
    debug!(host = %config.host, version = ?config.version, "connecting");
    let client = DrestClient::from_config(config)?;
    match &cli.command {
        DrestCommand::Get(args) => {
            let query = select_fields(
                client.resource(&args.record.resource).query(),
                &args.fields,
            );
            let record = query.get(args.record.id.as_str())?;
            Ok(record_json(&record))
        }
        DrestCommand::List(args) => list(&client, args),
        DrestCommand::Create(args) => {
            let record = client
                .resource(&args.resource)
                .create(Value::Object(fields_object(&args.fields)))?;
            Ok(record_json(&record))
        }
        DrestCommand::Update(args) => {
            let mut record = client
                .resource(&args.record.resource)
                .get(args.record.id.as_str())?;
            for Assignment { key, value } in &args.fields {
                record.set(key, value.clone());
            }
            record.save()?;
            Ok(record_json(&record))
        }
        DrestCommand::Delete(args) => {
            let resource = client.resource(&args.resource);
            let id = RecordId::from(args.id.as_str());
            resource.request(Method::Delete, Some(&id), &[], None)?;
            Ok(serde_json::json!({ "deleted": format!("{resource}.{id}") }))
        }
    }
}

/// 1 when the API answered with an error, 2 for usage and configuration problems.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DrestError>() {
        Some(DrestError::InvalidConfig(_)) | None => 2,
        Some(_) => 1,
    }
}

fn client_config(cli: &DrestCli) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env_with_host(cli.host.as_deref())?;
    if let Some(version) = &cli.api_version {
        config.version = Some(version.clone());
    }
    if let Some(scheme) = &cli.scheme {
        config.scheme.clone_from(scheme);
    }
    if let Some(secs) = cli.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if cli.trailing_slash {
        config.trailing_slash = true;
    }
    config.authentication = authentication(cli, config.authentication.take());
    Ok(config)
}

fn authentication(cli: &DrestCli, from_env: Option<Authentication>) -> Option<Authentication> {
    let has_flags = cli.token.is_some()
        || cli.cookie.is_some()
        || cli.username.is_some()
        || cli.password.is_some();
    let mut auth = if has_flags {
        Authentication {
            token: cli.token.clone(),
            cookie: cli.cookie.clone(),
            username: cli.username.clone(),
            password: cli.password.clone(),
            ..from_env.unwrap_or_default()
        }
    } else {
        from_env?
    };
    if let Some(token_type) = &cli.token_type {
        auth.token_type.clone_from(token_type);
    }
    if let Some(cookie_name) = &cli.cookie_name {
        auth.cookie_name.clone_from(cookie_name);
    }
    if let Some(endpoint) = &cli.login_endpoint {
        auth.login_endpoint.clone_from(endpoint);
    }
    Some(auth)
}

fn list(client: &DrestClient, args: &ListArgs) -> Result<Value> {
    let mut query = select_fields(client.resource(&args.resource).query(), &args.fields);
    for Assignment { key, value } in &args.filter {
        query = query.filter(key, value.clone());
    }
    for Assignment { key, value } in &args.exclude {
        query = query.exclude(key, value.clone());
    }
    if !args.sort.is_empty() {
        query = query.sort(args.sort.iter().cloned());
    }
    for Assignment { key, value } in &args.extra {
        query = query.extra(key, value.clone());
    }

    if args.first {
        return Ok(query.first()?.map_or(Value::Null, |record| record_json(&record)));
    }
    if args.count {
        return Ok(Value::from(query.count()?));
    }
    if let Some(field) = &args.map {
        let records = query
            .map(field)
            .with_context(|| format!("mapping {} by `{field}`", args.resource))?;
        let keyed: Map<String, Value> = records
            .iter()
            .map(|(key, record)| (key.clone(), record_json(record)))
            .collect();
        return Ok(Value::Object(keyed));
    }
    let records = query.list()?;
    Ok(Value::Array(records.iter().map(record_json).collect()))
}

fn select_fields(query: Query, fields: &FieldSelection) -> Query {
    query
        .including(fields.include_fields.iter().cloned())
        .excluding(fields.exclude_fields.iter().cloned())
}

fn fields_object(fields: &[Assignment]) -> Map<String, Value> {
    fields
        .iter()
        .map(|Assignment { key, value }| (key.clone(), value.clone()))
        .collect()
}

fn record_json(record: &Record) -> Value {
    Value::Object(record.data())
}

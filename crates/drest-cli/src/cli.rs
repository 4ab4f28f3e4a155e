use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::Value;

pub const DREST_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const DREST_BEFORE_HELP: &str = concat!(
    "drest ",
    env!("CARGO_PKG_VERSION"),
    " – Command line client for dynamic-rest APIs\n\n",
    "\x1b[1;36mReading\x1b[0m\n",
    "  get              Fetch one record by id.\n",
    "  list             Query a resource with filters, includes, and sorting.\n\n",
    "\x1b[1;36mWriting\x1b[0m\n",
    "  create           POST a new record built from FIELD=VALUE pairs.\n",
    "  update           PATCH only the fields that changed.\n",
    "  delete           Remove a record.\n\n",
    "Connection settings fall back to DREST_* environment variables.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "drest",
    author,
    version,
    propagate_version = false,
    disable_help_subcommand = true,
    before_help = DREST_BEFORE_HELP,
    help_template = DREST_HELP_TEMPLATE
)]
pub struct DrestCli {
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)", global = true)]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v", global = true)]
    pub trace: bool,
    #[arg(long, help = "API host, without scheme (overrides DREST_HOST)", global = true)]
    pub host: Option<String>,
    #[arg(long, help = "API version path segment, e.g. v0", global = true)]
    pub api_version: Option<String>,
    #[arg(long, help = "URL scheme: https (default) or http", global = true)]
    pub scheme: Option<String>,
    #[arg(long, help = "Request timeout in seconds", global = true)]
    pub timeout: Option<u64>,
    #[arg(long, help = "Append a trailing slash to resource paths", global = true)]
    pub trailing_slash: bool,
    #[arg(long, help = "Authenticate with a token", global = true)]
    pub token: Option<String>,
    #[arg(long, help = "Authorization scheme for --token (default JWT)", global = true)]
    pub token_type: Option<String>,
    #[arg(long, help = "Authenticate with an existing session cookie", global = true)]
    pub cookie: Option<String>,
    #[arg(long, help = "Session cookie name (default sessionid)", global = true)]
    pub cookie_name: Option<String>,
    #[arg(long, help = "Log in with this username", global = true)]
    pub username: Option<String>,
    #[arg(long, help = "Password used with --username", global = true)]
    pub password: Option<String>,
    #[arg(long, help = "Login path (default /accounts/login/)", global = true)]
    pub login_endpoint: Option<String>,
    #[command(subcommand)]
    pub command: DrestCommand,
}

#[derive(Subcommand, Debug)]
pub enum DrestCommand {
    #[command(
        about = "Fetch one record by id.",
        override_usage = "drest get <RESOURCE> <ID> [--include FIELD] [--exclude-field FIELD]"
    )]
    Get(GetArgs),
    #[command(
        about = "Query a resource and print the matching records.",
        override_usage = "drest list <RESOURCE> [--filter FIELD=VALUE] [--sort FIELD] [--first|--count|--map FIELD]",
        after_help = "Examples:\n  drest list users --filter name.icontains=john --sort -id\n  drest list users --include location.* --count\n"
    )]
    List(ListArgs),
    #[command(
        about = "Create a record from FIELD=VALUE pairs.",
        override_usage = "drest create <RESOURCE> [FIELD=VALUE]...",
        after_help = "Values are parsed as JSON when possible: age=3 sends a number, name=joe a string.\n"
    )]
    Create(CreateArgs),
    #[command(
        about = "Change fields of an existing record.",
        override_usage = "drest update <RESOURCE> <ID> [FIELD=VALUE]..."
    )]
    Update(UpdateArgs),
    #[command(
        about = "Delete a record.",
        override_usage = "drest delete <RESOURCE> <ID>"
    )]
    Delete(RecordArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    #[arg(value_name = "RESOURCE")]
    pub resource: String,
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct FieldSelection {
    #[arg(long = "include", value_name = "FIELD", allow_hyphen_values = true, help = "Sideload or expand a field (include[])")]
    pub include_fields: Vec<String>,
    #[arg(long = "exclude-field", value_name = "FIELD", allow_hyphen_values = true, help = "Leave a field out (exclude[])")]
    pub exclude_fields: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    #[command(flatten)]
    pub record: RecordArgs,
    #[command(flatten)]
    pub fields: FieldSelection,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(value_name = "RESOURCE")]
    pub resource: String,
    #[arg(long, value_name = "FIELD=VALUE", value_parser = parse_assignment, help = "Keep records matching filter{FIELD}")]
    pub filter: Vec<Assignment>,
    #[arg(long, value_name = "FIELD=VALUE", value_parser = parse_assignment, help = "Drop records matching filter{-FIELD}")]
    pub exclude: Vec<Assignment>,
    #[command(flatten)]
    pub fields: FieldSelection,
    #[arg(
        long,
        value_name = "FIELD",
        allow_hyphen_values = true,
        help = "Sort by FIELD; prefix with - for descending"
    )]
    pub sort: Vec<String>,
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_assignment, help = "Send an extra query parameter")]
    pub extra: Vec<Assignment>,
    #[arg(long, conflicts_with_all = ["count", "map"], help = "Print only the first record (or null)")]
    pub first: bool,
    #[arg(long, conflicts_with = "map", help = "Print the number of matching records")]
    pub count: bool,
    #[arg(long, value_name = "FIELD", help = "Print records keyed by FIELD")]
    pub map: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[arg(value_name = "RESOURCE")]
    pub resource: String,
    #[arg(value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    pub fields: Vec<Assignment>,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub record: RecordArgs,
    #[arg(value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    pub fields: Vec<Assignment>,
}

/// A `KEY=VALUE` argument. The value is JSON when it parses as JSON, a string otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub key: String,
    pub value: Value,
}

pub fn parse_assignment(raw: &str) -> Result<Assignment, String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected KEY=VALUE, got `{raw}`"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok(Assignment {
        key: key.to_string(),
        value,
    })
}

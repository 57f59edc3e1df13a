use clap::{Parser, Subcommand, ValueEnum};
use jsondb::document::from_value;
use jsondb::schema::parse_definition;
use jsondb::{KeyStrategy, Query, Schema, Store, StoreConfig, KEY_FIELD};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process;

/// jsondb CLI: inspect and edit a single-file JSON document store
#[derive(Parser)]
#[command(name = "jsondb", version, about)]
struct Cli {
    /// Path to the store file
    #[arg(long, default_value = "db.json")]
    file: PathBuf,

    /// Store definition (YAML with key_strategy, indexes, pretty and fields)
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Extra fields to index for this invocation
    #[arg(long = "index")]
    indexes: Vec<String>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Uuid,
    Ulid,
    Nanoid,
    AutoIncrement,
}

impl From<StrategyArg> for KeyStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Uuid => KeyStrategy::Uuid,
            StrategyArg::Ulid => KeyStrategy::Ulid,
            StrategyArg::Nanoid => KeyStrategy::Nanoid,
            StrategyArg::AutoIncrement => KeyStrategy::AutoIncrement,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Insert a document
    Insert {
        /// Field values (e.g. --field name="Alice Chen")
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Whole document as a JSON object; --field values are applied on top
        #[arg(long)]
        json: Option<String>,
        /// Key strategy for this insert when the document has no _id
        #[arg(long)]
        key_strategy: Option<StrategyArg>,
    },

    /// Merge field values into every matching document
    Update {
        /// Match conditions (e.g. --where status=draft)
        #[arg(long = "where", value_parser = parse_key_value)]
        conditions: Vec<(String, String)>,
        /// Field values to set (e.g. --set status=published)
        #[arg(long = "set", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Remove every matching document
    Remove {
        /// Match conditions; none removes everything
        #[arg(long = "where", value_parser = parse_key_value)]
        conditions: Vec<(String, String)>,
    },

    /// Keys of matching documents
    Find {
        /// Match conditions (e.g. --where category=A)
        #[arg(long = "where", value_parser = parse_key_value)]
        conditions: Vec<(String, String)>,
        /// Print the documents instead of their keys
        #[arg(long)]
        documents: bool,
    },

    /// First matching document
    FindOne {
        #[arg(long = "where", value_parser = parse_key_value)]
        conditions: Vec<(String, String)>,
    },

    /// Get a single document by key
    Get {
        /// Document key
        key: String,
    },

    /// Every document, keyed by _id
    All,

    /// Next auto-increment key
    NextId,

    /// Print the store as a table
    Show,

    /// Check all documents against the schema
    Validate,

    /// List indexed fields
    Indexes,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=').ok_or_else(|| {
        format!("Invalid key=value pair: no '=' found in '{s}'")
    })?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn open_store(file: &Path, schema: Option<&Path>, indexes: &[String]) -> jsondb::Result<Store> {
    let (schema, mut config) = match schema {
        Some(path) => {
            let definition = parse_definition(path)?;
            (definition.fields, definition.config)
        }
        None => (Schema::new(), StoreConfig::default()),
    };
    for field in indexes {
        config = config.with_index(field);
    }
    log::debug!("opening {} with indexes {:?}", file.display(), config.indexes);
    Store::with_config(file, schema, config)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = open_store(&cli.file, cli.schema.as_deref(), &cli.indexes)?;

    match cli.command {
        Command::Insert {
            fields,
            json,
            key_strategy,
        } => {
            let mut data = match json {
                Some(text) => serde_json::from_str(&text)
                    .map_err(|e| format!("Invalid --json document: {e}"))?,
                None => Value::Object(serde_json::Map::new()),
            };
            if let (Value::Object(target), Value::Object(extra)) = (&mut data, fields_to_value(&fields)) {
                target.extend(extra);
            }
            let doc = from_value(data)?;
            let key = match key_strategy {
                Some(strategy) => store.insert_with(doc, strategy.into())?,
                None => store.insert(doc)?,
            };
            print_output(&json!({ "_id": key }), &cli.format)?;
        }

        Command::Update { conditions, fields } => {
            let query = conditions_to_query(&conditions)?;
            let updates = from_value(fields_to_value(&fields))?;
            let updated = store.update(&query, updates)?;
            print_output(&json!({ "ok": true, "updated": updated }), &cli.format)?;
        }

        Command::Remove { conditions } => {
            let query = conditions_to_query(&conditions)?;
            let removed = store.remove(&query)?;
            print_output(&json!({ "ok": true, "removed": removed }), &cli.format)?;
        }

        Command::Find {
            conditions,
            documents,
        } => {
            let query = conditions_to_query(&conditions)?;
            if documents {
                let docs = store.find_documents(&query)?;
                print_output(&serde_json::to_value(docs)?, &cli.format)?;
            } else {
                let keys = store.find(&query)?;
                print_output(&json!(keys), &cli.format)?;
            }
        }

        Command::FindOne { conditions } => {
            let query = conditions_to_query(&conditions)?;
            let doc = store.find_one(&query)?;
            print_output(&serde_json::to_value(doc)?, &cli.format)?;
        }

        Command::Get { key } => {
            let doc = store
                .get(&key)?
                .ok_or_else(|| format!("Document '{key}' not found"))?;
            print_output(&Value::Object(doc), &cli.format)?;
        }

        Command::All => {
            let tree = store.get_all()?;
            print_output(&serde_json::to_value(tree)?, &cli.format)?;
        }

        Command::NextId => {
            let next = store.auto_increment_id()?;
            print_output(&json!({ "next_id": next }), &cli.format)?;
        }

        Command::Show => {
            store.visualize()?;
        }

        Command::Validate => {
            let report = store.validate_all()?;
            let issues: Vec<Value> = report
                .issues
                .iter()
                .map(|(key, errors)| {
                    json!({
                        "_id": key,
                        "errors": errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
                    })
                })
                .collect();
            print_output(
                &json!({
                    "clean": report.is_clean(),
                    "total": report.total,
                    "valid": report.total - report.issues.len(),
                    "issues": issues,
                }),
                &cli.format,
            )?;
        }

        Command::Indexes => {
            let fields = store.indexed_fields()?;
            print_output(&json!({ "file": store.location(), "indexes": fields }), &cli.format)?;
        }
    }

    Ok(())
}

fn print_output(value: &Value, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(value)?);
        }
    }
    Ok(())
}

/// Build a query from `--where` pairs. Keys are always strings, so `_id=1` means "1".
fn conditions_to_query(conditions: &[(String, String)]) -> jsondb::Result<Query> {
    let mut value = fields_to_value(conditions);
    if let Value::Object(map) = &mut value {
        if let Some((_, raw)) = conditions.iter().rev().find(|(k, _)| k == KEY_FIELD) {
            map.insert(KEY_FIELD.to_string(), Value::String(raw.clone()));
        }
    }
    Query::from_value(value)
}

fn fields_to_value(fields: &[(String, String)]) -> Value {
    let mut map = serde_json::Map::new();
    for (key, val) in fields {
        // Try to parse as JSON value (for numbers, booleans, arrays, objects)
        let json_val = serde_json::from_str(val).unwrap_or(Value::String(val.clone()));
        map.insert(key.clone(), json_val);
    }
    Value::Object(map)
}

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use serde_json::{json, Value as Json};
use shoal_codec::{decode, encode, encode_fields, Reference, Value};
use shoal_shape::{ShapeKind, TypeStore};
use shoal_store::{
    CommitLog, Group, InMemoryCommitLog, LocalRouter, ProcessContext, Resolved, Router,
    StoreConfig,
};
use shoal_types::{ObjectId, ROOT_ID};
use tracing::info;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Id(args) => cmd_id(args, format),
        Command::Decode(args) => cmd_decode(args, format),
        Command::Encode(args) => cmd_encode(args, format),
        Command::Shape(args) => cmd_shape(args, format),
        Command::Demo(args) => cmd_demo(args, format).await,
    }
}

fn cmd_id(args: IdArgs, format: OutputFormat) -> anyhow::Result<()> {
    match args.action {
        IdAction::Generate { count } => {
            let ids: Vec<String> = (0..count).map(|_| ObjectId::generate().to_string()).collect();
            match format {
                OutputFormat::Json => println!("{}", json!(ids)),
                OutputFormat::Text => ids.iter().for_each(|id| println!("{id}")),
            }
        }
        IdAction::Validate { candidate } => {
            let valid = ObjectId::validate(&candidate);
            match format {
                OutputFormat::Json => println!("{}", json!({ "candidate": candidate, "valid": valid })),
                OutputFormat::Text if valid => println!("{} {}", "✓".green().bold(), candidate),
                OutputFormat::Text => println!("{} {}", "✗".red().bold(), candidate),
            }
            if !valid {
                bail!("malformed identifier: {candidate:?}");
            }
        }
    }
    Ok(())
}

fn cmd_decode(args: DecodeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let value = decode(&args.token)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&value)?),
        OutputFormat::Text => println!("{} {:?}", value.kind_name().cyan(), value),
    }
    Ok(())
}

fn cmd_encode(args: EncodeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let value = if args.undefined {
        Value::Undefined
    } else if let Some(target) = args.reference {
        Value::Ref(Reference::new(target))
    } else {
        let text = args.json.ok_or_else(|| anyhow!("no value given"))?;
        let parsed: Json = serde_json::from_str(&text).context("value is not JSON")?;
        scalar_from_json(&parsed)?
    };
    let token = encode(&value);
    match format {
        OutputFormat::Json => println!("{}", json!({ "token": token })),
        OutputFormat::Text => println!("{token}"),
    }
    Ok(())
}

fn cmd_shape(args: ShapeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let doc: Json = serde_json::from_str(&args.json).context("document is not JSON")?;
    let types = TypeStore::instance();
    let descriptor = types.describe_json(&doc)?;

    let tokens = if args.fields {
        let fields = document_fields(&doc)?;
        Some(encode_fields(&descriptor, &fields)?)
    } else {
        None
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "signature": descriptor.signature().as_str(),
                "kind": descriptor.kind().to_string(),
                "properties": descriptor.property_names(),
                "fields": tokens,
            })
        ),
        OutputFormat::Text => {
            println!("{}", descriptor.signature().as_str().yellow().bold());
            println!("  kind: {}", descriptor.kind());
            for (position, name) in descriptor.property_names().iter().enumerate() {
                match tokens.as_ref().and_then(|t| t.get(position)) {
                    Some(token) => println!("  {position:>3}  {name} = {}", token.cyan()),
                    None => println!("  {position:>3}  {name}"),
                }
            }
        }
    }
    Ok(())
}

async fn cmd_demo(args: DemoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if args.secondaries == 0 {
        bail!("the demo needs at least one secondary");
    }

    let router: Arc<dyn Router> = Arc::new(LocalRouter::new(&config.router));
    let log = Arc::new(InMemoryCommitLog::new());
    let group = Group::coordinator(ProcessContext::bootstrap(), router, config)
        .with_commit_log(log.clone());
    let primary = group.ensure_primary().await?;

    let mut stores = Vec::with_capacity(args.secondaries);
    for _ in 0..args.secondaries {
        stores.push(group.store().await?);
    }
    info!(
        group = %group.config().group,
        secondaries = stores.len(),
        "demo group ready"
    );

    let writer = &stores[0];
    let child = writer
        .atomic(|tx| {
            let root = tx.root();
            tx.set(root, "name", "foo")?;
            let child = tx.create(ShapeKind::Object);
            tx.set(child, "name", "bar")?;
            tx.set_ref(root, "child", child)?;
            Ok(child)
        })
        .await?;

    let mut views = Vec::new();
    for store in std::iter::once(&primary).chain(stores.iter()) {
        let name = store.get(ROOT_ID, "name")?;
        let child_name = match store.resolve(ROOT_ID, "child", Value::Null)? {
            Resolved::Object(obj) => obj.get("name").cloned(),
            Resolved::Unknown(_) | Resolved::Value(_) => None,
        };
        views.push((store.role(), store.endpoint(), store.seq(), name, child_name));
    }
    log.verify_chain()?;
    let records = log.records()?;

    match format {
        OutputFormat::Json => {
            let handles: Vec<Json> = views
                .iter()
                .map(|(role, endpoint, seq, name, child_name)| {
                    json!({
                        "role": role.to_string(),
                        "endpoint": endpoint.to_string(),
                        "seq": seq,
                        "root.name": name,
                        "root.child.name": child_name,
                    })
                })
                .collect();
            let commits: Vec<Json> = records
                .iter()
                .map(|r| json!({ "seq": r.seq, "changes": r.changes.len(), "digest": r.digest_hex() }))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "child": child.to_string(),
                    "handles": handles,
                    "commits": commits,
                }))?
            );
        }
        OutputFormat::Text => {
            println!("{} Committed root.name and root.child ({})", "✓".green().bold(), child.short_id().cyan());
            for (role, endpoint, seq, name, child_name) in &views {
                println!(
                    "  {:<9} {}  seq {}  root.name={}  root.child.name={}",
                    role.to_string().bold(),
                    endpoint.short_id(),
                    seq,
                    show(name.as_ref()),
                    show(child_name.as_ref()),
                );
            }
            for record in &records {
                println!(
                    "  commit {} ({} changes) {}",
                    record.seq.to_string().yellow(),
                    record.changes.len(),
                    &record.digest_hex()[..16],
                );
            }
            println!("{} Commit log chain verified", "✓".green().bold());
        }
    }

    for store in &stores {
        store.stop();
    }
    primary.stop();
    Ok(())
}

fn show(value: Option<&Value>) -> String {
    value.map(encode).unwrap_or_else(|| "-".into())
}

/// Scalars that have a token form. Negative and fractional numbers do not.
fn scalar_from_json(value: &Json) -> anyhow::Result<Value> {
    Ok(match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Int(
            n.as_u64()
                .ok_or_else(|| anyhow!("only non-negative integers have a token form: {n}"))?,
        ),
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(_) | Json::Object(_) => {
            bail!("nested documents are linked by reference, not encoded inline")
        }
    })
}

fn document_fields(doc: &Json) -> anyhow::Result<Vec<(String, Value)>> {
    match doc {
        Json::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), scalar_from_json(v)?)))
            .collect(),
        Json::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| Ok((i.to_string(), scalar_from_json(v)?)))
            .collect(),
        _ => bail!("only objects and arrays have fields"),
    }
}

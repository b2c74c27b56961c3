use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::de::DeserializeOwned;
use serde_json::json;

use pcat_publish::{sweep_stale_temp_files, CommitCoordinator, PublishConfig, Resolution, Resolver, StagedBatch};
use pcat_server::{PcatServer, ServerConfig};
use pcat_store::{DiskFileStore, ExistenceIndex, FileStore};
use pcat_types::{
    classify, normalize, FileKind, ProductFile, ProductTableFile, PublishResponse, ReleaseFile,
    RootFile, TransactionFile, ROOT_FILE_NAME,
};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Missing(args) => cmd_missing(args, format).await,
        Command::Prune(args) => cmd_prune(args, format).await,
        Command::Sweep(args) => cmd_sweep(args, format).await,
        Command::Inspect(args) => cmd_inspect(args, format).await,
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(root) = args.root {
        config.storage_root = root;
    }
    println!(
        "pcat server on {} (root: {})",
        config.bind_addr.to_string().bold(),
        config.storage_root.display()
    );
    PcatServer::new(config).serve().await?;
    Ok(())
}

/// Resolve `frontier` against the files currently in `store`.
async fn resolve(
    store: &DiskFileStore,
    frontier: Vec<String>,
    max_depth: usize,
) -> anyhow::Result<(ExistenceIndex, Resolution)> {
    let existing = ExistenceIndex::snapshot(store).await?;
    let config = PublishConfig {
        max_depth,
        ..Default::default()
    };
    let resolution = Resolver::new(store, &config)
        .resolve(&existing, &StagedBatch::direct(), frontier)
        .await?;
    Ok((existing, resolution))
}

async fn cmd_missing(args: MissingArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = DiskFileStore::new(&args.db_dir);
    let frontier = if args.files.is_empty() {
        vec![ROOT_FILE_NAME.to_string()]
    } else {
        args.files.iter().map(|f| normalize(f)).collect()
    };
    let (_, resolution) = resolve(&store, frontier, args.max_depth).await?;
    let missing = resolution.missing_files();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&PublishResponse::new(missing))?);
        }
        OutputFormat::Text if missing.is_empty() => {
            println!(
                "{} Nothing missing ({} files reachable, {} read).",
                "✓".green().bold(),
                resolution.referenced.len(),
                resolution.files_read
            );
        }
        OutputFormat::Text => {
            println!("{} files missing:", missing.len().to_string().bold());
            for name in &missing {
                println!("  {} {}", "missing:".red(), name);
            }
        }
    }
    Ok(())
}

async fn cmd_prune(args: PruneArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = DiskFileStore::new(&args.db_dir);
    let (mut existing, resolution) =
        resolve(&store, vec![ROOT_FILE_NAME.to_string()], args.max_depth).await?;
    if !resolution.is_complete() {
        bail!(
            "refusing to prune {}: {} reachable files are missing ({})",
            args.db_dir.display(),
            resolution.missing.len(),
            resolution.missing_files().join(", ")
        );
    }

    if args.dry_run {
        let orphans: Vec<String> = existing.difference(&resolution.referenced).into_iter().collect();
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "orphans": orphans }))?),
            OutputFormat::Text => {
                for name in &orphans {
                    println!("  {} {}", "would delete:".yellow(), name);
                }
                println!("{} orphans.", orphans.len().to_string().bold());
            }
        }
        return Ok(());
    }

    let report = CommitCoordinator::new(&store)
        .prune(&mut existing, &resolution.referenced)
        .await;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "removed": report.removed,
                "failed": report.failed.iter().map(|f| &f.name).collect::<Vec<_>>(),
            }))?
        ),
        OutputFormat::Text => {
            for name in &report.removed {
                println!("  {} {}", "deleted:".green(), name);
            }
            for failed in &report.failed {
                println!("  {} {} ({})", "failed:".red(), failed.name, failed.error);
            }
            println!("{} Prune: {} files removed.", "✓".green(), report.removed.len());
        }
    }
    if !report.is_complete() {
        bail!("{} files could not be deleted", report.failed.len());
    }
    Ok(())
}

async fn cmd_sweep(args: SweepArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = DiskFileStore::new(&args.db_dir);
    let report = sweep_stale_temp_files(&store, Duration::from_secs(args.ttl_secs)).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "removed": report.removed }))?),
        OutputFormat::Text => {
            for name in &report.removed {
                println!("  {} {}", "swept:".green(), name);
            }
            println!("{} Sweep: {} stale temp files removed.", "✓".green(), report.removed.len());
        }
    }
    if !report.is_complete() {
        bail!("{} stale temp files could not be deleted", report.failed.len());
    }
    Ok(())
}

async fn read_object<T: DeserializeOwned>(store: &DiskFileStore, name: &str) -> anyhow::Result<T> {
    let bytes = store
        .read(name)
        .await?
        .with_context(|| format!("no {name} in {}", store.dir().display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("{name} is malformed"))
}

async fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = DiskFileStore::new(&args.db_dir);
    let root: RootFile = read_object(&store, ROOT_FILE_NAME).await?;
    if let Some(product) = &args.product {
        return inspect_product(&store, &root, args.marker.as_deref(), product, format).await;
    }

    let markers: Vec<(&str, Option<&str>)> = root
        .data
        .markers
        .keys()
        .map(|marker| (marker.as_str(), root.marker_file(marker)))
        .collect();
    let trees: Vec<(&str, Option<&str>)> = root
        .data
        .trees
        .keys()
        .map(|tree| (tree.as_str(), root.tree_file(tree)))
        .collect();
    let latest = root.latest_transaction_file();

    match format {
        OutputFormat::Json => {
            let markers: serde_json::Map<String, serde_json::Value> =
                markers.iter().map(|(k, v)| (k.to_string(), json!(v))).collect();
            let trees: serde_json::Map<String, serde_json::Value> =
                trees.iter().map(|(k, v)| (k.to_string(), json!(v))).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "markers": markers,
                    "trees": trees,
                    "latest": {
                        "tx": root.data.latest.tx,
                        "date": root.data.latest.date,
                        "file": latest.file_name(),
                    },
                }))?
            );
        }
        OutputFormat::Text => {
            println!("Markers:");
            for (marker, file) in &markers {
                println!("  {} -> {}", marker.yellow(), describe(*file));
            }
            println!("Trees:");
            for (tree, file) in &trees {
                println!("  {} -> {}", tree.yellow(), describe(*file));
            }
            println!(
                "Latest: tx {} ({})",
                root.data.latest.tx.to_string().bold(),
                latest.file_name().cyan()
            );
        }
    }
    Ok(())
}

/// One table of an inspected product.
struct TableView {
    name: String,
    file: Option<String>,
    blobs: Vec<(String, bool)>,
}

/// Follow marker -> product -> tables -> blobs, noting which blobs exist.
async fn inspect_product(
    store: &DiskFileStore,
    root: &RootFile,
    marker: Option<&str>,
    product_key: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let version = match marker {
        Some(marker) => root
            .marker_file(marker)
            .with_context(|| format!("no marker {marker} in {ROOT_FILE_NAME}"))?
            .to_string(),
        None => root.latest_transaction_file().file_name(),
    };
    let product_name = match classify(&version)?.0 {
        FileKind::Release => read_object::<ReleaseFile>(store, &version)
            .await?
            .product_file(product_key)
            .map(String::from),
        FileKind::Transaction => read_object::<TransactionFile>(store, &version)
            .await?
            .product_file(product_key)
            .map(String::from),
        other => bail!("{version} is a {other} file, not a release or transaction"),
    }
    .with_context(|| format!("no product {product_key} in {version}"))?;
    let product: ProductFile = read_object(store, &product_name).await?;

    let existing = ExistenceIndex::snapshot(store).await?;
    let mut tables = Vec::new();
    for name in product.data.tables.keys() {
        let file = product.table_file(name).map(String::from);
        let blobs = match &file {
            Some(file) if existing.contains(file) => read_object::<ProductTableFile>(store, file)
                .await?
                .blob_files()
                .into_iter()
                .map(|blob| {
                    let blob = blob.file_name();
                    let present = existing.contains(&blob);
                    (blob, present)
                })
                .collect(),
            _ => Vec::new(),
        };
        tables.push(TableView {
            name: name.clone(),
            file,
            blobs,
        });
    }

    match format {
        OutputFormat::Json => {
            let tables: Vec<serde_json::Value> = tables
                .iter()
                .map(|t| {
                    json!({
                        "table": t.name,
                        "file": t.file,
                        "blobs": t.blobs.iter().map(|(b, _)| b).collect::<Vec<_>>(),
                        "missingBlobs": t.blobs.iter().filter(|(_, p)| !p).map(|(b, _)| b).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "version": version,
                    "product": {
                        "key": product.data.key,
                        "name": product.data.name,
                        "file": product_name,
                    },
                    "tables": tables,
                }))?
            );
        }
        OutputFormat::Text => {
            println!(
                "{} ({}) in {}",
                product.data.key.bold(),
                product_name.cyan(),
                version.cyan()
            );
            for table in &tables {
                println!("  {} -> {}", table.name.yellow(), describe(table.file.as_deref()));
                for (blob, present) in &table.blobs {
                    if *present {
                        println!("    {blob}");
                    } else {
                        println!("    {} {}", "missing:".red(), blob);
                    }
                }
            }
        }
    }
    Ok(())
}

fn describe(file: Option<&str>) -> String {
    match file {
        Some(name) => name.cyan().to_string(),
        None => "dangling ref".red().to_string(),
    }
}

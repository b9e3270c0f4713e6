use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use verstash::{
    CopyTransformer, FileBehavior, FileBehaviorSettings, FileTransformer, ImageResizeTransformer,
    MemoryRecord, TransformFileBehavior, TransformationSet,
};
use verstash_core::StorageConfig;
use verstash_storage::create_storage;

#[derive(Parser, Debug)]
#[command(name = "verstash")]
#[command(about = "Manage versioned files attached to a record")]
struct Args {
    /// JSON file holding the record (type_name, primary_key, attributes)
    #[arg(long, value_name = "PATH")]
    record: PathBuf,

    /// JSON file with behavior settings; defaults are used when omitted
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Transformation set as inline JSON or a path to a JSON file
    #[arg(long, value_name = "JSON|PATH")]
    transformations: Option<String>,

    /// Transform applied to variants with settings
    #[arg(long, value_enum, default_value_t = TransformerKind::Image)]
    transformer: TransformerKind,

    /// Output format: json or text (default: text)
    #[arg(long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum TransformerKind {
    Copy,
    Image,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the storage key of the current file
    Name {
        #[arg(long)]
        variant: Option<String>,
        #[arg(long)]
        version: Option<u64>,
        #[arg(long)]
        extension: Option<String>,
    },
    /// Store a new version of the file
    Save {
        source: PathBuf,
        /// Remove the source file after a successful save
        #[arg(long)]
        delete_source: bool,
    },
    /// Delete the current file and all its variants
    Delete,
    /// Rebuild every variant from one stored variant
    Regenerate {
        #[arg(long)]
        from: Option<String>,
    },
    /// Print the public URL of the current file
    Url {
        #[arg(long)]
        variant: Option<String>,
    },
}

enum Behavior {
    Single(FileBehavior),
    Transform(TransformFileBehavior),
}

#[derive(Serialize)]
struct Output {
    command: &'static str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    version: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    verstash_core::telemetry::init_tracing("info");

    let args = Args::parse();

    let storage_config = StorageConfig::from_env()?;
    let storage = create_storage(&storage_config)
        .await
        .context("Failed to initialize storage")?;

    let settings = match &args.settings {
        Some(path) => read_json::<FileBehaviorSettings>(path)?,
        None => FileBehaviorSettings::from_storage_config(&storage_config),
    };

    let behavior = match &args.transformations {
        Some(source) => {
            let transformations = load_transformations(source)?;
            let transformer: Arc<dyn FileTransformer> = match args.transformer {
                TransformerKind::Copy => Arc::new(CopyTransformer),
                TransformerKind::Image => Arc::new(ImageResizeTransformer),
            };
            Behavior::Transform(TransformFileBehavior::new(
                settings,
                storage,
                transformations,
                transformer,
            ))
        }
        None => Behavior::Single(FileBehavior::new(settings, storage)),
    };

    let mut record: MemoryRecord = read_json(&args.record)?;
    let output = run(&behavior, &mut record, args.command).await?;

    if output.success && matches!(output.command, "save" | "regenerate") {
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&args.record, json)
            .with_context(|| format!("Failed to write record {}", args.record.display()))?;
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&output)?),
        _ => print_text(&output),
    }

    if !output.success {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(behavior: &Behavior, record: &mut MemoryRecord, command: Command) -> Result<Output> {
    let (name, success, value) = match command {
        Command::Name {
            variant,
            version,
            extension,
        } => {
            let key = match behavior {
                Behavior::Single(b) => b.file_full_name(&*record, version, extension.as_deref()),
                Behavior::Transform(b) => {
                    b.file_full_name(&*record, variant.as_deref(), version, extension.as_deref())?
                }
            };
            ("name", true, Some(key))
        }
        Command::Save {
            source,
            delete_source,
        } => {
            let delete_source = Some(delete_source);
            let saved = match behavior {
                Behavior::Single(b) => b.save_file(&mut *record, source, delete_source).await?,
                Behavior::Transform(b) => {
                    let report = b.save_file_detailed(&mut *record, source, delete_source).await?;
                    for failed in report.failed() {
                        tracing::error!(
                            transformation = %failed.name,
                            key = %failed.key,
                            error = failed.error.as_deref().unwrap_or("not stored"),
                            "Variant not saved"
                        );
                    }
                    report.is_success()
                }
            };
            ("save", saved, None)
        }
        Command::Delete => {
            let deleted = match behavior {
                Behavior::Single(b) => b.delete_file(&*record).await?,
                Behavior::Transform(b) => b.delete_file(&*record).await?,
            };
            ("delete", deleted, None)
        }
        Command::Regenerate { from } => {
            let regenerated = match behavior {
                Behavior::Single(_) => {
                    anyhow::bail!("regenerate requires --transformations")
                }
                Behavior::Transform(b) => {
                    b.regenerate_file_transformations(&mut *record, from.as_deref())
                        .await?
                }
            };
            ("regenerate", regenerated, None)
        }
        Command::Url { variant } => {
            let url = match behavior {
                Behavior::Single(b) => b.file_url(&*record).await?,
                Behavior::Transform(b) => b.file_url(&*record, variant.as_deref()).await?,
            };
            ("url", true, Some(url))
        }
    };

    let version = match behavior {
        Behavior::Single(b) => b.current_file_version(&*record),
        Behavior::Transform(b) => b.current_file_version(&*record),
    };

    Ok(Output {
        command: name,
        success,
        value,
        version,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Inline JSON when it parses, otherwise a path to a JSON file
fn load_transformations(source: &str) -> Result<TransformationSet> {
    let json = match serde_json::from_str::<serde_json::Value>(source) {
        Ok(_) => source.to_string(),
        Err(_) => std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read transformations from {}", source))?,
    };
    Ok(TransformationSet::from_json_str(&json)?)
}

fn print_text(output: &Output) {
    match &output.value {
        Some(value) => println!("{}", value),
        None if output.success => println!("{}: ok (version {})", output.command, output.version),
        None => println!("{}: failed (version {})", output.command, output.version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_transformations() {
        let set = load_transformations(r#"["origin", {"main": [800, 600]}]"#).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_transformations_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, r#"{"thumb": [100, 100]}"#).unwrap();

        let set = load_transformations(path.to_str().unwrap()).unwrap();
        assert_eq!(set.first().unwrap().name, "thumb");
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let args = Args::parse_from([
            "verstash",
            "--record",
            "item.json",
            "name",
            "--variant",
            "thumb",
            "--version",
            "3",
        ]);
        assert!(matches!(
            args.command,
            Command::Name { variant: Some(ref v), version: Some(3), .. } if v == "thumb"
        ));
        assert_eq!(args.transformer, TransformerKind::Image);
    }
}

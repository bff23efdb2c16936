//! `quill`: manage a story's characters, locations, plots, events, notes
//! and gallery from the terminal.
//!
//! # Usage
//!
//! ```text
//! quill story new "The Long Winter"
//! quill create <story> characters --field name=Ada --field age=36 --image ada.jpg
//! quill edit <story> characters <id> --field age= --remove-image
//! quill delete <story> characters <id>
//! ```
//!
//! Settings come from `quill.toml` (or `--config`) and `QUILL_*` variables,
//! e.g. `QUILL_STORE_PATH`, `QUILL_ENGINE__MAX_IMAGE_DIMENSION`.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use quill_core::Category;
use quill_engine::EngineConfig;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "quill", version, about = "Story content manager")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "quill.toml")]
  config: PathBuf,

  /// Answer yes to every confirmation.
  #[arg(short, long, global = true)]
  yes: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Manage stories.
  #[command(subcommand)]
  Story(StoryCommand),

  /// Print the fields of one category, or of all of them.
  Schema {
    #[arg(value_parser = parse_category)]
    category: Option<Category>,
  },

  /// List the records of a category, newest first.
  List {
    story:    String,
    #[arg(value_parser = parse_category)]
    category: Category,
  },

  /// Show one record.
  Show {
    story:    String,
    #[arg(value_parser = parse_category)]
    category: Category,
    id:       String,
  },

  /// Create a record.
  Create {
    story:    String,
    #[arg(value_parser = parse_category)]
    category: Category,
    /// `name=value`; may be repeated.
    #[arg(short, long = "field", value_parser = parse_field)]
    fields:   Vec<(String, String)>,
    /// Image file to attach.
    #[arg(long)]
    image:    Option<PathBuf>,
  },

  /// Change a record. Unnamed fields keep their values; `name=` clears one.
  Edit {
    story:        String,
    #[arg(value_parser = parse_category)]
    category:     Category,
    id:           String,
    #[arg(short, long = "field", value_parser = parse_field)]
    fields:       Vec<(String, String)>,
    #[arg(long, conflicts_with = "remove_image")]
    image:        Option<PathBuf>,
    /// Revert to the category placeholder image.
    #[arg(long)]
    remove_image: bool,
  },

  /// Delete a record and its image.
  Delete {
    story:    String,
    #[arg(value_parser = parse_category)]
    category: Category,
    id:       String,
  },
}

#[derive(Subcommand, Debug)]
enum StoryCommand {
  /// Create a story.
  New {
    title:    String,
    #[arg(long)]
    synopsis: Option<String>,
    #[arg(long)]
    cover:    Option<PathBuf>,
  },
  /// List your stories, newest first.
  List,
  Show {
    id: String,
  },
  Rename {
    id:    String,
    title: String,
  },
  /// Set (or with an empty string, clear) the synopsis.
  Synopsis {
    id:       String,
    synopsis: String,
  },
  /// Replace the cover image, or remove it with `--remove`.
  Cover {
    id:     String,
    #[arg(required_unless_present = "remove")]
    file:   Option<PathBuf>,
    #[arg(long)]
    remove: bool,
  },
  /// Delete a story. Its records are kept.
  Delete {
    id: String,
  },
}

fn parse_category(s: &str) -> Result<Category, String> {
  Category::parse(s).map_err(|e| e.to_string())
}

fn parse_field(s: &str) -> Result<(String, String), String> {
  s.split_once('=')
    .map(|(name, value)| (name.trim().to_owned(), value.to_owned()))
    .ok_or_else(|| format!("expected name=value, got {s:?}"))
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
  /// SQLite file holding documents and images.
  pub store_path:      PathBuf,
  /// Prefix for resolved image URLs.
  pub public_base_url: String,
  /// Owner recorded on new stories and used to filter `story list`.
  pub owner:           String,
  pub engine:          EngineConfig,
}

impl Default for CliConfig {
  fn default() -> Self {
    Self {
      store_path:      PathBuf::from("quill.db"),
      public_base_url: "quill://blobs".to_owned(),
      owner:           std::env::var("USER").unwrap_or_else(|_| "local".to_owned()),
      engine:          EngineConfig::default(),
    }
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr; stdout carries command output.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = quill_engine::config::layered(&cli.config).context("failed to read config file")?;
  let cfg: CliConfig = settings
    .try_deserialize()
    .context("failed to deserialise CliConfig")?;

  let store_path = expand_tilde(&cfg.store_path);
  let ctx = commands::Context::open(&store_path, &cfg, cli.yes)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  ctx.run(cli.command).await
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

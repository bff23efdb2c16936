//! Command handlers. Every destructive step goes through the editor's
//! confirmation gate, answered on stdin unless `--yes` was given.

use std::{
  io::{self, BufRead as _, Write as _},
  path::Path,
  sync::Arc,
};

use anyhow::{Context as _, bail};
use quill_core::{Category, CategoryRecord, Story};
use quill_engine::{
  AssetCleanup, AssetManager, CategoryList, DetailView, EntityEditor, Outcome, SourceFile,
  StoryService,
};
use quill_store_sqlite::SqliteStore;

use crate::{CliConfig, Command, StoryCommand};

type Editor = EntityEditor<SqliteStore, SqliteStore>;

pub struct Context {
  store:   Arc<SqliteStore>,
  assets:  Arc<AssetManager<SqliteStore>>,
  stories: StoryService<SqliteStore, SqliteStore>,
  list:    CategoryList<SqliteStore>,
  owner:   String,
  yes:     bool,
}

impl Context {
  pub async fn open(path: &Path, cfg: &CliConfig, yes: bool) -> anyhow::Result<Self> {
    let store = Arc::new(SqliteStore::open(path, cfg.public_base_url.clone()).await?);
    let assets = Arc::new(AssetManager::new(store.clone(), cfg.engine.clone()));
    Ok(Self {
      stories: StoryService::new(store.clone(), assets.clone()),
      list: CategoryList::new(store.clone()),
      store,
      assets,
      owner: cfg.owner.clone(),
      yes,
    })
  }

  pub async fn run(&self, command: Command) -> anyhow::Result<()> {
    match command {
      Command::Story(cmd) => self.story(cmd).await,
      Command::Schema { category } => {
        print_schema(category);
        Ok(())
      }
      Command::List { story, category } => self.list_records(&story, category).await,
      Command::Show { story, category, id } => {
        let record = self
          .list
          .get(&story, category, &id)
          .await?
          .with_context(|| format!("no {} with id {id}", category.singular()))?;
        self.print_record(&record).await;
        Ok(())
      }
      Command::Create { story, category, fields, image } => {
        self.create(&story, category, fields, image.as_deref()).await
      }
      Command::Edit { story, category, id, fields, image, remove_image } => {
        self.edit(&story, category, &id, fields, image.as_deref(), remove_image).await
      }
      Command::Delete { story, category, id } => self.delete(&story, category, &id).await,
    }
  }

  // ─── Stories ───────────────────────────────────────────────────────────────

  async fn story(&self, cmd: StoryCommand) -> anyhow::Result<()> {
    match cmd {
      StoryCommand::New { title, synopsis, cover } => {
        let mut story = self.stories.create(&self.owner, &title).await?;
        if let Some(synopsis) = synopsis {
          story = self.stories.set_synopsis(&story.id, &synopsis).await?;
        }
        if let Some(path) = cover {
          let staged = self.assets.stage(read_file(&path).await?).await?;
          story = self.stories.set_cover(&story.id, &staged).await?;
        }
        println!("{}", story.id);
      }
      StoryCommand::List => {
        for story in self.stories.list_for_owner(&self.owner).await? {
          println!("{}  {}  {}", story.id, created(story.created_at), story.display_title());
        }
      }
      StoryCommand::Show { id } => {
        let story = self.stories.get(&id).await?.with_context(|| format!("no story {id}"))?;
        print_story(&story);
      }
      StoryCommand::Rename { id, title } => {
        self.stories.rename(&id, &title).await?;
      }
      StoryCommand::Synopsis { id, synopsis } => {
        self.stories.set_synopsis(&id, &synopsis).await?;
      }
      StoryCommand::Cover { id, file, remove } => {
        if remove {
          let (_, cleanup) = self.stories.remove_cover(&id).await?;
          report_cleanup(&cleanup);
        } else if let Some(path) = file {
          let staged = self.assets.stage(read_file(&path).await?).await?;
          self.stories.set_cover(&id, &staged).await?;
        }
      }
      StoryCommand::Delete { id } => {
        let story = self.stories.get(&id).await?.with_context(|| format!("no story {id}"))?;
        let question = format!(
          "Delete story \"{}\"? Its records are kept.",
          story.display_title()
        );
        if self.ask(&question)? {
          report_cleanup(&self.stories.delete(&id).await?);
          println!("deleted");
        }
      }
    }
    Ok(())
  }

  // ─── Records ───────────────────────────────────────────────────────────────

  async fn list_records(&self, story: &str, category: Category) -> anyhow::Result<()> {
    let records = self.list.list(story, category).await?;
    if records.is_empty() {
      println!("no {category} yet");
    }
    for record in records {
      println!("{}  {}  {}", record.id, created(record.created_at), record.title());
    }
    Ok(())
  }

  async fn create(
    &self,
    story: &str,
    category: Category,
    fields: Vec<(String, String)>,
    image: Option<&Path>,
  ) -> anyhow::Result<()> {
    let editor: Editor =
      EntityEditor::create(self.store.clone(), self.assets.clone(), story, category);
    for (name, value) in &fields {
      editor.set_field(name, value).await?;
    }
    if let Some(path) = image {
      editor.choose_image(read_file(path).await?).await?;
    }

    match editor.request_save().await? {
      Outcome::Saved(record) => println!("{}", record.id),
      other => bail!("unexpected outcome {other:?}"),
    }
    Ok(())
  }

  async fn edit(
    &self,
    story: &str,
    category: Category,
    id: &str,
    fields: Vec<(String, String)>,
    image: Option<&Path>,
    remove_image: bool,
  ) -> anyhow::Result<()> {
    let editor = self.open_editor(story, category, id).await?;
    editor.begin_edit().await?;
    for (name, value) in &fields {
      editor.set_field(name, value).await?;
    }
    if let Some(path) = image {
      editor.choose_image(read_file(path).await?).await?;
    }
    if remove_image {
      editor.remove_image().await?;
    }

    if !editor.is_dirty().await {
      println!("nothing to change");
      return Ok(());
    }
    let outcome = editor.request_save().await?;
    self.settle(&editor, outcome, "Save changes?").await
  }

  async fn delete(&self, story: &str, category: Category, id: &str) -> anyhow::Result<()> {
    let editor = self.open_editor(story, category, id).await?;
    let title = editor.stored().await.map(|r| r.title()).unwrap_or_default();
    let outcome = editor.request_delete().await?;
    let question = format!("Delete {} \"{title}\"? This cannot be undone.", category.singular());
    self.settle(&editor, outcome, &question).await
  }

  async fn open_editor(&self, story: &str, category: Category, id: &str) -> anyhow::Result<Editor> {
    EntityEditor::open(self.store.clone(), self.assets.clone(), story, category, id)
      .await?
      .with_context(|| format!("no {} with id {id}", category.singular()))
  }

  /// Answer a pending confirmation and report the result.
  async fn settle(&self, editor: &Editor, outcome: Outcome, question: &str) -> anyhow::Result<()> {
    let outcome = match outcome {
      Outcome::AwaitingConfirmation(_) if self.ask(question)? => editor.confirm().await?,
      Outcome::AwaitingConfirmation(_) => editor.dismiss().await,
      other => other,
    };

    match outcome {
      Outcome::Saved(record) => self.print_record(&record).await,
      Outcome::Deleted(report) => {
        report_cleanup(&report.asset);
        println!("deleted {}", report.record_id);
      }
      Outcome::Dismissed | Outcome::Discarded => println!("nothing changed"),
      Outcome::AwaitingConfirmation(action) => bail!("{action:?} left unconfirmed"),
    }
    Ok(())
  }

  fn ask(&self, question: &str) -> anyhow::Result<bool> {
    if self.yes {
      return Ok(true);
    }
    print!("{question} [y/N] ");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("reading confirmation")?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
  }

  async fn print_record(&self, record: &CategoryRecord) {
    let view = DetailView::of(record);
    let image = self.assets.resolve(record.category, &record.image).await;
    print_view(&view, &image);
  }
}

// ─── Output ──────────────────────────────────────────────────────────────────

async fn read_file(path: &Path) -> anyhow::Result<SourceFile> {
  SourceFile::read(path)
    .await
    .with_context(|| format!("failed to read {}", path.display()))
}

fn created(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
  at.map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "----------------".to_owned())
}

fn report_cleanup(cleanup: &AssetCleanup) {
  if let AssetCleanup::Failed(reason) = cleanup {
    eprintln!("warning: image could not be removed: {reason}");
  }
}

fn print_view(view: &DetailView, image: &str) {
  println!("{}", view.heading);
  println!("  {:<12} {image}", "Image");
  for field in &view.fields {
    println!("  {:<12} {}", field.label, field.text);
  }
}

fn print_story(story: &Story) {
  println!("{}", story.display_title());
  println!("  {:<12} {}", "Id", story.id);
  println!("  {:<12} {}", "Created", created(story.created_at));
  println!(
    "  {:<12} {}",
    "Synopsis",
    story.synopsis.as_deref().unwrap_or("No synopsis")
  );
  if let Some(cover) = &story.cover {
    println!("  {:<12} {cover}", "Cover");
  }
}

fn print_schema(category: Option<Category>) {
  let categories = match category {
    Some(c) => vec![c],
    None => Category::ALL.to_vec(),
  };
  for category in categories {
    println!("{category}");
    for spec in category.fields() {
      let marker = if spec.required { "*" } else { " " };
      println!(
        "  {marker}{:<12} {:<9} {}",
        spec.name,
        format!("{:?}", spec.kind),
        spec.fallback
      );
    }
  }
}

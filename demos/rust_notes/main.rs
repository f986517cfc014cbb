//! Notes Application Example
//!
//! This example demonstrates:
//! - Opening a database and creating stores in the upgrade phase
//! - Typed stores backed by serde
//! - Index queries in both orders
//! - Cursor walks and error handling
//!
//! Run with `RUST_LOG=debug` to see the demo's and the adapter's lifecycle events.

use neoidb_core::{Config, Database, DbError, IndexDetails, Order};
use neoidb_engine::{IndexParameters, Key, KeyRange, MemoryEngine, StoreParameters};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use tracing_subscriber::EnvFilter;

/// A note with tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    title: String,
    content: String,
    tags: Vec<String>,
    priority: u8,
}

impl Note {
    fn new(title: &str, content: &str, tags: &[&str], priority: u8) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            content: content.to_string(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            priority,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("📝 Notes Application Example");
    println!("=============================\n");

    let db = Database::new(MemoryEngine::new(), Config::new("notes").version(1));
    db.open_with(1, |change, schema| {
        println!(
            "Upgrading from version {} to {}",
            change.old_version, change.new_version
        );
        schema.create_object_store(
            "notes",
            StoreParameters::new().key_path("id").auto_increment(true),
        )?;
        schema.create_index("notes", "by_priority", IndexParameters::new("priority"))?;
        schema.create_index(
            "notes",
            "by_tag",
            IndexParameters::new("tags").multi_entry(true),
        )
    })
    .await?;
    tracing::info!(database = db.name(), version = db.version(), "database ready");
    println!("Opened '{}' at version {}\n", db.name(), db.version());

    let notes = db.typed::<Note>("notes");
    let samples = [
        Note::new("Meeting Notes", "Discussed Q4 roadmap.", &["work", "meeting"], 2),
        Note::new("Recipe: Pasta", "Boil water, add pasta.", &["cooking"], 1),
        Note::new("Project Ideas", "Build a CLI tool.", &["work", "ideas"], 3),
        Note::new("Books to Read", "The Pragmatic Programmer.", &["reading"], 1),
    ];
    for note in &samples {
        let key = notes.add(note, None).await?;
        tracing::debug!(%key, title = %note.title, "note added");
        println!("Added {:<16} -> key {key}", note.title);
    }

    println!("\nBy priority, highest first:");
    let details = IndexDetails::new("by_priority").order(Order::Descending);
    for note in notes.get_all(None, Some(&details)).await? {
        println!("  [{}] {}", note.priority, note.title);
    }

    println!("\nTagged 'work':");
    let work = KeyRange::only("work");
    for note in notes
        .get_all(Some(&work), Some(&IndexDetails::new("by_tag")))
        .await?
    {
        println!("  {}", note.title);
    }

    println!("\nFirst two notes by key:");
    let mut shown = 0;
    db.open_cursor(
        "notes",
        |record| {
            println!("  {} => {}", record.key, record.value["title"]);
            shown += 1;
            if shown == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        },
        None,
    )
    .await?;

    if let Some(mut note) = notes.get(&Key::from(2)).await? {
        note.content.push_str(" Add garlic.");
        notes.put(&note, None).await?;
        println!("\nUpdated note 2: {}", note.content);
    }

    match db.get_by_key("archive", &Key::from(1)).await {
        Err(DbError::Precondition(err)) => {
            tracing::warn!(error = %err, "lookup rejected before any transaction");
            println!("\nExpected failure: {err}");
        }
        other => println!("\nUnexpected result: {other:?}"),
    }

    notes.delete(&Key::from(4)).await?;
    db.clear("notes").await?;
    println!(
        "Cleared; {} notes remain",
        db.get_all("notes", None, None).await?.len()
    );

    db.close();
    tracing::info!("database closed");
    Ok(())
}

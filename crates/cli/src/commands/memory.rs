//! `recall save|get|list|search|sweep|rebuild-index|stats` — Memory commands.

use super::{CommandResult, load_config, open_engine, preview};
use recall_core::memory::MemoryRecord;
use recall_memory::MemoryEngine;

pub async fn save(text: &str, source: &str, tags: &[String]) -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;

    match engine.save(text, source, tags).await? {
        Some(id) => {
            persist(&engine).await;
            println!("✅ Saved memory #{id}");
        }
        None => println!("⚠️  Nothing saved: text is empty"),
    }

    Ok(())
}

pub async fn get(id: u64) -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;

    match engine.get(id).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => {
            println!("❌ No memory with id #{id}");
        }
    }

    Ok(())
}

pub async fn list(limit: usize) -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;

    let records = engine.list(limit).await?;
    println!("🧠 Recent memories ({})", records.len());
    println!("======================");
    if records.is_empty() {
        println!("   No memories stored yet.");
    }
    for record in &records {
        print_record(record);
    }

    Ok(())
}

pub async fn search(query: &str, limit: usize, json: bool) -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;

    let hits = engine.search(query, limit).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    println!("🔍 Searching memories for: \"{query}\"");
    println!();
    if hits.is_empty() {
        println!("   No memories found.");
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "  {:>2}. [score: {:.3}] #{} {}",
            i + 1,
            hit.rank_score,
            hit.record.id,
            preview(&hit.record.text, 80)
        );
        if !hit.record.tags.is_empty() {
            println!("      tags: {}", hit.record.tags.join(", "));
        }
    }

    Ok(())
}

pub async fn sweep(max_age_days: Option<u32>) -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;

    let days = max_age_days.unwrap_or(config.retention.max_age_days);
    let deleted = engine.sweep(chrono::Duration::days(i64::from(days))).await?;
    persist(&engine).await;

    println!("🧹 Retention sweep: deleted {deleted} memories older than {days} days");
    Ok(())
}

pub async fn rebuild_index() -> CommandResult {
    let config = load_config()?;
    if !config.index.enabled {
        println!("⚠️  Index is disabled (index.enabled = false); searches brute-force");
        return Ok(());
    }
    let engine = open_engine(&config).await?;

    let indexed = engine.rebuild_index().await?;
    persist(&engine).await;

    println!("🔧 Rebuilt vector index: {indexed} records");
    Ok(())
}

pub async fn stats() -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;
    let stats = engine.stats().await?;

    println!("🧠 Memory Statistics");
    println!("====================");
    println!("  Backend:     {}", stats.backend);
    println!("  Records:     {}", stats.records);
    println!("  Indexed:     {}", stats.indexed);
    match stats.dimension {
        Some(dim) => println!("  Dimension:   {dim}"),
        None => println!("  Dimension:   (no index)"),
    }
    println!("  Search path: {}", stats.search_path);
    println!("  Embeddings:  {}", stats.embedding_stages.join(" → "));

    if config.store.backend != "memory" {
        let path = config.store.resolved_path();
        if path.exists() {
            let size_kb = std::fs::metadata(&path)?.len() as f64 / 1024.0;
            println!("  Store file:  {} ({:.1} KB)", path.display(), size_kb);
        } else {
            println!("  Store file:  (not created yet)");
        }
    }

    Ok(())
}

fn print_record(record: &MemoryRecord) {
    println!(
        "  #{:<5} {} [{}] {}",
        record.id,
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.source,
        preview(&record.text, 80)
    );
    if !record.tags.is_empty() {
        println!("         tags: {}", record.tags.join(", "));
    }
}

/// Snapshot failures never fail a command; the next open rebuilds.
async fn persist(engine: &MemoryEngine) {
    if let Err(e) = engine.persist_index().await {
        tracing::warn!(error = %e, "Failed to write index snapshot");
    }
}

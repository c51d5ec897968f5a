//! `recall init` — Write a default config file.

use super::CommandResult;
use recall_config::AppConfig;
use std::path::Path;

pub async fn run(force: bool) -> CommandResult {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("🧠 recall — Setup");
    println!("=================\n");

    if write_default_config(&config_path, force)? {
        println!("✅ Wrote default config: {}", config_path.display());
    } else {
        println!("  Config already exists: {}", config_path.display());
        println!("  Use --force to overwrite it with defaults.");
    }

    println!("\nNext steps:");
    println!("  • Set OPENAI_API_KEY or OLLAMA_HOST for semantic embeddings");
    println!("  • recall save \"something worth remembering\"");
    println!("  • recall search \"worth remembering\"");
    Ok(())
}

/// Write the default config to `path`. Returns `false` when a file is
/// already there and `force` is off.
fn write_default_config(path: &Path, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tally::conversation::Conversation;

pub fn ensure_session_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    let config_dir = home_dir.join(".config").join("tally").join("sessions");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// The file for a named session. Names are plain file stems and may not
/// point outside the session directory.
pub fn session_path(session_dir: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(|c: char| c == '/' || c == '\\' || c.is_control())
    {
        bail!("Invalid session name '{}': use a plain name without path separators", name);
    }
    Ok(session_dir.join(format!("{}.jsonl", name)))
}

/// Read a saved conversation; a session that was never saved starts empty
pub fn load_conversation(session_file: &Path) -> Result<Conversation> {
    if !session_file.exists() {
        return Ok(Conversation::new());
    }
    let file = File::open(session_file)
        .with_context(|| format!("Failed to open session file {}", session_file.display()))?;
    Conversation::read_jsonl(BufReader::new(file))
        .with_context(|| format!("Corrupt session file {}", session_file.display()))
}

/// Rewrite the session file with the whole conversation, one message per line
pub fn persist_conversation(session_file: &Path, conversation: &Conversation) -> Result<()> {
    let file = File::create(session_file)?; // Create or truncate the file
    let mut writer = BufWriter::new(file);
    conversation.write_jsonl(&mut writer)?;
    writer.flush()?;
    Ok(())
}

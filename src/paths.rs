use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn database_file_path() -> Result<PathBuf> {
    if let Some(custom) = env::var_os("WATCHTRACK_DB")
        && !custom.is_empty()
    {
        return Ok(PathBuf::from(custom));
    }

    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("watchtrack").join("watchtrack.db"))
}

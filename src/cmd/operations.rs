use std::io;

use crate::domain::operation::catalog;
use crate::error::AppResult;

pub fn run() -> AppResult<()> {
    let stdout = io::stdout().lock();
    serde_json::to_writer_pretty(stdout, &catalog()).map_err(io::Error::from)?;
    println!();
    Ok(())
}

//! `cves date`

use anyhow::Result;
use chrono::{Local, Utc};

use super::output::Output;
use crate::domain::time::to_iso;

pub fn run(output: &Output) -> Result<()> {
    let now = Utc::now();
    let iso = to_iso(&now);
    let local = now.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %:z").to_string();

    if output.is_json() {
        output.data(&serde_json::json!({ "iso": iso, "local": local }));
    } else {
        output.row(&["ISO:", &iso]);
        output.row(&["Local:", &local]);
    }
    Ok(())
}

use anyhow::Result;
use std::path::Path;

use crate::LinkConfig;

pub fn check_link(cfg: &LinkConfig) -> Result<()> {
    match cfg.kind.as_str() {
        "radio" => {
            let dev = cfg.serial_dev.as_deref().unwrap_or("");
            anyhow::ensure!(!dev.is_empty(), "link.serial_dev missing");
            anyhow::ensure!(Path::new(dev).exists(), "link.serial_dev not present: {}", dev);
            anyhow::ensure!(cfg.baud.unwrap_or(9600) > 0, "link.baud invalid");
        }
        "sim" => {}
        other => anyhow::bail!("unknown link.kind: {}", other),
    }
    let t = cfg.contact_timeout_ms();
    anyhow::ensure!((500..=30_000).contains(&t), "link.contact_timeout_ms should be 500..30000");
    Ok(())
}

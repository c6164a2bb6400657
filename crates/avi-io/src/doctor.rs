use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;

use crate::IoConfig;

pub fn check_io(cfg: &IoConfig) -> Result<()> {
    match cfg.sensor.as_str() {
        "profile" => {
            if let Some(p) = &cfg.profile {
                let dropout = p.dropout.unwrap_or(0.0);
                anyhow::ensure!((0.0..=1.0).contains(&dropout), "io.profile.dropout should be 0..1");
            }
        }
        "trace" => {
            let f = cfg.trace_file.as_deref().unwrap_or("");
            anyhow::ensure!(Path::new(f).is_file(), "io.trace_file missing: {}", f);
        }
        other => anyhow::bail!("unknown io.sensor: {}", other),
    }

    match cfg.outputs.as_str() {
        "gpio" => {
            let g = cfg.gpio.as_ref().ok_or_else(|| anyhow::anyhow!("io.gpio section missing"))?;
            anyhow::ensure!(g.drogue_pin.is_some(), "io.gpio.drogue_pin missing");
            anyhow::ensure!(g.main_pin.is_some(), "io.gpio.main_pin missing");
            let pins = [
                g.drogue_pin, g.main_pin, g.backup_pin,
                g.drogue_sense_pin, g.main_sense_pin, g.backup_sense_pin,
                Some(g.buzzer_pin),
            ];
            let mut seen = HashSet::new();
            for p in pins.into_iter().flatten() {
                anyhow::ensure!(seen.insert(p), "io.gpio pin {} used twice", p);
            }
            anyhow::ensure!(Path::new("/sys/class/gpio").exists(), "sysfs gpio not available");
        }
        "bench" => {}
        other => anyhow::bail!("unknown io.outputs: {}", other),
    }
    Ok(())
}

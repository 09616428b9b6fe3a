use anyhow::Result;
use autocull_core::Library;

use super::table;

pub fn set(library: &Library, key: &str, value: &str) -> Result<()> {
    library.set_config(key, value)?;
    println!("{key} = {}", value.trim());
    Ok(())
}

pub fn show(library: &Library) -> Result<()> {
    let config = library.config()?;
    let stored = library.catalog().list_config()?;

    let mut table = table(["Key", "Value", "Source"]);
    for (key, value) in config.entries() {
        let source = if stored.iter().any(|(k, _)| k == key) {
            "catalog"
        } else {
            "default"
        };
        table.add_row(vec![key.to_string(), value, source.to_string()]);
    }
    println!("{table}");

    Ok(())
}

use anyhow::Result;
use autocull_core::Library;

use super::{format_timestamp, table};

pub fn run(library: &Library) -> Result<()> {
    let collections = library.collections()?;

    if collections.is_empty() {
        println!("No collections yet. Run `autocull collection add <name>` first.");
        return Ok(());
    }

    let mut table = table(["ID", "Name", "Photos", "Scored", "Groups", "Created"]);
    for collection in &collections {
        let stats = library.stats(collection.id)?;
        table.add_row(vec![
            collection.id.to_string(),
            collection.name.clone(),
            stats.total_photos.to_string(),
            stats.scored_photos.to_string(),
            stats.total_groups.to_string(),
            format_timestamp(collection.created_at),
        ]);
    }
    println!("{table}");

    Ok(())
}

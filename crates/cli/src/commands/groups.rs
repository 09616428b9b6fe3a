use anyhow::Result;
use autocull_core::Library;

use super::{format_timestamp, table};

pub fn run(library: &Library, collection: &str) -> Result<()> {
    let collection = library.collection_named(collection)?;
    let groups = library.groups(collection.id)?;

    if groups.is_empty() {
        println!("No duplicate groups found. Run `autocull duplicates {}` first.", collection.name);
        return Ok(());
    }

    let mut table = table(["ID", "Method", "Members", "Best", "Created"]);
    for group in groups.iter().filter(|g| g.members.len() > 1) {
        let best = library
            .best_in_group(group.id)?
            .map(|id| library.photo(id).map(|p| p.file_name))
            .transpose()?
            .unwrap_or_else(|| "?".to_string());
        table.add_row(vec![
            group.id.to_string(),
            group.method.clone(),
            group.members.len().to_string(),
            best,
            format_timestamp(group.created_at),
        ]);
    }
    println!("{table}");

    let singletons = groups.iter().filter(|g| g.members.len() == 1).count();
    if singletons > 0 {
        println!("{singletons} photo(s) have no near duplicate.");
    }

    Ok(())
}

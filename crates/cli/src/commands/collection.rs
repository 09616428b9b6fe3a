use anyhow::Result;
use autocull_core::Library;

pub fn add(library: &Library, name: &str) -> Result<()> {
    let collection = library.add_collection(name)?;
    println!("Created collection {} (#{})", collection.name, collection.id);
    Ok(())
}

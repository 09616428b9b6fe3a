use anyhow::Result;
use autocull_core::domain::PhotoId;
use autocull_core::Library;

pub fn run(library: &Library, photo: i64) -> Result<()> {
    let photo = library.photo(PhotoId(photo))?;
    let similar = library.similar_photos(photo.id)?;

    if similar.iter().all(|s| s.photos.is_empty()) {
        println!("No near duplicates of {}.", photo.file_name);
        return Ok(());
    }

    for entry in similar.iter().filter(|s| !s.photos.is_empty()) {
        println!("Group #{} ({})", entry.group.id, entry.group.method);
        for other in &entry.photos {
            println!("  #{} {}", other.id, other.path.display());
        }
    }

    Ok(())
}

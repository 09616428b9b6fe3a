use anyhow::Result;
use autocull_core::domain::GroupId;
use autocull_core::scoring::Metric;
use autocull_core::Library;

pub fn run(library: &Library, id: i64) -> Result<()> {
    let group = library.group(GroupId(id))?;
    let best = library.best_in_group(group.id)?;

    println!("Group #{} ({}, {} members)", group.id, group.method, group.members.len());
    println!("{}", "-".repeat(60));

    for &member in &group.members {
        let photo = library.photo(member)?;
        let sharpness = library
            .scores(member)?
            .get(Metric::LaplacianVar)
            .map(|v| format!("{v:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let marker = if Some(member) == best { " [BEST]" } else { "" };
        println!(
            "  #{} {} ({}, sharpness {}){}",
            photo.id,
            photo.path.display(),
            photo.format,
            sharpness,
            marker,
        );
    }

    Ok(())
}

use anyhow::Result;
use autocull_core::domain::PhotoId;
use autocull_core::scoring::Metric;
use autocull_core::Library;

use super::table;

pub fn run(library: &Library, photo: i64) -> Result<()> {
    let photo = library.photo(PhotoId(photo))?;
    let scores = library.scores(photo.id)?;

    if scores.is_empty() {
        println!("{} has not been scored.", photo.file_name);
        return Ok(());
    }

    println!("{} ({})", photo.file_name, photo.path.display());
    let mut table = table(["Metric", "Value"]);
    for metric in Metric::ALL {
        let value = scores
            .get(metric)
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "unavailable".to_string());
        table.add_row(vec![metric.name().to_string(), value]);
    }
    println!("{table}");

    Ok(())
}

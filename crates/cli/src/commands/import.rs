use std::path::Path;

use anyhow::Result;
use autocull_core::control::CancelToken;
use autocull_core::{ImportProgress, Library};
use indicatif::{ProgressBar, ProgressStyle};

pub fn run(library: &Library, collection: &str, folder: &Path) -> Result<()> {
    let collection = library.collection_named(collection)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let report = library.import_folder(
        collection.id,
        folder,
        Some(&mut |progress| match progress {
            ImportProgress::Started { total } => {
                pb.set_length(total as u64);
                pb.set_position(0);
                pb.set_message(format!("Scoring {}", folder.display()));
            }
            ImportProgress::FileProcessed { .. } => pb.inc(1),
            ImportProgress::Finished => pb.finish_with_message("import complete"),
        }),
        &CancelToken::new(),
    )?;

    println!(
        "Imported {} photo(s) into {}, {} scored.",
        report.imported.len(),
        collection.name,
        report.scored
    );
    if !report.skipped.is_empty() {
        println!("Skipped {}:", report.skipped.len());
        for skip in &report.skipped {
            let what = skip
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .or_else(|| skip.photo_id.map(|id| format!("photo #{id}")))
                .unwrap_or_default();
            println!("  {what}: {}", skip.reason);
        }
    }
    if report.cancelled {
        println!("Import was cancelled before all files were processed.");
    }

    Ok(())
}

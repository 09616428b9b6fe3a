use anyhow::Result;
use autocull_core::control::CancelToken;
use autocull_core::Library;
use indicatif::ProgressBar;

pub fn run(
    library: &Library,
    collection: &str,
    threshold: Option<u32>,
    method: Option<String>,
) -> Result<()> {
    let collection = library.collection_named(collection)?;

    let detector = library.detector_with(threshold, method.as_deref())?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!(
        "Clustering {} (threshold {}, method {})",
        collection.name, detector.threshold, detector.method
    ));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    let report = library.find_duplicates_with(collection.id, &detector, &CancelToken::new());
    spinner.finish_and_clear();
    let report = report?;

    println!(
        "{} new group(s), {} membership(s) added, {} photo(s) assigned.",
        report.created_groups.len(),
        report.changed_count(),
        report.assignments.len()
    );

    let groups: Vec<_> = report
        .group_summary()
        .into_iter()
        .filter(|(_, (count, _))| *count > 1)
        .collect();
    if !groups.is_empty() {
        let mut table = super::table(["Group", "Photos", "Confidence"]);
        for (group, (count, confidence)) in groups {
            table.add_row(vec![
                format!("#{group}"),
                count.to_string(),
                confidence.map_or("-", |c| c.as_str()).to_string(),
            ]);
        }
        println!("{table}");
    }

    if !report.skipped.is_empty() {
        println!(
            "{} photo(s) have no fingerprint and were left out.",
            report.skipped.len()
        );
    }

    for conflict in &report.conflicts {
        let groups: Vec<String> = conflict.groups.iter().map(|g| format!("#{g}")).collect();
        let photos: Vec<String> = conflict.photos.iter().map(|p| p.to_string()).collect();
        println!(
            "Conflict: photos [{}] span groups {}; left unassigned.",
            photos.join(", "),
            groups.join(", ")
        );
    }

    Ok(())
}

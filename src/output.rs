use colored::Colorize;

use crate::mirror::{JobOutcome, JobReport};

/// Print one outcome line per processed repository
pub fn print_reports(reports: &[JobReport]) {
    if reports.is_empty() {
        println!("No repositories were processed.");
        return;
    }

    println!("\n{}", "─".repeat(60));
    for report in reports {
        match &report.outcome {
            JobOutcome::Succeeded => {
                println!(
                    "  [{}] {:<40} {} tags",
                    "  OK  ".green().bold(),
                    report.repo,
                    report.tags_mirrored
                );
            }
            JobOutcome::SkippedUnsupportedHost => {
                println!(
                    "  [{}] {:<40} unsupported host",
                    " SKIP ".yellow().bold(),
                    report.repo
                );
            }
            JobOutcome::SetupFailed(reason) => {
                println!(
                    "  [{}] {:<40} {}",
                    " FAIL ".red().bold(),
                    report.repo,
                    reason.dimmed()
                );
            }
            JobOutcome::TransferFailed(tags) => {
                println!(
                    "  [{}] {:<40} {} tags mirrored, failed: {}",
                    " FAIL ".red().bold(),
                    report.repo,
                    report.tags_mirrored,
                    tags.join(", ").dimmed()
                );
            }
        }
    }
}

/// Print final mirror totals
pub fn print_summary(reports: &[JobReport]) {
    let mirrored = reports
        .iter()
        .filter(|r| matches!(r.outcome, JobOutcome::Succeeded))
        .count();
    let skipped = reports
        .iter()
        .filter(|r| matches!(r.outcome, JobOutcome::SkippedUnsupportedHost))
        .count();
    let failed = reports.iter().filter(|r| r.failed()).count();
    let tags: usize = reports.iter().map(|r| r.tags_mirrored).sum();

    println!("\n{}", "═".repeat(60));
    println!(
        "{} Mirrored {} repositories ({} tags), skipped {}, {} failed",
        "SUMMARY:".bold(),
        mirrored.to_string().green().bold(),
        tags,
        skipped,
        if failed > 0 {
            failed.to_string().red().bold().to_string()
        } else {
            failed.to_string()
        }
    );
}

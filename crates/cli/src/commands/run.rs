use anyhow::Result;
use bwtag_core::persist::TagStatus;
use bwtag_core::pipeline::{PassProgress, PassReport};
use bwtag_core::{PhotoOutcome, Tagger};
use indicatif::{ProgressBar, ProgressStyle};

pub fn run(tagger: &mut Tagger, verbose: bool) -> Result<()> {
    let report = if verbose {
        tagger.run(Some(&mut |progress: PassProgress| {
            if let PassProgress::PhotoDone { photo_id, outcome } = progress {
                println!("  {photo_id}: {}", describe(&outcome));
            }
        }))?
    } else {
        run_with_spinner(tagger)?
    };

    print_summary(&report);
    Ok(())
}

fn run_with_spinner(tagger: &mut Tagger) -> Result<PassReport> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {msg}")?);
    pb.set_message("Looking for unclassified photos...");

    let report = tagger.run(Some(&mut |progress: PassProgress| match progress {
        PassProgress::PageStart { page, size } => {
            pb.set_prefix(format!("page {page}"));
            pb.set_message(format!("0/{size}"));
        }
        PassProgress::PhotoDone { photo_id, outcome } => {
            if needs_attention(&outcome) {
                pb.println(format!("  {photo_id}: {}", describe(&outcome)));
            }
            pb.inc(1);
            pb.set_message(format!("{} photos examined", pb.position()));
        }
        PassProgress::PageComplete { page, stats } => {
            pb.println(format!(
                "Page {page}: {} photos, {} grayscale, {} color, {} skipped",
                stats.examined, stats.grayscale, stats.color, stats.skipped
            ));
        }
        PassProgress::Complete { .. } => pb.finish_and_clear(),
    }))?;

    Ok(report)
}

fn needs_attention(outcome: &PhotoOutcome) -> bool {
    matches!(
        outcome,
        PhotoOutcome::Skipped { .. }
            | PhotoOutcome::Classified {
                tag: Some(TagStatus::Failed(_)),
                ..
            }
    )
}

fn describe(outcome: &PhotoOutcome) -> String {
    match outcome {
        PhotoOutcome::Classified { grayscale: false, .. } => "color".to_string(),
        PhotoOutcome::Classified {
            grayscale: true,
            tag,
        } => match tag {
            Some(TagStatus::Applied) | None => "grayscale, tagged".to_string(),
            Some(TagStatus::AlreadyPresent) => "grayscale, already tagged".to_string(),
            Some(TagStatus::Failed(reason)) => format!("grayscale, tag failed: {reason}"),
        },
        PhotoOutcome::Skipped { stage, reason } => format!("skipped while {stage}: {reason}"),
    }
}

fn print_summary(report: &PassReport) {
    if report.examined == 0 {
        println!("No photos to process.");
        return;
    }
    println!(
        "Processed {} photos in {} pages: {} grayscale ({} newly tagged), {} color, {} skipped.",
        report.examined,
        report.pages,
        report.grayscale,
        report.tagged,
        report.color,
        report.skipped
    );
    if report.tag_failures > 0 {
        println!(
            "{} grayscale photos could not be tagged; their flag is set and they will not be retried.",
            report.tag_failures
        );
    }
    println!("Processing completed successfully.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwtag_core::pipeline::Stage;

    #[test]
    fn test_describe_outcomes() {
        assert_eq!(
            describe(&PhotoOutcome::Classified {
                grayscale: false,
                tag: None
            }),
            "color"
        );
        assert_eq!(
            describe(&PhotoOutcome::Classified {
                grayscale: true,
                tag: Some(TagStatus::AlreadyPresent)
            }),
            "grayscale, already tagged"
        );
        assert_eq!(
            describe(&PhotoOutcome::Skipped {
                stage: Stage::Acquiring,
                reason: "HTTP 500".into()
            }),
            "skipped while acquiring: HTTP 500"
        );
    }

    #[test]
    fn test_only_failures_printed_above_spinner() {
        assert!(needs_attention(&PhotoOutcome::Skipped {
            stage: Stage::Persisting,
            reason: "lock wait timeout".into()
        }));
        assert!(needs_attention(&PhotoOutcome::Classified {
            grayscale: true,
            tag: Some(TagStatus::Failed("disk full".into()))
        }));
        assert!(!needs_attention(&PhotoOutcome::Classified {
            grayscale: true,
            tag: Some(TagStatus::Applied)
        }));
    }
}

//! Human and plain-text rendering of reports.

use std::path::Path;

use statecrypt_core::orchestrator::{ArtifactStatus, BatchSummary, SyncState};
use statecrypt_core::{Assessment, BatchReport, CheckReport, Outcome};

use crate::ui::format::{count, display_path, format_time};
use crate::ui::{badge, kv, print, table, Badge, UiContext};

/// Stable lowercase name of an outcome.
pub fn outcome_name(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Encrypted => "encrypted",
        Outcome::Decrypted => "decrypted",
        Outcome::Unchanged => "unchanged",
        Outcome::Removed => "removed",
        Outcome::Skipped { .. } => "skipped",
        Outcome::Conflicted { .. } => "conflicted",
        Outcome::Declined => "declined",
        Outcome::Failed { .. } => "failed",
    }
}

fn outcome_badge(outcome: &Outcome) -> Badge {
    match outcome {
        Outcome::Encrypted | Outcome::Decrypted | Outcome::Removed => Badge::Ok,
        Outcome::Unchanged | Outcome::Skipped { .. } => Badge::Info,
        Outcome::Conflicted { .. } | Outcome::Declined => Badge::Warn,
        Outcome::Failed { .. } => Badge::Err,
    }
}

/// One line describing a single artifact's outcome.
pub fn outcome_line(ctx: &UiContext, root: &Path, path: &Path, outcome: &Outcome) -> String {
    let shown = display_path(path, root);
    if !ctx.mode.is_pretty() {
        let mut line = format!("status={} path={}", outcome_name(outcome), shown);
        match outcome {
            Outcome::Skipped { reason } => line.push_str(&format!(" reason=\"{}\"", reason)),
            Outcome::Conflicted { side_file } => {
                line.push_str(&format!(" side_file={}", display_path(side_file, root)))
            }
            Outcome::Failed { error } => line.push_str(&format!(" error=\"{}\"", error)),
            _ => {}
        }
        return line;
    }

    let message = match outcome {
        Outcome::Skipped { reason } => format!("{} skipped ({})", shown, reason),
        Outcome::Conflicted { side_file } => format!(
            "{} is newer than its encrypted twin; decrypted copy saved as {}",
            shown,
            display_path(side_file, root)
        ),
        Outcome::Declined => format!("{} not encrypted (newer twin kept)", shown),
        Outcome::Failed { error } => format!("{} failed: {}", shown, error),
        other => format!("{} {}", shown, outcome_name(other)),
    };
    badge(ctx, outcome_badge(outcome), &message)
}

fn summary_line(ctx: &UiContext, summary: &BatchSummary) -> String {
    let counts = [
        ("encrypted", summary.encrypted),
        ("decrypted", summary.decrypted),
        ("unchanged", summary.unchanged),
        ("removed", summary.removed),
        ("skipped", summary.skipped),
        ("conflicted", summary.conflicted),
        ("declined", summary.declined),
        ("failed", summary.failed),
    ];

    if !ctx.mode.is_pretty() {
        return counts
            .iter()
            .map(|(name, n)| format!("{}={}", name, n))
            .collect::<Vec<_>>()
            .join(" ");
    }

    let parts: Vec<String> = counts
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(name, n)| format!("{} {}", n, name))
        .collect();
    let kind = if summary.failed > 0 || summary.declined > 0 {
        Badge::Err
    } else if summary.conflicted > 0 {
        Badge::Warn
    } else {
        Badge::Ok
    };
    if parts.is_empty() {
        badge(ctx, Badge::Info, "No artifacts found")
    } else {
        badge(ctx, kind, &format!("Done: {}", parts.join(", ")))
    }
}

pub fn print_batch(ctx: &UiContext, root: &Path, report: &BatchReport) {
    for result in &report.results {
        let noisy = matches!(
            result.outcome,
            Outcome::Failed { .. } | Outcome::Declined | Outcome::Conflicted { .. }
        );
        if ctx.quiet && !noisy {
            continue;
        }
        print(ctx, &outcome_line(ctx, root, &result.path, &result.outcome));
    }
    print(ctx, &summary_line(ctx, &report.summary));
}

pub fn print_check(ctx: &UiContext, root: &Path, report: &CheckReport) {
    let pretty = ctx.mode.is_pretty();
    for path in &report.missing {
        let shown = display_path(path, root);
        if pretty {
            print(ctx, &badge(ctx, Badge::Err, &format!("{} has no encrypted twin", shown)));
        } else {
            print(ctx, &format!("status=missing path={}", shown));
        }
    }
    for path in &report.stale {
        let shown = display_path(path, root);
        if pretty {
            print(
                ctx,
                &badge(ctx, Badge::Warn, &format!("{} changed since its last encryption", shown)),
            );
        } else {
            print(ctx, &format!("status=stale path={}", shown));
        }
    }
    if !ctx.quiet {
        for path in &report.empty {
            let shown = display_path(path, root);
            if pretty {
                print(ctx, &badge(ctx, Badge::Info, &format!("{} is empty (ignored)", shown)));
            } else {
                print(ctx, &format!("status=empty path={}", shown));
            }
        }
    }

    if pretty {
        let summary = format!(
            "{} covered, {} missing",
            count(report.covered.len(), "artifact"),
            report.missing.len()
        );
        let kind = if report.is_ok() { Badge::Ok } else { Badge::Err };
        print(ctx, &badge(ctx, kind, &summary));
    } else {
        print(
            ctx,
            &format!(
                "missing={} covered={} stale={} empty={}",
                report.missing.len(),
                report.covered.len(),
                report.stale.len(),
                report.empty.len()
            ),
        );
    }
}

fn state_name(state: SyncState) -> &'static str {
    match state {
        SyncState::PlaintextOnly => "plaintext only",
        SyncState::CiphertextOnly => "encrypted only",
        SyncState::InSync => "in sync",
        SyncState::PlaintextNewer => "plaintext newer",
        SyncState::CiphertextNewer => "encrypted newer",
    }
}

/// The command that would bring the artifact in sync, if any.
fn next_step(status: &ArtifactStatus) -> &'static str {
    match status.state {
        SyncState::InSync => "-",
        SyncState::PlaintextOnly | SyncState::PlaintextNewer => "encrypt",
        SyncState::CiphertextOnly => "decrypt",
        SyncState::CiphertextNewer => match status.decrypt {
            Some(Assessment::SafeToDecrypt) => "decrypt",
            _ => "review",
        },
    }
}

pub fn print_status(ctx: &UiContext, root: &Path, statuses: &[ArtifactStatus]) {
    if statuses.is_empty() {
        print(ctx, &badge(ctx, Badge::Info, "No artifacts found"));
        return;
    }

    if !ctx.mode.is_pretty() {
        for status in statuses {
            print(
                ctx,
                &format!(
                    "path={} state={} next={}",
                    display_path(&status.plaintext, root),
                    state_name(status.state).replace(' ', "_"),
                    next_step(status)
                ),
            );
        }
        return;
    }

    let rows: Vec<Vec<String>> = statuses
        .iter()
        .map(|status| {
            vec![
                display_path(&status.plaintext, root),
                state_name(status.state).to_string(),
                format_time(status.plaintext_modified),
                format_time(status.ciphertext_modified),
                next_step(status).to_string(),
            ]
        })
        .collect();
    print(
        ctx,
        &table(
            ctx,
            &["Artifact", "State", "Plaintext (UTC)", "Encrypted (UTC)", "Next"],
            &rows,
        ),
    );
    print(ctx, &kv(ctx, "Artifacts", &statuses.len().to_string()));
}

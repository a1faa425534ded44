use std::fmt::Write;

use crate::alerts::AlertPolicy;
use crate::journal::Dashboard;
use crate::models::JournalEntry;

const HISTOGRAM_WIDTH: i64 = 30;

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn entry_table(output: &mut String, entries: &[JournalEntry]) {
    let _ = writeln!(output, "| Entry | Emotion | Timestamp |");
    let _ = writeln!(output, "| --- | --- | --- |");
    for entry in entries {
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            escape_cell(&entry.text),
            entry.emotion_label,
            entry.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

pub fn build_report(dashboard: &Dashboard, policy: &AlertPolicy) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Doctor's Dashboard");
    let _ = writeln!(
        output,
        "Generated {} (alerts use a {}-day window, threshold {})",
        dashboard.generated_at.format("%Y-%m-%d %H:%M UTC"),
        policy.window().num_days(),
        policy.threshold()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Student Alerts");

    if dashboard.alerts.is_empty() {
        let _ = writeln!(
            output,
            "No students are currently showing signs of distress."
        );
    } else {
        let mut alerts = dashboard.alerts.clone();
        alerts.sort_by(|a, b| b.low_emotion_count.cmp(&a.low_emotion_count));
        for alert in alerts.iter() {
            let _ = writeln!(output, "- {}", alert.message());
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall Emotion Distribution");

    if dashboard.distribution.is_empty() {
        let _ = writeln!(output, "No entries recorded yet.");
    } else {
        let max = dashboard
            .distribution
            .iter()
            .map(|row| row.count)
            .max()
            .unwrap_or(1)
            .max(1);
        for row in dashboard.distribution.iter() {
            let bar = (row.count * HISTOGRAM_WIDTH / max).max(1) as usize;
            let _ = writeln!(
                output,
                "- {:<14} {} {}",
                row.emotion_label,
                "#".repeat(bar),
                row.count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Student Entries");

    if dashboard.entries_by_subject.is_empty() {
        let _ = writeln!(output, "No student entries recorded yet.");
    } else {
        for (subject_id, entries) in dashboard.entries_by_subject.iter() {
            let _ = writeln!(output);
            let _ = writeln!(output, "### Entries for {}", subject_id);
            entry_table(&mut output, entries);
        }
    }

    output
}

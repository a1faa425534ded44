//! CSV export of the entry log and offline alert evaluation over an export.

use std::io::{Read, Write};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::alerts::{Moment, SubjectHistories};
use crate::error::{JournalError, Result};
use crate::models::{JournalEntry, Role};

#[derive(Debug, Serialize, Deserialize)]
struct CsvEntry {
    id: String,
    subject_id: String,
    role: String,
    text: String,
    emotion_label: String,
    created_at: String,
}

pub fn write_csv<W: Write>(writer: W, entries: &[JournalEntry]) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_writer(writer);
    for entry in entries {
        writer.serialize(CsvEntry {
            id: entry.id.to_string(),
            subject_id: entry.subject_id.clone(),
            role: entry.role.to_string(),
            text: entry.text.clone(),
            emotion_label: entry.emotion_label.clone(),
            created_at: entry.created_at.to_rfc3339(),
        })?;
    }
    writer.flush().context("failed to flush csv export")?;
    Ok(entries.len())
}

/// Reads an export back into engine input. Rows from reviewers are skipped;
/// a bad role or timestamp fails the whole read.
pub fn read_histories<R: Read>(reader: R) -> Result<SubjectHistories> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut histories = SubjectHistories::new();

    for (index, result) in reader.deserialize::<CsvEntry>().enumerate() {
        let row = result.map_err(|err| {
            JournalError::InvalidInput(format!("row {}: {}", index + 1, err))
        })?;
        let role: Role = row.role.parse()?;
        if role != Role::Subject {
            continue;
        }
        let moment = Moment::parse(row.emotion_label, &row.created_at).map_err(|err| {
            JournalError::InvalidInput(format!("row {}: {}", index + 1, err))
        })?;
        histories.entry(row.subject_id).or_default().push(moment);
    }

    for moments in histories.values_mut() {
        moments.sort_by_key(|moment| moment.at);
    }

    Ok(histories)
}

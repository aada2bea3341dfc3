//! Tracked work sessions and the notes marker that flags them as billed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// Token that flags an entry's notes as already billed.
pub const INVOICED_MARKER: &str = "[Invoiced:";

/// A tracked session of work, optionally assigned to a client and contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeEntry {
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub project_label: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub hours: Option<f64>,
    pub billable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl TimeEntry {
    /// Opens a running session with no end time.
    pub fn started(
        client_id: Option<Uuid>,
        contract_id: Option<Uuid>,
        project_label: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            contract_id,
            project_label: project_label.into(),
            start_time,
            end_time: None,
            duration_seconds: None,
            hours: None,
            billable: true,
            notes: None,
            deleted: false,
        }
    }

    /// Builds a finished session, deriving duration and hours from the bounds.
    pub fn completed(
        client_id: Option<Uuid>,
        contract_id: Option<Uuid>,
        project_label: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self::started(client_id, contract_id, project_label, start_time);
        entry.stop(end_time);
        entry
    }

    /// Closes the session at `end_time`. Negative spans clamp to zero.
    pub fn stop(&mut self, end_time: DateTime<Utc>) {
        let seconds = (end_time - self.start_time).num_seconds().max(0);
        self.end_time = Some(end_time);
        self.duration_seconds = Some(seconds);
        self.hours = Some(hours_from_seconds(seconds));
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn non_billable(mut self) -> Self {
        self.billable = false;
        self
    }

    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn is_invoiced(&self) -> bool {
        has_invoiced_marker(self.notes.as_deref())
    }

    /// Mirrors the store's candidate filter for invoicing.
    pub fn is_unbilled(&self) -> bool {
        self.billable
            && !self.deleted
            && self.client_id.is_some()
            && self.end_time.is_some()
            && self.hours.is_some()
            && !self.is_invoiced()
    }
}

impl Displayable for TimeEntry {
    fn display_label(&self) -> String {
        match self.hours {
            Some(hours) => format!(
                "{} {} ({:.2}h)",
                self.start_time.format("%Y-%m-%d"),
                self.project_label,
                hours
            ),
            None => format!(
                "{} {} (running)",
                self.start_time.format("%Y-%m-%d"),
                self.project_label
            ),
        }
    }
}

/// Converts a duration to decimal hours rounded to two places.
pub fn hours_from_seconds(seconds: i64) -> f64 {
    (seconds as f64 / 36.0).round() / 100.0
}

/// Returns `true` when `notes` carry the billed marker.
pub fn has_invoiced_marker(notes: Option<&str>) -> bool {
    notes.is_some_and(|text| text.contains(INVOICED_MARKER))
}

/// Formats the marker for an invoice number, e.g. `[Invoiced: INV-202401-ACME-001]`.
pub fn invoiced_marker(invoice_number: &str) -> String {
    format!("{} {}]", INVOICED_MARKER, invoice_number)
}

/// Appends the billed marker to existing notes, separated by a single space.
pub fn append_invoiced_marker(notes: Option<&str>, invoice_number: &str) -> String {
    let marker = invoiced_marker(invoice_number);
    match notes {
        Some(existing) if !existing.is_empty() => format!("{existing} {marker}"),
        _ => marker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, minute, 0).unwrap()
    }

    #[test]
    fn completed_entry_derives_hours() {
        let entry =
            TimeEntry::completed(Some(Uuid::new_v4()), None, "Design", at(9, 0), at(10, 30));
        assert_eq!(entry.duration_seconds, Some(5400));
        assert_eq!(entry.hours, Some(1.5));
        assert!(entry.is_unbilled());
    }

    #[test]
    fn running_entry_is_not_billable_yet() {
        let entry = TimeEntry::started(Some(Uuid::new_v4()), None, "Design", at(9, 0));
        assert!(entry.is_running());
        assert!(!entry.is_unbilled());
    }

    #[test]
    fn marker_is_appended_with_separator() {
        assert_eq!(
            append_invoiced_marker(None, "INV-1"),
            "[Invoiced: INV-1]"
        );
        assert_eq!(
            append_invoiced_marker(Some(""), "INV-1"),
            "[Invoiced: INV-1]"
        );
        assert_eq!(
            append_invoiced_marker(Some("call with PM"), "INV-1"),
            "call with PM [Invoiced: INV-1]"
        );
    }

    #[test]
    fn marked_entry_is_excluded() {
        let entry = TimeEntry::completed(Some(Uuid::new_v4()), None, "Build", at(9, 0), at(11, 0))
            .with_notes(append_invoiced_marker(None, "INV-7"));
        assert!(entry.is_invoiced());
        assert!(!entry.is_unbilled());
    }

    #[test]
    fn hours_round_to_two_places() {
        assert_eq!(hours_from_seconds(4800), 1.33);
        assert_eq!(hours_from_seconds(0), 0.0);
    }
}

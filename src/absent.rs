//! Detection of the "data absent reason" conventions.
//!
//! Two conventions mark a value as "missing, and we know why": the
//! data-absent-reason extension, and an `unknown` coding from the
//! data-absent-reason code system. [`scan`] detects both anywhere in a
//! record; [`DataAbsentTracker`] accumulates sticky flags across the pages
//! of a session.

use serde_json::Value as JsonValue;

use crate::node::{Node, walk};

/// URL of the data-absent-reason extension.
pub const DATA_ABSENT_REASON_EXTENSION_URL: &str =
    "http://hl7.org/fhir/StructureDefinition/data-absent-reason";

/// URL of the data-absent-reason code system.
pub const DATA_ABSENT_REASON_CODE_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/data-absent-reason";

const DATA_ABSENT_REASON_CODE: &str = "unknown";

/// Which of the two conventions a scan found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataAbsentReport {
    /// The extension URL appears in the record's serialized form.
    pub extension_found: bool,
    /// Some coded element carries the `unknown` code from the
    /// data-absent-reason code system.
    pub code_found: bool,
}

/// Scan one record for both data-absent-reason conventions.
///
/// The extension check is a raw substring scan over the serialized record.
/// That is deliberately approximate: a URL appearing in unrelated text
/// also counts, matching the established behavior of this check. The code
/// check uses the same substring scan only as a cheap pre-filter before
/// the structural walk.
pub fn scan(record: &JsonValue) -> DataAbsentReport {
    let serialized = record.to_string();

    DataAbsentReport {
        extension_found: serialized.contains(DATA_ABSENT_REASON_EXTENSION_URL),
        code_found: serialized.contains(DATA_ABSENT_REASON_CODE_SYSTEM)
            && has_absent_coding(record),
    }
}

fn has_absent_coding(record: &JsonValue) -> bool {
    let mut found = false;
    walk(Node::new(record), &mut |node, _path| {
        if !found
            && node.string_field("system") == Some(DATA_ABSENT_REASON_CODE_SYSTEM)
            && node.string_field("code") == Some(DATA_ABSENT_REASON_CODE)
        {
            found = true;
        }
    });
    found
}

/// Sticky accumulation of scan results across many records.
///
/// Once a flag turns true it stays true, and once both are true further
/// records are not scanned at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataAbsentTracker {
    report: DataAbsentReport,
}

impl DataAbsentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the scan of one record into the sticky flags.
    pub fn observe(&mut self, record: &JsonValue) {
        if self.report.extension_found && self.report.code_found {
            return;
        }
        let scanned = scan(record);
        self.report.extension_found |= scanned.extension_found;
        self.report.code_found |= scanned.code_found;
    }

    pub fn extension_found(&self) -> bool {
        self.report.extension_found
    }

    pub fn code_found(&self) -> bool {
        self.report.code_found
    }

    pub fn report(&self) -> DataAbsentReport {
        self.report
    }
}

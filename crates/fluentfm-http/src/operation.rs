//! Deferred operations and their results.

use std::path::PathBuf;

use fluentfm_core::error::InvalidInputError;
use fluentfm_core::{FieldData, LayoutMetadata, Record, RecordId, RecordSet, Result};

/// A unit of work bound by the repository and run by `exec`.
///
/// Captures everything the request needs except the query state, which is
/// taken at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOperation {
    /// List a layout, or read one record when `id` is set.
    Records {
        layout: String,
        id: Option<RecordId>,
    },
    /// Find records matching the query conditions.
    Find { layout: String },
    /// Read layout metadata.
    Metadata { layout: String },
    Create { layout: String, fields: FieldData },
    /// Set global fields for the session.
    Globals { layout: String, fields: FieldData },
    /// Edit one record, or every record the query finds.
    Update {
        layout: String,
        fields: FieldData,
        id: Option<RecordId>,
    },
    Delete {
        layout: String,
        id: Option<RecordId>,
    },
    /// Put a local file into a container field.
    Upload {
        layout: String,
        field: String,
        path: PathBuf,
        id: Option<RecordId>,
    },
    /// Save container field contents under `output_dir`.
    Download {
        layout: String,
        field: String,
        output_dir: PathBuf,
        id: Option<RecordId>,
    },
}

impl PendingOperation {
    pub fn name(&self) -> &'static str {
        match self {
            PendingOperation::Records { .. } => "records",
            PendingOperation::Find { .. } => "find",
            PendingOperation::Metadata { .. } => "metadata",
            PendingOperation::Create { .. } => "create",
            PendingOperation::Globals { .. } => "globals",
            PendingOperation::Update { .. } => "update",
            PendingOperation::Delete { .. } => "delete",
            PendingOperation::Upload { .. } => "upload",
            PendingOperation::Download { .. } => "download",
        }
    }

    pub fn layout(&self) -> &str {
        match self {
            PendingOperation::Records { layout, .. }
            | PendingOperation::Find { layout }
            | PendingOperation::Metadata { layout }
            | PendingOperation::Create { layout, .. }
            | PendingOperation::Globals { layout, .. }
            | PendingOperation::Update { layout, .. }
            | PendingOperation::Delete { layout, .. }
            | PendingOperation::Upload { layout, .. }
            | PendingOperation::Download { layout, .. } => layout,
        }
    }
}

/// Result of an executed operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Records(RecordSet),
    Created(RecordId),
    /// Number of records edited, deleted or uploaded to.
    Affected(usize),
    Downloaded(Vec<PathBuf>),
    Layout(LayoutMetadata),
    Done,
}

impl Outcome {
    fn kind(&self) -> &'static str {
        match self {
            Outcome::Records(_) => "records",
            Outcome::Created(_) => "a created record id",
            Outcome::Affected(_) => "an affected count",
            Outcome::Downloaded(_) => "downloaded files",
            Outcome::Layout(_) => "layout metadata",
            Outcome::Done => "no value",
        }
    }

    fn unexpected(&self, expected: &'static str) -> fluentfm_core::Error {
        InvalidInputError::UnexpectedOutcome {
            expected,
            actual: self.kind(),
        }
        .into()
    }

    pub fn into_records(self) -> Result<RecordSet> {
        match self {
            Outcome::Records(set) => Ok(set),
            other => Err(other.unexpected("records")),
        }
    }

    pub fn into_created(self) -> Result<RecordId> {
        match self {
            Outcome::Created(id) => Ok(id),
            other => Err(other.unexpected("a created record id")),
        }
    }

    pub fn into_affected(self) -> Result<usize> {
        match self {
            Outcome::Affected(n) => Ok(n),
            other => Err(other.unexpected("an affected count")),
        }
    }

    pub fn into_downloaded(self) -> Result<Vec<PathBuf>> {
        match self {
            Outcome::Downloaded(paths) => Ok(paths),
            other => Err(other.unexpected("downloaded files")),
        }
    }

    pub fn into_layout(self) -> Result<LayoutMetadata> {
        match self {
            Outcome::Layout(layout) => Ok(layout),
            other => Err(other.unexpected("layout metadata")),
        }
    }

    /// First record of a record outcome.
    pub fn first(self) -> Result<Option<Record>> {
        Ok(self.into_records()?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluentfm_core::Error;

    #[test]
    fn outcome_conversions() {
        assert_eq!(Outcome::Affected(3).into_affected().unwrap(), 3);
        assert_eq!(
            Outcome::Created(RecordId::new(9)).into_created().unwrap(),
            RecordId::new(9)
        );
        assert!(Outcome::Records(RecordSet::new()).first().unwrap().is_none());
    }

    #[test]
    fn outcome_mismatch_is_input_error() {
        let err = Outcome::Done.into_records().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidInput(InvalidInputError::UnexpectedOutcome {
                expected: "records",
                actual: "no value"
            })
        ));
    }

    #[test]
    fn operation_accessors() {
        let op = PendingOperation::Delete {
            layout: "people".to_string(),
            id: None,
        };
        assert_eq!(op.name(), "delete");
        assert_eq!(op.layout(), "people");
    }
}

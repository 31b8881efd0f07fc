//! Uploaded statements and the status badge shown while the backend
//! extracts and categorizes them.
//!
//! A statement carries three status fields: the overall job `status` plus
//! independent `extraction_status` and `categorization_status`. The badge is
//! a pure function of the three, and it also decides when polling stops.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One processing status as reported by the backend.
///
/// Unknown values are kept verbatim rather than failing the whole payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Uploaded,
    Processing,
    Completed,
    Failed,
    Other(String),
}

impl From<String> for ProcessingStatus {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "not_started" => Self::Pending,
            "uploaded" => Self::Uploaded,
            "processing" | "in_progress" | "extracting" | "categorizing" | "running" => {
                Self::Processing
            }
            "completed" | "complete" | "done" | "success" => Self::Completed,
            "failed" | "error" => Self::Failed,
            _ => Self::Other(s),
        }
    }
}

impl From<ProcessingStatus> for String {
    fn from(s: ProcessingStatus) -> Self {
        match s {
            ProcessingStatus::Pending => "pending".to_string(),
            ProcessingStatus::Uploaded => "uploaded".to_string(),
            ProcessingStatus::Processing => "processing".to_string(),
            ProcessingStatus::Completed => "completed".to_string(),
            ProcessingStatus::Failed => "failed".to_string(),
            ProcessingStatus::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Statement {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub status: ProcessingStatus,
    #[serde(default)]
    pub extraction_status: ProcessingStatus,
    #[serde(default)]
    pub categorization_status: ProcessingStatus,
    #[serde(default)]
    pub is_processed: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub card_id: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

impl Statement {
    pub fn badge(&self) -> StatementBadge {
        StatementBadge::derive(
            &self.status,
            &self.extraction_status,
            &self.categorization_status,
        )
    }
}

/// Combined display state of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementBadge {
    Uploaded,
    Extracting,
    Extracted,
    Categorizing,
    Completed,
    Failed,
}

impl StatementBadge {
    /// Badge table:
    ///
    /// | condition                                         | badge        |
    /// |---------------------------------------------------|--------------|
    /// | any field `failed`                                | Failed       |
    /// | `status` completed, or both sub-steps completed   | Completed    |
    /// | categorization `processing`                       | Categorizing |
    /// | extraction `processing`                           | Extracting   |
    /// | extraction completed, categorization not started  | Extracted    |
    /// | anything else                                     | Uploaded     |
    pub fn derive(
        status: &ProcessingStatus,
        extraction: &ProcessingStatus,
        categorization: &ProcessingStatus,
    ) -> Self {
        use ProcessingStatus as P;

        if [status, extraction, categorization].contains(&&P::Failed) {
            return Self::Failed;
        }
        if *status == P::Completed || (*extraction == P::Completed && *categorization == P::Completed)
        {
            return Self::Completed;
        }
        if *categorization == P::Processing {
            return Self::Categorizing;
        }
        if *extraction == P::Processing {
            return Self::Extracting;
        }
        if *extraction == P::Completed {
            return Self::Extracted;
        }
        Self::Uploaded
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Uploaded => "Uploaded",
            Self::Extracting => "Extracting",
            Self::Extracted => "Extracted",
            Self::Categorizing => "Categorizing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// True for the spinner badges.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Extracting | Self::Categorizing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for StatementBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-triggered processing step. Each maps to one backend endpoint, and
/// `ProcessAll` chains extraction into categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingAction {
    Extract,
    Categorize,
    ProcessAll,
    Recategorize,
    Retry,
}

impl ProcessingAction {
    /// Endpoint suffix under `/statements/{id}/`.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Extract | Self::ProcessAll => "extract",
            Self::Categorize => "categorize",
            Self::Recategorize => "recategorize",
            Self::Retry => "retry",
        }
    }

    /// Whether polling for this action is done.
    ///
    /// Terminal badges always finish. An extract-only run also finishes as
    /// soon as extraction completes, since nothing will start categorization.
    pub fn is_finished(&self, statement: &Statement) -> bool {
        let badge = statement.badge();
        if badge.is_terminal() {
            return true;
        }
        *self == Self::Extract && statement.extraction_status == ProcessingStatus::Completed
    }

    /// `ProcessAll` issues the categorize call once extraction is done.
    pub fn needs_categorize_followup(&self, statement: &Statement) -> bool {
        *self == Self::ProcessAll && statement.badge() == StatementBadge::Extracted
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Self::Extract => "Transactions extracted",
            Self::Categorize | Self::Recategorize => "Transactions categorized",
            Self::ProcessAll | Self::Retry => "Statement processed",
        }
    }
}

impl fmt::Display for ProcessingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Extract => "extract",
            Self::Categorize => "categorize",
            Self::ProcessAll => "process-all",
            Self::Recategorize => "recategorize",
            Self::Retry => "retry",
        };
        f.write_str(s)
    }
}

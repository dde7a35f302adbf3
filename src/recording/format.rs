//! Text format definitions for SCC recordings.

use std::fmt;

use super::codec::VolumeError;

/// Version line expected as the first line of a recording.
pub const VERSION_LINE: &str = "version 2";

pub const START_BLOCK_TAG: &str = "start_block";
pub const GRID_TAG: &str = "grid";
pub const VOLUME_TAG: &str = "volume";
pub const BLOCK_REMOVAL_TAG: &str = "v-";

/// Columns a `grid` row must provide, in the order the recorder writes them.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "kind",
    "name",
    "owner",
    "faction",
    "factionColor",
    "entityId",
    "health",
    "position",
    "rotation",
    "gridSize",
];

/// Field count of a `volume` row: tag, entity id, payload.
pub const VOLUME_FIELDS: usize = 3;

/// Field count of a block-removal row: tag, grid id, block count, positions.
pub const BLOCK_REMOVAL_FIELDS: usize = 4;

/// Row kinds recognised by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    StartBlock,
    Grid,
    Volume,
    BlockRemoval,
    Unknown,
}

impl RowKind {
    /// Classify a row by its first comma-delimited token.
    pub fn classify(row: &str) -> Self {
        let tag = row.split(',').next().unwrap_or("");
        match tag {
            START_BLOCK_TAG => RowKind::StartBlock,
            GRID_TAG => RowKind::Grid,
            VOLUME_TAG => RowKind::Volume,
            BLOCK_REMOVAL_TAG => RowKind::BlockRemoval,
            _ => RowKind::Unknown,
        }
    }
}

/// Check the first line of a recording.
pub fn check_version(line: &str) -> Result<(), FormatError> {
    if line.trim_end() == VERSION_LINE {
        Ok(())
    } else {
        Err(FormatError::UnsupportedVersion {
            found: line.to_string(),
        })
    }
}

/// Named column layout of `grid` rows, read from the second header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeaders {
    names: Vec<String>,
    /// Position of each entry of `REQUIRED_COLUMNS` within `names`.
    required: [usize; REQUIRED_COLUMNS.len()],
}

impl ColumnHeaders {
    /// Parse a header line. The line may reorder columns or add extra ones,
    /// but must contain every required column.
    pub fn parse(line: &str) -> Result<Self, FormatError> {
        let names: Vec<String> = line.trim_end().split(',').map(str::to_string).collect();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !names.iter().any(|n| n == *c))
            .map(|c| c.to_string())
            .collect();

        if !missing.is_empty() {
            let unexpected = names
                .iter()
                .filter(|n| !REQUIRED_COLUMNS.contains(&n.as_str()))
                .cloned()
                .collect();
            return Err(FormatError::MissingColumns {
                missing,
                unexpected,
            });
        }

        let mut required = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, column) in required.iter_mut().zip(REQUIRED_COLUMNS.iter()) {
            // Presence checked above.
            *slot = names.iter().position(|n| n == column).unwrap_or(0);
        }

        Ok(Self { names, required })
    }

    /// Headers in the order the recorder writes them.
    pub fn standard() -> Self {
        let names = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut required = [0usize; REQUIRED_COLUMNS.len()];
        for (i, slot) in required.iter_mut().enumerate() {
            *slot = i;
        }
        Self { names, required }
    }

    /// Number of fields every `grid` row must have.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Field index of a column, if present.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        match REQUIRED_COLUMNS.iter().position(|c| *c == column) {
            Some(i) => Some(self.required[i]),
            None => self.names.iter().position(|n| n == column),
        }
    }

    /// Value of `column` within an already split row.
    pub fn field<'a>(&self, fields: &[&'a str], column: &str) -> Option<&'a str> {
        self.index_of(column).and_then(|i| fields.get(i).copied())
    }
}

impl fmt::Display for ColumnHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join(","))
    }
}

/// Errors that abort a whole parse.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormatError {
    #[error("Unsupported version or outdated replay file: expected 'version 2', found '{found}'")]
    UnsupportedVersion { found: String },
    #[error("Recording ends before the column header line")]
    MissingHeader,
    #[error(
        "Replay file does not contain the expected columns (missing: [{}], unexpected: [{}])",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    MissingColumns {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
}

/// Errors that skip a single row; parsing continues.
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("Expected {expected} columns for tag '{tag}', but got {found}")]
    FieldCount {
        tag: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Column '{column}' has unparseable value '{value}'")]
    InvalidNumber { column: &'static str, value: String },
    #[error("Column '{column}' expected {expected} components but got {found}")]
    ComponentCount {
        column: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Rotation of entity {entity_id} cannot be normalised")]
    InvalidOrientation { entity_id: String },
    #[error("Unknown grid size '{value}'")]
    UnknownGridSize { value: String },
    #[error("Expected start_block before '{tag}' entry")]
    NoOpenFrame { tag: &'static str },
    #[error("Volume for entity {entity_id} could not be decoded: {source}")]
    Volume {
        entity_id: String,
        #[source]
        source: VolumeError,
    },
    #[error("Already have a volume for entity {entity_id}")]
    DuplicateVolume { entity_id: String },
    #[error("Grid size for volume with entity id {entity_id} not found")]
    UnresolvedGridSize { entity_id: String },
}

/// A row-level error together with the line it occurred on.
#[derive(Debug)]
pub struct Diagnostic {
    /// 1-based line number in the recording.
    pub line: u64,
    pub error: RowError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

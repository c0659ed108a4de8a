use thiserror::Error;

#[derive(Error, Debug)]
pub enum DamError {
    #[error("unknown soil code '{code}'")]
    UnknownSoilCode { code: String },

    #[error("station domain mismatch: surface covers [{surface_min}, {surface_max}], profile covers [{profile_min}, {profile_max}]")]
    DomainMismatch {
        surface_min: f64,
        surface_max: f64,
        profile_min: f64,
        profile_max: f64,
    },

    #[error("missing clip bound: {bound}")]
    MissingClipBound { bound: &'static str },

    #[error("inverted clip bounds: outer toe at {outer_toe} lies right of inner toe at {inner_toe}")]
    InvertedClipBounds { outer_toe: f64, inner_toe: f64 },

    #[error("degenerate geometry in layer '{soil_code}' near station {station}")]
    DegenerateGeometry { soil_code: String, station: f64 },

    #[error("combination '{combination_id}' references unknown {kind} '{id}'")]
    MissingReference {
        combination_id: String,
        kind: &'static str,
        id: String,
    },

    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigError { field: String, message: String },

    #[error("Join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Scoped to a single combination; the batch keeps running.
    Combination,
    /// The run cannot proceed (unreadable input, bad configuration).
    Fatal,
}

impl DamError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DamError::UnknownSoilCode { .. }
            | DamError::DomainMismatch { .. }
            | DamError::MissingClipBound { .. }
            | DamError::InvertedClipBounds { .. }
            | DamError::DegenerateGeometry { .. }
            | DamError::MissingReference { .. } => ErrorSeverity::Combination,
            _ => ErrorSeverity::Fatal,
        }
    }

    /// True when only the clipped report is affected and unclipped results
    /// remain valid for the combination.
    pub fn is_clip_only(&self) -> bool {
        matches!(
            self,
            DamError::MissingClipBound { .. } | DamError::InvertedClipBounds { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combination_errors_are_not_fatal() {
        let err = DamError::UnknownSoilCode {
            code: "Zand_WL".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Combination);

        let err = DamError::MalformedInput {
            message: "bad row".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Fatal);
    }

    #[test]
    fn test_clip_only_classification() {
        assert!(DamError::MissingClipBound { bound: "outer_toe" }.is_clip_only());
        assert!(DamError::InvertedClipBounds {
            outer_toe: 8.0,
            inner_toe: 2.0
        }
        .is_clip_only());
        assert!(!DamError::DegenerateGeometry {
            soil_code: "Klei".to_string(),
            station: 3.5
        }
        .is_clip_only());
    }
}

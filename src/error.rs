use thiserror::Error;

pub type ExsimResult<T> = Result<T, ExsimError>;

#[derive(Error, Debug)]
pub enum ExsimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    /// The report has no worksheet/table at all, so nothing can be recovered.
    #[error("Missing container: {0}")]
    MissingContainer(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Store lock error: {0}")]
    Lock(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<quick_xml::Error> for ExsimError {
    fn from(e: quick_xml::Error) -> Self {
        ExsimError::Xml(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for ExsimError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        ExsimError::Export(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ExsimError::MissingContainer("no Worksheet element".to_string());
        assert_eq!(err.to_string(), "Missing container: no Worksheet element");

        let err = ExsimError::NotFound("market-report.xls".to_string());
        assert_eq!(err.to_string(), "File not found: market-report.xls");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ExsimError = io.into();
        assert!(matches!(err, ExsimError::Io(_)));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_json_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ExsimError = parse.into();
        assert!(matches!(err, ExsimError::Json(_)));
    }
}

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{Error, Result};

const REQUIRED_PERSONAL: [&str; 2] = ["name", "email"];

/// A loaded résumé document.
///
/// Only `personal.name` and `personal.email` are guaranteed to exist. Every
/// other key is handed to the template exactly as it appeared in the file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResumeData(Value);

impl ResumeData {
    /// Validate an already-parsed document.
    pub fn from_value(value: Value) -> Result<Self> {
        validate(&value)?;
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Read, parse and validate the résumé JSON at `path`.
pub fn load(path: &Path) -> Result<ResumeData> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(Error::read(path, e)),
    };

    // Bytes that are not UTF-8 are malformed JSON, not an I/O failure.
    let value: Value = serde_json::from_slice(&content).map_err(|source| Error::MalformedInput {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "parsed resume JSON");
    ResumeData::from_value(value)
}

/// Check the two required personal fields. Nothing else is inspected.
pub fn validate(value: &Value) -> Result<()> {
    let Some(document) = value.as_object() else {
        return Err(Error::SchemaViolation(
            "Resume data must be a JSON object".to_string(),
        ));
    };

    let Some(personal) = document.get("personal") else {
        return Err(Error::SchemaViolation(
            "Required field 'personal' missing from JSON data".to_string(),
        ));
    };

    let Some(personal) = personal.as_object() else {
        return Err(Error::SchemaViolation(
            "'personal' must be an object".to_string(),
        ));
    };

    for field in REQUIRED_PERSONAL {
        if !personal.contains_key(field) {
            return Err(Error::SchemaViolation(format!(
                "Required personal field '{field}' missing from JSON data"
            )));
        }
    }

    Ok(())
}

/// The sample document shown to users who ask what the input should look like.
pub fn example_document() -> Value {
    json!({
        "personal": {
            "name": "John Doe",
            "email": "john@example.com",
            "phone": "+1-234-567-8900",
            "location": "City, State"
        },
        "summary": "Professional summary here...",
        "experience": [
            {
                "title": "Software Engineer",
                "company": "Tech Corp",
                "duration": "2020-2023",
                "description": "Job responsibilities and achievements..."
            }
        ],
        "education": [
            {
                "degree": "Bachelor of Science in Computer Science",
                "school": "University Name",
                "year": "2020"
            }
        ],
        "skills": ["Python", "JavaScript", "SQL"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_json(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join("resume.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_document_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let raw = r#"{
            "personal": {"name": "Jane Doe", "email": "jane@example.com", "github": "jdoe"},
            "skills": ["Go", "Rust"],
            "experience": "not even a list",
            "custom": {"nested": [1, 2, 3]}
        }"#;
        let path = write_json(dir.path(), raw);

        let data = load(&path).unwrap();
        let expected: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(data.as_value(), &expected);
    }

    #[test]
    fn missing_personal() {
        let err = validate(&json!({"skills": []})).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
        assert!(err.to_string().contains("'personal'"));
    }

    #[test]
    fn missing_name() {
        let err = validate(&json!({"personal": {"email": "a@b.c"}})).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn missing_email() {
        let err = validate(&json!({"personal": {"name": "A"}})).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
        assert!(err.to_string().contains("'email'"));
    }

    #[test]
    fn personal_must_be_an_object() {
        let err = validate(&json!({"personal": "name email"})).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[test]
    fn top_level_must_be_an_object() {
        let err = validate(&json!(["personal"])).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[test]
    fn null_values_still_count_as_present() {
        assert!(validate(&json!({"personal": {"name": null, "email": ""}})).is_ok());
    }

    #[test]
    fn nonexistent_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(dir.path(), "{\"personal\": {\"name\": ");
        let err = load(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { .. }));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn invalid_utf8_is_malformed_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.json");
        fs::write(&path, b"{\"personal\": {\"name\": \"\xff\xfe\"}}").unwrap();
        assert!(matches!(load(&path), Err(Error::MalformedInput { .. })));
    }

    #[test]
    fn directory_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert!(err.to_string().starts_with("Cannot read "));
    }

    #[test]
    fn example_document_is_valid() {
        assert!(ResumeData::from_value(example_document()).is_ok());
    }
}

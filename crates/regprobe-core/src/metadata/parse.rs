//! Parse the registry's crate document.

use serde::Deserialize;

use crate::error::ProbeError;

#[derive(Debug, Deserialize)]
struct CrateDocument {
    #[serde(rename = "crate")]
    krate: CrateMetadata,
}

/// The fields of the `crate` object the harness uses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CrateMetadata {
    pub max_version: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Parse a crate document body; a missing or empty `crate.max_version` is an error.
pub(crate) fn parse_crate_metadata(body: &[u8]) -> Result<CrateMetadata, ProbeError> {
    let doc: CrateDocument =
        serde_json::from_slice(body).map_err(|e| ProbeError::Parse(e.to_string()))?;
    if doc.krate.max_version.trim().is_empty() {
        return Err(ProbeError::Parse("crate.max_version is empty".to_string()));
    }
    Ok(doc.krate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_max_version_and_description() {
        let body = br#"{
            "crate": {
                "name": "rand",
                "max_version": "0.8.5",
                "description": "Random number generators and other randomness functionality."
            },
            "versions": []
        }"#;
        let meta = parse_crate_metadata(body).unwrap();
        assert_eq!(meta.max_version, "0.8.5");
        assert!(meta.description.unwrap().starts_with("Random number"));
    }

    #[test]
    fn parse_null_description() {
        let body = br#"{"crate": {"max_version": "1.0.0", "description": null}}"#;
        let meta = parse_crate_metadata(body).unwrap();
        assert_eq!(meta.max_version, "1.0.0");
        assert!(meta.description.is_none());
    }

    #[test]
    fn parse_missing_max_version_fails() {
        let body = br#"{"crate": {"name": "rand"}}"#;
        assert!(matches!(
            parse_crate_metadata(body),
            Err(ProbeError::Parse(_))
        ));
    }

    #[test]
    fn parse_empty_max_version_fails() {
        let body = br#"{"crate": {"max_version": ""}}"#;
        assert!(parse_crate_metadata(body).is_err());
    }

    #[test]
    fn parse_not_json_fails() {
        assert!(matches!(
            parse_crate_metadata(b"<html>502 Bad Gateway</html>"),
            Err(ProbeError::Parse(_))
        ));
    }
}

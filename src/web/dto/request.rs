//! Request DTOs for Web API.

use serde::Deserialize;

/// Query for `GET /api/files`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// `recent` (default) or `popular`.
    pub sort: Option<String>,
}

/// Query for `GET /api/files/search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Body of `POST /api/archive`.
#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    /// Files to include.
    #[serde(default)]
    pub ids: Vec<i64>,
    /// Download name, without `.zip`.
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_request_deserialize() {
        let req: ArchiveRequest = serde_json::from_str(r#"{"ids":[1,2],"name":"holiday"}"#).unwrap();
        assert_eq!(req.ids, vec![1, 2]);
        assert_eq!(req.name.as_deref(), Some("holiday"));

        let req: ArchiveRequest = serde_json::from_str("{}").unwrap();
        assert!(req.ids.is_empty());
        assert!(req.name.is_none());
    }
}

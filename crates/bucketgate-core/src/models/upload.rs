use crate::SnowflakeId;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// File names become the tail of a storage key, so they may not carry path segments.
fn validate_file_name(name: &str) -> Result<(), ValidationError> {
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(ValidationError::new("file_name")
            .with_message("File name must not contain path separators".into()));
    }
    if name.chars().any(char::is_control) {
        return Err(ValidationError::new("file_name")
            .with_message("File name must not contain control characters".into()));
    }
    Ok(())
}

/// Request to presign a single-part upload
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    #[validate(
        length(
            min = 1,
            max = 255,
            message = "File name must be between 1 and 255 characters"
        ),
        custom(function = "validate_file_name")
    )]
    pub file_name: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Content type must be between 1 and 255 characters"
    ))]
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    pub upload_url: String,
    pub file_id: SnowflakeId,
    pub key: String,
    pub final_url: String,
}

/// Client-reported completion of a presigned single-part upload
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub file_id: SnowflakeId,
    #[validate(length(min = 1, max = 1024, message = "Key must be between 1 and 1024 characters"))]
    pub key: String,
    #[validate(
        length(
            min = 1,
            max = 255,
            message = "File name must be between 1 and 255 characters"
        ),
        custom(function = "validate_file_name")
    )]
    pub file_name: String,
    #[validate(range(min = 0, message = "Size must not be negative"))]
    pub size_bytes: i64,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Content type must be between 1 and 255 characters"
    ))]
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    pub file_id: SnowflakeId,
}

/// Request to start a multipart upload
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitiateMultipartRequest {
    #[validate(
        length(
            min = 1,
            max = 255,
            message = "File name must be between 1 and 255 characters"
        ),
        custom(function = "validate_file_name")
    )]
    pub file_name: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Content type must be between 1 and 255 characters"
    ))]
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateMultipartResponse {
    pub file_id: SnowflakeId,
    pub key: String,
    pub upload_id: String,
}

/// Request to presign one part of a multipart upload. Part numbers are passed
/// through to the backend as given.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PresignPartRequest {
    #[validate(length(min = 1, max = 1024, message = "Key must be between 1 and 1024 characters"))]
    pub key: String,
    #[validate(length(min = 1, message = "Upload id is required"))]
    pub upload_id: String,
    pub part_number: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignPartResponse {
    pub upload_url: String,
}

/// One entry of the client-reported part manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPartInput {
    #[serde(rename = "partNumber", alias = "PartNumber")]
    pub part_number: i32,
    #[serde(rename = "ETag", alias = "etag", alias = "eTag")]
    pub etag: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMultipartRequest {
    pub file_id: SnowflakeId,
    #[validate(length(min = 1, max = 1024, message = "Key must be between 1 and 1024 characters"))]
    pub key: String,
    #[validate(length(min = 1, message = "Upload id is required"))]
    pub upload_id: String,
    #[serde(default)]
    pub parts: Vec<CompletedPartInput>,
    #[validate(range(min = 0, message = "Size must not be negative"))]
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMultipartResponse {
    pub final_url: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    #[validate(length(min = 1, message = "Upload id is required"))]
    pub upload_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Result of `/upload`: a whole object (direct) or one proxied multipart part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectUploadResponse {
    pub success: bool,
    #[serde(rename = "ETag")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<SnowflakeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn_url: Option<String>,
}

/// Claims carried by the access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub bucket_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presign_request_validation() {
        let ok = PresignRequest {
            file_name: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
        };
        assert!(ok.validate().is_ok());

        for bad in ["", "../etc/passwd", "a/b.txt", "..", "tab\there"] {
            let request = PresignRequest {
                file_name: bad.to_string(),
                content_type: "text/plain".to_string(),
            };
            assert!(request.validate().is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_part_number_is_passed_through() {
        let request = PresignPartRequest {
            key: "uploads/1-a".to_string(),
            upload_id: "abc".to_string(),
            part_number: 0,
        };
        assert!(request.validate().is_ok());

        let missing_upload = PresignPartRequest {
            upload_id: String::new(),
            ..request
        };
        assert!(missing_upload.validate().is_err());
    }

    #[test]
    fn test_complete_multipart_parses_etag_manifest() {
        let json = serde_json::json!({
            "fileId": "123",
            "key": "uploads/1-a.bin",
            "uploadId": "u-1",
            "parts": [
                { "partNumber": 1, "ETag": "\"e1\"" },
                { "partNumber": 2, "etag": "\"e2\"" }
            ],
            "sizeBytes": 2048
        });
        let request: CompleteMultipartRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.file_id, SnowflakeId::from_raw(123));
        assert_eq!(request.parts.len(), 2);
        assert_eq!(request.parts[1].etag, "\"e2\"");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_direct_upload_response_shape() {
        let response = DirectUploadResponse {
            success: true,
            etag: Some("\"abc\"".to_string()),
            file_id: None,
            cdn_url: Some("https://cdn/x".to_string()),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ETag"], "\"abc\"");
        assert_eq!(json["cdnUrl"], "https://cdn/x");
        assert!(json.get("fileId").is_none());
    }
}

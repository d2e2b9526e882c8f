//! The upload backend contract and a client to access it
use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::AppConfig,
    error::{CactusError, Result},
};

const SIGNED_URL_PATH: &str = "get-signed-url";
static GLOBAL_CLIENT: Lazy<Client> = Lazy::new(Client::new);

/// Body of the signed URL request
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SignedUrlRequest {
    pub filename: String,
    #[serde(rename = "fileType")]
    pub file_type: String,
    pub location: String,
}

/// Upload targets issued by the backend
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SignedUrls {
    /// Where the raw file bytes are written
    pub url: String,
    /// Where the metadata document is written.  Older backends only
    /// issue the file URL.
    #[serde(rename = "metadataUrl", default, skip_serializing_if = "Option::is_none")]
    pub metadata_url: Option<String>,
}

/// The JSON document stored next to an uploaded file
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct UploadMetadata {
    pub location: String,
    /// Client time of the upload, RFC 3339 with millisecond precision
    pub timestamp: String,
    pub filename: String,
}

#[derive(Deserialize)]
struct BackendError {
    error: Option<String>,
    message: Option<String>,
}

/// Calls made against the upload backend and the storage it signs for
#[async_trait]
pub trait UploadApi: Send + Sync {
    /// Asks the backend for signed upload targets
    ///
    /// # Arguments
    ///
    /// * `request` - The name, declared type and location of the file
    ///
    /// # Returns
    ///
    /// The signed file URL and, when the backend supports it, the signed
    /// metadata URL
    async fn get_signed_url(&self, request: &SignedUrlRequest) -> Result<SignedUrls>;

    /// Writes the raw file to a signed URL
    ///
    /// # Arguments
    ///
    /// * `url` - The signed target
    /// * `body` - The contents of the file
    /// * `content_type` - The declared content type.  Must match the type the
    ///                    URL was signed for; an empty type sends no header.
    async fn put_file(&self, url: &str, body: Bytes, content_type: &str) -> Result<()>;

    /// Writes the metadata document to a signed URL
    async fn put_metadata(&self, url: &str, metadata: &UploadMetadata) -> Result<()>;
}

/// A client for the signed URL backend
///
/// When a credential is attached it is sent as a bearer token with the
/// signed URL request.  The signed storage URLs never carry it.
pub struct UploadClient {
    /// Base URL of the backend
    base_url: String,
    /// Identity assertion to present to the backend
    credential: Option<String>,
}

// Custom implementation of Debug to avoid printing the credential
impl std::fmt::Debug for UploadClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadClient")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential.as_ref().map(|_| "**********"))
            .finish()
    }
}

impl UploadClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.api_base_url.clone())
    }

    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    fn get_api_url(&self, path: &str) -> String {
        url_join(self.base_url.clone(), path.to_string())
    }

    fn add_authorization_header(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Some(credential) => request.header("authorization", format!("Bearer {}", credential)),
            None => request,
        }
    }

    async fn handle_error(response: Response) -> CactusError {
        let status = response.status();
        if status.is_server_error() {
            return CactusError::unknown_error(status);
        }
        let detail = response
            .json::<BackendError>()
            .await
            .ok()
            .and_then(|error| error.error.or(error.message));
        match status {
            StatusCode::BAD_REQUEST => {
                CactusError::BadRequest(detail.unwrap_or_else(|| "unknown details".to_string()))
            }
            StatusCode::UNAUTHORIZED => CactusError::NotAuthenticated(),
            StatusCode::FORBIDDEN => CactusError::Forbidden(),
            _ => CactusError::unknown_error(status),
        }
    }
}

fn url_join(left: String, right: String) -> String {
    if left.ends_with('/') {
        if let Some(stripped) = right.strip_prefix('/') {
            left + stripped
        } else {
            left + &right
        }
    } else if right.starts_with('/') {
        left + &right
    } else {
        left + "/" + &right
    }
}

#[async_trait]
impl UploadApi for UploadClient {
    async fn get_signed_url(&self, request: &SignedUrlRequest) -> Result<SignedUrls> {
        if request.filename.is_empty() {
            return Err(CactusError::required("filename"));
        }

        let api_url = self.get_api_url(SIGNED_URL_PATH);
        let mut http_request = GLOBAL_CLIENT.post(api_url).json(request);
        http_request = self.add_authorization_header(http_request);

        let response = http_request.send().await?;
        if !response.status().is_success() {
            Err(Self::handle_error(response).await)
        } else {
            let urls = response.json::<SignedUrls>().await?;
            debug!(
                filename = %request.filename,
                has_metadata_url = urls.metadata_url.is_some(),
                "received signed urls"
            );
            Ok(urls)
        }
    }

    async fn put_file(&self, url: &str, body: Bytes, content_type: &str) -> Result<()> {
        let mut request = GLOBAL_CLIENT.put(url);
        if !content_type.is_empty() {
            request = request.header("content-type", content_type);
        }
        request = request.body(body);

        let response = request.send().await?;
        if !response.status().is_success() {
            Err(CactusError::TransferRejected("file", response.status().as_u16()))
        } else {
            Ok(())
        }
    }

    async fn put_metadata(&self, url: &str, metadata: &UploadMetadata) -> Result<()> {
        let request = GLOBAL_CLIENT.put(url).json(metadata);

        let response = request.send().await?;
        if !response.status().is_success() {
            Err(CactusError::TransferRejected(
                "metadata",
                response.status().as_u16(),
            ))
        } else {
            Ok(())
        }
    }
}

/// These unit tests test against a mock server.  They will not test integration issues
/// with a real backend but they are useful for regression and testing corner cases.
#[cfg(test)]
mod tests {

    use all_asserts::assert_true;
    use mockito::{Matcher, Mock, ServerGuard};
    use serde_json::json;

    use super::*;

    fn signed_url_request() -> SignedUrlRequest {
        SignedUrlRequest {
            filename: "photo.png".to_string(),
            file_type: "image/png".to_string(),
            location: "greenhouse 3".to_string(),
        }
    }

    async fn setup_signed_url_mock(
        status: usize,
        body: serde_json::Value,
    ) -> (ServerGuard, Mock) {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/get-signed-url")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "filename": "photo.png",
                "fileType": "image/png",
                "location": "greenhouse 3",
            })))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string());

        (server, mock)
    }

    #[tokio::test]
    async fn can_get_signed_urls() {
        let (server, mock) = setup_signed_url_mock(
            200,
            json!({"url": "https://storage/file", "metadataUrl": "https://storage/meta"}),
        )
        .await;
        let mock = mock
            .match_header("authorization", Matcher::Missing)
            .create_async()
            .await;

        let client = UploadClient::new(format!("{}/", server.url()));
        let urls = client.get_signed_url(&signed_url_request()).await.unwrap();

        assert_eq!(urls.url, "https://storage/file");
        assert_eq!(urls.metadata_url.as_deref(), Some("https://storage/meta"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn accepts_response_without_metadata_url() {
        let (server, mock) =
            setup_signed_url_mock(200, json!({"url": "https://storage/file"})).await;
        let mock = mock.create_async().await;

        let client = UploadClient::new(server.url());
        let urls = client.get_signed_url(&signed_url_request()).await.unwrap();

        assert_true!(urls.metadata_url.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn sends_credential_as_bearer() {
        let (server, mock) =
            setup_signed_url_mock(200, json!({"url": "https://storage/file"})).await;
        let mock = mock
            .match_header("authorization", "Bearer a.b.c")
            .create_async()
            .await;

        let client = UploadClient::new(server.url()).with_credential(Some("a.b.c".to_string()));
        client.get_signed_url(&signed_url_request()).await.unwrap();

        mock.assert_async().await;
        assert_true!(!format!("{:?}", client).contains("a.b.c"));
    }

    #[tokio::test]
    async fn maps_backend_errors() {
        let cases = [
            (400, json!({"error": "fileType is required"})),
            (401, json!({})),
            (403, json!({"message": "nope"})),
            (404, json!({})),
            (503, json!({})),
        ];
        for (status, body) in cases {
            let (server, mock) = setup_signed_url_mock(status, body).await;
            let _mock = mock.create_async().await;

            let client = UploadClient::new(server.url());
            let err = client
                .get_signed_url(&signed_url_request())
                .await
                .unwrap_err();

            match (status, err) {
                (400, CactusError::BadRequest(detail)) => {
                    assert_eq!(detail, "fileType is required")
                }
                (401, CactusError::NotAuthenticated()) => {}
                (403, CactusError::Forbidden()) => {}
                (404, CactusError::UnknownError(404, _)) => {}
                (503, CactusError::UnknownError(503, _)) => {}
                (status, err) => panic!("unexpected error for {}: {:?}", status, err),
            }
        }
    }

    #[tokio::test]
    async fn rejects_empty_filename() {
        let client = UploadClient::new("http://localhost:1");
        let err = client
            .get_signed_url(&SignedUrlRequest {
                filename: String::new(),
                ..signed_url_request()
            })
            .await
            .unwrap_err();
        assert_true!(matches!(err, CactusError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn can_put_file_with_content_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/bucket/photo.png")
            .match_query(Matcher::UrlEncoded("X-Goog-Signature".into(), "abc".into()))
            .match_header("content-type", "image/png")
            .match_header("authorization", Matcher::Missing)
            .match_body("pixels")
            .with_status(200)
            .create_async()
            .await;

        let client = UploadClient::new(server.url()).with_credential(Some("a.b.c".to_string()));
        client
            .put_file(
                &format!("{}/bucket/photo.png?X-Goog-Signature=abc", server.url()),
                Bytes::from_static(b"pixels"),
                "image/png",
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn put_file_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PUT", "/bucket/photo.png")
            .with_status(403)
            .with_body("<Error><Code>SignatureDoesNotMatch</Code></Error>")
            .create_async()
            .await;

        let client = UploadClient::new(server.url());
        let err = client
            .put_file(
                &format!("{}/bucket/photo.png", server.url()),
                Bytes::from_static(b"pixels"),
                "image/png",
            )
            .await
            .unwrap_err();

        assert_true!(matches!(err, CactusError::TransferRejected("file", 403)));
    }

    #[tokio::test]
    async fn can_put_metadata() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/bucket/photo.png.json")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "location": "greenhouse 3",
                "timestamp": "2024-05-01T10:00:00.000Z",
                "filename": "photo.png",
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = UploadClient::new(server.url());
        client
            .put_metadata(
                &format!("{}/bucket/photo.png.json", server.url()),
                &UploadMetadata {
                    location: "greenhouse 3".to_string(),
                    timestamp: "2024-05-01T10:00:00.000Z".to_string(),
                    filename: "photo.png".to_string(),
                },
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[test]
    fn joins_urls() {
        assert_eq!(url_join("http://a/".into(), "b".into()), "http://a/b");
        assert_eq!(url_join("http://a/".into(), "/b".into()), "http://a/b");
        assert_eq!(url_join("http://a".into(), "/b".into()), "http://a/b");
        assert_eq!(url_join("http://a".into(), "b".into()), "http://a/b");
    }
}

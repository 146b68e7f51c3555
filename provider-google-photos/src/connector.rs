//! Google Photos Library API connector implementation
//!
//! Implements the `PhotoLibraryProvider` trait for Google Photos Library API v1.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::photos::{
    CreatedMediaItem, MediaFilter, NewMediaItem, PhotoLibraryProvider, RemoteAlbum,
    RemoteMediaItem, RemotePage,
};
use bytes::Bytes;
use chrono::{Datelike, NaiveDate};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GooglePhotosError;
use crate::types::{
    Album, AlbumsListResponse, BatchCreateRequest, BatchCreateResponse, CreateAlbumRequest, Date,
    DateFilter, DateRange, Filters, MediaItem, MediaItemIdsRequest, MediaItemsResponse, NewAlbum,
    NewMediaItemBody, SearchRequest, SimpleMediaItem,
};

/// Google Photos Library API base URL
const PHOTOS_API_BASE: &str = "https://photoslibrary.googleapis.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw uploads carry whole photos and get more time.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Google Photos Library API connector
///
/// Every trait method issues exactly one API call. Pagination, batching and
/// the retry budget belong to the caller.
///
/// # Example
///
/// ```ignore
/// use provider_google_photos::GooglePhotosConnector;
/// use bridge_traits::photos::PhotoLibraryProvider;
///
/// let connector = GooglePhotosConnector::new(http_client, access_token);
/// let page = connector.list_albums_page(None, 50).await?;
/// ```
pub struct GooglePhotosConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token
    access_token: String,

    base_url: String,
}

impl GooglePhotosConnector {
    /// Create a new Google Photos connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `access_token` - OAuth 2.0 access token with `photoslibrary` scope
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
            base_url: PHOTOS_API_BASE.to_string(),
        }
    }

    /// Point the connector at another endpoint, e.g. a local test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, self.url(path))
            .bearer_token(self.access_token.as_str())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    /// Send a request and turn non-success statuses into provider errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await?;

        match response.status {
            200..=299 => {
                debug!(status = response.status, "API request succeeded");
                Ok(response)
            }
            401 | 403 => {
                warn!(status = response.status, "API request rejected");
                Err(GooglePhotosError::AuthenticationFailed(
                    String::from_utf8_lossy(&response.body).to_string(),
                )
                .into())
            }
            status => {
                warn!(status, "API request failed");
                Err(GooglePhotosError::ApiError {
                    status_code: status,
                    message: String::from_utf8_lossy(&response.body).to_string(),
                }
                .into())
            }
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let response = self.send(request).await?;
        parse_body(&response)
    }

    fn convert_album(album: Album) -> RemoteAlbum {
        RemoteAlbum {
            id: album.id,
            title: album.title.unwrap_or_default(),
            media_items_count: album.media_items_count.and_then(|c| c.parse().ok()),
        }
    }

    fn convert_media_item(item: MediaItem) -> RemoteMediaItem {
        let creation_time = item.creation_time();
        RemoteMediaItem {
            id: item.id,
            filename: item.filename,
            description: item.description,
            creation_time,
            metadata: item.media_metadata.unwrap_or(serde_json::Value::Null),
        }
    }

    fn media_page(response: MediaItemsResponse) -> RemotePage<RemoteMediaItem> {
        RemotePage {
            items: response
                .media_items
                .map(|items| items.into_iter().map(Self::convert_media_item).collect()),
            next_page_token: response.next_page_token,
        }
    }
}

fn parse_body<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| {
        GooglePhotosError::ParseError(format!("Failed to parse response: {}", e)).into()
    })
}

fn to_date(date: NaiveDate) -> Date {
    Date {
        year: date.year(),
        month: date.month(),
        day: date.day(),
    }
}

fn page_query(page_token: Option<&str>, page_size: u32) -> String {
    match page_token {
        Some(token) => format!(
            "?pageSize={}&pageToken={}",
            page_size,
            urlencoding::encode(token)
        ),
        None => format!("?pageSize={}", page_size),
    }
}

#[async_trait]
impl PhotoLibraryProvider for GooglePhotosConnector {
    #[instrument(skip(self, page_token))]
    async fn list_albums_page(
        &self,
        page_token: Option<String>,
        page_size: u32,
    ) -> Result<RemotePage<RemoteAlbum>> {
        let path = format!("/albums{}", page_query(page_token.as_deref(), page_size));
        let response: AlbumsListResponse =
            self.send_json(self.request(HttpMethod::Get, &path)).await?;

        let page = RemotePage {
            items: response
                .albums
                .map(|albums| albums.into_iter().map(Self::convert_album).collect::<Vec<_>>()),
            next_page_token: response.next_page_token,
        };
        debug!(
            albums = page.items.as_ref().map_or(0, Vec::len),
            has_more = page.has_more(),
            "Listed album page"
        );
        Ok(page)
    }

    #[instrument(skip(self, page_token))]
    async fn list_media_page(
        &self,
        page_token: Option<String>,
        page_size: u32,
    ) -> Result<RemotePage<RemoteMediaItem>> {
        let path = format!("/mediaItems{}", page_query(page_token.as_deref(), page_size));
        let response: MediaItemsResponse =
            self.send_json(self.request(HttpMethod::Get, &path)).await?;
        Ok(Self::media_page(response))
    }

    #[instrument(skip(self, page_token))]
    async fn search_media_page(
        &self,
        filter: &MediaFilter,
        page_token: Option<String>,
        page_size: u32,
    ) -> Result<RemotePage<RemoteMediaItem>> {
        let mut body = SearchRequest {
            page_size,
            page_token,
            ..SearchRequest::default()
        };
        match filter {
            MediaFilter::Album(album_id) => body.album_id = Some(album_id.clone()),
            MediaFilter::DateRange { start, end } => {
                body.filters = Some(Filters {
                    date_filter: DateFilter {
                        ranges: vec![DateRange {
                            start_date: to_date(*start),
                            end_date: to_date(*end),
                        }],
                    },
                })
            }
        }

        let request = self
            .request(HttpMethod::Post, "/mediaItems:search")
            .json(&body)?;
        let response: MediaItemsResponse = self.send_json(request).await?;
        Ok(Self::media_page(response))
    }

    #[instrument(skip(self))]
    async fn create_album(&self, title: &str) -> Result<RemoteAlbum> {
        info!("Creating album");
        let body = CreateAlbumRequest {
            album: NewAlbum {
                title: title.to_string(),
            },
        };
        let request = self.request(HttpMethod::Post, "/albums").json(&body)?;
        let album: Album = self.send_json(request).await?;
        Ok(Self::convert_album(album))
    }

    #[instrument(skip(self, content), fields(bytes = content.len()))]
    async fn upload_bytes(&self, file_name: &str, content: Bytes) -> Result<String> {
        let request = self
            .request(HttpMethod::Post, "/uploads")
            .header("Content-Type", "application/octet-stream")
            .header("X-Goog-Upload-File-Name", file_name)
            .header("X-Goog-Upload-Protocol", "raw")
            .timeout(UPLOAD_TIMEOUT)
            .body(content);

        let response = self.send(request).await?;
        let token = response.text()?.trim().to_string();
        if token.is_empty() {
            return Err(GooglePhotosError::ParseError("Empty upload token".to_string()).into());
        }
        Ok(token)
    }

    #[instrument(skip(self, items), fields(items = items.len()))]
    async fn batch_create_media_items(
        &self,
        items: &[NewMediaItem],
    ) -> Result<Vec<CreatedMediaItem>> {
        let body = BatchCreateRequest {
            new_media_items: items
                .iter()
                .map(|item| NewMediaItemBody {
                    description: item.description.clone(),
                    simple_media_item: SimpleMediaItem {
                        upload_token: item.upload_token.clone(),
                        file_name: item.file_name.clone(),
                    },
                })
                .collect(),
        };

        let request = self
            .request(HttpMethod::Post, "/mediaItems:batchCreate")
            .json(&body)?;
        let response: BatchCreateResponse = self.send_json(request).await?;

        Ok(response
            .new_media_item_results
            .into_iter()
            .map(|result| CreatedMediaItem {
                upload_token: result.upload_token,
                media_item: result.media_item.map(Self::convert_media_item),
                status_message: result.status.and_then(|status| status.message),
            })
            .collect())
    }

    #[instrument(skip(self, media_item_ids), fields(items = media_item_ids.len()))]
    async fn batch_add_media_items(&self, album_id: &str, media_item_ids: &[String]) -> Result<()> {
        let body = MediaItemIdsRequest {
            media_item_ids: media_item_ids.to_vec(),
        };
        let path = format!("/albums/{}:batchAddMediaItems", urlencoding::encode(album_id));
        let request = self.request(HttpMethod::Post, &path).json(&body)?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, media_item_ids), fields(items = media_item_ids.len()))]
    async fn batch_remove_media_items(
        &self,
        album_id: &str,
        media_item_ids: &[String],
    ) -> Result<()> {
        let body = MediaItemIdsRequest {
            media_item_ids: media_item_ids.to_vec(),
        };
        let path = format!(
            "/albums/{}:batchRemoveMediaItems",
            urlencoding::encode(album_id)
        );
        let request = self.request(HttpMethod::Post, &path).json(&body)?;
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn body_json(request: &HttpRequest) -> serde_json::Value {
        serde_json::from_slice(request.body.as_ref().unwrap()).unwrap()
    }

    fn connector(mock: MockHttpClient) -> GooglePhotosConnector {
        GooglePhotosConnector::new(Arc::new(mock), "test_token".to_string())
    }

    #[tokio::test]
    async fn test_list_albums_page() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| {
                req.method == HttpMethod::Get
                    && req.url
                        == "https://photoslibrary.googleapis.com/v1/albums?pageSize=50&pageToken=a%2Bb"
                    && req.headers.get("Authorization").map(String::as_str)
                        == Some("Bearer test_token")
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"albums":[{"id":"al1","title":"Green","mediaItemsCount":"4"}],"nextPageToken":"p2"}"#,
                ))
            });

        let page = connector(mock)
            .list_albums_page(Some("a+b".to_string()), 50)
            .await
            .unwrap();

        let albums = page.items.as_ref().unwrap();
        assert_eq!(albums[0].title, "Green");
        assert_eq!(albums[0].media_items_count, Some(4));
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn test_empty_listing_has_no_items() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, "{}")));

        let page = connector(mock).list_media_page(None, 100).await.unwrap();
        assert!(page.items.is_none());
        assert!(!page.has_more());
    }

    #[tokio::test]
    async fn test_search_by_date_range() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| {
                let body = body_json(req);
                req.url.ends_with("/mediaItems:search")
                    && body["pageSize"] == 100
                    && body["filters"]["dateFilter"]["ranges"][0]["startDate"]["year"] == 2019
                    && body["filters"]["dateFilter"]["ranges"][0]["endDate"]["day"] == 10
                    && body.get("albumId").is_none()
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"mediaItems":[{"id":"m1","filename":"2019/a.jpg","mediaMetadata":{"creationTime":"2019-04-09T09:12:51Z"}}]}"#,
                ))
            });

        let filter = MediaFilter::DateRange {
            start: NaiveDate::from_ymd_opt(2019, 4, 9).unwrap(),
            end: NaiveDate::from_ymd_opt(2019, 4, 10).unwrap(),
        };
        let page = connector(mock)
            .search_media_page(&filter, None, 100)
            .await
            .unwrap();

        let items = page.items.unwrap();
        assert_eq!(items[0].filename, "2019/a.jpg");
        assert_eq!(items[0].creation_time.as_deref(), Some("2019-04-09T09:12:51Z"));
    }

    #[tokio::test]
    async fn test_search_by_album() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| {
                let body = body_json(req);
                body["albumId"] == "al1" && body["pageToken"] == "t" && body.get("filters").is_none()
            })
            .returning(|_| Ok(response(200, r#"{"mediaItems":[]}"#)));

        let page = connector(mock)
            .search_media_page(&MediaFilter::Album("al1".to_string()), Some("t".to_string()), 100)
            .await
            .unwrap();
        assert_eq!(page.items, Some(vec![]));
    }

    #[tokio::test]
    async fn test_upload_returns_token() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| {
                req.url.ends_with("/uploads")
                    && req.headers.get("X-Goog-Upload-File-Name").map(String::as_str)
                        == Some("2019/a.jpg")
                    && req.headers.get("X-Goog-Upload-Protocol").map(String::as_str) == Some("raw")
                    && req.body.as_deref() == Some(&b"jpeg"[..])
            })
            .returning(|_| Ok(response(200, "upload-token-1\n")));

        let token = connector(mock)
            .upload_bytes("2019/a.jpg", Bytes::from_static(b"jpeg"))
            .await
            .unwrap();
        assert_eq!(token, "upload-token-1");
    }

    #[tokio::test]
    async fn test_batch_create_reports_each_item() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| {
                let body = body_json(req);
                body["newMediaItems"].as_array().map(Vec::len) == Some(2)
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"newMediaItemResults":[
                        {"uploadToken":"t1","status":{"message":"Success"},"mediaItem":{"id":"m1","filename":"2019/a.jpg"}},
                        {"uploadToken":"t2","status":{"code":3,"message":"Failed: invalid token"}}
                    ]}"#,
                ))
            });

        let items = vec![
            NewMediaItem {
                upload_token: "t1".to_string(),
                file_name: "2019/a.jpg".to_string(),
                description: String::new(),
            },
            NewMediaItem {
                upload_token: "t2".to_string(),
                file_name: "2019/b.jpg".to_string(),
                description: String::new(),
            },
        ];
        let created = connector(mock).batch_create_media_items(&items).await.unwrap();

        assert!(created[0].is_created());
        assert!(!created[1].is_created());
        assert_eq!(created[1].status_message.as_deref(), Some("Failed: invalid token"));
    }

    #[tokio::test]
    async fn test_batch_add_media_items() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| {
                req.url.ends_with("/albums/al1:batchAddMediaItems")
                    && body_json(req)["mediaItemIds"] == serde_json::json!(["m1", "m2"])
            })
            .returning(|_| Ok(response(200, "{}")));

        connector(mock)
            .batch_add_media_items("al1", &["m1".to_string(), "m2".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(response(503, "backend unavailable")));

        let err = connector(mock)
            .batch_remove_media_items("al1", &["m1".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_transient() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(response(401, "invalid credentials")));

        let err = connector(mock).create_album("Green").await.unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(ref msg) if msg.contains("Authentication")));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, "not json")));

        let err = connector(mock).list_albums_page(None, 50).await.unwrap_err();
        assert!(err.to_string().contains("Parse error"));
    }
}

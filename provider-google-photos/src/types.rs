//! Google Photos Library API wire types
//!
//! Data structures for (de)serializing Google Photos Library API v1 bodies.

use serde::{Deserialize, Serialize};

/// Album resource
///
/// See: https://developers.google.com/photos/library/reference/rest/v1/albums#Album
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,

    /// Title, absent for albums without a name
    #[serde(default)]
    pub title: Option<String>,

    /// Item count, encoded as a string by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_items_count: Option<String>,
}

/// albums.list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumsListResponse {
    /// Absent on the last (or an empty) page
    #[serde(default)]
    pub albums: Option<Vec<Album>>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Media item resource
///
/// See: https://developers.google.com/photos/library/reference/rest/v1/mediaItems#MediaItem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,

    #[serde(default)]
    pub filename: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub media_metadata: Option<serde_json::Value>,
}

impl MediaItem {
    /// `mediaMetadata.creationTime`, e.g. `2019-04-09T09:12:51Z`
    pub fn creation_time(&self) -> Option<String> {
        self.media_metadata
            .as_ref()
            .and_then(|metadata| metadata.get("creationTime"))
            .and_then(|value| value.as_str())
            .map(str::to_string)
    }
}

/// mediaItems.list and mediaItems.search response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemsResponse {
    /// Absent when the listing is exhausted or nothing matched
    #[serde(default)]
    pub media_items: Option<Vec<MediaItem>>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// mediaItems.search request
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub page_size: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Filters>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    pub date_filter: DateFilter,
}

#[derive(Debug, Serialize)]
pub struct DateFilter {
    pub ranges: Vec<DateRange>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: Date,
    pub end_date: Date,
}

/// Calendar date without time or zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Date {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// albums.create request
#[derive(Debug, Serialize)]
pub struct CreateAlbumRequest {
    pub album: NewAlbum,
}

#[derive(Debug, Serialize)]
pub struct NewAlbum {
    pub title: String,
}

/// mediaItems.batchCreate request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateRequest {
    pub new_media_items: Vec<NewMediaItemBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItemBody {
    pub description: String,
    pub simple_media_item: SimpleMediaItem,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleMediaItem {
    pub upload_token: String,
    pub file_name: String,
}

/// mediaItems.batchCreate response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateResponse {
    #[serde(default)]
    pub new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaItemResult {
    pub upload_token: String,

    #[serde(default)]
    pub status: Option<Status>,

    #[serde(default)]
    pub media_item: Option<MediaItem>,
}

#[derive(Debug, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: Option<i32>,

    #[serde(default)]
    pub message: Option<String>,
}

/// albums.batchAddMediaItems and albums.batchRemoveMediaItems request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemIdsRequest {
    pub media_item_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_media_items_response() {
        let json = r#"{
            "mediaItems": [
                {
                    "id": "item1",
                    "filename": "2019/kw-green.jpg",
                    "description": "",
                    "mimeType": "image/jpeg",
                    "mediaMetadata": {
                        "creationTime": "2019-04-09T09:12:51Z",
                        "width": "4000",
                        "height": "3000"
                    }
                }
            ],
            "nextPageToken": "token123"
        }"#;

        let response: MediaItemsResponse = serde_json::from_str(json).unwrap();
        let items = response.media_items.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].filename, "2019/kw-green.jpg");
        assert_eq!(items[0].creation_time().as_deref(), Some("2019-04-09T09:12:51Z"));
        assert_eq!(response.next_page_token, Some("token123".to_string()));
    }

    #[test]
    fn test_empty_page_has_no_items() {
        let response: MediaItemsResponse = serde_json::from_str("{}").unwrap();
        assert!(response.media_items.is_none());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_serialize_date_search() {
        let request = SearchRequest {
            page_size: 100,
            filters: Some(Filters {
                date_filter: DateFilter {
                    ranges: vec![DateRange {
                        start_date: Date { year: 2019, month: 4, day: 9 },
                        end_date: Date { year: 2019, month: 4, day: 10 },
                    }],
                },
            }),
            ..SearchRequest::default()
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["pageSize"], 100);
        assert!(json.get("pageToken").is_none());
        assert!(json.get("albumId").is_none());
        assert_eq!(json["filters"]["dateFilter"]["ranges"][0]["startDate"]["day"], 9);
        assert_eq!(json["filters"]["dateFilter"]["ranges"][0]["endDate"]["day"], 10);
    }

    #[test]
    fn test_serialize_batch_create() {
        let request = BatchCreateRequest {
            new_media_items: vec![NewMediaItemBody {
                description: String::new(),
                simple_media_item: SimpleMediaItem {
                    upload_token: "tok".to_string(),
                    file_name: "2019/a.jpg".to_string(),
                },
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json["newMediaItems"][0]["simpleMediaItem"]["uploadToken"],
            "tok"
        );
        assert_eq!(
            json["newMediaItems"][0]["simpleMediaItem"]["fileName"],
            "2019/a.jpg"
        );
    }
}

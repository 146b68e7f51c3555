//! Catalog and reconciler behaviour against a recording provider
//!
//! The stub keeps a log of every call so the tests can assert exactly which
//! remote requests a flow issues.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::photos::{
    CreatedMediaItem, MediaFilter, NewMediaItem, PhotoLibraryProvider, RemoteAlbum,
    RemoteMediaItem, RemotePage,
};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use core_library::{AlbumMembership, Photo};
use core_runtime::config::CoreConfig;
use core_sync::{AlbumStatus, Reconciler, RemoteCatalog, RunPhase, SyncRun};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    ListAlbums(Option<String>),
    ListMedia(Option<String>),
    Search(MediaFilter, Option<String>),
    CreateAlbum(String),
    Upload(String),
    BatchCreate(usize),
    Add(String, usize),
    Remove(String, Vec<String>),
}

impl Call {
    fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateAlbum(_)
                | Call::Upload(_)
                | Call::BatchCreate(_)
                | Call::Add(..)
                | Call::Remove(..)
        )
    }
}

/// In-memory library: media pages keyed by request token, albums by title
#[derive(Default)]
struct RecordingProvider {
    calls: Mutex<Vec<Call>>,
    media_pages: Vec<(Vec<RemoteMediaItem>, Option<String>)>,
    albums: Mutex<Vec<RemoteAlbum>>,
    album_items: HashMap<String, Vec<RemoteMediaItem>>,
}

impl RecordingProvider {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn with_album(self, id: &str, title: &str) -> Self {
        self.albums.lock().unwrap().push(RemoteAlbum {
            id: id.to_string(),
            title: title.to_string(),
            media_items_count: None,
        });
        self
    }

    fn page_for(&self, token: &Option<String>) -> RemotePage<RemoteMediaItem> {
        let index = match token {
            None => 0,
            Some(token) => token.trim_start_matches("page-").parse().unwrap_or(usize::MAX),
        };
        match self.media_pages.get(index) {
            Some((items, next)) => RemotePage::new(items.clone(), next.clone()),
            None => RemotePage::empty(),
        }
    }
}

#[async_trait]
impl PhotoLibraryProvider for RecordingProvider {
    async fn list_albums_page(
        &self,
        page_token: Option<String>,
        _page_size: u32,
    ) -> BridgeResult<RemotePage<RemoteAlbum>> {
        self.record(Call::ListAlbums(page_token));
        Ok(RemotePage::new(self.albums.lock().unwrap().clone(), None))
    }

    async fn list_media_page(
        &self,
        page_token: Option<String>,
        _page_size: u32,
    ) -> BridgeResult<RemotePage<RemoteMediaItem>> {
        self.record(Call::ListMedia(page_token.clone()));
        Ok(self.page_for(&page_token))
    }

    async fn search_media_page(
        &self,
        filter: &MediaFilter,
        page_token: Option<String>,
        _page_size: u32,
    ) -> BridgeResult<RemotePage<RemoteMediaItem>> {
        self.record(Call::Search(filter.clone(), page_token.clone()));
        match filter {
            MediaFilter::Album(id) => Ok(RemotePage::new(
                self.album_items.get(id).cloned().unwrap_or_default(),
                None,
            )),
            MediaFilter::DateRange { .. } => Ok(self.page_for(&page_token)),
        }
    }

    async fn create_album(&self, title: &str) -> BridgeResult<RemoteAlbum> {
        self.record(Call::CreateAlbum(title.to_string()));
        let mut albums = self.albums.lock().unwrap();
        let album = RemoteAlbum {
            id: format!("album-{}", albums.len()),
            title: title.to_string(),
            media_items_count: None,
        };
        albums.push(album.clone());
        Ok(album)
    }

    async fn upload_bytes(&self, file_name: &str, _content: Bytes) -> BridgeResult<String> {
        self.record(Call::Upload(file_name.to_string()));
        Ok(format!("token:{}", file_name))
    }

    async fn batch_create_media_items(
        &self,
        items: &[NewMediaItem],
    ) -> BridgeResult<Vec<CreatedMediaItem>> {
        self.record(Call::BatchCreate(items.len()));
        Ok(items
            .iter()
            .map(|item| CreatedMediaItem {
                upload_token: item.upload_token.clone(),
                media_item: Some(media_item(
                    &format!("new:{}", item.file_name),
                    &item.file_name,
                    "2019-04-09T09:12:51Z",
                )),
                status_message: Some("Success".to_string()),
            })
            .collect())
    }

    async fn batch_add_media_items(&self, album_id: &str, media_item_ids: &[String]) -> BridgeResult<()> {
        self.record(Call::Add(album_id.to_string(), media_item_ids.len()));
        Ok(())
    }

    async fn batch_remove_media_items(
        &self,
        album_id: &str,
        media_item_ids: &[String],
    ) -> BridgeResult<()> {
        self.record(Call::Remove(album_id.to_string(), media_item_ids.to_vec()));
        Ok(())
    }
}

fn media_item(id: &str, filename: &str, creation_time: &str) -> RemoteMediaItem {
    RemoteMediaItem {
        id: id.to_string(),
        filename: filename.to_string(),
        description: None,
        creation_time: Some(creation_time.to_string()),
        metadata: serde_json::Value::Null,
    }
}

fn config(pretend: bool) -> CoreConfig {
    CoreConfig::builder()
        .retry_base_delay(Duration::ZERO)
        .pretend(pretend)
        .build()
        .unwrap()
}

fn at(value: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value).unwrap()
}

fn local_photo(dir: &std::path::Path, short_path: &str, time: &str) -> Photo {
    let full_path = dir.join(short_path.replace('/', "_"));
    std::fs::write(&full_path, short_path.as_bytes()).unwrap();
    Photo::local(short_path, full_path, at(time), Vec::new())
}

fn membership(entries: &[(&str, Vec<Photo>)]) -> AlbumMembership {
    entries
        .iter()
        .map(|(album, photos)| (album.to_string(), photos.iter().cloned().collect::<HashSet<_>>()))
        .collect()
}

#[tokio::test]
async fn test_pagination_concatenates_pages_without_extra_call() {
    let provider = Arc::new(RecordingProvider {
        media_pages: vec![
            (vec![media_item("m1", "a.jpg", "2019-04-09T09:00:00Z")], Some("page-1".to_string())),
            (vec![media_item("m2", "b.jpg", "2019-04-09T09:00:00Z")], Some("page-2".to_string())),
            (vec![media_item("m3", "c.jpg", "2019-04-09T09:00:00Z")], None),
        ],
        ..RecordingProvider::default()
    });
    let catalog = RemoteCatalog::new(provider.clone(), &config(false));

    let items = catalog.list_all_media().collect_all().await.unwrap();

    let ids: Vec<_> = items.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
    assert_eq!(
        provider.calls(),
        vec![
            Call::ListMedia(None),
            Call::ListMedia(Some("page-1".to_string())),
            Call::ListMedia(Some("page-2".to_string())),
        ]
    );
}

#[tokio::test]
async fn test_add_batches_105_ids_as_40_40_25() {
    let provider = Arc::new(RecordingProvider::default());
    let catalog = RemoteCatalog::new(provider.clone(), &config(false));
    let photos: Vec<Photo> = (0..105)
        .map(|i| Photo::remote(format!("{}.jpg", i), format!("m{}", i), None))
        .collect();

    let report = catalog.add_items_to_album(&photos, "al1", 40).await;

    assert_eq!(
        provider.calls(),
        vec![
            Call::Add("al1".to_string(), 40),
            Call::Add("al1".to_string(), 40),
            Call::Add("al1".to_string(), 25),
        ]
    );
    assert_eq!(report.applied, 105);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_add_flow_uploads_only_new_photos() {
    let dir = tempfile::tempdir().unwrap();
    let known = local_photo(dir.path(), "2019/known.jpg", "2019-04-09T11:00:00+02:00");
    let fresh = local_photo(dir.path(), "2019/fresh.jpg", "2019-04-09T12:00:00+02:00");

    let provider = Arc::new(
        RecordingProvider {
            media_pages: vec![(
                vec![media_item("m-known", "2019/known.jpg", "2019-04-09T09:00:00Z")],
                None,
            )],
            ..RecordingProvider::default()
        }
        .with_album("al-green", "Green"),
    );
    let config = config(false);
    let reconciler = Reconciler::new(RemoteCatalog::new(provider.clone(), &config), &config);

    let mut run = SyncRun::new("add-to-albums");
    run.advance(RunPhase::LocalMatched).unwrap();
    let report = reconciler
        .add_to_albums(
            &mut run,
            membership(&[
                ("Green", vec![known.clone(), fresh.clone()]),
                ("Red", vec![fresh.clone()]),
            ]),
        )
        .await
        .unwrap();

    let calls = provider.calls();
    let uploads: Vec<_> = calls
        .iter()
        .filter(|call| matches!(call, Call::Upload(_)))
        .collect();
    assert_eq!(uploads, vec![&Call::Upload("2019/fresh.jpg".to_string())]);
    assert!(calls.contains(&Call::CreateAlbum("Red".to_string())));
    assert!(calls.contains(&Call::Add("al-green".to_string(), 2)));
    assert!(calls.contains(&Call::Add("album-1".to_string(), 1)));

    // Albums are listed once, then again after the creation.
    let listings = calls
        .iter()
        .filter(|call| matches!(call, Call::ListAlbums(_)))
        .count();
    assert_eq!(listings, 2);

    let upload = report.upload.as_ref().unwrap();
    assert_eq!(upload.uploaded, 1);
    assert_eq!(upload.already_remote, 1);
    assert_eq!(report.albums_created, vec!["Red"]);
    assert!(!report.has_failures());
    assert_eq!(run.phase(), RunPhase::Applied);
}

#[tokio::test]
async fn test_existing_albums_are_not_listed_twice() {
    let provider = Arc::new(RecordingProvider::default().with_album("al-green", "Green"));
    let config = config(false);
    let reconciler = Reconciler::new(RemoteCatalog::new(provider.clone(), &config), &config);

    let (ids, created) = reconciler
        .ensure_albums(&["Green".to_string()])
        .await
        .unwrap();

    assert_eq!(ids["Green"], "al-green");
    assert!(created.is_empty());
    assert_eq!(provider.calls(), vec![Call::ListAlbums(None)]);
}

#[tokio::test]
async fn test_empty_desired_set_skips_remote_query() {
    let provider = Arc::new(RecordingProvider::default());
    let config = config(false);
    let reconciler = Reconciler::new(RemoteCatalog::new(provider.clone(), &config), &config);

    let remote = reconciler.query_remote_photos(&HashSet::new()).await.unwrap();

    assert!(remote.is_empty());
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_remove_flow_detaches_only_undesired_items_in_window() {
    let mut album_items = HashMap::new();
    album_items.insert(
        "al-green".to_string(),
        vec![
            media_item("m-keep", "2019/keep.jpg", "2019-04-09T09:30:00.500Z"),
            media_item("m-stale", "2019/stale.jpg", "2019-04-09T09:45:00Z"),
            media_item("m-old", "2018/old.jpg", "2018-01-01T00:00:00Z"),
            media_item("m-bad", "2019/bad.jpg", "yesterday"),
        ],
    );
    let provider = Arc::new(
        RecordingProvider {
            album_items,
            ..RecordingProvider::default()
        }
        .with_album("al-green", "Green"),
    );
    let config = config(false);
    let reconciler = Reconciler::new(RemoteCatalog::new(provider.clone(), &config), &config);

    let desired = vec![
        Photo::local("2019/keep.jpg", "/p/keep.jpg", at("2019-04-09T11:00:00+02:00"), Vec::new()),
        Photo::local("2019/other.jpg", "/p/other.jpg", at("2019-04-09T12:00:00+02:00"), Vec::new()),
    ];
    let mut run = SyncRun::new("remove-from-albums");
    let report = reconciler
        .remove_from_albums(
            &mut run,
            membership(&[("Green", desired), ("Empty", Vec::new())]),
        )
        .await
        .unwrap();

    let removals: Vec<_> = provider
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::Remove(..)))
        .collect();
    assert_eq!(
        removals,
        vec![Call::Remove("al-green".to_string(), vec!["m-stale".to_string()])]
    );

    let empty = report.albums.iter().find(|a| a.album == "Empty").unwrap();
    assert_eq!(empty.status, AlbumStatus::Unchanged);
}

#[tokio::test]
async fn test_missing_album_is_skipped_and_run_continues() {
    let provider = Arc::new(RecordingProvider::default().with_album("al-red", "Red"));
    let config = config(false);
    let reconciler = Reconciler::new(RemoteCatalog::new(provider.clone(), &config), &config);

    let photo = Photo::remote("2019/a.jpg", "m1", Some(at("2019-04-09T09:00:00Z")));
    let membership = membership(&[("Green", vec![photo.clone()]), ("Red", vec![photo])]);
    let mut ids = HashMap::new();
    ids.insert("Red".to_string(), "al-red".to_string());

    let outcomes = reconciler.add_photos_to_albums(&membership, &ids).await;

    assert!(matches!(outcomes[0].status, AlbumStatus::Skipped { .. }));
    assert_eq!(outcomes[1].status, AlbumStatus::Applied);
    assert_eq!(provider.calls(), vec![Call::Add("al-red".to_string(), 1)]);
}

#[tokio::test]
async fn test_pretend_run_issues_no_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let fresh = local_photo(dir.path(), "2019/fresh.jpg", "2019-04-09T12:00:00+02:00");

    let mut album_items = HashMap::new();
    album_items.insert(
        "al-green".to_string(),
        vec![media_item("m-stale", "2019/stale.jpg", "2019-04-09T10:00:00Z")],
    );
    let provider = Arc::new(
        RecordingProvider {
            album_items,
            ..RecordingProvider::default()
        }
        .with_album("al-green", "Green"),
    );
    let config = config(true);
    let reconciler = Reconciler::new(RemoteCatalog::new(provider.clone(), &config), &config);

    let mut run = SyncRun::new("add-to-albums");
    let added = reconciler
        .add_to_albums(
            &mut run,
            membership(&[("Green", vec![fresh.clone()]), ("New", vec![fresh.clone()])]),
        )
        .await
        .unwrap();

    let mut run = SyncRun::new("remove-from-albums");
    reconciler
        .remove_from_albums(&mut run, membership(&[("Green", vec![fresh])]))
        .await
        .unwrap();

    assert!(provider.calls().iter().all(|call| !call.is_mutation()));
    assert!(added.upload.unwrap().simulated);
    assert!(added.albums_created.is_empty());
}

#[tokio::test]
async fn test_remove_window_padding_widens_lower_bound() {
    let mut album_items = HashMap::new();
    album_items.insert(
        "al-green".to_string(),
        vec![
            media_item("m-keep", "2019/keep.jpg", "2019-04-09T09:00:00Z"),
            media_item("m-early", "2019/early.jpg", "2019-04-09T07:00:00Z"),
        ],
    );
    let desired = vec![Photo::local(
        "2019/keep.jpg",
        "/p/keep.jpg",
        at("2019-04-09T11:00:00+02:00"),
        Vec::new(),
    )];

    let mut removed = Vec::new();
    for padding_hours in [0, 3] {
        let provider = Arc::new(
            RecordingProvider {
                album_items: album_items.clone(),
                ..RecordingProvider::default()
            }
            .with_album("al-green", "Green"),
        );
        let config = CoreConfig::builder()
            .retry_base_delay(Duration::ZERO)
            .remove_window_padding(chrono::Duration::hours(padding_hours))
            .build()
            .unwrap();
        let reconciler = Reconciler::new(RemoteCatalog::new(provider.clone(), &config), &config);

        let mut run = SyncRun::new("remove-from-albums");
        reconciler
            .remove_from_albums(&mut run, membership(&[("Green", desired.clone())]))
            .await
            .unwrap();

        removed.push(
            provider
                .calls()
                .into_iter()
                .filter(|call| matches!(call, Call::Remove(..)))
                .collect::<Vec<_>>(),
        );
    }

    // Without padding the window starts at the oldest desired photo.
    assert!(removed[0].is_empty());
    assert_eq!(
        removed[1],
        vec![Call::Remove("al-green".to_string(), vec!["m-early".to_string()])]
    );
}

use super::*;
use crate::StorageConfig;
use chrono::{Duration, Utc};
use image::{ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;
use std::time::SystemTime;
use tempfile::TempDir;

fn create_test_gallery(limits: UploadLimits) -> (Gallery, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig {
        upload_directory: temp_dir.path().join("uploads"),
        public_path_prefix: "/uploads".to_string(),
    };

    (Gallery::with_limits(&config, limits), temp_dir)
}

fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

fn png_upload(name: &str) -> IncomingFile {
    IncomingFile::new(name, "image/png", encoded_image(64, 48, ImageFormat::Png))
}

/// Put a file straight into the upload directory, bypassing ingestion.
fn place_file(gallery: &Gallery, filename: &str, bytes: &[u8], modified: Option<SystemTime>) {
    std::fs::create_dir_all(gallery.directory()).unwrap();
    let path = gallery.directory().join(filename);
    std::fs::write(&path, bytes).unwrap();

    if let Some(modified) = modified {
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(modified).unwrap();
    }
}

fn files_in(gallery: &Gallery) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(gallery.directory())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| is_image(name))
        .collect();
    names.sort();
    names
}

#[test]
fn test_image_id_strips_last_extension() {
    assert_eq!(image_id("0b7c.jpg"), "0b7c");
    assert_eq!(image_id("archive.tar.png"), "archive.tar");
    assert_eq!(image_id("noextension"), "noextension");
    assert_eq!(image_id(".hidden"), ".hidden");
}

#[test]
fn test_validate_filename() {
    assert!(validate_filename("abc.jpg").is_ok());
    assert!(validate_filename("ABC.PNG").is_ok());
    assert!(matches!(
        validate_filename("  "),
        Err(GalleryError::MissingFilename)
    ));
    assert!(matches!(
        validate_filename("../secret.jpg"),
        Err(GalleryError::InvalidFilename(_))
    ));
    assert!(matches!(
        validate_filename("nested/a.jpg"),
        Err(GalleryError::InvalidFilename(_))
    ));
    assert!(matches!(
        validate_filename(METADATA_FILE_NAME),
        Err(GalleryError::InvalidFilename(_))
    ));
}

#[test]
fn test_processing_stats_ratio() {
    let record = ImageRecord {
        id: "a".to_string(),
        filename: "a.jpg".to_string(),
        original_name: "a.png".to_string(),
        path: "/uploads/a.jpg".to_string(),
        size: 250,
        uploaded_at: Utc::now(),
        category: DEFAULT_CATEGORY.to_string(),
        likes: 0,
        is_public: false,
    };
    let images = vec![UploadedImage {
        record,
        original_size: 1000,
    }];

    let stats = ProcessingStats::from_images(&images);
    assert_eq!(stats.total_original_size, 1000);
    assert_eq!(stats.total_processed_size, 250);
    assert_eq!(stats.compression_ratio, "75.0");

    assert_eq!(ProcessingStats::from_images(&[]).compression_ratio, "0");
}

#[test]
fn test_format_megabytes() {
    assert_eq!(format_megabytes(0), "0.00");
    assert_eq!(format_megabytes(250 * 1024 * 1024), "250.00");
    assert_eq!(format_megabytes(1536 * 1024), "1.50");
}

#[test]
fn test_fit_within_never_upscales() {
    let small = image::DynamicImage::new_rgb8(100, 50);
    let fitted = image_processing::fit_within(small, 1920, 1080);
    assert_eq!((fitted.width(), fitted.height()), (100, 50));

    let wide = image::DynamicImage::new_rgb8(4000, 1000);
    let fitted = image_processing::fit_within(wide, 1920, 1080);
    assert_eq!((fitted.width(), fitted.height()), (1920, 480));
}

#[tokio::test]
async fn test_ingest_recompresses_to_jpeg() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());

    let images = gallery
        .ingest(vec![png_upload("logo.png")], "memes")
        .await
        .unwrap();

    assert_eq!(images.len(), 1);
    let image = &images[0];
    assert!(image.record.filename.ends_with(".jpg"));
    assert_eq!(image.record.id, image_id(&image.record.filename));
    assert_eq!(image.record.original_name, "logo.png");
    assert_eq!(image.record.category, "memes");
    assert_eq!(image.record.path, format!("/uploads/{}", image.record.filename));
    assert!(!image.record.is_public);

    let stored = std::fs::read(gallery.directory().join(&image.record.filename)).unwrap();
    assert_eq!(stored.len() as u64, image.record.size);
    assert_eq!(image::guess_format(&stored).unwrap(), ImageFormat::Jpeg);

    let metadata = gallery.metadata().load().await;
    let entry = metadata.get(&image.record.id).unwrap();
    assert!(!entry.is_public);
    assert_eq!(entry.original_name.as_deref(), Some("logo.png"));
    assert_eq!(entry.category(), "memes");
}

#[tokio::test]
async fn test_ingest_blank_category_defaults_to_general() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());

    let images = gallery
        .ingest(vec![png_upload("a.png")], "   ")
        .await
        .unwrap();
    assert_eq!(images[0].record.category, DEFAULT_CATEGORY);
}

#[tokio::test]
async fn test_ingest_resizes_large_images() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    let bytes = encoded_image(4000, 1000, ImageFormat::Jpeg);

    let images = gallery
        .ingest(vec![IncomingFile::new("wide.jpg", "image/jpeg", bytes)], "")
        .await
        .unwrap();

    let stored = image::open(gallery.directory().join(&images[0].record.filename)).unwrap();
    assert_eq!((stored.width(), stored.height()), (1920, 480));
}

#[tokio::test]
async fn test_oversized_file_is_skipped_in_mixed_batch() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    let oversized = IncomingFile::new("huge.jpg", "image/jpeg", vec![0u8; 3 * 1024 * 1024]);

    let images = gallery
        .ingest(vec![oversized, png_upload("small.png")], "")
        .await
        .unwrap();

    assert_eq!(images.len(), 1);
    assert_eq!(images[0].record.original_name, "small.png");
    assert_eq!(files_in(&gallery).len(), 1);
}

#[tokio::test]
async fn test_non_image_content_is_skipped() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    let text = IncomingFile::new("notes.txt", "text/plain", b"hello".to_vec());
    let untyped = IncomingFile {
        name: "mystery.png".to_string(),
        content_type: None,
        bytes: encoded_image(8, 8, ImageFormat::Png),
    };

    let result = gallery.ingest(vec![text, untyped], "").await;
    assert!(matches!(result, Err(GalleryError::NoValidImages)));
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());

    let result = gallery.ingest(Vec::new(), "").await;
    assert!(matches!(result, Err(GalleryError::NoFiles)));
}

#[tokio::test]
async fn test_gif_is_stored_verbatim() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    let mut bytes = b"GIF89a".to_vec();
    bytes.extend_from_slice(&[3u8; 32]);

    let images = gallery
        .ingest(
            vec![IncomingFile::new("dance.gif", "image/gif", bytes.clone())],
            "",
        )
        .await
        .unwrap();

    assert!(images[0].record.filename.ends_with(".gif"));
    let stored = std::fs::read(gallery.directory().join(&images[0].record.filename)).unwrap();
    assert_eq!(stored, bytes);
    assert_eq!(images[0].original_size, images[0].record.size);
}

#[tokio::test]
async fn test_undecodable_image_keeps_original_bytes_and_real_extension() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    // PNG signature followed by garbage: recognizable, but not decodable
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[7u8; 64]);

    let images = gallery
        .ingest(
            vec![IncomingFile::new("broken.png", "image/png", bytes.clone())],
            "",
        )
        .await
        .unwrap();

    assert!(images[0].record.filename.ends_with(".png"));
    let stored = std::fs::read(gallery.directory().join(&images[0].record.filename)).unwrap();
    assert_eq!(stored, bytes);
}

#[tokio::test]
async fn test_unidentifiable_payload_is_skipped() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    let junk = IncomingFile::new("junk.bin", "image/x-unknown", vec![1u8; 128]);

    let result = gallery.ingest(vec![junk], "").await;
    assert!(matches!(result, Err(GalleryError::NoValidImages)));
    assert!(files_in(&gallery).is_empty());
}

#[tokio::test]
async fn test_quota_exceeded_rejects_whole_batch() {
    let limits = UploadLimits {
        max_storage: 10_000,
        ..UploadLimits::default()
    };
    let (gallery, _temp_dir) = create_test_gallery(limits);
    place_file(&gallery, "existing.jpg", &[0u8; 8_000], None);

    let upload = IncomingFile::new("a.png", "image/png", vec![0u8; 3_000]);
    let result = gallery.ingest(vec![upload], "").await;

    match result {
        Err(GalleryError::QuotaExceeded {
            current_usage,
            upload_size,
            max_storage,
        }) => {
            assert_eq!(current_usage, format_megabytes(8_000));
            assert_eq!(upload_size, format_megabytes(3_000));
            assert_eq!(max_storage, format_megabytes(10_000));
        }
        other => panic!("Expected quota error, got {:?}", other),
    }

    assert_eq!(files_in(&gallery), vec!["existing.jpg".to_string()]);
}

#[tokio::test]
async fn test_storage_usage_counts_all_files() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    assert_eq!(gallery.storage_usage().await.unwrap().used, 0);

    place_file(&gallery, "a.jpg", &[0u8; 100], None);
    place_file(&gallery, "notes.txt", &[0u8; 50], None);

    let usage = gallery.storage_usage().await.unwrap();
    assert_eq!(usage.used, 150);
    assert_eq!(usage.limit, UploadLimits::default().max_storage);
}

#[tokio::test]
async fn test_listing_missing_directory_is_none() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());

    assert!(gallery.list_images().await.unwrap().is_none());
    assert!(gallery.list_public_images().await.unwrap().is_none());
}

#[tokio::test]
async fn test_listing_without_metadata_uses_filesystem() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    place_file(&gallery, "one.jpg", &[0u8; 123], None);
    place_file(&gallery, "two.webp", &[0u8; 456], None);
    place_file(&gallery, "readme.md", b"not an image", None);

    let images = gallery.list_images().await.unwrap().unwrap();
    assert_eq!(images.len(), 2);

    for image in &images {
        assert!(!image.is_public);
        assert_eq!(image.category, DEFAULT_CATEGORY);
        assert_eq!(image.likes, 0);
        assert_eq!(image.original_name, image.filename);
        let expected = std::fs::metadata(gallery.directory().join(&image.filename))
            .unwrap()
            .len();
        assert_eq!(image.size, expected);
    }
}

#[tokio::test]
async fn test_listing_is_newest_first() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    let now = SystemTime::now();
    let hour = std::time::Duration::from_secs(3600);

    place_file(&gallery, "old.jpg", &[1], Some(now - hour * 3));
    place_file(&gallery, "new.jpg", &[1], Some(now - hour));
    place_file(&gallery, "mid.jpg", &[1], Some(now - hour * 2));

    let images = gallery.list_images().await.unwrap().unwrap();
    let names: Vec<&str> = images.iter().map(|i| i.filename.as_str()).collect();
    assert_eq!(names, vec!["new.jpg", "mid.jpg", "old.jpg"]);

    for pair in images.windows(2) {
        assert!(pair[0].uploaded_at > pair[1].uploaded_at);
    }
}

#[tokio::test]
async fn test_toggle_public_round_trip() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    let images = gallery
        .ingest(vec![png_upload("a.png"), png_upload("b.png")], "")
        .await
        .unwrap();
    let id = images[0].record.id.clone();

    assert!(gallery.list_public_images().await.unwrap().unwrap().is_empty());

    gallery.set_public(&id, true).await.unwrap();
    let public = gallery.list_public_images().await.unwrap().unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].id, id);
    assert!(public[0].is_public);

    gallery.set_public(&id, false).await.unwrap();
    assert!(gallery.list_public_images().await.unwrap().unwrap().is_empty());
}

#[tokio::test]
async fn test_toggle_twice_restores_state_and_keeps_upload_time() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    let images = gallery
        .ingest(vec![png_upload("a.png")], "")
        .await
        .unwrap();
    let id = images[0].record.id.clone();
    let before = gallery.metadata().load().await.get(&id).cloned().unwrap();

    gallery.set_public(&id, true).await.unwrap();
    gallery.set_public(&id, false).await.unwrap();

    let after = gallery.metadata().load().await.get(&id).cloned().unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_toggle_creates_missing_entry() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    place_file(&gallery, "manual.png", &[1], None);

    let started = Utc::now() - Duration::seconds(1);
    gallery.set_public("manual", true).await.unwrap();

    let entry = gallery.metadata().load().await.get("manual").cloned().unwrap();
    assert!(entry.is_public);
    assert!(entry.uploaded_at >= started);

    let public = gallery.list_public_images().await.unwrap().unwrap();
    assert_eq!(public.len(), 1);
}

#[tokio::test]
async fn test_concurrent_toggles_do_not_lose_updates() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    let gallery = std::sync::Arc::new(gallery);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..20 {
        let gallery = gallery.clone();
        tasks.spawn(async move { gallery.set_public(&format!("img{}", i), true).await });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let metadata = gallery.metadata().load().await;
    assert_eq!(metadata.len(), 20);
    assert!(metadata.values().all(|e| e.is_public));
}

#[tokio::test]
async fn test_delete_removes_file_and_metadata() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    let images = gallery
        .ingest(vec![png_upload("a.png")], "")
        .await
        .unwrap();
    let record = &images[0].record;

    gallery.delete_file(&record.filename).await.unwrap();

    assert!(gallery.list_images().await.unwrap().unwrap().is_empty());
    assert!(!gallery.metadata().load().await.contains_key(&record.id));

    let again = gallery.delete_file(&record.filename).await;
    assert!(matches!(again, Err(GalleryError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_refuses_paths_outside_store() {
    let (gallery, temp_dir) = create_test_gallery(UploadLimits::default());
    std::fs::create_dir_all(gallery.directory()).unwrap();
    std::fs::write(temp_dir.path().join("outside.jpg"), [1u8]).unwrap();

    let result = gallery.delete_file("../outside.jpg").await;
    assert!(matches!(result, Err(GalleryError::InvalidFilename(_))));
    assert!(temp_dir.path().join("outside.jpg").exists());
}

#[tokio::test]
async fn test_delete_by_id() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    place_file(&gallery, "abc.png", &[1], None);

    let filename = gallery.delete_by_id("abc").await.unwrap();
    assert_eq!(filename, "abc.png");
    assert!(files_in(&gallery).is_empty());

    let missing = gallery.delete_by_id("abc").await;
    assert!(matches!(missing, Err(GalleryError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_many_tolerates_partial_failure() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    place_file(&gallery, "a.jpg", &[1], None);
    place_file(&gallery, "b.jpg", &[1], None);
    gallery.set_public("a", true).await.unwrap();

    let report = gallery
        .delete_many(&[
            "a.jpg".to_string(),
            "b.jpg".to_string(),
            "gone.jpg".to_string(),
            "../escape.jpg".to_string(),
        ])
        .await
        .unwrap();

    assert_eq!(report.deleted, 2);
    assert_eq!(report.total, 4);
    assert_eq!(report.message, "Deleted 2 of 4 images");
    assert_eq!(
        report.failed,
        vec!["../escape.jpg".to_string(), "gone.jpg".to_string()]
    );
    assert!(files_in(&gallery).is_empty());
    assert!(gallery.metadata().load().await.is_empty());
}

#[tokio::test]
async fn test_prune_orphans() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    place_file(&gallery, "kept.jpg", &[1], None);
    gallery.set_public("kept", true).await.unwrap();
    gallery.set_public("stale", true).await.unwrap();

    let removed = gallery.prune_orphans().await.unwrap();
    assert_eq!(removed, vec!["stale".to_string()]);

    let metadata = gallery.metadata().load().await;
    assert!(metadata.contains_key("kept"));
    assert!(!metadata.contains_key("stale"));
}

#[tokio::test]
async fn test_like_counts_persist() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    place_file(&gallery, "liked.jpg", &[1], None);

    assert_eq!(gallery.like("liked").await.unwrap(), 1);
    assert_eq!(gallery.like("liked").await.unwrap(), 2);

    let images = gallery.list_images().await.unwrap().unwrap();
    assert_eq!(images[0].likes, 2);

    let missing = gallery.like("nope").await;
    assert!(matches!(missing, Err(GalleryError::NotFound(_))));
}

#[tokio::test]
async fn test_corrupt_metadata_reads_as_empty() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    place_file(&gallery, "a.jpg", &[1], None);
    std::fs::write(gallery.metadata().path(), "{ not json").unwrap();

    assert!(gallery.metadata().load().await.is_empty());
    let images = gallery.list_images().await.unwrap().unwrap();
    assert!(!images[0].is_public);

    // The next write replaces the corrupt document
    gallery.set_public("a", true).await.unwrap();
    assert!(gallery.metadata().load().await.get("a").unwrap().is_public);
}

#[tokio::test]
async fn test_legacy_metadata_document_loads() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    place_file(&gallery, "legacy.jpg", &[1], None);
    std::fs::write(
        gallery.metadata().path(),
        r#"{
  "legacy": {
    "isPublic": true,
    "uploadedAt": "2025-01-02T03:04:05.678Z"
  }
}"#,
    )
    .unwrap();

    let metadata = gallery.metadata().load().await;
    let entry = metadata.get("legacy").unwrap();
    assert!(entry.is_public);
    assert_eq!(entry.category(), DEFAULT_CATEGORY);
    assert_eq!(entry.likes, 0);
    assert!(entry.original_name.is_none());

    let public = gallery.list_public_images().await.unwrap().unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].original_name, "legacy.jpg");
}

#[test]
fn test_stored_size_ignores_vanished_entries() {
    use super::ingest::stored_size;
    use std::io::{Error, ErrorKind};

    assert_eq!(stored_size(Err(Error::from(ErrorKind::NotFound))).unwrap(), 0);
    assert!(stored_size(Err(Error::from(ErrorKind::PermissionDenied))).is_err());

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a.jpg");
    std::fs::write(&path, [0u8; 7]).unwrap();
    assert_eq!(stored_size(std::fs::metadata(&path)).unwrap(), 7);
    assert_eq!(stored_size(std::fs::metadata(temp_dir.path())).unwrap(), 0);
}

#[tokio::test]
async fn test_storage_usage_during_concurrent_deletes() {
    let (gallery, _temp_dir) = create_test_gallery(UploadLimits::default());
    let filenames: Vec<String> = (0..200).map(|i| format!("img{}.jpg", i)).collect();
    for name in &filenames {
        place_file(&gallery, name, &[0u8; 16], None);
    }

    let gallery = std::sync::Arc::new(gallery);
    let deleter = {
        let gallery = gallery.clone();
        tokio::spawn(async move { gallery.delete_many(&filenames).await })
    };

    while !deleter.is_finished() {
        let usage = gallery.storage_usage().await.unwrap();
        assert!(usage.used <= 200 * 16 + 4096);
    }

    let report = deleter.await.unwrap().unwrap();
    assert_eq!(report.deleted, 200);
    let usage = gallery.storage_usage().await.unwrap();
    assert!(usage.used < 16);
}

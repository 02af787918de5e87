//! NativeHost Tests
//!
//! The native host against the local filesystem and `data:` URLs; nothing
//! here touches the network.

use base64::Engine;
use picsave_cli::native::OBJECT_URL_PREFIX;
use picsave_cli::NativeHost;
use picsave_core::prelude::*;
use picsave_core::{FileSaver, Fetcher, ImageLoader, ObjectUrls};
use picsave_test_utils::{animated_gif_bytes, assert_decodes_to, checkerboard, png_bytes};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn data_url(bytes: &[u8], mime: &str) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime};base64,{payload}")
}

fn host(dir: &TempDir) -> Arc<NativeHost> {
    Arc::new(NativeHost::new(dir.path(), None).unwrap())
}

#[tokio::test]
async fn test_fetch_decodes_data_url() {
    let dir = TempDir::new().unwrap();
    let gif = animated_gif_bytes();

    let response = host(&dir).fetch(&data_url(&gif, "image/gif")).await.unwrap();

    assert!(response.is_success());
    assert_eq!(response.content_type.as_deref(), Some("image/gif"));
    assert_eq!(response.body.data(), gif.as_slice());
}

#[tokio::test]
async fn test_object_urls_resolve_until_revoked() {
    let dir = TempDir::new().unwrap();
    let host = host(&dir);
    let blob = Blob::new(png_bytes(&checkerboard(3, 2)), "image/png");

    let url = host.create_object_url(&blob);
    assert!(url.starts_with(OBJECT_URL_PREFIX));
    assert_ne!(url, host.create_object_url(&blob));

    let loaded = host.load(&url).await.unwrap();
    assert_eq!((loaded.natural_width(), loaded.natural_height()), (3, 2));
    assert!(loaded.origin_clean);

    host.revoke_object_url(&url);
    assert_eq!(host.fetch(&url).await.unwrap().status, 404);
    assert!(host.load(&url).await.is_err());
    assert_eq!(host.live_object_urls(), 1);
}

#[tokio::test]
async fn test_load_rejects_undecodable_bytes() {
    let dir = TempDir::new().unwrap();
    let err = host(&dir)
        .load("data:image/png;base64,AAAA")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cannot decode"));
}

#[tokio::test]
async fn test_save_never_overwrites() {
    let dir = TempDir::new().unwrap();
    let host = host(&dir);

    host.save(Blob::from_text("one", "text/plain"), "a.txt").await.unwrap();
    host.save(Blob::from_text("two", "text/plain"), "a.txt").await.unwrap();
    host.save(Blob::from_text("three", "text/plain"), "x/y:z.txt").await.unwrap();

    let read = |name: &str| std::fs::read_to_string(dir.path().join(name)).unwrap();
    assert_eq!(read("a.txt"), "one");
    assert_eq!(read("a (1).txt"), "two");
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 3);
    assert!(names.iter().all(|name| !name.contains('/')));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_of_one_name_keep_every_file() {
    let dir = TempDir::new().unwrap();
    let host = host(&dir);

    let saves: Vec<_> = (0..5)
        .map(|i| {
            let host = Arc::clone(&host);
            tokio::spawn(async move {
                host.save(Blob::from_text(&i.to_string(), "text/plain"), "shot.png").await
            })
        })
        .collect();
    for save in saves {
        save.await.unwrap().unwrap();
    }

    let mut contents: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
        .collect();
    contents.sort();
    assert_eq!(contents, vec!["0", "1", "2", "3", "4"]);
    assert!(dir.path().join("shot.png").is_file());
    assert!(dir.path().join("shot (4).png").is_file());
}

#[tokio::test]
async fn test_save_creates_output_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("out/images");
    let host = NativeHost::new(&nested, Some(Duration::from_secs(5))).unwrap();

    host.save(Blob::from_text("x", "text/plain"), "x.txt").await.unwrap();

    assert!(nested.join("x.txt").is_file());
}

#[tokio::test]
async fn test_downloader_saves_data_url_image() {
    let dir = TempDir::new().unwrap();
    let host = host(&dir);
    let downloader = ImageDownloader::new(Arc::clone(&host) as Arc<dyn Host>);
    let source = data_url(&png_bytes(&checkerboard(4, 3)), "image/png");

    let name = downloader
        .download_image(source.as_str().into(), &DownloadOptions::new().with_filename("board"))
        .await
        .unwrap();

    assert_eq!(name, "board.png");
    let saved = Blob::new(std::fs::read(dir.path().join("board.png")).unwrap(), "image/png");
    assert_decodes_to(&saved, 4, 3);
}

#[tokio::test]
async fn test_zip_archive_is_written_to_disk() {
    let dir = TempDir::new().unwrap();
    let host = host(&dir);
    let downloader = Arc::new(ImageDownloader::new(Arc::clone(&host) as Arc<dyn Host>));
    let store = ArchiveStore::new("album");
    let gif = animated_gif_bytes();
    let sources = vec![
        data_url(&png_bytes(&checkerboard(2, 2)), "image/png").as_str().into(),
        data_url(&gif, "image/gif").as_str().into(),
    ];

    let results = store
        .add_images(
            &downloader,
            sources,
            &DownloadOptions::new().with_directory("pics"),
            BatchOptions::new().with_delay(Duration::ZERO),
        )
        .await
        .unwrap();
    assert!(results.iter().all(Settled::is_fulfilled));

    let filename = store.download(None, &*host).await.unwrap();

    assert_eq!(filename, "album.zip");
    let bytes = std::fs::read(dir.path().join("album.zip")).unwrap();
    assert_eq!(&bytes[..2], b"PK");
    let mut paths = store.paths();
    paths.sort();
    assert_eq!(paths, vec!["pics/image.gif", "pics/image.png"]);
    assert_eq!(store.get("pics/image.gif").unwrap().data(), gif.as_slice());
    assert_eq!(host.live_object_urls(), 0);
}

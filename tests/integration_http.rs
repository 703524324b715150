//! End-to-end tests against a live `serve` instance

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rangesync::config::Config;
use rangesync::index::FileSummary;
use rangesync::patch::PatchEngine;
use rangesync::requester::{fetch_summary, Endpoints, HttpRequester, Requester};
use rangesync::retry::RetryConfig;
use rangesync::serve::{serve, ServeState};
use rangesync::signature::{decode_index, generate_index};
use rangesync::source::{BlockSource, FetchOptions};
use rangesync::sync::SyncEngine;
use rangesync::Error;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const BLOCK_SIZE: usize = 4096;

struct TestServer {
    base: String,
    _shutdown: oneshot::Sender<()>,
}

async fn start_server(path: PathBuf) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(serve(listener, ServeState::new(path, BLOCK_SIZE), async move {
        let _ = rx.await;
    }));

    TestServer {
        base: format!("http://{}/", addr),
        _shutdown: tx,
    }
}

fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

fn test_config() -> Config {
    Config {
        block_size: BLOCK_SIZE,
        jobs: 4,
        progress: false,
        retry_delay_ms: 1,
        max_retry_delay_ms: 5,
        ..Default::default()
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter: 0.0,
    }
}

#[tokio::test]
async fn test_checksum_endpoint_matches_local_index() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ref.bin");
    fs::write(&path, random_bytes(1, 10 * BLOCK_SIZE + 99)).unwrap();
    let server = start_server(path.clone()).await;

    let body = reqwest::get(format!("{}checksum?blockSize={}", server.base, BLOCK_SIZE))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();

    let served = decode_index(&body[..]).unwrap();
    assert_eq!(served, generate_index(&path, BLOCK_SIZE).unwrap());

    // Without a query the default block size applies
    let body = reqwest::get(format!("{}checksum", server.base))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(decode_index(&body[..]).unwrap().len(), 11);
}

#[tokio::test]
async fn test_checksum_rejects_bad_block_size() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ref.bin");
    fs::write(&path, b"abc").unwrap();
    let server = start_server(path).await;

    let resp = reqwest::get(format!("{}checksum?blockSize=0", server.base))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_content_range_requests() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ref.txt");
    fs::write(&path, b"The quick brown fox jumped over the lazy dog").unwrap();
    let server = start_server(path).await;
    let client = reqwest::Client::new();
    let url = format!("{}content", server.base);

    let resp = client.get(&url).header(RANGE, "bytes=4-8").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(resp.headers()[CONTENT_RANGE], "bytes 4-8/44");
    assert_eq!(resp.bytes().await.unwrap(), "quick");

    let resp = client.get(&url).header(RANGE, "bytes=-3").send().await.unwrap();
    assert_eq!(resp.bytes().await.unwrap(), "dog");

    let resp = client.get(&url).header(RANGE, "bytes=44-").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(resp.headers()[CONTENT_RANGE], "bytes */44");

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().len(), 44);
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let server = start_server(dir.path().join("gone.bin")).await;

    let resp = reqwest::get(format!("{}content", server.base)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let endpoints = Endpoints::from_base(&server.base).unwrap();
    let result = fetch_summary(&reqwest::Client::new(), &endpoints, BLOCK_SIZE, &fast_retry()).await;
    assert!(matches!(result, Err(Error::Protocol { .. })));
}

#[tokio::test]
async fn test_http_requester_fetches_ranges() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ref.txt");
    fs::write(&path, b"The quick brown fox jumped over the lazy dog").unwrap();
    let server = start_server(path).await;

    let endpoints = Endpoints::from_base(&server.base).unwrap();
    let requester = HttpRequester::new(reqwest::Client::new(), endpoints.content);

    assert_eq!(requester.fetch(10, 15).await.unwrap(), "brown");
    assert_eq!(requester.fetch(40, 44).await.unwrap(), " dog");
    assert!(requester.fetch(5, 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_patch_over_http() {
    let dir = TempDir::new().unwrap();
    let reference = random_bytes(2, 40 * BLOCK_SIZE + 1234);
    let ref_path = dir.path().join("ref.bin");
    fs::write(&ref_path, &reference).unwrap();
    let server = start_server(ref_path).await;

    let mut local = reference.clone();
    local[3 * BLOCK_SIZE + 7] ^= 0x55;
    local[30 * BLOCK_SIZE] ^= 0x55;

    let endpoints = Endpoints::from_base(&server.base).unwrap();
    let client = reqwest::Client::new();
    let summary = fetch_summary(&client, &endpoints, BLOCK_SIZE, &fast_retry())
        .await
        .unwrap();
    assert_eq!(summary.file_size(), reference.len() as u64);

    let source = BlockSource::new(
        Arc::new(HttpRequester::new(client, endpoints.content.clone())),
        Arc::new(summary),
        FetchOptions {
            retry: fast_retry(),
            ..Default::default()
        },
    );
    let engine = PatchEngine::new(source);

    let mut output = Cursor::new(Vec::new());
    let stats = engine.patch(&local, &mut output).await.unwrap();

    assert_eq!(output.into_inner(), reference);
    assert_eq!(stats.blocks_fetched, 2);
    assert_eq!(stats.range_requests, 2);
    assert_eq!(stats.bytes_downloaded, 2 * BLOCK_SIZE as u64);
}

#[tokio::test]
async fn test_sync_engine_pull_in_place() {
    let dir = TempDir::new().unwrap();
    let reference = random_bytes(3, 25 * BLOCK_SIZE + 10);
    let ref_path = dir.path().join("ref.bin");
    fs::write(&ref_path, &reference).unwrap();
    let server = start_server(ref_path).await;

    // Older copy: an extra header and a missing tail
    let local_path = dir.path().join("local.bin");
    let mut local = b"stale header".to_vec();
    local.extend_from_slice(&reference[..20 * BLOCK_SIZE]);
    fs::write(&local_path, &local).unwrap();

    let engine = SyncEngine::new(test_config(), &server.base).unwrap();
    let stats = engine.pull(&local_path, &local_path).await.unwrap();

    assert_eq!(fs::read(&local_path).unwrap(), reference);
    assert_eq!(stats.blocks_copied, 20);
    assert_eq!(stats.blocks_fetched, 6);

    // A second pull has nothing left to fetch
    let stats = engine.pull(&local_path, &local_path).await.unwrap();
    assert_eq!(stats.blocks_fetched, 0);
    assert_eq!(stats.range_requests, 0);
}

#[tokio::test]
async fn test_sync_engine_pull_to_new_file() {
    let dir = TempDir::new().unwrap();
    let reference = random_bytes(4, 3 * BLOCK_SIZE);
    let ref_path = dir.path().join("ref.bin");
    fs::write(&ref_path, &reference).unwrap();
    let server = start_server(ref_path).await;

    let output = dir.path().join("out/copy.bin");
    let engine = SyncEngine::new(test_config(), &server.base).unwrap();
    let stats = engine
        .pull(&dir.path().join("nothing-here.bin"), &output)
        .await
        .unwrap();

    assert_eq!(fs::read(&output).unwrap(), reference);
    assert_eq!(stats.blocks_fetched, 3);
}

#[tokio::test]
async fn test_index_for_other_block_size_rejected() {
    let dir = TempDir::new().unwrap();
    let ref_path = dir.path().join("ref.bin");
    fs::write(&ref_path, random_bytes(5, 8 * BLOCK_SIZE)).unwrap();
    let server = start_server(ref_path).await;

    let body = reqwest::get(format!("{}checksum?blockSize={}", server.base, BLOCK_SIZE))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let index = decode_index(&body[..]).unwrap();

    assert!(FileSummary::new(&index, BLOCK_SIZE / 2).is_err());
}

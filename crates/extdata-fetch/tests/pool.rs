//! Server selection, staging and failover behavior of the pool client.

use std::time::Duration;

use extdata_fetch::pool::Call;
use extdata_fetch::{
    ByteStream, Client, Error, FakeTransport, ObjectUrl, PoolClient, PoolOptions, Result,
    Transport, fetch_to,
};

const SERVERS: [&str; 3] = ["http://s0:8082", "http://s1:8082", "http://s2:8082"];

fn transport_with(urls: &[&str]) -> FakeTransport {
    urls.iter().fold(FakeTransport::new(), |t, url| {
        t.with_object(*url, format!("contents of {url}").into_bytes())
    })
}

async fn fetch(pool: &PoolClient<FakeTransport>, url: &str) -> Vec<u8> {
    let mut out = Vec::new();
    fetch_to(pool, url, &mut out).await.unwrap();
    out
}

#[tokio::test]
async fn test_repeated_fetches_route_to_same_server() {
    let url = "gs://bucket/data/f1.bin";
    let transport = transport_with(&[url]);
    let pool = PoolClient::new(SERVERS, transport.clone(), PoolOptions::new()).await;

    for _ in 0..5 {
        assert_eq!(fetch(&pool, url).await, format!("contents of {url}").into_bytes());
    }

    // The first fetch stages; later ones find the staged copy on that server.
    let staged_on = transport.staged_on();
    assert_eq!(staged_on.len(), 1);
    let served = transport.served_by();
    assert_eq!(served.len(), 5);
    assert!(served.iter().all(|s| *s == staged_on[0]));
}

#[tokio::test]
async fn test_selection_is_stable_across_pools() {
    let url = "gs://bucket/data/f1.bin";
    let mut chosen = Vec::new();
    for _ in 0..3 {
        let transport = transport_with(&[url]);
        let pool = PoolClient::new(SERVERS, transport.clone(), PoolOptions::new()).await;
        fetch(&pool, url).await;
        chosen.extend(transport.staged_on());
    }
    assert_eq!(chosen.len(), 3);
    assert!(chosen.iter().all(|s| *s == chosen[0]));
}

#[tokio::test]
async fn test_different_objects_spread_over_servers() {
    let urls: Vec<String> = (0..32).map(|i| format!("gs://bucket/data/f{i}.bin")).collect();
    let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let transport = transport_with(&refs);
    let pool = PoolClient::new(SERVERS, transport.clone(), PoolOptions::new()).await;

    for url in &refs {
        fetch(&pool, url).await;
    }
    let used: std::collections::HashSet<String> = transport.staged_on().into_iter().collect();
    assert!(used.len() > 1);
}

#[tokio::test]
async fn test_down_server_is_never_selected() {
    let urls: Vec<String> = (0..16).map(|i| format!("gs://bucket/data/f{i}.bin")).collect();
    let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let transport = transport_with(&refs).with_down(SERVERS[1]);
    let pool = PoolClient::new(SERVERS, transport.clone(), PoolOptions::new()).await;

    assert!(pool.status().contains(&format!("{}: DOWN", SERVERS[1])));
    for url in &refs {
        fetch(&pool, url).await;
    }
    let touched_down = transport.calls().into_iter().any(|call| match call {
        Call::IsStaged { server, .. } | Call::Stage { server, .. } | Call::OpenStatic { server, .. } => {
            server == SERVERS[1]
        }
        Call::CheckHealth { .. } => false,
    });
    assert!(!touched_down);
}

#[tokio::test]
async fn test_prefers_server_with_staged_copy() {
    let url = "gs://bucket/data/f1.bin";
    let transport = transport_with(&[url]).with_staged(SERVERS[2], url);
    let pool = PoolClient::new(SERVERS, transport.clone(), PoolOptions::new()).await;

    fetch(&pool, url).await;
    assert!(transport.staged_on().is_empty());
    assert_eq!(transport.served_by(), vec![SERVERS[2].to_string()]);
}

#[tokio::test]
async fn test_staged_check_error_escalates() {
    let url = "gs://bucket/data/f1.bin";
    let transport = transport_with(&[url])
        .with_staged(SERVERS[0], url)
        .with_broken_lookup(SERVERS[1]);
    let pool = PoolClient::new(SERVERS, transport.clone(), PoolOptions::new()).await;

    let err = pool.open(url).await.err().unwrap();
    match err {
        Error::StagedCheck { server, .. } => assert_eq!(server, SERVERS[1]),
        other => panic!("expected StagedCheck, got {other}"),
    }
    assert!(transport.served_by().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_object_fails_after_retries() {
    let transport = FakeTransport::new();
    let options = PoolOptions::new().stage_retry_delay(Duration::from_millis(5));
    let pool = PoolClient::new(SERVERS, transport.clone(), options).await;

    let err = pool.open("gs://bucket/absent").await.err().unwrap();
    assert!(matches!(err, Error::StagingFailed { attempts: 3, .. }));
    assert!(err.to_string().contains("file not found"));
}

#[tokio::test]
async fn test_caller_deadline_aborts_fetch() {
    let url = "gs://bucket/data/f1.bin";
    let transport = SERVERS
        .iter()
        .fold(transport_with(&[url]), |t, server| t.with_stage_failures(*server, 100));
    let options = PoolOptions::new()
        .stage_attempts(100)
        .stage_retry_delay(Duration::from_secs(60));
    let pool = PoolClient::new(SERVERS, transport, options).await;

    let result = tokio::time::timeout(Duration::from_millis(50), pool.open(url)).await;
    assert!(result.is_err());
}

/// Hangs health checks of one server and every staged-copy lookup.
struct Slow {
    inner:       FakeTransport,
    slow_health: &'static str,
}

const HANG: Duration = Duration::from_secs(600);

impl Transport for Slow {
    async fn check_health(&self, server: &str) -> Result<()> {
        if server == self.slow_health {
            tokio::time::sleep(HANG).await;
        }
        self.inner.check_health(server).await
    }

    async fn is_staged(&self, server: &str, object: &ObjectUrl) -> Result<bool> {
        tokio::time::sleep(HANG).await;
        self.inner.is_staged(server, object).await
    }

    async fn stage(&self, server: &str, object: &ObjectUrl) -> Result<()> {
        self.inner.stage(server, object).await
    }

    async fn open_static(&self, server: &str, object: &ObjectUrl) -> Result<ByteStream> {
        self.inner.open_static(server, object).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_health_check_marks_server_down() {
    let transport = Slow {
        inner:       FakeTransport::new(),
        slow_health: "http://slow",
    };
    let pool = PoolClient::new(["http://fast", "http://slow"], transport, PoolOptions::new()).await;

    assert_eq!(pool.up_servers(), vec!["http://fast"]);
    let status = pool.status();
    assert!(status.starts_with("1 of 2 backend servers up"), "{status}");
    assert!(
        status.contains("http://slow: DOWN (health check of http://slow timed out after 5s)"),
        "{status}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_staged_lookup_falls_through_to_staging() {
    let url = "gs://bucket/data/f1.bin";
    let inner = transport_with(&[url]);
    let transport = Slow {
        inner:       inner.clone(),
        slow_health: "",
    };
    let pool = PoolClient::new(SERVERS, transport, PoolOptions::new()).await;
    assert_eq!(pool.up_servers().len(), 3);

    let start = tokio::time::Instant::now();
    let mut out = Vec::new();
    fetch_to(&pool, url, &mut out).await.unwrap();
    assert_eq!(out, format!("contents of {url}").into_bytes());
    // Bounded by the lookup timeout, not by the hung lookups.
    assert!(start.elapsed() < HANG);
    assert_eq!(inner.staged_on().len(), 1);
    assert_eq!(inner.served_by(), inner.staged_on());
}

/*!
 * Common test utilities for the manifest-sync test suite
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use manifest_sync::app_config::{RetryConfig, SchedulerConfig};
use manifest_sync::content_hash;
use manifest_sync::database::models::{AppRecord, AppStatus, FileStatus};
use manifest_sync::database::{NewVersion, Repository};
use manifest_sync::integrations::mock::{CountingDiffer, MockFetcher, MockValidator, RecordingNotifier, RecordingStorefront};
use manifest_sync::pipeline::{EffectExecutor, Reconciler, Scheduler};

/// Route library logs to the test output; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Insert a hosted app with the given status
pub async fn seed_app(repo: &Repository, id: i64, name: &str, status: AppStatus) -> Result<AppRecord> {
    let mut app = AppRecord::new(
        id,
        format!("https://apps.example.com/{}/manifest.webapp", id),
        name.to_string(),
        "dev@example.com".to_string(),
        "en".to_string(),
    );
    app.status = status;
    repo.create_app(&app).await?;
    Ok(app)
}

/// Store `body` as the app's current manifest: one version and one file
/// whose hash matches what a fetch of the same body produces
pub async fn seed_manifest(repo: &Repository, app_id: i64, body: &str, file_status: FileStatus) -> Result<i64> {
    let version_id = repo
        .create_version(
            app_id,
            NewVersion {
                version: "1.0".to_string(),
                release_notes: None,
                developer_name: "Example Developer".to_string(),
                nominated_at: Some("2014-03-01T10:00:00+00:00".to_string()),
                supported_locales: Vec::new(),
                manifest_json: Some(body.to_string()),
            },
        )
        .await?;
    repo.add_file(version_id, &content_hash(body.as_bytes()), file_status).await
}

/// A scheduler wired to recording doubles, plus handles on every double
pub struct TestPipeline {
    pub repo: Repository,
    pub fetcher: MockFetcher,
    pub validator: MockValidator,
    pub differ: CountingDiffer,
    pub notifier: RecordingNotifier,
    pub storefront: RecordingStorefront,
    pub scheduler: Arc<Scheduler>,
}

impl TestPipeline {
    /// Pipeline over a fresh in-memory database, serving `body`
    pub fn serving(body: &str) -> Result<Self> {
        Self::build(MockFetcher::serving(body.to_string()), MockValidator::passing())
    }

    /// Pipeline with explicit fetcher and validator doubles
    pub fn build(fetcher: MockFetcher, validator: MockValidator) -> Result<Self> {
        init_logging();

        let repo = Repository::new_in_memory()?;
        let differ = CountingDiffer::new();
        let notifier = RecordingNotifier::new();
        let storefront = RecordingStorefront::new();

        let reconciler = Reconciler::new(
            repo.clone(),
            Arc::new(fetcher.clone()),
            Arc::new(validator.clone()),
            Arc::new(differ.clone()),
            RetryConfig::default(),
        );
        let executor = EffectExecutor::new(repo.clone(), Arc::new(notifier.clone()), Arc::new(storefront.clone()));
        let scheduler = Arc::new(Scheduler::new(
            repo.clone(),
            reconciler,
            executor,
            SchedulerConfig::default(),
        ));

        Ok(Self {
            repo,
            fetcher,
            validator,
            differ,
            notifier,
            storefront,
            scheduler,
        })
    }

    /// Run one cycle for one app and execute its effects
    pub async fn cycle(&self, app_id: i64) -> manifest_sync::pipeline::BatchReport {
        self.scheduler.run_batch(vec![app_id]).await
    }

    pub async fn review_entry_count(&self, app_id: i64) -> usize {
        self.repo.review_entries_for(app_id).await.map(|e| e.len()).unwrap_or_default()
    }

    pub async fn failure_count(&self, app_id: i64) -> u32 {
        self.repo
            .get_retry_state(app_id)
            .await
            .map(|s| s.failure_count)
            .unwrap_or(u32::MAX)
    }
}

/// Canned answer of the HTTP stub
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl StubResponse {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Minimal HTTP/1.1 server answering every request with the same response
pub struct HttpStub {
    pub base_url: String,
    requests: Arc<AtomicUsize>,
    received: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl HttpStub {
    pub async fn start(response: StubResponse) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let requests = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let counter = requests.clone();
        let log = received.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let response = response.clone();
                let counter = counter.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let request = read_request(&mut socket).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    log.lock().push(request);

                    tokio::time::sleep(response.delay).await;

                    let reply = format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        response.status,
                        if response.status < 300 { "OK" } else { "Error" },
                        response.body.len(),
                        response.body
                    );
                    let _ = socket.write_all(reply.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Ok(Self {
            base_url,
            requests,
            received,
        })
    }

    /// URL of a path on the stub
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Raw requests received so far (head and whatever body arrived with it)
    pub fn requests(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

/// Read one request: the head, then as much body as Content-Length announces
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(read) => read,
        };
        data.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&data);
        let Some(head_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let content_length = text[..head_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if data.len() >= head_end + 4 + content_length {
            break;
        }
    }

    String::from_utf8_lossy(&data).to_string()
}

/// A local URL nothing listens on
pub async fn closed_port_url() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}/manifest.webapp", addr))
}

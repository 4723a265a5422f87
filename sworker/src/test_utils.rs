//! Fakes for the injected collaborators: a scripted network, a failing
//! store and in-memory stand-ins for the page-side hooks.
use crate::lifecycle::{ScopeError, WorkerScope};
use crate::reset::{PageError, PageHost, PageStorage, Registrations, ResetStep};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use sworker_cache::{CacheEntry, CacheError, HttpRequest, HttpResponse, PartitionStore};
use sworker_config::{NetworkClient, NetworkError};
use url::Url;

type Scripted = Result<HttpResponse, NetworkError>;

fn key(url: &str) -> String {
    let mut url = Url::parse(url).expect("scripted URL must be absolute");
    url.set_fragment(None);
    url.to_string()
}

/// Network that answers from per-URL scripts.
///
/// A script is a queue of results; the last one keeps answering once the
/// others are used up. Unscripted URLs fail with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<HttpRequest>>,
    offline: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `url` with `response`.
    pub fn respond(&self, url: &str, response: HttpResponse) {
        self.set_script(url, Ok(response));
    }

    /// Always fail `url` with `error`.
    pub fn fail(&self, url: &str, error: NetworkError) {
        self.set_script(url, Err(error));
    }

    /// While offline every fetch fails, scripts are left untouched.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every answer, on the tokio clock.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        let url = key(url);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|req| req.cache_key() == url)
            .count()
    }

    fn set_script(&self, url: &str, result: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .insert(key(url), VecDeque::from([result]));
    }

    fn next(&self, request: &HttpRequest) -> Scripted {
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Transport("network is offline".to_string()));
        }
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&request.cache_key()) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(NetworkError::Transport("empty script".to_string()))),
            None => Err(NetworkError::Transport(format!(
                "no route to {}",
                request.url
            ))),
        }
    }
}

#[async_trait]
impl NetworkClient for ScriptedNetwork {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        self.calls.lock().unwrap().push(request.clone());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.next(request)
    }
}

/// Store whose every call fails.
#[derive(Debug, Default)]
pub struct FailingStore;

fn broken<T>() -> Result<T, CacheError> {
    Err(CacheError::Store("store unavailable".to_string()))
}

#[async_trait]
impl PartitionStore for FailingStore {
    async fn open(&self, _partition: &str) -> Result<(), CacheError> {
        broken()
    }

    async fn partitions(&self) -> Result<Vec<String>, CacheError> {
        broken()
    }

    async fn delete(&self, _partition: &str) -> Result<bool, CacheError> {
        broken()
    }

    async fn get(
        &self,
        _partition: &str,
        _request: &HttpRequest,
    ) -> Result<Option<CacheEntry>, CacheError> {
        broken()
    }

    async fn put(
        &self,
        _partition: &str,
        _request: &HttpRequest,
        _response: HttpResponse,
    ) -> Result<(), CacheError> {
        broken()
    }

    async fn remove(
        &self,
        _partition: &str,
        _request: &HttpRequest,
    ) -> Result<bool, CacheError> {
        broken()
    }

    async fn entry_count(&self, _partition: &str) -> Result<usize, CacheError> {
        broken()
    }
}

/// Worker scope that counts lifecycle calls.
#[derive(Debug, Default)]
pub struct RecordingScope {
    skip_waiting: AtomicUsize,
    claims: AtomicUsize,
    clients: usize,
}

impl RecordingScope {
    pub fn with_clients(clients: usize) -> Self {
        Self {
            clients,
            ..Self::default()
        }
    }

    pub fn skip_waiting_calls(&self) -> usize {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn claim_calls(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerScope for RecordingScope {
    async fn skip_waiting(&self) -> Result<(), ScopeError> {
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn claim_clients(&self) -> Result<usize, ScopeError> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        Ok(self.clients)
    }
}

/// Key/value page storage kept in memory.
#[derive(Debug, Default)]
pub struct MemoryPageStorage {
    items: Mutex<BTreeMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryPageStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items<'a>(items: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let storage = Self::new();
        for (k, v) in items {
            storage.set_item(k, v);
        }
        storage
    }

    pub fn set_item(&self, key: &str, value: &str) {
        self.items
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().unwrap().get(key).cloned()
    }

    /// Make every removal fail.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }
}

impl PageStorage for MemoryPageStorage {
    fn keys(&self) -> Result<Vec<String>, PageError> {
        Ok(self.items.lock().unwrap().keys().cloned().collect())
    }

    fn remove_item(&self, key: &str) -> Result<(), PageError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(PageError::Storage(format!("cannot remove {key}")));
        }
        self.items.lock().unwrap().remove(key);
        Ok(())
    }
}

/// What a [`RecordingPageHost`] was asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Overlay(String),
    Progress(ResetStep),
    Error(String),
    Reload,
}

#[derive(Debug, Default)]
pub struct RecordingPageHost {
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingPageHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl PageHost for RecordingPageHost {
    fn show_overlay(&self, message: &str) {
        self.record(HostEvent::Overlay(message.to_string()));
    }

    fn update_overlay(&self, step: ResetStep) {
        self.record(HostEvent::Progress(step));
    }

    fn show_error(&self, message: &str) {
        self.record(HostEvent::Error(message.to_string()));
    }

    fn reload(&self) -> Result<(), PageError> {
        self.record(HostEvent::Reload);
        Ok(())
    }
}

/// Registration list that unregisters `count` entries.
#[derive(Debug, Default)]
pub struct FakeRegistrations {
    count: usize,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeRegistrations {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registrations for FakeRegistrations {
    async fn unregister_all(&self) -> Result<usize, PageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PageError::Registration(
                "unregister rejected".to_string(),
            ));
        }
        Ok(self.count)
    }
}

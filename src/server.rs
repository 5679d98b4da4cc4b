use crate::dashboard::Dashboard;
use crate::request::DashboardRequest;
use crate::selection::SelectionState;
use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const SESSION_COOKIE: &str = "ta_session";

const MAX_SESSIONS: usize = 10_000;
const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

struct Session {
    state: Arc<Mutex<SelectionState>>,
    last_seen: Instant,
}

/// Per-browser selection state, keyed by the session cookie.
///
/// Only sessions whose state differs from the default are kept, so visitors
/// that never interact leave nothing behind. The map is capped at
/// `max_sessions`; idle sessions expire after `ttl`, and when the map is
/// still full the least recently seen one is dropped.
pub struct SessionStore {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<u64, Session>>,
    max_sessions: usize,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_limits(MAX_SESSIONS, SESSION_TTL)
    }

    pub fn with_limits(max_sessions: usize, ttl: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            sessions: Mutex::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The id the request belongs to, allocating one for new visitors.
    pub fn resolve(&self, id: Option<u64>) -> u64 {
        id.unwrap_or_else(|| self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Current state of a session, default when unknown.
    pub fn get(&self, id: u64) -> SelectionState {
        let slot = self.lock().get(&id).map(|session| Arc::clone(&session.state));
        slot.map(|state| lock_state(&state).clone()).unwrap_or_default()
    }

    /// Run one pass for session `id`. The session's lock is held for the
    /// whole pass, so concurrent requests from one browser apply in turn
    /// and none of them works from a stale state.
    pub fn transition<R>(
        &self,
        id: u64,
        pass: impl FnOnce(SelectionState) -> (R, SelectionState),
    ) -> R {
        let slot = self.slot(id);
        let (output, is_default) = {
            let mut state = lock_state(&slot);
            let (output, next) = pass(state.clone());
            let is_default = next == SelectionState::default();
            *state = next;
            (output, is_default)
        };
        if is_default {
            self.forget_if_default(id);
        }
        output
    }

    fn slot(&self, id: u64) -> Arc<Mutex<SelectionState>> {
        let now = Instant::now();
        let mut sessions = self.lock();
        if let Some(session) = sessions.get_mut(&id) {
            session.last_seen = now;
            return Arc::clone(&session.state);
        }

        if sessions.len() >= self.max_sessions {
            let ttl = self.ttl;
            sessions.retain(|_, session| now.duration_since(session.last_seen) < ttl);
        }
        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, session)| session.last_seen)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                debug!(session = oldest, "session store full, evicting");
                sessions.remove(&oldest);
            }
        }

        let state = Arc::new(Mutex::new(SelectionState::default()));
        sessions.insert(
            id,
            Session {
                state: Arc::clone(&state),
                last_seen: now,
            },
        );
        state
    }

    /// A default state is the same as no entry at all.
    fn forget_if_default(&self, id: u64) {
        let mut sessions = self.lock();
        let still_default = sessions
            .get(&id)
            .map(|session| *lock_state(&session.state) == SelectionState::default())
            .unwrap_or(false);
        if still_default {
            sessions.remove(&id);
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_state(state: &Mutex<SelectionState>) -> MutexGuard<'_, SelectionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Dashboard>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard: Arc::new(dashboard),
            sessions: Arc::new(SessionStore::new()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/export.csv", get(export))
        .route("/logo", get(logo))
        .with_state(state)
}

pub async fn serve(dashboard: Dashboard, bind_address: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", bind_address, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("listening on http://{addr}");
    axum::serve(listener, router(AppState::new(dashboard)))
        .await
        .context("HTTP server stopped unexpectedly")?;
    Ok(())
}

async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let request = DashboardRequest::from_pairs(&pairs);
    let id = state.sessions.resolve(session_id(&headers));
    debug!(session = id, action = ?request.action, clicked = ?request.clicked, "render pass");

    let html = state
        .sessions
        .transition(id, |current| state.dashboard.page(&request, current));

    ([(header::SET_COOKIE, session_cookie(id))], Html(html)).into_response()
}

async fn export(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let request = DashboardRequest::from_pairs(&pairs);
    let current = session_id(&headers)
        .map(|id| state.sessions.get(id))
        .unwrap_or_default();

    match state.dashboard.export(&request, &current) {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"training_view.csv\""),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("CSV export failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "CSV export failed").into_response()
        }
    }
}

async fn logo(State(state): State<AppState>) -> Response {
    let Some(path) = state.dashboard.logo_path() else {
        return (StatusCode::NOT_FOUND, "logo not found").into_response();
    };
    match tokio::fs::read(path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, image_content_type(path))], bytes).into_response(),
        Err(e) => {
            warn!(path = %path.display(), "failed to read logo: {}", e);
            (StatusCode::NOT_FOUND, "logo not found").into_response()
        }
    }
}

fn image_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

fn session_id(headers: &HeaderMap) -> Option<u64> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == SESSION_COOKIE)
        .and_then(|(_, value)| value.parse().ok())
}

fn session_cookie(id: u64) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{ParticipationLabels, SelectionEvent};
    use axum::http::HeaderValue;

    #[test]
    fn cookie_lookup_finds_session_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; ta_session=42; x=1"));
        assert_eq!(session_id(&headers), Some(42));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("ta_session=nope"));
        assert_eq!(session_id(&headers), None);
        assert_eq!(session_id(&HeaderMap::new()), None);
    }

    fn paused_on(index: usize) -> SelectionState {
        SelectionState {
            rotation_index: index,
            auto_rotate: false,
            selected_types: [format!("T{}", index)].into(),
        }
    }

    #[test]
    fn new_visitors_get_distinct_ids_and_fresh_state() {
        let store = SessionStore::new();
        let a = store.resolve(None);
        let b = store.resolve(None);
        assert_ne!(a, b);
        assert_eq!(store.resolve(Some(a)), a);
        assert_eq!(store.get(a), SelectionState::default());
        assert!(store.is_empty());
    }

    #[test]
    fn passes_that_keep_the_default_state_store_nothing() {
        let store = SessionStore::new();
        for _ in 0..500 {
            let id = store.resolve(None);
            store.transition(id, |state| ((), state));
        }
        assert!(store.is_empty());
    }

    #[test]
    fn changed_state_is_kept_per_session() {
        let store = SessionStore::new();
        store.transition(7, |_| ((), paused_on(2)));
        assert_eq!(store.get(7), paused_on(2));
        assert_eq!(store.get(8), SelectionState::default());
        assert_eq!(store.len(), 1);

        // Returning to the default forgets the session.
        store.transition(7, |_| ((), SelectionState::default()));
        assert!(!store.contains(7));
    }

    #[test]
    fn tick_after_manual_next_does_not_resume_rotation() {
        let labels = ParticipationLabels::new(vec!["X".into(), "Y".into(), "Z".into()]).unwrap();
        let store = SessionStore::new();
        let (entered, wait_entered) = std::sync::mpsc::channel();

        // A Next click is mid-pass when the timer's tick for the same
        // browser arrives.
        std::thread::scope(|scope| {
            let (store, labels) = (&store, &labels);
            let next = scope.spawn(move || {
                store.transition(1, |state| {
                    entered.send(()).unwrap();
                    std::thread::sleep(Duration::from_millis(20));
                    ((), state.apply(SelectionEvent::Next, labels))
                })
            });
            wait_entered.recv().unwrap();
            store.transition(1, |state| ((), state.apply(SelectionEvent::Tick, labels)));
            next.join().unwrap();
        });

        let state = store.get(1);
        assert!(!state.auto_rotate);
        assert_eq!(state.rotation_index, 1);
        assert_eq!(state.selected_types, ["Y".to_string()].into());
    }

    #[test]
    fn concurrent_passes_on_one_session_all_apply() {
        let store = SessionStore::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    store.transition(3, |mut state| {
                        std::thread::sleep(Duration::from_millis(2));
                        state.rotation_index += 1;
                        ((), state)
                    })
                });
            }
        });
        assert_eq!(store.get(3).rotation_index, 8);
    }

    #[test]
    fn store_is_capped_and_drops_the_least_recent_session() {
        let store = SessionStore::with_limits(3, Duration::from_secs(3600));
        for id in 1..=10 {
            store.transition(id, |_| ((), paused_on(id as usize)));
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(store.len(), 3);
        assert!(store.contains(10) && store.contains(9) && store.contains(8));
        assert!(!store.contains(1));
    }

    #[test]
    fn expired_sessions_are_dropped_first() {
        let store = SessionStore::with_limits(2, Duration::ZERO);
        store.transition(1, |_| ((), paused_on(1)));
        store.transition(2, |_| ((), paused_on(2)));
        store.transition(3, |_| ((), paused_on(3)));
        assert_eq!(store.len(), 1);
        assert!(store.contains(3));
    }

    #[test]
    fn logo_content_type_follows_extension() {
        assert_eq!(image_content_type(Path::new("rru_logo.PNG")), "image/png");
        assert_eq!(image_content_type(Path::new("logo.jpeg")), "image/jpeg");
        assert_eq!(image_content_type(Path::new("logo")), "application/octet-stream");
    }
}

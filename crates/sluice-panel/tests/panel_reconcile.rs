use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use sluice_api_models::QueueItem;
use sluice_panel::{
    ApiRequest, ApiResponse, BulkAction, HistoryPage, HttpTransport, Method, MutationOutcome,
    Notice, Notifier, Panel, PanelConfig, PanelDeps, PollOutcome, QueuePage, SelectAllState,
    TickFn, TimerFactory, TimerHandle, TransportError, ViewRenderer,
};

enum Reply {
    Http(u16, Value),
    Down,
}

struct Scripted {
    reply: Reply,
    delay: Duration,
}

/// In-memory backend: per-route scripted replies, the last one repeating like server state.
#[derive(Default)]
struct FakeBackend {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    log: Mutex<Vec<ApiRequest>>,
}

impl FakeBackend {
    fn script(&self, method: Method, path: &str, reply: Reply, delay: Duration) {
        self.routes
            .lock()
            .unwrap()
            .entry(format!("{} {path}", method.as_str()))
            .or_default()
            .push_back(Scripted { reply, delay });
    }

    fn reply(&self, method: Method, path: &str, status: u16, body: Value) {
        self.script(method, path, Reply::Http(status, body), Duration::ZERO);
    }

    fn queue(&self, items: Value) {
        self.reply(Method::Get, "/poll", 200, json!({"status": {}, "queue": items}));
    }

    fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    fn next(&self, key: &str) -> (Result<ApiResponse, TransportError>, Duration) {
        let mut routes = self.routes.lock().unwrap();
        let Some(replies) = routes.get_mut(key) else {
            return (Ok(default_reply(key)), Duration::ZERO);
        };
        let scripted = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().map(|front| Scripted {
                reply: match &front.reply {
                    Reply::Http(status, body) => Reply::Http(*status, body.clone()),
                    Reply::Down => Reply::Down,
                },
                delay: front.delay,
            })
        };
        match scripted {
            Some(Scripted {
                reply: Reply::Http(status, body),
                delay,
            }) => (Ok(ApiResponse::new(status, body.to_string())), delay),
            Some(Scripted {
                reply: Reply::Down,
                delay,
            }) => (Err(TransportError::new("connection refused")), delay),
            None => (Ok(default_reply(key)), Duration::ZERO),
        }
    }
}

fn default_reply(key: &str) -> ApiResponse {
    let body = match key {
        "GET /poll" => json!({"status": {}, "queue": []}),
        "GET /history" => json!({"history": []}),
        "GET /settings/display-prefs" => json!({}),
        _ => json!({"success": true}),
    };
    ApiResponse::new(200, body.to_string())
}

#[async_trait]
impl HttpTransport for FakeBackend {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let key = format!("{} {}", request.method.as_str(), request.path);
        self.log.lock().unwrap().push(request);
        let (reply, delay) = self.next(&key);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

#[derive(Default)]
struct ManualTimers {
    armed: Mutex<Vec<(&'static str, Duration)>>,
    cancelled: Arc<AtomicUsize>,
}

impl TimerFactory for ManualTimers {
    fn repeat(&self, label: &'static str, period: Duration, _tick: TickFn) -> TimerHandle {
        self.armed.lock().unwrap().push((label, period));
        let cancelled = Arc::clone(&self.cancelled);
        TimerHandle::new(move || {
            cancelled.fetch_add(1, Ordering::SeqCst);
        })
    }
}

#[derive(Default)]
struct Screen {
    statuses: AtomicUsize,
    queues: Mutex<Vec<QueuePage>>,
    histories: Mutex<Vec<HistoryPage>>,
    notices: Mutex<Vec<Notice>>,
}

impl Screen {
    fn queue_renders(&self) -> usize {
        self.queues.lock().unwrap().len()
    }

    fn last_queue(&self) -> QueuePage {
        self.queues
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("queue rendered at least once")
    }
}

impl ViewRenderer for Screen {
    fn render_status(&self, _status: &sluice_api_models::StatusSummary) {
        self.statuses.fetch_add(1, Ordering::SeqCst);
    }

    fn render_queue(&self, page: &QueuePage) {
        self.queues.lock().unwrap().push(page.clone());
    }

    fn render_history(&self, page: &HistoryPage) {
        self.histories.lock().unwrap().push(page.clone());
    }
}

impl Notifier for Screen {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

struct Harness {
    backend: Arc<FakeBackend>,
    timers: Arc<ManualTimers>,
    screen: Arc<Screen>,
    panel: Panel,
}

fn harness() -> Harness {
    let backend = Arc::new(FakeBackend::default());
    let timers = Arc::new(ManualTimers::default());
    let screen = Arc::new(Screen::default());
    let panel = Panel::new(
        PanelDeps {
            transport: Arc::clone(&backend) as Arc<dyn HttpTransport>,
            timers: Arc::clone(&timers) as Arc<dyn TimerFactory>,
            notifier: Arc::clone(&screen) as Arc<dyn Notifier>,
            renderer: Arc::clone(&screen) as Arc<dyn ViewRenderer>,
        },
        PanelConfig::default(),
    );
    Harness {
        backend,
        timers,
        screen,
        panel,
    }
}

fn item(id: &str, state: &str, progress: f64) -> Value {
    json!({"id": id, "name": format!("item {id}"), "state": state, "progress_pct": progress})
}

#[tokio::test]
async fn identical_poll_skips_render_and_progress_renders_once() -> anyhow::Result<()> {
    let h = harness();
    h.backend.queue(json!([item("1", "queued", 0.0)]));
    h.backend.queue(json!([item("1", "queued", 0.0)]));
    h.backend.queue(json!([item("1", "queued", 50.0)]));

    h.panel.start().await;
    assert_eq!(h.screen.queue_renders(), 1);

    assert_eq!(h.panel.refresh_queue().await, PollOutcome::Unchanged);
    assert_eq!(h.screen.queue_renders(), 1);

    assert_eq!(h.panel.refresh_queue().await, PollOutcome::Rendered);
    assert_eq!(h.screen.queue_renders(), 2);

    let shown: QueueItem = serde_json::from_value(item("1", "queued", 50.0))?;
    assert_eq!(h.screen.last_queue().rows[0].item, shown);
    assert_eq!(h.screen.statuses.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn selection_is_pruned_against_each_snapshot() {
    let h = harness();
    h.backend.queue(json!([
        item("a", "downloading", 1.0),
        item("b", "paused", 2.0)
    ]));
    h.backend.queue(json!([
        item("b", "paused", 2.0),
        item("c", "queued", 0.0)
    ]));
    h.panel.start().await;

    h.panel.set_selected("a", true);
    h.panel.set_selected("b", true);
    h.panel.set_selected("ghost", true);
    assert_eq!(h.panel.selected_ids(), vec!["a", "b"]);
    assert_eq!(h.panel.select_all_state(), SelectAllState::All);

    h.panel.refresh_queue().await;

    assert_eq!(h.panel.selected_ids(), vec!["b"]);
    let page = h.screen.last_queue();
    assert_eq!(page.selected_count, 1);
    assert_eq!(page.select_all, SelectAllState::Some);
    let selected: Vec<_> = page
        .rows
        .iter()
        .map(|row| (row.item.id.as_str(), row.selected))
        .collect();
    assert_eq!(selected, vec![("b", true), ("c", false)]);
}

#[tokio::test]
async fn bulk_delete_sends_one_request_then_one_poll() {
    for status in [200_u16, 500] {
        let h = harness();
        h.backend.queue(json!([
            item("x", "queued", 0.0),
            item("y", "queued", 0.0),
            item("z", "queued", 0.0)
        ]));
        h.backend.reply(
            Method::Post,
            "/queue/bulk/delete",
            status,
            json!({"error": "delete refused"}),
        );
        h.panel.start().await;
        h.panel.set_selected("x", true);
        h.panel.set_selected("y", true);
        let polls_before = h.backend.count(Method::Get, "/poll");

        let outcome = h.panel.apply_to_selection(BulkAction::Delete).await;

        let requests = h.backend.requests();
        let deletes: Vec<_> = requests
            .iter()
            .filter(|request| request.path == "/queue/bulk/delete")
            .collect();
        assert_eq!(deletes.len(), 1, "status {status}");
        assert_eq!(deletes[0].body, Some(json!({"ids": ["x", "y"]})));
        assert_eq!(h.backend.count(Method::Get, "/poll"), polls_before + 1);
        assert_eq!(
            requests.last().map(|request| request.path.as_str()),
            Some("/poll")
        );
        assert!(h.panel.selected_ids().is_empty());
        if status == 200 {
            assert_eq!(outcome, MutationOutcome::Applied);
            assert!(h.screen.notices.lock().unwrap().is_empty());
        } else {
            assert_eq!(outcome, MutationOutcome::Rejected("delete refused".into()));
            assert_eq!(h.screen.notices.lock().unwrap().len(), 1);
        }
    }
}

#[tokio::test]
async fn empty_selection_sends_nothing() {
    let h = harness();
    h.panel.start().await;
    let before = h.backend.requests().len();
    let outcome = h
        .panel
        .apply_to_selection(BulkAction::Priority(sluice_api_models::Priority::High))
        .await;
    assert!(!outcome.is_applied());
    assert_eq!(h.backend.requests().len(), before);
}

#[tokio::test(start_paused = true)]
async fn slower_older_poll_response_is_discarded() {
    let h = harness();
    h.backend.script(
        Method::Get,
        "/poll",
        Reply::Http(200, json!({"queue": [item("1", "downloading", 10.0)]})),
        Duration::from_secs(2),
    );
    h.backend.script(
        Method::Get,
        "/poll",
        Reply::Http(200, json!({"queue": [item("1", "downloading", 60.0)]})),
        Duration::from_secs(1),
    );

    let (older, newer) = tokio::join!(h.panel.refresh_queue(), h.panel.refresh_queue());

    assert_eq!(older, PollOutcome::Stale);
    assert_eq!(newer, PollOutcome::Rendered);
    let rows = h.panel.queue_page().rows;
    assert!((rows[0].item.progress_pct - 60.0).abs() < f64::EPSILON);
    assert_eq!(h.screen.queue_renders(), 1);
}

#[tokio::test]
async fn rejected_poll_empties_the_view_but_transport_failure_keeps_it() {
    let h = harness();
    h.backend.queue(json!([item("1", "downloading", 10.0)]));
    h.backend.script(Method::Get, "/poll", Reply::Down, Duration::ZERO);
    h.backend.reply(Method::Get, "/poll", 503, json!({"error": "busy"}));
    h.panel.start().await;
    h.panel.set_selected("1", true);

    assert_eq!(h.panel.refresh_queue().await, PollOutcome::Failed);
    assert_eq!(h.panel.queue_page().total_items, 1);
    assert_eq!(h.panel.selected_ids(), vec!["1"]);

    assert_eq!(h.panel.refresh_queue().await, PollOutcome::Failed);
    assert_eq!(h.panel.queue_page().total_items, 0);
    assert!(h.panel.selected_ids().is_empty());
    assert!(h.screen.last_queue().rows.is_empty());
    assert!(h.screen.notices.lock().unwrap().is_empty());
}

#[tokio::test]
async fn start_applies_preferences_and_save_rearms() {
    let h = harness();
    h.backend.reply(
        Method::Get,
        "/settings/display-prefs",
        200,
        json!({"queue": {"refresh_rate_seconds": 1, "per_page": 2},
               "history": {"refresh_rate_seconds": 7}}),
    );
    h.backend.queue(json!([
        item("1", "queued", 0.0),
        item("2", "queued", 0.0),
        item("3", "queued", 0.0)
    ]));
    h.panel.start().await;

    assert!(h.panel.is_running());
    assert_eq!(
        *h.timers.armed.lock().unwrap(),
        vec![
            ("queue", Duration::from_secs(5)),
            ("history", Duration::from_secs(7))
        ]
    );
    let page = h.panel.queue_page();
    assert_eq!((page.rows.len(), page.total_pages), (2, 2));
    let history_request = h
        .backend
        .requests()
        .into_iter()
        .find(|request| request.path == "/history")
        .expect("history polled on start");
    assert_eq!(
        history_request.query,
        vec![("limit".to_string(), "500".to_string())]
    );

    h.panel.set_queue_page(2);
    let mut prefs = h.panel.preferences();
    prefs.queue.per_page = 10;
    prefs.queue.refresh_rate_seconds = 8;
    let outcome = h.panel.save_preferences(prefs).await;

    assert!(outcome.success);
    assert_eq!(h.timers.cancelled.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.timers.armed.lock().unwrap()[2..],
        [
            ("queue", Duration::from_secs(8)),
            ("history", Duration::from_secs(7))
        ]
    );
    let page = h.screen.last_queue();
    assert_eq!((page.page, page.total_pages, page.rows.len()), (1, 1, 3));

    h.panel.stop();
    assert!(!h.panel.is_running());
    assert_eq!(h.timers.cancelled.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn failed_preference_save_changes_nothing() {
    let h = harness();
    h.panel.start().await;
    h.backend.reply(
        Method::Post,
        "/settings/display-prefs",
        422,
        json!({"message": "refresh rate too low"}),
    );
    let mut prefs = h.panel.preferences();
    prefs.history.per_page = 5;
    let outcome = h.panel.save_preferences(prefs).await;
    assert!(!outcome.success);
    assert_eq!(outcome.message.as_deref(), Some("refresh rate too low"));
    assert_eq!(h.panel.preferences().history.per_page, 20);
    assert_eq!(h.timers.cancelled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn filter_and_page_changes_rerender_without_fetching() {
    let h = harness();
    let items: Vec<Value> = (0..45)
        .map(|index| {
            let state = if index % 3 == 0 { "paused" } else { "downloading" };
            item(&format!("n{index}"), state, 0.0)
        })
        .collect();
    h.backend.queue(Value::Array(items));
    h.panel.start().await;
    let fetched = h.backend.requests().len();

    h.panel.set_queue_page(5);
    let page = h.screen.last_queue();
    assert_eq!((page.page, page.total_pages), (3, 3));
    assert_eq!(page.rows.len(), 5);

    h.panel.set_queue_filter("ITEM N1");
    let page = h.screen.last_queue();
    assert_eq!(page.total_items, 11);
    assert_eq!(page.page, 1);
    assert_eq!(page.filter_text, "ITEM N1");

    h.panel.set_history_filter("nothing");
    h.panel.set_history_page(9);
    let history = h.screen.histories.lock().unwrap().last().cloned();
    assert_eq!(history.map(|page| page.page), Some(1));

    assert_eq!(h.backend.requests().len(), fetched);
}

#[tokio::test]
async fn rows_carry_state_gated_actions() {
    let h = harness();
    h.backend.queue(json!([
        item("p", "paused", 5.0),
        item("d", "downloading", 5.0),
        item("c", "completed", 100.0)
    ]));
    h.panel.start().await;
    let actions: Vec<Vec<&str>> = h
        .panel
        .queue_page()
        .rows
        .iter()
        .map(|row| row.actions.iter().map(|action| action.as_str()).collect())
        .collect();
    assert_eq!(
        actions,
        vec![
            vec!["resume", "remove"],
            vec!["pause", "remove"],
            vec!["remove"]
        ]
    );
}

#[tokio::test]
async fn history_mutation_repolls_history() {
    let h = harness();
    h.backend.reply(
        Method::Get,
        "/history",
        200,
        json!({"history": [{"id": "h1", "name": "done", "state": "completed"}]}),
    );
    h.backend.reply(Method::Get, "/history", 200, json!({"history": []}));
    h.panel.start().await;
    assert_eq!(h.panel.history_page().total_items, 1);

    let outcome = h.panel.mutations().delete_history("h1").await;

    assert!(outcome.is_applied());
    assert_eq!(h.backend.count(Method::Delete, "/history/h1"), 1);
    assert_eq!(h.backend.count(Method::Get, "/history"), 2);
    assert_eq!(h.panel.history_page().total_items, 0);
}

#[tokio::test]
async fn odd_items_do_not_wipe_the_snapshot() {
    let h = harness();
    h.backend.queue(json!([
        item("a", "downloading", 10.0),
        item("b", "verifying", 20.0)
    ]));
    h.backend.queue(json!([
        item("a", "downloading", 10.0),
        item("b", "verifying", 20.0),
        {"id": 7, "state": "queued", "progress_pct": 0},
        "not an item"
    ]));
    h.panel.start().await;
    assert_eq!(h.panel.queue_page().total_items, 2);
    h.panel.set_selected("a", true);

    assert_eq!(h.panel.refresh_queue().await, PollOutcome::Rendered);

    let page = h.panel.queue_page();
    let ids: Vec<&str> = page.rows.iter().map(|row| row.item.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "7"]);
    assert_eq!(
        page.rows[1].actions.iter().map(|a| a.as_str()).collect::<Vec<_>>(),
        vec!["remove"]
    );
    assert_eq!(h.panel.selected_ids(), vec!["a"]);
}

#[tokio::test]
async fn toggling_only_affects_listed_items() {
    let h = harness();
    h.backend.queue(json!([item("a", "queued", 0.0)]));
    h.panel.start().await;

    assert!(!h.panel.toggle_selected("ghost"));
    assert!(h.panel.selected_ids().is_empty());

    assert!(h.panel.toggle_selected("a"));
    assert_eq!(h.panel.selected_ids(), vec!["a"]);
    assert!(h.screen.last_queue().rows[0].selected);

    assert!(!h.panel.toggle_selected("a"));
    assert!(h.panel.selected_ids().is_empty());
}

#[tokio::test]
async fn select_visible_marks_only_the_current_page() {
    let h = harness();
    h.backend.reply(
        Method::Get,
        "/settings/display-prefs",
        200,
        json!({"queue": {"per_page": 2}}),
    );
    h.backend.queue(json!([
        item("1", "queued", 0.0),
        item("2", "queued", 0.0),
        item("3", "queued", 0.0),
        item("4", "queued", 0.0),
        item("5", "queued", 0.0)
    ]));
    h.panel.start().await;
    h.panel.set_queue_page(2);

    h.panel.select_visible(true);

    assert_eq!(h.panel.selected_ids(), vec!["3", "4"]);
    assert_eq!(h.panel.select_all_state(), SelectAllState::All);
    let page = h.screen.last_queue();
    assert_eq!(page.selected_count, 2);
    assert!(page.rows.iter().all(|row| row.selected));

    h.panel.set_queue_page(1);
    assert_eq!(h.panel.select_all_state(), SelectAllState::None);

    h.panel.set_queue_page(2);
    h.panel.select_visible(false);
    assert!(h.panel.selected_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_newer_poll_does_not_discard_older_success() {
    let h = harness();
    h.backend.script(
        Method::Get,
        "/poll",
        Reply::Http(200, json!({"queue": [item("1", "downloading", 30.0)]})),
        Duration::from_secs(2),
    );
    h.backend
        .script(Method::Get, "/poll", Reply::Down, Duration::from_secs(1));

    let (older, newer) = tokio::join!(h.panel.refresh_queue(), h.panel.refresh_queue());

    assert_eq!(older, PollOutcome::Rendered);
    assert_eq!(newer, PollOutcome::Failed);
    assert_eq!(h.panel.queue_page().total_items, 1);
    assert_eq!(h.screen.queue_renders(), 1);
}

#[tokio::test]
async fn restart_renders_the_first_snapshot_again() {
    let h = harness();
    h.backend.queue(json!([item("1", "queued", 0.0)]));
    h.panel.start().await;
    assert_eq!(h.screen.queue_renders(), 1);
    assert_eq!(h.panel.refresh_queue().await, PollOutcome::Unchanged);

    h.panel.stop();
    h.panel.start().await;

    assert_eq!(h.screen.queue_renders(), 2);
    assert!(h.panel.is_running());
}

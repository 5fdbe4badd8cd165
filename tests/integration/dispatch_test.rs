// tests/integration/dispatch_test.rs

//! Integration tests for the Before, action and After stages of a dispatch

use super::test_helpers::*;
use actproxy::config::{Config, Mode};
use actproxy::core::context::Session;
use actproxy::core::dispatch::{
    ActionMetadata, App, ControllerMetadata, HandlerCatalog, HandlerFactory, InterceptorMetadata,
    StaticMetadata,
};
use actproxy::core::handler::{
    ActionHandler, AfterInterceptor, BeforeInterceptor, ExceptionInterceptor, FinallyInterceptor,
    Handler, HandlerKind, Interceptor, InterceptorRegistry, RecordingVisitor,
};
use actproxy::core::{ActionContext, DispatchError, HandlerResult, Outcome};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test]
async fn test_action_outcome_is_rendered() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(&log, Behavior::Return(Outcome::text("orders"))));
    let mut ctx = request();

    harness.proxy().handle(&mut ctx).await.unwrap();

    assert_eq!(ctx.resp().status, 200);
    assert_eq!(ctx.resp().body_str(), "orders");
    assert_eq!(ctx.action_path(), Some(TARGET));
    assert_eq!(ctx.dissolve_calls(), 1);
    assert!(ctx.is_destroyed());
}

#[tokio::test]
async fn test_raised_outcome_counts_as_result() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(&log, Behavior::Halt(Outcome::redirect("/login"))));
    let mut ctx = request();

    harness.proxy().handle(&mut ctx).await.unwrap();

    assert_eq!(ctx.resp().status, 302);
    assert_eq!(
        ctx.resp().headers.get("Location").map(String::as_str),
        Some("/login")
    );
}

#[tokio::test]
async fn test_absent_outcome_renders_nothing() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(&log, Behavior::Pass));
    let mut ctx = request();

    harness.proxy().handle(&mut ctx).await.unwrap();

    assert_eq!(ctx.resp().writes(), 0);
    assert!(ctx.is_destroyed());
}

#[tokio::test]
async fn test_template_defaults_to_action_view() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(
        &log,
        Behavior::Return(Outcome::template(serde_json::json!({"page": 1}))),
    ));
    let mut ctx = request();

    harness.proxy().handle(&mut ctx).await.unwrap();

    let body: serde_json::Value = serde_json::from_slice(&ctx.resp().body).unwrap();
    assert_eq!(body["template"], "shop/Orders/list");
    assert_eq!(body["args"]["page"], 1);
    // Destroy forgets the template once rendering succeeded.
    assert_eq!(ctx.cached_template(), None);
}

#[tokio::test]
async fn test_session_is_written_before_render() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(&log, Behavior::Return(Outcome::text("ok"))));
    let mut ctx = request().with_session(Session::new("s-42"));

    harness.proxy().handle(&mut ctx).await.unwrap();

    assert_eq!(
        ctx.resp().headers.get("Set-Cookie").map(String::as_str),
        Some("session=s-42")
    );
}

#[tokio::test]
async fn test_before_scopes_run_global_container_local() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(&log, Behavior::Return(Outcome::text("ok"))));
    harness
        .globals
        .register(Interceptor::before(TestBefore::new("global", 0, &log, Behavior::Pass)));
    harness
        .container
        .register(Interceptor::before(TestBefore::new("container", 0, &log, Behavior::Pass)));
    let proxy = harness.proxy_with(vec![Interceptor::before(TestBefore::new(
        "local",
        0,
        &log,
        Behavior::Pass,
    ))]);
    let mut ctx = request();

    proxy.handle(&mut ctx).await.unwrap();

    assert_eq!(
        log.events(),
        vec!["before:global", "before:container", "before:local", "action"]
    );
}

#[tokio::test]
async fn test_before_outcome_skips_action_but_not_after() {
    let log = EventLog::default();
    let action = TestAction::new(&log, Behavior::Return(Outcome::text("action")));
    let calls = action.calls.clone();
    let harness = TestApp::new(action);
    harness.globals.register(Interceptor::before(TestBefore::new(
        "auth",
        0,
        &log,
        Behavior::Return(Outcome::text_with_status(401, "denied")),
    )));
    harness
        .container
        .register(Interceptor::before(TestBefore::new("later", 0, &log, Behavior::Pass)));
    harness
        .container
        .register(Interceptor::after(PassAfter { name: "audit".into(), log: log.clone() }));
    let mut ctx = request();

    harness.proxy().handle(&mut ctx).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(log.events(), vec!["before:auth", "after:audit"]);
    assert_eq!(ctx.resp().status, 401);
    assert_eq!(ctx.resp().body_str(), "denied");
}

#[tokio::test]
async fn test_local_before_outcome_still_folds_through_after() {
    let log = EventLog::default();
    let action = TestAction::new(&log, Behavior::Return(Outcome::text("action")));
    let calls = action.calls.clone();
    let harness = TestApp::new(action);
    harness
        .globals
        .register(Interceptor::after(MarkingAfter::new("G", 0, &log)));
    let proxy = harness.proxy_with(vec![
        Interceptor::before(TestBefore::new(
            "cached-view",
            0,
            &log,
            Behavior::Halt(Outcome::text("early")),
        )),
        Interceptor::after(MarkingAfter::new("L", 0, &log)),
    ]);
    let mut ctx = request();

    proxy.handle(&mut ctx).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.resp().body_str(), "early|L|G");
}

#[tokio::test]
async fn test_after_folds_local_container_global() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(&log, Behavior::Return(Outcome::text("a"))));
    harness
        .globals
        .register(Interceptor::after(MarkingAfter::new("G", 0, &log)));
    harness
        .container
        .register(Interceptor::after(MarkingAfter::new("C", 0, &log)));
    let proxy = harness.proxy_with(vec![
        Interceptor::after(MarkingAfter::new("L2", 2, &log)),
        Interceptor::after(MarkingAfter::new("L1", 1, &log)),
    ]);
    let mut ctx = request();

    proxy.handle(&mut ctx).await.unwrap();

    assert_eq!(ctx.resp().body_str(), "a|L1|L2|C|G");
}

struct DroppingAfter;

impl Handler for DroppingAfter {
    fn name(&self) -> &str {
        "dropping"
    }
}

#[async_trait]
impl AfterInterceptor for DroppingAfter {
    async fn after(&self, _outcome: Option<Outcome>, _ctx: &mut ActionContext) -> HandlerResult {
        Ok(None)
    }
}

#[tokio::test]
async fn test_absent_after_result_keeps_action_outcome() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(&log, Behavior::Return(Outcome::text("kept"))));
    let proxy = harness.proxy_with(vec![Interceptor::after(DroppingAfter)]);
    let mut ctx = request();

    proxy.handle(&mut ctx).await.unwrap();

    assert_eq!(ctx.resp().body_str(), "kept");
}

#[tokio::test]
async fn test_declared_interceptors_are_materialized() {
    let log = EventLog::default();
    let harness = TestApp::with_controller(
        Config::default(),
        TestAction::new(&log, Behavior::Return(Outcome::text("x"))),
        |c| c.with_before("auth").with_after("mark"),
    );
    harness
        .catalog
        .register(Interceptor::before(TestBefore::new("auth", 0, &log, Behavior::Pass)));
    harness
        .catalog
        .register(Interceptor::after(MarkingAfter::new("mark", 0, &log)));
    let proxy = harness.proxy();
    assert!(!proxy.is_ready());
    let mut ctx = request();

    proxy.handle(&mut ctx).await.unwrap();

    assert!(proxy.is_ready());
    assert_eq!(log.events(), vec!["before:auth", "action", "after:mark"]);
    assert_eq!(ctx.resp().body_str(), "x|mark");
}

/// Delegates to a catalog while counting action creation.
struct CountingFactory {
    inner: HandlerCatalog,
    actions: AtomicUsize,
}

impl HandlerFactory for CountingFactory {
    fn create_action(
        &self,
        meta: &ActionMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn ActionHandler>, DispatchError> {
        self.actions.fetch_add(1, Ordering::SeqCst);
        self.inner.create_action(meta, mode)
    }

    fn create_before(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn BeforeInterceptor>, DispatchError> {
        self.inner.create_before(meta, mode)
    }

    fn create_after(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn AfterInterceptor>, DispatchError> {
        self.inner.create_after(meta, mode)
    }

    fn create_exception(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn ExceptionInterceptor>, DispatchError> {
        self.inner.create_exception(meta, mode)
    }

    fn create_finally(
        &self,
        meta: &InterceptorMetadata,
        mode: Mode,
    ) -> Result<Arc<dyn FinallyInterceptor>, DispatchError> {
        self.inner.create_finally(meta, mode)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_materialize_once() {
    init_tracing();
    let log = EventLog::default();
    let inner = HandlerCatalog::new();
    inner.register_action(TARGET, TestAction::new(&log, Behavior::Return(Outcome::text("ok"))));
    let factory = Arc::new(CountingFactory {
        inner,
        actions: AtomicUsize::new(0),
    });
    let metadata = Arc::new(StaticMetadata::new());
    metadata.register(ControllerMetadata::new(CONTROLLER).with_action(ACTION));
    let app = App::builder(Config::default(), metadata, factory.clone())
        .globals(Arc::new(InterceptorRegistry::new()))
        .build();
    let proxy = app.proxy(TARGET).unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
        handles.push(proxy.clone().spawn(request()));
    }
    for handle in handles {
        let (ctx, result) = handle.await.unwrap();
        result.unwrap();
        assert_eq!(ctx.resp().body_str(), "ok");
    }

    assert_eq!(factory.actions.load(Ordering::SeqCst), 1);
    assert_eq!(log.count("action"), 32);
}

#[tokio::test]
async fn test_spawned_dispatch_survives_dropped_handle() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(&log, Behavior::Return(Outcome::text("ok"))));
    harness
        .container
        .register(Interceptor::finally(TestFinally::new("cleanup", 0, &log)));

    drop(harness.proxy().spawn(request()));

    for _ in 0..100 {
        if log.count("finally:cleanup") == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(log.events(), vec!["action", "finally:cleanup"]);
}

#[tokio::test]
async fn test_visitor_sees_fixed_order() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(&log, Behavior::Pass));
    harness
        .globals
        .register(Interceptor::before(TestBefore::new("g-before", 0, &log, Behavior::Pass)));
    harness
        .globals
        .register(Interceptor::after(MarkingAfter::new("g-after", 0, &log)));
    harness
        .globals
        .register(Interceptor::finally(TestFinally::new("g-finally", 0, &log)));
    harness.globals.register(Interceptor::exception(TestException::new(
        "g-exception",
        0,
        &log,
        Behavior::Pass,
    )));
    // Container handlers are not part of the traversal.
    harness
        .container
        .register(Interceptor::before(TestBefore::new("c-before", 0, &log, Behavior::Pass)));
    let proxy = harness.proxy_with(vec![
        Interceptor::exception(TestException::new("l-exception", 0, &log, Behavior::Pass)),
        Interceptor::finally(TestFinally::new("l-finally", 0, &log)),
        Interceptor::after(MarkingAfter::new("l-after", 0, &log)),
        Interceptor::before(TestBefore::new("l-before", 0, &log, Behavior::Pass)),
    ]);
    let mut visitor = RecordingVisitor::default();

    proxy.accept(&mut visitor).await.unwrap();

    let expected = vec![
        (HandlerKind::Before, "g-before"),
        (HandlerKind::Before, "l-before"),
        (HandlerKind::Action, TARGET),
        (HandlerKind::After, "l-after"),
        (HandlerKind::After, "g-after"),
        (HandlerKind::Finally, "l-finally"),
        (HandlerKind::Finally, "g-finally"),
        (HandlerKind::Exception, "l-exception"),
        (HandlerKind::Exception, "g-exception"),
    ];
    let visited: Vec<(HandlerKind, &str)> = visitor
        .visited
        .iter()
        .map(|(kind, name)| (*kind, name.as_str()))
        .collect();
    assert_eq!(visited, expected);
    assert!(log.events().is_empty());
}

struct SlowBefore {
    log: EventLog,
}

impl Handler for SlowBefore {
    fn name(&self) -> &str {
        "slow"
    }
}

#[async_trait]
impl BeforeInterceptor for SlowBefore {
    async fn before(&self, _ctx: &mut ActionContext) -> HandlerResult {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.log.push("before:slow");
        Ok(None)
    }
}

#[tokio::test]
async fn test_spawned_dispatch_survives_aborted_handle() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(&log, Behavior::Return(Outcome::text("ok"))));
    harness
        .container
        .register(Interceptor::finally(TestFinally::new("cleanup", 0, &log)));
    let proxy = harness.proxy_with(vec![Interceptor::before(SlowBefore { log: log.clone() })]);

    let handle = proxy.spawn(request());
    tokio::task::yield_now().await;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    for _ in 0..100 {
        if log.count("finally:cleanup") == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        log.events(),
        vec!["before:slow", "action", "finally:cleanup"]
    );
}

#[tokio::test]
async fn test_duplicate_global_registration_runs_once() {
    let log = EventLog::default();
    let harness = TestApp::new(TestAction::new(&log, Behavior::Return(Outcome::text("ok"))));
    for name in ["a", "b", "a"] {
        harness
            .globals
            .register(Interceptor::before(TestBefore::new(name, 0, &log, Behavior::Pass)));
    }
    let mut ctx = request();

    harness.proxy().handle(&mut ctx).await.unwrap();

    assert_eq!(log.events(), vec!["before:b", "before:a", "action"]);
}

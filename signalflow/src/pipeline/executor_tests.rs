//! Scenario tests for the DAG executor.

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::context::RunContext;
    use crate::core::StageRunStatus;
    use crate::errors::SignalflowError;
    use crate::events::CollectingEventSink;
    use crate::pipeline::{
        run_definitions, AsyncFnHandler, DagExecutor, HandlerRegistry, StageDefinition,
        StageGraph, StagePlugin,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn stage(id: &str, deps: &[&str]) -> StageDefinition {
        StageDefinition::new(id).with_dependencies(deps.iter().copied())
    }

    fn as_i64(v: &Value) -> i64 {
        v.as_i64().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_linear_chain_payloads() {
        let registry = HandlerRegistry::new()
            .with_fn("a", |v, _| Ok(json!(as_i64(&v) + 1)))
            .with_fn("b", |v, _| Ok(json!(as_i64(&v) * 2)))
            .with_fn("c", |v, _| Ok(json!(as_i64(&v) - 3)));

        let out = run_definitions(
            vec![stage("a", &[]), stage("b", &["a"]), stage("c", &["b"])],
            json!(1),
            &RunContext::new(),
            &registry,
        )
        .await
        .unwrap();

        assert_eq!(out.payload, json!(1));
        assert_eq!(out.intermediate_payloads.get("a"), Some(&json!(2)));
        assert_eq!(out.intermediate_payloads.get("b"), Some(&json!(4)));
        assert_eq!(out.intermediate_payloads.get("c"), Some(&json!(1)));
        assert_eq!(out.stage_meta.len(), 3);

        let ids: Vec<&str> = out.stage_meta.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(out.stage_meta[1].depends_on, vec!["a".to_string()]);
        assert!(out
            .stage_meta
            .iter()
            .all(|m| m.status == StageRunStatus::Success && m.ended_at >= m.started_at));
    }

    #[tokio::test]
    async fn test_diamond_join_receives_named_inputs() {
        let seen = Arc::new(Mutex::new(None));
        let seen_in_join = seen.clone();

        let registry = HandlerRegistry::new()
            .with_fn("root", |_, _| Ok(json!("r")))
            .with_fn("branch1", |v, _| Ok(json!(format!("{}-1", v.as_str().unwrap_or("")))))
            .with_fn("branch2", |v, _| Ok(json!(format!("{}-2", v.as_str().unwrap_or("")))))
            .with_fn("join", move |v, _| {
                *seen_in_join.lock() = Some(v.clone());
                Ok(json!("joined"))
            });

        let out = run_definitions(
            vec![
                stage("root", &[]),
                stage("branch1", &["root"]),
                stage("branch2", &["root"]),
                stage("join", &["branch1", "branch2"]),
            ],
            Value::Null,
            &RunContext::new(),
            &registry,
        )
        .await
        .unwrap();

        assert_eq!(out.payload, json!("joined"));
        assert_eq!(
            seen.lock().clone(),
            Some(json!({
                "parents": ["branch1", "branch2"],
                "inputs": { "branch1": "r-1", "branch2": "r-2" },
            }))
        );
    }

    #[tokio::test]
    async fn test_join_parents_follow_declared_order() {
        let seen = Arc::new(Mutex::new(Value::Null));
        let seen_in_join = seen.clone();

        let registry = HandlerRegistry::new()
            .with_fn("x", |_, _| Ok(json!(1)))
            .with_fn("y", |_, _| Ok(json!(2)))
            .with_fn("join", move |v, _| {
                *seen_in_join.lock() = v;
                Ok(Value::Null)
            });

        run_definitions(
            vec![stage("x", &[]), stage("y", &[]), stage("join", &["y", "x"])],
            Value::Null,
            &RunContext::new(),
            &registry,
        )
        .await
        .unwrap();

        assert_eq!(seen.lock()["parents"], json!(["y", "x"]));
    }

    #[tokio::test]
    async fn test_multiple_sinks_are_keyed_by_id() {
        let registry = HandlerRegistry::new()
            .with_fn("root", |_, _| Ok(json!(10)))
            .with_fn("sink1", |v, _| Ok(json!(as_i64(&v) + 1)))
            .with_fn("sink2", |v, _| Ok(json!(as_i64(&v) + 2)));

        let out = run_definitions(
            vec![
                stage("root", &[]),
                stage("sink1", &["root"]),
                stage("sink2", &["root"]),
            ],
            Value::Null,
            &RunContext::new(),
            &registry,
        )
        .await
        .unwrap();

        assert_eq!(out.payload, json!({ "sink1": 11, "sink2": 12 }));
    }

    #[tokio::test]
    async fn test_every_stage_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ids = ["a", "b", "c", "d", "e", "f"];
        let mut registry = HandlerRegistry::new();
        for id in ids {
            let calls = calls.clone();
            registry = registry.with_fn(id, move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            });
        }

        let out = run_definitions(
            vec![
                stage("a", &[]),
                stage("b", &["a"]),
                stage("c", &["a"]),
                stage("d", &["b", "c"]),
                stage("e", &[]),
                stage("f", &["d", "e"]),
            ],
            Value::Null,
            &RunContext::new(),
            &registry,
        )
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), ids.len());
        assert_eq!(out.stage_meta.len(), ids.len());
        assert_eq!(out.intermediate_payloads.len(), ids.len());
    }

    #[tokio::test]
    async fn test_failure_propagates_original_error() {
        let downstream_ran = Arc::new(AtomicBool::new(false));
        let flag = downstream_ran.clone();

        let registry = HandlerRegistry::new()
            .with_fn("a", |v, _| Ok(v))
            .with_fn("bad", |_, _| Err(anyhow::anyhow!("feed offline")))
            .with_fn("after", move |v, _| {
                flag.store(true, Ordering::SeqCst);
                Ok(v)
            });

        let err = run_definitions(
            vec![stage("a", &[]), stage("bad", &["a"]), stage("after", &["bad"])],
            json!(0),
            &RunContext::new(),
            &registry,
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "feed offline");
        let SignalflowError::StageExecution(stage_err) = err else {
            panic!("expected a stage execution error");
        };
        assert_eq!(stage_err.stage_id, "bad");
        assert_eq!(stage_err.into_source().to_string(), "feed offline");
        assert!(!downstream_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failure_aborts_in_flight_siblings() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let slow = AsyncFnHandler::new("slow", move |v: Value, _ctx: RunContext| {
            let flag = flag.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(v)
            }
        });
        let registry = HandlerRegistry::new()
            .with_handler("slow", Arc::new(slow))
            .with_fn("bad", |_, _| Err(anyhow::anyhow!("boom")));

        let result = run_definitions(
            vec![stage("slow", &[]), stage("bad", &[])],
            Value::Null,
            &RunContext::new(),
            &registry,
        )
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let ids = ["s1", "s2", "s3", "s4", "s5"];

        let mut registry = HandlerRegistry::new();
        for id in ids {
            let current = current.clone();
            let peak = peak.clone();
            let handler = AsyncFnHandler::new(id, move |v: Value, _ctx: RunContext| {
                let current = current.clone();
                let peak = peak.clone();
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(v)
                }
            });
            registry = registry.with_handler(id, Arc::new(handler));
        }

        let graph = StageGraph::build(ids.iter().map(|id| stage(id, &[])).collect()).unwrap();
        let executor = DagExecutor::from_registry(graph, &registry)
            .unwrap()
            .with_max_concurrency(2);

        let out = executor.run(Value::Null, &RunContext::new()).await.unwrap();

        assert_eq!(out.stage_meta.len(), ids.len());
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(current.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_independent_stages_overlap_without_cap() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut registry = HandlerRegistry::new();
        for id in ["p", "q", "r"] {
            let current = current.clone();
            let peak = peak.clone();
            let handler = AsyncFnHandler::new(id, move |v: Value, _ctx: RunContext| {
                let current = current.clone();
                let peak = peak.clone();
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(v)
                }
            });
            registry = registry.with_handler(id, Arc::new(handler));
        }

        run_definitions(
            vec![stage("p", &[]), stage("q", &[]), stage("r", &[])],
            Value::Null,
            &RunContext::new(),
            &registry,
        )
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) > 1);
    }

    #[derive(Debug)]
    struct ScalePlugin;

    #[async_trait]
    impl StagePlugin for ScalePlugin {
        fn name(&self) -> &str {
            "scale"
        }

        async fn invoke(
            &self,
            _stage_id: &str,
            payload: Value,
            _ctx: &RunContext,
        ) -> anyhow::Result<Value> {
            Ok(json!(as_i64(&payload) * 10))
        }
    }

    #[tokio::test]
    async fn test_plugin_and_internal_stages_mix() {
        let registry = HandlerRegistry::new()
            .with_fn("ingest", |v, _| Ok(json!(as_i64(&v) + 1)))
            .with_plugin(Arc::new(ScalePlugin));

        let out = run_definitions(
            vec![
                stage("ingest", &[]),
                StageDefinition::plugin("scaled", "scale").with_dependency("ingest"),
            ],
            json!(4),
            &RunContext::new(),
            &registry,
        )
        .await
        .unwrap();

        assert_eq!(out.payload, json!(50));
    }

    #[tokio::test]
    async fn test_missing_handler_fails_before_running() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let registry = HandlerRegistry::new().with_fn("a", move |v, _| {
            flag.store(true, Ordering::SeqCst);
            Ok(v)
        });

        let err = run_definitions(
            vec![stage("a", &[]), stage("b", &["a"])],
            Value::Null,
            &RunContext::new(),
            &registry,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SignalflowError::Configuration(ref e) if e.field == "b"));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_invalid_graph_fails_before_running() {
        let err = run_definitions(
            vec![stage("a", &["b"]), stage("b", &["a"])],
            Value::Null,
            &RunContext::new(),
            &HandlerRegistry::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SignalflowError::GraphDefinition(_)));
        assert!(err.to_string().contains("cycle"));
    }

    #[tokio::test]
    async fn test_lifecycle_events_are_emitted() {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = RunContext::new().with_event_sink(sink.clone());
        let registry = HandlerRegistry::new()
            .with_fn("a", |v, _| Ok(v))
            .with_fn("b", |v, _| Ok(v));

        run_definitions(
            vec![stage("a", &[]), stage("b", &["a"])],
            Value::Null,
            &ctx,
            &registry,
        )
        .await
        .unwrap();

        assert_eq!(sink.types_with_prefix("stage.started").len(), 2);
        assert_eq!(sink.types_with_prefix("stage.completed").len(), 2);
        assert_eq!(sink.types_with_prefix("pipeline."), vec!["pipeline.completed"]);
    }

    #[tokio::test]
    async fn test_failure_emits_failed_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = RunContext::new().with_event_sink(sink.clone());
        let registry =
            HandlerRegistry::new().with_fn("a", |_, _| Err(anyhow::anyhow!("nope")));

        let _ = run_definitions(vec![stage("a", &[])], Value::Null, &ctx, &registry).await;

        assert_eq!(sink.types_with_prefix("stage.failed"), vec!["stage.failed"]);
        assert_eq!(sink.types_with_prefix("pipeline."), vec!["pipeline.failed"]);
    }

    #[tokio::test]
    async fn test_handlers_see_run_context() {
        let registry = HandlerRegistry::new().with_fn("who", |_, ctx: &RunContext| {
            Ok(json!({ "signal": ctx.signal_id(), "demo": ctx.is_demo() }))
        });
        let ctx = RunContext::new().with_signal_id("sig-42").with_demo(true);

        let out = run_definitions(vec![stage("who", &[])], Value::Null, &ctx, &registry)
            .await
            .unwrap();

        assert_eq!(out.payload, json!({ "signal": "sig-42", "demo": true }));
    }

    #[test]
    fn test_new_rejects_handlers_missing_a_stage() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = HandlerRegistry::new().with_fn("a", move |v, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(v)
        });
        let handlers = registry
            .resolve(&StageGraph::build(vec![stage("a", &[])]).unwrap())
            .unwrap();

        let wider = StageGraph::build(vec![stage("a", &[]), stage("z", &[])]).unwrap();
        let err = DagExecutor::new(wider, handlers).unwrap_err();

        assert_eq!(err.field, "z");
        assert!(err.message.contains("no handler bound to stage 'z'"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_engine_config_caps_concurrency() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let ids = ["c1", "c2", "c3", "c4"];

        let mut registry = HandlerRegistry::new();
        for id in ids {
            let current = current.clone();
            let peak = peak.clone();
            let handler = AsyncFnHandler::new(id, move |v: Value, _ctx: RunContext| {
                let current = current.clone();
                let peak = peak.clone();
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(v)
                }
            });
            registry = registry.with_handler(id, Arc::new(handler));
        }

        let config = EngineConfig::from_json_str(r#"{ "maxConcurrency": 1 }"#).unwrap();
        let graph = StageGraph::build(ids.iter().map(|id| stage(id, &[])).collect()).unwrap();
        let executor = config.configure_executor(DagExecutor::from_registry(graph, &registry).unwrap());

        let out = executor.run(Value::Null, &RunContext::new()).await.unwrap();

        assert_eq!(out.stage_meta.len(), ids.len());
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unset_config_cap_clears_executor_bound() {
        let registry = HandlerRegistry::new().with_fn("a", |v, _| Ok(v));
        let graph = StageGraph::build(vec![stage("a", &[])]).unwrap();
        let capped = DagExecutor::from_registry(graph, &registry)
            .unwrap()
            .with_max_concurrency(2);

        let executor = EngineConfig::new().configure_executor(capped);

        assert_eq!(executor.max_concurrency(), None);
    }
}

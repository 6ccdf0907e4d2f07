//! Integration tests for configuration documents, extensions and the
//! operator registry.

mod common;

use common::{Gather, Interval, PoolUser, Threshold};
use sluice_executor::prelude::*;
use sluice_executor::testing::{CountingSource, RecordingSink};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

struct Sources;

impl Extension for Sources {
    fn name(&self) -> &str {
        "sources"
    }

    fn register(&self, registry: &mut Registry) -> Result<()> {
        registry.register_factory(
            "counting_source",
            Arc::new(|| Box::new(CountingSource::new(2)) as Box<dyn Operator>),
        );
        Ok(())
    }
}

fn source_to_sink(fragment: &mut Fragment, source: OperatorHandle) -> sluice_executor::testing::SharedLog<i64> {
    let (sink, log) = RecordingSink::<i64>::new();
    let sink = fragment.make_operator("sink", sink).unwrap();
    fragment.add_flow(source, sink, &[]).unwrap();
    log
}

#[tokio::test]
async fn operator_section_overrides_defaults() {
    let mut fragment = Fragment::new("configured");
    fragment.set_config(Config::parse("source:\n  start: 10\n").unwrap());
    let source = fragment.make_operator("source", CountingSource::new(3)).unwrap();
    let log = source_to_sink(&mut fragment, source);

    fragment.run().await.unwrap();
    assert_eq!(log.values(), vec![10, 11, 12]);
}

#[tokio::test]
async fn explicit_arguments_beat_configuration() {
    let mut fragment = Fragment::new("explicit");
    fragment.set_config(Config::parse("source:\n  start: 10\n").unwrap());
    let source = fragment
        .operator("source", CountingSource::new(2))
        .arg("start", 7)
        .build()
        .unwrap();
    let log = source_to_sink(&mut fragment, source);

    fragment.run().await.unwrap();
    assert_eq!(log.values(), vec![7, 8]);
}

#[tokio::test]
async fn args_from_a_nested_key() {
    let mut fragment = Fragment::new("nested");
    fragment.set_config(Config::parse("limits:\n  tight:\n    threshold: 0.25\n").unwrap());
    let (op, log) = Threshold::new();
    let op = fragment
        .operator("threshold", op)
        .args_from_config("limits.tight")
        .build()
        .unwrap();
    fragment.add_operator(op).unwrap();

    fragment.run().await.unwrap();
    assert_eq!(log.values(), vec![0.25]);
}

#[tokio::test]
async fn later_documents_win() {
    let text = "threshold:\n  threshold: 1.0\n---\nthreshold:\n  threshold: 2.0\n";
    let mut fragment = Fragment::new("documents");
    fragment.set_config(Config::parse(text).unwrap());
    let (op, log) = Threshold::new();
    let op = fragment.make_operator("threshold", op).unwrap();
    fragment.add_operator(op).unwrap();

    fragment.run().await.unwrap();
    assert_eq!(log.values(), vec![2.0]);
}

#[tokio::test]
async fn duration_parameters_accept_units() {
    let mut fragment = Fragment::new("durations");
    fragment.set_config(Config::parse("interval:\n  period: 250ms\n").unwrap());
    let (op, log) = Interval::new();
    let op = fragment.make_operator("interval", op).unwrap();
    fragment.add_operator(op).unwrap();

    fragment.run().await.unwrap();
    assert_eq!(log.values(), vec![Duration::from_millis(250)]);
}

#[tokio::test]
async fn config_file_drives_scheduler_and_operators() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "scheduler:\n  policy: greedy\n  max_duration_ms: 5000\nsource:\n  start: 3"
    )
    .unwrap();

    let mut fragment = Fragment::new("from_file");
    fragment.load_config(file.path()).unwrap();
    let scheduler = ExecutorConfig::from_config(fragment.config()).unwrap();
    assert_eq!(scheduler.policy, SchedulerPolicy::Greedy);
    assert_eq!(scheduler.max_duration, Some(Duration::from_secs(5)));
    fragment.set_executor_config(scheduler);

    let source = fragment.make_operator("source", CountingSource::new(2)).unwrap();
    let log = source_to_sink(&mut fragment, source);
    fragment.run().await.unwrap();
    assert_eq!(log.values(), vec![3, 4]);
}

#[tokio::test]
async fn extensions_listed_in_config_provide_operator_types() {
    let mut fragment = Fragment::new("extensions");
    fragment.set_config(Config::parse("extensions:\n  - sources\n").unwrap());
    fragment.registry_mut().add_extension(Arc::new(Sources));

    assert_eq!(fragment.load_extensions().unwrap(), vec!["sources".to_string()]);
    assert!(fragment.registry().is_loaded("sources"));

    let source = fragment
        .operator_of_type("source", "counting_source")
        .unwrap()
        .build()
        .unwrap();
    let log = source_to_sink(&mut fragment, source);
    fragment.run().await.unwrap();
    assert_eq!(log.values(), vec![1, 2]);
}

#[test]
fn unknown_extension_and_type_are_errors() {
    let mut fragment = Fragment::new("unknown");
    fragment.set_config(Config::parse("extensions: [missing]\n").unwrap());
    assert!(matches!(
        fragment.load_extensions().unwrap_err(),
        SluiceError::UnknownExtension { ref name } if name == "missing"
    ));
    assert!(matches!(
        fragment.operator_of_type("x", "nothing").err(),
        Some(SluiceError::UnknownOperatorType { .. })
    ));
}

#[tokio::test]
async fn repeated_input_collects_one_value_per_producer() {
    let mut fragment = Fragment::new("gather");
    let (gather, log) = Gather::new();
    let gather = fragment.make_operator("gather", gather).unwrap();
    for (i, start) in [1i64, 10, 100].into_iter().enumerate() {
        let source = fragment
            .operator(format!("source{i}"), CountingSource::new(2))
            .arg("start", start)
            .build()
            .unwrap();
        fragment.add_flow(source, gather, &[("out", "values")]).unwrap();
    }

    let spec = fragment.spec(gather).unwrap();
    let children: Vec<_> = spec.children_of("values").map(|p| p.name.clone()).collect();
    assert_eq!(children, vec!["values:0", "values:1", "values:2"]);

    fragment.run().await.unwrap();
    assert_eq!(log.values(), vec![vec![1, 10, 100], vec![2, 11, 101]]);
}

#[tokio::test]
async fn repeated_input_without_producers_is_invalid() {
    let mut fragment = Fragment::new("starved");
    let (gather, _log) = Gather::new();
    let gather = fragment.make_operator("gather", gather).unwrap();
    fragment.add_operator(gather).unwrap();

    let err = fragment.run().await.unwrap_err();
    assert!(matches!(err, SluiceError::GraphValidation { ref errors } if errors.len() == 1));
}

#[tokio::test]
async fn resources_are_resolved_through_aliases() {
    let mut fragment = Fragment::new("resources");
    fragment.add_resource("blocks", Arc::new(BlockMemoryPool::new(64, 4)));
    let (user, log) = PoolUser::new(2);
    let user = fragment
        .operator("user", user)
        .resource("pool", "blocks")
        .build()
        .unwrap();
    fragment.add_operator(user).unwrap();

    fragment.run().await.unwrap();
    assert_eq!(log.values(), vec![64, 64]);
}

#[tokio::test]
async fn missing_resource_fails_before_start() {
    let mut fragment = Fragment::new("no_resources");
    let (user, log) = PoolUser::new(1);
    let user = fragment.make_operator("user", user).unwrap();
    fragment.add_operator(user).unwrap();

    let err = fragment.run().await.unwrap_err();
    assert!(matches!(err, SluiceError::ResourceNotFound { ref resource, .. } if resource == "pool"));
    assert!(log.is_empty());
}

//! Integration tests for the wraprun public API.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use wraprun::Args;
use wraprun::Function;
use wraprun::Runtime;
use wraprun::Value;
use wraprun::compile::compile;
use wraprun::config::Config;
use wraprun::remoting;
use wraprun::remoting::RemotingParameterSet;
use wraprun::transport::LoopbackTransport;
use wraprun::transport::Transport;
use wraprun::wrapper::BindError;
use wraprun::wrapper::InvokeError;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn function_with(names: &[String], types: &[&str]) -> Function {
    let mut f = Function::new("Subject", |_ctx, args| Ok(Value::List(args.to_vec())));
    for (name, ty) in names.iter().zip(types.iter().cycle()) {
        f = f.param(name.clone(), format!("{}: {}", name, ty));
    }
    f
}

fn param_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z][a-z0-9_]{0,7}", 0..8).prop_map(|set| {
        let mut names: Vec<String> = set.into_iter().collect();
        names.sort();
        names
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_generated_block_has_remoting_first(names in param_names()) {
        let runtime = Arc::new(Runtime::new(Arc::new(LoopbackTransport::new())));
        runtime.register(function_with(&names, &["int", "string", "[string] @required", "bool"]));

        let definition = runtime.wrap("Subject").generate().unwrap();
        prop_assert_eq!(definition.parameters.len(), names.len() + 3);
        prop_assert_eq!(
            &definition.parameters[..3],
            &[
                remoting::TARGET_LIST.to_string(),
                remoting::CREDENTIAL.to_string(),
                remoting::SESSION_LIST.to_string(),
            ]
        );
        prop_assert_eq!(&definition.parameters[3..], &names[..]);
        prop_assert_eq!(&definition.forward, &names);

        let spec = compile(&definition.text).unwrap();
        prop_assert_eq!(spec.params.len(), names.len() + 3);
        prop_assert_eq!(&spec.forward, &names);
        let forwarded: HashSet<&str> = spec.forward.iter().map(String::as_str).collect();
        for name in [remoting::TARGET_LIST, remoting::CREDENTIAL, remoting::SESSION_LIST] {
            prop_assert!(!forwarded.contains(name));
        }
    }

    #[test]
    fn prop_forwarded_values_follow_declaration_order(names in param_names()) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let runtime = Arc::new(Runtime::new(Arc::new(LoopbackTransport::new())));
        runtime.register(function_with(&names, &["int"]));
        runtime.wrap("Subject").install().unwrap();

        let mut args = Args::new().targets(["h"]);
        for (i, name) in names.iter().enumerate() {
            args = args.with(name.clone(), i as i64);
        }
        let report = rt.block_on(runtime.invoke("SubjectRemote", args)).unwrap();

        let expected: Vec<Value> = (0..names.len() as i64).map(Value::Int).collect();
        let expected = Value::List(expected);
        prop_assert_eq!(report.values(), vec![&expected]);
    }
}

#[tokio::test]
async fn test_generated_text_can_be_edited_before_install() {
    init_tracing();
    let runtime = Arc::new(Runtime::new(Arc::new(LoopbackTransport::new())));
    runtime.register(
        Function::new("Restart-Service", |ctx, args| {
            Ok(Value::from(format!("{} restarted {}", ctx.session().address, args[0])))
        })
        .param("name", "name: string @required"),
    );

    let mut definition = runtime.wrap("Restart-Service").generate().unwrap();
    definition.text = definition.text.replace("name: string @required", "name: string");
    let wrapper = runtime
        .wrappers()
        .install_definition("restart", &definition, runtime.callables(), runtime.remoting())
        .unwrap();

    assert!(wrapper.definition().contains("name: string\n"));
    let report = runtime.invoke("restart", Args::new().targets(["web1"])).await.unwrap();
    assert_eq!(report.values(), vec![&Value::from("web1 restarted null")]);
}

#[tokio::test]
async fn test_sessions_reused_across_wrappers() {
    init_tracing();
    let transport = Arc::new(LoopbackTransport::new());
    let runtime = Arc::new(Runtime::new(transport.clone()));
    runtime.register(Function::new("whoami", |ctx, _args| {
        Ok(Value::from(ctx.session().to_string()))
    }));
    runtime.register(Function::new("uptime", |_ctx, _args| Ok(Value::Int(42))));
    runtime.wrap("whoami").install().unwrap();
    runtime.wrap("uptime").install().unwrap();

    let session = transport.open("db1", None).await.unwrap();
    let first = runtime
        .invoke("whoamiRemote", Args::new().sessions([session.clone()]))
        .await
        .unwrap();
    let second = runtime
        .invoke("uptimeRemote", Args::new().sessions([session.clone()]))
        .await
        .unwrap();

    assert_eq!(first.values(), vec![&Value::from(session.to_string())]);
    assert_eq!(second.values(), vec![&Value::Int(42)]);
    assert!(transport.is_open(&session));

    transport.close(&session).await.unwrap();
    let third = runtime
        .invoke("uptimeRemote", Args::new().sessions([session]))
        .await
        .unwrap();
    assert!(!third.is_success());
}

#[tokio::test]
async fn test_config_drives_suffix_and_concurrency() {
    init_tracing();
    let config = Config::from_toml_str(
        r#"
        [generator]
        suffix = "Everywhere"

        [dispatch]
        concurrency = 3
        "#,
    )
    .unwrap();
    let runtime = Arc::new(Runtime::with_config(Arc::new(LoopbackTransport::new()), config));
    runtime.register(Function::new("host", |ctx, _args| {
        Ok(Value::from(ctx.session().address.clone()))
    }));
    runtime.wrap("host").install().unwrap();

    let report = runtime
        .invoke("hostEverywhere", Args::new().targets(["a", "b", "c", "d", "e"]))
        .await
        .unwrap();
    let hosts: Vec<&str> = report.values().iter().filter_map(|v| v.as_str()).collect();
    assert_eq!(hosts, vec!["a", "b", "c", "d", "e"]);
}

#[tokio::test]
async fn test_mutually_exclusive_remoting_sets() {
    init_tracing();
    let transport = Arc::new(LoopbackTransport::new());
    let runtime = Arc::new(Runtime::new(transport.clone()));
    runtime.register(Function::new("noop", |_ctx, _args| Ok(Value::Null)));
    runtime.wrap("noop").install().unwrap();

    let session = transport.open("x", None).await.unwrap();
    let err = runtime
        .invoke("noopRemote", Args::new().targets(["y"]).sessions([session]))
        .await
        .unwrap_err();

    assert!(matches!(err, InvokeError::Bind(BindError::ParameterSetConflict { .. })));
    assert_eq!(transport.opened_total(), 1);
}

#[test]
fn test_standard_remoting_declarations_compile_back() {
    let set = RemotingParameterSet::standard();
    for descriptor in set.descriptors() {
        let spec = descriptor.spec().unwrap();
        assert_eq!(Some(&spec), set.get(&descriptor.name));
    }
}

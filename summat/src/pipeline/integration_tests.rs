//! End-to-end pipeline scenarios.

#[cfg(test)]
mod tests {
    use crate::combinators::{Const, Lift};
    use crate::environment::{Bindings, Environment};
    use crate::errors::SummatError;
    use crate::pipeline::{pipe, PipelineBuilder};
    use crate::signal::Signal;
    use crate::testing::{FailingStage, RecordingStage};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[test]
    fn test_const_then_lift() {
        let pipeline = pipe("const-lift")
            .constant(5_i64)
            .lift(|x: i64| x + 1)
            .build()
            .unwrap();

        assert_eq!(pipeline.run(Environment::new()).unwrap(), json!(6));
    }

    #[test]
    fn test_path_last_upper() {
        let pipeline = pipe("shout")
            .path()
            .last::<String>()
            .lift(|s: String| s.to_uppercase())
            .build()
            .unwrap();

        let env = Environment::new().with_binding("path", json!("/a/b/hello"));
        assert_eq!(pipeline.run(env).unwrap(), json!("HELLO"));
    }

    fn double(value: Value) -> Value {
        match value {
            Value::Number(n) => json!(n.as_i64().unwrap_or(0) * 2),
            Value::String(s) => json!(s.repeat(2)),
            other => other,
        }
    }

    #[test]
    fn test_pipeline_reused_across_shapes() {
        let pipeline = pipe("double").lift(double).build().unwrap();

        let first = pipeline.run(Environment::new().with_current(json!(5))).unwrap();
        let second = pipeline.run(Environment::new().with_current(json!("ab"))).unwrap();

        assert_eq!(first, json!(10));
        assert_eq!(second, json!("abab"));
    }

    #[test]
    fn test_statically_typed_pipeline_rejects_other_shapes() {
        let pipeline = pipe("double-int").cast::<i64>().lift(|x: i64| x * 2).build().unwrap();

        assert_eq!(pipeline.run_typed(Environment::new().with_current(json!(5))).unwrap(), 10);
        assert!(pipeline.run(Environment::new().with_current(json!("ab"))).is_err());
    }

    #[test]
    fn test_map_reverse_then_concat() {
        let pipeline = pipe("reverse-concat")
            .cast::<Vec<String>>()
            .map(|s: String| s.chars().rev().collect::<String>())
            .foldl1(|a: String, b: String| a + &b)
            .build()
            .unwrap();

        let env = Environment::new().with_current(json!(["one", "two", "three"]));
        assert_eq!(pipeline.run(env).unwrap(), json!("enoowteerht"));
    }

    #[test]
    fn test_fork_len_and_const() {
        let pipeline = pipe("fork")
            .cast::<String>()
            .fork::<usize, String>(
                Lift::unary(|v| Ok(json!(v.as_str().map_or(0, str::len)))),
                Const::new(json!("right")),
            )
            .build()
            .unwrap();

        let env = Environment::new().with_current(json!("test"));
        assert_eq!(
            pipeline.run_typed(env).unwrap(),
            (4, "right".to_string())
        );
    }

    #[test]
    fn test_foldl_vs_foldl1_on_empty() {
        let foldl = pipe("sum")
            .foldl(|acc: i64, x: i64| acc + x, 100_i64)
            .build()
            .unwrap();
        let foldl1 = pipe("sum1").foldl1(|a: i64, b: i64| a + b).build().unwrap();

        let empty = || Environment::new().with_current(json!([]));
        assert_eq!(foldl.run(empty()).unwrap(), json!(100));
        assert_eq!(
            foldl1.run(empty()).unwrap_err(),
            SummatError::empty_sequence("foldl1")
        );
    }

    #[test]
    fn test_cond_with_sub_pipelines() {
        let then_branch = pipe("then").constant("truthy").build().unwrap();
        let else_branch = pipe("else").constant("falsy").build().unwrap();
        let pipeline = pipe("branch")
            .cond::<String>(then_branch, else_branch)
            .build()
            .unwrap();

        assert_eq!(
            pipeline.run(Environment::new().with_current(json!(1))).unwrap(),
            json!("truthy")
        );
        assert_eq!(
            pipeline.run(Environment::new().with_current(json!(""))).unwrap(),
            json!("falsy")
        );
    }

    #[test]
    fn test_fork_branch_state_is_isolated() {
        let left = Arc::new(RecordingStage::new("left", Signal::Drop(json!("L"))));
        let right = Arc::new(RecordingStage::new("right", Signal::Keep(json!("R"))));
        let pipeline = pipe("isolated")
            .fork::<String, String>(left.clone(), right.clone())
            .build()
            .unwrap();

        let input = Environment::new()
            .with_binding("shared", json!(true))
            .with_current(json!("in"));
        pipeline.run(input.clone()).unwrap();

        left.set_signal(Signal::Drop(json!("changed")));
        pipeline.run(input.clone()).unwrap();

        let observed = right.recorded_environments();
        assert_eq!(observed.len(), 2);
        assert!(observed.iter().all(|env| *env == input));
    }

    #[test]
    fn test_failure_aborts_run() {
        let after = Arc::new(RecordingStage::passthrough("after"));
        let pipeline = pipe("abort")
            .constant(1_i64)
            .then::<Value>(FailingStage::new("boom", "exploded"))
            .then::<Value>(after.clone())
            .build()
            .unwrap();

        let err = pipeline.run(Environment::new()).unwrap_err();
        assert_eq!(err, SummatError::execution("boom", "exploded"));
        assert_eq!(after.call_count(), 0);
    }

    #[test]
    fn test_keyword_pipeline_from_call_bindings() {
        #[derive(serde::Deserialize)]
        struct Args {
            name: String,
        }

        let pipeline = PipelineBuilder::<Args>::new("hello")
            .lift_kw(|args: Args| format!("Hello {}!", args.name))
            .build()
            .unwrap();

        let call: Bindings = [("name".to_string(), json!("World"))].into_iter().collect();
        assert_eq!(pipeline.call_with(call).unwrap(), json!("Hello World!"));
    }

    #[test]
    fn test_lift_narrows_until_input_restores() {
        let call = || {
            Environment::new()
                .with_binding("name", json!("kept"))
                .with_current(json!(1))
        };
        let read_name = |b: Bindings| b.get("name").cloned().unwrap_or(Value::Null);

        let narrowed = pipe("narrowed")
            .cast::<i64>()
            .lift(|x: i64| x + 1)
            .lift_kw(read_name)
            .build()
            .unwrap();
        assert_eq!(narrowed.run(call()).unwrap(), Value::Null);

        let restored = pipe("restored")
            .cast::<i64>()
            .lift(|x: i64| x + 1)
            .input()
            .lift_kw(read_name)
            .build()
            .unwrap();
        assert_eq!(restored.run(call()).unwrap(), json!("kept"));
    }
}

use super::*;
use runbridge_api::InvocationSpec;
use serde_json::json;

fn run(spec: InvocationSpec) -> Invocation {
    Invocation::new("build-pipeline", "image-build", spec)
}

fn build_ref(kind: &str, api_version: &str, name: &str) -> TaskRef {
    TaskRef {
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        name: name.to_string(),
    }
}

fn embedded(kind: &str, api_version: &str, payload: Option<serde_json::Value>) -> EmbeddedSpec {
    EmbeddedSpec {
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        payload,
    }
}

fn kaniko_payload() -> serde_json::Value {
    json!({
        "source": {
            "url": "https://github.com/shipwright-io/build",
            "revision": "main"
        },
        "strategy": {"kind": "BuildStrategy", "name": "kaniko"},
        "output": {
            "image": "ghcr.io/shipwright-io/build/shipwright-build-controller:latest"
        }
    })
}

fn rejection(spec: InvocationSpec) -> String {
    validate(&run(spec)).unwrap_err().to_string()
}

#[test]
fn test_valid_build_reference() {
    let accepted = validate(&run(InvocationSpec::for_build("image-build"))).unwrap();
    assert_eq!(
        accepted.target,
        BuildTarget::Reference {
            name: "image-build".to_string()
        }
    );
    assert!(accepted.overrides.is_empty());
    assert!(accepted.timeout.is_none());
}

#[test]
fn test_valid_embedded_spec() {
    let spec = InvocationSpec {
        embedded: Some(embedded(
            BUILD_KIND,
            BUILD_API_VERSION,
            Some(kaniko_payload()),
        )),
        ..Default::default()
    };

    let accepted = validate(&run(spec)).unwrap();
    match accepted.target {
        BuildTarget::Embedded(build) => assert_eq!(build.strategy.name, "kaniko"),
        other => panic!("unexpected target: {other:?}"),
    }
}

#[test]
fn test_neither_ref_nor_spec() {
    let msg = rejection(InvocationSpec::default());
    assert!(msg.contains("exactly one of"));
}

#[test]
fn test_both_ref_and_spec() {
    let spec = InvocationSpec {
        reference: Some(TaskRef::build("image-build")),
        embedded: Some(embedded(
            BUILD_KIND,
            BUILD_API_VERSION,
            Some(kaniko_payload()),
        )),
        ..Default::default()
    };
    let msg = rejection(spec);
    assert!(msg.contains("exactly one of"));
}

#[test]
fn test_reference_with_wrong_kind_and_api_version() {
    let spec = InvocationSpec {
        reference: Some(build_ref("Bad", "something.awful.io/v1", "image-build")),
        ..Default::default()
    };
    let msg = rejection(spec);
    assert!(msg.contains("kind must be Build"));
    assert!(msg.contains("apiVersion must be shipwright.io/v1alpha1"));
}

#[test]
fn test_reference_with_only_api_version_wrong_states_both() {
    for (kind, api_version) in [
        ("Build", "shipwright.io/v1beta1"),
        ("BuildRun", "shipwright.io/v1alpha1"),
    ] {
        let spec = InvocationSpec {
            reference: Some(build_ref(kind, api_version, "image-build")),
            ..Default::default()
        };
        let msg = rejection(spec);
        assert!(msg.contains("kind must be Build"), "{kind} {api_version}");
        assert!(
            msg.contains("apiVersion must be shipwright.io/v1alpha1"),
            "{kind} {api_version}"
        );
    }
}

#[test]
fn test_embedded_with_wrong_kind_and_api_version() {
    let spec = InvocationSpec {
        embedded: Some(embedded("Bad", "something.awful.io", None)),
        ..Default::default()
    };
    let msg = rejection(spec);
    assert!(msg.contains("kind must be Build"));
    assert!(msg.contains("apiVersion must be shipwright.io/v1alpha1"));
    assert!(!msg.contains("deserialize"));
}

#[test]
fn test_embedded_with_bad_payload_is_a_deserialize_error() {
    let spec = InvocationSpec {
        embedded: Some(embedded(
            BUILD_KIND,
            BUILD_API_VERSION,
            Some(json!({"strategy": "kaniko"})),
        )),
        ..Default::default()
    };
    let msg = rejection(spec);
    assert!(msg.contains("failed to deserialize embedded build spec"));
    assert!(!msg.contains("kind must be"));
}

#[test]
fn test_embedded_with_structurally_invalid_payload() {
    let mut payload = kaniko_payload();
    payload["source"]["url"] = json!("");
    let spec = InvocationSpec {
        embedded: Some(embedded(BUILD_KIND, BUILD_API_VERSION, Some(payload))),
        ..Default::default()
    };
    let msg = rejection(spec);
    assert!(msg.contains("failed to deserialize embedded build spec"));
    assert!(msg.contains("source URL is required"));
}

#[test]
fn test_embedded_without_payload() {
    let spec = InvocationSpec {
        embedded: Some(embedded(BUILD_KIND, BUILD_API_VERSION, None)),
        ..Default::default()
    };
    let msg = rejection(spec);
    assert!(msg.contains("payload is empty"));
}

#[test]
fn test_unnamed_reference() {
    let spec = InvocationSpec {
        reference: Some(build_ref(BUILD_KIND, BUILD_API_VERSION, "")),
        ..Default::default()
    };
    let msg = rejection(spec);
    assert!(msg.contains("build name is required"));
}

#[test]
fn test_timeout_is_accepted() {
    let spec = InvocationSpec::for_build("image-build").with_timeout(Duration::from_hours(1));
    let accepted = validate(&run(spec)).unwrap();
    assert_eq!(accepted.timeout, Some(Duration::from_hours(1)));
}

#[test]
fn test_negative_timeout() {
    let spec = InvocationSpec::for_build("image-build").with_timeout(Duration::from_secs(-1));
    let msg = rejection(spec);
    assert!(msg.contains("timeout must be non-negative"));
}

#[test]
fn test_retries_not_supported() {
    for retries in [3, 1, -1] {
        let spec = InvocationSpec {
            retries,
            ..Default::default()
        };
        let msg = rejection(spec);
        assert!(msg.contains("retries are not supported"), "retries={retries}");
    }
}

#[test]
fn test_arbitrary_param() {
    let spec = InvocationSpec {
        params: vec![Param::string("abrbitrary-apram", "arbitrary-value")],
        ..Default::default()
    };
    let msg = rejection(spec);
    assert!(msg.contains("Unsupported value:"));
    assert!(msg.contains(
        "Unsupported value: abrbitrary-apram: supported values: \"shp-source-url\", \"shp-source-revision\", \"shp-output-image\""
    ));
}

#[test]
fn test_only_first_unknown_param_reported() {
    let spec = InvocationSpec::for_build("image-build")
        .with_param("first-unknown", "a")
        .with_param("second-unknown", "b");
    let errors = validate(&run(spec)).unwrap_err();
    assert_eq!(errors.violations().len(), 1);
    assert!(errors.to_string().contains("first-unknown"));
}

#[test]
fn test_supported_params() {
    let spec = InvocationSpec::for_build("image-build")
        .with_param(PARAM_SOURCE_URL, "https://github.com/shipwright-io/build")
        .with_param(PARAM_SOURCE_REVISION, "main")
        .with_param(
            PARAM_OUTPUT_IMAGE,
            "ghcr.io/shipwright-io/build/shipwright-build-controller:latest",
        );

    let accepted = validate(&run(spec)).unwrap();
    assert_eq!(
        accepted.overrides,
        vec![
            (
                OverrideParam::SourceUrl,
                "https://github.com/shipwright-io/build".to_string()
            ),
            (OverrideParam::SourceRevision, "main".to_string()),
            (
                OverrideParam::OutputImage,
                "ghcr.io/shipwright-io/build/shipwright-build-controller:latest".to_string()
            ),
        ]
    );
}

#[test]
fn test_duplicate_param() {
    let spec = InvocationSpec::for_build("image-build")
        .with_param(PARAM_SOURCE_REVISION, "main")
        .with_param(PARAM_SOURCE_REVISION, "dev");
    let msg = rejection(spec);
    assert!(msg.contains("duplicate param name: shp-source-revision"));
}

#[test]
fn test_array_value_for_override_param() {
    let mut spec = InvocationSpec::for_build("image-build");
    spec.params.push(Param {
        name: PARAM_OUTPUT_IMAGE.to_string(),
        value: ParamValue::Array(vec!["a".to_string(), "b".to_string()]),
    });
    let msg = rejection(spec);
    assert!(msg.contains("expected string value for param shp-output-image"));
}

#[test]
fn test_violations_are_aggregated_in_rule_order() {
    let spec = InvocationSpec {
        reference: Some(build_ref("Bad", "something.awful.io/v1", "")),
        retries: 2,
        params: vec![Param::string("abrbitrary-param", "x")],
        timeout: Some(Duration::from_secs(-5)),
        ..Default::default()
    };

    let errors = validate(&run(spec)).unwrap_err();
    let messages: Vec<&str> = errors
        .violations()
        .iter()
        .map(|v| v.message.as_str())
        .collect();

    assert_eq!(messages.len(), 5);
    assert!(messages[0].starts_with("kind must be Build"));
    assert_eq!(messages[1], "build name is required");
    assert_eq!(messages[2], "retries are not supported");
    assert!(messages[3].starts_with("Unsupported value:"));
    assert_eq!(messages[4], "timeout must be non-negative");

    let rendered = errors.to_string();
    assert_eq!(rendered.lines().count(), 5);
    assert!(rendered.contains("build name is required: spec.ref.name"));
}

#[test]
fn test_validation_is_deterministic() {
    let spec = InvocationSpec {
        retries: 1,
        params: vec![Param::string("nope", "x")],
        ..Default::default()
    };
    let invocation = run(spec);
    assert_eq!(validate(&invocation), validate(&invocation));
}

use std::time::Duration;

use httpmock::{Method::GET, Method::POST, MockServer};
use renovo_gateway::{
    AnalysisPayload, AnalysisRequest, Env, FailureKind, Gateway, GatewayConfig, GatewayReply,
    GatewayResult, GenerationPayload, GenerationRequest, ImageSource, PollConfig, ProviderId,
    Registry,
};
use serde_json::json;

fn should_skip_httpmock() -> bool {
    match std::net::TcpListener::bind(("127.0.0.1", 0)) {
        Ok(listener) => {
            drop(listener);
            false
        }
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            eprintln!("skipping httpmock test: sandbox forbids binding to localhost");
            true
        }
        Err(err) => panic!("failed to bind localhost for httpmock tests: {err}"),
    }
}

fn env_with(key: &str, value: &str) -> Env {
    let mut env = Env::default();
    env.dotenv.insert(key.to_string(), value.to_string());
    env
}

fn fast_poll() -> GatewayConfig {
    GatewayConfig {
        poll: PollConfig {
            interval: Duration::from_millis(1),
            max_attempts: 10,
        },
        ..GatewayConfig::default()
    }
}

fn generation(provider: ProviderId, prompt: &str) -> GenerationRequest {
    GenerationRequest {
        prompt: prompt.to_string(),
        source_image: None,
        strength: None,
        width: 1024,
        height: 1024,
        provider,
        model: None,
    }
}

#[tokio::test]
async fn replicate_job_with_two_polls_yields_an_image() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/black-forest-labs/flux-schnell/predictions")
                .body_includes("\"prompt\":\"paint walls blue\"");
            then.status(201)
                .header("content-type", "application/json")
                .body(json!({ "id": "p-7", "status": "starting" }).to_string());
        })
        .await;
    // The create response is already pending, so the first status fetch may
    // immediately see the terminal state; the two "polls" of the scenario
    // are the create read plus at least one status read.
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path("/predictions/p-7");
            then.status(200)
                .header("content-type", "application/json")
                .body(
                    json!({
                        "id": "p-7",
                        "status": "succeeded",
                        "output": ["https://replicate.delivery/after.png"]
                    })
                    .to_string(),
                );
        })
        .await;

    let registry = Registry::builtin().with_base_url(ProviderId::Replicate, server.base_url());
    let gateway = Gateway::new(registry, env_with("REPLICATE_API_TOKEN", "r8-test"))
        .with_config(fast_poll());

    let result = gateway
        .dispatch_generation(generation(ProviderId::Replicate, "paint walls blue"))
        .await;

    assert!(status.hits_async().await >= 1);
    match result {
        GatewayResult::Image { image } => assert_eq!(
            image,
            ImageSource::Url {
                url: "https://replicate.delivery/after.png".to_string(),
            }
        ),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn missing_openai_credential_is_out_of_service_before_any_call() {
    if should_skip_httpmock() {
        return;
    }
    // The Env falls back to the process environment, so a real key on the
    // host would defeat the point of this test.
    if std::env::var("OPENAI_API_KEY").is_ok_and(|v| !v.trim().is_empty()) {
        eprintln!("skipping: OPENAI_API_KEY present in process env");
        return;
    }
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/images/generations");
            then.status(200).body("{}");
        })
        .await;

    let registry = Registry::builtin().with_base_url(ProviderId::OpenAi, server.base_url());
    let gateway = Gateway::new(registry, Env::default());

    let result = gateway
        .dispatch_generation(generation(ProviderId::OpenAi, "brighter hallway"))
        .await;

    let failure = result.as_failure().expect("must fail");
    assert_eq!(failure.kind, FailureKind::OutOfService);
    assert_eq!(failure.kind.http_status(), 503);
    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn http_429_maps_to_rate_limited_regardless_of_family() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/images/generations");
            then.status(429)
                .header("content-type", "application/json")
                .body(json!({ "error": { "message": "Rate limit exceeded" } }).to_string());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/stabilityai/stable-diffusion-xl-base-1.0");
            then.status(429).body("rate limited");
        })
        .await;

    let registry = Registry::builtin()
        .with_base_url(ProviderId::OpenAi, server.base_url())
        .with_base_url(ProviderId::HuggingFace, server.base_url());
    let mut env = env_with("OPENAI_API_KEY", "sk-test");
    env.dotenv
        .insert("HUGGINGFACE_API_KEY".to_string(), "hf-test".to_string());
    let gateway = Gateway::new(registry, env);

    for provider in [ProviderId::OpenAi, ProviderId::HuggingFace] {
        let result = gateway
            .dispatch_generation(generation(provider, "repaint the ceiling"))
            .await;
        let failure = result.as_failure().expect("must fail");
        assert_eq!(failure.kind, FailureKind::RateLimited, "provider {provider}");
        assert_eq!(failure.kind.http_status(), 429);
        assert!(failure.suggestion.is_some());
    }
}

#[tokio::test]
async fn analysis_prose_reply_degrades_to_fallback_detections() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.5-flash:generateContent");
            then.status(200)
                .header("content-type", "application/json")
                .body(
                    json!({
                        "candidates": [{
                            "content": {
                                "parts": [{ "text": "What a lovely room! I see a sofa and a rug." }]
                            }
                        }]
                    })
                    .to_string(),
                );
        })
        .await;

    let registry = Registry::builtin().with_base_url(ProviderId::Gemini, server.base_url());
    let gateway = Gateway::new(registry, env_with("GEMINI_API_KEY", "g-test"));

    let result = gateway
        .dispatch_analysis(AnalysisRequest {
            image: ImageSource::Base64 {
                media_type: "image/jpeg".to_string(),
                data: "aWMK".to_string(),
            },
            provider: ProviderId::Gemini,
            model: None,
        })
        .await;

    match result {
        GatewayResult::Detections { objects } => {
            assert!(!objects.is_empty(), "fallback set must be non-empty");
            assert!(objects.iter().any(|o| o.name == "walls"));
        }
        other => panic!("expected degraded success, got {other:?}"),
    }
}

#[tokio::test]
async fn every_family_adapts_a_request_without_a_source_image() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    // All four synchronous families reject any body mentioning an image
    // field; the job/poll family is covered by the scenario test above.
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.5-flash-image-preview:generateContent")
                .body_excludes("inlineData")
                .body_excludes("fileData");
            then.status(200)
                .header("content-type", "application/json")
                .body(
                    json!({
                        "candidates": [{
                            "content": { "parts": [{ "inlineData": { "mimeType": "image/png", "data": "aWMK" } }] }
                        }]
                    })
                    .to_string(),
                );
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_excludes("image_url");
            then.status(200)
                .header("content-type", "application/json")
                .body(
                    json!({
                        "choices": [{
                            "message": {
                                "images": [{ "image_url": { "url": "data:image/png;base64,aWMK" } }]
                            }
                        }]
                    })
                    .to_string(),
                );
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/images/generations")
                .body_excludes("\"image\"");
            then.status(200)
                .header("content-type", "application/json")
                .body(json!({ "data": [{ "b64_json": "aWMK" }] }).to_string());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/stabilityai/stable-diffusion-xl-base-1.0")
                .body_excludes("\"image\"");
            then.status(200)
                .header("content-type", "image/png")
                .body("pngbytes");
        })
        .await;

    let registry = Registry::builtin()
        .with_base_url(ProviderId::Gemini, server.base_url())
        .with_base_url(ProviderId::OpenRouter, server.base_url())
        .with_base_url(ProviderId::OpenAi, server.base_url())
        .with_base_url(ProviderId::HuggingFace, server.base_url());
    let mut env = Env::default();
    for (key, value) in [
        ("GEMINI_API_KEY", "g"),
        ("OPENROUTER_API_KEY", "or"),
        ("OPENAI_API_KEY", "sk"),
        ("HUGGINGFACE_API_KEY", "hf"),
    ] {
        env.dotenv.insert(key.to_string(), value.to_string());
    }
    let gateway = Gateway::new(registry, env);

    for provider in [
        ProviderId::Gemini,
        ProviderId::OpenRouter,
        ProviderId::OpenAi,
        ProviderId::HuggingFace,
    ] {
        let result = gateway
            .dispatch_generation(generation(provider, "coastal sunroom"))
            .await;
        assert!(
            matches!(result, GatewayResult::Image { .. }),
            "provider {provider} should adapt an image-less request: {result:?}"
        );
    }
}

#[tokio::test]
async fn wire_payload_round_trip_for_the_scenario_request() {
    if should_skip_httpmock() {
        return;
    }
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/models/black-forest-labs/flux-schnell/predictions");
            then.status(201)
                .header("content-type", "application/json")
                .body(
                    json!({
                        "id": "p-9",
                        "status": "succeeded",
                        "output": "https://replicate.delivery/painted.png"
                    })
                    .to_string(),
                );
        })
        .await;

    let registry = Registry::builtin().with_base_url(ProviderId::Replicate, server.base_url());
    let gateway = Gateway::new(registry, env_with("REPLICATE_API_TOKEN", "r8-test"))
        .with_config(fast_poll());

    let payload: GenerationPayload = serde_json::from_value(json!({
        "prompt": "paint walls blue",
        "originalImage": null,
        "selectedProvider": "REPLICATE",
        "width": 1024,
        "height": 1024
    }))
    .expect("payload should deserialize");
    let request = payload
        .into_request(gateway.default_provider())
        .expect("payload should validate");
    let model = request.model.clone();
    let result = gateway.dispatch_generation(request).await;

    let reply = GatewayReply::from_result(result, ProviderId::Replicate, model.as_deref());
    assert_eq!(reply.http_status(), 200);
    let body = serde_json::to_value(&reply).expect("reply should serialize");
    assert_eq!(body["status"], "success");
    assert_eq!(body["imageUrl"], "https://replicate.delivery/painted.png");
    assert_eq!(body["provider"], "REPLICATE");
}

#[tokio::test]
async fn unknown_wire_provider_never_reaches_the_network() {
    let payload: AnalysisPayload = serde_json::from_value(json!({
        "imageBase64": "aWMK",
        "selectedProvider": "STABLEDIFFUSIONWEB"
    }))
    .expect("payload should deserialize");

    let failure = payload
        .into_request(ProviderId::Replicate)
        .expect_err("unknown provider must fail before dispatch");
    assert_eq!(failure.kind, FailureKind::ClientError);
    let reply = GatewayReply::from_failure(failure);
    assert_eq!(reply.http_status(), 400);
}

use std::io::Cursor;
use std::time::Duration;

use image::{ImageFormat, Rgba, RgbaImage};
use menushot::config::{
    ImageGenerationConfig, Secret, SegmentationConfig, TextGenerationConfig, UpstreamConfig,
    setup_logging,
};
use menushot::constants::{DEFAULT_AI_FALLBACK_PROMPT, DEFAULT_AI_SYSTEM_PROMPT};
use menushot::error::PipelineError;
use menushot::pipeline::{Pipeline, StyleRequest};
use mockito::{Matcher, ServerGuard};
use serde_json::json;
use url::Url;

const SUBJECT: Rgba<u8> = Rgba([180, 40, 30, 255]);
const SCENE: Rgba<u8> = Rgba([250, 250, 250, 255]);

fn upstream(server: &ServerGuard) -> UpstreamConfig {
    let base = Url::parse(&server.url()).unwrap();
    UpstreamConfig {
        text: TextGenerationConfig {
            api_key: Some(Secret::new("sk-test")),
            base_url: base.clone(),
            model: "deepseek-chat".to_string(),
            system_prompt: DEFAULT_AI_SYSTEM_PROMPT.to_string(),
            fallback_prompt: DEFAULT_AI_FALLBACK_PROMPT.to_string(),
            timeout: Duration::from_secs(5),
        },
        generation: ImageGenerationConfig {
            api_token: Some(Secret::new("r8-test")),
            base_url: base.clone(),
            model: "google/nano-banana".to_string(),
            timeout: Duration::from_secs(5),
        },
        fetch_timeout: Duration::from_secs(5),
        segmentation: SegmentationConfig {
            base_url: base,
            model: "u2net".to_string(),
            timeout: Duration::from_secs(5),
        },
    }
}

fn png(image: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn in_subject(x: u32, y: u32) -> bool {
    (4..12).contains(&x) && (4..12).contains(&y)
}

/// A 16x16 "photo": subject square in the middle of a light scene.
fn generated_photo() -> RgbaImage {
    RgbaImage::from_fn(16, 16, |x, y| if in_subject(x, y) { SUBJECT } else { SCENE })
}

/// What the segmentation service sends back for [`generated_photo`].
fn cutout() -> RgbaImage {
    RgbaImage::from_fn(16, 16, |x, y| {
        if in_subject(x, y) {
            SUBJECT
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

async fn mock_prompt(server: &mut ServerGuard, subject: &str) -> mockito::Mock {
    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex(format!("Describe: {subject}")))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"choices": [{"message": {"content": format!("{subject}, top-down, studio light")}}]})
                .to_string(),
        )
        .create_async()
        .await
}

async fn mock_generation(server: &mut ServerGuard) -> mockito::Mock {
    let output = format!("{}/files/out.png", server.url());
    server
        .mock("POST", "/v1/models/google/nano-banana/predictions")
        .with_status(201)
        .with_body(json!({"id": "abc", "status": "succeeded", "output": [output]}).to_string())
        .create_async()
        .await
}

async fn mock_download(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("GET", "/files/out.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(png(&generated_photo()))
        .create_async()
        .await
}

async fn mock_segmentation(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/api/remove")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(png(&cutout()))
        .expect(1)
        .create_async()
        .await
}

fn decode(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes).unwrap().to_rgba8()
}

#[tokio::test]
async fn solid_color_request_puts_subject_on_green() {
    let _ = setup_logging(true);
    let mut server = mockito::Server::new_async().await;
    let prompt = mock_prompt(&mut server, "Caesar Salad").await;
    let _generation = mock_generation(&mut server).await;
    let _download = mock_download(&mut server).await;
    let segmentation = mock_segmentation(&mut server).await;

    let pipeline = Pipeline::new(&upstream(&server)).unwrap();
    let request = StyleRequest::new("Caesar Salad", Some("#00FF00")).unwrap();
    let output = pipeline.run(&request).await.unwrap();

    assert_eq!(output.content_type, "image/webp");
    let image = decode(&output.bytes);
    assert_eq!(image.dimensions(), (16, 16));
    for (x, y) in [(0, 0), (15, 0), (0, 15), (15, 15)] {
        assert_eq!(image.get_pixel(x, y), &Rgba([0, 255, 0, 255]));
    }
    assert_eq!(image.get_pixel(8, 8), &SUBJECT);
    assert!(image.pixels().all(|pixel| pixel.0[3] == 255));
    prompt.assert_async().await;
    segmentation.assert_async().await;
}

#[tokio::test]
async fn transparent_request_keeps_alpha() {
    let mut server = mockito::Server::new_async().await;
    let _prompt = mock_prompt(&mut server, "Tiramisu").await;
    let _generation = mock_generation(&mut server).await;
    let _download = mock_download(&mut server).await;
    let segmentation = mock_segmentation(&mut server).await;

    let pipeline = Pipeline::new(&upstream(&server)).unwrap();
    let request = StyleRequest::new("Tiramisu", None).unwrap();
    let image = decode(&pipeline.run(&request).await.unwrap().bytes);

    assert_eq!(image.get_pixel(0, 0).0[3], 0);
    assert_eq!(image.get_pixel(8, 8), &SUBJECT);
    segmentation.assert_async().await;
}

#[tokio::test]
async fn solid_style_skips_background_removal() {
    let mut server = mockito::Server::new_async().await;
    let _prompt = mock_prompt(&mut server, "Ramen").await;
    let _generation = mock_generation(&mut server).await;
    let _download = mock_download(&mut server).await;
    let segmentation = server
        .mock("POST", "/api/remove")
        .expect(0)
        .create_async()
        .await;

    let pipeline = Pipeline::new(&upstream(&server)).unwrap();
    let request = StyleRequest::new("Ramen", Some("solid")).unwrap();
    let image = decode(&pipeline.run(&request).await.unwrap().bytes);

    assert_eq!(image.get_pixel(0, 0), &SCENE);
    segmentation.assert_async().await;
}

#[tokio::test]
async fn generation_error_stops_the_pipeline() {
    let mut server = mockito::Server::new_async().await;
    let prompt = mock_prompt(&mut server, "Pho").await;
    let _generation = server
        .mock("POST", "/v1/models/google/nano-banana/predictions")
        .with_status(422)
        .with_body(r#"{"detail":"invalid input"}"#)
        .create_async()
        .await;
    let download = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let segmentation = server
        .mock("POST", "/api/remove")
        .expect(0)
        .create_async()
        .await;

    let pipeline = Pipeline::new(&upstream(&server)).unwrap();
    let request = StyleRequest::new("Pho", Some("#00FF00")).unwrap();
    match pipeline.run(&request).await {
        Err(PipelineError::Generation(msg)) => assert!(msg.contains("invalid input"), "{msg}"),
        other => panic!("expected a generation error, got {other:?}"),
    }
    prompt.assert_async().await;
    download.assert_async().await;
    segmentation.assert_async().await;
}

#[tokio::test]
async fn slow_download_is_a_timeout() {
    let mut server = mockito::Server::new_async().await;
    let _prompt = mock_prompt(&mut server, "Curry").await;
    let _generation = mock_generation(&mut server).await;
    let _download = server
        .mock("GET", "/files/out.png")
        .with_chunked_body(|writer| {
            std::thread::sleep(Duration::from_millis(1500));
            writer.write_all(b"late")
        })
        .create_async()
        .await;

    let mut config = upstream(&server);
    config.fetch_timeout = Duration::from_millis(300);
    let pipeline = Pipeline::new(&config).unwrap();
    let request = StyleRequest::new("Curry", Some("image")).unwrap();
    assert!(matches!(
        pipeline.run(&request).await,
        Err(PipelineError::Timeout(menushot::error::Stage::ImageFetch))
    ));
}

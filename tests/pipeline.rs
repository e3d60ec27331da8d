//! End-to-end orchestrator tests against a scripted runtime and a local
//! HTTP artifact server.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::Duration;

use image::DynamicImage;

use edgevision::artifact::{ArtifactCache, ArtifactFetcher, FetchConfig};
use edgevision::core::RawOutput;
use edgevision::domain::{
    ArchitectureFamily, InputShape, ModelDescriptor, PostprocessingConfig,
};
use edgevision::pipeline::{
    CancellationToken, LiveEvent, ModelEvent, Pipeline, PipelineState,
};
use edgevision::prelude::VisionError;
use edgevision::runtime::testing::StubRuntime;

/// Serves one HTTP response per accepted connection, then exits.
fn spawn_artifact_server(body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind artifact server");
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut discard = [0u8; 1024];
            let _ = stream.read(&mut discard);
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
        }
    });
    format!("http://{addr}/model.onnx")
}

fn quick_fetcher() -> ArtifactFetcher {
    ArtifactFetcher::new(
        FetchConfig::new()
            .with_max_attempts(2)
            .with_initial_backoff(Duration::from_millis(1))
            .with_attempt_timeout(Duration::from_secs(5)),
    )
}

fn detector_descriptor(source_url: &str) -> ModelDescriptor {
    ModelDescriptor::new(
        "dense-detector",
        "2.0.0",
        source_url,
        ArchitectureFamily::DenseGrid,
        InputShape::new(16, 16, 3),
    )
    .with_labels(vec!["object".to_string()])
    .with_postprocessing(PostprocessingConfig {
        confidence_threshold: 0.5,
        iou_threshold: 0.45,
        max_detections: 10,
    })
}

/// A [1, 5, 2] dense-grid tensor: one full-frame candidate at 0.9 and one
/// below-threshold candidate at 0.2.
fn dense_grid_outputs() -> Vec<RawOutput> {
    #[rustfmt::skip]
    let data = vec![
        8.0, 8.0,   // xc
        8.0, 8.0,   // yc
        16.0, 16.0, // w
        16.0, 16.0, // h
        0.9, 0.2,   // class scores
    ];
    vec![RawOutput::new("preds", vec![1, 5, 2], data)]
}

#[test]
fn fetch_cache_load_infer_end_to_end() {
    let graph = b"serialized-graph-bytes".to_vec();
    let url = spawn_artifact_server(graph.clone());
    let descriptor = detector_descriptor(&url);

    let cache = ArtifactCache::open_in_memory(1024 * 1024).unwrap();
    let runtime = StubRuntime::cpu_only().with_outputs(dense_grid_outputs());
    let mut pipeline = Pipeline::new(runtime, cache).with_fetcher(quick_fetcher());

    let mut events = Vec::new();
    pipeline
        .ensure_model(&descriptor, |e| events.push(e))
        .expect("model becomes ready");
    assert_eq!(pipeline.state(), PipelineState::Ready);

    // The download reported progress and finished at 100%.
    let final_progress = events
        .iter()
        .filter_map(|e| match e {
            ModelEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .last()
        .expect("progress events were emitted");
    assert_eq!(final_progress.percentage, Some(100));
    assert_eq!(final_progress.loaded, graph.len() as u64);

    // Inference on a 64x48 original: the full-frame candidate decodes to
    // the full original frame, the 0.2 candidate is thresholded away.
    let result = pipeline
        .run_on_image(&DynamicImage::new_rgb8(64, 48))
        .unwrap();
    assert_eq!(result.predictions.len(), 1);
    let prediction = &result.predictions[0];
    assert_eq!(prediction.class_name, "object");
    let bbox = prediction.bounding_box.unwrap();
    assert!(bbox.x.abs() < 1e-3);
    assert!(bbox.y.abs() < 1e-3);
    assert!((bbox.x_max() - 64.0).abs() < 1e-2);
    assert!((bbox.y_max() - 48.0).abs() < 1e-2);
    assert!(result.elapsed_ms >= 0.0);
}

#[test]
fn second_ensure_model_is_served_from_cache() {
    let graph = b"cached-graph".to_vec();
    let url = spawn_artifact_server(graph);
    let descriptor = detector_descriptor(&url);

    let cache = ArtifactCache::open_in_memory(1024 * 1024).unwrap();
    let runtime = StubRuntime::cpu_only().with_outputs(dense_grid_outputs());
    let mut pipeline = Pipeline::new(runtime, cache).with_fetcher(quick_fetcher());

    pipeline.ensure_model(&descriptor, |_| {}).unwrap();

    // The server accepted exactly one connection; a second ensure_model
    // must not need it.
    let mut events = Vec::new();
    pipeline
        .ensure_model(&descriptor, |e| events.push(e))
        .expect("cache hit path");
    assert!(matches!(events[0], ModelEvent::CacheHit));
}

#[test]
fn live_loop_survives_per_frame_errors_and_honors_cancellation() {
    let cache = ArtifactCache::open_in_memory(1024 * 1024).unwrap();
    cache.put("dense-detector", b"graph", "2.0.0").unwrap();

    // Frame 1 fails inside the executor; everything else succeeds.
    let runtime = StubRuntime::cpu_only()
        .with_outputs(dense_grid_outputs())
        .failing_runs(&[1]);
    let descriptor = detector_descriptor("http://127.0.0.1:9/unused.onnx");
    let mut pipeline = Pipeline::new(runtime, cache).with_fetcher(quick_fetcher());
    pipeline.ensure_model(&descriptor, |_| {}).unwrap();

    let mut remaining = 100u32;
    let mut source = move || -> edgevision::core::VisionResult<Option<DynamicImage>> {
        if remaining == 0 {
            Ok(None)
        } else {
            remaining -= 1;
            Ok(Some(DynamicImage::new_rgb8(32, 32)))
        }
    };

    let token = CancellationToken::new();
    let loop_token = token.clone();
    let mut results = 0u32;
    let mut frame_errors = Vec::new();
    pipeline
        .run_live(
            &mut source,
            |event| match event {
                LiveEvent::Result(_) => {
                    results += 1;
                    // Cancel after the third successful frame; the loop
                    // must stop without draining the 100-frame source.
                    if results == 3 {
                        loop_token.cancel();
                    }
                }
                LiveEvent::FrameError {
                    frame_index,
                    occurrences,
                    ..
                } => frame_errors.push((frame_index, occurrences)),
            },
            &token,
        )
        .expect("loop ends cleanly on cancellation");

    assert_eq!(results, 3);
    assert_eq!(frame_errors, vec![(1, 1)]);
}

#[test]
fn live_loop_ends_when_source_is_exhausted() {
    let cache = ArtifactCache::open_in_memory(1024 * 1024).unwrap();
    cache.put("dense-detector", b"graph", "2.0.0").unwrap();
    let runtime = StubRuntime::cpu_only().with_outputs(dense_grid_outputs());
    let descriptor = detector_descriptor("http://127.0.0.1:9/unused.onnx");
    let mut pipeline = Pipeline::new(runtime, cache).with_fetcher(quick_fetcher());
    pipeline.ensure_model(&descriptor, |_| {}).unwrap();

    let mut frames = vec![
        DynamicImage::new_rgb8(8, 8),
        DynamicImage::new_rgb8(8, 8),
    ];
    let mut source =
        move || -> edgevision::core::VisionResult<Option<DynamicImage>> { Ok(frames.pop()) };

    let mut results = 0;
    pipeline
        .run_live(
            &mut source,
            |event| {
                if matches!(event, LiveEvent::Result(_)) {
                    results += 1;
                }
            },
            &CancellationToken::new(),
        )
        .unwrap();
    assert_eq!(results, 2);
}

#[test]
fn decode_shape_mismatch_is_fatal_not_per_frame() {
    let cache = ArtifactCache::open_in_memory(1024 * 1024).unwrap();
    cache.put("dense-detector", b"graph", "2.0.0").unwrap();
    // Output shape that no dense-grid model with one class can have.
    let runtime = StubRuntime::cpu_only()
        .with_outputs(vec![RawOutput::new("preds", vec![1, 7, 3], vec![0.0; 21])]);
    let descriptor = detector_descriptor("http://127.0.0.1:9/unused.onnx");
    let mut pipeline = Pipeline::new(runtime, cache).with_fetcher(quick_fetcher());
    pipeline.ensure_model(&descriptor, |_| {}).unwrap();

    let mut source =
        || -> edgevision::core::VisionResult<Option<DynamicImage>> { Ok(Some(DynamicImage::new_rgb8(8, 8))) };
    let err = pipeline
        .run_live(&mut source, |_| {}, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, VisionError::UnsupportedArchitecture { .. }));
}

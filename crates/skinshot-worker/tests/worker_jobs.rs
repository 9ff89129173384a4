use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{Rgba, RgbaImage};
use skinshot_engine::RenderError;
use skinshot_engine::skin::{BodyModel, decode_skin, normalize};
use skinshot_proto::{ErrorKind, Outcome, Profile, RenderJob, RenderMode, ResponseFrame};
use skinshot_worker::{
    DefaultSkinResolver, Delivery, LocalTransport, NoSkinResolver, RenderWorker, SkinResolver,
    Transport, WorkerConfig, WorkerPool,
};
use uuid::Uuid;

fn skin_png() -> Vec<u8> {
    let img = RgbaImage::from_fn(64, 64, |x, y| Rgba([x as u8 * 4, y as u8 * 4, 90, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn delivery(tag: u64, body: Vec<u8>) -> Delivery {
    Delivery {
        body,
        reply_to: "replies".to_string(),
        correlation_id: Some(format!("corr-{tag}")),
        delivery_tag: tag,
    }
}

fn config(name: &str) -> WorkerConfig {
    WorkerConfig { name: name.to_string(), ..Default::default() }
}

fn face_job() -> Vec<u8> {
    RenderJob::new(RenderMode::Face, 48, 48, 2, skin_png()).encode().unwrap()
}

fn bad_mode_job() -> Vec<u8> {
    let mut frame = RenderJob::new(RenderMode::Face, 8, 8, 1, skin_png())
        .encode_frame()
        .unwrap();
    frame[0] = 9;
    let mut z = ZlibEncoder::new(Vec::new(), Compression::default());
    z.write_all(&frame).unwrap();
    z.finish().unwrap()
}

fn run_one_worker(jobs: Vec<Delivery>) -> Arc<LocalTransport> {
    let transport = Arc::new(LocalTransport::new());
    let worker =
        RenderWorker::spawn(0, config("w-test"), transport.clone(), Arc::new(NoSkinResolver))
            .unwrap();
    for job in jobs {
        worker.process(job).unwrap();
    }
    worker.shutdown();
    transport
}

#[test]
fn failed_job_does_not_stop_the_worker() {
    let transport = run_one_worker(vec![delivery(1, bad_mode_job()), delivery(2, face_job())]);

    let published = transport.published();
    assert_eq!(published.len(), 2);
    assert_eq!(transport.acked(), vec![1, 2]);

    let first = ResponseFrame::decode(&published[0].body).unwrap();
    assert_eq!(first.worker, "w-test");
    assert_eq!(first.outcome, Outcome::Failure);
    let err = first.error().unwrap();
    assert_eq!(err.kind, ErrorKind::UnsupportedMode);
    assert_eq!(err.detail.get("ordinal").map(String::as_str), Some("9"));

    let second = ResponseFrame::decode(&published[1].body).unwrap();
    assert_eq!(second.outcome, Outcome::Success);
}

#[test]
fn face_job_yields_png_of_requested_size() {
    let transport = run_one_worker(vec![delivery(5, face_job())]);
    let frame = ResponseFrame::decode(&transport.published()[0].body).unwrap();
    assert_eq!(frame.outcome, Outcome::Success);
    let img = image::load_from_memory(&frame.payload).unwrap();
    assert_eq!((img.width(), img.height()), (24, 24));
}

#[test]
fn skin_job_returns_normalized_texture() {
    let job = RenderJob::new(RenderMode::Skin, 64, 64, 1, skin_png()).encode().unwrap();
    let transport = run_one_worker(vec![delivery(1, job)]);
    let frame = ResponseFrame::decode(&transport.published()[0].body).unwrap();

    let got = image::load_from_memory(&frame.payload).unwrap().to_rgba8();
    let expected = normalize(image::load_from_memory(&skin_png()).unwrap().to_rgba8()).unwrap();
    assert_eq!(got, expected);
}

#[test]
fn reply_goes_to_reply_queue_with_correlation_id() {
    let transport = run_one_worker(vec![delivery(3, face_job())]);
    let published = &transport.published()[0];
    assert_eq!(published.reply_to, "replies");
    assert_eq!(published.correlation_id.as_deref(), Some("corr-3"));
}

#[test]
fn missing_skin_is_reported_as_decode_error() {
    let job = RenderJob::new(RenderMode::Face, 16, 16, 1, Vec::new()).encode().unwrap();
    let transport = run_one_worker(vec![delivery(1, job)]);
    let frame = ResponseFrame::decode(&transport.published()[0].body).unwrap();
    assert_eq!(frame.error().unwrap().kind, ErrorKind::DecodeError);
    assert_eq!(transport.acked(), vec![1]);
}

#[test]
fn pool_answers_every_job_once() {
    let transport = Arc::new(LocalTransport::new());
    let pool = WorkerPool::new(3, config("pool"), transport.clone(), Arc::new(NoSkinResolver))
        .unwrap();
    assert_eq!(pool.len(), 3);

    for tag in 1..=9 {
        pool.process(delivery(tag, face_job())).unwrap();
    }
    pool.shutdown();

    let acked: BTreeSet<u64> = transport.acked().into_iter().collect();
    assert_eq!(acked, (1..=9).collect());
    let ids: BTreeSet<String> = transport
        .published()
        .into_iter()
        .filter_map(|p| p.correlation_id)
        .collect();
    assert_eq!(ids.len(), 9);
}

#[test]
fn zero_sized_pool_still_gets_one_worker() {
    let pool = WorkerPool::new(
        0,
        config("pool"),
        Arc::new(LocalTransport::new()),
        Arc::new(NoSkinResolver),
    )
    .unwrap();
    assert_eq!(pool.len(), 1);
    assert!(!pool.is_empty());
}

/// Fails the first `failures` publishes, then records like `LocalTransport`.
struct FlakyTransport {
    failures: AtomicUsize,
    inner: LocalTransport,
}

impl Transport for FlakyTransport {
    fn publish(&self, reply_to: &str, correlation_id: Option<&str>, body: Vec<u8>) -> anyhow::Result<()> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            anyhow::bail!("broker connection reset");
        }
        self.inner.publish(reply_to, correlation_id, body)
    }

    fn ack(&self, delivery_tag: u64) -> anyhow::Result<()> {
        self.inner.ack(delivery_tag)
    }
}

#[test]
fn failed_publish_leaves_job_unacked_and_worker_running() {
    let transport = Arc::new(FlakyTransport { failures: AtomicUsize::new(1), inner: LocalTransport::new() });
    let worker =
        RenderWorker::spawn(0, config("flaky"), transport.clone(), Arc::new(NoSkinResolver)).unwrap();
    worker.process(delivery(1, face_job())).unwrap();
    worker.process(delivery(2, face_job())).unwrap();
    worker.shutdown();

    assert_eq!(transport.inner.acked(), vec![2]);
    let published = transport.inner.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].correlation_id.as_deref(), Some("corr-2"));
    let frame = ResponseFrame::decode(&published[0].body).unwrap();
    assert_eq!(frame.outcome, Outcome::Success);
}

/// Panics on its first call, then serves a valid skin.
struct PanicOnceResolver {
    calls: AtomicUsize,
}

impl SkinResolver for PanicOnceResolver {
    fn resolve(&self, _profile: &Profile, _model: BodyModel) -> Result<Vec<u8>, RenderError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("skin store exploded");
        }
        Ok(skin_png())
    }
}

#[test]
fn panicking_job_is_reported_and_next_job_renders() {
    let skinless = || RenderJob::new(RenderMode::Face, 16, 16, 1, Vec::new()).encode().unwrap();
    let transport = Arc::new(LocalTransport::new());
    let resolver = Arc::new(PanicOnceResolver { calls: AtomicUsize::new(0) });
    let worker = RenderWorker::spawn(0, config("panicky"), transport.clone(), resolver).unwrap();
    worker.process(delivery(1, skinless())).unwrap();
    worker.process(delivery(2, skinless())).unwrap();
    worker.shutdown();

    assert_eq!(transport.acked(), vec![1, 2]);
    let published = transport.published();

    let first = ResponseFrame::decode(&published[0].body).unwrap();
    let err = first.error().unwrap();
    assert_eq!(err.kind, ErrorKind::RenderFault);
    assert!(err.message.contains("skin store exploded"), "{}", err.message);

    let second = ResponseFrame::decode(&published[1].body).unwrap();
    assert_eq!(second.outcome, Outcome::Success);
}

fn solid_png(colour: [u8; 4]) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbaImage::from_pixel(64, 64, Rgba(colour))
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[test]
fn skinless_jobs_get_the_default_skin_for_their_model() {
    let standard = solid_png([10, 20, 30, 255]);
    let slim = solid_png([200, 100, 50, 255]);
    let resolver = Arc::new(DefaultSkinResolver::new(standard.clone(), slim.clone()));

    // no model override: the id decides, even-hash ids are standard
    let job = |id: Uuid| {
        RenderJob::new(RenderMode::Skin, 64, 64, 1, Vec::new())
            .with_profile(Profile::new(id, "Steve"))
            .encode()
            .unwrap()
    };
    let transport = Arc::new(LocalTransport::new());
    let worker = RenderWorker::spawn(0, config("defaults"), transport.clone(), resolver).unwrap();
    worker.process(delivery(1, job(Uuid::from_u64_pair(0, 0)))).unwrap();
    worker.process(delivery(2, job(Uuid::from_u64_pair(0, 1)))).unwrap();
    worker.shutdown();

    let rendered: Vec<_> = transport
        .published()
        .iter()
        .map(|p| {
            let frame = ResponseFrame::decode(&p.body).unwrap();
            image::load_from_memory(&frame.payload).unwrap().to_rgba8()
        })
        .collect();
    assert_eq!(rendered[0], normalize(decode_skin(&standard).unwrap()).unwrap());
    assert_eq!(rendered[1], normalize(decode_skin(&slim).unwrap()).unwrap());
}

#[test]
fn unencodable_worker_name_is_rejected_at_spawn() {
    let name = "w".repeat(usize::from(u16::MAX) + 1);
    let spawned = RenderWorker::spawn(
        0,
        config(&name),
        Arc::new(LocalTransport::new()),
        Arc::new(NoSkinResolver),
    );
    assert!(spawned.is_err());
}

use droplet::core::config::DropletConfig;
use droplet::core::error::DropletError;
use droplet::core::store::Store;
use droplet::plugins::camera::ImageAcquirer;
use droplet::plugins::capture::CaptureOrchestrator;
use droplet::plugins::selector::ActiveExperiment;
use droplet::plugins::sensor::{FixedSensor, SensorReader, SensorReading};
use droplet::plugins::{data_entry, experiment};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

fn setup() -> (TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::open(tmp.path().join("data"), tmp.path().join("images")).unwrap();
    (tmp, store)
}

/// Writes `<prefix>_<n>.jpg` into the image directory, counting calls and
/// tracking how many acquisitions overlap.
struct StubCamera {
    image_dir: PathBuf,
    fixed_name: Option<String>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    delay: Duration,
}

impl StubCamera {
    fn new(image_dir: PathBuf) -> Self {
        Self {
            image_dir,
            fixed_name: None,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }
}

impl ImageAcquirer for StubCamera {
    fn acquire(&self, name_prefix: &str) -> Result<String, DropletError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let name = self
            .fixed_name
            .clone()
            .unwrap_or_else(|| format!("{}_{}.jpg", name_prefix, n));
        fs::write(self.image_dir.join(&name), b"jpeg").unwrap();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(name)
    }
}

struct FailingCamera;

impl ImageAcquirer for FailingCamera {
    fn acquire(&self, _name_prefix: &str) -> Result<String, DropletError> {
        Err(DropletError::CameraError("camera unplugged".to_string()))
    }
}

struct FailingSensor;

impl SensorReader for FailingSensor {
    fn read(&self) -> Result<SensorReading, DropletError> {
        Err(DropletError::SensorError("i2c bus error".to_string()))
    }
}

fn image_count(store: &Store) -> usize {
    fs::read_dir(&store.image_dir).unwrap().count()
}

#[test]
fn test_capture_without_selection_has_no_side_effects() {
    let (_tmp, store) = setup();
    let exp = experiment::create(&store, "Trial A", None).unwrap();
    let camera = StubCamera::new(store.image_dir.clone());
    let calls = camera.calls.clone();
    let orchestrator = CaptureOrchestrator::new(
        Box::new(FixedSensor::new(25.0, 50.0)),
        Box::new(camera),
        "droplet",
    );

    let err = orchestrator.capture(&store, &ActiveExperiment::new()).unwrap_err();
    assert!(matches!(err, DropletError::PreconditionFailed(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(image_count(&store), 0);
    assert!(data_entry::list_by_experiment(&store, exp.id).unwrap().is_empty());
}

#[test]
fn test_capture_records_entry_under_active_experiment() {
    let (_tmp, store) = setup();
    let exp = experiment::create(&store, "Trial A", None).unwrap();
    let active = ActiveExperiment::new();
    active.select(exp.id).unwrap();
    let orchestrator = CaptureOrchestrator::new(
        Box::new(FixedSensor::new(25.0, 50.0)),
        Box::new(StubCamera::new(store.image_dir.clone())),
        "droplet",
    );

    let entry = orchestrator.capture(&store, &active).unwrap();
    assert_eq!(entry.experiment_id, exp.id);
    assert_eq!(entry.temperature, 25.0);
    assert_eq!(entry.humidity, 50.0);
    assert_eq!(entry.image_filename, "droplet_0.jpg");
    assert!(store.image_dir.join("droplet_0.jpg").exists());
    assert_eq!(experiment::get(&store, exp.id).unwrap().data_entries, vec![entry]);
}

#[test]
fn test_sensor_failure_aborts_before_acquisition() {
    let (_tmp, store) = setup();
    let exp = experiment::create(&store, "Trial A", None).unwrap();
    let active = ActiveExperiment::new();
    active.select(exp.id).unwrap();
    let camera = StubCamera::new(store.image_dir.clone());
    let calls = camera.calls.clone();
    let orchestrator = CaptureOrchestrator::new(Box::new(FailingSensor), Box::new(camera), "droplet");

    let err = orchestrator.capture(&store, &active).unwrap_err();
    assert!(matches!(err, DropletError::SensorError(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(data_entry::list_by_experiment(&store, exp.id).unwrap().is_empty());
}

#[test]
fn test_camera_failure_creates_no_entry() {
    let (_tmp, store) = setup();
    let exp = experiment::create(&store, "Trial A", None).unwrap();
    let active = ActiveExperiment::new();
    active.select(exp.id).unwrap();
    let orchestrator = CaptureOrchestrator::new(
        Box::new(FixedSensor::new(25.0, 50.0)),
        Box::new(FailingCamera),
        "droplet",
    );

    let err = orchestrator.capture(&store, &active).unwrap_err();
    assert_eq!(err.kind().as_str(), "camera_error");
    assert!(data_entry::list_by_experiment(&store, exp.id).unwrap().is_empty());
}

#[test]
fn test_filename_collision_leaves_orphan_image() {
    let (_tmp, store) = setup();
    let exp = experiment::create(&store, "Trial A", None).unwrap();
    let active = ActiveExperiment::new();
    active.select(exp.id).unwrap();
    let mut camera = StubCamera::new(store.image_dir.clone());
    camera.fixed_name = Some("droplet_20240404T133433.jpg".to_string());
    let orchestrator = CaptureOrchestrator::new(
        Box::new(FixedSensor::new(25.0, 50.0)),
        Box::new(camera),
        "droplet",
    );

    let first = orchestrator.capture(&store, &active).unwrap();
    let err = orchestrator.capture(&store, &active).unwrap_err();
    assert!(matches!(err, DropletError::Conflict(_)));

    let entries = data_entry::list_by_experiment(&store, exp.id).unwrap();
    assert_eq!(entries, vec![first]);
    assert!(store.image_dir.join("droplet_20240404T133433.jpg").exists());
}

#[test]
fn test_stale_selection_surfaces_as_not_found() {
    let (_tmp, store) = setup();
    let active = ActiveExperiment::new();
    active.select(77).unwrap();
    let orchestrator = CaptureOrchestrator::new(
        Box::new(FixedSensor::new(25.0, 50.0)),
        Box::new(StubCamera::new(store.image_dir.clone())),
        "droplet",
    );

    let err = orchestrator.capture(&store, &active).unwrap_err();
    assert!(matches!(err, DropletError::NotFound(_)));
    // The acquired image stays behind as an orphan.
    assert_eq!(image_count(&store), 1);
}

#[test]
fn test_concurrent_captures_are_serialized() {
    let (_tmp, store) = setup();
    let exp = experiment::create(&store, "Trial A", None).unwrap();
    let active = ActiveExperiment::new();
    active.select(exp.id).unwrap();
    let mut camera = StubCamera::new(store.image_dir.clone());
    camera.delay = Duration::from_millis(20);
    let max_in_flight = camera.max_in_flight.clone();
    let orchestrator = CaptureOrchestrator::new(
        Box::new(FixedSensor::new(25.0, 50.0)),
        Box::new(camera),
        "droplet",
    );

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| orchestrator.capture(&store, &active).unwrap());
        }
    });

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(data_entry::list_by_experiment(&store, exp.id).unwrap().len(), 4);
}

fn unreachable_hardware_config(store: &Store, mock_mode: bool) -> DropletConfig {
    let mut config = DropletConfig::default();
    config.data_dir = store.root.clone();
    config.image_dir = Some(store.image_dir.clone());
    config.mock_mode = mock_mode;
    config.camera.program = "droplet-test-no-such-camera".to_string();
    config.sensor.program = "droplet-test-no-such-i2c-tool".to_string();
    config.mock.template_image = "template.jpg".to_string();
    config
}

#[test]
fn test_hardware_errors_are_fatal_without_mock_mode() {
    let (_tmp, store) = setup();
    fs::write(store.image_dir.join("template.jpg"), b"template-bytes").unwrap();
    let exp = experiment::create(&store, "Trial A", None).unwrap();
    let active = ActiveExperiment::new();
    active.select(exp.id).unwrap();

    let config = unreachable_hardware_config(&store, false);
    let orchestrator = CaptureOrchestrator::from_config(&config, &store.image_dir);

    let err = orchestrator.capture(&store, &active).unwrap_err();
    assert_eq!(err.kind().as_str(), "sensor_error");
    assert!(data_entry::list_by_experiment(&store, exp.id).unwrap().is_empty());
    assert_eq!(image_count(&store), 1);
}

#[test]
fn test_mock_mode_falls_back_to_fixed_reading_and_template_image() {
    let (_tmp, store) = setup();
    fs::write(store.image_dir.join("template.jpg"), b"template-bytes").unwrap();
    let exp = experiment::create(&store, "Trial A", None).unwrap();
    let active = ActiveExperiment::new();
    active.select(exp.id).unwrap();

    let config = unreachable_hardware_config(&store, true);
    let orchestrator = CaptureOrchestrator::from_config(&config, &store.image_dir);

    let entry = orchestrator.capture(&store, &active).unwrap();
    assert_eq!(entry.experiment_id, exp.id);
    assert_eq!(entry.temperature, 25.0);
    assert_eq!(entry.humidity, 50.0);
    assert!(entry.image_filename.starts_with("droplet_"));
    assert!(entry.image_filename.ends_with(".jpg"));
    assert_eq!(
        fs::read(store.image_dir.join(&entry.image_filename)).unwrap(),
        b"template-bytes"
    );
    assert_eq!(data_entry::list_by_experiment(&store, exp.id).unwrap(), vec![entry]);
}

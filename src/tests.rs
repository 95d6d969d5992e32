//! Tests for the two-input compositor

use std::sync::Arc;

use crate::interactive::gpu_viewer::clamp_frame_size;
use crate::{
    AttributeLocation, CompositorConfig, DrawHook, FilterError, FilterState, GraphicsBackend, OverlayImage,
    PixelBuffer, PixelSource, ProgramId, Rotation, RotationConfig, ScaleController, SecondaryTexture, SharedFrame,
    TextureId, TwoInputFilter, UniformLocation, map, rotation_coords, scale_about_center,
};

const PROGRAM: ProgramId = ProgramId(7);
const COORD2: AttributeLocation = AttributeLocation(2);
const SAMPLER2: UniformLocation = UniformLocation(1);
const PRIMARY: TextureId = TextureId(100);

#[derive(Debug, Clone, PartialEq)]
enum Call {
    EnableAttribute(AttributeLocation),
    SetAttribute(AttributeLocation, Vec<f32>),
    SetUniform(UniformLocation, i32),
    Create(TextureId),
    Upload { unit: u32, texture: TextureId, width: u32, height: u32 },
    Bind(u32, Option<TextureId>),
    Delete(TextureId),
}

/// Records every call instead of talking to a GPU
#[derive(Debug, Default)]
struct RecordingBackend {
    calls: Vec<Call>,
    next_texture: u32,
    missing_attribute: bool,
    missing_uniform: bool,
}

impl RecordingBackend {
    fn new() -> Self {
        Self {
            next_texture: 1,
            ..Default::default()
        }
    }

    fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    fn uploads(&self) -> usize {
        self.count(|call| matches!(call, Call::Upload { .. }))
    }

    fn creates(&self) -> usize {
        self.count(|call| matches!(call, Call::Create(_)))
    }

    fn deletes(&self) -> Vec<TextureId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Delete(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn last_attribute_upload(&self) -> Option<Vec<f32>> {
        self.calls.iter().rev().find_map(|call| match call {
            Call::SetAttribute(_, data) => Some(data.clone()),
            _ => None,
        })
    }
}

impl GraphicsBackend for RecordingBackend {
    fn attribute_location(&self, _program: ProgramId, name: &str) -> Option<AttributeLocation> {
        (name == "inputTextureCoordinate2" && !self.missing_attribute).then_some(COORD2)
    }

    fn uniform_location(&self, _program: ProgramId, name: &str) -> Option<UniformLocation> {
        (name == "inputImageTexture2" && !self.missing_uniform).then_some(SAMPLER2)
    }

    fn enable_vertex_attribute(&mut self, location: AttributeLocation) {
        self.calls.push(Call::EnableAttribute(location));
    }

    fn set_vertex_attribute(&mut self, location: AttributeLocation, components: u32, data: &[f32]) {
        assert_eq!(components, 2);
        self.calls.push(Call::SetAttribute(location, data.to_vec()));
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        self.calls.push(Call::SetUniform(location, value));
    }

    fn create_texture(&mut self) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.calls.push(Call::Create(id));
        id
    }

    fn upload_texture(&mut self, unit: u32, texture: TextureId, width: u32, height: u32, rgba: &[u8]) {
        assert_eq!(rgba.len(), (width * height * 4) as usize);
        self.calls.push(Call::Upload {
            unit,
            texture,
            width,
            height,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        self.calls.push(Call::Bind(unit, texture));
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.calls.push(Call::Delete(texture));
    }
}

#[derive(Debug)]
struct TestSource {
    size: (u32, u32),
    pixels: Option<PixelBuffer>,
}

impl TestSource {
    fn ready(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            pixels: Some(vec![0xff00_ff00u32; (width * height) as usize].into()),
        }
    }
}

impl PixelSource for TestSource {
    fn image_size(&self) -> (u32, u32) {
        self.size
    }

    fn pixel_buffer(&self) -> Option<PixelBuffer> {
        self.pixels.clone()
    }
}

fn image(width: u32, height: u32) -> OverlayImage {
    OverlayImage::from_pixels(width, height, vec![0x8040_2010u32; (width * height) as usize]).unwrap()
}

fn ready_filter(backend: &mut RecordingBackend) -> TwoInputFilter {
    let mut filter = TwoInputFilter::default();
    filter.set_pixel_source(Some(Arc::new(TestSource::ready(4, 4))));
    filter.on_init(backend, PROGRAM).unwrap();
    filter
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-6, "expected {:?}, got {:?}", expected, actual);
    }
}

// ---------------------------------------------------------------------------
// Coordinate mapping
// ---------------------------------------------------------------------------

#[test]
fn test_rotation_table_golden_values() {
    let golden = [
        (Rotation::Normal, false, false, [0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0]),
        (Rotation::Normal, false, true, [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
        (Rotation::Normal, true, false, [1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]),
        (Rotation::Normal, true, true, [1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0]),
        (Rotation::Rotation90, false, false, [1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
        (Rotation::Rotation90, false, true, [1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0]),
        (Rotation::Rotation90, true, false, [0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0]),
        (Rotation::Rotation90, true, true, [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0]),
        (Rotation::Rotation180, false, false, [1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0]),
        (Rotation::Rotation180, false, true, [1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]),
        (Rotation::Rotation180, true, false, [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
        (Rotation::Rotation180, true, true, [0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0]),
        (Rotation::Rotation270, false, false, [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0]),
        (Rotation::Rotation270, false, true, [0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0]),
        (Rotation::Rotation270, true, false, [1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0]),
        (Rotation::Rotation270, true, true, [1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
    ];

    for (rotation, flip_h, flip_v, expected) in golden {
        let mapped = map(rotation, flip_h, flip_v, 1.0);
        assert_eq!(mapped.0, expected, "{:?} flip_h={} flip_v={}", rotation, flip_h, flip_v);
    }
}

#[test]
fn test_scale_interpolates_toward_centroid() {
    for rotation in [Rotation::Normal, Rotation::Rotation90, Rotation::Rotation180, Rotation::Rotation270] {
        let base = rotation_coords(rotation, true, false);
        let (cx, cy) = base.center();
        assert!((cx - 0.5).abs() < 1e-6 && (cy - 0.5).abs() < 1e-6);

        for scale in [0.1f32, 0.25, 0.5, 0.96] {
            let scaled = map(rotation, true, false, scale);
            let expected: Vec<f32> = base
                .0
                .chunks_exact(2)
                .flat_map(|p| [cx + (p[0] - cx) * scale, cy + (p[1] - cy) * scale])
                .collect();
            assert_close(scaled.as_slice(), &expected);
        }
    }
}

#[test]
fn test_scale_one_is_identity() {
    let base = rotation_coords(Rotation::Rotation270, false, true);
    assert_eq!(scale_about_center(base, 1.0), base);
}

#[test]
fn test_coords_bytes_are_native_order() {
    let coords = map(Rotation::Normal, false, false, 1.0);
    let bytes = coords.as_bytes();
    assert_eq!(bytes.len(), 32);
    assert_eq!(&bytes[4..8], &1.0f32.to_ne_bytes());
}

#[test]
fn test_rotation_from_degrees() {
    assert_eq!(Rotation::from_degrees(0), Some(Rotation::Normal));
    assert_eq!(Rotation::from_degrees(270), Some(Rotation::Rotation270));
    assert_eq!(Rotation::from_degrees(45), None);
    assert_eq!(Rotation::Rotation180.degrees(), 180);
}

// ---------------------------------------------------------------------------
// Scale controller
// ---------------------------------------------------------------------------

#[test]
fn test_scale_controller_refreshes_on_23rd_tick() {
    let mut controller = ScaleController::default();

    for tick in 1..=22 {
        let result = controller.tick();
        assert!(!result.refresh, "unexpected refresh at tick {}", tick);
        assert!(result.scale >= 0.1);
    }

    let result = controller.tick();
    assert!(result.refresh);
    assert_eq!(result.scale, 1.0);
    assert_eq!(controller.current(), 1.0);
}

#[test]
fn test_scale_controller_never_reports_below_floor() {
    let mut controller = ScaleController::new(0.07, 0.2);
    for _ in 0..200 {
        let result = controller.tick();
        assert!(result.scale >= 0.2 && result.scale <= 1.0);
    }
}

#[test]
fn test_scale_controller_reset_restarts_cycle() {
    let mut controller = ScaleController::default();
    for _ in 0..10 {
        controller.tick();
    }
    assert!(controller.current() < 1.0);

    controller.reset();
    assert_eq!(controller.current(), 1.0);

    // A full cycle follows the reset
    let refresh_at = (1..=30).find(|_| controller.tick().refresh);
    assert_eq!(refresh_at, Some(23));
}

#[test]
fn test_scale_controller_rejects_invalid_parameters() {
    let controller = ScaleController::new(-1.0, 2.0);
    assert_eq!(controller.step(), 0.04);
    assert_eq!(controller.floor(), 0.1);
}

// ---------------------------------------------------------------------------
// Secondary texture manager
// ---------------------------------------------------------------------------

#[test]
fn test_refresh_skips_unready_source() {
    let mut backend = RecordingBackend::new();
    let mut texture = SecondaryTexture::new(3);

    let zero = TestSource {
        size: (0, 0),
        pixels: Some(vec![0u32; 4].into()),
    };
    let no_buffer = TestSource {
        size: (2, 2),
        pixels: None,
    };
    let short = TestSource {
        size: (4, 4),
        pixels: Some(vec![0u32; 3].into()),
    };

    assert!(!texture.refresh(&mut backend, &zero));
    assert!(!texture.refresh(&mut backend, &no_buffer));
    assert!(!texture.refresh(&mut backend, &short));
    assert!(backend.calls.is_empty());
    assert!(!texture.is_allocated());
}

#[test]
fn test_refresh_allocates_once_and_reuses_handle() {
    let mut backend = RecordingBackend::new();
    let mut texture = SecondaryTexture::new(3);
    let source = TestSource::ready(8, 2);

    assert!(texture.refresh(&mut backend, &source));
    let first = texture.id().unwrap();
    assert!(texture.refresh(&mut backend, &source));

    assert_eq!(texture.id(), Some(first));
    assert_eq!(backend.creates(), 1);
    assert_eq!(
        backend.calls.last(),
        Some(&Call::Upload {
            unit: 3,
            texture: first,
            width: 8,
            height: 2
        })
    );

    texture.release(&mut backend);
}

#[test]
fn test_ensure_allocated_is_idempotent() {
    let mut backend = RecordingBackend::new();
    let mut texture = SecondaryTexture::new(3);
    let a = texture.ensure_allocated(&mut backend);
    let b = texture.ensure_allocated(&mut backend);
    assert_eq!(a, b);
    assert_eq!(backend.creates(), 1);
    texture.release(&mut backend);
}

#[test]
fn test_release_deletes_exactly_once() {
    let mut backend = RecordingBackend::new();
    let mut texture = SecondaryTexture::new(3);
    let id = texture.ensure_allocated(&mut backend);

    texture.release(&mut backend);
    texture.release(&mut backend);

    assert_eq!(backend.deletes(), vec![id]);
    assert_eq!(texture.id(), None);
}

#[test]
fn test_upload_image_refuses_disposed_image() {
    let mut backend = RecordingBackend::new();
    let mut texture = SecondaryTexture::new(3);
    let img = image(2, 2);
    img.dispose();

    assert!(!texture.upload_image(&mut backend, &img));
    assert!(backend.calls.is_empty());
}

// ---------------------------------------------------------------------------
// Sources and images
// ---------------------------------------------------------------------------

#[test]
fn test_overlay_image_rejects_mismatched_buffer() {
    assert!(OverlayImage::from_pixels(3, 3, vec![0u32; 8]).is_none());
}

#[test]
fn test_overlay_dispose_visible_through_clones() {
    let img = image(2, 2);
    let clone = img.clone();
    img.dispose();
    assert!(clone.is_disposed());
    assert!(clone.pixels().is_none());
    assert!(clone.same_image(&img));
}

#[test]
fn test_shared_frame_clear_reports_not_ready() {
    let frame = SharedFrame::new();
    assert_eq!(frame.image_size(), (0, 0));

    frame.publish(2, 1, vec![1u32, 2].into());
    assert_eq!(frame.image_size(), (2, 1));
    assert_eq!(frame.pixel_buffer().unwrap().len(), 2);

    frame.clear();
    assert_eq!(frame.image_size(), (0, 0));
    assert!(frame.pixel_buffer().is_none());
}

// ---------------------------------------------------------------------------
// Filter lifecycle and per-frame orchestration
// ---------------------------------------------------------------------------

#[test]
fn test_set_disposed_image_keeps_current() {
    let filter = TwoInputFilter::default();
    let current = image(2, 2);
    filter.set_image(Some(current.clone()));

    let disposed = image(4, 4);
    disposed.dispose();
    filter.set_image(Some(disposed));

    assert!(filter.image().unwrap().same_image(&current));
}

#[test]
fn test_end_to_end_single_refresh_in_30_frames() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);
    filter.set_image(Some(image(4, 4)));

    let mut handle_at_refresh = None;
    for frame in 1..=30 {
        let report = filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
        assert_eq!(report.refreshed, frame == 23, "frame {}", frame);
        if report.refreshed {
            handle_at_refresh = filter.secondary_texture();
        }
    }

    assert_eq!(filter.stats().refreshes, 1);
    assert_eq!(filter.stats().frames, 30);
    let handle = filter.secondary_texture();
    assert!(handle.is_some());
    assert_eq!(handle, handle_at_refresh);
    assert_eq!(backend.creates(), 1);

    filter.on_destroy(&mut backend);
    assert_eq!(backend.deletes(), vec![handle.unwrap()]);
}

#[test]
fn test_frame_binds_unit_and_uploads_scaled_coords() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);
    backend.calls.clear();

    let report = filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();

    assert_eq!(
        &backend.calls[..3],
        &[
            Call::EnableAttribute(COORD2),
            Call::Bind(3, None),
            Call::SetUniform(SAMPLER2, 3),
        ]
    );
    // Default rotation is 90 degrees
    let expected = map(Rotation::Rotation90, false, false, report.scale);
    assert_close(&backend.last_attribute_upload().unwrap(), expected.as_slice());
    assert!((report.scale - 0.96).abs() < 1e-6);
}

#[test]
fn test_image_assigned_before_init_is_uploaded_on_init() {
    let mut backend = RecordingBackend::new();
    let mut filter = TwoInputFilter::default();
    filter.set_image(Some(image(2, 3)));
    assert!(backend.calls.is_empty());

    filter.on_init(&mut backend, PROGRAM).unwrap();

    assert_eq!(filter.state(), FilterState::Ready);
    assert_eq!(backend.uploads(), 1);
    assert_eq!(filter.stats().image_uploads, 1);

    filter.on_destroy(&mut backend);
}

#[test]
fn test_set_image_defers_gpu_work_until_next_frame() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);
    let calls_before = backend.calls.len();

    filter.set_image(Some(image(2, 2)));
    filter.set_rotation(RotationConfig::new(Rotation::Rotation180, true, false));
    assert_eq!(backend.calls.len(), calls_before);
    assert_eq!(filter.applied_rotation().rotation, Rotation::Rotation90);

    let report = filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    assert!(report.image_uploaded);
    assert_eq!(filter.applied_rotation(), RotationConfig::new(Rotation::Rotation180, true, false));
    let expected = map(Rotation::Rotation180, true, false, report.scale);
    assert_close(filter.coords().as_slice(), expected.as_slice());

    filter.on_destroy(&mut backend);
}

#[test]
fn test_last_assignment_before_frame_wins() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);

    filter.set_image(Some(image(2, 2)));
    filter.set_image(Some(image(5, 1)));
    filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();

    let uploads: Vec<_> = backend
        .calls
        .iter()
        .filter_map(|call| match call {
            Call::Upload { width, height, .. } => Some((*width, *height)),
            _ => None,
        })
        .collect();
    assert_eq!(uploads, vec![(5, 1)]);

    filter.on_destroy(&mut backend);
}

#[test]
fn test_pending_image_disposed_before_frame_is_dropped() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);

    let img = image(2, 2);
    filter.set_image(Some(img.clone()));
    img.dispose();

    let report = filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    assert!(!report.image_uploaded);
    assert_eq!(backend.uploads(), 0);
}

#[test]
fn test_dispose_image_clears_reference_and_stops_refresh() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);
    let img = image(2, 2);
    filter.set_image(Some(img.clone()));
    filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    let texture = filter.secondary_texture();

    filter.dispose_image();
    assert!(img.is_disposed());
    assert!(filter.image().is_none());

    for _ in 0..30 {
        assert!(!filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap().refreshed);
    }
    // Previous content stays bound
    assert_eq!(filter.secondary_texture(), texture);
    assert!(backend.calls.contains(&Call::Bind(3, texture)));

    filter.on_destroy(&mut backend);
}

#[test]
fn test_set_image_none_clears_overlay_and_keeps_texture() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);
    let img = image(2, 2);
    filter.set_image(Some(img.clone()));
    filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    let texture = filter.secondary_texture();
    assert!(texture.is_some());

    filter.set_image(None);
    assert!(filter.image().is_none());
    assert!(!img.is_disposed());

    backend.calls.clear();
    for _ in 0..30 {
        let report = filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
        assert!(!report.refreshed);
        assert!(!report.image_uploaded);
    }
    assert_eq!(backend.uploads(), 0);
    assert_eq!(filter.secondary_texture(), texture);
    assert!(backend.calls.contains(&Call::Bind(3, texture)));

    filter.on_destroy(&mut backend);
}

#[test]
fn test_last_rotation_before_frame_wins() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);

    filter.set_rotation(RotationConfig::new(Rotation::Rotation180, false, false));
    filter.set_rotation(RotationConfig::new(Rotation::Rotation270, false, true));
    assert_eq!(filter.applied_rotation().rotation, Rotation::Rotation90);

    let report = filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    assert_eq!(filter.applied_rotation(), RotationConfig::new(Rotation::Rotation270, false, true));
    let expected = map(Rotation::Rotation270, false, true, report.scale);
    assert_close(&backend.last_attribute_upload().unwrap(), expected.as_slice());
}

#[test]
fn test_disposed_pending_image_reverts_to_applied_overlay() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);
    let first = image(2, 2);
    filter.set_image(Some(first.clone()));
    filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();

    let second = image(3, 3);
    filter.set_image(Some(second.clone()));
    second.dispose();
    assert!(filter.image().unwrap().same_image(&second));

    let report = filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    assert!(!report.image_uploaded);
    assert!(filter.image().unwrap().same_image(&first));

    // The restored overlay keeps driving refreshes
    let refreshes: u64 = (0..23)
        .map(|_| filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap().refreshed as u64)
        .sum();
    assert_eq!(refreshes, 1);

    filter.on_destroy(&mut backend);
}

#[test]
fn test_disposed_pending_image_without_prior_overlay_clears_assignment() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);

    let img = image(2, 2);
    filter.set_image(Some(img.clone()));
    img.dispose();
    filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();

    assert!(filter.image().is_none());
}

#[test]
fn test_newer_assignment_survives_disposed_pending_image() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);
    let control = filter.control();

    let stale = image(2, 2);
    control.set_image(Some(stale.clone()));
    stale.dispose();
    let fresh = image(4, 4);
    control.set_image(Some(fresh.clone()));

    let report = filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    assert!(report.image_uploaded);
    assert!(control.image().unwrap().same_image(&fresh));

    filter.on_destroy(&mut backend);
}

#[test]
fn test_filter_exposes_config_and_scale() {
    let mut backend = RecordingBackend::new();
    let config = CompositorConfig {
        texture_unit: 6,
        ..CompositorConfig::default()
    };
    let mut filter = TwoInputFilter::new(config);
    assert_eq!(filter.config().texture_unit, 6);
    assert_eq!(filter.config().coord_attribute, "inputTextureCoordinate2");
    assert_eq!(filter.scale(), 1.0);

    filter.on_init(&mut backend, PROGRAM).unwrap();
    filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    assert!((filter.scale() - 0.96).abs() < 1e-6);
    assert!(backend.calls.contains(&Call::Bind(6, None)));
}

#[test]
fn test_refresh_skipped_without_source_or_primary() {
    let mut backend = RecordingBackend::new();
    let mut filter = TwoInputFilter::default();
    filter.on_init(&mut backend, PROGRAM).unwrap();
    filter.set_image(Some(image(2, 2)));

    // No pixel source configured
    for _ in 0..23 {
        filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    }
    assert_eq!(filter.stats().refreshes, 0);

    // Source present but no primary input
    filter.set_pixel_source(Some(Arc::new(TestSource::ready(2, 2))));
    for _ in 0..23 {
        filter.prepare_frame(&mut backend, None).unwrap();
    }
    assert_eq!(filter.stats().refreshes, 0);

    filter.on_destroy(&mut backend);
}

#[test]
fn test_missing_locations_degrade_without_attribute_upload() {
    let mut backend = RecordingBackend::new();
    backend.missing_attribute = true;
    backend.missing_uniform = true;

    let mut filter = ready_filter(&mut backend);
    assert!(filter.is_degraded());

    for _ in 0..5 {
        filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    }
    assert_eq!(backend.count(|call| matches!(call, Call::SetAttribute(..))), 0);
    assert_eq!(backend.count(|call| matches!(call, Call::SetUniform(..))), 0);
    assert_eq!(backend.count(|call| matches!(call, Call::Bind(3, None))), 5);
}

#[test]
fn test_missing_attribute_leaves_unit_empty_with_overlay_assigned() {
    let mut backend = RecordingBackend::new();
    backend.missing_attribute = true;

    let mut filter = ready_filter(&mut backend);
    assert!(filter.is_degraded());
    filter.set_image(Some(image(4, 4)));
    backend.calls.clear();

    let report = filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    assert!(report.image_uploaded);
    assert!(filter.secondary_texture().is_some());

    assert!(backend.calls.contains(&Call::Bind(3, None)));
    assert_eq!(backend.count(|call| matches!(call, Call::Bind(3, Some(_)))), 0);
    assert_eq!(backend.count(|call| matches!(call, Call::SetUniform(..))), 0);
    assert_eq!(backend.count(|call| matches!(call, Call::SetAttribute(..))), 0);
}

#[test]
fn test_missing_uniform_unbinds_after_refresh() {
    let mut backend = RecordingBackend::new();
    backend.missing_uniform = true;

    let mut filter = ready_filter(&mut backend);
    assert!(filter.is_degraded());
    filter.set_image(Some(image(4, 4)));

    for _ in 0..23 {
        filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    }
    assert_eq!(filter.stats().refreshes, 1);
    let last_bind = backend.calls.iter().rev().find(|call| matches!(call, Call::Bind(3, _)));
    assert_eq!(last_bind, Some(&Call::Bind(3, None)));
    assert_eq!(backend.count(|call| matches!(call, Call::Bind(3, Some(_)))), 0);
    assert_eq!(backend.count(|call| matches!(call, Call::SetUniform(..))), 0);
}

#[test]
fn test_lifecycle_misuse_is_reported() {
    let mut backend = RecordingBackend::new();
    let mut filter = TwoInputFilter::default();

    assert_eq!(
        filter.prepare_frame(&mut backend, Some(PRIMARY)),
        Err(FilterError::NotInitialized)
    );
    assert!(backend.calls.is_empty());

    filter.on_init(&mut backend, PROGRAM).unwrap();
    assert_eq!(filter.on_init(&mut backend, PROGRAM), Err(FilterError::AlreadyInitialized));

    filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    assert_eq!(filter.state(), FilterState::Active);

    filter.on_destroy(&mut backend);
    filter.on_destroy(&mut backend);
    assert_eq!(filter.state(), FilterState::Destroyed);

    let calls = backend.calls.len();
    assert_eq!(filter.prepare_frame(&mut backend, Some(PRIMARY)), Err(FilterError::Destroyed));
    assert_eq!(backend.calls.len(), calls);
}

#[test]
fn test_destroy_releases_texture_once() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);
    filter.set_image(Some(image(2, 2)));
    filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    let texture = filter.secondary_texture().unwrap();

    filter.on_destroy(&mut backend);
    filter.on_destroy(&mut backend);

    assert_eq!(backend.deletes(), vec![texture]);
    assert_eq!(filter.secondary_texture(), None);
}

#[test]
fn test_control_handle_from_another_thread() {
    let mut backend = RecordingBackend::new();
    let mut filter = ready_filter(&mut backend);
    let control = filter.control();

    std::thread::spawn(move || {
        control.set_rotation(RotationConfig::new(Rotation::Normal, false, true));
        control.set_image(Some(image(3, 3)));
    })
    .join()
    .unwrap();

    assert_eq!(backend.uploads(), 0);
    let report = filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap();
    assert!(report.image_uploaded);
    assert_eq!(filter.applied_rotation().rotation, Rotation::Normal);
    assert!(filter.applied_rotation().flip_vertical);

    filter.on_destroy(&mut backend);
}

#[test]
fn test_custom_config_changes_unit_and_cycle() {
    let mut backend = RecordingBackend::new();
    let config = CompositorConfig {
        scale_step: 0.25,
        scale_floor: 0.3,
        texture_unit: 5,
        ..CompositorConfig::default()
    };
    let mut filter = TwoInputFilter::new(config);
    filter.set_pixel_source(Some(Arc::new(TestSource::ready(2, 2))));
    filter.on_init(&mut backend, PROGRAM).unwrap();
    filter.set_image(Some(image(2, 2)));

    // 0.75, 0.5, then 0.25 < 0.3 wraps
    let refreshed: Vec<bool> = (0..3)
        .map(|_| filter.prepare_frame(&mut backend, Some(PRIMARY)).unwrap().refreshed)
        .collect();
    assert_eq!(refreshed, vec![false, false, true]);
    assert!(backend.calls.contains(&Call::SetUniform(SAMPLER2, 5)));

    filter.on_destroy(&mut backend);
}

// ---------------------------------------------------------------------------
// Preview sizing
// ---------------------------------------------------------------------------

#[test]
fn test_frame_size_clamped_to_device_limit() {
    assert_eq!(clamp_frame_size((640, 480), 8192), (640, 480));
    assert_eq!(clamp_frame_size((100_000, 480), 8192), (8192, 480));
    assert_eq!(clamp_frame_size((0, 20_000), 2048), (1, 2048));
    assert_eq!(clamp_frame_size((16, 16), 0), (1, 1));
}

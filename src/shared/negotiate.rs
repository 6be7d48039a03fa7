// This is free and unencumbered software released into the public domain.

//! Size, aspect-ratio and mode negotiation. Backend-agnostic and pure.

use super::{
    AspectRatio, CameraConfig, CameraDescriptor, CameraDevice, CameraError, DeviceParameters,
    Flash, FocusMode, PreviewSurface, Size, SizeMap, capture_rotation, display_rotation,
};
use std::collections::BTreeSet;

/// What an open device advertises, with unusable aspect ratios pruned.
#[derive(Clone, Debug, Default)]
pub struct Capabilities {
    pub preview_sizes: SizeMap,
    pub picture_sizes: SizeMap,
    pub video_sizes: SizeMap,
    pub flash_modes: Vec<Flash>,
    pub focus_modes: Vec<FocusMode>,
}

impl Capabilities {
    /// Reads the supported sizes and modes of a live device.
    pub fn query(device: &dyn CameraDevice) -> Self {
        Self::new(
            device.supported_preview_sizes(),
            device.supported_picture_sizes(),
            device.supported_video_sizes(),
            device.supported_flash_modes(),
            device.supported_focus_modes(),
        )
    }

    pub fn new(
        preview: impl IntoIterator<Item = Size>,
        picture: impl IntoIterator<Item = Size>,
        video: impl IntoIterator<Item = Size>,
        flash_modes: Vec<Flash>,
        focus_modes: Vec<FocusMode>,
    ) -> Self {
        let mut preview_sizes: SizeMap = preview.into_iter().collect();
        let picture_sizes: SizeMap = picture.into_iter().collect();
        preview_sizes.prune(&picture_sizes);
        Self {
            preview_sizes,
            picture_sizes,
            video_sizes: video.into_iter().collect(),
            flash_modes,
            focus_modes,
        }
    }

    /// Ratios offered by both preview and still capture.
    pub fn aspect_ratios(&self) -> Vec<AspectRatio> {
        self.preview_sizes.ratios().copied().collect()
    }

    pub fn supports(&self, ratio: &AspectRatio) -> bool {
        !self.preview_sizes.sizes(ratio).is_empty()
    }
}

/// Turns the session settings into a concrete parameter set for `camera`.
pub fn negotiate_parameters(
    config: &CameraConfig,
    camera: &CameraDescriptor,
    caps: &Capabilities,
    surface: Option<&dyn PreviewSurface>,
) -> Result<DeviceParameters, CameraError> {
    let ratio = config.aspect_ratio;
    if !caps.supports(&ratio) {
        return Err(CameraError::UnsupportedAspectRatio(ratio));
    }

    let (width, height, ready) = match surface {
        Some(s) => (s.width(), s.height(), s.is_ready()),
        None => (0, 0, false),
    };
    let preview_size = choose_optimal_size(
        caps.preview_sizes.sizes(&ratio),
        width,
        height,
        config.display_rotation.is_landscape(),
        ready,
    )?;
    let picture_size = largest_size(&caps.picture_sizes, &ratio)
        .ok_or(CameraError::UnsupportedAspectRatio(ratio))?;
    let video_size = largest_size(&caps.video_sizes, &ratio).unwrap_or(preview_size);

    Ok(DeviceParameters {
        preview_size,
        picture_size,
        video_size,
        display_rotation: display_rotation(camera, config.display_rotation),
        capture_rotation: capture_rotation(camera, config.display_rotation),
        flash: resolve_flash(config.flash, &caps.flash_modes),
        focus_mode: resolve_focus(config.auto_focus, &caps.focus_modes),
        jpeg_quality: config.jpeg_quality,
        frame_buffer_depth: config.frame_buffer_depth.max(1),
    })
}

/// Picks the preview size for a viewport.
///
/// Before the viewport is laid out the smallest candidate is returned. Otherwise
/// the smallest candidate covering the viewport in both dimensions wins, and if
/// none does, the largest candidate is used even when its aspect ratio is far
/// from the viewport's (an upscaled preview beats a failed session).
pub fn choose_optimal_size(
    candidates: &BTreeSet<Size>,
    viewport_width: u32,
    viewport_height: u32,
    is_landscape: bool,
    viewport_ready: bool,
) -> Result<Size, CameraError> {
    let (Some(&smallest), Some(&largest)) = (candidates.first(), candidates.last()) else {
        return Err(CameraError::NoCandidates);
    };
    if !viewport_ready {
        return Ok(smallest);
    }

    // Viewports report physical dimensions; sensors are landscape-native.
    let (desired_width, desired_height) = if is_landscape {
        (viewport_height, viewport_width)
    } else {
        (viewport_width, viewport_height)
    };

    Ok(candidates
        .iter()
        .find(|s| s.width >= desired_width && s.height >= desired_height)
        .copied()
        .unwrap_or(largest))
}

/// The ratio to fall back to when the requested one has no preview sizes:
/// `preferred` if the map has it, else the first ratio in the map.
pub fn choose_aspect_ratio_fallback(sizes: &SizeMap, preferred: AspectRatio) -> Option<AspectRatio> {
    if sizes.contains(&preferred) {
        return Some(preferred);
    }
    sizes.ratios().next().copied()
}

/// The largest size of `ratio`, if any.
pub fn largest_size(sizes: &SizeMap, ratio: &AspectRatio) -> Option<Size> {
    sizes.sizes(ratio).last().copied()
}

/// Applies `requested` only if the device supports it, otherwise flash is off.
pub fn resolve_flash(requested: Flash, supported: &[Flash]) -> Flash {
    if supported.contains(&requested) {
        requested
    } else {
        Flash::Off
    }
}

/// Chooses a focus mode: continuous-picture when auto-focus is wanted and
/// available, then fixed, then infinity, then whatever the device lists first.
pub fn resolve_focus(auto_focus: bool, supported: &[FocusMode]) -> Option<FocusMode> {
    if auto_focus && supported.contains(&FocusMode::ContinuousPicture) {
        return Some(FocusMode::ContinuousPicture);
    }
    [FocusMode::Fixed, FocusMode::Infinity]
        .into_iter()
        .find(|mode| supported.contains(mode))
        .or_else(|| supported.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{Facing, Rotation, Viewport};

    fn sizes(list: &[(i64, i64)]) -> BTreeSet<Size> {
        list.iter().map(|&(w, h)| Size::new(w, h).unwrap()).collect()
    }

    fn size(w: i64, h: i64) -> Size {
        Size::new(w, h).unwrap()
    }

    #[test]
    fn picks_smallest_covering_candidate() {
        let candidates = sizes(&[(100, 100), (200, 200), (400, 300)]);
        let chosen = choose_optimal_size(&candidates, 150, 150, false, true).unwrap();
        assert_eq!(chosen, size(200, 200));
    }

    #[test]
    fn falls_back_to_largest_when_nothing_covers() {
        let candidates = sizes(&[(100, 100)]);
        let chosen = choose_optimal_size(&candidates, 500, 500, false, true).unwrap();
        assert_eq!(chosen, size(100, 100));

        let wide = sizes(&[(320, 180), (1280, 720)]);
        let chosen = choose_optimal_size(&wide, 2000, 2000, false, true).unwrap();
        assert_eq!(chosen, size(1280, 720));
    }

    #[test]
    fn unready_viewport_yields_smallest() {
        let candidates = sizes(&[(1920, 1080), (640, 360), (1280, 720)]);
        let chosen = choose_optimal_size(&candidates, 0, 0, false, false).unwrap();
        assert_eq!(chosen, size(640, 360));
    }

    #[test]
    fn landscape_swaps_viewport_dimensions() {
        let candidates = sizes(&[(640, 480), (800, 600), (1600, 1200)]);
        // Portrait viewport 600 wide, 700 tall.
        let portrait = choose_optimal_size(&candidates, 600, 700, false, true).unwrap();
        assert_eq!(portrait, size(1600, 1200));
        let landscape = choose_optimal_size(&candidates, 600, 700, true, true).unwrap();
        assert_eq!(landscape, size(800, 600));
    }

    #[test]
    fn empty_candidates_is_an_error() {
        let result = choose_optimal_size(&BTreeSet::new(), 100, 100, false, true);
        assert!(matches!(result, Err(CameraError::NoCandidates)));
    }

    #[test]
    fn negotiation_is_deterministic() {
        let candidates = sizes(&[(176, 144), (640, 480), (1280, 960), (2592, 1944)]);
        let first = choose_optimal_size(&candidates, 720, 1280, true, true).unwrap();
        for _ in 0..10 {
            assert_eq!(choose_optimal_size(&candidates, 720, 1280, true, true).unwrap(), first);
        }
    }

    #[test]
    fn aspect_ratio_fallback_prefers_requested() {
        let map: SizeMap = [size(1280, 720), size(640, 480)].into_iter().collect();
        assert_eq!(
            choose_aspect_ratio_fallback(&map, AspectRatio::RATIO_16_9),
            Some(AspectRatio::RATIO_16_9)
        );
        let square = AspectRatio::of(1, 1).unwrap();
        assert_eq!(
            choose_aspect_ratio_fallback(&map, square),
            Some(AspectRatio::RATIO_4_3)
        );
        assert_eq!(choose_aspect_ratio_fallback(&SizeMap::new(), square), None);
    }

    #[test]
    fn flash_falls_back_to_off() {
        assert_eq!(resolve_flash(Flash::Torch, &[Flash::Off, Flash::Torch]), Flash::Torch);
        assert_eq!(resolve_flash(Flash::RedEye, &[Flash::Off, Flash::On]), Flash::Off);
        assert_eq!(resolve_flash(Flash::On, &[]), Flash::Off);
    }

    #[test]
    fn focus_preference_order() {
        let all = [
            FocusMode::Auto,
            FocusMode::Infinity,
            FocusMode::Fixed,
            FocusMode::ContinuousPicture,
        ];
        assert_eq!(resolve_focus(true, &all), Some(FocusMode::ContinuousPicture));
        assert_eq!(resolve_focus(false, &all), Some(FocusMode::Fixed));
        assert_eq!(
            resolve_focus(true, &[FocusMode::Auto, FocusMode::Infinity]),
            Some(FocusMode::Infinity)
        );
        assert_eq!(resolve_focus(true, &[FocusMode::Macro]), Some(FocusMode::Macro));
        assert_eq!(resolve_focus(true, &[]), None);
    }

    fn phone_caps() -> Capabilities {
        Capabilities::new(
            [size(1920, 1080), size(1280, 720), size(640, 480), size(1440, 1080), size(720, 720)],
            [size(4032, 3024), size(4032, 2268), size(1920, 1080)],
            [size(3840, 2160), size(1920, 1080)],
            vec![Flash::Off, Flash::On, Flash::Auto],
            vec![FocusMode::Auto, FocusMode::ContinuousPicture],
        )
    }

    #[test]
    fn capabilities_prune_ratios_without_stills() {
        let caps = phone_caps();
        assert_eq!(
            caps.aspect_ratios(),
            vec![AspectRatio::RATIO_4_3, AspectRatio::RATIO_16_9]
        );
        assert!(!caps.supports(&AspectRatio::of(1, 1).unwrap()));
    }

    #[test]
    fn negotiates_full_parameter_set() {
        let caps = phone_caps();
        let camera = CameraDescriptor::new(0, Facing::Back, Rotation::Deg90);
        let config = CameraConfig::new(AspectRatio::RATIO_16_9, Facing::Back)
            .with_flash(Flash::Torch)
            .with_display_rotation(Rotation::Deg90)
            .with_frame_buffer_depth(2);
        let viewport = Viewport::with_size(1000, 600);

        let params = negotiate_parameters(&config, &camera, &caps, Some(&*viewport)).unwrap();
        // Landscape swaps the viewport to 600x1000; 1280x720 is too short.
        assert_eq!(params.preview_size, size(1920, 1080));
        assert_eq!(params.picture_size, size(4032, 2268));
        assert_eq!(params.video_size, size(3840, 2160));
        assert_eq!(params.display_rotation, Rotation::Deg0);
        assert_eq!(params.capture_rotation, Rotation::Deg180);
        assert_eq!(params.flash, Flash::Off);
        assert_eq!(params.focus_mode, Some(FocusMode::ContinuousPicture));
        assert_eq!(params.frame_buffer_depth, 2);
    }

    #[test]
    fn video_size_falls_back_to_preview() {
        let caps = phone_caps();
        let camera = CameraDescriptor::new(0, Facing::Back, Rotation::Deg90);
        let config = CameraConfig::new(AspectRatio::RATIO_4_3, Facing::Back);
        let params = negotiate_parameters(&config, &camera, &caps, None).unwrap();
        assert_eq!(params.preview_size, size(640, 480));
        assert_eq!(params.video_size, params.preview_size);
    }

    #[test]
    fn negotiation_rejects_unsupported_ratio() {
        let caps = phone_caps();
        let camera = CameraDescriptor::new(0, Facing::Front, Rotation::Deg270);
        let square = AspectRatio::of(1, 1).unwrap();
        let config = CameraConfig::new(square, Facing::Front);
        assert!(matches!(
            negotiate_parameters(&config, &camera, &caps, None),
            Err(CameraError::UnsupportedAspectRatio(r)) if r == square
        ));
    }
}

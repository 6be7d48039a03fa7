// This is free and unencumbered software released into the public domain.

use super::CameraError;
use core::{cmp::Ordering, fmt, str::FromStr};
use std::collections::{BTreeMap, BTreeSet};

/// A resolution in pixels. Ordered by area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: i64, height: i64) -> Result<Self, CameraError> {
        if width <= 0 || height <= 0 || width > u32::MAX as i64 || height > u32::MAX as i64 {
            return Err(CameraError::InvalidResolution { width, height });
        }
        Ok(Self {
            width: width as u32,
            height: height as u32,
        })
    }

    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        AspectRatio::reduce(self.width, self.height)
    }

    /// The same resolution with width and height exchanged.
    pub fn transposed(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl Ord for Size {
    fn cmp(&self, other: &Self) -> Ordering {
        self.area()
            .cmp(&other.area())
            .then_with(|| self.width.cmp(&other.width))
    }
}

impl PartialOrd for Size {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Size {
    type Err = CameraError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (w, h) = input
            .split_once(['x', 'X'])
            .ok_or_else(|| CameraError::invalid_config(format!("expected WxH, got {input:?}")))?;
        let parse = |s: &str| {
            s.trim()
                .parse::<i64>()
                .map_err(|_| CameraError::invalid_config(format!("expected WxH, got {input:?}")))
        };
        Size::new(parse(w)?, parse(h)?)
    }
}

/// A reduced fraction `x:y`. Always stored with `gcd(x, y) == 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    x: u32,
    y: u32,
}

impl AspectRatio {
    pub const RATIO_4_3: AspectRatio = AspectRatio { x: 4, y: 3 };
    pub const RATIO_16_9: AspectRatio = AspectRatio { x: 16, y: 9 };

    /// Reduces `width:height` by their greatest common divisor.
    pub fn of(width: i64, height: i64) -> Result<Self, CameraError> {
        let size = Size::new(width, height)?;
        Ok(Self::reduce(size.width, size.height))
    }

    pub(crate) fn reduce(width: u32, height: u32) -> Self {
        let d = gcd(width, height);
        Self {
            x: width / d,
            y: height / d,
        }
    }

    #[inline]
    pub fn x(&self) -> u32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Exact integer test: `width * y == height * x`.
    pub fn matches(&self, size: &Size) -> bool {
        size.width as u64 * self.y as u64 == size.height as u64 * self.x as u64
    }

    pub fn inverse(&self) -> Self {
        Self {
            x: self.y,
            y: self.x,
        }
    }

    pub fn to_f64(&self) -> f64 {
        self.x as f64 / self.y as f64
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Ord for AspectRatio {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.x as u64 * other.y as u64).cmp(&(other.x as u64 * self.y as u64))
    }
}

impl PartialOrd for AspectRatio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

impl FromStr for AspectRatio {
    type Err = CameraError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (x, y) = input
            .split_once(':')
            .ok_or_else(|| CameraError::invalid_config(format!("expected X:Y, got {input:?}")))?;
        let parse = |s: &str| {
            s.trim()
                .parse::<i64>()
                .map_err(|_| CameraError::invalid_config(format!("expected X:Y, got {input:?}")))
        };
        AspectRatio::of(parse(x)?, parse(y)?)
    }
}

/// Resolutions grouped by aspect ratio, each group ascending by area.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SizeMap {
    ratios: BTreeMap<AspectRatio, BTreeSet<Size>>,
}

impl SizeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the size was already present.
    pub fn add(&mut self, size: Size) -> bool {
        self.ratios
            .entry(size.aspect_ratio())
            .or_default()
            .insert(size)
    }

    pub fn sizes(&self, ratio: &AspectRatio) -> &BTreeSet<Size> {
        static EMPTY: BTreeSet<Size> = BTreeSet::new();
        self.ratios.get(ratio).unwrap_or(&EMPTY)
    }

    pub fn ratios(&self) -> impl Iterator<Item = &AspectRatio> + '_ {
        self.ratios.keys()
    }

    pub fn contains(&self, ratio: &AspectRatio) -> bool {
        self.ratios.contains_key(ratio)
    }

    pub fn remove(&mut self, ratio: &AspectRatio) -> Option<BTreeSet<Size>> {
        self.ratios.remove(ratio)
    }

    /// Drops every ratio that has no still-capture sizes in `stills`.
    pub fn prune(&mut self, stills: &SizeMap) {
        self.ratios.retain(|ratio, _| !stills.sizes(ratio).is_empty());
    }

    pub fn clear(&mut self) {
        self.ratios.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ratios.values().map(BTreeSet::len).sum()
    }
}

impl FromIterator<Size> for SizeMap {
    fn from_iter<I: IntoIterator<Item = Size>>(iter: I) -> Self {
        let mut map = SizeMap::new();
        for size in iter {
            map.add(size);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(w: i64, h: i64) -> Size {
        Size::new(w, h).unwrap()
    }

    #[test]
    fn reduce_normalizes_to_lowest_terms() {
        assert_eq!(AspectRatio::of(1920, 1080).unwrap(), AspectRatio::RATIO_16_9);
        assert_eq!(AspectRatio::of(16, 9).unwrap(), AspectRatio::RATIO_16_9);
        assert_eq!(AspectRatio::of(640, 480).unwrap(), AspectRatio::RATIO_4_3);
        assert_eq!(AspectRatio::of(7, 7).unwrap().to_string(), "1:1");
    }

    #[test]
    fn reduce_yields_coprime_matching_fraction() {
        for w in 1..60_i64 {
            for h in 1..60_i64 {
                let r = AspectRatio::of(w, h).unwrap();
                assert_eq!(gcd(r.x(), r.y()), 1, "{w}x{h}");
                assert_eq!(w * r.y() as i64, h * r.x() as i64, "{w}x{h}");
            }
        }
    }

    #[test]
    fn reduce_rejects_non_positive_input() {
        assert!(matches!(
            AspectRatio::of(0, 10),
            Err(CameraError::InvalidResolution { width: 0, height: 10 })
        ));
        assert!(AspectRatio::of(10, -1).is_err());
        assert!(Size::new(-5, 5).is_err());
    }

    #[test]
    fn parses_ratios_and_sizes() {
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::RATIO_16_9);
        assert_eq!("32:18".parse::<AspectRatio>().unwrap(), AspectRatio::RATIO_16_9);
        assert!("16/9".parse::<AspectRatio>().is_err());
        assert_eq!("1280x720".parse::<Size>().unwrap(), size(1280, 720));
        assert!("1280x0".parse::<Size>().is_err());
    }

    #[test]
    fn sizes_order_by_area() {
        assert!(size(100, 100) < size(200, 200));
        assert!(size(400, 300) > size(300, 300));
        assert_ne!(size(100, 400).cmp(&size(200, 200)), Ordering::Equal);
    }

    #[test]
    fn size_map_groups_and_collapses_duplicates() {
        let mut map = SizeMap::new();
        assert!(map.add(size(1920, 1080)));
        assert!(map.add(size(1280, 720)));
        assert!(!map.add(size(1280, 720)));
        assert!(map.add(size(640, 480)));

        let wide: Vec<_> = map.sizes(&AspectRatio::RATIO_16_9).iter().copied().collect();
        assert_eq!(wide, vec![size(1280, 720), size(1920, 1080)]);
        assert_eq!(map.sizes(&AspectRatio::RATIO_4_3).len(), 1);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn unknown_ratio_yields_empty_set() {
        let map: SizeMap = [size(640, 480)].into_iter().collect();
        assert!(map.sizes(&AspectRatio::RATIO_16_9).is_empty());
    }

    #[test]
    fn prune_keeps_only_ratios_with_stills() {
        let mut preview: SizeMap = [size(1280, 720), size(640, 480), size(720, 720)]
            .into_iter()
            .collect();
        let stills: SizeMap = [size(4000, 3000), size(1920, 1080)].into_iter().collect();

        preview.prune(&stills);
        let ratios: Vec<_> = preview.ratios().copied().collect();
        assert_eq!(ratios, vec![AspectRatio::RATIO_4_3, AspectRatio::RATIO_16_9]);

        let once = preview.clone();
        preview.prune(&stills);
        assert_eq!(preview, once);
    }
}

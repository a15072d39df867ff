//! Content kinds carried by streams.
//!
//! [`StreamContent`] is the capability every content kind provides: its type
//! tag, a zero value, seeded randomization, (de)serialization, rendering and
//! point queries. The set of kinds is closed: scalars, images, object lists
//! and events.

use crate::core::error::{CoreError, CoreResult};
use crate::core::random;
use crate::core::storage::ScopedStorage;
use crate::core::types::{Event, Object, TimeStamp, TypeTag};
use crate::stream::render::{self, Canvas, GREEN, RED};
use image::imageops::FilterType;
use image::{ImageFormat, Rgb, RgbImage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value as Json};
use std::fmt;

/// Capability implemented by every content kind.
pub trait StreamContent: Clone + PartialEq + fmt::Debug + 'static {
    /// Type tag of this content kind.
    const TAG: TypeTag;

    /// Type-appropriate zero value.
    fn zero() -> Self;

    /// Replace the content with pseudo-random data, advancing `seed`.
    fn randomize(&mut self, seed: &mut u32);

    /// Encode the content for a stream document.
    ///
    /// Kinds that cannot be embedded inline write an artifact into `storage`
    /// and return a reference to it.
    fn encode(&self, stream: &str, time_stamp: TimeStamp, storage: Option<&ScopedStorage>) -> CoreResult<Json>;

    /// Decode content produced by [`StreamContent::encode`].
    fn decode(stream: &str, value: &Json, storage: Option<&ScopedStorage>) -> CoreResult<Self>;

    /// Draw the content on a debug canvas.
    fn render(&self, canvas: &mut Canvas);

    /// Describe the content at a canvas position.
    fn describe_at(&self, x: i32, y: i32) -> String;

    /// Numeric view, used for range requirements and plots.
    fn as_f64(&self) -> Option<f64> {
        None
    }

    /// Size of image-like content.
    fn size(&self) -> Option<(u32, u32)> {
        None
    }

    /// Copy content pulled from a producer into `self`, adapting it to the
    /// shape `self` already has.
    fn convert_from(&mut self, source: &Self) {
        self.clone_from(source);
    }
}

/// Scalar content kinds, eligible for `StreamNum`.
pub trait Scalar: StreamContent + Copy + fmt::Display {
    fn to_f64(self) -> f64;
}

fn encode_inline<T: Serialize>(stream: &str, value: &T) -> CoreResult<Json> {
    serde_json::to_value(value).map_err(|e| CoreError::Serialization {
        stream: stream.to_string(),
        reason: e.to_string(),
    })
}

fn decode_inline<T: DeserializeOwned>(stream: &str, value: &Json) -> CoreResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| CoreError::Serialization {
        stream: stream.to_string(),
        reason: e.to_string(),
    })
}

macro_rules! scalar_content {
    ($ty:ty, $tag:expr, to_f64: $to:expr, random: $rand:expr) => {
        impl StreamContent for $ty {
            const TAG: TypeTag = $tag;

            fn zero() -> Self {
                <$ty>::default()
            }

            fn randomize(&mut self, seed: &mut u32) {
                let generate: fn(&mut u32) -> $ty = $rand;
                *self = generate(seed);
            }

            fn encode(&self, stream: &str, _time_stamp: TimeStamp, _storage: Option<&ScopedStorage>) -> CoreResult<Json> {
                encode_inline(stream, self)
            }

            fn decode(stream: &str, value: &Json, _storage: Option<&ScopedStorage>) -> CoreResult<Self> {
                decode_inline(stream, value)
            }

            fn render(&self, canvas: &mut Canvas) {
                render::plot_series(canvas, &[Scalar::to_f64(*self)]);
            }

            fn describe_at(&self, _x: i32, _y: i32) -> String {
                self.to_string()
            }

            fn as_f64(&self) -> Option<f64> {
                Some(Scalar::to_f64(*self))
            }
        }

        impl Scalar for $ty {
            fn to_f64(self) -> f64 {
                let convert: fn($ty) -> f64 = $to;
                convert(self)
            }
        }
    };
}

scalar_content!(bool, TypeTag::Boolean, to_f64: |v| if v { 1.0 } else { 0.0 }, random: random::next_bool);
scalar_content!(i32, TypeTag::Integer, to_f64: |v| v as f64, random: |s| random::next_u32(s) as i32);
scalar_content!(u32, TypeTag::Unsigned, to_f64: |v| v as f64, random: random::next_u32);
scalar_content!(f32, TypeTag::Float, to_f64: |v| v as f64, random: |s| random::next_range(s, -1000.0, 1000.0) as f32);
scalar_content!(f64, TypeTag::Double, to_f64: |v| v, random: |s| random::next_range(s, -1000.0, 1000.0));

// ============================================================================
// Images
// ============================================================================

impl StreamContent for RgbImage {
    const TAG: TypeTag = TypeTag::Image;

    fn zero() -> Self {
        RgbImage::new(0, 0)
    }

    /// Keeps the current size and fills every pixel.
    fn randomize(&mut self, seed: &mut u32) {
        for pixel in self.pixels_mut() {
            let r = random::next_u32(seed);
            *pixel = Rgb([r as u8, (r >> 8) as u8, (r >> 16) as u8]);
        }
    }

    fn encode(&self, stream: &str, time_stamp: TimeStamp, storage: Option<&ScopedStorage>) -> CoreResult<Json> {
        let storage = storage.ok_or_else(|| CoreError::Serialization {
            stream: stream.to_string(),
            reason: "image content cannot be embedded inline, a storage directory is required".to_string(),
        })?;
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return Ok(json!({ "file": null, "width": width, "height": height }));
        }
        let file = storage.reserve(stream, time_stamp, "png");
        self.save_with_format(storage.artifact_path(&file), ImageFormat::Png)?;
        Ok(json!({ "file": file, "width": width, "height": height }))
    }

    fn decode(stream: &str, value: &Json, storage: Option<&ScopedStorage>) -> CoreResult<Self> {
        let malformed = |reason: &str| CoreError::Serialization {
            stream: stream.to_string(),
            reason: reason.to_string(),
        };
        let storage = storage.ok_or_else(|| malformed("a storage directory is required to read image content"))?;
        let dimension = |key: &str| -> CoreResult<u32> {
            let raw = value
                .get(key)
                .and_then(Json::as_u64)
                .ok_or_else(|| malformed(&format!("missing field '{}'", key)))?;
            u32::try_from(raw).map_err(|_| malformed(&format!("field '{}' is out of range", key)))
        };
        let (width, height) = (dimension("width")?, dimension("height")?);
        let image = match value.get("file") {
            Some(Json::String(file)) => image::open(storage.artifact_path(file))?.to_rgb8(),
            Some(Json::Null) if width == 0 || height == 0 => RgbImage::new(width, height),
            Some(Json::Null) => return Err(malformed("no artifact stored for a non-empty image")),
            _ => return Err(malformed("missing field 'file'")),
        };
        if image.dimensions() != (width, height) {
            return Err(malformed("stored image size does not match the document"));
        }
        Ok(image)
    }

    fn render(&self, canvas: &mut Canvas) {
        let (width, height) = canvas.dimensions();
        if self.width() == 0 || self.height() == 0 || width == 0 || height == 0 {
            render::clear(canvas, render::BLACK);
            return;
        }
        *canvas = image::imageops::resize(self, width, height, FilterType::Nearest);
    }

    fn describe_at(&self, x: i32, y: i32) -> String {
        if x < 0 || y < 0 {
            return "out of image".to_string();
        }
        match self.get_pixel_checked(x as u32, y as u32) {
            Some(Rgb([r, g, b])) => format!("({}, {}, {})", r, g, b),
            None => "out of image".to_string(),
        }
    }

    fn size(&self) -> Option<(u32, u32)> {
        Some(self.dimensions())
    }

    /// Rescales the producer's image to the current resolution. An empty
    /// image takes the producer's resolution.
    fn convert_from(&mut self, source: &Self) {
        let (width, height) = self.dimensions();
        let empty = |(w, h): (u32, u32)| w == 0 || h == 0;
        if empty((width, height)) || empty(source.dimensions()) || source.dimensions() == (width, height) {
            self.clone_from(source);
        } else {
            *self = image::imageops::resize(source, width, height, FilterType::Triangle);
        }
    }
}

// ============================================================================
// Objects and events
// ============================================================================

const LABELS: [&str; 4] = ["face", "person", "car", "motion"];

fn random_object(seed: &mut u32) -> Object {
    let label = LABELS[random::next_below(seed, LABELS.len() as u32) as usize];
    let x = random::next_range(seed, 0.0, 640.0) as f32;
    let y = random::next_range(seed, 0.0, 480.0) as f32;
    let width = random::next_range(seed, 1.0, 100.0) as f32;
    let height = random::next_range(seed, 1.0, 100.0) as f32;
    let mut object = Object::new(label, x, y, width, height).with_feature("area", width * height);
    object.id = random::next_below(seed, 1000) as i64;
    object
}

impl StreamContent for Vec<Object> {
    const TAG: TypeTag = TypeTag::Objects;

    fn zero() -> Self {
        Vec::new()
    }

    fn randomize(&mut self, seed: &mut u32) {
        let count = random::next_below(seed, 5);
        *self = (0..count).map(|_| random_object(seed)).collect();
    }

    fn encode(&self, stream: &str, _time_stamp: TimeStamp, _storage: Option<&ScopedStorage>) -> CoreResult<Json> {
        encode_inline(stream, self)
    }

    fn decode(stream: &str, value: &Json, _storage: Option<&ScopedStorage>) -> CoreResult<Self> {
        decode_inline(stream, value)
    }

    fn render(&self, canvas: &mut Canvas) {
        render::clear(canvas, render::BLACK);
        for object in self {
            render::draw_object(canvas, object, GREEN);
        }
    }

    fn describe_at(&self, x: i32, y: i32) -> String {
        let hits: Vec<String> = self
            .iter()
            .filter(|o| o.contains(x as f32, y as f32))
            .map(|o| format!("{} #{}", o.label, o.id))
            .collect();
        if hits.is_empty() {
            "no object".to_string()
        } else {
            hits.join(", ")
        }
    }
}

impl StreamContent for Event {
    const TAG: TypeTag = TypeTag::Event;

    fn zero() -> Self {
        Event::default()
    }

    fn randomize(&mut self, seed: &mut u32) {
        self.clear();
        if random::next_bool(seed) {
            self.raised = true;
            self.label = LABELS[random::next_below(seed, LABELS.len() as u32) as usize].to_string();
            if random::next_bool(seed) {
                self.object = Some(random_object(seed));
            }
        }
    }

    fn encode(&self, stream: &str, _time_stamp: TimeStamp, _storage: Option<&ScopedStorage>) -> CoreResult<Json> {
        encode_inline(stream, self)
    }

    fn decode(stream: &str, value: &Json, _storage: Option<&ScopedStorage>) -> CoreResult<Self> {
        decode_inline(stream, value)
    }

    fn render(&self, canvas: &mut Canvas) {
        render::clear(canvas, render::BLACK);
        if !self.raised {
            return;
        }
        let (width, height) = canvas.dimensions();
        if width > 0 && height > 0 {
            let frame = Object::new("", 0.0, 0.0, width as f32, height as f32);
            render::draw_object(canvas, &frame, RED);
        }
        if let Some(object) = &self.object {
            render::draw_object(canvas, object, GREEN);
        }
    }

    fn describe_at(&self, _x: i32, _y: i32) -> String {
        if self.raised {
            format!("event '{}'", self.label)
        } else {
            "no event".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(<bool as StreamContent>::TAG, TypeTag::Boolean);
        assert_eq!(<u32 as StreamContent>::TAG, TypeTag::Unsigned);
        assert_eq!(<RgbImage as StreamContent>::TAG, TypeTag::Image);
        assert_eq!(<Vec<Object> as StreamContent>::TAG, TypeTag::Objects);
    }

    #[test]
    fn test_randomize_is_reproducible() {
        let (mut a, mut b) = (Vec::<Object>::new(), Vec::<Object>::new());
        let (mut seed_a, mut seed_b) = (556_345, 556_345);
        for _ in 0..20 {
            a.randomize(&mut seed_a);
            b.randomize(&mut seed_b);
            assert_eq!(a, b);
        }
        assert_eq!(seed_a, seed_b);
    }

    #[test]
    fn test_image_needs_storage() {
        let image = RgbImage::new(4, 4);
        let err = image.encode("image", 0, None).unwrap_err();
        assert!(matches!(err, CoreError::Serialization { .. }));
    }

    #[test]
    fn test_image_round_trip_through_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();
        let mut image = RgbImage::new(8, 6);
        let mut seed = 3;
        image.randomize(&mut seed);

        let doc = image.encode("image", 42, Some(&storage)).unwrap();
        assert_eq!(doc["file"], "image_42.png");
        assert!(storage.artifact_path("image_42.png").is_file());

        let decoded = RgbImage::decode("image", &doc, Some(&storage)).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_empty_image_has_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();
        let doc = RgbImage::zero().encode("image", 0, Some(&storage)).unwrap();
        assert!(doc["file"].is_null());
        let decoded = RgbImage::decode("image", &doc, Some(&storage)).unwrap();
        assert_eq!(decoded.dimensions(), (0, 0));
    }

    #[test]
    fn test_malformed_image_documents() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();
        let malformed = |doc: Json| {
            let err = RgbImage::decode("image", &doc, Some(&storage)).unwrap_err();
            assert!(matches!(err, CoreError::Serialization { ref stream, .. } if stream == "image"), "{:?}", doc);
        };
        malformed(json!({ "file": null, "width": 4294967295u64, "height": 4294967295u64 }));
        malformed(json!({ "file": null, "width": 4, "height": 3 }));
        malformed(json!({ "file": null, "width": 4294967296u64, "height": 0 }));
        malformed(json!({ "file": null, "width": -1, "height": 0 }));
        malformed(json!({ "width": 0, "height": 0 }));

        let decoded = RgbImage::decode("image", &json!({ "file": null, "width": 5, "height": 0 }), Some(&storage)).unwrap();
        assert_eq!(decoded.dimensions(), (5, 0));
    }

    #[test]
    fn test_image_size_mismatch_with_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();
        let mut doc = RgbImage::new(4, 3).encode("image", 1, Some(&storage)).unwrap();
        doc["width"] = json!(8);
        let err = RgbImage::decode("image", &doc, Some(&storage)).unwrap_err();
        assert!(matches!(err, CoreError::Serialization { .. }));
    }

    #[test]
    fn test_image_convert_rescales() {
        let source = RgbImage::from_pixel(8, 6, Rgb([200, 10, 30]));
        let mut larger = RgbImage::new(16, 12);
        larger.convert_from(&source);
        assert_eq!(larger.dimensions(), (16, 12));
        assert_eq!(*larger.get_pixel(15, 11), Rgb([200, 10, 30]));

        let mut smaller = RgbImage::new(4, 3);
        smaller.convert_from(&source);
        assert_eq!(smaller.dimensions(), (4, 3));

        let mut empty = RgbImage::zero();
        empty.convert_from(&source);
        assert_eq!(empty, source);

        let mut same = RgbImage::new(8, 6);
        same.convert_from(&source);
        assert_eq!(same, source);
    }

    #[test]
    fn test_malformed_scalar() {
        let err = i32::decode("count", &json!("seven"), None).unwrap_err();
        assert!(matches!(err, CoreError::Serialization { ref stream, .. } if stream == "count"));
    }

    #[test]
    fn test_describe_at() {
        assert_eq!(3.5f64.describe_at(0, 0), "3.5");
        let objects = vec![Object::new("face", 0.0, 0.0, 10.0, 10.0)];
        assert_eq!(objects.describe_at(5, 5), "face #-1");
        assert_eq!(objects.describe_at(50, 50), "no object");
        assert_eq!(RgbImage::new(2, 2).describe_at(1, 1), "(0, 0, 0)");
        assert_eq!(RgbImage::new(2, 2).describe_at(5, 1), "out of image");
        assert_eq!(Event::raise("motion").describe_at(0, 0), "event 'motion'");
    }
}

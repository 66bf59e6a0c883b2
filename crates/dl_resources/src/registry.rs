use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dl_platform::{AssetLoader, FontDecoder, ImageDecoder};
use dl_rendering::BitmapId;
use parking_lot::{Mutex, RwLock};
use tiny_skia::Pixmap;

use crate::error::ResourceError;

/// A registered font. Immutable once registered.
#[derive(Debug)]
pub struct FontResource {
    /// Family name, also the registry key.
    pub family: String,
    pub data: Arc<Vec<u8>>,
}

/// A decoded image. Immutable once registered.
#[derive(Debug)]
pub struct ImageResource {
    pub id: BitmapId,
    pub path: String,
    pub pixmap: Pixmap,
}

/// One `registerFonts` entry.
#[derive(Debug, Clone)]
pub enum FontSource {
    /// Raw font file bytes.
    Bytes(Vec<u8>),
    /// Asset path resolved through the view's loader.
    Path(String),
}

impl FontSource {
    fn label(&self, index: usize) -> String {
        match self {
            FontSource::Bytes(_) => format!("font[{index}]"),
            FontSource::Path(path) => path.clone(),
        }
    }
}

/// Result of one font entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontOutcome {
    Registered { family: String },
    /// The family was already registered; the first registration is kept.
    AlreadyRegistered { family: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontRegistration {
    /// Path, or `font[i]` for byte entries.
    pub entry: String,
    pub outcome: FontOutcome,
}

/// Per-entry report of a `register_fonts` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontReport {
    pub entries: Vec<FontRegistration>,
}

impl FontReport {
    /// Entries that failed to load, with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            FontOutcome::Failed { reason } => Some((entry.entry.as_str(), reason.as_str())),
            _ => None,
        })
    }

    /// Families newly registered by this call.
    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            FontOutcome::Registered { family } => Some(family.as_str()),
            _ => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn has_new_fonts(&self) -> bool {
        self.registered().next().is_some()
    }
}

/// Fonts and images shared between the calling thread and render threads.
///
/// Fonts are append-only: a consumer remembers how many it has seen and asks for
/// [`ResourceRegistry::fonts_since`]. Images are keyed by asset path.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    fonts: RwLock<Vec<Arc<FontResource>>>,
    // Serializes registrations so the family check and the append are atomic.
    font_lock: Mutex<()>,
    images: RwLock<HashMap<String, Arc<ImageResource>>>,
    next_bitmap_id: AtomicU64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register font entries one by one.
    ///
    /// A failing entry is reported and logged; the remaining entries are still processed.
    pub fn register_fonts(
        &self,
        sources: Vec<FontSource>,
        loader: &dyn AssetLoader,
        decoder: &dyn FontDecoder,
    ) -> FontReport {
        let _guard = self.font_lock.lock();
        let mut report = FontReport::default();

        for (index, source) in sources.into_iter().enumerate() {
            let entry = source.label(index);
            let outcome = match self.decode_font(source, loader, decoder) {
                Ok(decoded) => {
                    if self.has_family(&decoded.family) {
                        log::debug!("font family {} already registered", decoded.family);
                        FontOutcome::AlreadyRegistered {
                            family: decoded.family,
                        }
                    } else {
                        log::info!("registered font family {}", decoded.family);
                        self.fonts.write().push(Arc::new(FontResource {
                            family: decoded.family.clone(),
                            data: decoded.data,
                        }));
                        FontOutcome::Registered {
                            family: decoded.family,
                        }
                    }
                }
                Err(err) => {
                    log::warn!("failed to register font {entry}: {err}");
                    FontOutcome::Failed {
                        reason: err.to_string(),
                    }
                }
            };
            report.entries.push(FontRegistration { entry, outcome });
        }

        report
    }

    fn decode_font(
        &self,
        source: FontSource,
        loader: &dyn AssetLoader,
        decoder: &dyn FontDecoder,
    ) -> Result<dl_platform::DecodedFont, ResourceError> {
        let bytes = match source {
            FontSource::Bytes(bytes) => bytes,
            FontSource::Path(path) if path.trim().is_empty() => {
                return Err(ResourceError::EmptyPath);
            }
            FontSource::Path(path) => loader.load(&path)?,
        };
        Ok(decoder.decode(bytes)?)
    }

    fn has_family(&self, family: &str) -> bool {
        self.fonts
            .read()
            .iter()
            .any(|font| font.family.eq_ignore_ascii_case(family))
    }

    /// Number of registered fonts. Also serves as the font generation.
    pub fn font_count(&self) -> usize {
        self.fonts.read().len()
    }

    /// Fonts registered after the first `seen` ones.
    pub fn fonts_since(&self, seen: usize) -> Vec<Arc<FontResource>> {
        self.fonts.read().iter().skip(seen).cloned().collect()
    }

    /// Family names in registration order.
    pub fn font_families(&self) -> Vec<String> {
        self.fonts
            .read()
            .iter()
            .map(|font| font.family.clone())
            .collect()
    }

    /// Load and decode an image, or return the cached one for the same path.
    pub fn load_image(
        &self,
        path: &str,
        loader: &dyn AssetLoader,
        decoder: &dyn ImageDecoder,
    ) -> Result<Arc<ImageResource>, ResourceError> {
        if path.trim().is_empty() {
            return Err(ResourceError::EmptyPath);
        }
        if let Some(image) = self.image(path) {
            return Ok(image);
        }

        let bytes = loader.load(path)?;
        let pixmap = decoder.decode(&bytes)?;
        let image = Arc::new(ImageResource {
            id: self.next_bitmap_id.fetch_add(1, Ordering::Relaxed) + 1,
            path: path.to_string(),
            pixmap,
        });
        log::debug!(
            "decoded image {path} ({}x{})",
            image.pixmap.width(),
            image.pixmap.height()
        );

        // Another thread may have decoded the same path meanwhile; keep the first.
        let mut images = self.images.write();
        Ok(Arc::clone(
            images.entry(path.to_string()).or_insert(image),
        ))
    }

    pub fn image(&self, path: &str) -> Option<Arc<ImageResource>> {
        self.images.read().get(path).cloned()
    }

    pub fn image_count(&self) -> usize {
        self.images.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dl_platform::{DecodedFont, MemoryAssets, PlatformError};

    /// Treats `FONT:<family>` as a valid font file.
    struct FakeFontDecoder;

    impl FontDecoder for FakeFontDecoder {
        fn decode(&self, bytes: Vec<u8>) -> Result<DecodedFont, PlatformError> {
            let text = String::from_utf8(bytes.clone())
                .map_err(|_| PlatformError::Decode("not utf8".into()))?;
            let family = text
                .strip_prefix("FONT:")
                .ok_or_else(|| PlatformError::Decode("bad magic".into()))?;
            Ok(DecodedFont {
                family: family.to_string(),
                data: Arc::new(bytes),
            })
        }
    }

    struct SolidDecoder;

    impl ImageDecoder for SolidDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<Pixmap, PlatformError> {
            let side = *bytes.first().ok_or_else(|| PlatformError::Decode("empty".into()))?;
            Pixmap::new(side as u32, side as u32)
                .ok_or_else(|| PlatformError::Decode("zero size".into()))
        }
    }

    #[test]
    fn partial_font_failure_reports_only_bad_entry() {
        let registry = ResourceRegistry::new();
        let report = registry.register_fonts(
            vec![
                FontSource::Bytes(b"garbage".to_vec()),
                FontSource::Bytes(b"FONT:Noto".to_vec()),
            ],
            &MemoryAssets::new(),
            &FakeFontDecoder,
        );

        let failures: Vec<_> = report.failures().map(|(entry, _)| entry).collect();
        assert_eq!(failures, vec!["font[0]"]);
        assert_eq!(report.registered().collect::<Vec<_>>(), vec!["Noto"]);
        assert_eq!(registry.font_families(), vec!["Noto".to_string()]);
    }

    #[test]
    fn reregistration_is_ignored() {
        let registry = ResourceRegistry::new();
        let assets = MemoryAssets::new();
        assets.insert("fonts/noto.ttf", b"FONT:Noto".to_vec());

        registry.register_fonts(
            vec![FontSource::Path("fonts/noto.ttf".into())],
            &assets,
            &FakeFontDecoder,
        );
        let first = registry.fonts_since(0);

        let report = registry.register_fonts(
            vec![FontSource::Bytes(b"FONT:Noto".to_vec())],
            &assets,
            &FakeFontDecoder,
        );

        assert_eq!(
            report.entries[0].outcome,
            FontOutcome::AlreadyRegistered {
                family: "Noto".into()
            }
        );
        assert!(!report.has_new_fonts());
        assert_eq!(registry.font_count(), 1);
        assert!(Arc::ptr_eq(&first[0], &registry.fonts_since(0)[0]));
    }

    #[test]
    fn missing_font_path_fails() {
        let registry = ResourceRegistry::new();
        let report = registry.register_fonts(
            vec![FontSource::Path("nope.ttf".into()), FontSource::Path(" ".into())],
            &MemoryAssets::new(),
            &FakeFontDecoder,
        );

        assert_eq!(report.failures().count(), 2);
        assert_eq!(registry.font_count(), 0);
    }

    #[test]
    fn fonts_since_returns_new_entries() {
        let registry = ResourceRegistry::new();
        let assets = MemoryAssets::new();
        registry.register_fonts(
            vec![FontSource::Bytes(b"FONT:A".to_vec())],
            &assets,
            &FakeFontDecoder,
        );
        let seen = registry.font_count();
        registry.register_fonts(
            vec![FontSource::Bytes(b"FONT:B".to_vec())],
            &assets,
            &FakeFontDecoder,
        );

        let new_fonts = registry.fonts_since(seen);
        assert_eq!(new_fonts.len(), 1);
        assert_eq!(new_fonts[0].family, "B");
    }

    #[test]
    fn images_are_cached_by_path() {
        let registry = ResourceRegistry::new();
        let assets = MemoryAssets::new();
        assets.insert("a.png", vec![4]);
        assets.insert("b.png", vec![2]);

        let a1 = registry.load_image("a.png", &assets, &SolidDecoder).unwrap();
        let a2 = registry.load_image("a.png", &assets, &SolidDecoder).unwrap();
        let b = registry.load_image("b.png", &assets, &SolidDecoder).unwrap();

        assert!(Arc::ptr_eq(&a1, &a2));
        assert_ne!(a1.id, b.id);
        assert_eq!(b.pixmap.width(), 2);
        assert_eq!(registry.image_count(), 2);
    }

    #[test]
    fn image_failures_leave_registry_unchanged() {
        let registry = ResourceRegistry::new();
        let assets = MemoryAssets::new();
        assets.insert("empty.png", Vec::new());

        assert!(registry.load_image("", &assets, &SolidDecoder).is_err());
        assert!(registry.load_image("missing.png", &assets, &SolidDecoder).is_err());
        assert!(registry.load_image("empty.png", &assets, &SolidDecoder).is_err());
        assert_eq!(registry.image_count(), 0);
    }
}

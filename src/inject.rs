// src/inject.rs

//! Replacement injection: swaps targeted container entries for replacement
//! payloads.
//!
//! Entries are located through the container's own table: an atlas or
//! skeleton replacement targets the entry named exactly like the replacement
//! file, a texture replacement targets the texture entry named like the file
//! stem. Texture inputs are decoded and converted to RGBA32; their dimensions
//! must match the entry's recorded size, since the quad/mesh layout
//! referencing the region is fixed.
//!
//! When several mods feed the same identifier, the first asset addressing an
//! entry wins; later ones are logged and dropped.

use crate::bundle::{Bundle, EntryKind, TextureHeader};
use crate::error::{Error, Result};
use crate::identifier::{AssetKind, ResourceIdentifier};
use crate::workspace::ReplacementAsset;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Inject replacement assets for one identifier into a decoded bundle.
///
/// Returns a new handle with only the targeted entries replaced; every other
/// entry shares the original payload allocation. Fails with
/// [`Error::UnrecognizedIdentifier`] when no asset addressed any entry.
pub fn inject(
    bundle: &Bundle,
    identifier: &ResourceIdentifier,
    assets: &[ReplacementAsset],
) -> Result<Bundle> {
    let mut out = bundle.clone();
    let mut replaced: HashSet<usize> = HashSet::new();

    for asset in assets.iter().filter(|a| a.kind.is_injectable()) {
        let target_name = match asset.kind {
            AssetKind::Texture => asset
                .file_name
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(asset.file_name.as_str()),
            _ => asset.file_name.as_str(),
        };

        let Some(index) = out.position(target_name) else {
            debug!(
                "no entry named '{target_name}' in the source bundle for {identifier}"
            );
            continue;
        };

        if !replaced.insert(index) {
            warn!(
                "entry '{target_name}' already replaced by an earlier mod, \
                 dropping {} from '{}'",
                asset.file_name, asset.mod_name
            );
            continue;
        }

        let new_entry = {
            let entry = &out.entries[index];
            let payload = match (asset.kind, entry.kind) {
                (AssetKind::Texture, EntryKind::Texture) => build_texture_payload(asset, entry)?,
                (AssetKind::Atlas, EntryKind::Atlas)
                | (AssetKind::Skeleton, EntryKind::Skeleton) => asset.bytes.clone(),
                (asset_kind, entry_kind) => {
                    warn!(
                        "'{target_name}': {:?} replacement against a {} entry, dropping",
                        asset_kind,
                        entry_kind.name()
                    );
                    replaced.remove(&index);
                    continue;
                }
            };

            info!(
                "replacing '{}' ({} -> {} bytes) from mod '{}'",
                entry.name,
                entry.length,
                payload.len(),
                asset.mod_name
            );
            entry.with_payload(payload)
        };
        out.entries[index] = new_entry;
    }

    if replaced.is_empty() {
        return Err(Error::UnrecognizedIdentifier(format!(
            "{identifier}: no replacement matched an entry in the source bundle"
        )));
    }

    Ok(out)
}

/// Decode a replacement image and convert it to the entry's pixel encoding.
fn build_texture_payload(
    asset: &ReplacementAsset,
    entry: &crate::bundle::Entry,
) -> Result<Vec<u8>> {
    let header = TextureHeader::parse(&entry.payload)?;

    let decoded = image::load_from_memory(&asset.bytes).map_err(|e| {
        Error::UnsupportedImageFormat {
            path: asset.path.clone(),
            reason: e.to_string(),
        }
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();

    if width != header.width || height != header.height {
        return Err(Error::DimensionMismatch {
            entry: entry.name.clone(),
            expected_width: header.width,
            expected_height: header.height,
            got_width: width,
            got_height: height,
        });
    }

    Ok(TextureHeader::build_payload(width, height, rgba.as_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Entry;
    use crate::identifier::AssetCategory;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([1, 2, 3, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn asset(file_name: &str, kind: AssetKind, bytes: Vec<u8>) -> ReplacementAsset {
        ReplacementAsset {
            identifier: ResourceIdentifier::new("char000101"),
            path: PathBuf::from(file_name),
            file_name: file_name.to_string(),
            bytes,
            category: AssetCategory::Idle,
            kind,
            mod_name: "test-mod".to_string(),
        }
    }

    fn bundle_with_texture(width: u32, height: u32) -> Bundle {
        let pixels = vec![0u8; (width * height * 4) as usize];
        Bundle::new(vec![
            Entry::new(
                "char000101.atlas",
                EntryKind::Atlas,
                b"original atlas".to_vec(),
            ),
            Entry::new(
                "char000101",
                EntryKind::Texture,
                TextureHeader::build_payload(width, height, &pixels),
            ),
            Entry::new("unrelated.atlas", EntryKind::Atlas, b"other".to_vec()),
        ])
    }

    #[test]
    fn atlas_replacement_is_wholesale() {
        let bundle = bundle_with_texture(8, 8);
        let id = ResourceIdentifier::new("char000101");
        let assets = vec![asset(
            "char000101.atlas",
            AssetKind::Atlas,
            b"new atlas".to_vec(),
        )];

        let out = inject(&bundle, &id, &assets).unwrap();
        assert_eq!(&*out.entries[0].payload, b"new atlas");
    }

    #[test]
    fn texture_replacement_converts_to_rgba32() {
        let bundle = bundle_with_texture(8, 8);
        let id = ResourceIdentifier::new("char000101");
        let assets = vec![asset("char000101.png", AssetKind::Texture, png_bytes(8, 8))];

        let out = inject(&bundle, &id, &assets).unwrap();
        let header = TextureHeader::parse(&out.entries[1].payload).unwrap();
        assert_eq!((header.width, header.height), (8, 8));
        // First pixel carries the test color.
        let payload = &out.entries[1].payload;
        assert_eq!(&payload[12..16], &[1, 2, 3, 255]);
    }

    #[test]
    fn untouched_entries_share_the_original_allocation() {
        let bundle = bundle_with_texture(8, 8);
        let id = ResourceIdentifier::new("char000101");
        let assets = vec![asset(
            "char000101.atlas",
            AssetKind::Atlas,
            b"new atlas".to_vec(),
        )];

        let out = inject(&bundle, &id, &assets).unwrap();
        assert!(Arc::ptr_eq(
            &bundle.entries[1].payload,
            &out.entries[1].payload
        ));
        assert!(Arc::ptr_eq(
            &bundle.entries[2].payload,
            &out.entries[2].payload
        ));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let bundle = bundle_with_texture(256, 256);
        let id = ResourceIdentifier::new("char000101");
        let assets = vec![asset(
            "char000101.png",
            AssetKind::Texture,
            png_bytes(512, 512),
        )];

        let err = inject(&bundle, &id, &assets).unwrap_err();
        match err {
            Error::DimensionMismatch {
                expected_width,
                got_width,
                ..
            } => {
                assert_eq!(expected_width, 256);
                assert_eq!(got_width, 512);
            }
            other => panic!("expected DimensionMismatch, got {other}"),
        }
    }

    #[test]
    fn garbage_image_is_unsupported() {
        let bundle = bundle_with_texture(8, 8);
        let id = ResourceIdentifier::new("char000101");
        let assets = vec![asset(
            "char000101.png",
            AssetKind::Texture,
            b"not an image at all".to_vec(),
        )];

        let err = inject(&bundle, &id, &assets).unwrap_err();
        assert!(matches!(err, Error::UnsupportedImageFormat { .. }));
    }

    #[test]
    fn no_matching_entry_fails_the_unit() {
        let bundle = bundle_with_texture(8, 8);
        let id = ResourceIdentifier::new("char999999");
        let assets = vec![asset(
            "char999999.atlas",
            AssetKind::Atlas,
            b"new".to_vec(),
        )];

        let err = inject(&bundle, &id, &assets).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedIdentifier(_)));
    }

    #[test]
    fn first_mod_wins_on_collisions() {
        let bundle = bundle_with_texture(8, 8);
        let id = ResourceIdentifier::new("char000101");
        let mut second = asset("char000101.atlas", AssetKind::Atlas, b"second".to_vec());
        second.mod_name = "late-mod".to_string();
        let assets = vec![
            asset("char000101.atlas", AssetKind::Atlas, b"first".to_vec()),
            second,
        ];

        let out = inject(&bundle, &id, &assets).unwrap();
        assert_eq!(&*out.entries[0].payload, b"first");
    }
}

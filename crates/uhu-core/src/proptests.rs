//! Property-based tests for uhu-core.
//!
//! # Properties Tested
//!
//! - Property 1: Chunk partitioning (count, numbering, reassembly)
//! - Property 2: Whole-file hash matches an independent SHA-256
//! - Property 3: Template reload yields identical metadata
//! - Property 4: Installation set values (shared vs per set)

#![cfg(test)]

use std::io::Cursor;
use std::path::Path;

use proptest::prelude::*;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::chunk::{ChunkReader, ChunkSize, FileDigest};
use crate::installation_set::{InstallationSets, ObjectInputs, SetValue};
use crate::mode::Mode;
use crate::object::Object;
use crate::option::{OptionName, OptionValue, OptionValues};

// =============================================================================
// Generators
// =============================================================================

/// File content, empty included.
fn arb_content() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

fn arb_chunk_size() -> impl Strategy<Value = ChunkSize> {
    (1usize..600).prop_map(|n| ChunkSize::new(n).unwrap())
}

/// Block device style target names.
fn arb_target() -> impl Strategy<Value = String> {
    "/dev/[a-z]{2,4}[0-9]"
}

fn write_file(dir: &TempDir, content: &[u8]) -> String {
    let path = dir.path().join("object.bin");
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

fn copy_values(target: &str, format: bool) -> OptionValues {
    [
        (OptionName::TargetType, OptionValue::from("device")),
        (OptionName::Target, OptionValue::from(target)),
        (OptionName::TargetPath, OptionValue::from("/boot")),
        (OptionName::Filesystem, OptionValue::from("ext4")),
        (OptionName::Format, OptionValue::from(format)),
    ]
    .into_iter()
    .collect()
}

// =============================================================================
// Property 1: Chunk partitioning
//
// *For any* content of S bytes and chunk size C, the reader yields
// ceil(S / C) chunks numbered 0..n-1 whose data concatenates to the input.
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_chunk_count_and_numbering(content in arb_content(), chunk_size in arb_chunk_size()) {
        let chunks: Vec<_> = ChunkReader::new(Cursor::new(content.clone()), chunk_size)
            .collect::<Result<_, _>>()
            .unwrap();

        prop_assert_eq!(chunks.len(), content.len().div_ceil(chunk_size.get()));
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.number(), i as u64);
            prop_assert!(!chunk.data().is_empty());
            prop_assert!(chunk.data().len() <= chunk_size.get());
        }

        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.data().iter().copied()).collect();
        prop_assert_eq!(joined, content);
    }

    #[test]
    fn prop_chunk_hash_is_content_hash(content in arb_content(), chunk_size in arb_chunk_size()) {
        for chunk in ChunkReader::new(Cursor::new(content), chunk_size) {
            let chunk = chunk.unwrap();
            let expected: [u8; 32] = Sha256::digest(chunk.data()).into();
            prop_assert_eq!(chunk.sha256sum(), &expected);
        }
    }
}

// =============================================================================
// Property 2: Whole-file hash
//
// *For any* file, the digest hash equals SHA-256 over the full content
// regardless of chunk size.
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_file_hash_independent_of_chunking(
        content in arb_content(),
        a in arb_chunk_size(),
        b in arb_chunk_size(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, &content);

        let first = FileDigest::compute(Path::new(&path), a).unwrap();
        let second = FileDigest::compute(Path::new(&path), b).unwrap();
        let expected: [u8; 32] = Sha256::digest(&content).into();

        prop_assert_eq!(first.sha256sum, expected);
        prop_assert_eq!(second.sha256sum, expected);
        prop_assert_eq!(first.size, content.len() as u64);
    }
}

// =============================================================================
// Property 3: Template round trip
//
// *For any* valid object and unchanged file, metadata generated before and
// after a template reload is identical.
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_template_reload_metadata_idempotent(
        content in arb_content(),
        target in arb_target(),
        format in any::<bool>(),
        chunk_size in arb_chunk_size(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, &content);

        let mut object = Object::new(path, Mode::Copy, &copy_values(&target, format)).unwrap();
        let mut reloaded = Object::from_template(&object.template()).unwrap();

        prop_assert_eq!(&reloaded, &object);
        prop_assert!(!reloaded.is_loaded());
        prop_assert_eq!(
            object.metadata(chunk_size).unwrap(),
            reloaded.metadata(chunk_size).unwrap()
        );
    }
}

// =============================================================================
// Property 4: Installation set values
//
// *For any* N sets, a symmetric option holds the same value in every set and
// a per-set option holds the value given for that set.
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_per_set_values_land_in_their_set(
        targets in prop::collection::vec(arb_target(), 1..5),
    ) {
        let mut inputs: ObjectInputs = copy_values("unused", false)
            .into_iter()
            .map(|(name, value)| (name, SetValue::Shared(value)))
            .collect();
        inputs.insert(OptionName::Filename, SetValue::Shared("rootfs.img".into()));
        inputs.insert(
            OptionName::Target,
            SetValue::PerSet(targets.iter().map(|t| OptionValue::from(t.as_str())).collect()),
        );

        let mut sets = InstallationSets::new();
        sets.add(Mode::Copy, &inputs, Some(targets.len())).unwrap();

        prop_assert_eq!(sets.set_count(), targets.len());
        for (set, target) in targets.iter().enumerate() {
            let object = sets.get(set, 0).unwrap();
            prop_assert_eq!(object.option(OptionName::Target), Some(&OptionValue::from(target.as_str())));
            prop_assert_eq!(object.option(OptionName::Filesystem), Some(&OptionValue::from("ext4")));
        }
    }
}

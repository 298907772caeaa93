//! Property-based tests using proptest.
//!
//! Archives built from random entry sets must read back exactly, and their
//! offsets and end record must agree with the bytes on the wire.

use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian};
use pkzip::{
    CompressionMethod, EndOfCentralDirectory, EntryOptions, LocalFileHeader, WriterOptions,
    ZipFileEntry, ZipWriter, create_archive, open_archive,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct EntryPlan {
    name: String,
    method: CompressionMethod,
    streamed: bool,
    payload: Vec<u8>,
}

fn method_strategy() -> impl Strategy<Value = CompressionMethod> {
    prop_oneof![
        Just(CompressionMethod::Stored),
        Just(CompressionMethod::Deflated),
    ]
}

/// Payloads are either random bytes or a short phrase repeated, so deflate
/// sees both incompressible and compressible input.
fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..2048),
        ("[a-z ]{1,12}", 0usize..400).prop_map(|(phrase, n)| phrase.repeat(n).into_bytes()),
    ]
}

/// Unique names in arbitrary order.
fn entries_strategy() -> impl Strategy<Value = Vec<EntryPlan>> {
    proptest::collection::btree_map(
        "[a-zA-Z0-9_.é-]{1,8}(/[a-zA-Z0-9_.-]{1,8}){0,2}",
        (method_strategy(), any::<bool>(), payload_strategy()),
        0..12,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(name, (method, streamed, payload))| EntryPlan {
                name,
                method,
                streamed,
                payload,
            })
            .collect::<Vec<_>>()
    })
    .prop_shuffle()
}

fn build(plans: &[EntryPlan]) -> Vec<u8> {
    let mut writer = create_archive(Vec::new());
    for plan in plans {
        if plan.streamed {
            writer
                .add_entry_streamed(
                    &plan.name,
                    EntryOptions::new(plan.method),
                    Cursor::new(&plan.payload),
                )
                .unwrap();
        } else {
            writer
                .add_entry(&plan.name, plan.method, &plan.payload)
                .unwrap();
        }
    }
    writer.finish().unwrap()
}

/// A comment of `len` bytes holding end-record signatures whose length
/// field can never match what follows them.
fn lookalike_comment(len: usize, fill: u8) -> Vec<u8> {
    let mut block = vec![0x50, 0x4b, 0x05, 0x06];
    block.extend_from_slice(&[fill; 16]);
    block.extend_from_slice(&[0xff, 0xff, fill, fill]);
    block.iter().copied().cycle().take(len).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every entry reads back byte for byte, in the order it was added.
    #[test]
    fn round_trip_keeps_order_and_bytes(plans in entries_strategy()) {
        let archive = build(&plans);
        let reader = open_archive(archive.as_slice()).unwrap();

        prop_assert_eq!(reader.len(), plans.len());
        for (entry, plan) in reader.list_entries().iter().zip(&plans) {
            prop_assert_eq!(entry.name(), plan.name.as_str());
            prop_assert_eq!(entry.compression_method, plan.method);
            prop_assert_eq!(entry.has_data_descriptor(), plan.streamed);
            prop_assert_eq!(reader.extract(entry).unwrap(), plan.payload.clone());
        }
    }

    /// Each directory record points at a local header for the same name,
    /// and the end record brackets the directory exactly.
    #[test]
    fn offsets_and_end_record_agree(plans in entries_strategy()) {
        let archive = build(&plans);
        let reader = open_archive(archive.as_slice()).unwrap();

        let mut expected_offset = 0usize;
        for entry in reader.list_entries() {
            prop_assert_eq!(entry.lfh_offset as usize, expected_offset);
            let (header, consumed) =
                LocalFileHeader::decode(&archive[expected_offset..]).unwrap();
            prop_assert_eq!(&header.file_name, &entry.file_name);

            expected_offset += consumed + entry.compressed_size as usize;
            if entry.has_data_descriptor() {
                expected_offset += 16;
            }
        }

        let end = reader.end_record();
        let directory_len: usize = reader.list_entries().iter().map(|e| e.central_len()).sum();
        prop_assert_eq!(end.cd_offset as usize, expected_offset);
        prop_assert_eq!(end.cd_size as usize, directory_len);
        prop_assert_eq!(end.total_entries as usize, plans.len());
        prop_assert_eq!(
            end.cd_offset as usize + directory_len,
            archive.len() - EndOfCentralDirectory::SIZE
        );
        if !plans.is_empty() {
            prop_assert_eq!(
                LittleEndian::read_u32(&archive[end.cd_offset as usize..]),
                ZipFileEntry::SIGNATURE
            );
        }
    }

    /// The end record is found behind a comment of any length.
    #[test]
    fn comment_of_any_length_is_found(
        len in 0usize..=65535,
        fill in any::<u8>(),
        method in method_strategy(),
    ) {
        let comment = lookalike_comment(len, fill);
        let options = WriterOptions::new().with_comment(comment.clone()).unwrap();
        let mut writer = ZipWriter::with_options(Vec::new(), options);
        writer.add_entry("a.txt", method, b"payload").unwrap();
        let archive = writer.finish().unwrap();

        let reader = open_archive(archive.as_slice()).unwrap();
        prop_assert_eq!(reader.comment(), comment.as_slice());
        prop_assert_eq!(reader.read_entry("a.txt").unwrap(), b"payload".to_vec());
    }
}

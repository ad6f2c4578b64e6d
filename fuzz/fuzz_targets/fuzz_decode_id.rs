#![no_main]

use labelcache::codec::{self, ID_FIELD_LEN, MAX_ID};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Varint parsing
    if let Some((value, read)) = codec::uvarint(data) {
        assert!((1..=10).contains(&read) && read <= data.len());

        // Non-minimal encodings are accepted, so compare values rather
        // than bytes
        let mut buf = [0u8; 10];
        let written = codec::put_uvarint(&mut buf, value).expect("10 bytes fit any u64");
        assert!(written <= read);
        assert_eq!(codec::uvarint(&buf[..written]), Some((value, written)));
    }

    // Fixed ID fields
    if data.len() >= ID_FIELD_LEN {
        if let Ok(id) = codec::decode_id(&data[..ID_FIELD_LEN]) {
            assert!(id <= MAX_ID);
            let field = codec::encode_id(id).expect("decoded id must re-encode");
            assert_eq!(codec::decode_id(&field).ok(), Some(id));
        }

        let mut raw = [0u8; 8];
        raw.copy_from_slice(&data[..8]);
        let id = u64::from_le_bytes(raw);
        match codec::encode_id(id) {
            Ok(field) => {
                assert!(id <= MAX_ID);
                assert_eq!(codec::decode_id(&field).ok(), Some(id));
            }
            Err(_) => assert!(id > MAX_ID),
        }
    }
});

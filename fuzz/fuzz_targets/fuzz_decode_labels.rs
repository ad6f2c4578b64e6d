#![no_main]

use labelcache::codec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must never panic
    if let Ok(labels) = codec::decode_labels(data) {
        assert!(labels.len() <= codec::MAX_FIELD_LEN);
        for label in labels.iter() {
            assert!(label.name.len() <= codec::MAX_FIELD_LEN);
            assert!(label.value.len() <= codec::MAX_FIELD_LEN);
        }

        // Roundtrip test: the decoder rejects trailing bytes, so re-encoding
        // must reproduce the input exactly
        assert_eq!(codec::encoded_len(&labels).ok(), Some(data.len()));
        let encoded = codec::encode_labels_to_vec(&labels).expect("re-encode failed");
        assert_eq!(encoded, data, "roundtrip mismatch");
    }
});

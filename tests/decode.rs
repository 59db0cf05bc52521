use giflet::{
    parse, BodyElement, DecodingError, DisposalMethod, Version,
};

/// 7-byte logical screen descriptor.
fn screen_descriptor(width: u16, height: u16, flags: u8) -> Vec<u8> {
    let [w_lo, w_hi] = width.to_le_bytes();
    let [h_lo, h_hi] = height.to_le_bytes();
    vec![w_lo, w_hi, h_lo, h_hi, flags, 0x00, 0x00]
}

#[test]
fn minimal_container_has_empty_body() {
    let mut data = b"GIF89a".to_vec();
    data.extend(screen_descriptor(2, 1, 0x00));
    data.push(0x3B);

    let container = parse(data.as_slice()).unwrap();
    assert_eq!(container.version, Version::V89a);
    assert_eq!(container.screen.width, 2);
    assert_eq!(container.screen.height, 1);
    assert!(!container.screen.has_global_table);
    assert!(container.global_palette.is_none());
    assert!(container.body.is_empty());
}

#[test]
fn netscape_extension_exposes_identifier_and_loop_count() {
    let mut data = b"GIF89a".to_vec();
    data.extend(screen_descriptor(1, 1, 0x00));
    data.extend([0x21, 0xFF, 0x0B]);
    data.extend(b"NETSCAPE2.0");
    data.extend([0x03, 0x01, 0x2C, 0x01, 0x00]);
    data.push(0x3B);

    let container = parse(data.as_slice()).unwrap();
    assert_eq!(container.body.len(), 1);
    let app = match &container.body[0] {
        BodyElement::Application(app) => app,
        other => panic!("expected application extension, got {other:?}"),
    };
    assert_eq!(&app.identifier, b"NETSCAPE2.0");
    assert_eq!(app.loop_count(), Some(300));
}

#[test]
fn full_container_parses_in_stream_order() {
    let payload = giflet::lzw::compress(2, &[0, 1, 1, 0]).unwrap();

    let mut data = b"GIF89a".to_vec();
    // global table present, color resolution 1, 4 entries
    data.extend(screen_descriptor(4, 4, 0b1001_0001));
    data.extend([10, 10, 10, 20, 20, 20, 30, 30, 30, 40, 40, 40]);
    // looping animation marker
    data.extend([0x21, 0xFF, 0x0B]);
    data.extend(b"NETSCAPE2.0");
    data.extend([0x03, 0x01, 0x00, 0x00, 0x00]);
    // graphics control: keep, transparent index 3, delay 100
    data.extend([0x21, 0xF9, 0x04, 0b0000_0101, 100, 0, 3, 0x00]);
    // 2x2 image at (1, 2) with a 2-entry local table
    data.extend([0x2C, 1, 0, 2, 0, 2, 0, 2, 0, 0b1000_0000]);
    data.extend([1, 2, 3, 4, 5, 6]);
    data.push(2);
    data.extend(giflet::split_into_sub_blocks(&payload));
    // comment
    data.extend([0x21, 0xFE, 0x05]);
    data.extend(b"hello");
    data.push(0x00);
    // plain text with an untouched 12-byte layout header
    data.extend([0x21, 0x01, 0x0C]);
    data.extend([0u8; 12]);
    data.extend([0x02, b'H', b'i', 0x00]);
    data.push(0x3B);

    let container = parse(data.as_slice()).unwrap();
    assert_eq!(container.global_palette.as_ref().unwrap().len(), 4);
    assert_eq!(container.global_palette.as_ref().unwrap().rgb(1), Some([20, 20, 20]));
    assert_eq!(container.screen.color_resolution, 1);
    assert_eq!(container.body.len(), 4);

    match &container.body[0] {
        BodyElement::Application(app) => assert_eq!(app.loop_count(), Some(0)),
        other => panic!("expected application extension, got {other:?}"),
    }

    let image = match &container.body[1] {
        BodyElement::Image(image) => image,
        other => panic!("expected image block, got {other:?}"),
    };
    let control = image.control.expect("control data was present");
    assert_eq!(control.disposal, DisposalMethod::Keep);
    assert_eq!(control.delay, 100);
    assert_eq!(control.transparent, Some(3));
    assert!(!control.user_input);
    assert_eq!(
        (image.descriptor.left, image.descriptor.top),
        (1, 2)
    );
    assert_eq!(
        (image.descriptor.width, image.descriptor.height),
        (2, 2)
    );
    assert!(!image.descriptor.interlaced);
    assert_eq!(image.palette.as_ref().unwrap().rgb(0), Some([1, 2, 3]));
    assert_eq!(image.data.min_code_size, 2);
    assert_eq!(image.data.bytes, payload);

    match &container.body[2] {
        BodyElement::Comment(comment) => assert_eq!(comment.text, b"hello"),
        other => panic!("expected comment extension, got {other:?}"),
    }
    match &container.body[3] {
        BodyElement::PlainText(text) => {
            assert_eq!(text.header.len(), 12);
            assert_eq!(text.data, b"Hi");
        }
        other => panic!("expected plain text extension, got {other:?}"),
    }
}

#[test]
fn decoded_image_prefers_local_palette() {
    let payload = giflet::lzw::compress(2, &[0, 1, 1, 0]).unwrap();

    let mut data = b"GIF87a".to_vec();
    data.extend(screen_descriptor(2, 2, 0b1000_0000)); // 2-entry global table
    data.extend([9, 9, 9, 8, 8, 8]);
    data.extend([0x2C, 0, 0, 0, 0, 2, 0, 2, 0, 0b1000_0000]);
    data.extend([1, 2, 3, 4, 5, 6]);
    data.push(2);
    data.extend(giflet::split_into_sub_blocks(&payload));
    data.push(0x3B);

    let container = parse(data.as_slice()).unwrap();
    let decoded = container.decode_images().unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].indices, [0, 1, 1, 0]);
    assert_eq!(decoded[0].palette.as_ref().unwrap().rgb(0), Some([1, 2, 3]));
    assert!(decoded[0].control.is_none());
}

#[test]
fn decoded_image_falls_back_to_global_palette() {
    let payload = giflet::lzw::compress(2, &[0, 1]).unwrap();

    let mut data = b"GIF89a".to_vec();
    data.extend(screen_descriptor(2, 1, 0b1000_0000));
    data.extend([9, 9, 9, 8, 8, 8]);
    data.extend([0x2C, 0, 0, 0, 0, 2, 0, 1, 0, 0x00]);
    data.push(2);
    data.extend(giflet::split_into_sub_blocks(&payload));
    data.push(0x3B);

    let container = parse(data.as_slice()).unwrap();
    let decoded = container.decode_images().unwrap();
    assert_eq!(decoded[0].palette.as_ref().unwrap().rgb(0), Some([9, 9, 9]));
    assert_eq!(decoded[0].indices, [0, 1]);
}

#[test]
fn index_stream_must_cover_the_frame() {
    // descriptor says 3x1 but the payload only encodes two indices
    let payload = giflet::lzw::compress(2, &[0, 1]).unwrap();

    let mut data = b"GIF89a".to_vec();
    data.extend(screen_descriptor(3, 1, 0x00));
    data.extend([0x2C, 0, 0, 0, 0, 3, 0, 1, 0, 0x00]);
    data.push(2);
    data.extend(giflet::split_into_sub_blocks(&payload));
    data.push(0x3B);

    let container = parse(data.as_slice()).unwrap();
    assert!(matches!(
        container.decode_images(),
        Err(DecodingError::FrameSizeMismatch {
            expected: 3,
            actual: 2
        })
    ));
}

#[test]
fn corrupt_payload_surfaces_as_codec_error() {
    // 0xFF reads as code 7 at 3 bits, which nothing has assigned
    let mut data = b"GIF89a".to_vec();
    data.extend(screen_descriptor(1, 1, 0x00));
    data.extend([0x2C, 0, 0, 0, 0, 1, 0, 1, 0, 0x00]);
    data.push(2);
    data.extend(giflet::split_into_sub_blocks(&[0xFF]));
    data.push(0x3B);

    let container = parse(data.as_slice()).unwrap();
    assert!(matches!(
        container.decode_images(),
        Err(DecodingError::Lzw(_))
    ));
}

#[test]
fn unexpected_body_tag_reports_offset() {
    let mut data = b"GIF89a".to_vec();
    data.extend(screen_descriptor(1, 1, 0x00));
    data.push(0x99);

    assert!(matches!(
        parse(data.as_slice()),
        Err(DecodingError::MalformedStream {
            tag: 0x99,
            offset: 13
        })
    ));
}

#[test]
fn unknown_extension_label_reports_offset() {
    let mut data = b"GIF89a".to_vec();
    data.extend(screen_descriptor(1, 1, 0x00));
    data.extend([0x21, 0x42]);

    assert!(matches!(
        parse(data.as_slice()),
        Err(DecodingError::MalformedStream {
            tag: 0x42,
            offset: 14
        })
    ));
}

#[test]
fn truncation_fails_at_every_structural_boundary() {
    let payload = giflet::lzw::compress(2, &[0, 1, 1, 0]).unwrap();

    let mut data = b"GIF89a".to_vec();
    data.extend(screen_descriptor(2, 2, 0b1000_0000));
    data.extend([9, 9, 9, 8, 8, 8]);
    data.extend([0x2C, 0, 0, 0, 0, 2, 0, 2, 0, 0x00]);
    data.push(2);
    data.extend(giflet::split_into_sub_blocks(&payload));
    data.push(0x3B);

    // the complete stream parses; every proper prefix must not
    assert!(parse(data.as_slice()).is_ok());
    for len in 0..data.len() {
        assert!(
            matches!(
                parse(&data[..len]),
                Err(DecodingError::TruncatedStream) | Err(DecodingError::MalformedHeader)
            ),
            "prefix of {len} bytes"
        );
    }
}

#[test]
fn header_variants() {
    for (version, expected) in [(&b"87a"[..], Version::V87a), (b"89a", Version::V89a)] {
        let mut data = b"GIF".to_vec();
        data.extend(version);
        data.extend(screen_descriptor(1, 1, 0x00));
        data.push(0x3B);
        assert_eq!(parse(data.as_slice()).unwrap().version, expected);
    }

    let mut data = b"GIF90a".to_vec();
    data.extend(screen_descriptor(1, 1, 0x00));
    data.push(0x3B);
    assert!(matches!(
        parse(data.as_slice()),
        Err(DecodingError::MalformedHeader)
    ));
}

#[test]
fn control_extension_must_precede_an_image() {
    // control data followed by the trailer instead of an image separator
    let mut data = b"GIF89a".to_vec();
    data.extend(screen_descriptor(1, 1, 0x00));
    data.extend([0x21, 0xF9, 0x04, 0x00, 0, 0, 0, 0x00]);
    data.push(0x3B);

    assert!(matches!(
        parse(data.as_slice()),
        Err(DecodingError::MalformedStream { tag: 0x3B, .. })
    ));
}

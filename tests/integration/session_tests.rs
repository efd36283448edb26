//! Decoder and encoder session tests.
//!
//! Most tests drive the sessions through [`MockCodec`] so the exact pixel
//! values and the batch shapes seen by the codec can be checked. The last
//! section runs full round trips through the `image` backend.

use exifpix::exif::orientation;
use exifpix::{
    codec::markers, ColorSpace, DctMethod, Decoder, DecoderOptions, DitherMode, DitherOptions,
    Encoder, EncoderOptions, ErrorKind, Orientation, PixelFormat, Scale, Value,
};
use serde_json::json;

use super::test_utils::{
    create_rgb_jpeg, jpeg_with_exif, orientation_blob, ByteOrderType, ExifBuilder, Ifd, MockCodec,
};

fn decoder(codec: &MockCodec, options: DecoderOptions) -> Decoder<MockCodec> {
    Decoder::with_codec(codec.clone(), options).unwrap()
}

fn rgb_sample(x: usize, y: usize) -> [u8; 3] {
    [
        MockCodec::sample(x, y, 0),
        MockCodec::sample(x, y, 1),
        MockCodec::sample(x, y, 2),
    ]
}

// =============================================================================
// Decode Pipeline
// =============================================================================

#[test]
fn test_decode_reads_in_batches_of_ten() {
    let codec = MockCodec::new(7, 23);
    let mut dec = decoder(&codec, DecoderOptions::default());
    let decoded = dec.decode(b"").unwrap();

    assert_eq!(codec.log().read_requests, [10, 10, 3]);
    assert_eq!(decoded.data().len(), 7 * 23 * 3);

    for y in 0..23 {
        for x in 0..7 {
            let i = (y * 7 + x) * 3;
            assert_eq!(decoded.data()[i..i + 3], rgb_sample(x, y));
        }
    }
}

#[test]
fn test_decode_requests_layout_color_space() {
    let cases = [
        (PixelFormat::Rgb, ColorSpace::Rgb),
        (PixelFormat::Bgrx, ColorSpace::Rgb),
        (PixelFormat::Grayscale, ColorSpace::Grayscale),
        (PixelFormat::Yuv444, ColorSpace::YCbCr),
        (PixelFormat::Yvu444, ColorSpace::YCbCr),
    ];

    for (format, expected) in cases {
        let codec = MockCodec::new(3, 3);
        decoder(
            &codec,
            DecoderOptions {
                pixel_format: format,
                ..Default::default()
            },
        )
        .decode(b"")
        .unwrap();

        let params = codec.log().decode_params[0];
        assert_eq!(params.out_color_space, expected, "{}", format);
        assert!(params.quantize.is_none());
    }
}

#[test]
fn test_decode_passes_tuning_to_codec() {
    let codec = MockCodec::new(4, 4);
    decoder(
        &codec,
        DecoderOptions::from_json(&json!({
            "scale": "1/4",
            "dct_method": "FLOAT",
            "output_gamma": 1.8,
            "do_smoothing": true,
        }))
        .unwrap(),
    )
    .decode(b"")
    .unwrap();

    let params = codec.log().decode_params[0];
    assert_eq!(params.scale, Scale::new(1, 4).unwrap());
    assert_eq!(params.dct_method, DctMethod::Float);
    assert_eq!(params.output_gamma, Some(1.8));
    assert_eq!(params.fancy_upsampling, None);
    assert_eq!(params.block_smoothing, Some(true));
}

#[test]
fn test_decode_bgr_and_bgrx() {
    let codec = MockCodec::new(4, 2);

    let bgr = decoder(
        &codec,
        DecoderOptions {
            pixel_format: PixelFormat::Bgr,
            ..Default::default()
        },
    )
    .decode(b"")
    .unwrap();
    let [r, g, b] = rgb_sample(3, 1);
    assert_eq!(bgr.data()[(4 + 3) * 3..(4 + 3) * 3 + 3], [b, g, r]);

    let bgrx = decoder(
        &codec,
        DecoderOptions {
            pixel_format: PixelFormat::Bgrx,
            ..Default::default()
        },
    )
    .decode(b"")
    .unwrap();
    assert_eq!(bgrx.data().len(), 4 * 2 * 4);
    assert_eq!(bgrx.data()[(4 + 3) * 4..(4 + 3) * 4 + 4], [b, g, r, 0xFF]);

    let meta = bgrx.meta.unwrap();
    assert_eq!(meta.output_colorspace, ColorSpace::Bgrx);
    assert_eq!(meta.num_components, 4);
    assert_eq!(meta.stride, 16);
}

#[test]
fn test_decode_yvu_swaps_chroma() {
    let codec = MockCodec::new(2, 2);
    let decoded = decoder(
        &codec,
        DecoderOptions {
            pixel_format: PixelFormat::Yvu444,
            ..Default::default()
        },
    )
    .decode(b"")
    .unwrap();

    let [y, cb, cr] = rgb_sample(1, 1);
    assert_eq!(decoded.data()[9..12], [y, cr, cb]);
    assert_eq!(decoded.meta.unwrap().output_colorspace, ColorSpace::YCrCb);
}

#[test]
fn test_decode_applies_orientation() {
    let (w, h) = (5, 3);
    let codec = MockCodec::new(w as u32, h as u32)
        .with_app1(orientation_blob(ByteOrderType::LittleEndian, 6));

    let mut dec = decoder(
        &codec,
        DecoderOptions {
            apply_orientation: true,
            ..Default::default()
        },
    );
    let decoded = dec.decode(b"").unwrap();

    // Quarter turn clockwise: output (x, y) comes from source (y, h - 1 - x)
    assert_eq!((decoded.pixels.width(), decoded.pixels.height()), (h, w));
    for y in 0..w {
        for x in 0..h {
            let i = (y * h + x) * 3;
            assert_eq!(decoded.data()[i..i + 3], rgb_sample(y, h - 1 - x), "({}, {})", x, y);
        }
    }

    let meta = decoded.meta.unwrap();
    assert_eq!((meta.width, meta.height), (h, w));
    assert_eq!(meta.stride, h * 3);
}

#[test]
fn test_orientation_ignored_unless_requested() {
    let codec = MockCodec::new(5, 3).with_app1(orientation_blob(ByteOrderType::BigEndian, 8));
    let decoded = decoder(&codec, DecoderOptions::default()).decode(b"").unwrap();

    assert_eq!((decoded.pixels.width(), decoded.pixels.height()), (5, 3));
    let meta = decoded.meta.unwrap();
    assert_eq!((meta.width, meta.height), (5, 3));
}

#[test]
fn test_malformed_orientation_is_identity() {
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().long(0x0112, &[6]))
        .build();
    let codec = MockCodec::new(4, 2).with_app1(blob);

    let decoded = decoder(
        &codec,
        DecoderOptions {
            apply_orientation: true,
            ..Default::default()
        },
    )
    .decode(b"")
    .unwrap();

    assert_eq!((decoded.pixels.width(), decoded.pixels.height()), (4, 2));
    assert_eq!(decoded.data()[..3], rgb_sample(0, 0));
}

#[test]
fn test_codec_warnings_do_not_fail() {
    let codec = MockCodec::new(3, 3).with_warning("Corrupt JPEG data: 2 extraneous bytes");
    let decoded = decoder(&codec, DecoderOptions::default()).decode(b"").unwrap();
    assert_eq!(decoded.data().len(), 27);
}

// =============================================================================
// Metadata
// =============================================================================

#[test]
fn test_meta_with_exif_tags() {
    let blob = ExifBuilder::new(ByteOrderType::BigEndian)
        .ifd0(
            Ifd::new()
                .ascii(0x010f, "Sony")
                .short(0x0112, &[6])
                .sub_ifd(0x8769, Ifd::new().rational(0x829a, &[(1, 60)])),
        )
        .build();
    let codec = MockCodec::new(6, 4).with_app1(blob);

    let options = DecoderOptions {
        with_exif_tags: true,
        apply_orientation: true,
        ..Default::default()
    };
    let mut dec = decoder(&codec, options);

    let header_meta = dec.read_header(b"").unwrap();
    let decoded_meta = dec.decode(b"").unwrap().meta.unwrap();
    assert_eq!(header_meta, decoded_meta);

    assert_eq!((header_meta.width, header_meta.height), (4, 6));
    assert_eq!(header_meta.original_colorspace, ColorSpace::YCbCr);
    assert_eq!(header_meta.output_colorspace, ColorSpace::Rgb);

    let tags = header_meta.exif_tags.as_ref().unwrap();
    assert_eq!(tags.get("make").and_then(Value::as_text), Some("Sony"));
    assert!(tags.document("exif").is_some());

    let json = serde_json::to_value(&header_meta).unwrap();
    assert_eq!(json["exif_tags"]["exif"]["exposure_time"], json!({"numerator": 1, "denominator": 60}));
    assert_eq!(json["original_colorspace"], "YCbCr");
    assert!(json.get("colormap").is_none());
}

#[test]
fn test_meta_without_exif_segment() {
    let codec = MockCodec::new(2, 2);
    let meta = decoder(
        &codec,
        DecoderOptions {
            with_exif_tags: true,
            ..Default::default()
        },
    )
    .read_header(b"")
    .unwrap();
    assert_eq!(meta.exif_tags.map(|d| d.is_empty()), Some(true));
}

#[test]
fn test_exif_tags_skipped_by_default() {
    let codec = MockCodec::new(2, 2).with_app1(orientation_blob(ByteOrderType::LittleEndian, 1));
    let meta = decoder(&codec, DecoderOptions::default()).read_header(b"").unwrap();
    assert!(meta.exif_tags.is_none());
    assert!(serde_json::to_value(&meta).unwrap().get("exif_tags").is_none());
}

#[test]
fn test_broken_exif_fails_meta() {
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().raw(0x010f, 13, &[0; 4]))
        .build();
    let codec = MockCodec::new(2, 2).with_app1(blob);
    let err = decoder(
        &codec,
        DecoderOptions {
            with_exif_tags: true,
            ..Default::default()
        },
    )
    .decode(b"")
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_without_meta() {
    let codec = MockCodec::new(2, 2);
    let decoded = decoder(
        &codec,
        DecoderOptions {
            without_meta: true,
            with_exif_tags: true,
            ..Default::default()
        },
    )
    .decode(b"")
    .unwrap();
    assert!(decoded.meta.is_none());
    assert_eq!(decoded.into_data().len(), 12);
}

// =============================================================================
// Palette Output
// =============================================================================

fn dithered(pixel_format: PixelFormat, expand_colormap: bool) -> DecoderOptions {
    DecoderOptions {
        pixel_format,
        dither: Some(DitherOptions {
            mode: DitherMode::Ordered,
            two_pass: false,
            colors: 8,
        }),
        expand_colormap,
        ..Default::default()
    }
}

#[test]
fn test_quantized_indices_and_colormap() {
    let codec = MockCodec::new(5, 12);
    let decoded = decoder(&codec, dithered(PixelFormat::Rgb, false))
        .decode(b"")
        .unwrap();

    let params = codec.log().decode_params[0];
    assert_eq!(params.quantize.map(|q| q.colors), Some(8));
    assert_eq!(codec.log().read_requests, [10, 2]);

    assert_eq!(decoded.data().len(), 60);
    assert_eq!(decoded.data()[5 + 4], (4 + 1) % 8);

    let meta = decoded.meta.unwrap();
    assert_eq!(meta.num_components, 1);
    assert_eq!(meta.stride, 5);
    let colormap = meta.colormap.unwrap();
    assert_eq!(colormap.len(), 8);
    assert_eq!(colormap[1], (10 << 16) | (20 << 8) | 30);
}

#[test]
fn test_quantized_expanded_bgr() {
    let codec = MockCodec::new(4, 1);
    let decoded = decoder(&codec, dithered(PixelFormat::Bgr, true))
        .decode(b"")
        .unwrap();

    // Index 2 is (20, 40, 60) in RGB order
    assert_eq!(decoded.data()[6..9], [60, 40, 20]);

    let meta = decoded.meta.unwrap();
    assert_eq!(meta.num_components, 3);
    assert_eq!(meta.colormap.unwrap()[2], (60 << 16) | (40 << 8) | 20);
}

#[test]
fn test_dither_none_disables_quantization() {
    let codec = MockCodec::new(3, 3);
    let mut options = dithered(PixelFormat::Rgb, false);
    if let Some(d) = options.dither.as_mut() {
        d.mode = DitherMode::None;
    }

    let decoded = decoder(&codec, options).decode(b"").unwrap();
    assert!(codec.log().decode_params[0].quantize.is_none());
    assert_eq!(decoded.data().len(), 27);
    assert!(decoded.meta.unwrap().colormap.is_none());
}

#[test]
fn test_read_header_has_no_colormap() {
    let codec = MockCodec::new(3, 3);
    let meta = decoder(&codec, dithered(PixelFormat::Rgb, false))
        .read_header(b"")
        .unwrap();
    assert_eq!(meta.num_components, 1);
    assert!(meta.colormap.is_none());
}

#[test]
fn test_dither_option_validation() {
    let mut options = dithered(PixelFormat::Rgb, false);
    if let Some(d) = options.dither.as_mut() {
        d.colors = 300;
    }
    let err = Decoder::with_codec(MockCodec::new(1, 1), options).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Range);

    let err = Decoder::with_codec(MockCodec::new(1, 1), dithered(PixelFormat::Rgbx, false))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

// =============================================================================
// Encode Pipeline
// =============================================================================

#[test]
fn test_encode_writes_in_batches_of_ten() {
    let codec = MockCodec::new(0, 0);
    let enc = Encoder::with_codec(
        codec.clone(),
        5,
        23,
        EncoderOptions {
            pixel_format: PixelFormat::Rgb,
            ..Default::default()
        },
    )
    .unwrap();

    let raw: Vec<u8> = (0..enc.input_len()).map(|i| i as u8).collect();
    let rows = enc.encode(&raw).unwrap();

    assert_eq!(codec.log().write_batches, [10, 10, 3]);
    assert_eq!(&rows[..], &raw[..]);

    let params = codec.log().encode_params[0];
    assert_eq!((params.width, params.height), (5, 23));
    assert_eq!(params.color_space, ColorSpace::Rgb);
    assert_eq!(params.quality, 75);
}

#[test]
fn test_encode_passes_dct_method() {
    let codec = MockCodec::new(0, 0);
    let enc = Encoder::with_codec(
        codec.clone(),
        1,
        1,
        EncoderOptions {
            pixel_format: PixelFormat::Grayscale,
            dct_method: DctMethod::Islow,
            ..Default::default()
        },
    )
    .unwrap();
    enc.encode(&[7]).unwrap();
    assert_eq!(codec.log().encode_params[0].dct_method, DctMethod::Islow);
}

#[test]
fn test_encode_yuv422_rows() {
    let codec = MockCodec::new(0, 0);
    let enc = Encoder::with_codec(codec.clone(), 2, 1, EncoderOptions::default()).unwrap();
    let rows = enc.encode(&[10, 20, 30, 40]).unwrap();

    assert_eq!(&rows[..], &[10, 20, 40, 30, 20, 40]);
    assert_eq!(codec.log().encode_params[0].color_space, ColorSpace::YCbCr);
}

#[test]
fn test_encode_strided_bgrx() {
    let codec = MockCodec::new(0, 0);
    let enc = Encoder::with_codec(
        codec.clone(),
        2,
        2,
        EncoderOptions {
            pixel_format: PixelFormat::Bgrx,
            stride: Some(12),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(enc.input_len(), 24);

    let raw = [
        3, 2, 1, 0, 6, 5, 4, 0, 0, 0, 0, 0, //
        9, 8, 7, 0, 12, 11, 10, 0, 0, 0, 0, 0,
    ];
    let rows = enc.encode(&raw).unwrap();
    assert_eq!(&rows[..], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
}

#[test]
fn test_encode_orientation_marker() {
    let codec = MockCodec::new(0, 0);
    let enc = Encoder::with_codec(
        codec.clone(),
        2,
        2,
        EncoderOptions {
            pixel_format: PixelFormat::Grayscale,
            orientation: Some(Orientation::RightBottom),
            ..Default::default()
        },
    )
    .unwrap();
    enc.encode(&[0; 4]).unwrap();

    let log = codec.log();
    assert_eq!(log.markers_written.len(), 1);
    let marker = &log.markers_written[0];
    assert_eq!(marker.marker, markers::APP1);
    assert!(marker.is_exif());
    assert_eq!(orientation::resolve(&marker.payload), Orientation::RightBottom);
}

#[test]
fn test_encode_without_orientation_writes_no_marker() {
    let codec = MockCodec::new(0, 0);
    let enc = Encoder::with_codec(codec.clone(), 1, 1, EncoderOptions::default()).unwrap();
    enc.encode(&[0; 4]).unwrap();
    assert!(codec.log().markers_written.is_empty());
}

#[test]
fn test_encoder_validation() {
    let new = |w, h, options| Encoder::with_codec(MockCodec::new(0, 0), w, h, options);

    let err = new(70_000, 1, EncoderOptions::default()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Range);

    let err = new(
        4,
        4,
        EncoderOptions {
            quality: 101,
            ..Default::default()
        },
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Range);

    let err = new(
        4,
        4,
        EncoderOptions {
            pixel_format: PixelFormat::Yvu444,
            ..Default::default()
        },
    )
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

// =============================================================================
// Round Trips
// =============================================================================

#[test]
fn test_roundtrip_rgb_to_bgr() {
    let (w, h) = (24usize, 16usize);
    let raw: Vec<u8> = (0..h)
        .flat_map(|y| (0..w).flat_map(move |x| [(x * 10) as u8, (y * 15) as u8, 128]))
        .collect();

    let enc = Encoder::new(
        w,
        h,
        EncoderOptions {
            pixel_format: PixelFormat::Rgb,
            quality: 95,
            ..Default::default()
        },
    )
    .unwrap();
    let jpeg = enc.encode(&raw).unwrap();
    assert!(!exifpix::is_broken(&jpeg));

    let mut dec = Decoder::new(DecoderOptions {
        pixel_format: PixelFormat::Bgr,
        ..Default::default()
    })
    .unwrap();
    let decoded = dec.decode(&jpeg).unwrap();
    assert_eq!((decoded.pixels.width(), decoded.pixels.height()), (w, h));

    for (src, out) in raw.chunks_exact(3).zip(decoded.data().chunks_exact(3)) {
        for c in 0..3 {
            let diff = (src[c] as i32 - out[2 - c] as i32).abs();
            assert!(diff <= 24, "{:?} vs {:?}", src, out);
        }
    }
}

#[test]
fn test_roundtrip_orientation() {
    let enc = Encoder::new(
        20,
        10,
        EncoderOptions {
            pixel_format: PixelFormat::Grayscale,
            orientation: Some(Orientation::LeftBottom),
            ..Default::default()
        },
    )
    .unwrap();
    let jpeg = enc.encode(&[90; 200]).unwrap();

    let mut dec = Decoder::new(DecoderOptions {
        pixel_format: PixelFormat::Grayscale,
        apply_orientation: true,
        with_exif_tags: true,
        ..Default::default()
    })
    .unwrap();

    let meta = dec.read_header(&jpeg).unwrap();
    assert_eq!((meta.width, meta.height), (10, 20));
    assert_eq!(meta.original_colorspace, ColorSpace::Grayscale);
    assert_eq!(meta.exif_tags.as_ref().and_then(|t| t.integer("orientation")), Some(8));

    let decoded = dec.decode(&jpeg).unwrap();
    assert_eq!((decoded.pixels.width(), decoded.pixels.height()), (10, 20));
}

#[test]
fn test_decode_scaled_real_image() {
    let jpeg = create_rgb_jpeg(33, 21);
    let mut dec = Decoder::new(DecoderOptions {
        scale: Scale::new(1, 2).unwrap(),
        ..Default::default()
    })
    .unwrap();

    let header_meta = dec.read_header(&jpeg).unwrap();
    assert_eq!((header_meta.width, header_meta.height), (17, 11));

    let decoded = dec.decode(&jpeg).unwrap();
    assert_eq!((decoded.pixels.width(), decoded.pixels.height()), (17, 11));
    assert_eq!(decoded.data().len(), 17 * 11 * 3);
    assert_eq!(decoded.meta, Some(header_meta));
}

#[test]
fn test_decode_jpeg_with_camera_exif() {
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().ascii(0x0110, "X100").short(0x0112, &[3]))
        .thumbnail(Ifd::new(), &[0xFF, 0xD8, 0xFF, 0xD9])
        .build();
    let jpeg = jpeg_with_exif(&create_rgb_jpeg(12, 8), blob);

    let mut dec = Decoder::new(DecoderOptions {
        pixel_format: PixelFormat::Rgbx,
        with_exif_tags: true,
        apply_orientation: true,
        ..Default::default()
    })
    .unwrap();
    let decoded = dec.decode(&jpeg).unwrap();

    assert_eq!(decoded.data().len(), 12 * 8 * 4);
    assert!(decoded.data().chunks_exact(4).all(|px| px[3] == 0xFF));

    let meta = decoded.meta.unwrap();
    assert_eq!((meta.width, meta.height), (12, 8));
    let tags = meta.exif_tags.unwrap();
    assert_eq!(tags.get("model").and_then(Value::as_text), Some("X100"));
    assert!(tags.document("thumbnail").is_some());
}

#[test]
fn test_decode_quantized_real_image() {
    let jpeg = create_rgb_jpeg(16, 16);
    let mut dec = Decoder::new(DecoderOptions {
        pixel_format: PixelFormat::Rgb,
        dither: Some(DitherOptions {
            mode: DitherMode::FloydSteinberg,
            two_pass: true,
            colors: 32,
        }),
        ..Default::default()
    })
    .unwrap();

    let decoded = dec.decode(&jpeg).unwrap();
    let colormap = decoded.meta.as_ref().unwrap().colormap.as_ref().unwrap();
    assert!(!colormap.is_empty() && colormap.len() <= 32);
    assert!(decoded.data().iter().all(|&i| (i as usize) < colormap.len()));
}

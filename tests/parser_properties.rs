//! Property-based tests for the frame parsers and stream sessions
//!
//! Tests cover:
//! - Polar header validation and RR plausibility filtering
//! - Zephyr CRC / framing rejection of corrupted frames
//! - NeuroSky last-good-value retention
//! - Crank cadence arithmetic across counter wrap
//! - Session output independent of transport chunking (Polar, NeuroSky)

use biotracks_flux::codec::crc8;
use biotracks_flux::config::{SensorConfig, RR_MAX_MS, RR_MIN_MS};
use biotracks_flux::parsers::{FrameParser, NeuroskyParser, PolarParser, ZephyrParser};
use biotracks_flux::rate::CadenceCounter;
use biotracks_flux::session::SensorSession;
use biotracks_flux::types::Vendor;
use proptest::prelude::*;

const POLAR_DOUBLE: [u8; 10] = [0xFE, 0x0A, 0xF5, 0x06, 0xF1, 0x48, 0x03, 0x64, 0x03, 0x70];

fn polar_single(rr: u16) -> Vec<u8> {
    let [hi, lo] = rr.to_be_bytes();
    vec![0xFE, 0x08, 0xF7, 0x06, 0xF1, 0x48, hi, lo]
}

fn neurosky_packet(attention: u8, meditation: u8) -> Vec<u8> {
    let mut buffer = vec![0xAA, 0xAA, 0x04, 0x80, 0x02, 0x00, attention, meditation];
    buffer.extend_from_slice(&[0x01; 12]);
    buffer
}

fn zephyr_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x02];
    frame.extend_from_slice(payload);
    frame.push(crc8(&frame[3..58]));
    frame.push(0x03);
    frame
}

fn invalid_esense() -> impl Strategy<Value = u8> {
    prop_oneof![Just(0u8), 100u8..=255]
}

proptest! {
    #[test]
    fn prop_polar_header_check(
        header in prop_oneof![Just(0xFEu8), any::<u8>()],
        length in any::<u8>(),
        check in proptest::option::of(any::<u8>()),
        sequence in 0u8..32,
        tail in proptest::collection::vec(any::<u8>(), 0..16),
    ) {
        let check = check.unwrap_or(0xFF - length);
        let mut buffer = vec![header, length, check, sequence];
        buffer.extend(tail);

        let expected = header == 0xFE && check == 0xFF - length && sequence < 16;
        let parser = PolarParser::new(&SensorConfig::default());
        prop_assert_eq!(parser.is_valid(&buffer, 0), expected);
    }

    #[test]
    fn prop_polar_rr_plausibility(rr in 0u16..3000) {
        let mut parser = PolarParser::new(&SensorConfig::default());
        let result = parser.decode(&polar_single(rr));
        let plausible = (RR_MIN_MS..=RR_MAX_MS).contains(&rr);

        prop_assert_eq!(result.is_ok(), plausible);
        if plausible {
            let record = result.unwrap();
            prop_assert_eq!(record.heart_rate.and_then(|r| r.value()), Some(i32::from(rr)));
            prop_assert_eq!(parser.rr_snapshot(), vec![f64::from(rr)]);
        } else {
            prop_assert!(parser.rr_snapshot().is_empty());
        }
    }

    #[test]
    fn prop_zephyr_single_bit_flip_rejected(
        payload in proptest::collection::vec(any::<u8>(), 57),
        index in prop_oneof![Just(0usize), 3usize..60],
        bit in 0u8..8,
    ) {
        let parser = ZephyrParser::new(&SensorConfig::default());
        let mut frame = zephyr_frame(&payload);
        prop_assert!(parser.is_valid(&frame, 0));

        frame[index] ^= 1 << bit;
        prop_assert!(!parser.is_valid(&frame, 0));
    }

    #[test]
    fn prop_neurosky_keeps_last_good(
        good in 1u8..100,
        noise in proptest::collection::vec(invalid_esense(), 1..10),
    ) {
        let mut parser = NeuroskyParser::new();
        parser.decode(&neurosky_packet(good, good)).unwrap();

        for bad in noise {
            let record = parser.decode(&neurosky_packet(bad, bad)).unwrap();
            prop_assert_eq!(record.attention.and_then(|r| r.value()), Some(i32::from(good)));
            prop_assert_eq!(record.meditation.and_then(|r| r.value()), Some(i32::from(good)));
        }
    }

    #[test]
    fn prop_crank_cadence_across_wrap(
        start_count in any::<u16>(),
        start_time in any::<u16>(),
        revolutions in 0u16..200,
        ticks in 1u16..=u16::MAX,
    ) {
        let mut counter = CadenceCounter::new();
        prop_assert_eq!(counter.events_per_minute(u32::from(start_count), start_time), None);

        let count = start_count.wrapping_add(revolutions);
        let time = start_time.wrapping_add(ticks);
        let rate = counter.events_per_minute(u32::from(count), time).unwrap();
        let expected = f64::from(revolutions) * 61_440.0 / f64::from(ticks);
        prop_assert!((rate - expected).abs() < 1e-9);
    }

    #[test]
    fn prop_session_chunking_invariant(
        frames in 1usize..8,
        chunk in 1usize..24,
    ) {
        let mut stream = Vec::new();
        for _ in 0..frames {
            stream.extend_from_slice(&POLAR_DOUBLE);
        }
        stream.extend_from_slice(&[0x00; 16]);

        let mut whole = SensorSession::new(Vendor::Polar, SensorConfig::default());
        let whole_records = whole.feed(&stream);

        let mut chunked = SensorSession::new(Vendor::Polar, SensorConfig::default());
        let chunked_count: usize = stream.chunks(chunk).map(|c| chunked.feed(c).len()).sum();

        prop_assert_eq!(whole_records.len(), frames);
        prop_assert_eq!(chunked_count, frames);
        prop_assert_eq!(whole.rr_snapshot(), chunked.rr_snapshot());
    }

    #[test]
    fn prop_neurosky_chunking_invariant(
        attentions in proptest::collection::vec(1u8..100, 1..5),
        chunk in 1usize..200,
    ) {
        let mut stream = Vec::new();
        for attention in &attentions {
            let mut frame = neurosky_packet(*attention, 50);
            frame.resize(170, 0x01);
            stream.extend(frame);
        }
        let expected: Vec<Option<i32>> = attentions.iter().map(|a| Some(i32::from(*a))).collect();

        let mut whole = SensorSession::new(Vendor::Neurosky, SensorConfig::default());
        let whole_attention: Vec<Option<i32>> = whole
            .feed(&stream)
            .iter()
            .map(|r| r.attention.and_then(|a| a.value()))
            .collect();

        let mut chunked = SensorSession::new(Vendor::Neurosky, SensorConfig::default());
        let mut chunked_attention = Vec::new();
        for piece in stream.chunks(chunk) {
            for record in chunked.feed(piece) {
                chunked_attention.push(record.attention.and_then(|a| a.value()));
            }
        }

        prop_assert_eq!(&whole_attention, &expected);
        prop_assert_eq!(&chunked_attention, &expected);
    }

    #[test]
    fn prop_feed_arbitrary_bytes_stays_bounded(
        bytes in proptest::collection::vec(any::<u8>(), 0..400),
    ) {
        for vendor in Vendor::ALL {
            let mut session = SensorSession::new(vendor, SensorConfig::default());
            session.feed(&bytes);
            if vendor.is_ble() {
                prop_assert_eq!(session.pending(), 0);
            } else {
                prop_assert!(session.pending() < session.parser().frame_size());
            }
        }
    }
}

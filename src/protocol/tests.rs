use super::codec::{self, MAX_PAYLOAD_LEN};
use super::decoder::DecodeResult;
use super::{Message, MessageDecoder, MessageType};
use crate::utils::error::ProtocolError;

fn sample_stream() -> Vec<u8> {
    let messages = [
        Message::Ping,
        Message::Sub { topic: 7 },
        Message::publish(7, "hello"),
        Message::Unsub { topic: 7 },
        Message::publish(65535, ""),
        Message::Ping,
        Message::publish(300, vec![0u8, 1, 2, 255, 254]),
    ];
    messages
        .iter()
        .flat_map(|m| m.encode().unwrap().to_vec())
        .collect()
}

fn decode_all(decoder: &mut MessageDecoder, input: &[u8]) -> Vec<DecodeResult> {
    decoder.decode(input).collect()
}

fn decode_in_chunks(input: &[u8], cuts: &[usize]) -> Vec<DecodeResult> {
    let mut decoder = MessageDecoder::new();
    let mut out = Vec::new();
    let mut start = 0;
    for &cut in cuts.iter().chain(std::iter::once(&input.len())) {
        out.extend(decoder.decode(&input[start..cut]));
        start = cut;
    }
    out
}

#[test]
fn test_ping_round_trip() {
    let mut decoder = MessageDecoder::new();
    assert_eq!(decoder.feed(0x00), None);
    assert!(!decoder.is_idle());
    assert_eq!(decoder.feed(0x00), Some(Ok(Message::Ping)));
    assert!(decoder.is_idle());
}

#[test]
fn test_sub_and_unsub_round_trip() {
    let mut decoder = MessageDecoder::new();

    let sub = Message::Sub { topic: 7 }.encode().unwrap();
    assert_eq!(&sub[..], &[0, 3, 2, 0, 7]);
    assert_eq!(decode_all(&mut decoder, &sub), vec![Ok(Message::Sub { topic: 7 })]);

    let unsub = Message::Unsub { topic: 7 }.encode().unwrap();
    assert_eq!(&unsub[..], &[0, 3, 4, 0, 7]);
    assert_eq!(
        decode_all(&mut decoder, &unsub),
        vec![Ok(Message::Unsub { topic: 7 })]
    );
    assert!(decoder.is_idle());
}

#[test]
fn test_topic_is_big_endian() {
    let frame = codec::ack_frame(MessageType::Sub, 0x0102);
    assert_eq!(&frame[..], &[0, 3, 2, 1, 2]);
}

#[test]
fn test_pub_payload_length_derived_from_size() {
    let bytes = [0, 8, 1, 0, 42, b'a', b'b', b'c', b'd', b'e'];
    let mut decoder = MessageDecoder::new();
    let out = decode_all(&mut decoder, &bytes);
    assert_eq!(out, vec![Ok(Message::publish(42, "abcde"))]);
    if let Ok(Message::Pub { payload, .. }) = &out[0] {
        assert_eq!(payload.len(), 5);
    }
    assert!(decoder.is_idle());
}

#[test]
fn test_pub_with_empty_payload() {
    let mut decoder = MessageDecoder::new();
    let out = decode_all(&mut decoder, &[0, 3, 1, 0, 9]);
    assert_eq!(out, vec![Ok(Message::publish(9, ""))]);
    assert!(decoder.is_idle());
}

#[test]
fn test_pub_below_minimum_size_is_malformed() {
    let mut decoder = MessageDecoder::new();
    // size=2 declares the type byte plus one more byte, then a PING follows.
    let out = decode_all(&mut decoder, &[0, 2, 1, 0xAA, 0, 0]);
    assert_eq!(
        out,
        vec![
            Err(ProtocolError::FrameTooShort {
                kind: MessageType::Pub,
                size: 2,
            }),
            Ok(Message::Ping),
        ]
    );
    assert!(decoder.is_idle());
}

#[test]
fn test_unknown_type_skips_rest_of_frame() {
    let mut decoder = MessageDecoder::new();
    let mut bytes = vec![0, 4, 9, 1, 2, 3];
    bytes.extend_from_slice(&Message::Sub { topic: 5 }.encode().unwrap());
    let out = decode_all(&mut decoder, &bytes);
    assert_eq!(
        out,
        vec![
            Err(ProtocolError::UnknownType(9)),
            Ok(Message::Sub { topic: 5 }),
        ]
    );
}

#[test]
fn test_oversized_sub_trailing_bytes_are_skipped() {
    let mut decoder = MessageDecoder::new();
    let bytes = [0, 5, 2, 0, 1, 0xFF, 0xFF, 0, 0];
    let out = decode_all(&mut decoder, &bytes);
    assert_eq!(out, vec![Ok(Message::Sub { topic: 1 }), Ok(Message::Ping)]);
}

#[test]
fn test_fragmentation_invariance() {
    let stream = sample_stream();
    let mut whole_decoder = MessageDecoder::new();
    let whole = decode_all(&mut whole_decoder, &stream);
    assert_eq!(whole.len(), 7);
    assert!(whole.iter().all(Result::is_ok));

    let mut bytewise_decoder = MessageDecoder::new();
    let bytewise: Vec<_> = stream
        .iter()
        .filter_map(|&b| bytewise_decoder.feed(b))
        .collect();
    assert_eq!(bytewise, whole);

    for i in 0..=stream.len() {
        for j in i..=stream.len() {
            assert_eq!(decode_in_chunks(&stream, &[i, j]), whole, "cuts at {i},{j}");
        }
    }
}

#[test]
fn test_fragmentation_invariance_pseudo_random_chunks() {
    let stream = sample_stream();
    let whole = decode_in_chunks(&stream, &[]);

    let mut seed: u32 = 0x2545_F491;
    for _ in 0..200 {
        let mut cuts = Vec::new();
        let mut pos = 0;
        loop {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            pos += 1 + (seed >> 24) as usize % 7;
            if pos >= stream.len() {
                break;
            }
            cuts.push(pos);
        }
        assert_eq!(decode_in_chunks(&stream, &cuts), whole, "cuts {cuts:?}");
    }
}

#[test]
fn test_decode_is_lazy() {
    let stream = sample_stream();
    let mut decoder = MessageDecoder::new();
    let mut iter = decoder.decode(&stream);
    assert_eq!(iter.next(), Some(Ok(Message::Ping)));
    // Only the first frame has been consumed so far.
    assert_eq!(iter.remaining(), stream.len() - 2);
}

#[test]
fn test_publish_frame_rejects_oversized_payload() {
    let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
    assert_eq!(
        codec::publish_frame(1, &payload),
        Err(ProtocolError::PayloadTooLarge(MAX_PAYLOAD_LEN + 1))
    );

    let max = vec![0u8; MAX_PAYLOAD_LEN];
    let frame = codec::publish_frame(1, &max).unwrap();
    assert_eq!(&frame[..2], &[0xFF, 0xFF]);
}

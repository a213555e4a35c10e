//! CPU-bound payload transforms run by the worker pool.

/// A pure payload transformation executed on a worker thread.
pub trait Transform: Send + Sync + 'static {
    /// Short name used in thread names and logs.
    fn name(&self) -> &'static str;

    fn apply(&self, payload: &[u8]) -> Vec<u8>;
}

/// Keeps ASCII letters only, rotates each by 13 within its case, then sorts
/// the result by byte value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rot13Sort;

impl Transform for Rot13Sort {
    fn name(&self) -> &'static str {
        "rot13sort"
    }

    fn apply(&self, payload: &[u8]) -> Vec<u8> {
        let mut out: Vec<u8> = payload
            .iter()
            .filter_map(|&c| match c {
                b'a'..=b'z' => Some((c - b'a' + 13) % 26 + b'a'),
                b'A'..=b'Z' => Some((c - b'A' + 13) % 26 + b'A'),
                _ => None,
            })
            .collect();
        out.sort_unstable();
        out
    }
}

/// All-to-all checksum: every output byte depends on every input byte.
///
/// For each position `i` the accumulator runs over all `(j, k)` pairs adding
/// `payload[i] * j + payload[k]` modulo 256, and the final value is mapped
/// onto `a..=z`. Cubic in the payload length on purpose.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumAll;

impl Transform for SumAll {
    fn name(&self) -> &'static str {
        "sumall"
    }

    fn apply(&self, payload: &[u8]) -> Vec<u8> {
        let len = payload.len();
        payload
            .iter()
            .map(|&pi| {
                let mut acc: u8 = 0;
                for j in 0..len {
                    let scaled = (u32::from(pi) * j as u32) as u8;
                    for &pk in payload {
                        acc = acc.wrapping_add(scaled).wrapping_add(pk);
                    }
                }
                acc % 26 + b'a'
            })
            .collect()
    }
}

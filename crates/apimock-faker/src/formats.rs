//! Format-aware string generators and lorem text.

use std::net::{Ipv4Addr, Ipv6Addr};

use base64::Engine;
use chrono::{Duration, SecondsFormat, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "ad", "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
    "aliquip", "ex", "ea", "commodo", "consequat", "duis", "aute", "irure", "in", "reprehenderit",
    "voluptate", "velit", "esse", "cillum", "fugiat", "nulla", "pariatur", "excepteur", "sint",
    "occaecat", "cupidatat", "non", "proident", "sunt", "culpa", "qui", "officia", "deserunt",
    "mollit", "anim", "id", "est", "laborum",
];

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Roughly two years, in seconds.
const DATE_SPREAD_SECS: i64 = 2 * 365 * 24 * 60 * 60;

pub(crate) fn word<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    WORDS.choose(rng).copied().unwrap_or("lorem")
}

/// `count` lorem words separated by spaces.
pub(crate) fn words<R: Rng + ?Sized>(rng: &mut R, count: usize) -> String {
    (0..count).map(|_| word(rng)).collect::<Vec<_>>().join(" ")
}

/// A capitalized sentence of `count` words ending in a period.
pub(crate) fn sentence<R: Rng + ?Sized>(rng: &mut R, count: usize) -> String {
    let text = words(rng, count.max(1));
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

fn alphanumeric<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(ALPHANUMERIC[rng.random_range(0..ALPHANUMERIC.len())]))
        .collect()
}

/// A value for a known string `format`, or `None` if the format is unknown.
pub(crate) fn generate_format<R: Rng + ?Sized>(format: &str, rng: &mut R) -> Option<String> {
    let value = match format {
        "date-time" => {
            let at = Utc::now() - Duration::seconds(rng.random_range(0..DATE_SPREAD_SECS));
            at.to_rfc3339_opts(SecondsFormat::Secs, true)
        }
        "date" => {
            let at = Utc::now() - Duration::seconds(rng.random_range(0..DATE_SPREAD_SECS));
            at.format("%Y-%m-%d").to_string()
        }
        "time" => format!(
            "{:02}:{:02}:{:02}Z",
            rng.random_range(0..24),
            rng.random_range(0..60),
            rng.random_range(0..60)
        ),
        "email" => format!("{}.{}@example.com", word(rng), word(rng)),
        "uuid" => uuid::Builder::from_random_bytes(rng.random())
            .into_uuid()
            .to_string(),
        "uri" | "url" | "uri-reference" | "iri" => {
            format!("https://example.com/{}/{}", word(rng), word(rng))
        }
        "hostname" | "idn-hostname" => format!("{}.example.com", word(rng)),
        "ipv4" => Ipv4Addr::from(rng.random::<[u8; 4]>()).to_string(),
        "ipv6" => Ipv6Addr::from(rng.random::<[u16; 8]>()).to_string(),
        "byte" => base64::engine::general_purpose::STANDARD.encode(sentence(rng, 12)),
        "binary" => words(rng, 4),
        "password" => alphanumeric(rng, 16),
        _ => return None,
    };
    Some(value)
}

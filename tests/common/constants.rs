//! Shared constants for end-to-end tests

#![allow(dead_code)]

/// Author of the seeded devotional songs
pub const MIRABAI: &str = "Mirabai";

/// Author of the seeded poem
pub const KABIR: &str = "Kabir";

pub const PAYOJI_TITLE: &str = "Payoji Maine";
pub const PAYOJI_TEXT: &str = "payoji maine ram ratan dhan payo";
pub const PAYOJI_CHORDS: &str = "Am G F E";

pub const MERE_TITLE: &str = "Mere To Giridhar Gopal";
pub const MERE_TEXT: &str = "mere to giridhar gopal dusro na koi";

pub const MOKO_TITLE: &str = "Moko Kahan";
pub const MOKO_TEXT: &str = "moko kahan dhunde re bande main to tere paas mein";
pub const MOKO_TRANSLATION: &str = "where do you search for me, I am with you";

/// Number of records created by `TestCatalog::spawn`
pub const SEEDED_RECORDS: usize = 3;

/// Stand-in bytes for uploaded audio
pub const TEST_AUDIO_BYTES: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00fake audio";

/// Stand-in bytes for uploaded documents
pub const TEST_DOCUMENT_BYTES: &[u8] = b"%PDF-1.4 fake document";

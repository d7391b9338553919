//! Turns uploaded CSV/TSV/plain-text bytes into (label text, QR payload) records.
//!
//! Decoding walks a charset chain and takes the first strict decode that
//! succeeds. Splitting follows the column conventions:
//! - 1 column: same value for text and QR payload
//! - 2 columns: text, payload (`|` and literal `\n` become line breaks)
//! - 3+ columns: text, remaining columns joined by line breaks

use std::borrow::Cow;

use log::{info, warn};

use crate::error::{Error, Result};

/// First-column values that mark a header row (compared lower-cased).
pub const HEADER_TOKENS: &[&str] = &[
    "id", "ids", "code", "name", "product", "text", "label", "etiqueta",
];

/// One label: visible text plus the data its QR code carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub label_text: String,
    pub qr_text: String,
}

impl Record {
    pub fn new(label_text: impl Into<String>, qr_text: impl Into<String>) -> Self {
        Self { label_text: label_text.into(), qr_text: qr_text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Utf8Sig,
    Utf16,
    Latin1,
    Windows1252,
    ShiftJis,
    Gb2312,
    Big5,
    EucKr,
}

/// Order in which input bytes are decoded.
pub const DEFAULT_CHAIN: &[Charset] = &[
    Charset::Utf8,
    Charset::Utf8Sig,
    Charset::Utf16,
    Charset::Latin1,
    Charset::Windows1252,
    Charset::ShiftJis,
    Charset::Gb2312,
    Charset::Big5,
    Charset::EucKr,
];

impl Charset {
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Utf8Sig => "utf-8-sig",
            Charset::Utf16 => "utf-16",
            Charset::Latin1 => "latin-1",
            Charset::Windows1252 => "windows-1252",
            Charset::ShiftJis => "shift-jis",
            Charset::Gb2312 => "gb2312",
            Charset::Big5 => "big5",
            Charset::EucKr => "euc-kr",
        }
    }

    /// Strict decode; `None` on any malformed sequence.
    fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Charset::Utf8 => {
                if bytes.starts_with(UTF8_BOM) {
                    return None;
                }
                std::str::from_utf8(bytes).ok().map(str::to_owned)
            }
            Charset::Utf8Sig => {
                let body = bytes.strip_prefix(UTF8_BOM)?;
                std::str::from_utf8(body).ok().map(str::to_owned)
            }
            Charset::Utf16 => {
                let (encoding, body) = match bytes {
                    [0xFF, 0xFE, rest @ ..] => (encoding_rs::UTF_16LE, rest),
                    [0xFE, 0xFF, rest @ ..] => (encoding_rs::UTF_16BE, rest),
                    _ => return None,
                };
                strict(encoding, body)
            }
            Charset::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
            Charset::Windows1252 => strict(encoding_rs::WINDOWS_1252, bytes),
            Charset::ShiftJis => strict(encoding_rs::SHIFT_JIS, bytes),
            Charset::Gb2312 => strict(encoding_rs::GBK, bytes),
            Charset::Big5 => strict(encoding_rs::BIG5, bytes),
            Charset::EucKr => strict(encoding_rs::EUC_KR, bytes),
        }
    }
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

fn strict(encoding: &'static encoding_rs::Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

/// Decoded input text and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    /// Charset that decoded the input, `None` after lossy UTF-8 fallback.
    pub charset: Option<Charset>,
}

impl Decoded {
    pub fn is_lossy(&self) -> bool {
        self.charset.is_none()
    }
}

pub fn decode(bytes: &[u8]) -> Decoded {
    decode_with(bytes, DEFAULT_CHAIN)
}

/// Tries each charset in `chain`; falls back to UTF-8 with replacement.
pub fn decode_with(bytes: &[u8], chain: &[Charset]) -> Decoded {
    for &charset in chain {
        if let Some(text) = charset.decode(bytes) {
            if !matches!(charset, Charset::Utf8 | Charset::Utf8Sig) {
                info!("input encoding detected: {}", charset.name());
            }
            return Decoded { text, charset: Some(charset) };
        }
    }
    warn!("input encoding not recognised, undecodable bytes replaced; save the file as UTF-8");
    Decoded {
        text: String::from_utf8_lossy(bytes).into_owned(),
        charset: None,
    }
}

/// Records parsed from one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingest {
    pub records: Vec<Record>,
    pub charset: Option<Charset>,
}

impl Ingest {
    /// True when decoding had to replace bytes; the caller should warn the user.
    pub fn is_lossy(&self) -> bool {
        self.charset.is_none()
    }
}

/// Decodes and parses raw input bytes.
pub fn read_records(bytes: &[u8]) -> Result<Ingest> {
    let decoded = decode(bytes);
    if decoded.text.trim().is_empty() {
        return Err(Error::EmptyInput);
    }
    let records = parse_records(&decoded.text);
    info!("{} records read", records.len());
    Ok(Ingest { records, charset: decoded.charset })
}

/// Splits decoded text into records. Blank lines and empty fields are dropped.
pub fn parse_records(text: &str) -> Vec<Record> {
    let lines: Vec<&str> = text.lines().collect();
    let Some(first) = lines.first() else {
        return Vec::new();
    };

    let Some(sep) = detect_separator(first) else {
        return lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| Record::new(line, line))
            .collect();
    };

    let first_col = first.split(sep).next().unwrap_or("").trim().to_lowercase();
    let start = usize::from(HEADER_TOKENS.contains(&first_col.as_str()));

    lines[start..]
        .iter()
        .filter_map(|line| record_from_fields(line, sep))
        .collect()
}

/// `,` or `\t`, whichever the line has more of; `None` when it has neither.
fn detect_separator(line: &str) -> Option<char> {
    let commas = line.matches(',').count();
    let tabs = line.matches('\t').count();
    match (commas, tabs) {
        (0, 0) => None,
        (c, t) if t > c => Some('\t'),
        _ => Some(','),
    }
}

fn record_from_fields(line: &str, sep: char) -> Option<Record> {
    let parts: Vec<&str> = line
        .split(sep)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    match parts.as_slice() {
        [] => None,
        [only] => Some(Record::new(*only, *only)),
        [visible, payload] => {
            let qr_text = payload.replace('|', "\n").replace("\\n", "\n");
            Some(Record::new(*visible, qr_text))
        }
        [visible, rest @ ..] => Some(Record::new(*visible, rest.join("\n"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_columns() {
        assert_eq!(
            parse_records("Sample1,ABC123"),
            vec![Record::new("Sample1", "ABC123")]
        );
    }

    #[test]
    fn pipe_and_escaped_newline_become_line_breaks() {
        assert_eq!(
            parse_records("Sample2,data1|data2\nSample3,a\\nb"),
            vec![
                Record::new("Sample2", "data1\ndata2"),
                Record::new("Sample3", "a\nb"),
            ]
        );
    }

    #[test]
    fn single_column_plain_text() {
        assert_eq!(
            parse_records("onlytext\n\n  second  \n"),
            vec![Record::new("onlytext", "onlytext"), Record::new("second", "second")]
        );
    }

    #[test]
    fn header_row_is_skipped() {
        assert_eq!(
            parse_records("name,code\nBolt,B-1\nNut,N-2"),
            vec![Record::new("Bolt", "B-1"), Record::new("Nut", "N-2")]
        );
        assert_eq!(
            parse_records("Etiqueta\tID\nA\t1"),
            vec![Record::new("A", "1")]
        );
    }

    #[test]
    fn extra_columns_join_into_payload() {
        assert_eq!(
            parse_records("Tube 7\tlot 42\t2025-01-01\tfreezer B"),
            vec![Record::new("Tube 7", "lot 42\n2025-01-01\nfreezer B")]
        );
    }

    #[test]
    fn pipes_survive_in_three_column_rows() {
        assert_eq!(
            parse_records("a,b|c,d"),
            vec![Record::new("a", "b|c\nd")]
        );
    }

    #[test]
    fn empty_fields_are_dropped() {
        assert_eq!(
            parse_records("x,,y\n,,\nz,"),
            vec![Record::new("x", "y"), Record::new("z", "z")]
        );
    }

    #[test]
    fn separator_prefers_the_more_frequent() {
        assert_eq!(detect_separator("a,b\tc\td"), Some('\t'));
        assert_eq!(detect_separator("a,b\tc"), Some(','));
        assert_eq!(detect_separator("plain"), None);
    }

    #[test]
    fn utf8_and_bom() {
        let plain = decode("お茶,tea".as_bytes());
        assert_eq!(plain.charset, Some(Charset::Utf8));

        let mut with_bom = UTF8_BOM.to_vec();
        with_bom.extend_from_slice(b"id,code\nA,1");
        let decoded = decode(&with_bom);
        assert_eq!(decoded.charset, Some(Charset::Utf8Sig));
        assert_eq!(decoded.text, "id,code\nA,1");
    }

    #[test]
    fn utf16_requires_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Москва".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let decoded = decode(&bytes);
        assert_eq!(decoded.charset, Some(Charset::Utf16));
        assert_eq!(decoded.text, "Москва");
    }

    #[test]
    fn latin1_catches_legacy_bytes() {
        let decoded = decode(b"caf\xe9,\x80");
        assert_eq!(decoded.charset, Some(Charset::Latin1));
        assert_eq!(decoded.text, "caf\u{e9},\u{80}");
    }

    #[test]
    fn custom_chain_reaches_cjk_decoders() {
        // "お茶" in Shift-JIS
        let bytes = [0x82, 0xA8, 0x92, 0x83];
        let decoded = decode_with(&bytes, &[Charset::Utf8, Charset::ShiftJis]);
        assert_eq!(decoded.charset, Some(Charset::ShiftJis));
        assert_eq!(decoded.text, "お茶");
    }

    #[test]
    fn exhausted_chain_is_lossy() {
        let decoded = decode_with(b"ok\xff", &[Charset::Utf8]);
        assert!(decoded.is_lossy());
        assert_eq!(decoded.text, "ok\u{fffd}");
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(read_records(b""), Err(Error::EmptyInput)));
        assert!(matches!(read_records(b" \n\t\n"), Err(Error::EmptyInput)));
    }

    #[test]
    fn read_records_reports_charset() {
        let ingest = read_records(b"Sample1,ABC123\n").unwrap();
        assert_eq!(ingest.records, vec![Record::new("Sample1", "ABC123")]);
        assert_eq!(ingest.charset, Some(Charset::Utf8));
        assert!(!ingest.is_lossy());
    }
}

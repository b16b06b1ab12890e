// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! String encodings and codepoint iteration.
//!
//! String data is stored in one of five encodings. Kernels never look at
//! code units directly; they decode through a [`Codec`] selected for the
//! encoding and error mode, which yields codepoints and appends them in
//! the destination encoding.
//!
//! Multi-byte code units (`ucs2`, `utf16`, `utf32`) are native-endian.

use std::fmt;

use crate::config::AssignErrorMode;
use crate::error::{Error, Result};

/// Replacement codepoint substituted in `NoCheck` mode.
const REPLACEMENT: u32 = 0xFFFD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringEncoding {
    Ascii,
    Ucs2,
    Utf8,
    Utf16,
    Utf32,
}

impl StringEncoding {
    /// Size in bytes of one code unit.
    #[inline]
    pub fn unit_size(self) -> usize {
        match self {
            StringEncoding::Ascii | StringEncoding::Utf8 => 1,
            StringEncoding::Ucs2 | StringEncoding::Utf16 => 2,
            StringEncoding::Utf32 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StringEncoding::Ascii => "ascii",
            StringEncoding::Ucs2 => "ucs2",
            StringEncoding::Utf8 => "utf8",
            StringEncoding::Utf16 => "utf16",
            StringEncoding::Utf32 => "utf32",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ascii" | "A" => Some(StringEncoding::Ascii),
            "ucs2" | "ucs_2" | "U2" => Some(StringEncoding::Ucs2),
            "utf8" | "utf_8" | "U8" => Some(StringEncoding::Utf8),
            "utf16" | "utf_16" | "U16" => Some(StringEncoding::Utf16),
            "utf32" | "utf_32" | "U32" => Some(StringEncoding::Utf32),
            _ => None,
        }
    }

    /// Codec for this encoding, strict unless `errmode` is `NoCheck`.
    #[inline]
    pub fn codec(self, errmode: AssignErrorMode) -> Codec {
        Codec {
            encoding: self,
            strict: errmode != AssignErrorMode::NoCheck,
        }
    }
}

impl fmt::Display for StringEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Codepoint decoder/encoder for one encoding and strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    pub encoding: StringEncoding,
    /// Fail on invalid input instead of substituting a replacement.
    pub strict: bool,
}

impl Codec {
    fn invalid(&self, what: impl fmt::Display) -> Error {
        Error::invalid_value(what, &self.encoding, "invalid code unit sequence")
    }

    fn replace_or_fail(&self, what: impl fmt::Display) -> Result<u32> {
        if self.strict {
            Err(self.invalid(what))
        } else {
            Ok(REPLACEMENT)
        }
    }

    /// Decode the next codepoint from `input`, advancing it.
    ///
    /// Returns `Ok(None)` once `input` is exhausted.
    pub fn next_codepoint(&self, input: &mut &[u8]) -> Result<Option<u32>> {
        if input.is_empty() {
            return Ok(None);
        }
        let cp = match self.encoding {
            StringEncoding::Ascii => {
                let b = take_unit::<1>(input)[0];
                if b < 0x80 {
                    u32::from(b)
                } else {
                    self.replace_or_fail(format!("0x{:02x}", b))?
                }
            }
            StringEncoding::Utf8 => self.next_utf8(input)?,
            StringEncoding::Ucs2 => {
                let u = u16::from_ne_bytes(take_unit::<2>(input));
                if (0xD800..0xE000).contains(&u) {
                    self.replace_or_fail(format!("0x{:04x}", u))?
                } else {
                    u32::from(u)
                }
            }
            StringEncoding::Utf16 => self.next_utf16(input)?,
            StringEncoding::Utf32 => {
                let u = u32::from_ne_bytes(take_unit::<4>(input));
                if char::from_u32(u).is_some() {
                    u
                } else {
                    self.replace_or_fail(format!("0x{:08x}", u))?
                }
            }
        };
        Ok(Some(cp))
    }

    fn next_utf8(&self, input: &mut &[u8]) -> Result<u32> {
        let lead = input[0];
        let len = match lead {
            0x00..=0x7F => 1,
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => {
                *input = &input[1..];
                return self.replace_or_fail(format!("0x{:02x}", lead));
            }
        };
        if input.len() < len {
            *input = &[];
            return self.replace_or_fail("truncated utf8 sequence");
        }
        let (seq, rest) = input.split_at(len);
        *input = rest;
        match std::str::from_utf8(seq).ok().and_then(|s| s.chars().next()) {
            Some(c) => Ok(u32::from(c)),
            None => self.replace_or_fail(format!("{:02x?}", seq)),
        }
    }

    fn next_utf16(&self, input: &mut &[u8]) -> Result<u32> {
        let hi = u16::from_ne_bytes(take_unit::<2>(input));
        if !(0xD800..0xE000).contains(&hi) {
            return Ok(u32::from(hi));
        }
        if hi >= 0xDC00 || input.len() < 2 {
            return self.replace_or_fail(format!("0x{:04x}", hi));
        }
        let lo = u16::from_ne_bytes(take_unit::<2>(input));
        if !(0xDC00..0xE000).contains(&lo) {
            return self.replace_or_fail(format!("0x{:04x} 0x{:04x}", hi, lo));
        }
        Ok(0x10000 + ((u32::from(hi) - 0xD800) << 10) + (u32::from(lo) - 0xDC00))
    }

    /// Append `cp` to `out` in this codec's encoding.
    pub fn append_codepoint(&self, cp: u32, out: &mut Vec<u8>) -> Result<()> {
        let Some(c) = char::from_u32(cp) else {
            let r = self.replace_or_fail(format!("U+{:X}", cp))?;
            return self.append_codepoint(r, out);
        };
        match self.encoding {
            StringEncoding::Ascii => {
                if cp < 0x80 {
                    out.push(cp as u8);
                } else if self.strict {
                    return Err(Error::invalid_value(
                        format!("U+{:04X}", cp),
                        &self.encoding,
                        "codepoint is not representable",
                    ));
                } else {
                    out.push(b'?');
                }
            }
            StringEncoding::Utf8 => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            StringEncoding::Ucs2 => {
                let unit = if cp > 0xFFFF {
                    if self.strict {
                        return Err(Error::invalid_value(
                            format!("U+{:04X}", cp),
                            &self.encoding,
                            "codepoint is not representable",
                        ));
                    }
                    REPLACEMENT as u16
                } else {
                    cp as u16
                };
                out.extend_from_slice(&unit.to_ne_bytes());
            }
            StringEncoding::Utf16 => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    out.extend_from_slice(&unit.to_ne_bytes());
                }
            }
            StringEncoding::Utf32 => out.extend_from_slice(&cp.to_ne_bytes()),
        }
        Ok(())
    }

    /// Iterate over the codepoints of `input`.
    pub fn codepoints<'a>(&self, input: &'a [u8]) -> Codepoints<'a> {
        Codepoints {
            codec: *self,
            rest: input,
        }
    }

    /// Re-encode `input` from this codec into `dst`.
    pub fn transcode(&self, input: &[u8], dst: &Codec) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len() / self.encoding.unit_size() * dst.encoding.unit_size());
        for cp in self.codepoints(input) {
            dst.append_codepoint(cp?, &mut out)?;
        }
        Ok(out)
    }
}

fn take_unit<const N: usize>(input: &mut &[u8]) -> [u8; N] {
    let mut unit = [0u8; N];
    let n = N.min(input.len());
    unit[..n].copy_from_slice(&input[..n]);
    *input = &input[n..];
    unit
}

/// Iterator over decoded codepoints.
pub struct Codepoints<'a> {
    codec: Codec,
    rest: &'a [u8],
}

impl Iterator for Codepoints<'_> {
    type Item = Result<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        self.codec.next_codepoint(&mut self.rest).transpose()
    }
}

/// Length in bytes of the zero-terminated prefix of fixed-size string data.
pub(crate) fn fixed_string_len(data: &[u8], encoding: StringEncoding) -> usize {
    let unit = encoding.unit_size();
    data.chunks_exact(unit)
        .position(|chunk| chunk.iter().all(|&b| b == 0))
        .map_or(data.len() - data.len() % unit, |i| i * unit)
}

/// Print one codepoint inside a double-quoted string literal.
pub fn print_escaped_codepoint(out: &mut dyn fmt::Write, cp: u32) -> fmt::Result {
    match cp {
        0x22 => out.write_str("\\\""),
        0x5C => out.write_str("\\\\"),
        0x0A => out.write_str("\\n"),
        0x0D => out.write_str("\\r"),
        0x09 => out.write_str("\\t"),
        0x08 => out.write_str("\\b"),
        0x0C => out.write_str("\\f"),
        0x00..=0x1F | 0x7F => write!(out, "\\u{:04x}", cp),
        _ => match char::from_u32(cp) {
            Some(c) => out.write_char(c),
            None => write!(out, "\\U{:08x}", cp),
        },
    }
}

/// Print encoded string data as a quoted, escaped literal.
pub fn print_escaped(
    out: &mut dyn fmt::Write,
    data: &[u8],
    encoding: StringEncoding,
) -> fmt::Result {
    out.write_char('"')?;
    for cp in encoding.codec(AssignErrorMode::NoCheck).codepoints(data) {
        print_escaped_codepoint(out, cp.unwrap_or(REPLACEMENT))?;
    }
    out.write_char('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(s: &str, enc: StringEncoding) -> Vec<u8> {
        let codec = enc.codec(AssignErrorMode::Fractional);
        let mut out = Vec::new();
        for c in s.chars() {
            codec.append_codepoint(u32::from(c), &mut out).expect("encode");
        }
        out
    }

    fn decode(data: &[u8], enc: StringEncoding) -> String {
        enc.codec(AssignErrorMode::Fractional)
            .codepoints(data)
            .map(|cp| char::from_u32(cp.expect("decode")).expect("scalar"))
            .collect()
    }

    #[test]
    fn test_unit_sizes() {
        assert_eq!(StringEncoding::Ascii.unit_size(), 1);
        assert_eq!(StringEncoding::Utf8.unit_size(), 1);
        assert_eq!(StringEncoding::Ucs2.unit_size(), 2);
        assert_eq!(StringEncoding::Utf16.unit_size(), 2);
        assert_eq!(StringEncoding::Utf32.unit_size(), 4);
    }

    #[test]
    fn test_name_lookup() {
        for enc in [
            StringEncoding::Ascii,
            StringEncoding::Ucs2,
            StringEncoding::Utf8,
            StringEncoding::Utf16,
            StringEncoding::Utf32,
        ] {
            assert_eq!(StringEncoding::from_name(enc.name()), Some(enc));
        }
        assert_eq!(StringEncoding::from_name("latin1"), None);
    }

    #[test]
    fn test_utf16_surrogate_pair() {
        let data = encode("a\u{1F600}b", StringEncoding::Utf16);
        assert_eq!(data.len(), 8);
        assert_eq!(decode(&data, StringEncoding::Utf16), "a\u{1F600}b");
    }

    #[test]
    fn test_transcode_utf8_to_utf32() {
        let src = "h\u{e9}llo".as_bytes();
        let codec = StringEncoding::Utf8.codec(AssignErrorMode::Fractional);
        let dst = StringEncoding::Utf32.codec(AssignErrorMode::Fractional);
        let out = codec.transcode(src, &dst).expect("transcode");
        assert_eq!(out.len(), 20);
        assert_eq!(decode(&out, StringEncoding::Utf32), "h\u{e9}llo");
    }

    #[test]
    fn test_ascii_rejects_non_ascii_unless_nocheck() {
        let strict = StringEncoding::Ascii.codec(AssignErrorMode::Overflow);
        let mut out = Vec::new();
        assert!(strict.append_codepoint(0xE9, &mut out).is_err());

        let lax = StringEncoding::Ascii.codec(AssignErrorMode::NoCheck);
        lax.append_codepoint(0xE9, &mut out).expect("nocheck");
        assert_eq!(out, b"?");
    }

    #[test]
    fn test_invalid_utf8() {
        let data = [b'a', 0xFF, b'b'];
        let strict = StringEncoding::Utf8.codec(AssignErrorMode::Fractional);
        assert!(strict.codepoints(&data).any(|cp| cp.is_err()));

        let lax = StringEncoding::Utf8.codec(AssignErrorMode::NoCheck);
        let cps: Vec<u32> = lax.codepoints(&data).map(|cp| cp.expect("lax")).collect();
        assert_eq!(cps, vec![0x61, REPLACEMENT, 0x62]);
    }

    #[test]
    fn test_fixed_string_len() {
        assert_eq!(fixed_string_len(b"abc\0\0", StringEncoding::Utf8), 3);
        assert_eq!(fixed_string_len(b"abcde", StringEncoding::Utf8), 5);
        let utf16 = [0x61, 0x00, 0x00, 0x00];
        assert_eq!(fixed_string_len(&utf16, StringEncoding::Utf16), 2);
    }

    #[test]
    fn test_print_escaped() {
        let mut out = String::new();
        print_escaped(&mut out, b"a\"b\n\x01", StringEncoding::Utf8).expect("print");
        assert_eq!(out, "\"a\\\"b\\n\\u0001\"");
    }
}

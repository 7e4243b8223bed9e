//! `buffer.Buffer` (spec §4.3.2): encoding-aware byte buffer matching the
//! Node.js API surface for the listed methods.

use rsquickjs::prelude::{Func, Opt, Rest};
use rsquickjs::{Class, Ctx, Exception, FromJs, IntoJs, Object, Result, TypedArray, Value};

/// Supported encodings (spec §4.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16le,
    Latin1,
    Base64,
    Base64Url,
    Hex,
    Ascii,
    Binary,
}

impl Encoding {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(Encoding::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Some(Encoding::Utf16le),
            "latin1" => Some(Encoding::Latin1),
            "base64" => Some(Encoding::Base64),
            "base64url" => Some(Encoding::Base64Url),
            "hex" => Some(Encoding::Hex),
            "ascii" => Some(Encoding::Ascii),
            "binary" => Some(Encoding::Binary),
            _ => None,
        }
    }
}

pub fn is_encoding(name: &str) -> bool {
    Encoding::parse(name).is_some()
}

pub fn encode(bytes: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        Encoding::Latin1 | Encoding::Binary | Encoding::Ascii => {
            bytes.iter().map(|&b| b as char).collect()
        }
        Encoding::Hex => hex_simd::encode_to_string(bytes, hex_simd::AsciiCase::Lower),
        Encoding::Base64 => base64_simd::STANDARD.encode_to_string(bytes),
        Encoding::Base64Url => base64_simd::URL_SAFE_NO_PAD.encode_to_string(bytes),
        Encoding::Utf16le => {
            let units: Vec<u16> = bytes
                .chunks(2)
                .map(|c| {
                    let lo = c[0];
                    let hi = *c.get(1).unwrap_or(&0);
                    u16::from_le_bytes([lo, hi])
                })
                .collect();
            String::from_utf16_lossy(&units)
        }
    }
}

pub fn decode(s: &str, encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Utf8 => s.as_bytes().to_vec(),
        Encoding::Latin1 | Encoding::Binary => s.chars().map(|c| c as u32 as u8).collect(),
        Encoding::Ascii => s.chars().map(|c| (c as u32 as u8) & 0x7f).collect(),
        Encoding::Hex => hex_simd::decode_to_vec(s.as_bytes()).unwrap_or_default(),
        Encoding::Base64 => base64_simd::STANDARD
            .decode_to_vec(s.as_bytes())
            .unwrap_or_default(),
        Encoding::Base64Url => base64_simd::URL_SAFE_NO_PAD
            .decode_to_vec(s.as_bytes())
            .unwrap_or_default(),
        Encoding::Utf16le => {
            let units: Vec<u16> = s.encode_utf16().collect();
            units.iter().flat_map(|u| u.to_le_bytes()).collect()
        }
    }
}

#[rsquickjs::class]
#[derive(Clone, rsquickjs::class::Trace, rsquickjs::JsLifetime)]
pub struct Buffer {
    #[qjs(skip_trace)]
    pub bytes: Vec<u8>,
}

fn enc_or(opt: Opt<String>, default: Encoding) -> Encoding {
    opt.0.and_then(|s| Encoding::parse(&s)).unwrap_or(default)
}

#[rsquickjs::methods]
impl<'js> Buffer {
    #[qjs(get)]
    pub fn length(&self) -> usize {
        self.bytes.len()
    }

    #[qjs(rename = "toString")]
    pub fn to_string_js(&self, encoding: Opt<String>, start: Opt<usize>, end: Opt<usize>) -> String {
        let start = start.0.unwrap_or(0).min(self.bytes.len());
        let end = end.0.unwrap_or(self.bytes.len()).min(self.bytes.len()).max(start);
        encode(&self.bytes[start..end], enc_or(encoding, Encoding::Utf8))
    }

    #[qjs(rename = "toJSON")]
    pub fn to_json<'a>(&self, ctx: Ctx<'js>) -> Result<Object<'js>> {
        let obj = Object::new(ctx.clone())?;
        obj.set("type", "Buffer")?;
        let arr = rsquickjs::Array::new(ctx)?;
        for (i, b) in self.bytes.iter().enumerate() {
            arr.set(i, *b)?;
        }
        obj.set("data", arr)?;
        Ok(obj)
    }

    pub fn write(&mut self, s: String, encoding: Opt<String>) -> usize {
        let bytes = decode(&s, enc_or(encoding, Encoding::Utf8));
        let n = bytes.len().min(self.bytes.len());
        self.bytes[..n].copy_from_slice(&bytes[..n]);
        n
    }

    pub fn equals(&self, other: &Buffer) -> bool {
        self.bytes == other.bytes
    }

    pub fn compare(&self, other: &Buffer) -> i32 {
        match self.bytes.cmp(&other.bytes) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }
    }

    pub fn copy(
        &self,
        target: &mut Buffer,
        target_start: Opt<usize>,
        source_start: Opt<usize>,
        source_end: Opt<usize>,
    ) -> usize {
        let ts = target_start.0.unwrap_or(0);
        let ss = source_start.0.unwrap_or(0);
        let se = source_end.0.unwrap_or(self.bytes.len()).min(self.bytes.len());
        if ss >= se {
            return 0;
        }
        let n = (se - ss).min(target.bytes.len().saturating_sub(ts));
        target.bytes[ts..ts + n].copy_from_slice(&self.bytes[ss..ss + n]);
        n
    }

    #[qjs(rename = "slice")]
    pub fn slice_js(&self, start: Opt<isize>, end: Opt<isize>) -> Buffer {
        self.subarray_js(start, end)
    }

    #[qjs(rename = "subarray")]
    pub fn subarray_js(&self, start: Opt<isize>, end: Opt<isize>) -> Buffer {
        let len = self.bytes.len() as isize;
        let norm = |v: isize| -> usize {
            let v = if v < 0 { (len + v).max(0) } else { v.min(len) };
            v as usize
        };
        let s = start.0.map(norm).unwrap_or(0);
        let e = end.0.map(norm).unwrap_or(self.bytes.len()).max(s);
        Buffer {
            bytes: self.bytes[s..e].to_vec(),
        }
    }

    pub fn fill(&mut self, value: u8) {
        self.bytes.iter_mut().for_each(|b| *b = value);
    }

    #[qjs(rename = "indexOf")]
    pub fn index_of(&self, value: String) -> i64 {
        find_subslice(&self.bytes, value.as_bytes(), false)
    }

    #[qjs(rename = "lastIndexOf")]
    pub fn last_index_of(&self, value: String) -> i64 {
        find_subslice(&self.bytes, value.as_bytes(), true)
    }

    pub fn includes(&self, value: String) -> bool {
        find_subslice(&self.bytes, value.as_bytes(), false) >= 0
    }

    // Typed reads/writes (spec §4.3.2): 8/16/32-bit ints, LE+BE, plus
    // 32/64-bit floats.
    #[qjs(rename = "readUInt8")]
    pub fn read_u8(&self, offset: Opt<usize>) -> u8 {
        self.bytes[offset.0.unwrap_or(0)]
    }
    #[qjs(rename = "writeUInt8")]
    pub fn write_u8(&mut self, value: u8, offset: Opt<usize>) -> usize {
        let o = offset.0.unwrap_or(0);
        self.bytes[o] = value;
        o + 1
    }
    #[qjs(rename = "readInt8")]
    pub fn read_i8(&self, offset: Opt<usize>) -> i8 {
        self.bytes[offset.0.unwrap_or(0)] as i8
    }
    #[qjs(rename = "writeInt8")]
    pub fn write_i8(&mut self, value: i8, offset: Opt<usize>) -> usize {
        let o = offset.0.unwrap_or(0);
        self.bytes[o] = value as u8;
        o + 1
    }

    #[qjs(rename = "readUInt16LE")]
    pub fn read_u16le(&self, offset: Opt<usize>) -> u16 {
        u16::from_le_bytes(self.take2(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "readUInt16BE")]
    pub fn read_u16be(&self, offset: Opt<usize>) -> u16 {
        u16::from_be_bytes(self.take2(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "writeUInt16LE")]
    pub fn write_u16le(&mut self, value: u16, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_le_bytes())
    }
    #[qjs(rename = "writeUInt16BE")]
    pub fn write_u16be(&mut self, value: u16, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_be_bytes())
    }
    #[qjs(rename = "readInt16LE")]
    pub fn read_i16le(&self, offset: Opt<usize>) -> i16 {
        i16::from_le_bytes(self.take2(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "readInt16BE")]
    pub fn read_i16be(&self, offset: Opt<usize>) -> i16 {
        i16::from_be_bytes(self.take2(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "writeInt16LE")]
    pub fn write_i16le(&mut self, value: i16, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_le_bytes())
    }
    #[qjs(rename = "writeInt16BE")]
    pub fn write_i16be(&mut self, value: i16, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_be_bytes())
    }

    #[qjs(rename = "readUInt32LE")]
    pub fn read_u32le(&self, offset: Opt<usize>) -> u32 {
        u32::from_le_bytes(self.take4(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "readUInt32BE")]
    pub fn read_u32be(&self, offset: Opt<usize>) -> u32 {
        u32::from_be_bytes(self.take4(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "writeUInt32LE")]
    pub fn write_u32le(&mut self, value: u32, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_le_bytes())
    }
    #[qjs(rename = "writeUInt32BE")]
    pub fn write_u32be(&mut self, value: u32, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_be_bytes())
    }
    #[qjs(rename = "readInt32LE")]
    pub fn read_i32le(&self, offset: Opt<usize>) -> i32 {
        i32::from_le_bytes(self.take4(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "readInt32BE")]
    pub fn read_i32be(&self, offset: Opt<usize>) -> i32 {
        i32::from_be_bytes(self.take4(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "writeInt32LE")]
    pub fn write_i32le(&mut self, value: i32, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_le_bytes())
    }
    #[qjs(rename = "writeInt32BE")]
    pub fn write_i32be(&mut self, value: i32, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_be_bytes())
    }

    #[qjs(rename = "readFloatLE")]
    pub fn read_f32le(&self, offset: Opt<usize>) -> f32 {
        f32::from_le_bytes(self.take4(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "readFloatBE")]
    pub fn read_f32be(&self, offset: Opt<usize>) -> f32 {
        f32::from_be_bytes(self.take4(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "writeFloatLE")]
    pub fn write_f32le(&mut self, value: f32, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_le_bytes())
    }
    #[qjs(rename = "writeFloatBE")]
    pub fn write_f32be(&mut self, value: f32, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_be_bytes())
    }
    #[qjs(rename = "readDoubleLE")]
    pub fn read_f64le(&self, offset: Opt<usize>) -> f64 {
        f64::from_le_bytes(self.take8(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "readDoubleBE")]
    pub fn read_f64be(&self, offset: Opt<usize>) -> f64 {
        f64::from_be_bytes(self.take8(offset.0.unwrap_or(0)))
    }
    #[qjs(rename = "writeDoubleLE")]
    pub fn write_f64le(&mut self, value: f64, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_le_bytes())
    }
    #[qjs(rename = "writeDoubleBE")]
    pub fn write_f64be(&mut self, value: f64, offset: Opt<usize>) -> usize {
        self.put(offset.0.unwrap_or(0), &value.to_be_bytes())
    }
}

impl Buffer {
    fn take2(&self, offset: usize) -> [u8; 2] {
        [self.bytes[offset], self.bytes[offset + 1]]
    }
    fn take4(&self, offset: usize) -> [u8; 4] {
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.bytes[offset..offset + 4]);
        out
    }
    fn take8(&self, offset: usize) -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(&self.bytes[offset..offset + 8]);
        out
    }
    fn put(&mut self, offset: usize, data: &[u8]) -> usize {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        offset + data.len()
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8], last: bool) -> i64 {
    if needle.is_empty() {
        return 0;
    }
    if needle.len() > haystack.len() {
        return -1;
    }
    let positions = (0..=haystack.len() - needle.len()).filter(|&i| &haystack[i..i + needle.len()] == needle);
    if last {
        positions.last().map(|i| i as i64).unwrap_or(-1)
    } else {
        positions.take(1).next().map(|i| i as i64).unwrap_or(-1)
    }
}

/// `Buffer.from(string|array|buffer|arraybuffer, encoding?)`.
enum FromInput<'js> {
    Str(String),
    Bytes(Vec<u8>),
    Other(Value<'js>),
}

impl<'js> FromJs<'js> for FromInput<'js> {
    fn from_js(ctx: &Ctx<'js>, value: Value<'js>) -> Result<Self> {
        if let Some(s) = value.as_string() {
            return Ok(FromInput::Str(s.to_string()?));
        }
        if let Ok(buf) = Buffer::from_js(ctx, value.clone()) {
            return Ok(FromInput::Bytes(buf.bytes));
        }
        if let Ok(ta) = TypedArray::<u8>::from_js(ctx, value.clone()) {
            return Ok(FromInput::Bytes(ta.as_bytes().unwrap_or_default().to_vec()));
        }
        if let Some(arr) = value.as_array() {
            let mut bytes = Vec::with_capacity(arr.len());
            for item in arr.iter::<u8>() {
                bytes.push(item?);
            }
            return Ok(FromInput::Bytes(bytes));
        }
        Ok(FromInput::Other(value))
    }
}

/// Build the `buffer` namespace: the `Buffer` class plus its static
/// factories, matching Node's module shape (`Buffer` itself carries the
/// statics, not a separate namespace object).
pub fn install<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;
    let ctor = Class::<Buffer>::create_constructor(ctx)?
        .ok_or_else(|| Exception::throw_message(ctx, "failed to build Buffer constructor"))?;

    ctor.set(
        "from",
        Func::from(|ctx: Ctx<'js>, input: FromInput<'js>, encoding: Opt<String>| -> Result<Buffer> {
            let bytes = match input {
                FromInput::Str(s) => decode(&s, enc_or(encoding, Encoding::Utf8)),
                FromInput::Bytes(b) => b,
                FromInput::Other(_) => {
                    return Err(Exception::throw_type(&ctx, "unsupported Buffer.from input"))
                }
            };
            Ok(Buffer { bytes })
        }),
    )?;
    ctor.set(
        "alloc",
        Func::from(|size: usize, fill: Opt<u8>| Buffer {
            bytes: vec![fill.0.unwrap_or(0); size],
        }),
    )?;
    ctor.set("allocUnsafe", Func::from(|size: usize| Buffer { bytes: vec![0; size] }))?;
    ctor.set(
        "concat",
        Func::from(|list: Vec<Buffer>, total_length: Opt<usize>| {
            let mut bytes: Vec<u8> = list.into_iter().flat_map(|b| b.bytes).collect();
            if let Some(total) = total_length.0 {
                bytes.resize(total, 0);
            }
            Buffer { bytes }
        }),
    )?;
    ctor.set(
        "isBuffer",
        Func::from(|ctx: Ctx<'js>, value: Value<'js>| Buffer::from_js(&ctx, value).is_ok()),
    )?;
    ctor.set("isEncoding", Func::from(|name: String| is_encoding(&name)))?;
    ctor.set(
        "byteLength",
        Func::from(|s: String, encoding: Opt<String>| decode(&s, enc_or(encoding, Encoding::Utf8)).len()),
    )?;
    ctor.set(
        "compare",
        Func::from(|a: Buffer, b: Buffer| match a.bytes.cmp(&b.bytes) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }),
    )?;

    ns.set("Buffer", ctor)?;
    Ok(ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_round_trip() {
        for s in ["hello", "", "héllo wörld", "emoji 🎉"] {
            let bytes = decode(s, Encoding::Utf8);
            assert_eq!(encode(&bytes, Encoding::Utf8), s);
        }
    }

    #[test]
    fn base64_round_trip() {
        let bytes = vec![0, 1, 2, 3, 255, 254, 10, 20];
        let b64 = encode(&bytes, Encoding::Base64);
        assert_eq!(decode(&b64, Encoding::Base64), bytes);
    }

    #[test]
    fn hex_round_trip() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        let hex = encode(&bytes, Encoding::Hex);
        assert_eq!(hex, "deadbeef");
        assert_eq!(decode(&hex, Encoding::Hex), bytes);
    }

    #[test]
    fn find_subslice_reports_first_and_last() {
        let haystack = b"abcabc";
        assert_eq!(find_subslice(haystack, b"abc", false), 0);
        assert_eq!(find_subslice(haystack, b"abc", true), 3);
        assert_eq!(find_subslice(haystack, b"xyz", false), -1);
    }
}

//! `crypto` built-in (spec §4.3): hashing, HMAC, AEAD cipher constructors,
//! host CSPRNG random bytes, constant-time comparison, and async PBKDF2.
//! MD5 is implemented in software (via `md-5`) because `ring`, the
//! primitive library backing the rest of this module, deliberately omits
//! it.

use std::cell::RefCell;

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rsquickjs::prelude::{Func, Opt};
use rsquickjs::{Ctx, Exception, Object, Result, TypedArray};
use sha2::{Sha256, Sha384, Sha512};

use crate::buffer::{decode, encode, Buffer, Encoding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashAlgo {
    Md5,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgo {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "md5" => Some(HashAlgo::Md5),
            "sha256" => Some(HashAlgo::Sha256),
            "sha384" => Some(HashAlgo::Sha384),
            "sha512" => Some(HashAlgo::Sha512),
            _ => None,
        }
    }
}

enum HasherState {
    Md5(Md5),
    Sha256(Box<Sha256>),
    Sha384(Box<Sha384>),
    Sha512(Box<Sha512>),
}

impl HasherState {
    fn new(algo: HashAlgo) -> Self {
        match algo {
            HashAlgo::Md5 => HasherState::Md5(Md5::new()),
            HashAlgo::Sha256 => HasherState::Sha256(Box::new(Sha256::new())),
            HashAlgo::Sha384 => HasherState::Sha384(Box::new(Sha384::new())),
            HashAlgo::Sha512 => HasherState::Sha512(Box::new(Sha512::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            HasherState::Md5(h) => Digest::update(h, data),
            HasherState::Sha256(h) => Digest::update(h.as_mut(), data),
            HasherState::Sha384(h) => Digest::update(h.as_mut(), data),
            HasherState::Sha512(h) => Digest::update(h.as_mut(), data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            HasherState::Md5(h) => h.finalize().to_vec(),
            HasherState::Sha256(h) => h.finalize().to_vec(),
            HasherState::Sha384(h) => h.finalize().to_vec(),
            HasherState::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// `crypto.createHash(algorithm)` result: a Node-shaped `Hash` with
/// `update`/`digest`, consumed once (digesting clears the internal state,
/// matching Node's throw-on-reuse behavior via a `None` state).
#[rsquickjs::class]
#[derive(rsquickjs::class::Trace, rsquickjs::JsLifetime)]
pub struct Hash {
    #[qjs(skip_trace)]
    state: RefCell<Option<HasherState>>,
}

#[rsquickjs::methods]
impl<'js> Hash {
    pub fn update(&self, ctx: Ctx<'js>, data: BinaryInput, encoding: Opt<String>) -> Result<()> {
        let bytes = data.into_bytes(encoding);
        let mut state = self.state.borrow_mut();
        match state.as_mut() {
            Some(h) => {
                h.update(&bytes);
                Ok(())
            }
            None => Err(Exception::throw_message(&ctx, "Hash already digested")),
        }
    }

    pub fn digest(&self, ctx: Ctx<'js>, encoding: Opt<String>) -> Result<rsquickjs::Value<'js>> {
        let state = self.state.borrow_mut().take();
        let Some(state) = state else {
            return Err(Exception::throw_message(&ctx, "Hash already digested"));
        };
        let bytes = state.finalize();
        digest_output(&ctx, bytes, encoding)
    }
}

/// `crypto.createHmac(algorithm, key)` result, mirroring [`Hash`].
#[rsquickjs::class]
#[derive(rsquickjs::class::Trace, rsquickjs::JsLifetime)]
pub struct HmacObject {
    #[qjs(skip_trace)]
    state: RefCell<Option<HmacState>>,
}

enum HmacState {
    Sha256(Box<Hmac<Sha256>>),
    Sha384(Box<Hmac<Sha384>>),
    Sha512(Box<Hmac<Sha512>>),
}

#[rsquickjs::methods]
impl<'js> HmacObject {
    pub fn update(&self, ctx: Ctx<'js>, data: BinaryInput, encoding: Opt<String>) -> Result<()> {
        let bytes = data.into_bytes(encoding);
        let mut state = self.state.borrow_mut();
        match state.as_mut() {
            Some(HmacState::Sha256(m)) => m.update(&bytes),
            Some(HmacState::Sha384(m)) => m.update(&bytes),
            Some(HmacState::Sha512(m)) => m.update(&bytes),
            None => return Err(Exception::throw_message(&ctx, "Hmac already digested")),
        }
        Ok(())
    }

    pub fn digest(&self, ctx: Ctx<'js>, encoding: Opt<String>) -> Result<rsquickjs::Value<'js>> {
        let state = self.state.borrow_mut().take();
        let bytes = match state {
            Some(HmacState::Sha256(m)) => m.finalize().into_bytes().to_vec(),
            Some(HmacState::Sha384(m)) => m.finalize().into_bytes().to_vec(),
            Some(HmacState::Sha512(m)) => m.finalize().into_bytes().to_vec(),
            None => return Err(Exception::throw_message(&ctx, "Hmac already digested")),
        };
        digest_output(&ctx, bytes, encoding)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CipherAlgo {
    Aes128Gcm,
    Aes256Gcm,
    Chacha20Poly1305,
}

impl CipherAlgo {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "aes128gcm" => Some(CipherAlgo::Aes128Gcm),
            "aes256gcm" => Some(CipherAlgo::Aes256Gcm),
            "chacha20poly1305" => Some(CipherAlgo::Chacha20Poly1305),
            _ => None,
        }
    }

    fn ring_algorithm(self) -> &'static ring::aead::Algorithm {
        match self {
            CipherAlgo::Aes128Gcm => &ring::aead::AES_128_GCM,
            CipherAlgo::Aes256Gcm => &ring::aead::AES_256_GCM,
            CipherAlgo::Chacha20Poly1305 => &ring::aead::CHACHA20_POLY1305,
        }
    }
}

fn aead_key_from_bytes(algo: CipherAlgo, key_bytes: &[u8]) -> std::result::Result<ring::aead::LessSafeKey, String> {
    let algorithm = algo.ring_algorithm();
    if key_bytes.len() != algorithm.key_len() {
        return Err(format!(
            "invalid key length: expected {} bytes, got {}",
            algorithm.key_len(),
            key_bytes.len()
        ));
    }
    let unbound =
        ring::aead::UnboundKey::new(algorithm, key_bytes).map_err(|_| "invalid cipher key".to_string())?;
    Ok(ring::aead::LessSafeKey::new(unbound))
}

fn aead_nonce_from_bytes(iv_bytes: &[u8]) -> std::result::Result<ring::aead::Nonce, String> {
    ring::aead::Nonce::try_assume_unique_for_key(iv_bytes)
        .map_err(|_| format!("invalid iv length: expected {} bytes", ring::aead::NONCE_LEN))
}

fn aead_key(ctx: &Ctx<'_>, algo: CipherAlgo, key_bytes: &[u8]) -> Result<ring::aead::LessSafeKey> {
    aead_key_from_bytes(algo, key_bytes).map_err(|e| Exception::throw_range(ctx, &e))
}

fn aead_nonce(ctx: &Ctx<'_>, iv_bytes: &[u8]) -> Result<ring::aead::Nonce> {
    aead_nonce_from_bytes(iv_bytes).map_err(|e| Exception::throw_range(ctx, &e))
}

/// `crypto.createCipheriv(algorithm, key, iv)` result: AEAD-only
/// (`aes-128-gcm`, `aes-256-gcm`, `chacha20-poly1305`) since `ring`, the
/// primitive library backing this module, deliberately omits classic
/// non-authenticated modes like CBC/CTR. `update` buffers input; the actual
/// seal happens in `final`, after which `getAuthTag` exposes the tag,
/// mirroring Node's `CipherGCM` shape.
#[rsquickjs::class]
#[derive(rsquickjs::class::Trace, rsquickjs::JsLifetime)]
pub struct Cipher {
    #[qjs(skip_trace)]
    state: RefCell<Option<(ring::aead::LessSafeKey, ring::aead::Nonce, Vec<u8>)>>,
    #[qjs(skip_trace)]
    auth_tag: RefCell<Option<Vec<u8>>>,
}

#[rsquickjs::methods]
impl<'js> Cipher {
    pub fn update(&self, ctx: Ctx<'js>, data: BinaryInput, encoding: Opt<String>) -> Result<Buffer> {
        let bytes = data.into_bytes(encoding);
        let mut state = self.state.borrow_mut();
        match state.as_mut() {
            Some((_, _, buffer)) => {
                buffer.extend_from_slice(&bytes);
                Ok(Buffer { bytes: Vec::new() })
            }
            None => Err(Exception::throw_message(&ctx, "Cipher already finalized")),
        }
    }

    #[qjs(rename = "final")]
    pub fn finish(&self, ctx: Ctx<'js>) -> Result<Buffer> {
        let state = self.state.borrow_mut().take();
        let Some((key, nonce, mut buffer)) = state else {
            return Err(Exception::throw_message(&ctx, "Cipher already finalized"));
        };
        key.seal_in_place_append_tag(nonce, ring::aead::Aad::empty(), &mut buffer)
            .map_err(|_| Exception::throw_message(&ctx, "encryption failed"))?;
        let tag_len = key.algorithm().tag_len();
        let tag = buffer.split_off(buffer.len() - tag_len);
        *self.auth_tag.borrow_mut() = Some(tag);
        Ok(Buffer { bytes: buffer })
    }

    #[qjs(rename = "getAuthTag")]
    pub fn get_auth_tag(&self, ctx: Ctx<'js>) -> Result<Buffer> {
        self.auth_tag
            .borrow()
            .clone()
            .map(|bytes| Buffer { bytes })
            .ok_or_else(|| Exception::throw_message(&ctx, "final() must be called before getAuthTag()"))
    }
}

/// `crypto.createDecipheriv(algorithm, key, iv)` result, mirroring
/// [`Cipher`]; `setAuthTag` must be called before `final`.
#[rsquickjs::class]
#[derive(rsquickjs::class::Trace, rsquickjs::JsLifetime)]
pub struct Decipher {
    #[qjs(skip_trace)]
    state: RefCell<Option<(ring::aead::LessSafeKey, ring::aead::Nonce, Vec<u8>)>>,
    #[qjs(skip_trace)]
    auth_tag: RefCell<Option<Vec<u8>>>,
}

#[rsquickjs::methods]
impl<'js> Decipher {
    pub fn update(&self, ctx: Ctx<'js>, data: BinaryInput, encoding: Opt<String>) -> Result<Buffer> {
        let bytes = data.into_bytes(encoding);
        let mut state = self.state.borrow_mut();
        match state.as_mut() {
            Some((_, _, buffer)) => {
                buffer.extend_from_slice(&bytes);
                Ok(Buffer { bytes: Vec::new() })
            }
            None => Err(Exception::throw_message(&ctx, "Decipher already finalized")),
        }
    }

    #[qjs(rename = "setAuthTag")]
    pub fn set_auth_tag(&self, ctx: Ctx<'js>, tag: BinaryInput) -> Result<()> {
        let bytes = tag.into_bytes(Opt(None));
        if self.state.borrow().is_none() {
            return Err(Exception::throw_message(&ctx, "Decipher already finalized"));
        }
        *self.auth_tag.borrow_mut() = Some(bytes);
        Ok(())
    }

    #[qjs(rename = "final")]
    pub fn finish(&self, ctx: Ctx<'js>) -> Result<Buffer> {
        let state = self.state.borrow_mut().take();
        let Some((key, nonce, mut buffer)) = state else {
            return Err(Exception::throw_message(&ctx, "Decipher already finalized"));
        };
        let tag = self
            .auth_tag
            .borrow_mut()
            .take()
            .ok_or_else(|| Exception::throw_message(&ctx, "setAuthTag() must be called before final()"))?;
        buffer.extend_from_slice(&tag);
        let plaintext_len = key
            .open_in_place(nonce, ring::aead::Aad::empty(), &mut buffer)
            .map_err(|_| Exception::throw_message(&ctx, "decryption failed: authentication tag mismatch"))?
            .len();
        buffer.truncate(plaintext_len);
        Ok(Buffer { bytes: buffer })
    }
}

/// Accepts a JS string or a `Buffer`/`Uint8Array` for hash/hmac input.
pub enum BinaryInput {
    Str(String),
    Bytes(Vec<u8>),
}

impl BinaryInput {
    fn into_bytes(self, encoding: Opt<String>) -> Vec<u8> {
        match self {
            BinaryInput::Str(s) => {
                let enc = encoding.0.and_then(|e| Encoding::parse(&e)).unwrap_or(Encoding::Utf8);
                decode(&s, enc)
            }
            BinaryInput::Bytes(b) => b,
        }
    }
}

impl<'js> rsquickjs::FromJs<'js> for BinaryInput {
    fn from_js(ctx: &Ctx<'js>, value: rsquickjs::Value<'js>) -> Result<Self> {
        if let Some(s) = value.as_string() {
            return Ok(BinaryInput::Str(s.to_string()?));
        }
        if let Ok(buf) = Buffer::from_js(ctx, value.clone()) {
            return Ok(BinaryInput::Bytes(buf.bytes));
        }
        if let Ok(ta) = TypedArray::<u8>::from_js(ctx, value) {
            return Ok(BinaryInput::Bytes(ta.as_bytes().unwrap_or_default().to_vec()));
        }
        Err(Exception::throw_type(ctx, "expected a string or Buffer"))
    }
}

fn digest_output<'js>(ctx: &Ctx<'js>, bytes: Vec<u8>, encoding: Opt<String>) -> Result<rsquickjs::Value<'js>> {
    match encoding.0 {
        Some(name) => {
            let enc = Encoding::parse(&name)
                .ok_or_else(|| Exception::throw_type(ctx, "unsupported digest encoding"))?;
            rsquickjs::IntoJs::into_js(encode(&bytes, enc), ctx)
        }
        None => rsquickjs::IntoJs::into_js(Buffer { bytes }, ctx),
    }
}

/// Build the `crypto` namespace.
pub fn install<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;

    ns.set(
        "createHash",
        Func::from(|ctx: Ctx<'js>, algorithm: String| -> Result<Hash> {
            let algo = HashAlgo::parse(&algorithm)
                .ok_or_else(|| Exception::throw_type(&ctx, &format!("unsupported hash algorithm '{algorithm}'")))?;
            Ok(Hash {
                state: RefCell::new(Some(HasherState::new(algo))),
            })
        }),
    )?;

    ns.set(
        "createHmac",
        Func::from(|ctx: Ctx<'js>, algorithm: String, key: BinaryInput| -> Result<HmacObject> {
            let key_bytes = key.into_bytes(Opt(None));
            let state = match algorithm.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
                "sha256" => HmacState::Sha256(Box::new(
                    Hmac::<Sha256>::new_from_slice(&key_bytes).expect("HMAC accepts any key length"),
                )),
                "sha384" => HmacState::Sha384(Box::new(
                    Hmac::<Sha384>::new_from_slice(&key_bytes).expect("HMAC accepts any key length"),
                )),
                "sha512" => HmacState::Sha512(Box::new(
                    Hmac::<Sha512>::new_from_slice(&key_bytes).expect("HMAC accepts any key length"),
                )),
                other => {
                    return Err(Exception::throw_type(&ctx, &format!("unsupported hmac algorithm '{other}'")))
                }
            };
            Ok(HmacObject {
                state: RefCell::new(Some(state)),
            })
        }),
    )?;

    ns.set(
        "randomBytes",
        Func::from(|ctx: Ctx<'js>, size: usize| -> Result<Buffer> {
            use ring::rand::{SecureRandom, SystemRandom};
            let mut bytes = vec![0u8; size];
            SystemRandom::new()
                .fill(&mut bytes)
                .map_err(|_| Exception::throw_message(&ctx, "failed to read from host CSPRNG"))?;
            Ok(Buffer { bytes })
        }),
    )?;

    ns.set(
        "randomUUID",
        Func::from(|ctx: Ctx<'js>| -> Result<String> {
            use ring::rand::{SecureRandom, SystemRandom};
            let mut bytes = [0u8; 16];
            SystemRandom::new()
                .fill(&mut bytes)
                .map_err(|_| Exception::throw_message(&ctx, "failed to read from host CSPRNG"))?;
            bytes[6] = (bytes[6] & 0x0f) | 0x40;
            bytes[8] = (bytes[8] & 0x3f) | 0x80;
            let hex = hex_simd::encode_to_string(&bytes, hex_simd::AsciiCase::Lower);
            Ok(format!(
                "{}-{}-{}-{}-{}",
                &hex[0..8],
                &hex[8..12],
                &hex[12..16],
                &hex[16..20],
                &hex[20..32]
            ))
        }),
    )?;

    ns.set(
        "timingSafeEqual",
        Func::from(|a: BinaryInput, b: BinaryInput| {
            let a = a.into_bytes(Opt(None));
            let b = b.into_bytes(Opt(None));
            a.len() == b.len() && ring::constant_time::verify_slices_are_equal(&a, &b).is_ok()
        }),
    )?;

    ns.set(
        "pbkdf2",
        Func::from(
            |ctx: Ctx<'js>,
             password: BinaryInput,
             salt: BinaryInput,
             iterations: u32,
             keylen: usize,
             digest: String,
             callback: rsquickjs::Function<'js>| {
                let password = password.into_bytes(Opt(None));
                let salt = salt.into_bytes(Opt(None));
                let result = pbkdf2_derive(&password, &salt, iterations, keylen, &digest)
                    .map_err(|e| Exception::throw_type(&ctx, &e));
                let ctx2 = ctx.clone();
                ctx.spawn(async move {
                    match result {
                        Ok(bytes) => {
                            let _ = callback.call::<_, ()>((
                                rsquickjs::Value::new_null(ctx2.clone()),
                                Buffer { bytes },
                            ));
                        }
                        Err(err) => {
                            let _ = callback.call::<_, ()>((err.to_string(), rsquickjs::Value::new_undefined(ctx2)));
                        }
                    }
                });
                Ok::<(), rsquickjs::Error>(())
            },
        ),
    )?;

    ns.set(
        "pbkdf2Sync",
        Func::from(
            |ctx: Ctx<'js>, password: BinaryInput, salt: BinaryInput, iterations: u32, keylen: usize, digest: Opt<String>| -> Result<Buffer> {
                let password = password.into_bytes(Opt(None));
                let salt = salt.into_bytes(Opt(None));
                let digest_name = digest.0.unwrap_or_else(|| "sha256".to_string());
                let bytes = pbkdf2_derive(&password, &salt, iterations, keylen, &digest_name)
                    .map_err(|e| Exception::throw_type(&ctx, &e))?;
                Ok(Buffer { bytes })
            },
        ),
    )?;

    ns.set(
        "createCipheriv",
        Func::from(
            |ctx: Ctx<'js>, algorithm: String, key: BinaryInput, iv: BinaryInput| -> Result<Cipher> {
                let algo = CipherAlgo::parse(&algorithm)
                    .ok_or_else(|| Exception::throw_type(&ctx, &format!("unsupported cipher algorithm '{algorithm}'")))?;
                let key_bytes = key.into_bytes(Opt(None));
                let iv_bytes = iv.into_bytes(Opt(None));
                let aead_key = aead_key(&ctx, algo, &key_bytes)?;
                let nonce = aead_nonce(&ctx, &iv_bytes)?;
                Ok(Cipher {
                    state: RefCell::new(Some((aead_key, nonce, Vec::new()))),
                    auth_tag: RefCell::new(None),
                })
            },
        ),
    )?;

    ns.set(
        "createDecipheriv",
        Func::from(
            |ctx: Ctx<'js>, algorithm: String, key: BinaryInput, iv: BinaryInput| -> Result<Decipher> {
                let algo = CipherAlgo::parse(&algorithm)
                    .ok_or_else(|| Exception::throw_type(&ctx, &format!("unsupported cipher algorithm '{algorithm}'")))?;
                let key_bytes = key.into_bytes(Opt(None));
                let iv_bytes = iv.into_bytes(Opt(None));
                let aead_key = aead_key(&ctx, algo, &key_bytes)?;
                let nonce = aead_nonce(&ctx, &iv_bytes)?;
                Ok(Decipher {
                    state: RefCell::new(Some((aead_key, nonce, Vec::new()))),
                    auth_tag: RefCell::new(None),
                })
            },
        ),
    )?;

    ns.set(
        "getRandomValues",
        Func::from(|ctx: Ctx<'js>, array: TypedArray<'js, u8>| -> Result<TypedArray<'js, u8>> {
            use ring::rand::{SecureRandom, SystemRandom};
            let len = array.len();
            let mut bytes = vec![0u8; len];
            SystemRandom::new()
                .fill(&mut bytes)
                .map_err(|_| Exception::throw_message(&ctx, "failed to read from host CSPRNG"))?;
            for (i, b) in bytes.into_iter().enumerate() {
                array.set(i, b)?;
            }
            Ok(array)
        }),
    )?;

    Ok(ns)
}

fn pbkdf2_derive(password: &[u8], salt: &[u8], iterations: u32, keylen: usize, digest: &str) -> Result<Vec<u8>, String> {
    use ring::pbkdf2;
    let algo = match digest.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
        "sha256" => pbkdf2::PBKDF2_HMAC_SHA256,
        "sha384" => pbkdf2::PBKDF2_HMAC_SHA384,
        "sha512" => pbkdf2::PBKDF2_HMAC_SHA512,
        other => return Err(format!("unsupported pbkdf2 digest '{other}'")),
    };
    let iterations = std::num::NonZeroU32::new(iterations.max(1)).expect("clamped above zero");
    let mut out = vec![0u8; keylen];
    pbkdf2::derive(algo, iterations, salt, password, &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_matches_known_vector() {
        let mut hasher = HasherState::new(HashAlgo::Md5);
        hasher.update(b"abc");
        let digest = hasher.finalize();
        assert_eq!(
            hex_simd::encode_to_string(&digest, hex_simd::AsciiCase::Lower),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn sha256_matches_known_vector() {
        let mut hasher = HasherState::new(HashAlgo::Sha256);
        hasher.update(b"abc");
        let digest = hasher.finalize();
        assert_eq!(
            hex_simd::encode_to_string(&digest, hex_simd::AsciiCase::Lower),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn pbkdf2_derive_is_deterministic() {
        let a = pbkdf2_derive(b"password", b"salt", 10, 32, "sha256").unwrap();
        let b = pbkdf2_derive(b"password", b"salt", 10, 32, "sha256").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    fn seal_and_open(algo: CipherAlgo, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let seal_key = aead_key_from_bytes(algo, key).unwrap();
        let nonce = aead_nonce_from_bytes(iv).unwrap();
        let mut buffer = plaintext.to_vec();
        seal_key
            .seal_in_place_append_tag(nonce, ring::aead::Aad::empty(), &mut buffer)
            .unwrap();

        let open_key = aead_key_from_bytes(algo, key).unwrap();
        let nonce = aead_nonce_from_bytes(iv).unwrap();
        let len = open_key
            .open_in_place(nonce, ring::aead::Aad::empty(), &mut buffer)
            .unwrap()
            .len();
        buffer.truncate(len);
        buffer
    }

    #[test]
    fn aes_256_gcm_round_trips() {
        let key = [7u8; 32];
        let iv = [9u8; 12];
        let plaintext = b"server-rendered payload";
        assert_eq!(seal_and_open(CipherAlgo::Aes256Gcm, &key, &iv, plaintext), plaintext);
    }

    #[test]
    fn chacha20_poly1305_round_trips() {
        let key = [3u8; 32];
        let iv = [5u8; 12];
        let plaintext = b"chunked stream bytes";
        assert_eq!(
            seal_and_open(CipherAlgo::Chacha20Poly1305, &key, &iv, plaintext),
            plaintext
        );
    }

    #[test]
    fn gcm_open_rejects_tampered_ciphertext() {
        let algo = CipherAlgo::Aes128Gcm;
        let key = [1u8; 16];
        let iv = [2u8; 12];
        let seal_key = aead_key_from_bytes(algo, &key).unwrap();
        let nonce = aead_nonce_from_bytes(&iv).unwrap();
        let mut buffer = b"hello".to_vec();
        seal_key
            .seal_in_place_append_tag(nonce, ring::aead::Aad::empty(), &mut buffer)
            .unwrap();
        buffer[0] ^= 0xff;

        let open_key = aead_key_from_bytes(algo, &key).unwrap();
        let nonce = aead_nonce_from_bytes(&iv).unwrap();
        assert!(open_key.open_in_place(nonce, ring::aead::Aad::empty(), &mut buffer).is_err());
    }

    #[test]
    fn cipher_algo_rejects_wrong_key_length() {
        assert!(aead_key_from_bytes(CipherAlgo::Aes256Gcm, &[0u8; 16]).is_err());
    }

    #[test]
    fn cipher_algo_rejects_wrong_iv_length() {
        assert!(aead_nonce_from_bytes(&[0u8; 8]).is_err());
    }
}

//! Pluggable page codec (spec §4.K).
//!
//! Two stock handlers are baked in: [`PassThroughCodec`] for unencrypted files
//! and [`RefuseCodec`] for encrypted files this crate cannot read. Which one
//! applies is decided from page 0's `codecType` byte and its encoding-key
//! word: a zero key means pass-through regardless of the codec type byte.
//!
//! Grounded on the teacher's `Storage` trait in `stg.rs` — one trait, one
//! stock impl — generalized here to two stock impls plus a selecting provider.

use crate::error::{Error, Result};
use crate::format::OFFSET_CODEC_TYPE;

/// Transforms page bytes between their on-disk and in-memory representation.
pub trait PageCodec: Send + Sync {
    /// Decode `page` (freshly read from storage) in place.
    fn decode(&self, page_number: i64, page: &mut [u8]) -> Result<()>;

    /// Encode `page` in place before it is written to storage.
    fn encode(&self, page_number: i64, page: &mut [u8]) -> Result<()>;
}

/// The codec for unencrypted files: bytes pass through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughCodec;

impl PageCodec for PassThroughCodec {
    fn decode(&self, _page_number: i64, _page: &mut [u8]) -> Result<()> {
        Ok(())
    }

    fn encode(&self, _page_number: i64, _page: &mut [u8]) -> Result<()> {
        Ok(())
    }
}

/// The codec for encrypted files this crate has no key material for: any
/// attempt to decode or encode a page fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct RefuseCodec {
    /// The codec-type byte that triggered the refusal, surfaced in the error.
    pub codec_type: u8,
}

impl PageCodec for RefuseCodec {
    fn decode(&self, _page_number: i64, _page: &mut [u8]) -> Result<()> {
        Err(Error::UnsupportedCodec(format!(
            "codec type {:#04x} is not supported",
            self.codec_type
        )))
    }

    fn encode(&self, _page_number: i64, _page: &mut [u8]) -> Result<()> {
        Err(Error::UnsupportedCodec(format!(
            "codec type {:#04x} is not supported",
            self.codec_type
        )))
    }
}

/// Picks the codec a database should use, given page 0's header bytes.
///
/// Implementations may register support for additional codec types; the
/// default provider only recognises the unencrypted case.
pub trait CodecProvider: Send + Sync {
    /// Choose a codec for `codec_type`/`encoding_key` as read from page 0.
    fn select(&self, codec_type: u8, encoding_key: u32) -> Box<dyn PageCodec>;
}

/// The provider used when no custom codec registration is supplied: pass
/// through when the encoding key is zero, refuse otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCodecProvider;

impl CodecProvider for DefaultCodecProvider {
    fn select(&self, codec_type: u8, encoding_key: u32) -> Box<dyn PageCodec> {
        if encoding_key == 0 {
            Box::new(PassThroughCodec)
        } else {
            Box::new(RefuseCodec { codec_type })
        }
    }
}

/// Read the codec-type byte out of a page-0 buffer.
pub fn codec_type_of(page0: &[u8]) -> u8 {
    page0[OFFSET_CODEC_TYPE]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_key_is_pass_through_even_with_nonzero_codec_type() {
        let provider = DefaultCodecProvider;
        let codec = provider.select(0x01, 0);
        let mut page = [0u8; 16];
        assert!(codec.decode(0, &mut page).is_ok());
    }

    #[test]
    fn nonzero_key_refuses() {
        let provider = DefaultCodecProvider;
        let codec = provider.select(0x01, 0x1234);
        let mut page = [0u8; 16];
        assert!(matches!(
            codec.decode(0, &mut page),
            Err(Error::UnsupportedCodec(_))
        ));
    }

    #[test]
    fn pass_through_is_a_no_op() {
        let codec = PassThroughCodec;
        let mut page = [1u8, 2, 3];
        let before = page;
        codec.encode(0, &mut page).unwrap();
        assert_eq!(page, before);
    }
}

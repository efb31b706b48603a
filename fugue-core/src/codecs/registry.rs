// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry for codec engines to support lookup and instantiation of decoders and encoders
//! dynamically at runtime.

use std::collections::HashMap;
use std::hash::Hash;

use log::debug;

use crate::codecs::{
    CodecId, CodecInfo, CodecParameters, Decoder, DecoderOptions, Encoder, EncoderOptions,
};
use crate::common::Tier;
use crate::errors::{unsupported_error, Result};

/// Description of a supported codec.
#[derive(Copy, Clone, Debug)]
pub struct SupportedCodec {
    pub id: CodecId,
    pub info: CodecInfo,
}

/// To support registration in a codec registry, a `Decoder` must implement the
/// `RegisterableDecoder` trait.
pub trait RegisterableDecoder: Decoder {
    fn try_registry_new(
        params: &CodecParameters,
        opts: &DecoderOptions,
    ) -> Result<Box<dyn Decoder>>
    where
        Self: Sized;

    /// Get a list of codecs supported by this decoder.
    fn supported_codecs() -> &'static [SupportedCodec];
}

/// To support registration in a codec registry, an `Encoder` must implement the
/// `RegisterableEncoder` trait.
pub trait RegisterableEncoder: Encoder {
    fn try_registry_new(
        params: &CodecParameters,
        opts: &EncoderOptions,
    ) -> Result<Box<dyn Encoder>>
    where
        Self: Sized;

    /// Get a list of codecs supported by this encoder.
    fn supported_codecs() -> &'static [SupportedCodec];
}

/// `Decoder` factory function. Creates a boxed `Decoder`.
pub type DecoderFactoryFn = fn(&CodecParameters, &DecoderOptions) -> Result<Box<dyn Decoder>>;

/// `Encoder` factory function. Creates a boxed `Encoder`.
pub type EncoderFactoryFn = fn(&CodecParameters, &EncoderOptions) -> Result<Box<dyn Encoder>>;

/// Registration details of a decoder for a particular codec.
pub struct RegisteredDecoder {
    /// Codec details.
    pub codec: SupportedCodec,
    /// Factory function to instantiate the decoder.
    pub factory: DecoderFactoryFn,
}

/// Registration details of an encoder for a particular codec.
pub struct RegisteredEncoder {
    /// Codec details.
    pub codec: SupportedCodec,
    /// Factory function to instantiate the encoder.
    pub factory: EncoderFactoryFn,
}

struct InnerCodecRegistry<C, R> {
    preferred: HashMap<C, R>,
    standard: HashMap<C, R>,
    fallback: HashMap<C, R>,
}

impl<C, R> Default for InnerCodecRegistry<C, R> {
    fn default() -> Self {
        Self {
            preferred: Default::default(),
            standard: Default::default(),
            fallback: Default::default(),
        }
    }
}

impl<C, R> InnerCodecRegistry<C, R>
where
    C: Hash + std::cmp::Eq,
{
    fn get(&self, id: &C) -> Option<&R> {
        self.preferred.get(id).or_else(|| self.standard.get(id)).or_else(|| self.fallback.get(id))
    }

    fn get_at_tier(&self, tier: Tier, id: &C) -> Option<&R> {
        match tier {
            Tier::Preferred => self.preferred.get(id),
            Tier::Standard => self.standard.get(id),
            Tier::Fallback => self.fallback.get(id),
        }
    }

    fn register_at_tier(&mut self, tier: Tier, id: C, reg: R) -> Option<R> {
        match tier {
            Tier::Preferred => self.preferred.insert(id, reg),
            Tier::Standard => self.standard.insert(id, reg),
            Tier::Fallback => self.fallback.insert(id, reg),
        }
    }
}

/// A `CodecRegistry` allows the registration of codec engines, and provides methods to
/// instantiate a `Decoder` or `Encoder` given a `CodecParameters` object.
#[derive(Default)]
pub struct CodecRegistry {
    decoders: InnerCodecRegistry<CodecId, RegisteredDecoder>,
    encoders: InnerCodecRegistry<CodecId, RegisteredEncoder>,
}

impl CodecRegistry {
    /// Instantiate a new `CodecRegistry`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Get the registration information of the most preferred decoder for the specified codec.
    pub fn get_decoder(&self, id: CodecId) -> Option<&RegisteredDecoder> {
        self.decoders.get(&id)
    }

    /// Get the registration information of the decoder at the specified tier for the specified
    /// codec.
    pub fn get_decoder_at_tier(&self, tier: Tier, id: CodecId) -> Option<&RegisteredDecoder> {
        self.decoders.get_at_tier(tier, &id)
    }

    /// Get the registration information of the most preferred encoder for the specified codec.
    pub fn get_encoder(&self, id: CodecId) -> Option<&RegisteredEncoder> {
        self.encoders.get(&id)
    }

    /// Registers all codecs supported by the decoder at the standard tier.
    ///
    /// If a supported codec was previously registered by another decoder at the same tier, it
    /// will be replaced within the registry.
    pub fn register_decoder<C: RegisterableDecoder>(&mut self) {
        self.register_decoder_at_tier::<C>(Tier::Standard);
    }

    /// Registers all codecs supported by the decoder at a specific tier.
    pub fn register_decoder_at_tier<C: RegisterableDecoder>(&mut self, tier: Tier) {
        for codec in C::supported_codecs() {
            let reg = RegisteredDecoder {
                codec: *codec,
                factory: |params, opts| C::try_registry_new(params, opts),
            };

            debug!(
                "registered decoder '{}' for codec {} ({:?})",
                codec.info.short_name, codec.id, tier
            );

            self.decoders.register_at_tier(tier, codec.id, reg);
        }
    }

    /// Registers all codecs supported by the encoder at the standard tier.
    pub fn register_encoder<C: RegisterableEncoder>(&mut self) {
        self.register_encoder_at_tier::<C>(Tier::Standard);
    }

    /// Registers all codecs supported by the encoder at a specific tier.
    pub fn register_encoder_at_tier<C: RegisterableEncoder>(&mut self, tier: Tier) {
        for codec in C::supported_codecs() {
            let reg = RegisteredEncoder {
                codec: *codec,
                factory: |params, opts| C::try_registry_new(params, opts),
            };

            debug!(
                "registered encoder '{}' for codec {} ({:?})",
                codec.info.short_name, codec.id, tier
            );

            self.encoders.register_at_tier(tier, codec.id, reg);
        }
    }

    /// Instantiate a decoder for the specified codec parameters.
    ///
    /// This function searches the registry for a decoder that supports the codec. If one is found,
    /// it will be instantiated with the provided codec parameters and decoder options. If a
    /// suitable decoder could not be found, or the decoder could not be instantiated, an error will
    /// be returned.
    pub fn make_decoder(
        &self,
        params: &CodecParameters,
        opts: &DecoderOptions,
    ) -> Result<Box<dyn Decoder>> {
        if let Some(codec) = self.get_decoder(params.codec()) {
            Ok((codec.factory)(params, opts)?)
        }
        else {
            unsupported_error("core (codec): unsupported codec")
        }
    }

    /// Instantiate an encoder for the specified codec parameters.
    pub fn make_encoder(
        &self,
        params: &CodecParameters,
        opts: &EncoderOptions,
    ) -> Result<Box<dyn Encoder>> {
        if let Some(codec) = self.get_encoder(params.codec()) {
            Ok((codec.factory)(params, opts)?)
        }
        else {
            unsupported_error("core (codec): unsupported codec")
        }
    }
}

/// Convenience macro for declaring a `SupportedCodec`.
#[macro_export]
macro_rules! support_codec {
    ($id:expr, $short_name:expr, $long_name:expr) => {
        $crate::codecs::registry::SupportedCodec {
            id: $id,
            info: $crate::codecs::CodecInfo { short_name: $short_name, long_name: $long_name },
        }
    };
}

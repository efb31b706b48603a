// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Project Fugue
//!
//! Fugue is a 100% pure Rust layer that drives video and audio codec and container engines. It
//! keeps independently decoded streams of a container in step, provides frame-accurate random
//! access on top of keyframe-based seeking, and enforces the timestamp discipline of encoding.
//!
//! # Support
//!
//! Engines are enabled via. feature flags.
//!
//! | Engine             | Feature Flag | Default |
//! |--------------------|--------------|---------|
//! | Raw codec          | `raw`        | Yes     |
//! | Raw container      | `raw`        | Yes     |
//!
//! # Usage
//!
//! The following steps describe decoding with Fugue:
//!
//! 1.  Instantiate a [`CodecRegistry`][core::codecs::registry::CodecRegistry] and register all
//!     the codecs that are of interest. Alternatively, use [`default::get_codecs`] to get the
//!     default registry with all the enabled codecs pre-registered.
//! 2.  Open the input with a [`FormatReader`][core::formats::FormatReader], such as
//!     [`default::formats::RawReader`].
//! 3.  Wrap the reader in an [`InputContainer`][pump::InputContainer] and open the streams to be
//!     decoded.
//! 4.  Call `next_frame` to decode frames in order, or `frame_at` for random access.
//!
//! Encoding is the mirror image: add streams to an [`OutputContainer`][pump::OutputContainer],
//! add frames with strictly increasing timestamps, and finalize the container.

pub mod default {
    //! The `default` module provides convenience functions and registries to get an implementer
    //! up-and-running as quickly as possible, and to reduce boiler-plate. Using the `default`
    //! module is completely optional and incurs no overhead unless actually used.

    pub mod codecs {
        //! The `codecs` module re-exports all enabled Fugue codecs.

        #[cfg(feature = "raw")]
        pub use fugue_codec_raw::RawDecoder;
        #[cfg(feature = "raw")]
        pub use fugue_codec_raw::RawEncoder;
    }

    pub mod formats {
        //! The `formats` module re-exports all enabled Fugue container readers and writers.

        #[cfg(feature = "raw")]
        pub use fugue_format_raw::RawReader;
        #[cfg(feature = "raw")]
        pub use fugue_format_raw::RawWriter;
    }

    use lazy_static::lazy_static;
    use log::debug;
    use once_cell::sync::OnceCell;

    use fugue_core::codecs::registry::CodecRegistry;
    use fugue_core::codecs::{DecoderOptions, EncoderOptions};
    use fugue_core::errors::{usage_error, Result, UsageErrorKind};
    use fugue_core::formats::FormatOptions;
    use fugue_pump::PumpOptions;

    lazy_static! {
        static ref CODEC_REGISTRY: CodecRegistry = {
            let mut registry = CodecRegistry::new();
            register_enabled_codecs(&mut registry);
            registry
        };
    }

    static CONFIG: OnceCell<Config> = OnceCell::new();

    /// Process-wide default options.
    #[derive(Copy, Clone, Debug, Default)]
    pub struct Config {
        /// Options for the pumps of containers.
        pub pump: PumpOptions,
        /// Options for container readers.
        pub format: FormatOptions,
        /// Options for decoders.
        pub decoder: DecoderOptions,
        /// Options for encoders.
        pub encoder: EncoderOptions,
    }

    /// Install the process-wide default options. Succeeds only once, and only if [`config`] was
    /// not called before, otherwise a usage error is returned and the installed options are
    /// unchanged.
    pub fn init(config: Config) -> Result<()> {
        match CONFIG.set(config) {
            Ok(()) => {
                debug!("installed process-wide configuration: {:?}", config);
                Ok(())
            }
            Err(_) => usage_error(UsageErrorKind::AlreadyInitialized),
        }
    }

    /// Get the process-wide default options. If [`init`] was not called, the default options are
    /// installed and returned.
    pub fn config() -> &'static Config {
        CONFIG.get_or_init(Config::default)
    }

    /// Gets the default `CodecRegistry`. This registry pre-registers all the codecs selected by
    /// the `feature` flags in the includer's `Cargo.toml`. If `features` is not set, the default
    /// set of Fugue codecs is registered.
    ///
    /// This function is lazy and does not instantiate the `CodecRegistry` until the first call to
    /// this function.
    pub fn get_codecs() -> &'static CodecRegistry {
        &CODEC_REGISTRY
    }

    /// Registers all the codecs selected by the `feature` flags in the includer's `Cargo.toml` on
    /// the provided `CodecRegistry`. If `features` is not set, the default set of Fugue codecs is
    /// registered.
    ///
    /// Use this function to easily populate a custom registry with all enabled codecs.
    pub fn register_enabled_codecs(registry: &mut CodecRegistry) {
        #[cfg(feature = "raw")]
        {
            registry.register_decoder::<codecs::RawDecoder>();
            registry.register_encoder::<codecs::RawEncoder>();
        }

        #[cfg(not(feature = "raw"))]
        let _ = registry;
    }

}

pub use fugue_core as core;
pub use fugue_pump as pump;

//! Codec chain for interface calls.
//!
//! Encoders and decoders are kept in two separately ordered lists. Lookup is
//! first-match over registration order: an entry matches when its source type
//! is assignable from the static type in play and its `handle_*` predicate
//! accepts the value. Values no entry claims pass through unchanged, and null
//! never reaches a codec.
//!
//! The chain built by the interface engine always starts with the remote
//! interface codec, so interface values are handled before any general codec
//! appended later.

mod json;
mod remote;
mod types;

pub use json::JsonCodec;
pub use remote::RemoteInterfaceCodec;
pub use types::{Marker, Markers, TypeFlags, TypeKey, TypeRegistry};

use crate::error::Result;
use crate::value::{Value, ValueKind};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Converts a local value into its cross-boundary form.
pub trait Encoder: Send + Sync {
    /// Whether this encoder takes `value` declared as `ty` with `markers`.
    fn handle_encode(&self, value: &Value, ty: TypeKey, markers: &Markers) -> bool;

    fn encode(&self, value: Value, ty: TypeKey) -> Result<Value>;
}

/// Converts a cross-boundary value back into its local form.
pub trait Decoder: Send + Sync {
    /// Whether this decoder produces `ty` from `value` with `markers`.
    fn handle_decode(&self, value: &Value, ty: TypeKey, markers: &Markers) -> bool;

    fn decode(&self, value: Value, ty: TypeKey) -> Result<Value>;
}

/// An encoder and decoder pair.
pub trait Codec: Encoder + Decoder {}

impl<T: Encoder + Decoder> Codec for T {}

struct EncoderEntry {
    source: TypeKey,
    cross: ValueKind,
    encoder: Arc<dyn Encoder>,
}

struct DecoderEntry {
    cross: ValueKind,
    source: TypeKey,
    decoder: Arc<dyn Decoder>,
}

/// Ordered, append-only list of codecs.
pub struct CodecChain {
    types: Arc<TypeRegistry>,
    encoders: RwLock<Vec<EncoderEntry>>,
    decoders: RwLock<Vec<DecoderEntry>>,
}

impl CodecChain {
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            encoders: RwLock::new(Vec::new()),
            decoders: RwLock::new(Vec::new()),
        }
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Append a codec to both lists.
    pub fn append_codec<C>(&self, source: TypeKey, cross: ValueKind, codec: C)
    where
        C: Codec + 'static,
    {
        let codec = Arc::new(codec);
        self.push_encoder(source, cross, codec.clone());
        self.push_decoder(cross, source, codec);
    }

    pub fn append_encoder<E>(&self, source: TypeKey, cross: ValueKind, encoder: E)
    where
        E: Encoder + 'static,
    {
        self.push_encoder(source, cross, Arc::new(encoder));
    }

    pub fn append_decoder<D>(&self, cross: ValueKind, source: TypeKey, decoder: D)
    where
        D: Decoder + 'static,
    {
        self.push_decoder(cross, source, Arc::new(decoder));
    }

    fn push_encoder(&self, source: TypeKey, cross: ValueKind, encoder: Arc<dyn Encoder>) {
        let mut encoders = self.encoders.write().unwrap_or_else(PoisonError::into_inner);
        encoders.push(EncoderEntry {
            source,
            cross,
            encoder,
        });
        debug!("Appended encoder {} -> {:?} at #{}", source, cross, encoders.len() - 1);
    }

    fn push_decoder(&self, cross: ValueKind, source: TypeKey, decoder: Arc<dyn Decoder>) {
        let mut decoders = self.decoders.write().unwrap_or_else(PoisonError::into_inner);
        decoders.push(DecoderEntry {
            cross,
            source,
            decoder,
        });
        debug!("Appended decoder {:?} -> {} at #{}", cross, source, decoders.len() - 1);
    }

    /// Encode `value` declared as `ty`.
    pub fn encode(&self, value: Value, ty: TypeKey, markers: &Markers) -> Result<Value> {
        if value.is_null() {
            return Ok(value);
        }

        // Codecs run after the read lock is released.
        let selected = {
            let encoders = self.encoders.read().unwrap_or_else(PoisonError::into_inner);
            encoders
                .iter()
                .find(|entry| {
                    self.types.is_assignable(entry.source, ty)
                        && entry.encoder.handle_encode(&value, ty, markers)
                })
                .map(|entry| (entry.encoder.clone(), entry.cross))
        };

        match selected {
            Some((encoder, cross)) => {
                let encoded = encoder.encode(value, ty)?;
                debug!("Encoded {} as {:?}", ty, cross);
                Ok(encoded)
            }
            None => Ok(value),
        }
    }

    /// Decode `value` into the local form of `ty`.
    pub fn decode(&self, value: Value, ty: TypeKey, markers: &Markers) -> Result<Value> {
        if value.is_null() {
            return Ok(value);
        }

        let kind = value.kind();
        let selected = {
            let decoders = self.decoders.read().unwrap_or_else(PoisonError::into_inner);
            decoders
                .iter()
                .find(|entry| {
                    entry.cross == kind
                        && self.types.is_assignable(entry.source, ty)
                        && entry.decoder.handle_decode(&value, ty, markers)
                })
                .map(|entry| entry.decoder.clone())
        };

        match selected {
            Some(decoder) => {
                let decoded = decoder.decode(value, ty)?;
                debug!("Decoded {:?} as {}", kind, ty);
                Ok(decoded)
            }
            None => Ok(value),
        }
    }

    pub fn encoder_count(&self) -> usize {
        self.encoders.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn decoder_count(&self) -> usize {
        self.decoders.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    /// Prefixes strings with a fixed tag.
    struct Tag(&'static str);

    impl Encoder for Tag {
        fn handle_encode(&self, value: &Value, _ty: TypeKey, _markers: &Markers) -> bool {
            matches!(value, Value::Str(_))
        }

        fn encode(&self, value: Value, _ty: TypeKey) -> Result<Value> {
            match value {
                Value::Str(s) => Ok(Value::Str(format!("{}:{}", self.0, s))),
                _ => Err(BridgeError::codec("not a string")),
            }
        }
    }

    impl Decoder for Tag {
        fn handle_decode(&self, value: &Value, _ty: TypeKey, _markers: &Markers) -> bool {
            value
                .as_str()
                .is_some_and(|s| s.starts_with(&format!("{}:", self.0)))
        }

        fn decode(&self, value: Value, _ty: TypeKey) -> Result<Value> {
            let s: String = value.into_typed()?;
            Ok(Value::Str(s[self.0.len() + 1..].to_string()))
        }
    }

    fn chain() -> CodecChain {
        CodecChain::new(Arc::new(TypeRegistry::new()))
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = chain();
        let ty = TypeKey::of::<String>();
        let encoded = chain.encode(Value::from("x"), ty, &Markers::none()).unwrap();
        assert_eq!(encoded, Value::from("x"));
        let decoded = chain.decode(encoded, ty, &Markers::none()).unwrap();
        assert_eq!(decoded, Value::from("x"));
    }

    #[test]
    fn test_first_match_wins() {
        let chain = chain();
        let ty = TypeKey::of::<String>();
        chain.append_codec(ty, ValueKind::Str, Tag("first"));
        chain.append_codec(TypeKey::ANY, ValueKind::Str, Tag("second"));

        let encoded = chain.encode(Value::from("x"), ty, &Markers::none()).unwrap();
        assert_eq!(encoded, Value::from("first:x"));
        let decoded = chain.decode(encoded, ty, &Markers::none()).unwrap();
        assert_eq!(decoded, Value::from("x"));
    }

    #[test]
    fn test_source_type_must_be_assignable() {
        let chain = chain();
        chain.append_codec(TypeKey::named("Other"), ValueKind::Str, Tag("t"));

        let encoded = chain
            .encode(Value::from("x"), TypeKey::of::<String>(), &Markers::none())
            .unwrap();
        assert_eq!(encoded, Value::from("x"));
    }

    #[test]
    fn test_decoder_requires_matching_kind() {
        let chain = chain();
        let ty = TypeKey::of::<String>();
        chain.append_decoder(ValueKind::Bytes, ty, Tag("t"));

        let decoded = chain.decode(Value::from("t:x"), ty, &Markers::none()).unwrap();
        assert_eq!(decoded, Value::from("t:x"));
    }

    #[test]
    fn test_null_skips_codecs() {
        let chain = chain();
        chain.append_encoder(TypeKey::ANY, ValueKind::Str, Tag("t"));
        let encoded = chain
            .encode(Value::Null, TypeKey::of::<String>(), &Markers::none())
            .unwrap();
        assert!(encoded.is_null());
        assert_eq!(chain.encoder_count(), 1);
        assert_eq!(chain.decoder_count(), 0);
    }
}

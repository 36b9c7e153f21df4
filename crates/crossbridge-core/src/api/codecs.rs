//! Codec and type registration.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{Codec, Decoder, Encoder, JsonCodec, Marker, TypeKey};
use crate::value::ValueKind;
use crate::ProcessBridge;

impl ProcessBridge {
    /// Append a codec to this process's chain.
    ///
    /// Order matters: earlier codecs take precedence.
    pub fn append_codec<C>(&self, source: TypeKey, cross: ValueKind, codec: C)
    where
        C: Codec + 'static,
    {
        self.engine.codecs().append_codec(source, cross, codec);
    }

    pub fn append_encoder<E>(&self, source: TypeKey, cross: ValueKind, encoder: E)
    where
        E: Encoder + 'static,
    {
        self.engine.codecs().append_encoder(source, cross, encoder);
    }

    pub fn append_decoder<D>(&self, cross: ValueKind, source: TypeKey, decoder: D)
    where
        D: Decoder + 'static,
    {
        self.engine.codecs().append_decoder(cross, source, decoder);
    }

    /// Carry `T` as JSON text, optionally only on parameters marked `gate`.
    pub fn append_json_codec<T>(&self, gate: Option<Marker>)
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let codec = match gate {
            Some(marker) => JsonCodec::<T>::gated(marker),
            None => JsonCodec::<T>::new(),
        };
        self.append_codec(JsonCodec::<T>::key(), ValueKind::Str, codec);
    }

    /// Declare `sub` assignable to `sup` for codec matching.
    pub fn declare_supertype(&self, sub: TypeKey, sup: TypeKey) {
        self.engine.types().declare_supertype(sub, sup);
    }
}

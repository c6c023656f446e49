//! Metadata Matcher
//!
//! Pairs on-chain receivers with the off-chain stream descriptors of an asset config.

use drips_core::{is_canonical_uint, AccountId, DripsError, Result, StreamId, TokenAddress};
use tracing::debug;

use crate::codec::decode_raw_config;
use crate::types::{AssetConfigMetadata, StreamDetails, StreamMetadata};

#[derive(Debug, Clone)]
struct IndexedStream {
    drip_id: u32,
    stream_id: StreamId,
    details: StreamDetails,
}

/// Decoded metadata streams of one (account, token) pair
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    streams: Vec<IndexedStream>,
}

impl MetadataIndex {
    /// Decode every descriptor of the asset config.
    ///
    /// A descriptor that cannot be decoded is an integrity violation: it would make
    /// later receiver matches ambiguous.
    pub fn build(
        sender: &AccountId,
        token: &TokenAddress,
        metadata: Option<&AssetConfigMetadata>,
    ) -> Result<Self> {
        let Some(metadata) = metadata else {
            return Ok(Self::default());
        };

        let streams = metadata
            .streams
            .iter()
            .map(|descriptor| {
                let drip_id = decode_descriptor(descriptor)?;
                Ok(IndexedStream {
                    drip_id,
                    stream_id: StreamId::new(sender, token, drip_id),
                    details: StreamDetails {
                        name: descriptor.name.clone(),
                        description: descriptor.description.clone(),
                        archived: descriptor.archived,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            sender = %sender,
            token = %token,
            streams = streams.len(),
            "Indexed stream metadata"
        );

        Ok(Self { streams })
    }

    /// Find the descriptor for an on-chain drip id. `None` means the stream is unmanaged.
    pub fn match_drip(&self, drip_id: u32) -> Result<Option<&StreamDetails>> {
        let mut matches = self.streams.iter().filter(|s| s.drip_id == drip_id);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(DripsError::Integrity(format!(
                "more than one metadata stream matches drip id {}",
                drip_id
            )));
        }
        Ok(first.map(|s| &s.details))
    }

    pub fn details(&self, stream_id: &StreamId) -> Option<&StreamDetails> {
        self.streams
            .iter()
            .find(|s| &s.stream_id == stream_id)
            .map(|s| &s.details)
    }

    pub fn stream_ids(&self) -> impl Iterator<Item = &StreamId> {
        self.streams.iter().map(|s| &s.stream_id)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

fn decode_descriptor(descriptor: &StreamMetadata) -> Result<u32> {
    let declared = &descriptor.initial_drips_config.drip_id;
    let parsed: Option<u32> = if is_canonical_uint(declared) {
        declared.parse().ok()
    } else {
        None
    };
    let drip_id = parsed.ok_or_else(|| {
        DripsError::Integrity(format!(
            "metadata stream {} has malformed drip id '{}'",
            descriptor.id, declared
        ))
    })?;

    let decoded = decode_raw_config(&descriptor.initial_drips_config.raw).map_err(|e| {
        DripsError::Integrity(format!(
            "metadata stream {} has undecodable config: {}",
            descriptor.id, e
        ))
    })?;
    if decoded.drip_id != drip_id {
        return Err(DripsError::Integrity(format!(
            "metadata stream {} declares drip id {} but its config encodes {}",
            descriptor.id, drip_id, decoded.drip_id
        )));
    }

    Ok(drip_id)
}

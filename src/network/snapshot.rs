//! Binary snapshots of pending-update queues.
//!
//! Pending updates are plain data, so a container's queue can be persisted or
//! shipped elsewhere for inspection. Snapshots use bincode with fixed-size
//! integers; they are a local format and never travel on the live-update wire.
//!
//! # Examples
//!
//! ```
//! use livegump::network::snapshot::{decode_pending, encode_pending};
//! use livegump::{ContainerId, LiveContainer, PropertyValue};
//!
//! let mut container = LiveContainer::new(ContainerId::new(1));
//! let label = container.register(None);
//! container.update_property(label, PropertyValue::Hue(0x35));
//!
//! let bytes = encode_pending(container.pending()).expect("encoding should succeed");
//! let restored = decode_pending(&bytes).expect("decoding should succeed");
//! assert_eq!(restored.len(), 1);
//! ```

use crate::error::LiveGumpError;
use crate::server::pending::PendingUpdate;

fn config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

/// Serializes a sequence of pending updates.
///
/// # Errors
///
/// Returns [`LiveGumpError::Snapshot`] if bincode rejects a value.
pub fn encode_pending<'a, I>(updates: I) -> Result<Vec<u8>, LiveGumpError>
where
    I: IntoIterator<Item = &'a PendingUpdate>,
{
    let updates: Vec<&PendingUpdate> = updates.into_iter().collect();
    bincode::serde::encode_to_vec(&updates, config()).map_err(|e| LiveGumpError::Snapshot {
        context: format!("encoding {} pending updates: {}", updates.len(), e),
    })
}

/// Restores pending updates written by [`encode_pending`].
///
/// # Errors
///
/// Returns [`LiveGumpError::Snapshot`] if the bytes are not a valid snapshot
/// or carry trailing data.
pub fn decode_pending(bytes: &[u8]) -> Result<Vec<PendingUpdate>, LiveGumpError> {
    let (updates, read): (Vec<PendingUpdate>, usize) =
        bincode::serde::decode_from_slice(bytes, config()).map_err(|e| {
            LiveGumpError::Snapshot {
                context: format!("decoding {} snapshot bytes: {}", bytes.len(), e),
            }
        })?;
    if read != bytes.len() {
        return Err(LiveGumpError::Snapshot {
            context: format!("{} trailing bytes after snapshot", bytes.len() - read),
        });
    }
    Ok(updates)
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::network::messages::{AnimationKind, LabelSpec, PropertyValue, WidgetPayload};
    use crate::server::pending::PendingOp;
    use crate::ElementId;

    fn sample() -> Vec<PendingUpdate> {
        vec![
            PendingUpdate {
                sequence: 0,
                op: PendingOp::SetProperty {
                    element: ElementId::new(0),
                    value: PropertyValue::Text("ready".to_owned()),
                },
            },
            PendingUpdate {
                sequence: 1,
                op: PendingOp::AddElement {
                    element: ElementId::new(3),
                    x: 10,
                    y: -4,
                    payload: WidgetPayload::Label(LabelSpec::new("new")),
                },
            },
            PendingUpdate {
                sequence: 2,
                op: PendingOp::Animation {
                    element: ElementId::new(3),
                    kind: AnimationKind::Flash,
                    duration_ms: 300,
                },
            },
            PendingUpdate {
                sequence: 3,
                op: PendingOp::Refresh,
            },
        ]
    }

    #[test]
    fn queue_survives_a_snapshot() {
        let updates = sample();
        let bytes = encode_pending(&updates).unwrap();
        assert_eq!(decode_pending(&bytes).unwrap(), updates);
    }

    #[test]
    fn empty_queue() {
        let bytes = encode_pending(std::iter::empty()).unwrap();
        assert!(decode_pending(&bytes).unwrap().is_empty());
    }

    #[test]
    fn corrupt_snapshots_are_errors() {
        let bytes = encode_pending(&sample()).unwrap();
        let err = decode_pending(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, LiveGumpError::Snapshot { .. }));

        let mut padded = bytes;
        padded.push(0);
        assert!(matches!(
            decode_pending(&padded),
            Err(LiveGumpError::Snapshot { .. })
        ));
    }
}

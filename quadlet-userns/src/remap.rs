//! Container to host id mapping

use quadlet_core::{IdRanges, PodmanCommand};

/// One `container:host:length` mapping entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdMapping {
    /// First container id
    pub container_start: u32,
    /// First host id
    pub host_start: u32,
    /// Number of consecutive ids
    pub length: u32,
}

impl IdMapping {
    /// Create a mapping entry
    #[must_use]
    pub const fn new(container_start: u32, host_start: u32, length: u32) -> Self {
        Self {
            container_start,
            host_start,
            length,
        }
    }
}

/// Compute the id mappings for one axis (uids or gids)
///
/// - `container_id` is always mapped to `host_id`.
/// - Container ids below `remap_start_id` are mapped to themselves, except
///   the two ids above. Pass `u32::MAX` to identity-map everything else.
/// - Remaining container ids are filled greedily, in ascending order, from
///   `available_host_ids`. Ids left over once the pool is exhausted stay
///   unmapped.
///
/// No container id and no host id appears in more than one entry.
///
/// # Example
/// ```
/// use quadlet_userns::{IdMapping, IdRanges, compute_id_maps};
///
/// let pool = IdRanges::of(100_000, 65_536);
/// let maps = compute_id_maps(0, 1000, 1, Some(&pool));
/// assert_eq!(maps[0], IdMapping::new(0, 1000, 1));
/// assert_eq!(maps[1], IdMapping::new(1, 100_000, 65_536));
/// ```
#[must_use]
pub fn compute_id_maps(
    container_id: u32,
    host_id: u32,
    remap_start_id: u32,
    available_host_ids: Option<&IdRanges>,
) -> Vec<IdMapping> {
    let mut available = available_host_ids.cloned().unwrap_or_default();
    let mut unmapped = IdRanges::of(0, remap_start_id);
    let mut to_map = IdRanges::of(0, u32::MAX);

    let mut maps = vec![IdMapping::new(container_id, host_id, 1)];
    to_map.remove(container_id, 1);
    unmapped.remove(container_id, 1);
    unmapped.remove(host_id, 1);
    available.remove(host_id, 1);

    for span in unmapped.iter() {
        maps.push(IdMapping::new(span.start, span.start, span.length));
        to_map.remove(span.start, span.length);
        available.remove(span.start, span.length);
    }

    for span in to_map.iter() {
        let mut start = span.start;
        let mut remaining = span.length;
        while remaining > 0 {
            let Some(host) = available.first() else {
                break;
            };
            let length = host.length.min(remaining);
            maps.push(IdMapping::new(start, host.start, length));
            available.remove(host.start, length);
            start += length;
            remaining -= length;
        }

        if available.is_empty() {
            break;
        }
    }

    maps
}

/// Append the mappings from [`compute_id_maps`] as `flag c:h:n` arguments
pub fn add_id_maps(
    cmd: &mut PodmanCommand,
    flag: &str,
    container_id: u32,
    host_id: u32,
    remap_start_id: u32,
    available_host_ids: Option<&IdRanges>,
) {
    let maps = compute_id_maps(container_id, host_id, remap_start_id, available_host_ids);
    tracing::debug!(
        flag,
        container_id,
        host_id,
        entries = maps.len(),
        "Computed id mappings"
    );
    for map in maps {
        cmd.add_id_map(flag, map.container_start, map.host_start, map.length);
    }
}

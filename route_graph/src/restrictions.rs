//! Turn restrictions arrive keyed by OSM ids. Resolving them takes three
//! scans: the raw restriction list, the way id map (way id to file offset),
//! and the coord file (node id to network point). Whatever can't be resolved
//! is dirty data, logged and dropped.

use std::collections::HashMap;

use anyhow::{Context, Result};
use map_data::{
    read_coord_id_map, read_turn_restrictions, read_way_id_map, ImportParameter, NodeId, OsmId,
    TurnRestrictionKind, COORDS_DAT, TURN_RESTRICTIONS_DAT, WAY_ID_MAP,
};
use osmio::{FileOffset, FileScanner, ScannerMode};
use osmutil::Timer;

/// A restriction with everything resolved: way file offsets and the internal
/// id of the via node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnRestrictionData {
    pub kind: TurnRestrictionKind,
    pub from_way_offset: FileOffset,
    pub to_way_offset: FileOffset,
}

/// Restrictions grouped by the junction they act at.
pub type ViaTurnRestrictions = HashMap<NodeId, Vec<TurnRestrictionData>>;

pub fn resolve_turn_restrictions(
    parameter: &ImportParameter,
    timer: &mut Timer,
) -> Result<ViaTurnRestrictions> {
    let path = parameter.file(TURN_RESTRICTIONS_DAT);
    let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, false)
        .with_context(|| format!("opening {}", path))?;
    let raw = read_turn_restrictions(&mut scanner)?;
    scanner.close()?;
    info!("Read {} turn restriction(s)", raw.len());

    // Which ids we actually need to resolve
    let mut way_offsets: HashMap<OsmId, Option<FileOffset>> = HashMap::new();
    let mut via_ids: HashMap<OsmId, Option<NodeId>> = HashMap::new();
    for r in &raw {
        way_offsets.insert(r.from_way, None);
        way_offsets.insert(r.to_way, None);
        via_ids.insert(r.via_node, None);
    }

    timer.start("resolve way ids");
    let path = parameter.file(WAY_ID_MAP);
    let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, false)
        .with_context(|| format!("opening {}", path))?;
    read_way_id_map(&mut scanner, |id, offset| {
        if let Some(entry) = way_offsets.get_mut(&id) {
            *entry = Some(offset);
        }
    })?;
    scanner.close()?;
    timer.stop("resolve way ids");

    timer.start("resolve via node ids");
    let path = parameter.file(COORDS_DAT);
    let mut scanner = FileScanner::open(&path, ScannerMode::Sequential, false)
        .with_context(|| format!("opening {}", path))?;
    read_coord_id_map(&mut scanner, |id, point| {
        if let Some(entry) = via_ids.get_mut(&id) {
            *entry = Some(point.id());
        }
    })?;
    scanner.close()?;
    timer.stop("resolve via node ids");

    let mut restrictions: ViaTurnRestrictions = HashMap::new();
    let mut dropped = 0;
    for r in raw {
        let from = way_offsets.get(&r.from_way).copied().flatten();
        let to = way_offsets.get(&r.to_way).copied().flatten();
        let via = via_ids.get(&r.via_node).copied().flatten();
        match (from, via, to) {
            (Some(from_way_offset), Some(via_id), Some(to_way_offset)) => {
                restrictions.entry(via_id).or_default().push(TurnRestrictionData {
                    kind: r.kind,
                    from_way_offset,
                    to_way_offset,
                });
            }
            _ => {
                warn!(
                    "Dropping turn restriction from way {} via node {} to way {}: unresolvable",
                    r.from_way, r.via_node, r.to_way
                );
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        info!("Dropped {} unresolvable turn restriction(s)", dropped);
    }

    Ok(restrictions)
}

/// Whether the turn from `from` to `to` over this junction is allowed. An
/// Allow restriction whitelists its target and forbids everything else from
/// the same source; a Forbid restriction blacklists only its target. Mixed
/// data keeps the last matching kind's default.
pub fn can_turn(restrictions: &[TurnRestrictionData], from: FileOffset, to: FileOffset) -> bool {
    if restrictions.is_empty() {
        return true;
    }

    let mut default_return = true;
    for restriction in restrictions {
        if restriction.from_way_offset != from {
            continue;
        }
        match restriction.kind {
            TurnRestrictionKind::Allow => {
                if restriction.to_way_offset == to {
                    return true;
                }
                default_return = false;
            }
            TurnRestrictionKind::Forbid => {
                if restriction.to_way_offset == to {
                    return false;
                }
                default_return = true;
            }
        }
    }

    default_return
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forbid(from: FileOffset, to: FileOffset) -> TurnRestrictionData {
        TurnRestrictionData {
            kind: TurnRestrictionKind::Forbid,
            from_way_offset: from,
            to_way_offset: to,
        }
    }

    fn allow(from: FileOffset, to: FileOffset) -> TurnRestrictionData {
        TurnRestrictionData {
            kind: TurnRestrictionKind::Allow,
            from_way_offset: from,
            to_way_offset: to,
        }
    }

    #[test]
    fn forbid_blacklists_only_its_target() {
        let rs = vec![forbid(1, 2)];
        assert!(!can_turn(&rs, 1, 2));
        assert!(can_turn(&rs, 1, 3));
        assert!(can_turn(&rs, 9, 2));
    }

    #[test]
    fn allow_whitelists_its_target() {
        let rs = vec![allow(1, 2)];
        assert!(can_turn(&rs, 1, 2));
        assert!(!can_turn(&rs, 1, 3));
        // Other sources are unaffected
        assert!(can_turn(&rs, 4, 3));
    }

    #[test]
    fn empty_allows_everything() {
        assert!(can_turn(&[], 1, 2));
    }
}

//! Rolling scan of the local file against the remote index

use super::ReconstructionPlan;
use crate::checksum::{strong_checksum, RollingChecksum, StrongChecksum};
use crate::index::FileSummary;

/// Build the reconstruction plan for the file described by `summary`,
/// reusing whatever blocks of `local` match.
///
/// Single pass with a `block_size` window. A window whose weak checksum
/// hits the index is strong-verified against every candidate of the same
/// length; a verified window satisfies each matching target block and the
/// scan jumps a whole block. Otherwise the window slides by one byte.
/// Unmatched local bytes are never copied: every target block is either a
/// verified local copy or a remote fetch.
pub fn build_plan(local: &[u8], summary: &FileSummary) -> ReconstructionPlan {
    let block_size = summary.block_size();
    let block_count = summary.block_count();
    let mut sources: Vec<Option<u64>> = vec![None; block_count];
    let mut matches_found = 0usize;

    tracing::debug!(
        local_size = local.len(),
        target_size = summary.file_size(),
        block_size,
        block_count,
        "Scanning local file"
    );

    if block_count > 0 && local.len() >= block_size {
        let mut pos = 0usize;
        let mut rolling = RollingChecksum::new(&local[..block_size]);

        loop {
            let window = &local[pos..pos + block_size];

            if match_window(window, rolling.value(), pos as u64, summary, &mut sources) {
                matches_found += 1;
                pos += block_size;

                if pos + block_size > local.len() {
                    break;
                }
                rolling = RollingChecksum::new(&local[pos..pos + block_size]);
                continue;
            }

            if pos + block_size < local.len() {
                rolling.roll(local[pos], local[pos + block_size]);
                pos += 1;
            } else {
                break;
            }
        }
    }

    if let Some(last) = block_count.checked_sub(1) {
        let tail_len = block_len(summary, last);
        if tail_len < block_size && sources[last].is_none() {
            sources[last] = find_tail(local, summary, last, tail_len);
        }
    }

    let mut plan = ReconstructionPlan::new(summary.file_size());
    for (block_index, source) in sources.into_iter().enumerate() {
        let length = block_len(summary, block_index) as u64;
        match source {
            Some(local_offset) => plan.add_copy(block_index, local_offset, length),
            None => plan.add_fetch(block_index, length),
        }
    }
    plan.literal_bytes = (local.len() - matches_found * block_size) as u64;

    tracing::debug!(
        matches = matches_found,
        copies = plan.copy_count(),
        fetches = plan.fetch_count(),
        bytes_reused = plan.bytes_reused,
        bytes_remote = plan.bytes_remote,
        literal_bytes = plan.literal_bytes,
        "Reconstruction plan ready"
    );

    plan
}

/// Strong-verify a window against its weak candidates; records the window
/// offset for every matching block not yet satisfied.
fn match_window(
    window: &[u8],
    weak: u32,
    offset: u64,
    summary: &FileSummary,
    sources: &mut [Option<u64>],
) -> bool {
    let candidates = summary.index().candidates_for(weak);
    if candidates.is_empty() {
        return false;
    }

    let mut digest: Option<StrongChecksum> = None;
    let mut matched = false;

    for &block_index in candidates {
        if block_len(summary, block_index) != window.len() {
            continue;
        }

        let digest = *digest.get_or_insert_with(|| strong_checksum(window));
        let verified = summary
            .index()
            .strong_checksum_of(block_index)
            .is_ok_and(|expected| *expected == digest);

        if verified {
            matched = true;
            if sources[block_index].is_none() {
                sources[block_index] = Some(offset);
            }
        }
    }

    matched
}

/// Search for a short final block with a window of its own length
fn find_tail(
    local: &[u8],
    summary: &FileSummary,
    block_index: usize,
    tail_len: usize,
) -> Option<u64> {
    if tail_len == 0 || local.len() < tail_len {
        return None;
    }

    let index = summary.index();
    let weak = index.weak_checksum_of(block_index).ok()?;
    let expected = *index.strong_checksum_of(block_index).ok()?;

    let mut rolling = RollingChecksum::new(&local[..tail_len]);
    let mut pos = 0usize;
    loop {
        if rolling.value() == weak && strong_checksum(&local[pos..pos + tail_len]) == expected {
            return Some(pos as u64);
        }
        if pos + tail_len >= local.len() {
            return None;
        }
        rolling.roll(local[pos], local[pos + tail_len]);
        pos += 1;
    }
}

fn block_len(summary: &FileSummary, block_index: usize) -> usize {
    let start = block_index as u64 * summary.block_size() as u64;
    let end = std::cmp::min(start + summary.block_size() as u64, summary.file_size());
    end.saturating_sub(start) as usize
}

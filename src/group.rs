//! Group assignment for records that arrive without a group.
//!
//! Ungrouped records are packed, in stored order, into `GROUP<n>` buckets of
//! at most `group_size` records. Packing resumes from the highest generated
//! group already in the store, so earlier assignments are never renumbered.

use crate::error::{EngineError, Result};
use crate::record::{generated_group, generated_group_number, ClientRecord};
use log::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct GroupAssigner {
    group_size: usize,
}

impl GroupAssigner {
    /// `group_size` is validated as non-zero by the configuration
    pub fn new(group_size: usize) -> Self {
        Self {
            group_size: group_size.max(1),
        }
    }

    /// Highest generated group number present and how many records it holds
    fn resume_point(records: &[ClientRecord]) -> (u32, usize) {
        let highest = records
            .iter()
            .filter_map(|record| record.group.as_deref().and_then(generated_group_number))
            .max();

        match highest {
            Some(n) => {
                let occupied = records
                    .iter()
                    .filter(|record| record.group.as_deref().and_then(generated_group_number) == Some(n))
                    .count();
                (n, occupied)
            }
            None => (1, 0),
        }
    }

    /// Fill missing groups, returning how many records were grouped
    pub fn assign(&self, records: &mut [ClientRecord]) -> Result<usize> {
        let (mut current, mut occupied) = Self::resume_point(records);
        debug!("Group packing resumes at {} with {} occupant(s)", generated_group(current), occupied);

        let mut assigned = 0;
        for record in records.iter_mut().filter(|record| record.group.is_none()) {
            if occupied >= self.group_size {
                current = current.checked_add(1).ok_or_else(|| {
                    EngineError::malformed(
                        record.row,
                        format!("no group number left after {}", generated_group(current)),
                    )
                })?;
                occupied = 0;
            }
            let group = generated_group(current);
            info!("Row {}: assigned to {}", record.row, group);
            record.group = Some(group);
            occupied += 1;
            assigned += 1;
        }

        Ok(assigned)
    }
}

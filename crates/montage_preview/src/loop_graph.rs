// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rewiring of live section links into preview playback topologies.
//!
//! Two topologies are supported:
//! - "normal": every disjoint chain of authored links is closed on itself
//!   (looping) or terminated (not looping), and the chain reaching the
//!   preferred section first becomes the anchor
//! - "all sections": every section plays in table order, regardless of the
//!   authored links

use crate::section::{SectionError, SectionTable};

/// A run of sections reached by following links from `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    /// First section of the chain
    pub start: usize,
    /// Sections in walk order, `start` first
    pub members: Vec<usize>,
}

impl Chain {
    /// Number of links followed from `start` to reach `index`
    pub fn distance_to(&self, index: usize) -> Option<usize> {
        self.members.iter().position(|&member| member == index)
    }

    /// Last section of the walk
    pub fn last(&self) -> usize {
        self.members.last().copied().unwrap_or(self.start)
    }
}

/// Split sections into disjoint chains.
///
/// Repeatedly starts at the lowest index not visited yet and follows `links`
/// until a link is missing or points at an already visited section, so every
/// section belongs to exactly one chain and each walk is bounded by the table
/// size. Links pointing outside `links` count as missing.
pub fn partition_chains(links: &[Option<usize>]) -> Vec<Chain> {
    let mut used = vec![false; links.len()];
    let mut chains = Vec::new();

    while let Some(start) = used.iter().position(|&visited| !visited) {
        let mut members = Vec::new();
        let mut current = Some(start);
        while let Some(index) = current {
            if index >= links.len() || used[index] {
                break;
            }
            used[index] = true;
            members.push(index);
            current = links[index];
        }
        chains.push(Chain { start, members });
    }

    chains
}

/// Builds preview loop graphs over a [`SectionTable`]
pub struct LoopGraphBuilder;

impl LoopGraphBuilder {
    /// Rewire the table for single-section preview.
    ///
    /// Live links are first reset to the authored ones. Each disjoint chain is
    /// then closed: when `looping`, its last section links back to its start;
    /// otherwise a link from its last section back into the same chain is
    /// cleared. Returns the start of the chain that reaches `preferred` in the
    /// fewest steps, earlier chains winning ties.
    pub fn build_normal_loop(
        table: &mut SectionTable,
        preferred: usize,
        looping: bool,
    ) -> Result<usize, SectionError> {
        if table.is_empty() {
            return Ok(preferred);
        }
        if preferred >= table.len() {
            return Err(SectionError::InvalidSection(preferred));
        }

        table.reset_to_authored();
        let chains = partition_chains(&table.links());

        let mut best_distance = usize::MAX;
        let mut anchor_chain = None;
        for (chain_index, chain) in chains.iter().enumerate() {
            if let Some(distance) = chain.distance_to(preferred) {
                if distance < best_distance {
                    best_distance = distance;
                    anchor_chain = Some(chain_index);
                }
            }
        }

        for chain in &chains {
            Self::close_chain(table, chain, looping)?;
        }

        let resolved = match anchor_chain {
            Some(chain_index) => {
                let chain = &chains[chain_index];
                Self::close_chain(table, chain, looping)?;
                chain.start
            }
            None => preferred,
        };

        tracing::debug!(
            "Built normal loop: preferred {preferred}, anchor {resolved}, looping {looping}, {} chains",
            chains.len()
        );
        Ok(resolved)
    }

    /// Chain every section to the following one in table order.
    ///
    /// The last section links back to the first when `looping`, otherwise it
    /// ends playback. Authored links are ignored.
    pub fn build_all_sections_loop(table: &mut SectionTable, looping: bool) -> Result<(), SectionError> {
        let len = table.len();
        for index in 0..len {
            let next = if index + 1 < len {
                Some(index + 1)
            } else if looping {
                Some(0)
            } else {
                None
            };
            table.set_next_index(index, next)?;
        }

        tracing::debug!("Built all-sections loop over {len} sections, looping {looping}");
        Ok(())
    }

    fn close_chain(table: &mut SectionTable, chain: &Chain, looping: bool) -> Result<(), SectionError> {
        let last = chain.last();
        let tail = table.next_index(last);

        if looping {
            if tail != Some(chain.start) {
                table.set_next_index(last, Some(chain.start))?;
            }
        } else if tail.is_some_and(|target| chain.members.contains(&target)) {
            table.set_next_index(last, None)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::Section;

    fn table_with_links(links: &[Option<usize>]) -> SectionTable {
        let names: Vec<String> = (0..links.len()).map(|i| format!("S{i}")).collect();
        let sections = links.iter().enumerate().map(|(i, link)| {
            let section = Section::new(names[i].as_str(), i as f32, 1.0);
            match link {
                Some(next) => section.with_next(names[*next].as_str()),
                None => section,
            }
        });
        SectionTable::from_sections(sections).unwrap()
    }

    /// Every assignment of next pointers over `len` sections
    fn all_link_sets(len: usize) -> Vec<Vec<Option<usize>>> {
        let mut result = vec![Vec::new()];
        for _ in 0..len {
            let mut extended = Vec::new();
            for prefix in &result {
                for choice in std::iter::once(None).chain((0..len).map(Some)) {
                    let mut links = prefix.clone();
                    links.push(choice);
                    extended.push(links);
                }
            }
            result = extended;
        }
        result
    }

    fn lies_on_cycle(links: &[Option<usize>], index: usize) -> bool {
        let mut current = links[index];
        for _ in 0..links.len() {
            match current {
                Some(next) if next == index => return true,
                Some(next) => current = links[next],
                None => return false,
            }
        }
        false
    }

    fn terminates(links: &[Option<usize>], index: usize) -> bool {
        let mut current = Some(index);
        for _ in 0..=links.len() {
            match current {
                Some(next) => current = links[next],
                None => return true,
            }
        }
        false
    }

    #[test]
    fn test_partition_chains() {
        // A->B, C->D->C, E->B
        let chains = partition_chains(&[Some(1), None, Some(3), Some(2), Some(1)]);
        assert_eq!(
            chains,
            vec![
                Chain { start: 0, members: vec![0, 1] },
                Chain { start: 2, members: vec![2, 3] },
                Chain { start: 4, members: vec![4] },
            ]
        );
    }

    #[test]
    fn test_single_cycle_looping_unchanged() {
        // A->B->C->A
        let mut table = table_with_links(&[Some(1), Some(2), Some(0)]);
        let anchor = LoopGraphBuilder::build_normal_loop(&mut table, 1, true).unwrap();
        // B is reached from the chain starting at A
        assert_eq!(anchor, 0);
        assert_eq!(table.links(), vec![Some(1), Some(2), Some(0)]);
    }

    #[test]
    fn test_single_cycle_broken_when_not_looping() {
        let mut table = table_with_links(&[Some(1), Some(2), Some(0)]);
        LoopGraphBuilder::build_normal_loop(&mut table, 1, false).unwrap();
        // Only the back edge is cut, the chain start keeps its authored link
        assert_eq!(table.links(), vec![Some(1), Some(2), None]);
    }

    #[test]
    fn test_disjoint_chains() {
        // A->B, C->D->C
        let mut table = table_with_links(&[Some(1), None, Some(3), Some(2)]);
        let anchor = LoopGraphBuilder::build_normal_loop(&mut table, 0, true).unwrap();
        assert_eq!(anchor, 0);
        assert_eq!(table.links(), vec![Some(1), Some(0), Some(3), Some(2)]);
    }

    #[test]
    fn test_rebuild_starts_from_authored() {
        let mut table = table_with_links(&[Some(1), None, None]);
        LoopGraphBuilder::build_normal_loop(&mut table, 0, true).unwrap();
        assert_eq!(table.links(), vec![Some(1), Some(0), Some(2)]);

        LoopGraphBuilder::build_normal_loop(&mut table, 0, false).unwrap();
        assert_eq!(table.links(), vec![Some(1), None, None]);
    }

    #[test]
    fn test_empty_and_invalid() {
        let mut empty = SectionTable::new();
        assert_eq!(LoopGraphBuilder::build_normal_loop(&mut empty, 3, true), Ok(3));

        let mut table = table_with_links(&[None, None]);
        assert_eq!(
            LoopGraphBuilder::build_normal_loop(&mut table, 2, true),
            Err(SectionError::InvalidSection(2))
        );
        assert_eq!(table.links(), vec![None, None]);
    }

    #[test]
    fn test_all_sections_loop() {
        let mut table = table_with_links(&[Some(2), Some(1), None]);
        LoopGraphBuilder::build_all_sections_loop(&mut table, true).unwrap();
        assert_eq!(table.links(), vec![Some(1), Some(2), Some(0)]);

        LoopGraphBuilder::build_all_sections_loop(&mut table, false).unwrap();
        assert_eq!(table.links(), vec![Some(1), Some(2), None]);
    }

    #[test]
    fn test_every_section_loops_after_looping_build() {
        for len in 1..=4 {
            for links in all_link_sets(len) {
                for preferred in 0..len {
                    let mut table = table_with_links(&links);
                    LoopGraphBuilder::build_normal_loop(&mut table, preferred, true).unwrap();
                    let rewired = table.links();
                    for index in 0..len {
                        assert!(
                            lies_on_cycle(&rewired, index),
                            "{links:?} -> {rewired:?}: section {index} not on a cycle"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_every_section_terminates_after_non_looping_build() {
        for len in 1..=4 {
            for links in all_link_sets(len) {
                let mut table = table_with_links(&links);
                LoopGraphBuilder::build_normal_loop(&mut table, 0, false).unwrap();
                let rewired = table.links();
                for index in 0..len {
                    assert!(terminates(&rewired, index), "{links:?} -> {rewired:?}");
                }
            }
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        for len in 1..=4 {
            for links in all_link_sets(len) {
                for looping in [true, false] {
                    let mut table = table_with_links(&links);
                    LoopGraphBuilder::build_normal_loop(&mut table, 0, looping).unwrap();
                    let first = table.links();

                    // Feed the result back in as the authored linkage
                    let mut settled = table_with_links(&first);
                    LoopGraphBuilder::build_normal_loop(&mut settled, 0, looping).unwrap();
                    assert_eq!(settled.links(), first, "{links:?} looping {looping}");
                }
            }
        }
    }
}

use std::collections::HashMap;

/// One logical processor as reported by topology discovery. The dense index
/// used everywhere else is the processor's position in the discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalProcessor {
    pub numa_node: u32,
    pub ordinal_in_node: u32,
}

/// Immutable processor-topology table built once at startup. Maps counter
/// instance names ("7", or "0,2" on NUMA systems) to dense indices.
#[derive(Debug, Clone)]
pub struct Topology {
    processors: Vec<LogicalProcessor>,
    node_index: HashMap<(u32, u32), usize>,
}

impl Topology {
    pub fn new(processors: Vec<LogicalProcessor>) -> Self {
        let node_index = processors
            .iter()
            .enumerate()
            .map(|(index, p)| ((p.numa_node, p.ordinal_in_node), index))
            .collect();
        Self {
            processors,
            node_index,
        }
    }

    /// Single-node topology with `ncpu` processors, for hosts where NUMA
    /// discovery is unavailable.
    pub fn flat(ncpu: usize) -> Self {
        Self::new(
            (0..ncpu)
                .map(|i| LogicalProcessor {
                    numa_node: 0,
                    ordinal_in_node: i as u32,
                })
                .collect(),
        )
    }

    /// Discover the host topology. Falls back to a flat table sized by the
    /// reported CPU count when NUMA information cannot be obtained.
    pub fn detect() -> Self {
        #[cfg(target_os = "windows")]
        {
            match crate::platform::windows::numa_topology() {
                Ok(topology) if !topology.is_empty() => return topology,
                Ok(_) => {}
                Err(err) => log::warn!("NUMA topology discovery failed: {}", err),
            }
        }

        Self::flat(cpu_count())
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn processors(&self) -> &[LogicalProcessor] {
        &self.processors
    }

    /// Resolve a counter instance name to a dense index.
    ///
    /// `"<node>,<ordinal>"` pairs go through the discovery table; plain names
    /// are the index itself. Unregistered pairs and unparsable names resolve
    /// to 0, a degraded fallback for transient disagreement between the
    /// counter source and topology discovery, not an error. Indices `>= ncpu`
    /// are the caller's job to discard.
    pub fn resolve(&self, instance: &str) -> usize {
        match instance.split_once(',') {
            Some((node, ordinal)) => {
                let pair = node
                    .parse::<u32>()
                    .ok()
                    .zip(ordinal.parse::<u32>().ok());
                match pair.and_then(|pair| self.node_index.get(&pair)) {
                    Some(&index) => index,
                    None => {
                        log::warn!("Unregistered processor instance {:?}", instance);
                        0
                    }
                }
            }
            None => instance.parse().unwrap_or(0),
        }
    }
}

fn cpu_count() -> usize {
    use sysinfo::{CpuRefreshKind, RefreshKind, SystemExt};

    let system = sysinfo::System::new_with_specifics(
        RefreshKind::new().with_cpu(CpuRefreshKind::new()),
    );
    system.cpus().len().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numa_topology() -> Topology {
        // Two nodes of four, so node 1 ordinals land at dense indices 4..8.
        let mut processors = vec![];
        for node in 0..2 {
            for ordinal in 0..4 {
                processors.push(LogicalProcessor {
                    numa_node: node,
                    ordinal_in_node: ordinal,
                });
            }
        }
        Topology::new(processors)
    }

    #[test]
    fn plain_index_resolves_to_itself() {
        let topology = Topology::flat(8);
        assert_eq!(topology.resolve("0"), 0);
        assert_eq!(topology.resolve("7"), 7);
        // Out of range is returned as-is; the accumulator discards it.
        assert_eq!(topology.resolve("12"), 12);
    }

    #[test]
    fn node_ordinal_pair_resolves_through_table() {
        let topology = numa_topology();
        assert_eq!(topology.resolve("0,2"), 2);
        assert_eq!(topology.resolve("1,0"), 4);
        assert_eq!(topology.resolve("1,3"), 7);
    }

    #[test]
    fn unregistered_pair_falls_back_to_zero() {
        let topology = numa_topology();
        assert_eq!(topology.resolve("3,9"), 0);
    }

    #[test]
    fn unparsable_names_fall_back_to_zero() {
        let topology = numa_topology();
        assert_eq!(topology.resolve("_Total"), 0);
        assert_eq!(topology.resolve("0,_Total"), 0);
        assert_eq!(topology.resolve(""), 0);
    }

    #[test]
    fn flat_detect_has_at_least_one_cpu() {
        assert!(!Topology::detect().is_empty());
    }
}

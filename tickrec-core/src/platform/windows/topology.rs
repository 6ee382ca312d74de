use crate::topology::{LogicalProcessor, Topology};
use crate::Error;
use std::mem;
use windows::Win32::System::SystemInformation;

/// Enumerate logical processors grouped by NUMA node.
///
/// Nodes come back in buffer order; within a node, processors are numbered by
/// ascending affinity-mask bit. The dense index every other component uses is
/// the position in the returned list.
pub fn numa_topology() -> Result<Topology, Error> {
    unsafe {
        let mut length = 0u32;
        let r = SystemInformation::GetLogicalProcessorInformationEx(
            SystemInformation::RelationNumaNode,
            None,
            &mut length,
        );
        if r.as_bool() || length == 0 {
            // The size probe is supposed to fail with an insufficient-buffer
            // error; anything else means the relation is unsupported.
            return Err(Error::WinError(windows::core::Error::from_win32()));
        }

        // u64 backing keeps the record casts aligned.
        let mut buffer = vec![0u64; (length as usize + 7) / 8];
        let r = SystemInformation::GetLogicalProcessorInformationEx(
            SystemInformation::RelationNumaNode,
            Some(buffer.as_mut_ptr() as *mut _),
            &mut length,
        );
        if !r.as_bool() {
            return Err(Error::WinError(windows::core::Error::from_win32()));
        }

        let base = buffer.as_ptr() as *const u8;
        let mut processors = vec![];
        let mut offset = 0usize;
        // Records are variable length; only the Relationship+Size header is
        // guaranteed, the Size field covers the rest of each record.
        let header = 2 * mem::size_of::<u32>();

        while offset + header <= length as usize {
            let info = &*(base.add(offset)
                as *const SystemInformation::SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX);
            if info.Size == 0 {
                break;
            }

            if info.Relationship == SystemInformation::RelationNumaNode {
                let node = &info.Anonymous.NumaNode;
                let mut mask = node.GroupMask.Mask;
                let mut ordinal = 0u32;
                while mask != 0 {
                    mask &= mask - 1;
                    processors.push(LogicalProcessor {
                        numa_node: node.NodeNumber,
                        ordinal_in_node: ordinal,
                    });
                    ordinal += 1;
                }
            }

            offset += info.Size as usize;
        }

        Ok(Topology::new(processors))
    }
}

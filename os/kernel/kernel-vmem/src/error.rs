use kernel_alloc::FrameAllocError;
use kernel_memory_addresses::VirtualAddress;

/// Address-space operation failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("out of memory")]
    OutOfMemory,
    #[error("unsupported address-space layout")]
    UnsupportedLayout,
    #[error("stack requested before its frames were prepared")]
    StackNotPrepared,
}

impl From<FrameAllocError> for VmError {
    fn from(_: FrameAllocError) -> Self {
        Self::OutOfMemory
    }
}

/// Why a fault cannot be serviced at all.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FatalReason {
    /// No process, or a process without an address space (early kernel fault).
    NoAddressSpace,
    /// The address lies outside every region and the stack.
    Unmapped(VirtualAddress),
    /// The address is inside a region whose frames were never prepared.
    NotPrepared(VirtualAddress),
}

/// Outcome of a TLB fault that could not be resolved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FaultError {
    /// Write to a read-only page; delivered to the user program.
    #[error("write to a read-only page")]
    PermissionFault,
    /// Unknown fault kind code.
    #[error("invalid fault kind {0}")]
    BadRequest(u32),
    /// The faulting context must be halted.
    #[error("unrecoverable fault: {0:?}")]
    FatalFault(FatalReason),
}

//! Reconstruction plans and the engine that executes them

pub mod engine;
pub mod scan;

pub use engine::PatchEngine;
pub use scan::build_plan;

/// How one target block is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Copy `length` bytes of the local file starting at `local_offset`
    CopyLocal {
        /// Target block this copy produces
        block_index: usize,
        /// Offset in the local file
        local_offset: u64,
        /// Number of bytes to copy
        length: u64,
    },

    /// Fetch the block from the remote and verify it
    FetchRemote {
        /// Target block to fetch
        block_index: usize,
        /// Block length in bytes
        length: u64,
    },
}

impl Instruction {
    /// Target block produced by this instruction
    pub fn block_index(&self) -> usize {
        match self {
            Instruction::CopyLocal { block_index, .. } => *block_index,
            Instruction::FetchRemote { block_index, .. } => *block_index,
        }
    }

    /// Get the length of this instruction in bytes
    pub fn length(&self) -> u64 {
        match self {
            Instruction::CopyLocal { length, .. } => *length,
            Instruction::FetchRemote { length, .. } => *length,
        }
    }

    /// Check if this is a local copy
    pub fn is_copy(&self) -> bool {
        matches!(self, Instruction::CopyLocal { .. })
    }

    /// Check if this is a remote fetch
    pub fn is_fetch(&self) -> bool {
        matches!(self, Instruction::FetchRemote { .. })
    }
}

/// One instruction per target block, in block order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconstructionPlan {
    /// Target file size after executing the plan
    pub target_size: u64,

    /// Instructions in target block order
    pub instructions: Vec<Instruction>,

    /// Bytes that can be copied from the local file
    pub bytes_reused: u64,

    /// Bytes that must be fetched
    pub bytes_remote: u64,

    /// Local bytes that matched nothing during the scan
    pub literal_bytes: u64,
}

impl ReconstructionPlan {
    /// Create a new empty plan
    pub fn new(target_size: u64) -> Self {
        Self {
            target_size,
            ..Default::default()
        }
    }

    /// Append a local copy for the next target block
    pub fn add_copy(&mut self, block_index: usize, local_offset: u64, length: u64) {
        self.instructions.push(Instruction::CopyLocal {
            block_index,
            local_offset,
            length,
        });
        self.bytes_reused += length;
    }

    /// Append a remote fetch for the next target block
    pub fn add_fetch(&mut self, block_index: usize, length: u64) {
        self.instructions
            .push(Instruction::FetchRemote { block_index, length });
        self.bytes_remote += length;
    }

    /// Target blocks that must be fetched, in block order
    pub fn fetch_indices(&self) -> Vec<usize> {
        self.instructions
            .iter()
            .filter(|op| op.is_fetch())
            .map(Instruction::block_index)
            .collect()
    }

    /// Number of local copies
    pub fn copy_count(&self) -> usize {
        self.instructions.iter().filter(|op| op.is_copy()).count()
    }

    /// Number of remote fetches
    pub fn fetch_count(&self) -> usize {
        self.instructions.iter().filter(|op| op.is_fetch()).count()
    }

    /// Calculate savings percentage
    pub fn savings_percent(&self) -> f64 {
        if self.target_size == 0 {
            0.0
        } else {
            (self.bytes_reused as f64 / self.target_size as f64) * 100.0
        }
    }
}

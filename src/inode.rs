// src/inode.rs
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::FsError;
use crate::layout::{get_u32, get_u64, put_u32, put_u64, BlockId, BLOCK_REF_SIZE, INODE_HEADER_SIZE, NO_REF};

bitflags! {
    /// Attribute byte of an inode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u8 {
        const HIDDEN = 0x1;
        const READONLY = 0x2;
    }
}

/// One of the `attrib` tokens: `+h`, `-h`, `+r`, `-r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttribOp {
    SetHidden,
    ClearHidden,
    SetReadOnly,
    ClearReadOnly,
}

impl AttribOp {
    pub fn apply(self, attrs: &mut Attributes) {
        match self {
            AttribOp::SetHidden => attrs.insert(Attributes::HIDDEN),
            AttribOp::ClearHidden => attrs.remove(Attributes::HIDDEN),
            AttribOp::SetReadOnly => attrs.insert(Attributes::READONLY),
            AttribOp::ClearReadOnly => attrs.remove(Attributes::READONLY),
        }
    }
}

impl FromStr for AttribOp {
    type Err = FsError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "+h" => Ok(AttribOp::SetHidden),
            "-h" => Ok(AttribOp::ClearHidden),
            "+r" => Ok(AttribOp::SetReadOnly),
            "-r" => Ok(AttribOp::ClearReadOnly),
            other => Err(FsError::InvalidArgument(format!(
                "unknown attribute {other:?} (expected +h, -h, +r or -r)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    /// Data blocks in file order. Populated entries always form a prefix.
    pub block_refs: Vec<Option<BlockId>>,
    pub in_use: bool,
    pub attributes: Attributes,
    pub size: u64,
}

impl Inode {
    pub fn empty(blocks_per_file: u32) -> Self {
        Self {
            block_refs: vec![None; blocks_per_file as usize],
            in_use: false,
            attributes: Attributes::empty(),
            size: 0,
        }
    }

    /// First unused position in `block_refs`.
    pub fn find_free_slot(&self) -> Option<usize> {
        self.block_refs.iter().position(Option::is_none)
    }

    /// Populated block references, in file order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.block_refs.iter().map_while(|r| *r)
    }

    pub fn clear(&mut self) {
        self.block_refs.iter_mut().for_each(|r| *r = None);
        self.in_use = false;
        self.attributes = Attributes::empty();
        self.size = 0;
    }

    pub fn encode_into(&self, out: &mut [u8]) {
        out[0] = self.in_use as u8;
        out[1] = self.attributes.bits();
        out[2..8].fill(0);
        put_u64(out, 8, self.size);
        for (i, r) in self.block_refs.iter().enumerate() {
            let off = INODE_HEADER_SIZE + i * BLOCK_REF_SIZE;
            put_u32(out, off, r.unwrap_or(NO_REF));
        }
    }

    pub fn decode(raw: &[u8], blocks_per_file: u32) -> Self {
        let block_refs = (0..blocks_per_file as usize)
            .map(|i| {
                let v = get_u32(raw, INODE_HEADER_SIZE + i * BLOCK_REF_SIZE);
                (v != NO_REF).then_some(v)
            })
            .collect();
        Self {
            block_refs,
            in_use: raw[0] != 0,
            attributes: Attributes::from_bits_truncate(raw[1]),
            size: get_u64(raw, 8),
        }
    }
}

use std::ops::{Index, IndexMut};

use crate::mmu::RAM_SIZE;

/// Main memory: the full 64K, of which the bus exposes everything outside
/// the $C000-$CFFF peripheral area.
pub struct RAM {
    data: Vec<u8>,
}

impl RAM {
    pub fn new() -> Self {
        Self {
            data: vec![0; RAM_SIZE],
        }
    }
}

impl Default for RAM {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<u16> for RAM {
    type Output = u8;

    fn index(&self, index: u16) -> &Self::Output {
        self.data.index(index as usize)
    }
}

impl IndexMut<u16> for RAM {
    fn index_mut(&mut self, index: u16) -> &mut Self::Output {
        self.data.index_mut(index as usize)
    }
}

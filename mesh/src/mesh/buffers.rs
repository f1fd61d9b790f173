//! Keyed and ordered storage of a mesh's vertex buffers.

use std::collections::HashMap;

use super::MeshError;
use crate::buffer::{SharedBuffer, VertexBufferType};
use crate::cloner::{CloneResolve, Cloner};

/// The vertex buffers of a mesh.
///
/// Buffers are reachable both by type and in attachment order. The two views
/// always hold the same buffer instances. `Clone` copies the containers but
/// aliases every buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferSet {
    map: HashMap<VertexBufferType, SharedBuffer>,
    list: Vec<SharedBuffer>,
}

impl BufferSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, buffer_type: VertexBufferType) -> Option<&SharedBuffer> {
        self.map.get(&buffer_type)
    }

    pub fn contains(&self, buffer_type: VertexBufferType) -> bool {
        self.map.contains_key(&buffer_type)
    }

    /// Attach a buffer. Fails if a buffer of the same type is attached.
    pub fn insert(&mut self, buffer: SharedBuffer) -> Result<(), MeshError> {
        let buffer_type = buffer.buffer_type();
        if self.map.contains_key(&buffer_type) {
            return Err(MeshError::BufferTypeAlreadySet(buffer_type));
        }
        self.map.insert(buffer_type, buffer.clone());
        self.list.push(buffer);
        Ok(())
    }

    /// Attach a buffer, replacing any buffer of the same type in place.
    ///
    /// Returns the replaced buffer.
    pub fn replace(&mut self, buffer: SharedBuffer) -> Option<SharedBuffer> {
        let buffer_type = buffer.buffer_type();
        let previous = self.map.insert(buffer_type, buffer.clone());
        match self.position(buffer_type) {
            Some(index) => self.list[index] = buffer,
            None => self.list.push(buffer),
        }
        previous
    }

    /// Detach the buffer of the given type.
    pub fn remove(&mut self, buffer_type: VertexBufferType) -> Option<SharedBuffer> {
        let removed = self.map.remove(&buffer_type)?;
        self.list.retain(|b| !SharedBuffer::ptr_eq(b, &removed));
        Some(removed)
    }

    /// Buffers in attachment order.
    pub fn iter(&self) -> std::slice::Iter<'_, SharedBuffer> {
        self.list.iter()
    }

    /// Buffers in attachment order.
    pub fn as_slice(&self) -> &[SharedBuffer] {
        &self.list
    }

    /// Buffer types in attachment order.
    pub fn types(&self) -> impl Iterator<Item = VertexBufferType> + '_ {
        self.list.iter().map(SharedBuffer::buffer_type)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    fn position(&self, buffer_type: VertexBufferType) -> Option<usize> {
        self.list.iter().position(|b| b.buffer_type() == buffer_type)
    }

    /// Detach every buffer matching `predicate`, returning each with its
    /// list position before detaching. Positions are ascending.
    pub(super) fn take_where(
        &mut self,
        mut predicate: impl FnMut(VertexBufferType) -> bool,
    ) -> Vec<(usize, SharedBuffer)> {
        let mut taken = Vec::new();
        let mut index = 0;
        self.list.retain(|buffer| {
            let buffer_type = buffer.buffer_type();
            let take = predicate(buffer_type);
            if take {
                taken.push((index, buffer.clone()));
            }
            index += 1;
            !take
        });
        for (_, buffer) in &taken {
            self.map.remove(&buffer.buffer_type());
        }
        taken
    }

    /// Re-attach buffers taken by [`take_where`](Self::take_where) at their
    /// original positions.
    pub(super) fn restore(&mut self, taken: Vec<(usize, SharedBuffer)>) {
        for (index, buffer) in taken {
            self.map.insert(buffer.buffer_type(), buffer.clone());
            let index = index.min(self.list.len());
            self.list.insert(index, buffer);
        }
    }
}

impl CloneResolve for BufferSet {
    fn resolve_clone(&self, cloner: &mut Cloner) -> Self {
        // The cloner dedups by identity, so the map and list resolve to the
        // same new instances.
        let list = cloner.resolve(&self.list);
        let map = cloner.resolve(&self.map);
        Self { map, list }
    }
}

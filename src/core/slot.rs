//! Memory slots that bind streams to content owned by a module.
//!
//! A [`SlotArray`] is a fixed-capacity arena allocated once by the module. A
//! [`Slot`] is a handle to one cell of such an arena. Since the arena never
//! grows, a handle can never alias a reallocated buffer.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Fixed-capacity arena of content cells.
pub struct SlotArray<T> {
    cells: Rc<[RefCell<T>]>,
}

/// Handle to one cell of a [`SlotArray`].
pub struct Slot<T> {
    cells: Rc<[RefCell<T>]>,
    index: usize,
}

impl<T> SlotArray<T> {
    /// Allocate `capacity` cells, each initialized by `init`.
    pub fn new(capacity: usize, mut init: impl FnMut() -> T) -> Self {
        let cells: Vec<RefCell<T>> = (0..capacity).map(|_| RefCell::new(init())).collect();
        Self {
            cells: cells.into(),
        }
    }

    /// Allocate `capacity` cells holding clones of `value`.
    pub fn filled(capacity: usize, value: T) -> Self
    where
        T: Clone,
    {
        Self::new(capacity, || value.clone())
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the arena has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Handle to the cell at `index`.
    pub fn slot(&self, index: usize) -> Option<Slot<T>> {
        (index < self.cells.len()).then(|| Slot {
            cells: Rc::clone(&self.cells),
            index,
        })
    }

    /// Borrow the content of the cell at `index`.
    ///
    /// # Panics
    /// If `index` is out of bounds or the cell is mutably borrowed.
    pub fn get(&self, index: usize) -> Ref<'_, T> {
        self.cells[index].borrow()
    }

    /// Mutably borrow the content of the cell at `index`.
    ///
    /// # Panics
    /// If `index` is out of bounds or the cell is already borrowed.
    pub fn get_mut(&self, index: usize) -> RefMut<'_, T> {
        self.cells[index].borrow_mut()
    }
}

impl<T> Slot<T> {
    /// Allocate a single-cell arena holding `value`.
    pub fn new(value: T) -> Self {
        let cells: Vec<RefCell<T>> = vec![RefCell::new(value)];
        Self {
            cells: cells.into(),
            index: 0,
        }
    }

    /// Index of the cell inside its arena.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Borrow the content.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.cells[self.index].borrow()
    }

    /// Mutably borrow the content.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.cells[self.index].borrow_mut()
    }

    /// Replace the content, returning the previous value.
    pub fn replace(&self, value: T) -> T {
        self.cells[self.index].replace(value)
    }

    /// Whether both handles point at the same cell.
    pub fn same_cell(&self, other: &Slot<T>) -> bool {
        Rc::ptr_eq(&self.cells, &other.cells) && self.index == other.index
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            cells: Rc::clone(&self.cells),
            index: self.index,
        }
    }
}

impl<T> Clone for SlotArray<T> {
    fn clone(&self) -> Self {
        Self {
            cells: Rc::clone(&self.cells),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("index", &self.index)
            .field("content", &self.cells[self.index])
            .finish()
    }
}

impl<T: fmt::Debug> fmt::Debug for SlotArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.cells.iter()).finish()
    }
}

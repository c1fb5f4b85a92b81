use crate::storage::{GridPoint, GridStorage, IndexType, LevelType};

///
/// Cursor moves along one dimension. Every move re-resolves the sequence
/// number of the new position and returns whether that point is stored.
///
pub trait GridIteratorT
{
    fn point(&self) -> &GridPoint;
    fn seq(&self) -> Option<usize>;
    fn reset_to_level_zero(&mut self) -> bool;
    fn reset_to_left_level_zero(&mut self, dim: usize) -> bool;
    fn reset_to_right_level_zero(&mut self, dim: usize) -> bool;
    fn reset_to_level_one(&mut self, dim: usize) -> bool;
    fn left_child(&mut self, dim: usize) -> bool;
    fn right_child(&mut self, dim: usize) -> bool;
    fn up(&mut self, dim: usize) -> bool;
    fn step_left(&mut self, dim: usize) -> bool;
    fn step_right(&mut self, dim: usize) -> bool;
    ///
    /// Prune hint for recursive descents. True means the point has no child in
    /// any dimension, so none in the swept one either. False does not promise
    /// a child in a given dimension; descents must still check the moves.
    ///
    fn hint(&self) -> bool;
}

pub struct GridIterator<'a>
{
    storage: &'a GridStorage,
    index: GridPoint,
    seq: Option<usize>,
}

impl<'a> GridIterator<'a>
{
    ///
    /// Creates a cursor positioned on the first stored point, or on the
    /// level one root of an empty storage.
    ///
    pub fn new(storage: &'a GridStorage) -> Self
    {
        let point = match storage.get(0)
        {
            Some(p) => GridPoint::from(p),
            None => GridPoint::level_one(storage.dim()),
        };
        let seq = storage.find(&point);
        Self { storage, index: point, seq }
    }

    pub fn storage(&self) -> &'a GridStorage
    {
        self.storage
    }

    pub fn set_point(&mut self, point: GridPoint)
    {
        self.index = point;
        self.seq = self.storage.find(&self.index);
    }

    #[inline]
    pub fn get(&self, dim: usize) -> (LevelType, IndexType)
    {
        self.index.get(dim)
    }

    ///
    /// Sequence number of the current position.
    ///
    /// # Panics
    /// If the current position is not stored. Operators only call this where
    /// the grid structure guarantees the point exists.
    ///
    #[inline]
    pub fn expect_seq(&self) -> usize
    {
        match self.seq
        {
            Some(seq) => seq,
            None => panic!("grid point {} is not part of the storage", self.index),
        }
    }

    ///
    /// True if the current point has no child in direction `dim`.
    ///
    pub fn is_leaf_in(&self, dim: usize) -> bool
    {
        !self.storage.has_child_in(&self.index, dim)
    }

    pub fn is_inner_point(&self) -> bool
    {
        self.index.is_inner_point()
    }

    #[inline]
    fn resolve(&mut self) -> bool
    {
        self.seq = self.storage.find(&self.index);
        self.seq.is_some()
    }

    #[inline]
    fn move_to(&mut self, dim: usize, level: LevelType, index: IndexType) -> bool
    {
        self.index.set(dim, level, index);
        self.resolve()
    }
}

impl GridIteratorT for GridIterator<'_>
{
    #[inline(always)]
    fn point(&self) -> &GridPoint
    {
        &self.index
    }

    #[inline(always)]
    fn seq(&self) -> Option<usize>
    {
        self.seq
    }

    fn reset_to_level_zero(&mut self) -> bool
    {
        self.index.level.fill(0);
        self.index.index.fill(0);
        self.index.flags.set_is_inner(false);
        self.resolve()
    }

    fn reset_to_left_level_zero(&mut self, dim: usize) -> bool
    {
        self.move_to(dim, 0, 0)
    }

    fn reset_to_right_level_zero(&mut self, dim: usize) -> bool
    {
        self.move_to(dim, 0, 1)
    }

    fn reset_to_level_one(&mut self, dim: usize) -> bool
    {
        self.move_to(dim, 1, 1)
    }

    ///
    /// Level zero points have no left child; the cursor stays in place and
    /// reports an absent point.
    ///
    fn left_child(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.index.get(dim);
        if l == 0
        {
            self.seq = None;
            return false;
        }
        self.move_to(dim, l + 1, 2 * i - 1)
    }

    ///
    /// The single child of either level zero point is (1, 1).
    ///
    fn right_child(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.index.get(dim);
        if l == 0
        {
            return self.move_to(dim, 1, 1);
        }
        self.move_to(dim, l + 1, 2 * i + 1)
    }

    ///
    /// Moves to the parent. Level one moves to the left level zero point, level
    /// zero has no parent and leaves the cursor in place.
    ///
    fn up(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.index.get(dim);
        match l
        {
            0 =>
            {
                self.seq = None;
                false
            },
            1 => self.move_to(dim, 0, 0),
            _ => self.move_to(dim, l - 1, (i >> 1) | 1),
        }
    }

    fn step_left(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.index.get(dim);
        if i < 2
        {
            self.seq = None;
            return false;
        }
        self.move_to(dim, l, i - 2)
    }

    fn step_right(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.index.get(dim);
        self.move_to(dim, l, i + 2)
    }

    ///
    /// Stored leaf flag of the current point, true when the point is absent.
    /// The flag covers all dimensions; [`GridIterator::is_leaf_in`] answers
    /// for a single one.
    ///
    fn hint(&self) -> bool
    {
        match self.seq
        {
            Some(seq) => self.storage.is_leaf(seq),
            None => true,
        }
    }
}

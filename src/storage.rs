pub mod bounding_box;
pub mod stretching;
pub mod text_format;

use std::fmt::Display;
use std::hash::{Hash, Hasher};

use bitfield_struct::bitfield;
use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::errors::SGError;
use crate::serialization::{deserialize, serialize, SerializationFormat};
use bounding_box::BoundingBox;
use stretching::Stretching;

pub type LevelType = u32;
pub type IndexType = u32;

/// Deepest level whose indices still fit into [`IndexType`].
pub const MAX_LEVEL: LevelType = IndexType::BITS - 1;

#[bitfield(u8, new=false)]
#[derive(Serialize, Deserialize, PartialEq, Eq)]
pub struct GridPointFlags
{
    pub is_leaf: bool,
    pub is_inner: bool,
    #[bits(6)]
    pub _empty: u8
}

impl GridPointFlags
{
    pub fn new(level: &[LevelType], is_leaf: bool) -> Self
    {
        let mut r = Self::default();
        r.set_is_leaf(is_leaf);
        r.set_is_inner(!level.contains(&0));
        r
    }
    /// update `is_inner` flag...
    pub fn update_is_inner(&mut self, level: &[LevelType])
    {
        self.set_is_inner(!level.contains(&0));
    }
}

///
/// Returns true if (level, index) addresses a point of the dyadic hierarchy:
/// odd indices below 2^level for level >= 1, and 0 (left) or 1 (right) on level 0.
///
#[inline]
pub fn is_canonical(level: LevelType, index: IndexType) -> bool
{
    if level == 0
    {
        index <= 1
    }
    else
    {
        level <= MAX_LEVEL && index % 2 == 1 && (index as u64) < (1u64 << level)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct GridPoint
{
    pub level: Vec<LevelType>,
    pub index: Vec<IndexType>,
    pub(crate) flags: GridPointFlags,
}

impl Hash for GridPoint
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.level.hash(state);
        self.index.hash(state);
    }
}

impl PartialOrd for GridPoint
{
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(std::cmp::Ord::cmp(self, other))
    }
}

impl Ord for GridPoint
{
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.level.cmp(&other.level).then(self.index.cmp(&other.index))
    }
}

impl PartialEq for GridPoint
{
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level && self.index == other.index
    }
}
impl Eq for GridPoint{}

impl Display for GridPoint
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (d, (l, i)) in self.level.iter().zip(&self.index).enumerate()
        {
            if d > 0
            {
                write!(f, ", ")?;
            }
            write!(f, "({l}, {i})")?;
        }
        write!(f, "]")
    }
}

impl GridPoint
{
    pub fn new(level: &[LevelType], index: &[IndexType]) -> Self
    {
        let flags = GridPointFlags::new(level, false);
        Self { level: level.to_vec(), index: index.to_vec(), flags }
    }

    ///
    /// Point (1, 1) in every dimension, the root of a grid without boundaries.
    ///
    pub fn level_one(num_inputs: usize) -> Self
    {
        Self::new(&vec![1; num_inputs], &vec![1; num_inputs])
    }

    pub fn zero_index(num_inputs: usize) -> Self
    {
        Self::new(&vec![0; num_inputs], &vec![0; num_inputs])
    }

    #[inline]
    pub fn dim(&self) -> usize
    {
        self.level.len()
    }

    #[inline]
    pub fn get(&self, dim: usize) -> (LevelType, IndexType)
    {
        (self.level[dim], self.index[dim])
    }

    #[inline]
    pub fn set(&mut self, dim: usize, level: LevelType, index: IndexType)
    {
        self.level[dim] = level;
        self.index[dim] = index;
        self.flags.update_is_inner(&self.level);
    }

    pub fn is_leaf(&self) -> bool
    {
        self.flags.is_leaf()
    }
    pub fn set_is_leaf(&mut self, is_leaf: bool)
    {
        self.flags.set_is_leaf(is_leaf);
    }
    ///
    /// This is an inner point if no levels are zero...
    ///
    pub fn is_inner_point(&self) -> bool
    {
        !self.level.contains(&0)
    }

    pub fn is_canonical(&self) -> bool
    {
        self.level.iter().zip(&self.index).all(|(&l, &i)| is_canonical(l, i))
    }

    pub fn level_sum(&self) -> u32
    {
        self.level.iter().sum()
    }
    #[inline]
    pub fn level_max(&self) -> LevelType
    {
        *self.level.iter().max().unwrap_or(&0)
    }
    pub fn level_min(&self) -> LevelType
    {
        *self.level.iter().min().unwrap_or(&0)
    }

    ///
    /// Left child in direction `dim`. Level zero points have a single child,
    /// (1, 1), which is reported by [`GridPoint::right_child`].
    ///
    pub fn left_child(&self, dim: usize) -> Option<GridPoint>
    {
        let (l, i) = self.get(dim);
        if l == 0 || l >= MAX_LEVEL
        {
            return None;
        }
        let mut r = self.clone();
        r.set(dim, l + 1, 2 * i - 1);
        Some(r)
    }

    pub fn right_child(&self, dim: usize) -> Option<GridPoint>
    {
        let (l, i) = self.get(dim);
        if l >= MAX_LEVEL
        {
            return None;
        }
        let mut r = self.clone();
        if l == 0
        {
            r.set(dim, 1, 1);
        }
        else
        {
            r.set(dim, l + 1, 2 * i + 1);
        }
        Some(r)
    }

    ///
    /// Hierarchical parent in direction `dim` for level >= 2. Level one points
    /// hang below the level zero pair instead, see [`GridStorage::parents`].
    ///
    pub fn parent(&self, dim: usize) -> Option<GridPoint>
    {
        let (l, i) = self.get(dim);
        if l < 2
        {
            return None;
        }
        let mut r = self.clone();
        r.set(dim, l - 1, (i >> 1) | 1);
        Some(r)
    }

    pub fn unit_coordinate(&self) -> Vec<f64>
    {
        self.level.iter().zip(&self.index).map(|(&l, &i)| i as f64 / (1u64 << l) as f64).collect()
    }

    pub fn flags(&self) -> GridPointFlags
    {
        self.flags
    }

    fn key(&self) -> GridPoint
    {
        Self { level: self.level.clone(), index: self.index.clone(), flags: GridPointFlags::default() }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GridPointRef<'a> {
    pub(crate) level: &'a [LevelType],
    pub(crate) index: &'a [IndexType],
    pub(crate) flags: &'a GridPointFlags
}

impl GridPointRef<'_>
{
    #[inline]
    pub fn level(&self) -> &[LevelType]
    {
        self.level
    }
    #[inline]
    pub fn index(&self) -> &[IndexType]
    {
        self.index
    }
    #[inline]
    pub fn is_leaf(&self) -> bool
    {
        self.flags.is_leaf()
    }
    #[inline]
    pub fn is_inner_point(&self) -> bool
    {
        self.flags.is_inner()
    }
    pub fn unit_coordinate(&self) -> Vec<f64>
    {
        self.level.iter().zip(self.index).map(|(&l, &i)| i as f64 / (1u64 << l) as f64).collect()
    }
    pub fn level_sum(&self) -> u32
    {
        self.level.iter().sum()
    }
    #[inline]
    pub fn level_max(&self) -> LevelType
    {
        *self.level.iter().max().unwrap_or(&0)
    }
    pub fn level_min(&self) -> LevelType
    {
        *self.level.iter().min().unwrap_or(&0)
    }
}

impl PartialEq for GridPointRef<'_>
{
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level && self.index == other.index
    }
}
impl Eq for GridPointRef<'_>{}

impl From<GridPointRef<'_>> for GridPoint
{
    fn from(value: GridPointRef<'_>) -> Self {
        GridPoint { level: value.level.to_owned(), index: value.index.to_owned(), flags: *value.flags }
    }
}

///
/// Hash indexed, insertion ordered set of grid points. The position of a point
/// in the map is its sequence number, so sequence numbers are always dense.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridStorage
{
    num_inputs: usize,
    map: IndexMap<GridPoint, GridPointFlags, FxBuildHasher>,
    bounding_box: BoundingBox,
    stretching: Option<Stretching>,
    has_boundary: bool,
    algorithmic_dimensions: Vec<usize>,
    shadow: Option<Box<GridStorage>>,
}

impl GridStorage
{
    pub fn new(num_inputs: usize) -> Self
    {
        Self::with_bounding_box(BoundingBox::with_dim(num_inputs))
    }

    pub fn with_bounding_box(bounding_box: BoundingBox) -> Self
    {
        let num_inputs = bounding_box.dim();
        Self
        {
            num_inputs,
            map: IndexMap::default(),
            bounding_box,
            stretching: None,
            has_boundary: false,
            algorithmic_dimensions: (0..num_inputs).collect(),
            shadow: None,
        }
    }

    pub fn with_stretching(stretching: Stretching) -> Self
    {
        let mut r = Self::with_bounding_box(stretching.bounding_box().clone());
        r.stretching = Some(stretching);
        r
    }

    #[inline]
    pub fn dim(&self) -> usize
    {
        self.num_inputs
    }

    #[inline]
    pub fn len(&self) -> usize
    {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool
    {
        self.map.is_empty()
    }

    #[inline(always)]
    pub fn has_boundary(&self) -> bool
    {
        self.has_boundary
    }

    pub fn set_has_boundary(&mut self, has_boundary: bool)
    {
        self.has_boundary = has_boundary;
    }

    #[inline]
    pub fn find(&self, point: &GridPoint) -> Option<usize>
    {
        self.map.get_index_of(point)
    }

    #[inline]
    pub fn contains(&self, point: &GridPoint) -> bool
    {
        self.map.contains_key(point)
    }

    #[inline]
    pub fn is_valid_sequence_number(&self, seq: usize) -> bool
    {
        seq < self.map.len()
    }

    ///
    /// Returns the point stored under `seq`, flags included.
    ///
    /// # Panics
    /// If `seq` is out of range.
    ///
    pub fn point(&self, seq: usize) -> GridPoint
    {
        GridPoint::from(self.point_ref(seq))
    }

    #[inline]
    pub fn point_ref(&self, seq: usize) -> GridPointRef<'_>
    {
        let (key, flags) = self.map.get_index(seq).unwrap_or_else(|| panic!("sequence number {seq} is out of range"));
        GridPointRef { level: &key.level, index: &key.index, flags }
    }

    pub fn get(&self, seq: usize) -> Option<GridPointRef<'_>>
    {
        self.map.get_index(seq).map(|(key, flags)| GridPointRef { level: &key.level, index: &key.index, flags })
    }

    #[inline(always)]
    pub fn level(&self, seq: usize, dim: usize) -> LevelType
    {
        self.point_ref(seq).level[dim]
    }

    #[inline]
    pub fn index(&self, seq: usize, dim: usize) -> IndexType
    {
        self.point_ref(seq).index[dim]
    }

    #[inline]
    pub fn is_leaf(&self, seq: usize) -> bool
    {
        self.point_ref(seq).is_leaf()
    }

    pub fn set_is_leaf(&mut self, seq: usize, is_leaf: bool)
    {
        if let Some((_, flags)) = self.map.get_index_mut(seq)
        {
            flags.set_is_leaf(is_leaf);
        }
    }

    ///
    /// True if the point has no child in direction `dim`.
    ///
    pub fn is_leaf_in(&self, seq: usize, dim: usize) -> bool
    {
        let point = self.point(seq);
        !self.has_child_in(&point, dim)
    }

    pub fn number_of_inner_points(&self) -> usize
    {
        self.map.values().filter(|flags| flags.is_inner()).count()
    }

    pub fn max_level(&self) -> LevelType
    {
        self.map.keys().map(GridPoint::level_max).max().unwrap_or(0)
    }

    ///
    /// Inserts `point` and returns its sequence number. The leaf flag of the new
    /// point is derived from the children already stored and the leaf flag of
    /// each stored parent is cleared.
    ///
    pub fn insert(&mut self, point: GridPoint) -> Result<usize, SGError>
    {
        if point.dim() != self.num_inputs || point.index.len() != self.num_inputs
        {
            return Err(SGError::DimensionMismatch { expected: self.num_inputs, actual: point.dim() });
        }
        if let Some((&level, &index)) = point.level.iter().zip(&point.index).find(|(&l, &i)| !is_canonical(l, i))
        {
            return Err(SGError::InvalidLevelIndex { level, index });
        }
        if self.contains(&point)
        {
            return Err(SGError::DuplicatePoint(point.to_string()));
        }
        let key = point.key();
        let is_leaf = !(0..self.num_inputs).any(|d| self.has_child_in(&key, d));
        let (seq, _) = self.map.insert_full(key, GridPointFlags::new(&point.level, is_leaf));
        for parent in self.parents(&point)
        {
            if let Some(flags) = self.map.get_mut(&parent)
            {
                flags.set_is_leaf(false);
            }
        }
        Ok(seq)
    }

    ///
    /// Removes the point with sequence number `seq`. See [`GridStorage::delete_points`].
    ///
    pub fn erase(&mut self, seq: usize) -> Result<Vec<usize>, SGError>
    {
        self.delete_points(&[seq])
    }

    ///
    /// Removes the given points and compacts the sequence numbers, keeping the
    /// relative order of the survivors. Returns the old sequence number of each
    /// survivor in its new order, i.e. `new_alpha[i] = alpha[remaining[i]]`.
    ///
    pub fn delete_points(&mut self, seqs: &[usize]) -> Result<Vec<usize>, SGError>
    {
        if let Some(&seq) = seqs.iter().find(|&&seq| !self.is_valid_sequence_number(seq))
        {
            return Err(SGError::InvalidSequenceNumber(seq));
        }
        let removed: FxHashSet<usize> = seqs.iter().copied().collect();
        let remaining: Vec<usize> = (0..self.len()).filter(|seq| !removed.contains(seq)).collect();
        let mut seq = 0;
        self.map.retain(|_, _|
        {
            let keep = !removed.contains(&seq);
            seq += 1;
            keep
        });
        self.recalc_leaf_property();
        Ok(remaining)
    }

    ///
    /// Removes the most recently inserted point.
    ///
    pub fn delete_last(&mut self) -> Option<GridPoint>
    {
        let (key, flags) = self.map.pop()?;
        for parent in self.parents(&key)
        {
            if let Some(seq) = self.find(&parent)
            {
                self.refresh_leaf(seq);
            }
        }
        Some(GridPoint { flags, ..key })
    }

    pub fn clear(&mut self)
    {
        self.map.clear();
    }

    pub fn recalc_leaf_property(&mut self)
    {
        for seq in 0..self.len()
        {
            self.refresh_leaf(seq);
        }
    }

    fn refresh_leaf(&mut self, seq: usize)
    {
        let point = self.point(seq);
        let is_leaf = !(0..self.num_inputs).any(|d| self.has_child_in(&point, d));
        self.set_is_leaf(seq, is_leaf);
    }

    pub(crate) fn has_child_in(&self, point: &GridPoint, dim: usize) -> bool
    {
        point.left_child(dim).is_some_and(|c| self.contains(&c)) ||
            point.right_child(dim).is_some_and(|c| self.contains(&c))
    }

    ///
    /// Hierarchical parents of `point` in every dimension. A level one
    /// coordinate hangs below both level zero points of its dimension.
    ///
    pub fn parents(&self, point: &GridPoint) -> Vec<GridPoint>
    {
        let mut parents = Vec::with_capacity(self.num_inputs);
        for d in 0..point.dim()
        {
            match point.get(d)
            {
                (0, _) => {},
                (1, _) =>
                {
                    let mut p = point.key();
                    p.set(d, 0, 0);
                    parents.push(p.clone());
                    p.set(d, 0, 1);
                    parents.push(p);
                },
                _ =>
                {
                    if let Some(p) = point.parent(d)
                    {
                        parents.push(p);
                    }
                }
            }
        }
        parents
    }

    #[inline]
    pub fn bounding_box(&self) -> &BoundingBox
    {
        &self.bounding_box
    }

    pub fn set_bounding_box(&mut self, bounding_box: BoundingBox) -> Result<(), SGError>
    {
        if bounding_box.dim() != self.num_inputs
        {
            return Err(SGError::DimensionMismatch { expected: self.num_inputs, actual: bounding_box.dim() });
        }
        self.bounding_box = bounding_box;
        self.stretching = None;
        Ok(())
    }

    #[inline]
    pub fn stretching(&self) -> Option<&Stretching>
    {
        self.stretching.as_ref()
    }

    pub fn set_stretching(&mut self, stretching: Stretching) -> Result<(), SGError>
    {
        if stretching.dim() != self.num_inputs
        {
            return Err(SGError::DimensionMismatch { expected: self.num_inputs, actual: stretching.dim() });
        }
        self.bounding_box = stretching.bounding_box().clone();
        self.stretching = Some(stretching);
        Ok(())
    }

    #[inline]
    pub fn uses_stretching(&self) -> bool
    {
        self.stretching.is_some()
    }

    pub fn unit_coordinate(&self, seq: usize) -> Vec<f64>
    {
        self.point_ref(seq).unit_coordinate()
    }

    ///
    /// Physical coordinate of the point, mapped through the stretching if one
    /// is set and through the bounding box otherwise.
    ///
    pub fn coordinate(&self, seq: usize) -> Vec<f64>
    {
        let point = self.point_ref(seq);
        match &self.stretching
        {
            Some(stretching) => (0..self.num_inputs).map(|d| stretching.coordinate(point.level[d], point.index[d], d)).collect(),
            None =>
            {
                let mut coor = point.unit_coordinate();
                self.bounding_box.to_real_coordinate_in_place(&mut coor);
                coor
            }
        }
    }

    #[inline]
    pub fn algorithmic_dimensions(&self) -> &[usize]
    {
        &self.algorithmic_dimensions
    }

    pub fn set_algorithmic_dimensions(&mut self, dims: Vec<usize>) -> Result<(), SGError>
    {
        if dims.len() > self.num_inputs
        {
            return Err(SGError::InvalidArgument(format!("{} algorithmic dimensions for a {}-dimensional grid", dims.len(), self.num_inputs)));
        }
        if let Some(&d) = dims.iter().find(|&&d| d >= self.num_inputs)
        {
            return Err(SGError::InvalidArgument(format!("algorithmic dimension {d} is out of range")));
        }
        self.algorithmic_dimensions = dims;
        Ok(())
    }

    ///
    /// Auxiliary points of prewavelet-type bases. They carry no coefficient.
    ///
    pub fn shadow_storage(&self) -> Option<&GridStorage>
    {
        self.shadow.as_deref()
    }

    pub fn shadow_storage_mut(&mut self) -> &mut GridStorage
    {
        let num_inputs = self.num_inputs;
        self.shadow.get_or_insert_with(|| Box::new(GridStorage::new(num_inputs)))
    }

    ///
    /// Return the nodes in the grid...
    ///
    pub fn nodes(&self) -> NodeIterator<'_>
    {
        NodeIterator { inner: self.map.iter() }
    }

    ///
    /// Nodes paired with their sequence numbers, in storage order.
    ///
    pub fn iter(&self) -> impl Iterator<Item = (GridPointRef<'_>, usize)> + '_
    {
        self.nodes().enumerate().map(|(seq, point)| (point, seq))
    }

    ///
    /// Return the real coordinates for each node...
    ///
    pub fn points(&self) -> PointIterator<'_>
    {
        PointIterator { storage: self, current_seq: 0 }
    }

    pub fn serialize(&self, format: SerializationFormat) -> Result<Vec<u8>, SGError>
    {
        serialize(self, format)
    }

    pub fn deserialize(data: &[u8], format: SerializationFormat) -> Result<Self, SGError>
    {
        let storage: Self = deserialize(data, format)?;
        if storage.map.keys().any(|p| p.dim() != storage.num_inputs || !p.is_canonical())
        {
            return Err(SGError::DeserializationFailed);
        }
        Ok(storage)
    }
}

pub struct NodeIterator<'a> {
    inner: indexmap::map::Iter<'a, GridPoint, GridPointFlags>,
}

impl<'a> Iterator for NodeIterator<'a> {
    type Item = GridPointRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, flags)| GridPointRef { level: &key.level, index: &key.index, flags })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for NodeIterator<'_> {}

pub struct PointIterator<'a> {
    storage: &'a GridStorage,
    current_seq: usize,
}

impl<'a> Iterator for PointIterator<'a> {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_seq < self.storage.len() {
            let point = self.storage.coordinate(self.current_seq);
            self.current_seq += 1;
            Some(point)
        } else {
            None
        }
    }
}

//!
//! Versioned, whitespace separated description of a [`GridStorage`].
//!
//! ```text
//! version dim size
//! mode                                  (version >= 5; 0 box, 1 analytic, 2 discrete)
//! left right dirichlet_left dirichlet_right     (version >= 3, one line per dimension)
//! kind x_0 xsi                          (mode 1, one line per dimension)
//! level / c_0 c_1 ... c_{2^level}       (mode 2, two lines per dimension)
//! l_0 i_0 l_1 i_1 ... leaf              (one line per point)
//! ```
//!
//! Versions 1 and 4 carry no leaf flag, versions 1 and 2 no bounding box.
//!
use std::fmt::Write as _;
use std::io::{Read, Write};
use std::str::{FromStr, SplitWhitespace};

use tracing::debug;

use crate::errors::SGError;
use super::bounding_box::{BoundingBox, BoundingBox1D};
use super::stretching::{Stretching, Stretching1D, StretchingKind, StretchingMode};
use super::{GridPoint, GridStorage};

/// Version written by [`GridStorage::to_text`].
pub const TEXT_FORMAT_VERSION: u32 = 5;

struct Tokens<'a>
{
    inner: SplitWhitespace<'a>,
}

impl<'a> Tokens<'a>
{
    fn new(text: &'a str) -> Self
    {
        Self { inner: text.split_whitespace() }
    }

    fn next<T: FromStr>(&mut self, what: &str) -> Result<T, SGError>
    {
        let token = self.inner.next().ok_or_else(|| SGError::MalformedStream(format!("unexpected end of stream reading {what}")))?;
        token.parse().map_err(|_| SGError::MalformedStream(format!("invalid {what} '{token}'")))
    }

    ///
    /// Fails unless at least `needed` tokens are left. Counts are validated
    /// this way before anything is allocated from them.
    ///
    fn require(&self, needed: Option<usize>, what: &str) -> Result<(), SGError>
    {
        match needed
        {
            Some(needed) if self.inner.clone().nth(needed.saturating_sub(1)).is_some() || needed == 0 => Ok(()),
            _ => Err(SGError::MalformedStream(format!("stream too short for the declared {what}"))),
        }
    }

    fn next_bool(&mut self, what: &str) -> Result<bool, SGError>
    {
        match self.next::<u32>(what)?
        {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(SGError::MalformedStream(format!("invalid {what} '{v}'"))),
        }
    }
}

fn has_leaf_flags(version: u32) -> bool
{
    version != 1 && version != 4
}

impl GridStorage
{
    pub fn to_text(&self) -> String
    {
        let mut text = String::new();
        // writing into a String cannot fail
        let _ = self.format_text(&mut text);
        text
    }

    pub fn write_text<W: Write>(&self, writer: &mut W) -> Result<(), SGError>
    {
        writer.write_all(self.to_text().as_bytes())?;
        Ok(())
    }

    fn format_text(&self, out: &mut String) -> std::fmt::Result
    {
        writeln!(out, "{} {} {}", TEXT_FORMAT_VERSION, self.dim(), self.len())?;
        let mode = match self.stretching().map(Stretching::mode)
        {
            None => 0,
            Some(StretchingMode::Analytic(_)) => 1,
            Some(StretchingMode::Discrete { .. }) => 2,
        };
        writeln!(out, "{mode}")?;
        for d in 0..self.dim()
        {
            let b = self.bounding_box().boundary(d);
            writeln!(out, "{} {} {} {}", b.left_boundary, b.right_boundary, b.dirichlet_left as u8, b.dirichlet_right as u8)?;
        }
        match self.stretching().map(Stretching::mode)
        {
            Some(StretchingMode::Analytic(stretchings)) =>
            {
                for s in stretchings
                {
                    writeln!(out, "{} {} {}", s.kind.code(), s.x_0, s.xsi)?;
                }
            },
            Some(StretchingMode::Discrete { levels, coordinates }) =>
            {
                for (level, coordinates) in levels.iter().zip(coordinates)
                {
                    writeln!(out, "{level}")?;
                    let line: Vec<String> = coordinates.iter().map(f64::to_string).collect();
                    writeln!(out, "{}", line.join(" "))?;
                }
            },
            None => {},
        }
        for point in self.nodes()
        {
            for (l, i) in point.level().iter().zip(point.index())
            {
                write!(out, "{l} {i} ")?;
            }
            writeln!(out, "{}", point.is_leaf() as u8)?;
        }
        Ok(())
    }

    pub fn read_text<R: Read>(reader: &mut R) -> Result<Self, SGError>
    {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_text(&text)
    }

    pub fn from_text(text: &str) -> Result<Self, SGError>
    {
        let mut tokens = Tokens::new(text);
        let version: u32 = tokens.next("version")?;
        if version > TEXT_FORMAT_VERSION
        {
            return Err(SGError::UnsupportedVersion { found: version, supported: TEXT_FORMAT_VERSION });
        }
        if version == 0
        {
            return Err(SGError::MalformedStream("version 0".to_string()));
        }
        let dim: usize = tokens.next("dimension")?;
        let size: usize = tokens.next("size")?;
        if dim == 0
        {
            return Err(SGError::MalformedStream("zero dimensions".to_string()));
        }
        tokens.require(Some(dim), "dimension")?;
        let point_tokens = if has_leaf_flags(version) { 2 * dim + 1 } else { 2 * dim };
        tokens.require(size.checked_mul(point_tokens), "number of points")?;
        let mode: u32 = if version >= 5 { tokens.next("domain mode")? } else { 0 };

        let mut boundaries = vec![BoundingBox1D::default(); dim];
        if version >= 3
        {
            for b in boundaries.iter_mut()
            {
                b.left_boundary = tokens.next("left boundary")?;
                b.right_boundary = tokens.next("right boundary")?;
                b.dirichlet_left = tokens.next_bool("dirichlet flag")?;
                b.dirichlet_right = tokens.next_bool("dirichlet flag")?;
            }
        }
        let bounding_box = BoundingBox::from_boundaries(boundaries);
        let mut storage = match mode
        {
            0 => GridStorage::with_bounding_box(bounding_box),
            1 =>
            {
                let mut stretchings = Vec::with_capacity(dim);
                for _ in 0..dim
                {
                    let code: u32 = tokens.next("stretching type")?;
                    let kind = StretchingKind::from_code(code).ok_or_else(|| SGError::MalformedStream(format!("unknown stretching type {code}")))?;
                    stretchings.push(Stretching1D { kind, x_0: tokens.next("x_0")?, xsi: tokens.next("xsi")? });
                }
                let stretching = Stretching::analytic(bounding_box, stretchings).map_err(|e| SGError::MalformedStream(e.to_string()))?;
                GridStorage::with_stretching(stretching)
            },
            2 =>
            {
                let mut coordinates = Vec::with_capacity(dim);
                for _ in 0..dim
                {
                    let level: u32 = tokens.next("discrete stretching level")?;
                    if level > 30
                    {
                        return Err(SGError::MalformedStream(format!("discrete stretching level {level} is too deep")));
                    }
                    tokens.require(Some((1usize << level) + 1), "discrete stretching level")?;
                    let mut vec = Vec::with_capacity((1 << level) + 1);
                    for _ in 0..=(1usize << level)
                    {
                        vec.push(tokens.next("discrete coordinate")?);
                    }
                    coordinates.push(vec);
                }
                let stretching = Stretching::discrete(coordinates).map_err(|e| SGError::MalformedStream(e.to_string()))?;
                GridStorage::with_stretching(stretching)
            },
            m => return Err(SGError::MalformedStream(format!("unknown domain mode {m}"))),
        };

        let mut leaves = Vec::with_capacity(size);
        let mut level = vec![0; dim];
        let mut index = vec![0; dim];
        for k in 0..size
        {
            for d in 0..dim
            {
                level[d] = tokens.next("level")?;
                index[d] = tokens.next("index")?;
            }
            if has_leaf_flags(version)
            {
                leaves.push(tokens.next_bool("leaf flag")?);
            }
            storage.insert(GridPoint::new(&level, &index)).map_err(|e| SGError::MalformedStream(format!("point {k}: {e}")))?;
        }
        for (seq, is_leaf) in leaves.into_iter().enumerate()
        {
            storage.set_is_leaf(seq, is_leaf);
        }
        let has_boundary = storage.nodes().any(|p| p.level_min() == 0);
        storage.set_has_boundary(has_boundary);
        debug!(version, dim, size, has_boundary, "parsed grid description");
        Ok(storage)
    }
}
